//! Static Solidity interfaces of the token and marketplace contracts.

use alloy_sol_types::sol;

sol! {
    /// The ERC-20 subset the client uses.
    interface IModelToken {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    /// The model marketplace.
    interface IModelMarketplace {
        struct Listing {
            uint256 id;
            string modelName;
            string description;
            string modelLink;
            uint256 price;
            address seller;
            bool sold;
        }

        event ListingCreated(uint256 indexed id, address indexed seller, string modelName, uint256 price);

        function getAllListings() external view returns (Listing[] memory);
        function createListing(string modelName, string description, string modelLink, uint256 price) external;
        function purchaseModel(uint256 listingId) external;
    }
}
