//! In-memory ledger used by the unit tests.
//!
//! Simulates an ERC-20 token and the marketplace escrow in one shared state,
//! records every collaborator call in order, and can inject failures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy_primitives::{B256, U256};

use crate::error::ClientError;
use crate::ledger::{ListingRecord, MarketplaceContract, ReceiptSource, TokenContract, Wallet};
use crate::types::{Address, ListingDraft, ListingId, Receipt, Signer, TxHash};
use crate::units::TokenAmount;
use crate::Result;

pub const TOKEN: Address = Address::new([0x70; 20]);
pub const MARKET: Address = Address::new([0x4d; 20]);
pub const BUYER: Address = Address::new([0xb0; 20]);
pub const SELLER: Address = Address::new([0x5e; 20]);

/// A collaborator call, in the order it reached the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RequestAccounts,
    BalanceOf(Address),
    Allowance(Address),
    Approve { hash: TxHash, amount: U256 },
    GetAllListings,
    CreateListing { hash: TxHash },
    PurchaseModel { hash: TxHash, id: ListingId },
    Receipt(TxHash),
}

/// Failure injection switches.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub reject_accounts: bool,
    pub reject_approval: bool,
    pub revert_approval: bool,
    /// Approval is mined successfully but never takes effect.
    pub drop_allowance: bool,
    pub reject_purchase: bool,
    pub fail_reads: bool,
    /// Reads start failing once a purchase has been submitted.
    pub fail_reads_after_purchase: bool,
    /// Receipts of listing creations carry no id.
    pub omit_created_event: bool,
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: Vec<Address>,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    listings: Vec<ListingRecord>,
    receipts: HashMap<TxHash, Receipt>,
    created: HashMap<TxHash, ListingId>,
    calls: Vec<Call>,
    nonce: u64,
    faults: Faults,
}

impl LedgerState {
    fn next_hash(&mut self) -> TxHash {
        self.nonce += 1;
        B256::left_padding_from(&self.nonce.to_be_bytes())
    }

    fn mine(&mut self, hash: TxHash, success: bool) {
        let block_number = Some(self.nonce);
        self.receipts.insert(
            hash,
            Receipt {
                hash,
                block_number,
                success,
                logs: Vec::new(),
            },
        );
    }

    fn execute_purchase(&mut self, buyer: Address, id: ListingId) -> bool {
        let Some(index) = self.listings.iter().position(|l| l.id == id.to_raw()) else {
            return false;
        };
        let listing = &self.listings[index];
        if listing.sold || listing.seller == buyer {
            return false;
        }
        let price = listing.price;
        let seller = listing.seller;

        let allowance = self.allowances.get(&(buyer, MARKET)).copied().unwrap_or_default();
        let balance = self.balances.get(&buyer).copied().unwrap_or_default();
        if allowance < price || balance < price {
            return false;
        }

        self.allowances.insert((buyer, MARKET), allowance - price);
        self.balances.insert(buyer, balance - price);
        *self.balances.entry(seller).or_default() += price;
        self.listings[index].sold = true;
        true
    }
}

/// Shared handle to the simulated ledger. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_accounts(self, accounts: &[Address]) -> Self {
        self.state().accounts = accounts.to_vec();
        self
    }

    pub fn with_balance(self, owner: Address, amount: &str) -> Self {
        let amount = TokenAmount::parse(amount).map(|a| a.raw()).unwrap_or_default();
        self.state().balances.insert(owner, amount);
        self
    }

    pub fn with_listing(
        self,
        name: &str,
        price: &str,
        seller: Address,
        sold: bool,
    ) -> Self {
        {
            let mut state = self.state();
            let id = U256::from(state.listings.len() + 1);
            state.listings.push(ListingRecord {
                id,
                model_name: name.to_string(),
                description: format!("{name} description"),
                model_link: format!("ipfs://{name}"),
                price: TokenAmount::parse(price).map(|a| a.raw()).unwrap_or_default(),
                seller,
                sold,
            });
        }
        self
    }

    pub fn with_raw_listing(self, record: ListingRecord) -> Self {
        self.state().listings.push(record);
        self
    }

    pub fn with_faults(self, faults: Faults) -> Self {
        self.state().faults = faults;
        self
    }

    pub fn set_faults(&self, faults: Faults) {
        self.state().faults = faults;
    }

    /// Marks a listing sold, as if another buyer got there first.
    pub fn sell_elsewhere(&self, id: u64) {
        let mut state = self.state();
        if let Some(listing) = state.listings.iter_mut().find(|l| l.id == U256::from(id)) {
            listing.sold = true;
        }
    }

    /// Stores a mined receipt for an unrelated transaction.
    pub fn insert_receipt(&self, success: bool) -> TxHash {
        let mut state = self.state();
        let hash = state.next_hash();
        state.mine(hash, success);
        hash
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn balance(&self, owner: Address) -> U256 {
        self.state().balances.get(&owner).copied().unwrap_or_default()
    }

    /// Position of the first call matching `predicate`.
    pub fn position(&self, predicate: impl Fn(&Call) -> bool) -> Option<usize> {
        self.state().calls.iter().position(predicate)
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|c| predicate(c)).count()
    }

    fn read_guard(&self, call: Call) -> Result<()> {
        let mut state = self.state();
        state.calls.push(call);
        if state.faults.fail_reads {
            return Err(ClientError::Rpc("connection refused".to_string()));
        }
        Ok(())
    }
}

impl Wallet for MockLedger {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        let mut state = self.state();
        state.calls.push(Call::RequestAccounts);
        if state.faults.reject_accounts {
            return Err(ClientError::UserRejected("User rejected the request".to_string()));
        }
        Ok(state.accounts.clone())
    }
}

impl TokenContract for MockLedger {
    fn address(&self) -> Address {
        TOKEN
    }

    async fn balance_of(&self, owner: Address) -> Result<U256> {
        self.read_guard(Call::BalanceOf(owner))?;
        Ok(self.balance(owner))
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        self.read_guard(Call::Allowance(owner))?;
        Ok(self
            .state()
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn approve(&self, signer: &Signer, spender: Address, amount: U256) -> Result<TxHash> {
        let mut state = self.state();
        if state.faults.reject_approval {
            return Err(ClientError::TransactionRejected(
                "User denied transaction signature".to_string(),
            ));
        }
        let hash = state.next_hash();
        state.calls.push(Call::Approve { hash, amount });

        let success = !state.faults.revert_approval;
        if success && !state.faults.drop_allowance {
            state.allowances.insert((signer.address(), spender), amount);
        }
        state.mine(hash, success);
        Ok(hash)
    }
}

impl MarketplaceContract for MockLedger {
    fn address(&self) -> Address {
        MARKET
    }

    async fn get_all_listings(&self) -> Result<Vec<ListingRecord>> {
        self.read_guard(Call::GetAllListings)?;
        Ok(self.state().listings.clone())
    }

    async fn create_listing(&self, signer: &Signer, draft: &ListingDraft) -> Result<TxHash> {
        let mut state = self.state();
        let hash = state.next_hash();
        state.calls.push(Call::CreateListing { hash });

        let id = U256::from(state.listings.len() + 1);
        state.listings.push(ListingRecord {
            id,
            model_name: draft.model_name.clone(),
            description: draft.description.clone(),
            model_link: draft.model_link.clone(),
            price: draft.price.raw(),
            seller: signer.address(),
            sold: false,
        });
        state.created.insert(hash, ListingId::from_raw(id));
        state.mine(hash, true);
        Ok(hash)
    }

    async fn purchase_model(&self, signer: &Signer, listing_id: ListingId) -> Result<TxHash> {
        let mut state = self.state();
        if state.faults.reject_purchase {
            return Err(ClientError::TransactionRejected(
                "User denied transaction signature".to_string(),
            ));
        }
        let hash = state.next_hash();
        state.calls.push(Call::PurchaseModel {
            hash,
            id: listing_id,
        });
        let success = state.execute_purchase(signer.address(), listing_id);
        state.mine(hash, success);
        if state.faults.fail_reads_after_purchase {
            state.faults.fail_reads = true;
        }
        Ok(hash)
    }

    fn created_listing_id(&self, receipt: &Receipt) -> Option<ListingId> {
        let state = self.state();
        if state.faults.omit_created_event {
            return None;
        }
        state.created.get(&receipt.hash).copied()
    }
}

impl ReceiptSource for MockLedger {
    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>> {
        let mut state = self.state();
        state.calls.push(Call::Receipt(hash));
        Ok(state.receipts.get(&hash).cloned())
    }
}
