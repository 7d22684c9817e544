//! Startup validation of contract interface descriptors.
//!
//! A descriptor is the compiled artifact of a contract: a JSON object with an
//! `abi` array. Exactly one shape is accepted. The descriptor must declare
//! every function the client calls, with the input and output types of the
//! static interface in [`crate::abi`].

use std::fmt;
use std::path::Path;

use alloy_sol_types::SolCall;
use serde::Deserialize;
use tracing::info;

use crate::abi::{IModelMarketplace, IModelToken};
use crate::error::ClientError;
use crate::Result;

/// Which contract a descriptor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractKind {
    Token,
    Marketplace,
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token => write!(f, "token"),
            Self::Marketplace => write!(f, "marketplace"),
        }
    }
}

struct RequiredFunction {
    signature: &'static str,
    outputs: &'static [&'static str],
}

impl ContractKind {
    fn required_functions(self) -> Vec<RequiredFunction> {
        match self {
            Self::Token => vec![
                RequiredFunction {
                    signature: IModelToken::balanceOfCall::SIGNATURE,
                    outputs: &["uint256"],
                },
                RequiredFunction {
                    signature: IModelToken::allowanceCall::SIGNATURE,
                    outputs: &["uint256"],
                },
                RequiredFunction {
                    signature: IModelToken::approveCall::SIGNATURE,
                    outputs: &["bool"],
                },
            ],
            Self::Marketplace => vec![
                RequiredFunction {
                    signature: IModelMarketplace::getAllListingsCall::SIGNATURE,
                    outputs: &["(uint256,string,string,string,uint256,address,bool)[]"],
                },
                RequiredFunction {
                    signature: IModelMarketplace::createListingCall::SIGNATURE,
                    outputs: &[],
                },
                RequiredFunction {
                    signature: IModelMarketplace::purchaseModelCall::SIGNATURE,
                    outputs: &[],
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
struct Artifact {
    #[serde(rename = "contractName", default)]
    contract_name: Option<String>,
    abi: Vec<AbiItem>,
}

#[derive(Debug, Deserialize)]
struct AbiItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<AbiParam>,
    #[serde(default)]
    outputs: Vec<AbiParam>,
}

#[derive(Debug, Deserialize)]
struct AbiParam {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    components: Vec<AbiParam>,
}

impl AbiParam {
    /// Canonical type string, expanding tuples into their component types.
    fn canonical(&self) -> String {
        match self.ty.strip_prefix("tuple") {
            Some(suffix) => format!("({}){suffix}", join_canonical(&self.components)),
            None => self.ty.clone(),
        }
    }
}

fn join_canonical(params: &[AbiParam]) -> String {
    params
        .iter()
        .map(AbiParam::canonical)
        .collect::<Vec<_>>()
        .join(",")
}

/// A validated interface descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    kind: ContractKind,
    contract_name: Option<String>,
    functions: Vec<String>,
}

impl InterfaceDescriptor {
    /// Read and validate a descriptor file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDescriptor` if the file cannot be read or fails
    /// validation.
    pub fn load(kind: ContractKind, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ClientError::InvalidDescriptor {
            contract: kind.to_string(),
            reason: format!("failed to read {}: {e}", path.display()),
        })?;
        let descriptor = Self::parse(kind, &content)?;
        info!(contract = %kind, path = %path.display(), "Interface descriptor validated");
        Ok(descriptor)
    }

    /// Parse and validate descriptor JSON.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDescriptor` if the JSON is not an artifact object with
    /// an `abi` array, or a required function is missing or has different
    /// types.
    pub fn parse(kind: ContractKind, json: &str) -> Result<Self> {
        let invalid = |reason: String| ClientError::InvalidDescriptor {
            contract: kind.to_string(),
            reason,
        };

        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| invalid(format!("malformed JSON: {e}")))?;
        if !value.is_object() {
            return Err(invalid(
                "expected a compiled artifact object with an `abi` array".to_string(),
            ));
        }
        let artifact: Artifact = serde_json::from_value(value)
            .map_err(|e| invalid(format!("malformed artifact: {e}")))?;

        let functions: Vec<(String, String)> = artifact
            .abi
            .iter()
            .filter(|item| item.kind == "function")
            .map(|item| {
                (
                    format!("{}({})", item.name, join_canonical(&item.inputs)),
                    join_canonical(&item.outputs),
                )
            })
            .collect();

        for required in kind.required_functions() {
            let Some((_, outputs)) = functions.iter().find(|(sig, _)| sig == required.signature)
            else {
                return Err(invalid(format!("missing function {}", required.signature)));
            };
            let expected = required.outputs.join(",");
            if *outputs != expected {
                return Err(invalid(format!(
                    "function {} returns ({outputs}), expected ({expected})",
                    required.signature
                )));
            }
        }

        Ok(Self {
            kind,
            contract_name: artifact.contract_name,
            functions: functions.into_iter().map(|(sig, _)| sig).collect(),
        })
    }

    #[must_use]
    pub fn kind(&self) -> ContractKind {
        self.kind
    }

    #[must_use]
    pub fn contract_name(&self) -> Option<&str> {
        self.contract_name.as_deref()
    }

    /// Signatures of every function the descriptor declares.
    #[must_use]
    pub fn functions(&self) -> &[String] {
        &self.functions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN_ARTIFACT: &str = r#"{
        "contractName": "MTKToken",
        "abi": [
            {"type": "constructor", "inputs": [{"name": "initialSupply", "type": "uint256"}]},
            {"type": "function", "name": "balanceOf", "stateMutability": "view",
             "inputs": [{"name": "account", "type": "address"}],
             "outputs": [{"name": "", "type": "uint256"}]},
            {"type": "function", "name": "allowance", "stateMutability": "view",
             "inputs": [{"name": "owner", "type": "address"}, {"name": "spender", "type": "address"}],
             "outputs": [{"name": "", "type": "uint256"}]},
            {"type": "function", "name": "approve", "stateMutability": "nonpayable",
             "inputs": [{"name": "spender", "type": "address"}, {"name": "value", "type": "uint256"}],
             "outputs": [{"name": "", "type": "bool"}]},
            {"type": "event", "name": "Transfer", "inputs": []}
        ]
    }"#;

    const MARKETPLACE_ARTIFACT: &str = r#"{
        "contractName": "AIModelMarketplace",
        "abi": [
            {"type": "function", "name": "getAllListings", "stateMutability": "view",
             "inputs": [],
             "outputs": [{"name": "", "type": "tuple[]", "internalType": "struct AIModelMarketplace.Listing[]",
                          "components": [
                              {"name": "id", "type": "uint256"},
                              {"name": "modelName", "type": "string"},
                              {"name": "description", "type": "string"},
                              {"name": "modelLink", "type": "string"},
                              {"name": "price", "type": "uint256"},
                              {"name": "seller", "type": "address"},
                              {"name": "sold", "type": "bool"}
                          ]}]},
            {"type": "function", "name": "createListing", "stateMutability": "nonpayable",
             "inputs": [{"name": "modelName", "type": "string"}, {"name": "description", "type": "string"},
                        {"name": "modelLink", "type": "string"}, {"name": "price", "type": "uint256"}],
             "outputs": []},
            {"type": "function", "name": "purchaseModel", "stateMutability": "nonpayable",
             "inputs": [{"name": "listingId", "type": "uint256"}],
             "outputs": []}
        ]
    }"#;

    #[test]
    fn test_parse_token_artifact() -> Result<()> {
        let descriptor = InterfaceDescriptor::parse(ContractKind::Token, TOKEN_ARTIFACT)?;
        assert_eq!(descriptor.kind(), ContractKind::Token);
        assert_eq!(descriptor.contract_name(), Some("MTKToken"));
        assert!(descriptor.functions().contains(&"approve(address,uint256)".to_string()));
        Ok(())
    }

    #[test]
    fn test_parse_marketplace_artifact() -> Result<()> {
        let descriptor =
            InterfaceDescriptor::parse(ContractKind::Marketplace, MARKETPLACE_ARTIFACT)?;
        assert_eq!(descriptor.functions().len(), 3);
        Ok(())
    }

    #[test]
    fn test_bare_abi_array_rejected() {
        let Err(err) = InterfaceDescriptor::parse(ContractKind::Token, "[]") else {
            panic!("bare ABI array must be rejected");
        };
        assert!(err.to_string().contains("artifact object"));
    }

    #[test]
    fn test_missing_abi_field_rejected() {
        let Err(err) = InterfaceDescriptor::parse(ContractKind::Token, r#"{"bytecode": "0x"}"#)
        else {
            panic!("artifact without abi must be rejected");
        };
        assert!(matches!(err, ClientError::InvalidDescriptor { .. }));
    }

    #[test]
    fn test_wrong_contract_rejected() {
        let Err(err) = InterfaceDescriptor::parse(ContractKind::Marketplace, TOKEN_ARTIFACT) else {
            panic!("token artifact is not a marketplace descriptor");
        };
        assert!(err.to_string().contains("missing function getAllListings()"));
    }

    #[test]
    fn test_mismatched_outputs_rejected() {
        let artifact = TOKEN_ARTIFACT.replace(
            r#""outputs": [{"name": "", "type": "bool"}]"#,
            r#""outputs": []"#,
        );
        let Err(err) = InterfaceDescriptor::parse(ContractKind::Token, &artifact) else {
            panic!("approve without bool output must be rejected");
        };
        assert!(err.to_string().contains("approve(address,uint256) returns ()"));
    }

    #[test]
    fn test_load_missing_file() {
        let Err(err) =
            InterfaceDescriptor::load(ContractKind::Token, Path::new("/nonexistent/MTKToken.json"))
        else {
            panic!("missing file must fail");
        };
        assert!(matches!(err, ClientError::InvalidDescriptor { .. }));
    }
}
