//! Compiled contract artifacts.
//!
//! Reads the Hardhat artifact format (`contractName`, `sourceName`, `abi`,
//! `bytecode`) and writes the combined interface in the same shape, without
//! bytecode.
use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{Error, Result},
    interface::{CombinedInterface, Declaration, DeclarationKind},
};

/// A compiled contract, or the combined interface of a diamond.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    /// Name of the contract.
    pub contract_name: String,
    /// Path of the source file, relative to the project root.
    pub source_name: String,
    /// ABI JSON elements.
    pub abi: Vec<Value>,
    /// Creation bytecode, `0x`-prefixed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<String>,
}

#[derive(Deserialize)]
struct Param {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    components: Vec<Param>,
}

impl Param {
    /// Expands `tuple` types into their inline form.
    fn solidity_type(&self) -> String {
        match self.ty.strip_prefix("tuple") {
            Some(suffix) => {
                let components: Vec<String> =
                    self.components.iter().map(Param::solidity_type).collect();
                format!("({}){suffix}", components.join(","))
            }
            None => self.ty.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum AbiItem {
    Function(Item),
    Event(Item),
    Error(Item),
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    name: String,
    #[serde(default)]
    inputs: Vec<Param>,
    declared_in: Option<String>,
}

impl ContractArtifact {
    /// Parses an artifact file.
    ///
    /// # Errors
    ///
    /// * [`Error::Artifact`] if `json` is not a valid artifact.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the artifact as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// * [`Error::Artifact`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The combined interface as an artifact.
    #[must_use]
    pub fn combined(interface: &CombinedInterface) -> Self {
        Self {
            contract_name: interface.name.clone(),
            source_name: format!("combined/{}.sol", interface.name),
            abi: interface
                .declarations
                .iter()
                .map(Declaration::abi_item)
                .collect(),
            bytecode: None,
        }
    }

    /// `sourceName:contractName`, the name inclusion patterns match against.
    #[must_use]
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }

    /// Decoded creation bytecode. `None` for abstract contracts and
    /// interfaces.
    ///
    /// # Errors
    ///
    /// * [`Error::Artifact`] if the bytecode is not valid hex.
    pub fn bytecode(&self) -> Result<Option<Bytes>> {
        match self.bytecode.as_deref() {
            None | Some("" | "0x") => Ok(None),
            Some(code) => code
                .parse::<Bytes>()
                .map(Some)
                .map_err(|e| {
                    Error::Artifact(format!("{}: {e}", self.contract_name))
                }),
        }
    }

    /// Declarations of every function, event and error in the ABI, in order.
    ///
    /// Constructors, fallbacks and receive functions don't take part in
    /// dispatch and are skipped.
    ///
    /// # Errors
    ///
    /// * [`Error::Artifact`] if an ABI element is malformed.
    /// * [`Error::InvalidType`] or [`Error::InvalidName`] if a signature
    ///   can't be derived.
    pub fn declarations(&self) -> Result<Vec<Declaration>> {
        let origin = self.fully_qualified_name();
        let mut declarations = Vec::new();
        for raw in &self.abi {
            let item = serde_json::from_value::<AbiItem>(raw.clone())?;
            let (kind, item) = match item {
                AbiItem::Function(item) => (DeclarationKind::Function, item),
                AbiItem::Event(item) => (DeclarationKind::Event, item),
                AbiItem::Error(item) => (DeclarationKind::Error, item),
                AbiItem::Other => continue,
            };

            let inputs: Vec<String> =
                item.inputs.iter().map(Param::solidity_type).collect();
            let mut declaration =
                Declaration::new(kind, &item.name, &inputs, origin.clone())?
                    .with_abi(raw.clone());
            if let Some(unit) = item.declared_in {
                declaration = declaration.declared_in(unit);
            }
            declarations.push(declaration);
        }
        Ok(declarations)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::signature;

    fn artifact(abi: Value) -> String {
        json!({
            "_format": "hh-sol-artifact-1",
            "contractName": "FooFacet",
            "sourceName": "contracts/facets/FooFacet.sol",
            "abi": abi,
            "bytecode": "0x6080",
            "deployedBytecode": "0x6080",
            "linkReferences": {},
        })
        .to_string()
    }

    #[test]
    fn reads_hardhat_artifacts() {
        let json = artifact(json!([
            {
                "type": "constructor",
                "inputs": [],
                "stateMutability": "nonpayable",
            },
            {
                "type": "function",
                "name": "transfer",
                "inputs": [
                    { "name": "to", "type": "address" },
                    { "name": "value", "type": "uint256" }
                ],
                "outputs": [{ "name": "", "type": "bool" }],
                "stateMutability": "nonpayable"
            },
            {
                "type": "event",
                "name": "Transfer",
                "anonymous": false,
                "inputs": [
                    { "indexed": true, "name": "from", "type": "address" },
                    { "indexed": true, "name": "to", "type": "address" },
                    { "indexed": false, "name": "value", "type": "uint256" }
                ]
            },
            { "type": "error", "name": "Unauthorized", "inputs": [] },
            { "type": "receive", "stateMutability": "payable" }
        ]));

        let artifact = ContractArtifact::from_json(&json).unwrap();
        assert_eq!(
            artifact.fully_qualified_name(),
            "contracts/facets/FooFacet.sol:FooFacet"
        );
        let bytecode = artifact.bytecode().unwrap().unwrap();
        assert_eq!(bytecode.to_vec(), vec![0x60, 0x80]);

        let declarations = artifact.declarations().unwrap();
        let signatures: Vec<&str> =
            declarations.iter().map(Declaration::signature).collect();
        assert_eq!(
            signatures,
            [
                "transfer(address,uint256)",
                "Transfer(address,address,uint256)",
                "Unauthorized()",
            ]
        );
        assert_eq!(
            declarations[0].selector(),
            Some(signature::selector("transfer(address,uint256)"))
        );
        assert_eq!(declarations[1].origin(), artifact.fully_qualified_name());
        assert_eq!(declarations[1].abi_item(), artifact.abi[2]);
    }

    #[test]
    fn expands_tuple_components() {
        let json = artifact(json!([{
            "type": "function",
            "name": "diamondCut",
            "inputs": [
                {
                    "name": "cuts",
                    "type": "tuple[]",
                    "components": [
                        { "name": "facetAddress", "type": "address" },
                        { "name": "action", "type": "uint8" },
                        { "name": "functionSelectors", "type": "bytes4[]" }
                    ]
                },
                { "name": "init", "type": "address" },
                { "name": "initCalldata", "type": "bytes" }
            ]
        }]));

        let declarations =
            ContractArtifact::from_json(&json).unwrap().declarations().unwrap();
        assert_eq!(
            declarations[0].signature(),
            "diamondCut((address,uint8,bytes4[])[],address,bytes)"
        );
    }

    #[test]
    fn honours_declaring_unit() {
        let json = artifact(json!([{
            "type": "function",
            "name": "owner",
            "inputs": [],
            "declaredIn": "contracts/libraries/LibOwnable.sol:LibOwnable"
        }]));

        let declarations =
            ContractArtifact::from_json(&json).unwrap().declarations().unwrap();
        assert_eq!(
            declarations[0].declaring_unit(),
            "contracts/libraries/LibOwnable.sol:LibOwnable"
        );
    }

    #[test]
    fn interfaces_have_no_bytecode() {
        let mut artifact =
            ContractArtifact::from_json(&artifact(json!([]))).unwrap();
        artifact.bytecode = Some("0x".to_string());
        assert_eq!(artifact.bytecode().unwrap(), None);

        artifact.bytecode = Some("0xzz".to_string());
        assert!(matches!(artifact.bytecode(), Err(Error::Artifact(_))));
    }

    #[test]
    fn rejects_malformed_items() {
        let json = artifact(json!([{ "type": "function", "inputs": [] }]));
        let err = ContractArtifact::from_json(&json)
            .unwrap()
            .declarations()
            .unwrap_err();
        assert!(matches!(err, Error::Artifact(_)));
    }

    #[test]
    fn writes_combined_interface() {
        let origin = "contracts/facets/FooFacet.sol:FooFacet";
        let interface = CombinedInterface {
            name: "Game".to_string(),
            declarations: vec![
                Declaration::function("foo", &["uint"], origin).unwrap(),
                Declaration::event("Foo", &[] as &[&str], origin).unwrap(),
            ],
        };

        let combined = ContractArtifact::combined(&interface);
        let json: Value =
            serde_json::from_str(&combined.to_json().unwrap()).unwrap();
        assert_eq!(json["contractName"], "Game");
        assert_eq!(json["abi"].as_array().unwrap().len(), 2);
        assert_eq!(json["abi"][0]["inputs"][0]["type"], "uint256");
        assert!(json.get("bytecode").is_none());
    }
}
