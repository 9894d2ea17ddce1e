//! Declarations exposed by facets and the combined interface built from them.
use alloy_primitives::{Address, Selector, B256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{error::Result, signature};

/// The kind of an ABI declaration.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    /// A callable function. The only kind that takes part in dispatch.
    Function,
    /// An event.
    Event,
    /// A custom error.
    Error,
}

impl core::fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            DeclarationKind::Function => "function",
            DeclarationKind::Event => "event",
            DeclarationKind::Error => "error",
        })
    }
}

/// A function, event or error exposed by a facet or library.
///
/// Declarations are immutable once derived: the canonical signature and its
/// hash are computed on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    kind: DeclarationKind,
    name: String,
    inputs: Vec<String>,
    signature: String,
    hash: B256,
    origin: String,
    declared_in: String,
    abi: Option<Value>,
}

impl Declaration {
    /// Derives a declaration from its name and parameter types.
    ///
    /// # Arguments
    ///
    /// * `kind` - Whether this is a function, an event or an error.
    /// * `name` - Name of the declaration.
    /// * `inputs` - Parameter types, in order. They don't need to be
    ///   canonical.
    /// * `origin` - Fully qualified name (`path:Name`) of the facet or
    ///   library exposing the declaration.
    ///
    /// # Errors
    ///
    /// * [`crate::Error::InvalidName`] or [`crate::Error::InvalidType`] if the
    ///   signature can't be derived.
    pub fn new<S: AsRef<str>>(
        kind: DeclarationKind,
        name: &str,
        inputs: &[S],
        origin: impl Into<String>,
    ) -> Result<Self> {
        let signature = signature::signature(name, inputs)?;
        let (name, params) = signature::parse_signature(&signature)?;
        let origin = origin.into();
        Ok(Self {
            kind,
            name,
            inputs: params,
            hash: signature::signature_hash(&signature),
            signature,
            declared_in: origin.clone(),
            origin,
            abi: None,
        })
    }

    /// Shorthand for a [`DeclarationKind::Function`] declaration.
    ///
    /// # Errors
    ///
    /// * See [`Declaration::new`].
    pub fn function<S: AsRef<str>>(
        name: &str,
        inputs: &[S],
        origin: impl Into<String>,
    ) -> Result<Self> {
        Self::new(DeclarationKind::Function, name, inputs, origin)
    }

    /// Shorthand for a [`DeclarationKind::Event`] declaration.
    ///
    /// # Errors
    ///
    /// * See [`Declaration::new`].
    pub fn event<S: AsRef<str>>(
        name: &str,
        inputs: &[S],
        origin: impl Into<String>,
    ) -> Result<Self> {
        Self::new(DeclarationKind::Event, name, inputs, origin)
    }

    /// Shorthand for a [`DeclarationKind::Error`] declaration.
    ///
    /// # Errors
    ///
    /// * See [`Declaration::new`].
    pub fn error<S: AsRef<str>>(
        name: &str,
        inputs: &[S],
        origin: impl Into<String>,
    ) -> Result<Self> {
        Self::new(DeclarationKind::Error, name, inputs, origin)
    }

    /// Sets the unit (library or base contract) that declares this item,
    /// when it differs from the facet exposing it.
    #[must_use]
    pub fn declared_in(mut self, unit: impl Into<String>) -> Self {
        self.declared_in = unit.into();
        self
    }

    /// Attaches the ABI JSON element this declaration was read from.
    #[must_use]
    pub fn with_abi(mut self, item: Value) -> Self {
        self.abi = Some(item);
        self
    }

    /// Kind of the declaration.
    #[must_use]
    pub fn kind(&self) -> DeclarationKind {
        self.kind
    }

    /// Name of the declaration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical parameter types.
    #[must_use]
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Canonical signature, e.g. `transfer(address,uint256)`.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Keccak-256 hash of the signature. For events this is the topic.
    #[must_use]
    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// Dispatch selector. Only functions have one.
    #[must_use]
    pub fn selector(&self) -> Option<Selector> {
        self.is_function().then(|| self.short_id())
    }

    /// First four bytes of the signature hash, regardless of kind.
    #[must_use]
    pub fn short_id(&self) -> Selector {
        Selector::from_slice(&self.hash[..4])
    }

    /// Fully qualified name of the facet or library exposing this item.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Fully qualified name of the unit declaring this item.
    #[must_use]
    pub fn declaring_unit(&self) -> &str {
        &self.declared_in
    }

    /// Whether this is a function.
    #[must_use]
    pub fn is_function(&self) -> bool {
        self.kind == DeclarationKind::Function
    }

    /// ABI JSON element for this declaration.
    ///
    /// Returns the element it was read from if any, otherwise a minimal one
    /// with unnamed inputs.
    #[must_use]
    pub fn abi_item(&self) -> Value {
        if let Some(item) = &self.abi {
            return item.clone();
        }

        let inputs: Vec<Value> = self
            .inputs
            .iter()
            .map(|ty| json!({ "name": "", "type": ty }))
            .collect();
        match self.kind {
            DeclarationKind::Function => json!({
                "type": "function",
                "name": self.name,
                "inputs": inputs,
                "outputs": [],
                "stateMutability": "nonpayable",
            }),
            DeclarationKind::Event => json!({
                "type": "event",
                "name": self.name,
                "inputs": inputs,
                "anonymous": false,
            }),
            DeclarationKind::Error => json!({
                "type": "error",
                "name": self.name,
                "inputs": inputs,
            }),
        }
    }
}

impl core::fmt::Display for Declaration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}::{}", self.kind, self.origin, self.signature)
    }
}

/// A deployed facet and the declarations it exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facet {
    /// Stable name of the facet. Facets are diffed by name.
    pub name: String,
    /// Address the facet is deployed at.
    pub address: Address,
    /// Declarations exposed by the facet, in order.
    pub declarations: Vec<Declaration>,
}

impl Facet {
    /// Creates a new facet.
    pub fn new(
        name: impl Into<String>,
        address: Address,
        declarations: Vec<Declaration>,
    ) -> Self {
        Self { name: name.into(), address, declarations }
    }

    /// Function declarations of this facet.
    pub fn functions(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(|d| d.is_function())
    }

    /// Dispatch selectors of this facet, in declaration order and without
    /// repetitions.
    #[must_use]
    pub fn selectors(&self) -> Vec<Selector> {
        let mut selectors = Vec::new();
        for selector in self.functions().filter_map(Declaration::selector) {
            if !selectors.contains(&selector) {
                selectors.push(selector);
            }
        }
        selectors
    }
}

/// What a facet contributed to the diamond in a previous deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetRecord {
    /// Name of the facet.
    pub name: String,
    /// Address the facet was deployed at.
    pub address: Address,
    /// Selectors routed to the facet.
    pub selectors: Vec<Selector>,
}

/// The deduplicated union of the declarations of every public facet.
///
/// Rebuilt from scratch on every build, see
/// [`crate::overlap::OverlapResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedInterface {
    /// Name of the published interface.
    pub name: String,
    /// Declarations in first-seen order.
    pub declarations: Vec<Declaration>,
}

impl CombinedInterface {
    /// Declarations of `kind`.
    pub fn of_kind(
        &self,
        kind: DeclarationKind,
    ) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(move |d| d.kind() == kind)
    }

    /// Dispatch selectors of every function in the interface.
    #[must_use]
    pub fn selectors(&self) -> Vec<Selector> {
        self.declarations.iter().filter_map(Declaration::selector).collect()
    }

    /// Looks up a declaration by kind and canonical signature.
    #[must_use]
    pub fn get(
        &self,
        kind: DeclarationKind,
        signature: &str,
    ) -> Option<&Declaration> {
        self.of_kind(kind).find(|d| d.signature() == signature)
    }

    /// ABI JSON array of the interface.
    #[must_use]
    pub fn abi(&self) -> Value {
        Value::Array(
            self.declarations.iter().map(Declaration::abi_item).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "contracts/facets/FooFacet.sol:FooFacet";

    #[test]
    fn only_functions_have_selectors() {
        let transfer =
            Declaration::function("transfer", &["address", "uint"], ORIGIN)
                .unwrap();
        let event = Declaration::event(
            "Transfer",
            &["address", "address", "uint256"],
            ORIGIN,
        )
        .unwrap();
        let error = Declaration::error("Unauthorized", &["address"], ORIGIN)
            .unwrap();

        assert_eq!(transfer.signature(), "transfer(address,uint256)");
        assert_eq!(transfer.inputs(), ["address", "uint256"]);
        assert!(transfer.selector().is_some());
        assert_eq!(event.selector(), None);
        assert_eq!(error.selector(), None);
        assert_eq!(event.hash(), signature::signature_hash(event.signature()));
    }

    #[test]
    fn declaring_unit_defaults_to_origin() {
        let shared = Declaration::function("owner", &[] as &[&str], ORIGIN)
            .unwrap();
        assert_eq!(shared.declaring_unit(), ORIGIN);

        let shared =
            shared.declared_in("contracts/libraries/LibOwner.sol:LibOwner");
        assert_eq!(shared.origin(), ORIGIN);
        assert_eq!(
            shared.declaring_unit(),
            "contracts/libraries/LibOwner.sol:LibOwner"
        );
    }

    #[test]
    fn facet_selectors_skip_events_and_repetitions() {
        let facet = Facet::new(
            "FooFacet",
            Address::repeat_byte(0xaa),
            vec![
                Declaration::function("foo", &[] as &[&str], ORIGIN).unwrap(),
                Declaration::event("Foo", &[] as &[&str], ORIGIN).unwrap(),
                Declaration::function("bar", &["uint"], ORIGIN).unwrap(),
                Declaration::function("foo", &[] as &[&str], ORIGIN).unwrap(),
            ],
        );

        assert_eq!(
            facet.selectors(),
            vec![
                signature::selector("foo()"),
                signature::selector("bar(uint256)")
            ]
        );
    }

    #[test]
    fn synthesizes_abi_items() {
        let item =
            Declaration::event("Foo", &["uint"], ORIGIN).unwrap().abi_item();
        assert_eq!(item["type"], "event");
        assert_eq!(item["inputs"][0]["type"], "uint256");

        let raw = json!({ "type": "function", "name": "foo", "inputs": [] });
        let foo = Declaration::function("foo", &[] as &[&str], ORIGIN)
            .unwrap()
            .with_abi(raw.clone());
        assert_eq!(foo.abi_item(), raw);
    }
}
