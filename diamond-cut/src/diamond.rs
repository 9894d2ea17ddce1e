//! The selector mapping of a diamond and a reference implementation of the
//! `diamondCut` upgrade call.
//!
//! [`DiamondState`] mirrors what the on-chain proxy stores: every dispatch
//! selector maps to exactly one facet address. Planning only ever reads a
//! snapshot of it; [`DiamondState::diamond_cut`] is the single mutator and it
//! is atomic, either every cut applies or none does.
use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{Address, Selector};
use alloy_sol_types::SolError;

use crate::{
    abi::{
        CannotAddFunctionToDiamondThatAlreadyExists,
        CannotAddSelectorsToZeroAddress, CannotRemoveFunctionThatDoesNotExist,
        CannotReplaceFunctionThatDoesNotExists,
        CannotReplaceFunctionWithTheSameFunctionFromTheSameFacet,
        CannotReplaceFunctionsFromFacetWithZeroAddress, FunctionNotFound,
        InitAddressZeroButCalldataNotEmpty, InitializationFunctionReverted,
        NoSelectorsProvidedForFacetForCut, RemoveFacetAddressMustBeZeroAddress,
    },
    cut::{Cut, CutAction, UpgradeCall},
    interface::FacetRecord,
};

/// A revert of the `diamondCut` call or of the diamond fallback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CutError {
    /// A cut carried no selectors.
    #[error("no selectors provided for facet {} cut", .0.facet)]
    NoSelectors(NoSelectorsProvidedForFacetForCut),
    /// An `Add` cut targeted the zero address.
    #[error("cannot add selectors to the zero address")]
    AddToZeroAddress(CannotAddSelectorsToZeroAddress),
    /// An `Add` cut included a selector that is already routed.
    #[error("cannot add selector {} that already exists", .0.selector)]
    AlreadyExists(CannotAddFunctionToDiamondThatAlreadyExists),
    /// A `Replace` cut targeted the zero address.
    #[error("cannot replace selectors with the zero address")]
    ReplaceWithZeroAddress(CannotReplaceFunctionsFromFacetWithZeroAddress),
    /// A `Replace` cut targeted the facet the selector is already routed to.
    #[error("selector {} is already routed to that facet", .0.selector)]
    SameFacet(CannotReplaceFunctionWithTheSameFunctionFromTheSameFacet),
    /// A `Replace` cut included a selector that is not routed.
    #[error("cannot replace selector {} that does not exist", .0.selector)]
    ReplaceMissing(CannotReplaceFunctionThatDoesNotExists),
    /// A `Remove` cut targeted a non-zero address.
    #[error("remove cut must target the zero address, got {}", .0.facet)]
    RemoveFromFacet(RemoveFacetAddressMustBeZeroAddress),
    /// A `Remove` cut included a selector that is not routed.
    #[error("cannot remove selector {} that does not exist", .0.selector)]
    RemoveMissing(CannotRemoveFunctionThatDoesNotExist),
    /// Initialization calldata was given without an initializer.
    #[error("init address is zero but calldata is not empty")]
    CalldataWithoutInit(InitAddressZeroButCalldataNotEmpty),
    /// The fallback was called with an unknown selector.
    #[error("function {} does not exist", .0.selector)]
    FunctionNotFound(FunctionNotFound),
    /// The initialization call reverted.
    #[error("initializer {} reverted", .0.initializationContractAddress)]
    InitReverted(InitializationFunctionReverted),
}

impl CutError {
    /// ABI-encoded revert data, as the diamond would return it.
    #[must_use]
    pub fn revert_data(&self) -> Vec<u8> {
        match self {
            CutError::NoSelectors(e) => e.abi_encode(),
            CutError::AddToZeroAddress(e) => e.abi_encode(),
            CutError::AlreadyExists(e) => e.abi_encode(),
            CutError::ReplaceWithZeroAddress(e) => e.abi_encode(),
            CutError::SameFacet(e) => e.abi_encode(),
            CutError::ReplaceMissing(e) => e.abi_encode(),
            CutError::RemoveFromFacet(e) => e.abi_encode(),
            CutError::RemoveMissing(e) => e.abi_encode(),
            CutError::CalldataWithoutInit(e) => e.abi_encode(),
            CutError::FunctionNotFound(e) => e.abi_encode(),
            CutError::InitReverted(e) => e.abi_encode(),
        }
    }
}

/// Mapping of dispatch selectors to facet addresses.
///
/// Also keeps a purely informational set of event and error signatures that
/// facets routed through the diamond declare. Those never take part in
/// dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiamondState {
    selectors: BTreeMap<Selector, Address>,
    informational: BTreeSet<String>,
}

impl DiamondState {
    /// An empty diamond.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a snapshot from facet records.
    ///
    /// Later records win when two of them list the same selector.
    #[must_use]
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a FacetRecord>,
    ) -> Self {
        let mut state = Self::new();
        for record in records {
            for selector in &record.selectors {
                state.selectors.insert(*selector, record.address);
            }
        }
        state
    }

    /// Rebuilds a snapshot from the output of the loupe `facets()` call.
    #[must_use]
    pub fn from_facets(
        facets: impl IntoIterator<Item = (Address, Vec<Selector>)>,
    ) -> Self {
        let mut state = Self::new();
        for (address, selectors) in facets {
            for selector in selectors {
                state.selectors.insert(selector, address);
            }
        }
        state
    }

    /// Facet a selector is routed to.
    #[must_use]
    pub fn facet_address(&self, selector: &Selector) -> Option<Address> {
        self.selectors.get(selector).copied()
    }

    /// Selectors routed to `facet`.
    #[must_use]
    pub fn facet_selectors(&self, facet: Address) -> Vec<Selector> {
        self.selectors
            .iter()
            .filter(|(_, address)| **address == facet)
            .map(|(selector, _)| *selector)
            .collect()
    }

    /// Every facet and its selectors, as the loupe `facets()` reports them.
    #[must_use]
    pub fn facets(&self) -> BTreeMap<Address, Vec<Selector>> {
        let mut facets: BTreeMap<Address, Vec<Selector>> = BTreeMap::new();
        for (selector, address) in &self.selectors {
            facets.entry(*address).or_default().push(*selector);
        }
        facets
    }

    /// Number of routed selectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    /// Whether no selector is routed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Remembers an event or error signature for the published interface.
    pub fn record_informational(&mut self, signature: impl Into<String>) {
        self.informational.insert(signature.into());
    }

    /// Event and error signatures recorded so far.
    pub fn informational(&self) -> impl Iterator<Item = &str> {
        self.informational.iter().map(String::as_str)
    }

    /// Facet the diamond fallback would delegate `calldata` to.
    ///
    /// # Errors
    ///
    /// * [`CutError::FunctionNotFound`] if no facet handles the selector in
    ///   `calldata`.
    pub fn route(&self, calldata: &[u8]) -> Result<Address, CutError> {
        let mut selector = Selector::ZERO;
        let len = calldata.len().min(4);
        selector[..len].copy_from_slice(&calldata[..len]);
        self.facet_address(&selector).ok_or(CutError::FunctionNotFound(
            FunctionNotFound { selector },
        ))
    }

    /// Executes a `diamondCut` call.
    ///
    /// Initialization is not simulated; only the init address and calldata
    /// are checked for consistency.
    ///
    /// # Errors
    ///
    /// * [`CutError::CalldataWithoutInit`] if `call.init` is zero but
    ///   calldata is given.
    /// * Any error of [`DiamondState::apply`].
    pub fn diamond_cut(&mut self, call: &UpgradeCall) -> Result<(), CutError> {
        if call.init.is_zero() && !call.calldata.is_empty() {
            return Err(CutError::CalldataWithoutInit(
                InitAddressZeroButCalldataNotEmpty {
                    data: call.calldata.clone(),
                },
            ));
        }
        self.apply(&call.cuts)
    }

    /// Applies `cuts` in order. Nothing changes if any cut reverts.
    ///
    /// # Errors
    ///
    /// * [`CutError::NoSelectors`] if a cut has no selectors.
    /// * [`CutError::AddToZeroAddress`] or [`CutError::AlreadyExists`] for
    ///   an invalid `Add`.
    /// * [`CutError::ReplaceWithZeroAddress`], [`CutError::ReplaceMissing`]
    ///   or [`CutError::SameFacet`] for an invalid `Replace`.
    /// * [`CutError::RemoveFromFacet`] or [`CutError::RemoveMissing`] for an
    ///   invalid `Remove`.
    pub fn apply(&mut self, cuts: &[Cut]) -> Result<(), CutError> {
        let mut next = self.selectors.clone();
        for cut in cuts {
            let facet = cut.facet_address;
            if cut.selectors.is_empty() {
                return Err(CutError::NoSelectors(
                    NoSelectorsProvidedForFacetForCut { facet },
                ));
            }

            match cut.action {
                CutAction::Add => {
                    if facet.is_zero() {
                        return Err(CutError::AddToZeroAddress(
                            CannotAddSelectorsToZeroAddress {
                                selectors: cut.selectors.clone(),
                            },
                        ));
                    }
                    for &selector in &cut.selectors {
                        if next.insert(selector, facet).is_some() {
                            return Err(CutError::AlreadyExists(
                                CannotAddFunctionToDiamondThatAlreadyExists {
                                    selector,
                                },
                            ));
                        }
                    }
                }
                CutAction::Replace => {
                    if facet.is_zero() {
                        return Err(CutError::ReplaceWithZeroAddress(
                            CannotReplaceFunctionsFromFacetWithZeroAddress {
                                selectors: cut.selectors.clone(),
                            },
                        ));
                    }
                    for &selector in &cut.selectors {
                        match next.get_mut(&selector) {
                            None => {
                                return Err(CutError::ReplaceMissing(
                                    CannotReplaceFunctionThatDoesNotExists {
                                        selector,
                                    },
                                ))
                            }
                            Some(current) if *current == facet => {
                                return Err(CutError::SameFacet(
                                    CannotReplaceFunctionWithTheSameFunctionFromTheSameFacet {
                                        selector,
                                    },
                                ))
                            }
                            Some(current) => *current = facet,
                        }
                    }
                }
                CutAction::Remove => {
                    if !facet.is_zero() {
                        return Err(CutError::RemoveFromFacet(
                            RemoveFacetAddressMustBeZeroAddress { facet },
                        ));
                    }
                    for &selector in &cut.selectors {
                        if next.remove(&selector).is_none() {
                            return Err(CutError::RemoveMissing(
                                CannotRemoveFunctionThatDoesNotExist { selector },
                            ));
                        }
                    }
                }
            }
        }

        self.selectors = next;
        Ok(())
    }
}
