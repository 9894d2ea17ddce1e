//! Cut instructions and the upgrade call that carries them.
use alloy_primitives::{Address, Bytes, Selector};

/// What a [`Cut`] does to its selectors.
///
/// Discriminants match `IDiamondCut.FacetCutAction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CutAction {
    /// Route new selectors to a facet.
    Add = 0,
    /// Re-route existing selectors to a different facet.
    Replace = 1,
    /// Stop routing selectors.
    Remove = 2,
}

impl core::fmt::Display for CutAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            CutAction::Add => "Add",
            CutAction::Replace => "Replace",
            CutAction::Remove => "Remove",
        })
    }
}

/// An instruction to add, replace or remove a block of selectors.
///
/// Cuts are produced by [`crate::planner::FacetCutPlanner`], consumed once by
/// a single upgrade call, and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cut {
    /// Facet receiving the selectors. [`Address::ZERO`] for removals.
    pub facet_address: Address,
    /// What to do with the selectors.
    pub action: CutAction,
    /// Selectors affected, in order.
    pub selectors: Vec<Selector>,
}

impl Cut {
    /// Routes `selectors` to `facet`.
    #[must_use]
    pub fn add(facet: Address, selectors: Vec<Selector>) -> Self {
        Self { facet_address: facet, action: CutAction::Add, selectors }
    }

    /// Re-routes `selectors` to `facet`.
    #[must_use]
    pub fn replace(facet: Address, selectors: Vec<Selector>) -> Self {
        Self { facet_address: facet, action: CutAction::Replace, selectors }
    }

    /// Removes `selectors`. Removals always target the zero address.
    #[must_use]
    pub fn remove(selectors: Vec<Selector>) -> Self {
        Self {
            facet_address: Address::ZERO,
            action: CutAction::Remove,
            selectors,
        }
    }
}

impl core::fmt::Display for Cut {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {} [", self.action, self.facet_address)?;
        for (i, selector) in self.selectors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{selector}")?;
        }
        f.write_str("]")
    }
}

/// Arguments of a single `diamondCut` call.
///
/// After applying every cut the diamond delegate-calls `init` with
/// `calldata`, unless `init` is the zero address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeCall {
    /// Cuts to apply, in order.
    pub cuts: Vec<Cut>,
    /// Contract to delegate-call after the cuts.
    pub init: Address,
    /// Calldata for `init`.
    pub calldata: Bytes,
}

impl UpgradeCall {
    /// Creates a call that applies `cuts` without initialization.
    #[must_use]
    pub fn new(cuts: Vec<Cut>) -> Self {
        Self { cuts, init: Address::ZERO, calldata: Bytes::new() }
    }

    /// Sets the initializer and its calldata.
    #[must_use]
    pub fn with_init(mut self, init: Address, calldata: Bytes) -> Self {
        self.init = init;
        self.calldata = calldata;
        self
    }
}
