//! Computes the cuts that move one facet from its previous selectors to its
//! new ones.
use std::collections::BTreeSet;

use alloy_primitives::{Address, Selector};
use tracing::debug;

use crate::{
    cut::Cut,
    diamond::DiamondState,
    error::{Collision, CollisionKind, Error, Result},
    interface::{Facet, FacetRecord},
};

/// What should happen to a facet in an upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacetChange {
    /// Deploy or redeploy the facet with the given declarations.
    Upsert(Facet),
    /// Remove every selector the facet previously exposed.
    Retire {
        /// Name of the facet.
        name: String,
    },
}

impl FacetChange {
    /// Name of the facet this change applies to.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            FacetChange::Upsert(facet) => &facet.name,
            FacetChange::Retire { name } => name,
        }
    }
}

/// Cuts planned for a single facet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetPlan {
    /// Name of the facet.
    pub name: String,
    /// At most three cuts, ordered Remove, Replace, Add.
    pub cuts: Vec<Cut>,
    /// What to persist for the facet afterwards. `None` once retired.
    pub record: Option<FacetRecord>,
}

impl FacetPlan {
    /// Whether the facet needs no cut.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.cuts.is_empty()
    }
}

/// Diffs a facet's previous selectors against its new ones.
///
/// The planner never mutates the [`DiamondState`] it is given; it only emits
/// cuts. Selectors marked as released are treated as unrouted, which lets an
/// [`crate::batch::UpgradeBatch`] move functions between facets within one
/// upgrade.
///
/// By default the snapshot is the diamond's real routing table: a previous
/// selector it does not route is added again rather than replaced. A
/// snapshot rebuilt from deployment records is only as good as the records,
/// so [`FacetCutPlanner::trusting_records`] lets the record's address stand
/// in for missing routes instead.
#[derive(Debug, Clone, Default)]
pub struct FacetCutPlanner {
    released: BTreeSet<Selector>,
    trust_records: bool,
}

impl FacetCutPlanner {
    /// A planner that trusts the snapshot as is.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Falls back to the previous record's address for selectors the
    /// snapshot does not route.
    #[must_use]
    pub fn trusting_records(mut self) -> Self {
        self.trust_records = true;
        self
    }

    /// Treats `selectors` as free, because some other facet of the same
    /// upgrade removes them first.
    #[must_use]
    pub fn releasing(
        mut self,
        selectors: impl IntoIterator<Item = Selector>,
    ) -> Self {
        self.released.extend(selectors);
        self
    }

    /// Selectors `change` would remove from the diamond.
    ///
    /// Previous selectors that the diamond now routes to an unrelated facet
    /// are left alone, and so are the ones it no longer routes at all unless
    /// the planner trusts records.
    #[must_use]
    pub fn removals(
        &self,
        state: &DiamondState,
        previous: Option<&FacetRecord>,
        change: &FacetChange,
    ) -> Vec<Selector> {
        let Some(previous) = previous else {
            return Vec::new();
        };

        let keep = match change {
            FacetChange::Upsert(facet) => facet.selectors(),
            FacetChange::Retire { .. } => Vec::new(),
        };

        previous
            .selectors
            .iter()
            .filter(|selector| !keep.contains(selector))
            .filter(|selector| match state.facet_address(selector) {
                Some(owner) if owner != previous.address => {
                    debug!(
                        facet = change.name(),
                        %selector,
                        %owner,
                        "selector moved to another facet, not removing"
                    );
                    false
                }
                None if !self.trust_records => {
                    debug!(
                        facet = change.name(),
                        %selector,
                        "selector not routed, not removing"
                    );
                    false
                }
                _ => true,
            })
            .copied()
            .collect()
    }

    /// Plans the cuts for a single facet.
    ///
    /// # Arguments
    ///
    /// * `&self` - The planner.
    /// * `state` - Snapshot of the diamond. Empty for a first deployment.
    /// * `previous` - What the facet contributed to the previous deployment,
    ///   if it was deployed before.
    /// * `change` - The new facet, or its retirement.
    ///
    /// # Errors
    ///
    /// * [`Error::ZeroFacetAddress`] if the facet has selectors but the zero
    ///   address.
    /// * [`Error::AmbiguousRemoval`] if the facet previously had selectors,
    ///   now has none and is not being retired.
    /// * [`Error::IllegitimateCollision`] if a new selector is already routed
    ///   to another facet.
    pub fn plan(
        &self,
        state: &DiamondState,
        previous: Option<&FacetRecord>,
        change: &FacetChange,
    ) -> Result<FacetPlan> {
        let name = change.name().to_string();
        let to_remove = self.removals(state, previous, change);

        let FacetChange::Upsert(facet) = change else {
            return Ok(FacetPlan {
                name,
                cuts: cut_if_any(to_remove, Cut::remove).into_iter().collect(),
                record: None,
            });
        };

        let selectors = facet.selectors();
        let previous_selectors =
            previous.map(|p| p.selectors.as_slice()).unwrap_or_default();
        if selectors.is_empty() && !previous_selectors.is_empty() {
            return Err(Error::AmbiguousRemoval { facet: name });
        }
        if facet.address.is_zero() && !selectors.is_empty() {
            return Err(Error::ZeroFacetAddress { facet: name });
        }

        let previous_address = previous.map(|p| p.address);
        let mut to_replace = Vec::new();
        let mut to_add = Vec::new();
        let mut collisions = Vec::new();

        for &selector in &selectors {
            let owner = self.owner(state, &selector);
            if previous_selectors.contains(&selector) {
                let current = if self.trust_records {
                    owner.or(previous_address)
                } else {
                    owner
                };
                match current {
                    None => to_add.push(selector),
                    Some(current) if current == facet.address => {}
                    Some(current)
                        if owner.is_some()
                            && Some(current) != previous_address =>
                    {
                        collisions.push(claimed(selector, current, facet));
                    }
                    _ => to_replace.push(selector),
                }
            } else {
                match owner {
                    None => to_add.push(selector),
                    Some(owner) if owner == facet.address => {}
                    Some(owner) if Some(owner) == previous_address => {
                        to_replace.push(selector);
                    }
                    Some(owner) => {
                        collisions.push(claimed(selector, owner, facet));
                    }
                }
            }
        }

        if !collisions.is_empty() {
            return Err(Error::IllegitimateCollision(collisions));
        }

        let address = facet.address;
        let cuts = [
            cut_if_any(to_remove, Cut::remove),
            cut_if_any(to_replace, |s| Cut::replace(address, s)),
            cut_if_any(to_add, |s| Cut::add(address, s)),
        ]
        .into_iter()
        .flatten()
        .collect();

        Ok(FacetPlan {
            name: name.clone(),
            cuts,
            record: Some(FacetRecord { name, address, selectors }),
        })
    }

    fn owner(
        &self,
        state: &DiamondState,
        selector: &Selector,
    ) -> Option<Address> {
        if self.released.contains(selector) {
            None
        } else {
            state.facet_address(selector)
        }
    }
}

fn claimed(selector: Selector, owner: Address, facet: &Facet) -> Collision {
    Collision {
        kind: CollisionKind::Claimed,
        selector,
        existing: owner.to_string(),
        incoming: format!("{} ({})", facet.name, facet.address),
    }
}

fn cut_if_any(
    selectors: Vec<Selector>,
    cut: impl FnOnce(Vec<Selector>) -> Cut,
) -> Option<Cut> {
    (!selectors.is_empty()).then(|| cut(selectors))
}
