//! Multi-facet upgrades.
//!
//! An [`UpgradeBatch`] collects the changes of every facet in a deployment
//! group, plans them together against one snapshot of the diamond and hands
//! the combined cut list over for a single atomic `diamondCut` call.
use std::collections::{BTreeMap, HashMap};

use alloy_primitives::Selector;
use tracing::{debug, info, warn};

use crate::{
    cut::{Cut, CutAction},
    diamond::DiamondState,
    error::{Collision, CollisionKind, Error, Result},
    interface::FacetRecord,
    planner::{FacetChange, FacetCutPlanner, FacetPlan},
};

/// Lifecycle of an [`UpgradeBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Accepting facet changes.
    Collecting,
    /// Planned and checked; cuts are available.
    Validated,
    /// Cuts were handed over for the upgrade call.
    Applied,
    /// Validation failed. Terminal.
    Aborted,
}

impl core::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            BatchStatus::Collecting => "collecting",
            BatchStatus::Validated => "validated",
            BatchStatus::Applied => "applied",
            BatchStatus::Aborted => "aborted",
        })
    }
}

/// The changes of every facet in one upgrade.
#[derive(Debug, Clone)]
pub struct UpgradeBatch {
    status: BatchStatus,
    snapshot: DiamondState,
    previous: BTreeMap<String, FacetRecord>,
    changes: Vec<FacetChange>,
    plans: Vec<FacetPlan>,
    projected: Option<DiamondState>,
    trust_records: bool,
}

impl UpgradeBatch {
    /// Starts collecting changes.
    ///
    /// # Arguments
    ///
    /// * `snapshot` - The diamond as it is right now.
    /// * `previous` - Facet records of the previous deployment.
    pub fn new(
        snapshot: DiamondState,
        previous: impl IntoIterator<Item = FacetRecord>,
    ) -> Self {
        Self {
            status: BatchStatus::Collecting,
            snapshot,
            previous: previous
                .into_iter()
                .map(|r| (r.name.clone(), r))
                .collect(),
            changes: Vec::new(),
            plans: Vec::new(),
            projected: None,
            trust_records: false,
        }
    }

    /// Marks the snapshot as rebuilt from the previous records rather than
    /// read from the diamond. See [`FacetCutPlanner::trusting_records`].
    #[must_use]
    pub fn trusting_records(mut self) -> Self {
        self.trust_records = true;
        self
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> BatchStatus {
        self.status
    }

    /// Adds the change of one facet.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidTransition`] if the batch is no longer collecting.
    /// * [`Error::DuplicateFacet`] if the facet already has a change in this
    ///   batch.
    pub fn collect(&mut self, change: FacetChange) -> Result<()> {
        self.expect(BatchStatus::Collecting, "collect into")?;
        if self.changes.iter().any(|c| c.name() == change.name()) {
            return Err(Error::DuplicateFacet(change.name().to_string()));
        }

        debug!(facet = change.name(), "collected facet change");
        self.changes.push(change);
        Ok(())
    }

    /// Plans every collected change and checks the result.
    ///
    /// Selectors removed by one facet are free for the others, so functions
    /// can move between facets. Any failure aborts the batch.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidTransition`] if the batch is not collecting.
    /// * Any error of [`FacetCutPlanner::plan`].
    /// * [`Error::IllegitimateCollision`] if two facets of the batch claim the
    ///   same selector.
    /// * [`Error::Cut`] if the diamond would reject the combined cuts.
    pub fn validate(&mut self) -> Result<()> {
        self.expect(BatchStatus::Collecting, "validate")?;

        match self.plan() {
            Ok((plans, projected)) => {
                info!(
                    facets = plans.len(),
                    cuts = plans.iter().map(|p| p.cuts.len()).sum::<usize>(),
                    "upgrade batch validated"
                );
                self.plans = plans;
                self.projected = Some(projected);
                self.status = BatchStatus::Validated;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "upgrade batch aborted");
                self.status = BatchStatus::Aborted;
                Err(e)
            }
        }
    }

    fn plan(&self) -> Result<(Vec<FacetPlan>, DiamondState)> {
        let base = if self.trust_records {
            FacetCutPlanner::new().trusting_records()
        } else {
            FacetCutPlanner::new()
        };
        let released = self.changes.iter().flat_map(|change| {
            let previous = self.previous.get(change.name());
            base.removals(&self.snapshot, previous, change)
        });
        let planner = base.clone().releasing(released);

        let plans = self
            .changes
            .iter()
            .map(|change| {
                let previous = self.previous.get(change.name());
                planner.plan(&self.snapshot, previous, change)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut claimed: HashMap<Selector, &str> = HashMap::new();
        let mut collisions = Vec::new();
        for plan in &plans {
            let routed = plan
                .cuts
                .iter()
                .filter(|cut| cut.action != CutAction::Remove)
                .flat_map(|cut| &cut.selectors);
            for &selector in routed {
                if let Some(existing) = claimed.insert(selector, &plan.name) {
                    collisions.push(Collision {
                        kind: CollisionKind::Claimed,
                        selector,
                        existing: existing.to_string(),
                        incoming: plan.name.clone(),
                    });
                }
            }
        }
        if !collisions.is_empty() {
            return Err(Error::IllegitimateCollision(collisions));
        }

        let mut projected = self.snapshot.clone();
        projected.apply(&ordered(&plans))?;
        for change in &self.changes {
            if let FacetChange::Upsert(facet) = change {
                for declaration in &facet.declarations {
                    if !declaration.is_function() {
                        projected.record_informational(declaration.signature());
                    }
                }
            }
        }

        Ok((plans, projected))
    }

    /// Per-facet plans. Empty until validated.
    #[must_use]
    pub fn plans(&self) -> &[FacetPlan] {
        &self.plans
    }

    /// The combined cut list: every Remove, then every Replace, then every
    /// Add. Empty unless the batch is validated or applied.
    #[must_use]
    pub fn cuts(&self) -> Vec<Cut> {
        match self.status {
            BatchStatus::Validated | BatchStatus::Applied => {
                ordered(&self.plans)
            }
            BatchStatus::Collecting | BatchStatus::Aborted => Vec::new(),
        }
    }

    /// Hands the combined cut list over for the upgrade call.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidTransition`] if the batch is not validated.
    pub fn take_cuts(&mut self) -> Result<Vec<Cut>> {
        self.expect(BatchStatus::Validated, "apply")?;
        self.status = BatchStatus::Applied;
        Ok(ordered(&self.plans))
    }

    /// Facet records after the upgrade: untouched previous records plus the
    /// records of every upserted facet, sorted by name. Retired facets are
    /// left out.
    #[must_use]
    pub fn records(&self) -> Vec<FacetRecord> {
        let mut records = self.previous.clone();
        for plan in &self.plans {
            match &plan.record {
                Some(record) => {
                    records.insert(plan.name.clone(), record.clone())
                }
                None => records.remove(&plan.name),
            };
        }
        records.into_values().collect()
    }

    /// The diamond as it will be after the upgrade call. Only available once
    /// validated.
    #[must_use]
    pub fn projected_state(&self) -> Option<&DiamondState> {
        self.projected.as_ref()
    }

    fn expect(&self, status: BatchStatus, action: &'static str) -> Result<()> {
        if self.status == status {
            Ok(())
        } else {
            Err(Error::InvalidTransition { action, status: self.status })
        }
    }
}

fn ordered(plans: &[FacetPlan]) -> Vec<Cut> {
    let mut cuts = Vec::new();
    for action in [CutAction::Remove, CutAction::Replace, CutAction::Add] {
        cuts.extend(
            plans
                .iter()
                .flat_map(|plan| &plan.cuts)
                .filter(|cut| cut.action == action)
                .cloned(),
        );
    }
    cuts
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Address;
    use proptest::prelude::*;

    use super::*;
    use crate::interface::{Declaration, Facet};

    const ORIGIN: &str = "contracts/facets/Facet.sol:Facet";

    const A: Address = Address::repeat_byte(0x0a);
    const B: Address = Address::repeat_byte(0x0b);
    const C: Address = Address::repeat_byte(0x0c);

    fn facet(name: &str, address: Address, functions: &[&str]) -> Facet {
        let declarations = functions
            .iter()
            .map(|f| Declaration::function(f, &[] as &[&str], ORIGIN).unwrap())
            .collect();
        Facet::new(name, address, declarations)
    }

    fn selectors_of(functions: &[&str]) -> Vec<Selector> {
        functions
            .iter()
            .map(|f| crate::signature::selector(&format!("{f}()")))
            .collect()
    }

    fn record(name: &str, address: Address, functions: &[&str]) -> FacetRecord {
        FacetRecord {
            name: name.to_string(),
            address,
            selectors: selectors_of(functions),
        }
    }

    fn collect(batch: &mut UpgradeBatch, facet: Facet) {
        batch.collect(FacetChange::Upsert(facet)).unwrap();
    }

    fn deployed(records: &[FacetRecord]) -> UpgradeBatch {
        UpgradeBatch::new(DiamondState::from_records(records), records.to_vec())
    }

    #[test]
    fn orders_cuts_across_facets() {
        let mut batch = deployed(&[
            record("FooFacet", A, &["one", "two"]),
            record("BazFacet", C, &["baz"]),
        ]);
        collect(&mut batch, facet("FooFacet", B, &["two", "three"]));
        collect(&mut batch, facet("BarFacet", C, &["bar"]));
        collect(&mut batch, facet("BazFacet", A, &["baz"]));
        batch.validate().unwrap();

        assert_eq!(batch.status(), BatchStatus::Validated);
        assert_eq!(
            batch.cuts(),
            vec![
                Cut::remove(selectors_of(&["one"])),
                Cut::replace(B, selectors_of(&["two"])),
                Cut::replace(A, selectors_of(&["baz"])),
                Cut::add(B, selectors_of(&["three"])),
                Cut::add(C, selectors_of(&["bar"])),
            ]
        );
    }

    #[test]
    fn moves_functions_between_facets() {
        let mut batch = deployed(&[
            record("FooFacet", A, &["foo", "shared"]),
            record("BarFacet", B, &["bar"]),
        ]);
        collect(&mut batch, facet("FooFacet", A, &["foo"]));
        collect(&mut batch, facet("BarFacet", B, &["bar", "shared"]));
        batch.validate().unwrap();

        assert_eq!(
            batch.cuts(),
            vec![
                Cut::remove(selectors_of(&["shared"])),
                Cut::add(B, selectors_of(&["shared"])),
            ]
        );
        let projected = batch.projected_state().unwrap();
        let shared = selectors_of(&["shared"])[0];
        assert_eq!(projected.facet_address(&shared), Some(B));
    }

    #[test]
    fn rejects_selector_claimed_by_two_facets() {
        let mut batch = deployed(&[]);
        collect(&mut batch, facet("FooFacet", A, &["foo", "dup"]));
        collect(&mut batch, facet("BarFacet", B, &["dup"]));

        let err = batch.validate().unwrap_err();
        let Error::IllegitimateCollision(collisions) = err else {
            panic!("expected a collision, got {err:?}");
        };
        assert_eq!(collisions[0].existing, "FooFacet");
        assert_eq!(collisions[0].incoming, "BarFacet");
        assert_eq!(batch.status(), BatchStatus::Aborted);
        assert!(batch.cuts().is_empty());
    }

    #[test]
    fn rejects_distinct_signatures_sharing_a_selector() {
        let burn = Declaration::function("burn", &["uint256"], ORIGIN).unwrap();
        let name = "collate_propagate_storage";
        let collate =
            Declaration::function(name, &["bytes16"], ORIGIN).unwrap();
        assert_eq!(burn.selector(), collate.selector());

        let mut batch = deployed(&[]);
        collect(&mut batch, Facet::new("FooFacet", A, vec![burn]));
        collect(&mut batch, Facet::new("BarFacet", B, vec![collate]));

        let err = batch.validate().unwrap_err();
        let Error::IllegitimateCollision(collisions) = err else {
            panic!("expected a collision, got {err:?}");
        };
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].kind, CollisionKind::Claimed);
        assert_eq!(
            collisions[0].selector,
            crate::signature::selector("burn(uint256)")
        );
        assert_eq!(collisions[0].existing, "FooFacet");
        assert_eq!(collisions[0].incoming, "BarFacet");
        assert_eq!(batch.status(), BatchStatus::Aborted);
    }

    #[test]
    fn re_adds_selectors_missing_from_the_diamond() {
        // The diamond lost `bar` behind the record's back.
        let previous = vec![record("FooFacet", A, &["foo", "bar"])];
        let snapshot =
            DiamondState::from_records([&record("FooFacet", A, &["foo"])]);

        let mut batch = UpgradeBatch::new(snapshot.clone(), previous.clone());
        collect(&mut batch, facet("FooFacet", B, &["foo", "bar"]));
        batch.validate().unwrap();
        assert_eq!(
            batch.cuts(),
            vec![
                Cut::replace(B, selectors_of(&["foo"])),
                Cut::add(B, selectors_of(&["bar"])),
            ]
        );

        let mut batch = UpgradeBatch::new(snapshot.clone(), previous.clone());
        collect(&mut batch, facet("FooFacet", A, &["foo", "bar"]));
        batch.validate().unwrap();
        assert_eq!(batch.cuts(), vec![Cut::add(A, selectors_of(&["bar"]))]);
        let projected = batch.projected_state().unwrap();
        let bar = selectors_of(&["bar"])[0];
        assert_eq!(projected.facet_address(&bar), Some(A));

        let mut batch =
            UpgradeBatch::new(snapshot, previous).trusting_records();
        collect(&mut batch, facet("FooFacet", B, &["foo", "bar"]));
        assert!(matches!(batch.validate(), Err(Error::Cut(_))));
    }

    #[test]
    fn aborts_on_ambiguous_removal() {
        let mut batch = deployed(&[record("FooFacet", A, &["foo"])]);
        collect(&mut batch, facet("FooFacet", A, &[]));

        assert!(matches!(
            batch.validate(),
            Err(Error::AmbiguousRemoval { .. })
        ));
        assert_eq!(batch.status(), BatchStatus::Aborted);
        assert!(matches!(
            batch.take_cuts(),
            Err(Error::InvalidTransition { status: BatchStatus::Aborted, .. })
        ));
    }

    #[test]
    fn retires_facets() {
        let mut batch = deployed(&[
            record("FooFacet", A, &["foo"]),
            record("OldFacet", B, &["old", "older"]),
        ]);
        batch
            .collect(FacetChange::Retire { name: "OldFacet".to_string() })
            .unwrap();
        batch.validate().unwrap();

        assert_eq!(
            batch.cuts(),
            vec![Cut::remove(selectors_of(&["old", "older"]))]
        );
        assert_eq!(batch.records(), vec![record("FooFacet", A, &["foo"])]);
    }

    #[test]
    fn enforces_lifecycle() {
        let mut batch = deployed(&[]);
        collect(&mut batch, facet("FooFacet", A, &["foo"]));

        let err = batch
            .collect(FacetChange::Upsert(facet("FooFacet", B, &["bar"])))
            .unwrap_err();
        assert_eq!(err, Error::DuplicateFacet("FooFacet".to_string()));

        assert!(batch.cuts().is_empty());
        assert!(batch.take_cuts().is_err());

        batch.validate().unwrap();
        assert!(batch.validate().is_err());
        let retire = FacetChange::Retire { name: "X".to_string() };
        assert!(batch.collect(retire).is_err());

        let cuts = batch.take_cuts().unwrap();
        assert_eq!(cuts, vec![Cut::add(A, selectors_of(&["foo"]))]);
        assert_eq!(batch.status(), BatchStatus::Applied);
        assert_eq!(batch.cuts(), cuts);
        assert!(batch.take_cuts().is_err());
    }

    #[test]
    fn projects_informational_signatures() {
        let mut foo = facet("FooFacet", A, &["foo"]);
        let moved = Declaration::event("Moved", &["address", "uint"], ORIGIN);
        let blocked = Declaration::error("Blocked", &[] as &[&str], ORIGIN);
        foo.declarations.push(moved.unwrap());
        foo.declarations.push(blocked.unwrap());

        let mut batch = deployed(&[]);
        collect(&mut batch, foo);
        batch.validate().unwrap();

        let projected = batch.projected_state().unwrap();
        assert_eq!(projected.len(), 1);
        assert_eq!(
            projected.informational().collect::<Vec<_>>(),
            ["Blocked()", "Moved(address,uint256)"]
        );
    }

    fn names(ids: &[u8]) -> Vec<String> {
        ids.iter().map(|i| format!("f{i}")).collect()
    }

    fn upsert(name: &str, address: Address, ids: &[u8]) -> FacetChange {
        let names = names(ids);
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        FacetChange::Upsert(facet(name, address, &names))
    }

    proptest! {
        #[test]
        fn applied_batch_routes_each_selector_once(
            owners in prop::collection::vec(0u8..3, 1..24),
            next_owners in prop::collection::vec(0u8..3, 1..24),
            moved in prop::collection::vec(any::<bool>(), 3),
        ) {
            let facet_names = ["FooFacet", "BarFacet", "BazFacet"];
            let address = |i: usize, moved: bool| {
                let i = u8::try_from(i).unwrap();
                Address::with_last_byte(i * 2 + u8::from(moved) + 1)
            };

            // Function `fN` belongs to the facet picked by `owners[N]`.
            let split = |owners: &[u8]| {
                let mut ids = vec![Vec::new(); 3];
                for (id, owner) in owners.iter().enumerate() {
                    ids[usize::from(*owner)].push(u8::try_from(id).unwrap());
                }
                ids
            };
            let before = split(&owners);
            let after = split(&next_owners);

            let previous: Vec<FacetRecord> = before
                .iter()
                .enumerate()
                .map(|(i, ids)| {
                    let names = names(ids);
                    let names: Vec<&str> =
                        names.iter().map(String::as_str).collect();
                    record(facet_names[i], address(i, false), &names)
                })
                .collect();

            let mut state = DiamondState::from_records(&previous);
            let mut batch = UpgradeBatch::new(state.clone(), previous);
            for (i, ids) in after.iter().enumerate() {
                let change = if ids.is_empty() {
                    FacetChange::Retire { name: facet_names[i].to_string() }
                } else {
                    upsert(facet_names[i], address(i, moved[i]), ids)
                };
                batch.collect(change).unwrap();
            }
            batch.validate().unwrap();

            state.apply(&batch.take_cuts().unwrap()).unwrap();
            prop_assert_eq!(state.len(), next_owners.len());
            for (id, owner) in next_owners.iter().enumerate() {
                let owner = usize::from(*owner);
                let selector = crate::signature::selector(&format!("f{id}()"));
                prop_assert_eq!(
                    state.facet_address(&selector),
                    Some(address(owner, moved[owner]))
                );
            }
            let projected = batch.projected_state().unwrap();
            prop_assert_eq!(state.facets(), projected.facets());
        }
    }
}
