//! Merges the declarations of many facets into one combined interface.
//!
//! Facets routinely compile the same events and errors from shared
//! libraries, so those look like duplicates but are legitimate and collapse to
//! a single entry. Functions are different: a selector can only be routed to
//! one facet, so two functions sharing a selector are an illegitimate
//! collision unless they are literally the same declaration inherited from
//! the same unit.
use std::collections::HashMap;

use alloy_primitives::Selector;
use tracing::debug;

use crate::{
    error::{Collision, CollisionKind, Error, Result},
    interface::{CombinedInterface, Declaration, DeclarationKind},
};

mod classifier;

pub use classifier::{
    Classifier, ExcludeSignatures, IncludePatterns, Verdict,
};

/// Why a declaration was left out of the combined interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Same declaration as one already kept.
    Duplicate,
    /// Collides with a kept declaration. Only reported in non-strict mode.
    Collision(Collision),
    /// Dropped by a classifier.
    Filtered,
}

/// A declaration left out of the combined interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    /// The declaration.
    pub declaration: Declaration,
    /// Why it was rejected.
    pub reason: Rejection,
}

/// Output of [`OverlapResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The deduplicated interface.
    pub interface: CombinedInterface,
    /// Every declaration that did not make it, in input order.
    pub rejected: Vec<Rejected>,
}

/// Classifies declarations as unique, legitimately duplicated or colliding and
/// builds the combined interface.
pub struct OverlapResolver {
    strict: bool,
    filters: Vec<Box<dyn Classifier>>,
}

impl Default for OverlapResolver {
    fn default() -> Self {
        Self { strict: true, filters: Vec::new() }
    }
}

impl core::fmt::Debug for OverlapResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OverlapResolver")
            .field("strict", &self.strict)
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl OverlapResolver {
    /// A strict resolver without filters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets strict mode. When strict (the default), any illegitimate
    /// collision aborts resolution instead of keeping the first-seen
    /// declaration.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Appends a classifier run after the overlap checks.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Classifier + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Builds the combined interface named `name` out of `declarations`.
    ///
    /// # Arguments
    ///
    /// * `&self` - The resolver.
    /// * `name` - Name of the combined interface.
    /// * `declarations` - Every declaration of every included facet and
    ///   library, in order.
    ///
    /// # Errors
    ///
    /// * [`Error::IllegitimateCollision`] in strict mode, if two functions
    ///   share a selector without being the same inherited declaration, or if
    ///   a classifier returned [`Verdict::Collision`].
    pub fn resolve(
        &self,
        name: impl Into<String>,
        declarations: impl IntoIterator<Item = Declaration>,
    ) -> Result<Resolution> {
        let mut kept: Vec<Declaration> = Vec::new();
        let mut rejected = Vec::new();
        let mut collisions = Vec::new();
        let mut by_signature: HashMap<(DeclarationKind, String), usize> =
            HashMap::new();
        let mut by_selector: HashMap<Selector, usize> = HashMap::new();

        for declaration in declarations {
            let key = (declaration.kind(), declaration.signature().to_string());
            if let Some(&index) = by_signature.get(&key) {
                let existing = &kept[index];
                let same_unit =
                    existing.declaring_unit() == declaration.declaring_unit();
                let legitimate = !declaration.is_function() || same_unit;
                let reason = if legitimate {
                    debug!(%declaration, "dropping duplicate declaration");
                    Rejection::Duplicate
                } else {
                    Rejection::Collision(collision(
                        CollisionKind::Redeclared,
                        existing,
                        &declaration,
                    ))
                };
                reject(&mut rejected, &mut collisions, declaration, reason);
                continue;
            }

            if let Some(selector) = declaration.selector() {
                if let Some(&index) = by_selector.get(&selector) {
                    let reason = Rejection::Collision(collision(
                        CollisionKind::SelectorClash,
                        &kept[index],
                        &declaration,
                    ));
                    reject(&mut rejected, &mut collisions, declaration, reason);
                    continue;
                }
                by_selector.insert(selector, kept.len());
            }

            by_signature.insert(key, kept.len());
            kept.push(declaration);
        }

        let verdicts: Vec<Verdict> = kept
            .iter()
            .map(|declaration| {
                self.filters
                    .iter()
                    .map(|f| f.classify(declaration, &kept))
                    .find(|v| *v != Verdict::Keep)
                    .unwrap_or(Verdict::Keep)
            })
            .collect();

        let mut interface = Vec::with_capacity(kept.len());
        for (declaration, verdict) in kept.into_iter().zip(verdicts) {
            match verdict {
                Verdict::Keep => interface.push(declaration),
                Verdict::Drop => rejected.push(Rejected {
                    declaration,
                    reason: Rejection::Filtered,
                }),
                Verdict::Collision => {
                    let reason = Rejection::Collision(Collision {
                        kind: CollisionKind::Flagged,
                        selector: declaration.short_id(),
                        existing: FLAGGED_BY.to_string(),
                        incoming: declaration.to_string(),
                    });
                    reject(&mut rejected, &mut collisions, declaration, reason);
                }
            }
        }

        if self.strict && !collisions.is_empty() {
            return Err(Error::IllegitimateCollision(collisions));
        }

        Ok(Resolution {
            interface: CombinedInterface {
                name: name.into(),
                declarations: interface,
            },
            rejected,
        })
    }
}

/// What a classifier-flagged [`Collision`] names as its existing side.
pub const FLAGGED_BY: &str = "interface filter";

fn collision(
    kind: CollisionKind,
    existing: &Declaration,
    incoming: &Declaration,
) -> Collision {
    Collision {
        kind,
        selector: incoming.short_id(),
        existing: existing.to_string(),
        incoming: incoming.to_string(),
    }
}

fn reject(
    rejected: &mut Vec<Rejected>,
    collisions: &mut Vec<Collision>,
    declaration: Declaration,
    reason: Rejection,
) {
    if let Rejection::Collision(collision) = &reason {
        collisions.push(collision.clone());
    }
    rejected.push(Rejected { declaration, reason });
}
