//! Errors raised while deriving signatures, resolving overlaps and planning
//! cuts.
use alloy_primitives::Selector;

use crate::{batch::BatchStatus, diamond::CutError};

/// Result type used across this crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Any failure of the planning pipeline.
///
/// None of these are recoverable inside the pipeline: every variant aborts
/// the build or upgrade batch it was raised in.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A parameter type could not be canonicalized.
    #[error("invalid type `{ty}`: {reason}")]
    InvalidType {
        /// The type as it was written.
        ty: String,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// A declaration name is not a valid identifier.
    #[error("invalid declaration name `{0}`")]
    InvalidName(String),
    /// A signature string could not be parsed.
    #[error("invalid signature `{0}`")]
    InvalidSignature(String),
    /// Two declarations claim the same selector illegitimately.
    #[error("{}", describe(.0))]
    IllegitimateCollision(Vec<Collision>),
    /// A facet that previously exposed selectors now has none and was not
    /// marked for retirement.
    #[error("facet `{facet}` no longer exposes any function; retire it explicitly to remove its selectors")]
    AmbiguousRemoval {
        /// Name of the facet.
        facet: String,
    },
    /// A facet that should receive selectors has the zero address.
    #[error("facet `{facet}` has the zero address")]
    ZeroFacetAddress {
        /// Name of the facet.
        facet: String,
    },
    /// The same facet name was collected twice into one batch.
    #[error("facet `{0}` appears more than once in the upgrade batch")]
    DuplicateFacet(String),
    /// An operation was attempted in the wrong batch state.
    #[error("cannot {action} an upgrade batch that is {status}")]
    InvalidTransition {
        /// The attempted operation.
        action: &'static str,
        /// The state the batch was in.
        status: BatchStatus,
    },
    /// The diamond rejected a cut.
    #[error(transparent)]
    Cut(#[from] CutError),
    /// An inclusion or exclusion pattern is not a valid regular expression.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    /// ABI-encoded data could not be decoded.
    #[error("abi decoding failed: {0}")]
    Decode(String),
    /// A compiled artifact could not be read.
    #[error("invalid artifact: {0}")]
    Artifact(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Artifact(e.to_string())
    }
}

/// How two declarations ended up colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionKind {
    /// Different signatures hash to the same selector.
    SelectorClash,
    /// The same signature is declared in two different units.
    Redeclared,
    /// The selector is already owned by another facet.
    Claimed,
    /// A classifier flagged the declaration.
    Flagged,
}

/// A single illegitimate collision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// What kind of collision this is.
    pub kind: CollisionKind,
    /// The selector both sides map to.
    pub selector: Selector,
    /// The declaration or facet that held the selector first. For
    /// [`CollisionKind::Flagged`], [`crate::overlap::FLAGGED_BY`].
    pub existing: String,
    /// The declaration or facet that tried to take it.
    pub incoming: String,
}

impl core::fmt::Display for Collision {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let Self { selector, existing, incoming, .. } = self;
        match self.kind {
            CollisionKind::SelectorClash => write!(
                f,
                "`{existing}` and `{incoming}` share selector {selector}"
            ),
            CollisionKind::Redeclared => write!(
                f,
                "`{incoming}` re-declares `{existing}` (selector {selector})"
            ),
            CollisionKind::Claimed => write!(
                f,
                "selector {selector} is owned by {existing} and claimed by {incoming}"
            ),
            CollisionKind::Flagged => write!(
                f,
                "`{incoming}` was flagged as colliding by the {existing} ({selector})"
            ),
        }
    }
}

fn describe(collisions: &[Collision]) -> String {
    let list = collisions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    format!("illegitimate selector collision: {list}")
}
