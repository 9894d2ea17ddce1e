//! Strategies deciding which declarations end up in the combined interface.
use regex::Regex;

use crate::{
    error::Result,
    interface::{Declaration, DeclarationKind},
    signature,
};

/// Outcome of classifying one declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep the declaration.
    Keep,
    /// Drop it from the combined interface.
    Drop,
    /// Treat it as an illegitimate collision.
    Collision,
}

/// Decides the fate of a declaration that already passed the overlap checks.
///
/// Classifiers are run by [`super::OverlapResolver`] after duplicates are
/// collapsed and collisions detected, so dropping a declaration can never hide
/// a real collision.
pub trait Classifier {
    /// Classifies `declaration`.
    ///
    /// # Arguments
    ///
    /// * `declaration` - The declaration to classify.
    /// * `batch` - Every declaration that passed the overlap checks,
    ///   `declaration` included.
    fn classify(&self, declaration: &Declaration, batch: &[Declaration])
        -> Verdict;
}

impl<F> Classifier for F
where
    F: Fn(&Declaration, &[Declaration]) -> Verdict,
{
    fn classify(
        &self,
        declaration: &Declaration,
        batch: &[Declaration],
    ) -> Verdict {
        self(declaration, batch)
    }
}

/// Keeps declarations whose origin matches any of a set of patterns.
///
/// Patterns are matched against fully qualified names (`path:Name`), so
/// `Facet$` selects every contract whose name ends with `Facet` and
/// `:Diamond$` the contract named exactly `Diamond`.
#[derive(Debug, Clone)]
pub struct IncludePatterns {
    patterns: Vec<Regex>,
}

impl IncludePatterns {
    /// Compiles `patterns`.
    ///
    /// # Errors
    ///
    /// * [`regex::Error`] if a pattern is not a valid regular expression.
    pub fn new<S: AsRef<str>>(
        patterns: &[S],
    ) -> core::result::Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<core::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Whether `fully_qualified_name` matches any pattern.
    #[must_use]
    pub fn matches(&self, fully_qualified_name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(fully_qualified_name))
    }
}

impl Classifier for IncludePatterns {
    fn classify(
        &self,
        declaration: &Declaration,
        _: &[Declaration],
    ) -> Verdict {
        if self.matches(declaration.origin()) {
            Verdict::Keep
        } else {
            Verdict::Drop
        }
    }
}

/// A single signature exclusion.
#[derive(Debug, Clone)]
struct Exclusion {
    signature: String,
    unless: Option<Regex>,
}

/// Drops functions by signature, optionally keeping them for some origins.
///
/// Typically used to hide loupe and ownership boilerplate that every facet
/// inherits, except from the diamond itself.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSignatures {
    exclusions: Vec<Exclusion>,
}

impl ExcludeSignatures {
    /// An empty set of exclusions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops functions with `signature` everywhere.
    ///
    /// # Errors
    ///
    /// * [`crate::Error`] if `signature` is not a valid signature.
    pub fn exclude(mut self, signature: &str) -> Result<Self> {
        self.exclusions.push(Exclusion {
            signature: signature::canonical_signature(signature)?,
            unless: None,
        });
        Ok(self)
    }

    /// Drops functions with `signature` unless their origin matches
    /// `origin`.
    ///
    /// # Errors
    ///
    /// * [`crate::Error`] if `signature` is not a valid signature, or if
    ///   `origin` is not a valid regular expression.
    pub fn exclude_unless(
        mut self,
        signature: &str,
        origin: &str,
    ) -> Result<Self> {
        let unless = Regex::new(origin)
            .map_err(|e| crate::Error::InvalidPattern(e.to_string()))?;
        self.exclusions.push(Exclusion {
            signature: signature::canonical_signature(signature)?,
            unless: Some(unless),
        });
        Ok(self)
    }
}

impl Classifier for ExcludeSignatures {
    fn classify(
        &self,
        declaration: &Declaration,
        _: &[Declaration],
    ) -> Verdict {
        if declaration.kind() != DeclarationKind::Function {
            return Verdict::Keep;
        }

        let origin = declaration.origin();
        let excluded = self.exclusions.iter().any(|e| {
            e.signature == declaration.signature()
                && !e.unless.as_ref().is_some_and(|u| u.is_match(origin))
        });
        if excluded {
            Verdict::Drop
        } else {
            Verdict::Keep
        }
    }
}
