//! Resource domains covered by disk usage reports.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A resource category whose disk usage can be collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    /// Containers and their writable layers.
    #[serde(rename = "container")]
    Containers,
    /// Images and the layers backing them.
    #[serde(rename = "image")]
    Images,
    /// Local volumes.
    #[serde(rename = "volume")]
    Volumes,
    /// Build cache records.
    BuildCache,
}

impl Domain {
    /// Every known domain, in report order.
    pub const ALL: [Self; 4] = [Self::Containers, Self::Images, Self::Volumes, Self::BuildCache];

    /// Object-type selector used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Containers => "container",
            Self::Images => "image",
            Self::Volumes => "volume",
            Self::BuildCache => "build-cache",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|domain| domain.as_str() == s)
            .ok_or_else(|| CoreError::invalid_argument(format!("unknown object type: {s}")))
    }
}

/// The set of object types a caller wants reported.
///
/// Selectors are kept as given, in the order given, and only resolved by
/// the aggregator, so an unknown value is rejected before any collector
/// runs. An empty request selects every domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageRequest {
    types: Vec<String>,
}

impl UsageRequest {
    /// Request covering every known domain.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a request from raw object-type selectors. Duplicates collapse
    /// onto their first occurrence.
    pub fn from_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for selector in types.into_iter().map(Into::into) {
            if !unique.contains(&selector) {
                unique.push(selector);
            }
        }
        Self { types: unique }
    }

    /// Builds a request from already typed domains.
    pub fn from_domains(domains: impl IntoIterator<Item = Domain>) -> Self {
        Self::from_types(domains.into_iter().map(Domain::as_str))
    }

    /// Returns true if no selector was given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Raw selectors in the order given.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }

    /// Resolves the selectors to a non-empty domain set.
    ///
    /// # Errors
    ///
    /// Returns an invalid argument error naming the first selector, in the
    /// order given, that is not a known domain.
    pub fn resolve(&self) -> Result<BTreeSet<Domain>, CoreError> {
        if self.types.is_empty() {
            return Ok(Domain::ALL.into_iter().collect());
        }
        self.types.iter().map(|t| t.parse()).collect()
    }
}
