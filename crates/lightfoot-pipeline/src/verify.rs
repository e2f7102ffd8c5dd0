//! Verified-operator lookup and the verified-only visibility filter.

use std::collections::HashSet;

use crate::feature::Feature;

/// Query parameter that opts in to showing unverified features.
pub const PARAM_ALLOW_UNVERIFIED: &str = "allowUnverified";

/// Membership predicate for operators allowed to publish boxes.
///
/// Implementations must be pure and cheap; classifiers call this once per
/// event from inside pool units.
pub trait PubkeyVerifier: Send + Sync {
    fn is_verified(&self, pubkey: &str) -> bool;
}

/// Set of verified pubkeys. Lookups are exact and case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifiedPubkeys {
    keys: HashSet<String>,
}

impl VerifiedPubkeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl PubkeyVerifier for VerifiedPubkeys {
    fn is_verified(&self, pubkey: &str) -> bool {
        self.keys.contains(pubkey)
    }
}

/// Parse a comma-separated pubkey list: entries are trimmed and lowercased,
/// empty entries dropped.
pub fn parse_pubkey_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Decides which features are shown to a consumer.
///
/// Verified-only is the default; only an explicit `allowUnverified=true`
/// turns it off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFilter {
    pub verified_only: bool,
}

impl Default for FeatureFilter {
    fn default() -> Self {
        Self {
            verified_only: true,
        }
    }
}

impl FeatureFilter {
    pub fn from_allow_unverified(raw: Option<&str>) -> Self {
        let verified_only = match raw {
            None => true,
            Some(value) => !value.eq_ignore_ascii_case("true"),
        };
        Self { verified_only }
    }

    /// Value to persist for [`PARAM_ALLOW_UNVERIFIED`]; `None` means the
    /// parameter should be absent.
    pub fn to_allow_unverified(&self) -> Option<&'static str> {
        if self.verified_only {
            None
        } else {
            Some("true")
        }
    }

    pub fn accepts(&self, feature: &Feature) -> bool {
        !self.verified_only || feature.properties.verified
    }
}
