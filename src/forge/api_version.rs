//! forge::api_version
//!
//! Protocol version negotiation.
//!
//! Every endpoint requires an `api-version` query parameter, and the set of
//! accepted values differs between the cloud service and on-premises
//! servers. [`VersionNegotiator`] holds the ordered candidate list and the
//! version discovered for one client, so that probing order and caching can
//! be tested without any HTTP.

use std::sync::RwLock;

/// A known REST API revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiVersion {
    /// Azure DevOps Server 2019 and older TFS releases
    V5_0,
    /// Azure DevOps Server 2020
    V6_0,
    /// Azure DevOps Services (cloud)
    V7_1,
}

impl ApiVersion {
    /// Query parameter value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V5_0 => "5.0",
            ApiVersion::V6_0 => "6.0",
            ApiVersion::V7_1 => "7.1",
        }
    }

    /// Parse a version string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "5.0" => Some(ApiVersion::V5_0),
            "6.0" => Some(ApiVersion::V6_0),
            "7.1" => Some(ApiVersion::V7_1),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Discovery probes oldest first: old servers reject newer versions,
/// while newer servers still accept old ones.
pub const DISCOVERY_ORDER: [ApiVersion; 3] = [ApiVersion::V5_0, ApiVersion::V6_0, ApiVersion::V7_1];

/// Ref listing prefers the newest version and walks back.
pub const REFS_ORDER: [ApiVersion; 3] = [ApiVersion::V7_1, ApiVersion::V6_0, ApiVersion::V5_0];

/// Version used when nothing could be discovered.
pub const FALLBACK_VERSION: ApiVersion = ApiVersion::V5_0;

/// What a client settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Negotiated {
    /// A version that answered a probe or a request
    Discovered(ApiVersion),
    /// Discovery failed; requests use the fallback until a version works
    Fallback(ApiVersion),
}

/// Ordered candidates plus the version discovered for one client.
///
/// The cache is only touched through short, synchronous critical sections,
/// so it is never held across a network call or a retry sleep. Two tasks
/// racing through discovery both store a working version; the last write
/// wins.
#[derive(Debug)]
pub struct VersionNegotiator {
    candidates: Vec<ApiVersion>,
    cached: RwLock<Option<Negotiated>>,
}

impl Default for VersionNegotiator {
    fn default() -> Self {
        Self::new(DISCOVERY_ORDER.to_vec())
    }
}

impl VersionNegotiator {
    /// Create a negotiator probing `candidates` in order.
    pub fn new(candidates: Vec<ApiVersion>) -> Self {
        Self {
            candidates,
            cached: RwLock::new(None),
        }
    }

    /// Candidates in probing order.
    pub fn candidates(&self) -> &[ApiVersion] {
        &self.candidates
    }

    /// The discovered version, if any.
    pub fn cached(&self) -> Option<ApiVersion> {
        match self.state() {
            Some(Negotiated::Discovered(version)) => Some(version),
            _ => None,
        }
    }

    /// The version to send: discovered, or the fallback after a failed
    /// discovery. `None` means discovery has not run.
    pub fn current(&self) -> Option<ApiVersion> {
        match self.state()? {
            Negotiated::Discovered(version) | Negotiated::Fallback(version) => Some(version),
        }
    }

    /// Record a version that answered correctly.
    pub fn remember(&self, version: ApiVersion) {
        if let Ok(mut guard) = self.cached.write() {
            *guard = Some(Negotiated::Discovered(version));
        }
    }

    /// Use the fallback until a version is remembered or the state is
    /// forgotten, so a failed discovery is not repeated on every request.
    ///
    /// A version discovered concurrently is kept.
    pub fn settle_on_fallback(&self) -> ApiVersion {
        let fallback = self.fallback();
        match self.cached.write() {
            Ok(mut guard) => match *guard {
                Some(Negotiated::Discovered(version)) => version,
                _ => {
                    *guard = Some(Negotiated::Fallback(fallback));
                    fallback
                }
            },
            Err(_) => fallback,
        }
    }

    fn state(&self) -> Option<Negotiated> {
        self.cached.read().ok().and_then(|guard| *guard)
    }

    /// Drop the cached version so the next caller probes again.
    pub fn forget(&self) {
        if let Ok(mut guard) = self.cached.write() {
            *guard = None;
        }
    }

    /// Candidates to try after `failed` stopped working, in probing order.
    pub fn alternatives(&self, failed: ApiVersion) -> Vec<ApiVersion> {
        self.candidates
            .iter()
            .copied()
            .filter(|v| *v != failed)
            .collect()
    }

    /// The version to use when discovery found nothing.
    pub fn fallback(&self) -> ApiVersion {
        self.candidates.first().copied().unwrap_or(FALLBACK_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_strings() {
        assert_eq!(ApiVersion::V5_0.as_str(), "5.0");
        assert_eq!(ApiVersion::V6_0.to_string(), "6.0");
        assert_eq!(ApiVersion::V7_1.to_string(), "7.1");
    }

    #[test]
    fn parse_known_versions() {
        assert_eq!(ApiVersion::parse("5.0"), Some(ApiVersion::V5_0));
        assert_eq!(ApiVersion::parse(" 7.1 "), Some(ApiVersion::V7_1));
        assert_eq!(ApiVersion::parse("4.1"), None);
    }

    #[test]
    fn discovery_is_oldest_first() {
        assert_eq!(DISCOVERY_ORDER[0], ApiVersion::V5_0);
        assert_eq!(REFS_ORDER[0], ApiVersion::V7_1);
    }

    #[test]
    fn cache_starts_empty() {
        let negotiator = VersionNegotiator::default();
        assert_eq!(negotiator.cached(), None);
        assert_eq!(negotiator.candidates(), &DISCOVERY_ORDER);
    }

    #[test]
    fn remember_and_forget() {
        let negotiator = VersionNegotiator::default();
        negotiator.remember(ApiVersion::V6_0);
        assert_eq!(negotiator.cached(), Some(ApiVersion::V6_0));

        negotiator.remember(ApiVersion::V7_1);
        assert_eq!(negotiator.cached(), Some(ApiVersion::V7_1));

        negotiator.forget();
        assert_eq!(negotiator.cached(), None);
    }

    #[test]
    fn fallback_is_used_but_not_cached() {
        let negotiator = VersionNegotiator::default();
        assert_eq!(negotiator.current(), None);

        assert_eq!(negotiator.settle_on_fallback(), ApiVersion::V5_0);
        assert_eq!(negotiator.current(), Some(ApiVersion::V5_0));
        assert_eq!(negotiator.cached(), None);

        negotiator.remember(ApiVersion::V6_0);
        assert_eq!(negotiator.current(), Some(ApiVersion::V6_0));
        assert_eq!(negotiator.cached(), Some(ApiVersion::V6_0));
    }

    #[test]
    fn forget_clears_fallback() {
        let negotiator = VersionNegotiator::default();
        negotiator.settle_on_fallback();
        negotiator.forget();
        assert_eq!(negotiator.current(), None);
    }

    #[test]
    fn fallback_keeps_discovered_version() {
        let negotiator = VersionNegotiator::default();
        negotiator.remember(ApiVersion::V7_1);
        assert_eq!(negotiator.settle_on_fallback(), ApiVersion::V7_1);
        assert_eq!(negotiator.cached(), Some(ApiVersion::V7_1));
    }

    #[test]
    fn alternatives_skip_failed_version() {
        let negotiator = VersionNegotiator::default();
        assert_eq!(
            negotiator.alternatives(ApiVersion::V6_0),
            vec![ApiVersion::V5_0, ApiVersion::V7_1]
        );
    }

    #[test]
    fn fallback_is_first_candidate() {
        assert_eq!(VersionNegotiator::default().fallback(), ApiVersion::V5_0);
        assert_eq!(
            VersionNegotiator::new(vec![]).fallback(),
            FALLBACK_VERSION
        );
    }
}
