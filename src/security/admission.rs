//! Source admission control.
//!
//! Decides, from the upgrade request alone, whether a session may proceed to
//! negotiation. Blocked clients get no response; the caller just drops the
//! connection.

use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderMap;

use crate::config::AdmissionConfig;
use crate::observability::metrics;
use crate::security::blacklist::Blacklists;
use crate::security::rate_limit::SourceRateLimiter;

/// Forwarding headers consulted in order.
pub const FORWARDING_HEADERS: [&str; 2] = ["x-forwarded-for", "x-real-ip"];

/// Candidate source addresses, most-trusted first.
///
/// Never empty: the transport-level peer is always the last entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAddrs(Vec<String>);

impl SourceAddrs {
    /// Build the candidate list for a request.
    ///
    /// Each forwarding header's comma-separated value is walked from its last
    /// entry to its first, since the entry appended by the nearest proxy is the
    /// one we can trust most. The peer IP comes last.
    pub fn from_request(headers: &HeaderMap, peer: SocketAddr) -> Self {
        let mut addrs = Vec::new();
        for name in FORWARDING_HEADERS {
            let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
                continue;
            };
            addrs.extend(
                value
                    .rsplit(',')
                    .map(str::trim)
                    .filter(|addr| !addr.is_empty())
                    .map(str::to_string),
            );
        }
        addrs.push(peer.ip().to_string());
        Self(addrs)
    }

    /// The key used for rate limiting, logging and auditing.
    pub fn canonical(&self) -> &str {
        &self.0[0]
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for SourceAddrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Blacklisted,
    RateLimited,
}

impl Denial {
    pub fn as_str(&self) -> &'static str {
        match self {
            Denial::Blacklisted => "blacklisted",
            Denial::RateLimited => "rate_limited",
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone)]
pub struct Admission {
    pub sources: SourceAddrs,
    pub denial: Option<Denial>,
}

impl Admission {
    pub fn is_blocked(&self) -> bool {
        self.denial.is_some()
    }
}

/// Gate in front of every session: source blacklist plus per-source rate.
pub struct AdmissionController {
    blacklists: Blacklists,
    rates: SourceRateLimiter,
}

impl AdmissionController {
    pub fn new(blacklists: Blacklists, config: &AdmissionConfig) -> Self {
        Self {
            blacklists,
            rates: SourceRateLimiter::new(config),
        }
    }

    /// Identify the source of a request and decide whether it is admitted.
    ///
    /// The canonical source's bucket is created on first sight whatever the
    /// verdict, so blacklisted sources also occupy the registry. A
    /// blacklisted source is refused without spending a token; otherwise one
    /// token is taken.
    pub fn admit(&self, headers: &HeaderMap, peer: SocketAddr) -> Admission {
        let sources = SourceAddrs::from_request(headers, peer);
        self.rates.register(sources.canonical());

        let denial = if self.blacklists.is_source_blocked(sources.as_slice()) {
            Some(Denial::Blacklisted)
        } else if !self.rates.check(sources.canonical()) {
            Some(Denial::RateLimited)
        } else {
            None
        };

        if let Some(denial) = denial {
            metrics::record_admission_rejected(denial.as_str());
        }

        Admission { sources, denial }
    }

    pub fn tracked_sources(&self) -> usize {
        self.rates.tracked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::time::Duration;

    fn peer() -> SocketAddr {
        "192.0.2.10:40123".parse().unwrap()
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn controller(blacklisted: &[&str]) -> AdmissionController {
        let lists = Blacklists::new(blacklisted.iter().map(|s| s.to_string()).collect(), vec![]);
        AdmissionController::new(lists, &AdmissionConfig::default())
    }

    #[test]
    fn candidates_reverse_each_header_then_peer() {
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.1, 198.51.100.2"),
            ("x-real-ip", "198.51.100.3"),
        ]);
        let sources = SourceAddrs::from_request(&h, peer());

        assert_eq!(
            sources.as_slice(),
            &["198.51.100.2", "203.0.113.1", "198.51.100.3", "192.0.2.10"]
        );
        assert_eq!(sources.canonical(), "198.51.100.2");
    }

    #[test]
    fn without_headers_peer_ip_is_canonical() {
        let sources = SourceAddrs::from_request(&HeaderMap::new(), peer());
        assert_eq!(sources.as_slice(), &["192.0.2.10"]);
    }

    #[test]
    fn empty_header_entries_are_skipped() {
        let h = headers(&[("x-forwarded-for", " , 203.0.113.1,")]);
        let sources = SourceAddrs::from_request(&h, peer());
        assert_eq!(sources.as_slice(), &["203.0.113.1", "192.0.2.10"]);
    }

    #[tokio::test(start_paused = true)]
    async fn blacklisted_source_is_always_blocked() {
        let gate = controller(&["192.0."]);

        for _ in 0..3 {
            let admission = gate.admit(&HeaderMap::new(), peer());
            assert_eq!(admission.denial, Some(Denial::Blacklisted));
            tokio::time::advance(Duration::from_secs(5)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn blacklist_matches_proxied_candidates_too() {
        let gate = controller(&["10.9."]);
        let h = headers(&[("x-forwarded-for", "10.9.0.1, 203.0.113.1")]);

        assert!(gate.admit(&h, peer()).is_blocked());
    }

    #[tokio::test(start_paused = true)]
    async fn second_attempt_within_a_second_is_throttled() {
        let gate = controller(&[]);
        let h = headers(&[("x-forwarded-for", "203.0.113.50")]);

        assert!(!gate.admit(&h, peer()).is_blocked());
        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(gate.admit(&h, peer()).denial, Some(Denial::RateLimited));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!gate.admit(&h, peer()).is_blocked());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_key_is_the_canonical_source_only() {
        let gate = controller(&[]);
        let first = headers(&[("x-forwarded-for", "203.0.113.50")]);
        let second = headers(&[("x-forwarded-for", "203.0.113.51")]);

        assert!(!gate.admit(&first, peer()).is_blocked());
        assert!(!gate.admit(&second, peer()).is_blocked());
        assert_eq!(gate.tracked_sources(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn blacklisted_source_is_registered_without_spending_its_token() {
        let lists = Blacklists::new(vec!["203.0.113.".into()], vec![]);
        let gate = AdmissionController::new(lists.clone(), &AdmissionConfig::default());
        let h = headers(&[("x-forwarded-for", "203.0.113.60")]);

        assert_eq!(gate.admit(&h, peer()).denial, Some(Denial::Blacklisted));
        assert_eq!(gate.tracked_sources(), 1);

        // Lifted from the blacklist, the source still has its full bucket.
        lists.replace_sources(vec![]);
        assert!(!gate.admit(&h, peer()).is_blocked());
    }
}
