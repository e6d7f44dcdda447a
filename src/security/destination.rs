//! Destination policy.

use crate::security::blacklist::Blacklists;

/// Decides whether a requested target host may be dialed.
///
/// Only the host string is checked, by exact equality against the
/// destination blacklist. Ports are not considered and names are not resolved.
#[derive(Clone)]
pub struct DestinationPolicy {
    blacklists: Blacklists,
}

impl DestinationPolicy {
    pub fn new(blacklists: Blacklists) -> Self {
        Self { blacklists }
    }

    pub fn is_allowed(&self, host: &str) -> bool {
        !self.blacklists.is_target_blocked(host)
    }
}
