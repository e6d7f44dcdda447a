//! Static source and destination blacklists.
//!
//! Both lists are read on every session and written only on config reload, so
//! each sits behind its own `RwLock`.

use std::sync::{Arc, RwLock};

/// Shared handle to the two blacklists. Cloning shares the same lists.
#[derive(Clone, Default)]
pub struct Blacklists {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Source address prefixes, matched with `starts_with`.
    sources: RwLock<Vec<String>>,
    /// Destination hosts, matched by exact equality.
    targets: RwLock<Vec<String>>,
}

impl Blacklists {
    pub fn new(sources: Vec<String>, targets: Vec<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                sources: RwLock::new(sources),
                targets: RwLock::new(targets),
            }),
        }
    }

    /// True if any blacklisted prefix is a prefix of any candidate address.
    pub fn is_source_blocked(&self, candidates: &[String]) -> bool {
        let sources = self.inner.sources.read().expect("source blacklist lock poisoned");
        sources
            .iter()
            .any(|prefix| candidates.iter().any(|addr| addr.starts_with(prefix.as_str())))
    }

    /// True if `host` is literally one of the blacklisted targets.
    ///
    /// No resolution or normalization happens, so `127.0.0.2` or `[::1]`
    /// pass unless listed themselves.
    pub fn is_target_blocked(&self, host: &str) -> bool {
        let targets = self.inner.targets.read().expect("target blacklist lock poisoned");
        targets.iter().any(|blocked| blocked == host)
    }

    pub fn replace_sources(&self, sources: Vec<String>) {
        *self.inner.sources.write().expect("source blacklist lock poisoned") = sources;
    }

    pub fn replace_targets(&self, targets: Vec<String>) {
        *self.inner.targets.write().expect("target blacklist lock poisoned") = targets;
    }

    pub fn source_count(&self) -> usize {
        self.inner.sources.read().expect("source blacklist lock poisoned").len()
    }

    pub fn target_count(&self) -> usize {
        self.inner.targets.read().expect("target blacklist lock poisoned").len()
    }
}
