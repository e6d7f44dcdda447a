//! Hot reload of the blacklists.
//!
//! The containing directory is watched rather than the file itself, so
//! editors that save by writing a new file and renaming it over the old one
//! are still picked up. Every change is re-loaded and fully validated; only
//! the two blacklists of an accepted file are applied, every other setting
//! needs a restart.

use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::GatewayConfig;
use crate::security::Blacklists;

/// The reloadable part of a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistUpdate {
    pub sources: Vec<String>,
    pub targets: Vec<String>,
}

impl BlacklistUpdate {
    pub fn from_config(config: GatewayConfig) -> Self {
        Self {
            sources: config.admission.blacklisted_sources,
            targets: config.destination.blacklisted_hosts,
        }
    }

    /// Swap both lists in place.
    pub fn apply(self, blacklists: &Blacklists) {
        blacklists.replace_sources(self.sources);
        blacklists.replace_targets(self.targets);
    }
}

/// Load `path` and keep only its blacklists.
pub fn reload_blacklists(path: &Path) -> Result<BlacklistUpdate, ConfigError> {
    load_config(path).map(BlacklistUpdate::from_config)
}

/// Watches one configuration file and emits its blacklists on change.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<BlacklistUpdate>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<BlacklistUpdate>) {
        let (updates, rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                updates,
            },
            rx,
        )
    }

    /// Start watching on notify's background thread.
    ///
    /// The returned watcher must be kept alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let ConfigWatcher { path, updates } = self;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let file = path.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| handle_event(&file, &updates, res),
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Watching config file for blacklist changes");
        Ok(watcher)
    }
}

fn touches_file(event: &Event, path: &Path) -> bool {
    let name = path.file_name();
    event.paths.iter().any(|p| p.file_name() == name)
}

fn handle_event(
    path: &Path,
    updates: &mpsc::UnboundedSender<BlacklistUpdate>,
    res: notify::Result<Event>,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Config watch error");
            return;
        }
    };
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) || !touches_file(&event, path) {
        return;
    }

    match reload_blacklists(path) {
        Ok(update) => {
            if updates.send(update).is_err() {
                tracing::debug!("Blacklist reload dropped, nobody is listening");
            }
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring config change");
        }
    }
}

/// Apply reloaded blacklists until the channel closes.
pub async fn apply_blacklist_updates(
    blacklists: Blacklists,
    mut updates: mpsc::UnboundedReceiver<BlacklistUpdate>,
) {
    while let Some(update) = updates.recv().await {
        update.apply(&blacklists);
        tracing::info!(
            sources = blacklists.source_count(),
            targets = blacklists.target_count(),
            "Blacklists reloaded"
        );
    }
}
