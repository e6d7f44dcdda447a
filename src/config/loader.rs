//! Configuration loading from disk.
//!
//! The file is optional: without one the gateway runs on defaults plus
//! command-line overrides. A file that is present must parse and validate as a
//! whole; there is no partial acceptance.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[destination]\nblacklisted_hosts = [\"internal.corp\"]").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.destination.blacklisted_hosts, vec!["internal.corp"]);
        // Untouched sections keep their defaults.
        assert_eq!(config.listener.ws_path, "/ws");
    }

    #[test]
    fn reports_every_invalid_value() {
        let err = parse_config("[throttle]\nrate_bytes_per_sec = 0\nburst_bytes = 0").unwrap_err();

        match &err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(
            err.to_string(),
            "invalid configuration: throttle.rate_bytes_per_sec: must be > 0; \
             throttle.burst_bytes: must be >= 1"
        );
    }

    #[test]
    fn wrong_types_are_parse_errors() {
        let err = parse_config("[session]\ndial_timeout_secs = \"thirty\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_config(Path::new("/nonexistent/gateway.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().starts_with("cannot read /nonexistent/gateway.toml: "));
    }
}
