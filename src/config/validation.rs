//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (workers > 0, host parses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>

use std::net::IpAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("host must not be empty")]
    EmptyHost,

    #[error("host '{0}' is neither an IP address nor a hostname")]
    InvalidHost(String),

    #[error("port must not be 0; leave it unset for a random port")]
    ZeroPort,

    #[error("workers must be at least 1")]
    NoWorkers,

    #[error("max_connections must be at least 1")]
    NoConnections,
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.host.is_empty() {
        errors.push(ValidationError::EmptyHost);
    } else if config.host.parse::<IpAddr>().is_err() && !is_hostname(&config.host) {
        errors.push(ValidationError::InvalidHost(config.host.clone()));
    }
    if config.port == Some(0) {
        errors.push(ValidationError::ZeroPort);
    }
    if config.workers == 0 {
        errors.push(ValidationError::NoWorkers);
    }
    if config.max_connections == 0 {
        errors.push(ValidationError::NoConnections);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_hostname(host: &str) -> bool {
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn hostnames_and_ips_accepted() {
        for host in ["localhost", "127.0.0.1", "::1", "stub-1.internal"] {
            let config = ServerConfig {
                host: host.to_string(),
                ..ServerConfig::default()
            };
            assert_eq!(validate_config(&config), Ok(()), "{host}");
        }
    }

    #[test]
    fn reports_every_error() {
        let config = ServerConfig {
            host: "bad host!".to_string(),
            workers: 0,
            max_connections: 0,
            ..ServerConfig::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidHost("bad host!".to_string()),
                ValidationError::NoWorkers,
                ValidationError::NoConnections,
            ]
        );
    }

    #[test]
    fn zero_port_rejected() {
        let config = ServerConfig {
            port: Some(0),
            ..ServerConfig::default()
        };
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::ZeroPort])
        );
    }
}
