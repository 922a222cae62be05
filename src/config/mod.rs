//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), or ServerConfig::default()
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → StubServer construction
//!
//! Process setup:
//!     Defaults::install (default stubs + logger)
//!     → shared.rs (ArcSwap singleton)
//!     → snapshot taken by each StubServer at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once a server is built
//! - All fields have defaults to allow minimal configs
//! - Shared defaults are written before first use and only read afterwards

pub mod loader;
pub mod schema;
pub mod shared;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ServerConfig, PORT_RANGE};
pub use shared::Defaults;
pub use validation::{validate_config, ValidationError};
