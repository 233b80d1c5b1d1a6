//! Venue catalog loading.
//!
//! The catalog is a JSON array of categories:
//!
//! ```json
//! [{ "category": "Basic Karts", "idents": ["fara numar ×5", "1"], "price30": 20, "price1h": 30 }]
//! ```
//!
//! The venue's own catalog is compiled in; a file can replace it.

use std::{fs, path::Path};

use paddock_core::{Catalog, Registry, RegistryError};
use thiserror::Error;

const VENUE_CATALOG: &str = include_str!("../catalog/venue.json");

/// Errors loading configuration data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The catalog file could not be read
    #[error("cannot read catalog {path}: {reason}")]
    Read {
        /// File that was requested
        path: String,
        /// Underlying I/O error
        reason: String,
    },

    /// The catalog is not valid catalog JSON
    #[error("invalid catalog JSON: {0}")]
    Parse(String),

    /// The catalog parsed but cannot be expanded into units
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// The compiled-in venue catalog.
///
/// # Errors
///
/// `ConfigError::Parse` if the embedded JSON is malformed.
pub fn builtin_catalog() -> Result<Catalog, ConfigError> {
    parse_catalog(VENUE_CATALOG)
}

/// Parse a catalog from JSON text.
///
/// # Errors
///
/// `ConfigError::Parse` if `json` is not a catalog.
pub fn parse_catalog(json: &str) -> Result<Catalog, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Read a catalog from `path`.
///
/// # Errors
///
/// `ConfigError::Read` or `ConfigError::Parse`.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Catalog, ConfigError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_catalog(&json)
}

/// Load the registry from `path`, or from the built-in catalog.
///
/// # Errors
///
/// Any [`ConfigError`]; a duplicate id is fatal to startup.
pub fn load_registry(path: Option<&Path>) -> Result<Registry, ConfigError> {
    let catalog = match path {
        Some(path) => load_catalog(path)?,
        None => builtin_catalog()?,
    };
    Ok(Registry::load(&catalog)?)
}
