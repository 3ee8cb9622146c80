//! Policy registry: scheme names to factories, wired before the driver
//! starts.

use nvp_core::{BackupScheme, Clank, OnDemandAllBackup};

use crate::errors::ConfigError;

/// Registered policy names, in listing order.
pub const POLICY_NAMES: &[&str] = &["odab", "clank"];

/// Instantiates the named backup/restore scheme.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownPolicy`] for unregistered names.
pub fn create_scheme(name: &str) -> Result<Box<dyn BackupScheme>, ConfigError> {
    match name {
        "odab" => Ok(Box::new(OnDemandAllBackup::new())),
        "clank" => Ok(Box::new(Clank::new())),
        other => Err(ConfigError::UnknownPolicy(other.to_string())),
    }
}
