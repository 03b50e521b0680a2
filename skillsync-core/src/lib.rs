//! skillsync core library — registry data model, persistence, configuration.
//!
//! - [`types`] — [`RegistryEntry`] and the on-disk [`RegistryFile`]
//! - [`registry`] — load / mutate / persist cycle over the registry file
//! - [`config`] — [`Settings`] loaded from `~/.skillsync/config.yaml`
//! - [`error`] — [`RegistryError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod registry;
pub mod types;

pub use config::Settings;
pub use error::{ConfigError, RegistryError};
pub use types::{NewEntry, RegistryEntry, RegistryFile, REGISTRY_VERSION};
