//! Configuration loading for input plugins.
//!
//! Each input owns a configuration subdirectory (`input.<name>/`) under the
//! agent's configuration root. The loader composes, in increasing
//! precedence: serde-attribute defaults on the input's config type,
//! `INPUT_<NAME>_<FIELD>` environment overrides, and every recognized
//! configuration file in the subdirectory, then enforces required-field
//! presence before handing the merged document to the input.

mod loader;

pub use loader::{ConfigError, load_dir};
