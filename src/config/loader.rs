//! Layered configuration loader.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::input::Input;

/// Errors raised while loading or applying an input's configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration directory or a file in it.
    #[error("failed to read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file did not parse.
    #[error("failed to parse {}: {}", .path.display(), .message)]
    Parse { path: PathBuf, message: String },

    /// A required field is absent or empty after composition.
    #[error("required field '{field}' is missing or empty")]
    MissingRequired { field: String },

    /// The merged document did not deserialize into the input's config type.
    #[error("invalid configuration document: {0}")]
    Invalid(String),
}

/// Load the configuration for one input from its subdirectory.
///
/// Composition order, later sources overriding earlier ones field by field:
///
/// 1. defaults declared on the config type via `#[serde(default)]`
/// 2. environment variables `INPUT_<NAME>_<FIELD>`
/// 3. files directly under `dir` with a recognized extension (`toml`,
///    `yaml`/`yml`, `json`), applied in directory-listing order
///
/// Files with unrecognized extensions are ignored. After composition the
/// input's required fields are checked for presence and non-emptiness, then
/// the merged document is applied to the instance. Returns the merged
/// document so callers can log what was applied.
pub fn load_dir(dir: &Path, name: &str, input: &mut dyn Input) -> Result<Value, ConfigError> {
    let mut merged = Value::Object(env_overrides(name));

    for path in config_files(dir)? {
        let overlay = parse_file(&path)?;
        match overlay {
            Value::Null => continue,
            Value::Object(_) => merge(&mut merged, overlay),
            _ => {
                return Err(ConfigError::Parse {
                    path,
                    message: "expected a table or mapping at the top level".to_string(),
                });
            }
        }
    }

    for field in input.required_fields() {
        let present = merged.get(field).is_some_and(|v| !is_empty(v));
        if !present {
            return Err(ConfigError::MissingRequired {
                field: (*field).to_string(),
            });
        }
    }

    input.apply_config(merged.clone())?;
    Ok(merged)
}

/// Collect environment overrides for the input `name`.
///
/// `INPUT_REDIS_ADDRESS=...` sets the `address` field of the `redis` input.
/// Values are parsed as JSON scalars when possible (`3`, `true`) and taken
/// verbatim as strings otherwise.
fn env_overrides(name: &str) -> Map<String, Value> {
    let prefix = format!("INPUT_{}_", name.to_uppercase().replace('-', "_"));
    let mut fields = Map::new();

    for (key, raw) in std::env::vars() {
        if let Some(field) = key.strip_prefix(&prefix) {
            if field.is_empty() {
                continue;
            }
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            fields.insert(field.to_lowercase(), value);
        }
    }

    fields
}

/// Files directly under `dir`, in directory-listing order.
fn config_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

/// Parse one file into a JSON document, keyed by extension. Unrecognized
/// extensions yield `Null`, which the caller skips.
fn parse_file(path: &Path) -> Result<Value, ConfigError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !matches!(ext, "toml" | "yaml" | "yml" | "json") {
        tracing::debug!(path = %path.display(), "ignoring file with unrecognized extension");
        return Ok(Value::Null);
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parsed: Result<Value, String> = match ext {
        "toml" => toml::from_str::<toml::Value>(&content)
            .map_err(|e| e.to_string())
            .and_then(|v| serde_json::to_value(v).map_err(|e| e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
        _ => serde_json::from_str(&content).map_err(|e| e.to_string()),
    };

    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Merge `overlay` into `base`, object fields recursively, last writer wins.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Emptiness rule for required-field enforcement.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
