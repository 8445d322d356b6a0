use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::api::apply_override_to_snapshot;
use crate::defaults::default_snapshot;
use crate::errors::PolicyError;
use crate::model::{PolicySnapshot, PolicySource};

pub const ENV_PREFIX: &str = "LOCUS_POLICY__";
pub const ENV_JSON: &str = "LOCUS_POLICY_OVERRIDE_JSON";
pub const ENV_CLI_OVERRIDES: &str = "LOCUS_POLICY_CLI_OVERRIDES";

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
    pub include_cli_env: bool,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
            include_cli_env: true,
        }
    }

    /// Builtin defaults only; ignores files and the environment.
    pub fn builtin() -> Self {
        Self::default()
    }
}

pub fn load_snapshot(path: Option<&Path>) -> Result<PolicySnapshot, PolicyError> {
    let mut options = LoadOptions {
        include_env: true,
        include_cli_env: true,
        ..LoadOptions::default()
    };
    if let Some(p) = path {
        options.paths.push(p.to_path_buf());
    }
    load_snapshot_with_options(&options)
}

/// Layers builtin defaults, YAML files, `LOCUS_POLICY__*` variables, the JSON
/// override variable and CLI-style overrides, in that order.
pub fn load_snapshot_with_options(options: &LoadOptions) -> Result<PolicySnapshot, PolicyError> {
    let mut snapshot = default_snapshot();
    bootstrap_builtin_provenance(&mut snapshot)?;

    for path in &options.paths {
        if path.exists() {
            let overlay = overlays_from_file(path)?;
            apply_overlays(&mut snapshot, overlay)?;
        }
    }

    if options.include_env {
        let env_overlays = overlays_from_env()?;
        apply_overlays(&mut snapshot, env_overlays)?;
    }

    if options.include_cli_env {
        let cli_overlays = overlays_from_cli_env();
        apply_overlays(&mut snapshot, cli_overlays)?;
    }

    Ok(snapshot)
}

struct PolicyOverlay {
    path: String,
    value: Value,
    source: PolicySource,
}

fn apply_overlays(
    snapshot: &mut PolicySnapshot,
    overlays: Vec<PolicyOverlay>,
) -> Result<(), PolicyError> {
    for overlay in overlays {
        apply_override_to_snapshot(snapshot, &overlay.path, &overlay.value, overlay.source)?;
    }
    Ok(())
}

fn overlays_from_file(path: &Path) -> Result<Vec<PolicyOverlay>, PolicyError> {
    let content = fs::read_to_string(path).map_err(|err| PolicyError::Io(err.to_string()))?;
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|err| PolicyError::Invalid(err.to_string()))?;
    let json_value =
        serde_json::to_value(yaml_value).map_err(|err| PolicyError::Invalid(err.to_string()))?;
    Ok(flatten_value(json_value, None, PolicySource::File))
}

fn overlays_from_env() -> Result<Vec<PolicyOverlay>, PolicyError> {
    let mut overlays = Vec::new();
    for (key, raw) in env::vars() {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let path = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join(".");
        if path.is_empty() {
            continue;
        }
        overlays.push(PolicyOverlay {
            path,
            value: parse_env_value(&raw),
            source: PolicySource::Env,
        });
    }

    if let Ok(raw_json) = env::var(ENV_JSON) {
        if !raw_json.trim().is_empty() {
            let json_value: Value = serde_json::from_str(&raw_json)
                .map_err(|err| PolicyError::Invalid(err.to_string()))?;
            overlays.extend(flatten_value(json_value, None, PolicySource::Env));
        }
    }

    Ok(overlays)
}

fn overlays_from_cli_env() -> Vec<PolicyOverlay> {
    let Ok(raw) = env::var(ENV_CLI_OVERRIDES) else {
        return Vec::new();
    };
    raw.split(',')
        .filter_map(|token| {
            let (path, value_raw) = token.trim().split_once('=').unwrap_or((token.trim(), ""));
            let path = path.trim();
            if path.is_empty() {
                return None;
            }
            Some(PolicyOverlay {
                path: path.to_string(),
                value: parse_env_value(value_raw.trim()),
                source: PolicySource::Cli,
            })
        })
        .collect()
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    Value::String(raw.to_string())
}

fn flatten_value(value: Value, prefix: Option<String>, source: PolicySource) -> Vec<PolicyOverlay> {
    match value {
        Value::Object(map) => {
            let mut result = Vec::new();
            for (key, value) in map {
                let key_segment = key.trim().to_ascii_lowercase();
                let next_prefix = match &prefix {
                    Some(prefix) if !prefix.is_empty() => format!("{prefix}.{key_segment}"),
                    _ => key_segment,
                };
                result.extend(flatten_value(value, Some(next_prefix), source));
            }
            result
        }
        other => match prefix {
            Some(path) => vec![PolicyOverlay {
                path,
                value: other,
                source,
            }],
            None => Vec::new(),
        },
    }
}

fn bootstrap_builtin_provenance(snapshot: &mut PolicySnapshot) -> Result<(), PolicyError> {
    let sections = [
        ("timeouts", serde_json::to_value(&snapshot.timeouts)),
        ("polling", serde_json::to_value(&snapshot.polling)),
        ("criteria", serde_json::to_value(&snapshot.criteria)),
        ("logging", serde_json::to_value(&snapshot.logging)),
    ];

    let mut overlays = Vec::new();
    for (name, value) in sections {
        let value = value.map_err(|err| PolicyError::Invalid(err.to_string()))?;
        overlays.extend(flatten_value(
            value,
            Some(name.to_string()),
            PolicySource::Builtin,
        ));
    }

    for overlay in overlays {
        snapshot.set_provenance(&overlay.path, overlay.source);
    }
    Ok(())
}
