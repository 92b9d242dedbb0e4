//! # Manifest Schema and Parsing
//!
//! This module defines the `plugsync.yaml` manifest and the logic for
//! turning it into plugin declarations. A manifest has two optional
//! top-level keys:
//!
//! ```yaml
//! settings:
//!   plugin_dir: ~/.local/share/plugsync/plugins
//!   rollback_dir: ~/.local/share/plugsync/rollback
//!   concurrency: 4
//!   timeout_secs: 30
//!   on_timeout: kill        # or: detach
//! plugins:
//!   - owner/repo                      # shorthand entry
//!   - source: https://example.com/tool.git
//!     name: tool
//!     checkout: v1.0                  # string, true (default branch) or false
//!     track: main
//!     hooks:
//!       post_change: ["make", "build"]
//! ```
//!
//! ## Validation
//!
//! Settings are deserialized with `serde` and reject unknown keys. Plugin
//! entries are checked field by field from the raw YAML value so that a
//! wrongly typed field (`source: 42`, `checkout: [1]`) yields an
//! [`Error::Validation`] naming that field, and unknown keys come with a
//! "did you mean" hint.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::defaults;
use crate::error::{Error, Result};
use crate::hooks::{Hook, HookKind, Hooks};
use crate::scheduler::{OnTimeout, SchedulerSettings, DEFAULT_TIMEOUT_PER_JOB};
use crate::spec::{CheckoutTarget, SpecOptions};
use crate::suggestions::did_you_mean;

/// Default manifest file name.
pub const DEFAULT_MANIFEST: &str = "plugsync.yaml";

const PLUGIN_FIELDS: [&str; 5] = ["source", "name", "checkout", "track", "hooks"];
const TOP_LEVEL_KEYS: [&str; 2] = ["settings", "plugins"];

/// Engine settings from the `settings` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Directory holding one checkout per plugin.
    #[serde(default)]
    pub plugin_dir: Option<PathBuf>,
    /// Directory for automatic pre-checkout snapshots.
    #[serde(default)]
    pub rollback_dir: Option<PathBuf>,
    /// Maximum number of git processes in flight.
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// Per-job timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub on_timeout: Option<OnTimeout>,
}

impl Settings {
    pub fn plugin_dir(&self) -> PathBuf {
        self.plugin_dir
            .as_deref()
            .map(defaults::expand_tilde)
            .unwrap_or_else(defaults::default_plugin_dir)
    }

    pub fn rollback_dir(&self) -> PathBuf {
        self.rollback_dir
            .as_deref()
            .map(defaults::expand_tilde)
            .unwrap_or_else(defaults::default_rollback_dir)
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        let base = SchedulerSettings::default();
        SchedulerSettings {
            concurrency: self.concurrency.unwrap_or(base.concurrency).max(1),
            timeout_per_job: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT_PER_JOB),
            on_timeout: self.on_timeout.unwrap_or_default(),
        }
    }
}

/// One plugin declaration before normalization.
#[derive(Debug, Clone)]
pub struct PluginEntry {
    pub source: String,
    pub options: SpecOptions,
}

/// A parsed manifest.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub settings: Settings,
    pub plugins: Vec<PluginEntry>,
}

/// Parse a manifest from a YAML string.
pub fn parse(yaml: &str) -> Result<Manifest> {
    let value: Value = serde_yaml::from_str(yaml)?;
    let mapping = match value {
        Value::Null => return Ok(Manifest::default()),
        Value::Mapping(mapping) => mapping,
        other => {
            return Err(Error::Manifest {
                message: format!("expected a mapping at the top level, got {}", type_name(&other)),
                hint: Some("Start the file with 'plugins:'".to_string()),
            })
        }
    };

    let mut manifest = Manifest::default();
    for (key, value) in mapping {
        let key = key_name(&key).ok_or_else(|| Error::Manifest {
            message: "top-level keys must be strings".to_string(),
            hint: None,
        })?;
        match key.as_str() {
            "settings" => {
                if !value.is_null() {
                    manifest.settings =
                        serde_yaml::from_value(value).map_err(|e| Error::Manifest {
                            message: format!("invalid settings: {}", e),
                            hint: None,
                        })?;
                }
            }
            "plugins" => manifest.plugins = parse_plugins(&value)?,
            other => {
                return Err(Error::Manifest {
                    message: format!("unknown top-level key '{}'", other),
                    hint: did_you_mean(other, &TOP_LEVEL_KEYS)
                        .map(|s| format!("Did you mean '{}'?", s)),
                })
            }
        }
    }
    Ok(manifest)
}

/// Load and parse a manifest file.
pub fn from_file(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

fn parse_plugins(value: &Value) -> Result<Vec<PluginEntry>> {
    let entries = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Sequence(entries) => entries,
        other => {
            return Err(Error::Manifest {
                message: format!("'plugins' must be a list, got {}", type_name(other)),
                hint: None,
            })
        }
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            plugin_from_value(entry).map_err(|e| match e {
                Error::Validation {
                    field,
                    message,
                    hint,
                } => Error::Validation {
                    field,
                    message: format!("plugin #{}: {}", index + 1, message),
                    hint,
                },
                other => other,
            })
        })
        .collect()
}

/// Validate one raw plugin entry.
///
/// Accepts a bare source string or a mapping with the fields `source`,
/// `name`, `checkout`, `track` and `hooks`.
pub fn plugin_from_value(value: &Value) -> Result<PluginEntry> {
    let mapping = match value {
        Value::String(source) => {
            return Ok(PluginEntry {
                source: source.clone(),
                options: SpecOptions::default(),
            })
        }
        Value::Mapping(mapping) => mapping,
        other => {
            return Err(Error::validation(
                "source",
                format!("must be a string, got {}", type_name(other)),
            ))
        }
    };

    let mut source = None;
    let mut options = SpecOptions::default();

    for (key, value) in mapping {
        let Some(key) = key_name(key) else {
            return Err(Error::validation("source", "field names must be strings"));
        };
        match key.as_str() {
            "source" => source = Some(expect_string("source", value)?),
            "name" => options.name = Some(expect_string("name", value)?),
            "checkout" => {
                options.checkout = match value {
                    Value::String(s) => Some(CheckoutTarget::Ref(s.clone())),
                    Value::Bool(b) => Some(CheckoutTarget::from_bool(*b)),
                    Value::Null => None,
                    other => {
                        return Err(Error::validation(
                            "checkout",
                            format!("must be a string or boolean, got {}", type_name(other)),
                        ))
                    }
                }
            }
            "track" => {
                options.track = match value {
                    Value::Null => None,
                    other => Some(expect_string("track", other)?),
                }
            }
            "hooks" => options.hooks = parse_hooks(value)?,
            other => {
                return Err(Error::Validation {
                    field: other.to_string(),
                    message: "unknown field".to_string(),
                    hint: did_you_mean(other, &PLUGIN_FIELDS)
                        .map(|s| format!("Did you mean '{}'?", s)),
                })
            }
        }
    }

    let source = source.ok_or_else(|| Error::validation("source", "is required"))?;
    Ok(PluginEntry { source, options })
}

fn parse_hooks(value: &Value) -> Result<Hooks> {
    let mapping: &Mapping = match value {
        Value::Null => return Ok(Hooks::default()),
        Value::Mapping(mapping) => mapping,
        other => {
            return Err(Error::validation(
                "hooks",
                format!("must be a mapping, got {}", type_name(other)),
            ))
        }
    };

    let names: Vec<&str> = HookKind::ALL.iter().map(|k| k.name()).collect();
    let mut hooks = Hooks::default();
    for (key, value) in mapping {
        let name = key_name(key).unwrap_or_default();
        let kind = HookKind::from_name(&name).ok_or_else(|| Error::Validation {
            field: name.clone(),
            message: "unknown hook".to_string(),
            hint: did_you_mean(&name, &names).map(|s| format!("Did you mean '{}'?", s)),
        })?;
        let argv = match value {
            Value::Sequence(items) if !items.is_empty() => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(Error::validation(
                        kind.name(),
                        format!("command arguments must be strings, got {}", type_name(other)),
                    )),
                })
                .collect::<Result<Vec<_>>>()?,
            other => {
                return Err(Error::Validation {
                    field: kind.name().to_string(),
                    message: format!("must be a non-empty command list, got {}", type_name(other)),
                    hint: Some("Write hooks as argv lists, e.g. [\"make\", \"build\"]".to_string()),
                })
            }
        };
        hooks.set(kind, Hook::Command(argv));
    }
    Ok(hooks)
}

fn expect_string(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(Error::validation(
            field,
            format!("must be a string, got {}", type_name(other)),
        )),
    }
}

fn key_name(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_manifest() {
        let manifest = parse("").unwrap();
        assert!(manifest.plugins.is_empty());
        assert_eq!(manifest.settings, Settings::default());
    }

    #[test]
    fn test_parse_full_manifest() {
        let yaml = r#"
settings:
  plugin_dir: /data/plugins
  concurrency: 3
  timeout_secs: 5
  on_timeout: detach
plugins:
  - user/repo
  - source: https://example.com/tool.git
    name: tool
    checkout: v1.0
    track: main
    hooks:
      post_change: ["make", "build"]
  - source: ./local
    checkout: false
"#;
        let manifest = parse(yaml).unwrap();
        assert_eq!(manifest.plugins.len(), 3);
        assert_eq!(manifest.plugins[0].source, "user/repo");

        let tool = &manifest.plugins[1];
        assert_eq!(tool.options.name.as_deref(), Some("tool"));
        assert_eq!(
            tool.options.checkout,
            Some(CheckoutTarget::Ref("v1.0".to_string()))
        );
        assert_eq!(tool.options.track.as_deref(), Some("main"));
        assert!(matches!(
            tool.options.hooks.post_change,
            Some(Hook::Command(ref argv)) if argv == &["make", "build"]
        ));

        assert_eq!(
            manifest.plugins[2].options.checkout,
            Some(CheckoutTarget::Disabled)
        );

        let settings = manifest.settings.scheduler_settings();
        assert_eq!(settings.concurrency, 3);
        assert_eq!(settings.timeout_per_job, Duration::from_secs(5));
        assert_eq!(settings.on_timeout, OnTimeout::Detach);
        assert_eq!(manifest.settings.plugin_dir(), PathBuf::from("/data/plugins"));
    }

    #[test]
    fn test_checkout_true_means_default_branch() {
        let entry = plugin_from_value(&serde_yaml::from_str("{source: a/b, checkout: true}").unwrap())
            .unwrap();
        assert_eq!(entry.options.checkout, Some(CheckoutTarget::DefaultBranch));
    }

    #[test]
    fn test_numeric_source_is_rejected() {
        let value: Value = serde_yaml::from_str("42").unwrap();
        let error = plugin_from_value(&value).unwrap_err();
        assert_eq!(error.field(), Some("source"));

        let error = parse("plugins:\n  - source: 42\n").unwrap_err();
        assert_eq!(error.field(), Some("source"));
        assert!(error.to_string().contains("plugin #1"));
        assert!(error.to_string().contains("number"));
    }

    #[test]
    fn test_wrongly_typed_fields_name_the_field() {
        let cases = [
            ("{source: a/b, name: 3}", "name"),
            ("{source: a/b, checkout: [v1]}", "checkout"),
            ("{source: a/b, track: true}", "track"),
            ("{source: a/b, hooks: make}", "hooks"),
            ("{source: a/b, hooks: {post_change: make}}", "post_change"),
            ("{source: a/b, hooks: {pre_change: [1]}}", "pre_change"),
            ("{name: x}", "source"),
        ];
        for (yaml, field) in cases {
            let value: Value = serde_yaml::from_str(yaml).unwrap();
            let error = plugin_from_value(&value).unwrap_err();
            assert_eq!(error.field(), Some(field), "input {}", yaml);
        }
    }

    #[test]
    fn test_unknown_field_suggests_similar() {
        let value: Value = serde_yaml::from_str("{source: a/b, chekout: v1}").unwrap();
        let message = plugin_from_value(&value).unwrap_err().to_string();
        assert!(message.contains("unknown field"));
        assert!(message.contains("Did you mean 'checkout'?"));
    }

    #[test]
    fn test_unknown_hook_suggests_similar() {
        let value: Value =
            serde_yaml::from_str("{source: a/b, hooks: {post_chnage: [make]}}").unwrap();
        let message = plugin_from_value(&value).unwrap_err().to_string();
        assert!(message.contains("unknown hook"));
        assert!(message.contains("post_change"));
    }

    #[test]
    fn test_unknown_top_level_key() {
        let error = parse("plugin:\n  - a/b\n").unwrap_err();
        assert!(matches!(error, Error::Manifest { .. }));
        assert!(error.to_string().contains("Did you mean 'plugins'?"));
    }

    #[test]
    fn test_invalid_settings() {
        let error = parse("settings:\n  concurrency: lots\n").unwrap_err();
        assert!(error.to_string().contains("invalid settings"));

        let error = parse("settings:\n  paralelism: 2\n").unwrap_err();
        assert!(error.to_string().contains("invalid settings"));
    }

    #[test]
    fn test_plugins_must_be_a_list() {
        let error = parse("plugins: user/repo\n").unwrap_err();
        assert!(error.to_string().contains("must be a list"));
    }

    #[test]
    fn test_concurrency_zero_is_clamped() {
        let settings = Settings {
            concurrency: Some(0),
            ..Default::default()
        };
        assert_eq!(settings.scheduler_settings().concurrency, 1);
    }

    #[test]
    fn test_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(DEFAULT_MANIFEST);
        std::fs::write(&path, "plugins:\n  - user/repo\n").unwrap();
        let manifest = from_file(&path).unwrap();
        assert_eq!(manifest.plugins.len(), 1);

        assert!(matches!(
            from_file(&temp.path().join("missing.yaml")),
            Err(Error::Io(_))
        ));
    }
}
