//! Compiler-argument snapshots and configuration change detection.
//!
//! After every successful build the compiler arguments are flattened into a
//! `key → string` mapping and written next to the chunk's cache. The next
//! build compares the current arguments against that snapshot; a change that
//! file-level dirty tracking cannot see (language version, optimization
//! flags, a disabled feature) forces a full rebuild of the chunk.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use kiln_config::{ArgValue, CompilerConfig};
use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// File name of the argument snapshot inside a representative's cache dir.
pub const ARGUMENTS_FILE: &str = "arguments.json";

/// The compiler arguments of the current build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilerArguments(BTreeMap<String, ArgValue>);

impl CompilerArguments {
    /// Creates an empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an argument, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: ArgValue) -> &mut Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Looks up an argument.
    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.0.get(key)
    }

    /// Iterates over arguments in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArgValue)> {
        self.0.iter()
    }
}

impl From<BTreeMap<String, ArgValue>> for CompilerArguments {
    fn from(map: BTreeMap<String, ArgValue>) -> Self {
        Self(map)
    }
}

/// Flattened arguments of a build, as persisted on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgumentsSnapshot(BTreeMap<String, String>);

impl ArgumentsSnapshot {
    /// Looks up a flattened value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterates over keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no arguments are recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Loads a snapshot. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>, BuildError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BuildError::io(path, e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| BuildError::CorruptSnapshot {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Writes the snapshot, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), BuildError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| BuildError::CorruptSnapshot {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|e| BuildError::io(path, e))
    }
}

impl FromIterator<(String, String)> for ArgumentsSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// First difference found between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationChange {
    /// Arguments were added or removed.
    KeySetChanged {
        /// Keys present only now.
        added: Vec<String>,
        /// Keys present only before.
        removed: Vec<String>,
    },
    /// A tracked flag went from `true` to something else.
    FlagDisabled {
        /// The flag.
        key: String,
    },
    /// An argument changed value.
    ValueChanged {
        /// The argument.
        key: String,
        /// Previous flattened value.
        old: String,
        /// Current flattened value.
        new: String,
    },
}

impl fmt::Display for ConfigurationChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationChange::KeySetChanged { added, removed } => write!(
                f,
                "argument set changed (added: [{}], removed: [{}])",
                added.join(", "),
                removed.join(", ")
            ),
            ConfigurationChange::FlagDisabled { key } => write!(f, "flag '{key}' was disabled"),
            ConfigurationChange::ValueChanged { key, old, new } => {
                write!(f, "argument '{key}' changed from '{old}' to '{new}'")
            }
        }
    }
}

/// Result of comparing the persisted snapshot with the current arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationCheck {
    /// No snapshot on disk: no prior successful build.
    NoSnapshot,
    /// A snapshot exists but could not be read.
    Unreadable(String),
    /// Arguments match the snapshot.
    Unchanged,
    /// Arguments differ from the snapshot.
    Changed(ConfigurationChange),
}

impl ConfigurationCheck {
    /// Returns `true` only for [`ConfigurationCheck::Changed`].
    pub fn is_changed(&self) -> bool {
        matches!(self, ConfigurationCheck::Changed(_))
    }
}

/// Decides whether the compiler configuration changed since the last
/// successful build.
///
/// Ignored arguments never participate. Tracked flags only count when they
/// go from `"true"` to anything else; turning them on is harmless. Any other
/// value change, and any difference in the key set, counts.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationChangeDetector {
    ignored: BTreeSet<String>,
    tracked_flags: BTreeSet<String>,
}

impl ConfigurationChangeDetector {
    /// Creates a detector from explicit lists.
    pub fn new<I, T>(ignored: I, tracked_flags: T) -> Self
    where
        I: IntoIterator<Item = String>,
        T: IntoIterator<Item = String>,
    {
        Self {
            ignored: ignored.into_iter().collect(),
            tracked_flags: tracked_flags.into_iter().collect(),
        }
    }

    /// Creates a detector from the `[compiler]` section.
    pub fn from_config(config: &CompilerConfig) -> Self {
        Self::new(
            config.ignored_arguments.iter().cloned(),
            config.tracked_flags.iter().cloned(),
        )
    }

    /// Flattens arguments, dropping ignored ones.
    ///
    /// Values are stored in their JSON form, so `"true"` and `true`, or
    /// `["a,b"]` and `["a", "b"]`, never flatten to the same string.
    pub fn flatten(&self, arguments: &CompilerArguments) -> ArgumentsSnapshot {
        arguments
            .iter()
            .filter(|(key, _)| !self.ignored.contains(*key))
            .map(|(key, value)| (key.clone(), encode_value(value)))
            .collect()
    }

    /// Returns the first relevant difference between two snapshots.
    pub fn compare(
        &self,
        previous: &ArgumentsSnapshot,
        current: &ArgumentsSnapshot,
    ) -> Option<ConfigurationChange> {
        // Snapshots written with a different ignore list may still hold ignored keys.
        let relevant = |s: &ArgumentsSnapshot| -> BTreeSet<String> {
            s.keys().filter(|k| !self.ignored.contains(*k)).cloned().collect()
        };
        let previous_keys = relevant(previous);
        let current_keys = relevant(current);

        if previous_keys != current_keys {
            return Some(ConfigurationChange::KeySetChanged {
                added: current_keys.difference(&previous_keys).cloned().collect(),
                removed: previous_keys.difference(&current_keys).cloned().collect(),
            });
        }

        for key in &current_keys {
            let (Some(old), Some(new)) = (previous.get(key), current.get(key)) else {
                continue;
            };
            if old == new {
                continue;
            }
            if self.tracked_flags.contains(key) {
                if old == "true" {
                    return Some(ConfigurationChange::FlagDisabled { key: key.clone() });
                }
                continue;
            }
            return Some(ConfigurationChange::ValueChanged {
                key: key.clone(),
                old: old.to_string(),
                new: new.to_string(),
            });
        }
        None
    }

    /// Compares the snapshot stored at `previous` with `current`.
    pub fn check(&self, previous: &Path, current: &CompilerArguments) -> ConfigurationCheck {
        match ArgumentsSnapshot::load(previous) {
            Ok(None) => ConfigurationCheck::NoSnapshot,
            Ok(Some(snapshot)) => match self.compare(&snapshot, &self.flatten(current)) {
                Some(change) => ConfigurationCheck::Changed(change),
                None => ConfigurationCheck::Unchanged,
            },
            Err(e) => ConfigurationCheck::Unreadable(e.to_string()),
        }
    }

    /// Returns `true` if the configuration changed since `previous` was written.
    ///
    /// A missing snapshot is not a change. An unreadable one is logged and
    /// also treated as no change; dirty tracking still applies.
    pub fn has_configuration_changed(&self, previous: &Path, current: &CompilerArguments) -> bool {
        match self.check(previous, current) {
            ConfigurationCheck::Changed(change) => {
                tracing::info!(%change, "compiler configuration changed");
                true
            }
            ConfigurationCheck::Unreadable(reason) => {
                tracing::error!(path = %previous.display(), %reason, "could not read previous compiler arguments");
                false
            }
            ConfigurationCheck::NoSnapshot | ConfigurationCheck::Unchanged => false,
        }
    }
}

fn encode_value(value: &ArgValue) -> String {
    let json = match value {
        ArgValue::Bool(b) => serde_json::Value::from(*b),
        ArgValue::Integer(i) => serde_json::Value::from(*i),
        ArgValue::Float(x) => serde_json::Value::from(*x),
        ArgValue::Text(s) => serde_json::Value::from(s.as_str()),
        ArgValue::List(items) => serde_json::Value::from(items.clone()),
    };
    json.to_string()
}
