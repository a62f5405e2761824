//! Configuration management for Mouse2Pad
//!
//! Loads the YAML configuration snapshot once at startup. Loading is
//! forgiving: a missing or malformed value falls back to its default and is
//! reported as a [`ConfigIssue`] instead of failing the whole load. The only
//! hard errors are I/O failures other than "file not found".

pub mod mapping;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::keys::KeyId;
use crate::pad::ButtonId;
use crate::state::Sensitivity;

pub use mapping::{MappingEntry, MappingTable};

/// Lowest accepted update rate
pub const MIN_UPDATE_RATE_HZ: u32 = 30;
/// Highest accepted update rate
pub const MAX_UPDATE_RATE_HZ: u32 = 240;

/// Resolved configuration, read-only for the lifetime of the core
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    /// Stick units per pixel of horizontal pointer movement (> 0)
    pub sensitivity_x: f64,
    /// Trigger units per pixel of vertical pointer movement (>= 0, 0 disables)
    pub sensitivity_trigger: f64,
    /// Update loop rate, within 30..=240
    pub update_rate_hz: u32,
    /// Key that re-centers the stick and releases both triggers
    pub reset_key: KeyId,
    /// Key that holds the left trigger at maximum while pressed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_left_trigger_key: Option<KeyId>,
    /// Key that holds the right trigger at maximum while pressed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_right_trigger_key: Option<KeyId>,
    /// Output backend name ("console", "null")
    pub output: String,
    /// Key → button table
    pub mappings: MappingTable,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sensitivity_x: default_sensitivity_x(),
            sensitivity_trigger: default_sensitivity_trigger(),
            update_rate_hz: default_update_rate_hz(),
            reset_key: default_reset_key(),
            full_left_trigger_key: None,
            full_right_trigger_key: None,
            output: default_output(),
            mappings: MappingTable::defaults(),
        }
    }
}

/// A configuration value that was ignored or adjusted during loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl AppConfig {
    /// Load configuration from file, falling back to defaults per field
    ///
    /// A missing file yields the default configuration.
    pub async fn load(path: &Path) -> Result<(Self, Vec<ConfigIssue>)> {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No config file at {}, using defaults", path.display());
                return Ok((Self::default(), Vec::new()));
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))
            }
        };

        let (config, issues) = Self::from_yaml_str(&contents);
        for issue in &issues {
            warn!("Config {}: {}", path.display(), issue);
        }
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok((config, issues))
    }

    /// Parse configuration text; never fails, see [`ConfigIssue`]
    pub fn from_yaml_str(contents: &str) -> (Self, Vec<ConfigIssue>) {
        let mut issues = Vec::new();

        let mut broken = Vec::new();
        let root = match serde_yaml::from_str::<Value>(contents) {
            Ok(Value::Mapping(map)) => map,
            Ok(Value::Null) => Mapping::new(),
            Ok(_) => {
                issues.push(ConfigIssue::new("<root>", "expected a mapping, using defaults"));
                Mapping::new()
            }
            Err(e) => {
                debug!("Config is not valid YAML as a whole ({}), parsing sections one by one", e);
                parse_sections(contents, &mut issues, &mut broken)
            }
        };

        let mut reader = FieldReader {
            root: &root,
            broken: &broken,
            issues: &mut issues,
        };

        let sensitivity_x = reader.number(
            &["sensitivity_x", "MOUSE_SENSITIVITY_X"],
            default_sensitivity_x(),
            |v| v > 0.0,
            "must be a positive number",
        );
        let sensitivity_trigger = reader.number(
            &["sensitivity_trigger", "MOUSE_SENSITIVITY_TRIGGER"],
            default_sensitivity_trigger(),
            |v| v >= 0.0,
            "must be zero or a positive number",
        );
        let update_rate_hz = reader.update_rate(&["update_rate_hz", "UPDATE_RATE"]);
        let reset_key = reader
            .key(&["reset_key", "RESET_KEY"])
            .unwrap_or_else(default_reset_key);
        let full_left_trigger_key = reader.key(&["full_left_trigger_key", "FULL_LEFT_TRIGGER_KEY"]);
        let full_right_trigger_key =
            reader.key(&["full_right_trigger_key", "FULL_RIGHT_TRIGGER_KEY"]);
        let output = reader.string(&["output"]).unwrap_or_else(default_output);
        let mappings = reader.mappings(&["mappings", "KEY_MAPPINGS"]);

        let config = Self {
            sensitivity_x,
            sensitivity_trigger,
            update_rate_hz,
            reset_key,
            full_left_trigger_key,
            full_right_trigger_key,
            output,
            mappings,
        };
        issues.extend(config.shadowed_bindings());

        (config, issues)
    }

    /// Save configuration to file, copying the previous file to `<path>.bak` first
    ///
    /// Returns the backup path when a backup was made.
    pub async fn save(&self, path: &Path) -> Result<Option<PathBuf>> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        let exists = fs::try_exists(path)
            .await
            .with_context(|| format!("Failed to check for existing config at {}", path.display()))?;
        let backup = if exists {
            let backup = backup_path(path);
            fs::copy(path, &backup)
                .await
                .with_context(|| format!("Failed to back up config to {}", backup.display()))?;
            info!("Backed up {} to {}", path.display(), backup.display());
            Some(backup)
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            None
        };

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(backup)
    }

    /// Scale factors for the update loop
    pub fn sensitivity(&self) -> Sensitivity {
        Sensitivity {
            x: self.sensitivity_x,
            trigger: self.sensitivity_trigger,
        }
    }

    /// Button bound to `key`, if any
    pub fn key_to_button(&self, key: &KeyId) -> Option<ButtonId> {
        self.mappings.lookup(key)
    }

    /// Bindings that can never fire because a higher-priority key wins
    fn shadowed_bindings(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let hotkeys = [
            ("reset_key", Some(&self.reset_key)),
            ("full_left_trigger_key", self.full_left_trigger_key.as_ref()),
            ("full_right_trigger_key", self.full_right_trigger_key.as_ref()),
        ];

        for (i, (name, key)) in hotkeys.iter().enumerate() {
            let Some(key) = key else { continue };
            if let Some((winner, _)) = hotkeys[..i].iter().find(|(_, k)| *k == Some(*key)) {
                issues.push(ConfigIssue::new(
                    *name,
                    format!("key '{}' is already the {}, binding is unreachable", key, winner),
                ));
            }
            if let Some(button) = self.mappings.lookup(key) {
                issues.push(ConfigIssue::new(
                    "mappings",
                    format!("key '{}' → {} is shadowed by {}", key, button, name),
                ));
            }
        }
        issues
    }
}

/// `<path>.bak` next to the config file
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Pulls typed fields out of the raw YAML tree, recording every fallback
struct FieldReader<'a> {
    root: &'a Mapping,
    /// Top-level sections whose YAML could not be parsed
    broken: &'a [String],
    issues: &'a mut Vec<ConfigIssue>,
}

impl<'a> FieldReader<'a> {
    /// First present, non-null value among the accepted spellings of a field
    fn get(&self, names: &[&str]) -> Option<&'a Value> {
        let root = self.root;
        names
            .iter()
            .find_map(|name| root.get(*name))
            .filter(|v| !v.is_null())
    }

    fn number(
        &mut self,
        names: &[&str],
        default: f64,
        valid: impl Fn(f64) -> bool,
        requirement: &str,
    ) -> f64 {
        let Some(value) = self.get(names) else {
            return default;
        };
        match value_as_f64(value) {
            Some(v) if v.is_finite() && valid(v) => v,
            _ => {
                self.issues.push(ConfigIssue::new(
                    names[0],
                    format!("{:?} {}, using default {}", value, requirement, default),
                ));
                default
            }
        }
    }

    fn update_rate(&mut self, names: &[&str]) -> u32 {
        let default = default_update_rate_hz();
        let Some(value) = self.get(names) else {
            return default;
        };
        let Some(rate) = value_as_f64(value).filter(|v| v.is_finite() && *v > 0.0) else {
            self.issues.push(ConfigIssue::new(
                names[0],
                format!("{:?} is not a positive rate, using default {}", value, default),
            ));
            return default;
        };

        let clamped = rate
            .round()
            .clamp(MIN_UPDATE_RATE_HZ as f64, MAX_UPDATE_RATE_HZ as f64) as u32;
        if clamped as f64 != rate {
            self.issues.push(ConfigIssue::new(
                names[0],
                format!(
                    "{} Hz adjusted to {} Hz (supported range {}-{})",
                    rate, clamped, MIN_UPDATE_RATE_HZ, MAX_UPDATE_RATE_HZ
                ),
            ));
        }
        clamped
    }

    fn string(&mut self, names: &[&str]) -> Option<String> {
        let value = self.get(names)?;
        match value_as_text(value) {
            Some(s) => Some(s),
            None => {
                self.issues.push(ConfigIssue::new(
                    names[0],
                    format!("{:?} is not a string, using default", value),
                ));
                None
            }
        }
    }

    /// Optional key; empty or invalid spellings count as "not configured"
    fn key(&mut self, names: &[&str]) -> Option<KeyId> {
        let raw = self.string(names)?;
        if raw.trim().is_empty() && raw != " " {
            return None;
        }
        match KeyId::parse(&raw) {
            Ok(key) => Some(key),
            Err(e) => {
                self.issues.push(ConfigIssue::new(names[0], e.to_string()));
                None
            }
        }
    }

    fn mappings(&mut self, names: &[&str]) -> MappingTable {
        let field = names[0];
        if names.iter().any(|name| self.broken.iter().any(|b| b == name)) {
            // Present but unparseable: nothing is mapped (issue already recorded)
            return MappingTable::default();
        }
        let Some(value) = self.get(names) else {
            return MappingTable::defaults();
        };

        let pairs: Vec<(&Value, &Value)> = match value {
            Value::Sequence(items) => {
                let mut pairs = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    match (item.get("key"), item.get("button")) {
                        (Some(key), Some(button)) => pairs.push((key, button)),
                        _ => self.issues.push(ConfigIssue::new(
                            format!("{}[{}]", field, idx),
                            "entry needs both 'key' and 'button', skipped",
                        )),
                    }
                }
                pairs
            }
            Value::Mapping(map) => map.iter().collect(),
            other => {
                self.issues.push(ConfigIssue::new(
                    field,
                    format!("{:?} is neither a list nor a mapping, no keys will be mapped", other),
                ));
                return MappingTable::default();
            }
        };

        let mut entries = Vec::with_capacity(pairs.len());
        for (key, button) in pairs {
            let key = value_as_text(key).map(|k| KeyId::parse(&k));
            let button = value_as_text(button).map(|b| b.parse::<ButtonId>());
            match (key, button) {
                (Some(Ok(key)), Some(Ok(button))) => entries.push(MappingEntry::new(key, button)),
                (Some(Err(e)), _) => self.issues.push(ConfigIssue::new(field, format!("{}, entry skipped", e))),
                (_, Some(Err(e))) => self.issues.push(ConfigIssue::new(field, format!("{}, entry skipped", e))),
                _ => self.issues.push(ConfigIssue::new(field, "non-text key or button, entry skipped")),
            }
        }
        MappingTable::from_entries(entries)
    }
}

/// Parse each top-level section on its own so one syntax error only costs that section
///
/// A section starts at every line beginning in column 0 that is not a
/// comment or a sequence item. Sections that fail to parse are recorded in
/// `broken` by their key.
fn parse_sections(contents: &str, issues: &mut Vec<ConfigIssue>, broken: &mut Vec<String>) -> Mapping {
    let mut sections: Vec<String> = Vec::new();
    for line in contents.lines() {
        let starts_section = line
            .chars()
            .next()
            .is_some_and(|c| !c.is_whitespace() && c != '#' && c != '-');
        if starts_section || sections.is_empty() {
            sections.push(String::new());
        }
        if let Some(section) = sections.last_mut() {
            section.push_str(line);
            section.push('\n');
        }
    }

    let mut root = Mapping::new();
    for section in &sections {
        match serde_yaml::from_str::<Value>(section) {
            Ok(Value::Mapping(map)) => root.extend(map),
            Ok(Value::Null) => {}
            Ok(_) => issues.push(ConfigIssue::new("<root>", "expected a mapping, section ignored")),
            Err(e) => {
                let key = section_key(section);
                issues.push(ConfigIssue::new(
                    key.as_deref().unwrap_or("<root>"),
                    format!("unparseable YAML ({}), using default", e),
                ));
                broken.extend(key);
            }
        }
    }
    root
}

/// Key named on the first line of a top-level section
fn section_key(section: &str) -> Option<String> {
    let first = section.lines().next()?;
    let (key, _) = first.split_once(':')?;
    let key = key.trim().trim_matches(|c| c == '"' || c == '\'');
    (!key.is_empty()).then(|| key.to_string())
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// Default value functions
fn default_sensitivity_x() -> f64 { 50.0 }
fn default_sensitivity_trigger() -> f64 { 1.0 }
fn default_update_rate_hz() -> u32 { 60 }
fn default_reset_key() -> KeyId { KeyId::named("f8") }
fn default_output() -> String { "console".to_string() }
