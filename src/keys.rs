//! Keyboard key identifiers and normalization
//!
//! Every key that reaches the core, whether it comes from an input source or
//! from the configuration file, is normalized into a [`KeyId`] exactly once:
//!
//! - Character keys become `KeyId::Char` holding the lowercased character,
//!   so `J` and `j` are the same key.
//! - Everything else becomes `KeyId::Named` holding a canonical lowercase
//!   symbol. Left/right modifier variants collapse onto one symbol
//!   (`shift_l`, `shift_r` and `Shift` are all `shift`).
//!
//! The legacy script spellings are accepted too: `'j'`, `"j"` and
//! `keyboard.Key.f8`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix used by the legacy script for non-character keys
const LEGACY_KEY_PREFIX: &str = "keyboard.Key.";

/// A normalized keyboard key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyId {
    /// Literal character key, always lowercase
    Char(char),
    /// Non-character key, canonical lowercase symbol (e.g. "space", "shift", "f8")
    Named(String),
}

/// A key spelling that could not be turned into a [`KeyId`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid key name: '{0}'")]
pub struct InvalidKey(pub String);

impl KeyId {
    /// Build a character key (lowercased)
    pub fn char(c: char) -> Self {
        if c.is_whitespace() {
            return KeyId::Named("space".to_string());
        }
        let mut lower = c.to_lowercase();
        match (lower.next(), lower.next()) {
            (Some(l), None) => KeyId::Char(l),
            // Multi-char lowercase expansions keep the original character
            _ => KeyId::Char(c),
        }
    }

    /// Build a named key, applying modifier and alias canonicalization
    pub fn named(name: &str) -> Self {
        KeyId::Named(canonical_name(name))
    }

    /// Parse any accepted spelling into a normalized key
    pub fn parse(raw: &str) -> Result<Self, InvalidKey> {
        // A lone space is a valid character spelling and must not be trimmed away
        if raw == " " {
            return Ok(KeyId::char(' '));
        }

        let trimmed = raw.trim();
        let unquoted = strip_quotes(trimmed);
        if unquoted.len() != trimmed.len() && unquoted.chars().count() == 1 {
            // Quoted literal: 'j'
            return Ok(KeyId::char(unquoted.chars().next().unwrap_or(' ')));
        }

        let name = unquoted.strip_prefix(LEGACY_KEY_PREFIX).unwrap_or(unquoted);
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Err(InvalidKey(raw.to_string())),
            (Some(c), None) => Ok(KeyId::char(c)),
            _ => {
                if !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
                {
                    return Err(InvalidKey(raw.to_string()));
                }
                Ok(KeyId::named(name))
            }
        }
    }

    /// Whether this is a modifier key (shift, ctrl, alt, cmd)
    pub fn is_modifier(&self) -> bool {
        matches!(self, KeyId::Named(n) if matches!(n.as_str(), "shift" | "ctrl" | "alt" | "cmd"))
    }
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

/// Canonical symbol for a non-character key name
fn canonical_name(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase().replace('-', "_");

    // Collapse left/right variants: shift_l, shift_r, ctrl_l, alt_gr, ...
    let base = ["_l", "_r", "_left", "_right", "_gr"]
        .iter()
        .find_map(|suffix| lower.strip_suffix(suffix))
        .filter(|base| is_sided_modifier(base))
        .unwrap_or(&lower);

    // Also collapse the prefixed forms: leftshift, rightcontrol, lshift
    let base = ["left", "right", "l", "r"]
        .iter()
        .find_map(|prefix| base.strip_prefix(prefix))
        .map(|b| b.trim_start_matches('_'))
        .filter(|b| is_sided_modifier(b))
        .unwrap_or(base);

    match base {
        "control" | "ctl" => "ctrl",
        "option" => "alt",
        "super" | "meta" | "win" | "windows" | "command" => "cmd",
        "return" => "enter",
        "escape" => "esc",
        "spacebar" => "space",
        "del" => "delete",
        "ins" => "insert",
        "pgup" | "prior" => "page_up",
        "pgdn" | "next" => "page_down",
        "capslock" => "caps_lock",
        other => other,
    }
    .to_string()
}

fn is_sided_modifier(name: &str) -> bool {
    matches!(
        name,
        "shift" | "ctrl" | "control" | "alt" | "cmd" | "super" | "meta" | "win" | "command"
    )
}

impl FromStr for KeyId {
    type Err = InvalidKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyId::parse(s)
    }
}

impl TryFrom<String> for KeyId {
    type Error = InvalidKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        KeyId::parse(&value)
    }
}

impl From<KeyId> for String {
    fn from(key: KeyId) -> Self {
        key.to_string()
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Char(c) => write!(f, "{}", c),
            KeyId::Named(name) => f.write_str(name),
        }
    }
}
