//! Client context fed into the Directive Builder.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseContextError {
    #[error("unknown emergence type '{0}' (expected 'regular' or 'sleep')")]
    Emergence(String),
    #[error("unknown client level '{0}' (expected beginner, intermediate or advanced)")]
    ClientLevel(String),
    #[error("invalid level '{0}' (expected an integer from 0 to 100)")]
    Level(String),
}

/// How the generated script closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergenceType {
    /// Count back up to full alertness.
    #[default]
    Regular,
    /// Drift into sleep; never alert the listener.
    Sleep,
}

impl EmergenceType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Sleep => "sleep",
        }
    }
}

impl fmt::Display for EmergenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmergenceType {
    type Err = ParseContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regular" | "alert" | "wake" => Ok(Self::Regular),
            "sleep" => Ok(Self::Sleep),
            _ => Err(ParseContextError::Emergence(s.to_string())),
        }
    }
}

/// Listener experience with guided relaxation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl ClientLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for ClientLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientLevel {
    type Err = ParseContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" | "new" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" | "experienced" => Ok(Self::Advanced),
            _ => Err(ParseContextError::ClientLevel(s.to_string())),
        }
    }
}

/// A 0-100 dial. Values above 100 are unrepresentable by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Level(u8);

impl Level {
    pub const MAX: u8 = 100;

    /// Clamp `value` into 0..=100.
    #[must_use]
    pub fn new(value: u8) -> Self {
        Self(value.min(Self::MAX))
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = u8::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}

impl FromStr for Level {
    type Err = ParseContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u8 = s
            .trim()
            .parse()
            .map_err(|_| ParseContextError::Level(s.to_string()))?;
        if value > Self::MAX {
            return Err(ParseContextError::Level(s.to_string()));
        }
        Ok(Self(value))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Everything the Directive Builder knows about the listener and the session.
///
/// Missing fields take their values from `ClientContext::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientContext {
    #[serde(default)]
    pub client_level: ClientLevel,
    pub symbolic_level: Level,
    pub trance_depth: Level,
    #[serde(default)]
    pub emergence: EmergenceType,
    /// What the listener wants from the session, in their words.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_name: Option<String>,
    /// e.g. "sound", "touch", "temperature".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensory_preferences: Vec<String>,
}

impl Default for ClientContext {
    fn default() -> Self {
        Self {
            client_level: ClientLevel::Beginner,
            symbolic_level: Level::new(50),
            trance_depth: Level::new(50),
            emergence: EmergenceType::Regular,
            goal: None,
            preferred_name: None,
            sensory_preferences: Vec::new(),
        }
    }
}
