//! Hardware families reported by the Pulse API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Device family as encoded in the `deviceType` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Pulse One.
    PulseOne,
    /// Pulse Pro.
    PulsePro,
    /// Pulse Hub.
    Hub,
    /// Sensor attached to a hub.
    Sensor,
    /// Pulse Controller.
    Controller,
    /// Pulse Zero.
    PulseZero,
    /// Anything the API reports that we do not know about.
    Unknown,
}

impl DeviceType {
    /// Maps a wire code to a device type.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::PulseOne,
            1 => Self::PulsePro,
            2 => Self::Hub,
            3 => Self::Sensor,
            4 => Self::Controller,
            5 => Self::PulseZero,
            _ => Self::Unknown,
        }
    }

    /// Parses a JSON `deviceType` value (numeric or numeric string).
    pub fn parse(value: Option<&Value>) -> Self {
        let code = match value {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        code.map_or(Self::Unknown, Self::from_code)
    }

    /// Wire code, if this type has one.
    pub fn code(self) -> Option<i64> {
        match self {
            Self::PulseOne => Some(0),
            Self::PulsePro => Some(1),
            Self::Hub => Some(2),
            Self::Sensor => Some(3),
            Self::Controller => Some(4),
            Self::PulseZero => Some(5),
            Self::Unknown => None,
        }
    }

    /// Human-readable model name.
    pub fn model_name(self) -> &'static str {
        match self {
            Self::PulseOne => "Pulse One",
            Self::PulsePro => "Pulse Pro",
            Self::Hub => "Pulse Hub",
            Self::Sensor => "Pulse Sensor",
            Self::Controller => "Pulse Controller",
            Self::PulseZero => "Pulse Zero",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.model_name())
    }
}
