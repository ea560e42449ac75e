//! Records returned by the data providers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a logged call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Incoming,
    Outgoing,
    Missed,
    Unknown,
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CallType::Incoming => "Incoming",
            CallType::Outgoing => "Outgoing",
            CallType::Missed => "Missed",
            CallType::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// One row of the call log, most recent first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallLogEntry {
    /// Remote party number
    pub number: String,

    /// Incoming, outgoing or missed
    pub call_type: CallType,

    /// When the call was placed
    pub date: DateTime<Utc>,
}

impl CallLogEntry {
    /// Date formatted as `MM/dd/yyyy HH:mm:ss`
    pub fn formatted_date(&self) -> String {
        self.date.format("%m/%d/%Y %H:%M:%S").to_string()
    }
}

/// One stored text message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageLogEntry {
    pub address: String,
    pub body: String,
    pub date: DateTime<Utc>,
}

/// A single position fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: DateTime<Utc>,
}

impl fmt::Display for LocationFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Latitude: {}, Longitude: {}", self.latitude, self.longitude)
    }
}

/// An active subscription in the phone-number registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumberEntry {
    /// SIM display name, if the registry has one
    pub display_name: Option<String>,

    /// Line number, if the carrier exposes it
    pub number: Option<String>,
}

impl fmt::Display for PhoneNumberEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.display_name.as_deref().unwrap_or("Unknown SIM");
        let number = self
            .number
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or("Phone number not available");
        write!(f, "{}: {}", name, number)
    }
}
