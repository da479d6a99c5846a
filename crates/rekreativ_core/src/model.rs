//! Domain records.
//!
//! Each record maps to one JSON object in its collection, with the field
//! names the snapshot document uses. Fields this crate does not model are
//! kept in `extra`, so a read-modify-write never loses data another
//! collaborator stored.

use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::schema::{
    BACKUPS, CLIENTS, COLLECTIONS, COMPANY_PROFILE, COUNTER_HISTORY, EXPENSES, MACHINES, USERS,
};
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Key of the singleton company profile.
pub const DEFAULT_PROFILE_ID: &str = "default";

/// A typed record stored in a known collection.
pub trait Entity: Serialize + DeserializeOwned {
    /// Collection the record lives in.
    const COLLECTION: &'static str;

    /// Primary key.
    fn key(&self) -> Key;

    /// Converts to the stored JSON form.
    fn to_record(&self) -> CoreResult<Value> {
        serde_json::to_value(self)
            .map_err(|e| CoreError::encode(format!("{}: {e}", Self::COLLECTION)))
    }

    /// Converts from the stored JSON form.
    fn from_record(record: Value) -> CoreResult<Self> {
        serde_json::from_value(record)
            .map_err(|e| CoreError::decode(format!("{}: {e}", Self::COLLECTION)))
    }
}

/// Current time as the ISO-8601 string records carry.
#[must_use]
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Where a machine physically is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    /// In storage.
    Warehouse,
    /// Placed at a client.
    Installed,
    /// Out for repair.
    Repair,
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warehouse => "warehouse",
            Self::Installed => "installed",
            Self::Repair => "repair",
        })
    }
}

/// One line of a machine's embedded history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// When it happened.
    pub date: String,
    /// Action tag (`created`, `counter_update`, ...).
    pub action: String,
    /// Free text.
    pub details: String,
}

/// A coin-operated machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    /// Machine id (`M001`).
    pub id: String,
    /// Manufacturer serial, unique across machines.
    pub serial_number: String,
    /// Kind of machine.
    #[serde(rename = "type")]
    pub machine_type: String,
    /// Model name.
    pub model: String,
    /// Manufacturer.
    pub brand: String,
    /// Purchase cost.
    #[serde(default)]
    pub cost: f64,
    /// Purchase date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<String>,
    /// Lifecycle status.
    pub status: MachineStatus,
    /// Owning client, as the client's id in text form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Aggregate counter. Only moves forward.
    #[serde(default)]
    pub current_counter: u64,
    /// Counter reading when the machine entered service.
    #[serde(default)]
    pub initial_counter: u64,
    /// Share of revenue kept by the operator, in percent.
    #[serde(default = "default_split")]
    pub split_percentage: f64,
    /// Creation time.
    #[serde(default)]
    pub created_at: String,
    /// Last modification time.
    #[serde(default)]
    pub updated_at: String,
    /// Append-only event log.
    #[serde(default)]
    pub history: Vec<HistoryEvent>,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_split() -> f64 {
    50.0
}

impl Entity for Machine {
    const COLLECTION: &'static str = MACHINES;

    fn key(&self) -> Key {
        Key::from(self.id.as_str())
    }
}

/// A business hosting machines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Numeric id.
    pub id: i64,
    /// Business name.
    pub name: String,
    /// Kind of business.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_type: Option<String>,
    /// Owner name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Street address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// City.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Postal code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// Phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Stored machine count as written by collaborators. Not maintained
    /// here; see [`crate::Store::client_machine_count`].
    #[serde(default)]
    pub machines: u64,
    /// Creation time.
    #[serde(default)]
    pub created_at: String,
    /// Last modification time.
    #[serde(default)]
    pub updated_at: String,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for Client {
    const COLLECTION: &'static str = CLIENTS;

    fn key(&self) -> Key {
        Key::Int(self.id)
    }
}

/// A revenue collection event. Never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueCollection {
    /// Event id.
    pub id: String,
    /// Machine emptied.
    pub machine_id: String,
    /// Client hosting the machine.
    pub client_id: i64,
    /// Amount collected.
    pub amount: f64,
    /// When it happened.
    pub date: String,
    /// Counter at the previous collection.
    pub previous_counter: u64,
    /// Counter at this collection.
    pub current_counter: u64,
    /// Who collected.
    #[serde(default)]
    pub staff_member: String,
    /// Free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: String,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for RevenueCollection {
    const COLLECTION: &'static str = COLLECTIONS;

    fn key(&self) -> Key {
        Key::from(self.id.as_str())
    }
}

/// An expense, optionally tied to a machine or client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    /// Expense id.
    pub id: String,
    /// Related machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    /// Related client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i64>,
    /// Amount spent.
    pub amount: f64,
    /// When it happened.
    pub date: String,
    /// Category.
    #[serde(rename = "type")]
    pub category: String,
    /// Free text.
    #[serde(default)]
    pub description: String,
    /// Creation time.
    #[serde(default)]
    pub created_at: String,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for Expense {
    const COLLECTION: &'static str = EXPENSES;

    fn key(&self) -> Key {
        Key::from(self.id.as_str())
    }
}

/// The operator's own company details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    /// Always [`DEFAULT_PROFILE_ID`].
    pub id: String,
    /// Company name.
    pub name: String,
    /// Street address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Tax id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    /// Phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// VAT rate in percent.
    pub vat_percentage: f64,
    /// Creation time.
    #[serde(default)]
    pub created_at: String,
    /// Last modification time.
    #[serde(default)]
    pub updated_at: String,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for CompanyProfile {
    const COLLECTION: &'static str = COMPANY_PROFILE;

    fn key(&self) -> Key {
        Key::from(self.id.as_str())
    }
}

/// What a user may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full access.
    Admin,
    /// Field staff.
    Technician,
}

/// An application user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User id.
    pub id: String,
    /// Login name, unique across users.
    pub username: String,
    /// Secret credential. Never exported.
    #[serde(default)]
    pub password: String,
    /// Display name.
    pub name: String,
    /// Role.
    pub role: UserRole,
    /// Creation time.
    #[serde(default)]
    pub created_at: String,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for User {
    const COLLECTION: &'static str = USERS;

    fn key(&self) -> Key {
        Key::from(self.id.as_str())
    }
}

/// Describes a stored backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// When the snapshot was taken.
    pub timestamp: String,
    /// Size of the snapshot document in bytes.
    pub size: u64,
    /// Schema version the snapshot was taken at.
    pub version: String,
}

/// A snapshot document kept inside the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    /// Backup id (a UUID).
    pub id: String,
    /// Snapshot document, base64 encoded.
    pub data: String,
    /// Description of the payload.
    pub metadata: BackupMetadata,
    /// Creation time.
    pub created_at: String,
}

impl Entity for Backup {
    const COLLECTION: &'static str = BACKUPS;

    fn key(&self) -> Key {
        Key::from(self.id.as_str())
    }
}

/// One recorded counter reading. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterHistoryEntry {
    /// Primary key and ordering key.
    pub timestamp: String,
    /// Machine the reading belongs to.
    pub machine_id: String,
    /// Value as reported.
    pub value: u64,
    /// Aggregate before the reading.
    #[serde(default)]
    pub previous_value: u64,
    /// Amount the aggregate moved.
    #[serde(default)]
    pub delta: u64,
    /// The report was below the aggregate and did not move it.
    #[serde(default)]
    pub clamped: bool,
    /// Where the reading came from (`manual`, `collection`, ...).
    pub source: String,
    /// Free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for CounterHistoryEntry {
    const COLLECTION: &'static str = COUNTER_HISTORY;

    fn key(&self) -> Key {
        Key::from(self.timestamp.as_str())
    }
}
