pub mod aggregator;
pub mod config;
pub mod monitor;
pub mod probe;
pub mod reconciler;
pub mod service;
pub mod store;
pub mod util;

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a piece of mesh equipment.
///
/// The core only ever performs one automatic transition on its own:
/// `Online` → `Offline` (missing liveness evidence or no active IP).
/// Upgrades to `Online` require positive evidence (a successful probe or a
/// heartbeat). `Maintenance` is set by operators and never touched here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentStatus {
    Online,
    Offline,
    Maintenance,
    Unknown,
}

impl std::fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EquipmentStatus::Online => write!(f, "ONLINE"),
            EquipmentStatus::Offline => write!(f, "OFFLINE"),
            EquipmentStatus::Maintenance => write!(f, "MAINTENANCE"),
            EquipmentStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A piece of equipment participating in the mesh (haul trucks, repeaters,
/// sensor stations, ...). CRUD on these rows happens elsewhere; the core is
/// only entitled to mutate `status`, `last_seen` and `mesh_strength`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    pub id: String,
    pub name: String,
    pub status: EquipmentStatus,
    pub last_seen: Option<DateTime<Utc>>,
    /// Mesh signal strength in percent (0-100), reported via heartbeats.
    pub mesh_strength: Option<u8>,
}

/// Stored status of an IP address.
///
/// Must always be derivable: `Reserved` if the address is reserved, else
/// `Assigned` if any active assignment exists, else `Available`. The
/// reconciler's job is to make the stored value match that derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IpStatus {
    Available,
    Assigned,
    Reserved,
    Offline,
}

impl std::fmt::Display for IpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpStatus::Available => write!(f, "AVAILABLE"),
            IpStatus::Assigned => write!(f, "ASSIGNED"),
            IpStatus::Reserved => write!(f, "RESERVED"),
            IpStatus::Offline => write!(f, "OFFLINE"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpAddress {
    pub id: String,
    pub address: IpAddr,
    pub status: IpStatus,
    pub is_reserved: bool,
}

/// Links one equipment to one IP address for one user.
///
/// Immutable once released, except for retention cleanup. At most one active
/// assignment should exist per (equipment, IP) pair; violations are detected
/// and reported, never auto-fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpAssignment {
    pub id: String,
    pub equipment_id: String,
    pub ip_address_id: String,
    pub user_id: String,
    pub is_active: bool,
    pub assigned_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    EquipmentOffline,
    MeshWeakSignal,
    NetworkDisconnection,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::EquipmentOffline => write!(f, "EQUIPMENT_OFFLINE"),
            AlertType::MeshWeakSignal => write!(f, "MESH_WEAK_SIGNAL"),
            AlertType::NetworkDisconnection => write!(f, "NETWORK_DISCONNECTION"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Low,
    Info,
    Warning,
    Error,
    Critical,
}

/// A raised alert. At most one unresolved alert per (equipment, type) pair
/// may exist at any time; the reconciler enforces this on creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub equipment_id: Option<String>,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

/// Creation shape for alerts; the store assigns the identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAlert {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub equipment_id: Option<String>,
}

/// One entry of a status snapshot: the result of probing (or reading) a
/// single equipment. Ephemeral; lives for one aggregator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEntry {
    pub equipment_id: String,
    pub ip_address: Option<IpAddr>,
    pub is_online: bool,
    pub response_time_ms: Option<u64>,
    pub last_seen: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Self-reported liveness from equipment, delivered by the external HTTP
/// layer. Typed on purpose: a malformed heartbeat fails at the serde boundary
/// instead of leaking an open-ended map into the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    pub equipment_id: String,
    /// Status the equipment claims for itself; defaults to `Online`.
    pub status: Option<EquipmentStatus>,
    /// Mesh signal strength in percent (0-100).
    pub mesh_strength: Option<u8>,
    /// When the heartbeat was emitted; defaults to receive time.
    pub timestamp: Option<DateTime<Utc>>,
}
