//! Store backend trait definition
//!
//! This module defines the `StoreBackend` trait the core talks to. The real
//! relational store lives in another component; the core only requires
//! row-level reads, conditional single-row updates, filtered deletes and
//! creates — no core-owned transactions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Alert, AlertType, Equipment, EquipmentStatus, IpAddress, IpAssignment, IpStatus, NewAlert};

use super::error::StoreResult;

/// Trait for the persistent store holding equipment, IP addresses,
/// assignments and alerts.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared across async
/// tasks behind an `Arc`.
///
/// ## Update semantics
///
/// All update methods are single-row and conditional: they return `false`
/// (or `0`) when the target row does not exist, and never touch more than
/// the named fields.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    // ========================================================================
    // Equipment
    // ========================================================================

    /// Fetch one equipment row by ID.
    async fn get_equipment(&self, id: &str) -> StoreResult<Option<Equipment>>;

    /// Fetch all equipment rows.
    async fn list_equipment(&self) -> StoreResult<Vec<Equipment>>;

    /// Set the status of one equipment. Returns `true` if the row existed.
    async fn update_equipment_status(
        &self,
        id: &str,
        status: EquipmentStatus,
    ) -> StoreResult<bool>;

    /// Record positive liveness evidence: status, `last_seen`, and (when
    /// reported) mesh strength in one update. Returns `true` if the row
    /// existed.
    async fn record_equipment_seen(
        &self,
        id: &str,
        status: EquipmentStatus,
        seen_at: DateTime<Utc>,
        mesh_strength: Option<u8>,
    ) -> StoreResult<bool>;

    // ========================================================================
    // IP addresses & assignments
    // ========================================================================

    /// Fetch one IP address row by ID.
    async fn get_ip_address(&self, id: &str) -> StoreResult<Option<IpAddress>>;

    /// Fetch all IP address rows.
    async fn list_ip_addresses(&self) -> StoreResult<Vec<IpAddress>>;

    /// Set the stored status of one IP address. Returns `true` if the row
    /// existed.
    async fn update_ip_status(&self, id: &str, status: IpStatus) -> StoreResult<bool>;

    /// The active assignment for an equipment, if any. When the data is in
    /// conflict (several active rows), the earliest-assigned one is returned;
    /// conflict detection is a separate read-only check.
    async fn active_assignment_for_equipment(
        &self,
        equipment_id: &str,
    ) -> StoreResult<Option<IpAssignment>>;

    /// All currently-active assignments.
    async fn active_assignments(&self) -> StoreResult<Vec<IpAssignment>>;

    /// Whether any active assignment exists for the given IP address.
    async fn has_active_assignment(&self, ip_address_id: &str) -> StoreResult<bool>;

    /// Hard-delete inactive assignments released strictly before `cutoff`.
    /// Returns the number of rows deleted.
    async fn delete_released_assignments_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<usize>;

    // ========================================================================
    // Alerts
    // ========================================================================

    /// Unresolved alerts, optionally filtered by equipment and/or type.
    async fn find_unresolved_alerts(
        &self,
        equipment_id: Option<&str>,
        alert_type: Option<AlertType>,
    ) -> StoreResult<Vec<Alert>>;

    /// Create a new (unresolved) alert. The store assigns the identity.
    async fn create_alert(&self, alert: NewAlert) -> StoreResult<Alert>;

    /// Mark one alert resolved. Returns `true` if the row existed and was
    /// previously unresolved.
    async fn resolve_alert(
        &self,
        id: &str,
        resolved_by: &str,
        resolved_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Hard-delete resolved alerts resolved strictly before `cutoff`.
    /// Returns the number of rows deleted.
    async fn delete_resolved_alerts_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;
}
