//! Consistency reconciliation: make derived state match ground truth
//!
//! Every rule in here is independently idempotent and safe to re-run:
//!
//! 1. **Auto-resolve** — ONLINE equipment clears its transient alerts
//! 2. **Equipment sync** — ONLINE without an active IP is forced OFFLINE
//! 3. **IP sync** — stored IP status is rewritten to its canonical derivation
//! 4. **Assignment cleanup** — released assignments past retention are deleted
//! 5. **Alert cleanup** — resolved alerts past retention are deleted
//! 6. **Deduped alert creation** — never two unresolved alerts of the same
//!    type for the same equipment
//!
//! A full run executes the stages in exactly that order. Rule 1 runs first so
//! freshly-online equipment clears its alerts before any downgrade logic in
//! the same pass; rule 2 runs before rule 3 because an equipment downgrade
//! can change what assignment activity downstream readers observe.
//!
//! Every stage and every record is individually guarded: a failure is logged
//! and the run continues, so the caller always receives partial counts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::store::{StoreBackend, StoreResult};
use crate::{Alert, AlertSeverity, AlertType, EquipmentStatus, IpStatus, NewAlert, StatusEntry};

/// Released assignments older than this many days are hard-deleted.
pub const DEFAULT_ASSIGNMENT_RETENTION_DAYS: u32 = 90;

/// Resolved alerts older than this many days are hard-deleted.
pub const DEFAULT_ALERT_RETENTION_DAYS: u32 = 30;

/// Mesh strength (percent) below which a weak-signal alert is raised.
pub const DEFAULT_WEAK_SIGNAL_THRESHOLD: u8 = 30;

/// Alert types that self-heal once their equipment is back online.
const AUTO_RESOLVABLE: [AlertType; 3] = [
    AlertType::EquipmentOffline,
    AlertType::NetworkDisconnection,
    AlertType::MeshWeakSignal,
];

/// The canonical status an IP address must carry.
///
/// Pure derivation rule: `Reserved` wins, then `Assigned` if any active
/// assignment exists, else `Available`.
pub fn canonical_ip_status(is_reserved: bool, has_active_assignment: bool) -> IpStatus {
    if is_reserved {
        IpStatus::Reserved
    } else if has_active_assignment {
        IpStatus::Assigned
    } else {
        IpStatus::Available
    }
}

/// Aggregate counts of one full consistency run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub alerts_resolved: usize,
    pub equipment_synced: usize,
    pub ips_synced: usize,
    pub assignments_cleaned: usize,
    pub alerts_cleaned: usize,
}

/// Aggregate counts of applying one status snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub marked_online: usize,
    pub marked_offline: usize,
    pub alerts_created: usize,
    pub alerts_resolved: usize,
}

/// An IP address with more than one active assignment. Detected and
/// reported, never auto-fixed.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentConflict {
    pub ip_address_id: String,
    pub assignment_ids: Vec<String>,
    pub equipment_ids: Vec<String>,
}

/// Applies the idempotent correction rules against the store.
pub struct Reconciler {
    store: Arc<dyn StoreBackend>,
    resolved_by: String,
    assignment_retention_days: u32,
    alert_retention_days: u32,
    weak_signal_threshold: u8,
}

impl Reconciler {
    pub fn new(store: Arc<dyn StoreBackend>) -> Self {
        Self {
            store,
            resolved_by: "system".to_string(),
            assignment_retention_days: DEFAULT_ASSIGNMENT_RETENTION_DAYS,
            alert_retention_days: DEFAULT_ALERT_RETENTION_DAYS,
            weak_signal_threshold: DEFAULT_WEAK_SIGNAL_THRESHOLD,
        }
    }

    pub fn with_retention(mut self, assignment_days: u32, alert_days: u32) -> Self {
        self.assignment_retention_days = assignment_days;
        self.alert_retention_days = alert_days;
        self
    }

    pub fn with_weak_signal_threshold(mut self, threshold: u8) -> Self {
        self.weak_signal_threshold = threshold;
        self
    }

    /// Who auto-resolved alerts are attributed to (default "system").
    pub fn with_resolved_by(mut self, resolved_by: impl Into<String>) -> Self {
        self.resolved_by = resolved_by.into();
        self
    }

    // ========================================================================
    // Rule 1: auto-resolve
    // ========================================================================

    /// Resolve the transient alerts of one equipment, provided it is ONLINE.
    ///
    /// Anything other than ONLINE (including a missing row) is a no-op
    /// returning 0. Returns the number of alerts resolved.
    #[instrument(skip(self))]
    pub async fn auto_resolve_alerts(&self, equipment_id: &str) -> StoreResult<usize> {
        let Some(equipment) = self.store.get_equipment(equipment_id).await? else {
            return Ok(0);
        };

        if equipment.status != EquipmentStatus::Online {
            return Ok(0);
        }

        let now = Utc::now();
        let mut resolved = 0;

        for alert_type in AUTO_RESOLVABLE {
            for alert in self
                .store
                .find_unresolved_alerts(Some(equipment_id), Some(alert_type))
                .await?
            {
                if self
                    .store
                    .resolve_alert(&alert.id, &self.resolved_by, now)
                    .await?
                {
                    debug!("{equipment_id}: auto-resolved {} alert {}", alert_type, alert.id);
                    resolved += 1;
                }
            }
        }

        Ok(resolved)
    }

    // ========================================================================
    // Rule 2: equipment status sync
    // ========================================================================

    /// Force ONLINE equipment with zero active assignments to OFFLINE.
    ///
    /// This is the only automatic downgrade; equipment is never marked
    /// ONLINE here — that takes positive liveness evidence via
    /// [`apply_snapshot`](Self::apply_snapshot) or a heartbeat.
    pub async fn sync_equipment_status(&self, equipment_id: &str) -> StoreResult<bool> {
        let Some(equipment) = self.store.get_equipment(equipment_id).await? else {
            return Ok(false);
        };

        if equipment.status != EquipmentStatus::Online {
            return Ok(false);
        }

        if self
            .store
            .active_assignment_for_equipment(equipment_id)
            .await?
            .is_some()
        {
            return Ok(false);
        }

        debug!("{equipment_id}: ONLINE without active IP, forcing OFFLINE");
        self.store
            .update_equipment_status(equipment_id, EquipmentStatus::Offline)
            .await?;

        Ok(true)
    }

    // ========================================================================
    // Rule 3: IP status sync
    // ========================================================================

    /// Rewrite one IP's stored status to its canonical derivation.
    /// Returns `true` if a write happened.
    pub async fn sync_ip_status(&self, ip_address_id: &str) -> StoreResult<bool> {
        let Some(ip) = self.store.get_ip_address(ip_address_id).await? else {
            return Ok(false);
        };

        let has_active = self.store.has_active_assignment(ip_address_id).await?;
        let canonical = canonical_ip_status(ip.is_reserved, has_active);

        if ip.status == canonical {
            return Ok(false);
        }

        debug!(
            "{ip_address_id}: stored status {} stale, correcting to {}",
            ip.status, canonical
        );
        self.store.update_ip_status(ip_address_id, canonical).await?;

        Ok(true)
    }

    // ========================================================================
    // Rules 4 & 5: retention cleanup
    // ========================================================================

    /// Hard-delete inactive assignments released more than `days_to_keep`
    /// days ago. Returns the number deleted.
    pub async fn cleanup_stale_assignments(&self, days_to_keep: u32) -> StoreResult<usize> {
        let cutoff = Utc::now() - Duration::days(days_to_keep as i64);
        self.store.delete_released_assignments_before(cutoff).await
    }

    /// Hard-delete alerts resolved more than `days_to_keep` days ago.
    /// Returns the number deleted.
    pub async fn cleanup_stale_alerts(&self, days_to_keep: u32) -> StoreResult<usize> {
        let cutoff = Utc::now() - Duration::days(days_to_keep as i64);
        self.store.delete_resolved_alerts_before(cutoff).await
    }

    // ========================================================================
    // Rule 6: deduped alert creation
    // ========================================================================

    /// Raise an alert for an equipment unless an unresolved alert of the same
    /// type already exists for it; in that case the existing alert is
    /// returned untouched. The boolean reports whether a new row was created.
    ///
    /// The existence check and the create are two store operations; under
    /// concurrent triggers there is a narrow race window. Scheduled runs are
    /// serialized through the monitor actor, which keeps the window to
    /// manual/scheduled overlap only.
    pub async fn raise_alert(
        &self,
        equipment_id: &str,
        alert_type: AlertType,
        severity: AlertSeverity,
        message: impl Into<String>,
    ) -> StoreResult<(Alert, bool)> {
        let existing = self
            .store
            .find_unresolved_alerts(Some(equipment_id), Some(alert_type))
            .await?;

        if let Some(alert) = existing.into_iter().next() {
            debug!("{equipment_id}: unresolved {alert_type} alert already present ({})", alert.id);
            return Ok((alert, false));
        }

        let alert = self
            .store
            .create_alert(NewAlert {
                alert_type,
                severity,
                message: message.into(),
                equipment_id: Some(equipment_id.to_string()),
            })
            .await?;

        debug!("{equipment_id}: raised {alert_type} alert {}", alert.id);
        Ok((alert, true))
    }

    /// Evaluate a reported mesh strength; below the threshold a deduped
    /// weak-signal alert is raised and returned.
    pub async fn evaluate_mesh_strength(
        &self,
        equipment_id: &str,
        strength: u8,
    ) -> StoreResult<Option<Alert>> {
        if strength >= self.weak_signal_threshold {
            return Ok(None);
        }

        let (alert, _created) = self
            .raise_alert(
                equipment_id,
                AlertType::MeshWeakSignal,
                AlertSeverity::Warning,
                format!(
                    "mesh signal at {strength}% (threshold {}%)",
                    self.weak_signal_threshold
                ),
            )
            .await?;

        Ok(Some(alert))
    }

    // ========================================================================
    // Snapshot application (positive-evidence update path)
    // ========================================================================

    /// Apply one status snapshot to the store.
    ///
    /// Online entries set the equipment ONLINE, bump `last_seen` and
    /// auto-resolve its transient alerts. Offline entries downgrade ONLINE
    /// equipment and raise a deduped EQUIPMENT_OFFLINE alert. MAINTENANCE
    /// equipment is never touched; UNKNOWN equipment is never alerted on.
    ///
    /// Per-entry failures are logged and skipped.
    #[instrument(skip_all, fields(entries = entries.len()))]
    pub async fn apply_snapshot(&self, entries: &[StatusEntry]) -> SnapshotSummary {
        let mut summary = SnapshotSummary::default();

        for entry in entries {
            if let Err(e) = self.apply_entry(entry, &mut summary).await {
                warn!("{}: snapshot application failed: {e}", entry.equipment_id);
            }
        }

        debug!("snapshot applied: {summary:?}");
        summary
    }

    async fn apply_entry(
        &self,
        entry: &StatusEntry,
        summary: &mut SnapshotSummary,
    ) -> StoreResult<()> {
        let Some(equipment) = self.store.get_equipment(&entry.equipment_id).await? else {
            // Row deleted between snapshot and application.
            return Ok(());
        };

        if equipment.status == EquipmentStatus::Maintenance {
            return Ok(());
        }

        if entry.is_online {
            let seen_at = entry.last_seen.unwrap_or_else(Utc::now);
            self.store
                .record_equipment_seen(&equipment.id, EquipmentStatus::Online, seen_at, None)
                .await?;

            if equipment.status != EquipmentStatus::Online {
                summary.marked_online += 1;
            }

            summary.alerts_resolved += self.auto_resolve_alerts(&equipment.id).await?;
        } else {
            if equipment.status == EquipmentStatus::Online {
                self.store
                    .update_equipment_status(&equipment.id, EquipmentStatus::Offline)
                    .await?;
                summary.marked_offline += 1;
            }

            // UNKNOWN gear is usually uncommissioned; alerting on it would
            // be permanent noise.
            if matches!(
                equipment.status,
                EquipmentStatus::Online | EquipmentStatus::Offline
            ) {
                let reason = entry
                    .error
                    .clone()
                    .unwrap_or_else(|| "probe failed".to_string());
                let (_, created) = self
                    .raise_alert(
                        &equipment.id,
                        AlertType::EquipmentOffline,
                        AlertSeverity::Error,
                        format!("{} is unreachable: {reason}", equipment.name),
                    )
                    .await?;
                if created {
                    summary.alerts_created += 1;
                }
            }
        }

        Ok(())
    }

    // ========================================================================
    // Full run
    // ========================================================================

    /// Execute all five stages in order, absorbing per-record failures.
    #[instrument(skip(self))]
    pub async fn run(&self) -> ConsistencyReport {
        let mut report = ConsistencyReport::default();

        match self.store.list_equipment().await {
            Ok(equipment) => {
                // Stage 1: freshly-online equipment clears its alerts before
                // any downgrade logic runs in the same pass.
                for eq in equipment
                    .iter()
                    .filter(|e| e.status == EquipmentStatus::Online)
                {
                    match self.auto_resolve_alerts(&eq.id).await {
                        Ok(n) => report.alerts_resolved += n,
                        Err(e) => warn!("{}: auto-resolve failed: {e}", eq.id),
                    }
                }

                // Stage 2: equipment status sync.
                for eq in &equipment {
                    match self.sync_equipment_status(&eq.id).await {
                        Ok(true) => report.equipment_synced += 1,
                        Ok(false) => {}
                        Err(e) => warn!("{}: status sync failed: {e}", eq.id),
                    }
                }
            }
            Err(e) => warn!("equipment stages skipped: {e}"),
        }

        // Stage 3: IP status derivation.
        match self.store.list_ip_addresses().await {
            Ok(ips) => {
                for ip in &ips {
                    match self.sync_ip_status(&ip.id).await {
                        Ok(true) => report.ips_synced += 1,
                        Ok(false) => {}
                        Err(e) => warn!("{}: IP sync failed: {e}", ip.id),
                    }
                }
            }
            Err(e) => warn!("IP stage skipped: {e}"),
        }

        // Stage 4: assignment retention.
        match self
            .cleanup_stale_assignments(self.assignment_retention_days)
            .await
        {
            Ok(n) => report.assignments_cleaned = n,
            Err(e) => warn!("assignment cleanup failed: {e}"),
        }

        // Stage 5: alert retention.
        match self.cleanup_stale_alerts(self.alert_retention_days).await {
            Ok(n) => report.alerts_cleaned = n,
            Err(e) => warn!("alert cleanup failed: {e}"),
        }

        debug!("consistency run finished: {report:?}");
        report
    }

    // ========================================================================
    // Read-only integrity check
    // ========================================================================

    /// Flag IP addresses carrying more than one active assignment.
    ///
    /// Cross-equipment IP conflicts are reported as data and never
    /// auto-corrected here.
    pub async fn find_assignment_conflicts(&self) -> StoreResult<Vec<AssignmentConflict>> {
        let active = self.store.active_assignments().await?;

        let mut by_ip: HashMap<String, Vec<&crate::IpAssignment>> = HashMap::new();
        for assignment in &active {
            by_ip
                .entry(assignment.ip_address_id.clone())
                .or_default()
                .push(assignment);
        }

        let mut conflicts: Vec<AssignmentConflict> = by_ip
            .into_iter()
            .filter(|(_, assignments)| assignments.len() > 1)
            .map(|(ip_address_id, assignments)| AssignmentConflict {
                ip_address_id,
                assignment_ids: assignments.iter().map(|a| a.id.clone()).collect(),
                equipment_ids: assignments.iter().map(|a| a.equipment_id.clone()).collect(),
            })
            .collect();

        conflicts.sort_by(|a, b| a.ip_address_id.cmp(&b.ip_address_id));

        if !conflicts.is_empty() {
            warn!("{} IP(s) with conflicting active assignments", conflicts.len());
        }

        Ok(conflicts)
    }
}
