//! In-memory store backend (no persistence)
//!
//! Backs the core with plain hash maps behind a `tokio::sync::RwLock`.
//! It is the store the binary and the tests run against; production
//! deployments put the relational collaborator behind the same trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{Alert, AlertType, Equipment, EquipmentStatus, IpAddress, IpAssignment, IpStatus, NewAlert};

use super::backend::StoreBackend;
use super::error::StoreResult;

#[derive(Debug, Default)]
struct Inner {
    equipment: HashMap<String, Equipment>,
    ip_addresses: HashMap<String, IpAddress>,
    assignments: HashMap<String, IpAssignment>,
    alerts: HashMap<String, Alert>,
    next_alert_id: u64,
}

/// In-memory store backend
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Seed an equipment row. Seeding replaces existing rows with the same
    /// ID; row creation belongs to the CRUD layer, not the core.
    pub async fn add_equipment(&self, equipment: Equipment) {
        let mut inner = self.inner.write().await;
        inner.equipment.insert(equipment.id.clone(), equipment);
    }

    /// Seed an IP address row.
    pub async fn add_ip_address(&self, ip: IpAddress) {
        let mut inner = self.inner.write().await;
        inner.ip_addresses.insert(ip.id.clone(), ip);
    }

    /// Seed an assignment row.
    pub async fn add_assignment(&self, assignment: IpAssignment) {
        let mut inner = self.inner.write().await;
        inner.assignments.insert(assignment.id.clone(), assignment);
    }

    /// Seed a complete alert row (including resolved ones), bypassing the
    /// ID generation of `create_alert`.
    pub async fn add_alert(&self, alert: Alert) {
        let mut inner = self.inner.write().await;
        inner.alerts.insert(alert.id.clone(), alert);
    }

    /// Number of assignment rows currently stored.
    pub async fn assignment_count(&self) -> usize {
        self.inner.read().await.assignments.len()
    }

    /// Number of alert rows currently stored (resolved included).
    pub async fn alert_count(&self) -> usize {
        self.inner.read().await.alerts.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn get_equipment(&self, id: &str) -> StoreResult<Option<Equipment>> {
        Ok(self.inner.read().await.equipment.get(id).cloned())
    }

    async fn list_equipment(&self) -> StoreResult<Vec<Equipment>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<_> = inner.equipment.values().cloned().collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }

    async fn update_equipment_status(
        &self,
        id: &str,
        status: EquipmentStatus,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.equipment.get_mut(id) {
            Some(row) => {
                row.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_equipment_seen(
        &self,
        id: &str,
        status: EquipmentStatus,
        seen_at: DateTime<Utc>,
        mesh_strength: Option<u8>,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.equipment.get_mut(id) {
            Some(row) => {
                row.status = status;
                row.last_seen = Some(seen_at);
                if mesh_strength.is_some() {
                    row.mesh_strength = mesh_strength;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_ip_address(&self, id: &str) -> StoreResult<Option<IpAddress>> {
        Ok(self.inner.read().await.ip_addresses.get(id).cloned())
    }

    async fn list_ip_addresses(&self) -> StoreResult<Vec<IpAddress>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<_> = inner.ip_addresses.values().cloned().collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }

    async fn update_ip_status(&self, id: &str, status: IpStatus) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.ip_addresses.get_mut(id) {
            Some(row) => {
                row.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn active_assignment_for_equipment(
        &self,
        equipment_id: &str,
    ) -> StoreResult<Option<IpAssignment>> {
        let inner = self.inner.read().await;
        let mut active: Vec<_> = inner
            .assignments
            .values()
            .filter(|a| a.is_active && a.equipment_id == equipment_id)
            .collect();
        active.sort_by_key(|a| a.assigned_at);
        Ok(active.first().map(|a| (*a).clone()))
    }

    async fn active_assignments(&self) -> StoreResult<Vec<IpAssignment>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<_> = inner
            .assignments
            .values()
            .filter(|a| a.is_active)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }

    async fn has_active_assignment(&self, ip_address_id: &str) -> StoreResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .assignments
            .values()
            .any(|a| a.is_active && a.ip_address_id == ip_address_id))
    }

    async fn delete_released_assignments_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let mut inner = self.inner.write().await;
        let before = inner.assignments.len();
        inner.assignments.retain(|_, a| {
            !(!a.is_active && a.released_at.map(|at| at < cutoff).unwrap_or(false))
        });
        let deleted = before - inner.assignments.len();
        debug!("deleted {deleted} released assignments before {cutoff}");
        Ok(deleted)
    }

    async fn find_unresolved_alerts(
        &self,
        equipment_id: Option<&str>,
        alert_type: Option<AlertType>,
    ) -> StoreResult<Vec<Alert>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<_> = inner
            .alerts
            .values()
            .filter(|a| !a.is_resolved)
            .filter(|a| match equipment_id {
                Some(id) => a.equipment_id.as_deref() == Some(id),
                None => true,
            })
            .filter(|a| match alert_type {
                Some(t) => a.alert_type == t,
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }

    async fn create_alert(&self, alert: NewAlert) -> StoreResult<Alert> {
        let mut inner = self.inner.write().await;
        inner.next_alert_id += 1;
        let row = Alert {
            id: format!("alert-{}", inner.next_alert_id),
            alert_type: alert.alert_type,
            severity: alert.severity,
            message: alert.message,
            equipment_id: alert.equipment_id,
            is_resolved: false,
            created_at: Utc::now(),
            resolved_at: None,
            resolved_by: None,
        };
        inner.alerts.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn resolve_alert(
        &self,
        id: &str,
        resolved_by: &str,
        resolved_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.alerts.get_mut(id) {
            Some(row) if !row.is_resolved => {
                row.is_resolved = true;
                row.resolved_at = Some(resolved_at);
                row.resolved_by = Some(resolved_by.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_resolved_alerts_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let mut inner = self.inner.write().await;
        let before = inner.alerts.len();
        inner
            .alerts
            .retain(|_, a| !(a.is_resolved && a.resolved_at.map(|at| at < cutoff).unwrap_or(false)));
        let deleted = before - inner.alerts.len();
        debug!("deleted {deleted} resolved alerts before {cutoff}");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AlertSeverity;
    use chrono::Duration;

    fn equipment(id: &str, status: EquipmentStatus) -> Equipment {
        Equipment {
            id: id.to_string(),
            name: format!("Equipment {id}"),
            status,
            last_seen: None,
            mesh_strength: None,
        }
    }

    #[tokio::test]
    async fn test_update_missing_equipment_returns_false() {
        let store = MemoryStore::new();
        let updated = store
            .update_equipment_status("nope", EquipmentStatus::Offline)
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_record_equipment_seen_keeps_mesh_strength_when_absent() {
        let store = MemoryStore::new();
        let mut eq = equipment("eq-1", EquipmentStatus::Unknown);
        eq.mesh_strength = Some(80);
        store.add_equipment(eq).await;

        store
            .record_equipment_seen("eq-1", EquipmentStatus::Online, Utc::now(), None)
            .await
            .unwrap();

        let row = store.get_equipment("eq-1").await.unwrap().unwrap();
        assert_eq!(row.status, EquipmentStatus::Online);
        assert_eq!(row.mesh_strength, Some(80));
        assert!(row.last_seen.is_some());
    }

    #[tokio::test]
    async fn test_resolve_alert_is_one_shot() {
        let store = MemoryStore::new();
        let alert = store
            .create_alert(NewAlert {
                alert_type: AlertType::EquipmentOffline,
                severity: AlertSeverity::Error,
                message: "offline".to_string(),
                equipment_id: Some("eq-1".to_string()),
            })
            .await
            .unwrap();

        assert!(store.resolve_alert(&alert.id, "system", Utc::now()).await.unwrap());
        // A second resolve is a no-op.
        assert!(!store.resolve_alert(&alert.id, "system", Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_unresolved_alerts_filters() {
        let store = MemoryStore::new();
        for (eq, ty) in [
            ("eq-1", AlertType::EquipmentOffline),
            ("eq-1", AlertType::MeshWeakSignal),
            ("eq-2", AlertType::EquipmentOffline),
        ] {
            store
                .create_alert(NewAlert {
                    alert_type: ty,
                    severity: AlertSeverity::Warning,
                    message: String::new(),
                    equipment_id: Some(eq.to_string()),
                })
                .await
                .unwrap();
        }

        let all = store.find_unresolved_alerts(None, None).await.unwrap();
        assert_eq!(all.len(), 3);

        let eq1_offline = store
            .find_unresolved_alerts(Some("eq-1"), Some(AlertType::EquipmentOffline))
            .await
            .unwrap();
        assert_eq!(eq1_offline.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_released_assignments_respects_cutoff() {
        let store = MemoryStore::new();
        let now = Utc::now();

        for (id, released_days_ago, active) in
            [("a-old", 91, false), ("a-recent", 89, false), ("a-live", 200, true)]
        {
            store
                .add_assignment(IpAssignment {
                    id: id.to_string(),
                    equipment_id: "eq-1".to_string(),
                    ip_address_id: "ip-1".to_string(),
                    user_id: "user-1".to_string(),
                    is_active: active,
                    assigned_at: now - Duration::days(365),
                    released_at: if active {
                        None
                    } else {
                        Some(now - Duration::days(released_days_ago))
                    },
                })
                .await;
        }

        let cutoff = now - Duration::days(90);
        let deleted = store.delete_released_assignments_before(cutoff).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.assignment_count().await, 2);
    }
}
