//! In-process facade consumed by the request layer
//!
//! `MonitorService` wires the store, prober, aggregator, reconciler and
//! scheduler together and exposes the operations the (external) HTTP handlers
//! map onto routes. Everything here returns values or `StoreResult`s; turning
//! those into responses is the caller's job.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, instrument, trace};

use crate::aggregator::StatusAggregator;
use crate::config::MonitorConfig;
use crate::monitor::{EquipmentMonitor, MonitorStatus};
use crate::probe::{Prober, TcpProber};
use crate::reconciler::{AssignmentConflict, ConsistencyReport, Reconciler};
use crate::store::{StoreBackend, StoreError, StoreResult};
use crate::{EquipmentStatus, HeartbeatPayload, StatusEntry};

pub struct MonitorService {
    store: Arc<dyn StoreBackend>,
    aggregator: Arc<StatusAggregator>,
    reconciler: Arc<Reconciler>,
    monitor: EquipmentMonitor,
    default_interval_ms: u64,
}

impl MonitorService {
    /// Wire the service with a TCP prober configured from `config`.
    pub fn new(store: Arc<dyn StoreBackend>, config: &MonitorConfig) -> Self {
        let prober = Arc::new(TcpProber::new(
            config.probe_port,
            Duration::from_millis(config.probe_timeout_ms),
        ));
        Self::with_prober(store, prober, config)
    }

    /// Wire the service with an explicit prober (tests inject scripted ones).
    pub fn with_prober(
        store: Arc<dyn StoreBackend>,
        prober: Arc<dyn Prober>,
        config: &MonitorConfig,
    ) -> Self {
        let aggregator = Arc::new(
            StatusAggregator::new(store.clone(), prober)
                .with_concurrency(config.max_concurrent_probes),
        );
        let reconciler = Arc::new(
            Reconciler::new(store.clone())
                .with_retention(config.assignment_retention_days, config.alert_retention_days)
                .with_weak_signal_threshold(config.weak_signal_threshold),
        );
        let monitor = EquipmentMonitor::new(aggregator.clone(), reconciler.clone());

        Self {
            store,
            aggregator,
            reconciler,
            monitor,
            default_interval_ms: config.interval_ms,
        }
    }

    // ========================================================================
    // On-demand checks
    // ========================================================================

    /// Probe one equipment and apply the result (status update, alert
    /// lifecycle) immediately.
    #[instrument(skip(self))]
    pub async fn check_equipment_status(&self, equipment_id: &str) -> StoreResult<StatusEntry> {
        let entry = self.aggregator.check_one(equipment_id).await?;
        self.reconciler
            .apply_snapshot(std::slice::from_ref(&entry))
            .await;
        Ok(entry)
    }

    /// Probe the whole fleet and apply the snapshot.
    #[instrument(skip(self))]
    pub async fn check_all_equipment_status(&self) -> StoreResult<Vec<StatusEntry>> {
        let entries = self.aggregator.check_all().await?;
        let summary = self.reconciler.apply_snapshot(&entries).await;
        debug!("on-demand fleet check applied: {summary:?}");
        Ok(entries)
    }

    /// Stored communication state of one equipment. Pure read — no probe,
    /// no mutation.
    pub async fn get_equipment_communication_status(
        &self,
        equipment_id: &str,
    ) -> StoreResult<StatusEntry> {
        let equipment = self
            .store
            .get_equipment(equipment_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("equipment {equipment_id}")))?;

        let ip_address = match self
            .store
            .active_assignment_for_equipment(equipment_id)
            .await?
        {
            Some(assignment) => self
                .store
                .get_ip_address(&assignment.ip_address_id)
                .await?
                .map(|ip| ip.address),
            None => None,
        };

        Ok(StatusEntry {
            equipment_id: equipment.id,
            ip_address,
            is_online: equipment.status == EquipmentStatus::Online,
            response_time_ms: None,
            last_seen: equipment.last_seen,
            error: None,
        })
    }

    // ========================================================================
    // Heartbeats
    // ========================================================================

    /// Ingest a self-reported heartbeat, bypassing the probe.
    ///
    /// Updates `status`/`last_seen`/`mesh_strength` directly. A weak mesh
    /// signal raises a deduped weak-signal alert; an online heartbeat
    /// auto-resolves the equipment's transient alerts. Returns `false` for
    /// unknown equipment.
    #[instrument(skip(self), fields(equipment_id = %heartbeat.equipment_id))]
    pub async fn process_equipment_heartbeat(
        &self,
        heartbeat: HeartbeatPayload,
    ) -> StoreResult<bool> {
        if let Some(strength) = heartbeat.mesh_strength {
            if strength > 100 {
                return Err(StoreError::InvalidInput(format!(
                    "mesh_strength {strength} out of range (0-100)"
                )));
            }
        }

        let status = heartbeat.status.unwrap_or(EquipmentStatus::Online);
        let seen_at = heartbeat.timestamp.unwrap_or_else(Utc::now);

        let known = self
            .store
            .record_equipment_seen(
                &heartbeat.equipment_id,
                status,
                seen_at,
                heartbeat.mesh_strength,
            )
            .await?;

        if !known {
            trace!("heartbeat for unknown equipment, ignoring");
            return Ok(false);
        }

        // Resolve first so a still-weak signal can re-raise its alert below
        // instead of having it clawed back in the same heartbeat.
        if status == EquipmentStatus::Online {
            self.reconciler
                .auto_resolve_alerts(&heartbeat.equipment_id)
                .await?;
        }

        if let Some(strength) = heartbeat.mesh_strength {
            self.reconciler
                .evaluate_mesh_strength(&heartbeat.equipment_id, strength)
                .await?;
        }

        Ok(true)
    }

    // ========================================================================
    // Scheduler control
    // ========================================================================

    pub async fn start_equipment_monitor(&self, interval_ms: Option<u64>) -> MonitorStatus {
        self.monitor
            .start(Some(interval_ms.unwrap_or(self.default_interval_ms)))
            .await
    }

    pub async fn stop_equipment_monitor(&self) -> bool {
        self.monitor.stop().await
    }

    pub async fn restart_equipment_monitor(&self, interval_ms: Option<u64>) -> MonitorStatus {
        self.monitor
            .restart(Some(interval_ms.unwrap_or(self.default_interval_ms)))
            .await
    }

    pub async fn is_equipment_monitor_running(&self) -> bool {
        self.monitor.is_running().await
    }

    pub async fn get_monitoring_status(&self) -> MonitorStatus {
        self.monitor.status().await
    }

    // ========================================================================
    // Consistency
    // ========================================================================

    /// Run the full reconciliation pass and return its aggregate counts.
    pub async fn run_data_consistency_check(&self) -> ConsistencyReport {
        self.reconciler.run().await
    }

    /// Read-only integrity check for conflicting active assignments.
    pub async fn find_assignment_conflicts(&self) -> StoreResult<Vec<AssignmentConflict>> {
        self.reconciler.find_assignment_conflicts().await
    }
}
