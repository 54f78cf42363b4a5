//! Status aggregation: probe every equipment, produce one snapshot
//!
//! The aggregator fans probes out concurrently, bounded by a ceiling so a
//! large fleet cannot overwhelm the mesh or the store. One failed probe never
//! aborts the batch — every equipment gets exactly one [`StatusEntry`], with
//! failures captured in the entry itself. Only the initial equipment load is
//! allowed to fail the whole run.

use std::sync::Arc;

use chrono::Utc;
use futures::{StreamExt, stream};
use tracing::{debug, instrument, warn};

use crate::probe::Prober;
use crate::store::{StoreBackend, StoreError, StoreResult};
use crate::{Equipment, StatusEntry};

/// Default ceiling on simultaneous probes within one run.
pub const MAX_CONCURRENT_PROBES: usize = 16;

/// Runs the prober over the whole fleet and produces a status snapshot.
pub struct StatusAggregator {
    store: Arc<dyn StoreBackend>,
    prober: Arc<dyn Prober>,
    concurrency: usize,
}

impl StatusAggregator {
    pub fn new(store: Arc<dyn StoreBackend>, prober: Arc<dyn Prober>) -> Self {
        Self {
            store,
            prober,
            concurrency: MAX_CONCURRENT_PROBES,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Probe all equipment in the store, one entry each.
    ///
    /// Wall-clock time is bounded by (fleet size / ceiling) × probe timeout,
    /// not the sum of all timeouts.
    #[instrument(skip(self))]
    pub async fn check_all(&self) -> StoreResult<Vec<StatusEntry>> {
        let equipment = self.store.list_equipment().await?;

        debug!(
            "probing {} equipment (ceiling {})",
            equipment.len(),
            self.concurrency
        );

        let entries = stream::iter(equipment)
            .map(|eq| self.probe_equipment(eq))
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        Ok(entries)
    }

    /// Probe a single equipment by ID.
    pub async fn check_one(&self, equipment_id: &str) -> StoreResult<StatusEntry> {
        let equipment = self
            .store
            .get_equipment(equipment_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("equipment {equipment_id}")))?;

        Ok(self.probe_equipment(equipment).await)
    }

    /// Resolve the active IP of one equipment and probe it.
    ///
    /// Lookup failures for this single equipment are absorbed into the entry;
    /// they must not poison the rest of the batch.
    async fn probe_equipment(&self, equipment: Equipment) -> StatusEntry {
        let offline = |error: String| StatusEntry {
            equipment_id: equipment.id.clone(),
            ip_address: None,
            is_online: false,
            response_time_ms: None,
            last_seen: equipment.last_seen,
            error: Some(error),
        };

        let assignment = match self
            .store
            .active_assignment_for_equipment(&equipment.id)
            .await
        {
            Ok(assignment) => assignment,
            Err(e) => {
                warn!("{}: assignment lookup failed: {e}", equipment.id);
                return offline(format!("assignment lookup failed: {e}"));
            }
        };

        let Some(assignment) = assignment else {
            return offline("no IP assigned".to_string());
        };

        let ip = match self.store.get_ip_address(&assignment.ip_address_id).await {
            Ok(Some(ip)) => ip,
            Ok(None) => {
                warn!(
                    "{}: active assignment references missing IP {}",
                    equipment.id, assignment.ip_address_id
                );
                return offline(format!("assigned IP {} not found", assignment.ip_address_id));
            }
            Err(e) => {
                warn!("{}: IP lookup failed: {e}", equipment.id);
                return offline(format!("IP lookup failed: {e}"));
            }
        };

        let outcome = self.prober.probe(ip.address).await;

        StatusEntry {
            equipment_id: equipment.id,
            ip_address: Some(ip.address),
            is_online: outcome.online,
            response_time_ms: outcome.response_time_ms,
            last_seen: if outcome.online {
                Some(Utc::now())
            } else {
                equipment.last_seen
            },
            error: outcome.error,
        }
    }
}
