//! End-to-end tests for the monitor pipeline: probe → snapshot → store
//!
//! Uses scripted probers; no real network traffic.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_test::assert_ok;
use chrono::Utc;
use meshwatch::config::MonitorConfig;
use meshwatch::probe::{ProbeOutcome, Prober};
use meshwatch::service::MonitorService;
use meshwatch::store::{MemoryStore, StoreBackend};
use meshwatch::{AlertType, Equipment, EquipmentStatus, IpAddress, IpAssignment, IpStatus};

/// Addresses in the set answer; everything else is unreachable.
struct ScriptedProber {
    reachable: HashSet<IpAddr>,
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, address: IpAddr) -> ProbeOutcome {
        if self.reachable.contains(&address) {
            ProbeOutcome::online(7)
        } else {
            ProbeOutcome::offline("unreachable: scripted")
        }
    }
}

async fn seed_with_ip(store: &MemoryStore, id: &str, address: &str, status: EquipmentStatus) {
    store
        .add_equipment(Equipment {
            id: id.to_string(),
            name: format!("Equipment {id}"),
            status,
            last_seen: None,
            mesh_strength: None,
        })
        .await;
    let ip_id = format!("ip-{id}");
    store
        .add_ip_address(IpAddress {
            id: ip_id.clone(),
            address: address.parse().unwrap(),
            status: IpStatus::Assigned,
            is_reserved: false,
        })
        .await;
    store
        .add_assignment(IpAssignment {
            id: format!("as-{id}"),
            equipment_id: id.to_string(),
            ip_address_id: ip_id,
            user_id: "operator".to_string(),
            is_active: true,
            assigned_at: Utc::now(),
            released_at: None,
        })
        .await;
}

fn service_with(store: Arc<MemoryStore>, reachable: &[&str]) -> MonitorService {
    let reachable = reachable.iter().map(|a| a.parse().unwrap()).collect();
    MonitorService::with_prober(
        store,
        Arc::new(ScriptedProber { reachable }),
        &MonitorConfig::default(),
    )
}

#[tokio::test]
async fn on_demand_fleet_check_applies_status_and_alerts() {
    let store = Arc::new(MemoryStore::new());
    seed_with_ip(&store, "up", "10.2.0.1", EquipmentStatus::Unknown).await;
    seed_with_ip(&store, "down", "10.2.0.2", EquipmentStatus::Online).await;

    let service = service_with(store.clone(), &["10.2.0.1"]);

    let entries = assert_ok!(service.check_all_equipment_status().await);
    assert_eq!(entries.len(), 2);

    let up = store.get_equipment("up").await.unwrap().unwrap();
    assert_eq!(up.status, EquipmentStatus::Online);
    assert!(up.last_seen.is_some());

    let down = store.get_equipment("down").await.unwrap().unwrap();
    assert_eq!(down.status, EquipmentStatus::Offline);

    let offline_alerts = store
        .find_unresolved_alerts(Some("down"), Some(AlertType::EquipmentOffline))
        .await
        .unwrap();
    assert_eq!(offline_alerts.len(), 1);
}

#[tokio::test]
async fn single_check_round_trip_resolves_after_recovery() {
    let store = Arc::new(MemoryStore::new());
    seed_with_ip(&store, "flappy", "10.2.1.1", EquipmentStatus::Online).await;

    // First: unreachable. Equipment goes offline and gets an alert.
    let down_service = service_with(store.clone(), &[]);
    let entry = down_service.check_equipment_status("flappy").await.unwrap();
    assert!(!entry.is_online);

    let row = store.get_equipment("flappy").await.unwrap().unwrap();
    assert_eq!(row.status, EquipmentStatus::Offline);
    assert_eq!(
        store.find_unresolved_alerts(Some("flappy"), None).await.unwrap().len(),
        1
    );

    // Then: reachable again. Status recovers and the alert self-heals.
    let up_service = service_with(store.clone(), &["10.2.1.1"]);
    let entry = up_service.check_equipment_status("flappy").await.unwrap();
    assert!(entry.is_online);

    let row = store.get_equipment("flappy").await.unwrap().unwrap();
    assert_eq!(row.status, EquipmentStatus::Online);
    assert!(
        store.find_unresolved_alerts(Some("flappy"), None).await.unwrap().is_empty()
    );
}

#[tokio::test]
async fn scheduled_monitor_applies_first_tick() {
    let store = Arc::new(MemoryStore::new());
    seed_with_ip(&store, "truck-1", "10.2.2.1", EquipmentStatus::Unknown).await;

    let service = service_with(store.clone(), &["10.2.2.1"]);

    // Long interval: only the immediate first tick runs during the test.
    let status = service.start_equipment_monitor(Some(60_000)).await;
    assert!(status.is_running);
    assert_eq!(status.interval_ms, Some(60_000));

    // Poll until the first tick lands; bounded so a hang still fails.
    let mut status = EquipmentStatus::Unknown;
    for _ in 0..200 {
        status = store.get_equipment("truck-1").await.unwrap().unwrap().status;
        if status == EquipmentStatus::Online {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }
    assert_eq!(status, EquipmentStatus::Online);

    assert!(service.stop_equipment_monitor().await);
    assert!(!service.is_equipment_monitor_running().await);
}

#[tokio::test]
async fn monitor_control_surface() {
    let store = Arc::new(MemoryStore::new());
    let service = service_with(store, &[]);

    // Not running yet.
    assert!(!service.is_equipment_monitor_running().await);
    let status = service.get_monitoring_status().await;
    assert!(!status.is_running);
    assert_eq!(status.interval_ms, None);
    assert!(!service.stop_equipment_monitor().await);

    // Double start keeps the first interval.
    service.start_equipment_monitor(Some(45_000)).await;
    let status = service.start_equipment_monitor(Some(5)).await;
    assert_eq!(status.interval_ms, Some(45_000));

    // Restart replaces it.
    let status = service.restart_equipment_monitor(Some(20_000)).await;
    assert_eq!(status.interval_ms, Some(20_000));

    assert!(service.stop_equipment_monitor().await);
}

#[tokio::test]
async fn consistency_check_endpoint_returns_counts() {
    let store = Arc::new(MemoryStore::new());
    // ONLINE without an IP: the run must sync it down.
    store
        .add_equipment(Equipment {
            id: "lonely".to_string(),
            name: "Lonely".to_string(),
            status: EquipmentStatus::Online,
            last_seen: None,
            mesh_strength: None,
        })
        .await;

    let service = service_with(store.clone(), &[]);
    let report = service.run_data_consistency_check().await;

    assert_eq!(report.equipment_synced, 1);
    assert_eq!(
        store.get_equipment("lonely").await.unwrap().unwrap().status,
        EquipmentStatus::Offline
    );
}

#[tokio::test]
async fn conflicting_assignments_are_reported_not_fixed() {
    let store = Arc::new(MemoryStore::new());
    seed_with_ip(&store, "a", "10.2.3.1", EquipmentStatus::Online).await;

    // Second active assignment for the same IP, different equipment.
    store
        .add_equipment(Equipment {
            id: "b".to_string(),
            name: "Equipment b".to_string(),
            status: EquipmentStatus::Online,
            last_seen: None,
            mesh_strength: None,
        })
        .await;
    store
        .add_assignment(IpAssignment {
            id: "as-dup".to_string(),
            equipment_id: "b".to_string(),
            ip_address_id: "ip-a".to_string(),
            user_id: "operator".to_string(),
            is_active: true,
            assigned_at: Utc::now(),
            released_at: None,
        })
        .await;

    let service = service_with(store.clone(), &[]);
    let conflicts = service.find_assignment_conflicts().await.unwrap();

    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].ip_address_id, "ip-a");
    assert_eq!(store.active_assignments().await.unwrap().len(), 2);
}
