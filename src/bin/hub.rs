use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use meshwatch::{
    Equipment, EquipmentStatus, IpAddress, IpAssignment, IpStatus,
    config::{EquipmentSeed, read_config_file},
    service::MonitorService,
    store::MemoryStore,
};
use tracing::{debug, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("meshwatch", LevelFilter::TRACE),
        ("hub", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();

    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;

    let store = Arc::new(MemoryStore::new());
    if let Some(seeds) = &config.equipment {
        seed_store(&store, seeds).await;
    }

    let service = MonitorService::new(store, &config.monitor);

    let status = service
        .start_equipment_monitor(Some(config.monitor.interval_ms))
        .await;
    info!("equipment monitor running (interval {:?}ms)", status.interval_ms);

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    service.stop_equipment_monitor().await;

    Ok(())
}

async fn seed_store(store: &MemoryStore, seeds: &[EquipmentSeed]) {
    for (i, seed) in seeds.iter().enumerate() {
        store
            .add_equipment(Equipment {
                id: seed.id.clone(),
                name: seed.name.clone().unwrap_or_else(|| seed.id.clone()),
                status: EquipmentStatus::Unknown,
                last_seen: None,
                mesh_strength: None,
            })
            .await;

        if let Some(address) = seed.ip {
            let ip_id = format!("ip-{i}");
            store
                .add_ip_address(IpAddress {
                    id: ip_id.clone(),
                    address,
                    status: IpStatus::Assigned,
                    is_reserved: false,
                })
                .await;
            store
                .add_assignment(IpAssignment {
                    id: format!("assignment-{i}"),
                    equipment_id: seed.id.clone(),
                    ip_address_id: ip_id,
                    user_id: seed.user.clone().unwrap_or_else(|| "operator".to_string()),
                    is_active: true,
                    assigned_at: Utc::now(),
                    released_at: None,
                })
                .await;
        }

        debug!("seeded {} ({:?})", seed.id, seed.ip);
    }
}
