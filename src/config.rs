use std::net::IpAddr;

use tracing::trace;

/// Tuning for the monitoring core. All fields carry sensible defaults, so an
/// empty `{}` block is a valid configuration.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonitorConfig {
    /// Scheduler tick interval in milliseconds
    #[serde(default = "crate::util::get_default_interval_ms")]
    pub interval_ms: u64,

    /// TCP port probed for reachability
    #[serde(default = "crate::util::get_default_probe_port")]
    pub probe_port: u16,

    /// Per-probe timeout in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Ceiling on simultaneous probes within one aggregator run
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    /// Mesh strength (percent) below which a weak-signal alert is raised
    #[serde(default = "default_weak_signal_threshold")]
    pub weak_signal_threshold: u8,

    /// Released assignments older than this are hard-deleted
    #[serde(default = "default_assignment_retention_days")]
    pub assignment_retention_days: u32,

    /// Resolved alerts older than this are hard-deleted
    #[serde(default = "default_alert_retention_days")]
    pub alert_retention_days: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: crate::util::get_default_interval_ms(),
            probe_port: crate::util::get_default_probe_port(),
            probe_timeout_ms: default_probe_timeout_ms(),
            max_concurrent_probes: default_max_concurrent_probes(),
            weak_signal_threshold: default_weak_signal_threshold(),
            assignment_retention_days: default_assignment_retention_days(),
            alert_retention_days: default_alert_retention_days(),
        }
    }
}

fn default_probe_timeout_ms() -> u64 {
    2_000
}

fn default_max_concurrent_probes() -> usize {
    16
}

fn default_weak_signal_threshold() -> u8 {
    30
}

fn default_assignment_retention_days() -> u32 {
    90
}

fn default_alert_retention_days() -> u32 {
    30
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Inventory seeded into the in-memory store by the hub binary.
    /// Deployments with a real store leave this empty.
    pub equipment: Option<Vec<EquipmentSeed>>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EquipmentSeed {
    pub id: String,
    pub name: Option<String>,
    /// Address currently assigned to this equipment, if any
    pub ip: Option<IpAddr>,
    pub user: Option<String>,
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
