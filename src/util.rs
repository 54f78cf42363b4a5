const PROBE_PORT: &str = "MESHWATCH_PROBE_PORT";

const DEFAULT_PROBE_PORT: u16 = 80;

pub fn get_default_probe_port() -> u16 {
    let port_from_env = std::env::var(PROBE_PORT);
    port_from_env.map_or(DEFAULT_PROBE_PORT, |res| {
        res.parse().unwrap_or(DEFAULT_PROBE_PORT)
    })
}

const MONITOR_INTERVAL_MS: &str = "MESHWATCH_INTERVAL_MS";

const DEFAULT_MONITOR_INTERVAL_MS: u64 = 30_000;

pub fn get_default_interval_ms() -> u64 {
    let interval_from_env = std::env::var(MONITOR_INTERVAL_MS);
    interval_from_env.map_or(DEFAULT_MONITOR_INTERVAL_MS, |res| {
        res.parse().unwrap_or(DEFAULT_MONITOR_INTERVAL_MS)
    })
}
