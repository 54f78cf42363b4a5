//! Liveness probing for mesh equipment
//!
//! A probe is a single transport-level reachability check against one
//! equipment's network address. Probes never fail past their own boundary:
//! timeouts and unreachable hosts are captured in the returned
//! [`ProbeOutcome`], never raised to the caller.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::trace;

/// Default bound on one probe round trip.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of a single reachability check.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub online: bool,
    pub response_time_ms: Option<u64>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn online(response_time_ms: u64) -> Self {
        Self {
            online: true,
            response_time_ms: Some(response_time_ms),
            error: None,
        }
    }

    pub fn offline(reason: impl Into<String>) -> Self {
        Self {
            online: false,
            response_time_ms: None,
            error: Some(reason.into()),
        }
    }
}

/// Trait for issuing a liveness check against one address.
///
/// Kept behind a trait so the aggregator can be exercised with scripted
/// probers in tests and so transports other than TCP can be swapped in.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, address: IpAddr) -> ProbeOutcome;
}

/// TCP connect prober.
///
/// Opens a TCP connection to `address:port` with a bounded timeout. A
/// completed handshake is proof of liveness; a refused connection also is —
/// the host answered, it just has nothing listening on that port. Only
/// timeouts and unreachable-network errors count as offline.
pub struct TcpProber {
    port: u16,
    timeout: Duration,
}

impl TcpProber {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(crate::util::get_default_probe_port(), DEFAULT_PROBE_TIMEOUT)
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, address: IpAddr) -> ProbeOutcome {
        let start = Instant::now();
        let target = (address, self.port);

        let outcome = match tokio::time::timeout(self.timeout, TcpStream::connect(target)).await {
            Ok(Ok(_stream)) => ProbeOutcome::online(start.elapsed().as_millis() as u64),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                // The host sent an RST: reachable, nothing listening.
                ProbeOutcome::online(start.elapsed().as_millis() as u64)
            }
            Ok(Err(e)) => ProbeOutcome::offline(format!("unreachable: {e}")),
            Err(_) => ProbeOutcome::offline(format!(
                "probe timed out after {}ms",
                self.timeout.as_millis()
            )),
        };

        trace!(
            "probe {address}:{} -> online={} ({:?}ms)",
            self.port, outcome.online, outcome.response_time_ms
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_probe_reports_listening_host_online() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let prober = TcpProber::new(port, DEFAULT_PROBE_TIMEOUT);
        let outcome = prober.probe(IpAddr::V4(Ipv4Addr::LOCALHOST)).await;

        assert!(outcome.online);
        assert!(outcome.response_time_ms.is_some());
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_probe_treats_refused_connection_as_online() {
        // Bind to grab a free port, then drop the listener so connects
        // are refused.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = TcpProber::new(port, DEFAULT_PROBE_TIMEOUT);
        let outcome = prober.probe(IpAddr::V4(Ipv4Addr::LOCALHOST)).await;

        assert!(outcome.online);
    }

    #[test]
    fn test_offline_outcome_carries_reason_without_timing() {
        let outcome = ProbeOutcome::offline("no route to host");
        assert!(!outcome.online);
        assert_eq!(outcome.response_time_ms, None);
        assert_eq!(outcome.error.as_deref(), Some("no route to host"));
    }
}
