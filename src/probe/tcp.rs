//! TCP reachability probe.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};

use super::ProbeError;

/// Resolve `target` and open a TCP connection to `port`.
///
/// Resolution and every connect attempt share one deadline. Returns the
/// address that accepted the connection.
pub async fn check_reachability(
    target: &str,
    port: u16,
    timeout: Duration,
) -> Result<SocketAddr, ProbeError> {
    within(timeout, connect_any(target, port)).await
}

/// Run `attempt` under `timeout`, turning an expired deadline into `ProbeError::Timeout`.
async fn within<T, F>(timeout: Duration, attempt: F) -> Result<T, ProbeError>
where
    F: Future<Output = Result<T, ProbeError>>,
{
    match tokio::time::timeout(timeout, attempt).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(timeout)),
    }
}

async fn connect_any(target: &str, port: u16) -> Result<SocketAddr, ProbeError> {
    let addrs: Vec<SocketAddr> = lookup_host((target, port))
        .await
        .map_err(|e| ProbeError::Network(format!("DNS resolution failed: {}", e)))?
        .collect();

    if addrs.is_empty() {
        return Err(ProbeError::Network(format!("No addresses found for {}", target)));
    }

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream.peer_addr().unwrap_or(addr)),
            Err(e) => last_err = Some(e),
        }
    }

    Err(ProbeError::Network(format!(
        "failed to connect: {}",
        last_err.map(|e| e.to_string()).unwrap_or_default()
    )))
}
