//! Latency probe: native ICMP echo with a `ping` command fallback.
//!
//! Echoes run on blocking sockets inside spawn_blocking for sub-millisecond
//! timing precision.

use std::mem::MaybeUninit;
use std::net::{IpAddr, SocketAddr};
use std::process::Stdio;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::process::Command;

use super::{round_to, ProbeError};

/// ICMP capability state
#[derive(Debug, Clone, Copy, PartialEq)]
enum IcmpCapability {
    /// Native ICMP sockets are available
    Native,
    /// Only command fallback is available
    CommandOnly,
}

static ICMP_CAPABILITY: OnceLock<IcmpCapability> = OnceLock::new();

static PING_SEQUENCE: AtomicU16 = AtomicU16::new(0);

/// Identifier and sequence for one echo, unique across concurrent probes.
fn next_echo_id() -> (u16, u16) {
    let identifier: u16 = rand::random();
    let sequence = PING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    (identifier, sequence)
}

fn detect_icmp_capability() -> IcmpCapability {
    // RAW needs CAP_NET_RAW or root, DGRAM works unprivileged where ping_group_range allows it
    if Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)).is_ok() {
        tracing::info!("Latency probe: using native ICMP (RAW socket, privileged)");
        return IcmpCapability::Native;
    }

    if Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::ICMPV4)).is_ok() {
        tracing::info!("Latency probe: using native ICMP (DGRAM socket, unprivileged)");
        return IcmpCapability::Native;
    }

    tracing::info!("Latency probe: native ICMP unavailable, using ping command");
    IcmpCapability::CommandOnly
}

/// Send `count` echo requests to `target` and average the replies.
///
/// Returns the mean round trip in milliseconds rounded to two places, or
/// `None` when no echo came back. Each echo is bounded by `timeout`.
pub async fn sample_latency(target: &str, count: u32, timeout: Duration) -> Option<f64> {
    let count = count.max(1);
    let capability = *ICMP_CAPABILITY.get_or_init(detect_icmp_capability);

    let samples = if capability == IcmpCapability::Native {
        match native_samples(target, count, timeout).await {
            Ok(samples) => samples,
            Err(e) if is_permission_error(&e) => {
                tracing::warn!(
                    "Native ping not permitted for {}, falling back to command: {}",
                    target,
                    e
                );
                command_samples(target, count, timeout).await.unwrap_or_default()
            }
            Err(e) => {
                tracing::debug!("Latency probe failed for {}: {}", target, e);
                Vec::new()
            }
        }
    } else {
        match command_samples(target, count, timeout).await {
            Ok(samples) => samples,
            Err(e) => {
                tracing::debug!("Latency probe failed for {}: {}", target, e);
                Vec::new()
            }
        }
    };

    average_ms(&samples)
}

fn average_ms(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(round_to(samples.iter().sum::<f64>() / samples.len() as f64, 2))
}

fn is_permission_error(e: &ProbeError) -> bool {
    let text = e.to_string();
    text.contains("Permission")
        || text.contains("Operation not permitted")
        || text.contains("denied")
}

/// Successful round trips in milliseconds. Lost echoes are skipped.
async fn native_samples(
    target: &str,
    count: u32,
    timeout: Duration,
) -> Result<Vec<f64>, ProbeError> {
    let ip = resolve_address(target, timeout).await?;
    let guard = timeout.saturating_add(Duration::from_millis(250));
    let mut samples = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let echo = tokio::task::spawn_blocking(move || blocking_echo(ip, timeout));
        // The socket read timeout already bounds the thread; this guards a stuck send.
        let result = match tokio::time::timeout(guard, echo).await {
            Ok(joined) => joined
                .map_err(|e| ProbeError::Network(format!("spawn_blocking failed: {}", e)))?,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        };

        match result {
            Ok(rtt) => samples.push(rtt.as_secs_f64() * 1000.0),
            Err(e @ ProbeError::Timeout(_)) => tracing::debug!("Echo to {} lost: {}", ip, e),
            Err(e) => return Err(e),
        }
    }

    Ok(samples)
}

/// Resolve a hostname to its first IP address within `timeout`.
async fn resolve_address(target: &str, timeout: Duration) -> Result<IpAddr, ProbeError> {
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(ip);
    }

    let lookup = tokio::net::lookup_host(format!("{}:0", target));
    let addrs: Vec<_> = tokio::time::timeout(timeout, lookup)
        .await
        .map_err(|_| ProbeError::Timeout(timeout))?
        .map_err(|e| ProbeError::Network(format!("DNS resolution failed: {}", e)))?
        .collect();

    addrs
        .into_iter()
        .next()
        .map(|sa| sa.ip())
        .ok_or_else(|| ProbeError::Network(format!("No addresses found for {}", target)))
}

/// One ICMP echo on a blocking socket; runs inside spawn_blocking.
fn blocking_echo(ip: IpAddr, timeout: Duration) -> Result<Duration, ProbeError> {
    let (domain, protocol, reply_type) = match ip {
        IpAddr::V4(_) => (Domain::IPV4, Protocol::ICMPV4, 0u8),
        IpAddr::V6(_) => (Domain::IPV6, Protocol::ICMPV6, 129u8),
    };

    let socket = Socket::new(domain, Type::RAW, Some(protocol))
        .or_else(|_| Socket::new(domain, Type::DGRAM, Some(protocol)))
        .map_err(|e| ProbeError::Network(format!("Failed to create ICMP socket: {}", e)))?;

    socket
        .set_read_timeout(Some(timeout))
        .and_then(|_| socket.set_write_timeout(Some(timeout)))
        .map_err(|e| ProbeError::Network(format!("Failed to set timeout: {}", e)))?;

    socket
        .connect(&SocketAddr::new(ip, 0).into())
        .map_err(|e| ProbeError::Network(format!("Failed to connect: {}", e)))?;

    let (identifier, sequence) = next_echo_id();
    let packet = match ip {
        IpAddr::V4(_) => build_icmp_echo_request(identifier, sequence),
        IpAddr::V6(_) => build_icmpv6_echo_request(identifier, sequence),
    };

    let start = Instant::now();

    socket.send(&packet).map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            ProbeError::Network(format!("Permission denied: {}", e))
        } else {
            ProbeError::Network(format!("Failed to send: {}", e))
        }
    })?;

    // Other replies can arrive on the same socket; wait for ours or the deadline.
    loop {
        let mut buf = [MaybeUninit::<u8>::uninit(); 1500];
        let len = socket.recv(&mut buf).map_err(|e| {
            if matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ) {
                ProbeError::Timeout(timeout)
            } else {
                ProbeError::Network(format!("Failed to receive: {}", e))
            }
        })?;
        let elapsed = start.elapsed();

        // SAFETY: recv initialized the first `len` bytes
        let data: &[u8] = unsafe { std::slice::from_raw_parts(buf.as_ptr() as *const u8, len) };

        if elapsed >= timeout {
            return Err(ProbeError::Timeout(timeout));
        }

        if is_echo_reply(data, reply_type, identifier, sequence) {
            return Ok(elapsed);
        }
    }
}

/// Check an incoming datagram against the echo we sent.
///
/// RAW IPv4 sockets deliver the IP header too; DGRAM sockets and ICMPv6
/// deliver the bare ICMP message.
fn is_echo_reply(data: &[u8], reply_type: u8, identifier: u16, sequence: u16) -> bool {
    let offset = if reply_type == 0 && !data.is_empty() && data[0] >> 4 == 4 {
        ((data[0] & 0x0F) as usize) * 4
    } else {
        0
    };

    if data.len() < offset + 8 {
        return false;
    }

    let icmp = &data[offset..];
    let reply_id = u16::from_be_bytes([icmp[4], icmp[5]]);
    let reply_seq = u16::from_be_bytes([icmp[6], icmp[7]]);

    // Linux rewrites the identifier on DGRAM sockets, so the sequence is the reliable match there
    icmp[0] == reply_type && reply_seq == sequence && (reply_id == identifier || offset == 0)
}

fn echo_payload(packet: &mut [u8]) {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    packet[8..16].copy_from_slice(&timestamp.to_be_bytes());
}

/// Build an ICMP Echo Request packet (type 8, code 0).
fn build_icmp_echo_request(identifier: u16, sequence: u16) -> Vec<u8> {
    let mut packet = vec![0u8; 64]; // 8 byte header + 56 byte payload
    packet[0] = 8;
    packet[4..6].copy_from_slice(&identifier.to_be_bytes());
    packet[6..8].copy_from_slice(&sequence.to_be_bytes());
    echo_payload(&mut packet);

    let checksum = icmp_checksum(&packet);
    packet[2..4].copy_from_slice(&checksum.to_be_bytes());
    packet
}

/// Build an ICMPv6 Echo Request packet (type 128, code 0).
///
/// The kernel fills in the ICMPv6 checksum.
fn build_icmpv6_echo_request(identifier: u16, sequence: u16) -> Vec<u8> {
    let mut packet = vec![0u8; 64];
    packet[0] = 128;
    packet[4..6].copy_from_slice(&identifier.to_be_bytes());
    packet[6..8].copy_from_slice(&sequence.to_be_bytes());
    echo_payload(&mut packet);
    packet
}

/// Compute ICMP checksum (RFC 1071).
fn icmp_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = data
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]) as u32,
            [hi] => (*hi as u32) << 8,
            _ => 0,
        })
        .sum();

    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !sum as u16
}

/// Each echo waits at most `timeout`, plus a second for process startup.
fn command_deadline(timeout: Duration, count: u32) -> Duration {
    timeout.saturating_mul(count).saturating_add(Duration::from_secs(1))
}

/// Run the system `ping` for `count` echoes and collect per-reply times.
async fn command_samples(
    target: &str,
    count: u32,
    timeout: Duration,
) -> Result<Vec<f64>, ProbeError> {
    let mut command = Command::new("ping");
    if cfg!(windows) {
        command.args(["-n", &count.to_string(), "-w", &timeout.as_millis().to_string(), target]);
    } else {
        let timeout_secs = timeout.as_secs().max(1);
        command.args(["-c", &count.to_string(), "-W", &timeout_secs.to_string(), target]);
    }

    let deadline = command_deadline(timeout, count);
    let output = tokio::time::timeout(
        deadline,
        command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| ProbeError::Timeout(deadline))?
    .map_err(|e| ProbeError::Command(format!("failed to execute ping: {}", e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let samples = parse_ping_output(&stdout);

    if samples.is_empty() {
        if stdout.contains("100% packet loss") || stdout.contains("100.0% packet loss") {
            return Err(ProbeError::Timeout(timeout));
        }
        return Err(ProbeError::Command(format!("ping produced no replies: {}", stdout.trim())));
    }

    Ok(samples)
}

/// Parse ping command output into round trip times in milliseconds.
///
/// Per-reply `time=` lines win; the summary average is used when no
/// per-reply line is present.
fn parse_ping_output(output: &str) -> Vec<f64> {
    // "time=12.3 ms" (Linux, macOS), "time=12ms" / "time<1ms" (Windows)
    static PER_REPLY: OnceLock<Regex> = OnceLock::new();
    let per_reply = PER_REPLY.get_or_init(|| {
        Regex::new(r"time[=<](?P<val>[0-9.]+)\s*ms").unwrap()
    });

    let samples: Vec<f64> = per_reply
        .captures_iter(output)
        .filter_map(|caps| caps.name("val")?.as_str().parse().ok())
        .collect();
    if !samples.is_empty() {
        return samples;
    }

    // "round-trip min/avg/max/stddev = a/b/c/d ms" (macOS) or "rtt min/avg/max/mdev = ..." (Linux)
    static SUMMARY: OnceLock<Regex> = OnceLock::new();
    let summary = SUMMARY.get_or_init(|| {
        Regex::new(concat!(
            r"(?:round-trip|rtt)\s+min/avg/max/(?:stddev|mdev)\s*=\s*",
            r"([0-9.]+)/([0-9.]+)/([0-9.]+)"
        ))
        .unwrap()
    });

    summary
        .captures(output)
        .and_then(|caps| caps.get(2)?.as_str().parse().ok())
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_deadline() {
        assert_eq!(command_deadline(Duration::from_secs(2), 4), Duration::from_secs(9));
        assert_eq!(command_deadline(Duration::MAX, 4), Duration::MAX);
        assert_eq!(command_deadline(Duration::from_secs(u64::MAX / 2), 3), Duration::MAX);
    }

    #[test]
    fn test_icmp_checksum_verifies() {
        let packet = build_icmp_echo_request(0x1234, 0x0001);
        // A packet carrying its own checksum sums to zero
        assert_eq!(icmp_checksum(&packet), 0);
    }

    #[test]
    fn test_icmp_checksum_odd_length() {
        assert_eq!(icmp_checksum(&[0xFF]), !0xFF00u16);
    }

    #[test]
    fn test_build_icmp_packet() {
        let packet = build_icmp_echo_request(0x1234, 0x0001);
        assert_eq!(packet.len(), 64);
        assert_eq!(packet[0], 8); // Type
        assert_eq!(packet[1], 0); // Code
        assert_eq!(packet[4..6], [0x12, 0x34]);
        assert_eq!(packet[6..8], [0x00, 0x01]);
    }

    #[test]
    fn test_build_icmpv6_packet() {
        let packet = build_icmpv6_echo_request(0xBEEF, 7);
        assert_eq!(packet[0], 128);
        assert_eq!(packet[2..4], [0, 0]);
        assert_eq!(packet[6..8], [0x00, 0x07]);
    }

    #[test]
    fn test_echo_reply_matching() {
        let mut reply = vec![0u8; 8];
        reply[4..6].copy_from_slice(&0x1234u16.to_be_bytes());
        reply[6..8].copy_from_slice(&5u16.to_be_bytes());
        assert!(is_echo_reply(&reply, 0, 0x1234, 5));
        assert!(!is_echo_reply(&reply, 0, 0x1234, 6));
        assert!(!is_echo_reply(&reply[..6], 0, 0x1234, 5));

        // Same reply behind a 20 byte IPv4 header
        let mut raw = vec![0x45u8];
        raw.extend_from_slice(&[0u8; 19]);
        raw.extend_from_slice(&reply);
        assert!(is_echo_reply(&raw, 0, 0x1234, 5));
        assert!(!is_echo_reply(&raw, 0, 0x9999, 5));
    }

    #[test]
    fn test_average_ms() {
        assert_eq!(average_ms(&[]), None);
        assert_eq!(average_ms(&[20.0, 80.0]), Some(50.0));
        assert_eq!(average_ms(&[1.111, 2.222, 3.334]), Some(2.22));
    }

    #[test]
    fn test_parse_ping_output_linux() {
        let output = r#"PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.
64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=12.3 ms
64 bytes from 8.8.8.8: icmp_seq=2 ttl=117 time=14.7 ms

--- 8.8.8.8 ping statistics ---
2 packets transmitted, 2 received, 0% packet loss, time 1001ms
rtt min/avg/max/mdev = 12.300/13.500/14.700/1.200 ms"#;
        assert_eq!(parse_ping_output(output), vec![12.3, 14.7]);
    }

    #[test]
    fn test_parse_ping_output_macos_summary() {
        let output = r#"PING google.com (142.250.69.174): 56 data bytes

--- google.com ping statistics ---
1 packets transmitted, 1 packets received, 0.0% packet loss
round-trip min/avg/max/stddev = 17.906/17.906/17.906/0.000 ms"#;
        assert_eq!(parse_ping_output(output), vec![17.906]);
    }

    #[test]
    fn test_parse_ping_output_windows() {
        let output = "Reply from 13.107.6.152: bytes=32 time=9ms TTL=118\n\
                      Reply from 13.107.6.152: bytes=32 time<1ms TTL=118";
        assert_eq!(parse_ping_output(output), vec![9.0, 1.0]);
    }

    #[test]
    fn test_parse_ping_output_all_lost() {
        let output = "4 packets transmitted, 0 received, 100% packet loss, time 3060ms";
        assert!(parse_ping_output(output).is_empty());
    }
}
