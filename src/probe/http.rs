//! HTTP throughput probe.

use std::time::{Duration, Instant};

use super::{round_to, ProbeError, ThroughputSample};

/// Small resource fetched to estimate download rate.
pub const DOWNLOAD_PATH: &str = "/favicon.ico";

/// Sample throughput or response time for `url`.
///
/// Strategies are tried in order and the first one that succeeds wins:
/// download a small object (Kbps), then a HEAD round trip (ms), then the
/// first-response time of a plain GET (ms).
pub async fn sample_throughput(url: &str, timeout: Duration) -> Option<ThroughputSample> {
    let url = normalize_url(url);

    let client = match reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::debug!("Failed to build HTTP client: {}", e);
            return None;
        }
    };

    match download_rate(&client, &url, timeout).await {
        Ok(kbps) => return Some(ThroughputSample::Download { kbps }),
        Err(e) => tracing::debug!("Download sample failed for {}: {}", url, e),
    }

    match head_round_trip(&client, &url, timeout).await {
        Ok(ms) => return Some(ThroughputSample::Head { ms }),
        Err(e) => tracing::debug!("HEAD sample failed for {}: {}", url, e),
    }

    match first_response(&client, &url, timeout).await {
        Ok(ms) => Some(ThroughputSample::FirstResponse { ms }),
        Err(e) => {
            tracing::debug!("GET sample failed for {}: {}", url, e);
            None
        }
    }
}

fn normalize_url(address: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("https://{}", address)
    }
}

/// `scheme://host[:port]` of a URL, without path, query or fragment.
fn origin(url: &str) -> &str {
    let after_scheme = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[after_scheme..].find(['/', '?', '#']) {
        Some(idx) => &url[..after_scheme + idx],
        None => url,
    }
}

fn map_reqwest(e: reqwest::Error, timeout: Duration) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout(timeout)
    } else {
        ProbeError::Http(e.to_string())
    }
}

/// Kilobits per second: `bytes * 8 / seconds / 1024`.
pub fn kbps(bytes: usize, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if bytes == 0 || secs <= 0.0 {
        return None;
    }
    Some(round_to((bytes as f64 * 8.0) / secs / 1024.0, 2))
}

fn millis(elapsed: Duration) -> f64 {
    round_to(elapsed.as_secs_f64() * 1000.0, 2)
}

async fn download_rate(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<f64, ProbeError> {
    let target = format!("{}{}", origin(url), DOWNLOAD_PATH);
    let start = Instant::now();

    let response = client
        .get(&target)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| map_reqwest(e, timeout))?;

    // Read the full body to measure complete transfer time
    let body = response.bytes().await.map_err(|e| map_reqwest(e, timeout))?;

    kbps(body.len(), start.elapsed())
        .ok_or_else(|| ProbeError::Http(format!("empty body from {}", target)))
}

async fn head_round_trip(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<f64, ProbeError> {
    let start = Instant::now();
    client
        .head(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| map_reqwest(e, timeout))?;
    Ok(millis(start.elapsed()))
}

/// Any HTTP status counts here: the server answered.
async fn first_response(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<f64, ProbeError> {
    let start = Instant::now();
    client
        .get(url)
        .send()
        .await
        .map_err(|e| map_reqwest(e, timeout))?;
    Ok(millis(start.elapsed()))
}
