use async_trait::async_trait;
use tokio::process::Command;

/// Result of probing a single host.
#[derive(Debug, Clone, Copy)]
pub struct ProbeResult {
    pub reachable: bool,
    pub latency_ms: Option<f64>,
}

/// Abstraction over "can we reach this host", so the debounce logic in
/// [`crate::monitor::ConnectivityMonitor`] can be exercised without shelling
/// out to a real `ping` binary.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, host: &str) -> ProbeResult;
}

/// Shells out to the system `ping` binary, the way the upstream ISP monitor
/// does rather than opening a raw socket (which would need elevated
/// privileges).
pub struct SystemPinger;

#[async_trait]
impl Prober for SystemPinger {
    async fn probe(&self, host: &str) -> ProbeResult {
        ping(host).await
    }
}

async fn ping(host: &str) -> ProbeResult {
    let output = match Command::new("ping")
        .args(["-c", "1", "-W", "3", host])
        .output()
        .await
    {
        Ok(output) => output,
        Err(_) => return ProbeResult { reachable: false, latency_ms: None },
    };
    if !output.status.success() {
        return ProbeResult { reachable: false, latency_ms: None };
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let latency_ms = parse_latency(&stdout);
    ProbeResult { reachable: true, latency_ms }
}

fn parse_latency(output: &str) -> Option<f64> {
    let after = output.split("time=").nth(1)?;
    let token = after.split_whitespace().next()?;
    token.trim_end_matches("ms").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_linux_ping_output() {
        let sample = "64 bytes from 1.1.1.1: icmp_seq=1 ttl=58 time=12.3 ms";
        assert_eq!(parse_latency(sample), Some(12.3));
    }

    #[test]
    fn missing_time_field_yields_none() {
        assert_eq!(parse_latency("request timeout"), None);
    }
}
