//! Provider connectivity check.

use std::fmt;

use tracing::{info, warn};

use crate::upstream::{ApiSportsClient, FootballDataClient, Provider};

/// Result of probing one provider; `None` when it is not configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub provider: Provider,
    pub reachable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    pub probes: Vec<ProbeResult>,
}

impl ConnectionReport {
    /// At least one provider answered and none failed.
    pub fn is_ok(&self) -> bool {
        self.probes.iter().any(|p| p.reachable == Some(true))
            && !self.probes.iter().any(|p| p.reachable == Some(false))
    }
}

impl fmt::Display for ConnectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for probe in &self.probes {
            let state = match probe.reachable {
                Some(true) => "OK",
                Some(false) => "FAILED",
                None => "not configured",
            };
            writeln!(f, "{}: {}", probe.provider, state)?;
        }
        Ok(())
    }
}

pub async fn test_connections(
    football_data: Option<&FootballDataClient>,
    api_sports: Option<&ApiSportsClient>,
) -> ConnectionReport {
    let mut probes = Vec::with_capacity(2);

    let reachable = match football_data {
        Some(client) => Some(client.test_connection().await),
        None => None,
    };
    probes.push(ProbeResult {
        provider: Provider::FootballData,
        reachable,
    });

    let reachable = match api_sports {
        Some(client) => Some(client.test_connection().await),
        None => None,
    };
    probes.push(ProbeResult {
        provider: Provider::ApiSports,
        reachable,
    });

    for probe in &probes {
        match probe.reachable {
            Some(true) => info!("{} reachable", probe.provider),
            Some(false) => warn!("{} unreachable", probe.provider),
            None => info!("{} skipped: no API key configured", probe.provider),
        }
    }
    ConnectionReport { probes }
}
