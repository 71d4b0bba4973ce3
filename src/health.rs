//! Health checks for the backing services

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Default timeout for a single health probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Observed state of a backing service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Answered with HTTP 200
    Up,
    /// Answered, but not with HTTP 200
    Degraded,
    /// Could not be reached
    Down,
}

impl ServiceState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Degraded => "degraded",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A service that can report its own health
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Name shown in health reports
    fn service_name(&self) -> &'static str;

    /// Probe the service
    async fn health(&self) -> ServiceState;
}

/// Probe `url` with a GET request
pub async fn probe(client: &reqwest::Client, url: &str, timeout: Duration) -> ServiceState {
    match client.get(url).timeout(timeout).send().await {
        Ok(response) if response.status() == reqwest::StatusCode::OK => ServiceState::Up,
        Ok(response) => {
            tracing::debug!(url, status = %response.status(), "service degraded");
            ServiceState::Degraded
        }
        Err(e) => {
            tracing::debug!(url, error = %e, "service unreachable");
            ServiceState::Down
        }
    }
}

/// States of every checked service, in check order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    pub services: Vec<(&'static str, ServiceState)>,
}

impl HealthReport {
    /// Whether every service is up
    #[must_use]
    pub fn all_up(&self) -> bool {
        self.services.iter().all(|(_, state)| *state == ServiceState::Up)
    }

    /// State of a named service
    #[must_use]
    pub fn state_of(&self, service: &str) -> Option<ServiceState> {
        self.services
            .iter()
            .find(|(name, _)| *name == service)
            .map(|(_, state)| *state)
    }
}

/// Probe every service concurrently
pub async fn check_services(checks: &[Arc<dyn HealthCheck>]) -> HealthReport {
    let states = futures::future::join_all(checks.iter().map(|c| c.health())).await;
    HealthReport {
        services: checks
            .iter()
            .map(|c| c.service_name())
            .zip(states)
            .collect(),
    }
}

/// Gateway status for one conversation
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub health: HealthReport,
    pub model: String,
    pub model_timeout: Duration,
    /// Cap on cached exchanges per conversation
    pub max_pairs: usize,
    /// Exchanges cached for the conversation asking
    pub cached_pairs: usize,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let overall = if self.health.all_up() { "healthy" } else { "degraded" };
        writeln!(f, "Second: {overall}")?;
        writeln!(f, "Model: {}", self.model)?;
        writeln!(f, "LLM timeout: {}s", self.model_timeout.as_secs())?;
        writeln!(f, "History: {} turns (in-memory)", self.max_pairs)?;
        writeln!(f)?;
        writeln!(f, "Services:")?;
        for (name, state) in &self.health.services {
            writeln!(f, "  {name}: {state}")?;
        }
        writeln!(f)?;
        write!(f, "Conversation: {} turns cached", self.cached_pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str, ServiceState);

    #[async_trait]
    impl HealthCheck for Fixed {
        fn service_name(&self) -> &'static str {
            self.0
        }

        async fn health(&self) -> ServiceState {
            self.1
        }
    }

    #[tokio::test]
    async fn report_keeps_check_order() {
        let checks: Vec<Arc<dyn HealthCheck>> = vec![
            Arc::new(Fixed("ollama", ServiceState::Up)),
            Arc::new(Fixed("watcher", ServiceState::Down)),
            Arc::new(Fixed("lor", ServiceState::Degraded)),
        ];

        let report = check_services(&checks).await;
        let names: Vec<_> = report.services.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["ollama", "watcher", "lor"]);
        assert!(!report.all_up());
        assert_eq!(report.state_of("watcher"), Some(ServiceState::Down));
        assert_eq!(report.state_of("missing"), None);
    }

    #[tokio::test]
    async fn unreachable_service_is_down() {
        let client = reqwest::Client::new();
        // Port 9 (discard) on localhost is closed in test environments
        let state = probe(&client, "http://127.0.0.1:9/health", Duration::from_secs(2)).await;
        assert_eq!(state, ServiceState::Down);
    }

    #[test]
    fn status_renders_every_service() {
        let status = StatusReport {
            health: HealthReport {
                services: vec![("ollama", ServiceState::Up), ("watcher", ServiceState::Down)],
            },
            model: "qwen3:14b".to_string(),
            model_timeout: Duration::from_secs(120),
            max_pairs: 5,
            cached_pairs: 2,
        };

        let text = status.to_string();
        assert!(text.starts_with("Second: degraded"));
        assert!(text.contains("LLM timeout: 120s"));
        assert!(text.contains("  watcher: down"));
        assert!(text.ends_with("Conversation: 2 turns cached"));
    }
}
