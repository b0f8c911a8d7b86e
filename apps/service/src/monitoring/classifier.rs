use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::checker::{LOCAL_TIMEOUT, PROCESS_GRACE, ProbeMode, Prober, REMOTE_TIMEOUT};
use super::types::{State, StateVector};
use crate::error::ProbeError;

/// Host probed in basic mode to tell a dead host from a dead uplink
pub const DEFAULT_CONNECTIVITY_HOST: &str = "google.com";

impl From<&ProbeError> for State {
    fn from(error: &ProbeError) -> Self {
        match error {
            ProbeError::LocalNetworkFailure => State::LocalError,
            ProbeError::ConnectivityFailure { .. } => State::ConnectionError,
            ProbeError::RemoteUnreachable { .. } => State::RemoteError,
            ProbeError::UnknownProbeFailure { .. } | ProbeError::Timeout { .. } => State::Unknown,
        }
    }
}

/// Turns probe outcomes into a [`State`] per host
pub struct Classifier {
    prober: Arc<dyn Prober>,
    mode: ProbeMode,
    connectivity_host: String,
    disambiguate: bool,
    cache_connectivity: bool,
    deadline: Duration,
}

impl Classifier {
    pub fn new(prober: Arc<dyn Prober>, mode: ProbeMode) -> Self {
        Self {
            prober,
            mode,
            connectivity_host: DEFAULT_CONNECTIVITY_HOST.to_string(),
            disambiguate: true,
            cache_connectivity: false,
            // local + remote + connectivity probe, each with its grace period
            deadline: LOCAL_TIMEOUT + REMOTE_TIMEOUT * 2 + PROCESS_GRACE * 3,
        }
    }

    pub fn with_connectivity_host(mut self, host: impl Into<String>) -> Self {
        self.connectivity_host = host.into();
        self
    }

    /// Probe the connectivity host when a monitored host looks down
    pub fn with_disambiguation(mut self, enabled: bool) -> Self {
        self.disambiguate = enabled;
        self
    }

    /// Reuse one connectivity result for a whole `classify_all` pass
    pub fn with_connectivity_cache(mut self, enabled: bool) -> Self {
        self.cache_connectivity = enabled;
        self
    }

    /// Upper bound for classifying a single host; exceeding it yields `Unknown`
    #[cfg(test)]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Classify a single host
    #[cfg(test)]
    pub async fn classify(&self, host: &str) -> State {
        self.classify_with(host, &mut None).await
    }

    /// Classify every host in order; hosts do not influence each other
    pub async fn classify_all(&self, hosts: &[String]) -> StateVector {
        let mut connectivity = None;
        let mut states = Vec::with_capacity(hosts.len());

        for host in hosts {
            states.push(self.classify_with(host, &mut connectivity).await);
        }

        StateVector::from(states)
    }

    async fn classify_with(&self, host: &str, connectivity: &mut Option<bool>) -> State {
        match timeout(self.deadline, self.diagnose(host, connectivity)).await {
            Ok(Ok(())) => State::Ok,
            Ok(Err(e @ ProbeError::UnknownProbeFailure { .. })) => {
                warn!(host, error = %e, "Probe could not be carried out");
                State::from(&e)
            }
            Ok(Err(e)) => {
                debug!(host, error = %e, "Host classified as failing");
                State::from(&e)
            }
            Err(_) => {
                let e = ProbeError::Timeout { host: host.to_string(), timeout: self.deadline };
                warn!(host, error = %e, "Classification abandoned");
                State::from(&e)
            }
        }
    }

    async fn diagnose(
        &self,
        host: &str,
        connectivity: &mut Option<bool>,
    ) -> Result<(), ProbeError> {
        if !reachable(self.prober.probe_local().await)? {
            return Err(ProbeError::LocalNetworkFailure);
        }

        if reachable(self.prober.probe_remote(host, self.mode).await)? {
            return Ok(());
        }

        if self.disambiguate && !self.internet_reachable(connectivity).await? {
            return Err(ProbeError::ConnectivityFailure { host: self.connectivity_host.clone() });
        }

        Err(ProbeError::RemoteUnreachable {
            host: host.to_string(),
            reason: format!("{:?} probe failed", self.mode).to_lowercase(),
        })
    }

    async fn internet_reachable(
        &self,
        connectivity: &mut Option<bool>,
    ) -> Result<bool, ProbeError> {
        if self.cache_connectivity {
            if let Some(up) = *connectivity {
                return Ok(up);
            }
        }

        let outcome = self.prober.probe_remote(&self.connectivity_host, ProbeMode::Basic).await;
        let up = reachable(outcome)?;
        *connectivity = Some(up);
        Ok(up)
    }
}

/// `Ok(false)` when the target did not answer, `Err` when the probe never ran
fn reachable(outcome: Result<Duration, ProbeError>) -> Result<bool, ProbeError> {
    match outcome {
        Ok(_) => Ok(true),
        Err(e @ ProbeError::UnknownProbeFailure { .. }) => Err(e),
        Err(_) => Ok(false),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::monitoring::checker::SystemProber;
    use crate::test_support::serve_once;

    /// Prober answering from a script instead of the network
    ///
    /// Local results are consumed in call order and default to reachable
    /// once the queue is empty. Remote results are looked up per host and
    /// default to reachable. `None` scripts a probe that cannot run.
    #[derive(Default)]
    pub(crate) struct ScriptedProber {
        pub local: Mutex<VecDeque<Option<bool>>>,
        pub remote: Mutex<HashMap<String, Option<bool>>>,
        pub remote_delay: Mutex<Option<Duration>>,
        pub local_calls: AtomicUsize,
        pub remote_calls: Mutex<Vec<(String, ProbeMode)>>,
    }

    impl ScriptedProber {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_local(&self, reachable: bool) {
            self.local.lock().unwrap().push_back(Some(reachable));
        }

        pub fn push_local_broken(&self) {
            self.local.lock().unwrap().push_back(None);
        }

        pub fn set_remote(&self, host: &str, reachable: bool) {
            self.remote.lock().unwrap().insert(host.to_string(), Some(reachable));
        }

        pub fn set_remote_broken(&self, host: &str) {
            self.remote.lock().unwrap().insert(host.to_string(), None);
        }

        pub fn set_remote_delay(&self, delay: Duration) {
            *self.remote_delay.lock().unwrap() = Some(delay);
        }

        pub fn remote_calls(&self) -> Vec<(String, ProbeMode)> {
            self.remote_calls.lock().unwrap().clone()
        }
    }

    fn scripted(host: &str, outcome: Option<bool>) -> Result<Duration, ProbeError> {
        match outcome {
            Some(true) => Ok(Duration::ZERO),
            Some(false) => Err(ProbeError::RemoteUnreachable {
                host: host.to_string(),
                reason: "scripted".into(),
            }),
            None => Err(ProbeError::UnknownProbeFailure {
                host: host.to_string(),
                reason: "scripted".into(),
            }),
        }
    }

    #[async_trait::async_trait]
    impl Prober for ScriptedProber {
        async fn probe_local(&self) -> Result<Duration, ProbeError> {
            self.local_calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self.local.lock().unwrap().pop_front().unwrap_or(Some(true));
            scripted("localhost", outcome)
        }

        async fn probe_remote(&self, host: &str, mode: ProbeMode) -> Result<Duration, ProbeError> {
            self.remote_calls.lock().unwrap().push((host.to_string(), mode));
            let delay = *self.remote_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let outcome = self.remote.lock().unwrap().get(host).copied().unwrap_or(Some(true));
            scripted(host, outcome)
        }
    }

    fn classifier(prober: &Arc<ScriptedProber>) -> Classifier {
        Classifier::new(prober.clone(), ProbeMode::Application)
    }

    #[tokio::test]
    async fn test_local_failure_skips_remote() {
        let prober = Arc::new(ScriptedProber::new());
        prober.push_local(false);

        let state = classifier(&prober).classify("http://h1").await;

        assert_eq!(state, State::LocalError);
        assert_eq!(prober.local_calls.load(Ordering::SeqCst), 1);
        assert!(prober.remote_calls().is_empty());
    }

    #[tokio::test]
    async fn test_all_probes_succeed() {
        let prober = Arc::new(ScriptedProber::new());

        let state = classifier(&prober).classify("http://h1").await;

        assert_eq!(state, State::Ok);
        assert_eq!(prober.remote_calls(), vec![("http://h1".to_string(), ProbeMode::Application)]);
    }

    #[tokio::test]
    async fn test_remote_and_internet_down_is_connection_error() {
        let prober = Arc::new(ScriptedProber::new());
        prober.set_remote("http://h1", false);
        prober.set_remote(DEFAULT_CONNECTIVITY_HOST, false);

        let state = classifier(&prober).classify("http://h1").await;

        assert_eq!(state, State::ConnectionError);
        assert_eq!(
            prober.remote_calls()[1],
            (DEFAULT_CONNECTIVITY_HOST.to_string(), ProbeMode::Basic)
        );
    }

    #[tokio::test]
    async fn test_remote_down_internet_up_is_remote_error() {
        let prober = Arc::new(ScriptedProber::new());
        prober.set_remote("http://h1", false);

        let state = classifier(&prober).classify("http://h1").await;

        assert_eq!(state, State::RemoteError);
        assert_eq!(prober.remote_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_without_disambiguation_no_connectivity_probe() {
        let prober = Arc::new(ScriptedProber::new());
        prober.set_remote("http://h1", false);
        prober.set_remote(DEFAULT_CONNECTIVITY_HOST, false);

        let state = classifier(&prober).with_disambiguation(false).classify("http://h1").await;

        assert_eq!(state, State::RemoteError);
        assert_eq!(prober.remote_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_every_outcome_maps_to_a_state() {
        for local in [true, false] {
            for remote in [true, false] {
                for internet in [true, false] {
                    let prober = Arc::new(ScriptedProber::new());
                    prober.push_local(local);
                    prober.set_remote("http://h1", remote);
                    prober.set_remote(DEFAULT_CONNECTIVITY_HOST, internet);

                    let state = classifier(&prober).classify("http://h1").await;

                    let expected = match (local, remote, internet) {
                        (false, _, _) => State::LocalError,
                        (true, true, _) => State::Ok,
                        (true, false, false) => State::ConnectionError,
                        (true, false, true) => State::RemoteError,
                    };
                    assert_eq!(state, expected, "local={local} remote={remote} internet={internet}");
                }
            }
        }
    }

    #[tokio::test]
    async fn test_classify_all_preserves_order_and_probes_per_host() {
        let prober = Arc::new(ScriptedProber::new());
        prober.set_remote("http://h1", false);
        prober.set_remote("http://h3", false);
        prober.set_remote(DEFAULT_CONNECTIVITY_HOST, true);
        let hosts: Vec<String> =
            ["http://h1", "http://h2", "http://h3"].iter().map(|h| h.to_string()).collect();

        let states = classifier(&prober).classify_all(&hosts).await;

        assert_eq!(
            states,
            StateVector::from(vec![State::RemoteError, State::Ok, State::RemoteError])
        );
        let connectivity_probes = prober
            .remote_calls()
            .iter()
            .filter(|(host, _)| host == DEFAULT_CONNECTIVITY_HOST)
            .count();
        assert_eq!(connectivity_probes, 2);
    }

    #[tokio::test]
    async fn test_classify_all_with_cache_probes_connectivity_once() {
        let prober = Arc::new(ScriptedProber::new());
        prober.set_remote("http://h1", false);
        prober.set_remote("http://h2", false);
        prober.set_remote(DEFAULT_CONNECTIVITY_HOST, false);
        let hosts = vec!["http://h1".to_string(), "http://h2".to_string()];

        let states =
            classifier(&prober).with_connectivity_cache(true).classify_all(&hosts).await;

        assert_eq!(
            states,
            StateVector::from(vec![State::ConnectionError, State::ConnectionError])
        );
        let connectivity_probes = prober
            .remote_calls()
            .iter()
            .filter(|(host, _)| host == DEFAULT_CONNECTIVITY_HOST)
            .count();
        assert_eq!(connectivity_probes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_probe_is_unknown() {
        let prober = Arc::new(ScriptedProber::new());
        prober.set_remote_delay(Duration::from_secs(3600));

        let state = classifier(&prober).classify("http://h1").await;

        assert_eq!(state, State::Unknown);
    }

    #[tokio::test]
    async fn test_broken_local_probe_is_unknown() {
        let prober = Arc::new(ScriptedProber::new());
        prober.push_local_broken();

        let state = classifier(&prober).classify("http://h1").await;

        assert_eq!(state, State::Unknown);
        assert!(prober.remote_calls().is_empty());
    }

    #[tokio::test]
    async fn test_broken_connectivity_probe_is_unknown() {
        let prober = Arc::new(ScriptedProber::new());
        prober.set_remote("http://h1", false);
        prober.set_remote_broken(DEFAULT_CONNECTIVITY_HOST);

        let state = classifier(&prober).classify("http://h1").await;

        assert_eq!(state, State::Unknown);
    }

    #[tokio::test]
    async fn test_broken_connectivity_probe_is_not_cached() {
        let prober = Arc::new(ScriptedProber::new());
        prober.set_remote("http://h1", false);
        prober.set_remote("http://h2", false);
        prober.set_remote_broken(DEFAULT_CONNECTIVITY_HOST);
        let hosts = vec!["http://h1".to_string(), "http://h2".to_string()];

        let states =
            classifier(&prober).with_connectivity_cache(true).classify_all(&hosts).await;

        assert_eq!(states, StateVector::from(vec![State::Unknown, State::Unknown]));
        assert_eq!(prober.remote_calls().len(), 4);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_ping_program_is_unknown_not_local_error() {
        let prober = SystemProber::new("localhost")
            .unwrap()
            .with_ping_program("/nonexistent/ping-monitor-no-such-ping");
        let classifier = Classifier::new(Arc::new(prober), ProbeMode::Application);

        let state = classifier.classify("http://127.0.0.1:9").await;

        assert_eq!(state, State::Unknown);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_malformed_ping_body_is_remote_error() {
        let (base, _request) = serve_once("200 OK", "pong").await;
        let prober = SystemProber::new("localhost").unwrap().with_ping_program("true");
        let classifier = Classifier::new(Arc::new(prober), ProbeMode::Application);

        let state = classifier.classify(&base).await;

        assert_eq!(state, State::RemoteError);
    }

    #[test]
    fn test_probe_error_to_state() {
        assert_eq!(State::from(&ProbeError::LocalNetworkFailure), State::LocalError);
        assert_eq!(
            State::from(&ProbeError::ConnectivityFailure { host: "google.com".into() }),
            State::ConnectionError
        );
        assert_eq!(
            State::from(&ProbeError::UnknownProbeFailure {
                host: "h".into(),
                reason: "garbled".into()
            }),
            State::Unknown
        );
    }
}
