use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a single host for one polling cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    Ok,
    LocalError,
    ConnectionError,
    RemoteError,
    #[default]
    Unknown,
}

/// How loudly a state should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl State {
    pub fn title(self) -> &'static str {
        match self {
            State::Ok | State::RemoteError => "Machine Status",
            State::LocalError => "Local Network",
            State::ConnectionError => "Internet Connection",
            State::Unknown => "Ping Service",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            State::Ok => "running",
            State::LocalError => "error in local network interface",
            State::ConnectionError => "error in internet connection",
            State::RemoteError => "not running",
            State::Unknown => "error encountered - unknown state",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            State::Ok => Severity::Info,
            State::RemoteError => Severity::Critical,
            State::LocalError | State::ConnectionError | State::Unknown => Severity::Warning,
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Ok => write!(f, "OK"),
            State::LocalError => write!(f, "LOCAL_ERROR"),
            State::ConnectionError => write!(f, "CONNECTION_ERROR"),
            State::RemoteError => write!(f, "REMOTE_ERROR"),
            State::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// One state per monitored host, index-aligned with the host list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVector(Vec<State>);

impl StateVector {
    /// Vector used before the first poll: every host is `Unknown`
    pub fn unknown(len: usize) -> Self {
        Self(vec![State::Unknown; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = State> + '_ {
        self.0.iter().copied()
    }

    /// Transition events for every host whose state differs in `next`
    ///
    /// `hosts`, `self` and `next` must be index-aligned.
    pub fn transitions(&self, next: &StateVector, hosts: &[String]) -> Vec<TransitionEvent> {
        debug_assert_eq!(self.len(), next.len());
        hosts
            .iter()
            .zip(self.0.iter().zip(next.0.iter()))
            .filter(|(_, (previous, current))| previous != current)
            .map(|(host, (previous, current))| TransitionEvent::new(host.as_str(), *previous, *current))
            .collect()
    }
}

impl From<Vec<State>> for StateVector {
    fn from(states: Vec<State>) -> Self {
        Self(states)
    }
}

impl FromIterator<State> for StateVector {
    fn from_iter<I: IntoIterator<Item = State>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A host changed state between two consecutive cycles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// Host as given on the command line
    pub host: String,

    pub previous: State,

    pub current: State,

    /// Human readable title of the new state
    pub title: String,

    /// Human readable description of the new state
    pub description: String,

    /// When the change was detected
    pub detected_at: DateTime<Utc>,
}

impl TransitionEvent {
    pub fn new(host: impl Into<String>, previous: State, current: State) -> Self {
        Self {
            host: host.into(),
            previous,
            current,
            title: current.title().to_string(),
            description: current.description().to_string(),
            detected_at: Utc::now(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.current.severity()
    }

    /// Short subject line, used as the email subject
    pub fn subject(&self) -> String {
        format!("Ping service status for host {}", self.host)
    }

    /// Full notification text
    pub fn summary(&self) -> String {
        format!("{} => {}: {}", self.subject(), self.title, self.description)
    }
}
