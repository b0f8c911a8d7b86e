use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use super::classifier::Classifier;
use super::types::{StateVector, TransitionEvent};
use crate::console::Reporter;
use crate::notify::Notifier;

/// Default time between the start of two poll cycles
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Whether notifications are still suppressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// First cycle: transitions away from the all-unknown vector are not notified
    Initial,
    Steady,
}

/// Poll loop - classifies every host at a fixed cadence and reports changes
pub struct Poller {
    hosts: Vec<String>,
    classifier: Classifier,
    notifier: Arc<dyn Notifier>,
    reporter: Box<dyn Reporter>,
    interval: Duration,
    states: StateVector,
    phase: Phase,
}

impl Poller {
    pub fn new(
        hosts: Vec<String>,
        classifier: Classifier,
        notifier: Arc<dyn Notifier>,
        reporter: Box<dyn Reporter>,
        interval: Duration,
    ) -> Self {
        let states = StateVector::unknown(hosts.len());
        Self { hosts, classifier, notifier, reporter, interval, states, phase: Phase::Initial }
    }

    /// Run a single cycle and return the transitions it detected
    ///
    /// Events are forwarded to the notifier only in [`Phase::Steady`]; the
    /// reporter sees every cycle.
    pub async fn poll_once(&mut self) -> Vec<TransitionEvent> {
        let next = self.classifier.classify_all(&self.hosts).await;
        let events = self.states.transitions(&next, &self.hosts);

        for event in &events {
            info!(
                host = %event.host,
                from = %event.previous,
                to = %event.current,
                severity = ?event.severity(),
                at = %event.detected_at,
                "{}: {}",
                event.title,
                event.description
            );
            if self.phase == Phase::Steady {
                self.notifier.notify(event.clone());
            }
        }

        self.reporter.render(&self.hosts, &next);
        self.states = next;
        self.phase = Phase::Steady;

        events
    }

    /// Poll until `shutdown` resolves
    ///
    /// Cycles start `interval` apart. A cycle that overruns is followed
    /// immediately by the next one, without replaying the ticks it missed.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.reporter.started(&self.hosts);
        info!(hosts = ?self.hosts, interval = ?self.interval, "Starting poll loop");

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = timer.tick() => {}
            }

            tokio::select! {
                biased;
                () = &mut shutdown => break,
                events = self.poll_once() => {
                    debug!(changes = events.len(), "Poll cycle complete");
                }
            }
        }

        self.reporter.stopped();
        info!(states = ?self.states, "Poll loop stopped");
    }
}
