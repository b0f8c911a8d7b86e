//! Console rendering of the current host states.
//!
//! The status is a single line rewritten in place with `\r`, one
//! `Title: description` segment per host, coloured by severity.

use crossterm::style::{Color, Stylize, style};
use crossterm::tty::IsTty;
use std::io::{self, Stdout, Write};
use tracing::warn;

use crate::monitoring::{Severity, State, StateVector};

/// Trailing blanks per host, wiping leftovers of a longer previous line
const PADDING_PER_HOST: usize = 20;

/// Presents the state of all hosts after every poll cycle
///
/// Rendering must not fail; implementations swallow their own I/O errors.
pub trait Reporter: Send {
    fn started(&mut self, _hosts: &[String]) {}

    fn render(&mut self, hosts: &[String], states: &StateVector);

    fn stopped(&mut self) {}
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Info => Color::Green,
        Severity::Warning => Color::Yellow,
        Severity::Critical => Color::Red,
    }
}

fn segment(state: State, color: bool) -> String {
    let heading = format!("{}: ", state.title());
    if !color {
        return format!("{heading}{}", state.description());
    }

    let color = severity_color(state.severity());
    format!("{}{}", style(heading).with(color).bold(), style(state.description()).with(color))
}

/// Build the status line, including padding and the carriage return
pub fn format_line(hosts: &[String], states: &StateVector, color: bool) -> String {
    let segments: Vec<String> = states.iter().map(|state| segment(state, color)).collect();

    format!("[{}]{}\r", segments.join(", "), " ".repeat(PADDING_PER_HOST * hosts.len()))
}

/// Reporter writing to a terminal (or any writer)
pub struct ConsoleReporter<W: Write + Send> {
    out: W,
    color: bool,
}

impl ConsoleReporter<Stdout> {
    /// Reporter on stdout; colour is dropped when stdout is not a terminal
    pub fn stdout(color: bool) -> Self {
        let out = io::stdout();
        let color = color && out.is_tty();
        Self::new(out, color)
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    fn write(&mut self, text: &str) {
        let result = self.out.write_all(text.as_bytes()).and_then(|()| self.out.flush());
        if let Err(e) = result {
            warn!("Failed to write status to console: {}", e);
        }
    }
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn started(&mut self, hosts: &[String]) {
        self.write(&format!("Starting ping service for hosts {hosts:?} ...\n\n"));
    }

    fn render(&mut self, hosts: &[String], states: &StateVector) {
        let line = format_line(hosts, states, self.color);
        self.write(&line);
    }

    fn stopped(&mut self) {
        self.write("\n\nShutting down the ping service ...\n");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Reporter remembering each rendered line (uncoloured) and when it was drawn
    #[derive(Clone, Default)]
    pub(crate) struct RecordingReporter {
        pub lines: Arc<Mutex<Vec<(tokio::time::Instant, String)>>>,
    }

    impl RecordingReporter {
        pub fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().iter().map(|(_, line)| line.clone()).collect()
        }

        pub fn times(&self) -> Vec<tokio::time::Instant> {
            self.lines.lock().unwrap().iter().map(|(at, _)| *at).collect()
        }
    }

    impl Reporter for RecordingReporter {
        fn render(&mut self, hosts: &[String], states: &StateVector) {
            let line = format_line(hosts, states, false);
            self.lines.lock().unwrap().push((tokio::time::Instant::now(), line));
        }
    }

    fn hosts(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("http://h{i}")).collect()
    }

    #[test]
    fn test_plain_line() {
        let states = StateVector::from(vec![State::Ok, State::RemoteError]);
        let line = format_line(&hosts(2), &states, false);

        assert_eq!(
            line,
            format!("[Machine Status: running, Machine Status: not running]{}\r", " ".repeat(40))
        );
    }

    #[test]
    fn test_unknown_state_renders() {
        let states = StateVector::unknown(1);
        let line = format_line(&hosts(1), &states, false);

        assert!(line.starts_with("[Ping Service: error encountered - unknown state]"));
    }

    #[test]
    fn test_colored_line_contains_text_and_escapes() {
        let states = StateVector::from(vec![State::LocalError]);
        let line = format_line(&hosts(1), &states, true);

        assert!(line.contains("Local Network: "));
        assert!(line.contains("error in local network interface"));
        assert!(line.contains('\u{1b}'));
    }

    #[test]
    fn test_console_reporter_writes_banner_and_line() {
        let mut reporter = ConsoleReporter::new(Vec::new(), false);
        let hosts = hosts(1);

        reporter.started(&hosts);
        reporter.render(&hosts, &StateVector::from(vec![State::ConnectionError]));
        reporter.stopped();

        let out = String::from_utf8(reporter.out).unwrap();
        assert!(out.starts_with("Starting ping service for hosts [\"http://h1\"] ..."));
        assert!(out.contains("[Internet Connection: error in internet connection]"));
        assert!(out.ends_with("Shutting down the ping service ...\n"));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_errors_are_swallowed() {
        let mut reporter = ConsoleReporter::new(BrokenPipe, true);
        reporter.render(&hosts(1), &StateVector::from(vec![State::Ok]));
    }
}
