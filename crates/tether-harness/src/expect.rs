//! Builder-style expect/assert API for sessions.
//!
//! [`Expect`] wraps a [`Session`] and provides a fluent interface for the
//! common pattern of: wait for something, send something, assert something.
//! Methods are chainable and return `&mut Self` for ergonomic test code.
//!
//! # Example
//!
//! ```no_run
//! # use tether_harness::{Expect, HarnessConfig, Key, Session};
//! # use std::time::Duration;
//! # fn example() -> Result<(), tether_harness::HarnessError> {
//! let config = HarnessConfig::default();
//! let mut session = Session::spawn("/usr/local/bin/subject", ["hello", "--who", "X"], &config)?;
//! Expect::new(&mut session)
//!     .timeout(Duration::from_secs(3))
//!     .wait_for_text("weather")?
//!     .send_key(Key::Down)?
//!     .send_key(Key::Enter)?
//!     .wait_for_text("Cloudy")?
//!     .assert_output_contains("Hello, X!")?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tether_pilot::ansi::strip_ansi;

use crate::error::HarnessError;
use crate::key::Key;
use crate::screen::ScreenSnapshot;
use crate::session::Session;

/// Pause between keystrokes in [`Expect::type_text`].
const KEYSTROKE_DELAY: Duration = Duration::from_millis(5);

/// A builder for expect/assert operations on a session.
pub struct Expect<'a> {
    session: &'a mut Session,
    timeout: Duration,
}

impl<'a> Expect<'a> {
    /// Create a new Expect wrapper using the session's configured timeout.
    pub fn new(session: &'a mut Session) -> Self {
        let timeout = session.default_timeout();
        Self { session, timeout }
    }

    /// Set the timeout for subsequent wait operations.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    /// Wait until stdout contains the given text, ignoring ANSI sequences.
    ///
    /// Unlike [`Session::read_until`], a subject that exits without printing
    /// the text is a failure here.
    pub fn wait_for_text(&mut self, needle: &str) -> Result<&mut Self, HarnessError> {
        let captured = self.session.read_until(needle, self.timeout)?;
        if !strip_ansi(&captured).contains(needle) {
            return Err(exited_without(needle, captured));
        }
        Ok(self)
    }

    /// Wait until the stripped stdout matches a regex pattern.
    pub fn wait_for_pattern(&mut self, pattern: &str) -> Result<&mut Self, HarnessError> {
        let re = regex::Regex::new(pattern)?;
        let captured = self.session.read_until_regex(pattern, self.timeout)?;
        if !re.is_match(&strip_ansi(&captured)) {
            return Err(exited_without(&format!("pattern: {pattern}"), captured));
        }
        Ok(self)
    }

    /// Wait until stderr contains the given text.
    pub fn wait_for_stderr(&mut self, needle: &str) -> Result<&mut Self, HarnessError> {
        let captured = self.session.read_stderr_until(needle, self.timeout)?;
        if !strip_ansi(&captured).contains(needle) {
            return Err(exited_without(needle, captured));
        }
        Ok(self)
    }

    /// Send a single key.
    pub fn send_key(&mut self, key: Key) -> Result<&mut Self, HarnessError> {
        self.session.send_key(key)?;
        Ok(self)
    }

    /// Type text character by character.
    ///
    /// Each character is sent as a separate keystroke with a small delay
    /// between them, simulating realistic typing.
    pub fn type_text(&mut self, text: &str) -> Result<&mut Self, HarnessError> {
        for ch in text.chars() {
            self.session.send_key(Key::Char(ch))?;
            std::thread::sleep(KEYSTROKE_DELAY);
        }
        Ok(self)
    }

    /// Send a line of text (appends newline).
    pub fn send_line(&mut self, text: &str) -> Result<&mut Self, HarnessError> {
        self.session.write_line(text)?;
        Ok(self)
    }

    /// Assert that stdout captured so far contains the given text.
    ///
    /// Does not wait; checks the current capture immediately.
    pub fn assert_output_contains(&mut self, needle: &str) -> Result<&mut Self, HarnessError> {
        let captured = self.session.read_available();
        if !strip_ansi(&captured).contains(needle) {
            return Err(HarnessError::AssertionFailed {
                message: format!("expected output to contain: {needle:?}"),
                captured,
            });
        }
        Ok(self)
    }

    /// Assert that stdout captured so far does NOT contain the given text.
    pub fn assert_output_lacks(&mut self, needle: &str) -> Result<&mut Self, HarnessError> {
        let captured = self.session.read_available();
        if strip_ansi(&captured).contains(needle) {
            return Err(HarnessError::AssertionFailed {
                message: format!("expected output NOT to contain: {needle:?}"),
                captured,
            });
        }
        Ok(self)
    }

    /// Assert that the rendered screen currently shows the given text.
    pub fn assert_screen_contains(&mut self, needle: &str) -> Result<&mut Self, HarnessError> {
        let screen = self.session.screen();
        if !screen.contains(needle) {
            return Err(HarnessError::AssertionFailed {
                message: format!("expected screen to contain: {needle:?}"),
                captured: screen.dump(),
            });
        }
        Ok(self)
    }

    /// Render the current stdout capture.
    pub fn snapshot(&self) -> ScreenSnapshot {
        self.session.screen()
    }
}

fn exited_without(expected: &str, captured: String) -> HarnessError {
    HarnessError::AssertionFailed {
        message: format!("process exited before {expected:?} appeared"),
        captured,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_pilot::LaunchSpec;
    use tether_types::HarnessConfig;

    fn shell(script: &str) -> Session {
        let spec = LaunchSpec::new("/bin/sh", ["-c", script]);
        Session::start(&spec, &HarnessConfig::default()).expect("start")
    }

    #[test]
    fn wait_for_text_then_assert() {
        let mut session = shell("echo 'hello world'; sleep 5");
        Expect::new(&mut session)
            .timeout(Duration::from_secs(3))
            .wait_for_text("hello")
            .and_then(|e| e.assert_output_contains("world"))
            .and_then(|e| e.assert_output_lacks("absent-string"))
            .expect("expectations should hold");
        session.close(Duration::from_millis(50)).unwrap();
    }

    #[test]
    fn wait_for_pattern_with_regex() {
        let mut session = shell("echo 'version 1.2.3'; sleep 5");
        Expect::new(&mut session)
            .wait_for_pattern(r"version \d+\.\d+\.\d+")
            .expect("should match version pattern");
        session.close(Duration::from_millis(50)).unwrap();
    }

    #[test]
    fn send_line_round_trips_through_cat() {
        let spec = LaunchSpec::new("/bin/cat", Vec::<String>::new());
        let mut session = Session::start(&spec, &HarnessConfig::default()).unwrap();
        Expect::new(&mut session)
            .send_line("typed")
            .and_then(|e| e.wait_for_text("typed"))
            .expect("cat should echo the line");
        session.close(Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn timeout_carries_the_capture() {
        let mut session = shell("echo actual; sleep 5");
        let result = Expect::new(&mut session)
            .timeout(Duration::from_millis(200))
            .wait_for_text("nonexistent-text-xyz")
            .map(|_| ());

        match result {
            Err(HarnessError::Timeout { expected, captured, .. }) => {
                assert_eq!(expected, "nonexistent-text-xyz");
                assert!(captured.contains("actual"));
            }
            Ok(()) => panic!("expected Timeout error, got Ok"),
            Err(e) => panic!("expected Timeout error, got: {e}"),
        }
        session.close(Duration::from_millis(50)).unwrap();
    }

    #[test]
    fn exit_without_text_is_an_assertion_failure() {
        let mut session = shell("echo done");
        let result = Expect::new(&mut session)
            .wait_for_text("never")
            .map(|_| ());
        assert!(matches!(result, Err(HarnessError::AssertionFailed { .. })));
    }

    #[test]
    fn failed_output_assertion() {
        let mut session = shell("echo present; sleep 5");
        let mut expect = Expect::new(&mut session);
        expect.wait_for_text("present").unwrap();
        assert!(expect.assert_output_lacks("present").is_err());
        assert!(expect.assert_output_contains("absent").is_err());
        session.close(Duration::from_millis(50)).unwrap();
    }
}
