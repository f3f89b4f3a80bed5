//! The scan-session state machine.
//!
//! Pure state, no IO: `Idle` (camera off) → `Active` (camera on) →
//! `Scanning` (one analysis in flight) → back to `Active`. Auto mode is a
//! flag on the active session, exclusive with being mid-scan. The single
//! transition function pair `begin_scan` / `finish_scan` is what makes the
//! suspension points (capture, analyze) re-entrant-safe: there is no way to
//! enter `Scanning` twice.

use crate::errors::SessionError;

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Active,
    Scanning,
}

impl ScanState {
    pub fn name(&self) -> &'static str {
        match self {
            ScanState::Idle => "Idle",
            ScanState::Active => "Active",
            ScanState::Scanning => "Scanning",
        }
    }
}

/// What asked for the scan. Only affects logging — both triggers funnel
/// into the same single-in-flight rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTrigger {
    Manual,
    AutoTick,
}

/// Session state for one user session.
#[derive(Debug)]
pub struct ScanSession {
    state: ScanState,
    auto_enabled: bool,
    /// Set when `stop` arrives while a scan is in flight; the scan runs to
    /// completion and `finish_scan` lands in `Idle`.
    stop_requested: bool,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self {
            state: ScanState::Idle,
            auto_enabled: false,
            stop_requested: false,
        }
    }
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn auto_enabled(&self) -> bool {
        self.auto_enabled
    }

    /// `Idle → Active`. The caller establishes frame acquisition *before*
    /// this transition, so a camera failure leaves the session `Idle`.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state != ScanState::Idle {
            return Err(SessionError {
                op: "start",
                state: self.state().name(),
            });
        }
        self.state = ScanState::Active;
        self.stop_requested = false;
        tracing::info!("session started");
        Ok(())
    }

    /// `Active → Idle`, cancelling auto mode. While `Scanning`, the stop is
    /// latched instead: the in-flight analysis completes and its result is
    /// still recorded, but no further scans are scheduled. No-op from `Idle`.
    pub fn stop(&mut self) {
        match self.state {
            ScanState::Idle => {}
            ScanState::Active => {
                self.state = ScanState::Idle;
                self.auto_enabled = false;
                tracing::info!("session stopped");
            }
            ScanState::Scanning => {
                self.stop_requested = true;
                self.auto_enabled = false;
                tracing::info!("stop requested; letting in-flight scan complete");
            }
        }
    }

    /// Flip auto mode. Valid only from `Active`; returns the new setting.
    pub fn toggle_auto(&mut self) -> Result<bool, SessionError> {
        if self.state != ScanState::Active {
            return Err(SessionError {
                op: "toggle_auto",
                state: self.state().name(),
            });
        }
        self.auto_enabled = !self.auto_enabled;
        tracing::info!(enabled = self.auto_enabled, "auto mode toggled");
        Ok(self.auto_enabled)
    }

    /// Try to enter `Scanning`.
    ///
    /// Returns `Ok(true)` when the scan may proceed, `Ok(false)` when one
    /// is already in flight (manual call → no-op, auto tick → skipped, no
    /// queueing or catch-up either way), and `Err` from `Idle`.
    pub fn begin_scan(&mut self, trigger: ScanTrigger) -> Result<bool, SessionError> {
        match self.state {
            ScanState::Idle => Err(SessionError {
                op: "scan",
                state: "Idle",
            }),
            ScanState::Scanning => {
                tracing::debug!(?trigger, "scan already in flight; rejecting");
                Ok(false)
            }
            ScanState::Active => {
                self.state = ScanState::Scanning;
                Ok(true)
            }
        }
    }

    /// Leave `Scanning`: back to `Active`, or to `Idle` when a stop was
    /// latched mid-flight. Must pair with a successful `begin_scan`.
    pub fn finish_scan(&mut self) {
        if self.state != ScanState::Scanning {
            tracing::debug!(state = self.state().name(), "finish_scan outside a scan");
            return;
        }
        if self.stop_requested {
            self.state = ScanState::Idle;
            self.stop_requested = false;
            self.auto_enabled = false;
            tracing::info!("in-flight scan finished after stop; session idle");
        } else {
            self.state = ScanState::Active;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_idle() {
        let session = ScanSession::new();
        assert_eq!(session.state(), ScanState::Idle);
        assert!(!session.auto_enabled());
    }

    #[test]
    fn test_start_stop_cycle() {
        let mut session = ScanSession::new();
        session.start().unwrap();
        assert_eq!(session.state(), ScanState::Active);
        session.stop();
        assert_eq!(session.state(), ScanState::Idle);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut session = ScanSession::new();
        session.start().unwrap();
        assert!(session.start().is_err());
        assert_eq!(session.state(), ScanState::Active);
    }

    #[test]
    fn test_toggle_auto_only_from_active() {
        let mut session = ScanSession::new();
        assert!(session.toggle_auto().is_err());

        session.start().unwrap();
        assert!(session.toggle_auto().unwrap());
        assert!(!session.toggle_auto().unwrap());

        assert!(session.begin_scan(ScanTrigger::Manual).unwrap());
        assert!(session.toggle_auto().is_err());
    }

    #[test]
    fn test_stop_cancels_auto_mode() {
        let mut session = ScanSession::new();
        session.start().unwrap();
        session.toggle_auto().unwrap();
        session.stop();
        assert!(!session.auto_enabled());
        assert_eq!(session.state(), ScanState::Idle);
    }

    #[test]
    fn test_single_in_flight_scan() {
        let mut session = ScanSession::new();
        session.start().unwrap();

        assert!(session.begin_scan(ScanTrigger::Manual).unwrap());
        assert_eq!(session.state(), ScanState::Scanning);

        // A second manual scan is a no-op, an auto tick is skipped;
        // neither queues.
        assert!(!session.begin_scan(ScanTrigger::Manual).unwrap());
        assert!(!session.begin_scan(ScanTrigger::AutoTick).unwrap());
        assert_eq!(session.state(), ScanState::Scanning);

        session.finish_scan();
        assert_eq!(session.state(), ScanState::Active);
        assert!(session.begin_scan(ScanTrigger::AutoTick).unwrap());
    }

    #[test]
    fn test_scan_from_idle_is_an_error() {
        let mut session = ScanSession::new();
        assert!(session.begin_scan(ScanTrigger::Manual).is_err());
    }

    #[test]
    fn test_stop_during_scan_lets_it_complete() {
        let mut session = ScanSession::new();
        session.start().unwrap();
        session.toggle_auto().unwrap();
        assert!(session.begin_scan(ScanTrigger::AutoTick).unwrap());

        session.stop();
        // Still scanning: the in-flight analysis is never cancelled.
        assert_eq!(session.state(), ScanState::Scanning);
        assert!(!session.auto_enabled());

        session.finish_scan();
        assert_eq!(session.state(), ScanState::Idle);
    }

    #[test]
    fn test_finish_scan_returns_to_active_with_auto_intact() {
        let mut session = ScanSession::new();
        session.start().unwrap();
        session.toggle_auto().unwrap();
        assert!(session.begin_scan(ScanTrigger::AutoTick).unwrap());
        session.finish_scan();
        assert_eq!(session.state(), ScanState::Active);
        assert!(session.auto_enabled());
    }
}
