//! Nested transaction bookkeeping.
//!
//! [`TransactionState`] is a pure state machine. It decides when a real
//! BEGIN, COMMIT or ROLLBACK is due and reports it as a [`TransactionStep`];
//! the connection executes the step. Manual `begin`/`commit`/`rollback` share
//! the same depth counter, and only entering or leaving the outermost level
//! ever produces a step.

use serde::{Deserialize, Serialize};

/// A statement the connection must issue on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStep {
    /// Nothing to issue.
    None,
    /// Issue BEGIN.
    Begin,
    /// Issue COMMIT.
    Commit,
    /// Issue ROLLBACK.
    Rollback,
}

/// Transaction depth and failure tracking for one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionState {
    depth: u32,
    /// Forced failure requested by test mode.
    test_failure: bool,
    /// False once a statement failed inside the current transaction.
    status_ok: bool,
    strict: bool,
    enabled: bool,
}

impl Default for TransactionState {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl TransactionState {
    /// Creates an idle state.
    #[must_use]
    pub const fn new(enabled: bool, strict: bool) -> Self {
        Self {
            depth: 0,
            test_failure: false,
            status_ok: true,
            strict,
            enabled,
        }
    }

    /// Current nesting depth.
    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns true if transactions are enabled.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns true if in strict mode.
    #[must_use]
    pub const fn strict(&self) -> bool {
        self.strict
    }

    /// Returns false once a statement has failed (or test mode forced a failure).
    #[must_use]
    pub const fn status(&self) -> bool {
        self.status_ok && !self.test_failure
    }

    /// Enables or disables strict mode.
    ///
    /// In strict mode a failed transaction group keeps the status failed for
    /// all later groups; otherwise the status is cleared after each rollback.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Disables transactions. `start` and `complete` become no-ops.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Records the outcome of a statement executed while a transaction is open.
    pub fn record_statement(&mut self, ok: bool) {
        if !ok && self.depth > 0 {
            self.status_ok = false;
        }
    }

    /// Enters a transaction level.
    ///
    /// With `test_mode` the outermost transaction is rolled back on completion
    /// no matter what.
    pub fn start(&mut self, test_mode: bool) -> TransactionStep {
        if !self.enabled {
            return TransactionStep::None;
        }
        if self.depth > 0 {
            self.depth += 1;
            return TransactionStep::None;
        }
        self.depth = 1;
        self.test_failure = test_mode;
        TransactionStep::Begin
    }

    /// Leaves a transaction level.
    ///
    /// Only leaving the outermost level produces a COMMIT or ROLLBACK.
    pub fn complete(&mut self) -> TransactionStep {
        if !self.enabled || self.depth == 0 {
            return TransactionStep::None;
        }
        if self.depth > 1 {
            self.depth -= 1;
            return TransactionStep::None;
        }
        self.depth = 0;

        if self.test_failure || !self.status_ok {
            self.test_failure = false;
            if !self.strict {
                self.status_ok = true;
            }
            return TransactionStep::Rollback;
        }
        TransactionStep::Commit
    }

    /// Undoes the state change of a `start` or `begin` whose BEGIN did not
    /// reach the backend.
    pub fn begin_failed(&mut self) {
        self.depth = 0;
        self.test_failure = false;
    }

    /// Manual BEGIN. Counts as a transaction level: inside an open
    /// transaction it only deepens the nesting.
    pub fn begin(&mut self, test_mode: bool) -> TransactionStep {
        self.start(test_mode)
    }

    /// Manual COMMIT. Only leaving the outermost level issues it, and test
    /// mode turns it into a ROLLBACK.
    pub fn commit(&mut self) -> TransactionStep {
        if !self.leave() {
            return TransactionStep::None;
        }
        let test_failure = self.test_failure;
        self.reset_outermost();
        if test_failure {
            TransactionStep::Rollback
        } else {
            TransactionStep::Commit
        }
    }

    /// Manual ROLLBACK. Only leaving the outermost level issues it.
    pub fn rollback(&mut self) -> TransactionStep {
        if !self.leave() {
            return TransactionStep::None;
        }
        self.reset_outermost();
        TransactionStep::Rollback
    }

    /// Drops one level. Returns true when the outermost level was left.
    fn leave(&mut self) -> bool {
        if !self.enabled || self.depth == 0 {
            return false;
        }
        self.depth -= 1;
        self.depth == 0
    }

    fn reset_outermost(&mut self) {
        self.test_failure = false;
        if !self.strict {
            self.status_ok = true;
        }
    }
}
