//! Timed round policy.
//!
//! Rounds never advance on their own. This module holds the pure timing rules an external driver
//! (the live table service tick loop) uses to decide when to call `lock_round`, `resolve_round`
//! and `next_round`.
//!
//! ## Phases
//!
//! 1. **Open** - Players can place bets for `betting_ms`
//! 2. **Locked** - Betting closed for `lock_ms`, then the round is resolved
//! 3. **Resolved** - Outcome displayed for `payout_ms`, then the next round opens
//!
//! ## Usage
//!
//! ```rust,ignore
//! use colorpot_execution::round_scheduler::{PhaseConfig, RoundScheduler, TransitionResult};
//!
//! let scheduler = RoundScheduler::new(PhaseConfig::new(30_000, 3_000, 8_000));
//! let ends_at = scheduler.phase_end_time(RoundPhase::Open, now_ms);
//!
//! if let TransitionResult::Apply { action, .. } =
//!     scheduler.check_transition(RoundPhase::Open, ends_at, later_ms)
//! {
//!     assert_eq!(action, ScheduledAction::Lock);
//! }
//! ```

use colorpot_types::RoundPhase;

/// Phase configuration with durations in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseConfig {
    /// Duration of the betting window in milliseconds.
    pub betting_ms: u64,
    /// Time between closing bets and drawing the winner.
    pub lock_ms: u64,
    /// Time the outcome stays on screen before the next round opens.
    pub payout_ms: u64,
}

impl PhaseConfig {
    pub fn new(betting_ms: u64, lock_ms: u64, payout_ms: u64) -> Self {
        Self {
            betting_ms,
            lock_ms,
            payout_ms,
        }
    }

    /// Validate the configuration (all durations must be > 0).
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.betting_ms == 0 {
            return Err("betting_ms must be greater than zero");
        }
        if self.lock_ms == 0 {
            return Err("lock_ms must be greater than zero");
        }
        if self.payout_ms == 0 {
            return Err("payout_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn duration_for_phase(&self, phase: RoundPhase) -> u64 {
        match phase {
            RoundPhase::Open => self.betting_ms,
            RoundPhase::Locked => self.lock_ms,
            RoundPhase::Resolved => self.payout_ms,
        }
    }
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self::new(30_000, 3_000, 8_000)
    }
}

/// Table operation the driver should perform when a phase expires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduledAction {
    Lock,
    Resolve,
    NextRound,
}

/// Result of a phase transition check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionResult {
    /// No transition needed, remain in current phase.
    NoTransition,
    /// Perform `action`; the resulting phase ends at `phase_ends_at_ms`.
    Apply {
        action: ScheduledAction,
        next_phase: RoundPhase,
        phase_ends_at_ms: u64,
    },
}

#[derive(Clone, Debug)]
pub struct RoundScheduler {
    config: PhaseConfig,
}

impl RoundScheduler {
    pub fn new(config: PhaseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PhaseConfig {
        &self.config
    }

    /// Operation that ends `phase`, and the phase it leads to.
    pub fn action_for(phase: RoundPhase) -> (ScheduledAction, RoundPhase) {
        match phase {
            RoundPhase::Open => (ScheduledAction::Lock, RoundPhase::Locked),
            RoundPhase::Locked => (ScheduledAction::Resolve, RoundPhase::Resolved),
            RoundPhase::Resolved => (ScheduledAction::NextRound, RoundPhase::Open),
        }
    }

    /// End time of `phase` when entered at `entered_at_ms`.
    pub fn phase_end_time(&self, phase: RoundPhase, entered_at_ms: u64) -> u64 {
        entered_at_ms.saturating_add(self.config.duration_for_phase(phase))
    }

    /// Check if the current phase has expired and what to do about it.
    pub fn check_transition(
        &self,
        current_phase: RoundPhase,
        phase_ends_at_ms: u64,
        now_ms: u64,
    ) -> TransitionResult {
        if now_ms < phase_ends_at_ms {
            return TransitionResult::NoTransition;
        }
        let (action, next_phase) = Self::action_for(current_phase);
        TransitionResult::Apply {
            action,
            next_phase,
            phase_ends_at_ms: self.phase_end_time(next_phase, now_ms),
        }
    }
}
