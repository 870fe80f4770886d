//! Cross-reboot uptime and cadence accounting
//!
//! The processing clock restarts from zero on every wake, so sleep time is
//! invisible to it. The sleep requested at the end of one cycle is stored
//! and credited to the cumulative total at the start of the next.

use crate::config::cycle::{MIN_SLEEP_US, US_PER_SECOND};
use crate::power::CycleState;

/// Result of closing a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    /// Processing time of the cycle just ended
    pub active_us: u64,
    /// Sleep to request before the next wake
    pub sleep_us: u64,
    /// State to persist before suspending
    pub state: CycleState,
}

/// Sleep needed to hold the target period
///
/// Falls back to the floor when the cycle overran its budget.
pub fn sleep_duration_us(period_us: u64, active_us: u64) -> u64 {
    if active_us < period_us {
        (period_us - active_us).max(MIN_SLEEP_US)
    } else {
        MIN_SLEEP_US
    }
}

/// Accounting for one active window
#[derive(Debug)]
pub struct CycleAccountant {
    state: CycleState,
    cycle_start_us: u64,
}

impl CycleAccountant {
    /// Enter the active state
    ///
    /// Credits the previous sleep (except on the very first boot) and counts
    /// this boot.
    pub fn begin(mut state: CycleState, now_us: u64) -> Self {
        if state.boot_count > 0 {
            state.total_active_us = state.total_active_us.saturating_add(state.last_sleep_us);
        }
        state.boot_count = state.boot_count.wrapping_add(1);

        Self {
            state,
            cycle_start_us: now_us,
        }
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    /// Time spent in this cycle so far
    pub fn elapsed_us(&self, now_us: u64) -> u64 {
        now_us.saturating_sub(self.cycle_start_us)
    }

    /// Uptime estimate for the frame, in whole seconds
    pub fn uptime_s(&self, now_us: u64) -> u32 {
        let total = self.state.total_active_us.saturating_add(self.elapsed_us(now_us));
        u32::try_from(total / US_PER_SECOND).unwrap_or(u32::MAX)
    }

    /// Leave the active state on the normal path
    pub fn finish(self, now_us: u64, period_us: u64) -> CycleSummary {
        let active_us = self.elapsed_us(now_us);
        let sleep_us = sleep_duration_us(period_us, active_us);

        let mut state = self.state;
        state.total_active_us = state.total_active_us.saturating_add(active_us);
        state.last_sleep_us = sleep_us;

        CycleSummary {
            active_us,
            sleep_us,
            state,
        }
    }

    /// Leave the active state ahead of a forced restart
    ///
    /// No sleep follows a restart, so none is credited on the next boot.
    pub fn abort(self, now_us: u64) -> CycleState {
        let mut state = self.state;
        state.total_active_us = state.total_active_us.saturating_add(self.elapsed_us(now_us));
        state.last_sleep_us = 0;
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cycle::TARGET_PERIOD_US;

    #[test]
    fn test_sleep_duration() {
        assert_eq!(sleep_duration_us(60_000_000, 10_000_000), 50_000_000);
        assert_eq!(sleep_duration_us(60_000_000, 70_000_000), 1_000);
        assert_eq!(sleep_duration_us(60_000_000, 60_000_000), 1_000);
        assert_eq!(sleep_duration_us(60_000_000, 59_999_000), 1_000);
    }

    #[test]
    fn test_sleep_duration_near_budget_is_floored() {
        assert_eq!(sleep_duration_us(60_000_000, 59_999_900), 1_000);
    }

    #[test]
    fn test_first_boot_credits_nothing() {
        let state = CycleState {
            boot_count: 0,
            total_active_us: 0,
            last_sleep_us: 123,
        };
        let accountant = CycleAccountant::begin(state, 0);

        assert_eq!(accountant.state().boot_count, 1);
        assert_eq!(accountant.state().total_active_us, 0);
    }

    #[test]
    fn test_three_boot_sequence() {
        let actives = [10_000_000u64, 11_000_000, 9_500_000];
        let expected_sleeps = [50_000_000u64, 49_000_000, 50_500_000];

        let mut state = CycleState::default();
        let mut credited_totals = [0u64; 3];

        for (boot, &active) in actives.iter().enumerate() {
            // Each wake starts the clock near zero
            let accountant = CycleAccountant::begin(state, 0);
            credited_totals[boot] = accountant.state().total_active_us;

            let summary = accountant.finish(active, TARGET_PERIOD_US);
            assert_eq!(summary.active_us, active);
            assert_eq!(summary.sleep_us, expected_sleeps[boot]);
            state = summary.state;
        }

        // Boot 3 after crediting: both earlier cycles plus both earlier sleeps
        assert_eq!(
            credited_totals[2],
            10_000_000 + 50_000_000 + 11_000_000 + 49_000_000
        );
        assert_eq!(
            state.total_active_us,
            10_000_000 + 50_000_000 + 11_000_000 + 49_000_000 + 9_500_000
        );
        assert_eq!(state.boot_count, 3);
        assert_eq!(state.last_sleep_us, 50_500_000);
    }

    #[test]
    fn test_uptime_includes_current_cycle() {
        let state = CycleState {
            boot_count: 4,
            total_active_us: 179_000_000,
            last_sleep_us: 50_000_000,
        };
        let accountant = CycleAccountant::begin(state, 2_000);

        assert_eq!(accountant.uptime_s(1_002_000), 230);
    }

    #[test]
    fn test_uptime_saturates() {
        let state = CycleState {
            boot_count: 1,
            total_active_us: u64::MAX - 5,
            last_sleep_us: 0,
        };
        let accountant = CycleAccountant::begin(state, 0);
        assert_eq!(accountant.uptime_s(10), u32::MAX);
    }

    #[test]
    fn test_abort_clears_sleep_credit() {
        let state = CycleState {
            boot_count: 2,
            total_active_us: 70_000_000,
            last_sleep_us: 50_000_000,
        };
        let accountant = CycleAccountant::begin(state, 0);
        let aborted = accountant.abort(61_000_000);

        assert_eq!(aborted.boot_count, 3);
        assert_eq!(aborted.total_active_us, 181_000_000);
        assert_eq!(aborted.last_sleep_us, 0);

        // The next boot credits nothing for the restart
        let next = CycleAccountant::begin(aborted, 0);
        assert_eq!(next.state().total_active_us, 181_000_000);
    }
}
