//! Timing profiles for spin pacing
//!
//! All delays are whole milliseconds on the scheduler's virtual clock.
//! Fast mode swaps the profile; it never skips a step.

use serde::{Deserialize, Serialize};

/// Timing profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimingProfile {
    /// Normal gameplay timing
    #[default]
    Normal,
    /// Fast-spin mode
    Turbo,
    /// Zero delays, for headless runs
    Instant,
}

/// Detailed timing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    pub profile: TimingProfile,

    /// SPINNING → STOPPING delay
    pub spin_duration_ms: u64,

    /// Delay between consecutive reel stops
    pub reel_stop_interval_ms: u64,

    /// Scatter showcase before the free-spin popup
    pub scatter_showcase_ms: u64,

    /// Hold on a non-tiered win before returning to idle
    pub small_win_hold_ms: u64,

    /// Pause after a losing spin
    pub no_win_idle_ms: u64,

    /// Delay before the next free spin starts on its own
    pub free_spin_continue_ms: u64,

    /// Delay between autoplay spins
    pub autoplay_interval_ms: u64,
}

impl TimingConfig {
    /// Normal gameplay timing
    pub fn normal() -> Self {
        Self {
            profile: TimingProfile::Normal,
            spin_duration_ms: 1000,
            reel_stop_interval_ms: 300,
            scatter_showcase_ms: 2000,
            small_win_hold_ms: 1500,
            no_win_idle_ms: 300,
            free_spin_continue_ms: 800,
            autoplay_interval_ms: 500,
        }
    }

    /// Fast-spin mode
    pub fn turbo() -> Self {
        Self {
            profile: TimingProfile::Turbo,
            spin_duration_ms: 300,
            reel_stop_interval_ms: 100,
            scatter_showcase_ms: 1000,
            small_win_hold_ms: 600,
            no_win_idle_ms: 100,
            free_spin_continue_ms: 300,
            autoplay_interval_ms: 200,
        }
    }

    /// Everything happens on the same tick
    pub fn instant() -> Self {
        Self {
            profile: TimingProfile::Instant,
            spin_duration_ms: 0,
            reel_stop_interval_ms: 0,
            scatter_showcase_ms: 0,
            small_win_hold_ms: 0,
            no_win_idle_ms: 0,
            free_spin_continue_ms: 0,
            autoplay_interval_ms: 0,
        }
    }

    /// Stop delay for a reel, counted from the start of STOPPING
    pub fn reel_stop_delay(&self, reel: u8) -> u64 {
        reel as u64 * self.reel_stop_interval_ms
    }

    /// Spin request to last reel stop
    pub fn total_spin_duration(&self, reels: u8) -> u64 {
        self.spin_duration_ms + self.reel_stop_delay(reels.saturating_sub(1))
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::normal()
    }
}
