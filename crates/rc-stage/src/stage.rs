//! Stage - The core enum defining all spin lifecycle phases
//!
//! A Stage is NOT an animation and NOT a UI command.
//! A Stage is the SEMANTIC MEANING of a moment in the spin flow.

use serde::{Deserialize, Serialize};

use crate::taxonomy::{FeatureType, SymbolPosition, WinTier};

/// Canonical spin stage - the language the engine speaks to its collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    // ═══════════════════════════════════════════════════════════════════════
    // SPIN LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════
    /// Spin accepted, bet debited (or free spin consumed)
    SpinStart {
        spin_id: u64,
        is_free_spin: bool,
        #[serde(default)]
        bet: u64,
    },

    /// Target grid handed to the reel renderer (column-major symbol ids)
    GridPublished {
        spin_id: u64,
        grid: Vec<Vec<u32>>,
    },

    /// Renderer should stop this reel after `delay_ms`
    ReelStopScheduled {
        reel_index: u8,
        delay_ms: f64,
    },

    /// Reel has stopped, showing final symbols
    ReelStop {
        /// Which reel stopped (0-indexed)
        reel_index: u8,
        /// Symbols on this reel (top to bottom)
        #[serde(default)]
        symbols: Vec<u32>,
    },

    /// All reels stopped, wins being evaluated
    EvaluateWins,

    /// Spin complete, machine back to idle
    SpinEnd {
        spin_id: u64,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // WIN LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════
    /// Progression hook, emitted exactly once per evaluated spin
    WinEvaluated {
        win_amount: u64,
        is_big_win: bool,
        #[serde(default)]
        tier: Option<WinTier>,
        scatter_count: u8,
    },

    /// Win highlight: lines and cells to light up
    WinPresent {
        win_amount: u64,
        #[serde(default)]
        line_ids: Vec<u16>,
        #[serde(default)]
        cells: Vec<SymbolPosition>,
    },

    /// Tier popup shown (blocks until closed)
    BigWinTier {
        tier: WinTier,
        #[serde(default)]
        amount: u64,
    },

    /// Tier popup closed
    BigWinEnd,

    // ═══════════════════════════════════════════════════════════════════════
    // FEATURE LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════
    /// Scripted grid feature fired during generation
    GridFeature {
        feature_type: FeatureType,
        #[serde(default)]
        reels: Vec<u8>,
        #[serde(default)]
        symbol_id: Option<u32>,
    },

    /// Scatter showcase before a fresh free-spin award
    ScatterShowcase {
        scatter_count: u8,
        #[serde(default)]
        cells: Vec<SymbolPosition>,
    },

    /// "Free spins won" popup
    FreeSpinsAwarded {
        awarded: u32,
        remaining: u32,
        /// Awarded while already inside a free-spin session
        #[serde(default)]
        retrigger: bool,
    },

    /// Entering the free-spin sub-session
    FeatureEnter {
        feature_type: FeatureType,
        #[serde(default)]
        total_steps: Option<u32>,
    },

    /// One free spin consumed
    FeatureStep {
        step_index: u32,
        #[serde(default)]
        steps_remaining: Option<u32>,
    },

    /// Free-spin summary screen (blocks until closed)
    FreeSpinSummary {
        total_win: u64,
        spins_awarded: u32,
    },

    /// Free-spin sub-session finished
    FeatureExit {
        #[serde(default)]
        total_win: u64,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // WALLET
    // ═══════════════════════════════════════════════════════════════════════
    /// Spin refused: balance below bet
    InsufficientFunds { balance: u64, bet: u64 },

    /// Spin refused: balance below the bankruptcy threshold, offer rescue
    BankruptcyRescue { balance: u64 },

    /// Payout credited to the wallet
    BalanceCredited { amount: u64, balance: u64 },

    // ═══════════════════════════════════════════════════════════════════════
    // UI / IDLE
    // ═══════════════════════════════════════════════════════════════════════
    /// Machine entered idle
    IdleStart,

    /// Active game changed
    GameSelected { game_id: String },

    /// Autoplay enabled
    AutoplayStart,

    /// Autoplay disabled
    AutoplayStop {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl Stage {
    /// Get the category of this stage
    pub fn category(&self) -> StageCategory {
        match self {
            Stage::SpinStart { .. }
            | Stage::GridPublished { .. }
            | Stage::ReelStopScheduled { .. }
            | Stage::ReelStop { .. }
            | Stage::EvaluateWins
            | Stage::SpinEnd { .. } => StageCategory::SpinLifecycle,

            Stage::WinEvaluated { .. }
            | Stage::WinPresent { .. }
            | Stage::BigWinTier { .. }
            | Stage::BigWinEnd => StageCategory::WinLifecycle,

            Stage::GridFeature { .. }
            | Stage::ScatterShowcase { .. }
            | Stage::FreeSpinsAwarded { .. }
            | Stage::FeatureEnter { .. }
            | Stage::FeatureStep { .. }
            | Stage::FreeSpinSummary { .. }
            | Stage::FeatureExit { .. } => StageCategory::Feature,

            Stage::InsufficientFunds { .. }
            | Stage::BankruptcyRescue { .. }
            | Stage::BalanceCredited { .. } => StageCategory::Wallet,

            Stage::IdleStart
            | Stage::GameSelected { .. }
            | Stage::AutoplayStart
            | Stage::AutoplayStop { .. } => StageCategory::UI,
        }
    }

    /// Get the snake_case type name (matches the serde tag)
    pub fn type_name(&self) -> &'static str {
        match self {
            Stage::SpinStart { .. } => "spin_start",
            Stage::GridPublished { .. } => "grid_published",
            Stage::ReelStopScheduled { .. } => "reel_stop_scheduled",
            Stage::ReelStop { .. } => "reel_stop",
            Stage::EvaluateWins => "evaluate_wins",
            Stage::SpinEnd { .. } => "spin_end",
            Stage::WinEvaluated { .. } => "win_evaluated",
            Stage::WinPresent { .. } => "win_present",
            Stage::BigWinTier { .. } => "big_win_tier",
            Stage::BigWinEnd => "big_win_end",
            Stage::GridFeature { .. } => "grid_feature",
            Stage::ScatterShowcase { .. } => "scatter_showcase",
            Stage::FreeSpinsAwarded { .. } => "free_spins_awarded",
            Stage::FeatureEnter { .. } => "feature_enter",
            Stage::FeatureStep { .. } => "feature_step",
            Stage::FreeSpinSummary { .. } => "free_spin_summary",
            Stage::FeatureExit { .. } => "feature_exit",
            Stage::InsufficientFunds { .. } => "insufficient_funds",
            Stage::BankruptcyRescue { .. } => "bankruptcy_rescue",
            Stage::BalanceCredited { .. } => "balance_credited",
            Stage::IdleStart => "idle_start",
            Stage::GameSelected { .. } => "game_selected",
            Stage::AutoplayStart => "autoplay_start",
            Stage::AutoplayStop { .. } => "autoplay_stop",
        }
    }

    /// Stages that open a blocking popup on the presentation side
    pub fn is_popup(&self) -> bool {
        matches!(
            self,
            Stage::BigWinTier { .. }
                | Stage::FreeSpinsAwarded {
                    retrigger: false,
                    ..
                }
                | Stage::FreeSpinSummary { .. }
        )
    }
}

/// Stage category for grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCategory {
    SpinLifecycle,
    WinLifecycle,
    Feature,
    Wallet,
    UI,
}

impl StageCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SpinLifecycle => "Spin Lifecycle",
            Self::WinLifecycle => "Win Lifecycle",
            Self::Feature => "Features",
            Self::Wallet => "Wallet",
            Self::UI => "UI/Idle",
        }
    }
}
