//! Stage Taxonomy - Enums for game elements
//!
//! These enums classify win tiers, scripted grid features and board
//! positions carried inside stage events.

use serde::{Deserialize, Serialize};

/// Celebratory win tier, classified by payout-to-bet multiple
///
/// Thresholds (inclusive lower bounds):
/// - BigWin: 10x
/// - GreatWin: 20x
/// - EpicWin: 50x
/// - MegaWin: 100x
/// - UltimateWin: 250x
///
/// Anything below 10x carries no tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinTier {
    BigWin,
    GreatWin,
    EpicWin,
    MegaWin,
    UltimateWin,
}

impl WinTier {
    /// All tiers, lowest first
    pub const ALL: [WinTier; 5] = [
        Self::BigWin,
        Self::GreatWin,
        Self::EpicWin,
        Self::MegaWin,
        Self::UltimateWin,
    ];

    /// Get tier from payout-to-bet multiple
    pub fn from_ratio(ratio: f64) -> Option<Self> {
        match ratio {
            r if r >= 250.0 => Some(Self::UltimateWin),
            r if r >= 100.0 => Some(Self::MegaWin),
            r if r >= 50.0 => Some(Self::EpicWin),
            r if r >= 20.0 => Some(Self::GreatWin),
            r if r >= 10.0 => Some(Self::BigWin),
            _ => None,
        }
    }

    /// Classify a payout against a bet. A zero bet never produces a tier.
    pub fn classify(payout: u64, bet: u64) -> Option<Self> {
        if bet == 0 {
            return None;
        }
        Self::from_ratio(payout as f64 / bet as f64)
    }

    /// Minimum multiple for this tier
    pub fn min_ratio(&self) -> f64 {
        match self {
            Self::BigWin => 10.0,
            Self::GreatWin => 20.0,
            Self::EpicWin => 50.0,
            Self::MegaWin => 100.0,
            Self::UltimateWin => 250.0,
        }
    }

    /// Popup label
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::BigWin => "BIG WIN",
            Self::GreatWin => "GREAT WIN",
            Self::EpicWin => "EPIC WIN",
            Self::MegaWin => "MEGA WIN",
            Self::UltimateWin => "ULTIMATE WIN",
        }
    }
}

impl std::fmt::Display for WinTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Feature type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    /// Free spins sub-session
    FreeSpins,
    /// One symbol painted across a span of reels
    MegaMatch,
    /// Whole column of wilds
    WildStack,
    /// Whole column of one paying symbol
    SymbolStack,
    /// All-wild screen
    JackpotScreen,
}

impl FeatureType {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::FreeSpins => "Free Spins",
            Self::MegaMatch => "Mega Match",
            Self::WildStack => "Wild Stack",
            Self::SymbolStack => "Symbol Stack",
            Self::JackpotScreen => "Jackpot Screen",
        }
    }

    /// Whether this feature spans multiple spins
    pub fn is_multi_step(&self) -> bool {
        matches!(self, Self::FreeSpins)
    }
}

/// Symbol position on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolPosition {
    /// Reel index (0-based)
    pub reel: u8,
    /// Row index (0-based, 0 = top)
    pub row: u8,
}

impl SymbolPosition {
    pub fn new(reel: u8, row: u8) -> Self {
        Self { reel, row }
    }
}

/// Winning payline as reported to presentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinLine {
    /// Payline id
    pub line_id: u16,
    /// Positions that make up this win
    pub positions: Vec<SymbolPosition>,
    /// Symbol ID that won
    pub symbol_id: u32,
    /// Number of matching symbols
    pub match_count: u8,
    /// Win amount for this line
    pub win_amount: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_tier_from_ratio() {
        assert_eq!(WinTier::from_ratio(9.99), None);
        assert_eq!(WinTier::from_ratio(10.0), Some(WinTier::BigWin));
        assert_eq!(WinTier::from_ratio(20.0), Some(WinTier::GreatWin));
        assert_eq!(WinTier::from_ratio(50.0), Some(WinTier::EpicWin));
        assert_eq!(WinTier::from_ratio(100.0), Some(WinTier::MegaWin));
        assert_eq!(WinTier::from_ratio(250.0), Some(WinTier::UltimateWin));
        assert_eq!(WinTier::from_ratio(10_000.0), Some(WinTier::UltimateWin));
    }

    #[test]
    fn test_win_tier_boundaries_do_not_overlap() {
        for tier in WinTier::ALL {
            assert_eq!(WinTier::from_ratio(tier.min_ratio()), Some(tier));
        }
        for pair in WinTier::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(WinTier::from_ratio(pair[1].min_ratio() - 0.01), Some(pair[0]));
        }
    }

    #[test]
    fn test_classify_zero_bet() {
        assert_eq!(WinTier::classify(5_000, 0), None);
        assert_eq!(WinTier::classify(999, 100), None);
        assert_eq!(WinTier::classify(1_000, 100), Some(WinTier::BigWin));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(WinTier::GreatWin.to_string(), "GREAT WIN");
        assert_eq!(WinTier::UltimateWin.display_name(), "ULTIMATE WIN");
    }

    #[test]
    fn test_feature_type_multi_step() {
        assert!(FeatureType::FreeSpins.is_multi_step());
        assert!(!FeatureType::MegaMatch.is_multi_step());
    }
}
