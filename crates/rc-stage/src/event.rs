//! StageEvent - A stage occurrence with metadata
//!
//! Wraps a Stage with its virtual timestamp, payload and tags.

use serde::{Deserialize, Serialize};

use crate::stage::Stage;
use crate::taxonomy::WinLine;

/// A stage event with full metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    /// The canonical stage
    pub stage: Stage,

    /// Timestamp in milliseconds on the engine's virtual clock
    pub timestamp_ms: f64,

    /// Additional payload data
    #[serde(default)]
    pub payload: StagePayload,

    /// Custom tags for filtering/routing
    #[serde(default)]
    pub tags: Vec<String>,
}

impl StageEvent {
    /// Create a new stage event
    pub fn new(stage: Stage, timestamp_ms: f64) -> Self {
        Self {
            stage,
            timestamp_ms,
            payload: StagePayload::default(),
            tags: Vec::new(),
        }
    }

    /// Create with payload
    pub fn with_payload(stage: Stage, timestamp_ms: f64, payload: StagePayload) -> Self {
        Self {
            stage,
            timestamp_ms,
            payload,
            tags: Vec::new(),
        }
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Get stage type name
    pub fn type_name(&self) -> &'static str {
        self.stage.type_name()
    }
}

/// Additional payload data for a stage event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagePayload {
    // ═══ WIN DATA ═══
    /// Total win amount
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub win_amount: Option<u64>,

    /// Bet amount (for ratio calculations)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bet_amount: Option<u64>,

    /// Individual win lines
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub win_lines: Vec<WinLine>,

    // ═══ FEATURE DATA ═══
    /// Spins remaining in the free-spin session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spins_remaining: Option<u32>,

    // ═══ GAME STATE ═══
    /// Wallet balance after the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<u64>,

    /// Active game id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,

    /// Spin id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spin_id: Option<u64>,
}

impl StagePayload {
    /// Create empty payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with win data
    pub fn with_win(win_amount: u64, bet_amount: u64) -> Self {
        Self {
            win_amount: Some(win_amount),
            bet_amount: Some(bet_amount),
            ..Default::default()
        }
    }

    /// Builder: set win lines
    pub fn win_lines(mut self, lines: Vec<WinLine>) -> Self {
        self.win_lines = lines;
        self
    }

    /// Builder: set spins remaining
    pub fn spins_remaining(mut self, spins: u32) -> Self {
        self.spins_remaining = Some(spins);
        self
    }

    /// Builder: set balance
    pub fn balance(mut self, balance: u64) -> Self {
        self.balance = Some(balance);
        self
    }

    /// Builder: set game and spin ids
    pub fn spin(mut self, game_id: impl Into<String>, spin_id: u64) -> Self {
        self.game_id = Some(game_id.into());
        self.spin_id = Some(spin_id);
        self
    }

    /// Win-to-bet ratio if both amounts are present
    pub fn calculate_ratio(&self) -> Option<f64> {
        match (self.win_amount, self.bet_amount) {
            (Some(win), Some(bet)) if bet > 0 => Some(win as f64 / bet as f64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_event_creation() {
        let event = StageEvent::new(Stage::IdleStart, 0.0).with_tag("auto");

        assert_eq!(event.stage, Stage::IdleStart);
        assert_eq!(event.timestamp_ms, 0.0);
        assert_eq!(event.type_name(), "idle_start");
        assert!(event.tags.contains(&"auto".to_string()));
    }

    #[test]
    fn test_payload_win_ratio() {
        let payload = StagePayload::with_win(500, 10);
        assert_eq!(payload.calculate_ratio(), Some(50.0));
        assert_eq!(StagePayload::with_win(500, 0).calculate_ratio(), None);
    }

    #[test]
    fn test_payload_serialization() {
        let payload = StagePayload::with_win(1000, 5).spins_remaining(3);

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("win_amount"));
        assert!(json.contains("spins_remaining"));

        // Empty fields should be skipped
        assert!(!json.contains("game_id"));
    }
}
