//! StageTrace - A complete sequence of stage events for one spin
//!
//! A trace captures the full timeline of a spin and can be validated
//! against the ordering guarantees of the spin engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::StageEvent;
use crate::stage::Stage;
use crate::taxonomy::WinTier;

/// A complete trace of stage events for one spin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTrace {
    /// Game identifier (e.g., "classic_fruits")
    pub game_id: String,

    /// Spin id within the session
    #[serde(default)]
    pub spin_id: Option<u64>,

    /// All events in emission order
    pub events: Vec<StageEvent>,

    /// When this trace was recorded
    pub recorded_at: DateTime<Utc>,
}

impl StageTrace {
    /// Create a new empty trace
    pub fn new(game_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            spin_id: None,
            events: Vec::new(),
            recorded_at: Utc::now(),
        }
    }

    /// Set spin ID
    pub fn with_spin(mut self, spin_id: u64) -> Self {
        self.spin_id = Some(spin_id);
        self
    }

    /// Add an event to the trace
    pub fn push(&mut self, event: StageEvent) {
        self.events.push(event);
    }

    /// Get total duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => last.timestamp_ms - first.timestamp_ms,
            _ => 0.0,
        }
    }

    /// Get events by stage type name
    pub fn events_by_type(&self, type_name: &str) -> Vec<&StageEvent> {
        self.events
            .iter()
            .filter(|e| e.stage.type_name() == type_name)
            .collect()
    }

    /// Check if trace contains a specific stage type
    pub fn has_stage(&self, type_name: &str) -> bool {
        self.events.iter().any(|e| e.stage.type_name() == type_name)
    }

    /// Get all reel stop events
    pub fn reel_stops(&self) -> Vec<&StageEvent> {
        self.events_by_type("reel_stop")
    }

    /// Total win reported by the evaluation of this spin
    pub fn total_win(&self) -> u64 {
        self.events
            .iter()
            .find_map(|e| match &e.stage {
                Stage::WinEvaluated { win_amount, .. } => Some(*win_amount),
                _ => None,
            })
            .unwrap_or(0)
    }

    /// Highest win tier popup in the trace
    pub fn max_win_tier(&self) -> Option<WinTier> {
        self.events
            .iter()
            .filter_map(|e| match &e.stage {
                Stage::BigWinTier { tier, .. } => Some(*tier),
                _ => None,
            })
            .max()
    }

    /// Check if this spin awarded free spins
    pub fn has_free_spin_award(&self) -> bool {
        self.has_stage("free_spins_awarded")
    }

    /// Validate the trace against the engine's ordering guarantees
    pub fn validate(&self) -> TraceValidation {
        let index_of = |name: &str| self.events.iter().position(|e| e.type_name() == name);
        let last_reel_stop = self
            .events
            .iter()
            .rposition(|e| e.type_name() == "reel_stop");
        let evaluation = index_of("evaluate_wins");

        TraceValidation {
            has_spin_start: self.has_stage("spin_start"),
            has_spin_end: self.has_stage("spin_end"),
            reel_stop_count: self.reel_stops().len() as u8,
            evaluation_count: self.events_by_type("evaluate_wins").len() as u8,
            evaluated_after_last_stop: match (last_reel_stop, evaluation) {
                (Some(stop), Some(eval)) => eval > stop,
                _ => false,
            },
        }
    }
}

/// Validation result for a trace
#[derive(Debug, Clone, Default)]
pub struct TraceValidation {
    pub has_spin_start: bool,
    pub has_spin_end: bool,
    pub reel_stop_count: u8,
    pub evaluation_count: u8,
    pub evaluated_after_last_stop: bool,
}

impl TraceValidation {
    /// Check the trace holds a complete spin for `reels` reels
    pub fn is_valid(&self, reels: u8) -> bool {
        self.has_spin_start
            && self.has_spin_end
            && self.reel_stop_count == reels
            && self.evaluation_count == 1
            && self.evaluated_after_last_stop
    }

    /// Get list of warnings
    pub fn warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();

        if !self.has_spin_start {
            warnings.push("Missing SPIN_START event");
        }
        if !self.has_spin_end {
            warnings.push("Missing SPIN_END event");
        }
        if self.evaluation_count > 1 {
            warnings.push("Wins evaluated more than once");
        }
        if self.evaluation_count == 1 && !self.evaluated_after_last_stop {
            warnings.push("Wins evaluated before the last reel stopped");
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_basic_trace() -> StageTrace {
        let mut trace = StageTrace::new("test_game").with_spin(1);

        trace.push(StageEvent::new(
            Stage::SpinStart {
                spin_id: 1,
                is_free_spin: false,
                bet: 10,
            },
            0.0,
        ));
        for i in 0..5 {
            trace.push(StageEvent::new(
                Stage::ReelStop {
                    reel_index: i,
                    symbols: vec![1, 2, 3],
                },
                500.0 + (i as f64 * 150.0),
            ));
        }
        trace.push(StageEvent::new(Stage::EvaluateWins, 1100.0));
        trace.push(StageEvent::new(
            Stage::WinEvaluated {
                win_amount: 50,
                is_big_win: false,
                tier: None,
                scatter_count: 0,
            },
            1100.0,
        ));
        trace.push(StageEvent::new(Stage::SpinEnd { spin_id: 1 }, 2000.0));

        trace
    }

    #[test]
    fn test_trace_duration() {
        let trace = create_basic_trace();
        assert_eq!(trace.duration_ms(), 2000.0);
    }

    #[test]
    fn test_trace_total_win() {
        let trace = create_basic_trace();
        assert_eq!(trace.total_win(), 50);
        assert_eq!(trace.max_win_tier(), None);
    }

    #[test]
    fn test_trace_validation() {
        let trace = create_basic_trace();
        let validation = trace.validate();

        assert!(validation.has_spin_start);
        assert!(validation.has_spin_end);
        assert_eq!(validation.reel_stop_count, 5);
        assert!(validation.is_valid(5));
        assert!(!validation.is_valid(3));
        assert!(validation.warnings().is_empty());
    }

    #[test]
    fn test_early_evaluation_is_flagged() {
        let mut trace = StageTrace::new("test_game");
        trace.push(StageEvent::new(
            Stage::SpinStart {
                spin_id: 1,
                is_free_spin: false,
                bet: 10,
            },
            0.0,
        ));
        trace.push(StageEvent::new(Stage::EvaluateWins, 10.0));
        trace.push(StageEvent::new(
            Stage::ReelStop {
                reel_index: 0,
                symbols: vec![],
            },
            20.0,
        ));

        let validation = trace.validate();
        assert!(!validation.evaluated_after_last_stop);
        assert!(validation
            .warnings()
            .contains(&"Wins evaluated before the last reel stopped"));
    }

    #[test]
    fn test_trace_serialization() {
        let trace = create_basic_trace();
        let json = serde_json::to_string_pretty(&trace).unwrap();

        assert!(json.contains("test_game"));
        assert!(json.contains("spin_start"));

        let deserialized: StageTrace = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, trace);
    }
}
