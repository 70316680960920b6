//! Spin session - per-game bet and bonus bookkeeping
//!
//! A session is created the first time a game is selected and kept in the
//! [`SessionStore`] for the lifetime of the process, so switching games and
//! coming back resumes bet, free spins and counters.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Free spins awarded for a scatter count (3→10, 4→15, 5+→20)
pub fn free_spins_for_scatters(scatters: u8) -> u32 {
    match scatters {
        0..=2 => 0,
        3 => 10,
        4 => 15,
        _ => 20,
    }
}

/// Per-game session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinSession {
    pub game_id: String,
    pub bet: u64,
    pub free_spins_remaining: u32,
    /// Awarded during the current free-spin session
    pub total_free_spins_awarded: u32,
    /// Won during the current free-spin session
    pub free_spin_winnings: u64,
    /// Paid spins since the last fresh bonus trigger
    pub spins_without_bonus: u32,
    pub piggy_bank: u64,
    pub total_spins: u64,
    pub free_spin_session_active: bool,
    /// Free spins played in the current session
    pub free_spins_played: u32,
}

/// Closing figures of a free-spin session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeSpinSummary {
    pub total_win: u64,
    pub spins_awarded: u32,
    pub spins_played: u32,
}

impl SpinSession {
    pub fn new(game_id: impl Into<String>, bet: u64) -> Self {
        Self {
            game_id: game_id.into(),
            bet,
            free_spins_remaining: 0,
            total_free_spins_awarded: 0,
            free_spin_winnings: 0,
            spins_without_bonus: 0,
            piggy_bank: 0,
            total_spins: 0,
            free_spin_session_active: false,
            free_spins_played: 0,
        }
    }

    pub fn has_free_spins(&self) -> bool {
        self.free_spins_remaining > 0
    }

    /// Paid spin accepted: counters and piggy-bank accrual
    pub fn record_paid_spin(&mut self, bet: u64, piggy_rate: f64) {
        self.total_spins += 1;
        self.spins_without_bonus = self.spins_without_bonus.saturating_add(1);
        let accrual = (bet as f64 * piggy_rate.max(0.0)).floor() as u64;
        self.piggy_bank = self.piggy_bank.saturating_add(accrual);
    }

    /// Consume one free spin. Returns the 1-based step index, or `None` if
    /// there was nothing to consume.
    pub fn consume_free_spin(&mut self) -> Option<u32> {
        if self.free_spins_remaining == 0 {
            return None;
        }
        self.free_spins_remaining -= 1;
        self.free_spins_played += 1;
        self.total_spins += 1;
        Some(self.free_spins_played)
    }

    /// Add spins to the current (or a new) free-spin session.
    /// Returns true when this opened a fresh session.
    pub fn award_free_spins(&mut self, spins: u32) -> bool {
        let fresh = !self.free_spin_session_active;
        if fresh {
            self.free_spin_session_active = true;
            self.total_free_spins_awarded = 0;
            self.free_spin_winnings = 0;
            self.free_spins_played = 0;
            self.spins_without_bonus = 0;
        }
        self.free_spins_remaining = self.free_spins_remaining.saturating_add(spins);
        self.total_free_spins_awarded = self.total_free_spins_awarded.saturating_add(spins);
        fresh
    }

    pub fn record_free_spin_win(&mut self, amount: u64) {
        self.free_spin_winnings = self.free_spin_winnings.saturating_add(amount);
    }

    /// Free-spin session ran out of spins
    pub fn free_spin_session_finished(&self) -> bool {
        self.free_spin_session_active && self.free_spins_remaining == 0
    }

    /// Close the free-spin session and hand back its totals
    pub fn end_free_spin_session(&mut self) -> FreeSpinSummary {
        let summary = FreeSpinSummary {
            total_win: self.free_spin_winnings,
            spins_awarded: self.total_free_spins_awarded,
            spins_played: self.free_spins_played,
        };
        self.free_spin_session_active = false;
        self.free_spin_winnings = 0;
        self.total_free_spins_awarded = 0;
        self.free_spins_played = 0;
        summary
    }

    /// Empty the piggy bank
    pub fn take_piggy_bank(&mut self) -> u64 {
        std::mem::take(&mut self.piggy_bank)
    }
}

/// Sessions keyed by game id
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SpinSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored session for the game, or a fresh one at `default_bet`
    pub fn load_or_create(&self, game_id: &str, default_bet: u64) -> SpinSession {
        if let Some(session) = self.sessions.read().get(game_id) {
            return session.clone();
        }
        let session = SpinSession::new(game_id, default_bet);
        self.sessions
            .write()
            .entry(game_id.to_string())
            .or_insert(session)
            .clone()
    }

    pub fn save(&self, session: &SpinSession) {
        self.sessions
            .write()
            .insert(session.game_id.clone(), session.clone());
    }

    pub fn get(&self, game_id: &str) -> Option<SpinSession> {
        self.sessions.read().get(game_id).cloned()
    }

    pub fn contains(&self, game_id: &str) -> bool {
        self.sessions.read().contains_key(game_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
