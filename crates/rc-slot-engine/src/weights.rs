//! Symbol weight tables and weighted random draws

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::symbols::Symbol;

/// Ordered (symbol, weight) pairs. Order matters: draws walk the table front to back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    pub entries: Vec<(Symbol, f64)>,
}

impl WeightTable {
    pub fn new(entries: Vec<(Symbol, f64)>) -> Self {
        Self { entries }
    }

    /// Base-game table
    pub fn normal() -> Self {
        Self::new(vec![
            (Symbol::Ten, 18.0),
            (Symbol::Jack, 17.0),
            (Symbol::Queen, 16.0),
            (Symbol::King, 15.0),
            (Symbol::Ace, 14.0),
            (Symbol::Grape, 8.0),
            (Symbol::Bell, 6.0),
            (Symbol::Bar, 4.0),
            (Symbol::Cherry, 3.0),
            (Symbol::Seven, 2.0),
            (Symbol::Wild, 2.0),
        ])
    }

    /// Free-spin table: fewer letters, more fruit and wilds
    pub fn free_spin() -> Self {
        Self::new(vec![
            (Symbol::Ten, 14.0),
            (Symbol::Jack, 13.0),
            (Symbol::Queen, 12.0),
            (Symbol::King, 12.0),
            (Symbol::Ace, 11.0),
            (Symbol::Grape, 10.0),
            (Symbol::Bell, 8.0),
            (Symbol::Bar, 6.0),
            (Symbol::Cherry, 5.0),
            (Symbol::Seven, 3.0),
            (Symbol::Wild, 4.0),
        ])
    }

    /// Plain symbol stack picks
    pub fn symbol_stack() -> Self {
        Self::new(vec![
            (Symbol::Grape, 40.0),
            (Symbol::Bar, 25.0),
            (Symbol::Cherry, 15.0),
            (Symbol::Seven, 10.0),
            (Symbol::Bell, 10.0),
        ])
    }

    pub fn total_weight(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w.max(0.0)).sum()
    }

    /// Negative weights make the table malformed; draws still terminate.
    pub fn is_valid(&self) -> bool {
        self.entries.iter().all(|(_, w)| *w >= 0.0 && w.is_finite()) && self.total_weight() > 0.0
    }

    /// Draw a symbol: uniform in [0, total), subtract weights in order,
    /// first entry that takes the draw below zero wins. Falls back to TEN.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Symbol {
        let total = self.total_weight();
        if !(total > 0.0) {
            log::warn!("Weight table has no positive weight, falling back to TEN");
            return Symbol::Ten;
        }

        let mut roll = rng.random::<f64>() * total;
        for &(symbol, weight) in &self.entries {
            let weight = weight.max(0.0);
            if roll < weight {
                return symbol;
            }
            roll -= weight;
        }
        Symbol::Ten
    }

    /// Draw until the result is accepted by `keep`, at most `attempts` times.
    pub fn draw_where<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        attempts: u32,
        keep: impl Fn(Symbol) -> bool,
    ) -> Symbol {
        for _ in 0..attempts {
            let symbol = self.draw(rng);
            if keep(symbol) {
                return symbol;
            }
        }
        Symbol::Ten
    }
}
