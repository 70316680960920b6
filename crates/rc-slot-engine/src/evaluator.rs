//! Payline evaluator
//!
//! Pure function of (grid, bet): scans the pinned payline set, sums line
//! payouts, counts scatters anywhere on the grid and classifies the win tier.

use std::collections::BTreeSet;
use std::sync::Arc;

use rc_stage::{SymbolPosition, WinLine, WinTier};
use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::grid::Grid;
use crate::paylines::{Payline, PaylineSet};
use crate::symbols::{PayTable, Symbol};

/// Minimum run length that pays
pub const MIN_MATCH: u8 = 3;

/// One paying line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineWin {
    pub line_id: u16,
    /// Symbol the run resolved to (WILD only for an all-wild run)
    pub symbol: Symbol,
    pub length: u8,
    pub payout: u64,
    pub cells: Vec<SymbolPosition>,
}

impl LineWin {
    pub fn to_win_line(&self) -> WinLine {
        WinLine {
            line_id: self.line_id,
            positions: self.cells.clone(),
            symbol_id: self.symbol.id(),
            match_count: self.length,
            win_amount: self.payout,
        }
    }
}

/// Result of evaluating one grid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WinResult {
    pub payout: u64,
    pub bet: u64,
    pub line_wins: Vec<LineWin>,
    /// Paying cells plus scatter cells when the trigger threshold is met
    pub winning_cells: Vec<SymbolPosition>,
    pub scatter_count: u8,
    pub scatter_cells: Vec<SymbolPosition>,
    pub tier: Option<WinTier>,
}

impl WinResult {
    pub fn is_win(&self) -> bool {
        self.payout > 0
    }

    pub fn winning_line_ids(&self) -> Vec<u16> {
        self.line_wins.iter().map(|w| w.line_id).collect()
    }

    pub fn win_ratio(&self) -> f64 {
        if self.bet == 0 {
            0.0
        } else {
            self.payout as f64 / self.bet as f64
        }
    }

    pub fn win_lines(&self) -> Vec<WinLine> {
        self.line_wins.iter().map(LineWin::to_win_line).collect()
    }
}

/// Evaluator bound to one game's pay values and payline set
#[derive(Debug, Clone)]
pub struct PaylineEvaluator {
    paytable: PayTable,
    paylines: Arc<PaylineSet>,
    scatter_threshold: u8,
    three_reel: bool,
}

impl PaylineEvaluator {
    pub fn new(
        paytable: PayTable,
        paylines: Arc<PaylineSet>,
        scatter_threshold: u8,
        three_reel: bool,
    ) -> Self {
        Self {
            paytable,
            paylines,
            scatter_threshold,
            three_reel,
        }
    }

    /// Evaluator for a game, sharing the given pinned payline set
    pub fn for_game(game: &GameConfig, paylines: Arc<PaylineSet>) -> Self {
        Self::new(
            game.paytable(),
            paylines,
            game.scatters_to_trigger,
            game.is_three_reel(),
        )
    }

    pub fn paylines(&self) -> &Arc<PaylineSet> {
        &self.paylines
    }

    pub fn paytable(&self) -> &PayTable {
        &self.paytable
    }

    /// Length multiplier for a qualifying run
    pub fn length_multiplier(&self, length: u8) -> f64 {
        match length {
            0..=2 => 0.0,
            3 if self.three_reel => 1.0,
            3 => 0.5,
            4 => 2.0,
            _ => 4.0,
        }
    }

    /// Evaluate a finished grid at a bet
    pub fn evaluate(&self, grid: &Grid, bet: u64) -> WinResult {
        let mut payout = 0u64;
        let mut line_wins = Vec::new();
        let mut cells = BTreeSet::new();

        for line in self.paylines.lines() {
            if let Some(win) = self.evaluate_line(grid, line, bet) {
                payout = payout.saturating_add(win.payout);
                cells.extend(win.cells.iter().copied());
                line_wins.push(win);
            }
        }

        let scatter_cells = grid.positions_of(Symbol::Scatter);
        let scatter_count = scatter_cells.len().min(u8::MAX as usize) as u8;
        if scatter_count >= self.scatter_threshold {
            cells.extend(scatter_cells.iter().copied());
        }

        WinResult {
            payout,
            bet,
            line_wins,
            winning_cells: cells.into_iter().collect(),
            scatter_count,
            scatter_cells,
            tier: WinTier::classify(payout, bet),
        }
    }

    /// Left-to-right run on one line; `None` unless it pays
    pub fn evaluate_line(&self, grid: &Grid, line: &Payline, bet: u64) -> Option<LineWin> {
        let symbols: Vec<Symbol> = line
            .rows
            .iter()
            .enumerate()
            .map(|(reel, &row)| self.read_cell(grid, reel as u8, row))
            .collect();

        let (&first, rest) = symbols.split_first()?;
        if first == Symbol::Scatter {
            return None;
        }

        // A leading wild run adopts whatever follows it, SCATTER included;
        // SCATTER has no line value, so such a run never pays.
        let mut match_symbol = (first != Symbol::Wild).then_some(first);
        let mut length: u8 = 1;
        for &symbol in rest {
            match (symbol, match_symbol) {
                (Symbol::Wild, _) => {}
                (s, None) => match_symbol = Some(s),
                (s, Some(m)) if s == m => {}
                _ => break,
            }
            length += 1;
        }

        if length < MIN_MATCH {
            return None;
        }

        let symbol = match_symbol.unwrap_or(Symbol::Wild);
        let value = self.paytable.value(symbol);
        let raw = bet as f64 * (value / 3.0) * self.length_multiplier(length);
        let payout = raw.floor() as u64;
        if payout == 0 {
            return None;
        }

        let cells = line
            .rows
            .iter()
            .take(length as usize)
            .enumerate()
            .map(|(reel, &row)| SymbolPosition::new(reel as u8, row))
            .collect();

        Some(LineWin {
            line_id: line.id,
            symbol,
            length,
            payout,
            cells,
        })
    }

    fn read_cell(&self, grid: &Grid, reel: u8, row: u8) -> Symbol {
        grid.get(reel, row).unwrap_or_else(|| {
            log::warn!(
                "Payline cell ({reel}, {row}) outside {}x{} grid, reading TEN",
                grid.reels(),
                grid.rows()
            );
            Symbol::Ten
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::Theme;
    use Symbol::*;

    fn classic_evaluator() -> PaylineEvaluator {
        let game = GameConfig::classic_fruits();
        PaylineEvaluator::for_game(&game, PaylineSet::for_game(&game))
    }

    /// Single straight line over the top row
    fn single_line_evaluator(reels: u8, rows: u8) -> PaylineEvaluator {
        let set = PaylineSet::from_lines(reels, rows, vec![Payline::new(1, vec![0; reels as usize])]);
        PaylineEvaluator::new(
            PayTable::for_theme(Theme::Classic),
            Arc::new(set),
            3,
            reels == 3,
        )
    }

    #[test]
    fn test_all_sevens_top_line() {
        let eval = single_line_evaluator(5, 3);
        let grid = Grid::from_rows(vec![
            vec![Seven; 5],
            vec![Ten, Jack, Queen, King, Ace],
            vec![Jack, Queen, King, Ace, Ten],
        ])
        .unwrap();
        let result = eval.evaluate(&grid, 1000);
        assert_eq!(result.payout, 20833);
        assert_eq!(result.tier, Some(WinTier::GreatWin));
        assert_eq!(result.winning_line_ids(), vec![1]);
    }

    #[test]
    fn test_leading_wilds_adopt_first_symbol() {
        let eval = single_line_evaluator(5, 3);
        let grid = Grid::from_rows(vec![
            vec![Wild, Wild, Wild, Ten, Ten],
            vec![Jack, Queen, King, Ace, Grape],
            vec![Queen, King, Ace, Grape, Bell],
        ])
        .unwrap();
        let result = eval.evaluate(&grid, 100);
        let win = &result.line_wins[0];
        assert_eq!(win.symbol, Ten);
        assert_eq!(win.length, 5);
        assert_eq!(win.payout, 66);
    }

    #[test]
    fn test_all_wild_line_pays_wild_value() {
        let eval = single_line_evaluator(5, 3);
        let mut grid = Grid::filled(5, 3, Ten);
        for reel in 0..5 {
            grid.set(reel, 0, Wild);
        }
        let result = eval.evaluate(&grid, 3);
        let win = &result.line_wins[0];
        assert_eq!(win.symbol, Wild);
        // 3 * 25/3 * 4
        assert_eq!(win.payout, 100);
    }

    #[test]
    fn test_wild_does_not_substitute_scatter() {
        let eval = single_line_evaluator(5, 3);
        let grid = Grid::from_rows(vec![
            vec![Wild, Scatter, Scatter, Scatter, Ace],
            vec![Jack, Queen, King, Ace, Grape],
            vec![Queen, King, Ace, Grape, Bell],
        ])
        .unwrap();
        let result = eval.evaluate(&grid, 100);
        assert!(result.line_wins.is_empty());
        assert_eq!(result.scatter_count, 3);
        assert_eq!(result.winning_cells.len(), 3);
    }

    #[test]
    fn test_run_breaks_on_mismatch() {
        let eval = single_line_evaluator(5, 3);
        let grid = Grid::from_rows(vec![
            vec![Bar, Bar, Wild, Bell, Bar],
            vec![Jack, Queen, King, Ace, Grape],
            vec![Queen, King, Ace, Grape, Bell],
        ])
        .unwrap();
        let result = eval.evaluate(&grid, 100);
        let win = &result.line_wins[0];
        assert_eq!(win.length, 3);
        // 100 * 5/3 * 0.5
        assert_eq!(win.payout, 83);
        assert_eq!(win.cells.len(), 3);
    }

    #[test]
    fn test_three_reel_length_three_pays_full() {
        let eval = single_line_evaluator(3, 3);
        let grid = Grid::from_rows(vec![
            vec![Bell; 3],
            vec![Ten, Jack, Queen],
            vec![Jack, Queen, King],
        ])
        .unwrap();
        let result = eval.evaluate(&grid, 30);
        // 30 * 3.75/3 * 1.0
        assert_eq!(result.payout, 37);
    }

    #[test]
    fn test_zero_payout_lines_excluded() {
        let eval = single_line_evaluator(5, 3);
        let grid = Grid::from_rows(vec![
            vec![Ten, Ten, Ten, Ace, Ace],
            vec![Jack, Queen, King, Ace, Grape],
            vec![Queen, King, Ace, Grape, Bell],
        ])
        .unwrap();
        // 1 * 0.5/3 * 0.5 floors to 0
        let result = eval.evaluate(&grid, 1);
        assert!(result.line_wins.is_empty());
        assert!(!result.is_win());
    }

    #[test]
    fn test_scatter_cells_only_join_at_threshold() {
        let eval = classic_evaluator();
        let mut grid = Grid::from_rows(vec![
            vec![Ten, Jack, Queen, King, Ace],
            vec![Ace, King, Queen, Jack, Ten],
            vec![Jack, Ten, Ace, Queen, King],
        ])
        .unwrap();
        grid.set(0, 1, Scatter);
        grid.set(2, 2, Scatter);
        let two = eval.evaluate(&grid, 100);
        assert_eq!(two.scatter_count, 2);
        assert!(two.winning_cells.iter().all(|c| !two.scatter_cells.contains(c)));

        grid.set(4, 0, Scatter);
        let three = eval.evaluate(&grid, 100);
        assert_eq!(three.scatter_count, 3);
        for cell in &three.scatter_cells {
            assert!(three.winning_cells.contains(cell));
        }
    }

    #[test]
    fn test_mismatched_grid_reads_ten() {
        // 5-reel lines against a 3x3 grid
        let eval = classic_evaluator();
        let grid = Grid::filled(3, 3, Ace);
        let result = eval.evaluate(&grid, 300);
        assert!(result.is_win());
        assert!(result.line_wins.iter().all(|w| w.length == 3 && w.symbol == Ace));
    }

    #[test]
    fn test_evaluation_is_pure() {
        let eval = classic_evaluator();
        let grid = Grid::from_rows(vec![
            vec![Wild, Grape, Grape, Bell, Bar],
            vec![Grape, Wild, Bell, Grape, Ten],
            vec![Bell, Grape, Wild, Scatter, Grape],
        ])
        .unwrap();
        assert_eq!(eval.evaluate(&grid, 50), eval.evaluate(&grid, 50));
    }

    #[test]
    fn test_win_lines_for_stage_payload() {
        let eval = single_line_evaluator(5, 3);
        let grid = Grid::filled(5, 3, Cherry);
        let result = eval.evaluate(&grid, 10);
        let lines = result.win_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].symbol_id, Cherry.id());
        assert_eq!(lines[0].match_count, 5);
    }
}
