//! Grid - column-major symbol matrix for one spin

use rc_stage::SymbolPosition;
use serde::{Deserialize, Serialize};

use crate::symbols::Symbol;

/// `reels` columns × `rows` rows, stored column-major.
/// Every cell holds exactly one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    reels: u8,
    rows: u8,
    cells: Vec<Symbol>,
}

impl Grid {
    /// Grid filled with one symbol
    pub fn filled(reels: u8, rows: u8, symbol: Symbol) -> Self {
        Self {
            reels,
            rows,
            cells: vec![symbol; reels as usize * rows as usize],
        }
    }

    /// Build from columns (top to bottom). `None` if the columns are ragged or empty.
    pub fn from_columns(columns: Vec<Vec<Symbol>>) -> Option<Self> {
        let reels = u8::try_from(columns.len()).ok()?;
        let rows = u8::try_from(columns.first()?.len()).ok()?;
        if rows == 0 || columns.iter().any(|c| c.len() != rows as usize) {
            return None;
        }
        Some(Self {
            reels,
            rows,
            cells: columns.into_iter().flatten().collect(),
        })
    }

    /// Build from rows (left to right), the way grids read on screen.
    pub fn from_rows(rows: Vec<Vec<Symbol>>) -> Option<Self> {
        let reels = rows.first()?.len();
        if rows.iter().any(|r| r.len() != reels) {
            return None;
        }
        let columns = (0..reels)
            .map(|reel| rows.iter().map(|row| row[reel]).collect())
            .collect();
        Self::from_columns(columns)
    }

    pub fn reels(&self) -> u8 {
        self.reels
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn index(&self, reel: u8, row: u8) -> Option<usize> {
        (reel < self.reels && row < self.rows).then(|| reel as usize * self.rows as usize + row as usize)
    }

    /// Out-of-range reads return `None`
    pub fn get(&self, reel: u8, row: u8) -> Option<Symbol> {
        self.index(reel, row).map(|i| self.cells[i])
    }

    /// Out-of-range writes are ignored
    pub fn set(&mut self, reel: u8, row: u8, symbol: Symbol) {
        if let Some(i) = self.index(reel, row) {
            self.cells[i] = symbol;
        }
    }

    /// Symbols of one reel, top to bottom
    pub fn column(&self, reel: u8) -> &[Symbol] {
        if reel >= self.reels {
            return &[];
        }
        let start = reel as usize * self.rows as usize;
        &self.cells[start..start + self.rows as usize]
    }

    /// Paint a whole reel with one symbol
    pub fn paint_column(&mut self, reel: u8, symbol: Symbol) {
        for row in 0..self.rows {
            self.set(reel, row, symbol);
        }
    }

    pub fn column_contains(&self, reel: u8, symbol: Symbol) -> bool {
        self.column(reel).contains(&symbol)
    }

    pub fn count(&self, symbol: Symbol) -> usize {
        self.cells.iter().filter(|&&s| s == symbol).count()
    }

    /// Positions of a symbol, column-major order
    pub fn positions_of(&self, symbol: Symbol) -> Vec<SymbolPosition> {
        self.iter()
            .filter(|(_, s)| *s == symbol)
            .map(|(pos, _)| pos)
            .collect()
    }

    /// (position, symbol) pairs, column-major
    pub fn iter(&self) -> impl Iterator<Item = (SymbolPosition, Symbol)> + '_ {
        let rows = self.rows as usize;
        self.cells.iter().enumerate().map(move |(i, &s)| {
            (SymbolPosition::new((i / rows) as u8, (i % rows) as u8), s)
        })
    }

    /// Symbol ids per column, the shape stage events carry
    pub fn to_ids(&self) -> Vec<Vec<u32>> {
        (0..self.reels)
            .map(|reel| self.column(reel).iter().map(|s| s.id()).collect())
            .collect()
    }
}

impl std::fmt::Display for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in 0..self.rows {
            let line: Vec<&str> = (0..self.reels)
                .map(|reel| self.get(reel, row).map_or("?", Symbol::name))
                .collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}
