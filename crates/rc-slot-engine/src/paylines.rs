//! Payline sets
//!
//! A payline set is built once per game configuration and shared through an
//! `Arc` by the evaluator and anyone rendering the lines. Straight lines come
//! first (one per row), then fixed shapes, then seeded random filler.

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::GameConfig;

/// Upper bound on lines per game
pub const MAX_PAYLINES: usize = 50;

/// Filler attempts before giving up on finding new distinct paths
const MAX_FILLER_ATTEMPTS: usize = 2_000;

const LINE_COLORS: [&str; 10] = [
    "#FF4D4D", "#4DA6FF", "#FFD24D", "#4DFF88", "#C44DFF", "#FF944D", "#4DFFF0", "#FF4DC4",
    "#A6FF4D", "#FFFFFF",
];

/// One path through the grid: a row index per reel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payline {
    /// 1-based id, stable for the lifetime of the set
    pub id: u16,
    /// Row index for each reel
    pub rows: Vec<u8>,
    /// Display color, cosmetic only
    pub color: String,
}

impl Payline {
    pub fn new(id: u16, rows: Vec<u8>) -> Self {
        let color = LINE_COLORS[(id as usize).saturating_sub(1) % LINE_COLORS.len()].to_string();
        Self { id, rows, color }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Pinned set of paylines for one grid shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaylineSet {
    pub reels: u8,
    pub rows: u8,
    lines: Vec<Payline>,
}

impl PaylineSet {
    /// Build the set for a game, seeding the filler from the game id so the
    /// same game always gets the same lines.
    pub fn for_game(game: &GameConfig) -> Arc<Self> {
        let mut rng = StdRng::seed_from_u64(stable_seed(&game.id, game.reels, game.rows));
        Arc::new(Self::generate(game.reels, game.rows, &mut rng))
    }

    /// Straight lines, then shapes, then random filler up to [`MAX_PAYLINES`]
    pub fn generate<R: Rng + ?Sized>(reels: u8, rows: u8, rng: &mut R) -> Self {
        let mut paths: Vec<Vec<u8>> = Vec::new();
        let mut seen: HashSet<Vec<u8>> = HashSet::new();
        let mut push = |path: Vec<u8>, paths: &mut Vec<Vec<u8>>| {
            if paths.len() < MAX_PAYLINES && seen.insert(path.clone()) {
                paths.push(path);
            }
        };

        for row in 0..rows {
            push(vec![row; reels as usize], &mut paths);
        }

        if reels >= 3 && rows >= 3 {
            for shape in shapes(reels, rows) {
                push(shape, &mut paths);
            }
        }

        let distinct = (rows as usize).checked_pow(reels as u32).unwrap_or(usize::MAX);
        let target = MAX_PAYLINES.min(distinct);
        let mut attempts = 0;
        while paths.len() < target && attempts < MAX_FILLER_ATTEMPTS {
            attempts += 1;
            let path = (0..reels).map(|_| rng.random_range(0..rows)).collect();
            push(path, &mut paths);
        }

        let lines = paths
            .into_iter()
            .enumerate()
            .map(|(i, rows)| Payline::new(i as u16 + 1, rows))
            .collect();

        Self { reels, rows, lines }
    }

    /// Explicit set, ids taken as given
    pub fn from_lines(reels: u8, rows: u8, lines: Vec<Payline>) -> Self {
        Self { reels, rows, lines }
    }

    pub fn lines(&self) -> &[Payline] {
        &self.lines
    }

    pub fn get(&self, id: u16) -> Option<&Payline> {
        self.lines.iter().find(|l| l.id == id)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Diagonal, V and zigzag shapes stretched over any width
fn shapes(reels: u8, rows: u8) -> Vec<Vec<u8>> {
    let last = rows - 1;
    // Triangle wave bouncing between the top and bottom rows
    let bounce = |col: u8| {
        let period = 2 * last as u16;
        let pos = col as u16 % period;
        (if pos <= last as u16 { pos } else { period - pos }) as u8
    };
    let cols = 0..reels;

    vec![
        // V: top, down to the bottom, back up
        cols.clone().map(bounce).collect(),
        // Inverted V
        cols.clone().map(|c| last - bounce(c)).collect(),
        // Zigzag across the top two rows
        cols.clone().map(|c| c % 2).collect(),
        // Zigzag across the bottom two rows
        cols.clone().map(|c| last - c % 2).collect(),
        // Middle-anchored W
        cols.clone()
            .map(|c| [1, 0, 1, 2][c as usize % 4].min(last))
            .collect(),
        // Middle-anchored M
        cols.map(|c| [1, 2, 1, 0][c as usize % 4].min(last)).collect(),
    ]
}

/// FNV-1a over the game id and dimensions
fn stable_seed(id: &str, reels: u8, rows: u8) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    id.bytes()
        .chain([reels, rows])
        .fold(OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME))
}
