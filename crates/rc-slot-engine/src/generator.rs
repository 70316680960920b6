//! Grid generator
//!
//! Weighted base fill followed by scripted feature injection. Steps run in a
//! fixed order and later steps may overwrite earlier columns:
//!
//! 1. Base fill from the normal or free-spin weight table
//! 2. Third-column softening
//! 3. Jackpot screen (all WILD, short-circuits everything else)
//! 4. Mega-match across the mega span
//! 5. Wild stacking per column
//! 6. Plain symbol stacking
//! 7. Scatter shaping (at most one SCATTER per column)

use rand::Rng;
use rc_stage::FeatureType;
use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::grid::Grid;
use crate::symbols::{Symbol, Theme};
use crate::weights::WeightTable;

/// Attempts before scatter injection may land on WILD cells
const SCATTER_WILD_AFTER: u32 = 100;
/// Hard cap on scatter injection attempts
const SCATTER_MAX_ATTEMPTS: u32 = 200;
/// Rerolls when replacing a column-0 wild
const REROLL_ATTEMPTS: u32 = 32;

/// Mega-match candidates, uniformly chosen
const MEGA_SYMBOLS: [Symbol; 5] = [
    Symbol::Grape,
    Symbol::Bell,
    Symbol::Bar,
    Symbol::Cherry,
    Symbol::Seven,
];

/// Mega symbols subject to the cancellation roll
const MEGA_THROTTLED: [Symbol; 3] = [Symbol::Bar, Symbol::Cherry, Symbol::Seven];

/// Scatter-count pity timer. Shifts the scatter tier roll upward once the
/// session has gone `after_spins` paid spins without a bonus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PityConfig {
    pub after_spins: u32,
    pub boost_per_spin: f64,
    pub max_boost: f64,
}

impl Default for PityConfig {
    fn default() -> Self {
        Self {
            after_spins: 150,
            boost_per_spin: 0.0005,
            max_boost: 0.15,
        }
    }
}

impl PityConfig {
    pub fn boost(&self, spins_without_bonus: u32) -> f64 {
        let over = spins_without_bonus.saturating_sub(self.after_spins) as f64;
        (over * self.boost_per_spin).clamp(0.0, self.max_boost)
    }
}

/// Feature probabilities and tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub normal_weights: WeightTable,
    pub free_spin_weights: WeightTable,
    pub symbol_stack_weights: WeightTable,

    /// Chance a high symbol on column 2 is swapped for a low one
    pub third_column_softening: f64,
    pub jackpot_chance: f64,
    pub mega_chance: f64,
    pub mega_chance_free_spin: f64,
    pub mega_cancel: f64,
    pub mega_cancel_free_spin: f64,

    /// Wild stack chance on column 0
    pub wild_stack_base: f64,
    /// Added per column index
    pub wild_stack_per_column: f64,
    /// Added on grids with 6+ reels
    pub wild_stack_wide_bonus: f64,
    /// Multiplier for 3-reel grids
    pub wild_stack_small_factor: f64,
    /// Chance a pre-existing WILD on column 0 is rerolled away
    pub first_column_wild_reroll: f64,
    /// Chance of a single injected WILD on column 0
    pub first_column_wild_inject: f64,

    pub symbol_stack_chance_small: f64,
    pub symbol_stack_chance: f64,

    /// Disabled unless set
    pub pity: Option<PityConfig>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            normal_weights: WeightTable::normal(),
            free_spin_weights: WeightTable::free_spin(),
            symbol_stack_weights: WeightTable::symbol_stack(),
            third_column_softening: 0.5,
            jackpot_chance: 0.00001,
            mega_chance: 0.16,
            mega_chance_free_spin: 0.24,
            mega_cancel: 0.85,
            mega_cancel_free_spin: 0.30,
            wild_stack_base: 0.005,
            wild_stack_per_column: 0.01,
            wild_stack_wide_bonus: 0.01,
            wild_stack_small_factor: 0.5,
            first_column_wild_reroll: 0.98,
            first_column_wild_inject: 0.005,
            symbol_stack_chance_small: 0.01,
            symbol_stack_chance: 0.05,
            pity: None,
        }
    }
}

impl GeneratorConfig {
    /// Builder: enable the pity timer
    pub fn with_pity(mut self, pity: PityConfig) -> Self {
        self.pity = Some(pity);
        self
    }

    /// Wild stack chance for a column. Later columns and wider grids stack more.
    pub fn wild_stack_chance(&self, reel: u8, reels: u8) -> f64 {
        let mut chance = self.wild_stack_base + self.wild_stack_per_column * reel as f64;
        if reels >= 6 {
            chance += self.wild_stack_wide_bonus;
        }
        if reels <= 3 {
            chance *= self.wild_stack_small_factor;
        }
        chance.clamp(0.0, 1.0)
    }
}

/// Feature fired while building a grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GridFeature {
    JackpotScreen,
    MegaMatch { symbol: Symbol, reels: Vec<u8> },
    WildStack { reel: u8 },
    WildInjected { reel: u8, row: u8 },
    SymbolStack { reel: u8, symbol: Symbol },
}

impl GridFeature {
    /// Stage taxonomy feature type
    pub fn feature_type(&self) -> FeatureType {
        match self {
            GridFeature::JackpotScreen => FeatureType::JackpotScreen,
            GridFeature::MegaMatch { .. } => FeatureType::MegaMatch,
            GridFeature::WildStack { .. } | GridFeature::WildInjected { .. } => {
                FeatureType::WildStack
            }
            GridFeature::SymbolStack { .. } => FeatureType::SymbolStack,
        }
    }

    /// Reels touched by the feature
    pub fn reels(&self) -> Vec<u8> {
        match self {
            GridFeature::JackpotScreen => Vec::new(),
            GridFeature::MegaMatch { reels, .. } => reels.clone(),
            GridFeature::WildStack { reel }
            | GridFeature::WildInjected { reel, .. }
            | GridFeature::SymbolStack { reel, .. } => vec![*reel],
        }
    }

    pub fn symbol(&self) -> Option<Symbol> {
        match self {
            GridFeature::JackpotScreen
            | GridFeature::WildStack { .. }
            | GridFeature::WildInjected { .. } => Some(Symbol::Wild),
            GridFeature::MegaMatch { symbol, .. } | GridFeature::SymbolStack { symbol, .. } => {
                Some(*symbol)
            }
        }
    }
}

/// Grid plus the features that shaped it
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedGrid {
    pub grid: Grid,
    pub features: Vec<GridFeature>,
    /// Scatter count the shaping step aimed for
    pub scatter_target: u8,
}

impl GeneratedGrid {
    pub fn has_feature(&self, feature_type: FeatureType) -> bool {
        self.features
            .iter()
            .any(|f| f.feature_type() == feature_type)
    }
}

/// Produces one grid per call; holds no per-spin state
#[derive(Debug, Clone, Default)]
pub struct GridGenerator {
    config: GeneratorConfig,
}

impl GridGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        if !config.normal_weights.is_valid() || !config.free_spin_weights.is_valid() {
            log::warn!("Generator weight table is malformed, draws may fall back to TEN");
        }
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate one grid for the game
    pub fn generate<R: Rng + ?Sized>(
        &self,
        game: &GameConfig,
        is_free_spin: bool,
        spins_without_bonus: u32,
        rng: &mut R,
    ) -> GeneratedGrid {
        let cfg = &self.config;
        let reels = game.reels;
        let rows = game.rows;
        let table = if is_free_spin {
            &cfg.free_spin_weights
        } else {
            &cfg.normal_weights
        };

        // 1. Base fill
        let mut grid = Grid::filled(reels, rows, Symbol::Ten);
        for reel in 0..reels {
            for row in 0..rows {
                grid.set(reel, row, table.draw(rng));
            }
        }
        self.dedupe_scatters(&mut grid, table, rng);

        // 2. Third-column softening
        if reels > 2 {
            for row in 0..rows {
                if grid.get(2, row).is_some_and(Symbol::is_high)
                    && rng.random_bool(cfg.third_column_softening.clamp(0.0, 1.0))
                {
                    let low = Symbol::LOW[rng.random_range(0..Symbol::LOW.len())];
                    grid.set(2, row, low);
                }
            }
        }

        // 3. Jackpot screen
        if rng.random::<f64>() < cfg.jackpot_chance {
            log::info!("Jackpot screen on {}", game.id);
            return GeneratedGrid {
                grid: Grid::filled(reels, rows, Symbol::Wild),
                features: vec![GridFeature::JackpotScreen],
                scatter_target: 0,
            };
        }

        let mut features = Vec::new();
        let mut featured = vec![false; reels as usize];

        // 4. Mega-match
        let (mega_chance, mega_cancel) = if is_free_spin {
            (cfg.mega_chance_free_spin, cfg.mega_cancel_free_spin)
        } else {
            (cfg.mega_chance, cfg.mega_cancel)
        };
        if rng.random::<f64>() < mega_chance {
            let symbol = MEGA_SYMBOLS[rng.random_range(0..MEGA_SYMBOLS.len())];
            let cancelled = MEGA_THROTTLED.contains(&symbol) && rng.random::<f64>() < mega_cancel;
            if !cancelled {
                let span = mega_span(reels);
                for &reel in &span {
                    grid.paint_column(reel, symbol);
                    featured[reel as usize] = true;
                }
                features.push(GridFeature::MegaMatch {
                    symbol,
                    reels: span,
                });
            }
        }

        // 5. Wild stacking
        for reel in 0..reels {
            if featured[reel as usize] {
                continue;
            }
            if reel == 0 {
                for row in 0..rows {
                    if grid.get(0, row) == Some(Symbol::Wild)
                        && rng.random::<f64>() < cfg.first_column_wild_reroll
                    {
                        let replacement = table.draw_where(rng, REROLL_ATTEMPTS, |s| {
                            s != Symbol::Wild && s != Symbol::Scatter
                        });
                        grid.set(0, row, replacement);
                    }
                }
            }
            if rng.random::<f64>() < cfg.wild_stack_chance(reel, reels) {
                grid.paint_column(reel, Symbol::Wild);
                featured[reel as usize] = true;
                features.push(GridFeature::WildStack { reel });
                continue;
            }
            if reel == 0 && rng.random::<f64>() < cfg.first_column_wild_inject {
                let row = rng.random_range(0..rows);
                grid.set(0, row, Symbol::Wild);
                featured[0] = true;
                features.push(GridFeature::WildInjected { reel: 0, row });
            }
        }

        // 6. Plain symbol stacking
        let stack_chance = if reels <= 3 {
            cfg.symbol_stack_chance_small
        } else {
            cfg.symbol_stack_chance
        };
        for reel in 0..reels {
            if featured[reel as usize] || rng.random::<f64>() >= stack_chance {
                continue;
            }
            let symbol = cfg.symbol_stack_weights.draw(rng);
            grid.paint_column(reel, symbol);
            featured[reel as usize] = true;
            features.push(GridFeature::SymbolStack { reel, symbol });
        }

        // 7. Scatter shaping
        let boost = match (&cfg.pity, is_free_spin) {
            (Some(pity), false) => pity.boost(spins_without_bonus),
            _ => 0.0,
        };
        let scatter_target = scatter_target(game.theme, rng.random::<f64>() + boost).min(reels);
        inject_scatters(&mut grid, scatter_target, rng);

        GeneratedGrid {
            grid,
            features,
            scatter_target,
        }
    }

    /// Custom weight tables may draw SCATTER; keep one per column
    fn dedupe_scatters<R: Rng + ?Sized>(&self, grid: &mut Grid, table: &WeightTable, rng: &mut R) {
        for reel in 0..grid.reels() {
            let mut seen = false;
            for row in 0..grid.rows() {
                if grid.get(reel, row) != Some(Symbol::Scatter) {
                    continue;
                }
                if seen {
                    let replacement =
                        table.draw_where(rng, REROLL_ATTEMPTS, |s| s != Symbol::Scatter);
                    grid.set(reel, row, replacement);
                }
                seen = true;
            }
        }
    }
}

/// Columns 1..=3 on grids wider than three reels, otherwise every column
pub fn mega_span(reels: u8) -> Vec<u8> {
    if reels > 3 {
        (1..=3).collect()
    } else {
        (0..reels).collect()
    }
}

/// Tiered scatter count roll
pub fn scatter_target(theme: Theme, roll: f64) -> u8 {
    match theme {
        Theme::Dragon => match roll {
            r if r < 0.60 => 0,
            r if r < 0.82 => 1,
            r if r < 0.99 => 2,
            r if r < 0.9925 => 3,
            _ => 4,
        },
        _ => match roll {
            r if r < 0.60 => 0,
            r if r < 0.82 => 1,
            r if r < 0.99 => 2,
            r if r < 0.9975 => 3,
            _ => 4,
        },
    }
}

/// Top up scatters to `target`, never two in one column
fn inject_scatters<R: Rng + ?Sized>(grid: &mut Grid, target: u8, rng: &mut R) {
    let mut count = grid.count(Symbol::Scatter);
    let mut attempts = 0;
    while count < target as usize && attempts < SCATTER_MAX_ATTEMPTS {
        attempts += 1;
        let reel = rng.random_range(0..grid.reels());
        let row = rng.random_range(0..grid.rows());
        if grid.column_contains(reel, Symbol::Scatter) {
            continue;
        }
        if grid.get(reel, row) == Some(Symbol::Wild) && attempts <= SCATTER_WILD_AFTER {
            continue;
        }
        grid.set(reel, row, Symbol::Scatter);
        count += 1;
    }
    if count < target as usize {
        log::warn!("Scatter injection gave up at {count}/{target} after {attempts} attempts");
    }
}
