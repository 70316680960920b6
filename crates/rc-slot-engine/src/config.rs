//! Game configuration - per-game descriptors and the registry that loads them
//!
//! A [`GameConfig`] is immutable once selected: grid dimensions, theme,
//! scatter threshold and pay values for the whole game session.
//! The [`GameRegistry`] holds the built-in catalogue plus anything loaded
//! from YAML/JSON documents, validated against [`GameLimits`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::symbols::{PayTable, Symbol, Theme};

/// Smallest scatter count the free-spin award table pays for
pub const MIN_SCATTERS_TO_TRIGGER: u8 = 3;

/// Immutable per-game descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Stable identifier, also the session-store key
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub theme: Theme,
    pub reels: u8,
    pub rows: u8,
    /// Scatters anywhere on the grid needed to award free spins
    #[serde(default = "default_scatters_to_trigger")]
    pub scatters_to_trigger: u8,
    /// Per-symbol pay value overrides on top of the theme table
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub symbol_values: BTreeMap<Symbol, f64>,
}

fn default_scatters_to_trigger() -> u8 {
    3
}

impl GameConfig {
    pub fn new(id: impl Into<String>, theme: Theme, reels: u8, rows: u8) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            theme,
            reels,
            rows,
            scatters_to_trigger: default_scatters_to_trigger(),
            symbol_values: BTreeMap::new(),
        }
    }

    /// Builder: set display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder: set scatter threshold
    pub fn with_scatters_to_trigger(mut self, count: u8) -> Self {
        self.scatters_to_trigger = count;
        self
    }

    /// Builder: override one symbol value
    pub fn with_symbol_value(mut self, symbol: Symbol, value: f64) -> Self {
        self.symbol_values.insert(symbol, value);
        self
    }

    /// Resolved pay values for this game
    pub fn paytable(&self) -> PayTable {
        PayTable::with_overrides(self.theme, &self.symbol_values)
    }

    pub fn cell_count(&self) -> usize {
        self.reels as usize * self.rows as usize
    }

    /// Three-reel games pay length-3 lines at full value
    pub fn is_three_reel(&self) -> bool {
        self.reels == 3
    }

    // ═══════════════════════════════════════════════════════════════════════
    // BUILT-IN CATALOGUE
    // ═══════════════════════════════════════════════════════════════════════

    pub fn classic_fruits() -> Self {
        Self::new("classic_fruits", Theme::Classic, 5, 3).with_name("Classic Fruits")
    }

    pub fn lucky_three() -> Self {
        Self::new("lucky_three", Theme::Classic, 3, 3).with_name("Lucky Three")
    }

    pub fn dragon_hoard() -> Self {
        Self::new("dragon_hoard", Theme::Dragon, 5, 3).with_name("Dragon Hoard")
    }

    pub fn jungle_wide() -> Self {
        Self::new("jungle_wide", Theme::Jungle, 6, 4)
            .with_name("Jungle Wide")
            .with_scatters_to_trigger(4)
    }

    pub fn pharaoh_gold() -> Self {
        Self::new("pharaoh_gold", Theme::Pharaoh, 5, 4).with_name("Pharaoh Gold")
    }

    pub fn builtin() -> Vec<Self> {
        vec![
            Self::classic_fruits(),
            Self::lucky_three(),
            Self::dragon_hoard(),
            Self::jungle_wide(),
            Self::pharaoh_gold(),
        ]
    }
}

/// Validation limits for loaded game documents
#[derive(Debug, Clone)]
pub struct GameLimits {
    pub min_reels: u8,
    pub max_reels: u8,
    pub min_rows: u8,
    pub max_rows: u8,
    pub max_id_length: usize,
    pub max_games: usize,
    pub max_pay_value: f64,
    pub max_input_bytes: usize,
}

impl Default for GameLimits {
    fn default() -> Self {
        Self {
            min_reels: 3,
            max_reels: 8,
            min_rows: 3,
            max_rows: 6,
            max_id_length: 64,
            max_games: 256,
            max_pay_value: 10_000.0,
            max_input_bytes: 1024 * 1024,
        }
    }
}

impl GameLimits {
    /// Validate one game descriptor
    pub fn validate(&self, game: &GameConfig) -> ConfigResult<()> {
        if game.id.trim().is_empty() {
            return Err(ConfigError::Validation("Game id must not be empty".into()));
        }
        if game.id.len() > self.max_id_length {
            return Err(ConfigError::Validation(format!(
                "Game id too long: {} > {}",
                game.id.len(),
                self.max_id_length
            )));
        }
        if !(self.min_reels..=self.max_reels).contains(&game.reels) {
            return Err(ConfigError::Validation(format!(
                "{}: reels {} outside {}..={}",
                game.id, game.reels, self.min_reels, self.max_reels
            )));
        }
        if !(self.min_rows..=self.max_rows).contains(&game.rows) {
            return Err(ConfigError::Validation(format!(
                "{}: rows {} outside {}..={}",
                game.id, game.rows, self.min_rows, self.max_rows
            )));
        }
        if game.scatters_to_trigger < MIN_SCATTERS_TO_TRIGGER
            || game.scatters_to_trigger > game.reels
        {
            return Err(ConfigError::Validation(format!(
                "{}: scatters_to_trigger {} must be within {}..={}",
                game.id, game.scatters_to_trigger, MIN_SCATTERS_TO_TRIGGER, game.reels
            )));
        }
        for (symbol, value) in &game.symbol_values {
            if !value.is_finite() || *value < 0.0 || *value > self.max_pay_value {
                return Err(ConfigError::Validation(format!(
                    "{}: invalid value {} for {}",
                    game.id, value, symbol
                )));
            }
        }
        Ok(())
    }
}

/// Document shape accepted by the registry loaders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameDocument {
    pub games: Vec<GameConfig>,
}

/// Catalogue of selectable games
#[derive(Debug, Clone)]
pub struct GameRegistry {
    games: BTreeMap<String, GameConfig>,
    limits: GameLimits,
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GameRegistry {
    /// Empty registry with default limits
    pub fn new() -> Self {
        Self::with_limits(GameLimits::default())
    }

    pub fn with_limits(limits: GameLimits) -> Self {
        Self {
            games: BTreeMap::new(),
            limits,
        }
    }

    /// Registry pre-loaded with the built-in catalogue
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for game in GameConfig::builtin() {
            registry.games.insert(game.id.clone(), game);
        }
        registry
    }

    /// Validate and add a game. Ids are unique.
    pub fn register(&mut self, game: GameConfig) -> ConfigResult<()> {
        self.limits.validate(&game)?;
        if self.games.contains_key(&game.id) {
            return Err(ConfigError::DuplicateGame(game.id));
        }
        if self.games.len() >= self.limits.max_games {
            return Err(ConfigError::Validation(format!(
                "Too many games: max {}",
                self.limits.max_games
            )));
        }
        log::debug!("Registered game {} ({}x{})", game.id, game.reels, game.rows);
        self.games.insert(game.id.clone(), game);
        Ok(())
    }

    /// Parse a YAML document (`games: [...]`) and register every game
    pub fn load_yaml_str(&mut self, yaml: &str) -> ConfigResult<usize> {
        self.check_size(yaml)?;
        let doc: GameDocument =
            serde_yml::from_str(yaml).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        self.load_document(doc)
    }

    /// Parse a JSON document (`{"games": [...]}`) and register every game
    pub fn load_json_str(&mut self, json: &str) -> ConfigResult<usize> {
        self.check_size(json)?;
        let doc: GameDocument = serde_json::from_str(json)?;
        self.load_document(doc)
    }

    /// Load a file, picking the format from its extension
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<usize> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => self.load_yaml_str(&text),
            Some("json") => self.load_json_str(&text),
            other => Err(ConfigError::Validation(format!(
                "Unsupported config extension: {other:?}"
            ))),
        }
    }

    /// Fresh registry from a YAML document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let mut registry = Self::new();
        registry.load_yaml_str(yaml)?;
        Ok(registry)
    }

    /// Fresh registry from a JSON document
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let mut registry = Self::new();
        registry.load_json_str(json)?;
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> ConfigResult<&GameConfig> {
        self.games
            .get(id)
            .ok_or_else(|| ConfigError::UnknownGame(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.games.keys().map(String::as_str)
    }

    pub fn games(&self) -> impl Iterator<Item = &GameConfig> {
        self.games.values()
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Serialize the catalogue back to YAML
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let doc = GameDocument {
            games: self.games.values().cloned().collect(),
        };
        serde_yml::to_string(&doc).map_err(|e| ConfigError::Yaml(e.to_string()))
    }

    fn check_size(&self, input: &str) -> ConfigResult<()> {
        if input.len() > self.limits.max_input_bytes {
            return Err(ConfigError::InputTooLarge {
                size: input.len(),
                max: self.limits.max_input_bytes,
            });
        }
        Ok(())
    }

    fn load_document(&mut self, doc: GameDocument) -> ConfigResult<usize> {
        // Validate everything first so a bad entry leaves the registry untouched
        let mut ids = std::collections::BTreeSet::new();
        for game in &doc.games {
            self.limits.validate(game)?;
            if self.games.contains_key(&game.id) || !ids.insert(game.id.as_str()) {
                return Err(ConfigError::DuplicateGame(game.id.clone()));
            }
        }
        if self.games.len() + doc.games.len() > self.limits.max_games {
            return Err(ConfigError::Validation(format!(
                "Too many games: max {}",
                self.limits.max_games
            )));
        }
        let count = doc.games.len();
        for game in doc.games {
            self.register(game)?;
        }
        log::info!("Loaded {} game configuration(s)", count);
        Ok(count)
    }
}
