//! Symbol definitions and themed pay values

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Symbol type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SymbolType {
    /// Letter symbols (TEN..ACE)
    Low = 0,
    /// Fruit-machine symbols (GRAPE..SEVEN)
    High = 1,
    /// Substitutes for everything except scatter
    Wild = 2,
    /// Triggers free spins regardless of position
    Scatter = 3,
}

/// One of the twelve reel symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Symbol {
    Ten,
    Jack,
    Queen,
    King,
    Ace,
    Grape,
    Bell,
    Bar,
    Cherry,
    Seven,
    Wild,
    Scatter,
}

impl Symbol {
    pub const ALL: [Symbol; 12] = [
        Symbol::Ten,
        Symbol::Jack,
        Symbol::Queen,
        Symbol::King,
        Symbol::Ace,
        Symbol::Grape,
        Symbol::Bell,
        Symbol::Bar,
        Symbol::Cherry,
        Symbol::Seven,
        Symbol::Wild,
        Symbol::Scatter,
    ];

    /// Low-pay letters
    pub const LOW: [Symbol; 5] = [
        Symbol::Ten,
        Symbol::Jack,
        Symbol::Queen,
        Symbol::King,
        Symbol::Ace,
    ];

    /// Mid/high-pay fruit symbols
    pub const HIGH: [Symbol; 5] = [
        Symbol::Grape,
        Symbol::Bell,
        Symbol::Bar,
        Symbol::Cherry,
        Symbol::Seven,
    ];

    /// Stable numeric id used in stage events (1-based)
    pub fn id(self) -> u32 {
        self as u32 + 1
    }

    /// Inverse of [`Symbol::id`]
    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.get(id.checked_sub(1)? as usize).copied()
    }

    pub fn symbol_type(self) -> SymbolType {
        match self {
            Symbol::Wild => SymbolType::Wild,
            Symbol::Scatter => SymbolType::Scatter,
            s if Self::HIGH.contains(&s) => SymbolType::High,
            _ => SymbolType::Low,
        }
    }

    pub fn is_low(self) -> bool {
        self.symbol_type() == SymbolType::Low
    }

    pub fn is_high(self) -> bool {
        self.symbol_type() == SymbolType::High
    }

    pub fn name(self) -> &'static str {
        match self {
            Symbol::Ten => "TEN",
            Symbol::Jack => "JACK",
            Symbol::Queen => "QUEEN",
            Symbol::King => "KING",
            Symbol::Ace => "ACE",
            Symbol::Grape => "GRAPE",
            Symbol::Bell => "BELL",
            Symbol::Bar => "BAR",
            Symbol::Cherry => "CHERRY",
            Symbol::Seven => "SEVEN",
            Symbol::Wild => "WILD",
            Symbol::Scatter => "SCATTER",
        }
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Visual theme of a game. Drives pay values and a few generator rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Theme {
    #[default]
    Classic,
    Dragon,
    Jungle,
    Pharaoh,
}

impl Theme {
    /// Built-in pay value (multiplier unit) of a symbol for this theme.
    /// SCATTER never pays through paylines.
    pub fn pay_value(self, symbol: Symbol) -> f64 {
        let classic = match symbol {
            Symbol::Ten => 0.5,
            Symbol::Jack => 0.625,
            Symbol::Queen => 0.75,
            Symbol::King => 1.0,
            Symbol::Ace => 1.25,
            Symbol::Grape => 2.5,
            Symbol::Bell => 3.75,
            Symbol::Bar => 5.0,
            Symbol::Cherry => 7.5,
            Symbol::Seven => 15.625,
            Symbol::Wild => 25.0,
            Symbol::Scatter => 0.0,
        };
        match (self, symbol) {
            (_, Symbol::Scatter) => 0.0,
            (Theme::Classic, _) => classic,
            (Theme::Dragon, s) if s.is_high() => classic * 1.25,
            (Theme::Dragon, _) => classic,
            (Theme::Jungle, s) if s.is_low() => classic * 1.2,
            (Theme::Jungle, _) => classic,
            (Theme::Pharaoh, Symbol::Seven | Symbol::Wild) => classic * 1.5,
            (Theme::Pharaoh, _) => classic * 0.9,
        }
    }
}

/// Resolved symbol values for one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayTable {
    pub theme: Theme,
    values: BTreeMap<Symbol, f64>,
}

impl PayTable {
    /// Theme defaults
    pub fn for_theme(theme: Theme) -> Self {
        let values = Symbol::ALL
            .iter()
            .map(|&s| (s, theme.pay_value(s)))
            .collect();
        Self { theme, values }
    }

    /// Theme defaults with per-symbol overrides. Scatter stays at zero.
    pub fn with_overrides(theme: Theme, overrides: &BTreeMap<Symbol, f64>) -> Self {
        let mut table = Self::for_theme(theme);
        for (&symbol, &value) in overrides {
            if symbol != Symbol::Scatter {
                table.values.insert(symbol, value.max(0.0));
            }
        }
        table
    }

    pub fn value(&self, symbol: Symbol) -> f64 {
        self.values.get(&symbol).copied().unwrap_or(0.0)
    }
}
