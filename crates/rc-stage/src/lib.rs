//! # rc-stage - ReelCraft Stage System
//!
//! Defines the canonical spin lifecycle stages emitted by the spin engine.
//! Presentation, progression and wallet collaborators never look inside the
//! engine - they only react to STAGES.
//!
//! ## Philosophy
//!
//! Every spin passes through the same semantic phases:
//! - Spin starts → Grid published → Reels stop → Wins evaluated → Features awarded
//!
//! This crate defines those stages, the event envelope that carries them and a
//! trace recorder used for validation and replay.

pub mod event;
pub mod stage;
pub mod taxonomy;
pub mod trace;

pub use event::*;
pub use stage::*;
pub use taxonomy::*;
pub use trace::*;
