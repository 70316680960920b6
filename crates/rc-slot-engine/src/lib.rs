//! # rc-slot-engine - ReelCraft spin outcome engine
//!
//! Produces the outcome of every spin on a configurable video slot and
//! drives the spin lifecycle around it. Presentation is somebody else's
//! problem: the engine only speaks in [`rc_stage::StageEvent`]s.
//!
//! ## Architecture
//!
//! ```text
//! GameRegistry ──▶ GameConfig ──┬──▶ PaylineSet (pinned per game)
//!                               │
//! GridGenerator ──▶ Grid ───────┼──▶ PaylineEvaluator ──▶ WinResult
//!                               │
//! SpinMachine ◀─────────────────┘
//!     ├── SpinSession / SessionStore (bet, free spins, counters)
//!     ├── Wallet (debit bet, credit payout)
//!     ├── Scheduler (virtual clock, cancellable tasks)
//!     └── Vec<StageEvent> ──▶ presentation / progression
//! ```
//!
//! [`Simulator`] runs the generator and evaluator headless for RTP work.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod generator;
pub mod grid;
pub mod machine;
pub mod paylines;
pub mod scheduler;
pub mod session;
pub mod simulator;
pub mod symbols;
pub mod timing;
pub mod wallet;
pub mod weights;

pub use config::*;
pub use error::*;
pub use evaluator::*;
pub use generator::*;
pub use grid::*;
pub use machine::*;
pub use paylines::*;
pub use scheduler::*;
pub use session::*;
pub use simulator::*;
pub use symbols::*;
pub use timing::*;
pub use wallet::*;
pub use weights::*;
