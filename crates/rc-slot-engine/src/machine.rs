//! Spin state machine
//!
//! Orchestrates one spin from request to idle:
//!
//! ```text
//! IDLE ──request──▶ SPINNING ──timer──▶ STOPPING ──last reel──▶ evaluate
//!   ▲                                                             │
//!   │        ┌──── scatter trigger ──▶ SCATTER_SHOWCASE ─▶ popup ─┤
//!   │        ▼                                                    │
//!   └──── WIN_ANIMATION (tier popup / timer) ◀── payout > 0 ◀─────┘
//! ```
//!
//! Time only moves through [`SpinMachine::advance`]. Every scheduled task
//! carries the spin id it belongs to and is dropped if that spin is no
//! longer current. Everything the outside world needs to know is emitted as
//! a [`StageEvent`] and collected with [`SpinMachine::drain_events`].

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rc_stage::{FeatureType, Stage, StageEvent, StagePayload, StageTrace, WinTier};
use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::error::{SpinError, SpinResult};
use crate::evaluator::{PaylineEvaluator, WinResult};
use crate::generator::{GeneratedGrid, GeneratorConfig, GridGenerator};
use crate::grid::Grid;
use crate::paylines::PaylineSet;
use crate::scheduler::{Scheduler, TaskHandle};
use crate::session::{free_spins_for_scatters, FreeSpinSummary, SessionStore, SpinSession};
use crate::symbols::Symbol;
use crate::timing::TimingConfig;
use crate::wallet::{InMemoryWallet, Wallet};

/// Tag on events emitted while a free spin is in play
pub const TAG_FREE_SPIN: &str = "free_spin";
/// Tag on events emitted while autoplay is on
pub const TAG_AUTOPLAY: &str = "autoplay";
/// Tag on events emitted in fast mode
pub const TAG_FAST: &str = "fast";

/// Machine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpinState {
    #[default]
    Idle,
    Spinning,
    Stopping,
    WinAnimation,
    ScatterShowcase,
    /// Representable, never entered
    FreeSpinIntro,
    /// Representable, never entered
    FreeSpinOutro,
}

impl SpinState {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Spinning => "SPINNING",
            Self::Stopping => "STOPPING",
            Self::WinAnimation => "WIN_ANIMATION",
            Self::ScatterShowcase => "SCATTER_SHOWCASE",
            Self::FreeSpinIntro => "FREE_SPIN_INTRO",
            Self::FreeSpinOutro => "FREE_SPIN_OUTRO",
        }
    }
}

/// Machine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Bet for sessions created on first game selection
    pub default_bet: u64,
    /// Below this balance a refused spin becomes a bankruptcy rescue
    pub bankruptcy_threshold: u64,
    /// Fraction of every paid bet accrued into the piggy bank
    pub piggy_bank_rate: f64,
    pub timing: TimingConfig,
    pub fast_timing: TimingConfig,
    /// Schedule reel-stop signals internally instead of waiting for a renderer
    pub self_stop_reels: bool,
    /// Completed spin traces kept in memory (0 disables recording)
    pub trace_history: usize,
    /// Undrained events kept in the outbox; the oldest are dropped beyond this
    pub outbox_capacity: usize,
    pub generator: GeneratorConfig,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            default_bet: 100,
            bankruptcy_threshold: 50,
            piggy_bank_rate: 0.015,
            timing: TimingConfig::normal(),
            fast_timing: TimingConfig::turbo(),
            self_stop_reels: false,
            trace_history: 16,
            outbox_capacity: 4096,
            generator: GeneratorConfig::default(),
        }
    }
}

impl MachineConfig {
    /// Self-stopping reels with zero delays, for batch runs and tests
    pub fn headless() -> Self {
        Self {
            timing: TimingConfig::instant(),
            fast_timing: TimingConfig::instant(),
            self_stop_reels: true,
            trace_history: 0,
            ..Default::default()
        }
    }

    /// Builder: self-stopping reels
    pub fn with_self_stop(mut self, enabled: bool) -> Self {
        self.self_stop_reels = enabled;
        self
    }

    /// Builder: set generator config
    pub fn with_generator(mut self, generator: GeneratorConfig) -> Self {
        self.generator = generator;
        self
    }
}

/// What a reel-stop signal did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReelStopOutcome {
    /// Counted; this many reels still spinning
    Counted { remaining: u8 },
    /// Last reel: the spin was evaluated
    Evaluated,
    /// Reel already reported
    Duplicate,
    /// Not the current spin, or reels are not stopping
    Stale,
}

/// Why an automatic spin was scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSpinKind {
    FreeSpin,
    Autoplay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MachineTask {
    BeginStopping { spin_id: u64 },
    StopReel { spin_id: u64, reel: u8 },
    RevealFreeSpins { spin_id: u64 },
    ReturnToIdle { spin_id: u64 },
    AutoSpin { after_spin: u64, kind: AutoSpinKind },
}

#[derive(Debug, Clone)]
struct ActiveSpin {
    id: u64,
    bet: u64,
    is_free_spin: bool,
    grid: Grid,
    stopped: Vec<bool>,
    stop_count: u8,
    evaluated: bool,
    awarded_free_spins: u32,
}

#[derive(Debug, Clone, Default)]
struct Popups {
    free_spin_award: bool,
    win: bool,
    summary: Option<FreeSpinSummary>,
}

impl Popups {
    fn any(&self) -> bool {
        self.free_spin_award || self.win || self.summary.is_some()
    }
}

/// The spin orchestration state machine
pub struct SpinMachine<W: Wallet = InMemoryWallet, R: RngCore = StdRng> {
    config: MachineConfig,
    game: GameConfig,
    paylines: Arc<PaylineSet>,
    generator: GridGenerator,
    evaluator: PaylineEvaluator,
    sessions: Arc<SessionStore>,
    session: SpinSession,
    wallet: W,
    rng: R,
    scheduler: Scheduler<MachineTask>,
    state: SpinState,
    spin_counter: u64,
    active: Option<ActiveSpin>,
    last_grid: Option<Grid>,
    last_result: Option<WinResult>,
    popups: Popups,
    modal_open: bool,
    fast_mode: bool,
    autoplay: bool,
    pending_auto: Option<(TaskHandle, AutoSpinKind)>,
    scripted: VecDeque<Grid>,
    outbox: VecDeque<StageEvent>,
    dropped_events: u64,
    current_trace: Option<StageTrace>,
    traces: VecDeque<StageTrace>,
}

impl SpinMachine<InMemoryWallet, StdRng> {
    /// Machine with an in-memory wallet and a seeded RNG
    pub fn seeded(game: GameConfig, config: MachineConfig, balance: u64, seed: u64) -> Self {
        Self::new(
            game,
            config,
            InMemoryWallet::new(balance),
            StdRng::seed_from_u64(seed),
        )
    }
}

impl<W: Wallet, R: RngCore> SpinMachine<W, R> {
    pub fn new(game: GameConfig, config: MachineConfig, wallet: W, rng: R) -> Self {
        Self::with_sessions(game, config, wallet, rng, Arc::new(SessionStore::new()))
    }

    /// Machine sharing an existing session store
    pub fn with_sessions(
        game: GameConfig,
        config: MachineConfig,
        wallet: W,
        rng: R,
        sessions: Arc<SessionStore>,
    ) -> Self {
        let paylines = PaylineSet::for_game(&game);
        let evaluator = PaylineEvaluator::for_game(&game, paylines.clone());
        let generator = GridGenerator::new(config.generator.clone());
        let session = sessions.load_or_create(&game.id, config.default_bet);
        log::info!(
            "Spin machine ready: {} ({}x{}, {} paylines)",
            game.id,
            game.reels,
            game.rows,
            paylines.len()
        );

        let mut machine = Self {
            config,
            game,
            paylines,
            generator,
            evaluator,
            sessions,
            session,
            wallet,
            rng,
            scheduler: Scheduler::new(),
            state: SpinState::Idle,
            spin_counter: 0,
            active: None,
            last_grid: None,
            last_result: None,
            popups: Popups::default(),
            modal_open: false,
            fast_mode: false,
            autoplay: false,
            pending_auto: None,
            scripted: VecDeque::new(),
            outbox: VecDeque::new(),
            dropped_events: 0,
            current_trace: None,
            traces: VecDeque::new(),
        };
        // A restored session may still hold free spins
        machine.schedule_auto_continuation();
        machine
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn state(&self) -> SpinState {
        self.state
    }

    pub fn game(&self) -> &GameConfig {
        &self.game
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn session(&self) -> &SpinSession {
        &self.session
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn wallet_mut(&mut self) -> &mut W {
        &mut self.wallet
    }

    /// Payline set shared with the evaluator
    pub fn paylines(&self) -> Arc<PaylineSet> {
        self.paylines.clone()
    }

    /// Grid of the spin in flight, else the last finished one
    pub fn current_grid(&self) -> Option<&Grid> {
        self.active
            .as_ref()
            .map(|a| &a.grid)
            .or(self.last_grid.as_ref())
    }

    pub fn last_result(&self) -> Option<&WinResult> {
        self.last_result.as_ref()
    }

    pub fn current_spin_id(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn spin_count(&self) -> u64 {
        self.spin_counter
    }

    pub fn now_ms(&self) -> u64 {
        self.scheduler.now_ms()
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn is_fast_mode(&self) -> bool {
        self.fast_mode
    }

    pub fn is_autoplay(&self) -> bool {
        self.autoplay
    }

    /// A modal or popup blocks new spins
    pub fn is_blocked(&self) -> bool {
        self.modal_open || self.popups.any()
    }

    pub fn has_free_spin_popup(&self) -> bool {
        self.popups.free_spin_award
    }

    pub fn has_win_popup(&self) -> bool {
        self.popups.win
    }

    pub fn has_summary_popup(&self) -> bool {
        self.popups.summary.is_some()
    }

    /// Take all emitted events. Undrained events beyond
    /// [`MachineConfig::outbox_capacity`] are dropped oldest first.
    pub fn drain_events(&mut self) -> Vec<StageEvent> {
        self.dropped_events = 0;
        self.outbox.drain(..).collect()
    }

    /// Events dropped from a full outbox since the last drain
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    /// Recorded traces of finished spins, oldest first
    pub fn traces(&self) -> impl Iterator<Item = &StageTrace> {
        self.traces.iter()
    }

    pub fn last_trace(&self) -> Option<&StageTrace> {
        self.traces.back()
    }

    fn timing(&self) -> TimingConfig {
        if self.fast_mode {
            self.config.fast_timing.clone()
        } else {
            self.config.timing.clone()
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CONTROLS
    // ═══════════════════════════════════════════════════════════════════════

    /// Change the bet. Idle only, not during a free-spin session.
    pub fn set_bet(&mut self, bet: u64) -> SpinResult<()> {
        if self.state != SpinState::Idle {
            return Err(SpinError::Busy { state: self.state });
        }
        if bet == 0 || self.session.free_spin_session_active {
            return Err(SpinError::InvalidBet { bet });
        }
        self.session.bet = bet;
        Ok(())
    }

    /// Shorter delays; never skips evaluation
    pub fn set_fast_mode(&mut self, enabled: bool) {
        self.fast_mode = enabled;
    }

    pub fn set_autoplay(&mut self, enabled: bool) {
        if self.autoplay == enabled {
            return;
        }
        self.autoplay = enabled;
        if enabled {
            self.emit(Stage::AutoplayStart);
            self.schedule_auto_continuation();
        } else {
            self.stop_autoplay(None);
        }
    }

    /// External modal (shop, settings, rescue offer) opened or closed
    pub fn set_modal_open(&mut self, open: bool) {
        self.modal_open = open;
        if open {
            self.cancel_pending_auto();
        } else {
            self.schedule_auto_continuation();
        }
    }

    /// Queue a grid to be used instead of the generator for the next spin
    pub fn force_next_grid(&mut self, grid: Grid) -> SpinResult<()> {
        if grid.reels() != self.game.reels || grid.rows() != self.game.rows {
            return Err(SpinError::GridMismatch {
                expected_reels: self.game.reels,
                expected_rows: self.game.rows,
                reels: grid.reels(),
                rows: grid.rows(),
            });
        }
        self.scripted.push_back(grid);
        Ok(())
    }

    /// Switch games. The current session is stored and the new game's
    /// session is restored or created.
    pub fn select_game(&mut self, game: GameConfig) -> SpinResult<()> {
        if self.state != SpinState::Idle {
            return Err(SpinError::Busy { state: self.state });
        }
        if self.is_blocked() {
            return Err(SpinError::Blocked);
        }

        self.sessions.save(&self.session);
        let dropped = self.scheduler.cancel_all();
        self.pending_auto = None;
        self.scripted.clear();

        self.paylines = PaylineSet::for_game(&game);
        self.evaluator = PaylineEvaluator::for_game(&game, self.paylines.clone());
        self.session = self
            .sessions
            .load_or_create(&game.id, self.config.default_bet);
        self.game = game;
        self.last_grid = None;
        self.last_result = None;

        log::info!(
            "Selected game {} (dropped {} pending task(s), {} free spin(s) restored)",
            self.game.id,
            dropped,
            self.session.free_spins_remaining
        );
        self.emit(Stage::GameSelected {
            game_id: self.game.id.clone(),
        });
        self.schedule_auto_continuation();
        Ok(())
    }

    /// Persist the live session into the store
    pub fn save_session(&self) {
        self.sessions.save(&self.session);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SPIN LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════

    /// Request a spin. On success returns the new spin id.
    /// A refused request changes nothing except switching autoplay off.
    pub fn request_spin(&mut self) -> SpinResult<u64> {
        if self.state != SpinState::Idle {
            return Err(SpinError::Busy { state: self.state });
        }
        if self.is_blocked() {
            return Err(SpinError::Blocked);
        }
        self.start_spin()
    }

    fn start_spin(&mut self) -> SpinResult<u64> {
        let is_free_spin = self.session.has_free_spins();
        let bet = self.session.bet;

        if !is_free_spin {
            let balance = self.wallet.balance();
            if balance < bet {
                return Err(self.refuse_for_funds(balance, bet));
            }
            self.wallet.debit(bet)?;
        }

        // Everything below is infallible
        self.cancel_pending_auto();
        let step = if is_free_spin {
            self.session.consume_free_spin()
        } else {
            self.session
                .record_paid_spin(bet, self.config.piggy_bank_rate);
            None
        };

        let generated = match self.scripted.pop_front() {
            Some(grid) => GeneratedGrid {
                scatter_target: grid.count(Symbol::Scatter) as u8,
                grid,
                features: Vec::new(),
            },
            None => self.generator.generate(
                &self.game,
                is_free_spin,
                self.session.spins_without_bonus,
                &mut self.rng,
            ),
        };

        self.spin_counter += 1;
        let spin_id = self.spin_counter;
        let reels = generated.grid.reels();
        self.active = Some(ActiveSpin {
            id: spin_id,
            bet,
            is_free_spin,
            grid: generated.grid,
            stopped: vec![false; reels as usize],
            stop_count: 0,
            evaluated: false,
            awarded_free_spins: 0,
        });
        self.last_result = None;
        self.state = SpinState::Spinning;

        log::debug!(
            "Spin {spin_id} started (bet {bet}, free spin: {is_free_spin}, reels settle in {}ms)",
            self.timing().total_spin_duration(reels)
        );
        let balance = self.wallet.balance();
        self.emit_with(
            Stage::SpinStart {
                spin_id,
                is_free_spin,
                bet,
            },
            StagePayload::new().balance(balance),
        );
        if let Some(step_index) = step {
            self.emit_with(
                Stage::FeatureStep {
                    step_index,
                    steps_remaining: Some(self.session.free_spins_remaining),
                },
                StagePayload::new().spins_remaining(self.session.free_spins_remaining),
            );
        }
        for feature in &generated.features {
            self.outbox_feature(feature.feature_type(), feature.reels(), feature.symbol());
        }

        let delay = self.timing().spin_duration_ms;
        self.scheduler
            .schedule(delay, MachineTask::BeginStopping { spin_id });
        Ok(spin_id)
    }

    fn outbox_feature(&mut self, feature_type: FeatureType, reels: Vec<u8>, symbol: Option<Symbol>) {
        self.emit(Stage::GridFeature {
            feature_type,
            reels,
            symbol_id: symbol.map(Symbol::id),
        });
    }

    fn refuse_for_funds(&mut self, balance: u64, bet: u64) -> SpinError {
        if self.autoplay {
            self.autoplay = false;
            self.stop_autoplay(Some("insufficient funds"));
        }
        if balance < self.config.bankruptcy_threshold {
            log::info!("Spin refused: balance {balance} below rescue threshold");
            self.emit_with(
                Stage::BankruptcyRescue { balance },
                StagePayload::new().balance(balance),
            );
            SpinError::Bankruptcy { balance }
        } else {
            log::info!("Spin refused: balance {balance} below bet {bet}");
            self.emit_with(
                Stage::InsufficientFunds { balance, bet },
                StagePayload::new().balance(balance),
            );
            SpinError::InsufficientFunds { balance, bet }
        }
    }

    fn begin_stopping(&mut self, spin_id: u64) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        if active.id != spin_id || self.state != SpinState::Spinning {
            return;
        }
        let grid = active.grid.to_ids();
        let reels = active.grid.reels();
        self.state = SpinState::Stopping;
        self.emit(Stage::GridPublished { spin_id, grid });

        let timing = self.timing();
        for reel in 0..reels {
            let delay = timing.reel_stop_delay(reel);
            self.emit(Stage::ReelStopScheduled {
                reel_index: reel,
                delay_ms: delay as f64,
            });
            if self.config.self_stop_reels {
                self.scheduler
                    .schedule(delay, MachineTask::StopReel { spin_id, reel });
            }
        }
    }

    /// Reel-stop signal from the renderer. Evaluation runs exactly once,
    /// when the last distinct reel of the current spin reports in.
    pub fn reel_stopped(&mut self, spin_id: u64, reel: u8) -> SpinResult<ReelStopOutcome> {
        let stopping = self.state == SpinState::Stopping;
        let Some(active) = self.active.as_mut() else {
            return Ok(ReelStopOutcome::Stale);
        };
        if active.id != spin_id {
            return Ok(ReelStopOutcome::Stale);
        }
        let reels = active.grid.reels();
        if reel >= reels {
            return Err(SpinError::InvalidReel { reel, reels });
        }
        if active.evaluated || active.stopped[reel as usize] {
            return Ok(ReelStopOutcome::Duplicate);
        }
        if !stopping {
            return Ok(ReelStopOutcome::Stale);
        }

        active.stopped[reel as usize] = true;
        active.stop_count += 1;
        let remaining = reels - active.stop_count;
        let symbols = active.grid.column(reel).iter().map(|s| s.id()).collect();
        self.emit(Stage::ReelStop {
            reel_index: reel,
            symbols,
        });

        if remaining > 0 {
            return Ok(ReelStopOutcome::Counted { remaining });
        }
        self.finish_spin();
        Ok(ReelStopOutcome::Evaluated)
    }

    fn finish_spin(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.evaluated = true;
        let (spin_id, bet, is_free_spin) = (active.id, active.bet, active.is_free_spin);
        let result = self.evaluator.evaluate(&active.grid, bet);

        self.emit(Stage::EvaluateWins);
        if result.payout > 0 {
            let balance = self.wallet.credit(result.payout);
            self.emit_with(
                Stage::BalanceCredited {
                    amount: result.payout,
                    balance,
                },
                StagePayload::new().balance(balance),
            );
        }
        if is_free_spin {
            self.session.record_free_spin_win(result.payout);
        }
        self.emit_with(
            Stage::WinEvaluated {
                win_amount: result.payout,
                is_big_win: result.tier.is_some(),
                tier: result.tier,
                scatter_count: result.scatter_count,
            },
            StagePayload::with_win(result.payout, bet).win_lines(result.win_lines()),
        );
        log::debug!(
            "Spin {spin_id} evaluated: payout {}, {} line(s), {} scatter(s)",
            result.payout,
            result.line_wins.len(),
            result.scatter_count
        );

        let scatter_count = result.scatter_count;
        let scatter_cells = result.scatter_cells.clone();
        self.last_result = Some(result);

        if scatter_count >= self.game.scatters_to_trigger {
            let awarded = free_spins_for_scatters(scatter_count);
            if awarded > 0 {
                if let Some(active) = self.active.as_mut() {
                    active.awarded_free_spins = awarded;
                }
                let fresh = self.session.award_free_spins(awarded);
                if fresh {
                    log::info!("Free spins triggered: {awarded} ({scatter_count} scatters)");
                    self.state = SpinState::ScatterShowcase;
                    self.emit(Stage::ScatterShowcase {
                        scatter_count,
                        cells: scatter_cells,
                    });
                    let delay = self.timing().scatter_showcase_ms;
                    self.scheduler
                        .schedule(delay, MachineTask::RevealFreeSpins { spin_id });
                    return;
                }
                log::info!("Free spins retriggered: +{awarded}");
                self.emit_with(
                    Stage::FreeSpinsAwarded {
                        awarded,
                        remaining: self.session.free_spins_remaining,
                        retrigger: true,
                    },
                    StagePayload::new().spins_remaining(self.session.free_spins_remaining),
                );
            }
        }

        self.enter_result_branch(spin_id);
    }

    fn reveal_free_spins(&mut self, spin_id: u64) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        if active.id != spin_id || self.state != SpinState::ScatterShowcase {
            return;
        }
        let awarded = active.awarded_free_spins;
        let remaining = self.session.free_spins_remaining;
        self.popups.free_spin_award = true;
        self.emit_with(
            Stage::FreeSpinsAwarded {
                awarded,
                remaining,
                retrigger: false,
            },
            StagePayload::new().spins_remaining(remaining),
        );
        self.emit(Stage::FeatureEnter {
            feature_type: FeatureType::FreeSpins,
            total_steps: Some(remaining),
        });
    }

    /// "Free spins won" popup dismissed
    pub fn close_free_spin_popup(&mut self) -> SpinResult<()> {
        if !self.popups.free_spin_award {
            return Err(SpinError::NoPopup("free spin award"));
        }
        self.popups.free_spin_award = false;
        match self.active.as_ref().map(|a| a.id) {
            Some(spin_id) => self.enter_result_branch(spin_id),
            None => self.enter_idle(),
        }
        Ok(())
    }

    fn enter_result_branch(&mut self, spin_id: u64) {
        let Some(result) = self.last_result.as_ref() else {
            self.enter_idle();
            return;
        };
        let payout = result.payout;
        let tier = result.tier;
        let line_ids = result.winning_line_ids();
        let cells = result.winning_cells.clone();
        let timing = self.timing();

        if payout == 0 {
            self.scheduler
                .schedule(timing.no_win_idle_ms, MachineTask::ReturnToIdle { spin_id });
            return;
        }

        self.state = SpinState::WinAnimation;
        self.emit(Stage::WinPresent {
            win_amount: payout,
            line_ids,
            cells,
        });
        match tier {
            Some(tier) => self.open_win_popup(tier, payout),
            None => {
                self.scheduler
                    .schedule(timing.small_win_hold_ms, MachineTask::ReturnToIdle { spin_id });
            }
        }
    }

    fn open_win_popup(&mut self, tier: WinTier, amount: u64) {
        self.state = SpinState::WinAnimation;
        self.popups.win = true;
        log::info!("{} ({amount})", tier.display_name());
        self.emit(Stage::BigWinTier { tier, amount });
    }

    /// Tier popup finished
    pub fn close_win_popup(&mut self) -> SpinResult<()> {
        if !self.popups.win {
            return Err(SpinError::NoPopup("win tier"));
        }
        self.popups.win = false;
        self.emit(Stage::BigWinEnd);
        self.enter_idle();
        Ok(())
    }

    fn return_to_idle(&mut self, spin_id: u64) {
        if self.current_spin_id() != Some(spin_id) || self.popups.any() {
            return;
        }
        if matches!(
            self.state,
            SpinState::Stopping | SpinState::WinAnimation | SpinState::ScatterShowcase
        ) {
            self.enter_idle();
        }
    }

    fn enter_idle(&mut self) {
        self.state = SpinState::Idle;
        if let Some(active) = self.active.take() {
            self.emit(Stage::SpinEnd { spin_id: active.id });
            self.last_grid = Some(active.grid);
        }
        self.emit(Stage::IdleStart);

        if self.session.free_spin_session_finished() {
            if self.session.free_spin_winnings > 0 {
                let summary = FreeSpinSummary {
                    total_win: self.session.free_spin_winnings,
                    spins_awarded: self.session.total_free_spins_awarded,
                    spins_played: self.session.free_spins_played,
                };
                self.popups.summary = Some(summary);
                self.emit(Stage::FreeSpinSummary {
                    total_win: summary.total_win,
                    spins_awarded: summary.spins_awarded,
                });
                return;
            }
            self.session.end_free_spin_session();
            log::info!("Free spins finished without winnings");
            self.emit(Stage::FeatureExit { total_win: 0 });
        }

        self.schedule_auto_continuation();
    }

    /// Summary screen closed. The total is re-tiered against the current
    /// bet; a tier popup may follow.
    pub fn close_free_spin_summary(&mut self) -> SpinResult<Option<WinTier>> {
        if self.popups.summary.take().is_none() {
            return Err(SpinError::NoPopup("free spin summary"));
        }
        let summary = self.session.end_free_spin_session();
        log::info!(
            "Free spins finished: won {} over {} spin(s)",
            summary.total_win,
            summary.spins_played
        );
        self.emit(Stage::FeatureExit {
            total_win: summary.total_win,
        });

        let tier = WinTier::classify(summary.total_win, self.session.bet);
        match tier {
            Some(tier) => self.open_win_popup(tier, summary.total_win),
            None => self.schedule_auto_continuation(),
        }
        Ok(tier)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // AUTOMATIC PROGRESSION
    // ═══════════════════════════════════════════════════════════════════════

    fn schedule_auto_continuation(&mut self) {
        if self.state != SpinState::Idle || self.is_blocked() || self.pending_auto.is_some() {
            return;
        }
        let timing = self.timing();
        let (kind, delay) = if self.session.has_free_spins() {
            (AutoSpinKind::FreeSpin, timing.free_spin_continue_ms)
        } else if self.autoplay {
            (AutoSpinKind::Autoplay, timing.autoplay_interval_ms)
        } else {
            return;
        };
        let handle = self.scheduler.schedule(
            delay,
            MachineTask::AutoSpin {
                after_spin: self.spin_counter,
                kind,
            },
        );
        self.pending_auto = Some((handle, kind));
    }

    fn cancel_pending_auto(&mut self) {
        if let Some((handle, _)) = self.pending_auto.take() {
            self.scheduler.cancel(handle);
        }
    }

    fn stop_autoplay(&mut self, reason: Option<&str>) {
        if let Some((handle, AutoSpinKind::Autoplay)) = self.pending_auto {
            self.scheduler.cancel(handle);
            self.pending_auto = None;
        }
        self.emit(Stage::AutoplayStop {
            reason: reason.map(str::to_string),
        });
    }

    fn auto_spin(&mut self, after_spin: u64, kind: AutoSpinKind) {
        self.pending_auto = None;
        if self.state != SpinState::Idle || self.is_blocked() || self.spin_counter != after_spin {
            log::debug!("Dropping stale {kind:?} auto spin");
            return;
        }
        let wanted = match kind {
            AutoSpinKind::FreeSpin => self.session.has_free_spins(),
            AutoSpinKind::Autoplay => self.autoplay,
        };
        if !wanted {
            // Conditions changed; whatever applies now gets scheduled instead
            self.schedule_auto_continuation();
            return;
        }
        if let Err(err) = self.start_spin() {
            log::info!("{kind:?} spin refused: {err}");
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CLOCK
    // ═══════════════════════════════════════════════════════════════════════

    /// Advance the virtual clock, running every task that falls due
    pub fn advance(&mut self, ms: u64) {
        let target = self.scheduler.now_ms().saturating_add(ms);
        while let Some((_, task)) = self.scheduler.pop_due(target) {
            self.run_task(task);
        }
        self.scheduler.set_now(target);
    }

    /// Run due tasks until the machine settles (idle with nothing pending,
    /// or waiting on a popup) or `max_ms` of virtual time has passed.
    pub fn run_until_settled(&mut self, max_ms: u64) {
        let deadline = self.scheduler.now_ms().saturating_add(max_ms);
        while let Some(due) = self.scheduler.next_due() {
            if due > deadline {
                break;
            }
            let step = due - self.scheduler.now_ms();
            self.advance(step);
        }
    }

    fn run_task(&mut self, task: MachineTask) {
        match task {
            MachineTask::BeginStopping { spin_id } => self.begin_stopping(spin_id),
            MachineTask::StopReel { spin_id, reel } => {
                if let Err(err) = self.reel_stopped(spin_id, reel) {
                    log::warn!("Internal reel stop rejected: {err}");
                }
            }
            MachineTask::RevealFreeSpins { spin_id } => self.reveal_free_spins(spin_id),
            MachineTask::ReturnToIdle { spin_id } => self.return_to_idle(spin_id),
            MachineTask::AutoSpin { after_spin, kind } => self.auto_spin(after_spin, kind),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // EVENTS
    // ═══════════════════════════════════════════════════════════════════════

    fn emit(&mut self, stage: Stage) {
        self.emit_with(stage, StagePayload::new());
    }

    fn emit_with(&mut self, stage: Stage, payload: StagePayload) {
        let spin_id = self
            .active
            .as_ref()
            .map(|a| a.id)
            .unwrap_or(self.spin_counter);
        let payload = payload.spin(self.game.id.clone(), spin_id);
        let mut event = StageEvent::with_payload(stage, self.scheduler.now_ms() as f64, payload);
        if self.active.as_ref().is_some_and(|a| a.is_free_spin) {
            event = event.with_tag(TAG_FREE_SPIN);
        }
        if self.autoplay {
            event = event.with_tag(TAG_AUTOPLAY);
        }
        if self.fast_mode {
            event = event.with_tag(TAG_FAST);
        }
        log::trace!(
            "[{}] {} @ {}ms",
            event.stage.category().display_name(),
            event.type_name(),
            event.timestamp_ms
        );

        if self.config.trace_history > 0 {
            self.record_trace(&event);
        }
        self.outbox.push_back(event);
        while self.outbox.len() > self.config.outbox_capacity.max(1) {
            self.outbox.pop_front();
            self.dropped_events += 1;
            if self.dropped_events == 1 {
                log::warn!(
                    "Outbox full ({} events), dropping oldest until drained",
                    self.config.outbox_capacity
                );
            }
        }
    }

    fn record_trace(&mut self, event: &StageEvent) {
        if let Stage::SpinStart { spin_id, .. } = &event.stage {
            self.current_trace = Some(StageTrace::new(self.game.id.clone()).with_spin(*spin_id));
        }
        let Some(trace) = self.current_trace.as_mut() else {
            return;
        };
        trace.push(event.clone());
        if matches!(event.stage, Stage::SpinEnd { .. }) {
            if let Some(trace) = self.current_trace.take() {
                log::debug!(
                    "Spin {:?} traced: {} events over {}ms, tier {:?}, free spins awarded: {}",
                    trace.spin_id,
                    trace.events.len(),
                    trace.duration_ms(),
                    trace.max_win_tier(),
                    trace.has_free_spin_award()
                );
                self.traces.push_back(trace);
                while self.traces.len() > self.config.trace_history {
                    self.traces.pop_front();
                }
            }
        }
    }
}

/// Machine behind a mutex, for stop signals arriving from several places
pub struct SharedSpinMachine<W: Wallet = InMemoryWallet, R: RngCore = StdRng> {
    inner: Arc<Mutex<SpinMachine<W, R>>>,
}

impl<W: Wallet, R: RngCore> Clone for SharedSpinMachine<W, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Wallet, R: RngCore> SharedSpinMachine<W, R> {
    pub fn new(machine: SpinMachine<W, R>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(machine)),
        }
    }

    pub fn request_spin(&self) -> SpinResult<u64> {
        self.inner.lock().request_spin()
    }

    pub fn reel_stopped(&self, spin_id: u64, reel: u8) -> SpinResult<ReelStopOutcome> {
        self.inner.lock().reel_stopped(spin_id, reel)
    }

    pub fn advance(&self, ms: u64) {
        self.inner.lock().advance(ms);
    }

    pub fn state(&self) -> SpinState {
        self.inner.lock().state()
    }

    pub fn drain_events(&self) -> Vec<StageEvent> {
        self.inner.lock().drain_events()
    }

    /// Run a closure with exclusive access
    pub fn with<T>(&self, f: impl FnOnce(&mut SpinMachine<W, R>) -> T) -> T {
        f(&mut self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Symbol::*;

    fn machine(balance: u64) -> SpinMachine {
        SpinMachine::seeded(GameConfig::classic_fruits(), MachineConfig::default(), balance, 42)
    }

    /// Adjacent columns share no symbol, so no line can reach three
    fn losing_grid() -> Grid {
        let odd = vec![Ten, Jack, Queen];
        let even = vec![King, Ace, Grape];
        Grid::from_columns(vec![odd.clone(), even.clone(), odd.clone(), even, odd]).unwrap()
    }

    fn stop_all(m: &mut SpinMachine, spin_id: u64) {
        for reel in 0..m.game().reels {
            m.reel_stopped(spin_id, reel).unwrap();
        }
    }

    #[test]
    fn test_spin_debits_and_reaches_stopping() {
        let mut m = machine(1_000);
        let spin = m.request_spin().unwrap();
        assert_eq!(m.state(), SpinState::Spinning);
        assert_eq!(m.wallet().balance(), 900);
        assert_eq!(m.session().spins_without_bonus, 1);
        assert_eq!(m.session().piggy_bank, 1);

        m.advance(m.config().timing.spin_duration_ms);
        assert_eq!(m.state(), SpinState::Stopping);
        let events = m.drain_events();
        assert!(events.iter().any(|e| e.stage == Stage::GridPublished {
            spin_id: spin,
            grid: m.current_grid().unwrap().to_ids()
        }));
        assert_eq!(events.iter().filter(|e| e.type_name() == "reel_stop_scheduled").count(), 5);
    }

    #[test]
    fn test_busy_while_spinning() {
        let mut m = machine(1_000);
        m.request_spin().unwrap();
        assert_eq!(
            m.request_spin(),
            Err(SpinError::Busy {
                state: SpinState::Spinning
            })
        );
    }

    #[test]
    fn test_reel_stops_before_stopping_are_stale() {
        let mut m = machine(1_000);
        let spin = m.request_spin().unwrap();
        assert_eq!(m.reel_stopped(spin, 0), Ok(ReelStopOutcome::Stale));
        assert_eq!(m.reel_stopped(spin + 1, 0), Ok(ReelStopOutcome::Stale));
    }

    #[test]
    fn test_evaluates_once_after_last_reel() {
        let mut m = machine(1_000);
        m.force_next_grid(losing_grid()).unwrap();
        let spin = m.request_spin().unwrap();
        m.advance(1_000);

        assert_eq!(m.reel_stopped(spin, 3), Ok(ReelStopOutcome::Counted { remaining: 4 }));
        assert_eq!(m.reel_stopped(spin, 3), Ok(ReelStopOutcome::Duplicate));
        for reel in [0, 4, 1] {
            m.reel_stopped(spin, reel).unwrap();
        }
        assert!(m.last_result().is_none());
        assert_eq!(m.reel_stopped(spin, 2), Ok(ReelStopOutcome::Evaluated));
        assert_eq!(m.reel_stopped(spin, 2), Ok(ReelStopOutcome::Duplicate));

        let evaluations = m
            .drain_events()
            .iter()
            .filter(|e| e.type_name() == "evaluate_wins")
            .count();
        assert_eq!(evaluations, 1);
    }

    #[test]
    fn test_invalid_reel() {
        let mut m = machine(1_000);
        let spin = m.request_spin().unwrap();
        m.advance(1_000);
        assert_eq!(
            m.reel_stopped(spin, 5),
            Err(SpinError::InvalidReel { reel: 5, reels: 5 })
        );
    }

    #[test]
    fn test_losing_spin_returns_to_idle() {
        let mut m = machine(1_000);
        m.force_next_grid(losing_grid()).unwrap();
        let spin = m.request_spin().unwrap();
        m.advance(1_000);
        stop_all(&mut m, spin);
        assert_eq!(m.state(), SpinState::Stopping);
        m.advance(m.config().timing.no_win_idle_ms);
        assert_eq!(m.state(), SpinState::Idle);
        assert!(m.last_trace().unwrap().validate().is_valid(5));
    }

    #[test]
    fn test_insufficient_funds_and_bankruptcy() {
        let mut m = machine(60);
        assert_eq!(
            m.request_spin(),
            Err(SpinError::InsufficientFunds {
                balance: 60,
                bet: 100
            })
        );
        assert_eq!(m.state(), SpinState::Idle);
        assert_eq!(m.wallet().balance(), 60);
        assert_eq!(m.session().spins_without_bonus, 0);

        let mut broke = machine(10);
        broke.set_autoplay(true);
        assert_eq!(broke.request_spin(), Err(SpinError::Bankruptcy { balance: 10 }));
        assert!(!broke.is_autoplay());
        let events = broke.drain_events();
        assert!(events.iter().any(|e| e.type_name() == "bankruptcy_rescue"));
        assert!(events.iter().any(|e| e.type_name() == "autoplay_stop"));
    }

    #[test]
    fn test_modal_blocks_spin() {
        let mut m = machine(1_000);
        m.set_modal_open(true);
        assert_eq!(m.request_spin(), Err(SpinError::Blocked));
        m.set_modal_open(false);
        assert!(m.request_spin().is_ok());
    }

    #[test]
    fn test_set_bet_rules() {
        let mut m = machine(1_000);
        assert_eq!(m.set_bet(0), Err(SpinError::InvalidBet { bet: 0 }));
        m.set_bet(250).unwrap();
        assert_eq!(m.session().bet, 250);
        m.request_spin().unwrap();
        assert!(matches!(m.set_bet(10), Err(SpinError::Busy { .. })));
    }

    #[test]
    fn test_force_grid_dimension_check() {
        let mut m = machine(1_000);
        let err = m.force_next_grid(Grid::filled(3, 3, Ten)).unwrap_err();
        assert!(matches!(err, SpinError::GridMismatch { .. }));
    }

    #[test]
    fn test_fast_mode_shortens_spin() {
        let mut m = machine(1_000);
        m.set_fast_mode(true);
        m.request_spin().unwrap();
        m.advance(m.config().fast_timing.spin_duration_ms);
        assert_eq!(m.state(), SpinState::Stopping);

        let events = m.drain_events();
        assert!(events.iter().all(|e| e.tags == vec![TAG_FAST.to_string()]));
    }

    #[test]
    fn test_autoplay_runs_until_funds_run_out() {
        let mut m = SpinMachine::seeded(
            GameConfig::classic_fruits(),
            MachineConfig::headless(),
            1_000,
            7,
        );
        for _ in 0..10 {
            m.force_next_grid(losing_grid()).unwrap();
        }
        m.set_autoplay(true);
        m.advance(0);

        assert_eq!(m.spin_count(), 10);
        assert_eq!(m.wallet().balance(), 0);
        assert!(!m.is_autoplay());
        assert_eq!(m.state(), SpinState::Idle);
        assert_eq!(m.pending_tasks(), 0);
    }

    #[test]
    fn test_autoplay_spins_are_tagged() {
        let mut m = SpinMachine::seeded(
            GameConfig::classic_fruits(),
            MachineConfig::headless(),
            200,
            7,
        );
        m.force_next_grid(losing_grid()).unwrap();
        m.force_next_grid(losing_grid()).unwrap();
        m.set_autoplay(true);
        m.advance(0);

        let starts: Vec<_> = m
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e.stage, Stage::SpinStart { .. }))
            .collect();
        assert_eq!(starts.len(), 2);
        assert!(starts
            .iter()
            .all(|e| e.tags.iter().any(|t| t == TAG_AUTOPLAY)));
        assert!(starts
            .iter()
            .all(|e| !e.tags.iter().any(|t| t == TAG_FREE_SPIN)));
    }

    #[test]
    fn test_outbox_keeps_newest_events_when_full() {
        let config = MachineConfig {
            outbox_capacity: 8,
            ..MachineConfig::headless()
        };
        let mut m = SpinMachine::seeded(GameConfig::classic_fruits(), config, 1_000, 7);
        for _ in 0..10 {
            m.force_next_grid(losing_grid()).unwrap();
        }
        m.set_autoplay(true);
        m.advance(0);

        assert!(m.dropped_events() > 0);
        let events = m.drain_events();
        assert_eq!(events.len(), 8);
        assert!(events.iter().all(|e| e.payload.spin_id == Some(10)));
        assert!(events.windows(2).all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
        assert_eq!(m.dropped_events(), 0);
    }

    #[test]
    fn test_select_game_preserves_sessions() {
        let mut m = machine(10_000);
        m.set_bet(200).unwrap();
        m.select_game(GameConfig::lucky_three()).unwrap();
        assert_eq!(m.session().bet, 100);
        assert_eq!(m.paylines().reels, 3);

        m.select_game(GameConfig::classic_fruits()).unwrap();
        assert_eq!(m.session().bet, 200);
        assert!(m.sessions().contains("lucky_three"));
    }

    #[test]
    fn test_shared_machine_serializes_stop_signals() {
        let mut m = machine(1_000);
        m.force_next_grid(losing_grid()).unwrap();
        let shared = SharedSpinMachine::new(m);
        let spin = shared.request_spin().unwrap();
        shared.advance(1_000);

        let handles: Vec<_> = (0..5u8)
            .flat_map(|reel| [reel, reel])
            .map(|reel| {
                let shared = shared.clone();
                std::thread::spawn(move || shared.reel_stopped(spin, reel).unwrap())
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let evaluated = outcomes
            .iter()
            .filter(|o| **o == ReelStopOutcome::Evaluated)
            .count();
        assert_eq!(evaluated, 1);
        let evaluations = shared
            .drain_events()
            .iter()
            .filter(|e| e.type_name() == "evaluate_wins")
            .count();
        assert_eq!(evaluations, 1);
    }
}
