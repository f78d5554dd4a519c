//! GameCore, the single-owner event loop for all game state.
//!
//! The presentation layer, the clock task and leaderboard follow-ups all send
//! `GameEvent` messages into this loop.  GameCore owns the `Engine`, the
//! `ClockDriver` and the playback device exclusively and handles one event to
//! completion before taking the next, so round and session state are never
//! mutated concurrently.
//!
//! After each command GameCore publishes a `GameBroadcast::State` snapshot on a
//! `tokio::sync::broadcast` channel.  Clock ticks only publish
//! `GameBroadcast::Progress`.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use songdog_proto::config::Config;
use songdog_proto::protocol::{
    Board, GameCommand, GameSnapshot, LeaderboardEntry, Mode, NewScore,
};
use songdog_proto::state::PreferenceStore;

use crate::clock::{ClockDriver, Progress};
use crate::engine::{Effect, Effects, Engine};
use crate::leaderboard::{fetch_board, LeaderboardGateway};
use crate::playback::PlaybackDevice;

// ── GameEvent ─────────────────────────────────────────────────────────────────

/// All inputs into the GameCore loop.
#[derive(Debug)]
pub enum GameEvent {
    /// A command from the presentation layer.
    Command(GameCommand),
    /// Clock sample request from the timer task with this generation.
    ClockTick { generation: u64 },
    /// A leaderboard fetch finished.  Failures arrive as an empty list.
    LeaderboardLoaded {
        board: Board,
        entries: Vec<LeaderboardEntry>,
    },
    /// Shutdown requested.
    Shutdown,
}

// ── GameBroadcast ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum GameBroadcast {
    /// Full state after a change.
    State(GameSnapshot),
    /// Playback position within the current stage budget.
    Progress { elapsed: f64, budget: f64 },
    Leaderboard {
        board: Board,
        entries: Vec<LeaderboardEntry>,
    },
    /// A question the player must answer before play continues.
    Prompt(String),
    /// A human-readable notice from the core.
    Log(String),
}

pub const LEAVE_RANKED_PROMPT: &str =
    "Leave ranked? Your lives and score stay frozen until you come back.";

// ── GameCore ──────────────────────────────────────────────────────────────────

pub struct GameCore<G: LeaderboardGateway> {
    engine: Engine,
    clock: ClockDriver,
    device: Box<dyn PlaybackDevice>,
    gateway: Arc<G>,
    prefs: PreferenceStore,
    /// Handed to the clock and leaderboard tasks so they can feed the loop.
    event_tx: mpsc::Sender<GameEvent>,
    broadcast_tx: broadcast::Sender<GameBroadcast>,
    volume: f32,
    board: Board,
    leaderboard_limit: usize,
    /// Bumped on every published snapshot.
    rev: u64,
}

impl<G: LeaderboardGateway> GameCore<G> {
    pub fn new(
        config: &Config,
        engine: Engine,
        mut device: Box<dyn PlaybackDevice>,
        gateway: Arc<G>,
        prefs: PreferenceStore,
        broadcast_tx: broadcast::Sender<GameBroadcast>,
        event_tx: mpsc::Sender<GameEvent>,
    ) -> Self {
        let volume = prefs
            .volume()
            .unwrap_or(config.playback.default_volume)
            .clamp(0.0, 1.0);
        device.set_volume(volume);
        if !device.is_available() {
            warn!("GameCore: playback unavailable, rounds are guess-only");
        }

        Self {
            engine,
            clock: ClockDriver::new(config.playback.tick_interval()),
            device,
            gateway,
            prefs,
            event_tx,
            broadcast_tx,
            volume,
            board: config.game.default_board,
            leaderboard_limit: config.leaderboard.limit,
            rev: 0,
        }
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            rev: self.rev,
            phase: self.engine.phase(),
            round: self.engine.round_snapshot(),
            session: self.engine.session_snapshot(),
            confirm_leave_ranked: self.engine.is_confirming_leave_ranked(),
            volume: self.volume,
            board: self.board,
            high_score: self.prefs.high_score(self.board),
        }
    }

    /// Run the core event loop.  Returns when a `Shutdown` event is received
    /// or the event channel is closed.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<GameEvent>) -> anyhow::Result<()> {
        info!("GameCore: starting event loop");
        self.spawn_leaderboard(None, true);
        self.publish();

        loop {
            let evt = event_rx.recv().await;
            match evt {
                None => {
                    info!("GameCore: event channel closed, shutting down");
                    break;
                }

                Some(GameEvent::Shutdown) => {
                    info!("GameCore: shutdown requested");
                    break;
                }

                Some(GameEvent::Command(cmd)) => {
                    info!("GameCore: command {:?}", cmd);
                    if let Err(e) = self.handle_command(cmd).await {
                        error!("GameCore: command error: {}", e);
                        self.notify(e.to_string());
                    }
                    self.publish();
                }

                Some(GameEvent::ClockTick { generation }) => {
                    self.handle_tick(generation);
                }

                Some(GameEvent::LeaderboardLoaded { board, entries }) => {
                    self.handle_leaderboard(board, entries).await;
                }
            }
        }

        self.clock.stop();
        self.device.pause();
        Ok(())
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    async fn handle_command(&mut self, cmd: GameCommand) -> anyhow::Result<()> {
        match cmd {
            GameCommand::NewRound => self.new_round()?,
            GameCommand::TogglePlayback => {
                let effects = self.engine.toggle_playback();
                self.dispatch(effects);
            }
            GameCommand::Guess { text } => self.guess(&text)?,
            GameCommand::Skip => {
                let (outcome, effects) = self.engine.skip_stage()?;
                debug!("GameCore: skip → {:?}", outcome);
                self.dispatch(effects);
            }
            GameCommand::Acknowledge => {
                let effects = self.engine.acknowledge_round_end()?;
                self.dispatch(effects);
            }
            GameCommand::ToggleMode => {
                let effects = self.engine.toggle_mode()?;
                self.dispatch(effects);
            }
            GameCommand::ConfirmLeaveRanked => {
                let effects = self.engine.confirm_switch_from_ranked()?;
                self.dispatch(effects);
            }
            GameCommand::CancelLeaveRanked => self.engine.cancel_switch_from_ranked(),
            GameCommand::ToggleGenre { genre } => {
                let effects = self.engine.toggle_genre(&genre)?;
                self.dispatch(effects);
            }
            GameCommand::SubmitScore { name } => {
                let effects = self.engine.submit_score(&name)?;
                self.dispatch(effects);
            }
            GameCommand::CancelGameOver => {
                let effects = self.engine.cancel_game_over()?;
                self.dispatch(effects);
            }
            GameCommand::SelectBoard { board } => {
                self.board = board;
                self.spawn_leaderboard(None, true);
            }
            GameCommand::SetVolume { value } => self.set_volume(value).await,
        }
        Ok(())
    }

    /// A fresh round on demand.  Once a ranked round is live the only way
    /// forward is through a guess, a skip or the mode switch.
    fn new_round(&mut self) -> anyhow::Result<()> {
        let ranked_round_live = self.engine.session().mode == Mode::Ranked
            && self.engine.round().track.is_some();
        if ranked_round_live {
            self.notify("A ranked round is already in progress".to_string());
            return Ok(());
        }
        let effects = self.engine.start_round()?;
        self.dispatch(effects);
        Ok(())
    }

    /// Only exact catalog options reach the engine; anything else is inert.
    fn guess(&mut self, text: &str) -> anyhow::Result<()> {
        if !self.engine.catalog().is_valid_guess(text) {
            debug!("GameCore: {:?} is not a catalog option", text);
            self.notify(format!("\"{}\" is not in the song list", text));
            return Ok(());
        }
        let (outcome, effects) = self.engine.submit_guess(text)?;
        debug!("GameCore: guess → {:?}", outcome);
        self.dispatch(effects);
        Ok(())
    }

    async fn set_volume(&mut self, value: f32) {
        if !value.is_finite() {
            self.notify(format!("Volume {value} ignored"));
            return;
        }
        self.volume = value.clamp(0.0, 1.0);
        self.device.set_volume(self.volume);
        if let Err(e) = self.prefs.set_volume(self.volume).await {
            warn!("GameCore: failed to persist volume: {}", e);
        }
    }

    // ── Effects ───────────────────────────────────────────────────────────────

    fn dispatch(&mut self, effects: Effects) {
        let mut submission = None;
        let mut refresh = false;

        for effect in effects {
            debug!("GameCore: effect {:?}", effect);
            match effect {
                Effect::LoadTrack(track) => {
                    self.clock.stop();
                    self.device.pause();
                    if let Err(e) = self.device.load(&track) {
                        warn!("GameCore: failed to load {}: {}", track.preview_url, e);
                    }
                    self.device.set_volume(self.volume);
                }
                Effect::StartPlayback { budget_secs } => self.start_playback(budget_secs),
                Effect::StopPlayback => {
                    self.clock.stop();
                    self.device.pause();
                }
                Effect::PromptLeaveRanked => {
                    let _ = self
                        .broadcast_tx
                        .send(GameBroadcast::Prompt(LEAVE_RANKED_PROMPT.to_string()));
                }
                Effect::SubmitScore(score) => submission = Some(score),
                Effect::RefreshLeaderboard => refresh = true,
            }
        }

        // Submit before refreshing so the new score can show up in the board.
        if submission.is_some() || refresh {
            self.spawn_leaderboard(submission, refresh);
        }
    }

    fn start_playback(&mut self, budget_secs: f64) {
        if !self.device.is_available() {
            debug!("GameCore: no playback device, staying silent");
            self.engine.playback_halted();
            return;
        }

        self.device.seek_to_zero();
        if let Err(e) = self.device.play() {
            warn!("GameCore: playback failed: {}", e);
            self.engine.playback_halted();
            return;
        }

        let generation = self
            .clock
            .start(self.event_tx.clone(), |generation| GameEvent::ClockTick { generation });
        debug!(
            "GameCore: playing stage budget {:.1}s (clock {})",
            budget_secs, generation
        );
    }

    /// Detached follow-up: optional submission, then an optional refresh of
    /// the selected board, reported back as `LeaderboardLoaded`.
    fn spawn_leaderboard(&self, submission: Option<NewScore>, refresh: bool) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.event_tx.clone();
        let board = self.board;
        let limit = self.leaderboard_limit;

        tokio::spawn(async move {
            if let Some(score) = submission {
                if let Err(e) = gateway.submit_score(score).await {
                    warn!("GameCore: score submission failed: {:#}", e);
                }
            }
            if refresh {
                let entries = fetch_board(&*gateway, board, Utc::now(), limit).await;
                let _ = tx
                    .send(GameEvent::LeaderboardLoaded { board, entries })
                    .await;
            }
        });
    }

    // ── Clock ─────────────────────────────────────────────────────────────────

    fn handle_tick(&mut self, generation: u64) {
        if !self.clock.accepts(generation) {
            debug!("GameCore: dropping stale tick {}", generation);
            return;
        }

        let budget = self.engine.round().budget();
        match ClockDriver::sample(self.device.elapsed(), self.device.ended(), budget) {
            Progress::Running(elapsed) => {
                self.engine.record_progress(elapsed);
                let _ = self
                    .broadcast_tx
                    .send(GameBroadcast::Progress { elapsed, budget });
            }
            Progress::BudgetExhausted(elapsed) => {
                debug!("GameCore: stage budget used up at {:.2}s", elapsed);
                self.engine.record_progress(elapsed);
                self.clock.stop();
                self.device.pause();
                self.engine.playback_halted();
                let _ = self
                    .broadcast_tx
                    .send(GameBroadcast::Progress { elapsed, budget });
                self.publish();
            }
        }
    }

    // ── Leaderboard ───────────────────────────────────────────────────────────

    /// Last write wins.  Results never touch the round or the session.
    async fn handle_leaderboard(&mut self, board: Board, entries: Vec<LeaderboardEntry>) {
        if let Some(top) = entries.iter().map(|e| e.score).max() {
            if self.prefs.high_score(board) != Some(top) {
                if let Err(e) = self.prefs.set_high_score(board, top).await {
                    warn!("GameCore: failed to persist high score: {}", e);
                }
            }
        }

        let _ = self
            .broadcast_tx
            .send(GameBroadcast::Leaderboard { board, entries });
        if board == self.board {
            self.publish();
        }
    }

    // ── Broadcast ─────────────────────────────────────────────────────────────

    fn publish(&mut self) {
        self.rev += 1;
        let _ = self.broadcast_tx.send(GameBroadcast::State(self.snapshot()));
    }

    fn notify(&self, message: String) {
        let _ = self.broadcast_tx.send(GameBroadcast::Log(message));
    }
}
