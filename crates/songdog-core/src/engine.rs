//! Round engine: the round and session state machine.
//!
//! The engine is a plain reducer: every operation mutates the owned
//! [`Session`] / [`Round`] and returns the [`Effect`]s the caller must carry
//! out (load a track, start or stop the clock, prompt, talk to the
//! leaderboard).  It never touches a timer, an audio device or the network
//! itself, so every transition can be driven directly from tests.
//!
//! # Round phase
//! ```text
//!  Selecting ─start─▶ Paused ⇄ Playing
//!                       │ submit/skip (miss, stage < 6) ─▶ stage += 1
//!                       │ correct | miss at stage 6
//!                       ▼
//!                Evaluated(Correct | Wrong | GameOver)
//!                       │ acknowledge / submit_score / cancel_game_over
//!                       ▼
//!                     Paused (fresh round)
//! ```
//!
//! Mode is orthogonal.  Entering ranked is immediate; leaving ranked goes
//! through a confirmation gate, and guesses and playback are inert while
//! that gate is open.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use songdog_proto::catalog::Catalog;
use songdog_proto::matcher;
use songdog_proto::protocol::{
    Mode, NewScore, RoundPhase, RoundSnapshot, SessionSnapshot, StageStatus, Track, Verdict,
};
use songdog_proto::stages::{self, LAST_STAGE, STAGE_COUNT};

use crate::error::{EngineError, Result};

/// Lives at the start of every ranked game.
pub const STARTING_LIVES: u32 = 3;

/// State that survives across rounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub mode: Mode,
    pub lives: u32,
    pub score: u32,
    /// Casual filter.  Empty means every genre.
    pub genres: BTreeSet<String>,
}

/// State of the round being played.  Replaced wholesale at every round start.
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    pub track: Option<Track>,
    pub stage_index: usize,
    pub statuses: [StageStatus; STAGE_COUNT],
    pub guesses: [Option<String>; STAGE_COUNT],
    pub playback_elapsed: f64,
    pub is_playing: bool,
}

impl Round {
    fn fresh(track: Option<Track>) -> Self {
        Self {
            track,
            stage_index: 0,
            statuses: [StageStatus::Pending; STAGE_COUNT],
            guesses: Default::default(),
            playback_elapsed: 0.0,
            is_playing: false,
        }
    }

    /// Playback budget of the current stage.
    pub fn budget(&self) -> f64 {
        stages::budget(self.stage_index)
    }
}

/// Result of a submit or skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessOutcome {
    Correct,
    /// Miss before the last stage; the round continues one stage later.
    Advance,
    Wrong,
    GameOver,
    /// Nothing happened (a confirmation prompt is open).
    Ignored,
}

/// Commands for the collaborators around the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Stop the clock and any playback of the previous track, then load this one.
    LoadTrack(Track),
    /// Seek to zero, play, and start the clock for this budget.
    StartPlayback { budget_secs: f64 },
    /// Cancel the clock and pause the device.  Idempotent.
    StopPlayback,
    /// Ask the player to confirm leaving ranked.
    PromptLeaveRanked,
    /// Detached leaderboard submission.
    SubmitScore(NewScore),
    /// Detached leaderboard refresh for the selected board.
    RefreshLeaderboard,
}

pub type Effects = Vec<Effect>;

pub struct Engine {
    catalog: Arc<Catalog>,
    session: Session,
    round: Round,
    phase: RoundPhase,
    leave_ranked_pending: bool,
    rng: StdRng,
}

impl Engine {
    pub fn new(catalog: Arc<Catalog>, mode: Mode, genres: impl IntoIterator<Item = String>) -> Self {
        Self::with_rng(catalog, mode, genres, StdRng::from_entropy())
    }

    /// Deterministic track selection, for tests and replays.
    pub fn with_seed(
        catalog: Arc<Catalog>,
        mode: Mode,
        genres: impl IntoIterator<Item = String>,
        seed: u64,
    ) -> Self {
        Self::with_rng(catalog, mode, genres, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        catalog: Arc<Catalog>,
        mode: Mode,
        genres: impl IntoIterator<Item = String>,
        rng: StdRng,
    ) -> Self {
        Self {
            catalog,
            session: Session {
                mode,
                lives: STARTING_LIVES,
                score: 0,
                genres: genres.into_iter().collect(),
            },
            round: Round::fresh(None),
            phase: RoundPhase::Selecting,
            leave_ranked_pending: false,
            rng,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn is_confirming_leave_ranked(&self) -> bool {
        self.leave_ranked_pending
    }

    // ── Round lifecycle ──────────────────────────────────────────────────────

    /// Pick a track for the current mode/filter and replace the round.
    pub fn start_round(&mut self) -> Result<Effects> {
        self.start_round_in(self.session.mode)
    }

    /// Select first, commit after: an empty pool leaves every field as it was.
    fn start_round_in(&mut self, mode: Mode) -> Result<Effects> {
        let track = self
            .catalog
            .pick(mode, &self.session.genres, &mut self.rng)
            .cloned()
            .ok_or_else(|| EngineError::EmptyPool {
                mode,
                genres: self.session.genres.iter().cloned().collect(),
            })?;

        info!(
            "round: new {} round ({} lives, {} pts)",
            mode.label(),
            self.session.lives,
            self.session.score
        );
        debug!("round: selected {:?}", track.option());

        self.session.mode = mode;
        self.round = Round::fresh(Some(track.clone()));
        self.phase = RoundPhase::Paused;
        Ok(vec![Effect::StopPlayback, Effect::LoadTrack(track)])
    }

    /// Play from zero, or pause if already playing.  Inert without a live round.
    pub fn toggle_playback(&mut self) -> Effects {
        if self.round.track.is_none() || self.phase.is_evaluated() || self.leave_ranked_pending {
            return Vec::new();
        }

        if self.round.is_playing {
            self.round.is_playing = false;
            self.phase = RoundPhase::Paused;
            vec![Effect::StopPlayback]
        } else {
            self.round.playback_elapsed = 0.0;
            self.round.is_playing = true;
            self.phase = RoundPhase::Playing;
            vec![Effect::StartPlayback {
                budget_secs: self.round.budget(),
            }]
        }
    }

    /// Clock sample while playing.  Elapsed time never moves backwards.
    pub fn record_progress(&mut self, elapsed: f64) {
        if self.round.is_playing && elapsed > self.round.playback_elapsed {
            self.round.playback_elapsed = elapsed;
        }
    }

    /// The clock stopped on its own (budget exhausted, clip ended, or the
    /// device refused to play).
    pub fn playback_halted(&mut self) {
        self.round.is_playing = false;
        if self.phase == RoundPhase::Playing {
            self.phase = RoundPhase::Paused;
        }
    }

    /// Evaluate a guess at the current stage.
    ///
    /// Whether the raw text is an exact catalog option is the caller's gate;
    /// here only the normalised comparison decides correctness.
    pub fn submit_guess(&mut self, raw: &str) -> Result<(GuessOutcome, Effects)> {
        self.ensure_guessable()?;
        if self.leave_ranked_pending {
            return Ok((GuessOutcome::Ignored, Vec::new()));
        }

        let stage = self.round.stage_index;
        let correct = self
            .round
            .track
            .as_ref()
            .map(|t| matcher::is_correct(raw, t))
            .unwrap_or(false);
        self.round.guesses[stage] = Some(raw.to_string());

        if correct {
            self.round.statuses[stage] = StageStatus::Correct;
            if self.session.mode == Mode::Ranked {
                self.session.score += stages::points(stage);
            }
            debug!("guess: correct at stage {}", stage);
            Ok((GuessOutcome::Correct, self.finish(Verdict::Correct)))
        } else {
            self.round.statuses[stage] = StageStatus::Incorrect;
            debug!("guess: {:?} wrong at stage {}", raw, stage);
            Ok(self.miss())
        }
    }

    /// Skip the current stage.  Scored as a miss, never as correct.
    pub fn skip_stage(&mut self) -> Result<(GuessOutcome, Effects)> {
        self.ensure_guessable()?;
        if self.leave_ranked_pending {
            return Ok((GuessOutcome::Ignored, Vec::new()));
        }

        self.round.statuses[self.round.stage_index] = StageStatus::Skipped;
        debug!("guess: skipped stage {}", self.round.stage_index);
        Ok(self.miss())
    }

    fn ensure_guessable(&self) -> Result<()> {
        if self.round.track.is_none() {
            return Err(EngineError::NoRound);
        }
        if self.phase.is_evaluated() {
            return Err(EngineError::RoundFinished);
        }
        Ok(())
    }

    fn miss(&mut self) -> (GuessOutcome, Effects) {
        if self.round.stage_index < LAST_STAGE {
            self.round.stage_index += 1;
            return (GuessOutcome::Advance, Vec::new());
        }

        match self.session.mode {
            Mode::Ranked if self.session.lives <= 1 => {
                (GuessOutcome::GameOver, self.finish(Verdict::GameOver))
            }
            Mode::Ranked => {
                self.session.lives = self.session.lives.saturating_sub(1);
                (GuessOutcome::Wrong, self.finish(Verdict::Wrong))
            }
            Mode::Casual => (GuessOutcome::Wrong, self.finish(Verdict::Wrong)),
        }
    }

    fn finish(&mut self, verdict: Verdict) -> Effects {
        info!(
            "round: {:?} at stage {} ({} lives, {} pts)",
            verdict, self.round.stage_index, self.session.lives, self.session.score
        );
        self.round.is_playing = false;
        self.phase = RoundPhase::Evaluated(verdict);
        vec![Effect::StopPlayback]
    }

    /// Dismiss a correct/wrong result and move on to the next round.
    pub fn acknowledge_round_end(&mut self) -> Result<Effects> {
        match self.phase {
            RoundPhase::Evaluated(Verdict::Correct | Verdict::Wrong) => self.start_round(),
            RoundPhase::Evaluated(Verdict::GameOver) => Err(EngineError::GameOverPending),
            RoundPhase::Selecting => Err(EngineError::NoRound),
            RoundPhase::Playing | RoundPhase::Paused => Err(EngineError::RoundInProgress),
        }
    }

    // ── Game over ────────────────────────────────────────────────────────────

    /// Reset lives and score and start a new round.
    pub fn eliminate_and_acknowledge(&mut self) -> Result<Effects> {
        let effects = self.start_round()?;
        self.session.lives = STARTING_LIVES;
        self.session.score = 0;
        Ok(effects)
    }

    /// Resolve a game over by submitting the final score under `name`.
    /// A blank name is inert.  The submission is queued after the reset so it
    /// never holds up the next round.
    pub fn submit_score(&mut self, name: &str) -> Result<Effects> {
        self.ensure_game_over()?;
        let name = name.trim();
        if name.is_empty() {
            return Ok(Vec::new());
        }

        let entry = NewScore {
            name: name.to_string(),
            score: self.session.score,
            mode: Mode::Ranked,
        };
        let mut effects = self.eliminate_and_acknowledge()?;
        effects.push(Effect::SubmitScore(entry));
        effects.push(Effect::RefreshLeaderboard);
        Ok(effects)
    }

    /// Resolve a game over without submitting.
    pub fn cancel_game_over(&mut self) -> Result<Effects> {
        self.ensure_game_over()?;
        self.eliminate_and_acknowledge()
    }

    fn ensure_game_over(&self) -> Result<()> {
        if self.phase == RoundPhase::Evaluated(Verdict::GameOver) {
            Ok(())
        } else {
            Err(EngineError::NotGameOver)
        }
    }

    fn ensure_no_game_over(&self) -> Result<()> {
        if self.phase == RoundPhase::Evaluated(Verdict::GameOver) {
            Err(EngineError::GameOverPending)
        } else {
            Ok(())
        }
    }

    // ── Mode ─────────────────────────────────────────────────────────────────

    /// The mode switch: leaving ranked asks first, entering ranked does not.
    pub fn toggle_mode(&mut self) -> Result<Effects> {
        match self.session.mode {
            Mode::Ranked => self.request_leave_ranked(),
            Mode::Casual => self.switch_to_ranked(),
        }
    }

    /// Open the leave-ranked confirmation.  No state changes until confirmed.
    /// A pending game over must be resolved first.
    pub fn request_leave_ranked(&mut self) -> Result<Effects> {
        self.ensure_no_game_over()?;
        if self.session.mode != Mode::Ranked || self.leave_ranked_pending {
            return Ok(Vec::new());
        }
        self.leave_ranked_pending = true;
        Ok(vec![Effect::PromptLeaveRanked])
    }

    pub fn confirm_switch_from_ranked(&mut self) -> Result<Effects> {
        if !self.leave_ranked_pending {
            return Ok(Vec::new());
        }
        self.ensure_no_game_over()?;
        self.switch_to_casual()
    }

    /// Close the confirmation; the ranked round carries on untouched.
    pub fn cancel_switch_from_ranked(&mut self) {
        self.leave_ranked_pending = false;
    }

    /// Switch to casual and start a round.  Lives and score are kept as-is.
    pub fn switch_to_casual(&mut self) -> Result<Effects> {
        let effects = self.start_round_in(Mode::Casual)?;
        self.leave_ranked_pending = false;
        Ok(effects)
    }

    /// Enter ranked with a fresh session.  No-op when already ranked.
    pub fn switch_to_ranked(&mut self) -> Result<Effects> {
        if self.session.mode == Mode::Ranked {
            return Ok(Vec::new());
        }
        let effects = self.start_round_in(Mode::Ranked)?;
        self.session.lives = STARTING_LIVES;
        self.session.score = 0;
        Ok(effects)
    }

    // ── Genres ───────────────────────────────────────────────────────────────

    /// Add or remove a genre from the casual filter.  The last genre cannot be
    /// removed.  In casual mode a new round starts with the new filter; if that
    /// filter has no tracks the change is rolled back.
    pub fn toggle_genre(&mut self, genre: &str) -> Result<Effects> {
        let previous = self.session.genres.clone();
        if self.session.genres.contains(genre) {
            if self.session.genres.len() == 1 {
                return Ok(Vec::new());
            }
            self.session.genres.remove(genre);
        } else {
            self.session.genres.insert(genre.to_string());
        }

        if self.session.mode != Mode::Casual {
            return Ok(Vec::new());
        }
        match self.start_round() {
            Ok(effects) => Ok(effects),
            Err(e) => {
                self.session.genres = previous;
                Err(e)
            }
        }
    }

    // ── Snapshots ────────────────────────────────────────────────────────────

    pub fn round_snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            track: self.round.track.clone(),
            stage_index: self.round.stage_index,
            statuses: self.round.statuses,
            guesses: self.round.guesses.clone(),
            playback_elapsed: self.round.playback_elapsed,
            is_playing: self.round.is_playing,
            budget_secs: self.round.budget(),
        }
    }

    pub fn session_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.session.mode,
            lives: self.session.lives,
            score: self.session.score,
            genres: self.session.genres.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(artist: &str, title: &str, genre: &str) -> Track {
        Track {
            artist: artist.to_string(),
            title: title.to_string(),
            genre: genre.to_string(),
            preview_url: format!("{artist}-{title}.m4a"),
        }
    }

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::new(vec![
            track("Artist", "Title", "Pop"),
            track("Daft Punk", "One More Time", "Electronic"),
            track("Nirvana", "Come As You Are", "Grunge"),
            track("Harry Styles", "As It Was", "Pop"),
        ]))
    }

    fn ranked() -> Engine {
        let mut engine = Engine::with_seed(catalog(), Mode::Ranked, ["Pop".to_string()], 11);
        engine.start_round().unwrap();
        engine
    }

    fn casual() -> Engine {
        let mut engine = Engine::with_seed(catalog(), Mode::Casual, ["Pop".to_string()], 11);
        engine.start_round().unwrap();
        engine
    }

    fn answer(engine: &Engine) -> String {
        engine.round().track.as_ref().unwrap().option()
    }

    fn wrong(engine: &Engine) -> String {
        let right = answer(engine);
        engine
            .catalog()
            .all_options()
            .iter()
            .find(|o| **o != right)
            .unwrap()
            .clone()
    }

    fn advance_to_last_stage(engine: &mut Engine) {
        while engine.round().stage_index < LAST_STAGE {
            assert_eq!(engine.skip_stage().unwrap().0, GuessOutcome::Advance);
        }
    }

    fn all_pending(engine: &Engine) -> bool {
        engine.round().statuses.iter().all(|s| *s == StageStatus::Pending)
            && engine.round().guesses.iter().all(Option::is_none)
    }

    #[test]
    fn test_start_round_resets_round() {
        let engine = ranked();
        assert_eq!(engine.phase(), RoundPhase::Paused);
        assert_eq!(engine.round().stage_index, 0);
        assert!(all_pending(&engine));
        assert_eq!(engine.session().lives, STARTING_LIVES);
        assert_eq!(engine.session().score, 0);
    }

    #[test]
    fn test_start_round_effects_stop_then_load() {
        let mut engine = Engine::with_seed(catalog(), Mode::Ranked, [], 3);
        let effects = engine.start_round().unwrap();
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0], Effect::StopPlayback);
        assert!(matches!(&effects[1], Effect::LoadTrack(t) if Some(t) == engine.round().track.as_ref()));
    }

    #[test]
    fn test_operations_without_round_are_errors() {
        let mut engine = Engine::with_seed(catalog(), Mode::Ranked, [], 3);
        assert_eq!(engine.submit_guess("Artist - Title"), Err(EngineError::NoRound));
        assert_eq!(engine.skip_stage(), Err(EngineError::NoRound));
        assert_eq!(engine.acknowledge_round_end(), Err(EngineError::NoRound));
        assert!(engine.toggle_playback().is_empty());
    }

    #[test]
    fn test_lowercase_unpunctuated_guess_is_correct() {
        let catalog = Arc::new(Catalog::new(vec![track("Artist", "Title", "Pop")]));
        let mut engine = Engine::with_seed(catalog, Mode::Ranked, [], 5);
        engine.start_round().unwrap();

        let (outcome, effects) = engine.submit_guess("artist - title").unwrap();
        assert_eq!(outcome, GuessOutcome::Correct);
        assert_eq!(effects, vec![Effect::StopPlayback]);
        assert_eq!(engine.session().score, 10);
        assert_eq!(engine.round().statuses[0], StageStatus::Correct);
        assert_eq!(engine.round().guesses[0].as_deref(), Some("artist - title"));
        assert_eq!(engine.phase(), RoundPhase::Evaluated(Verdict::Correct));
    }

    #[test]
    fn test_correct_adds_stage_points_in_ranked() {
        for stage in 0..STAGE_COUNT {
            let mut engine = ranked();
            for _ in 0..stage {
                engine.skip_stage().unwrap();
            }
            let before = engine.session().score;
            let guess = answer(&engine);
            assert_eq!(engine.submit_guess(&guess).unwrap().0, GuessOutcome::Correct);
            assert_eq!(engine.round().statuses[stage], StageStatus::Correct);
            assert_eq!(engine.session().score - before, stages::points(stage));
        }
    }

    #[test]
    fn test_casual_never_scores() {
        let mut engine = casual();
        let guess = answer(&engine);
        assert_eq!(engine.submit_guess(&guess).unwrap().0, GuessOutcome::Correct);
        assert_eq!(engine.session().score, 0);
    }

    #[test]
    fn test_wrong_guesses_advance_one_stage_each() {
        let mut engine = ranked();
        for expected in 1..=LAST_STAGE {
            let guess = wrong(&engine);
            let (outcome, effects) = engine.submit_guess(&guess).unwrap();
            assert_eq!(outcome, GuessOutcome::Advance);
            assert!(effects.is_empty());
            assert_eq!(engine.round().stage_index, expected);
        }
        let guess = wrong(&engine);
        assert_eq!(engine.submit_guess(&guess).unwrap().0, GuessOutcome::Wrong);
        assert_eq!(engine.round().stage_index, LAST_STAGE);
        assert_eq!(engine.session().lives, STARTING_LIVES - 1);
    }

    #[test]
    fn test_no_progress_after_correct() {
        let mut engine = ranked();
        let guess = answer(&engine);
        engine.submit_guess(&guess).unwrap();
        assert_eq!(engine.skip_stage(), Err(EngineError::RoundFinished));
        assert_eq!(engine.submit_guess(&guess), Err(EngineError::RoundFinished));
        assert_eq!(engine.round().stage_index, 0);
        assert_eq!(engine.session().score, 10);
    }

    #[test]
    fn test_repeated_wrong_guess_is_reevaluated() {
        let mut engine = ranked();
        let guess = wrong(&engine);
        engine.submit_guess(&guess).unwrap();
        engine.submit_guess(&guess).unwrap();
        assert_eq!(engine.round().statuses[0], StageStatus::Incorrect);
        assert_eq!(engine.round().statuses[1], StageStatus::Incorrect);
        assert_eq!(engine.round().guesses[1].as_deref(), Some(guess.as_str()));
        assert_eq!(engine.round().stage_index, 2);
    }

    #[test]
    fn test_skip_records_no_guess() {
        let mut engine = ranked();
        engine.skip_stage().unwrap();
        assert_eq!(engine.round().statuses[0], StageStatus::Skipped);
        assert!(engine.round().guesses[0].is_none());
    }

    #[test]
    fn test_six_wrong_then_correct_scores_one() {
        let mut engine = ranked();
        for _ in 0..LAST_STAGE {
            let guess = wrong(&engine);
            engine.submit_guess(&guess).unwrap();
        }
        let guess = answer(&engine);
        assert_eq!(engine.submit_guess(&guess).unwrap().0, GuessOutcome::Correct);
        assert_eq!(engine.session().score, 1);
        let mut expected = [StageStatus::Incorrect; STAGE_COUNT];
        expected[LAST_STAGE] = StageStatus::Correct;
        assert_eq!(engine.round().statuses, expected);
    }

    #[test]
    fn test_last_life_skip_is_game_over() {
        let mut engine = ranked();
        // Burn two lives.
        for _ in 0..2 {
            advance_to_last_stage(&mut engine);
            assert_eq!(engine.skip_stage().unwrap().0, GuessOutcome::Wrong);
            engine.acknowledge_round_end().unwrap();
        }
        assert_eq!(engine.session().lives, 1);

        advance_to_last_stage(&mut engine);
        let (outcome, effects) = engine.skip_stage().unwrap();
        assert_eq!(outcome, GuessOutcome::GameOver);
        assert_eq!(effects, vec![Effect::StopPlayback]);
        assert_eq!(engine.session().lives, 1);
        assert_eq!(engine.phase(), RoundPhase::Evaluated(Verdict::GameOver));
        assert_eq!(engine.acknowledge_round_end(), Err(EngineError::GameOverPending));

        engine.cancel_game_over().unwrap();
        assert_eq!(engine.session().lives, STARTING_LIVES);
        assert_eq!(engine.session().score, 0);
        assert_eq!(engine.round().stage_index, 0);
        assert!(all_pending(&engine));
    }

    #[test]
    fn test_casual_last_stage_miss_keeps_lives() {
        let mut engine = casual();
        advance_to_last_stage(&mut engine);
        assert_eq!(engine.skip_stage().unwrap().0, GuessOutcome::Wrong);
        assert_eq!(engine.session().lives, STARTING_LIVES);
    }

    #[test]
    fn test_eliminate_resets_session_and_round() {
        let mut engine = ranked();
        let guess = answer(&engine);
        engine.submit_guess(&guess).unwrap();
        engine.acknowledge_round_end().unwrap();
        advance_to_last_stage(&mut engine);
        engine.skip_stage().unwrap();
        assert_eq!(engine.session().score, 10);
        assert_eq!(engine.session().lives, 2);

        engine.eliminate_and_acknowledge().unwrap();
        assert_eq!(engine.session().lives, STARTING_LIVES);
        assert_eq!(engine.session().score, 0);
        assert_eq!(engine.round().stage_index, 0);
        assert!(all_pending(&engine));
        assert_eq!(engine.phase(), RoundPhase::Paused);
    }

    #[test]
    fn test_submit_score_queues_submission_after_reset() {
        let mut engine = ranked();
        let guess = answer(&engine);
        engine.submit_guess(&guess).unwrap();
        engine.acknowledge_round_end().unwrap();
        for _ in 0..3 {
            advance_to_last_stage(&mut engine);
            engine.skip_stage().unwrap();
            if engine.phase() == RoundPhase::Evaluated(Verdict::GameOver) {
                break;
            }
            engine.acknowledge_round_end().unwrap();
        }
        assert_eq!(engine.phase(), RoundPhase::Evaluated(Verdict::GameOver));

        assert!(engine.submit_score("   ").unwrap().is_empty());
        assert_eq!(engine.phase(), RoundPhase::Evaluated(Verdict::GameOver));

        let effects = engine.submit_score("  Alice ").unwrap();
        assert_eq!(effects[0], Effect::StopPlayback);
        assert!(matches!(effects[1], Effect::LoadTrack(_)));
        assert_eq!(
            effects[2],
            Effect::SubmitScore(NewScore {
                name: "Alice".to_string(),
                score: 10,
                mode: Mode::Ranked,
            })
        );
        assert_eq!(effects[3], Effect::RefreshLeaderboard);
        assert_eq!(engine.session().score, 0);
        assert_eq!(engine.session().lives, STARTING_LIVES);
    }

    #[test]
    fn test_submit_score_requires_game_over() {
        let mut engine = ranked();
        assert_eq!(engine.submit_score("Bob"), Err(EngineError::NotGameOver));
        assert_eq!(engine.cancel_game_over(), Err(EngineError::NotGameOver));
    }

    #[test]
    fn test_acknowledge_requires_evaluation() {
        let mut engine = ranked();
        assert_eq!(engine.acknowledge_round_end(), Err(EngineError::RoundInProgress));
        engine.skip_stage().unwrap();
        let guess = answer(&engine);
        engine.submit_guess(&guess).unwrap();
        engine.acknowledge_round_end().unwrap();
        assert_eq!(engine.round().stage_index, 0);
        assert!(all_pending(&engine));
        assert_eq!(engine.session().score, 8);
    }

    #[test]
    fn test_leave_ranked_is_gated() {
        let mut engine = ranked();
        engine.skip_stage().unwrap();
        let round_before = engine.round().clone();

        assert_eq!(engine.toggle_mode().unwrap(), vec![Effect::PromptLeaveRanked]);
        assert!(engine.is_confirming_leave_ranked());
        assert_eq!(engine.session().mode, Mode::Ranked);
        assert_eq!(engine.skip_stage().unwrap().0, GuessOutcome::Ignored);
        assert!(engine.toggle_playback().is_empty());

        engine.cancel_switch_from_ranked();
        assert!(!engine.is_confirming_leave_ranked());
        assert_eq!(engine.session().mode, Mode::Ranked);
        assert_eq!(engine.round(), &round_before);
    }

    #[test]
    fn test_confirm_leave_ranked_keeps_session_fields() {
        let mut engine = ranked();
        let guess = answer(&engine);
        engine.submit_guess(&guess).unwrap();
        engine.acknowledge_round_end().unwrap();

        engine.toggle_mode().unwrap();
        let effects = engine.confirm_switch_from_ranked().unwrap();
        assert!(matches!(effects[1], Effect::LoadTrack(_)));
        assert_eq!(engine.session().mode, Mode::Casual);
        assert_eq!(engine.session().score, 10);
        assert!(!engine.is_confirming_leave_ranked());
        assert_eq!(engine.round().track.as_ref().unwrap().genre, "Pop");
    }

    #[test]
    fn test_game_over_blocks_leaving_ranked() {
        let mut engine = ranked();
        for _ in 0..2 {
            advance_to_last_stage(&mut engine);
            engine.skip_stage().unwrap();
            engine.acknowledge_round_end().unwrap();
        }
        advance_to_last_stage(&mut engine);
        assert_eq!(engine.skip_stage().unwrap().0, GuessOutcome::GameOver);

        assert_eq!(engine.toggle_mode(), Err(EngineError::GameOverPending));
        assert_eq!(engine.request_leave_ranked(), Err(EngineError::GameOverPending));
        assert!(!engine.is_confirming_leave_ranked());
        assert!(engine.confirm_switch_from_ranked().unwrap().is_empty());
        assert_eq!(engine.session().mode, Mode::Ranked);
        assert_eq!(engine.phase(), RoundPhase::Evaluated(Verdict::GameOver));

        let effects = engine.submit_score("ana").unwrap();
        assert!(effects.iter().any(|e| matches!(e, Effect::SubmitScore(_))));
        assert_eq!(engine.session().lives, STARTING_LIVES);
        assert_eq!(engine.toggle_mode().unwrap(), vec![Effect::PromptLeaveRanked]);
    }

    #[test]
    fn test_confirm_without_prompt_is_inert() {
        let mut engine = ranked();
        assert!(engine.confirm_switch_from_ranked().unwrap().is_empty());
        assert_eq!(engine.session().mode, Mode::Ranked);
    }

    #[test]
    fn test_enter_ranked_resets_session() {
        let mut engine = ranked();
        let guess = answer(&engine);
        engine.submit_guess(&guess).unwrap();
        engine.acknowledge_round_end().unwrap();
        engine.switch_to_casual().unwrap();
        assert_eq!(engine.session().score, 10);

        let effects = engine.toggle_mode().unwrap();
        assert!(matches!(effects[1], Effect::LoadTrack(_)));
        assert_eq!(engine.session().mode, Mode::Ranked);
        assert_eq!(engine.session().score, 0);
        assert_eq!(engine.session().lives, STARTING_LIVES);
        assert!(engine.switch_to_ranked().unwrap().is_empty());
    }

    #[test]
    fn test_casual_rounds_respect_genre_filter() {
        let mut engine = casual();
        for _ in 0..50 {
            assert_eq!(engine.round().track.as_ref().unwrap().genre, "Pop");
            engine.start_round().unwrap();
        }
    }

    #[test]
    fn test_toggle_genre_keeps_last_and_restarts_casual() {
        let mut engine = casual();
        assert!(engine.toggle_genre("Pop").unwrap().is_empty());
        assert!(engine.session().genres.contains("Pop"));

        let effects = engine.toggle_genre("Grunge").unwrap();
        assert!(matches!(effects[1], Effect::LoadTrack(_)));
        assert_eq!(engine.session().genres.len(), 2);

        engine.toggle_genre("Pop").unwrap();
        assert_eq!(engine.round().track.as_ref().unwrap().genre, "Grunge");
    }

    #[test]
    fn test_toggle_genre_rolls_back_on_empty_pool() {
        let mut engine = casual();
        engine.toggle_genre("Jazz").unwrap();
        let err = engine.toggle_genre("Pop").unwrap_err();
        assert!(matches!(err, EngineError::EmptyPool { mode: Mode::Casual, .. }));
        assert!(engine.session().genres.contains("Pop"));
        assert!(engine.session().genres.contains("Jazz"));
    }

    #[test]
    fn test_empty_pool_leaves_state_untouched() {
        let mut engine = ranked();
        engine.toggle_genre("Jazz").unwrap();
        engine.toggle_genre("Pop").unwrap();
        let round_before = engine.round().clone();

        engine.toggle_mode().unwrap();
        let err = engine.confirm_switch_from_ranked().unwrap_err();
        assert!(matches!(err, EngineError::EmptyPool { .. }));
        assert_eq!(engine.session().mode, Mode::Ranked);
        assert_eq!(engine.round(), &round_before);
    }

    #[test]
    fn test_toggle_playback_and_progress() {
        let mut engine = ranked();
        assert_eq!(
            engine.toggle_playback(),
            vec![Effect::StartPlayback { budget_secs: 0.1 }]
        );
        assert_eq!(engine.phase(), RoundPhase::Playing);
        engine.record_progress(0.06);
        engine.record_progress(0.03);
        assert_eq!(engine.round().playback_elapsed, 0.06);

        engine.playback_halted();
        assert!(!engine.round().is_playing);
        assert_eq!(engine.phase(), RoundPhase::Paused);
        engine.record_progress(0.5);
        assert_eq!(engine.round().playback_elapsed, 0.06);

        engine.toggle_playback();
        assert_eq!(engine.round().playback_elapsed, 0.0);
        assert_eq!(engine.toggle_playback(), vec![Effect::StopPlayback]);
    }

    #[test]
    fn test_round_end_stops_playback() {
        let mut engine = ranked();
        engine.toggle_playback();
        let guess = answer(&engine);
        let (_, effects) = engine.submit_guess(&guess).unwrap();
        assert!(effects.contains(&Effect::StopPlayback));
        assert!(!engine.round().is_playing);
        assert!(engine.toggle_playback().is_empty());
    }

    #[test]
    fn test_snapshots_mirror_state() {
        let mut engine = ranked();
        engine.skip_stage().unwrap();
        let round = engine.round_snapshot();
        assert_eq!(round.stage_index, 1);
        assert_eq!(round.statuses[0], StageStatus::Skipped);
        assert_eq!(round.budget_secs, 0.5);
        let session = engine.session_snapshot();
        assert_eq!(session.mode, Mode::Ranked);
        assert_eq!(session.genres, ["Pop"]);
    }
}
