//! Plain-text rendering of core broadcasts.

use songdog_core::GameBroadcast;
use songdog_proto::protocol::{GameSnapshot, LeaderboardEntry, Mode, RoundPhase, Verdict};
use songdog_proto::stages::STAGE_COUNT;
use tokio::sync::broadcast;

/// Print broadcasts until the channel closes.  Identical consecutive status
/// lines are printed once.
pub async fn print_broadcasts(mut rx: broadcast::Receiver<GameBroadcast>) {
    let mut last_status = String::new();
    loop {
        let msg = match rx.recv().await {
            Ok(msg) => msg,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::debug!("render: skipped {} broadcasts", n);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match msg {
            GameBroadcast::State(snapshot) => {
                let status = status_line(&snapshot);
                if status != last_status {
                    println!("{status}");
                    if let Some(result) = result_line(&snapshot) {
                        println!("{result}");
                    }
                    last_status = status;
                }
            }
            GameBroadcast::Progress { .. } => {}
            GameBroadcast::Leaderboard { board, entries } => {
                println!("── {} leaderboard ──", board.label());
                print!("{}", leaderboard_lines(&entries, 5));
            }
            GameBroadcast::Prompt(text) => println!("? {text} (yes/no)"),
            GameBroadcast::Log(text) => println!("! {text}"),
        }
    }
}

/// `[ranked ♥♥♥ 18 pts] stage 3/7 (1.0s) ✓ ✖ · · · · · paused`
pub fn status_line(s: &GameSnapshot) -> String {
    let header = match s.session.mode {
        Mode::Ranked => format!(
            "[ranked {} {} pts]",
            "♥".repeat(s.session.lives as usize),
            s.session.score
        ),
        Mode::Casual => format!("[casual {}]", s.session.genres.join("+")),
    };
    if s.round.track.is_none() {
        return format!("{header} no round yet (type new)");
    }

    let strip: Vec<&str> = s.round.statuses.iter().map(|st| st.symbol()).collect();
    let phase = match s.phase {
        RoundPhase::Playing => "playing",
        RoundPhase::Paused => "paused",
        RoundPhase::Evaluated(_) => "done",
        RoundPhase::Selecting => "selecting",
    };
    let mut line = format!(
        "{header} stage {}/{} ({:.1}s) {} {}",
        s.round.stage_index + 1,
        STAGE_COUNT,
        s.round.budget_secs,
        strip.join(" "),
        phase
    );
    if let Some(high) = s.high_score {
        line.push_str(&format!(" · best {} {}", s.board.label(), high));
    }
    line
}

/// The verdict with the answer, once a round is evaluated.
pub fn result_line(s: &GameSnapshot) -> Option<String> {
    let RoundPhase::Evaluated(verdict) = s.phase else {
        return None;
    };
    let answer = s.round.track.as_ref()?.option();
    Some(match verdict {
        Verdict::Correct => format!("Correct! {answer}  (ok for the next one)"),
        Verdict::Wrong => format!("Out of stages. It was {answer}  (ok for the next one)"),
        Verdict::GameOver => format!(
            "Game over with {} pts. It was {answer}. Enter `name <you>` or `cancel`.",
            s.session.score
        ),
    })
}

pub fn leaderboard_lines(entries: &[LeaderboardEntry], limit: usize) -> String {
    if entries.is_empty() {
        return "  (no scores yet)\n".to_string();
    }
    entries
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, e)| format!("  {:>2}. {:<16} {:>4}\n", i + 1, e.name, e.score))
        .collect()
}
