//! Line commands → game commands.

use anyhow::Context;
use songdog_proto::catalog::Catalog;
use songdog_proto::protocol::{Board, GameCommand};

pub const HELP: &str = "\
commands:
  play | p            play the clip for this stage (again to pause)
  guess <song> | g    guess \"Artist - Title\" (a unique partial match is completed)
  skip | s            give up this stage
  ok | n              next round after a result
  new                 new round (casual, or before the first round)
  mode | m            switch ranked/casual
  yes | no            answer the leave-ranked prompt
  name <you>          submit your score after a game over
  cancel              skip score submission
  genre <g>           toggle a genre in the casual filter
  genres              list genres
  search <q> | /q     list songs matching q
  board <period>      daily | weekly | monthly leaderboard
  volume <0-100>      set volume
  help | ?            this text
  quit | q            exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(GameCommand),
    Search(String),
    Genres,
    Help,
    Quit,
    Empty,
}

pub fn parse_line(line: &str) -> anyhow::Result<Input> {
    let line = line.trim();
    if let Some(query) = line.strip_prefix('/') {
        return Ok(Input::Search(query.trim().to_string()));
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let cmd = match word.to_ascii_lowercase().as_str() {
        "" => return Ok(Input::Empty),
        "help" | "?" => return Ok(Input::Help),
        "quit" | "q" | "exit" => return Ok(Input::Quit),
        "genres" => return Ok(Input::Genres),
        "search" => return Ok(Input::Search(rest.to_string())),
        "play" | "p" | "pause" => GameCommand::TogglePlayback,
        "skip" | "s" => GameCommand::Skip,
        "ok" | "n" | "next" => GameCommand::Acknowledge,
        "new" => GameCommand::NewRound,
        "mode" | "m" => GameCommand::ToggleMode,
        "yes" | "y" => GameCommand::ConfirmLeaveRanked,
        "no" => GameCommand::CancelLeaveRanked,
        "cancel" => GameCommand::CancelGameOver,
        "guess" | "g" => GameCommand::Guess {
            text: required(rest, "guess what?")?.to_string(),
        },
        "genre" => GameCommand::ToggleGenre {
            genre: required(rest, "which genre?")?.to_string(),
        },
        "name" => GameCommand::SubmitScore {
            name: required(rest, "name needed")?.to_string(),
        },
        "board" => GameCommand::SelectBoard {
            board: required(rest, "daily, weekly or monthly?")?.parse::<Board>()?,
        },
        "volume" | "vol" => {
            let percent: f32 = required(rest, "volume 0-100")?
                .parse()
                .context("volume must be a number")?;
            if !percent.is_finite() {
                anyhow::bail!("volume must be a number");
            }
            GameCommand::SetVolume {
                value: percent / 100.0,
            }
        }
        other => anyhow::bail!("unknown command {other:?} (try help)"),
    };
    Ok(Input::Command(cmd))
}

fn required<'a>(arg: &'a str, message: &str) -> anyhow::Result<&'a str> {
    if arg.is_empty() {
        anyhow::bail!("{message}");
    }
    Ok(arg)
}

/// What picking from the autocomplete list would have produced: the text
/// itself when it is already an option, otherwise the single option it
/// matches.  Ambiguous or unknown text is passed through untouched.
pub fn complete_guess(catalog: &Catalog, text: &str) -> String {
    if catalog.is_valid_guess(text) {
        return text.to_string();
    }
    match catalog.suggest(text).as_slice() {
        [only] => only.to_string(),
        _ => text.to_string(),
    }
}
