//! Game normalizer: turns one raw archive record into a storable game with
//! its canonical position keys, or decides to skip it.

use chess::{pgn, Game};

use crate::archive::RawGame;

const WIN_TAG: &str = "win";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    White,
    Black,
}

/// How a finished game ended. Produced once here and consumed by storage and
/// the stats queries instead of re-reading per-player result tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Decisive { winner: Side, reason: String },
    Draw { reason: String },
}

impl Outcome {
    /// Derive the outcome from the two per-player result tags. The winner's
    /// tag is `win`; the loser's tag names the termination. In a draw both
    /// tags carry the draw reason.
    pub fn from_result_tags(white: &str, black: &str) -> Self {
        if white == WIN_TAG {
            Self::Decisive {
                winner: Side::White,
                reason: black.to_string(),
            }
        } else if black == WIN_TAG {
            Self::Decisive {
                winner: Side::Black,
                reason: white.to_string(),
            }
        } else {
            Self::Draw {
                reason: white.to_string(),
            }
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Decisive { reason, .. } | Self::Draw { reason } => reason,
        }
    }

    pub fn winner(&self) -> Option<Side> {
        match self {
            Self::Decisive { winner, .. } => Some(*winner),
            Self::Draw { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedGame {
    pub id: String,
    pub url: String,
    pub time_class: String,
    pub time_control: String,
    pub white_player: String,
    pub black_player: String,
    pub white_rating: i64,
    pub black_rating: i64,
    pub outcome: Outcome,
    /// Canonical position keys in ply order.
    pub positions: Vec<String>,
}

impl NormalizedGame {
    /// Username of the winner, `None` for a draw.
    pub fn winner(&self) -> Option<&str> {
        self.outcome.winner().map(|side| self.player(side))
    }

    pub fn player(&self, side: Side) -> &str {
        match side {
            Side::White => &self.white_player,
            Side::Black => &self.black_player,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Declares a variant the move replay does not support.
    Variant,
    /// Neither a uuid nor a url to key the game on.
    MissingId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Game {
        game: NormalizedGame,
        failed_moves: usize,
        pgn_unreadable: bool,
    },
    Skipped(SkipReason),
}

/// Normalize one raw record.
pub fn normalize(raw: &RawGame) -> Normalized {
    if is_variant(raw) {
        return Normalized::Skipped(SkipReason::Variant);
    }

    let id = if !raw.uuid.is_empty() {
        raw.uuid.clone()
    } else if !raw.url.is_empty() {
        raw.url.clone()
    } else {
        return Normalized::Skipped(SkipReason::MissingId);
    };

    let (positions, failed_moves, pgn_unreadable) = match replay_pgn(&raw.pgn) {
        Some(replay) => (replay.positions, replay.failed_moves, false),
        None => (Vec::new(), 0, true),
    };

    let game = NormalizedGame {
        id,
        url: raw.url.clone(),
        time_class: raw.time_class.clone(),
        time_control: raw.time_control.clone(),
        white_player: raw.white.username.to_lowercase(),
        black_player: raw.black.username.to_lowercase(),
        white_rating: raw.white.rating,
        black_rating: raw.black.rating,
        outcome: Outcome::from_result_tags(&raw.white.result, &raw.black.result),
        positions,
    };

    Normalized::Game {
        game,
        failed_moves,
        pgn_unreadable,
    }
}

fn is_variant(raw: &RawGame) -> bool {
    let non_standard_rules = !raw.rules.is_empty() && raw.rules != "chess";
    non_standard_rules || pgn::declares_variant(&raw.pgn)
}

fn replay_pgn(text: &str) -> Option<chess::Replay> {
    let parsed = pgn::parse_pgn(text).ok()?;
    let start = parsed.start_position().ok()?;
    Some(Game::replay(start, &parsed.moves))
}

/// Normalized games of one sync run plus what was dropped along the way.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub games: Vec<NormalizedGame>,
    pub skipped_variant: usize,
    pub skipped_missing_id: usize,
    pub failed_moves: usize,
    pub unreadable_pgn: usize,
}

pub fn normalize_all(raws: &[RawGame]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for raw in raws {
        match normalize(raw) {
            Normalized::Game {
                game,
                failed_moves,
                pgn_unreadable,
            } => {
                batch.failed_moves += failed_moves;
                batch.unreadable_pgn += usize::from(pgn_unreadable);
                batch.games.push(game);
            }
            Normalized::Skipped(SkipReason::Variant) => batch.skipped_variant += 1,
            Normalized::Skipped(SkipReason::MissingId) => batch.skipped_missing_id += 1,
        }
    }
    batch
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::{NormalizedGame, Outcome, Side};
    use crate::archive::{RawGame, RawPlayer};

    pub const SCHOLARS_MATE_PGN: &str = "[Event \"Live Chess\"]\n[Site \"Chess.com\"]\n[White \"Alice\"]\n[Black \"Bob\"]\n[Result \"1-0\"]\n\n1. e4 e5 2. Bc4 Nc6 3. Qh5 Nf6 4. Qxf7# 1-0\n";

    pub fn raw_game(id: &str, white: (&str, &str), black: (&str, &str)) -> RawGame {
        RawGame {
            uuid: id.to_string(),
            url: format!("https://www.chess.com/game/live/{id}"),
            pgn: SCHOLARS_MATE_PGN.to_string(),
            time_control: "600".to_string(),
            time_class: "rapid".to_string(),
            end_time: 1_714_700_000,
            rated: true,
            rules: "chess".to_string(),
            white: RawPlayer {
                username: white.0.to_string(),
                rating: 1500,
                result: white.1.to_string(),
            },
            black: RawPlayer {
                username: black.0.to_string(),
                rating: 1450,
                result: black.1.to_string(),
            },
        }
    }

    /// A blitz game alice (white) won against bob by resignation.
    pub fn normalized_game(id: &str, positions: &[&str]) -> NormalizedGame {
        NormalizedGame {
            id: id.to_string(),
            url: format!("https://www.chess.com/game/live/{id}"),
            time_class: "blitz".to_string(),
            time_control: "180".to_string(),
            white_player: "alice".to_string(),
            black_player: "bob".to_string(),
            white_rating: 1500,
            black_rating: 1490,
            outcome: Outcome::Decisive {
                winner: Side::White,
                reason: "resigned".to_string(),
            },
            positions: positions.iter().map(|p| p.to_string()).collect(),
        }
    }
}
