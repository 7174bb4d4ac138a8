//! Per-time-class win/loss/draw breakdowns for one user.
//!
//! The store groups games by time class, players and outcome; this module
//! folds those rows from the point of view of a single player. Every time
//! class present in the store appears in every map, with zeroed counters if
//! the user has no matching games in it.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::normalize::{Outcome, Side};
use crate::persistence::sqlite::OutcomeCount;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GameStats {
    pub wins: i64,
    pub losses: i64,
    pub draws: i64,
    pub total: i64,
}

/// How decisive games ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WinLossStats {
    pub resigns: i64,
    pub checkmates: i64,
    pub abandons: i64,
    pub timeouts: i64,
    pub total: i64,
}

impl WinLossStats {
    fn add(&mut self, reason: &str, count: i64) {
        match reason {
            "resigned" => self.resigns += count,
            "checkmated" => self.checkmates += count,
            "abandoned" => self.abandons += count,
            "timeout" => self.timeouts += count,
            _ => {}
        }
        self.total += count;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawStats {
    pub repetitions: i64,
    pub insufficients: i64,
    pub timeout_vs_insufficients: i64,
    pub stalemates: i64,
    pub agrees: i64,
    pub fifty_move_rules: i64,
    pub total: i64,
}

impl DrawStats {
    fn add(&mut self, reason: &str, count: i64) {
        match reason {
            "repetition" => self.repetitions += count,
            "insufficient" => self.insufficients += count,
            "timevsinsufficient" => self.timeout_vs_insufficients += count,
            "stalemate" => self.stalemates += count,
            "agreed" => self.agrees += count,
            "50move" => self.fifty_move_rules += count,
            _ => {}
        }
        self.total += count;
    }
}

/// All four breakdowns, keyed by time class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerStats {
    pub games: BTreeMap<String, GameStats>,
    pub wins: BTreeMap<String, WinLossStats>,
    pub losses: BTreeMap<String, WinLossStats>,
    pub draws: BTreeMap<String, DrawStats>,
}

impl PlayerStats {
    /// Fold grouped outcome rows for `username` (already case-folded).
    pub fn from_counts(username: &str, counts: &[OutcomeCount]) -> Self {
        let mut stats = Self::default();

        for row in counts {
            let class = row.time_class.as_str();
            let games = stats.games.entry(class.to_string()).or_default();
            let wins = stats.wins.entry(class.to_string()).or_default();
            let losses = stats.losses.entry(class.to_string()).or_default();
            let draws = stats.draws.entry(class.to_string()).or_default();

            games.total += row.count;
            match &row.outcome {
                Outcome::Decisive { winner, reason } => {
                    let winner = match winner {
                        Side::White => row.white_player.as_str(),
                        Side::Black => row.black_player.as_str(),
                    };
                    if winner == username {
                        games.wins += row.count;
                        wins.add(reason, row.count);
                    } else {
                        games.losses += row.count;
                        losses.add(reason, row.count);
                    }
                }
                Outcome::Draw { reason } => {
                    games.draws += row.count;
                    draws.add(reason, row.count);
                }
            }
        }

        stats
    }
}
