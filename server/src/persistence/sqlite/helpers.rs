//! Shared encode/decode helpers for SQLite ↔ domain type conversions.

use crate::identity::sha256_hex;
use crate::normalize::{NormalizedGame, Outcome, Side};

/// Natural id of a position row: scoped to its game so the same board reached
/// in two games is stored twice, while re-ingesting one game never is.
pub fn position_id(fen: &str, game_id: &str) -> String {
    let mut bytes = Vec::with_capacity(fen.len() + game_id.len());
    bytes.extend_from_slice(fen.as_bytes());
    bytes.extend_from_slice(game_id.as_bytes());
    sha256_hex(&bytes)
}

/// The `(winner, result)` columns of a game row.
pub fn encode_outcome(game: &NormalizedGame) -> (Option<&str>, &str) {
    (game.winner(), game.outcome.reason())
}

/// Decode the `(winner, result)` columns back into an `Outcome`.
///
/// A winner matching neither player decodes as a draw; the schema's CHECK
/// constraint prevents such rows from being written.
pub fn decode_outcome(
    white_player: &str,
    black_player: &str,
    winner: Option<&str>,
    result: String,
) -> Outcome {
    match winner {
        Some(w) if w == white_player => Outcome::Decisive {
            winner: Side::White,
            reason: result,
        },
        Some(w) if w == black_player => Outcome::Decisive {
            winner: Side::Black,
            reason: result,
        },
        _ => Outcome::Draw { reason: result },
    }
}
