//! PGN import: tag pairs, movetext tokens and SAN resolution.

mod parser;
pub mod san;

use std::collections::HashMap;

use cozy_chess::Board;

pub use parser::parse_pgn;
pub use san::{parse_san, SanError};

use crate::fen::{parse_fen, FenError};

/// A parsed PGN game
#[derive(Debug, Clone)]
pub struct PgnGame {
    pub tags: HashMap<String, String>,
    /// SAN tokens in play order, as written in the movetext.
    pub moves: Vec<String>,
    pub result: GameResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
    Ongoing,
}

impl GameResult {
    /// Parse a PGN termination marker (`1-0`, `0-1`, `1/2-1/2`, `*`).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "1-0" => Some(Self::WhiteWins),
            "0-1" => Some(Self::BlackWins),
            "1/2-1/2" => Some(Self::Draw),
            "*" => Some(Self::Ongoing),
            _ => None,
        }
    }
}

impl PgnGame {
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    /// The declared `Variant` tag, if any.
    pub fn variant(&self) -> Option<&str> {
        self.tag("Variant")
    }

    /// True unless the game declares a variant other than standard chess.
    pub fn is_standard(&self) -> bool {
        self.variant()
            .map_or(true, |v| v.eq_ignore_ascii_case("standard"))
    }

    /// The position the movetext starts from: the `FEN` tag when present,
    /// otherwise the standard initial position.
    pub fn start_position(&self) -> Result<Board, PgnError> {
        match self.tag("FEN") {
            Some(fen) => Ok(parse_fen(fen)?),
            None => Ok(Board::default()),
        }
    }
}

/// Cheap pre-parse check for a declared non-standard variant.
pub fn declares_variant(pgn: &str) -> bool {
    pgn.lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("[Variant \""))
        .any(|rest| {
            let value = rest.trim_end_matches(']').trim_end_matches('"');
            !value.eq_ignore_ascii_case("standard")
        })
}

#[derive(Debug, thiserror::Error)]
pub enum PgnError {
    #[error("Invalid PGN format")]
    InvalidFormat,
    #[error("Invalid tag: {0}")]
    InvalidTag(String),
    #[error("Unterminated comment in movetext")]
    UnterminatedComment,
    #[error("Unterminated variation in movetext")]
    UnterminatedVariation,
    #[error("Invalid start position: {0}")]
    StartPosition(#[from] FenError),
    #[error("SAN parse error: {0}")]
    SanError(#[from] SanError),
}
