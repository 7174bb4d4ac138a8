use cozy_chess::{Board, Move};

use crate::fen::{self, FenError};
use crate::pgn::{parse_san, SanError};

/// A game in progress: the current board plus the canonical key of every
/// position reached so far.
#[derive(Debug, Clone)]
pub struct Game {
    position: Board,
    keys: Vec<String>,
}

/// Outcome of replaying a move list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replay {
    /// One canonical position key per successfully applied move, in play order.
    pub positions: Vec<String>,
    /// Moves that could not be resolved or were illegal in the current position.
    pub failed_moves: usize,
}

impl Game {
    /// Create a new game from the standard starting position
    pub fn new() -> Self {
        Self::from_board(Board::default())
    }

    pub fn from_board(position: Board) -> Self {
        Self {
            position,
            keys: Vec::new(),
        }
    }

    /// Create a game from a FEN string
    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        Ok(Self::from_board(fen::parse_fen(fen)?))
    }

    /// Get the current board position
    pub fn position(&self) -> &Board {
        &self.position
    }

    /// Keys of the positions reached after each applied move.
    pub fn position_keys(&self) -> &[String] {
        &self.keys
    }

    pub fn into_position_keys(self) -> Vec<String> {
        self.keys
    }

    /// Apply a move if it is legal in the current position.
    pub fn make_move(&mut self, mv: Move) -> Result<(), GameError> {
        self.position
            .try_play(mv)
            .map_err(|_| GameError::IllegalMove)?;
        self.keys.push(fen::position_key(&self.position));
        Ok(())
    }

    /// Resolve a SAN token against the current position and apply it.
    pub fn play_san(&mut self, san: &str) -> Result<Move, GameError> {
        let mv = parse_san(&self.position, san)?;
        self.make_move(mv)?;
        Ok(mv)
    }

    /// Replay `moves` from `start`, skipping any move that fails to apply
    /// without aborting the rest of the list.
    pub fn replay<S: AsRef<str>>(start: Board, moves: &[S]) -> Replay {
        let mut game = Self::from_board(start);
        let mut failed_moves = 0;
        for san in moves {
            if game.play_san(san.as_ref()).is_err() {
                failed_moves += 1;
            }
        }
        Replay {
            positions: game.into_position_keys(),
            failed_moves,
        }
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Illegal move")]
    IllegalMove,
    #[error("FEN parse error: {0}")]
    FenError(#[from] FenError),
    #[error("SAN parse error: {0}")]
    SanError(#[from] SanError),
}
