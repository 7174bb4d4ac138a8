pub mod fen;
pub mod game;
pub mod pgn;

pub use fen::{position_key, FenError};
pub use game::{Game, GameError, Replay};
pub use pgn::{parse_pgn, parse_san, GameResult, PgnError, PgnGame, SanError};
