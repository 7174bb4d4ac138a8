use cozy_chess::Board;

/// FEN of the standard starting position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Parse a FEN string into a Board
pub fn parse_fen(fen: &str) -> Result<Board, FenError> {
    let parts: Vec<&str> = fen.split_whitespace().collect();
    if parts.is_empty() {
        return Err(FenError::InvalidFormat);
    }
    if parts.len() != 6 {
        return Err(FenError::FieldCount(parts.len()));
    }

    fen.parse().map_err(|_| FenError::InvalidBoardLayout)
}

/// Format a Board as a FEN string
pub fn format_fen(board: &Board) -> String {
    board.to_string()
}

/// Canonical position key: the FEN of `board` without the halfmove clock and
/// fullmove number, i.e. placement, side to move, castling rights and
/// en-passant square.
pub fn position_key(board: &Board) -> String {
    strip_move_counters(&format_fen(board))
}

/// Drop the two trailing move-count fields from a full FEN.
///
/// Input with fewer than six fields is returned with whitespace normalized.
pub fn strip_move_counters(fen: &str) -> String {
    let fields: Vec<&str> = fen.split_whitespace().collect();
    let keep = if fields.len() >= 6 {
        fields.len() - 2
    } else {
        fields.len()
    };
    fields[..keep].join(" ")
}

#[derive(Debug, thiserror::Error)]
pub enum FenError {
    #[error("Invalid FEN format")]
    InvalidFormat,
    #[error("Expected 6 FEN fields, found {0}")]
    FieldCount(usize),
    #[error("Invalid board layout")]
    InvalidBoardLayout,
}
