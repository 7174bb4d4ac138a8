use cozy_chess::{Board, File, Move, Piece, Rank, Square};

/// Resolve a Standard Algebraic Notation (SAN) move against the legal moves
/// of `board`.
///
/// Castling resolves to cozy-chess's king-takes-rook encoding (`e1h1`,
/// `e1a1`, ...). Check, mate and annotation suffixes are ignored.
pub fn parse_san(board: &Board, san: &str) -> Result<Move, SanError> {
    let trimmed = san
        .trim()
        .trim_end_matches(|c| matches!(c, '+' | '#' | '!' | '?'));
    if trimmed.is_empty() {
        return Err(SanError::InvalidFormat(san.to_string()));
    }

    match trimmed {
        "O-O" | "0-0" => return find_castle(board, CastleSide::King, san),
        "O-O-O" | "0-0-0" => return find_castle(board, CastleSide::Queen, san),
        _ => {}
    }

    let pattern = SanPattern::parse(trimmed)?;
    let side = board.side_to_move();

    let mut found: Option<Move> = None;
    let mut count = 0usize;
    board.generate_moves(|moves| {
        if moves.piece != pattern.piece {
            return false;
        }
        for mv in moves {
            // King onto its own rook is castling, which SAN never writes as a king move.
            if pattern.piece == Piece::King && board.color_on(mv.to) == Some(side) {
                continue;
            }
            if pattern.matches(mv) {
                count += 1;
                found = Some(mv);
            }
        }
        false
    });

    match (count, found) {
        (1, Some(mv)) => Ok(mv),
        (0, _) | (_, None) => Err(SanError::NoLegalMove(san.to_string())),
        _ => Err(SanError::AmbiguousMove(san.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CastleSide {
    King,
    Queen,
}

fn find_castle(board: &Board, castle: CastleSide, san: &str) -> Result<Move, SanError> {
    let side = board.side_to_move();
    let mut found = None;
    board.generate_moves(|moves| {
        if moves.piece != Piece::King {
            return false;
        }
        for mv in moves {
            if board.color_on(mv.to) != Some(side) {
                continue;
            }
            let kingside = mv.to.file() as usize > mv.from.file() as usize;
            if kingside == (castle == CastleSide::King) {
                found = Some(mv);
                return true;
            }
        }
        false
    });
    found.ok_or_else(|| SanError::NoLegalMove(san.to_string()))
}

/// The constraints a SAN token places on a legal move.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SanPattern {
    piece: Piece,
    to: Square,
    from_file: Option<File>,
    from_rank: Option<Rank>,
    promotion: Option<Piece>,
}

impl SanPattern {
    fn parse(token: &str) -> Result<Self, SanError> {
        let invalid = || SanError::InvalidFormat(token.to_string());

        let (body, promotion) = split_promotion(token)?;

        let mut chars: Vec<char> = body.chars().filter(|c| !matches!(c, 'x' | ':')).collect();
        let piece = match chars.first().copied().and_then(piece_from_letter) {
            Some(piece) => {
                chars.remove(0);
                piece
            }
            None => Piece::Pawn,
        };

        if chars.len() < 2 || chars.len() > 4 {
            return Err(invalid());
        }
        let dest = chars.split_off(chars.len() - 2);
        let to = square_from_chars(dest[0], dest[1])
            .ok_or_else(|| SanError::InvalidSquare(dest.iter().collect()))?;

        let mut from_file = None;
        let mut from_rank = None;
        for c in chars {
            if let Some(file) = file_from_char(c) {
                if from_file.replace(file).is_some() {
                    return Err(invalid());
                }
            } else if let Some(rank) = rank_from_char(c) {
                if from_rank.replace(rank).is_some() {
                    return Err(invalid());
                }
            } else {
                return Err(invalid());
            }
        }

        if promotion.is_some() && piece != Piece::Pawn {
            return Err(SanError::InvalidPromotion(token.to_string()));
        }

        Ok(Self {
            piece,
            to,
            from_file,
            from_rank,
            promotion,
        })
    }

    fn matches(&self, mv: Move) -> bool {
        mv.to == self.to
            && mv.promotion == self.promotion
            && self.from_file.map_or(true, |f| mv.from.file() == f)
            && self.from_rank.map_or(true, |r| mv.from.rank() == r)
    }
}

/// Split `e8=Q` / `e8Q` into the move body and the promotion piece.
fn split_promotion(token: &str) -> Result<(&str, Option<Piece>), SanError> {
    if let Some((body, promo)) = token.split_once('=') {
        let piece = promo
            .chars()
            .next()
            .and_then(|c| piece_from_letter(c.to_ascii_uppercase()))
            .filter(|p| !matches!(p, Piece::King))
            .ok_or_else(|| SanError::InvalidPromotion(token.to_string()))?;
        return Ok((body, Some(piece)));
    }

    let mut chars = token.chars().rev();
    if let (Some(last), Some(prev)) = (chars.next(), chars.next()) {
        if matches!(last, 'Q' | 'R' | 'B' | 'N') && matches!(prev, '1' | '8') {
            let body = &token[..token.len() - 1];
            return Ok((body, piece_from_letter(last)));
        }
    }

    Ok((token, None))
}

fn piece_from_letter(c: char) -> Option<Piece> {
    match c {
        'K' => Some(Piece::King),
        'Q' => Some(Piece::Queen),
        'R' => Some(Piece::Rook),
        'B' => Some(Piece::Bishop),
        'N' => Some(Piece::Knight),
        _ => None,
    }
}

fn file_from_char(c: char) -> Option<File> {
    match c {
        'a' => Some(File::A),
        'b' => Some(File::B),
        'c' => Some(File::C),
        'd' => Some(File::D),
        'e' => Some(File::E),
        'f' => Some(File::F),
        'g' => Some(File::G),
        'h' => Some(File::H),
        _ => None,
    }
}

fn rank_from_char(c: char) -> Option<Rank> {
    match c {
        '1' => Some(Rank::First),
        '2' => Some(Rank::Second),
        '3' => Some(Rank::Third),
        '4' => Some(Rank::Fourth),
        '5' => Some(Rank::Fifth),
        '6' => Some(Rank::Sixth),
        '7' => Some(Rank::Seventh),
        '8' => Some(Rank::Eighth),
        _ => None,
    }
}

fn square_from_chars(file: char, rank: char) -> Option<Square> {
    Some(Square::new(file_from_char(file)?, rank_from_char(rank)?))
}

#[derive(Debug, thiserror::Error)]
pub enum SanError {
    #[error("No legal move found for: {0}")]
    NoLegalMove(String),
    #[error("Ambiguous move: {0}")]
    AmbiguousMove(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),
}
