use std::collections::HashMap;

use super::{GameResult, PgnError, PgnGame};

/// Parse a single-game PGN string into its tag pairs and SAN move tokens.
///
/// Comments, variations, NAGs, move numbers and the result token are
/// stripped from the movetext; the moves are returned exactly as written
/// (annotation suffixes included) for the SAN resolver to interpret.
pub fn parse_pgn(input: &str) -> Result<PgnGame, PgnError> {
    let mut tags = HashMap::new();
    let mut movetext = String::new();
    let mut in_header = true;

    for line in input.lines() {
        let trimmed = line.trim();
        if in_header {
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('[') {
                let (name, value) = parse_tag(trimmed)?;
                tags.insert(name, value);
                continue;
            }
            in_header = false;
        }
        movetext.push_str(line);
        movetext.push('\n');
    }

    let (moves, result_token) = tokenize_movetext(&movetext)?;

    let result = result_token
        .or_else(|| tags.get("Result").and_then(|r| GameResult::from_token(r)))
        .unwrap_or(GameResult::Ongoing);

    if tags.is_empty() && moves.is_empty() {
        return Err(PgnError::InvalidFormat);
    }

    Ok(PgnGame {
        tags,
        moves,
        result,
    })
}

/// Parse `[Name "value"]`, honouring `\"` and `\\` escapes in the value.
fn parse_tag(line: &str) -> Result<(String, String), PgnError> {
    let invalid = || PgnError::InvalidTag(line.to_string());

    let inner = line
        .strip_prefix('[')
        .and_then(|l| l.strip_suffix(']'))
        .ok_or_else(invalid)?
        .trim();
    let (name, rest) = inner.split_once(char::is_whitespace).ok_or_else(invalid)?;
    let quoted = rest
        .trim()
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .ok_or_else(invalid)?;

    let mut value = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                value.push(escaped);
            }
        } else {
            value.push(c);
        }
    }

    if name.is_empty() {
        return Err(invalid());
    }
    Ok((name.to_string(), value))
}

fn tokenize_movetext(text: &str) -> Result<(Vec<String>, Option<GameResult>), PgnError> {
    let mut moves = Vec::new();
    let mut result = None;
    let mut token = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                flush(&mut token, &mut moves, &mut result);
                if !chars.by_ref().any(|c| c == '}') {
                    return Err(PgnError::UnterminatedComment);
                }
            }
            ';' => {
                flush(&mut token, &mut moves, &mut result);
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' => {
                flush(&mut token, &mut moves, &mut result);
                skip_variation(&mut chars)?;
            }
            '$' => {
                flush(&mut token, &mut moves, &mut result);
                while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                    chars.next();
                }
            }
            c if c.is_whitespace() => flush(&mut token, &mut moves, &mut result),
            c => token.push(c),
        }
    }
    flush(&mut token, &mut moves, &mut result);

    Ok((moves, result))
}

fn flush(token: &mut String, moves: &mut Vec<String>, result: &mut Option<GameResult>) {
    if token.is_empty() {
        return;
    }
    if let Some(r) = GameResult::from_token(token) {
        *result = Some(r);
    } else if let Some(san) = strip_move_number(token) {
        moves.push(san.to_string());
    }
    token.clear();
}

/// Consume a (possibly nested) recursive annotation variation. The opening
/// parenthesis has already been read.
fn skip_variation(chars: &mut impl Iterator<Item = char>) -> Result<(), PgnError> {
    let mut depth = 1usize;
    let mut in_comment = false;
    for c in chars {
        match c {
            '{' if !in_comment => in_comment = true,
            '}' if in_comment => in_comment = false,
            '(' if !in_comment => depth += 1,
            ')' if !in_comment => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            _ => {}
        }
    }
    Err(PgnError::UnterminatedVariation)
}

/// Strip a leading move number (`12.`, `12...`, `12.e4`). Returns `None`
/// when nothing but the number remains.
fn strip_move_number(token: &str) -> Option<&str> {
    let digits = token.chars().take_while(|c| c.is_ascii_digit()).count();
    let rest = &token[digits..];
    let san = if digits > 0 && rest.starts_with('.') {
        rest.trim_start_matches('.')
    } else {
        token
    };
    (!san.is_empty()).then_some(san)
}
