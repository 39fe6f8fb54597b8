//! Tokenizer for the scoring language.

use crate::script::ScriptError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Text(String),
    Ident(String),
    // keywords
    Let,
    If,
    Then,
    Else,
    And,
    Or,
    Not,
    In,
    True,
    False,
    // punctuation
    Assign,
    Semi,
    Comma,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Token paired with its byte offset for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ScriptError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                // line comment
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '"' => {
                chars.next();
                tokens.push(Spanned {
                    token: Token::Text(read_string(source, offset, &mut chars)?),
                    offset,
                });
            }
            c if c.is_ascii_digit() => {
                tokens.push(Spanned {
                    token: read_number(source, offset, &mut chars)?,
                    offset,
                });
            }
            c if is_ident_start(c) => {
                let mut end = offset;
                while let Some(&(next_offset, next_ch)) = chars.peek() {
                    if is_ident_continue(next_ch) {
                        end = next_offset + next_ch.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Spanned {
                    token: keyword_or_ident(&source[offset..end]),
                    offset,
                });
            }
            _ => {
                chars.next();
                let token = match ch {
                    '=' => match chars.peek() {
                        Some(&(_, '=')) => {
                            chars.next();
                            Token::EqEq
                        }
                        _ => Token::Assign,
                    },
                    '!' => match chars.peek() {
                        Some(&(_, '=')) => {
                            chars.next();
                            Token::NotEq
                        }
                        _ => {
                            return Err(parse_err(offset, "expected `!=`"));
                        }
                    },
                    '<' => match chars.peek() {
                        Some(&(_, '=')) => {
                            chars.next();
                            Token::Le
                        }
                        _ => Token::Lt,
                    },
                    '>' => match chars.peek() {
                        Some(&(_, '=')) => {
                            chars.next();
                            Token::Ge
                        }
                        _ => Token::Gt,
                    },
                    ';' => Token::Semi,
                    ',' => Token::Comma,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    other => {
                        return Err(parse_err(offset, &format!("unexpected character `{other}`")));
                    }
                };
                tokens.push(Spanned { token, offset });
            }
        }
    }

    Ok(tokens)
}

fn read_string(
    source: &str,
    start: usize,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Result<String, ScriptError> {
    let mut value = String::new();
    loop {
        match chars.next() {
            Some((_, '"')) => return Ok(value),
            Some((escape_offset, '\\')) => match chars.next() {
                Some((_, '"')) => value.push('"'),
                Some((_, '\\')) => value.push('\\'),
                Some((_, 'n')) => value.push('\n'),
                Some((_, other)) => {
                    return Err(parse_err(
                        escape_offset,
                        &format!("unsupported escape `\\{other}`"),
                    ));
                }
                None => return Err(parse_err(source.len(), "unterminated string")),
            },
            Some((_, ch)) => value.push(ch),
            None => return Err(parse_err(start, "unterminated string")),
        }
    }
}

fn read_number(
    source: &str,
    start: usize,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Result<Token, ScriptError> {
    let mut end = start;
    let mut seen_dot = false;
    while let Some(&(offset, ch)) = chars.peek() {
        if ch.is_ascii_digit() || (ch == '.' && !seen_dot) {
            seen_dot |= ch == '.';
            end = offset + ch.len_utf8();
            chars.next();
        } else {
            break;
        }
    }
    source[start..end]
        .parse::<f64>()
        .map(Token::Number)
        .map_err(|_| parse_err(start, &format!("invalid number `{}`", &source[start..end])))
}

fn keyword_or_ident(word: &str) -> Token {
    match word {
        "let" => Token::Let,
        "if" => Token::If,
        "then" => Token::Then,
        "else" => Token::Else,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "in" => Token::In,
        "true" => Token::True,
        "false" => Token::False,
        _ => Token::Ident(word.to_string()),
    }
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_alphabetic()
}

fn is_ident_continue(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}

fn parse_err(offset: usize, message: &str) -> ScriptError {
    ScriptError::Parse {
        offset,
        message: message.to_string(),
    }
}
