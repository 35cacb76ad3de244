use std::ops::Range;

use crate::config::{Body, Entry, Value};
use crate::parser::error::ParseError;

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Key(String),
    Str(String),
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    span: Range<usize>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse the text between `WM(` and `)` into a [`Body`].
///
/// `base` is the byte offset of `text` inside the full marker name so that
/// error spans point into the name, not into the fragment.
pub fn parse_body(text: &str, base: usize, file_id: usize) -> Result<Body, ParseError> {
    let tokens = tokenize(text, base, file_id)?;
    let end = base + text.len();
    let mut parser = BodyParser {
        tokens,
        pos: 0,
        end,
        file_id,
    };
    let entries = parser.parse_entries(None)?;
    Ok(Body::new(entries))
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

fn tokenize(text: &str, base: usize, file_id: usize) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Spanned {
                    token: Token::LParen,
                    span: base + i..base + i + 1,
                });
            }
            ')' => {
                chars.next();
                tokens.push(Spanned {
                    token: Token::RParen,
                    span: base + i..base + i + 1,
                });
            }
            ',' => {
                chars.next();
                tokens.push(Spanned {
                    token: Token::Comma,
                    span: base + i..base + i + 1,
                });
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut value = String::new();
                let mut closed_at = None;
                while let Some((j, ch)) = chars.next() {
                    if ch == quote {
                        // A doubled quote is a literal quote character.
                        if matches!(chars.peek(), Some(&(_, next)) if next == quote) {
                            chars.next();
                            value.push(quote);
                            continue;
                        }
                        closed_at = Some(j);
                        break;
                    }
                    value.push(ch);
                }
                let Some(close) = closed_at else {
                    return Err(ParseError::error(
                        "unterminated string",
                        base + i..base + text.len(),
                        file_id,
                    )
                    .with_note(format!("string opened with {} is never closed", quote)));
                };
                tokens.push(Spanned {
                    token: Token::Str(value),
                    span: base + i..base + close + 1,
                });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                let mut key = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        key.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let len = key.len();
                tokens.push(Spanned {
                    token: Token::Key(key),
                    span: base + start..base + start + len,
                });
            }
            other => {
                return Err(ParseError::error(
                    format!("unexpected character '{}'", other),
                    base + i..base + i + other.len_utf8(),
                    file_id,
                ));
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct BodyParser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Byte offset just past the body, for errors at end of input.
    end: usize,
    file_id: usize,
}

impl BodyParser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn error(&self, message: impl Into<String>, span: Range<usize>) -> ParseError {
        ParseError::error(message, span, self.file_id)
    }

    /// Parse entries until end of input (top level) or the matching `)`.
    /// `open` is the span of the opening parenthesis when inside a group.
    fn parse_entries(&mut self, open: Option<Range<usize>>) -> Result<Vec<Entry>, ParseError> {
        let mut entries = Vec::new();

        loop {
            let Some(next) = self.advance() else {
                return match open {
                    Some(open) => Err(self
                        .error("unbalanced parentheses", open)
                        .with_note("this '(' is never closed")),
                    None => Ok(entries),
                };
            };

            match next.token {
                Token::RParen => {
                    if open.is_some() {
                        return Ok(entries);
                    }
                    return Err(self.error("unexpected ')'", next.span));
                }
                Token::Comma => {}
                Token::Str(value) => entries.push(Entry {
                    key: None,
                    value: Value::Str(value),
                }),
                Token::LParen => {
                    let inner = self.parse_entries(Some(next.span))?;
                    entries.push(Entry {
                        key: None,
                        value: Value::Group(inner),
                    });
                }
                Token::Key(key) => {
                    let value = self.parse_value(&key, next.span)?;
                    entries.push(Entry {
                        key: Some(key),
                        value,
                    });
                }
            }
        }
    }

    fn parse_value(&mut self, key: &str, key_span: Range<usize>) -> Result<Value, ParseError> {
        match self.peek().map(|t| t.token.clone()) {
            Some(Token::Str(value)) => {
                self.advance();
                Ok(Value::Str(value))
            }
            Some(Token::LParen) => {
                let open = self.advance().map(|t| t.span).unwrap_or(key_span);
                Ok(Value::Group(self.parse_entries(Some(open))?))
            }
            _ => {
                let span = match self.peek() {
                    Some(t) => t.span.clone(),
                    None => key_span.start..self.end,
                };
                Err(self.error(format!("expected a value or group after {}", key), span))
            }
        }
    }
}
