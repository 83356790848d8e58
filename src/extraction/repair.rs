//! Best-effort JSON repair strategies.
//!
//! A strategy takes a candidate substring and either returns a parsed value or
//! gives up. Strategies are interchangeable behind [`JsonRepair`].

use serde_json::{Map, Number, Value};

pub trait JsonRepair: Send + Sync {
    /// Parse `raw`, fixing what can be fixed. `None` means "drop this candidate".
    fn repair(&self, raw: &str) -> Option<Value>;

    fn name(&self) -> &'static str;
}

/// No repair at all: strict `serde_json` parsing.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictJson;

impl JsonRepair for StrictJson {
    fn repair(&self, raw: &str) -> Option<Value> {
        serde_json::from_str(raw.trim()).ok()
    }

    fn name(&self) -> &'static str {
        "strict"
    }
}

/// Lenient recursive-descent repair.
///
/// Handles trailing and missing commas, unquoted or single-quoted keys and
/// strings, `//` and `/* */` comments, Python/JS literals (`True`, `None`,
/// `undefined`, `NaN`), missing colons and values, and input truncated inside
/// a string or container. Input that only parses after skipping stray
/// characters, or that holds more than one top-level value, is rejected
/// rather than guessed at.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicRepair;

impl JsonRepair for HeuristicRepair {
    fn repair(&self, raw: &str) -> Option<Value> {
        let trimmed = raw.trim();
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return Some(value);
        }
        if !trimmed.starts_with(['{', '[']) {
            return None;
        }
        let mut parser = LenientParser::new(trimmed);
        let value = parser.value();
        parser.skip_leftover_closers();
        if parser.garbage || parser.peek().is_some() {
            return None;
        }
        Some(value)
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

const MAX_DEPTH: usize = 256;

struct LenientParser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
    garbage: bool,
}

fn starts_word(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn continues_word(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '-' | '.')
}

fn starts_number(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '-' | '+' | '.')
}

impl LenientParser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            depth: 0,
            garbage: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => self.pos += 1,
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    self.pos += 2;
                    while self.peek().is_some() {
                        if self.peek() == Some('*') && self.peek_at(1) == Some('/') {
                            self.pos += 2;
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    /// Stray closers and a statement `;` after the top-level value.
    fn skip_leftover_closers(&mut self) {
        loop {
            self.skip_trivia();
            match self.peek() {
                Some('}' | ']' | ';') => self.pos += 1,
                _ => break,
            }
        }
    }

    fn value(&mut self) -> Value {
        self.skip_trivia();
        match self.peek() {
            None => Value::Null,
            Some('{') => self.nested(Self::object),
            Some('[') => self.nested(Self::array),
            Some('"' | '\'') => Value::String(self.string()),
            Some(c) if starts_number(c) => self.number(),
            Some(c) if starts_word(c) => self.bareword(),
            Some(_) => {
                self.garbage = true;
                self.pos += 1;
                Value::Null
            }
        }
    }

    fn nested(&mut self, parse: fn(&mut Self) -> Value) -> Value {
        if self.depth >= MAX_DEPTH {
            self.garbage = true;
            self.pos = self.chars.len();
            return Value::Null;
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn object(&mut self) -> Value {
        self.pos += 1;
        let mut map = Map::new();
        loop {
            self.skip_trivia();
            let key = match self.peek() {
                // Truncated input or a closer that belongs to an outer array.
                None | Some(']') => break,
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                Some(',') => {
                    self.pos += 1;
                    continue;
                }
                Some('"' | '\'') => self.string(),
                Some(c) if starts_word(c) || c.is_ascii_digit() => self.word(),
                Some(_) => {
                    self.garbage = true;
                    self.pos += 1;
                    continue;
                }
            };

            self.skip_trivia();
            if self.peek() == Some(':') {
                self.pos += 1;
                self.skip_trivia();
            }
            let value = match self.peek() {
                None | Some(',' | '}' | ']') => Value::Null,
                _ => self.value(),
            };
            map.insert(key, value);
        }
        Value::Object(map)
    }

    fn array(&mut self) -> Value {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None | Some('}') => break,
                Some(']') => {
                    self.pos += 1;
                    break;
                }
                Some(',') => self.pos += 1,
                _ => items.push(self.value()),
            }
        }
        Value::Array(items)
    }

    fn string(&mut self) -> String {
        let quote = self.bump().unwrap_or('"');
        let mut out = String::new();
        while let Some(c) = self.bump() {
            if c == quote {
                return out;
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            match self.bump() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('b') => out.push('\u{08}'),
                Some('f') => out.push('\u{0C}'),
                Some('u') => out.push(self.unicode_escape()),
                Some(other) => out.push(other),
                None => break,
            }
        }
        // Unterminated: close it at end of input.
        out
    }

    fn hex4(&mut self) -> Option<u32> {
        let digits: String = self.chars.get(self.pos..self.pos + 4)?.iter().collect();
        let code = u32::from_str_radix(&digits, 16).ok()?;
        self.pos += 4;
        Some(code)
    }

    fn unicode_escape(&mut self) -> char {
        let Some(high) = self.hex4() else {
            return char::REPLACEMENT_CHARACTER;
        };
        if (0xD800..0xDC00).contains(&high)
            && self.peek() == Some('\\')
            && self.peek_at(1) == Some('u')
        {
            let save = self.pos;
            self.pos += 2;
            match self.hex4() {
                Some(low) if (0xDC00..0xE000).contains(&low) => {
                    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    return char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER);
                }
                _ => self.pos = save,
            }
        }
        char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    fn take_while(&mut self, keep: fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(keep) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn word(&mut self) -> String {
        let word = self.take_while(continues_word);
        if word.is_empty() {
            // Never stall on a character the word rules reject.
            self.pos += 1;
        }
        word
    }

    fn number(&mut self) -> Value {
        let text =
            self.take_while(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'));
        if let Ok(i) = text.parse::<i64>() {
            return Value::from(i);
        }
        if let Ok(u) = text.parse::<u64>() {
            return Value::from(u);
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(text))
    }

    fn bareword(&mut self) -> Value {
        let word = self.word();
        match word.as_str() {
            "true" | "True" => Value::Bool(true),
            "false" | "False" => Value::Bool(false),
            "null" | "None" | "undefined" | "NaN" | "Infinity" => Value::Null,
            _ => Value::String(word),
        }
    }
}
