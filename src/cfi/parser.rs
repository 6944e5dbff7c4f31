//! CFI Parser
//!
//! Grammar accepted:
//! ```text
//! cfi       = "epubcfi(" path ["," path "," path] ")"
//! path      = step+ [":" number [assertion]]
//! step      = "/" number ["[" id "]"] | "!" ["[" id "]"]
//! assertion = "[" [prefix] ["," suffix] (";" key "=" value)* "]"
//! ```
//! `^` escapes the next character inside brackets.

use super::types::*;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CfiParseError {
    #[error("Empty CFI string")]
    Empty,

    #[error("CFI must start with 'epubcfi('")]
    MissingPrefix,

    #[error("CFI must end with ')'")]
    MissingClosingParen,

    #[error("Expected '/' or '!' at position {0}")]
    ExpectedStep(usize),

    #[error("Expected number at position {0}")]
    ExpectedNumber(usize),

    #[error("Unclosed bracket at position {0}")]
    UnclosedBracket(usize),

    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("Range must have both a start and an end path")]
    InvalidRange,
}

/// Bracket content, split on the unescaped separators `,` `;` `=`.
#[derive(Debug, PartialEq)]
enum Piece {
    Text(String),
    Sep(char),
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn unexpected(&self) -> CfiParseError {
        match self.peek() {
            Some(ch) => CfiParseError::UnexpectedChar(ch, self.pos),
            None => CfiParseError::MissingClosingParen,
        }
    }

    fn parse_number(&mut self) -> Result<u32, CfiParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            self.pos += 1;
        }
        self.input[start..self.pos]
            .parse()
            .map_err(|_| CfiParseError::ExpectedNumber(start))
    }

    fn parse_bracketed(&mut self) -> Result<Vec<Piece>, CfiParseError> {
        let start = self.pos;
        self.advance(); // '['

        let mut pieces = Vec::new();
        let mut text = String::new();
        loop {
            match self.advance() {
                None => return Err(CfiParseError::UnclosedBracket(start)),
                Some('^') => match self.advance() {
                    Some(ch) => text.push(ch),
                    None => return Err(CfiParseError::UnclosedBracket(start)),
                },
                Some(']') => break,
                Some('[') => return Err(CfiParseError::UnexpectedChar('[', self.pos - 1)),
                Some(sep @ (',' | ';' | '=')) => {
                    pieces.push(Piece::Text(std::mem::take(&mut text)));
                    pieces.push(Piece::Sep(sep));
                }
                Some(ch) => text.push(ch),
            }
        }
        pieces.push(Piece::Text(text));
        Ok(pieces)
    }

    fn parse_id(&mut self) -> Result<Option<String>, CfiParseError> {
        if self.peek() != Some('[') {
            return Ok(None);
        }
        Ok(Some(join(&self.parse_bracketed()?)))
    }

    fn parse_step(&mut self) -> Result<CfiStep, CfiParseError> {
        let step_type = if self.skip_if('/') {
            StepType::Element(self.parse_number()?)
        } else if self.skip_if('!') {
            StepType::Indirection
        } else {
            return Err(CfiParseError::ExpectedStep(self.pos));
        };

        Ok(CfiStep {
            step_type,
            id_assertion: self.parse_id()?,
        })
    }

    fn parse_path(&mut self) -> Result<CfiPath, CfiParseError> {
        let mut steps = Vec::new();
        while matches!(self.peek(), Some('/') | Some('!')) {
            steps.push(self.parse_step()?);
        }
        if steps.is_empty() {
            return Err(CfiParseError::ExpectedStep(self.pos));
        }

        let mut path = CfiPath::with_steps(steps);
        if self.skip_if(':') {
            let offset = self.parse_number()?;
            let assertion = if self.peek() == Some('[') {
                Some(text_assertion(self.parse_bracketed()?))
            } else {
                None
            };
            path.character_offset = Some(CharacterOffset { offset, assertion });
        }
        Ok(path)
    }

    fn parse_cfi(&mut self) -> Result<Cfi, CfiParseError> {
        if !self.input.starts_with("epubcfi(") {
            return Err(CfiParseError::MissingPrefix);
        }
        self.pos = "epubcfi(".len();

        let path = self.parse_path()?;

        let range = if self.skip_if(',') {
            let start = self.parse_path()?;
            if !self.skip_if(',') {
                return Err(CfiParseError::InvalidRange);
            }
            let end = self.parse_path()?;
            Some(CfiRange { start, end })
        } else {
            None
        };

        if !self.skip_if(')') {
            return Err(self.unexpected());
        }

        Ok(Cfi { path, range })
    }
}

fn join(pieces: &[Piece]) -> String {
    let mut out = String::new();
    for piece in pieces {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Sep(sep) => out.push(*sep),
        }
    }
    out
}

fn text_assertion(pieces: Vec<Piece>) -> TextAssertion {
    let mut groups = pieces.split(|p| *p == Piece::Sep(';'));

    let main = groups.next().unwrap_or(&[]);
    let mut fields = main.splitn(2, |p| *p == Piece::Sep(','));
    let prefix = fields.next().map(join).filter(|s| !s.is_empty());
    let suffix = fields.next().map(join).filter(|s| !s.is_empty());

    let parameters = groups
        .filter_map(|group| {
            let mut kv = group.splitn(2, |p| *p == Piece::Sep('='));
            let key = join(kv.next()?);
            let value = join(kv.next()?);
            let key = key.trim();
            if key.is_empty() {
                None
            } else {
                Some((key.to_string(), value.trim().to_string()))
            }
        })
        .collect();

    TextAssertion {
        prefix,
        suffix,
        parameters,
    }
}

/// Parse a CFI string. Surrounding whitespace is ignored.
pub fn parse(input: &str) -> Result<Cfi, CfiParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CfiParseError::Empty);
    }

    let mut parser = Parser::new(input);
    let cfi = parser.parse_cfi()?;

    if !parser.at_end() {
        return Err(parser.unexpected());
    }

    Ok(cfi)
}

pub fn try_parse(input: &str) -> Option<Cfi> {
    parse(input).ok()
}
