//! Lexical analysis
use std::str::CharIndices;

use itertools::{multipeek, MultiPeek};
use smol_str::SmolStr;

use super::tokens::{Keyword, Span, Symbol, Token, TokenKind};
use crate::{
    constants::MAX_INT,
    error::{JackError, JackResult},
};

pub struct Lexer<'a> {
    /// Keep reference to the source so the parser can
    /// slice fragments from it.
    original: &'a str,

    /// Iterator over the UTF-8 encoded source.
    ///
    /// Peeking advances an internal peek cursor, so each peek helper
    /// resets it first. Consuming with `next()` also resets it.
    chars: MultiPeek<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(source_code: &'a str) -> Self {
        Self {
            original: source_code,
            chars: multipeek(source_code.char_indices()),
        }
    }

    /// Original source code that was passed in during construction.
    pub fn source_code(&self) -> &'a str {
        self.original
    }

    /// Scan the source characters and construct the next token.
    ///
    /// Returns `None` at the end of the source. Comments and whitespace
    /// never produce tokens.
    pub fn next_token(&mut self) -> JackResult<Option<Token>> {
        self.erase_trivia()?;

        let start = self.offset();
        let token = match self.peek_char() {
            None => return Ok(None),
            Some('"') => self.consume_string(start)?,
            Some(c) => match Symbol::from_char(c) {
                Some(symbol) => {
                    self.next_char();
                    self.make_token(start, TokenKind::Symbol(symbol))
                }
                None => self.consume_word(start)?,
            },
        };

        Ok(Some(token))
    }

    /// Byte position of the next unconsumed character.
    fn offset(&mut self) -> usize {
        self.chars.reset_peek();
        let offset = self
            .chars
            .peek()
            .map(|(index, _)| *index)
            .unwrap_or(self.original.len());
        self.chars.reset_peek();
        offset
    }

    fn next_char(&mut self) -> Option<char> {
        self.chars.next().map(|(_, c)| c)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.reset_peek();
        let c = self.chars.peek().map(|(_, c)| *c);
        self.chars.reset_peek();
        c
    }

    /// Two character lookahead.
    fn peek_char2(&mut self) -> (Option<char>, Option<char>) {
        self.chars.reset_peek();
        let pair = (
            self.chars.peek().map(|(_, c)| *c),
            self.chars.peek().map(|(_, c)| *c),
        );
        self.chars.reset_peek();
        pair
    }

    fn make_span(&mut self, start: usize) -> Span {
        let end = self.offset();
        debug_assert!(end >= start);
        Span::new(start as u32, (end - start) as u32)
    }

    /// Build a token from the text between `start` and the cursor.
    fn make_token(&mut self, start: usize, kind: TokenKind) -> Token {
        let span = self.make_span(start);
        Token {
            text: SmolStr::new(span.fragment(self.original)),
            span,
            kind,
        }
    }

    fn error(&mut self, start: usize, message: impl ToString) -> JackError {
        JackError::InvalidToken {
            span: self.make_span(start),
            message: message.to_string(),
        }
    }
}

/// Specialised tokens.
impl<'a> Lexer<'a> {
    /// Erase whitespace and comments up to the start of the next token.
    fn erase_trivia(&mut self) -> JackResult<()> {
        loop {
            match self.peek_char2() {
                (Some(c), _) if is_whitespace(c) => {
                    self.next_char();
                }
                (Some('/'), Some('/')) => self.erase_line_comment(),
                (Some('/'), Some('*')) => self.erase_block_comment()?,
                _ => return Ok(()),
            }
        }
    }

    /// Erase comment line up to, but not including, the trailing newline.
    fn erase_line_comment(&mut self) {
        while let Some(c) = self.peek_char() {
            if is_newline(c) {
                break;
            }
            self.next_char();
        }
    }

    /// Erase a `/* */` or `/** */` comment, which may span lines.
    fn erase_block_comment(&mut self) -> JackResult<()> {
        let start = self.offset();

        // Opening `/*`
        self.next_char();
        self.next_char();

        loop {
            match self.next_char() {
                Some('*') if self.peek_char() == Some('/') => {
                    self.next_char();
                    return Ok(());
                }
                Some(_) => {}
                None => return Err(self.error(start, "unterminated block comment")),
            }
        }
    }

    /// Make a string constant token. The body is kept verbatim.
    fn consume_string(&mut self, start: usize) -> JackResult<Token> {
        debug_assert_eq!(self.peek_char(), Some('"'));
        self.next_char();

        loop {
            match self.peek_char() {
                Some('"') => {
                    self.next_char();
                    return Ok(self.make_token(start, TokenKind::StrConst));
                }
                Some(c) if !is_newline(c) => {
                    self.next_char();
                }
                _ => return Err(self.error(start, "unterminated string constant")),
            }
        }
    }

    /// Accumulate a run of characters and classify it as a keyword,
    /// identifier or integer constant.
    fn consume_word(&mut self, start: usize) -> JackResult<Token> {
        while let Some(c) = self.peek_char() {
            if is_whitespace(c) || c == '"' || Symbol::from_char(c).is_some() {
                break;
            }
            self.next_char();
        }

        let end = self.offset();
        let fragment = &self.original[start..end];

        if let Some(keyword) = Keyword::parse(fragment) {
            return Ok(self.make_token(start, TokenKind::Keyword(keyword)));
        }

        if is_identifier(fragment) {
            return Ok(self.make_token(start, TokenKind::Ident));
        }

        if fragment.chars().all(|c| c.is_ascii_digit()) {
            return match fragment.parse::<u16>() {
                Ok(value) if value <= MAX_INT => {
                    Ok(self.make_token(start, TokenKind::IntConst(value)))
                }
                _ => Err(self.error(
                    start,
                    format!("integer constant {} exceeds {}", fragment, MAX_INT),
                )),
            };
        }

        Err(self.error(start, format!("unrecognised token '{}'", fragment)))
    }
}

/// Test whether the character is whitespace that separates tokens.
fn is_whitespace(c: char) -> bool {
    // Byte order mark is treated as whitespace.
    c.is_whitespace() || c == '\u{FEFF}'
}

fn is_newline(c: char) -> bool {
    matches!(c, '\r' | '\n')
}

fn is_letter(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '_')
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if is_letter(c) => chars.all(|c| is_letter(c) || c.is_ascii_digit()),
        _ => false,
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = JackResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}
