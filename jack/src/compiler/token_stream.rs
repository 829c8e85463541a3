//! Token stream with one token of look ahead.
use std::mem;

use super::{lexer::Lexer, tokens::Token};
use crate::error::{JackError, JackResult};

/// Pull based view over the lexer.
///
/// Holds the current token and the one after it. The first token
/// is lexed during construction, so [`TokenStream::current`] is
/// always available.
pub struct TokenStream<'a> {
    lexer: Lexer<'a>,
    current: Token,
    /// `None` once the source is exhausted.
    lookahead: Option<Token>,
}

impl<'a> TokenStream<'a> {
    /// # Errors
    ///
    /// Returns [`JackError::ExhaustedInput`] when the source contains
    /// no tokens at all, and lexical errors from the first two tokens.
    pub fn new(mut lexer: Lexer<'a>) -> JackResult<Self> {
        let current = lexer.next_token()?.ok_or(JackError::ExhaustedInput)?;
        let lookahead = lexer.next_token()?;

        Ok(Self {
            lexer,
            current,
            lookahead,
        })
    }

    /// The token last produced.
    #[inline]
    pub fn current(&self) -> &Token {
        &self.current
    }

    /// Indicates whether [`TokenStream::advance`] can produce another token.
    #[inline]
    pub fn has_more(&self) -> bool {
        self.lookahead.is_some()
    }

    /// Discards the current token and pulls the next one from the lexer.
    ///
    /// Returns the discarded token.
    ///
    /// # Errors
    ///
    /// Returns [`JackError::ExhaustedInput`] when there are no more tokens,
    /// in which case the current token is left unchanged.
    pub fn advance(&mut self) -> JackResult<Token> {
        let next = self.lookahead.take().ok_or(JackError::ExhaustedInput)?;
        self.lookahead = self.lexer.next_token()?;
        Ok(mem::replace(&mut self.current, next))
    }
}
