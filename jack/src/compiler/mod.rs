//! Compiler
mod engine;
mod lexer;
mod symbol;
mod token_stream;
pub mod tokens;
mod writer;

use std::fmt::Write;

use crate::error::JackResult;

/// Compile the single class in `source_code`, appending instructions to `sink`.
///
/// On error the sink is dropped along with whatever was written so far.
pub fn compile_with<W: Write>(source_code: &str, sink: W) -> JackResult<W> {
    let stream = TokenStream::new(Lexer::new(source_code))?;
    let mut engine = CompilationEngine::new(stream, VmWriter::new(sink));
    engine.compile_class()?;
    Ok(engine.into_writer().into_inner())
}

pub use self::{
    engine::CompilationEngine,
    lexer::Lexer,
    symbol::{StorageKind, SymbolTable},
    token_stream::TokenStream,
    tokens::{Keyword, Span, Token, TokenKind},
    writer::{Command, Segment, VmWriter},
};
