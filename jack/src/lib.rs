pub mod compiler;
pub mod constants;
mod error;

pub use self::{
    compiler::compile_with,
    error::{JackError, JackResult, SyntaxError},
};

/// Version of the compiler crate.
pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compile one class to VM instructions, one per line.
pub fn compile_str(source_code: impl AsRef<str>) -> JackResult<String> {
    compile_with(source_code.as_ref(), String::new())
}

pub mod prelude {
    pub use super::{
        compile_str, compile_with,
        compiler::{CompilationEngine, Lexer, Token, TokenKind, TokenStream, VmWriter},
        error::{JackError, JackResult, SyntaxError},
    };
}
