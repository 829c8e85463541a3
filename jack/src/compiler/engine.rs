//! Single pass compilation engine.
//!
//! Recursive descent over the token stream. Instructions are written as
//! soon as each production is recognised, so no syntax tree is built.
//!
//! ```text
//! class          := 'class' Name '{' classVarDec* subroutineDec* '}'
//! classVarDec    := ('static' | 'field') type name (',' name)* ';'
//! subroutineDec  := ('constructor' | 'function' | 'method') ('void' | type) name
//!                   '(' parameterList ')' '{' varDec* statement* '}'
//! statement      := let | if | while | do | return
//! expression     := term (op term)*
//! ```
use std::fmt::Write;

use log::debug;
use smol_str::SmolStr;

use super::{
    symbol::{StorageKind, SymbolTable},
    token_stream::TokenStream,
    tokens::{Keyword, Symbol, Token, TokenKind},
    writer::{Command, Segment, VmWriter},
};
use crate::{
    constants::*,
    error::{JackError, JackResult, SyntaxError},
};

const IF_TRUE: &str = "IF_TRUE";
const IF_FALSE: &str = "IF_FALSE";
const IF_END: &str = "IF_END";
const WHILE_EXP: &str = "WHILE_EXP";
const WHILE_END: &str = "WHILE_END";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

/// Variable resolved through the subroutine and class scopes.
struct Variable {
    segment: Segment,
    index: u16,
    ty: SmolStr,
}

/// Lowering of a binary operator.
#[derive(Clone, Copy)]
enum BinaryOp {
    Arithmetic(Command),
    /// Runtime library routine taking both operands.
    Library(&'static str),
}

impl BinaryOp {
    #[rustfmt::skip]
    fn from_symbol(symbol: Symbol) -> Option<Self> {
        use BinaryOp as B;
        use Symbol as S;

        match symbol {
            S::Plus    => Some(B::Arithmetic(Command::Add)),
            S::Minus   => Some(B::Arithmetic(Command::Sub)),
            S::Amp     => Some(B::Arithmetic(Command::And)),
            S::Pipe    => Some(B::Arithmetic(Command::Or)),
            S::Less    => Some(B::Arithmetic(Command::Lt)),
            S::Greater => Some(B::Arithmetic(Command::Gt)),
            S::Eq      => Some(B::Arithmetic(Command::Eq)),
            S::Star    => Some(B::Library(OS_MULTIPLY)),
            S::Slash   => Some(B::Library(OS_DIVIDE)),
            _ => None,
        }
    }
}

pub struct CompilationEngine<'a, W> {
    stream: TokenStream<'a>,
    writer: VmWriter<W>,
    /// Set once the final token has been consumed.
    finished: bool,

    class_scope: SymbolTable,
    subroutine_scope: SymbolTable,

    class_name: SmolStr,
    subroutine_name: SmolStr,
    subroutine_kind: SubroutineKind,

    /// Label counters live as long as the engine, so labels
    /// stay unique across subroutines and classes.
    if_counter: u32,
    while_counter: u32,
}

impl<'a, W: Write> CompilationEngine<'a, W> {
    pub fn new(stream: TokenStream<'a>, writer: VmWriter<W>) -> Self {
        Self {
            stream,
            writer,
            finished: false,
            class_scope: SymbolTable::default(),
            subroutine_scope: SymbolTable::default(),
            class_name: SmolStr::default(),
            subroutine_name: SmolStr::default(),
            subroutine_kind: SubroutineKind::Function,
            if_counter: 0,
            while_counter: 0,
        }
    }

    pub fn into_writer(self) -> VmWriter<W> {
        self.writer
    }

    /// Compile one class. The class must be the only thing in the source.
    pub fn compile_class(&mut self) -> JackResult<()> {
        self.expect_keyword(Keyword::Class)?;

        self.class_scope.reset();
        self.subroutine_scope.reset();
        self.class_name = self.expect_identifier()?;
        debug!("compiling class {}", self.class_name);

        self.expect_symbol(Symbol::LeftBrace)?;

        while self.check_keyword(Keyword::Static) || self.check_keyword(Keyword::Field) {
            self.compile_class_var_dec()?;
        }

        while self.check_keyword(Keyword::Constructor)
            || self.check_keyword(Keyword::Function)
            || self.check_keyword(Keyword::Method)
        {
            self.compile_subroutine()?;
        }

        self.expect_symbol(Symbol::RightBrace)?;

        if !self.finished {
            return Err(self.unexpected("end of input"));
        }

        debug!(
            "compiled class {} into {} instructions",
            self.class_name,
            self.writer.lines()
        );

        Ok(())
    }
}

/// Token helpers.
impl<'a, W: Write> CompilationEngine<'a, W> {
    /// Current token, or `None` once the last token was consumed.
    fn peek(&self) -> Option<&Token> {
        if self.finished {
            None
        } else {
            Some(self.stream.current())
        }
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.peek().is_some_and(|token| token.is_keyword(keyword))
    }

    fn check_symbol(&self, symbol: Symbol) -> bool {
        self.peek().is_some_and(|token| token.is_symbol(symbol))
    }

    fn check_identifier(&self) -> bool {
        self.peek().is_some_and(|token| token.kind == TokenKind::Ident)
    }

    /// Consume the current token regardless of type.
    fn bump(&mut self) -> JackResult<Token> {
        if self.finished {
            return Err(self.unexpected("more input"));
        }

        if self.stream.has_more() {
            self.stream.advance()
        } else {
            // The stream can't move past its final token, so it
            // stays current and the engine marks it consumed.
            self.finished = true;
            Ok(self.stream.current().clone())
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> JackResult<Token> {
        if self.check_keyword(keyword) {
            self.bump()
        } else {
            Err(self.unexpected(format!("keyword '{keyword}'")))
        }
    }

    fn expect_symbol(&mut self, symbol: Symbol) -> JackResult<Token> {
        if self.check_symbol(symbol) {
            self.bump()
        } else {
            Err(self.unexpected(format!("symbol '{symbol}'")))
        }
    }

    fn expect_identifier(&mut self) -> JackResult<SmolStr> {
        if self.check_identifier() {
            Ok(self.bump()?.text)
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    #[inline(never)]
    #[cold]
    fn unexpected(&self, expected: impl ToString) -> JackError {
        let (encountered, span) = match self.peek() {
            Some(token) => (token.to_string(), Some(token.span)),
            None => ("end of input".to_string(), None),
        };

        SyntaxError {
            expected: expected.to_string(),
            encountered,
            span,
        }
        .into()
    }

    fn make_label(&self, base: &str, index: u32) -> String {
        format!(
            "{}.{}${}{}",
            self.class_name, self.subroutine_name, base, index
        )
    }

    /// Look up a variable in the subroutine scope, then the class scope.
    ///
    /// `None` means the name is not a variable, and may be a class name.
    fn resolve(&self, name: &str) -> JackResult<Option<Variable>> {
        let (scope, kind) = match (
            self.subroutine_scope.kind_of(name),
            self.class_scope.kind_of(name),
        ) {
            (Some(kind), _) => (&self.subroutine_scope, kind),
            (None, Some(kind)) => (&self.class_scope, kind),
            (None, None) => return Ok(None),
        };

        Ok(Some(Variable {
            segment: Segment::from(kind),
            index: scope.index_of(name)?,
            ty: SmolStr::new(scope.type_of(name)?),
        }))
    }

    /// Look up a name that must be a declared variable.
    fn resolve_variable(&self, name: &str) -> JackResult<Variable> {
        self.resolve(name)?
            .ok_or_else(|| JackError::UnknownSymbol(SmolStr::new(name)))
    }
}

/// Declarations.
impl<'a, W: Write> CompilationEngine<'a, W> {
    /// `int | char | boolean | ClassName`
    fn compile_type(&mut self) -> JackResult<SmolStr> {
        let is_primitive = self
            .peek()
            .and_then(Token::keyword)
            .is_some_and(|keyword| keyword.is_primitive_type());

        if is_primitive || self.check_identifier() {
            Ok(self.bump()?.text)
        } else {
            Err(self.unexpected("type"))
        }
    }

    fn compile_class_var_dec(&mut self) -> JackResult<()> {
        let kind = if self.check_keyword(Keyword::Static) {
            StorageKind::Static
        } else {
            StorageKind::Field
        };
        self.bump()?;

        let ty = self.compile_type()?;

        loop {
            let name = self.expect_identifier()?;
            self.class_scope.define(&name, &ty, kind)?;

            if !self.check_symbol(Symbol::Comma) {
                break;
            }
            self.bump()?;
        }

        self.expect_symbol(Symbol::Semicolon)?;

        Ok(())
    }

    fn compile_subroutine(&mut self) -> JackResult<()> {
        self.subroutine_kind = match self.bump()?.keyword() {
            Some(Keyword::Constructor) => SubroutineKind::Constructor,
            Some(Keyword::Method) => SubroutineKind::Method,
            _ => SubroutineKind::Function,
        };

        // Return type
        if self.check_keyword(Keyword::Void) {
            self.bump()?;
        } else {
            self.compile_type()?;
        }

        self.subroutine_name = self.expect_identifier()?;
        debug!(
            "compiling {:?} {}.{}",
            self.subroutine_kind, self.class_name, self.subroutine_name
        );

        self.subroutine_scope.reset();
        if self.subroutine_kind == SubroutineKind::Method {
            // Receiver is passed as the first argument.
            self.subroutine_scope
                .define(RECEIVER, &self.class_name, StorageKind::Argument)?;
        }

        self.expect_symbol(Symbol::LeftParen)?;
        self.compile_parameter_list()?;
        self.expect_symbol(Symbol::RightParen)?;

        self.compile_subroutine_body()
    }

    fn compile_parameter_list(&mut self) -> JackResult<()> {
        if self.check_symbol(Symbol::RightParen) {
            return Ok(());
        }

        loop {
            let ty = self.compile_type()?;
            let name = self.expect_identifier()?;
            self.subroutine_scope
                .define(&name, &ty, StorageKind::Argument)?;

            if !self.check_symbol(Symbol::Comma) {
                return Ok(());
            }
            self.bump()?;
        }
    }

    fn compile_subroutine_body(&mut self) -> JackResult<()> {
        self.expect_symbol(Symbol::LeftBrace)?;

        while self.check_keyword(Keyword::Var) {
            self.compile_var_dec()?;
        }

        let local_count = self.subroutine_scope.count_of(StorageKind::Local);
        let name = format!("{}.{}", self.class_name, self.subroutine_name);
        self.writer.write_function(&name, local_count)?;

        match self.subroutine_kind {
            SubroutineKind::Constructor => {
                let field_count = self.class_scope.count_of(StorageKind::Field);
                self.writer.write_push(Segment::Constant, field_count)?;
                self.writer.write_call(OS_ALLOC, 1)?;
                self.writer.write_pop(Segment::Pointer, POINTER_THIS)?;
            }
            SubroutineKind::Method => {
                self.writer.write_push(Segment::Argument, 0)?;
                self.writer.write_pop(Segment::Pointer, POINTER_THIS)?;
            }
            SubroutineKind::Function => {}
        }

        self.compile_statements()?;
        self.expect_symbol(Symbol::RightBrace)?;

        Ok(())
    }

    fn compile_var_dec(&mut self) -> JackResult<()> {
        self.expect_keyword(Keyword::Var)?;
        let ty = self.compile_type()?;

        loop {
            let name = self.expect_identifier()?;
            self.subroutine_scope
                .define(&name, &ty, StorageKind::Local)?;

            if !self.check_symbol(Symbol::Comma) {
                break;
            }
            self.bump()?;
        }

        self.expect_symbol(Symbol::Semicolon)?;

        Ok(())
    }
}

/// Statements.
impl<'a, W: Write> CompilationEngine<'a, W> {
    fn compile_statements(&mut self) -> JackResult<()> {
        loop {
            match self.peek().and_then(Token::keyword) {
                Some(Keyword::Let) => self.compile_let()?,
                Some(Keyword::If) => self.compile_if()?,
                Some(Keyword::While) => self.compile_while()?,
                Some(Keyword::Do) => self.compile_do()?,
                Some(Keyword::Return) => self.compile_return()?,
                _ => return Ok(()),
            }
        }
    }

    fn compile_let(&mut self) -> JackResult<()> {
        self.expect_keyword(Keyword::Let)?;

        let name = self.expect_identifier()?;
        let target = self.resolve_variable(&name)?;

        // The element address is computed before the right hand side,
        // and parked on the stack while the value is evaluated.
        let is_array = self.check_symbol(Symbol::LeftBracket);
        if is_array {
            self.bump()?;
            self.writer.write_push(target.segment, target.index)?;
            self.compile_expression()?;
            self.expect_symbol(Symbol::RightBracket)?;
            self.writer.write_arithmetic(Command::Add)?;
        }

        self.expect_symbol(Symbol::Eq)?;
        self.compile_expression()?;
        self.expect_symbol(Symbol::Semicolon)?;

        if is_array {
            self.writer.write_pop(Segment::Temp, TEMP_SCRATCH)?;
            self.writer.write_pop(Segment::Pointer, POINTER_THAT)?;
            self.writer.write_push(Segment::Temp, TEMP_SCRATCH)?;
            self.writer.write_pop(Segment::That, 0)?;
        } else {
            self.writer.write_pop(target.segment, target.index)?;
        }

        Ok(())
    }

    fn compile_if(&mut self) -> JackResult<()> {
        let index = self.if_counter;
        self.if_counter += 1;

        let label_true = self.make_label(IF_TRUE, index);
        let label_false = self.make_label(IF_FALSE, index);

        self.expect_keyword(Keyword::If)?;
        self.expect_symbol(Symbol::LeftParen)?;
        self.compile_expression()?;
        self.expect_symbol(Symbol::RightParen)?;

        self.writer.write_if(&label_true)?;
        self.writer.write_goto(&label_false)?;
        self.writer.write_label(&label_true)?;

        self.expect_symbol(Symbol::LeftBrace)?;
        self.compile_statements()?;
        self.expect_symbol(Symbol::RightBrace)?;

        if self.check_keyword(Keyword::Else) {
            let label_end = self.make_label(IF_END, index);

            self.writer.write_goto(&label_end)?;
            self.writer.write_label(&label_false)?;

            self.bump()?;
            self.expect_symbol(Symbol::LeftBrace)?;
            self.compile_statements()?;
            self.expect_symbol(Symbol::RightBrace)?;

            self.writer.write_label(&label_end)?;
        } else {
            self.writer.write_label(&label_false)?;
        }

        Ok(())
    }

    fn compile_while(&mut self) -> JackResult<()> {
        let index = self.while_counter;
        self.while_counter += 1;

        let label_exp = self.make_label(WHILE_EXP, index);
        let label_end = self.make_label(WHILE_END, index);

        self.expect_keyword(Keyword::While)?;
        self.writer.write_label(&label_exp)?;

        self.expect_symbol(Symbol::LeftParen)?;
        self.compile_expression()?;
        self.expect_symbol(Symbol::RightParen)?;

        self.writer.write_arithmetic(Command::Not)?;
        self.writer.write_if(&label_end)?;

        self.expect_symbol(Symbol::LeftBrace)?;
        self.compile_statements()?;
        self.expect_symbol(Symbol::RightBrace)?;

        self.writer.write_goto(&label_exp)?;
        self.writer.write_label(&label_end)?;

        Ok(())
    }

    fn compile_do(&mut self) -> JackResult<()> {
        self.expect_keyword(Keyword::Do)?;

        let name = self.expect_identifier()?;
        let (callee, arg_count) = self.compile_subroutine_call(name)?;
        self.expect_symbol(Symbol::Semicolon)?;

        self.writer.write_call(&callee, arg_count)?;
        // Nothing asked for the result.
        self.writer.write_pop(Segment::Temp, TEMP_SCRATCH)?;

        Ok(())
    }

    fn compile_return(&mut self) -> JackResult<()> {
        self.expect_keyword(Keyword::Return)?;

        if self.check_symbol(Symbol::Semicolon) {
            // Every call leaves exactly one value on the stack.
            self.writer.write_push(Segment::Constant, 0)?;
        } else {
            self.compile_expression()?;
        }

        self.expect_symbol(Symbol::Semicolon)?;
        self.writer.write_return()?;

        Ok(())
    }
}

/// Expressions.
impl<'a, W: Write> CompilationEngine<'a, W> {
    /// Operators are applied strictly left to right, with no precedence.
    fn compile_expression(&mut self) -> JackResult<()> {
        self.compile_term()?;

        while let Some(op) = self
            .peek()
            .and_then(Token::symbol)
            .and_then(BinaryOp::from_symbol)
        {
            self.bump()?;
            self.compile_term()?;

            match op {
                BinaryOp::Arithmetic(command) => self.writer.write_arithmetic(command)?,
                BinaryOp::Library(routine) => self.writer.write_call(routine, 2)?,
            }
        }

        Ok(())
    }

    fn compile_term(&mut self) -> JackResult<()> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(self.unexpected("term")),
        };

        match token.kind {
            TokenKind::IntConst(value) => {
                self.bump()?;
                self.writer.write_push(Segment::Constant, value)?;
            }
            TokenKind::StrConst => {
                self.bump()?;
                self.compile_string(&token)?;
            }
            TokenKind::Keyword(keyword) => {
                match keyword {
                    Keyword::True => {
                        self.writer.write_push(Segment::Constant, 0)?;
                        self.writer.write_arithmetic(Command::Not)?;
                    }
                    Keyword::False | Keyword::Null => {
                        self.writer.write_push(Segment::Constant, 0)?;
                    }
                    Keyword::This => {
                        self.writer.write_push(Segment::Pointer, POINTER_THIS)?;
                    }
                    _ => return Err(self.unexpected("term")),
                }
                self.bump()?;
            }
            TokenKind::Symbol(Symbol::LeftParen) => {
                self.bump()?;
                self.compile_expression()?;
                self.expect_symbol(Symbol::RightParen)?;
            }
            TokenKind::Symbol(Symbol::Minus) => {
                self.bump()?;
                self.compile_term()?;
                self.writer.write_arithmetic(Command::Neg)?;
            }
            TokenKind::Symbol(Symbol::Tilde) => {
                self.bump()?;
                self.compile_term()?;
                self.writer.write_arithmetic(Command::Not)?;
            }
            TokenKind::Symbol(_) => return Err(self.unexpected("term")),
            TokenKind::Ident => {
                self.bump()?;
                let name = token.text;

                if self.check_symbol(Symbol::LeftBracket) {
                    self.bump()?;
                    let array = self.resolve_variable(&name)?;

                    self.writer.write_push(array.segment, array.index)?;
                    self.compile_expression()?;
                    self.expect_symbol(Symbol::RightBracket)?;
                    self.writer.write_arithmetic(Command::Add)?;
                    self.writer.write_pop(Segment::Pointer, POINTER_THAT)?;
                    self.writer.write_push(Segment::That, 0)?;
                } else if self.check_symbol(Symbol::LeftParen) || self.check_symbol(Symbol::Dot) {
                    let (callee, arg_count) = self.compile_subroutine_call(name)?;
                    self.writer.write_call(&callee, arg_count)?;
                } else {
                    let variable = self.resolve_variable(&name)?;
                    self.writer.write_push(variable.segment, variable.index)?;
                }
            }
        }

        Ok(())
    }

    /// Build a string object at runtime, one character at a time.
    fn compile_string(&mut self, token: &Token) -> JackResult<()> {
        let body = token.string_value().unwrap_or_default();

        let invalid = |message: String| JackError::InvalidToken {
            span: token.span,
            message,
        };

        let length = u16::try_from(body.chars().count())
            .ok()
            .filter(|length| *length <= MAX_INT)
            .ok_or_else(|| invalid("string constant is too long".to_string()))?;

        self.writer.write_push(Segment::Constant, length)?;
        self.writer.write_call(OS_STRING_NEW, 1)?;

        for c in body.chars() {
            let code = u16::try_from(u32::from(c))
                .ok()
                .filter(|code| *code <= MAX_INT)
                .ok_or_else(|| invalid(format!("character {c:?} can't be encoded")))?;

            self.writer.write_push(Segment::Constant, code)?;
            self.writer.write_call(OS_STRING_APPEND, 2)?;
        }

        Ok(())
    }

    /// Emit the receiver and arguments of a call, starting after its first
    /// identifier. Returns the callee's full name and argument count, and
    /// leaves writing the `call` itself to the caller.
    fn compile_subroutine_call(&mut self, name: SmolStr) -> JackResult<(String, u16)> {
        let mut arg_count = 0;

        let callee = if self.check_symbol(Symbol::Dot) {
            self.bump()?;
            let subroutine = self.expect_identifier()?;

            match self.resolve(&name)? {
                // Method call on an object held in a variable.
                Some(receiver) => {
                    self.writer.write_push(receiver.segment, receiver.index)?;
                    arg_count += 1;
                    format!("{}.{}", receiver.ty, subroutine)
                }
                // Otherwise the name refers to a class.
                None => format!("{}.{}", name, subroutine),
            }
        } else {
            // Method call on the current object.
            self.writer.write_push(Segment::Pointer, POINTER_THIS)?;
            arg_count += 1;
            format!("{}.{}", self.class_name, name)
        };

        self.expect_symbol(Symbol::LeftParen)?;
        arg_count = add_arguments(arg_count, self.compile_expression_list()?)?;
        self.expect_symbol(Symbol::RightParen)?;

        Ok((callee, arg_count))
    }

    /// Returns the number of expressions compiled.
    fn compile_expression_list(&mut self) -> JackResult<u16> {
        if self.check_symbol(Symbol::RightParen) {
            return Ok(0);
        }

        self.compile_expression()?;
        let mut count = 1;

        while self.check_symbol(Symbol::Comma) {
            self.bump()?;
            self.compile_expression()?;
            count = add_arguments(count, 1)?;
        }

        Ok(count)
    }
}

/// Argument counts are capped at the largest VM constant.
fn add_arguments(count: u16, extra: u16) -> JackResult<u16> {
    count
        .checked_add(extra)
        .filter(|total| *total <= MAX_INT)
        .ok_or_else(|| {
            JackError::InvalidArgument(format!(
                "too many call arguments, at most {MAX_INT} are allowed"
            ))
        })
}
