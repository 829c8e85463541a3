//! Tokens

use std::fmt;

use smol_str::SmolStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub span: Span,
    pub kind: TokenKind,
    /// Raw source fragment, including the quotes of a string constant.
    pub text: SmolStr,
}

impl Token {
    #[inline]
    pub fn keyword(&self) -> Option<Keyword> {
        match self.kind {
            TokenKind::Keyword(keyword) => Some(keyword),
            _ => None,
        }
    }

    #[inline]
    pub fn symbol(&self) -> Option<Symbol> {
        match self.kind {
            TokenKind::Symbol(symbol) => Some(symbol),
            _ => None,
        }
    }

    #[inline]
    pub fn int_value(&self) -> Option<u16> {
        match self.kind {
            TokenKind::IntConst(value) => Some(value),
            _ => None,
        }
    }

    /// Body of a string constant, without the surrounding quotes.
    pub fn string_value(&self) -> Option<&str> {
        match self.kind {
            TokenKind::StrConst => self
                .text
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"')),
            _ => None,
        }
    }

    #[inline]
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    #[inline]
    pub fn is_symbol(&self, symbol: Symbol) -> bool {
        self.kind == TokenKind::Symbol(symbol)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            TokenKind::Keyword(keyword) => write!(f, "keyword '{keyword}'"),
            TokenKind::Symbol(symbol) => write!(f, "symbol '{symbol}'"),
            TokenKind::Ident => write!(f, "identifier '{}'", self.text),
            TokenKind::IntConst(value) => write!(f, "integer constant {value}"),
            TokenKind::StrConst => write!(f, "string constant {}", self.text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[rustfmt::skip]
pub enum TokenKind {
    /// Reserved identifiers
    Keyword(Keyword),
    /// Single character punctuation and operators
    Symbol(Symbol),
    Ident,
    /// Integer literal, already range checked
    IntConst(u16),
    /// String literal
    StrConst,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Span {
    pub index: u32,
    pub size: u32,
}

impl Span {
    pub fn new(index: u32, size: u32) -> Self {
        Self { index, size }
    }

    #[inline]
    pub fn fragment<'a>(&self, text: &'a str) -> &'a str {
        &text[(self.index as usize)..(self.index as usize + self.size as usize)]
    }

    /// One-based line number where the span starts.
    pub fn line_number(&self, text: &str) -> usize {
        let end = (self.index as usize).min(text.len());
        text.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
    }

    pub fn surrounding_line<'a>(&self, text: &'a str) -> (&'a str, Span) {
        const NEWLINE: char = '\n';
        const RETURN: char = '\r';

        let mut chars = text.char_indices().peekable();
        let mut start = 0;
        let mut end = text.len();

        while let Some((i, c)) = chars.next() {
            if i < self.index as usize {
                if c == NEWLINE {
                    // Span not found yet, move the starting cursor to the next line.

                    if chars.peek().map(|(_, c)| *c) == Some(RETURN) {
                        chars.next();
                    }

                    // Line starts at the character after the newline (\n) and carriage return (\r)
                    if let Some((i, _)) = chars.peek() {
                        start = *i;
                    }
                }
            } else if c == NEWLINE {
                // End the line when we encounter a newline after the start of the token.
                end = i + 1;

                if chars.peek().map(|(_, c)| *c) == Some(RETURN) {
                    chars.next();
                    end += 1;
                }

                break;
            }
        }

        let line_span = Span {
            index: start as u32,
            size: end as u32 - start as u32,
        };

        (&text[start..end], line_span)
    }
}

/// Reserved keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[rustfmt::skip]
pub enum Keyword {
    // ------------------------------------------------------------------------
    // Declarations
    Class,
    Constructor,
    Function,
    Method,
    Field,
    Static,
    Var,

    // ------------------------------------------------------------------------
    // Types
    Int,
    Char,
    Boolean,
    Void,

    // ------------------------------------------------------------------------
    // Constants
    True,
    False,
    Null,
    This,

    // ------------------------------------------------------------------------
    // Statements
    Let,
    Do,
    If,
    Else,
    While,
    Return,
}

impl Keyword {
    #[rustfmt::skip]
    pub fn parse(text: impl AsRef<str>) -> Option<Self> {
        match text.as_ref() {
            "class"       => Some(Self::Class),
            "constructor" => Some(Self::Constructor),
            "function"    => Some(Self::Function),
            "method"      => Some(Self::Method),
            "field"       => Some(Self::Field),
            "static"      => Some(Self::Static),
            "var"         => Some(Self::Var),
            "int"         => Some(Self::Int),
            "char"        => Some(Self::Char),
            "boolean"     => Some(Self::Boolean),
            "void"        => Some(Self::Void),
            "true"        => Some(Self::True),
            "false"       => Some(Self::False),
            "null"        => Some(Self::Null),
            "this"        => Some(Self::This),
            "let"         => Some(Self::Let),
            "do"          => Some(Self::Do),
            "if"          => Some(Self::If),
            "else"        => Some(Self::Else),
            "while"       => Some(Self::While),
            "return"      => Some(Self::Return),
            _ => None,
        }
    }

    #[rustfmt::skip]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Class       => "class",
            Self::Constructor => "constructor",
            Self::Function    => "function",
            Self::Method      => "method",
            Self::Field       => "field",
            Self::Static      => "static",
            Self::Var         => "var",
            Self::Int         => "int",
            Self::Char        => "char",
            Self::Boolean     => "boolean",
            Self::Void        => "void",
            Self::True        => "true",
            Self::False       => "false",
            Self::Null        => "null",
            Self::This        => "this",
            Self::Let         => "let",
            Self::Do          => "do",
            Self::If          => "if",
            Self::Else        => "else",
            Self::While       => "while",
            Self::Return      => "return",
        }
    }

    /// Built-in primitive types usable in declarations.
    #[inline]
    pub fn is_primitive_type(&self) -> bool {
        matches!(self, Self::Int | Self::Char | Self::Boolean)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Punctuation and operators. Every symbol is exactly one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[rustfmt::skip]
pub enum Symbol {
    LeftBrace,    // {
    RightBrace,   // }
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    Dot,          // .
    Comma,        // ,
    Semicolon,    // ;
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Amp,          // &
    Pipe,         // |
    Less,         // <
    Greater,      // >
    Eq,           // =
    Tilde,        // ~
}

impl Symbol {
    #[rustfmt::skip]
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '{' => Some(Self::LeftBrace),
            '}' => Some(Self::RightBrace),
            '(' => Some(Self::LeftParen),
            ')' => Some(Self::RightParen),
            '[' => Some(Self::LeftBracket),
            ']' => Some(Self::RightBracket),
            '.' => Some(Self::Dot),
            ',' => Some(Self::Comma),
            ';' => Some(Self::Semicolon),
            '+' => Some(Self::Plus),
            '-' => Some(Self::Minus),
            '*' => Some(Self::Star),
            '/' => Some(Self::Slash),
            '&' => Some(Self::Amp),
            '|' => Some(Self::Pipe),
            '<' => Some(Self::Less),
            '>' => Some(Self::Greater),
            '=' => Some(Self::Eq),
            '~' => Some(Self::Tilde),
            _ => None,
        }
    }

    #[rustfmt::skip]
    pub fn as_char(&self) -> char {
        match self {
            Self::LeftBrace    => '{',
            Self::RightBrace   => '}',
            Self::LeftParen    => '(',
            Self::RightParen   => ')',
            Self::LeftBracket  => '[',
            Self::RightBracket => ']',
            Self::Dot          => '.',
            Self::Comma        => ',',
            Self::Semicolon    => ';',
            Self::Plus         => '+',
            Self::Minus        => '-',
            Self::Star         => '*',
            Self::Slash        => '/',
            Self::Amp          => '&',
            Self::Pipe         => '|',
            Self::Less         => '<',
            Self::Greater      => '>',
            Self::Eq           => '=',
            Self::Tilde        => '~',
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_span_fragment() {
        const CODE: &str = "let x = 10;";

        let spans = &[
            Span::new(0, 3), // let
            Span::new(4, 1), // x
            Span::new(6, 1), // =
            Span::new(8, 2), // 10
        ];

        assert_eq!(spans[0].fragment(CODE), "let");
        assert_eq!(spans[1].fragment(CODE), "x");
        assert_eq!(spans[2].fragment(CODE), "=");
        assert_eq!(spans[3].fragment(CODE), "10");
    }

    #[test]
    #[rustfmt::skip]
    fn test_span_surrounding_line() {
        const CODE: &str = "------------\n....here....\n------------";

        let span = Span::new(17, 4);
        assert_eq!(span.fragment(CODE), "here");

        let (line, line_span) = span.surrounding_line(CODE);
        assert_eq!(line, "....here....\n");
        assert_eq!(line_span, Span { index: 13, size: 13 });
        assert_eq!(span.line_number(CODE), 2);
    }

    #[test]
    #[rustfmt::skip]
    fn test_span_surrounding_full_text() {
        const CODE: &str = "....here....";

        let span = Span::new(4, 4);
        let (line, line_span) = span.surrounding_line(CODE);
        assert_eq!(line, "....here....");
        assert_eq!(line_span, Span { index: 0, size: 12 });
        assert_eq!(span.line_number(CODE), 1);
    }

    #[test]
    fn test_keyword_roundtrip() {
        for word in ["class", "constructor", "method", "boolean", "null", "return"] {
            let keyword = Keyword::parse(word).unwrap();
            assert_eq!(keyword.as_str(), word);
        }
        assert_eq!(Keyword::parse("Class"), None);
        assert_eq!(Keyword::parse("classy"), None);
    }

    #[test]
    fn test_symbol_set() {
        let all = "{}()[].,;+-*/&|<>=~";
        assert_eq!(all.chars().filter_map(Symbol::from_char).count(), 19);
        for c in all.chars() {
            assert_eq!(Symbol::from_char(c).unwrap().as_char(), c);
        }
        assert_eq!(Symbol::from_char('!'), None);
    }

    #[test]
    fn test_string_value() {
        let token = Token {
            span: Span::new(0, 7),
            kind: TokenKind::StrConst,
            text: SmolStr::new("\"hello\""),
        };
        assert_eq!(token.string_value(), Some("hello"));
        assert_eq!(token.int_value(), None);
    }
}
