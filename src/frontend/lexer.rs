use std::{collections::BTreeMap, str::Chars, str::FromStr};

use itertools::{peek_nth, PeekNth};
use once_cell::sync::Lazy;
use strum::EnumString;

use crate::{frontend::SourceFile, middle::diagnostics::DiagnosticSink};

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-based source line
    pub line: usize,
    /// 1-based source column
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /* Words */
    Keyword(Keyword), // extern
    Identifier,       // main

    /* Literals */
    BooleanLiteral, // true
    IntegerLiteral, // 1
    FloatLiteral,   // 1.0
    StringLiteral,  // "hello, world"

    /* Delimiters */
    OpenParen,  // (
    CloseParen, // )
    OpenBrace,  // {
    CloseBrace, // }
    Semicolon,  // ;
    Comma,      // ,
    Colon,      // :

    /* Unary Ops */
    Bang, // !

    /* Unary + Binary Ops */
    Minus, // -

    /* Binary Ops */
    Plus,                 // +
    Asterisk,             // *
    Divide,               // /
    Modulus,              // %
    LogicalAnd,           // &&
    LogicalOr,            // ||
    DoubleEquals,         // ==
    NotEquals,            // !=
    LessThan,             // <
    LessThanOrEqualTo,    // <=
    GreaterThan,          // >
    GreaterThanOrEqualTo, // >=

    /* Assignment */
    Equals, // =
}

impl TokenKind {
    pub fn is_comparison_operator(&self) -> bool {
        matches!(
            self,
            Self::DoubleEquals
                | Self::NotEquals
                | Self::LessThan
                | Self::LessThanOrEqualTo
                | Self::GreaterThan
                | Self::GreaterThanOrEqualTo
        )
    }

    pub fn is_term_operator(&self) -> bool {
        matches!(self, Self::Plus | Self::Minus)
    }

    pub fn is_factor_operator(&self) -> bool {
        matches!(self, Self::Asterisk | Self::Divide | Self::Modulus)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Keyword {
    Extern,
    If,
    Else,
    While,
    For,
    Return,
    As,
}

/// Table of single char tokens (matched after longer sequences are checked for)
static SINGLE_TOKENS: Lazy<BTreeMap<char, TokenKind>> = Lazy::new(|| {
    BTreeMap::from([
        ('(', TokenKind::OpenParen),
        (')', TokenKind::CloseParen),
        ('{', TokenKind::OpenBrace),
        ('}', TokenKind::CloseBrace),
        (';', TokenKind::Semicolon),
        (',', TokenKind::Comma),
        (':', TokenKind::Colon),
        ('!', TokenKind::Bang),
        ('-', TokenKind::Minus),
        ('+', TokenKind::Plus),
        ('*', TokenKind::Asterisk),
        ('/', TokenKind::Divide),
        ('%', TokenKind::Modulus),
        ('=', TokenKind::Equals),
        ('<', TokenKind::LessThan),
        ('>', TokenKind::GreaterThan),
    ])
});

/// Table of two char tokens (checked before `SINGLE_TOKENS`)
static DOUBLE_TOKENS: Lazy<BTreeMap<[char; 2], TokenKind>> = Lazy::new(|| {
    BTreeMap::from([
        (['&', '&'], TokenKind::LogicalAnd),
        (['|', '|'], TokenKind::LogicalOr),
        (['=', '='], TokenKind::DoubleEquals),
        (['!', '='], TokenKind::NotEquals),
        (['<', '='], TokenKind::LessThanOrEqualTo),
        (['>', '='], TokenKind::GreaterThanOrEqualTo),
    ])
});

pub struct Lexer<'source> {
    chars: PeekNth<Chars<'source>>,
    line: usize,
    column: usize,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source SourceFile) -> Self {
        Self {
            chars: peek_nth(source.contents.chars()),
            line: 1,
            column: 1,
        }
    }

    /// Lexes the whole source file. Unrecognized input is reported to the
    /// sink and skipped so a single stray character cannot derail the token
    /// stream.
    pub fn tokenize(mut self, sink: &mut DiagnosticSink) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments(sink);

            let (line, column) = (self.line, self.column);

            let Some(c) = self.peek() else {
                break;
            };

            if c.is_ascii_alphabetic() || c == '_' {
                tokens.push(self.read_word(line, column));
                continue;
            }

            if c.is_ascii_digit() {
                tokens.push(self.read_number(line, column));
                continue;
            }

            if c == '"' {
                if let Some(token) = self.read_string(line, column, sink) {
                    tokens.push(token);
                }
                continue;
            }

            if let (Some(a), Some(b)) = (self.peek(), self.peek_nth(1)) {
                if let Some(kind) = DOUBLE_TOKENS.get(&[a, b]).copied() {
                    self.advance();
                    self.advance();
                    tokens.push(Token {
                        kind,
                        text: [a, b].iter().collect(),
                        line,
                        column,
                    });
                    continue;
                }
            }

            if let Some(kind) = SINGLE_TOKENS.get(&c).copied() {
                self.advance();
                tokens.push(Token {
                    kind,
                    text: c.to_string(),
                    line,
                    column,
                });
                continue;
            }

            sink.error(
                crate::middle::diagnostics::DiagnosticKind::SyntaxError,
                format!("Unexpected character '{c}'"),
                line,
                column,
            );
            self.advance();
        }

        tokens
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_nth(&mut self, n: usize) -> Option<char> {
        self.chars.peek_nth(n).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();

        match c {
            Some('\n') => {
                self.line += 1;
                self.column = 1;
            }
            Some(_) => self.column += 1,
            None => {}
        }

        c
    }

    fn skip_whitespace_and_comments(&mut self, sink: &mut DiagnosticSink) {
        loop {
            while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
                self.advance();
            }

            match (self.peek(), self.peek_nth(1)) {
                (Some('/'), Some('/')) => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                (Some('/'), Some('*')) => {
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    self.advance();

                    loop {
                        match (self.peek(), self.peek_nth(1)) {
                            (Some('*'), Some('/')) => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            (Some(_), _) => {
                                self.advance();
                            }
                            (None, _) => {
                                sink.error(
                                    crate::middle::diagnostics::DiagnosticKind::SyntaxError,
                                    "Unterminated block comment".to_string(),
                                    line,
                                    column,
                                );
                                return;
                            }
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn read_word(&mut self, line: usize, column: usize) -> Token {
        let mut text = String::new();

        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            text.push(self.advance().unwrap());
        }

        let kind = match text.as_str() {
            "true" | "false" => TokenKind::BooleanLiteral,
            word => match Keyword::from_str(word) {
                Ok(keyword) => TokenKind::Keyword(keyword),
                Err(_) => TokenKind::Identifier,
            },
        };

        Token {
            kind,
            text,
            line,
            column,
        }
    }

    fn read_number(&mut self, line: usize, column: usize) -> Token {
        let mut text = String::new();
        let mut kind = TokenKind::IntegerLiteral;

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.advance().unwrap());
        }

        // A '.' followed by a digit makes this a float literal
        if self.peek() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            kind = TokenKind::FloatLiteral;
            text.push(self.advance().unwrap());

            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.advance().unwrap());
            }
        }

        Token {
            kind,
            text,
            line,
            column,
        }
    }

    fn read_string(
        &mut self,
        line: usize,
        column: usize,
        sink: &mut DiagnosticSink,
    ) -> Option<Token> {
        // Consume the opening quote
        self.advance();

        let mut text = String::new();

        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    return Some(Token {
                        kind: TokenKind::StringLiteral,
                        text,
                        line,
                        column,
                    });
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some('"') => text.push('"'),
                        Some('\\') => text.push('\\'),
                        Some(other) => text.push(other),
                        None => {}
                    }
                }
                Some('\n') | None => {
                    sink.error(
                        crate::middle::diagnostics::DiagnosticKind::SyntaxError,
                        "Unterminated string literal".to_string(),
                        line,
                        column,
                    );
                    return None;
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
    }
}
