//! Lexer for the reference surface language.

use std::collections::BTreeSet;

use crate::diagnostic::Diagnostic;
use crate::span::{FileId, Span};

/// Reserved words of one layer stack.
///
/// Owned by the bootstrap; there is no global keyword table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet(BTreeSet<String>);

impl KeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, word: &str) {
        self.0.insert(word.to_string());
    }

    pub fn contains(&self, word: &str) -> bool {
        self.0.contains(word)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for KeywordSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = KeywordSet::new();
        for word in iter {
            set.insert(word);
        }
        set
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,

    Ident,
    /// A word in the stack's keyword set.
    Keyword,
    IntLiteral,

    LParen,   // (
    RParen,   // )
    LBrace,   // {
    RBrace,   // }
    LBracket, // [
    RBracket, // ]
    Less,     // <
    Greater,  // >
    Comma,    // ,
    Semi,     // ;
    Equal,    // =
}

/// A single token. `text_start`/`text_end` are byte offsets into the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text_start: u32,
    pub text_end: u32,
}

impl Token {
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.text_start as usize..self.text_end as usize]
    }
}

#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lex `source`, classifying words against `keywords`.
pub fn lex(file_id: FileId, source: &str, keywords: &KeywordSet) -> LexResult {
    let mut lexer = Lexer {
        file_id,
        source,
        chars: source.as_bytes(),
        keywords,
        index: 0,
        diagnostics: Vec::new(),
    };
    lexer.run()
}

struct Lexer<'src> {
    file_id: FileId,
    source: &'src str,
    chars: &'src [u8],
    keywords: &'src KeywordSet,
    index: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    fn run(&mut self) -> LexResult {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) {
                self.consume_char();
                continue;
            }
            if ch == b'/' && self.peek_next() == Some(b'/') {
                self.skip_line();
                continue;
            }

            let start = self.index as u32;
            let kind = match ch {
                b'(' => Some(TokenKind::LParen),
                b')' => Some(TokenKind::RParen),
                b'{' => Some(TokenKind::LBrace),
                b'}' => Some(TokenKind::RBrace),
                b'[' => Some(TokenKind::LBracket),
                b']' => Some(TokenKind::RBracket),
                b'<' => Some(TokenKind::Less),
                b'>' => Some(TokenKind::Greater),
                b',' => Some(TokenKind::Comma),
                b';' => Some(TokenKind::Semi),
                b'=' => Some(TokenKind::Equal),
                _ => None,
            };
            let token = match kind {
                Some(kind) => {
                    self.consume_char();
                    self.simple_token(kind, start)
                }
                None if ch.is_ascii_digit() => self.lex_number(start),
                None if is_ident_start(ch) => self.lex_word(start),
                None => {
                    self.consume_char();
                    self.unexpected_char(start)
                }
            };

            if let Some(tok) = token {
                tokens.push(tok);
            }
        }

        let len = self.chars.len() as u32;
        tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(self.file_id, len, len),
            text_start: len,
            text_end: len,
        });

        LexResult {
            tokens,
            diagnostics: std::mem::take(&mut self.diagnostics),
        }
    }

    fn simple_token(&self, kind: TokenKind, start: u32) -> Option<Token> {
        let end = self.index as u32;
        Some(Token {
            kind,
            span: Span::new(self.file_id, start, end),
            text_start: start,
            text_end: end,
        })
    }

    fn unexpected_char(&mut self, start: u32) -> Option<Token> {
        // Skip the rest of a multi-byte character so spans stay on boundaries.
        while self.peek_char().is_some_and(|ch| ch & 0xC0 == 0x80) {
            self.consume_char();
        }
        let span = Span::new(self.file_id, start, self.index as u32);
        let text = &self.source[start as usize..self.index];
        self.diagnostics
            .push(Diagnostic::error(format!("unexpected character `{text}`"), span));
        None
    }

    fn lex_number(&mut self, start: u32) -> Option<Token> {
        while self.peek_char().is_some_and(|ch| ch.is_ascii_digit() || ch == b'_') {
            self.consume_char();
        }
        self.simple_token(TokenKind::IntLiteral, start)
    }

    fn lex_word(&mut self, start: u32) -> Option<Token> {
        while self.peek_char().is_some_and(is_ident_continue) {
            self.consume_char();
        }
        let text = &self.source[start as usize..self.index];
        let kind = if self.keywords.contains(text) {
            TokenKind::Keyword
        } else {
            TokenKind::Ident
        };
        self.simple_token(kind, start)
    }

    fn skip_line(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == b'\n' {
                break;
            }
            self.consume_char();
        }
    }

    fn peek_char(&self) -> Option<u8> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.chars.get(self.index + 1).copied()
    }

    fn consume_char(&mut self) {
        if self.index < self.chars.len() {
            self.index += 1;
        }
    }
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

/// Dots are allowed inside words so qualified class names lex as one token.
fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit() || ch == b'.'
}
