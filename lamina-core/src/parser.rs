//! Recursive-descent parser for the reference surface language.
//!
//! The parser never constructs nodes itself: every node comes from the
//! bootstrap's [`NodeFactory`], so the layers decide what is built and which
//! delegates it carries.

use crate::ast::Node;
use crate::diagnostic::Diagnostic;
use crate::error::CoreError;
use crate::factory::NodeFactory;
use crate::lexer::{KeywordSet, Token, TokenKind, lex};
use crate::span::{FileId, Span};

#[derive(Debug)]
pub struct ParseResult {
    /// `None` when the unit has syntax errors.
    pub file: Option<Node>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse one unit.
///
/// Syntax errors are reported as diagnostics. Only failures of the factory
/// chain are returned as errors.
pub fn parse(
    file_id: FileId,
    source: &str,
    keywords: &KeywordSet,
    nf: &dyn NodeFactory,
) -> Result<ParseResult, CoreError> {
    let lexed = lex(file_id, source, keywords);
    let mut diagnostics = lexed.diagnostics;
    if diagnostics.iter().any(Diagnostic::is_error) {
        return Ok(ParseResult {
            file: None,
            diagnostics,
        });
    }

    let mut parser = Parser {
        source,
        tokens: &lexed.tokens,
        position: 0,
        nf,
    };
    match parser.parse_file() {
        Ok(file) => Ok(ParseResult {
            file: Some(file),
            diagnostics,
        }),
        Err(CoreError::ParseError { span, message }) => {
            diagnostics.push(Diagnostic::error(message, span));
            Ok(ParseResult {
                file: None,
                diagnostics,
            })
        }
        Err(other) => Err(other),
    }
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    position: usize,
    nf: &'a dyn NodeFactory,
}

impl<'a> Parser<'a> {
    fn parse_file(&mut self) -> Result<Node, CoreError> {
        let start = self.peek().span;
        let mut classes = Vec::new();
        while self.peek().kind != TokenKind::Eof {
            classes.push(self.parse_class()?);
        }
        let span = start.to(self.peek().span);
        self.nf.source_file(span, classes)
    }

    fn parse_class(&mut self) -> Result<Node, CoreError> {
        let start = self.expect_keyword("class")?.span;
        let name = self.expect_ident("class name")?;
        let mut params = Vec::new();
        if self.eat(TokenKind::Less) {
            loop {
                params.push(self.expect_ident("type parameter")?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Greater, "`>`")?;
        }
        let superclass = if self.eat_keyword("extends") {
            Some(self.parse_type()?)
        } else {
            None
        };

        let open = self.expect(TokenKind::LBrace, "`{`")?.span;
        let mut members = Vec::new();
        while !self.check(TokenKind::RBrace) {
            if self.peek().kind == TokenKind::Eof {
                return Err(self.error_here("expected `}` to close the class body"));
            }
            members.push(self.parse_member()?);
        }
        let close = self.expect(TokenKind::RBrace, "`}`")?.span;
        let body = self.nf.class_body(open.to(close), members)?;
        self.nf
            .class_decl(start.to(close), name, params, superclass, body)
    }

    fn parse_member(&mut self) -> Result<Node, CoreError> {
        let ty = self.parse_type()?;
        let start = ty.span();
        let name = self.expect_ident("member name")?;

        if self.eat(TokenKind::LParen) {
            let mut formals = Vec::new();
            if !self.check(TokenKind::RParen) {
                loop {
                    let formal_ty = self.parse_type()?;
                    let formal_name = self.expect_ident("parameter name")?;
                    let span = formal_ty.span().to(self.previous_span());
                    formals.push(self.nf.formal(span, formal_ty, formal_name)?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen, "`)`")?;
            let body = if self.eat(TokenKind::Semi) {
                None
            } else {
                Some(self.parse_block()?)
            };
            let span = start.to(self.previous_span());
            return self.nf.method_decl(span, ty, name, formals, body);
        }

        let init = if self.eat(TokenKind::Equal) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semi, "`;`")?;
        let span = start.to(self.previous_span());
        self.nf.field_decl(span, ty, name, init)
    }

    fn parse_type(&mut self) -> Result<Node, CoreError> {
        let token = self.advance();
        let name = match token.kind {
            TokenKind::Ident => token.text(self.source).to_string(),
            TokenKind::Keyword
                if matches!(token.text(self.source), "int" | "boolean" | "void") =>
            {
                token.text(self.source).to_string()
            }
            _ => return Err(self.error_at(token, "expected a type")),
        };
        let mut args = Vec::new();
        if self.eat(TokenKind::Less) {
            loop {
                args.push(self.parse_type()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Greater, "`>`")?;
        }
        let mut ty = self
            .nf
            .amb_type(token.span.to(self.previous_span()), name, args)?;
        while self.eat(TokenKind::LBracket) {
            self.expect(TokenKind::RBracket, "`]`")?;
            let span = ty.span().to(self.previous_span());
            ty = self.nf.array_type(span, ty)?;
        }
        Ok(ty)
    }

    fn parse_block(&mut self) -> Result<Node, CoreError> {
        let open = self.expect(TokenKind::LBrace, "`{`")?.span;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) {
            if self.peek().kind == TokenKind::Eof {
                return Err(self.error_here("expected `}` to close the block"));
            }
            stmts.push(self.parse_stmt()?);
        }
        let close = self.expect(TokenKind::RBrace, "`}`")?.span;
        self.nf.block(open.to(close), stmts)
    }

    fn parse_stmt(&mut self) -> Result<Node, CoreError> {
        let start = self.expect_keyword("return")?.span;
        let expr = if self.check(TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let end = self.expect(TokenKind::Semi, "`;`")?.span;
        self.nf.return_stmt(start.to(end), expr)
    }

    fn parse_expr(&mut self) -> Result<Node, CoreError> {
        let token = self.advance();
        let text = token.text(self.source);
        match token.kind {
            TokenKind::IntLiteral => {
                // `int` is 32 bits wide
                let value = text
                    .replace('_', "")
                    .parse::<i32>()
                    .map_err(|_| self.error_at(token, "integer literal out of range"))?;
                self.nf.int_lit(token.span, i64::from(value))
            }
            TokenKind::Keyword if text == "true" || text == "false" => {
                self.nf.bool_lit(token.span, text == "true")
            }
            TokenKind::Keyword if text == "null" => self.nf.null_lit(token.span),
            TokenKind::Ident => self.nf.local(token.span, text.to_string()),
            _ => Err(self.error_at(token, "expected an expression")),
        }
    }

    fn peek(&self) -> &'a Token {
        let tokens = self.tokens;
        &tokens[self.position.min(tokens.len().saturating_sub(1))]
    }

    fn previous_span(&self) -> Span {
        self.position
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn advance(&mut self) -> &'a Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        let token = self.peek();
        if token.kind == TokenKind::Keyword && token.text(self.source) == word {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<&'a Token, CoreError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(&format!("expected {what}")))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<&'a Token, CoreError> {
        if self.peek().kind == TokenKind::Keyword && self.peek().text(self.source) == word {
            Ok(self.advance())
        } else {
            Err(self.error_here(&format!("expected `{word}`")))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, CoreError> {
        if self.check(TokenKind::Ident) {
            let token = self.advance();
            Ok(token.text(self.source).to_string())
        } else {
            Err(self.error_here(&format!("expected {what}")))
        }
    }

    fn error_here(&self, message: &str) -> CoreError {
        self.error_at(self.peek(), message)
    }

    fn error_at(&self, token: &Token, message: &str) -> CoreError {
        let found = match token.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("`{}`", token.text(self.source)),
        };
        CoreError::ParseError {
            span: token.span,
            message: format!("{message}, found {found}"),
        }
    }
}
