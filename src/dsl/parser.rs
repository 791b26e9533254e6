//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Piper.
//! The Piper project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Piper DSL Parser Module
//!
//! Recursive-descent parser from the token stream to the script IR. The
//! grammar:
//!
//! ```text
//! script     := pipeline*
//! pipeline   := name "(" param ("," param)* ")" stage* ";"
//! stage      := "|" stage-body
//! stage-body := "project" ident "=" expr ("," ident "=" expr)*
//!             | "project-keep" ident ("," ident)*
//!             | "project-remove" ident ("," ident)*
//!             | "project-rename" ident "=" ident ("," ident "=" ident)*
//!             | "where" expr
//!             | "take" int-literal
//!             | "explode" ident
//!             | "lookup" field ("," field)* "from" ident "on" expr
//! param      := ident ("as" ident)?
//! field      := ident ("=" ident)?
//! ```
//!
//! Expression precedence, low to high: `or`, `and`, comparisons, `+ -`,
//! `* /`, unary `- not`, postfix `[index]`. Keywords are contextual; the
//! lexer delivers them as identifiers.
//!
//! Any malformed input fails the whole parse with a positioned syntax error.
//! No partial scripts are produced.

use crate::errors::{PiperError, Result};
use crate::value::{PiperValue, PiperValueType};

use super::ir::{BinaryOp, ExprDef, ParamDef, PipelineDef, PiperScript, StageDef, UnaryOp};
use super::lexer::{tokenize, Token, TokenKind};

/// Parses a whole script into its IR.
pub fn parse_script(source: &str) -> Result<PiperScript> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).script()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> PiperError {
        let token = self.peek();
        PiperError::syntax(token.line, token.column, message)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {}, found {}", kind, self.peek().kind)))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match &self.peek().kind {
            TokenKind::Ident(_) => match self.advance().kind {
                TokenKind::Ident(name) => Ok(name),
                _ => unreachable!(),
            },
            other => Err(self.error(format!("expected an identifier, found {}", other))),
        }
    }

    /// True and consumes if the next token is the given contextual keyword.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(&self.peek().kind, TokenKind::Ident(name) if name == keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn script(mut self) -> Result<PiperScript> {
        let mut pipelines = Vec::new();
        while self.peek().kind != TokenKind::Eof {
            pipelines.push(self.pipeline()?);
        }
        Ok(PiperScript { pipelines })
    }

    fn pipeline(&mut self) -> Result<PipelineDef> {
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let mut params = vec![self.param()?];
        while self.eat(&TokenKind::Comma) {
            params.push(self.param()?);
        }
        self.expect(TokenKind::RParen)?;

        let mut stages = Vec::new();
        while self.eat(&TokenKind::Pipe) {
            stages.push(self.stage()?);
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(PipelineDef {
            name,
            params,
            stages,
        })
    }

    fn param(&mut self) -> Result<ParamDef> {
        let name = self.expect_ident()?;
        let annotation = if self.eat_keyword("as") {
            let (line, column) = (self.peek().line, self.peek().column);
            let ty = self.expect_ident()?;
            // Annotations document the input type; they must still name one.
            if PiperValueType::parse(&ty).is_none() {
                return Err(PiperError::syntax(
                    line,
                    column,
                    format!("unknown type '{}'", ty),
                ));
            }
            Some(ty)
        } else {
            None
        };
        Ok(ParamDef { name, annotation })
    }

    /// Stage keywords like `project-keep` arrive as three tokens; the minus
    /// is merged back here.
    fn stage_keyword(&mut self) -> Result<String> {
        let mut keyword = self.expect_ident()?;
        if (keyword == "project" || keyword == "ignore") && self.eat(&TokenKind::Minus) {
            keyword.push('-');
            keyword.push_str(&self.expect_ident()?);
        }
        Ok(keyword)
    }

    fn stage(&mut self) -> Result<StageDef> {
        let keyword = self.stage_keyword()?;
        match keyword.as_str() {
            "project" => {
                let mut assigns = vec![self.assignment()?];
                while self.eat(&TokenKind::Comma) {
                    assigns.push(self.assignment()?);
                }
                Ok(StageDef::Project(assigns))
            }
            "project-keep" => Ok(StageDef::ProjectKeep(self.ident_list()?)),
            "project-remove" => Ok(StageDef::ProjectRemove(self.ident_list()?)),
            "project-rename" => {
                let mut renames = vec![self.rename()?];
                while self.eat(&TokenKind::Comma) {
                    renames.push(self.rename()?);
                }
                Ok(StageDef::ProjectRename(renames))
            }
            "where" => Ok(StageDef::Where(self.expr()?)),
            "take" => match self.peek().kind.clone() {
                TokenKind::Int(count) if count >= 0 => {
                    self.advance();
                    Ok(StageDef::Take(count as usize))
                }
                _ => Err(self.error("expected a non-negative integer after 'take'")),
            },
            "top" => self.top(),
            "distinct" => Ok(StageDef::Distinct),
            "ignore-error" => Ok(StageDef::IgnoreError),
            "explode" => Ok(StageDef::Explode(self.expect_ident()?)),
            "lookup" => self.lookup(),
            other => Err(self.error(format!("unknown stage '{}'", other))),
        }
    }

    fn ident_list(&mut self) -> Result<Vec<String>> {
        let mut names = vec![self.expect_ident()?];
        while self.eat(&TokenKind::Comma) {
            names.push(self.expect_ident()?);
        }
        Ok(names)
    }

    fn assignment(&mut self) -> Result<(String, ExprDef)> {
        let name = self.expect_ident()?;
        self.expect(TokenKind::Assign)?;
        Ok((name, self.expr()?))
    }

    fn rename(&mut self) -> Result<(String, String)> {
        let new = self.expect_ident()?;
        self.expect(TokenKind::Assign)?;
        Ok((new, self.expect_ident()?))
    }

    /// `top n by expr (asc | desc)? (nulls (first | last))?`. Descending
    /// with nulls last unless said otherwise.
    fn top(&mut self) -> Result<StageDef> {
        let count = match self.peek().kind.clone() {
            TokenKind::Int(count) if count >= 0 => {
                self.advance();
                count as usize
            }
            _ => return Err(self.error("expected a non-negative integer after 'top'")),
        };
        if !self.eat_keyword("by") {
            return Err(self.error("expected 'by' after the count"));
        }
        let criteria = self.expr()?;
        let descending = if self.eat_keyword("asc") {
            false
        } else {
            self.eat_keyword("desc");
            true
        };
        let nulls_first = if self.eat_keyword("nulls") {
            if self.eat_keyword("first") {
                true
            } else if self.eat_keyword("last") {
                false
            } else {
                return Err(self.error("expected 'first' or 'last' after 'nulls'"));
            }
        } else {
            false
        };
        Ok(StageDef::Top {
            count,
            criteria,
            descending,
            nulls_first,
        })
    }

    /// `lookup out (= field)?, ... from source on key`. A bare output name
    /// reads the source field of the same name.
    fn lookup(&mut self) -> Result<StageDef> {
        let mut fields = Vec::new();
        loop {
            let out = self.expect_ident()?;
            let field = if self.eat(&TokenKind::Assign) {
                self.expect_ident()?
            } else {
                out.clone()
            };
            fields.push((out, field));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        if !self.eat_keyword("from") {
            return Err(self.error("expected 'from' after lookup fields"));
        }
        let source = self.expect_ident()?;
        if !self.eat_keyword("on") {
            return Err(self.error("expected 'on' after lookup source"));
        }
        let key = self.expr()?;
        Ok(StageDef::Lookup {
            fields,
            source,
            key,
        })
    }

    fn expr(&mut self) -> Result<ExprDef> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<ExprDef> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = ExprDef::BinaryOp(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<ExprDef> {
        let mut left = self.comparison()?;
        while self.eat_keyword("and") {
            let right = self.comparison()?;
            left = ExprDef::BinaryOp(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<ExprDef> {
        let left = self.additive()?;
        let op = match self.peek().kind {
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::Ne => BinaryOp::Ne,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::Le => BinaryOp::Le,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.additive()?;
        Ok(ExprDef::BinaryOp(op, Box::new(left), Box::new(right)))
    }

    fn additive(&mut self) -> Result<ExprDef> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            left = ExprDef::BinaryOp(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> Result<ExprDef> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = ExprDef::BinaryOp(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<ExprDef> {
        if self.eat(&TokenKind::Minus) {
            let expr = self.unary()?;
            return Ok(ExprDef::UnaryOp(UnaryOp::Neg, Box::new(expr)));
        }
        if matches!(&self.peek().kind, TokenKind::Ident(name) if name == "not") {
            self.advance();
            let expr = self.unary()?;
            return Ok(ExprDef::UnaryOp(UnaryOp::Not, Box::new(expr)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<ExprDef> {
        let mut expr = self.primary()?;
        while self.eat(&TokenKind::LBracket) {
            let index = self.expr()?;
            self.expect(TokenKind::RBracket)?;
            expr = ExprDef::Index(Box::new(expr), Box::new(index));
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<ExprDef> {
        match self.peek().kind.clone() {
            TokenKind::Int(v) => {
                self.advance();
                Ok(ExprDef::Literal(PiperValue::Int(v)))
            }
            TokenKind::Double(v) => {
                self.advance();
                Ok(ExprDef::Literal(PiperValue::Double(v)))
            }
            TokenKind::Str(v) => {
                self.advance();
                Ok(ExprDef::Literal(PiperValue::String(v)))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Ident(name) => {
                self.advance();
                match name.as_str() {
                    "true" => return Ok(ExprDef::Literal(PiperValue::Bool(true))),
                    "false" => return Ok(ExprDef::Literal(PiperValue::Bool(false))),
                    "null" => return Ok(ExprDef::Literal(PiperValue::Null)),
                    _ => {}
                }
                if self.eat(&TokenKind::LParen) {
                    let mut args = Vec::new();
                    if self.peek().kind != TokenKind::RParen {
                        args.push(self.expr()?);
                        while self.eat(&TokenKind::Comma) {
                            args.push(self.expr()?);
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    Ok(ExprDef::Call(name, args))
                } else {
                    Ok(ExprDef::FieldRef(name))
                }
            }
            other => Err(self.error(format!("unexpected {}", other))),
        }
    }
}
