use std::fmt;

use crate::ast::{
    AllAction, AllTarget, Arg, BinaryOp, DebugTarget, Expr, ExprKind, LosesMode, QueryPattern,
    QueryRelation, Stmt, StmtKind, UnaryOp,
};
use crate::diagnostic::{line_col, Span};
use crate::lexer::Token;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    /// Renders as `[line:column] message` against the source text.
    pub fn render(&self, source: &str) -> String {
        let (line, column) = line_col(source, self.span.start);
        format!("[{}:{}] {}", line, column, self.message)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

pub struct TokenParser {
    tokens: Vec<(Token, Span)>,
    current: usize,
}

impl TokenParser {
    pub fn new(tokens: Vec<(Token, Span)>) -> Self {
        let mut tokens = tokens;
        if tokens.is_empty() {
            tokens.push((Token::Eof, Span::dummy()));
        }
        Self { tokens, current: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current].0
    }

    fn peek_n(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.current + n).map(|(tok, _)| tok)
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.current].1
    }

    /// Never advances past the final `Eof`.
    fn advance(&mut self) -> (Token, Span) {
        let entry = self.tokens[self.current].clone();
        if !matches!(entry.0, Token::Eof) {
            self.current += 1;
        }
        entry
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, ParseError> {
        Err(ParseError {
            message: message.into(),
            span: self.peek_span(),
        })
    }

    fn error_at<T>(&self, span: Span, message: impl Into<String>) -> Result<T, ParseError> {
        Err(ParseError {
            message: message.into(),
            span,
        })
    }

    fn expect_token(&mut self, expected: &Token, what: &str) -> Result<Span, ParseError> {
        if self.peek() == expected {
            Ok(self.advance().1)
        } else {
            self.error(format!(
                "expected {}, found '{}'",
                what,
                self.peek().lexeme()
            ))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Span), ParseError> {
        match self.peek() {
            Token::Ident(_) => {
                let (token, span) = self.advance();
                match token {
                    Token::Ident(name) => Ok((name, span)),
                    _ => unreachable!(),
                }
            }
            other => self.error(format!("expected {}, found '{}'", what, other.lexeme())),
        }
    }

    /// Accepts a plain identifier or the `RELATION` keyword (canonicalized to
    /// the node name `RELATION`).
    fn expect_type_name(&mut self, what: &str) -> Result<(String, Span), ParseError> {
        if matches!(self.peek(), Token::Relation) {
            let (_, span) = self.advance();
            return Ok(("RELATION".to_string(), span));
        }
        self.expect_ident(what)
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Token::Newline) {
            self.advance();
        }
    }

    fn end_of_statement(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            Token::Newline => {
                self.skip_newlines();
                Ok(())
            }
            Token::Eof | Token::End | Token::Else => Ok(()),
            other => self.error(format!(
                "expected end of statement, found '{}'",
                other.lexeme()
            )),
        }
    }

    pub fn parse(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.at_eof() {
            statements.push(self.parse_statement()?);
            self.end_of_statement()?;
            self.skip_newlines();
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let stmt = self.parse_statement_inner()?;
        // Legacy form: a trailing WHEN promotes the statement into the
        // condition of a predicate block.
        if matches!(self.peek(), Token::When) {
            let span = stmt.span;
            self.advance();
            self.expect_token(&Token::Do, "DO")?;
            let body = self.parse_block(&[Token::End])?;
            self.expect_token(&Token::End, "END")?;
            return Ok(Stmt {
                kind: StmtKind::When {
                    condition: Box::new(stmt),
                    body,
                },
                span,
            });
        }
        Ok(stmt)
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Token::Debug => self.parse_debug(),
            Token::All => self.parse_all(),
            Token::Question | Token::QueryVar(_) => self.parse_query(),
            Token::LParen => self.parse_grouped_subject(),
            Token::Chance => self.parse_chance(),
            Token::Ident(_) => self.parse_subject_statement(),
            other => self.error(format!("expected statement, found '{}'", other.lexeme())),
        }
    }

    fn parse_block(&mut self, stops: &[Token]) -> Result<Vec<Stmt>, ParseError> {
        let mut body = Vec::new();
        self.skip_newlines();
        while !stops.iter().any(|stop| stop == self.peek()) {
            if self.at_eof() {
                return self.error("expected END before end of input");
            }
            body.push(self.parse_statement()?);
            self.end_of_statement()?;
            self.skip_newlines();
        }
        Ok(body)
    }

    fn parse_debug(&mut self) -> Result<Stmt, ParseError> {
        let (_, span) = self.advance();
        let (name, name_span) = self.expect_ident("GRAPH, TOKENS, or AST after DEBUG")?;
        let target = match name.to_ascii_lowercase().as_str() {
            "graph" => DebugTarget::Graph,
            "tokens" => DebugTarget::Tokens,
            "ast" => DebugTarget::Ast,
            _ => {
                return self.error_at(
                    name_span,
                    format!("expected GRAPH, TOKENS, or AST after DEBUG, found '{}'", name),
                )
            }
        };
        Ok(Stmt {
            kind: StmtKind::Debug { target },
            span,
        })
    }

    fn parse_all(&mut self) -> Result<Stmt, ParseError> {
        let (_, span) = self.advance();
        let target = match self.peek() {
            Token::Ident(_) => {
                let (name, _) = self.expect_ident("type name")?;
                AllTarget::TypeName(name)
            }
            Token::QueryVar(_) => match self.advance().0 {
                Token::QueryVar(name) => AllTarget::QueryVar(name),
                _ => unreachable!(),
            },
            other => {
                return self.error(format!(
                    "expected a type name or query variable after ALL, found '{}'",
                    other.lexeme()
                ))
            }
        };
        let action = match self.peek() {
            Token::Has => {
                self.advance();
                let (property, _) = self.expect_ident("property name")?;
                let mut args = vec![Arg::Ident(property)];
                if let Some(arg) = self.try_arg() {
                    args.push(arg);
                }
                Some(AllAction {
                    relation: "HAS".to_string(),
                    args,
                })
            }
            Token::Print => {
                self.advance();
                Some(AllAction {
                    relation: "PRINT".to_string(),
                    args: Vec::new(),
                })
            }
            Token::Ident(_) => {
                let (relation, _) = self.expect_ident("relation name")?;
                let args = self.parse_args();
                Some(AllAction { relation, args })
            }
            _ => None,
        };
        Ok(Stmt {
            kind: StmtKind::All { target, action },
            span,
        })
    }

    fn parse_query(&mut self) -> Result<Stmt, ParseError> {
        let (token, span) = self.advance();
        let pattern = match token {
            Token::Question => QueryPattern::Wildcard,
            Token::QueryVar(name) => QueryPattern::Variable(name),
            _ => unreachable!(),
        };
        let relation = match self.peek() {
            Token::Is => QueryRelation::Is,
            Token::Has => QueryRelation::Has,
            Token::Can => QueryRelation::Can,
            other => {
                return self.error(format!(
                    "expected IS, HAS, or CAN in query, found '{}'",
                    other.lexeme()
                ))
            }
        };
        self.advance();
        let target = match self.peek() {
            Token::Ident(_) | Token::Relation => {
                let (name, _) = self.expect_type_name("target")?;
                Some(name)
            }
            _ => None,
        };
        let value = if matches!(relation, QueryRelation::Has) {
            match self.peek() {
                Token::Number(_) | Token::Str(_) => self.try_arg(),
                _ => None,
            }
        } else {
            None
        };
        let where_clause = if matches!(self.peek(), Token::Where) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Stmt {
            kind: StmtKind::Query {
                pattern,
                relation,
                target,
                value,
                where_clause,
            },
            span,
        })
    }

    fn parse_grouped_subject(&mut self) -> Result<Stmt, ParseError> {
        let span = self.peek_span();
        self.advance();
        let inner = self.parse_expression()?;
        let close = self.expect_token(&Token::RParen, "')'")?;
        let subject = Expr {
            kind: ExprKind::Grouping(Box::new(inner)),
            span: span.merge(close),
        };
        self.parse_expression_subject_tail(subject, span)
    }

    fn parse_expression_subject_tail(
        &mut self,
        subject: Expr,
        span: Span,
    ) -> Result<Stmt, ParseError> {
        match self.peek() {
            Token::Print => {
                self.advance();
                Ok(Stmt {
                    kind: StmtKind::ExpressionPrint { subject },
                    span,
                })
            }
            Token::Has => {
                self.advance();
                let (property, _) = self.expect_ident("property name")?;
                let (literal, value) = match self.peek() {
                    Token::LParen => {
                        self.advance();
                        let expr = self.parse_expression()?;
                        self.expect_token(&Token::RParen, "')'")?;
                        (None, Some(expr))
                    }
                    Token::Number(_) | Token::Str(_) | Token::Ident(_) => (self.try_arg(), None),
                    _ => (None, None),
                };
                Ok(Stmt {
                    kind: StmtKind::ExpressionHas {
                        subject,
                        property,
                        literal,
                        value,
                    },
                    span,
                })
            }
            other => self.error(format!(
                "expected PRINT or HAS after expression subject, found '{}'",
                other.lexeme()
            )),
        }
    }

    fn parse_chance(&mut self) -> Result<Stmt, ParseError> {
        let (_, span) = self.advance();
        let percent = match self.peek() {
            Token::Number(_) => {
                let (token, num_span) = self.advance();
                match token {
                    Token::Number(n) => Expr {
                        kind: ExprKind::Number(n),
                        span: num_span,
                    },
                    _ => unreachable!(),
                }
            }
            Token::LParen => {
                let open = self.peek_span();
                self.advance();
                let inner = self.parse_expression()?;
                let close = self.expect_token(&Token::RParen, "')'")?;
                Expr {
                    kind: ExprKind::Grouping(Box::new(inner)),
                    span: open.merge(close),
                }
            }
            other => {
                return self.error(format!(
                    "expected a number or parenthesized expression after CHANCE, found '{}'",
                    other.lexeme()
                ))
            }
        };
        self.expect_token(&Token::Do, "DO")?;
        let body = self.parse_block(&[Token::End, Token::Else])?;
        let else_body = if matches!(self.peek(), Token::Else) {
            self.advance();
            self.expect_token(&Token::Do, "DO")?;
            Some(self.parse_block(&[Token::End])?)
        } else {
            None
        };
        self.expect_token(&Token::End, "END")?;
        Ok(Stmt {
            kind: StmtKind::Chance {
                percent,
                body,
                else_body,
            },
            span,
        })
    }

    fn parse_subject_statement(&mut self) -> Result<Stmt, ParseError> {
        let (subject, span) = self.expect_ident("subject")?;
        match self.peek() {
            Token::Dot => {
                let mut expr = Expr {
                    kind: ExprKind::Identifier(subject),
                    span,
                };
                while matches!(self.peek(), Token::Dot) {
                    self.advance();
                    let (property, prop_span) = self.expect_ident("property name")?;
                    let merged = expr.span.merge(prop_span);
                    expr = Expr {
                        kind: ExprKind::PropertyAccess {
                            object: Box::new(expr),
                            property,
                        },
                        span: merged,
                    };
                }
                self.parse_expression_subject_tail(expr, span)
            }
            Token::Do => {
                self.advance();
                let body = self.parse_block(&[Token::End])?;
                self.expect_token(&Token::End, "END")?;
                Ok(Stmt {
                    kind: StmtKind::DoBlock { subject, body },
                    span,
                })
            }
            Token::Print => {
                self.advance();
                Ok(Stmt {
                    kind: StmtKind::Relation {
                        subject,
                        relation: "PRINT".to_string(),
                        args: Vec::new(),
                    },
                    span,
                })
            }
            Token::Can => {
                self.advance();
                let (ability, _) = self.expect_ident("ability name")?;
                Ok(Stmt {
                    kind: StmtKind::Can { subject, ability },
                    span,
                })
            }
            Token::Loses => {
                self.advance();
                if matches!(self.peek(), Token::Is) {
                    self.advance();
                    let (target, _) = self.expect_type_name("parent name")?;
                    Ok(Stmt {
                        kind: StmtKind::Loses {
                            subject,
                            target,
                            mode: LosesMode::Is,
                        },
                        span,
                    })
                } else {
                    let (target, _) = self.expect_ident("ability or property name")?;
                    Ok(Stmt {
                        kind: StmtKind::Loses {
                            subject,
                            target,
                            mode: LosesMode::Auto,
                        },
                        span,
                    })
                }
            }
            Token::Has => self.parse_has_tail(subject, span),
            Token::Is => {
                self.advance();
                let (type_name, _) = self.expect_type_name("type name after IS")?;
                Ok(Stmt {
                    kind: StmtKind::Relation {
                        subject,
                        relation: "IS".to_string(),
                        args: vec![Arg::Ident(type_name)],
                    },
                    span,
                })
            }
            Token::Each => {
                self.advance();
                let (variable, _) = self.expect_ident("loop variable")?;
                self.expect_token(&Token::Do, "DO")?;
                let body = self.parse_block(&[Token::End])?;
                self.expect_token(&Token::End, "END")?;
                Ok(Stmt {
                    kind: StmtKind::Each {
                        collection: subject,
                        variable,
                        body,
                    },
                    span,
                })
            }
            Token::When => self.parse_when_tail(subject, span),
            Token::Ident(_) => {
                let (relation, _) = self.expect_ident("relation name")?;
                let args = self.parse_args();
                Ok(Stmt {
                    kind: StmtKind::Relation {
                        subject,
                        relation,
                        args,
                    },
                    span,
                })
            }
            other => self.error(format!(
                "expected a relation after '{}', found '{}'",
                subject,
                other.lexeme()
            )),
        }
    }

    fn parse_has_tail(&mut self, subject: String, span: Span) -> Result<Stmt, ParseError> {
        self.advance(); // HAS
        let (property, _) = self.expect_ident("property name after HAS")?;
        match self.peek() {
            Token::LParen => {
                // `HAS prop ( Node )` declares a role slot.
                let is_role = matches!(self.peek_n(1), Some(Token::Ident(word)) if word.eq_ignore_ascii_case("node"))
                    && matches!(self.peek_n(2), Some(Token::RParen));
                if is_role {
                    self.advance();
                    self.advance();
                    self.advance();
                    return Ok(Stmt {
                        kind: StmtKind::RoleDefinition {
                            subject,
                            role: property,
                        },
                        span,
                    });
                }
                self.advance();
                let value = self.parse_expression()?;
                self.expect_token(&Token::RParen, "')'")?;
                Ok(Stmt {
                    kind: StmtKind::HasExpression {
                        subject,
                        property,
                        value,
                    },
                    span,
                })
            }
            Token::Number(_) | Token::Str(_) | Token::Ident(_) => {
                let mut args = vec![Arg::Ident(property)];
                if let Some(arg) = self.try_arg() {
                    args.push(arg);
                }
                Ok(Stmt {
                    kind: StmtKind::Relation {
                        subject,
                        relation: "HAS".to_string(),
                        args,
                    },
                    span,
                })
            }
            _ => Ok(Stmt {
                kind: StmtKind::Relation {
                    subject,
                    relation: "HAS".to_string(),
                    args: vec![Arg::Ident(property)],
                },
                span,
            }),
        }
    }

    fn parse_when_tail(&mut self, subject: String, span: Span) -> Result<Stmt, ParseError> {
        self.advance(); // WHEN
        self.expect_token(&Token::LParen, "'(' after WHEN")?;
        let condition = self.parse_expression()?;
        self.expect_token(&Token::RParen, "')'")?;
        self.expect_token(&Token::Do, "DO")?;
        let body = self.parse_block(&[Token::End, Token::Else])?;
        let mut else_body = None;
        let mut else_when = None;
        if matches!(self.peek(), Token::Else) {
            self.advance();
            if matches!(self.peek(), Token::When) {
                // The chain rebinds the same subject and shares one END,
                // consumed by the innermost clause.
                else_when = Some(Box::new(self.parse_when_tail(subject.clone(), span)?));
            } else {
                self.expect_token(&Token::Do, "DO after ELSE")?;
                else_body = Some(self.parse_block(&[Token::End])?);
                self.expect_token(&Token::End, "END")?;
            }
        } else {
            self.expect_token(&Token::End, "END")?;
        }
        Ok(Stmt {
            kind: StmtKind::WhenExpression {
                subject,
                condition,
                body,
                else_body,
                else_when,
            },
            span,
        })
    }

    fn try_arg(&mut self) -> Option<Arg> {
        match self.peek() {
            Token::Ident(_) | Token::Number(_) | Token::Str(_) => Some(match self.advance().0 {
                Token::Ident(name) => Arg::Ident(name),
                Token::Number(n) => Arg::Number(n),
                Token::Str(s) => Arg::Str(s),
                _ => unreachable!(),
            }),
            _ => None,
        }
    }

    fn parse_args(&mut self) -> Vec<Arg> {
        let mut args = Vec::new();
        loop {
            match self.peek() {
                Token::Comma => {
                    self.advance();
                }
                Token::Ident(_) | Token::Number(_) | Token::Str(_) => {
                    if let Some(arg) = self.try_arg() {
                        args.push(arg);
                    }
                }
                _ => break,
            }
        }
        args
    }

    // Expressions: precedence climbing, lowest first.

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            let span = left.span.merge(right.span);
            left = Expr {
                kind: ExprKind::Binary {
                    left: Box::new(left),
                    op: BinaryOp::Or,
                    right: Box::new(right),
                },
                span,
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        while matches!(self.peek(), Token::And) {
            self.advance();
            let right = self.parse_comparison()?;
            let span = left.span.merge(right.span);
            left = Expr {
                kind: ExprKind::Binary {
                    left: Box::new(left),
                    op: BinaryOp::And,
                    right: Box::new(right),
                },
                span,
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Eq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                Token::Greater => BinaryOp::Greater,
                Token::Less => BinaryOp::Less,
                Token::GreaterEq => BinaryOp::GreaterEq,
                Token::LessEq => BinaryOp::LessEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            let span = left.span.merge(right.span);
            left = Expr {
                kind: ExprKind::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            let span = left.span.merge(right.span);
            left = Expr {
                kind: ExprKind::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            let span = left.span.merge(right.span);
            left = Expr {
                kind: ExprKind::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Token::Not => {
                let (_, span) = self.advance();
                let operand = self.parse_unary()?;
                let merged = span.merge(operand.span);
                Ok(Expr {
                    kind: ExprKind::Unary {
                        op: UnaryOp::Not,
                        expr: Box::new(operand),
                    },
                    span: merged,
                })
            }
            Token::Minus => {
                let (_, span) = self.advance();
                let operand = self.parse_unary()?;
                let merged = span.merge(operand.span);
                Ok(Expr {
                    kind: ExprKind::Unary {
                        op: UnaryOp::Neg,
                        expr: Box::new(operand),
                    },
                    span: merged,
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let (property, prop_span) = self.expect_ident("property name after '.'")?;
                    let span = expr.span.merge(prop_span);
                    expr = Expr {
                        kind: ExprKind::PropertyAccess {
                            object: Box::new(expr),
                            property,
                        },
                        span,
                    };
                }
                Token::Of => {
                    // `prop OF object` desugars to `object.prop`; the left
                    // side must be a bare identifier.
                    let property = match &expr.kind {
                        ExprKind::Identifier(name) => name.clone(),
                        _ => {
                            return self.error_at(
                                expr.span,
                                "left side of OF must be a property name",
                            )
                        }
                    };
                    self.advance();
                    let object = self.parse_postfix()?;
                    let span = expr.span.merge(object.span);
                    expr = Expr {
                        kind: ExprKind::PropertyAccess {
                            object: Box::new(object),
                            property,
                        },
                        span,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let (token, span) = self.advance();
        match token {
            Token::Number(n) => Ok(Expr {
                kind: ExprKind::Number(n),
                span,
            }),
            Token::Str(s) => Ok(Expr {
                kind: ExprKind::Str(s),
                span,
            }),
            Token::Ident(name) => Ok(Expr {
                kind: ExprKind::Identifier(name),
                span,
            }),
            // A query variable in expression position names its binding.
            Token::QueryVar(name) => Ok(Expr {
                kind: ExprKind::Identifier(name),
                span,
            }),
            Token::LParen => {
                let inner = self.parse_expression()?;
                let close = self.expect_token(&Token::RParen, "')'")?;
                Ok(Expr {
                    kind: ExprKind::Grouping(Box::new(inner)),
                    span: span.merge(close),
                })
            }
            Token::Random => {
                let min = self.parse_random_operand()?;
                let max = self.parse_random_operand()?;
                let merged = span.merge(max.span);
                Ok(Expr {
                    kind: ExprKind::Random {
                        min: Box::new(min),
                        max: Box::new(max),
                    },
                    span: merged,
                })
            }
            other => self.error_at(
                span,
                format!("expected expression, found '{}'", other.lexeme()),
            ),
        }
    }

    /// RANDOM takes exactly two primary-ish operands: a number, an identifier
    /// with an optional dotted chain, or a parenthesized expression.
    fn parse_random_operand(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Token::Number(_) => {
                let (token, span) = self.advance();
                match token {
                    Token::Number(n) => Ok(Expr {
                        kind: ExprKind::Number(n),
                        span,
                    }),
                    _ => unreachable!(),
                }
            }
            Token::Ident(_) => {
                let (name, span) = self.expect_ident("identifier")?;
                let mut expr = Expr {
                    kind: ExprKind::Identifier(name),
                    span,
                };
                while matches!(self.peek(), Token::Dot) {
                    self.advance();
                    let (property, prop_span) = self.expect_ident("property name after '.'")?;
                    let merged = expr.span.merge(prop_span);
                    expr = Expr {
                        kind: ExprKind::PropertyAccess {
                            object: Box::new(expr),
                            property,
                        },
                        span: merged,
                    };
                }
                Ok(expr)
            }
            Token::LParen => {
                let (_, span) = self.advance();
                let inner = self.parse_expression()?;
                let close = self.expect_token(&Token::RParen, "')'")?;
                Ok(Expr {
                    kind: ExprKind::Grouping(Box::new(inner)),
                    span: span.merge(close),
                })
            }
            other => self.error(format!(
                "expected a number, identifier, or parenthesized expression in RANDOM, found '{}'",
                other.lexeme()
            )),
        }
    }
}
