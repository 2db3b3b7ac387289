use std::fmt;

use crate::diagnostic::Span;
use crate::value::format_number;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Greater,
    Less,
    GreaterEq,
    LessEq,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Greater => ">",
            BinaryOp::Less => "<",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::LessEq => "<=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(f64),
    Str(String),
    Identifier(String),
    PropertyAccess {
        object: Box<Expr>,
        property: String,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Grouping(Box<Expr>),
    Random {
        min: Box<Expr>,
        max: Box<Expr>,
    },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Number(n) => write!(f, "{}", format_number(*n)),
            ExprKind::Str(s) => write!(f, "\"{}\"", s),
            ExprKind::Identifier(name) => write!(f, "{}", name),
            ExprKind::PropertyAccess { object, property } => {
                write!(f, "{}.{}", object, property)
            }
            ExprKind::Binary { left, op, right } => write!(f, "{} {} {}", left, op, right),
            ExprKind::Unary { op, expr } => match op {
                UnaryOp::Not => write!(f, "NOT {}", expr),
                UnaryOp::Neg => write!(f, "-{}", expr),
            },
            ExprKind::Grouping(inner) => write!(f, "({})", inner),
            ExprKind::Random { min, max } => write!(f, "RANDOM {} {}", min, max),
        }
    }
}

/// A literal-or-name argument in a relation statement. Keeps the token shape
/// so node-name based operations (role binding, auto-promotion) can use the
/// source text while HAS keeps numbers numeric.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Number(f64),
    Str(String),
    Ident(String),
}

impl Arg {
    /// The argument as plain text: what node lookups and role binding use.
    pub fn text(&self) -> String {
        match self {
            Arg::Number(n) => format_number(*n),
            Arg::Str(s) => s.clone(),
            Arg::Ident(name) => name.clone(),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Number(n) => write!(f, "{}", format_number(*n)),
            Arg::Str(s) => write!(f, "\"{}\"", s),
            Arg::Ident(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LosesMode {
    /// `LOSES <target>`: ability first, then own property.
    Auto,
    /// `LOSES IS <parent>`: removes a parent edge.
    Is,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebugTarget {
    Graph,
    Tokens,
    Ast,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryPattern {
    Wildcard,
    Variable(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryRelation {
    Is,
    Has,
    Can,
}

impl fmt::Display for QueryRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryRelation::Is => write!(f, "IS"),
            QueryRelation::Has => write!(f, "HAS"),
            QueryRelation::Can => write!(f, "CAN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AllTarget {
    TypeName(String),
    QueryVar(String),
}

/// Relation-shaped action executed per matched node by `ALL`.
#[derive(Debug, Clone, PartialEq)]
pub struct AllAction {
    pub relation: String,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Relation {
        subject: String,
        relation: String,
        args: Vec<Arg>,
    },
    HasExpression {
        subject: String,
        property: String,
        value: Expr,
    },
    ExpressionPrint {
        subject: Expr,
    },
    ExpressionHas {
        subject: Expr,
        property: String,
        literal: Option<Arg>,
        value: Option<Expr>,
    },
    RoleDefinition {
        subject: String,
        role: String,
    },
    DoBlock {
        subject: String,
        body: Vec<Stmt>,
    },
    Can {
        subject: String,
        ability: String,
    },
    Loses {
        subject: String,
        target: String,
        mode: LosesMode,
    },
    Debug {
        target: DebugTarget,
    },
    When {
        condition: Box<Stmt>,
        body: Vec<Stmt>,
    },
    WhenExpression {
        subject: String,
        condition: Expr,
        body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
        else_when: Option<Box<Stmt>>,
    },
    Chance {
        percent: Expr,
        body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
    },
    All {
        target: AllTarget,
        action: Option<AllAction>,
    },
    Each {
        collection: String,
        variable: String,
        body: Vec<Stmt>,
    },
    Query {
        pattern: QueryPattern,
        relation: QueryRelation,
        target: Option<String>,
        value: Option<Arg>,
        where_clause: Option<Expr>,
    },
}

fn write_block(f: &mut fmt::Formatter<'_>, body: &[Stmt]) -> fmt::Result {
    for stmt in body {
        writeln!(f, "{}", stmt)?;
    }
    Ok(())
}

/// Writes a WHEN clause (and its ELSE tail) without the closing END, so
/// chained `ELSE WHEN` segments share a single terminator.
fn write_when_chain(f: &mut fmt::Formatter<'_>, stmt: &Stmt, head: bool) -> fmt::Result {
    if let StmtKind::WhenExpression {
        subject,
        condition,
        body,
        else_body,
        else_when,
    } = &stmt.kind
    {
        if head {
            writeln!(f, "{} WHEN ({}) DO", subject, condition)?;
        } else {
            writeln!(f, "ELSE WHEN ({}) DO", condition)?;
        }
        write_block(f, body)?;
        if let Some(chained) = else_when {
            write_when_chain(f, chained, false)?;
        } else if let Some(else_stmts) = else_body {
            writeln!(f, "ELSE DO")?;
            write_block(f, else_stmts)?;
        }
    }
    Ok(())
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StmtKind::Relation {
                subject,
                relation,
                args,
            } => {
                write!(f, "{} {}", subject, relation)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                Ok(())
            }
            StmtKind::HasExpression {
                subject,
                property,
                value,
            } => write!(f, "{} HAS {} ({})", subject, property, value),
            StmtKind::ExpressionPrint { subject } => write!(f, "{} PRINT", subject),
            StmtKind::ExpressionHas {
                subject,
                property,
                literal,
                value,
            } => {
                write!(f, "{} HAS {}", subject, property)?;
                if let Some(arg) = literal {
                    write!(f, " {}", arg)?;
                } else if let Some(expr) = value {
                    write!(f, " ({})", expr)?;
                }
                Ok(())
            }
            StmtKind::RoleDefinition { subject, role } => {
                write!(f, "{} HAS {} (Node)", subject, role)
            }
            StmtKind::DoBlock { subject, body } => {
                writeln!(f, "{} DO", subject)?;
                write_block(f, body)?;
                write!(f, "END")
            }
            StmtKind::Can { subject, ability } => write!(f, "{} CAN {}", subject, ability),
            StmtKind::Loses {
                subject,
                target,
                mode,
            } => match mode {
                LosesMode::Is => write!(f, "{} LOSES IS {}", subject, target),
                LosesMode::Auto => write!(f, "{} LOSES {}", subject, target),
            },
            StmtKind::Debug { target } => match target {
                DebugTarget::Graph => write!(f, "DEBUG GRAPH"),
                DebugTarget::Tokens => write!(f, "DEBUG TOKENS"),
                DebugTarget::Ast => write!(f, "DEBUG AST"),
            },
            StmtKind::When { condition, body } => {
                writeln!(f, "{} WHEN DO", condition)?;
                write_block(f, body)?;
                write!(f, "END")
            }
            StmtKind::WhenExpression { .. } => {
                write_when_chain(f, self, true)?;
                write!(f, "END")
            }
            StmtKind::Chance {
                percent,
                body,
                else_body,
            } => {
                writeln!(f, "CHANCE {} DO", percent)?;
                write_block(f, body)?;
                if let Some(else_stmts) = else_body {
                    writeln!(f, "ELSE DO")?;
                    write_block(f, else_stmts)?;
                }
                write!(f, "END")
            }
            StmtKind::All { target, action } => {
                match target {
                    AllTarget::TypeName(name) => write!(f, "ALL {}", name)?,
                    AllTarget::QueryVar(name) => write!(f, "ALL ?{}", name)?,
                }
                if let Some(act) = action {
                    write!(f, " {}", act.relation)?;
                    for arg in &act.args {
                        write!(f, " {}", arg)?;
                    }
                }
                Ok(())
            }
            StmtKind::Each {
                collection,
                variable,
                body,
            } => {
                writeln!(f, "{} EACH {} DO", collection, variable)?;
                write_block(f, body)?;
                write!(f, "END")
            }
            StmtKind::Query {
                pattern,
                relation,
                target,
                value,
                where_clause,
            } => {
                match pattern {
                    QueryPattern::Wildcard => write!(f, "?")?,
                    QueryPattern::Variable(name) => write!(f, "?{}", name)?,
                }
                write!(f, " {}", relation)?;
                if let Some(t) = target {
                    write!(f, " {}", t)?;
                }
                if let Some(v) = value {
                    write!(f, " {}", v)?;
                }
                if let Some(cond) = where_clause {
                    write!(f, " WHERE {}", cond)?;
                }
                Ok(())
            }
        }
    }
}
