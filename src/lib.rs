pub mod ast;
pub mod cli;
pub mod config;
pub mod diagnostic;
pub mod graph;
pub mod interpreter;
pub mod lexer;
pub mod value;

// Re-export commonly used types for convenience
pub use ast::{Expr, ExprKind, Stmt, StmtKind};
pub use graph::{Graph, NodeId};
pub use interpreter::{run, run_seeded, Interpreter, RunOutcome, SongError};
pub use lexer::{tokenize, Token};
pub use value::Value;
