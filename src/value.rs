use indexmap::IndexSet;
use std::rc::Rc;

use crate::ast::Stmt;
use crate::graph::NodeId;

/// Keys of the interpreter-managed properties. User syntax cannot produce
/// them: identifiers reject a leading underscore.
pub const ABILITIES_KEY: &str = "_Abilities";
pub const DO_BODY_KEY: &str = "_DoBody";
pub const ITEMS_KEY: &str = "_Items";
pub const ROLES_KEY: &str = "_Roles";

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Node(NodeId),
    /// Ability set stored under `_Abilities`.
    Abilities(IndexSet<String>),
    /// Query result list stored under `_Items`.
    Nodes(Vec<NodeId>),
    /// Deferred relation body stored under `_DoBody`. Shared so repeated
    /// invocations never touch the stored statements.
    Statements(Rc<Vec<Stmt>>),
    /// Declared role slots stored under `_Roles`.
    Roles(Vec<String>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Abilities(a), Value::Abilities(b)) => a == b,
            (Value::Nodes(a), Value::Nodes(b)) => a == b,
            (Value::Statements(a), Value::Statements(b)) => Rc::ptr_eq(a, b),
            (Value::Roles(a), Value::Roles(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn as_number(&self) -> Option<f64> {
        if let Value::Number(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Value::Str(s) = self {
            Some(s.as_ref())
        } else {
            None
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        if let Value::Node(id) = self {
            Some(*id)
        } else {
            None
        }
    }

    /// null, false, 0 and the empty string are falsy; everything else,
    /// node references included, is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }
}

/// Strict same-type equality: node references compare by identity, null only
/// equals null, and numbers compare exactly (the 1e-4 tolerance applies only
/// to HAS predicates, not to `==`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Node(a), Value::Node(b)) => a == b,
        _ => false,
    }
}

/// Integral numbers render without a fraction: `40`, not `40.0`.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(Value::string("x").is_truthy());
        assert!(Value::Node(NodeId::new(0)).is_truthy());
    }

    #[test]
    fn test_strict_equality() {
        assert!(values_equal(&Value::Null, &Value::Null));
        assert!(!values_equal(&Value::Null, &Value::Number(0.0)));
        assert!(!values_equal(&Value::Number(1.0), &Value::string("1")));
        assert!(values_equal(
            &Value::Node(NodeId::new(2)),
            &Value::Node(NodeId::new(2))
        ));
        assert!(!values_equal(
            &Value::Node(NodeId::new(2)),
            &Value::Node(NodeId::new(3))
        ));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(40.0), "40");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-3.0), "-3");
    }
}
