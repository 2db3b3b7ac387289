use indexmap::IndexSet;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::{
    Arg, BinaryOp, Expr, ExprKind, LosesMode, QueryPattern, QueryRelation, Stmt, StmtKind,
    UnaryOp,
};
use crate::ast::{AllTarget, DebugTarget};
use crate::diagnostic::Span;
use crate::graph::{Graph, NodeId};
use crate::lexer::{tokenize, LexError};
use crate::value::{
    format_number, values_equal, Value, ABILITIES_KEY, DO_BODY_KEY, ITEMS_KEY, ROLES_KEY,
};

use super::dice::Dice;
use super::environment::Environment;
use super::error::RuntimeError;
use super::parser::{ParseError, TokenParser};

/// Numeric tolerance for HAS predicates (legacy WHEN and queries).
const HAS_EPSILON: f64 = 1e-4;

pub struct Interpreter {
    pub graph: Graph,
    env: Environment,
    when_subject: Option<NodeId>,
    dice: Dice,
    on_output: Box<dyn FnMut(&str)>,
}

impl Interpreter {
    pub fn new(on_output: impl FnMut(&str) + 'static) -> Self {
        Self {
            graph: Graph::new(),
            env: Environment::new(),
            when_subject: None,
            dice: Dice::new(),
            on_output: Box::new(on_output),
        }
    }

    /// Pins the CHANCE/RANDOM sequence; used by tests and the host's seed
    /// flag. Not reachable from the language itself.
    pub fn seed(&mut self, seed: u64) {
        self.dice = Dice::seeded(seed);
    }

    pub fn execute(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in statements {
            self.exec_statement(stmt)?;
        }
        Ok(())
    }

    fn emit(&mut self, line: &str) {
        (self.on_output)(line);
    }

    fn exec_block(&mut self, body: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in body {
            self.exec_statement(stmt)?;
        }
        Ok(())
    }

    /// Subject resolution for mutating statements: a node bound in the
    /// environment (role parameter, loop variable) wins, otherwise the node
    /// is created on first mention.
    fn resolve_subject(&mut self, name: &str) -> NodeId {
        if let Some(Value::Node(id)) = self.env.get(name) {
            return *id;
        }
        self.graph.get_or_create(name)
    }

    /// Non-creating subject lookup for predicates and iteration sources.
    fn lookup_subject(&self, name: &str) -> Option<NodeId> {
        if let Some(Value::Node(id)) = self.env.get(name) {
            return Some(*id);
        }
        self.graph.get(name)
    }

    /// Inherited lookup treating a stored Null as absent, which is how the
    /// language reads properties everywhere.
    fn resolved_property(&self, id: NodeId, key: &str) -> Option<Value> {
        self.graph
            .property(id, key)
            .filter(|value| !matches!(value, Value::Null))
    }

    /// HAS value auto-promotion: text naming an existing node stores the
    /// node reference, otherwise the string; numbers stay numbers.
    fn promote_arg(&mut self, arg: &Arg) -> Value {
        match arg {
            Arg::Number(n) => Value::Number(*n),
            Arg::Str(text) | Arg::Ident(text) => match self.graph.get(text) {
                Some(id) => Value::Node(id),
                None => Value::string(text),
            },
        }
    }

    fn display_value(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Node(id) => self.graph.name(*id).to_string(),
            Value::Abilities(set) => {
                let items: Vec<&str> = set.iter().map(|s| s.as_str()).collect();
                format!("{{{}}}", items.join(", "))
            }
            Value::Nodes(ids) => {
                let names: Vec<&str> = ids.iter().map(|&id| self.graph.name(id)).collect();
                format!("[{}]", names.join(", "))
            }
            Value::Statements(_) => "<do block>".to_string(),
            Value::Roles(roles) => {
                let items: Vec<&str> = roles.iter().map(|s| s.as_str()).collect();
                format!("[{}]", items.join(", "))
            }
        }
    }

    /// PRINT resolves the inherited `Name` property, falling back to the
    /// node's own name.
    fn node_print_line(&self, id: NodeId) -> String {
        match self.resolved_property(id, "Name") {
            Some(value) => self.display_value(&value),
            None => self.graph.name(id).to_string(),
        }
    }

    fn exec_statement(&mut self, stmt: &Stmt) -> Result<(), RuntimeError> {
        match &stmt.kind {
            StmtKind::Relation {
                subject,
                relation,
                args,
            } => {
                let sid = self.resolve_subject(subject);
                self.exec_relation(sid, relation, args, stmt.span)
            }
            StmtKind::HasExpression {
                subject,
                property,
                value,
            } => {
                let sid = self.resolve_subject(subject);
                let evaluated = self.eval(value)?;
                self.graph.set_property(sid, property, evaluated);
                Ok(())
            }
            StmtKind::ExpressionPrint { subject } => {
                let value = self.eval(subject)?;
                let line = match value {
                    Value::Node(id) => self.node_print_line(id),
                    other => self.display_value(&other),
                };
                self.emit(&line);
                Ok(())
            }
            StmtKind::ExpressionHas {
                subject,
                property,
                literal,
                value,
            } => {
                let receiver = self.eval(subject)?;
                let sid = match receiver {
                    Value::Node(id) => id,
                    other => {
                        return Err(RuntimeError::type_mismatch(
                            format!(
                                "HAS target must be a node, got {}",
                                self.kind_of(&other)
                            ),
                            subject.span,
                        ))
                    }
                };
                let stored = if let Some(expr) = value {
                    self.eval(expr)?
                } else if let Some(arg) = literal {
                    self.promote_arg(arg)
                } else {
                    Value::Null
                };
                self.graph.set_property(sid, property, stored);
                Ok(())
            }
            StmtKind::RoleDefinition { subject, role } => {
                let sid = self.resolve_subject(subject);
                let mut roles = match self.graph.own_property(sid, ROLES_KEY) {
                    Some(Value::Roles(existing)) => existing.clone(),
                    _ => Vec::new(),
                };
                if !roles.contains(role) {
                    roles.push(role.clone());
                }
                self.graph.set_property(sid, ROLES_KEY, Value::Roles(roles));
                Ok(())
            }
            StmtKind::DoBlock { subject, body } => {
                let sid = self.resolve_subject(subject);
                self.graph.set_property(
                    sid,
                    DO_BODY_KEY,
                    Value::Statements(Rc::new(body.clone())),
                );
                Ok(())
            }
            StmtKind::Can { subject, ability } => {
                let sid = self.resolve_subject(subject);
                match self.graph.own_property_mut(sid, ABILITIES_KEY) {
                    Some(Value::Abilities(set)) => {
                        set.insert(ability.clone());
                    }
                    _ => {
                        let mut set = IndexSet::new();
                        set.insert(ability.clone());
                        self.graph
                            .set_property(sid, ABILITIES_KEY, Value::Abilities(set));
                    }
                }
                Ok(())
            }
            StmtKind::Loses {
                subject,
                target,
                mode,
            } => {
                let sid = self.resolve_subject(subject);
                match mode {
                    LosesMode::Is => {
                        // Silent no-op when the parent is not a known node.
                        if let Some(pid) = self.graph.get(target) {
                            self.graph.remove_parent(sid, pid);
                        }
                    }
                    LosesMode::Auto => {
                        let removed_ability =
                            match self.graph.own_property_mut(sid, ABILITIES_KEY) {
                                Some(Value::Abilities(set)) => set.shift_remove(target),
                                _ => false,
                            };
                        if !removed_ability && self.graph.has_own_property(sid, target) {
                            self.graph.remove_property(sid, target);
                        }
                    }
                }
                Ok(())
            }
            StmtKind::Debug { target } => {
                match target {
                    DebugTarget::Graph => self.dump_graph(),
                    DebugTarget::Tokens => self.emit("DEBUG TOKENS is not implemented"),
                    DebugTarget::Ast => self.emit("DEBUG AST is not implemented"),
                }
                Ok(())
            }
            StmtKind::When { condition, body } => {
                if self.eval_predicate(condition) {
                    self.exec_block(body)
                } else {
                    Ok(())
                }
            }
            StmtKind::WhenExpression {
                subject,
                condition,
                body,
                else_body,
                else_when,
            } => {
                let sid = self.lookup_subject(subject);
                self.env.push_scope();
                if let Some(id) = sid {
                    self.env.bind(subject, Value::Node(id));
                }
                let previous = self.when_subject;
                self.when_subject = sid;
                let cond = self.eval(condition);
                self.when_subject = previous;
                let result = match cond {
                    Ok(value) => {
                        if value.is_truthy() {
                            self.exec_block(body)
                        } else if let Some(chained) = else_when {
                            self.exec_statement(chained)
                        } else if let Some(else_stmts) = else_body {
                            self.exec_block(else_stmts)
                        } else {
                            Ok(())
                        }
                    }
                    Err(err) => Err(err),
                };
                self.env.pop_scope();
                result
            }
            StmtKind::Chance {
                percent,
                body,
                else_body,
            } => {
                let value = self.eval(percent)?;
                let p = self.as_number(&value, percent.span)?;
                let draw = self.dice.percent();
                if (draw as f64) < p {
                    self.exec_block(body)
                } else if let Some(else_stmts) = else_body {
                    self.exec_block(else_stmts)
                } else {
                    Ok(())
                }
            }
            StmtKind::All { target, action } => self.exec_all(target, action.as_ref(), stmt.span),
            StmtKind::Each {
                collection,
                variable,
                body,
            } => {
                let cid = self.lookup_subject(collection).ok_or_else(|| {
                    RuntimeError::node_not_found(
                        format!("unknown collection '{}'", collection),
                        stmt.span,
                    )
                })?;
                let children: Vec<NodeId> = self
                    .graph
                    .ids()
                    .filter(|&id| self.graph.parents(id).contains(&cid))
                    .collect();
                for child in children {
                    self.env.push_scope();
                    self.env.bind(variable, Value::Node(child));
                    let result = self.exec_block(body);
                    self.env.pop_scope();
                    result?;
                }
                Ok(())
            }
            StmtKind::Query {
                pattern,
                relation,
                target,
                value,
                where_clause,
            } => self.exec_query(pattern, *relation, target.as_deref(), value.as_ref(), where_clause.as_ref()),
        }
    }

    /// Dispatch shared by relation statements and ALL actions. Case
    /// insensitive on the relation name.
    fn exec_relation(
        &mut self,
        subject: NodeId,
        relation: &str,
        args: &[Arg],
        span: Span,
    ) -> Result<(), RuntimeError> {
        if relation.eq_ignore_ascii_case("is") {
            if args.len() != 1 {
                return Err(RuntimeError::invalid_operand(
                    "IS expects exactly one parent",
                    span,
                ));
            }
            let parent = self.graph.get_or_create(&args[0].text());
            self.graph.add_parent(subject, parent);
            Ok(())
        } else if relation.eq_ignore_ascii_case("has") {
            let first = match args.first() {
                Some(arg) => arg,
                None => {
                    return Err(RuntimeError::invalid_operand(
                        "HAS expects a property name",
                        span,
                    ))
                }
            };
            let property = first.text();
            let stored = match args.get(1) {
                Some(arg) => self.promote_arg(arg),
                None => Value::Null,
            };
            self.graph.set_property(subject, &property, stored);
            Ok(())
        } else if relation.eq_ignore_ascii_case("print") {
            let line = self.node_print_line(subject);
            self.emit(&line);
            Ok(())
        } else {
            self.exec_custom_relation(subject, relation, args, span)
        }
    }

    fn exec_custom_relation(
        &mut self,
        subject: NodeId,
        relation: &str,
        args: &[Arg],
        span: Span,
    ) -> Result<(), RuntimeError> {
        let rel_id = match self.graph.get(relation) {
            Some(id) => id,
            None => {
                // Unknown relation: degrade to a stub link on the subject.
                if let Some(first) = args.first() {
                    let target = self.graph.get_or_create(&first.text());
                    let target_name = self.graph.name(target).to_string();
                    let key = format!("_{}", relation);
                    self.graph
                        .set_property(subject, &key, Value::string(target_name));
                }
                return Ok(());
            }
        };
        if !self.graph.is_type(rel_id, "RELATION") {
            return Err(RuntimeError::type_mismatch(
                format!("'{}' is not a relation", relation),
                span,
            ));
        }
        let body = match self.graph.own_property(rel_id, DO_BODY_KEY) {
            Some(Value::Statements(stmts)) => Rc::clone(stmts),
            _ => return Ok(()),
        };
        let roles = match self.graph.own_property(rel_id, ROLES_KEY) {
            Some(Value::Roles(names)) => names.clone(),
            _ => Vec::new(),
        };
        self.env.push_scope();
        for (index, role) in roles.iter().enumerate() {
            if index == 0 {
                self.env.bind(role, Value::Node(subject));
            } else if let Some(arg) = args.get(index - 1) {
                let bound = self.graph.get_or_create(&arg.text());
                self.env.bind(role, Value::Node(bound));
            }
        }
        let result = self.exec_block(&body);
        self.env.pop_scope();
        result
    }

    /// Legacy WHEN: a relation-shaped statement read as a predicate.
    fn eval_predicate(&self, stmt: &Stmt) -> bool {
        match &stmt.kind {
            StmtKind::Relation {
                subject,
                relation,
                args,
            } => {
                let id = match self.lookup_subject(subject) {
                    Some(id) => id,
                    None => return false,
                };
                if relation.eq_ignore_ascii_case("is") {
                    match args.first() {
                        Some(arg) => self.graph.is_type(id, &arg.text()),
                        None => false,
                    }
                } else if relation.eq_ignore_ascii_case("has") {
                    let first = match args.first() {
                        Some(arg) => arg,
                        None => return false,
                    };
                    match self.resolved_property(id, &first.text()) {
                        None => false,
                        Some(value) => match args.get(1) {
                            None => true,
                            Some(expected) => self.value_matches(&value, expected),
                        },
                    }
                } else {
                    false
                }
            }
            StmtKind::Can { subject, ability } => match self.lookup_subject(subject) {
                Some(id) => self.graph.node_can(id, ability),
                None => false,
            },
            _ => false,
        }
    }

    /// HAS value comparison: numbers within tolerance, text against strings
    /// or a referenced node's name.
    fn value_matches(&self, value: &Value, expected: &Arg) -> bool {
        match (value, expected) {
            (Value::Number(a), Arg::Number(b)) => (a - b).abs() < HAS_EPSILON,
            (Value::Str(s), Arg::Str(text)) | (Value::Str(s), Arg::Ident(text)) => {
                s.as_ref() == text
            }
            (Value::Node(id), Arg::Str(text)) | (Value::Node(id), Arg::Ident(text)) => {
                self.graph.name(*id) == text
            }
            _ => false,
        }
    }

    fn exec_all(
        &mut self,
        target: &AllTarget,
        action: Option<&crate::ast::AllAction>,
        span: Span,
    ) -> Result<(), RuntimeError> {
        let (label, items) = match target {
            AllTarget::QueryVar(name) => {
                let items = self.graph.get(name).and_then(|id| {
                    match self.graph.own_property(id, ITEMS_KEY) {
                        Some(Value::Nodes(ids)) => Some(ids.clone()),
                        _ => None,
                    }
                });
                match items {
                    Some(ids) if !ids.is_empty() => (format!("?{}", name), ids),
                    _ => {
                        let line = format!(
                            "ALL ?{}: No query results found (run query first)",
                            name
                        );
                        self.emit(&line);
                        return Ok(());
                    }
                }
            }
            AllTarget::TypeName(type_name) => {
                // The type node itself is excluded: ALL lists its instances.
                let ids: Vec<NodeId> = self
                    .graph
                    .ids()
                    .filter(|&id| {
                        self.graph.name(id) != type_name && self.graph.is_type(id, type_name)
                    })
                    .collect();
                (type_name.clone(), ids)
            }
        };
        match action {
            Some(act) => {
                for id in items {
                    self.exec_relation(id, &act.relation, &act.args, span)?;
                }
                Ok(())
            }
            None => {
                let line = format!("ALL {}: {} nodes found", label, items.len());
                self.emit(&line);
                Ok(())
            }
        }
    }

    fn exec_query(
        &mut self,
        pattern: &QueryPattern,
        relation: QueryRelation,
        target: Option<&str>,
        value: Option<&Arg>,
        where_clause: Option<&Expr>,
    ) -> Result<(), RuntimeError> {
        let candidates: Vec<NodeId> = self.graph.ids().collect();
        let mut matches: Vec<NodeId> = candidates
            .into_iter()
            .filter(|&id| self.query_matches(id, relation, target, value))
            .collect();

        if let Some(cond) = where_clause {
            let var_name = match pattern {
                QueryPattern::Variable(name) => name.clone(),
                QueryPattern::Wildcard => "_".to_string(),
            };
            let mut filtered = Vec::new();
            for id in matches {
                self.env.push_scope();
                self.env.bind(&var_name, Value::Node(id));
                // Evaluation errors exclude the candidate silently.
                let keep = matches!(self.eval(cond), Ok(v) if v.is_truthy());
                self.env.pop_scope();
                if keep {
                    filtered.push(id);
                }
            }
            matches = filtered;
        }

        let label = match pattern {
            QueryPattern::Variable(name) => format!("?{}", name),
            QueryPattern::Wildcard => "?".to_string(),
        };
        if let QueryPattern::Variable(name) = pattern {
            let result_node = self.graph.get_or_create(name);
            let query_result = self.graph.get_or_create("QueryResult");
            self.graph.add_parent(result_node, query_result);
            self.graph
                .set_property(result_node, ITEMS_KEY, Value::Nodes(matches.clone()));
        }

        let mut lines = vec![format!("Query {}: {} nodes found", label, matches.len())];
        for id in &matches {
            lines.push(format!("  - {}", self.graph.name(*id)));
        }
        for line in lines {
            self.emit(&line);
        }
        Ok(())
    }

    fn query_matches(
        &self,
        id: NodeId,
        relation: QueryRelation,
        target: Option<&str>,
        value: Option<&Arg>,
    ) -> bool {
        match relation {
            QueryRelation::Is => match target {
                // The type node itself is excluded: a query lists instances.
                Some(type_name) => {
                    self.graph.name(id) != type_name && self.graph.is_type(id, type_name)
                }
                None => true,
            },
            QueryRelation::Has => match target {
                Some(property) => match self.resolved_property(id, property) {
                    None => false,
                    Some(stored) => match value {
                        None => true,
                        Some(expected) => self.value_matches(&stored, expected),
                    },
                },
                None => self.graph.own_properties(id).next().is_some(),
            },
            QueryRelation::Can => match target {
                Some(ability) => self.graph.node_can(id, ability),
                None => matches!(
                    self.graph.own_property(id, ABILITIES_KEY),
                    Some(Value::Abilities(set)) if !set.is_empty()
                ),
            },
        }
    }

    /// Formatted dump of every node, emitted one line at a time. Internal
    /// keys stay hidden apart from `_Abilities` and `_Items`, which get
    /// their own syntax.
    pub fn dump_graph(&mut self) {
        let mut lines = Vec::new();
        if self.graph.is_empty() {
            lines.push("Graph is empty".to_string());
        } else {
            lines.push(format!("=== Graph ({} nodes) ===", self.graph.len()));
            for id in self.graph.ids() {
                lines.push(self.graph.name(id).to_string());
                let parents = self.graph.parents(id);
                if !parents.is_empty() {
                    let names: Vec<&str> =
                        parents.iter().map(|&p| self.graph.name(p)).collect();
                    lines.push(format!("  IS: {}", names.join(", ")));
                }
                for (key, stored) in self.graph.own_properties(id) {
                    if key == ABILITIES_KEY {
                        if let Value::Abilities(set) = stored {
                            let items: Vec<&str> = set.iter().map(|s| s.as_str()).collect();
                            lines.push(format!("  CAN: {}", items.join(", ")));
                        }
                    } else if key == ITEMS_KEY {
                        if let Value::Nodes(ids) = stored {
                            let names: Vec<&str> =
                                ids.iter().map(|&n| self.graph.name(n)).collect();
                            lines.push(format!("  ITEMS: [{}]", names.join(", ")));
                        }
                    } else if key.starts_with('_') {
                        continue;
                    } else {
                        let rendered = match stored {
                            Value::Str(s) => format!("\"{}\"", s),
                            other => self.display_value(other),
                        };
                        lines.push(format!("  {}: {}", key, rendered));
                    }
                }
            }
        }
        for line in lines {
            self.emit(&line);
        }
    }

    fn kind_of(&self, value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Number(_) => "a number",
            Value::Str(_) => "a string",
            Value::Node(_) => "a node",
            _ => "an internal value",
        }
    }

    /// Numeric coercion: numbers as-is, booleans as 0/1, everything else a
    /// type mismatch.
    fn as_number(&self, value: &Value, span: Span) -> Result<f64, RuntimeError> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Null => Err(RuntimeError::type_mismatch(
                "cannot use null as a number",
                span,
            )),
            Value::Str(s) => Err(RuntimeError::type_mismatch(
                format!("cannot use string \"{}\" as a number", s),
                span,
            )),
            Value::Node(id) => Err(RuntimeError::type_mismatch(
                format!("cannot use node '{}' as a number", self.graph.name(*id)),
                span,
            )),
            _ => Err(RuntimeError::type_mismatch(
                "cannot use this value as a number",
                span,
            )),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::string(s)),
            ExprKind::Identifier(name) => self.resolve_identifier(name, expr.span),
            ExprKind::PropertyAccess { object, property } => {
                let receiver = self.eval(object)?;
                match receiver {
                    Value::Node(id) => match self.resolved_property(id, property) {
                        Some(value) => Ok(value),
                        None => Err(RuntimeError::property_not_found(
                            format!(
                                "property '{}' not found on '{}'",
                                property,
                                self.graph.name(id)
                            ),
                            expr.span,
                        )),
                    },
                    other => Err(RuntimeError::type_mismatch(
                        format!(
                            "cannot access property '{}' on {}",
                            property,
                            self.kind_of(&other)
                        ),
                        expr.span,
                    )),
                }
            }
            ExprKind::Binary { left, op, right } => self.eval_binary(left, *op, right, expr.span),
            ExprKind::Unary { op, expr: operand } => match op {
                UnaryOp::Not => {
                    let value = self.eval(operand)?;
                    Ok(Value::Bool(!value.is_truthy()))
                }
                UnaryOp::Neg => {
                    let value = self.eval(operand)?;
                    let n = self.as_number(&value, operand.span)?;
                    Ok(Value::Number(-n))
                }
            },
            ExprKind::Grouping(inner) => self.eval(inner),
            ExprKind::Random { min, max } => {
                let min_value = self.eval(min)?;
                let lo = self.as_number(&min_value, min.span)?.floor() as i64;
                let max_value = self.eval(max)?;
                let hi = self.as_number(&max_value, max.span)?.floor() as i64;
                let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                Ok(Value::Number(self.dice.roll_inclusive(lo, hi) as f64))
            }
        }
    }

    /// Resolution order: environment binding, graph node, then a property of
    /// the active WHEN subject.
    fn resolve_identifier(&mut self, name: &str, span: Span) -> Result<Value, RuntimeError> {
        if let Some(value) = self.env.get(name) {
            return Ok(value.clone());
        }
        if let Some(id) = self.graph.get(name) {
            return Ok(Value::Node(id));
        }
        if let Some(subject) = self.when_subject {
            if let Some(value) = self.resolved_property(subject, name) {
                return Ok(value);
            }
        }
        Err(RuntimeError::node_not_found(
            format!("unknown identifier '{}'", name),
            span,
        ))
    }

    fn eval_binary(
        &mut self,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        span: Span,
    ) -> Result<Value, RuntimeError> {
        // Short-circuit forms return the deciding operand.
        if matches!(op, BinaryOp::And) {
            let l = self.eval(left)?;
            return if l.is_truthy() { self.eval(right) } else { Ok(l) };
        }
        if matches!(op, BinaryOp::Or) {
            let l = self.eval(left)?;
            return if l.is_truthy() { Ok(l) } else { self.eval(right) };
        }

        let l = self.eval(left)?;
        let r = self.eval(right)?;
        match op {
            BinaryOp::Add => {
                if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) {
                    let joined =
                        format!("{}{}", self.display_value(&l), self.display_value(&r));
                    Ok(Value::string(joined))
                } else {
                    let a = self.as_number(&l, left.span)?;
                    let b = self.as_number(&r, right.span)?;
                    Ok(Value::Number(a + b))
                }
            }
            BinaryOp::Sub => {
                let a = self.as_number(&l, left.span)?;
                let b = self.as_number(&r, right.span)?;
                Ok(Value::Number(a - b))
            }
            BinaryOp::Mul => {
                let a = self.as_number(&l, left.span)?;
                let b = self.as_number(&r, right.span)?;
                Ok(Value::Number(a * b))
            }
            BinaryOp::Div => {
                let a = self.as_number(&l, left.span)?;
                let b = self.as_number(&r, right.span)?;
                if b == 0.0 {
                    return Err(RuntimeError::division_by_zero(span));
                }
                Ok(Value::Number(a / b))
            }
            BinaryOp::Mod => {
                let a = self.as_number(&l, left.span)?;
                let b = self.as_number(&r, right.span)?;
                if b == 0.0 {
                    return Err(RuntimeError::division_by_zero(span));
                }
                Ok(Value::Number(a % b))
            }
            BinaryOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
            BinaryOp::NotEq => Ok(Value::Bool(!values_equal(&l, &r))),
            BinaryOp::Greater => {
                let a = self.as_number(&l, left.span)?;
                let b = self.as_number(&r, right.span)?;
                Ok(Value::Bool(a > b))
            }
            BinaryOp::Less => {
                let a = self.as_number(&l, left.span)?;
                let b = self.as_number(&r, right.span)?;
                Ok(Value::Bool(a < b))
            }
            BinaryOp::GreaterEq => {
                let a = self.as_number(&l, left.span)?;
                let b = self.as_number(&r, right.span)?;
                Ok(Value::Bool(a >= b))
            }
            BinaryOp::LessEq => {
                let a = self.as_number(&l, left.span)?;
                let b = self.as_number(&r, right.span)?;
                Ok(Value::Bool(a <= b))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!(),
        }
    }
}

#[derive(Debug)]
pub enum SongError {
    Lex(LexError),
    Parse(ParseError),
    Runtime(RuntimeError),
}

impl SongError {
    /// Renders the error against the source text in its stage's format.
    pub fn render(&self, source: &str) -> String {
        match self {
            SongError::Lex(err) => err.to_string(),
            SongError::Parse(err) => err.render(source),
            SongError::Runtime(err) => err.render(source),
        }
    }
}

impl fmt::Display for SongError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SongError::Lex(err) => write!(f, "{}", err),
            SongError::Parse(err) => write!(f, "{}", err),
            SongError::Runtime(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SongError {}

impl From<LexError> for SongError {
    fn from(err: LexError) -> Self {
        SongError::Lex(err)
    }
}

impl From<ParseError> for SongError {
    fn from(err: ParseError) -> Self {
        SongError::Parse(err)
    }
}

impl From<RuntimeError> for SongError {
    fn from(err: RuntimeError) -> Self {
        SongError::Runtime(err)
    }
}

pub struct RunOutcome {
    pub interpreter: Interpreter,
    pub output: Vec<String>,
}

/// Convenience pipeline: tokenize, parse, execute, collect output lines.
pub fn run(source: &str) -> Result<RunOutcome, SongError> {
    run_inner(source, None)
}

/// Same pipeline with a pinned CHANCE/RANDOM sequence.
pub fn run_seeded(source: &str, seed: u64) -> Result<RunOutcome, SongError> {
    run_inner(source, Some(seed))
}

fn run_inner(source: &str, seed: Option<u64>) -> Result<RunOutcome, SongError> {
    let tokens = tokenize(source)?;
    let statements = TokenParser::new(tokens).parse()?;
    let buffer = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&buffer);
    let mut interpreter = Interpreter::new(move |line: &str| {
        sink.borrow_mut().push(line.to_string());
    });
    if let Some(seed) = seed {
        interpreter.seed(seed);
    }
    interpreter.execute(&statements)?;
    let output = buffer.borrow().clone();
    Ok(RunOutcome {
        interpreter,
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::error::ErrorKind;

    fn output_of(source: &str) -> Vec<String> {
        run(source).expect("program should succeed").output
    }

    fn runtime_error(source: &str) -> RuntimeError {
        match run(source) {
            Err(SongError::Runtime(err)) => err,
            other => panic!("expected runtime error, got {:?}", other.map(|o| o.output)),
        }
    }

    #[test]
    fn test_print_falls_back_to_node_name() {
        assert_eq!(output_of("Player PRINT"), vec!["Player"]);
    }

    #[test]
    fn test_print_prefers_name_property() {
        assert_eq!(
            output_of("Player HAS Name \"Hero\"\nPlayer PRINT"),
            vec!["Hero"]
        );
    }

    #[test]
    fn test_auto_promotion_stores_node_reference() {
        let outcome = run("Sword IS Weapon\nPlayer HAS Weapon Sword").expect("run");
        let graph = &outcome.interpreter.graph;
        let player = graph.get("Player").expect("player exists");
        let sword = graph.get("Sword").expect("sword exists");
        assert_eq!(graph.property(player, "Weapon"), Some(Value::Node(sword)));
    }

    #[test]
    fn test_no_promotion_without_node() {
        let outcome = run("Player HAS Weapon Sword").expect("run");
        let graph = &outcome.interpreter.graph;
        let player = graph.get("Player").expect("player exists");
        assert_eq!(
            graph.property(player, "Weapon"),
            Some(Value::string("Sword"))
        );
    }

    #[test]
    fn test_identifier_resolution_prefers_graph_over_when_subject() {
        // HP exists as a node, so the bare identifier is the node reference
        // and the equality against a number is false.
        let source = "HP IS Stat\nPlayer HAS HP 0\nPlayer WHEN (HP == 0) DO Player PRINT ELSE DO Player HAS Flag 1 END";
        let outcome = run(source).expect("run");
        assert!(outcome.output.is_empty());
    }

    #[test]
    fn test_division_by_zero_error() {
        let err = runtime_error("Player HAS HP (10 / 0)");
        assert_eq!(err.kind, ErrorKind::DivisionByZero);
    }

    #[test]
    fn test_unknown_identifier_error() {
        let err = runtime_error("(Missing + 1) PRINT");
        assert_eq!(err.kind, ErrorKind::NodeNotFound);
    }

    #[test]
    fn test_string_cannot_coerce() {
        let err = runtime_error("Player HAS X (\"5\" * 2)");
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_null_property_reads_as_missing() {
        let err = runtime_error("Player HAS Tag\nPlayer.Tag PRINT");
        assert_eq!(err.kind, ErrorKind::PropertyNotFound);
    }

    #[test]
    fn test_stub_link_for_unknown_relation() {
        let outcome = run("Alice Loves Bob").expect("run");
        let graph = &outcome.interpreter.graph;
        let alice = graph.get("Alice").expect("alice exists");
        assert!(graph.has_node("Bob"));
        assert_eq!(
            graph.property(alice, "_Loves"),
            Some(Value::string("Bob"))
        );
    }

    #[test]
    fn test_non_relation_dispatch_fails() {
        let err = runtime_error("Loves IS Feeling\nAlice Loves Bob");
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
        assert!(err.message.contains("not a relation"));
    }
}
