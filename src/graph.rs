use indexmap::IndexMap;
use std::collections::HashSet;

use crate::value::{Value, ABILITIES_KEY};

/// Stable handle to a node. Nodes are only ever appended (or the whole graph
/// cleared), so the insertion index identifies a node for the graph's
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn new(index: usize) -> Self {
        NodeId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    parents: Vec<NodeId>,
    properties: IndexMap<String, Value>,
}

impl Node {
    fn new() -> Self {
        Self {
            parents: Vec::new(),
            properties: IndexMap::new(),
        }
    }
}

/// Insertion-ordered arena of named nodes. Names are case-sensitive and
/// unique.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: IndexMap<String, Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, id: NodeId) -> &Node {
        self.nodes
            .get_index(id.0)
            .map(|(_, node)| node)
            .expect("node id out of bounds")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes
            .get_index_mut(id.0)
            .map(|(_, node)| node)
            .expect("node id out of bounds")
    }

    pub fn get_or_create(&mut self, name: &str) -> NodeId {
        if let Some(index) = self.nodes.get_index_of(name) {
            return NodeId(index);
        }
        let index = self.nodes.len();
        self.nodes.insert(name.to_string(), Node::new());
        NodeId(index)
    }

    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.nodes.get_index_of(name).map(NodeId)
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn name(&self, id: NodeId) -> &str {
        self.nodes
            .get_index(id.0)
            .map(|(name, _)| name.as_str())
            .expect("node id out of bounds")
    }

    /// Node handles in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn parents(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).parents
    }

    /// Idempotent, order-preserving append.
    pub fn add_parent(&mut self, id: NodeId, parent: NodeId) {
        let node = self.node_mut(id);
        if !node.parents.contains(&parent) {
            node.parents.push(parent);
        }
    }

    pub fn remove_parent(&mut self, id: NodeId, parent: NodeId) {
        self.node_mut(id).parents.retain(|&p| p != parent);
    }

    pub fn own_property(&self, id: NodeId, key: &str) -> Option<&Value> {
        self.node(id).properties.get(key)
    }

    pub fn own_property_mut(&mut self, id: NodeId, key: &str) -> Option<&mut Value> {
        self.node_mut(id).properties.get_mut(key)
    }

    pub fn has_own_property(&self, id: NodeId, key: &str) -> bool {
        self.node(id).properties.contains_key(key)
    }

    pub fn own_properties(&self, id: NodeId) -> impl Iterator<Item = (&String, &Value)> + '_ {
        self.node(id).properties.iter()
    }

    pub fn set_property(&mut self, id: NodeId, key: &str, value: Value) {
        self.node_mut(id).properties.insert(key.to_string(), value);
    }

    pub fn remove_property(&mut self, id: NodeId, key: &str) -> bool {
        self.node_mut(id).properties.shift_remove(key).is_some()
    }

    /// Inherited lookup: own properties first, then parents depth-first in
    /// declared order, first hit wins.
    pub fn property(&self, id: NodeId, key: &str) -> Option<Value> {
        let mut visited = HashSet::new();
        self.lookup(id, key, &mut visited).cloned()
    }

    fn lookup<'a>(
        &'a self,
        id: NodeId,
        key: &str,
        visited: &mut HashSet<NodeId>,
    ) -> Option<&'a Value> {
        if !visited.insert(id) {
            return None;
        }
        if let Some(value) = self.node(id).properties.get(key) {
            return Some(value);
        }
        for &parent in &self.node(id).parents {
            if let Some(value) = self.lookup(parent, key, visited) {
                return Some(value);
            }
        }
        None
    }

    /// True when the node carries the name itself or any ancestor does.
    pub fn is_type(&self, id: NodeId, type_name: &str) -> bool {
        let mut visited = HashSet::new();
        self.is_type_inner(id, type_name, &mut visited)
    }

    fn is_type_inner(&self, id: NodeId, type_name: &str, visited: &mut HashSet<NodeId>) -> bool {
        if !visited.insert(id) {
            return false;
        }
        if self.name(id) == type_name {
            return true;
        }
        self.node(id)
            .parents
            .iter()
            .any(|&parent| self.is_type_inner(parent, type_name, visited))
    }

    /// Ability check with inheritance: the node's own `_Abilities` set or any
    /// ancestor's.
    pub fn node_can(&self, id: NodeId, ability: &str) -> bool {
        let mut visited = HashSet::new();
        self.node_can_inner(id, ability, &mut visited)
    }

    fn node_can_inner(&self, id: NodeId, ability: &str, visited: &mut HashSet<NodeId>) -> bool {
        if !visited.insert(id) {
            return false;
        }
        if let Some(Value::Abilities(set)) = self.node(id).properties.get(ABILITIES_KEY) {
            if set.contains(ability) {
                return true;
            }
        }
        self.node(id)
            .parents
            .iter()
            .any(|&parent| self.node_can_inner(parent, ability, visited))
    }

    /// Plain-data export for visualization hosts. Properties keep own entries
    /// whose key is not internal and whose value is not a node reference.
    pub fn to_snapshot(&self) -> Snapshot {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for (name, node) in &self.nodes {
            let mut properties = Vec::new();
            for (key, value) in &node.properties {
                if key.starts_with('_') || matches!(value, Value::Node(_)) {
                    continue;
                }
                properties.push((key.clone(), value.clone()));
            }
            let abilities = match node.properties.get(ABILITIES_KEY) {
                Some(Value::Abilities(set)) => set.iter().cloned().collect(),
                _ => Vec::new(),
            };
            nodes.push(SnapshotNode {
                id: name.clone(),
                name: name.clone(),
                properties,
                abilities,
            });
            for &parent in &node.parents {
                edges.push(SnapshotEdge {
                    source: name.clone(),
                    target: self.name(parent).to_string(),
                    edge_type: "IS".to_string(),
                });
            }
        }
        Snapshot { nodes, edges }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotNode {
    pub id: String,
    pub name: String,
    pub properties: Vec<(String, Value)>,
    pub abilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEdge {
    pub source: String,
    pub target: String,
    pub edge_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
}

fn scalar_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::json!(b),
        Value::Number(n) => serde_json::json!(n),
        Value::Str(s) => serde_json::json!(s.as_ref()),
        _ => serde_json::Value::Null,
    }
}

impl Snapshot {
    pub fn to_json(&self) -> serde_json::Value {
        let nodes: Vec<serde_json::Value> = self
            .nodes
            .iter()
            .map(|node| {
                let mut properties = serde_json::Map::new();
                for (key, value) in &node.properties {
                    properties.insert(key.clone(), scalar_to_json(value));
                }
                serde_json::json!({
                    "id": node.id,
                    "name": node.name,
                    "properties": serde_json::Value::Object(properties),
                    "abilities": node.abilities,
                })
            })
            .collect();
        let edges: Vec<serde_json::Value> = self
            .edges
            .iter()
            .map(|edge| {
                serde_json::json!({
                    "source": edge.source,
                    "target": edge.target,
                    "type": edge.edge_type,
                })
            })
            .collect();
        serde_json::json!({ "nodes": nodes, "edges": edges })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexSet;

    #[test]
    fn test_get_or_create_is_stable() {
        let mut graph = Graph::new();
        let a = graph.get_or_create("A");
        let b = graph.get_or_create("B");
        assert_ne!(a, b);
        assert_eq!(graph.get_or_create("A"), a);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.name(a), "A");
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut graph = Graph::new();
        let lower = graph.get_or_create("player");
        let upper = graph.get_or_create("Player");
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_add_parent_idempotent() {
        let mut graph = Graph::new();
        let child = graph.get_or_create("Child");
        let parent = graph.get_or_create("Parent");
        graph.add_parent(child, parent);
        graph.add_parent(child, parent);
        assert_eq!(graph.parents(child), &[parent]);
    }

    #[test]
    fn test_remove_parent_restores_state() {
        let mut graph = Graph::new();
        let child = graph.get_or_create("Child");
        let a = graph.get_or_create("A");
        let b = graph.get_or_create("B");
        graph.add_parent(child, a);
        graph.add_parent(child, b);
        graph.remove_parent(child, a);
        assert_eq!(graph.parents(child), &[b]);
    }

    #[test]
    fn test_inherited_lookup_depth_first() {
        let mut graph = Graph::new();
        let child = graph.get_or_create("Child");
        let first = graph.get_or_create("First");
        let second = graph.get_or_create("Second");
        let grand = graph.get_or_create("Grand");
        graph.add_parent(child, first);
        graph.add_parent(child, second);
        graph.add_parent(first, grand);
        // Depth-first: Grand (behind First) wins over Second.
        graph.set_property(grand, "HP", Value::Number(1.0));
        graph.set_property(second, "HP", Value::Number(2.0));
        assert_eq!(graph.property(child, "HP"), Some(Value::Number(1.0)));
        // Own property always wins.
        graph.set_property(child, "HP", Value::Number(3.0));
        assert_eq!(graph.property(child, "HP"), Some(Value::Number(3.0)));
    }

    #[test]
    fn test_missing_property_is_none() {
        let mut graph = Graph::new();
        let node = graph.get_or_create("Lonely");
        assert_eq!(graph.property(node, "HP"), None);
    }

    #[test]
    fn test_is_type_transitive() {
        let mut graph = Graph::new();
        let squire = graph.get_or_create("Squire");
        let knight = graph.get_or_create("Knight");
        let entity = graph.get_or_create("Entity");
        graph.add_parent(squire, knight);
        graph.add_parent(knight, entity);
        assert!(graph.is_type(squire, "Squire"));
        assert!(graph.is_type(squire, "Knight"));
        assert!(graph.is_type(squire, "Entity"));
        assert!(!graph.is_type(entity, "Squire"));
    }

    #[test]
    fn test_cyclic_parents_terminate() {
        let mut graph = Graph::new();
        let a = graph.get_or_create("A");
        let b = graph.get_or_create("B");
        graph.add_parent(a, b);
        graph.add_parent(b, a);
        assert!(graph.is_type(a, "B"));
        assert!(!graph.is_type(a, "C"));
        assert_eq!(graph.property(a, "missing"), None);
    }

    #[test]
    fn test_node_can_inherits() {
        let mut graph = Graph::new();
        let squire = graph.get_or_create("Squire");
        let knight = graph.get_or_create("Knight");
        graph.add_parent(squire, knight);
        let mut abilities = IndexSet::new();
        abilities.insert("ATTACK".to_string());
        graph.set_property(knight, ABILITIES_KEY, Value::Abilities(abilities));
        assert!(graph.node_can(squire, "ATTACK"));
        assert!(graph.node_can(knight, "ATTACK"));
        assert!(!graph.node_can(knight, "FLY"));
    }

    #[test]
    fn test_snapshot_filters_internal_and_node_values() {
        let mut graph = Graph::new();
        let player = graph.get_or_create("Player");
        let sword = graph.get_or_create("Sword");
        let entity = graph.get_or_create("Entity");
        graph.add_parent(player, entity);
        graph.set_property(player, "HP", Value::Number(100.0));
        graph.set_property(player, "Weapon", Value::Node(sword));
        let mut abilities = IndexSet::new();
        abilities.insert("ATTACK".to_string());
        graph.set_property(player, ABILITIES_KEY, Value::Abilities(abilities));

        let snapshot = graph.to_snapshot();
        let player_node = &snapshot.nodes[0];
        assert_eq!(player_node.name, "Player");
        assert_eq!(player_node.properties.len(), 1);
        assert_eq!(player_node.properties[0].0, "HP");
        assert_eq!(player_node.abilities, vec!["ATTACK".to_string()]);
        assert_eq!(snapshot.edges.len(), 1);
        assert_eq!(snapshot.edges[0].source, "Player");
        assert_eq!(snapshot.edges[0].target, "Entity");
        assert_eq!(snapshot.edges[0].edge_type, "IS");

        let json = snapshot.to_json();
        assert_eq!(json["nodes"][0]["properties"]["HP"], 100.0);
        assert_eq!(json["edges"][0]["type"], "IS");
    }

    #[test]
    fn test_clear() {
        let mut graph = Graph::new();
        graph.get_or_create("A");
        graph.clear();
        assert!(graph.is_empty());
        assert_eq!(graph.get("A"), None);
    }
}
