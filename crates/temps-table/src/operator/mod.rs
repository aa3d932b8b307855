//! Filter operator catalog.
//!
//! Operators and operator sets live in a single namespace-partitioned registry
//! (`namespace.NAME`). The `builtin` namespace is reserved for the operators
//! installed by [`builtin::install`]; user code registers into its own
//! namespaces.

pub mod builtin;

use crate::error::SchemaError;
use crate::types::FilterArity;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

pub use builtin::BUILTIN_NAMESPACE;

static OPERATOR_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+\.\w+$").expect("operator id pattern is valid"));

/// A filter predicate kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operator {
    pub id: String,
    pub name: String,
    pub arity: FilterArity,
}

impl Operator {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arity: FilterArity) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arity,
        }
    }

    pub fn namespace(&self) -> &str {
        self.id.split('.').next().unwrap_or_default()
    }
}

/// A named, flat group of operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorSet {
    pub id: String,
    pub name: String,
    pub operators: Vec<Arc<Operator>>,
}

#[derive(Debug, Clone)]
pub enum OperatorNode {
    Operator(Arc<Operator>),
    Set(Arc<OperatorSet>),
}

impl OperatorNode {
    pub fn id(&self) -> &str {
        match self {
            OperatorNode::Operator(op) => &op.id,
            OperatorNode::Set(set) => &set.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            OperatorNode::Operator(op) => &op.name,
            OperatorNode::Set(set) => &set.name,
        }
    }

    /// Operators this node stands for
    pub fn operators(&self) -> Vec<Arc<Operator>> {
        match self {
            OperatorNode::Operator(op) => vec![op.clone()],
            OperatorNode::Set(set) => set.operators.clone(),
        }
    }
}

/// Prefix a bare operator id with the builtin namespace
pub fn qualify(id: &str) -> String {
    if id.contains('.') {
        id.to_string()
    } else {
        format!("{}.{}", BUILTIN_NAMESPACE, id)
    }
}

#[derive(Default)]
struct CatalogInner {
    nodes: HashMap<String, OperatorNode>,
    names: HashSet<String>,
}

/// Registry of operators and operator sets
#[derive(Default)]
pub struct OperatorCatalog {
    inner: RwLock<CatalogInner>,
}

impl OperatorCatalog {
    /// Create an empty catalog. Use [`OperatorCatalog::with_builtins`] for a
    /// catalog that already holds the builtin operators.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let catalog = Self::new();
        builtin::install(&catalog);
        catalog
    }

    /// Register a user operator
    pub fn register_operator(&self, operator: Operator) -> Result<Arc<Operator>, SchemaError> {
        let operator = Arc::new(operator);
        self.insert(OperatorNode::Operator(operator.clone()), false)?;
        Ok(operator)
    }

    /// Register a user operator set. Members may be operators or other sets;
    /// sets are flattened so the stored set never nests.
    pub fn register_set(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        members: &[&str],
    ) -> Result<Arc<OperatorSet>, SchemaError> {
        let set = Arc::new(self.build_set(id.into(), name.into(), members)?);
        self.insert(OperatorNode::Set(set.clone()), false)?;
        Ok(set)
    }

    pub(crate) fn register_builtin_operator(&self, operator: Operator) -> Result<(), SchemaError> {
        self.insert(OperatorNode::Operator(Arc::new(operator)), true)
    }

    pub(crate) fn register_builtin_set(
        &self,
        id: &str,
        name: &str,
        members: &[&str],
    ) -> Result<(), SchemaError> {
        let set = self.build_set(id.to_string(), name.to_string(), members)?;
        self.insert(OperatorNode::Set(Arc::new(set)), true)
    }

    fn build_set(
        &self,
        id: String,
        name: String,
        members: &[&str],
    ) -> Result<OperatorSet, SchemaError> {
        let mut operators = Vec::new();
        let mut seen = HashSet::new();
        for member in members {
            for op in self.find(&qualify(member))?.operators() {
                if seen.insert(op.id.clone()) {
                    operators.push(op);
                }
            }
        }
        Ok(OperatorSet {
            id,
            name,
            operators,
        })
    }

    fn insert(&self, node: OperatorNode, internal: bool) -> Result<(), SchemaError> {
        let id = node.id().to_string();
        if !OPERATOR_ID.is_match(&id) {
            return Err(SchemaError::InvalidOperatorId(id));
        }
        let namespace = id.split('.').next().unwrap_or_default();
        if namespace == BUILTIN_NAMESPACE && !internal {
            return Err(SchemaError::ReservedNamespace(namespace.to_string()));
        }

        let mut inner = self.inner.write();
        if inner.nodes.contains_key(&id) {
            return Err(SchemaError::DuplicateNodeId(id));
        }
        if inner.names.contains(node.name()) {
            return Err(SchemaError::DuplicateNodeName(node.name().to_string()));
        }
        inner.names.insert(node.name().to_string());
        inner.nodes.insert(id.clone(), node);
        debug!("Registered operator node: {}", id);
        Ok(())
    }

    /// Look up an operator or operator set by its full id
    pub fn find(&self, id: &str) -> Result<OperatorNode, SchemaError> {
        self.inner
            .read()
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| SchemaError::NodeNotExist(id.to_string()))
    }

    /// Look up a single operator; sets are rejected
    pub fn find_operator(&self, id: &str) -> Result<Arc<Operator>, SchemaError> {
        match self.find(id)? {
            OperatorNode::Operator(op) => Ok(op),
            OperatorNode::Set(_) => Err(SchemaError::NodeNotExist(id.to_string())),
        }
    }

    /// Resolve a pipe-separated filter declaration (`SSTR|builtin.ISN|ns.OP`)
    /// into a de-duplicated operator list sorted by id.
    pub fn resolve_filters(&self, spec: &str) -> Result<Vec<Arc<Operator>>, SchemaError> {
        let mut by_id: HashMap<String, Arc<Operator>> = HashMap::new();
        for part in spec.split('|').map(str::trim).filter(|p| !p.is_empty()) {
            for op in self.find(&qualify(part))?.operators() {
                by_id.entry(op.id.clone()).or_insert(op);
            }
        }
        let mut operators: Vec<_> = by_id.into_values().collect();
        operators.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(operators)
    }

    /// All registered nodes sorted by id
    pub fn list(&self) -> Vec<OperatorNode> {
        let mut nodes: Vec<_> = self.inner.read().nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.id().cmp(b.id()));
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_cannot_register_into_builtin_namespace() {
        let catalog = OperatorCatalog::with_builtins();
        let result =
            catalog.register_operator(Operator::new("builtin.FOO", "foo", FilterArity::Single));
        assert_eq!(
            result.unwrap_err(),
            SchemaError::ReservedNamespace("builtin".to_string())
        );
    }

    #[test]
    fn test_duplicate_id_and_name_rejected() {
        let catalog = OperatorCatalog::new();
        catalog
            .register_operator(Operator::new("geo.NEAR", "near", FilterArity::Single))
            .unwrap();

        let dup_id =
            catalog.register_operator(Operator::new("geo.NEAR", "near by", FilterArity::Single));
        assert!(matches!(dup_id, Err(SchemaError::DuplicateNodeId(_))));

        let dup_name =
            catalog.register_operator(Operator::new("geo.CLOSE", "near", FilterArity::Single));
        assert!(matches!(dup_name, Err(SchemaError::DuplicateNodeName(_))));
    }

    #[test]
    fn test_invalid_operator_id() {
        let catalog = OperatorCatalog::new();
        let result = catalog.register_operator(Operator::new("NEAR", "near", FilterArity::Single));
        assert!(matches!(result, Err(SchemaError::InvalidOperatorId(_))));
    }

    #[test]
    fn test_find_unknown_node() {
        let catalog = OperatorCatalog::with_builtins();
        assert_eq!(
            catalog.find("builtin.NOPE").unwrap_err(),
            SchemaError::NodeNotExist("builtin.NOPE".to_string())
        );
    }

    #[test]
    fn test_resolve_filters_expands_dedupes_and_sorts() {
        let catalog = OperatorCatalog::with_builtins();
        let ops = catalog.resolve_filters("SOPT | EQ | SNULLABLE").unwrap();
        let ids: Vec<_> = ops.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "builtin.EQ",
                "builtin.IN",
                "builtin.ISN",
                "builtin.ISNN",
                "builtin.NE",
                "builtin.NIN"
            ]
        );
    }

    #[test]
    fn test_user_set_flattens_nested_sets() {
        let catalog = OperatorCatalog::with_builtins();
        catalog
            .register_operator(Operator::new("geo.NEAR", "near", FilterArity::Single))
            .unwrap();
        let set = catalog
            .register_set("geo.SGEO", "geo filters", &["geo.NEAR", "SNULLABLE", "ISN"])
            .unwrap();
        let ids: Vec<_> = set.operators.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["geo.NEAR", "builtin.ISN", "builtin.ISNN"]);

        let resolved = catalog.resolve_filters("geo.SGEO").unwrap();
        assert_eq!(resolved.len(), 3);
    }
}
