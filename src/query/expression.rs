//! Predicate expression trees
//!
//! A filter document parses into a tree of `Expression` nodes. Logical
//! nodes (AND, OR, NOR, NOT) own their children and carry no field path;
//! leaf nodes carry the path they constrain and an opaque payload (the
//! comparison operand, regex source, `$in` array, ...). Payloads are never
//! evaluated here; the tree exists for shape analysis and planning.

use serde_json::Value;

/// Kinds of predicate nodes.
///
/// Declaration order is the node's ordinal and drives canonical child
/// ordering, so variants must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchType {
    And,
    Or,
    Nor,
    Not,
    Lte,
    Lt,
    Eq,
    Gt,
    Gte,
    Regex,
    Mod,
    Exists,
    In,
    Nin,
    Type,
    Size,
    All,
    ElemMatchObject,
    ElemMatchValue,
    Geo,
    GeoNear,
    Text,
    Where,
    Atomic,
    AlwaysFalse,
}

impl MatchType {
    /// Two-character tag used in shape keys.
    pub fn shape_tag(&self) -> &'static str {
        match self {
            MatchType::And => "an",
            MatchType::Or => "or",
            MatchType::Nor => "nr",
            MatchType::Not => "nt",
            MatchType::Lte => "le",
            MatchType::Lt => "lt",
            MatchType::Eq => "eq",
            MatchType::Gt => "gt",
            MatchType::Gte => "ge",
            MatchType::Regex => "re",
            MatchType::Mod => "mo",
            MatchType::Exists => "ex",
            MatchType::In => "in",
            MatchType::Nin => "ni",
            MatchType::Type => "ty",
            MatchType::Size => "sz",
            MatchType::All => "al",
            MatchType::ElemMatchObject => "eo",
            MatchType::ElemMatchValue => "ev",
            MatchType::Geo => "go",
            MatchType::GeoNear => "gn",
            MatchType::Text => "te",
            MatchType::Where => "wh",
            MatchType::Atomic => "at",
            MatchType::AlwaysFalse => "af",
        }
    }

    /// Ordinal used for canonical child ordering.
    pub fn ordinal(&self) -> u32 {
        *self as u32
    }

    /// Returns true for the pure combinators (AND, OR, NOR, NOT).
    pub fn is_logical(&self) -> bool {
        matches!(
            self,
            MatchType::And | MatchType::Or | MatchType::Nor | MatchType::Not
        )
    }
}

/// One node of a predicate tree. A node exclusively owns its children.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// Node kind
    pub match_type: MatchType,
    /// Field path this node constrains; empty for pure combinators
    pub path: String,
    /// Owned children, empty for leaves
    pub children: Vec<Expression>,
    /// Opaque payload (comparison operand, regex source, array, ...)
    pub payload: Value,
}

impl Expression {
    /// Creates a logical combinator node over the given children.
    pub fn logical(match_type: MatchType, children: Vec<Expression>) -> Self {
        Self {
            match_type,
            path: String::new(),
            children,
            payload: Value::Null,
        }
    }

    /// Creates a leaf node on a field path.
    pub fn leaf(match_type: MatchType, path: impl Into<String>, payload: Value) -> Self {
        Self {
            match_type,
            path: path.into(),
            children: Vec::new(),
            payload,
        }
    }

    /// AND over children
    pub fn and(children: Vec<Expression>) -> Self {
        Self::logical(MatchType::And, children)
    }

    /// OR over children
    pub fn or(children: Vec<Expression>) -> Self {
        Self::logical(MatchType::Or, children)
    }

    /// NOR over children
    pub fn nor(children: Vec<Expression>) -> Self {
        Self::logical(MatchType::Nor, children)
    }

    /// Negation of a single child
    pub fn not(child: Expression) -> Self {
        Self::logical(MatchType::Not, vec![child])
    }

    /// Field equality
    pub fn eq(path: impl Into<String>, value: Value) -> Self {
        Self::leaf(MatchType::Eq, path, value)
    }

    /// Text search predicate (no field path)
    pub fn text(search: Value) -> Self {
        Self::leaf(MatchType::Text, "", search)
    }

    /// Geo proximity predicate
    pub fn geo_near(path: impl Into<String>, payload: Value) -> Self {
        Self::leaf(MatchType::GeoNear, path, payload)
    }

    /// Number of direct children
    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    /// True for an AND with no children (the no-predicate filter `{}`)
    pub fn is_empty_and(&self) -> bool {
        self.match_type == MatchType::And && self.children.is_empty()
    }

    /// Counts nodes of the given kind in this subtree, self included.
    pub fn count_nodes(&self, match_type: MatchType) -> usize {
        let own = usize::from(self.match_type == match_type);
        self.children
            .iter()
            .map(|c| c.count_nodes(match_type))
            .sum::<usize>()
            + own
    }

    /// Whether any node of the given kind appears in this subtree.
    pub fn has_node(&self, match_type: MatchType) -> bool {
        self.match_type == match_type || self.children.iter().any(|c| c.has_node(match_type))
    }
}

/// Whether a subtree rooted at a node of kind `subtree_type` contains a node
/// of kind `child_type` anywhere beneath it.
pub fn has_node_in_subtree(
    root: &Expression,
    child_type: MatchType,
    subtree_type: MatchType,
) -> bool {
    if root.match_type == subtree_type {
        return root.has_node(child_type);
    }
    root.children
        .iter()
        .any(|c| has_node_in_subtree(c, child_type, subtree_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shape_tags_unique() {
        let all = [
            MatchType::And,
            MatchType::Or,
            MatchType::Nor,
            MatchType::Not,
            MatchType::Lte,
            MatchType::Lt,
            MatchType::Eq,
            MatchType::Gt,
            MatchType::Gte,
            MatchType::Regex,
            MatchType::Mod,
            MatchType::Exists,
            MatchType::In,
            MatchType::Nin,
            MatchType::Type,
            MatchType::Size,
            MatchType::All,
            MatchType::ElemMatchObject,
            MatchType::ElemMatchValue,
            MatchType::Geo,
            MatchType::GeoNear,
            MatchType::Text,
            MatchType::Where,
            MatchType::Atomic,
            MatchType::AlwaysFalse,
        ];
        let mut tags: Vec<&str> = all.iter().map(|t| t.shape_tag()).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), all.len());
    }

    #[test]
    fn test_ordinal_follows_declaration_order() {
        assert!(MatchType::And.ordinal() < MatchType::Or.ordinal());
        assert!(MatchType::Or.ordinal() < MatchType::Eq.ordinal());
        assert!(MatchType::GeoNear.ordinal() < MatchType::Text.ordinal());
    }

    #[test]
    fn test_count_nodes() {
        let tree = Expression::and(vec![
            Expression::eq("a", json!(1)),
            Expression::or(vec![
                Expression::eq("b", json!(2)),
                Expression::eq("c", json!(3)),
            ]),
        ]);
        assert_eq!(tree.count_nodes(MatchType::Eq), 3);
        assert_eq!(tree.count_nodes(MatchType::Or), 1);
        assert_eq!(tree.count_nodes(MatchType::Nor), 0);
    }

    #[test]
    fn test_has_node_in_subtree() {
        let tree = Expression::nor(vec![
            Expression::or(vec![Expression::text(json!("s")), Expression::eq("a", json!(1))]),
            Expression::eq("a", json!(2)),
        ]);
        assert!(has_node_in_subtree(&tree, MatchType::Text, MatchType::Nor));
        assert!(!has_node_in_subtree(&tree, MatchType::Text, MatchType::And));
    }

    #[test]
    fn test_empty_and() {
        assert!(Expression::and(vec![]).is_empty_and());
        assert!(!Expression::and(vec![Expression::eq("a", json!(1))]).is_empty_and());
        assert!(!Expression::or(vec![]).is_empty_and());
    }
}
