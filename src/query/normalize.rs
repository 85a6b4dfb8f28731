//! Expression tree normalization and validation
//!
//! Normalization makes semantically equivalent trees structurally
//! identical, in three passes:
//!
//! 1. Flatten: an AND child of an AND (or OR of an OR) is absorbed into its
//!    parent, bottom-up, so chains of any depth collapse.
//! 2. Collapse: an AND or OR with exactly one child becomes that child.
//!    Ownership of the child moves to the former parent's slot; nothing is
//!    re-cloned.
//! 3. Sort: children of every node are ordered by (match type ordinal,
//!    field path, subtree shape key), children first.
//!
//! Validation rejects trees the planner cannot handle.

use super::errors::{QueryError, QueryResult};
use super::expression::{has_node_in_subtree, Expression, MatchType};
use super::shape::encode_expression_shape;

/// Flattens and collapses a tree. Negations are left untouched; only AND
/// and OR participate.
pub fn normalize_tree(mut root: Expression) -> Expression {
    if root.match_type == MatchType::And || root.match_type == MatchType::Or {
        // Clean up the children before merging them: a nested combinator
        // has already absorbed its own same-type children by the time we
        // look at it.
        let children = std::mem::take(&mut root.children);
        let mut flattened = Vec::with_capacity(children.len());
        for child in children {
            let child = normalize_tree(child);
            if child.match_type == root.match_type {
                flattened.extend(child.children);
            } else {
                flattened.push(child);
            }
        }
        root.children = flattened;

        // AND of one thing is the thing; same for OR.
        if root.children.len() == 1 {
            return root.children.pop().expect("one child");
        }
    }

    root
}

/// Sorts the children of every node into canonical order, children first.
///
/// The subtree shape key breaks ties between children whose kind and path
/// agree, e.g. the two ORs in `AND{OR{a,b}, OR{c,d}}`.
pub fn sort_tree(root: &mut Expression) {
    for child in &mut root.children {
        sort_tree(child);
    }
    if root.children.len() > 1 {
        root.children.sort_by(|a, b| {
            a.match_type
                .ordinal()
                .cmp(&b.match_type.ordinal())
                .then_with(|| a.path.cmp(&b.path))
                .then_with(|| encode_expression_shape(a).cmp(&encode_expression_shape(b)))
        });
    }
}

/// Full normalization: flatten, collapse, sort.
pub fn normalize(root: Expression) -> Expression {
    let mut root = normalize_tree(root);
    sort_tree(&mut root);
    root
}

/// Structural validation, applied after normalization.
///
/// - At most one TEXT node, and never inside a NOR subtree.
/// - At most one GEO_NEAR node, and it must be the root or a direct child
///   of a root AND.
/// - TEXT and GEO_NEAR never coexist.
pub fn validate(root: &Expression) -> QueryResult<()> {
    let num_text = root.count_nodes(MatchType::Text);
    if num_text > 1 {
        return Err(QueryError::bad_value("too many text expressions"));
    }
    if num_text == 1 && has_node_in_subtree(root, MatchType::Text, MatchType::Nor) {
        return Err(QueryError::bad_value("text expression not allowed in nor"));
    }

    let num_geo_near = root.count_nodes(MatchType::GeoNear);
    if num_geo_near > 1 {
        return Err(QueryError::bad_value("too many geoNear expressions"));
    }
    if num_geo_near == 1 {
        let top_level = root.match_type == MatchType::GeoNear
            || (root.match_type == MatchType::And
                && root
                    .children
                    .iter()
                    .any(|c| c.match_type == MatchType::GeoNear));
        if !top_level {
            return Err(QueryError::bad_value("geoNear must be a top-level expression"));
        }
    }

    if num_text > 0 && num_geo_near > 0 {
        return Err(QueryError::bad_value(
            "text and geoNear not allowed in same query",
        ));
    }

    Ok(())
}
