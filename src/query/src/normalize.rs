//! Normalization passes over the query tree
//!
//! Three pure passes, always applied in the order
//! project → push negation → fold constants:
//!
//! 1. [`project_for_entity_kind`] resolves every operator against the schema
//!    of one entity kind, replacing predicates the kind cannot satisfy with
//!    boolean literals.
//! 2. [`push_negation`] moves negation to the leaves (De Morgan), flipping
//!    the `negated` flag of value operators instead of wrapping them.
//! 3. [`fold_constants`] collapses boolean literals and single-child
//!    operators.
//!
//! The composed pipeline, [`normalize`], is idempotent.

use crate::ast::{EqualMatch, PresenceMatch, QueryExpression, WildcardMatch};
use crate::schema::{object_classes, role_of, AttributeRole};
use dirgate_core::EntityKind;

/// Run the full pipeline for `kind`
pub fn normalize(kind: EntityKind, expr: &QueryExpression) -> QueryExpression {
    fold_constants(&push_negation(&project_for_entity_kind(kind, expr)))
}

/// Resolve operators against the schema of `kind`
///
/// Field and membership operators are kept for the evaluators.
/// `objectClass` predicates are decided here. Anything else folds to
/// `false`, except presence tests, which fold to "absent".
pub fn project_for_entity_kind(kind: EntityKind, expr: &QueryExpression) -> QueryExpression {
    match expr {
        QueryExpression::BooleanValue(_) => expr.clone(),
        QueryExpression::And(children) => QueryExpression::And(project_all(kind, children)),
        QueryExpression::Or(children) => QueryExpression::Or(project_all(kind, children)),
        QueryExpression::Not(children) => QueryExpression::Not(project_all(kind, children)),
        QueryExpression::Equal(op) => project_equal(kind, op),
        QueryExpression::Wildcard(op) => project_wildcard(kind, op),
        QueryExpression::Presence(op) => project_presence(kind, op),
    }
}

fn project_all(kind: EntityKind, children: &[QueryExpression]) -> Vec<QueryExpression> {
    children
        .iter()
        .map(|child| project_for_entity_kind(kind, child))
        .collect()
}

fn project_equal(kind: EntityKind, op: &EqualMatch) -> QueryExpression {
    match role_of(kind, &op.attribute) {
        AttributeRole::Field(_) | AttributeRole::Membership(_) => op.clone().into(),
        AttributeRole::ObjectClass => {
            let has_class = object_classes(kind)
                .iter()
                .any(|class| class.eq_ignore_ascii_case(&op.value));
            QueryExpression::BooleanValue(has_class != op.negated)
        }
        AttributeRole::NotApplicable => QueryExpression::BooleanValue(false),
    }
}

fn project_wildcard(kind: EntityKind, op: &WildcardMatch) -> QueryExpression {
    match role_of(kind, &op.attribute) {
        AttributeRole::Field(_) => op.clone().into(),
        AttributeRole::ObjectClass => {
            let folded = op.clone().ignore_case();
            let has_class = object_classes(kind).iter().any(|class| folded.matches(class));
            QueryExpression::BooleanValue(has_class != op.negated)
        }
        AttributeRole::Membership(_) | AttributeRole::NotApplicable => {
            QueryExpression::BooleanValue(false)
        }
    }
}

fn project_presence(kind: EntityKind, op: &PresenceMatch) -> QueryExpression {
    match role_of(kind, &op.attribute) {
        AttributeRole::Field(_) | AttributeRole::Membership(_) => op.clone().into(),
        AttributeRole::ObjectClass => QueryExpression::BooleanValue(!op.negated),
        AttributeRole::NotApplicable => QueryExpression::BooleanValue(op.negated),
    }
}

/// Move every negation down to the leaves
///
/// The result contains no `Not` nodes.
pub fn push_negation(expr: &QueryExpression) -> QueryExpression {
    match expr {
        QueryExpression::And(children) => QueryExpression::And(children.iter().map(push_negation).collect()),
        QueryExpression::Or(children) => QueryExpression::Or(children.iter().map(push_negation).collect()),
        // "no child matches" is the conjunction of the negated children
        QueryExpression::Not(children) => match children.as_slice() {
            [child] => negate(child),
            _ => QueryExpression::And(children.iter().map(negate).collect()),
        },
        _ => expr.clone(),
    }
}

/// Negation of `expr`, already pushed to the leaves
fn negate(expr: &QueryExpression) -> QueryExpression {
    match expr {
        QueryExpression::BooleanValue(value) => QueryExpression::BooleanValue(!value),
        QueryExpression::And(children) => QueryExpression::Or(children.iter().map(negate).collect()),
        QueryExpression::Or(children) => QueryExpression::And(children.iter().map(negate).collect()),
        QueryExpression::Not(children) => match children.as_slice() {
            [child] => push_negation(child),
            _ => QueryExpression::Or(children.iter().map(push_negation).collect()),
        },
        QueryExpression::Equal(op) => op.negated().into(),
        QueryExpression::Wildcard(op) => op.negated().into(),
        QueryExpression::Presence(op) => op.negated().into(),
    }
}

/// Collapse boolean literals and trivial operators
///
/// `And` short-circuits on `false` and drops `true` children, `Or` the
/// reverse. Single-child `And`/`Or` unwrap, nested operators of the same
/// kind are flattened, and empty operators resolve to their identity:
/// `And([])` and `Not([])` are true, `Or([])` is false.
pub fn fold_constants(expr: &QueryExpression) -> QueryExpression {
    match expr {
        QueryExpression::And(children) => fold_junction(children, true),
        QueryExpression::Or(children) => fold_junction(children, false),
        QueryExpression::Not(children) => match children.as_slice() {
            [] => QueryExpression::BooleanValue(true),
            [child] => match fold_constants(child) {
                QueryExpression::BooleanValue(value) => QueryExpression::BooleanValue(!value),
                folded => QueryExpression::Not(vec![folded]),
            },
            _ => {
                let singles = children
                    .iter()
                    .map(|child| QueryExpression::Not(vec![child.clone()]))
                    .collect::<Vec<_>>();
                fold_junction(&singles, true)
            }
        },
        _ => expr.clone(),
    }
}

/// Fold an `And` (`conjunction == true`) or an `Or`
fn fold_junction(children: &[QueryExpression], conjunction: bool) -> QueryExpression {
    let identity = conjunction;
    let mut kept = Vec::with_capacity(children.len());

    for child in children {
        match fold_constants(child) {
            QueryExpression::BooleanValue(value) if value == identity => {}
            QueryExpression::BooleanValue(_) => return QueryExpression::BooleanValue(!identity),
            QueryExpression::And(nested) if conjunction => kept.extend(nested),
            QueryExpression::Or(nested) if !conjunction => kept.extend(nested),
            folded => kept.push(folded),
        }
    }

    match kept.len() {
        0 => QueryExpression::BooleanValue(identity),
        1 => kept.remove(0),
        _ if conjunction => QueryExpression::And(kept),
        _ => QueryExpression::Or(kept),
    }
}
