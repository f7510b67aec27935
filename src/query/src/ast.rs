//! Backend-neutral query expression tree
//!
//! The protocol layer builds one tree per incoming filter; it is normalized,
//! handed to exactly one evaluator, and dropped. Nodes are never mutated:
//! every normalization pass builds a new tree.

use crate::attribute::{normalize_attribute, Attribute};
use once_cell::sync::OnceCell;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use tracing::warn;

/// Escape character used in rendered `LIKE` patterns
pub const LIKE_ESCAPE: char = '\\';

fn canonical_attribute<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    Ok(normalize_attribute(&name))
}

fn fold(value: &str, ignore_case: bool) -> std::borrow::Cow<'_, str> {
    if ignore_case {
        std::borrow::Cow::Owned(value.to_lowercase())
    } else {
        std::borrow::Cow::Borrowed(value)
    }
}

/// Filter expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum QueryExpression {
    BooleanValue(bool),
    /// True when every child matches; empty is true
    And(Vec<QueryExpression>),
    /// True when some child matches; empty is false
    Or(Vec<QueryExpression>),
    /// True when no child matches; empty is true
    Not(Vec<QueryExpression>),
    Equal(EqualMatch),
    Wildcard(WildcardMatch),
    Presence(PresenceMatch),
}

impl QueryExpression {
    pub fn and(children: Vec<QueryExpression>) -> Self {
        QueryExpression::And(children)
    }

    pub fn or(children: Vec<QueryExpression>) -> Self {
        QueryExpression::Or(children)
    }

    pub fn not(children: Vec<QueryExpression>) -> Self {
        QueryExpression::Not(children)
    }

    /// Single-child negation
    pub fn negate(child: QueryExpression) -> Self {
        QueryExpression::Not(vec![child])
    }

    pub fn equal(attribute: &str, value: impl Into<String>) -> Self {
        QueryExpression::Equal(EqualMatch::new(attribute, value))
    }

    pub fn equal_ignore_case(attribute: &str, value: impl Into<String>) -> Self {
        QueryExpression::Equal(EqualMatch::new(attribute, value).ignore_case())
    }

    pub fn wildcard(
        attribute: &str,
        initial: Option<&str>,
        any: &[&str],
        final_: Option<&str>,
    ) -> Self {
        QueryExpression::Wildcard(WildcardMatch::new(attribute, initial, any, final_))
    }

    pub fn presence(attribute: &str) -> Self {
        QueryExpression::Presence(PresenceMatch::new(attribute))
    }

    /// Canonical attribute of a value operator
    pub fn attribute(&self) -> Option<&str> {
        match self {
            QueryExpression::Equal(op) => Some(&op.attribute),
            QueryExpression::Wildcard(op) => Some(&op.attribute),
            QueryExpression::Presence(op) => Some(&op.attribute),
            _ => None,
        }
    }

    pub fn is_operator(&self) -> bool {
        self.attribute().is_some()
    }

    /// Number of nodes in the tree
    pub fn size(&self) -> usize {
        match self {
            QueryExpression::And(children)
            | QueryExpression::Or(children)
            | QueryExpression::Not(children) => {
                1 + children.iter().map(QueryExpression::size).sum::<usize>()
            }
            _ => 1,
        }
    }
}

impl From<EqualMatch> for QueryExpression {
    fn from(op: EqualMatch) -> Self {
        QueryExpression::Equal(op)
    }
}

impl From<WildcardMatch> for QueryExpression {
    fn from(op: WildcardMatch) -> Self {
        QueryExpression::Wildcard(op)
    }
}

impl From<PresenceMatch> for QueryExpression {
    fn from(op: PresenceMatch) -> Self {
        QueryExpression::Presence(op)
    }
}

/// `attribute = value`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EqualMatch {
    #[serde(deserialize_with = "canonical_attribute")]
    pub attribute: String,
    pub value: String,
    #[serde(default)]
    pub negated: bool,
    #[serde(default)]
    pub ignore_case: bool,
}

impl EqualMatch {
    pub fn new(attribute: &str, value: impl Into<String>) -> Self {
        Self {
            attribute: normalize_attribute(attribute),
            value: value.into(),
            negated: false,
            ignore_case: false,
        }
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    /// Same predicate with the negation flag flipped
    pub fn negated(&self) -> Self {
        let mut op = self.clone();
        op.negated = !op.negated;
        op
    }

    /// Comparison ignoring the negation flag
    pub fn matches(&self, value: &str) -> bool {
        fold(value, self.ignore_case) == fold(&self.value, self.ignore_case)
    }

    /// Comparison with the negation flag applied
    pub fn check(&self, value: &str) -> bool {
        self.matches(value) != self.negated
    }
}

impl PartialEq for EqualMatch {
    fn eq(&self, other: &Self) -> bool {
        self.attribute == other.attribute
            && self.negated == other.negated
            && self.ignore_case == other.ignore_case
            && fold(&self.value, self.ignore_case) == fold(&other.value, other.ignore_case)
    }
}

/// Substring match `attribute = initial*any*...*final`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WildcardMatch {
    #[serde(deserialize_with = "canonical_attribute")]
    pub attribute: String,
    #[serde(default)]
    pub initial: Option<String>,
    #[serde(default)]
    pub any: Vec<String>,
    #[serde(default, rename = "final")]
    pub final_: Option<String>,
    #[serde(default)]
    pub negated: bool,
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(skip)]
    compiled: OnceCell<Option<Regex>>,
}

impl WildcardMatch {
    pub fn new(attribute: &str, initial: Option<&str>, any: &[&str], final_: Option<&str>) -> Self {
        Self {
            attribute: normalize_attribute(attribute),
            initial: initial.map(str::to_string),
            any: any.iter().map(|s| s.to_string()).collect(),
            final_: final_.map(str::to_string),
            negated: false,
            ignore_case: false,
            compiled: OnceCell::new(),
        }
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self.compiled = OnceCell::new();
        self
    }

    /// Same predicate with the negation flag flipped
    pub fn negated(&self) -> Self {
        let mut op = self.clone();
        op.negated = !op.negated;
        op
    }

    /// Segments in order, with empty strings standing in for absent
    /// initial/final parts
    fn segments(&self) -> impl Iterator<Item = &str> + '_ {
        std::iter::once(self.initial.as_deref().unwrap_or(""))
            .chain(self.any.iter().map(String::as_str))
            .chain(std::iter::once(self.final_.as_deref().unwrap_or("")))
    }

    /// Anchored regular expression equivalent to the pattern
    pub fn regex_pattern(&self) -> String {
        let body = self
            .segments()
            .map(|segment| regex::escape(segment))
            .collect::<Vec<_>>()
            .join(".*");
        format!("^{}$", body)
    }

    pub fn to_regex(&self) -> Result<Regex, regex::Error> {
        RegexBuilder::new(&self.regex_pattern())
            .case_insensitive(self.ignore_case)
            .dot_matches_new_line(true)
            .build()
    }

    /// SQL `LIKE` pattern with `%`, `_` and the escape character escaped;
    /// lower-cased when the match ignores case
    pub fn like_pattern(&self) -> String {
        let mut pattern = String::new();
        for (index, segment) in self.segments().enumerate() {
            if index > 0 {
                pattern.push('%');
            }
            for c in fold(segment, self.ignore_case).chars() {
                if c == '%' || c == '_' || c == LIKE_ESCAPE {
                    pattern.push(LIKE_ESCAPE);
                }
                pattern.push(c);
            }
        }
        pattern
    }

    /// Pattern match ignoring the negation flag
    pub fn matches(&self, value: &str) -> bool {
        let compiled = self.compiled.get_or_init(|| match self.to_regex() {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!(attribute = %self.attribute, "wildcard pattern rejected: {}", e);
                None
            }
        });
        compiled.as_ref().map_or(false, |regex| regex.is_match(value))
    }

    /// Pattern match with the negation flag applied
    pub fn check(&self, value: &str) -> bool {
        self.matches(value) != self.negated
    }
}

impl PartialEq for WildcardMatch {
    fn eq(&self, other: &Self) -> bool {
        let ignore_case = self.ignore_case;
        let same_segment = |a: &Option<String>, b: &Option<String>| match (a, b) {
            (Some(a), Some(b)) => fold(a, ignore_case) == fold(b, ignore_case),
            (None, None) => true,
            _ => false,
        };
        self.attribute == other.attribute
            && self.negated == other.negated
            && self.ignore_case == other.ignore_case
            && same_segment(&self.initial, &other.initial)
            && same_segment(&self.final_, &other.final_)
            && self.any.len() == other.any.len()
            && self
                .any
                .iter()
                .zip(&other.any)
                .all(|(a, b)| fold(a, ignore_case) == fold(b, ignore_case))
    }
}

/// `attribute=*`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMatch {
    #[serde(deserialize_with = "canonical_attribute")]
    pub attribute: String,
    #[serde(default)]
    pub negated: bool,
}

impl PresenceMatch {
    pub fn new(attribute: &str) -> Self {
        Self {
            attribute: normalize_attribute(attribute),
            negated: false,
        }
    }

    /// Same predicate with the negation flag flipped
    pub fn negated(&self) -> Self {
        Self {
            attribute: self.attribute.clone(),
            negated: !self.negated,
        }
    }

    /// Presence test with the negation flag applied
    pub fn check(&self, present: bool) -> bool {
        present != self.negated
    }
}

fn write_children(f: &mut fmt::Formatter<'_>, prefix: &str, children: &[QueryExpression]) -> fmt::Result {
    write!(f, "({}", prefix)?;
    for child in children {
        write!(f, "{}", child)?;
    }
    write!(f, ")")
}

fn display_name(attribute: &str) -> &str {
    Attribute::from_oid(attribute).map_or(attribute, |a| a.name())
}

/// Renders LDAP filter syntax; negated operators are wrapped in `(!...)`
impl fmt::Display for QueryExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (negated, body) = match self {
            QueryExpression::BooleanValue(true) => return write!(f, "(&)"),
            QueryExpression::BooleanValue(false) => return write!(f, "(|)"),
            QueryExpression::And(children) => return write_children(f, "&", children),
            QueryExpression::Or(children) => return write_children(f, "|", children),
            QueryExpression::Not(children) => return write_children(f, "!", children),
            QueryExpression::Equal(op) => (
                op.negated,
                format!("{}={}", display_name(&op.attribute), op.value),
            ),
            QueryExpression::Wildcard(op) => {
                let segments: Vec<&str> = op.segments().collect();
                (
                    op.negated,
                    format!("{}={}", display_name(&op.attribute), segments.join("*")),
                )
            }
            QueryExpression::Presence(op) => {
                (op.negated, format!("{}=*", display_name(&op.attribute)))
            }
        };
        if negated {
            write!(f, "(!({}))", body)
        } else {
            write!(f, "({})", body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_canonicalize_attributes() {
        let expr = QueryExpression::equal("commonName", "GroupA");
        assert_eq!(expr.attribute(), Some(Attribute::CommonName.oid()));
    }

    #[test]
    fn test_equal_check() {
        let op = EqualMatch::new("cn", "GroupA");
        assert!(op.check("GroupA"));
        assert!(!op.check("groupa"));
        assert!(op.clone().ignore_case().check("GROUPA"));
        assert!(op.negated().check("GroupB"));
    }

    #[test]
    fn test_structural_equality_folds_case() {
        let a = QueryExpression::equal_ignore_case("cn", "Admins");
        let b = QueryExpression::equal_ignore_case("CN", "ADMINS");
        assert_eq!(a, b);
        assert_ne!(QueryExpression::equal("cn", "Admins"), QueryExpression::equal("cn", "ADMINS"));
    }

    #[test]
    fn test_wildcard_renderings() {
        let op = WildcardMatch::new("cn", Some("Gr"), &["o_u"], Some("A"));
        assert_eq!(op.like_pattern(), "Gr%o\\_u%A");
        assert_eq!(op.regex_pattern(), "^Gr.*o_u.*A$");
        assert!(op.check("Group_uA"));
        assert!(!op.check("GroupA"));

        let open = WildcardMatch::new("cn", None, &["100%"], None);
        assert_eq!(open.like_pattern(), "%100\\%%");
        assert!(open.check("save 100% now"));
    }

    #[test]
    fn test_wildcard_ignore_case_lowers_like_pattern() {
        let op = WildcardMatch::new("mail", Some("Alice"), &[], None).ignore_case();
        assert_eq!(op.like_pattern(), "alice%");
        assert!(op.check("ALICE@example.com"));
        assert!(!op.negated().check("alice@example.com"));
    }

    #[test]
    fn test_presence_negation() {
        let op = PresenceMatch::new("mail");
        assert!(op.check(true));
        assert!(op.negated().check(false));
        assert_eq!(op.negated().negated(), op);
    }

    #[test]
    fn test_json_round_trip_canonicalizes() {
        let json = r#"{"op":"and","args":[
            {"op":"equal","args":{"attribute":"uid","value":"alice"}},
            {"op":"not","args":[{"op":"presence","args":{"attribute":"mail"}}]}
        ]}"#;
        let expr: QueryExpression = serde_json::from_str(json).unwrap();
        let expected = QueryExpression::and(vec![
            QueryExpression::equal("uid", "alice"),
            QueryExpression::negate(QueryExpression::presence("mail")),
        ]);
        assert_eq!(expr, expected);
        assert_eq!(expr.size(), 4);
    }

    #[test]
    fn test_display() {
        let expr = QueryExpression::and(vec![
            QueryExpression::equal("cn", "GroupA"),
            QueryExpression::Presence(PresenceMatch::new("mail").negated()),
            QueryExpression::wildcard("sn", None, &["oe"], None),
        ]);
        assert_eq!(expr.to_string(), "(&(cn=GroupA)(!(mail=*))(sn=*oe*))");
    }
}
