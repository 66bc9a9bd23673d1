//! Suppression directives: annotations, `noinspection` comments and
//! `tools:ignore` attributes. The engine checks them before any report
//! reaches the sink, so detectors never have to.

use crate::core::tree::{simple_name, Annotation, NodeId, SyntaxTree};
use crate::models::Issue;

pub const SUPPRESS_ALL: &str = "all";

/// Prefixes accepted in front of an issue id, as in `FerretTxOriginUsage`.
pub const TOOL_PREFIXES: &[&str] = &["Ferret"];

pub const SUPPRESS_ANNOTATIONS: &[&str] = &[
    "SuppressLint",
    "SuppressWarnings",
    "Suppress",
    "ferret.Suppress",
    "ferret.SuppressLint",
];

pub const TOOLS_NAMESPACE: &str = "https://ferret.dev/tools";
pub const ATTR_IGNORE: &str = "ignore";
pub const SUPPRESS_COMMENT_PREFIX: &str = "noinspection";

pub fn is_suppress_annotation(qualified_name: &str) -> bool {
    SUPPRESS_ANNOTATIONS.contains(&qualified_name)
        || SUPPRESS_ANNOTATIONS.contains(&simple_name(qualified_name))
}

fn eq_prefix_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Whether a single suppression id names `issue`.
pub fn matches_id(issue: &Issue, id: &str) -> bool {
    let id = id.trim();
    if id.eq_ignore_ascii_case(SUPPRESS_ALL) || id.eq_ignore_ascii_case(&issue.id) {
        return true;
    }
    let prefixed = TOOL_PREFIXES.iter().any(|prefix| {
        eq_prefix_ignore_case(id, prefix) && id[prefix.len()..].eq_ignore_ascii_case(&issue.id)
    });
    if prefixed {
        return true;
    }
    issue
        .category
        .lineage()
        .any(|c| id.eq_ignore_ascii_case(&c.name) || id.eq_ignore_ascii_case(&c.full_name()))
}

/// A directive value may list several ids separated by commas.
pub fn matches_directive(issue: &Issue, value: &str) -> bool {
    value.split(',').any(|id| matches_id(issue, id))
}

/// `// noinspection Id1 Id2` (and block or XML comment forms).
pub fn comment_suppresses(issue: &Issue, text: &str) -> bool {
    let mut body = text.trim();
    for open in ["//", "/*", "<!--"] {
        if let Some(rest) = body.strip_prefix(open) {
            body = rest;
            break;
        }
    }
    for close in ["*/", "-->"] {
        if let Some(rest) = body.strip_suffix(close) {
            body = rest;
            break;
        }
    }
    let Some(ids) = body.trim().strip_prefix(SUPPRESS_COMMENT_PREFIX) else {
        return false;
    };
    ids.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|id| !id.is_empty())
        .any(|id| matches_id(issue, id))
}

fn annotations_suppress(issue: &Issue, annotations: &[Annotation]) -> bool {
    annotations.iter().any(|a| {
        is_suppress_annotation(&a.qualified_name)
            && a.values.iter().any(|v| matches_directive(issue, v))
    })
}

/// Class, method or field in a compiled-class view of the program.
pub trait MemberNode {
    fn annotations(&self) -> &[Annotation];
    fn enclosing(&self) -> Option<&Self>;
}

/// Element or attribute of an XML document.
pub trait XmlNode {
    fn is_attribute(&self) -> bool;
    /// Owning element of an attribute.
    fn owner_element(&self) -> Option<&Self>;
    fn parent_element(&self) -> Option<&Self>;
    fn attribute_ns(&self, namespace: &str, local_name: &str) -> Option<&str>;
    /// Comment immediately before the element, if any.
    fn preceding_comment(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SuppressionResolver {
    check_comments: bool,
}

impl SuppressionResolver {
    pub fn new(check_comments: bool) -> Self {
        Self { check_comments }
    }

    pub fn is_suppressed(&self, issue: &Issue, tree: &SyntaxTree, node: NodeId) -> bool {
        tree.ancestors(node).any(|ancestor| {
            let annotated = tree.annotations(ancestor).any(|a| {
                let data = tree.node(a);
                data.name.as_deref().is_some_and(is_suppress_annotation)
                    && data.values.iter().any(|v| matches_directive(issue, v))
            });
            annotated || (self.check_comments && self.comment_above(issue, tree, ancestor))
        })
    }

    fn comment_above(&self, issue: &Issue, tree: &SyntaxTree, node: NodeId) -> bool {
        let line = tree.range(node).start_line;
        if line == 0 {
            return false;
        }
        [line, line - 1]
            .into_iter()
            .filter(|l| *l > 0)
            .flat_map(|l| tree.comments_on_line(l))
            .any(|c| comment_suppresses(issue, &c.text))
    }

    pub fn is_member_suppressed<M: MemberNode>(&self, issue: &Issue, member: &M) -> bool {
        std::iter::successors(Some(member), |m| m.enclosing())
            .any(|m| annotations_suppress(issue, m.annotations()))
    }

    pub fn is_xml_suppressed<X: XmlNode>(&self, issue: &Issue, node: &X) -> bool {
        let start = if node.is_attribute() {
            node.owner_element()
        } else {
            Some(node)
        };
        std::iter::successors(start, |e| e.parent_element()).any(|element| {
            let ignored = element
                .attribute_ns(TOOLS_NAMESPACE, ATTR_IGNORE)
                .is_some_and(|v| matches_directive(issue, v));
            ignored
                || (self.check_comments
                    && element
                        .preceding_comment()
                        .is_some_and(|c| comment_suppresses(issue, c)))
        })
    }
}
