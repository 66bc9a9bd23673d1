//! Language-neutral syntax tree handed to the engine by a [`TreeProvider`].
//!
//! Trees are arenas: nodes live in one vector and refer to each other through
//! [`NodeId`]s. Front ends lower their own AST into this shape; the engine and
//! detectors never see a concrete grammar.

use crate::core::context::Artifact;
use std::path::{Path, PathBuf};
use std::sync::RwLockReadGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Import,
    Class,
    Method,
    Field,
    Parameter,
    Variable,
    Annotation,
    Block,
    Call,
    Reference,
    MemberAccess,
    Literal,
    Binary,
    Unary,
    Assignment,
    Return,
    If,
    Loop,
    Lambda,
    Other,
}

impl NodeKind {
    /// Kinds that declare something annotations can be attached to.
    pub fn is_declaration(self) -> bool {
        matches!(
            self,
            NodeKind::Class
                | NodeKind::Method
                | NodeKind::Field
                | NodeKind::Parameter
                | NodeKind::Variable
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Equals,
    NotEquals,
    Comparison,
    Arithmetic,
    Logical,
    Other,
}

/// The slot a child occupies in its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Receiver,
    Argument,
    Initializer,
    Left,
    Right,
    Condition,
    Body,
    Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextRange {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub role: Option<Role>,
    pub name: Option<String>,
    pub operator: Option<BinaryOperator>,
    /// Keywords such as visibility or mutability.
    pub modifiers: Vec<String>,
    /// Attribute values of an annotation node.
    pub values: Vec<String>,
    /// Functional interface type of a lambda.
    pub type_name: Option<String>,
    pub range: TextRange,
}

impl NodeData {
    fn new(kind: NodeKind, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
            role: None,
            name: None,
            operator: None,
            modifiers: Vec::new(),
            values: Vec::new(),
            type_name: None,
            range: TextRange::default(),
        }
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SyntaxTree {
    path: PathBuf,
    nodes: Vec<NodeData>,
    comments: Vec<Comment>,
    source: Option<String>,
}

impl SyntaxTree {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            nodes: vec![NodeData::new(NodeKind::File, None)],
            comments: Vec::new(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: String) -> Self {
        self.source = Some(source);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Appends a node under `parent` and returns its id.
    pub fn add(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData::new(kind, Some(parent)));
        self.nodes[parent.index()].children.push(id);
        id
    }

    pub fn add_named(&mut self, parent: NodeId, kind: NodeKind, name: &str) -> NodeId {
        let id = self.add(parent, kind);
        self.nodes[id.index()].name = Some(name.to_string());
        id
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.index()].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.index()].name.as_deref()
    }

    pub fn role(&self, id: NodeId) -> Option<Role> {
        self.nodes[id.index()].role
    }

    pub fn range(&self, id: NodeId) -> TextRange {
        self.nodes[id.index()].range
    }

    /// `id` followed by its ancestors up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |n| self.parent(*n))
    }

    /// Nearest strict ancestor of the given kind.
    pub fn enclosing(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.ancestors(id).skip(1).find(|n| self.kind(*n) == kind)
    }

    pub fn child_with_role(&self, id: NodeId, role: Role) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|c| self.role(*c) == Some(role))
    }

    pub fn children_with_role(&self, id: NodeId, role: Role) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |c| self.role(*c) == Some(role))
    }

    pub fn annotations(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |c| self.kind(*c) == NodeKind::Annotation)
    }

    /// Pre-order walk of the subtree rooted at `id`, `id` included.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            order.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        order
    }

    pub fn add_comment(&mut self, line: usize, text: &str) {
        self.comments.push(Comment {
            line,
            text: text.to_string(),
        });
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn comments_on_line(&self, line: usize) -> impl Iterator<Item = &Comment> {
        self.comments.iter().filter(move |c| c.line == line)
    }

    /// The source text covered by a node, trimmed.
    pub fn snippet(&self, id: NodeId) -> Option<String> {
        let source = self.source.as_deref()?;
        let range = self.range(id);
        if range.start_line == 0 {
            return None;
        }
        let lines: Vec<&str> = source
            .lines()
            .skip(range.start_line - 1)
            .take(range.end_line.saturating_sub(range.start_line) + 1)
            .collect();
        let text = match lines.as_slice() {
            [] => return None,
            [only] => {
                let only: &str = only;
                only.get(range.start_column..range.end_column.min(only.len()))
                    .unwrap_or(only)
                    .to_string()
            }
            [first, middle @ .., last] => {
                let (first, last): (&str, &str) = (first, last);
                let mut parts = vec![first.get(range.start_column..).unwrap_or(first)];
                parts.extend(middle.iter().copied());
                parts.push(last.get(..range.end_column.min(last.len())).unwrap_or(last));
                parts.join("\n")
            }
        };
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub qualified_name: String,
    pub values: Vec<String>,
}

impl Annotation {
    pub fn new(qualified_name: &str) -> Self {
        Self {
            qualified_name: qualified_name.to_string(),
            values: Vec::new(),
        }
    }

    pub fn with_values(mut self, values: &[&str]) -> Self {
        self.values = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn simple_name(&self) -> &str {
        simple_name(&self.qualified_name)
    }
}

/// Last segment of a dotted name.
pub fn simple_name(qualified: &str) -> &str {
    qualified.rsplit('.').next().unwrap_or(qualified)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Class,
    Method,
    Field,
    Variable,
    Parameter,
    AnnotationType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDecl {
    pub name: String,
    pub annotations: Vec<Annotation>,
}

/// What a call or reference resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub qualified_name: String,
    pub kind: DeclarationKind,
    pub containing_class: Option<String>,
    pub annotations: Vec<Annotation>,
    pub parameters: Vec<ParameterDecl>,
}

impl Declaration {
    pub fn new(name: &str, kind: DeclarationKind) -> Self {
        Self {
            name: name.to_string(),
            qualified_name: name.to_string(),
            kind,
            containing_class: None,
            annotations: Vec::new(),
            parameters: Vec::new(),
        }
    }

    pub fn in_class(mut self, class: &str) -> Self {
        self.qualified_name = format!("{}.{}", class, self.name);
        self.containing_class = Some(class.to_string());
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn with_parameter(mut self, name: &str, annotations: Vec<Annotation>) -> Self {
        self.parameters.push(ParameterDecl {
            name: name.to_string(),
            annotations,
        });
        self
    }
}

/// Held while the engine walks a tree; resolvers that are not reentrant hand
/// out a real lock here.
pub struct ReadGuard<'a> {
    _guard: Option<RwLockReadGuard<'a, ()>>,
}

impl<'a> ReadGuard<'a> {
    pub fn none() -> Self {
        Self { _guard: None }
    }

    pub fn hold(guard: RwLockReadGuard<'a, ()>) -> Self {
        Self {
            _guard: Some(guard),
        }
    }
}

/// Parser, resolver and type hierarchy for one language, supplied by a front end.
pub trait TreeProvider {
    /// `None` when the artifact cannot be parsed.
    fn parse(&self, artifact: &Artifact) -> Option<SyntaxTree>;

    fn resolve(&self, tree: &SyntaxTree, node: NodeId) -> Option<Declaration>;

    /// Direct supertypes (classes and interfaces) of a type.
    fn super_types(&self, qualified_name: &str) -> Vec<String>;

    /// Annotations carried by an annotation type.
    fn meta_annotations(&self, _annotation: &str) -> Vec<Annotation> {
        Vec::new()
    }

    fn read_lock(&self) -> ReadGuard<'_> {
        ReadGuard::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_links_parents_and_children() {
        let mut tree = SyntaxTree::new("A.sol");
        let class = tree.add_named(tree.root(), NodeKind::Class, "A");
        let method = tree.add_named(class, NodeKind::Method, "run");
        let call = tree.add_named(method, NodeKind::Call, "transfer");

        assert_eq!(tree.parent(call), Some(method));
        assert_eq!(tree.children(class), &[method]);
        assert_eq!(tree.enclosing(call, NodeKind::Class), Some(class));
        assert_eq!(tree.enclosing(class, NodeKind::Class), None);
        let chain: Vec<NodeId> = tree.ancestors(call).collect();
        assert_eq!(chain, vec![call, method, class, tree.root()]);
        assert_eq!(tree.descendants(class), vec![class, method, call]);
    }

    #[test]
    fn test_snippet_from_range() {
        let source = "contract A {\n    uint x = 1;\n}\n".to_string();
        let mut tree = SyntaxTree::new("A.sol").with_source(source);
        let field = tree.add_named(tree.root(), NodeKind::Field, "x");
        tree.node_mut(field).range = TextRange {
            start_line: 2,
            start_column: 4,
            end_line: 2,
            end_column: 15,
        };
        assert_eq!(tree.snippet(field).as_deref(), Some("uint x = 1;"));
    }

    #[test]
    fn test_simple_name() {
        assert_eq!(simple_name("ferret.SuppressLint"), "SuppressLint");
        assert_eq!(Annotation::new("Suppress").simple_name(), "Suppress");
    }
}
