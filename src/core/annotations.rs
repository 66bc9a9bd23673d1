use crate::core::dispatch::DispatchIndex;
use crate::core::tree::{
    Annotation, BinaryOperator, Declaration, DeclarationKind, NodeId, NodeKind, Role, SyntaxTree,
    TreeProvider,
};

/// Where an annotated element shows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationUsageKind {
    /// The annotated declaration itself.
    Definition,
    /// A call to an annotated method.
    MethodCall,
    /// An argument passed to an annotated parameter.
    MethodCallParameter,
    /// A value returned from an annotated method.
    MethodReturn,
    /// A value assigned to an annotated field or variable.
    AssignmentRhs,
    /// The other operand of `==`/`!=` against an annotated call or reference.
    Equality,
    /// A read of an annotated field, variable or parameter.
    VariableReference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationUsage {
    pub kind: AnnotationUsageKind,
    /// The annotation a detector registered for.
    pub annotation: Annotation,
    /// The annotation written in the code, when `annotation` was found on its type.
    pub via: Option<Annotation>,
    /// Node the usage applies to.
    pub element: NodeId,
    /// Name of the annotated declaration.
    pub declaration: String,
}

/// A relevant annotation, possibly reached through the annotation's own type.
#[derive(Debug, Clone)]
struct Relevant {
    annotation: Annotation,
    via: Option<Annotation>,
}

pub struct AnnotationHandler<'a> {
    index: &'a DispatchIndex,
    provider: &'a dyn TreeProvider,
}

impl<'a> AnnotationHandler<'a> {
    pub fn new(index: &'a DispatchIndex, provider: &'a dyn TreeProvider) -> Self {
        Self { index, provider }
    }

    /// Keeps annotations some detector registered for; an unregistered
    /// annotation counts when its type carries a registered one. Only one
    /// level of indirection is followed.
    fn filter_relevant(&self, annotations: &[Annotation]) -> Vec<Relevant> {
        let mut relevant = Vec::new();
        for annotation in annotations {
            if self.index.is_relevant_annotation(&annotation.qualified_name) {
                relevant.push(Relevant {
                    annotation: annotation.clone(),
                    via: None,
                });
                continue;
            }
            for meta in self.provider.meta_annotations(&annotation.qualified_name) {
                if self.index.is_relevant_annotation(&meta.qualified_name) {
                    relevant.push(Relevant {
                        annotation: meta,
                        via: Some(annotation.clone()),
                    });
                }
            }
        }
        relevant
    }

    fn node_annotations(tree: &SyntaxTree, node: NodeId) -> Vec<Annotation> {
        tree.annotations(node)
            .filter_map(|a| {
                let data = tree.node(a);
                data.name.as_ref().map(|name| Annotation {
                    qualified_name: name.clone(),
                    values: data.values.clone(),
                })
            })
            .collect()
    }

    /// All annotation usages rooted at `node`. `resolved` is the declaration a
    /// call or reference resolved to, when the caller already has it.
    pub fn usages(
        &self,
        tree: &SyntaxTree,
        node: NodeId,
        resolved: Option<&Declaration>,
    ) -> Vec<AnnotationUsage> {
        let mut usages = Vec::new();
        let kind = tree.kind(node);

        if kind.is_declaration() {
            self.definition_usages(tree, node, &mut usages);
        }

        match kind {
            NodeKind::Call => {
                if let Some(decl) = resolved {
                    self.call_usages(tree, node, decl, &mut usages);
                }
            }
            NodeKind::Reference => {
                if let Some(decl) = resolved.filter(|d| is_variable(d)) {
                    let relevant = self.filter_relevant(&decl.annotations);
                    emit(&mut usages, &relevant, AnnotationUsageKind::VariableReference, node, &decl.name);
                    if let Some(other) = equality_operand(tree, node) {
                        emit(&mut usages, &relevant, AnnotationUsageKind::Equality, other, &decl.name);
                    }
                }
            }
            NodeKind::Assignment => {
                let target = tree.child_with_role(node, Role::Left);
                let value = tree.child_with_role(node, Role::Right);
                if let (Some(target), Some(value)) = (target, value) {
                    if let Some(decl) = self.provider.resolve(tree, target).filter(is_variable) {
                        let relevant = self.filter_relevant(&decl.annotations);
                        emit(&mut usages, &relevant, AnnotationUsageKind::AssignmentRhs, value, &decl.name);
                    }
                }
            }
            _ => {}
        }

        usages
    }

    fn definition_usages(&self, tree: &SyntaxTree, node: NodeId, usages: &mut Vec<AnnotationUsage>) {
        let relevant = self.filter_relevant(&Self::node_annotations(tree, node));
        if relevant.is_empty() {
            return;
        }
        let name = tree.name(node).unwrap_or_default().to_string();
        emit(usages, &relevant, AnnotationUsageKind::Definition, node, &name);

        match tree.kind(node) {
            NodeKind::Method => {
                for ret in returns_of(tree, node) {
                    let value = tree
                        .child_with_role(ret, Role::Value)
                        .or_else(|| tree.children(ret).first().copied());
                    if let Some(value) = value {
                        emit(usages, &relevant, AnnotationUsageKind::MethodReturn, value, &name);
                    }
                }
            }
            NodeKind::Field | NodeKind::Variable => {
                if let Some(init) = tree.child_with_role(node, Role::Initializer) {
                    emit(usages, &relevant, AnnotationUsageKind::AssignmentRhs, init, &name);
                }
            }
            _ => {}
        }
    }

    fn call_usages(
        &self,
        tree: &SyntaxTree,
        call: NodeId,
        decl: &Declaration,
        usages: &mut Vec<AnnotationUsage>,
    ) {
        let relevant = self.filter_relevant(&decl.annotations);
        emit(usages, &relevant, AnnotationUsageKind::MethodCall, call, &decl.name);
        if let Some(other) = equality_operand(tree, call) {
            emit(usages, &relevant, AnnotationUsageKind::Equality, other, &decl.name);
        }

        for (argument, parameter) in tree
            .children_with_role(call, Role::Argument)
            .zip(decl.parameters.iter())
        {
            let relevant = self.filter_relevant(&parameter.annotations);
            emit(
                usages,
                &relevant,
                AnnotationUsageKind::MethodCallParameter,
                argument,
                &parameter.name,
            );
        }
    }
}

fn emit(
    usages: &mut Vec<AnnotationUsage>,
    relevant: &[Relevant],
    kind: AnnotationUsageKind,
    element: NodeId,
    declaration: &str,
) {
    usages.extend(relevant.iter().map(|r| AnnotationUsage {
        kind,
        annotation: r.annotation.clone(),
        via: r.via.clone(),
        element,
        declaration: declaration.to_string(),
    }));
}

fn is_variable(decl: &Declaration) -> bool {
    matches!(
        decl.kind,
        DeclarationKind::Field | DeclarationKind::Variable | DeclarationKind::Parameter
    )
}

/// The opposite operand when `node` is compared with `==` or `!=`.
fn equality_operand(tree: &SyntaxTree, node: NodeId) -> Option<NodeId> {
    let parent = tree.parent(node)?;
    let data = tree.node(parent);
    if data.kind != NodeKind::Binary
        || !matches!(
            data.operator,
            Some(BinaryOperator::Equals) | Some(BinaryOperator::NotEquals)
        )
    {
        return None;
    }
    data.children.iter().copied().find(|c| *c != node)
}

/// Return statements of a method, not counting nested methods, classes or lambdas.
fn returns_of(tree: &SyntaxTree, method: NodeId) -> Vec<NodeId> {
    let mut returns = Vec::new();
    let mut stack: Vec<NodeId> = tree.children(method).to_vec();
    while let Some(node) = stack.pop() {
        match tree.kind(node) {
            NodeKind::Return => returns.push(node),
            NodeKind::Method | NodeKind::Class | NodeKind::Lambda => continue,
            _ => {}
        }
        stack.extend(tree.children(node).iter().copied());
    }
    returns.sort();
    returns
}
