use crate::core::annotations::AnnotationHandler;
use crate::core::cancel::CancellationToken;
use crate::core::context::FileContext;
use crate::core::dispatch::{DispatchIndex, Slot};
use crate::core::error::{panic_message, DetectorError, DetectorResult};
use crate::core::registry::DetectorInstance;
use crate::core::tree::{Declaration, NodeId, NodeKind, SyntaxTree};
use crate::detectors::Detector;
use std::collections::{HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};

/// Nodes visited between two cancellation checks.
pub const CANCEL_POLL_INTERVAL: usize = 256;

pub const MAX_SUPER_TYPE_DEPTH: usize = 500;

/// Node kinds kept in a crash summary.
const MAX_TRACE_FRAMES: usize = 8;

/// How a guarded detector callback failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Failure {
    Canceled,
    Crashed(String),
}

/// Runs one detector callback, turning panics and `Failed` errors into
/// [`Failure::Crashed`].
pub(crate) fn guarded(callback: impl FnOnce() -> DetectorResult) -> Result<(), Failure> {
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(DetectorError::Canceled)) => Err(Failure::Canceled),
        Ok(Err(DetectorError::Failed(message))) => Err(Failure::Crashed(message)),
        Err(payload) => Err(Failure::Crashed(panic_message(payload.as_ref()))),
    }
}

/// A detector failure inside one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
    pub slot: Slot,
    pub detector: String,
    pub message: String,
    /// Node kinds from the failing node outwards.
    pub trace: Vec<NodeKind>,
}

impl CrashReport {
    pub fn summary(&self) -> String {
        if self.trace.is_empty() {
            return self.message.clone();
        }
        let frames: Vec<String> = self.trace.iter().map(|k| format!("{:?}", k)).collect();
        format!("{} [at {}]", self.message, frames.join(" < "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitError {
    Canceled,
    Crashed(CrashReport),
}

/// Walks one artifact once, handing each node to the detectors the index
/// registered for it.
pub struct Visitor<'v> {
    index: &'v DispatchIndex,
    cancel: &'v CancellationToken,
}

impl<'v> Visitor<'v> {
    pub fn new(index: &'v DispatchIndex, cancel: &'v CancellationToken) -> Self {
        Self { index, cancel }
    }

    pub fn visit(
        &self,
        instances: &mut [DetectorInstance],
        ctx: &mut FileContext,
    ) -> Result<(), VisitError> {
        let tree = ctx.tree();
        let handler = AnnotationHandler::new(self.index, ctx.provider());

        for &slot in self.index.slots() {
            self.invoke(instances, ctx, slot, None, |d, c| d.before_check_file(c))?;
        }

        let mut stack = vec![tree.root()];
        let mut visited = 0usize;
        while let Some(node) = stack.pop() {
            visited += 1;
            if visited % CANCEL_POLL_INTERVAL == 0 && self.cancel.is_canceled() {
                return Err(VisitError::Canceled);
            }
            self.dispatch(instances, ctx, &handler, node)?;
            stack.extend(tree.children(node).iter().rev().copied());
        }

        for &slot in self.index.slots() {
            self.invoke(instances, ctx, slot, None, |d, c| d.after_check_file(c))?;
        }
        Ok(())
    }

    fn dispatch(
        &self,
        instances: &mut [DetectorInstance],
        ctx: &mut FileContext,
        handler: &AnnotationHandler,
        node: NodeId,
    ) -> Result<(), VisitError> {
        let tree = ctx.tree();
        let kind = tree.kind(node);

        for &slot in self.index.for_kind(kind) {
            self.invoke(instances, ctx, slot, Some(node), |d, c| d.visit_node(c, node))?;
        }

        let resolved = match kind {
            NodeKind::Call if self.index.has_calls() || self.index.has_annotations() => {
                ctx.resolve(node)
            }
            NodeKind::Reference if self.index.has_annotations() => ctx.resolve(node),
            _ => None,
        };

        if let Some(declaration) = resolved.as_ref().filter(|_| kind == NodeKind::Call) {
            for slot in self.call_slots(tree, node, declaration) {
                self.invoke(instances, ctx, slot, Some(node), |d, c| {
                    d.visit_call(c, node, declaration)
                })?;
            }
        }

        if self.index.has_super_types() {
            self.dispatch_super_types(instances, ctx, node)?;
        }

        if self.index.has_annotations() {
            for usage in handler.usages(tree, node, resolved.as_ref()) {
                for &slot in self.index.for_annotation(&usage.annotation.qualified_name) {
                    if !instances[slot]
                        .detector
                        .is_applicable_annotation_usage(usage.kind)
                    {
                        continue;
                    }
                    self.invoke(instances, ctx, slot, Some(usage.element), |d, c| {
                        d.visit_annotation_usage(c, &usage)
                    })?;
                }
            }
        }

        Ok(())
    }

    /// Slots for the call-site name, then for the resolved name.
    fn call_slots(&self, tree: &SyntaxTree, call: NodeId, declaration: &Declaration) -> Vec<Slot> {
        let mut slots: Vec<Slot> = tree
            .name(call)
            .map(|name| self.index.for_call(name).to_vec())
            .unwrap_or_default();
        for &slot in self.index.for_call(&declaration.name) {
            if !slots.contains(&slot) {
                slots.push(slot);
            }
        }
        slots
    }

    /// Breadth-first over the supertypes of a class, or of a lambda's
    /// functional interface. Each detector hears about a class at most once.
    fn dispatch_super_types(
        &self,
        instances: &mut [DetectorInstance],
        ctx: &mut FileContext,
        node: NodeId,
    ) -> Result<(), VisitError> {
        let data = ctx.tree().node(node);
        let start = match data.kind {
            NodeKind::Class => data.name.clone(),
            NodeKind::Lambda => data.type_name.clone(),
            _ => None,
        };
        let Some(start) = start else {
            return Ok(());
        };

        let provider = ctx.provider();
        let mut dispatched: Vec<Slot> = Vec::new();
        let mut seen: HashSet<String> = HashSet::from([start.clone()]);
        let mut queue: VecDeque<(String, usize)> = VecDeque::from([(start, 0)]);

        while let Some((name, depth)) = queue.pop_front() {
            for &slot in self.index.for_super_type(&name) {
                if dispatched.contains(&slot) {
                    continue;
                }
                dispatched.push(slot);
                self.invoke(instances, ctx, slot, Some(node), |d, c| {
                    d.visit_class(c, node, &name)
                })?;
            }
            if depth >= MAX_SUPER_TYPE_DEPTH {
                continue;
            }
            for super_type in provider.super_types(&name) {
                if seen.insert(super_type.clone()) {
                    queue.push_back((super_type, depth + 1));
                }
            }
        }
        Ok(())
    }

    fn invoke<'a, 'r, F>(
        &self,
        instances: &mut [DetectorInstance],
        ctx: &mut FileContext<'a, 'r>,
        slot: Slot,
        node: Option<NodeId>,
        callback: F,
    ) -> Result<(), VisitError>
    where
        F: FnOnce(&mut dyn Detector, &mut FileContext<'a, 'r>) -> DetectorResult,
    {
        ctx.slot = slot;
        let tree = ctx.tree();
        let instance = &mut instances[slot];
        match guarded(|| callback(instance.detector.as_mut(), &mut *ctx)) {
            Ok(()) => Ok(()),
            Err(Failure::Canceled) => Err(VisitError::Canceled),
            Err(Failure::Crashed(message)) => Err(VisitError::Crashed(CrashReport {
                slot,
                detector: instance.key.clone(),
                message,
                trace: node
                    .map(|n| {
                        tree.ancestors(n)
                            .take(MAX_TRACE_FRAMES)
                            .map(|a| tree.kind(a))
                            .collect()
                    })
                    .unwrap_or_default(),
            })),
        }
    }
}
