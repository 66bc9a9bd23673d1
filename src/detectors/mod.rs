use crate::core::annotations::{AnnotationUsage, AnnotationUsageKind};
use crate::core::context::{FileContext, ProjectContext};
use crate::core::error::DetectorResult;
use crate::core::tree::{Declaration, NodeId, NodeKind};

pub mod builtin;

pub use builtin::builtin_plugin;

/// A stateful analysis unit. One instance exists per detector key and project;
/// it sees every phase of that project and is dropped afterwards.
///
/// Capabilities are independent: a detector fills in whichever of the
/// `applicable_*` lists it needs and gets the matching `visit_*` callback.
pub trait Detector {
    /// Node kinds routed to [`Detector::visit_node`].
    fn applicable_node_kinds(&self) -> &[NodeKind] {
        &[]
    }

    /// Call names routed to [`Detector::visit_call`].
    fn applicable_call_names(&self) -> &[&'static str] {
        &[]
    }

    /// Supertypes routed to [`Detector::visit_class`].
    fn applicable_super_types(&self) -> &[&'static str] {
        &[]
    }

    /// Annotations routed to [`Detector::visit_annotation_usage`].
    fn applicable_annotations(&self) -> &[&'static str] {
        &[]
    }

    /// Filter on usage kinds; equality comparisons are opt-in.
    fn is_applicable_annotation_usage(&self, kind: AnnotationUsageKind) -> bool {
        kind != AnnotationUsageKind::Equality
    }

    fn before_check_project(&mut self, _ctx: &mut ProjectContext) -> DetectorResult {
        Ok(())
    }

    fn after_check_project(&mut self, _ctx: &mut ProjectContext) -> DetectorResult {
        Ok(())
    }

    fn before_check_file(&mut self, _ctx: &mut FileContext) -> DetectorResult {
        Ok(())
    }

    fn after_check_file(&mut self, _ctx: &mut FileContext) -> DetectorResult {
        Ok(())
    }

    fn visit_node(&mut self, _ctx: &mut FileContext, _node: NodeId) -> DetectorResult {
        Ok(())
    }

    /// `declaration` is what the call resolved to.
    fn visit_call(
        &mut self,
        _ctx: &mut FileContext,
        _call: NodeId,
        _declaration: &Declaration,
    ) -> DetectorResult {
        Ok(())
    }

    /// Called once per class for each registered supertype it extends,
    /// directly or transitively. The class's own name counts.
    fn visit_class(
        &mut self,
        _ctx: &mut FileContext,
        _class: NodeId,
        _super_type: &str,
    ) -> DetectorResult {
        Ok(())
    }

    fn visit_annotation_usage(
        &mut self,
        _ctx: &mut FileContext,
        _usage: &AnnotationUsage,
    ) -> DetectorResult {
        Ok(())
    }
}
