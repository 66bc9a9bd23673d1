use crate::core::catalog::Categories;
use crate::core::context::FileContext;
use crate::core::error::DetectorResult;
use crate::core::tree::{Declaration, NodeId, NodeKind};
use crate::detectors::Detector;
use crate::models::scope::SOURCE_FILE_SCOPE;
use crate::models::{Implementation, Issue, Severity};

pub const KEY: &str = "delegatecall-in-loop";
pub const DELEGATECALL_IN_LOOP: &str = "DelegatecallInLoop";

pub fn issues(categories: &Categories) -> Vec<Issue> {
    vec![Issue::new(
        DELEGATECALL_IN_LOOP,
        "Use of `delegatecall` inside a loop",
        "Executing `delegatecall` inside a loop is highly dangerous. External code runs with \
         the caller's storage and permissions on every iteration, so a malicious target or a \
         manipulated loop bound can corrupt state or exhaust gas. Refactor to avoid \
         `delegatecall` in loops unless the targets and bounds are strictly controlled.",
        &categories.security,
        9,
        Severity::Error,
        Implementation::new(KEY, SOURCE_FILE_SCOPE),
    )]
}

#[derive(Debug, Default)]
pub struct DelegatecallInLoopDetector;

impl Detector for DelegatecallInLoopDetector {
    fn applicable_call_names(&self) -> &[&'static str] {
        &["delegatecall"]
    }

    fn visit_call(
        &mut self,
        ctx: &mut FileContext,
        call: NodeId,
        _declaration: &Declaration,
    ) -> DetectorResult {
        let tree = ctx.tree();
        // Loops between the call and its function
        let in_loop = tree
            .ancestors(call)
            .skip(1)
            .take_while(|n| tree.kind(*n) != NodeKind::Method)
            .any(|n| tree.kind(n) == NodeKind::Loop);
        if in_loop {
            ctx.report(
                DELEGATECALL_IN_LOOP,
                call,
                "`delegatecall` executed on every loop iteration",
            );
        }
        Ok(())
    }
}
