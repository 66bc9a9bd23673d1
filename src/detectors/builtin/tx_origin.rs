use crate::core::catalog::Categories;
use crate::core::context::FileContext;
use crate::core::error::DetectorResult;
use crate::core::tree::{NodeId, NodeKind, Role};
use crate::detectors::Detector;
use crate::models::scope::SOURCE_FILE_SCOPE;
use crate::models::{Implementation, Issue, Severity};

pub const KEY: &str = "tx-origin";
pub const TX_ORIGIN_USAGE: &str = "TxOriginUsage";

pub fn issues(categories: &Categories) -> Vec<Issue> {
    vec![Issue::new(
        TX_ORIGIN_USAGE,
        "Use of `tx.origin` is unsafe",
        "`tx.origin` is the account that started the transaction, not the immediate caller. \
         Authorizing with it lets any contract the user interacts with act on their behalf, \
         which enables phishing attacks. Use `msg.sender` instead.",
        &categories.access_control,
        7,
        Severity::Warning,
        Implementation::new(KEY, SOURCE_FILE_SCOPE),
    )]
}

#[derive(Debug, Default)]
pub struct TxOriginDetector;

impl Detector for TxOriginDetector {
    fn applicable_node_kinds(&self) -> &[NodeKind] {
        &[NodeKind::MemberAccess]
    }

    fn visit_node(&mut self, ctx: &mut FileContext, node: NodeId) -> DetectorResult {
        let tree = ctx.tree();
        if tree.name(node) != Some("origin") {
            return Ok(());
        }
        let on_tx = tree
            .child_with_role(node, Role::Receiver)
            .is_some_and(|r| tree.kind(r) == NodeKind::Reference && tree.name(r) == Some("tx"));
        if on_tx {
            ctx.report(TX_ORIGIN_USAGE, node, "Use `msg.sender` instead of `tx.origin`");
        }
        Ok(())
    }
}
