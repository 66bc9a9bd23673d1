use crate::core::catalog::Categories;
use crate::core::context::FileContext;
use crate::core::error::DetectorResult;
use crate::core::tree::{NodeId, NodeKind, SyntaxTree};
use crate::detectors::Detector;
use crate::models::scope::SOURCE_FILE_SCOPE;
use crate::models::{Implementation, Issue, Severity};

pub const KEY: &str = "uninitialized-implementation";
pub const UNINITIALIZED_IMPLEMENTATION: &str = "UninitializedImplementation";

const INITIALIZABLE: &str = "Initializable";
const DISABLE_INITIALIZERS: &str = "_disableInitializers";

pub fn issues(categories: &Categories) -> Vec<Issue> {
    vec![Issue::new(
        UNINITIALIZED_IMPLEMENTATION,
        "Do not leave an implementation contract uninitialized",
        "An uninitialized implementation contract can be taken over by an attacker, which may \
         impact the proxy. Invoke `_disableInitializers` in the constructor so the \
         implementation is locked when it is deployed:\n\
         ```solidity\n\
         constructor() {\n    _disableInitializers();\n}\n\
         ```",
        &categories.security,
        6,
        Severity::Warning,
        Implementation::new(KEY, SOURCE_FILE_SCOPE),
    )]
}

#[derive(Debug, Default)]
pub struct UninitializedImplementationDetector;

impl UninitializedImplementationDetector {
    fn calls_disable_initializers(tree: &SyntaxTree, constructor: NodeId) -> bool {
        tree.descendants(constructor).into_iter().any(|n| {
            tree.kind(n) == NodeKind::Call && tree.name(n) == Some(DISABLE_INITIALIZERS)
        })
    }
}

impl Detector for UninitializedImplementationDetector {
    fn applicable_super_types(&self) -> &[&'static str] {
        &[INITIALIZABLE]
    }

    fn visit_class(
        &mut self,
        ctx: &mut FileContext,
        class: NodeId,
        _super_type: &str,
    ) -> DetectorResult {
        let tree = ctx.tree();
        let data = tree.node(class);
        if data.name.as_deref() == Some(INITIALIZABLE)
            || ["abstract", "interface", "library"]
                .iter()
                .any(|m| data.has_modifier(m))
        {
            return Ok(());
        }

        let constructors = tree.children(class).iter().copied().filter(|c| {
            tree.kind(*c) == NodeKind::Method && tree.node(*c).has_modifier("constructor")
        });
        for constructor in constructors {
            if !Self::calls_disable_initializers(tree, constructor) {
                ctx.report(
                    UNINITIALIZED_IMPLEMENTATION,
                    constructor,
                    "Constructor does not call `_disableInitializers()`",
                );
            }
        }
        Ok(())
    }
}
