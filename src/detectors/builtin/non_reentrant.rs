use crate::core::annotations::{AnnotationUsage, AnnotationUsageKind};
use crate::core::catalog::Categories;
use crate::core::context::FileContext;
use crate::core::error::DetectorResult;
use crate::core::tree::NodeKind;
use crate::detectors::Detector;
use crate::models::scope::SOURCE_FILE_SCOPE;
use crate::models::{Implementation, Issue, Severity};

pub const KEY: &str = "non-reentrant";
pub const NESTED_NON_REENTRANT: &str = "NestedNonReentrant";
pub const NON_REENTRANT_NOT_FIRST: &str = "NonReentrantNotFirst";

const NON_REENTRANT: &str = "nonReentrant";

pub fn issues(categories: &Categories) -> Vec<Issue> {
    vec![
        Issue::new(
            NESTED_NON_REENTRANT,
            "`nonReentrant` function called from a `nonReentrant` function",
            "The reentrancy guard is already entered when the inner function runs, so the \
             call always reverts. Move the shared logic into an unguarded internal function.",
            &categories.correctness,
            8,
            Severity::Error,
            Implementation::new(KEY, SOURCE_FILE_SCOPE),
        ),
        Issue::new(
            NON_REENTRANT_NOT_FIRST,
            "The `nonReentrant` modifier should occur before all other modifiers",
            "Placing `nonReentrant` first protects against reentrancy in the other modifiers.",
            &categories.lint,
            3,
            Severity::Informational,
            Implementation::new(KEY, SOURCE_FILE_SCOPE),
        ),
    ]
}

#[derive(Debug, Default)]
pub struct NonReentrantDetector;

impl Detector for NonReentrantDetector {
    fn applicable_annotations(&self) -> &[&'static str] {
        &[NON_REENTRANT]
    }

    fn visit_annotation_usage(
        &mut self,
        ctx: &mut FileContext,
        usage: &AnnotationUsage,
    ) -> DetectorResult {
        let tree = ctx.tree();
        match usage.kind {
            AnnotationUsageKind::Definition => {
                let modifiers: Vec<_> = tree.annotations(usage.element).collect();
                let position = modifiers
                    .iter()
                    .position(|m| tree.name(*m) == Some(NON_REENTRANT));
                if let Some(pos) = position.filter(|pos| *pos > 0) {
                    ctx.report(
                        NON_REENTRANT_NOT_FIRST,
                        modifiers[pos],
                        format!("`nonReentrant` is modifier #{} of `{}`", pos + 1, usage.declaration),
                    );
                }
            }
            AnnotationUsageKind::MethodCall => {
                let guarded_caller = tree
                    .enclosing(usage.element, NodeKind::Method)
                    .is_some_and(|m| tree.annotations(m).any(|a| tree.name(a) == Some(NON_REENTRANT)));
                if guarded_caller {
                    ctx.report(
                        NESTED_NON_REENTRANT,
                        usage.element,
                        format!("Call to `{}` always reverts", usage.declaration),
                    );
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{analyze_code, run_detector_on_code};

    const VAULT: &str = r#"
contract Vault {
    modifier nonReentrant() { _; }
    modifier onlyOwner() { _; }

    function withdraw() external onlyOwner nonReentrant {
        _send();
    }

    function deposit() external nonReentrant {
        _send();
        sweep();
    }

    function sweep() public nonReentrant onlyOwner {
    }

    function _send() internal {
    }
}
"#;

    #[test]
    fn test_detects_ordering_and_nesting() {
        assert_eq!(run_detector_on_code(KEY, VAULT, "Vault.sol"), vec![6, 12]);
    }

    #[test]
    fn test_reports_distinct_issues() {
        let ids: Vec<String> = analyze_code(VAULT, "Vault.sol")
            .into_iter()
            .filter(|i| i.issue_id == NESTED_NON_REENTRANT || i.issue_id == NON_REENTRANT_NOT_FIRST)
            .map(|i| i.issue_id)
            .collect();
        assert_eq!(ids, vec![NON_REENTRANT_NOT_FIRST, NESTED_NON_REENTRANT]);
    }
}
