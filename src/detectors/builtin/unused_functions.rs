//! Internal and private functions nobody calls.
//!
//! Uses are only known once every file has been seen, so the first phase
//! collects definitions and uses and the detector asks for a second phase in
//! which the unused definitions are reported where they are declared. Going
//! through the tree in phase two keeps suppression comments working.

use crate::core::catalog::Categories;
use crate::core::context::{FileContext, ProjectContext};
use crate::core::error::DetectorResult;
use crate::core::tree::{NodeData, NodeId, NodeKind, SyntaxTree};
use crate::detectors::Detector;
use crate::models::scope::SOURCE_FILE_SCOPE;
use crate::models::{Implementation, Issue, Severity};
use std::collections::HashSet;
use tracing::debug;

pub const KEY: &str = "unused-functions";
pub const UNUSED_INTERNAL_FUNCTION: &str = "UnusedInternalFunction";
pub const UNUSED_PRIVATE_FUNCTION: &str = "UnusedPrivateFunction";

/// Option: functions whose name starts with this prefix are never reported.
pub const IGNORE_PREFIX: &str = "ignore_prefix";

pub fn issues(categories: &Categories) -> Vec<Issue> {
    vec![
        Issue::new(
            UNUSED_INTERNAL_FUNCTION,
            "Internal function not called",
            "Internal functions that are not called by the contract or its derived contracts \
             should be removed to save deployment gas. If the function is required by an \
             interface, inherit from that interface and use the `override` keyword.",
            &categories.performance,
            4,
            Severity::Informational,
            Implementation::new(KEY, SOURCE_FILE_SCOPE),
        ),
        Issue::new(
            UNUSED_PRIVATE_FUNCTION,
            "Unused private functions can be removed",
            "Private functions that are never called within the contract are dead code and \
             should be removed to improve clarity and reduce deployment costs.",
            &categories.lint,
            4,
            Severity::Warning,
            Implementation::new(KEY, SOURCE_FILE_SCOPE),
        ),
    ]
}

type FunctionKey = (String, String);

#[derive(Debug, Default)]
pub struct UnusedFunctionsDetector {
    defined: Vec<FunctionKey>,
    used: HashSet<String>,
    unused: HashSet<FunctionKey>,
}

impl UnusedFunctionsDetector {
    fn is_candidate(data: &NodeData) -> bool {
        data.has_modifier("function")
            && (data.has_modifier("internal") || data.has_modifier("private"))
            && !data.has_modifier("virtual")
            && !data.has_modifier("override")
    }

    fn key(tree: &SyntaxTree, method: NodeId) -> Option<FunctionKey> {
        let name = tree.name(method)?;
        let class = tree
            .enclosing(method, NodeKind::Class)
            .and_then(|c| tree.name(c))
            .unwrap_or_default();
        Some((class.to_string(), name.to_string()))
    }
}

impl Detector for UnusedFunctionsDetector {
    fn applicable_node_kinds(&self) -> &[NodeKind] {
        &[
            NodeKind::Method,
            NodeKind::Call,
            NodeKind::Reference,
            NodeKind::MemberAccess,
        ]
    }

    fn visit_node(&mut self, ctx: &mut FileContext, node: NodeId) -> DetectorResult {
        let tree = ctx.tree();
        let data = tree.node(node);
        match (ctx.phase(), data.kind) {
            (1, NodeKind::Method) => {
                if Self::is_candidate(data) {
                    if let Some(key) = Self::key(tree, node) {
                        self.defined.push(key);
                    }
                }
            }
            (1, _) => {
                if let Some(name) = &data.name {
                    self.used.insert(name.clone());
                }
            }
            (_, NodeKind::Method) => {
                let Some(key) = Self::key(tree, node) else {
                    return Ok(());
                };
                if self.unused.contains(&key) {
                    let issue = if data.has_modifier("private") {
                        UNUSED_PRIVATE_FUNCTION
                    } else {
                        UNUSED_INTERNAL_FUNCTION
                    };
                    let ignored = ctx
                        .option(issue, IGNORE_PREFIX)
                        .is_some_and(|prefix| !prefix.is_empty() && key.1.starts_with(&prefix));
                    if ignored {
                        return Ok(());
                    }
                    ctx.report(issue, node, format!("`{}` is never called", key.1));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn after_check_project(&mut self, ctx: &mut ProjectContext) -> DetectorResult {
        if ctx.phase() != 1 {
            return Ok(());
        }
        self.unused = self
            .defined
            .iter()
            .filter(|(_, name)| !self.used.contains(name))
            .cloned()
            .collect();
        debug!(
            defined = self.defined.len(),
            unused = self.unused.len(),
            "Collected function uses"
        );
        if !self.unused.is_empty() {
            ctx.request_repeat(Some(SOURCE_FILE_SCOPE));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::utils::test_utils::{analyze_code, analyze_code_with, run_detector_on_code};
    use std::path::Path;

    const TOKEN: &str = r#"
contract Token {
    function transfer(address to) external {
        _move(to);
    }

    function _move(address to) internal {
    }

    function _legacy() internal {
    }

    function _secret() private {
    }

    function _hook() internal virtual {
    }
}

library Math {
    function max(uint256 a, uint256 b) internal pure returns (uint256) {
        return a > b ? a : b;
    }
}

contract User {
    function f() external pure returns (uint256) {
        return Math.max(1, 2);
    }
}
"#;

    #[test]
    fn test_reports_unused_in_second_phase() {
        assert_eq!(run_detector_on_code(KEY, TOKEN, "Token.sol"), vec![10, 13]);
        let ids: Vec<String> = analyze_code(TOKEN, "Token.sol")
            .into_iter()
            .map(|i| i.issue_id)
            .filter(|id| id.starts_with("Unused"))
            .collect();
        assert_eq!(ids, vec![UNUSED_INTERNAL_FUNCTION, UNUSED_PRIVATE_FUNCTION]);
    }

    #[test]
    fn test_suppressed_definition() {
        let code = r#"
contract Token {
    // noinspection UnusedInternalFunction
    function _legacy() internal {
    }
}
"#;
        assert!(run_detector_on_code(KEY, code, "Token.sol").is_empty());
    }

    #[test]
    fn test_everything_used_needs_no_repeat() {
        let code = r#"
contract Token {
    function run() external {
        _step();
    }

    function _step() private {
    }
}
"#;
        assert!(run_detector_on_code(KEY, code, "Token.sol").is_empty());
    }

    struct LegacyPrefix;

    impl Configuration for LegacyPrefix {
        fn severity_of(&self, issue: &Issue, _file: Option<&Path>) -> Severity {
            issue.default_severity
        }

        fn option_value(&self, issue_id: &str, key: &str) -> Option<String> {
            (issue_id == UNUSED_INTERNAL_FUNCTION && key == IGNORE_PREFIX)
                .then(|| "_legacy".to_string())
        }
    }

    #[test]
    fn test_ignore_prefix_option() {
        let lines: Vec<usize> = analyze_code_with(TOKEN, "Token.sol", &LegacyPrefix)
            .into_iter()
            .filter(|i| i.issue_id.starts_with("Unused"))
            .map(|i| i.location.line)
            .collect();
        assert_eq!(lines, vec![13]);
    }
}
