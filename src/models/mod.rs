pub mod finding;
pub mod issue;
pub mod report;
pub mod scope;
pub mod severity;

pub use finding::{Finding, FindingInstance, Incident, Location};
pub use issue::{Category, Implementation, Issue};
pub use report::Report;
pub use scope::{Scope, ScopeSet};
pub use severity::Severity;
