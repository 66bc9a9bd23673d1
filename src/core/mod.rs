pub mod annotations;
pub mod baseline;
pub mod cancel;
pub mod catalog;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod finding_collector;
pub mod plugin;
pub mod registry;
pub mod scheduler;
pub mod suppression;
pub mod tree;
pub mod visitor;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
