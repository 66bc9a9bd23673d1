pub mod project;
pub mod solidity;

pub use project::{discover_project, ProjectError, ProjectLayout};
pub use solidity::SolidityProvider;
