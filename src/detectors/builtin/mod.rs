//! Detectors shipped with ferret. They are packaged as an ordinary plugin and
//! pass the same verification as third-party ones.

pub mod delegatecall_in_loop;
pub mod non_reentrant;
pub mod tx_origin;
pub mod uninitialized_implementation;
pub mod unused_functions;

pub use delegatecall_in_loop::DelegatecallInLoopDetector;
pub use non_reentrant::NonReentrantDetector;
pub use tx_origin::TxOriginDetector;
pub use uninitialized_implementation::UninitializedImplementationDetector;
pub use unused_functions::UnusedFunctionsDetector;

use crate::core::catalog::Categories;
use crate::core::plugin::DetectorPlugin;

pub const PLUGIN_NAME: &str = "builtin";

pub fn builtin_plugin() -> DetectorPlugin {
    let categories = Categories::standard();
    DetectorPlugin::new(PLUGIN_NAME, "^1")
        .references(&[
            "Detector",
            "DetectorResult",
            "FileContext",
            "ProjectContext",
            "NodeId",
            "NodeKind",
            "Role",
            "Declaration",
            "AnnotationUsage",
            "AnnotationUsageKind",
            "Issue",
            "Implementation",
            "Categories",
            "Severity",
            "ScopeSet",
        ])
        .issues(delegatecall_in_loop::issues(&categories))
        .issues(tx_origin::issues(&categories))
        .issues(uninitialized_implementation::issues(&categories))
        .issues(non_reentrant::issues(&categories))
        .issues(unused_functions::issues(&categories))
        .detector::<DelegatecallInLoopDetector>(delegatecall_in_loop::KEY)
        .detector::<TxOriginDetector>(tx_origin::KEY)
        .detector::<UninitializedImplementationDetector>(uninitialized_implementation::KEY)
        .detector::<NonReentrantDetector>(non_reentrant::KEY)
        .detector::<UnusedFunctionsDetector>(unused_functions::KEY)
}
