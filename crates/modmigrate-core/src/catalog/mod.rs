//! Module catalog.
//!
//! The catalog lists the modules compiled into the running application,
//! their current consensus versions, and their migration ordering hints.

mod catalog;
mod module;

pub use catalog::ModuleCatalog;
pub use module::ModuleDef;
