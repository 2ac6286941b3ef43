//! TBL Plugin System
//!
//! Provides the seam for extending the formula engine with functions:
//! - `FunctionPlugin`: pure computation over already-evaluated arguments
//! - `PluginRegistry`: case-insensitive lookup, help and catalogue
//! - `EvalContext`: precision, clock and evaluation trace

mod traits;
mod registry;
mod context;

pub use traits::{FunctionPlugin, FunctionMeta, ArgMeta};
pub use registry::PluginRegistry;
pub use context::{EvalContext, TraceStep};

/// Re-export core types for plugin authors
pub mod prelude {
    pub use crate::{
        FunctionPlugin, FunctionMeta,
        ArgMeta, PluginRegistry, EvalContext, TraceStep,
    };
    pub use tbl_core::prelude::*;
}
