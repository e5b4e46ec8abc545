//! Module-level analyses queried by the optimizer.

mod func_info;
pub use func_info::{FuncInfo, Purity};
