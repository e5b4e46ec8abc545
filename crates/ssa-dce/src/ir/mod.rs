//! Intermediate Representation (IR) consumed by the dead code elimination pass.
//!
//! An SSA-form IR: a [`Module`] owns functions and globals, a [`Function`]
//! owns basic blocks over an instruction arena, and every instruction keeps
//! a use-list of the instructions reading its value.

mod types;
pub use types::*;

mod function;
pub use function::Function;

mod module;
pub use module::{InstrRef, Module};

mod builder;
pub use builder::FunctionBuilder;

mod display;
