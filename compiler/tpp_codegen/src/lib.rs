//! IR generation backend for the T++ compiler.
//!
//! [`Builder`] consumes AST nodes and lowers them into a typed IR
//! [`Module`](ir::Module): it manages scopes, casts, numeric promotion,
//! control-flow blocks, and function/struct declaration semantics. The
//! emitted module is self-contained and suitable for handoff to an
//! external code generator; [`interp`] provides a reference executor
//! used by tests.

mod builder;
mod cast;
mod control_flow;
mod declare;
mod exprs;
mod functions;
pub mod interp;
pub mod ir;
mod printer;
mod types;
mod value;
pub mod verify;

pub use builder::{Builder, FunctionInfo, INIT_SYMBOL};
pub use value::Value;
