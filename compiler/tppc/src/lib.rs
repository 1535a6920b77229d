//! Compiler driver: parse a translation unit and lower each top-level
//! node into one IR module.
//!
//! Parsing and lowering are interleaved: the parser hands over each
//! top-level AST node as soon as it is complete, and the node is lowered
//! before the next one is parsed. A fresh [`CompilationSession`] backs
//! every run, so independent compilations never share state.

use std::path::Path;

use tpp_codegen::{ir::Module, Builder};
use tpp_diagnostic::Result;
use tpp_types::CompilationSession;

/// Compile one source file (and everything it includes) into a module.
pub fn compile_file(path: &Path) -> Result<Module> {
    let session = CompilationSession::new();
    let label = path.display().to_string();
    let mut builder = Builder::new(&session, &label);
    tpp_parse::parse_file(path, &session, &mut |expr| {
        builder.lower(&expr).map(|_| ())
    })?;
    builder.finish()
}

/// Compile in-memory source text under a synthetic label.
pub fn compile_str(source: &str, label: &str) -> Result<Module> {
    let session = CompilationSession::new();
    let mut builder = Builder::new(&session, label);
    tpp_parse::parse_str(source, label, &session, &mut |expr| {
        builder.lower(&expr).map(|_| ())
    })?;
    builder.finish()
}
