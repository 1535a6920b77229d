//! Parser for T++ source files.
//!
//! A recursive-descent parser with operator-precedence climbing for
//! binary expressions. The parser consumes the tokenizer lazily, holding
//! exactly one look-ahead token, and hands each top-level AST node to a
//! caller-supplied callback as soon as it is complete.
//!
//! `include "path"` directives recursively parse the named file (resolved
//! relative to the including file when not absolute); files already
//! visited in the current run are skipped by canonical path, so diamond
//! includes parse each file once.
//!
//! There is no error recovery: any unexpected token aborts parsing of the
//! current file with a location-tagged diagnostic.

mod grammar;
mod parser;

pub use parser::{parse_file, parse_str, Parser};
