//! Parser state, token predicates, and the file-level driver.

use std::fs;
use std::path::{Path, PathBuf};

use tpp_diagnostic::{Error, ErrorKind, Result};
use tpp_ir::{Expr, SourceLocation, Token, TokenKind};
use tpp_lexer::Tokenizer;
use tpp_types::CompilationSession;

/// Per-node sink invoked by the driver for each top-level AST node.
pub(crate) type Callback<'a> = dyn FnMut(Expr) -> Result<()> + 'a;

/// Parse one file and everything it includes, invoking `callback` per
/// top-level node in source order.
pub fn parse_file(
    path: &Path,
    session: &CompilationSession,
    callback: &mut dyn FnMut(Expr) -> Result<()>,
) -> Result<()> {
    let mut visited = Vec::new();
    parse_file_inner(path, session, &mut visited, callback)
}

/// Parse in-memory source text under a synthetic file label.
///
/// Includes still hit the file system, resolved against the current
/// directory.
pub fn parse_str(
    source: &str,
    label: &str,
    session: &CompilationSession,
    callback: &mut dyn FnMut(Expr) -> Result<()>,
) -> Result<()> {
    let mut visited = Vec::new();
    let mut parser = Parser::new(source, label, PathBuf::new(), session)?;
    parser.run(&mut visited, callback)
}

pub(crate) fn parse_file_inner(
    path: &Path,
    session: &CompilationSession,
    visited: &mut Vec<PathBuf>,
    callback: &mut Callback<'_>,
) -> Result<()> {
    let canonical = fs::canonicalize(path).map_err(|_| {
        Error::unlocated(ErrorKind::FileOpen {
            path: path.display().to_string(),
        })
    })?;
    if visited.contains(&canonical) {
        tracing::debug!(file = %canonical.display(), "skipping already-parsed file");
        return Ok(());
    }
    visited.push(canonical.clone());

    let source = fs::read_to_string(&canonical).map_err(|_| {
        Error::unlocated(ErrorKind::FileOpen {
            path: canonical.display().to_string(),
        })
    })?;
    let label = canonical.display().to_string();
    let dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();

    tracing::debug!(file = %label, "parsing file");
    let mut parser = Parser::new(&source, &label, dir, session)?;
    parser.run(visited, callback)
}

/// Recursive-descent parser over one token stream.
///
/// Holds one look-ahead token, the active namespace-prefix stack, and the
/// "inside function body" flag that controls whether new top-level names
/// are namespace-qualified.
pub struct Parser<'s> {
    pub(crate) session: &'s CompilationSession,
    tokenizer: Tokenizer,
    /// Directory relative includes resolve against.
    pub(crate) dir: PathBuf,
    /// The single look-ahead token.
    pub(crate) token: Token,
    pub(crate) namespace: Vec<Box<str>>,
    pub(crate) in_function: bool,
}

impl<'s> Parser<'s> {
    pub fn new(
        source: &str,
        label: &str,
        dir: PathBuf,
        session: &'s CompilationSession,
    ) -> Result<Self> {
        let mut tokenizer = Tokenizer::new(source, label);
        let token = tokenizer.next_token()?;
        Ok(Parser {
            session,
            tokenizer,
            dir,
            token,
            namespace: Vec::new(),
            in_function: false,
        })
    }

    /// Drive the statement parser until end of input.
    pub(crate) fn run(
        &mut self,
        visited: &mut Vec<PathBuf>,
        callback: &mut Callback<'_>,
    ) -> Result<()> {
        while let Some(expr) = self.next_node(visited, callback)? {
            callback(expr)?;
        }
        Ok(())
    }

    /// The next top-level node, handling directives (`include`, namespace
    /// toggles, `struct`) along the way. `None` at end of input.
    fn next_node(
        &mut self,
        visited: &mut Vec<PathBuf>,
        callback: &mut Callback<'_>,
    ) -> Result<Option<Expr>> {
        loop {
            if self.at_eof() {
                return Ok(None);
            }
            if self.token.is("include") {
                self.parse_include(visited, callback)?;
                continue;
            }
            if self.token.is(":") {
                self.parse_namespace()?;
                continue;
            }
            if self.token.is("struct") {
                return self.parse_struct().map(Some);
            }
            return self.parse().map(Some);
        }
    }

    // === Token predicates ===

    pub(crate) fn location(&self) -> SourceLocation {
        self.token.location.clone()
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.token.is_eof()
    }

    pub(crate) fn at_kind(&self, kind: TokenKind) -> bool {
        self.token.kind == kind
    }

    pub(crate) fn at(&self, text: &str) -> bool {
        self.token.is(text)
    }

    /// Advance the look-ahead by one token.
    pub(crate) fn advance(&mut self) -> Result<()> {
        self.token = self.tokenizer.next_token()?;
        Ok(())
    }

    /// Consume the current token and return it.
    pub(crate) fn skip(&mut self) -> Result<Token> {
        let token = self.token.clone();
        self.advance()?;
        Ok(token)
    }

    pub(crate) fn next_if_at(&mut self, text: &str) -> Result<bool> {
        if self.at(text) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    pub(crate) fn expect_kind(&mut self, kind: TokenKind) -> Result<Token> {
        if self.at_kind(kind) {
            return self.skip();
        }
        Err(self.unexpected())
    }

    pub(crate) fn expect(&mut self, text: &str) -> Result<()> {
        if self.at(text) {
            self.advance()?;
            return Ok(());
        }
        Err(self.unexpected())
    }

    /// The failure for the current look-ahead token.
    pub(crate) fn unexpected(&self) -> Error {
        if self.at_eof() {
            Error::new(self.location(), ErrorKind::UnexpectedEof)
        } else {
            Error::new(
                self.location(),
                ErrorKind::Syntax {
                    found: self.token.text.clone(),
                },
            )
        }
    }
}
