//! Unified error type for every compiler stage.
//!
//! One closed `CompileError`, one `ErrorKind` enum — no per-stage error
//! types, so the orchestration layer never needs to convert between them.
//! Every variant carries the span where it was detected and renders through
//! `miette` for source-annotated diagnostics.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use thiserror::Error;

use crate::ast::Span;

/// Source text plus a display name, kept around so errors can render a
/// snippet long after the original `&str` has gone out of scope.
#[derive(Debug, Clone)]
pub struct SourceText {
    pub name: String,
    pub content: String,
}

impl SourceText {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

/// Every fatal condition named in spec §7, one variant per kind.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    #[error("invalid escape or unterminated string")]
    LexError { detail: String },
    #[error("unbalanced delimiter")]
    ParseError { detail: String },
    #[error("reference to undefined macro `{name}`")]
    UnknownMacro { name: String },
    #[error("macro expansion exceeded the budget of {limit} rewrites")]
    MacroExpansionLimit { limit: usize },
    #[error("macro `{name}` transformer failed: {detail}")]
    MacroRuntimeError { name: String, detail: String },
    #[error("parameter `{name}` declared more than once")]
    DuplicateParam { name: String },
    #[error("default value for `{name}` references a later parameter `{referenced}`")]
    InvalidDefault { name: String, referenced: String },
    #[error("`return` used outside of a function body")]
    ReturnOutsideFunction,
    #[error("call site convention does not match declared convention of `{callee}`")]
    ConventionMismatch { callee: String },
    #[error("`{callee}` expected {expected} argument(s), found {found}")]
    ArityError {
        callee: String,
        expected: String,
        found: usize,
    },
    #[error("reference to unbound identifier `{name}`")]
    UnboundIdentifier { name: String },
    #[error("cyclic import between modules {modules:?}")]
    CyclicImport { modules: Vec<String> },
    #[error("could not locate module `{specifier}`")]
    MissingModule { specifier: String },
    #[error("module `{module}` has no export named `{name}`")]
    MissingExport { module: String, name: String },
    #[error("I/O failure: {detail}")]
    IOError { detail: String },
}

impl ErrorKind {
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::LexError { .. } => "lex_error",
            Self::ParseError { .. } => "parse_error",
            Self::UnknownMacro { .. } => "unknown_macro",
            Self::MacroExpansionLimit { .. } => "macro_expansion_limit",
            Self::MacroRuntimeError { .. } => "macro_runtime_error",
            Self::DuplicateParam { .. } => "duplicate_param",
            Self::InvalidDefault { .. } => "invalid_default",
            Self::ReturnOutsideFunction => "return_outside_function",
            Self::ConventionMismatch { .. } => "convention_mismatch",
            Self::ArityError { .. } => "arity_error",
            Self::UnboundIdentifier { .. } => "unbound_identifier",
            Self::CyclicImport { .. } => "cyclic_import",
            Self::MissingModule { .. } => "missing_module",
            Self::MissingExport { .. } => "missing_export",
            Self::IOError { .. } => "io_error",
        }
    }

    fn primary_label(&self) -> String {
        match self {
            Self::LexError { .. } => "invalid here".into(),
            Self::ParseError { .. } => "unbalanced here".into(),
            Self::UnknownMacro { .. } => "unknown macro".into(),
            Self::MacroExpansionLimit { .. } => "still expanding here".into(),
            Self::MacroRuntimeError { .. } => "transformer failed here".into(),
            Self::DuplicateParam { .. } => "duplicate parameter".into(),
            Self::InvalidDefault { .. } => "forward reference".into(),
            Self::ReturnOutsideFunction => "return here".into(),
            Self::ConventionMismatch { .. } => "call site".into(),
            Self::ArityError { .. } => "call site".into(),
            Self::UnboundIdentifier { .. } => "used here".into(),
            Self::CyclicImport { .. } => "import here".into(),
            Self::MissingModule { .. } => "import here".into(),
            Self::MissingExport { .. } => "import here".into(),
            Self::IOError { .. } => "here".into(),
        }
    }
}

/// The single error type threaded through every stage.
#[derive(Debug, Clone, Error)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub source: Arc<NamedSource<String>>,
    pub span: Span,
    pub help: Option<String>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, source: &SourceText, span: Span) -> Self {
        Self {
            kind,
            source: source.to_named_source(),
            span,
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    fn error_code(&self) -> String {
        format!("glyph::{}", self.kind.code_suffix())
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl Diagnostic for CompileError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.error_code()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help.as_ref().map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = SourceSpan::from(self.span.start..self.span.end);
        Some(Box::new(
            vec![LabeledSpan::new_with_span(Some(self.kind.primary_label()), span)].into_iter(),
        ))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.source)
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;

/// Prints a [`CompileError`] with full `miette` diagnostics. The only place
/// the core calls this is the `glyphc` binary's error path — the library
/// itself never prints.
pub fn report(error: &CompileError) {
    let report = miette::Report::new(error.clone());
    eprintln!("{report:?}");
}
