// error.rs — Semantic error kinds raised by the core components.
//
// Components return `Result<_, CompileError>`; the pipeline converts each
// error into a `Diagnostic` carrying a stable code from `diag::codes`.

use thiserror::Error;

use crate::ast::Span;
use crate::diag::{codes, DiagCode, Diagnostic};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    // ── Placement predicates ──
    #[error("operator `{op}` is not allowed on sys.type (use == or !=)")]
    InvalidSysTypeOperator { op: String, span: Span },

    #[error("sys.type cannot appear on both sides of a comparison")]
    SysTypeBothSides { span: Span },

    #[error("unknown condition `{name}`")]
    UnknownCondition { name: String, span: Span },

    // ── jdata policy ──
    #[error("cannot write to broadcaster `{name}` from the embedded tier")]
    BroadcasterWrite { name: String, span: Span },

    #[error("cannot read from logger `{name}` in the embedded tier")]
    LoggerRead { name: String, span: Span },

    #[error("cannot write to logger `{name}` from the managed tier")]
    ManagedLoggerWrite { name: String, span: Span },

    #[error("`{name}` is a broadcaster and cannot be redeclared")]
    BroadcasterRedeclared { name: String, span: Span },

    #[error("unknown jdata kind `{kind}` for `{name}` (expected logger, broadcaster or shuffler)")]
    UnknownJdataKind {
        name: String,
        kind: String,
        span: Span,
    },

    // ── Activity signatures ──
    #[error("sync activity `{activity}` cannot take callback parameter `{param}`")]
    SyncCallbackParam {
        activity: String,
        param: String,
        span: Span,
    },

    #[error("prototype `{name}` declares {expected} parameter(s) but the activity takes {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },

    #[error("unsupported type `{ty}`")]
    UnsupportedType { ty: String, span: Span },

    // ── Scope discipline ──
    #[error("scope exit with no open scope")]
    ScopeUnderflow { span: Span },

    #[error("{open} scope(s) left open after `{context}`")]
    ScopeLeak {
        context: String,
        open: usize,
        span: Span,
    },
}

pub type Result<T> = std::result::Result<T, CompileError>;

impl CompileError {
    pub fn span(&self) -> Span {
        match self {
            CompileError::InvalidSysTypeOperator { span, .. }
            | CompileError::SysTypeBothSides { span }
            | CompileError::UnknownCondition { span, .. }
            | CompileError::BroadcasterWrite { span, .. }
            | CompileError::LoggerRead { span, .. }
            | CompileError::ManagedLoggerWrite { span, .. }
            | CompileError::BroadcasterRedeclared { span, .. }
            | CompileError::UnknownJdataKind { span, .. }
            | CompileError::SyncCallbackParam { span, .. }
            | CompileError::ArityMismatch { span, .. }
            | CompileError::UnsupportedType { span, .. }
            | CompileError::ScopeUnderflow { span }
            | CompileError::ScopeLeak { span, .. } => *span,
        }
    }

    pub fn code(&self) -> DiagCode {
        match self {
            CompileError::InvalidSysTypeOperator { .. } => codes::E0101,
            CompileError::SysTypeBothSides { .. } => codes::E0102,
            CompileError::UnknownCondition { .. } => codes::E0103,
            CompileError::BroadcasterWrite { .. } => codes::E0201,
            CompileError::LoggerRead { .. } => codes::E0202,
            CompileError::ManagedLoggerWrite { .. } => codes::E0203,
            CompileError::BroadcasterRedeclared { .. } => codes::E0204,
            CompileError::UnknownJdataKind { .. } => codes::E0205,
            CompileError::SyncCallbackParam { .. } => codes::E0301,
            CompileError::ArityMismatch { .. } => codes::E0302,
            CompileError::UnsupportedType { .. } => codes::E0303,
            CompileError::ScopeUnderflow { .. } => codes::E0401,
            CompileError::ScopeLeak { .. } => codes::E0402,
        }
    }

    fn hint(&self) -> Option<&'static str> {
        match self {
            CompileError::BroadcasterWrite { .. } => {
                Some("broadcasters are written by the managed tier")
            }
            CompileError::LoggerRead { .. } => Some("loggers are read by the managed tier"),
            CompileError::SyncCallbackParam { .. } => {
                Some("declare the activity with jasync to pass callbacks")
            }
            CompileError::UnsupportedType { .. } => {
                Some("supported types are int, float, char, char* and jcallback")
            }
            _ => None,
        }
    }
}

impl From<CompileError> for Diagnostic {
    fn from(err: CompileError) -> Self {
        let mut diag = Diagnostic::error(err.span(), err.to_string()).with_code(err.code());
        if let Some(hint) = err.hint() {
            diag = diag.with_hint(hint);
        }
        diag
    }
}
