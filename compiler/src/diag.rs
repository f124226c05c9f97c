// diag.rs — Unified diagnostics model
//
// Provides the shared diagnostic types used across all compiler phases,
// plus the stable code table.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use chumsky::span::Span as _;

use crate::ast::{Span, Tier};

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0101`, `W0301`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable diagnostic codes, grouped by hundreds:
/// `E00xx` syntax, `E01xx` placement predicates, `E02xx` jdata policy,
/// `E03xx` activity signatures, `E04xx` scope discipline.
pub mod codes {
    use super::DiagCode;

    pub const E0001: DiagCode = DiagCode("E0001"); // syntax error

    pub const E0101: DiagCode = DiagCode("E0101"); // invalid sys.type operator
    pub const E0102: DiagCode = DiagCode("E0102"); // sys.type on both sides
    pub const E0103: DiagCode = DiagCode("E0103"); // unknown named condition

    pub const E0201: DiagCode = DiagCode("E0201"); // write to broadcaster
    pub const E0202: DiagCode = DiagCode("E0202"); // read from logger
    pub const E0203: DiagCode = DiagCode("E0203"); // managed write to logger
    pub const E0204: DiagCode = DiagCode("E0204"); // broadcaster name redeclared
    pub const E0205: DiagCode = DiagCode("E0205"); // unknown jdata kind

    pub const E0301: DiagCode = DiagCode("E0301"); // callback parameter on sync activity
    pub const E0302: DiagCode = DiagCode("E0302"); // prototype arity mismatch
    pub const E0303: DiagCode = DiagCode("E0303"); // unsupported type

    pub const E0401: DiagCode = DiagCode("E0401"); // scope exit with no open scope
    pub const E0402: DiagCode = DiagCode("E0402"); // scope left open

    pub const W0301: DiagCode = DiagCode("W0301"); // managed activity without prototype
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A compiler diagnostic emitted by any phase.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
    /// Source file the span points into.
    pub tier: Option<Tier>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code or hint.
    pub fn new(level: DiagLevel, span: Span, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span,
            message: message.into(),
            hint: None,
            tier: None,
        }
    }

    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, span, message)
    }

    pub fn warning(span: Span, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, span, message)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }

    /// 1-based `line:col` of the primary span within `source`.
    pub fn location(&self, source: &str) -> (usize, usize) {
        let offset = self.span.start().min(source.len());
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let col = before.rfind('\n').map_or(offset, |nl| offset - nl - 1) + 1;
        (line, col)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}
