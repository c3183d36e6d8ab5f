//! Error taxonomy for the fusion engine (spec.md §7).
//!
//! Grounded in `ftui-runtime::undo::command::CommandError`'s style: a plain
//! enum plus a hand-written `Display`, not a `thiserror`-derived one — the
//! teacher reserves `thiserror` for crates with many independent error
//! sources (`ftui-backend`, `ftui-web`), and uses the plain-enum style for
//! single-pipeline error paths like undo commands. The submission pipeline
//! is exactly that shape.

use std::fmt;

use crate::ids::{CellId, CompositeId, HookId};

/// Stable identifier for each failure mode, per spec.md §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionErrorKind {
    /// Any phase-4 check failed.
    ValidationRejected,
    /// Two composites asked for incompatible values for the same cell in phase 2.
    CompletionConflict,
    /// Phase 2 exceeded the round cap.
    CompletionDivergent,
    /// A composite's `complete` returned an identifier outside its own binding.
    CompletionExtendsUnknownCell,
    /// A nested submission intersects the active cell set of the same thread.
    Reentrant,
    /// The value-adoption submission inside `join` failed.
    FusionRejected,
    /// A hook received a value its owning composite refused at the wrapper
    /// layer boundary. Never constructed by the core itself; re-exported so
    /// wrapper layers can report it without being confused with
    /// `ValidationRejected`.
    TypeMismatch,
}

impl FusionErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationRejected => "ValidationRejected",
            Self::CompletionConflict => "CompletionConflict",
            Self::CompletionDivergent => "CompletionDivergent",
            Self::CompletionExtendsUnknownCell => "CompletionExtendsUnknownCell",
            Self::Reentrant => "Reentrant",
            Self::FusionRejected => "FusionRejected",
            Self::TypeMismatch => "TypeMismatch",
        }
    }
}

impl fmt::Display for FusionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which participant raised a [`FusionError`] (§7: "includes the composite
/// id or hook id and the failing reason").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSource {
    Composite(CompositeId),
    Hook(HookId),
    Cell(CellId),
    Engine,
}

/// A structured `(ok, message)` failure crossing the core's API boundary.
#[derive(Debug)]
pub struct FusionError {
    kind: FusionErrorKind,
    message: String,
    source_participant: FailureSource,
    wrapped: Option<Box<FusionError>>,
}

impl FusionError {
    #[must_use]
    pub fn new(kind: FusionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source_participant: FailureSource::Engine,
            wrapped: None,
        }
    }

    #[must_use]
    pub fn from_participant(
        kind: FusionErrorKind,
        source: FailureSource,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source_participant: source,
            wrapped: None,
        }
    }

    /// Wrap an inner error (e.g. `FusionRejected` wrapping the
    /// `ValidationRejected` produced by `join`'s value-adoption submission,
    /// spec.md §4.5 step 3 and §8 scenario S4).
    #[must_use]
    pub fn wrapping(kind: FusionErrorKind, message: impl Into<String>, cause: FusionError) -> Self {
        Self {
            kind,
            message: message.into(),
            source_participant: FailureSource::Engine,
            wrapped: Some(Box::new(cause)),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> FusionErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn source_participant(&self) -> FailureSource {
        self.source_participant
    }

    #[must_use]
    pub fn cause(&self) -> Option<&FusionError> {
        self.wrapped.as_deref()
    }

    /// Walk the wrap chain to find the first error of `kind`, if any.
    #[must_use]
    pub fn find(&self, kind: FusionErrorKind) -> Option<&FusionError> {
        if self.kind == kind {
            return Some(self);
        }
        self.cause().and_then(|c| c.find(kind))
    }
}

impl fmt::Display for FusionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(cause) = &self.wrapped {
            write!(f, " (caused by {cause})")?;
        }
        Ok(())
    }
}

impl std::error::Error for FusionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.wrapped.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// The structured `(ok, message)` result every write entry point returns
/// (spec.md §7 "User-visible failure behavior").
pub type FusionResult<T> = Result<T, FusionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = FusionError::new(FusionErrorKind::Reentrant, "cell 3 already committing");
        let rendered = err.to_string();
        assert!(rendered.contains("Reentrant"));
        assert!(rendered.contains("cell 3"));
    }

    #[test]
    fn wrapping_preserves_cause_chain() {
        let inner = FusionError::new(FusionErrorKind::ValidationRejected, "key missing");
        let outer = FusionError::wrapping(FusionErrorKind::FusionRejected, "join rejected", inner);
        assert_eq!(outer.kind(), FusionErrorKind::FusionRejected);
        assert_eq!(outer.cause().unwrap().kind(), FusionErrorKind::ValidationRejected);
        assert!(outer.find(FusionErrorKind::ValidationRejected).is_some());
        assert!(std::error::Error::source(&outer).is_some());
    }
}
