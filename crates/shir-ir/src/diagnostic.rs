//! Translation and validation diagnostics.
//!
//! Source errors never unwind out of the translator or the validation passes.
//! They are reported to a [`DiagnosticSink`] and the walk continues.

use std::fmt;

use shir_ast::CodeLocation;

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum DiagnosticKind {
    /// An unresolvable construct found while lowering.
    Translation,
    /// A whole-program check failed on a structurally complete module.
    Validation,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Translation => f.write_str("translation"),
            DiagnosticKind::Validation => f.write_str("validation"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub short_message: String,
    pub full_message: String,
    pub location: Option<CodeLocation>,
    /// Reference chain, outermost first. Only stage and recursion errors carry one.
    pub call_stack: Vec<CodeLocation>,
}

impl Diagnostic {
    pub fn translation(
        location: Option<CodeLocation>,
        short_message: impl Into<String>,
        full_message: impl Into<String>,
    ) -> Self {
        Self {
            kind: DiagnosticKind::Translation,
            short_message: short_message.into(),
            full_message: full_message.into(),
            location,
            call_stack: Vec::new(),
        }
    }

    pub fn validation(
        location: Option<CodeLocation>,
        short_message: impl Into<String>,
        full_message: impl Into<String>,
        call_stack: Vec<CodeLocation>,
    ) -> Self {
        Self {
            kind: DiagnosticKind::Validation,
            short_message: short_message.into(),
            full_message: full_message.into(),
            location,
            call_stack,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = &self.location {
            write!(f, "{loc}: ")?;
        }
        write!(f, "{} error: {}", self.kind, self.full_message)?;
        for loc in &self.call_stack {
            write!(f, "\n    at {loc}")?;
        }
        Ok(())
    }
}

/// Receives diagnostics as they are raised.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl<F: FnMut(Diagnostic)> DiagnosticSink for F {
    fn report(&mut self, diagnostic: Diagnostic) {
        self(diagnostic)
    }
}

/// A sink that keeps every diagnostic.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    pub items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Returns `true` if any diagnostic's full message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.items.iter().any(|d| d.full_message.contains(needle))
    }
}

impl DiagnosticSink for Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location_and_stack() {
        let d = Diagnostic::validation(
            Some(CodeLocation::new("a.shader", 3, 7)),
            "Invalid shader stage combination",
            "'A.Main' requires shader stage Vertex",
            vec![CodeLocation::new("a.shader", 9, 1)],
        );
        let text = d.to_string();
        assert!(text.starts_with("a.shader:3:7: validation error:"));
        assert!(text.contains("\n    at a.shader:9:1"));
    }

    #[test]
    fn closures_are_sinks() {
        let mut seen = Vec::new();
        {
            let mut sink = |d: Diagnostic| seen.push(d.short_message);
            sink.report(Diagnostic::translation(None, "short", "full"));
        }
        assert_eq!(seen, vec!["short".to_string()]);
    }

    #[test]
    fn collector_tracks_errors() {
        let mut diags = Diagnostics::new();
        assert!(!diags.has_errors());
        diags.report(Diagnostic::translation(None, "x", "Type 'T' cannot be copied."));
        assert!(diags.has_errors());
        assert!(diags.contains("cannot be copied"));
    }
}
