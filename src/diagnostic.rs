use crate::span::Span;

/// Stable numeric diagnostic codes. Codes never change meaning once
/// assigned; tooling matches on them, not on message text.
pub mod codes {
    // Declaration resolution (7xxx).
    pub const UNDECLARED_IDENTIFIER: u32 = 7576;
    pub const PATH_NOT_UNIQUE: u32 = 7920;
    pub const INHERITDOC_MISSING_NAME: u32 = 1933;
    pub const INHERITDOC_MALFORMED: u32 = 5967;
    pub const INHERITDOC_UNKNOWN_CONTRACT: u32 = 9397;
    pub const INHERITDOC_NOT_A_CONTRACT: u32 = 1430;
    pub const INHERITDOC_REPEATED: u32 = 5142;

    // Backend semantic checks (2xxx).
    pub const DUPLICATE_FUNCTION_ID: u32 = 2001;
    pub const OVERRIDE_ID_PRESENCE: u32 = 2002;
    pub const OVERRIDE_ID_VALUE: u32 = 2003;
    pub const OVERRIDE_RESPONSIBLE: u32 = 2004;
    pub const OVERRIDE_MSG_DIRECTION: u32 = 2005;
    pub const PUBLIC_OVERLOAD: u32 = 2006;
    pub const FUNCTION_ID_ZERO: u32 = 2007;
    pub const FUNCTION_ID_NOT_ELIGIBLE: u32 = 2008;
    pub const FUNCTION_ID_SPECIAL_KIND: u32 = 2009;
    pub const INLINE_PUBLIC: u32 = 2010;
    pub const UPGRADE_HOOK_RETURNS: u32 = 2011;
    pub const UPGRADE_HOOK_VISIBILITY: u32 = 2012;
    pub const DISPATCH_HOOK_PARAMS: u32 = 2013;
    pub const DISPATCH_HOOK_RETURN: u32 = 2014;
    pub const DISPATCH_HOOK_VISIBILITY: u32 = 2015;
    pub const DISPATCH_HOOK_INLINE: u32 = 2016;
    pub const STATE_VARIABLE_TRANSIENT: u32 = 2017;
    pub const MAPPING_KEY_MEMBER: u32 = 2018;
    pub const MAPPING_KEY_WIDTH: u32 = 2019;
    pub const RANGE_ACCESS_BASE: u32 = 2020;

    // Constructor composition (3xxx).
    pub const BASE_CONSTRUCTOR_ARGS: u32 = 3001;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A pointer at a related declaration, rendered as an extra label.
#[derive(Clone, Debug)]
pub struct SecondaryLabel {
    pub span: Span,
    pub message: String,
}

/// A compiler diagnostic with a stable code, a primary location, and an
/// optional secondary location pointing at a related declaration.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: u32,
    pub message: String,
    pub span: Span,
    pub secondary: Option<SecondaryLabel>,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(code: u32, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            span,
            secondary: None,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn warning(code: u32, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message, span)
        }
    }

    pub fn with_secondary(mut self, span: Span, message: impl Into<String>) -> Self {
        self.secondary = Some(SecondaryLabel {
            span,
            message: message.into(),
        });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Render the diagnostic to stderr using ariadne.
    pub fn render(&self, filename: &str, source: &str) {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        let kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };

        let color = match self.severity {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
        };

        let mut report = Report::build(kind, filename, self.span.start as usize)
            .with_code(self.code)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, self.span.range()))
                    .with_message(&self.message)
                    .with_color(color),
            );

        if let Some(sec) = &self.secondary {
            report = report.with_label(
                Label::new((filename, sec.span.range()))
                    .with_message(&sec.message)
                    .with_color(Color::Blue),
            );
        }

        for note in &self.notes {
            report = report.with_note(note);
        }

        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        let _ = report.finish().eprint((filename, Source::from(source)));
    }
}

/// Accumulating diagnostic sink for one compilation.
///
/// Diagnostics are collected, never thrown; passes that require a clean
/// predecessor consult `has_errors` before proceeding.
#[derive(Default)]
pub struct Reporter {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Error {
            self.error_count += 1;
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        self.error_count = 0;
        std::mem::take(&mut self.diagnostics)
    }

    /// Render every collected diagnostic to stderr.
    pub fn render_all(&self, filename: &str, source: &str) {
        for diag in &self.diagnostics {
            diag.render(filename, source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let span = Span::new(0, 10, 15);
        let d = Diagnostic::error(codes::PUBLIC_OVERLOAD, "overload", span);
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.code, codes::PUBLIC_OVERLOAD);
        assert_eq!(d.span.start, 10);
        assert!(d.secondary.is_none());
    }

    #[test]
    fn test_with_secondary() {
        let d = Diagnostic::error(codes::DUPLICATE_FUNCTION_ID, "dup", Span::dummy())
            .with_secondary(Span::new(0, 3, 7), "other declaration is here");
        let sec = d.secondary.unwrap();
        assert_eq!(sec.span.start, 3);
        assert_eq!(sec.message, "other declaration is here");
    }

    #[test]
    fn test_reporter_counts_errors_only() {
        let mut reporter = Reporter::new();
        reporter.report(Diagnostic::warning(0, "w", Span::dummy()));
        assert!(!reporter.has_errors());
        reporter.report(Diagnostic::error(1, "e", Span::dummy()));
        assert!(reporter.has_errors());
        assert_eq!(reporter.error_count(), 1);
        assert_eq!(reporter.diagnostics().len(), 2);
    }

    #[test]
    fn test_reporter_take_resets() {
        let mut reporter = Reporter::new();
        reporter.report(Diagnostic::error(1, "e", Span::dummy()));
        let taken = reporter.take();
        assert_eq!(taken.len(), 1);
        assert!(!reporter.has_errors());
        assert!(reporter.diagnostics().is_empty());
    }

    #[test]
    fn test_render_does_not_panic() {
        let source = "contract C { function f() {} }\n";
        let d = Diagnostic::error(codes::INLINE_PUBLIC, "inline public", Span::new(0, 13, 27))
            .with_secondary(Span::new(0, 0, 8), "contract is here")
            .with_note("inline functions are expanded at call sites")
            .with_help("mark the function private or internal");
        d.render("test.kl", source);
    }
}
