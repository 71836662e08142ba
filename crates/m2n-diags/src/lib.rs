
use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use std::io;
use std::ops::Range;

/// Character offsets into a `.m2n` source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DiagnosticError {
    #[error("Syntax error: {message}")]
    Syntax { message: String, span: Span },
}

impl DiagnosticError {
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        DiagnosticError::Syntax {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            DiagnosticError::Syntax { span, .. } => *span,
        }
    }

    pub fn to_diagnostic(&self, filename: &str) -> Diagnostic {
        match self {
            DiagnosticError::Syntax { message, span } => {
                Diagnostic::error(filename, "syntax error", *span).with_label(message.clone())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A source-anchored message rendered through ariadne.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub filename: String,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    pub label: Option<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(filename: &str, message: impl Into<String>, span: Span) -> Self {
        Self {
            filename: filename.to_string(),
            severity: Severity::Error,
            message: message.into(),
            span,
            label: None,
            help: None,
        }
    }

    pub fn warning(filename: &str, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(filename, message, span)
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Print the diagnostic to stderr.
    pub fn report(&self, source: &str) -> io::Result<()> {
        self.build(source, true)
            .eprint((self.filename.as_str(), Source::from(source)))
    }

    /// Render without colours, for logs and tests.
    pub fn render(&self, source: &str) -> String {
        let mut out = Vec::new();
        if self
            .build(source, false)
            .write((self.filename.as_str(), Source::from(source)), &mut out)
            .is_err()
        {
            return self.message.clone();
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    fn build(&self, source: &str, color: bool) -> Report<'_, (&str, Range<usize>)> {
        let len = source.chars().count();
        let start = self.span.start.min(len);
        let end = self.span.end.clamp(start, len);
        let (kind, label_color) = match self.severity {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
        };

        let mut label = Label::new((self.filename.as_str(), start..end)).with_color(label_color);
        if let Some(text) = &self.label {
            label = label.with_message(text);
        }

        let mut builder = Report::build(kind, self.filename.as_str(), start)
            .with_config(Config::default().with_color(color))
            .with_message(&self.message)
            .with_label(label);
        if let Some(help) = &self.help {
            builder = builder.with_help(help);
        }
        builder.finish()
    }
}

/// Closest candidate to `name`, if any is similar enough to be worth suggesting.
pub fn suggest<'a, I>(name: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(f64, &str)> = None;
    for candidate in candidates {
        let score = strsim::jaro_winkler(name, candidate);
        if score < 0.8 {
            continue;
        }
        match best {
            Some((best_score, _)) if best_score >= score => {}
            _ => best = Some((score, candidate)),
        }
    }
    best.map(|(_, candidate)| candidate.to_string())
}
