use m2n_diags::{Diagnostic, Span};

/// A managed declaration that cannot be exposed natively. Only the offending
/// member is dropped; binding carries on with the rest of the assembly.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("native symbol '{symbol}' for {member} collides with {existing}")]
    NameCollision {
        symbol: String,
        member: String,
        existing: String,
        span: Span,
    },

    #[error("{member}: unsupported type '{ty}' ({reason})")]
    UnsupportedType {
        member: String,
        ty: String,
        reason: String,
        span: Span,
    },

    #[error("{member}: unknown type '{name}'")]
    UnknownType {
        member: String,
        name: String,
        suggestion: Option<String>,
        span: Span,
    },

    #[error("duplicate type '{path}'")]
    DuplicateType { path: String, span: Span },

    #[error("enum '{path}': {reason}")]
    InvalidEnum {
        path: String,
        reason: String,
        span: Span,
    },

    #[error("class '{path}' cannot derive from '{base}': {reason}")]
    InvalidBase {
        path: String,
        base: String,
        reason: String,
        span: Span,
    },

    #[error("{member}: static class '{path}' cannot have instance members or constructors")]
    StaticClassMember { member: String, path: String, span: Span },

    #[error("'{identifier}' for {member} is not a valid native identifier: {reason}")]
    InvalidIdentifier {
        identifier: String,
        member: String,
        reason: String,
        span: Span,
    },
}

impl GenerationError {
    pub fn span(&self) -> Span {
        match self {
            GenerationError::NameCollision { span, .. }
            | GenerationError::UnsupportedType { span, .. }
            | GenerationError::UnknownType { span, .. }
            | GenerationError::DuplicateType { span, .. }
            | GenerationError::InvalidEnum { span, .. }
            | GenerationError::InvalidBase { span, .. }
            | GenerationError::StaticClassMember { span, .. }
            | GenerationError::InvalidIdentifier { span, .. } => *span,
        }
    }

    pub fn to_diagnostic(&self, filename: &str) -> Diagnostic {
        let diagnostic = Diagnostic::error(filename, self.to_string(), self.span());
        match self {
            GenerationError::NameCollision { symbol, existing, .. } => diagnostic
                .with_label(format!("would also be exported as '{}'", symbol))
                .with_help(format!("'{}' is already taken by {}; rename one of the members", symbol, existing)),
            GenerationError::UnsupportedType { reason, .. } => diagnostic.with_label(reason.clone()),
            GenerationError::UnknownType { suggestion, .. } => {
                let diagnostic = diagnostic.with_label("not declared in this assembly");
                match suggestion {
                    Some(name) => diagnostic.with_help(format!("did you mean '{}'?", name)),
                    None => diagnostic,
                }
            }
            GenerationError::DuplicateType { .. } => diagnostic.with_label("declared more than once"),
            GenerationError::StaticClassMember { .. } => diagnostic
                .with_label("no handle exists for a static class")
                .with_help("mark the member 'static' or drop 'static' from the class"),
            GenerationError::InvalidEnum { reason, .. }
            | GenerationError::InvalidBase { reason, .. }
            | GenerationError::InvalidIdentifier { reason, .. } => diagnostic.with_label(reason.clone()),
        }
    }
}
