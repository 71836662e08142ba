pub use m2n_diags::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Using,
    Namespace,
    Class,
    Struct,
    Enum,
    Public,
    Private,
    Protected,
    Internal,
    Static,
    Sealed,
    Abstract,
    Virtual,
    Override,
    Readonly,
    Void,
    Out,
    Ref,
    In,
    Get,
    Set,
    Operator,
    Event,

    // Identifiers and literals
    Ident(String),
    IntLiteral(u64),

    // Operators
    Assign,
    Minus,
    Pipe,
    ShiftLeft,
    Less,
    Greater,
    Question,

    // Punctuation
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Semicolon,
    Comma,
    Colon,
    Dot,

    // Special
    Eof,
}

impl Token {
    pub fn keyword_from_str(s: &str) -> Option<Token> {
        match s {
            "using" => Some(Token::Using),
            "namespace" => Some(Token::Namespace),
            "class" => Some(Token::Class),
            "struct" => Some(Token::Struct),
            "enum" => Some(Token::Enum),
            "public" => Some(Token::Public),
            "private" => Some(Token::Private),
            "protected" => Some(Token::Protected),
            "internal" => Some(Token::Internal),
            "static" => Some(Token::Static),
            "sealed" => Some(Token::Sealed),
            "abstract" => Some(Token::Abstract),
            "virtual" => Some(Token::Virtual),
            "override" => Some(Token::Override),
            "readonly" => Some(Token::Readonly),
            "void" => Some(Token::Void),
            "out" => Some(Token::Out),
            "ref" => Some(Token::Ref),
            "in" => Some(Token::In),
            "get" => Some(Token::Get),
            "set" => Some(Token::Set),
            "operator" => Some(Token::Operator),
            "event" => Some(Token::Event),
            _ => None,
        }
    }

    /// Short human-readable form used in parser messages.
    pub fn describe(&self) -> String {
        let text = match self {
            Token::Ident(name) => return format!("identifier '{}'", name),
            Token::IntLiteral(value) => return format!("integer {}", value),
            Token::Eof => return "end of file".to_string(),
            Token::Using => "using",
            Token::Namespace => "namespace",
            Token::Class => "class",
            Token::Struct => "struct",
            Token::Enum => "enum",
            Token::Public => "public",
            Token::Private => "private",
            Token::Protected => "protected",
            Token::Internal => "internal",
            Token::Static => "static",
            Token::Sealed => "sealed",
            Token::Abstract => "abstract",
            Token::Virtual => "virtual",
            Token::Override => "override",
            Token::Readonly => "readonly",
            Token::Void => "void",
            Token::Out => "out",
            Token::Ref => "ref",
            Token::In => "in",
            Token::Get => "get",
            Token::Set => "set",
            Token::Operator => "operator",
            Token::Event => "event",
            Token::Assign => "=",
            Token::Minus => "-",
            Token::Pipe => "|",
            Token::ShiftLeft => "<<",
            Token::Less => "<",
            Token::Greater => ">",
            Token::Question => "?",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::Semicolon => ";",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Dot => ".",
        };
        format!("'{}'", text)
    }
}

#[derive(Debug, Clone)]
pub struct TokenWithSpan {
    pub token: Token,
    pub span: Span,
}
