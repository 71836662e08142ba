use m2n_lexer::Span;
use std::fmt;

/// One parsed `.m2n` file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Assembly {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Namespace(NamespaceDecl),
    Type(TypeDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceDecl {
    pub path: Vec<String>,
    pub items: Vec<Item>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Internal,
    Protected,
    Private,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub kind: TypeDeclKind,
    pub visibility: Visibility,
    pub is_static: bool,
    pub attributes: Vec<Attribute>,
    pub span: Span,
}

impl TypeDecl {
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes
            .iter()
            .any(|attr| attr.name == name || attr.name == format!("{}Attribute", name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDeclKind {
    Class(ClassBody),
    Struct(ClassBody),
    Enum(EnumBody),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassBody {
    pub base: Option<TypeName>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumBody {
    pub underlying: Option<Type>,
    pub items: Vec<EnumItemDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumItemDecl {
    pub name: String,
    pub value: Option<EnumExpr>,
    pub span: Span,
}

/// Constant expression allowed as an enum item value.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumExpr {
    Literal(u64, Span),
    Item(String, Span),
    Negate(Box<EnumExpr>, Span),
    ShiftLeft(Box<EnumExpr>, Box<EnumExpr>),
    BitOr(Box<EnumExpr>, Box<EnumExpr>),
}

impl EnumExpr {
    pub fn span(&self) -> Span {
        match self {
            EnumExpr::Literal(_, span) | EnumExpr::Item(_, span) | EnumExpr::Negate(_, span) => {
                *span
            }
            EnumExpr::ShiftLeft(lhs, rhs) | EnumExpr::BitOr(lhs, rhs) => lhs.span().merge(rhs.span()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
    pub visibility: Visibility,
    pub is_static: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberKind {
    Constructor {
        params: Vec<Parameter>,
    },
    Method {
        params: Vec<Parameter>,
        return_type: Type,
    },
    Property {
        ty: Type,
        getter: Option<Accessor>,
        setter: Option<Accessor>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    pub visibility: Visibility,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamModifier {
    None,
    In,
    Out,
    Ref,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
    pub modifier: ParamModifier,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    pub segments: Vec<String>,
    pub span: Span,
}

impl TypeName {
    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Void,
    Primitive(PrimitiveKind),
    String,
    Named(TypeName),
    Array(Box<Type>),
    Generic(TypeName, Vec<Type>),
    Nullable(Box<Type>),
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Primitive(kind) => write!(f, "{}", kind),
            Type::String => write!(f, "string"),
            Type::Named(name) => write!(f, "{}", name.dotted()),
            Type::Array(element) => write!(f, "{}[]", element),
            Type::Generic(name, args) => {
                write!(f, "{}<", name.dotted())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ">")
            }
            Type::Nullable(inner) => write!(f, "{}?", inner),
        }
    }
}

/// Built-in value kinds that cross the boundary by copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Char,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
}

impl PrimitiveKind {
    pub fn from_keyword(name: &str) -> Option<PrimitiveKind> {
        match name {
            "bool" => Some(PrimitiveKind::Bool),
            "char" => Some(PrimitiveKind::Char),
            "sbyte" => Some(PrimitiveKind::SByte),
            "byte" => Some(PrimitiveKind::Byte),
            "short" => Some(PrimitiveKind::Int16),
            "ushort" => Some(PrimitiveKind::UInt16),
            "int" => Some(PrimitiveKind::Int32),
            "uint" => Some(PrimitiveKind::UInt32),
            "long" => Some(PrimitiveKind::Int64),
            "ulong" => Some(PrimitiveKind::UInt64),
            "float" => Some(PrimitiveKind::Single),
            "double" => Some(PrimitiveKind::Double),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Char => "char",
            PrimitiveKind::SByte => "sbyte",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Int16 => "short",
            PrimitiveKind::UInt16 => "ushort",
            PrimitiveKind::Int32 => "int",
            PrimitiveKind::UInt32 => "uint",
            PrimitiveKind::Int64 => "long",
            PrimitiveKind::UInt64 => "ulong",
            PrimitiveKind::Single => "float",
            PrimitiveKind::Double => "double",
        }
    }

    /// CLR type name, used where a capitalised spelling is needed.
    pub fn clr_name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "Bool",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::SByte => "Int8",
            PrimitiveKind::Byte => "UInt8",
            PrimitiveKind::Int16 => "Int16",
            PrimitiveKind::UInt16 => "UInt16",
            PrimitiveKind::Int32 => "Int32",
            PrimitiveKind::UInt32 => "UInt32",
            PrimitiveKind::Int64 => "Int64",
            PrimitiveKind::UInt64 => "UInt64",
            PrimitiveKind::Single => "Float",
            PrimitiveKind::Double => "Double",
        }
    }

    pub fn is_integral(self) -> bool {
        !matches!(
            self,
            PrimitiveKind::Bool | PrimitiveKind::Char | PrimitiveKind::Single | PrimitiveKind::Double
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimitiveKind::SByte | PrimitiveKind::Int16 | PrimitiveKind::Int32 | PrimitiveKind::Int64
        )
    }

    pub fn bit_width(self) -> u32 {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::SByte | PrimitiveKind::Byte => 8,
            PrimitiveKind::Char | PrimitiveKind::Int16 | PrimitiveKind::UInt16 => 16,
            PrimitiveKind::Int32 | PrimitiveKind::UInt32 | PrimitiveKind::Single => 32,
            PrimitiveKind::Int64 | PrimitiveKind::UInt64 | PrimitiveKind::Double => 64,
        }
    }

    /// Inclusive value range of an integral kind. `char` is treated as a 16-bit unsigned unit.
    pub fn integer_range(self) -> Option<(i128, i128)> {
        if !(self.is_integral() || self == PrimitiveKind::Char) {
            return None;
        }
        let bits = self.bit_width();
        if self.is_signed() {
            Some((-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1))
        } else {
            Some((0, (1i128 << bits) - 1))
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}
