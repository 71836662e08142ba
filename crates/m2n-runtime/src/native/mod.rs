//! Native-side representations of values crossing the boundary.

pub mod array;
pub mod string;

pub use array::{NativeArray, NativeElement};
pub use string::NativeString;

use crate::heap::Handle;
use m2n_ast::PrimitiveKind;
use std::ffi::CString;
use std::fmt;

/// Kind tag shared by `M2nValue` slots and `M2nArray` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Void,
    Bool,
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    String,
    Handle,
    Array,
}

impl ElementKind {
    pub const ALL: [ElementKind; 16] = [
        ElementKind::Void,
        ElementKind::Bool,
        ElementKind::Char,
        ElementKind::I8,
        ElementKind::U8,
        ElementKind::I16,
        ElementKind::U16,
        ElementKind::I32,
        ElementKind::U32,
        ElementKind::I64,
        ElementKind::U64,
        ElementKind::F32,
        ElementKind::F64,
        ElementKind::String,
        ElementKind::Handle,
        ElementKind::Array,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Name of the `M2N_KIND_*` constant.
    pub fn constant(self) -> &'static str {
        match self {
            ElementKind::Void => "M2N_KIND_VOID",
            ElementKind::Bool => "M2N_KIND_BOOL",
            ElementKind::Char => "M2N_KIND_CHAR",
            ElementKind::I8 => "M2N_KIND_I8",
            ElementKind::U8 => "M2N_KIND_U8",
            ElementKind::I16 => "M2N_KIND_I16",
            ElementKind::U16 => "M2N_KIND_U16",
            ElementKind::I32 => "M2N_KIND_I32",
            ElementKind::U32 => "M2N_KIND_U32",
            ElementKind::I64 => "M2N_KIND_I64",
            ElementKind::U64 => "M2N_KIND_U64",
            ElementKind::F32 => "M2N_KIND_F32",
            ElementKind::F64 => "M2N_KIND_F64",
            ElementKind::String => "M2N_KIND_STRING",
            ElementKind::Handle => "M2N_KIND_HANDLE",
            ElementKind::Array => "M2N_KIND_ARRAY",
        }
    }
}

impl From<PrimitiveKind> for ElementKind {
    fn from(kind: PrimitiveKind) -> Self {
        match kind {
            PrimitiveKind::Bool => ElementKind::Bool,
            PrimitiveKind::Char => ElementKind::Char,
            PrimitiveKind::SByte => ElementKind::I8,
            PrimitiveKind::Byte => ElementKind::U8,
            PrimitiveKind::Int16 => ElementKind::I16,
            PrimitiveKind::UInt16 => ElementKind::U16,
            PrimitiveKind::Int32 => ElementKind::I32,
            PrimitiveKind::UInt32 => ElementKind::U32,
            PrimitiveKind::Int64 => ElementKind::I64,
            PrimitiveKind::UInt64 => ElementKind::U64,
            PrimitiveKind::Single => ElementKind::F32,
            PrimitiveKind::Double => ElementKind::F64,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Void => "void",
            ElementKind::Bool => "bool",
            ElementKind::Char => "char",
            ElementKind::I8 => "int8",
            ElementKind::U8 => "uint8",
            ElementKind::I16 => "int16",
            ElementKind::U16 => "uint16",
            ElementKind::I32 => "int32",
            ElementKind::U32 => "uint32",
            ElementKind::I64 => "int64",
            ElementKind::U64 => "uint64",
            ElementKind::F32 => "float",
            ElementKind::F64 => "double",
            ElementKind::String => "string",
            ElementKind::Handle => "handle",
            ElementKind::Array => "array",
        };
        f.write_str(name)
    }
}

/// One argument or result slot as the native caller sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Void,
    Null,
    Bool(bool),
    Char(u16),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    /// `const char*` text.
    Str(CString),
    /// Growable buffer used for out/ref strings.
    Text(NativeString),
    Array(NativeArray),
    Handle(Handle),
}

impl NativeValue {
    /// Builds `const char*` text. Interior NUL bytes truncate the string.
    pub fn str(text: &str) -> Self {
        let bytes = text.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        NativeValue::Str(CString::new(&bytes[..end]).unwrap_or_default())
    }

    pub fn text(text: &str) -> Self {
        NativeValue::Text(NativeString::from(text))
    }

    /// Zero value of `kind`, used for out slots.
    pub fn zero(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Void | ElementKind::Handle | ElementKind::Array => NativeValue::Null,
            ElementKind::Bool => NativeValue::Bool(false),
            ElementKind::Char => NativeValue::Char(0),
            ElementKind::I8 => NativeValue::I8(0),
            ElementKind::U8 => NativeValue::U8(0),
            ElementKind::I16 => NativeValue::I16(0),
            ElementKind::U16 => NativeValue::U16(0),
            ElementKind::I32 => NativeValue::I32(0),
            ElementKind::U32 => NativeValue::U32(0),
            ElementKind::I64 => NativeValue::I64(0),
            ElementKind::U64 => NativeValue::U64(0),
            ElementKind::F32 => NativeValue::F32(0.0),
            ElementKind::F64 => NativeValue::F64(0.0),
            ElementKind::String => NativeValue::Text(NativeString::new()),
        }
    }

    /// Kind of the value. `Null` has no kind of its own and reports `Void`.
    pub fn kind(&self) -> ElementKind {
        match self {
            NativeValue::Void | NativeValue::Null => ElementKind::Void,
            NativeValue::Bool(_) => ElementKind::Bool,
            NativeValue::Char(_) => ElementKind::Char,
            NativeValue::I8(_) => ElementKind::I8,
            NativeValue::U8(_) => ElementKind::U8,
            NativeValue::I16(_) => ElementKind::I16,
            NativeValue::U16(_) => ElementKind::U16,
            NativeValue::I32(_) => ElementKind::I32,
            NativeValue::U32(_) => ElementKind::U32,
            NativeValue::I64(_) => ElementKind::I64,
            NativeValue::U64(_) => ElementKind::U64,
            NativeValue::F32(_) => ElementKind::F32,
            NativeValue::F64(_) => ElementKind::F64,
            NativeValue::Str(_) | NativeValue::Text(_) => ElementKind::String,
            NativeValue::Array(_) => ElementKind::Array,
            NativeValue::Handle(_) => ElementKind::Handle,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            NativeValue::Null => "null".to_string(),
            other => other.kind().to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::Str(s) => s.to_str().ok(),
            NativeValue::Text(t) => t.to_str().ok(),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            NativeValue::Handle(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&NativeArray> {
        match self {
            NativeValue::Array(a) => Some(a),
            _ => None,
        }
    }
}
