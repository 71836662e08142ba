//! How managed types are spelled in C and packed into `M2nValue` slots.

use crate::CodegenError;
use m2n_ast::PrimitiveKind;
use m2n_hir::{naming, BindingModel, Direction, ManagedType};

/// `M2N_KIND_*` constants in code order.
pub const KIND_CONSTANTS: [&str; 16] = [
    "M2N_KIND_VOID",
    "M2N_KIND_BOOL",
    "M2N_KIND_CHAR",
    "M2N_KIND_I8",
    "M2N_KIND_U8",
    "M2N_KIND_I16",
    "M2N_KIND_U16",
    "M2N_KIND_I32",
    "M2N_KIND_U32",
    "M2N_KIND_I64",
    "M2N_KIND_U64",
    "M2N_KIND_F32",
    "M2N_KIND_F64",
    "M2N_KIND_STRING",
    "M2N_KIND_HANDLE",
    "M2N_KIND_ARRAY",
];

/// Kind constant and `M2nPayload` field carrying a value of some type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub kind: &'static str,
    pub field: &'static str,
}

pub fn primitive(kind: PrimitiveKind) -> &'static str {
    match kind {
        PrimitiveKind::Bool => "bool",
        PrimitiveKind::Char => "uint16_t",
        PrimitiveKind::SByte => "int8_t",
        PrimitiveKind::Byte => "uint8_t",
        PrimitiveKind::Int16 => "int16_t",
        PrimitiveKind::UInt16 => "uint16_t",
        PrimitiveKind::Int32 => "int32_t",
        PrimitiveKind::UInt32 => "uint32_t",
        PrimitiveKind::Int64 => "int64_t",
        PrimitiveKind::UInt64 => "uint64_t",
        PrimitiveKind::Single => "float",
        PrimitiveKind::Double => "double",
    }
}

/// C type of a by-value parameter or return.
pub fn by_value(ty: &ManagedType) -> String {
    match ty {
        ManagedType::Void => "void".to_string(),
        ManagedType::Primitive(kind) => primitive(*kind).to_string(),
        ManagedType::String => "const char*".to_string(),
        ManagedType::Enum(path) => naming::type_symbol(path),
        ManagedType::Object(path) => format!("{}*", naming::type_symbol(path)),
        ManagedType::Array(element) => naming::array_typedef(element),
    }
}

pub fn parameter(ty: &ManagedType, direction: Direction) -> String {
    match (direction, ty) {
        (Direction::In, ty) => by_value(ty),
        (_, ManagedType::String) => "M2nString*".to_string(),
        (_, ty) => format!("{}*", by_value(ty)),
    }
}

/// Parameter names that are C or C++ keywords, or that start with `__` like
/// the shim locals, get a trailing `_`.
pub fn parameter_name(name: &str) -> String {
    if naming::is_c_keyword(name) || naming::is_cpp_keyword(name) || name.starts_with("__") {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

pub fn primitive_slot(kind: PrimitiveKind) -> Slot {
    let (kind, field) = match kind {
        PrimitiveKind::Bool => ("M2N_KIND_BOOL", "b"),
        PrimitiveKind::Char => ("M2N_KIND_CHAR", "c"),
        PrimitiveKind::SByte => ("M2N_KIND_I8", "i8"),
        PrimitiveKind::Byte => ("M2N_KIND_U8", "u8"),
        PrimitiveKind::Int16 => ("M2N_KIND_I16", "i16"),
        PrimitiveKind::UInt16 => ("M2N_KIND_U16", "u16"),
        PrimitiveKind::Int32 => ("M2N_KIND_I32", "i32"),
        PrimitiveKind::UInt32 => ("M2N_KIND_U32", "u32"),
        PrimitiveKind::Int64 => ("M2N_KIND_I64", "i64"),
        PrimitiveKind::UInt64 => ("M2N_KIND_U64", "u64"),
        PrimitiveKind::Single => ("M2N_KIND_F32", "f32"),
        PrimitiveKind::Double => ("M2N_KIND_F64", "f64"),
    };
    Slot { kind, field }
}

/// Enums travel as their underlying integer.
pub fn slot(ty: &ManagedType, model: &BindingModel) -> Result<Slot, CodegenError> {
    Ok(match ty {
        ManagedType::Void => Slot {
            kind: "M2N_KIND_VOID",
            field: "ptr",
        },
        ManagedType::Primitive(kind) => primitive_slot(*kind),
        ManagedType::String => Slot {
            kind: "M2N_KIND_STRING",
            field: "str",
        },
        ManagedType::Enum(path) => {
            let bound = model
                .enumeration(path)
                .ok_or_else(|| CodegenError::UnknownEnum(path.dotted()))?;
            primitive_slot(bound.underlying)
        }
        ManagedType::Object(_) => Slot {
            kind: "M2N_KIND_HANDLE",
            field: "handle",
        },
        ManagedType::Array(_) => Slot {
            kind: "M2N_KIND_ARRAY",
            field: "array",
        },
    })
}

/// Literal for an enum constant. 64-bit values need the `stdint.h` macros.
pub fn enum_literal(value: i128, underlying: PrimitiveKind) -> String {
    match underlying {
        PrimitiveKind::Int64 if value == i128::from(i64::MIN) => "INT64_MIN".to_string(),
        PrimitiveKind::Int64 => format!("INT64_C({})", value),
        PrimitiveKind::UInt64 => format!("UINT64_C({})", value),
        PrimitiveKind::UInt32 => format!("{}u", value),
        PrimitiveKind::Int32 if value == i128::from(i32::MIN) => "INT32_MIN".to_string(),
        _ => value.to_string(),
    }
}
