//! Conversion between native and managed values.
//!
//! Every conversion is checked: integers must fit the target exactly, strings
//! must be valid UTF-8 without interior NUL bytes, arrays must carry the
//! element kind implied by the declared type, and handles must refer to a
//! live object of a compatible class.

use crate::errors::ConversionError;
use crate::heap::{Handle, HandleTable};
use crate::native::{ElementKind, NativeArray, NativeValue};
use crate::types::{EnumValue, ManagedArray, ManagedValue, ObjectRef};
use m2n_ast::PrimitiveKind;
use m2n_hir::{BindingModel, BoundEnum, ManagedType, TypePath};
use std::ffi::CString;
use tracing::trace;

pub struct Marshaler<'a> {
    model: &'a BindingModel,
    handles: &'a mut HandleTable,
}

impl<'a> Marshaler<'a> {
    pub fn new(model: &'a BindingModel, handles: &'a mut HandleTable) -> Self {
        Self { model, handles }
    }

    /// Native argument to managed value.
    pub fn to_managed(&self, value: &NativeValue, ty: &ManagedType) -> Result<ManagedValue, ConversionError> {
        trace!(%ty, value = %value.describe(), "native to managed");
        match ty {
            ManagedType::Void => Ok(ManagedValue::Null),
            ManagedType::Primitive(kind) => primitive_to_managed(value, *kind),
            ManagedType::String => match value {
                NativeValue::Null => Ok(ManagedValue::Null),
                NativeValue::Str(text) => text
                    .to_str()
                    .map(ManagedValue::from)
                    .map_err(|e| ConversionError::InvalidString(e.to_string())),
                NativeValue::Text(buffer) => buffer
                    .to_str()
                    .map(ManagedValue::from)
                    .map_err(|e| ConversionError::InvalidString(e.to_string())),
                other => Err(ConversionError::mismatch(ty, other.describe())),
            },
            ManagedType::Enum(path) => {
                let bound = self.enumeration(path)?;
                if matches!(value, NativeValue::Null) {
                    return Err(ConversionError::NullNotAllowed(path.dotted()));
                }
                let raw = native_integer(value).ok_or_else(|| ConversionError::mismatch(bound.underlying, value.describe()))?;
                check_range(raw, bound.underlying)?;
                Ok(ManagedValue::Enum(EnumValue::new(path.dotted(), raw as u64)))
            }
            ManagedType::Object(path) => match value {
                NativeValue::Null => Ok(ManagedValue::Null),
                NativeValue::Handle(handle) => self.resolve(*handle, path).map(ManagedValue::Object),
                other => Err(ConversionError::mismatch(path, other.describe())),
            },
            ManagedType::Array(element) => match value {
                NativeValue::Null => Ok(ManagedValue::Null),
                NativeValue::Array(array) => {
                    let expected = self.element_kind(element)?;
                    if array.kind() != expected {
                        return Err(ConversionError::ElementMismatch {
                            expected,
                            found: array.kind(),
                        });
                    }
                    let mut items = Vec::with_capacity(array.len());
                    for index in 0..array.len() {
                        let item = array.get(index).ok_or_else(|| ConversionError::mismatch(expected, "a missing element"))?;
                        items.push(self.to_managed(&item, element)?);
                    }
                    Ok(ManagedValue::Array(ManagedArray::new(items)))
                }
                other => Err(ConversionError::mismatch(ty, other.describe())),
            },
        }
    }

    /// Managed value to native result. Objects are rooted in the handle table.
    pub fn to_native(&mut self, value: &ManagedValue, ty: &ManagedType) -> Result<NativeValue, ConversionError> {
        trace!(%ty, value = value.type_name(), "managed to native");
        match ty {
            ManagedType::Void => Ok(NativeValue::Void),
            ManagedType::Primitive(kind) => primitive_to_native(value, *kind),
            ManagedType::String => match value {
                ManagedValue::Null => Ok(NativeValue::Null),
                ManagedValue::String(text) => CString::new(text.as_str())
                    .map(NativeValue::Str)
                    .map_err(|_| ConversionError::InvalidString("interior NUL byte".to_string())),
                other => Err(ConversionError::mismatch(ty, other.type_name())),
            },
            ManagedType::Enum(path) => {
                let bound = self.enumeration(path)?;
                let raw = match value {
                    ManagedValue::Null => return Err(ConversionError::NullNotAllowed(path.dotted())),
                    ManagedValue::Enum(e) if e.type_name == path.dotted() => {
                        if bound.underlying.is_signed() {
                            i128::from(e.as_i64())
                        } else {
                            i128::from(e.as_u64())
                        }
                    }
                    ManagedValue::Enum(e) => return Err(ConversionError::mismatch(path, &e.type_name)),
                    other => managed_integer(other).ok_or_else(|| ConversionError::mismatch(path, other.type_name()))?,
                };
                native_from_integer(raw, bound.underlying)
            }
            ManagedType::Object(path) => match value {
                ManagedValue::Null => Ok(NativeValue::Null),
                ManagedValue::Object(object) => {
                    let class = object.class();
                    if !self.model.is_assignable(&class, path) {
                        return Err(ConversionError::IncompatibleHandle {
                            expected: path.dotted(),
                            found: class.dotted(),
                        });
                    }
                    Ok(NativeValue::Handle(self.handles.root(object)))
                }
                other => Err(ConversionError::mismatch(path, other.type_name())),
            },
            ManagedType::Array(element) => match value {
                ManagedValue::Null => Ok(NativeValue::Null),
                ManagedValue::Array(items) => {
                    let kind = self.element_kind(element)?;
                    let mut array = NativeArray::new(kind).ok_or_else(|| ConversionError::mismatch(ty, kind))?;
                    for item in items.to_vec() {
                        let item = self.to_native(&item, element)?;
                        array.push(&item)?;
                    }
                    Ok(NativeValue::Array(array))
                }
                other => Err(ConversionError::mismatch(ty, other.type_name())),
            },
        }
    }

    pub fn resolve(&self, handle: Handle, expected: &TypePath) -> Result<ObjectRef, ConversionError> {
        let object = self
            .handles
            .resolve(handle)
            .ok_or(ConversionError::InvalidHandle(handle.raw()))?;
        let class = object.class();
        if !self.model.is_assignable(&class, expected) {
            return Err(ConversionError::IncompatibleHandle {
                expected: expected.dotted(),
                found: class.dotted(),
            });
        }
        Ok(object.clone())
    }

    /// Element kind a native array of `element` must carry.
    pub fn element_kind(&self, element: &ManagedType) -> Result<ElementKind, ConversionError> {
        native_kind(element, self.model)
    }

    fn enumeration(&self, path: &TypePath) -> Result<&'a BoundEnum, ConversionError> {
        self.model
            .enumeration(path)
            .ok_or_else(|| ConversionError::UnknownEnum(path.dotted()))
    }
}

/// Native kind a value of `ty` travels as. Enums use their underlying type.
pub fn native_kind(ty: &ManagedType, model: &BindingModel) -> Result<ElementKind, ConversionError> {
    Ok(match ty {
        ManagedType::Void => ElementKind::Void,
        ManagedType::Primitive(kind) => ElementKind::from(*kind),
        ManagedType::String => ElementKind::String,
        ManagedType::Enum(path) => {
            let bound = model
                .enumeration(path)
                .ok_or_else(|| ConversionError::UnknownEnum(path.dotted()))?;
            ElementKind::from(bound.underlying)
        }
        ManagedType::Object(_) => ElementKind::Handle,
        ManagedType::Array(_) => ElementKind::Array,
    })
}

/// Managed value a parameter starts with when the caller passes nothing in.
pub fn default_value(ty: &ManagedType, model: &BindingModel) -> ManagedValue {
    match ty {
        ManagedType::Primitive(kind) => match kind {
            PrimitiveKind::Bool => ManagedValue::Bool(false),
            PrimitiveKind::Char => ManagedValue::Char(0),
            PrimitiveKind::SByte => ManagedValue::I8(0),
            PrimitiveKind::Byte => ManagedValue::U8(0),
            PrimitiveKind::Int16 => ManagedValue::I16(0),
            PrimitiveKind::UInt16 => ManagedValue::U16(0),
            PrimitiveKind::Int32 => ManagedValue::I32(0),
            PrimitiveKind::UInt32 => ManagedValue::U32(0),
            PrimitiveKind::Int64 => ManagedValue::I64(0),
            PrimitiveKind::UInt64 => ManagedValue::U64(0),
            PrimitiveKind::Single => ManagedValue::F32(0.0),
            PrimitiveKind::Double => ManagedValue::F64(0.0),
        },
        ManagedType::Enum(path) if model.enumeration(path).is_some() => {
            ManagedValue::Enum(EnumValue::new(path.dotted(), 0))
        }
        _ => ManagedValue::Null,
    }
}

fn native_integer(value: &NativeValue) -> Option<i128> {
    Some(match value {
        NativeValue::Char(v) => i128::from(*v),
        NativeValue::I8(v) => i128::from(*v),
        NativeValue::U8(v) => i128::from(*v),
        NativeValue::I16(v) => i128::from(*v),
        NativeValue::U16(v) => i128::from(*v),
        NativeValue::I32(v) => i128::from(*v),
        NativeValue::U32(v) => i128::from(*v),
        NativeValue::I64(v) => i128::from(*v),
        NativeValue::U64(v) => i128::from(*v),
        _ => return None,
    })
}

fn managed_integer(value: &ManagedValue) -> Option<i128> {
    Some(match value {
        ManagedValue::Char(v) => i128::from(*v),
        ManagedValue::I8(v) => i128::from(*v),
        ManagedValue::U8(v) => i128::from(*v),
        ManagedValue::I16(v) => i128::from(*v),
        ManagedValue::U16(v) => i128::from(*v),
        ManagedValue::I32(v) => i128::from(*v),
        ManagedValue::U32(v) => i128::from(*v),
        ManagedValue::I64(v) => i128::from(*v),
        ManagedValue::U64(v) => i128::from(*v),
        _ => return None,
    })
}

fn check_range(value: i128, kind: PrimitiveKind) -> Result<(), ConversionError> {
    match kind.integer_range() {
        Some((min, max)) if value >= min && value <= max => Ok(()),
        Some(_) => Err(ConversionError::out_of_range(value, kind)),
        None => Err(ConversionError::mismatch(kind, "an integer")),
    }
}

fn primitive_to_managed(value: &NativeValue, kind: PrimitiveKind) -> Result<ManagedValue, ConversionError> {
    match (kind, value) {
        (_, NativeValue::Null) => Err(ConversionError::NullNotAllowed(kind.to_string())),
        (PrimitiveKind::Bool, NativeValue::Bool(b)) => Ok(ManagedValue::Bool(*b)),
        (PrimitiveKind::Single, NativeValue::F32(v)) => Ok(ManagedValue::F32(*v)),
        (PrimitiveKind::Single, NativeValue::F64(v)) => narrow_float(*v).map(ManagedValue::F32),
        (PrimitiveKind::Double, NativeValue::F64(v)) => Ok(ManagedValue::F64(*v)),
        (PrimitiveKind::Double, NativeValue::F32(v)) => Ok(ManagedValue::F64(f64::from(*v))),
        (PrimitiveKind::Bool | PrimitiveKind::Single | PrimitiveKind::Double, other) => {
            Err(ConversionError::mismatch(kind, other.describe()))
        }
        (_, other) => {
            let raw = native_integer(other).ok_or_else(|| ConversionError::mismatch(kind, other.describe()))?;
            managed_from_integer(raw, kind)
        }
    }
}

fn primitive_to_native(value: &ManagedValue, kind: PrimitiveKind) -> Result<NativeValue, ConversionError> {
    match (kind, value) {
        (_, ManagedValue::Null) => Err(ConversionError::NullNotAllowed(kind.to_string())),
        (PrimitiveKind::Bool, ManagedValue::Bool(b)) => Ok(NativeValue::Bool(*b)),
        (PrimitiveKind::Single, ManagedValue::F32(v)) => Ok(NativeValue::F32(*v)),
        (PrimitiveKind::Single, ManagedValue::F64(v)) => narrow_float(*v).map(NativeValue::F32),
        (PrimitiveKind::Double, ManagedValue::F64(v)) => Ok(NativeValue::F64(*v)),
        (PrimitiveKind::Double, ManagedValue::F32(v)) => Ok(NativeValue::F64(f64::from(*v))),
        (PrimitiveKind::Bool | PrimitiveKind::Single | PrimitiveKind::Double, other) => {
            Err(ConversionError::mismatch(kind, other.type_name()))
        }
        (_, other) => {
            let raw = managed_integer(other).ok_or_else(|| ConversionError::mismatch(kind, other.type_name()))?;
            native_from_integer(raw, kind)
        }
    }
}

fn narrow_float(value: f64) -> Result<f32, ConversionError> {
    let narrowed = value as f32;
    if f64::from(narrowed) == value || value.is_nan() {
        Ok(narrowed)
    } else {
        Err(ConversionError::out_of_range(value, PrimitiveKind::Single))
    }
}

fn managed_from_integer(raw: i128, kind: PrimitiveKind) -> Result<ManagedValue, ConversionError> {
    let out_of_range = |_| ConversionError::out_of_range(raw, kind);
    Ok(match kind {
        PrimitiveKind::Char => ManagedValue::Char(u16::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::SByte => ManagedValue::I8(i8::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::Byte => ManagedValue::U8(u8::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::Int16 => ManagedValue::I16(i16::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::UInt16 => ManagedValue::U16(u16::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::Int32 => ManagedValue::I32(i32::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::UInt32 => ManagedValue::U32(u32::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::Int64 => ManagedValue::I64(i64::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::UInt64 => ManagedValue::U64(u64::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::Bool | PrimitiveKind::Single | PrimitiveKind::Double => {
            return Err(ConversionError::mismatch(kind, "an integer"))
        }
    })
}

fn native_from_integer(raw: i128, kind: PrimitiveKind) -> Result<NativeValue, ConversionError> {
    let out_of_range = |_| ConversionError::out_of_range(raw, kind);
    Ok(match kind {
        PrimitiveKind::Char => NativeValue::Char(u16::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::SByte => NativeValue::I8(i8::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::Byte => NativeValue::U8(u8::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::Int16 => NativeValue::I16(i16::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::UInt16 => NativeValue::U16(u16::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::Int32 => NativeValue::I32(i32::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::UInt32 => NativeValue::U32(u32::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::Int64 => NativeValue::I64(i64::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::UInt64 => NativeValue::U64(u64::try_from(raw).map_err(out_of_range)?),
        PrimitiveKind::Bool | PrimitiveKind::Single | PrimitiveKind::Double => {
            return Err(ConversionError::mismatch(kind, "an integer"))
        }
    })
}
