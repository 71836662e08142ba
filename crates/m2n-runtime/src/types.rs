use gc::{Finalize, Gc, GcCell, Trace};
use m2n_hir::TypePath;
use std::collections::HashMap;
use std::fmt;

/// Values living on the managed (garbage-collected) side of the boundary.
#[derive(Debug, Clone, PartialEq, Trace, Finalize)]
pub enum ManagedValue {
    Null,
    Bool(bool),
    /// A single UTF-16 code unit.
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
    String(ManagedString),
    Enum(EnumValue),
    Array(ManagedArray),
    Object(ObjectRef),
}

impl ManagedValue {
    pub fn array(items: Vec<ManagedValue>) -> Self {
        ManagedValue::Array(ManagedArray::new(items))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ManagedValue::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ManagedValue::Null => "null",
            ManagedValue::Bool(_) => "bool",
            ManagedValue::Char(_) => "char",
            ManagedValue::I8(_) => "sbyte",
            ManagedValue::U8(_) => "byte",
            ManagedValue::I16(_) => "short",
            ManagedValue::U16(_) => "ushort",
            ManagedValue::I32(_) => "int",
            ManagedValue::U32(_) => "uint",
            ManagedValue::I64(_) => "long",
            ManagedValue::U64(_) => "ulong",
            ManagedValue::F32(_) => "float",
            ManagedValue::F64(_) => "double",
            ManagedValue::String(_) => "string",
            ManagedValue::Enum(_) => "enum",
            ManagedValue::Array(_) => "array",
            ManagedValue::Object(_) => "object",
        }
    }
}

/// Immutable managed string.
#[derive(Debug, Clone, Trace, Finalize)]
pub struct ManagedString {
    data: Gc<String>,
}

impl PartialEq for ManagedString {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl ManagedString {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            data: Gc::new(text.into()),
        }
    }

    pub fn as_str(&self) -> &str {
        self.data.as_str()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Display for ManagedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An enum value. `bits` holds the underlying integer, sign-extended to 64 bits.
#[derive(Debug, Clone, PartialEq, Eq, Trace, Finalize)]
pub struct EnumValue {
    pub type_name: String,
    pub bits: u64,
}

impl EnumValue {
    pub fn new(type_name: impl Into<String>, bits: u64) -> Self {
        Self {
            type_name: type_name.into(),
            bits,
        }
    }

    pub fn signed(type_name: impl Into<String>, value: i64) -> Self {
        Self::new(type_name, value as u64)
    }

    pub fn as_i64(&self) -> i64 {
        self.bits as i64
    }

    pub fn as_u64(&self) -> u64 {
        self.bits
    }

    pub fn contains(&self, flag: u64) -> bool {
        self.bits & flag == flag
    }
}

/// Mutable, fixed-length managed array.
#[derive(Debug, Clone, Trace, Finalize)]
pub struct ManagedArray {
    items: Gc<GcCell<Vec<ManagedValue>>>,
}

impl PartialEq for ManagedArray {
    fn eq(&self, other: &Self) -> bool {
        *self.items.borrow() == *other.items.borrow()
    }
}

impl ManagedArray {
    pub fn new(items: Vec<ManagedValue>) -> Self {
        Self {
            items: Gc::new(GcCell::new(items)),
        }
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<ManagedValue> {
        self.items.borrow().get(index).cloned()
    }

    /// Replaces an element in place. Returns false if `index` is out of bounds.
    pub fn set(&self, index: usize, value: ManagedValue) -> bool {
        match self.items.borrow_mut().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn to_vec(&self) -> Vec<ManagedValue> {
        self.items.borrow().clone()
    }
}

#[derive(Debug, Trace, Finalize)]
pub struct ManagedObject {
    class: String,
    fields: HashMap<String, ManagedValue>,
}

/// Reference to a managed object. Equality is identity.
#[derive(Debug, Clone, Trace, Finalize)]
pub struct ObjectRef {
    object: Gc<GcCell<ManagedObject>>,
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        Gc::ptr_eq(&self.object, &other.object)
    }
}

impl ObjectRef {
    pub fn new(class: &TypePath) -> Self {
        Self {
            object: Gc::new(GcCell::new(ManagedObject {
                class: class.dotted(),
                fields: HashMap::new(),
            })),
        }
    }

    pub fn class(&self) -> TypePath {
        TypePath::parse(&self.object.borrow().class)
    }

    pub fn field(&self, name: &str) -> Option<ManagedValue> {
        self.object.borrow().fields.get(name).cloned()
    }

    pub fn set_field(&self, name: impl Into<String>, value: ManagedValue) {
        self.object.borrow_mut().fields.insert(name.into(), value);
    }

    /// Identity key, stable while the object is alive.
    pub(crate) fn address(&self) -> usize {
        &*self.object as *const GcCell<ManagedObject> as usize
    }
}

impl fmt::Display for ManagedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagedValue::Null => write!(f, "null"),
            ManagedValue::Bool(b) => write!(f, "{}", b),
            ManagedValue::Char(c) => match char::from_u32(u32::from(*c)) {
                Some(c) => write!(f, "{}", c),
                None => write!(f, "\\u{:04x}", c),
            },
            ManagedValue::I8(v) => write!(f, "{}", v),
            ManagedValue::U8(v) => write!(f, "{}", v),
            ManagedValue::I16(v) => write!(f, "{}", v),
            ManagedValue::U16(v) => write!(f, "{}", v),
            ManagedValue::I32(v) => write!(f, "{}", v),
            ManagedValue::U32(v) => write!(f, "{}", v),
            ManagedValue::I64(v) => write!(f, "{}", v),
            ManagedValue::U64(v) => write!(f, "{}", v),
            ManagedValue::F32(v) => write!(f, "{}", v),
            ManagedValue::F64(v) => write!(f, "{}", v),
            ManagedValue::String(s) => write!(f, "{}", s),
            ManagedValue::Enum(e) => write!(f, "{}({:#x})", e.type_name, e.bits),
            ManagedValue::Array(array) => {
                write!(f, "[")?;
                for (i, item) in array.to_vec().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            ManagedValue::Object(object) => write!(f, "{}", object.class()),
        }
    }
}

macro_rules! managed_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ManagedValue {
                fn from(value: $ty) -> Self {
                    ManagedValue::$variant(value)
                }
            }
        )*
    };
}

managed_from! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    ManagedString => String,
    EnumValue => Enum,
    ManagedArray => Array,
    ObjectRef => Object,
}

impl From<&str> for ManagedValue {
    fn from(s: &str) -> Self {
        ManagedValue::String(ManagedString::new(s))
    }
}

impl From<String> for ManagedValue {
    fn from(s: String) -> Self {
        ManagedValue::String(ManagedString::new(s))
    }
}

/// Typed extraction used by [`crate::CallContext::arg_as`].
pub trait FromManaged: Sized {
    const EXPECTED: &'static str;

    fn from_managed(value: &ManagedValue) -> Option<Self>;
}

macro_rules! from_managed {
    ($($ty:ty => $variant:ident, $name:literal),* $(,)?) => {
        $(
            impl FromManaged for $ty {
                const EXPECTED: &'static str = $name;

                fn from_managed(value: &ManagedValue) -> Option<Self> {
                    match value {
                        ManagedValue::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

from_managed! {
    bool => Bool, "bool",
    i8 => I8, "sbyte",
    u8 => U8, "byte",
    i16 => I16, "short",
    i32 => I32, "int",
    u32 => U32, "uint",
    i64 => I64, "long",
    u64 => U64, "ulong",
    f32 => F32, "float",
    f64 => F64, "double",
    EnumValue => Enum, "an enum",
    ManagedArray => Array, "an array",
    ObjectRef => Object, "an object",
}

/// `ushort` and `char` share a representation.
impl FromManaged for u16 {
    const EXPECTED: &'static str = "ushort";

    fn from_managed(value: &ManagedValue) -> Option<Self> {
        match value {
            ManagedValue::U16(v) | ManagedValue::Char(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromManaged for String {
    const EXPECTED: &'static str = "a string";

    fn from_managed(value: &ManagedValue) -> Option<Self> {
        match value {
            ManagedValue::String(s) => Some(s.as_str().to_string()),
            _ => None,
        }
    }
}

impl FromManaged for ManagedValue {
    const EXPECTED: &'static str = "a value";

    fn from_managed(value: &ManagedValue) -> Option<Self> {
        Some(value.clone())
    }
}
