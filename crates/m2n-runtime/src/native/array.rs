use super::{ElementKind, NativeValue};
use crate::errors::ConversionError;
use crate::heap::Handle;
use std::ffi::{CStr, CString};
use std::fmt;
use std::os::raw::{c_char, c_void};

/// Growable, homogeneously-typed sequence shared with C as `M2nArray`.
///
/// C reads `data`, `len` and `element_kind`. String elements are owned
/// NUL-terminated copies; handle elements are raw handle values.
#[repr(C)]
pub struct NativeArray {
    pub data: *mut c_void,
    pub len: usize,
    pub element_kind: u32,
    storage: Storage,
}

enum Storage {
    Bool(Vec<bool>),
    Char(Vec<u16>),
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    String(Vec<*mut c_char>),
    Handle(Vec<*mut c_void>),
}

macro_rules! each_storage {
    ($storage:expr, $items:ident => $body:expr) => {
        match $storage {
            Storage::Bool($items) => $body,
            Storage::Char($items) => $body,
            Storage::I8($items) => $body,
            Storage::U8($items) => $body,
            Storage::I16($items) => $body,
            Storage::U16($items) => $body,
            Storage::I32($items) => $body,
            Storage::U32($items) => $body,
            Storage::I64($items) => $body,
            Storage::U64($items) => $body,
            Storage::F32($items) => $body,
            Storage::F64($items) => $body,
            Storage::String($items) => $body,
            Storage::Handle($items) => $body,
        }
    };
}

impl Storage {
    fn for_kind(kind: ElementKind) -> Option<Self> {
        Some(match kind {
            ElementKind::Bool => Storage::Bool(Vec::new()),
            ElementKind::Char => Storage::Char(Vec::new()),
            ElementKind::I8 => Storage::I8(Vec::new()),
            ElementKind::U8 => Storage::U8(Vec::new()),
            ElementKind::I16 => Storage::I16(Vec::new()),
            ElementKind::U16 => Storage::U16(Vec::new()),
            ElementKind::I32 => Storage::I32(Vec::new()),
            ElementKind::U32 => Storage::U32(Vec::new()),
            ElementKind::I64 => Storage::I64(Vec::new()),
            ElementKind::U64 => Storage::U64(Vec::new()),
            ElementKind::F32 => Storage::F32(Vec::new()),
            ElementKind::F64 => Storage::F64(Vec::new()),
            ElementKind::String => Storage::String(Vec::new()),
            ElementKind::Handle => Storage::Handle(Vec::new()),
            ElementKind::Void | ElementKind::Array => return None,
        })
    }

    fn kind(&self) -> ElementKind {
        match self {
            Storage::Bool(_) => ElementKind::Bool,
            Storage::Char(_) => ElementKind::Char,
            Storage::I8(_) => ElementKind::I8,
            Storage::U8(_) => ElementKind::U8,
            Storage::I16(_) => ElementKind::I16,
            Storage::U16(_) => ElementKind::U16,
            Storage::I32(_) => ElementKind::I32,
            Storage::U32(_) => ElementKind::U32,
            Storage::I64(_) => ElementKind::I64,
            Storage::U64(_) => ElementKind::U64,
            Storage::F32(_) => ElementKind::F32,
            Storage::F64(_) => ElementKind::F64,
            Storage::String(_) => ElementKind::String,
            Storage::Handle(_) => ElementKind::Handle,
        }
    }
}

/// Plain element types that can be viewed as a slice.
pub trait NativeElement: Copy + 'static {
    const KIND: ElementKind;

    fn view(array: &NativeArray) -> Option<&[Self]>;

    fn collect(items: &[Self]) -> NativeArray;
}

macro_rules! native_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl NativeElement for $ty {
                const KIND: ElementKind = ElementKind::$variant;

                fn view(array: &NativeArray) -> Option<&[Self]> {
                    match &array.storage {
                        Storage::$variant(items) => Some(items),
                        _ => None,
                    }
                }

                fn collect(items: &[Self]) -> NativeArray {
                    NativeArray::with_storage(Storage::$variant(items.to_vec()))
                }
            }
        )*
    };
}

native_element! {
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
}

impl NativeArray {
    /// Empty array of `kind`. `Void` and nested arrays have no element storage.
    pub fn new(kind: ElementKind) -> Option<Self> {
        Storage::for_kind(kind).map(Self::with_storage)
    }

    fn with_storage(storage: Storage) -> Self {
        let mut array = Self {
            data: std::ptr::null_mut(),
            len: 0,
            element_kind: storage.kind().code(),
            storage,
        };
        array.sync();
        array
    }

    pub fn from_slice<T: NativeElement>(items: &[T]) -> Self {
        T::collect(items)
    }

    pub fn from_values(kind: ElementKind, values: &[NativeValue]) -> Result<Self, ConversionError> {
        let mut array = Self::new(kind).ok_or_else(|| ConversionError::mismatch("an array element kind", kind))?;
        for value in values {
            array.push(value)?;
        }
        Ok(array)
    }

    pub fn kind(&self) -> ElementKind {
        self.storage.kind()
    }

    /// Element count of the storage. The public `len` field is only a mirror for C.
    pub fn len(&self) -> usize {
        each_storage!(&self.storage, items => items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice<T: NativeElement>(&self) -> Option<&[T]> {
        T::view(self)
    }

    pub fn push(&mut self, value: &NativeValue) -> Result<(), ConversionError> {
        let expected = self.kind();
        match (&mut self.storage, value) {
            (Storage::Bool(items), NativeValue::Bool(v)) => items.push(*v),
            (Storage::Char(items), NativeValue::Char(v)) => items.push(*v),
            (Storage::I8(items), NativeValue::I8(v)) => items.push(*v),
            (Storage::U8(items), NativeValue::U8(v)) => items.push(*v),
            (Storage::I16(items), NativeValue::I16(v)) => items.push(*v),
            (Storage::U16(items), NativeValue::U16(v)) => items.push(*v),
            (Storage::I32(items), NativeValue::I32(v)) => items.push(*v),
            (Storage::U32(items), NativeValue::U32(v)) => items.push(*v),
            (Storage::I64(items), NativeValue::I64(v)) => items.push(*v),
            (Storage::U64(items), NativeValue::U64(v)) => items.push(*v),
            (Storage::F32(items), NativeValue::F32(v)) => items.push(*v),
            (Storage::F64(items), NativeValue::F64(v)) => items.push(*v),
            (Storage::String(items), NativeValue::Str(s)) => items.push(s.clone().into_raw()),
            (Storage::String(items), NativeValue::Text(t)) => {
                let text = CString::new(t.as_bytes())
                    .map_err(|_| ConversionError::InvalidString("interior NUL byte".to_string()))?;
                items.push(text.into_raw());
            }
            (Storage::String(items), NativeValue::Null) => items.push(std::ptr::null_mut()),
            (Storage::Handle(items), NativeValue::Handle(h)) => items.push(h.raw() as *mut c_void),
            (Storage::Handle(items), NativeValue::Null) => items.push(std::ptr::null_mut()),
            _ => {
                return Err(ConversionError::ElementMismatch {
                    expected,
                    found: value.kind(),
                })
            }
        }
        self.sync();
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<NativeValue> {
        Some(match &self.storage {
            Storage::Bool(items) => NativeValue::Bool(*items.get(index)?),
            Storage::Char(items) => NativeValue::Char(*items.get(index)?),
            Storage::I8(items) => NativeValue::I8(*items.get(index)?),
            Storage::U8(items) => NativeValue::U8(*items.get(index)?),
            Storage::I16(items) => NativeValue::I16(*items.get(index)?),
            Storage::U16(items) => NativeValue::U16(*items.get(index)?),
            Storage::I32(items) => NativeValue::I32(*items.get(index)?),
            Storage::U32(items) => NativeValue::U32(*items.get(index)?),
            Storage::I64(items) => NativeValue::I64(*items.get(index)?),
            Storage::U64(items) => NativeValue::U64(*items.get(index)?),
            Storage::F32(items) => NativeValue::F32(*items.get(index)?),
            Storage::F64(items) => NativeValue::F64(*items.get(index)?),
            Storage::String(items) => {
                let ptr = *items.get(index)?;
                if ptr.is_null() {
                    NativeValue::Null
                } else {
                    // Owned copies created by `push`/`append_raw`.
                    NativeValue::Str(unsafe { CStr::from_ptr(ptr) }.to_owned())
                }
            }
            Storage::Handle(items) => match Handle::from_raw(*items.get(index)? as usize) {
                Some(handle) => NativeValue::Handle(handle),
                None => NativeValue::Null,
            },
        })
    }

    /// Address of element `index` inside the array storage.
    pub fn element_ptr(&self, index: usize) -> Option<*const c_void> {
        each_storage!(&self.storage, items => items.get(index).map(|e| e as *const _ as *const c_void))
    }

    /// Appends `count` elements laid out as the C element type of this array.
    /// String elements are copied.
    ///
    /// # Safety
    /// `values` must point to `count` readable elements of that type.
    pub unsafe fn append_raw(&mut self, values: *const c_void, count: usize) {
        if values.is_null() || count == 0 {
            return;
        }

        macro_rules! copy_from {
            ($items:expr, $ty:ty) => {
                $items.extend_from_slice(std::slice::from_raw_parts(values as *const $ty, count))
            };
        }

        match &mut self.storage {
            Storage::Bool(items) => copy_from!(items, bool),
            Storage::Char(items) => copy_from!(items, u16),
            Storage::I8(items) => copy_from!(items, i8),
            Storage::U8(items) => copy_from!(items, u8),
            Storage::I16(items) => copy_from!(items, i16),
            Storage::U16(items) => copy_from!(items, u16),
            Storage::I32(items) => copy_from!(items, i32),
            Storage::U32(items) => copy_from!(items, u32),
            Storage::I64(items) => copy_from!(items, i64),
            Storage::U64(items) => copy_from!(items, u64),
            Storage::F32(items) => copy_from!(items, f32),
            Storage::F64(items) => copy_from!(items, f64),
            Storage::Handle(items) => copy_from!(items, *mut c_void),
            Storage::String(items) => {
                let source = std::slice::from_raw_parts(values as *const *const c_char, count);
                for &ptr in source {
                    items.push(if ptr.is_null() {
                        std::ptr::null_mut()
                    } else {
                        CStr::from_ptr(ptr).to_owned().into_raw()
                    });
                }
            }
        }
        self.sync();
    }

    fn sync(&mut self) {
        let (data, len) = each_storage!(&mut self.storage, items => (items.as_mut_ptr() as *mut c_void, items.len()));
        self.data = data;
        self.len = len;
    }
}

impl Drop for NativeArray {
    fn drop(&mut self) {
        if let Storage::String(items) = &mut self.storage {
            for ptr in items.drain(..) {
                if !ptr.is_null() {
                    drop(unsafe { CString::from_raw(ptr) });
                }
            }
        }
    }
}

impl Clone for NativeArray {
    fn clone(&self) -> Self {
        let storage = match &self.storage {
            Storage::Bool(items) => Storage::Bool(items.clone()),
            Storage::Char(items) => Storage::Char(items.clone()),
            Storage::I8(items) => Storage::I8(items.clone()),
            Storage::U8(items) => Storage::U8(items.clone()),
            Storage::I16(items) => Storage::I16(items.clone()),
            Storage::U16(items) => Storage::U16(items.clone()),
            Storage::I32(items) => Storage::I32(items.clone()),
            Storage::U32(items) => Storage::U32(items.clone()),
            Storage::I64(items) => Storage::I64(items.clone()),
            Storage::U64(items) => Storage::U64(items.clone()),
            Storage::F32(items) => Storage::F32(items.clone()),
            Storage::F64(items) => Storage::F64(items.clone()),
            Storage::Handle(items) => Storage::Handle(items.clone()),
            Storage::String(items) => Storage::String(
                items
                    .iter()
                    .map(|&ptr| {
                        if ptr.is_null() {
                            std::ptr::null_mut()
                        } else {
                            unsafe { CStr::from_ptr(ptr) }.to_owned().into_raw()
                        }
                    })
                    .collect(),
            ),
        };
        Self::with_storage(storage)
    }
}

impl PartialEq for NativeArray {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
            && self.len() == other.len()
            && (0..self.len()).all(|i| self.get(i) == other.get(i))
    }
}

impl fmt::Debug for NativeArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<NativeValue> = (0..self.len()).filter_map(|i| self.get(i)).collect();
        f.debug_struct("NativeArray")
            .field("kind", &self.kind())
            .field("items", &items)
            .finish()
    }
}
