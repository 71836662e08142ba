// C ABI used by the generated shims

pub mod array;
pub mod string;

use crate::errors::CallError;
use crate::heap::Handle;
use crate::marshal::native_kind;
use crate::native::{ElementKind, NativeArray, NativeString, NativeValue};
use crate::runtime::Runtime;
use m2n_hir::Direction;
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use tracing::debug;

pub const M2N_OK: i32 = 0;
pub const M2N_NO_RUNTIME: i32 = 1;
pub const M2N_UNKNOWN_SYMBOL: i32 = 2;
pub const M2N_ARITY: i32 = 3;
pub const M2N_CONVERSION: i32 = 4;
pub const M2N_MANAGED_FAILURE: i32 = 5;
pub const M2N_MISSING_IMPLEMENTATION: i32 = 6;
pub const M2N_INVALID_ARGUMENT: i32 = 7;

pub const M2N_KIND_VOID: u32 = 0;
pub const M2N_KIND_BOOL: u32 = 1;
pub const M2N_KIND_CHAR: u32 = 2;
pub const M2N_KIND_I8: u32 = 3;
pub const M2N_KIND_U8: u32 = 4;
pub const M2N_KIND_I16: u32 = 5;
pub const M2N_KIND_U16: u32 = 6;
pub const M2N_KIND_I32: u32 = 7;
pub const M2N_KIND_U32: u32 = 8;
pub const M2N_KIND_I64: u32 = 9;
pub const M2N_KIND_U64: u32 = 10;
pub const M2N_KIND_F32: u32 = 11;
pub const M2N_KIND_F64: u32 = 12;
pub const M2N_KIND_STRING: u32 = 13;
pub const M2N_KIND_HANDLE: u32 = 14;
pub const M2N_KIND_ARRAY: u32 = 15;

#[repr(C)]
#[derive(Clone, Copy)]
pub union M2nPayload {
    pub b: bool,
    pub c: u16,
    pub i8: i8,
    pub u8: u8,
    pub i16: i16,
    pub u16: u16,
    pub i32: i32,
    pub u32: u32,
    pub i64: i64,
    pub u64: u64,
    pub f32: f32,
    pub f64: f64,
    pub str: *const c_char,
    pub array: *mut NativeArray,
    pub handle: *mut c_void,
    /// Storage of the kind's C type for `by_ref` slots. `M2nString*` for strings.
    pub ptr: *mut c_void,
}

/// One argument or result slot of `m2n_invoke`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct M2nValue {
    pub kind: u32,
    pub by_ref: bool,
    pub payload: M2nPayload,
}

impl M2nValue {
    pub fn void() -> Self {
        Self {
            kind: M2N_KIND_VOID,
            by_ref: false,
            payload: M2nPayload { u64: 0 },
        }
    }

    pub fn new(kind: u32, payload: M2nPayload) -> Self {
        Self {
            kind,
            by_ref: false,
            payload,
        }
    }

    /// Slot pointing at caller storage, for out and ref parameters.
    pub fn by_ref(kind: u32, ptr: *mut c_void) -> Self {
        Self {
            kind,
            by_ref: true,
            payload: M2nPayload { ptr },
        }
    }
}

thread_local! {
    static RUNTIME: RefCell<Option<Runtime>> = const { RefCell::new(None) };
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
    // Strings returned by the last call on this thread.
    static RETURNED: RefCell<Vec<CString>> = const { RefCell::new(Vec::new()) };
}

/// Makes `runtime` serve `m2n_invoke` calls on this thread. Returns the runtime it replaces.
pub fn install_runtime(runtime: Runtime) -> Option<Runtime> {
    RUNTIME.with(|slot| slot.borrow_mut().replace(runtime))
}

pub fn uninstall_runtime() -> Option<Runtime> {
    RUNTIME.with(|slot| slot.borrow_mut().take())
}

/// Runs `f` against this thread's runtime. `None` if none is installed or it is busy.
pub fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> Option<R> {
    RUNTIME.with(|slot| {
        let mut slot = slot.try_borrow_mut().ok()?;
        slot.as_mut().map(f)
    })
}

fn set_last_error(message: &str) {
    let message = CString::new(message.replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

/// Message of the last failed call on this thread, or null.
#[no_mangle]
pub extern "C" fn m2n_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| match slot.borrow().as_ref() {
        Some(message) => message.as_ptr(),
        None => std::ptr::null(),
    })
}

/// Invokes the bound function `symbol`.
///
/// `args` holds `argc` slots: the object handle first for instance members,
/// then one slot per parameter. Out and ref slots are `by_ref`; out slots are
/// never read. Nothing is written unless the call succeeds.
#[no_mangle]
pub extern "C" fn m2n_invoke(symbol: *const c_char, args: *mut M2nValue, argc: usize, result: *mut M2nValue) -> i32 {
    if symbol.is_null() || (args.is_null() && argc > 0) {
        set_last_error("null symbol or argument array");
        return M2N_INVALID_ARGUMENT;
    }

    let symbol = match unsafe { CStr::from_ptr(symbol) }.to_str() {
        Ok(symbol) => symbol,
        Err(_) => {
            set_last_error("symbol is not valid UTF-8");
            return M2N_INVALID_ARGUMENT;
        }
    };
    let slots: &[M2nValue] = if argc == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(args, argc) }
    };

    RETURNED.with(|returned| returned.borrow_mut().clear());

    let status = with_runtime(|runtime| invoke_slots(runtime, symbol, slots, result));
    match status {
        Some(Ok(())) => {
            LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
            M2N_OK
        }
        Some(Err((status, message))) => {
            debug!(symbol, status, %message, "m2n_invoke failed");
            set_last_error(&message);
            status
        }
        None => {
            set_last_error("no runtime is installed on this thread");
            M2N_NO_RUNTIME
        }
    }
}

fn invoke_slots(
    runtime: &mut Runtime,
    symbol: &str,
    slots: &[M2nValue],
    result: *mut M2nValue,
) -> Result<(), (i32, String)> {
    let function = runtime
        .model()
        .function(symbol)
        .cloned()
        .ok_or_else(|| call_failure(CallError::UnknownSymbol(symbol.to_string())))?;
    if slots.len() != function.native_arity() {
        return Err(call_failure(CallError::Arity {
            symbol: symbol.to_string(),
            expected: function.native_arity(),
            found: slots.len(),
        }));
    }

    let offset = usize::from(function.takes_handle());
    let directions: Vec<Direction> = (0..slots.len())
        .map(|index| match index.checked_sub(offset) {
            Some(param) => function.params[param].direction,
            None => Direction::In,
        })
        .collect();

    // A by-ref slot must match its parameter before any managed code runs.
    for (index, slot) in slots.iter().enumerate() {
        let param = match index.checked_sub(offset) {
            Some(param) => &function.params[param],
            None => continue,
        };
        if !param.direction.is_by_ref() {
            continue;
        }
        let expected = native_kind(&param.ty, runtime.model()).map_err(|e| (M2N_CONVERSION, e.to_string()))?;
        if slot.kind != expected.code() {
            return Err((
                M2N_INVALID_ARGUMENT,
                format!(
                    "argument {}: parameter '{}' needs a slot of kind {}, found {}",
                    index,
                    param.name,
                    expected.constant(),
                    slot.kind
                ),
            ));
        }
    }

    let mut values = Vec::with_capacity(slots.len());
    for (index, (slot, direction)) in slots.iter().zip(&directions).enumerate() {
        let value = unsafe { decode(slot, *direction) }
            .map_err(|message| (M2N_INVALID_ARGUMENT, format!("argument {}: {}", index, message)))?;
        values.push(value);
    }

    let returned = runtime.invoke(symbol, &mut values).map_err(call_failure)?;

    for (index, (slot, value)) in slots.iter().zip(&values).enumerate() {
        if directions[index].is_by_ref() && !fits_slot(slot.kind, value) {
            return Err((
                M2N_INVALID_ARGUMENT,
                format!("argument {}: slot of kind {} cannot hold {}", index, slot.kind, value.describe()),
            ));
        }
    }
    for ((slot, value), direction) in slots.iter().zip(values).zip(&directions) {
        if direction.is_by_ref() {
            unsafe { write_through(slot.payload.ptr, slot.kind, value) };
        }
    }

    if !result.is_null() {
        unsafe { *result = encode(returned) };
    }
    Ok(())
}

fn fits_slot(kind: u32, value: &NativeValue) -> bool {
    match value {
        NativeValue::Null => kind == M2N_KIND_HANDLE || kind == M2N_KIND_STRING,
        value => value.kind().code() == kind,
    }
}

fn call_failure(error: CallError) -> (i32, String) {
    (error.status(), error.to_string())
}

/// Reads a native argument out of `slot`.
///
/// # Safety
/// Pointers in `slot` must be valid for its kind.
unsafe fn decode(slot: &M2nValue, direction: Direction) -> Result<NativeValue, String> {
    let kind = ElementKind::from_code(slot.kind).ok_or_else(|| format!("unknown kind {}", slot.kind))?;

    if slot.by_ref {
        let ptr = slot.payload.ptr;
        if ptr.is_null() {
            return Err("null pointer for an out or ref parameter".to_string());
        }
        if direction == Direction::Out {
            return Ok(NativeValue::zero(kind));
        }
        return Ok(match kind {
            ElementKind::Void => NativeValue::Void,
            ElementKind::Bool => NativeValue::Bool(*(ptr as *const bool)),
            ElementKind::Char => NativeValue::Char(*(ptr as *const u16)),
            ElementKind::I8 => NativeValue::I8(*(ptr as *const i8)),
            ElementKind::U8 => NativeValue::U8(*(ptr as *const u8)),
            ElementKind::I16 => NativeValue::I16(*(ptr as *const i16)),
            ElementKind::U16 => NativeValue::U16(*(ptr as *const u16)),
            ElementKind::I32 => NativeValue::I32(*(ptr as *const i32)),
            ElementKind::U32 => NativeValue::U32(*(ptr as *const u32)),
            ElementKind::I64 => NativeValue::I64(*(ptr as *const i64)),
            ElementKind::U64 => NativeValue::U64(*(ptr as *const u64)),
            ElementKind::F32 => NativeValue::F32(*(ptr as *const f32)),
            ElementKind::F64 => NativeValue::F64(*(ptr as *const f64)),
            ElementKind::String => NativeValue::Text((*(ptr as *const NativeString)).clone()),
            ElementKind::Handle => handle_value(*(ptr as *const *mut c_void)),
            ElementKind::Array => return Err("arrays cannot be passed by reference".to_string()),
        });
    }

    if direction.is_by_ref() {
        return Err("out and ref parameters need a by_ref slot".to_string());
    }

    let payload = slot.payload;
    Ok(match kind {
        ElementKind::Void => NativeValue::Void,
        ElementKind::Bool => NativeValue::Bool(payload.b),
        ElementKind::Char => NativeValue::Char(payload.c),
        ElementKind::I8 => NativeValue::I8(payload.i8),
        ElementKind::U8 => NativeValue::U8(payload.u8),
        ElementKind::I16 => NativeValue::I16(payload.i16),
        ElementKind::U16 => NativeValue::U16(payload.u16),
        ElementKind::I32 => NativeValue::I32(payload.i32),
        ElementKind::U32 => NativeValue::U32(payload.u32),
        ElementKind::I64 => NativeValue::I64(payload.i64),
        ElementKind::U64 => NativeValue::U64(payload.u64),
        ElementKind::F32 => NativeValue::F32(payload.f32),
        ElementKind::F64 => NativeValue::F64(payload.f64),
        ElementKind::String => {
            if payload.str.is_null() {
                NativeValue::Null
            } else {
                NativeValue::Str(CStr::from_ptr(payload.str).to_owned())
            }
        }
        ElementKind::Handle => handle_value(payload.handle),
        ElementKind::Array => {
            if payload.array.is_null() {
                NativeValue::Null
            } else {
                NativeValue::Array((*payload.array).clone())
            }
        }
    })
}

fn handle_value(ptr: *mut c_void) -> NativeValue {
    match Handle::from_raw(ptr as usize) {
        Some(handle) => NativeValue::Handle(handle),
        None => NativeValue::Null,
    }
}

/// Stores an out/ref result in caller storage.
///
/// # Safety
/// `ptr` must point at storage of the C type matching `value`'s kind.
unsafe fn write_through(ptr: *mut c_void, kind: u32, value: NativeValue) {
    match value {
        NativeValue::Void => {}
        NativeValue::Bool(v) => *(ptr as *mut bool) = v,
        NativeValue::Char(v) => *(ptr as *mut u16) = v,
        NativeValue::I8(v) => *(ptr as *mut i8) = v,
        NativeValue::U8(v) => *(ptr as *mut u8) = v,
        NativeValue::I16(v) => *(ptr as *mut i16) = v,
        NativeValue::U16(v) => *(ptr as *mut u16) = v,
        NativeValue::I32(v) => *(ptr as *mut i32) = v,
        NativeValue::U32(v) => *(ptr as *mut u32) = v,
        NativeValue::I64(v) => *(ptr as *mut i64) = v,
        NativeValue::U64(v) => *(ptr as *mut u64) = v,
        NativeValue::F32(v) => *(ptr as *mut f32) = v,
        NativeValue::F64(v) => *(ptr as *mut f64) = v,
        NativeValue::Text(text) => (*(ptr as *mut NativeString)).assign(text.as_bytes()),
        NativeValue::Str(text) => (*(ptr as *mut NativeString)).assign(text.as_bytes()),
        NativeValue::Handle(handle) => *(ptr as *mut *mut c_void) = handle.raw() as *mut c_void,
        NativeValue::Null if kind == M2N_KIND_STRING => (*(ptr as *mut NativeString)).assign(b""),
        NativeValue::Null => *(ptr as *mut *mut c_void) = std::ptr::null_mut(),
        NativeValue::Array(_) => {}
    }
}

/// Packs a call result. Strings stay valid until the next call on this
/// thread; arrays are handed over to the caller.
fn encode(value: NativeValue) -> M2nValue {
    match value {
        NativeValue::Void | NativeValue::Null => M2nValue::void(),
        NativeValue::Bool(b) => M2nValue::new(M2N_KIND_BOOL, M2nPayload { b }),
        NativeValue::Char(c) => M2nValue::new(M2N_KIND_CHAR, M2nPayload { c }),
        NativeValue::I8(v) => M2nValue::new(M2N_KIND_I8, M2nPayload { i8: v }),
        NativeValue::U8(v) => M2nValue::new(M2N_KIND_U8, M2nPayload { u8: v }),
        NativeValue::I16(v) => M2nValue::new(M2N_KIND_I16, M2nPayload { i16: v }),
        NativeValue::U16(v) => M2nValue::new(M2N_KIND_U16, M2nPayload { u16: v }),
        NativeValue::I32(v) => M2nValue::new(M2N_KIND_I32, M2nPayload { i32: v }),
        NativeValue::U32(v) => M2nValue::new(M2N_KIND_U32, M2nPayload { u32: v }),
        NativeValue::I64(v) => M2nValue::new(M2N_KIND_I64, M2nPayload { i64: v }),
        NativeValue::U64(v) => M2nValue::new(M2N_KIND_U64, M2nPayload { u64: v }),
        NativeValue::F32(v) => M2nValue::new(M2N_KIND_F32, M2nPayload { f32: v }),
        NativeValue::F64(v) => M2nValue::new(M2N_KIND_F64, M2nPayload { f64: v }),
        NativeValue::Str(text) => {
            let ptr = text.as_ptr();
            RETURNED.with(|returned| returned.borrow_mut().push(text));
            M2nValue::new(M2N_KIND_STRING, M2nPayload { str: ptr })
        }
        NativeValue::Text(text) => {
            let text = CString::new(text.as_bytes()).unwrap_or_default();
            encode(NativeValue::Str(text))
        }
        NativeValue::Array(array) => M2nValue::new(
            M2N_KIND_ARRAY,
            M2nPayload {
                array: Box::into_raw(Box::new(array)),
            },
        ),
        NativeValue::Handle(handle) => M2nValue::new(
            M2N_KIND_HANDLE,
            M2nPayload {
                handle: handle.raw() as *mut c_void,
            },
        ),
    }
}
