use crate::native::{ElementKind, NativeArray};
use std::os::raw::c_void;

/// Creates an empty array of element kind `kind` (one of `M2N_KIND_*`).
/// Returns null for kinds that cannot be array elements.
#[no_mangle]
pub extern "C" fn m2n_array_new(kind: u32) -> *mut NativeArray {
    match ElementKind::from_code(kind).and_then(NativeArray::new) {
        Some(array) => Box::into_raw(Box::new(array)),
        None => std::ptr::null_mut(),
    }
}

/// Appends `count` elements of the array's C element type. Strings are copied.
#[no_mangle]
pub extern "C" fn m2n_array_append_vals(array: *mut NativeArray, values: *const c_void, count: usize) {
    if array.is_null() {
        return;
    }
    unsafe { (*array).append_raw(values, count) };
}

#[no_mangle]
pub extern "C" fn m2n_array_len(array: *const NativeArray) -> usize {
    if array.is_null() {
        return 0;
    }
    unsafe { (*array).len() }
}

/// Address of element `index`, or null when out of bounds.
#[no_mangle]
pub extern "C" fn m2n_array_index(array: *const NativeArray, index: usize) -> *const c_void {
    if array.is_null() {
        return std::ptr::null();
    }
    unsafe { (*array).element_ptr(index) }.unwrap_or(std::ptr::null())
}

/// Frees an array created by `m2n_array_new` or returned by `m2n_invoke`.
#[no_mangle]
pub extern "C" fn m2n_array_free(array: *mut NativeArray) {
    if array.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(array) });
}
