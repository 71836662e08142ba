use crate::native::NativeString;
use std::ffi::CStr;
use std::os::raw::c_char;

/// Creates a growable string, copying `text` when it is not null.
#[no_mangle]
pub extern "C" fn m2n_string_new(text: *const c_char) -> *mut NativeString {
    let string = if text.is_null() {
        NativeString::new()
    } else {
        NativeString::from_bytes(unsafe { CStr::from_ptr(text) }.to_bytes())
    };
    Box::into_raw(Box::new(string))
}

/// Replaces the contents of `string` with `text`. Null `text` empties it.
#[no_mangle]
pub extern "C" fn m2n_string_assign(string: *mut NativeString, text: *const c_char) {
    if string.is_null() {
        return;
    }
    let bytes: &[u8] = if text.is_null() {
        b""
    } else {
        unsafe { CStr::from_ptr(text) }.to_bytes()
    };
    unsafe { (*string).assign(bytes) };
}

#[no_mangle]
pub extern "C" fn m2n_string_append(string: *mut NativeString, text: *const c_char) {
    if string.is_null() || text.is_null() {
        return;
    }
    unsafe {
        let bytes = CStr::from_ptr(text).to_bytes();
        (*string).append(bytes);
    }
}

/// Frees a string created by `m2n_string_new`.
#[no_mangle]
pub extern "C" fn m2n_string_free(string: *mut NativeString) {
    if string.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(string) });
}
