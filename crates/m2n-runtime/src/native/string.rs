use std::fmt;
use std::os::raw::c_char;
use std::str::Utf8Error;

/// Growable text buffer shared with C as `M2nString`.
///
/// C reads `str` and `len`. The bytes are always NUL-terminated, so `str` can
/// be passed straight to C string functions. Growth is amortized. C may write
/// `len`, so Rust only ever trusts the length of its own storage.
#[repr(C)]
pub struct NativeString {
    pub str: *mut c_char,
    pub len: usize,
    storage: Vec<u8>,
}

impl NativeString {
    pub fn new() -> Self {
        Self::from_bytes(b"")
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut storage = Vec::with_capacity(bytes.len() + 1);
        storage.extend_from_slice(bytes);
        storage.push(0);
        let mut string = Self {
            str: std::ptr::null_mut(),
            len: 0,
            storage,
        };
        string.sync();
        string
    }

    /// Replaces the whole contents.
    pub fn assign(&mut self, bytes: &[u8]) {
        self.storage.clear();
        self.storage.extend_from_slice(bytes);
        self.storage.push(0);
        self.sync();
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.storage.pop();
        self.storage.extend_from_slice(bytes);
        self.storage.push(0);
        self.sync();
    }

    pub fn len(&self) -> usize {
        self.storage.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes that fit without reallocating, excluding the terminator.
    pub fn capacity(&self) -> usize {
        self.storage.capacity().saturating_sub(1)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.storage[..self.storage.len() - 1]
    }

    pub fn to_str(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(self.as_bytes())
    }

    fn sync(&mut self) {
        self.len = self.storage.len() - 1;
        self.str = self.storage.as_mut_ptr() as *mut c_char;
    }
}

impl Default for NativeString {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for NativeString {
    fn from(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }
}

impl Clone for NativeString {
    fn clone(&self) -> Self {
        Self::from_bytes(self.as_bytes())
    }
}

impl PartialEq for NativeString {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Debug for NativeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeString")
            .field("text", &String::from_utf8_lossy(self.as_bytes()))
            .field("capacity", &self.capacity())
            .finish()
    }
}
