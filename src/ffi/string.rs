use std::{ffi::CString, ptr::null};

use libc::c_char;

/// Strip NUL bytes so the text always survives the trip into a `CString`.
fn sanitize_null_bytes(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().copied().filter(|&b| b != 0).collect()
}

///
/// An owned, NUL terminated string handed to the host. The host gives it
/// back through [`em_p0f_free_string`] once it has copied what it needs.
///
#[repr(C)]
#[derive(Debug)]
pub struct String {
    pub len: usize,
    pub data: *const c_char,
}

impl Drop for String {
    fn drop(&mut self) {
        if !self.data.is_null() {
            let _ = unsafe { CString::from_raw(self.data.cast_mut()) };
            self.data = null();
        }
    }
}

impl Default for String {
    fn default() -> Self {
        Self {
            len: 0,
            data: null(),
        }
    }
}

impl String {
    /// The text, if any, without the terminator.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        if self.data.is_null() {
            return &[];
        }

        unsafe { std::slice::from_raw_parts(self.data.cast::<u8>(), self.len) }
    }
}

impl From<&str> for String {
    fn from(value: &str) -> Self {
        let sanitized = sanitize_null_bytes(value.as_bytes());
        let len = sanitized.len();
        let data = CString::new(sanitized).unwrap_or_default().into_raw();

        Self { len, data }
    }
}

impl From<std::string::String> for String {
    fn from(value: std::string::String) -> Self {
        Self::from(value.as_str())
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn em_p0f_free_string(ffi_string: String) {
    drop(ffi_string);
}
