//! C entry points for hosts that load this library as an expansion function
//!
//! The host calls [`em_p0f_os`] with its argument vector and gets back a
//! status code plus a string: the OS label on success, or a message
//! describing what was wrong with the call.

use std::ffi::{CStr, CString};

use libc::{c_char, c_int};

use crate::{
    config::Config,
    error::Outcome,
    internal,
    logging::{LogSink, TracingSink},
    lookup::p0f_os,
};

pub mod string;

/// The host's log writer. Receives one NUL terminated line per call.
pub type LogWrite = unsafe extern "C" fn(message: *const c_char);

/// Routes diagnostics to the host's log, or to `tracing` if it has none.
struct HostLog(Option<LogWrite>);

impl LogSink for HostLog {
    fn log_write(&self, message: &str) {
        let Some(log_write) = self.0 else {
            TracingSink.log_write(message);
            return;
        };

        let line = CString::new(message.replace('\0', "")).unwrap_or_default();
        unsafe { log_write(line.as_ptr()) };
    }
}

/// Collect the host's arguments, reading NULL entries as empty strings.
unsafe fn arguments(argc: c_int, argv: *const *const c_char) -> Vec<std::string::String> {
    let argc = usize::try_from(argc).unwrap_or_default();
    if argv.is_null() {
        return vec![std::string::String::new(); argc];
    }

    (0..argc)
        .map(|index| {
            let argument = unsafe { *argv.add(index) };
            if argument.is_null() {
                std::string::String::new()
            } else {
                unsafe { CStr::from_ptr(argument) }
                    .to_string_lossy()
                    .into_owned()
            }
        })
        .collect()
}

///
/// Look up the operating system of a host: `argv[0]` is the path of the p0f
/// API socket and `argv[1]` the host's IP address.
///
/// Returns `OK` with the OS label (or one of the `(unknown)`, `(not found)`,
/// `(failed)` sentinels) in `*result`. Calls with the wrong number of
/// arguments or an over-long socket path return `ERROR`; an unparseable
/// address or a failure to create a socket returns `FAIL`. In those cases
/// `*result` holds the reason. `*result` must be released with
/// [`string::em_p0f_free_string`].
///
/// # Safety
///
/// `result` must be valid for writes. `argv` must point to `argc` pointers,
/// each either NULL or a NUL terminated string.
///
#[unsafe(no_mangle)]
pub unsafe extern "C" fn em_p0f_os(
    result: *mut string::String,
    argc: c_int,
    argv: *const *const c_char,
    log_write: Option<LogWrite>,
) -> c_int {
    if result.is_null() {
        return Outcome::Error as c_int;
    }

    let arguments = unsafe { arguments(argc, argv) };

    let (outcome, text) = match p0f_os(&arguments, &Config::default(), &HostLog(log_write)) {
        Ok(text) => (Outcome::Ok, text),
        Err(err) => {
            internal!(level = DEBUG, "p0f lookup rejected: {err:?}");
            (err.outcome(), err.to_string())
        }
    };

    unsafe { result.write(string::String::from(text)) };

    outcome as c_int
}
