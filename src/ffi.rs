//! FFI bindings for Synheart Flux signals
//!
//! This module provides C-compatible functions for driving a signal processor
//! from other languages. Strings are null-terminated; strings returned by Flux
//! are allocated here and must be freed by the caller using `flux_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::{PipelineConfig, ProcessorConfig, ProcessorKind};
use crate::pipeline::SignalProcessor;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Default configuration JSON for a processor kind
/// (`"scaler"`, `"normalization"`, `"peak_detection"`, `"rate_of_change"`, `"smoother"`).
///
/// # Safety
/// - `kind` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `flux_free_string`.
/// - Returns NULL on error; call `flux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn flux_default_config(kind: *const c_char) -> *mut c_char {
    clear_last_error();

    let kind_str = match cstr_to_string(kind) {
        Some(s) => s,
        None => {
            set_last_error("Invalid processor kind pointer");
            return ptr::null_mut();
        }
    };

    let result = kind_str
        .parse::<ProcessorKind>()
        .and_then(|kind| PipelineConfig::new(ProcessorConfig::default_for(kind)).to_json());

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a SignalProcessor
pub struct FluxProcessorHandle {
    processor: SignalProcessor,
}

/// Create a new processor from a JSON configuration.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string.
/// - Returns a pointer to a newly allocated processor.
/// - Must be freed with `flux_processor_free`.
/// - Returns NULL on error; call `flux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn flux_processor_new(config_json: *const c_char) -> *mut FluxProcessorHandle {
    clear_last_error();

    let json_str = match cstr_to_string(config_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid config string pointer");
            return ptr::null_mut();
        }
    };

    match SignalProcessor::from_json(&json_str) {
        Ok(processor) => Box::into_raw(Box::new(FluxProcessorHandle { processor })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `flux_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn flux_processor_free(processor: *mut FluxProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Push one value and return the primary output (peak events as a bit mask:
/// max = 1, min = 2, rising = 4, falling = 8).
///
/// A NaN `value` is treated as "no new input" for this tick.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `flux_processor_new`.
/// - Returns NaN on error; call `flux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn flux_processor_put(
    processor: *mut FluxProcessorHandle,
    value: f32,
    dt: f64,
) -> f32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return f32::NAN;
    }

    let handle = &mut *processor;
    let output = if value.is_nan() {
        handle.processor.hold(dt)
    } else {
        handle.processor.put(value, dt)
    };
    output.primary()
}

/// Push one value and return the full output record as JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `flux_processor_new`.
/// - Returns a newly allocated string that must be freed with `flux_free_string`.
/// - Returns NULL on error; call `flux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn flux_processor_put_json(
    processor: *mut FluxProcessorHandle,
    value: f32,
    dt: f64,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;
    let output = if value.is_nan() {
        handle.processor.hold(dt)
    } else {
        handle.processor.put(value, dt)
    };

    match serde_json::to_string(&output) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Clear all accumulated state, keeping the configuration.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `flux_processor_new`.
#[no_mangle]
pub unsafe extern "C" fn flux_processor_reset(processor: *mut FluxProcessorHandle) {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return;
    }

    let handle = &mut *processor;
    handle.processor.reset();
}

/// Save processor state to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `flux_processor_new`.
/// - Returns a newly allocated string that must be freed with `flux_free_string`.
/// - Returns NULL on error; call `flux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn flux_processor_save_state(
    processor: *mut FluxProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.save_state() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Load processor state from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `flux_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `flux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn flux_processor_load_state(
    processor: *mut FluxProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.processor.load_state(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn flux_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Flux function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn flux_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Flux library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn flux_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
