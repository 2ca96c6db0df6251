//! Conversions across the JNI boundary.
//!
//! Everything here follows one discipline: temporary views are RAII values
//! that release on every exit path, and length-implicit native conventions
//! (NUL-terminated strings, null-pointer-terminated string arrays) are turned
//! into explicit-length Rust values before any other code sees them.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use jni::objects::{JLongArray, JObject, JString};
use jni::sys::{jobjectArray, jsize, jstring};
use jni::JNIEnv;

use crate::error::BridgeError;

// =============================================================================
// Strings In
// =============================================================================

/// Convert a JVM string argument into a NUL-terminated C string.
///
/// The JVM-side view (`JavaStr`) is released as soon as the characters are
/// copied out; the returned `CString` is the only thing held across the
/// native call.
///
/// # Errors
///
/// Fails when the reference is null, when the JVM cannot provide the string
/// contents, or when the decoded string contains an interior NUL (such a
/// string cannot be represented as a `char*`).
pub fn jstring_to_cstring(env: &mut JNIEnv, s: &JString) -> Result<CString, BridgeError> {
    if s.as_raw().is_null() {
        return Err(jni::errors::Error::NullPtr("string argument").into());
    }
    // JavaStr handles the modified-UTF-8 decoding and releases its view on
    // drop, at the end of this statement.
    let decoded: String = env.get_string(s)?.into();
    Ok(CString::new(decoded)?)
}

// =============================================================================
// Strings Out
// =============================================================================

/// Convert a library-returned C string into a JVM string, mapping a null
/// pointer to the null reference.
///
/// # Safety
///
/// `ptr`, when non-null, must point to a NUL-terminated string that stays
/// valid for the duration of this call.
pub unsafe fn cstr_to_jstring(env: &mut JNIEnv, ptr: *const c_char) -> Result<jstring, BridgeError> {
    if ptr.is_null() {
        return Ok(std::ptr::null_mut());
    }
    let value = CStr::from_ptr(ptr).to_string_lossy();
    Ok(env.new_string(value)?.into_raw())
}

// =============================================================================
// Name Lists
// =============================================================================

/// Copy a null-pointer-terminated array of C strings into an owned,
/// explicit-length vector.
///
/// This is the boundary where OpenSlide's sentinel-terminated name-list
/// convention ends: callers only ever see a `Vec`. A null list pointer maps
/// to `None` (absent), an empty list to `Some(vec![])`.
///
/// # Safety
///
/// `list`, when non-null, must point to a null-terminated sequence of valid
/// NUL-terminated strings, all valid for the duration of this call.
pub unsafe fn scan_string_array(list: *const *const c_char) -> Option<Vec<String>> {
    if list.is_null() {
        return None;
    }
    let mut names = Vec::new();
    let mut cursor = list;
    while !(*cursor).is_null() {
        names.push(CStr::from_ptr(*cursor).to_string_lossy().into_owned());
        cursor = cursor.add(1);
    }
    Some(names)
}

/// Build a `java/lang/String[]` from owned strings.
///
/// Elements are populated in order; the local reference for each element is
/// dropped right after it is stored, so long name lists cannot exhaust the
/// local-reference table.
pub fn new_string_array(env: &mut JNIEnv, values: &[String]) -> Result<jobjectArray, BridgeError> {
    let array = env.new_object_array(values.len() as jsize, "java/lang/String", JObject::null())?;
    for (i, value) in values.iter().enumerate() {
        let element = env.new_string(value)?;
        env.set_object_array_element(&array, i as jsize, &element)?;
        env.delete_local_ref(element)?;
    }
    Ok(array.into_raw())
}

// =============================================================================
// Dimension Pairs
// =============================================================================

/// Store a `(width, height)` pair into the caller-supplied 2-element `long[]`.
pub fn store_dimensions(
    env: &mut JNIEnv,
    dim: &JLongArray,
    width: i64,
    height: i64,
) -> Result<(), BridgeError> {
    if dim.as_raw().is_null() {
        return Err(jni::errors::Error::NullPtr("dimension array").into());
    }
    env.set_long_array_region(dim, 0, &[width, height])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_ptr_array(strings: &[CString]) -> Vec<*const c_char> {
        let mut ptrs: Vec<*const c_char> = strings.iter().map(|s| s.as_ptr()).collect();
        ptrs.push(std::ptr::null());
        ptrs
    }

    #[test]
    fn scan_preserves_order_and_length() {
        let owned: Vec<CString> = ["openslide.level-count", "openslide.mpp-x", "openslide.mpp-y"]
            .iter()
            .map(|s| CString::new(*s).unwrap())
            .collect();
        let ptrs = as_ptr_array(&owned);

        let names = unsafe { scan_string_array(ptrs.as_ptr()) }.unwrap();
        assert_eq!(
            names,
            vec!["openslide.level-count", "openslide.mpp-x", "openslide.mpp-y"]
        );
    }

    #[test]
    fn scan_of_empty_list_is_empty_not_absent() {
        let terminator: [*const c_char; 1] = [std::ptr::null()];
        let names = unsafe { scan_string_array(terminator.as_ptr()) };
        assert_eq!(names, Some(Vec::new()));
    }

    #[test]
    fn scan_of_null_list_is_absent() {
        assert_eq!(unsafe { scan_string_array(std::ptr::null()) }, None);
    }

    #[test]
    fn scan_copies_out_of_the_native_buffers() {
        let owned = vec![CString::new("thumbnail").unwrap()];
        let ptrs = as_ptr_array(&owned);
        let names = unsafe { scan_string_array(ptrs.as_ptr()) }.unwrap();
        drop(owned);
        drop(ptrs);
        // Still valid after the native-side storage is gone
        assert_eq!(names, vec!["thumbnail".to_string()]);
    }

    #[test]
    fn interior_nul_cannot_cross_the_boundary() {
        assert!(CString::new("a\0b").is_err());
    }
}
