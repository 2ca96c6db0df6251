//! Typed wrapper for the opaque slide handle.
//!
//! The JVM side carries an open slide session as a plain `long`. On the
//! native side that value is a `*mut openslide_t` owned entirely by
//! libopenslide: the bridge never allocates, frees, or dereferences it, it
//! only relays it. Wrapping the integer in a newtype keeps the raw value from
//! being mixed into arithmetic or reinterpreted anywhere between the two
//! call sites that legitimately convert it.

use jni::sys::jlong;

use crate::library::openslide_t;

/// An opaque slide session identifier, as received from the JVM.
///
/// `SlideHandle(0)` is the "no slide" sentinel returned by a failed open;
/// lifecycle correctness (not using a handle after close) is the caller's
/// obligation, per the OpenSlide contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideHandle(jlong);

impl SlideHandle {
    /// Wrap the JVM-side representation.
    pub fn from_raw(raw: jlong) -> Self {
        Self(raw)
    }

    /// Wrap a pointer returned by `openslide_open`.
    pub fn from_ptr(ptr: *mut openslide_t) -> Self {
        Self(ptr as jlong)
    }

    /// The JVM-side representation.
    pub fn as_raw(self) -> jlong {
        self.0
    }

    /// The pointer passed to libopenslide. Only the FFI call sites use this.
    pub fn as_ptr(self) -> *mut openslide_t {
        self.0 as *mut openslide_t
    }

    /// Whether this is the failed-open sentinel.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_round_trips_to_null() {
        let handle = SlideHandle::from_raw(0);
        assert!(handle.is_null());
        assert!(handle.as_ptr().is_null());
        assert_eq!(SlideHandle::from_ptr(std::ptr::null_mut()).as_raw(), 0);
    }

    #[test]
    fn nonzero_value_round_trips() {
        let handle = SlideHandle::from_raw(0x7f00_dead_beef);
        assert!(!handle.is_null());
        assert_eq!(SlideHandle::from_ptr(handle.as_ptr()), handle);
        assert_eq!(handle.as_raw(), 0x7f00_dead_beef);
    }
}
