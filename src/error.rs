use thiserror::Error;

/// Errors raised on the bridge side of the JNI boundary.
///
/// These cover the two failure classes the bridge owns: binding to
/// libopenslide at load time, and marshaling arguments/results for a single
/// call. Failures inside libopenslide itself are never represented here; the
/// library signals them through its own sentinels (null pointer, zero handle)
/// and its `openslide_get_error` channel, and the bridge forwards those
/// unmodified.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// libopenslide could not be located under any candidate name
    #[error("couldn't locate OpenSlide library; add it to the system library search path")]
    LibraryNotFound(#[source] libloading::Error),

    /// The library was found but a required symbol is missing
    #[error("unresolved symbol {symbol}; need OpenSlide >= 3.4.0")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    /// A JNI operation failed (string view, array region, allocation)
    #[error("JNI error: {0}")]
    Jni(#[from] jni::errors::Error),

    /// A path or name from the JVM contains an interior NUL byte and cannot
    /// cross the C boundary
    #[error("string contains interior NUL byte")]
    InteriorNul(#[from] std::ffi::NulError),

    /// The native library was never bound (entry point invoked without a
    /// successful `JNI_OnLoad`)
    #[error("OpenSlide library is not loaded")]
    NotLoaded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_symbol_names_the_symbol() {
        let source = unsafe { libloading::Library::new("libopenslide-jni-no-such-library.so.999") }
            .map(|_| ())
            .unwrap_err();
        let err = BridgeError::MissingSymbol {
            symbol: "openslide_open",
            source,
        };
        let msg = err.to_string();
        assert!(msg.contains("openslide_open"));
        assert!(msg.contains("3.4.0"));
    }

    #[test]
    fn interior_nul_is_a_marshaling_failure() {
        let err = std::ffi::CString::new("a\0b").unwrap_err();
        let bridged: BridgeError = err.into();
        assert!(matches!(bridged, BridgeError::InteriorNul(_)));
    }
}
