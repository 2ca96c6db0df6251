//! Runtime binding to the OpenSlide C library.
//!
//! The bridge does not link against libopenslide at build time. Like the
//! upstream Java binding, it locates the library at load time by trying the
//! platform sonames for ABI version 1, then 0, then the unversioned name, and
//! eagerly resolves every entry point it forwards to. A missing library or a
//! missing symbol is a fatal load error; nothing in this module is retried
//! lazily at call time.
//!
//! All resolved symbols are stored as raw C function pointers next to the
//! `Library` handle that keeps them mapped. The bound instance is process-wide
//! and immutable for the lifetime of the process.

use std::os::raw::c_char;
use std::sync::OnceLock;

use libloading::Library;
use tracing::{debug, info};

use crate::error::BridgeError;

/// Opaque OpenSlide session type.
///
/// Internal fields are never accessed; the pointer only travels between the
/// JVM (as a `jlong`) and libopenslide.
#[repr(C)]
#[allow(non_camel_case_types)]
pub struct openslide_t {
    _opaque: [u8; 0],
}

// C signatures from openslide.h (>= 3.4.0).
pub type DetectVendorFn = unsafe extern "C" fn(*const c_char) -> *const c_char;
pub type OpenFn = unsafe extern "C" fn(*const c_char) -> *mut openslide_t;
pub type GetLevelCountFn = unsafe extern "C" fn(*mut openslide_t) -> i32;
pub type GetLevelDimensionsFn =
    unsafe extern "C" fn(*mut openslide_t, i32, *mut i64, *mut i64);
pub type GetLevelDownsampleFn = unsafe extern "C" fn(*mut openslide_t, i32) -> f64;
pub type CloseFn = unsafe extern "C" fn(*mut openslide_t);
pub type GetPropertyNamesFn =
    unsafe extern "C" fn(*mut openslide_t) -> *const *const c_char;
pub type GetPropertyValueFn =
    unsafe extern "C" fn(*mut openslide_t, *const c_char) -> *const c_char;
pub type GetAssociatedImageNamesFn =
    unsafe extern "C" fn(*mut openslide_t) -> *const *const c_char;
pub type ReadRegionFn =
    unsafe extern "C" fn(*mut openslide_t, *mut u32, i64, i64, i32, i64, i64);
pub type GetAssociatedImageDimensionsFn =
    unsafe extern "C" fn(*mut openslide_t, *const c_char, *mut i64, *mut i64);
pub type ReadAssociatedImageFn =
    unsafe extern "C" fn(*mut openslide_t, *const c_char, *mut u32);
pub type GetErrorFn = unsafe extern "C" fn(*mut openslide_t) -> *const c_char;
pub type GetVersionFn = unsafe extern "C" fn() -> *const c_char;

// =============================================================================
// Library Location
// =============================================================================

/// Candidate file names for libopenslide, most preferred first.
///
/// Mirrors the upstream binding's search order: ABI version 1, then the
/// legacy version 0, then whatever the unversioned name resolves to on the
/// system search path.
pub fn candidate_names() -> [String; 3] {
    [soname(Some(1)), soname(Some(0)), soname(None)]
}

/// Map the library base name to a platform file name, optionally versioned.
fn soname(version: Option<u32>) -> String {
    #[cfg(target_os = "windows")]
    {
        match version {
            Some(v) => format!("libopenslide-{v}.dll"),
            None => "libopenslide.dll".to_string(),
        }
    }
    #[cfg(target_os = "macos")]
    {
        match version {
            Some(v) => format!("libopenslide.{v}.dylib"),
            None => "libopenslide.dylib".to_string(),
        }
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        match version {
            Some(v) => format!("libopenslide.so.{v}"),
            None => "libopenslide.so".to_string(),
        }
    }
}

// =============================================================================
// OpenSlideLibrary
// =============================================================================

/// The bound OpenSlide library: one raw function pointer per forwarded
/// operation, plus the `Library` handle that keeps the mapping alive.
pub struct OpenSlideLibrary {
    // Dropping the Library would unmap the code behind the function
    // pointers below, so it must outlive them.
    _lib: Library,

    pub detect_vendor: DetectVendorFn,
    pub open: OpenFn,
    pub get_level_count: GetLevelCountFn,
    pub get_level_dimensions: GetLevelDimensionsFn,
    pub get_level_downsample: GetLevelDownsampleFn,
    pub close: CloseFn,
    pub get_property_names: GetPropertyNamesFn,
    pub get_property_value: GetPropertyValueFn,
    pub get_associated_image_names: GetAssociatedImageNamesFn,
    pub read_region: ReadRegionFn,
    pub get_associated_image_dimensions: GetAssociatedImageDimensionsFn,
    pub read_associated_image: ReadAssociatedImageFn,
    pub get_error: GetErrorFn,
    pub get_version: GetVersionFn,
}

static LIBRARY: OnceLock<OpenSlideLibrary> = OnceLock::new();

/// Resolve one symbol from `lib` as a raw function pointer of type `$ty`.
///
/// `Symbol` borrows the `Library`, so the function pointer is copied out and
/// the `Library` itself is stored alongside to keep it valid.
macro_rules! resolve {
    ($lib:expr, $name:literal, $ty:ty) => {{
        let sym = unsafe { $lib.get::<$ty>(concat!($name, "\0").as_bytes()) };
        match sym {
            Ok(sym) => {
                debug!(symbol = $name, "resolved");
                *sym
            }
            Err(source) => {
                return Err(BridgeError::MissingSymbol {
                    symbol: $name,
                    source,
                })
            }
        }
    }};
}

impl OpenSlideLibrary {
    /// Locate and bind libopenslide from the platform search path.
    ///
    /// # Errors
    ///
    /// [`BridgeError::LibraryNotFound`] if no candidate name can be opened,
    /// [`BridgeError::MissingSymbol`] if the library predates the required
    /// API (OpenSlide 3.4.0).
    pub fn load() -> Result<Self, BridgeError> {
        let mut last_err = None;
        for name in candidate_names() {
            match unsafe { Library::new(&name) } {
                Ok(lib) => {
                    info!(library = %name, "binding OpenSlide");
                    return Self::bind(lib);
                }
                Err(e) => {
                    debug!(library = %name, error = %e, "not loadable");
                    last_err = Some(e);
                }
            }
        }
        // candidate_names() is non-empty, so at least one attempt ran
        Err(match last_err {
            Some(e) => BridgeError::LibraryNotFound(e),
            None => BridgeError::NotLoaded,
        })
    }

    /// Resolve every forwarded symbol from an already-opened library.
    fn bind(lib: Library) -> Result<Self, BridgeError> {
        Ok(Self {
            detect_vendor: resolve!(lib, "openslide_detect_vendor", DetectVendorFn),
            open: resolve!(lib, "openslide_open", OpenFn),
            get_level_count: resolve!(lib, "openslide_get_level_count", GetLevelCountFn),
            get_level_dimensions: resolve!(
                lib,
                "openslide_get_level_dimensions",
                GetLevelDimensionsFn
            ),
            get_level_downsample: resolve!(
                lib,
                "openslide_get_level_downsample",
                GetLevelDownsampleFn
            ),
            close: resolve!(lib, "openslide_close", CloseFn),
            get_property_names: resolve!(
                lib,
                "openslide_get_property_names",
                GetPropertyNamesFn
            ),
            get_property_value: resolve!(
                lib,
                "openslide_get_property_value",
                GetPropertyValueFn
            ),
            get_associated_image_names: resolve!(
                lib,
                "openslide_get_associated_image_names",
                GetAssociatedImageNamesFn
            ),
            read_region: resolve!(lib, "openslide_read_region", ReadRegionFn),
            get_associated_image_dimensions: resolve!(
                lib,
                "openslide_get_associated_image_dimensions",
                GetAssociatedImageDimensionsFn
            ),
            read_associated_image: resolve!(
                lib,
                "openslide_read_associated_image",
                ReadAssociatedImageFn
            ),
            get_error: resolve!(lib, "openslide_get_error", GetErrorFn),
            get_version: resolve!(lib, "openslide_get_version", GetVersionFn),
            _lib: lib,
        })
    }

    /// Bind libopenslide once for the whole process.
    ///
    /// Subsequent calls return the already-bound instance. A failed first
    /// attempt is not cached; the host may retry loading the module.
    pub fn init() -> Result<&'static Self, BridgeError> {
        if let Some(lib) = LIBRARY.get() {
            return Ok(lib);
        }
        let lib = Self::load()?;
        // A racing initializer may have won; either value is equivalent.
        let _ = LIBRARY.set(lib);
        match LIBRARY.get() {
            Some(lib) => Ok(lib),
            None => Err(BridgeError::NotLoaded),
        }
    }

    /// The process-wide instance, if `init` has succeeded.
    pub fn get() -> Option<&'static Self> {
        LIBRARY.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_prefer_abi_version_1() {
        let names = candidate_names();
        #[cfg(all(not(target_os = "windows"), not(target_os = "macos")))]
        {
            assert_eq!(names[0], "libopenslide.so.1");
            assert_eq!(names[1], "libopenslide.so.0");
            assert_eq!(names[2], "libopenslide.so");
        }
        #[cfg(target_os = "macos")]
        {
            assert_eq!(names[0], "libopenslide.1.dylib");
        }
        #[cfg(target_os = "windows")]
        {
            assert_eq!(names[0], "libopenslide-1.dll");
        }
    }

    #[test]
    fn binding_a_bogus_library_fails_cleanly() {
        let result = unsafe { Library::new("libopenslide-jni-no-such-library.so.999") };
        assert!(result.is_err());
    }
}
