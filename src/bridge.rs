//! JNI entry points and load-time registration.
//!
//! Each entry point marshals its arguments, forwards one call to
//! libopenslide, marshals the result back, and returns. The set of methods,
//! their names, and their signatures are a fixed contract with the
//! `org.openslide.OpenSlideJNI` class; the JVM resolves them through the
//! `RegisterNatives` table built in [`native_methods`], not through exported
//! symbol names.
//!
//! Failure behavior is uniform: a marshaling failure skips the library call
//! and returns the method's sentinel (null reference, zero, or a silent void
//! return); a failure inside libopenslide is forwarded as whatever sentinel
//! the library produced. No exceptions are thrown, nothing is retried, and
//! per-call failures are not logged. Diagnostics for an open slide go through
//! `openslide_get_error` on the Java side.

use std::os::raw::c_void;

use jni::objects::{JClass, JIntArray, JLongArray, JString, ReleaseMode};
use jni::sys::{jdouble, jint, jlong, jobjectArray, jstring, JNI_ERR, JNI_VERSION_1_4};
use jni::{JNIEnv, JavaVM, NativeMethod};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::BridgeError;
use crate::handle::SlideHandle;
use crate::library::OpenSlideLibrary;
use crate::marshal::{
    cstr_to_jstring, jstring_to_cstring, new_string_array, scan_string_array, store_dimensions,
};

/// The host class every native method is registered against.
pub const BRIDGE_CLASS: &str = "org/openslide/OpenSlideJNI";

/// The bound library, or the failure sentinel for the calling entry point.
fn library() -> Result<&'static OpenSlideLibrary, BridgeError> {
    OpenSlideLibrary::get().ok_or(BridgeError::NotLoaded)
}

// =============================================================================
// Slide Lifecycle
// =============================================================================

extern "system" fn detect_vendor<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    filename: JString<'local>,
) -> jstring {
    try_detect_vendor(&mut env, &filename).unwrap_or(std::ptr::null_mut())
}

fn try_detect_vendor(env: &mut JNIEnv, filename: &JString) -> Result<jstring, BridgeError> {
    let lib = library()?;
    let path = jstring_to_cstring(env, filename)?;
    let vendor = unsafe { (lib.detect_vendor)(path.as_ptr()) };
    unsafe { cstr_to_jstring(env, vendor) }
}

extern "system" fn open<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    filename: JString<'local>,
) -> jlong {
    try_open(&mut env, &filename)
        .map(SlideHandle::as_raw)
        .unwrap_or(0)
}

fn try_open(env: &mut JNIEnv, filename: &JString) -> Result<SlideHandle, BridgeError> {
    let lib = library()?;
    let path = jstring_to_cstring(env, filename)?;
    let slide = unsafe { (lib.open)(path.as_ptr()) };
    // A null pointer from openslide_open becomes the zero handle sentinel.
    Ok(SlideHandle::from_ptr(slide))
}

extern "system" fn close<'local>(_env: JNIEnv<'local>, _class: JClass<'local>, osr: jlong) {
    if let Ok(lib) = library() {
        unsafe { (lib.close)(SlideHandle::from_raw(osr).as_ptr()) };
    }
}

// =============================================================================
// Pyramid Levels
// =============================================================================

extern "system" fn get_level_count<'local>(_env: JNIEnv<'local>, _class: JClass<'local>, osr: jlong) -> jint {
    match library() {
        Ok(lib) => unsafe { (lib.get_level_count)(SlideHandle::from_raw(osr).as_ptr()) },
        Err(_) => -1,
    }
}

extern "system" fn get_level_dimensions<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    osr: jlong,
    level: jint,
    dim: JLongArray<'local>,
) {
    let _ = try_get_level_dimensions(&mut env, SlideHandle::from_raw(osr), level, &dim);
}

fn try_get_level_dimensions(
    env: &mut JNIEnv,
    osr: SlideHandle,
    level: jint,
    dim: &JLongArray,
) -> Result<(), BridgeError> {
    let lib = library()?;
    let mut width: i64 = 0;
    let mut height: i64 = 0;
    unsafe { (lib.get_level_dimensions)(osr.as_ptr(), level, &mut width, &mut height) };
    store_dimensions(env, dim, width, height)
}

extern "system" fn get_level_downsample<'local>(
    _env: JNIEnv<'local>,
    _class: JClass<'local>,
    osr: jlong,
    level: jint,
) -> jdouble {
    match library() {
        Ok(lib) => unsafe { (lib.get_level_downsample)(SlideHandle::from_raw(osr).as_ptr(), level) },
        Err(_) => -1.0,
    }
}

// =============================================================================
// Properties and Associated Images
// =============================================================================

extern "system" fn get_property_names<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    osr: jlong,
) -> jobjectArray {
    try_get_property_names(&mut env, SlideHandle::from_raw(osr)).unwrap_or(std::ptr::null_mut())
}

fn try_get_property_names(env: &mut JNIEnv, osr: SlideHandle) -> Result<jobjectArray, BridgeError> {
    let lib = library()?;
    let list = unsafe { (lib.get_property_names)(osr.as_ptr()) };
    match unsafe { scan_string_array(list) } {
        Some(names) => new_string_array(env, &names),
        None => Ok(std::ptr::null_mut()),
    }
}

extern "system" fn get_property_value<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    osr: jlong,
    name: JString<'local>,
) -> jstring {
    try_get_property_value(&mut env, SlideHandle::from_raw(osr), &name)
        .unwrap_or(std::ptr::null_mut())
}

fn try_get_property_value(
    env: &mut JNIEnv,
    osr: SlideHandle,
    name: &JString,
) -> Result<jstring, BridgeError> {
    let lib = library()?;
    let name = jstring_to_cstring(env, name)?;
    let value = unsafe { (lib.get_property_value)(osr.as_ptr(), name.as_ptr()) };
    unsafe { cstr_to_jstring(env, value) }
}

extern "system" fn get_associated_image_names<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    osr: jlong,
) -> jobjectArray {
    try_get_associated_image_names(&mut env, SlideHandle::from_raw(osr))
        .unwrap_or(std::ptr::null_mut())
}

fn try_get_associated_image_names(
    env: &mut JNIEnv,
    osr: SlideHandle,
) -> Result<jobjectArray, BridgeError> {
    let lib = library()?;
    let list = unsafe { (lib.get_associated_image_names)(osr.as_ptr()) };
    match unsafe { scan_string_array(list) } {
        Some(names) => new_string_array(env, &names),
        None => Ok(std::ptr::null_mut()),
    }
}

extern "system" fn get_associated_image_dimensions<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    osr: jlong,
    name: JString<'local>,
    dim: JLongArray<'local>,
) {
    let _ =
        try_get_associated_image_dimensions(&mut env, SlideHandle::from_raw(osr), &name, &dim);
}

fn try_get_associated_image_dimensions(
    env: &mut JNIEnv,
    osr: SlideHandle,
    name: &JString,
    dim: &JLongArray,
) -> Result<(), BridgeError> {
    let lib = library()?;
    let name = jstring_to_cstring(env, name)?;
    let mut width: i64 = 0;
    let mut height: i64 = 0;
    unsafe {
        (lib.get_associated_image_dimensions)(osr.as_ptr(), name.as_ptr(), &mut width, &mut height)
    };
    store_dimensions(env, dim, width, height)
}

// =============================================================================
// Pixel Reads
// =============================================================================

extern "system" fn read_region<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    osr: jlong,
    dest: JIntArray<'local>,
    x: jlong,
    y: jlong,
    level: jint,
    w: jlong,
    h: jlong,
) {
    let _ = try_read_region(&mut env, SlideHandle::from_raw(osr), &dest, x, y, level, w, h);
}

#[allow(clippy::too_many_arguments)]
fn try_read_region(
    env: &mut JNIEnv,
    osr: SlideHandle,
    dest: &JIntArray,
    x: jlong,
    y: jlong,
    level: jint,
    w: jlong,
    h: jlong,
) -> Result<(), BridgeError> {
    let lib = library()?;
    if dest.as_raw().is_null() {
        return Err(jni::errors::Error::NullPtr("destination buffer").into());
    }
    // Critical view over the pixel buffer: held only for the native call, no
    // JNI interaction until it drops. The caller guarantees len >= w * h.
    let pixels = unsafe { env.get_array_elements_critical(dest, ReleaseMode::CopyBack)? };
    unsafe { (lib.read_region)(osr.as_ptr(), pixels.as_ptr() as *mut u32, x, y, level, w, h) };
    Ok(())
}

extern "system" fn read_associated_image<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    osr: jlong,
    name: JString<'local>,
    dest: JIntArray<'local>,
) {
    let _ = try_read_associated_image(&mut env, SlideHandle::from_raw(osr), &name, &dest);
}

fn try_read_associated_image(
    env: &mut JNIEnv,
    osr: SlideHandle,
    name: &JString,
    dest: &JIntArray,
) -> Result<(), BridgeError> {
    let lib = library()?;
    // Name conversion happens before the critical hold; no JNI call may land
    // inside it.
    let name = jstring_to_cstring(env, name)?;
    if dest.as_raw().is_null() {
        return Err(jni::errors::Error::NullPtr("destination buffer").into());
    }
    let pixels = unsafe { env.get_array_elements_critical(dest, ReleaseMode::CopyBack)? };
    unsafe {
        (lib.read_associated_image)(osr.as_ptr(), name.as_ptr(), pixels.as_ptr() as *mut u32)
    };
    Ok(())
}

// =============================================================================
// Diagnostics
// =============================================================================

extern "system" fn get_error<'local>(mut env: JNIEnv<'local>, _class: JClass<'local>, osr: jlong) -> jstring {
    try_get_error(&mut env, SlideHandle::from_raw(osr)).unwrap_or(std::ptr::null_mut())
}

fn try_get_error(env: &mut JNIEnv, osr: SlideHandle) -> Result<jstring, BridgeError> {
    let lib = library()?;
    // Null means the slide is not in an error state.
    let message = unsafe { (lib.get_error)(osr.as_ptr()) };
    unsafe { cstr_to_jstring(env, message) }
}

extern "system" fn get_version<'local>(mut env: JNIEnv<'local>, _class: JClass<'local>) -> jstring {
    try_get_version(&mut env).unwrap_or(std::ptr::null_mut())
}

fn try_get_version(env: &mut JNIEnv) -> Result<jstring, BridgeError> {
    let lib = library()?;
    let version = unsafe { (lib.get_version)() };
    unsafe { cstr_to_jstring(env, version) }
}

// =============================================================================
// Registration
// =============================================================================

fn method(name: &str, sig: &str, fn_ptr: *mut c_void) -> NativeMethod {
    NativeMethod {
        name: name.into(),
        sig: sig.into(),
        fn_ptr,
    }
}

/// The `RegisterNatives` table: one row per exposed operation.
///
/// Names and signatures must match the `native` declarations in
/// `org.openslide.OpenSlideJNI` exactly; the Java side is compiled against
/// this shape.
pub fn native_methods() -> Vec<NativeMethod> {
    vec![
        method(
            "openslide_detect_vendor",
            "(Ljava/lang/String;)Ljava/lang/String;",
            detect_vendor as *mut c_void,
        ),
        method("openslide_open", "(Ljava/lang/String;)J", open as *mut c_void),
        method("openslide_get_level_count", "(J)I", get_level_count as *mut c_void),
        method(
            "openslide_get_level_dimensions",
            "(JI[J)V",
            get_level_dimensions as *mut c_void,
        ),
        method(
            "openslide_get_level_downsample",
            "(JI)D",
            get_level_downsample as *mut c_void,
        ),
        method("openslide_close", "(J)V", close as *mut c_void),
        method(
            "openslide_get_property_names",
            "(J)[Ljava/lang/String;",
            get_property_names as *mut c_void,
        ),
        method(
            "openslide_get_property_value",
            "(JLjava/lang/String;)Ljava/lang/String;",
            get_property_value as *mut c_void,
        ),
        method(
            "openslide_get_associated_image_names",
            "(J)[Ljava/lang/String;",
            get_associated_image_names as *mut c_void,
        ),
        method("openslide_read_region", "(J[IJJIJJ)V", read_region as *mut c_void),
        method(
            "openslide_get_associated_image_dimensions",
            "(JLjava/lang/String;[J)V",
            get_associated_image_dimensions as *mut c_void,
        ),
        method(
            "openslide_read_associated_image",
            "(JLjava/lang/String;[I)V",
            read_associated_image as *mut c_void,
        ),
        method(
            "openslide_get_error",
            "(J)Ljava/lang/String;",
            get_error as *mut c_void,
        ),
        method(
            "openslide_get_version",
            "()Ljava/lang/String;",
            get_version as *mut c_void,
        ),
    ]
}

/// Register the full method table against [`BRIDGE_CLASS`].
///
/// # Errors
///
/// Fails when the class cannot be found or the JVM rejects the table; the
/// caller treats either as fatal.
pub fn register_natives(env: &mut JNIEnv) -> Result<(), BridgeError> {
    let class = env.find_class(BRIDGE_CLASS)?;
    let methods = native_methods();
    // Every fn_ptr in the table matches the signature it is registered under.
    unsafe { env.register_native_methods(class, &methods) }?;
    info!(class = BRIDGE_CLASS, methods = methods.len(), "native methods registered");
    Ok(())
}

// =============================================================================
// Module Load
// =============================================================================

/// Install a fmt subscriber honoring `RUST_LOG`.
///
/// A cdylib loaded by the JVM has no `main` to do this; installation is
/// best-effort and quietly defers to a subscriber the host already set.
fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "openslide_jni=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Module entry point: bind libopenslide and register the method table.
///
/// Any failure here is fatal — the JVM sees `JNI_ERR` and the library never
/// becomes usable.
#[no_mangle]
pub extern "system" fn JNI_OnLoad(vm: JavaVM, _reserved: *mut c_void) -> jint {
    init_logging();

    if let Err(e) = OpenSlideLibrary::init() {
        error!("failed to bind OpenSlide: {e}");
        return JNI_ERR;
    }

    let mut env = match vm.get_env() {
        Ok(env) => env,
        Err(e) => {
            error!("no JNIEnv for the loading thread: {e}");
            return JNI_ERR;
        }
    };

    if let Err(e) = register_natives(&mut env) {
        error!("failed to register native methods: {e}");
        return JNI_ERR;
    }

    JNI_VERSION_1_4
}

#[cfg(test)]
mod tests {
    use super::*;

    // JNIString derefs down to CStr; compare through bytes.
    fn name_of(m: &NativeMethod) -> String {
        String::from_utf8_lossy(m.name.to_bytes()).into_owned()
    }

    fn sig_of_method(m: &NativeMethod) -> String {
        String::from_utf8_lossy(m.sig.to_bytes()).into_owned()
    }

    #[test]
    fn method_table_covers_every_operation_once() {
        let methods = native_methods();
        assert_eq!(methods.len(), 14);

        let mut names: Vec<String> = methods.iter().map(name_of).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 14, "duplicate registration name");
        assert!(names.iter().all(|n| n.starts_with("openslide_")));
    }

    #[test]
    fn method_table_signatures_are_well_formed() {
        for m in native_methods() {
            let sig = sig_of_method(&m);
            assert!(sig.starts_with('('), "bad signature: {sig}");
            assert!(sig.contains(')'), "bad signature: {sig}");
            assert!(!m.fn_ptr.is_null());
        }
    }

    #[test]
    fn pixel_read_signatures_match_the_host_declaration() {
        let methods = native_methods();
        let sig_of = |name: &str| {
            methods
                .iter()
                .find(|m| name_of(m) == name)
                .map(sig_of_method)
                .unwrap()
        };
        assert_eq!(sig_of("openslide_read_region"), "(J[IJJIJJ)V");
        assert_eq!(
            sig_of("openslide_read_associated_image"),
            "(JLjava/lang/String;[I)V"
        );
        assert_eq!(sig_of("openslide_get_version"), "()Ljava/lang/String;");
    }
}
