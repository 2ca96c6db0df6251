//! # OpenSlide JNI
//!
//! A JNI bridge exposing the [OpenSlide](https://openslide.org) whole-slide-image
//! library to the JVM.
//!
//! The crate builds a `cdylib` that the Java side loads with
//! `System.loadLibrary`. On load it binds libopenslide from the system search
//! path and registers one native method per OpenSlide operation against
//! `org.openslide.OpenSlideJNI`. Everything in between is marshaling: JVM
//! strings and arrays in, C strings and raw buffers out, sentinels forwarded
//! unchanged in both directions. All slide decoding, pyramid math, and error
//! reporting live in libopenslide itself.
//!
//! ## Architecture
//!
//! - [`library`] - runtime binding to libopenslide (dlopen + eager symbol
//!   resolution)
//! - [`handle`] - typed wrapper for the opaque slide handle the JVM threads
//!   through every call
//! - [`marshal`] - boundary conversions with RAII release on every exit path
//! - [`bridge`] - the JNI entry points, registration table, and `JNI_OnLoad`
//! - [`error`] - load-time and marshaling error types
//!
//! ## Threading
//!
//! The bridge adds no synchronization of its own. Each entry point runs
//! synchronously on the invoking JVM thread; concurrency guarantees for a
//! single slide handle are exactly those of libopenslide.

pub mod bridge;
pub mod error;
pub mod handle;
pub mod library;
pub mod marshal;

pub use bridge::{native_methods, register_natives, BRIDGE_CLASS};
pub use error::BridgeError;
pub use handle::SlideHandle;
pub use library::OpenSlideLibrary;
