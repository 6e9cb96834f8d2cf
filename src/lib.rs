//! HQM bridge - C-callable bindings from native games to the HQ SDK
//!
//! The game calls plain C functions (`hqm_init`, `hqm_log`,
//! `hqm_get_user_groups`, ...); the bridge forwards each call over JNI to the
//! managed `HQSdk` class and converts the results back to native values.
//!
//! ## Layers
//!
//! - **ffi**: the `hqm_*` C ABI, last-error reporting and caller-freed memory
//! - **bridge**: typed Rust API over any [`HqSdk`] backend
//! - **jvm**: the JNI backend, with every managed lookup resolved once at attach
//! - **config**: the managed contract (class, method and field names) per SDK flavor

pub mod bridge;
pub mod config;
pub mod error;
pub mod jvm;
pub mod logging;
pub mod sdk;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use bridge::Bridge;
pub use config::{BridgeConfig, SdkContract, SdkFlavor};
pub use error::BridgeError;
pub use jvm::{HostContext, JniSdk};
pub use sdk::HqSdk;
pub use types::{UserGroup, UserGroupList};

/// Bridge version reported by `hqm_version`
pub const HQM_VERSION: &str = env!("CARGO_PKG_VERSION");
