//! Error types for the HQM bridge

use thiserror::Error;

/// Errors that can occur while binding to or calling into the managed SDK
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Bridge is not attached to a Java VM")]
    NotAttached,

    #[error("Managed class not found: {0}")]
    ClassNotFound(String),

    #[error("Managed method not found: {class}.{name}{signature}")]
    MethodNotFound {
        class: String,
        name: String,
        signature: String,
    },

    #[error("Managed field not found: {class}.{name} ({signature})")]
    FieldNotFound {
        class: String,
        name: String,
        signature: String,
    },

    #[error("Operation not provided by this SDK flavor: {0}")]
    Unsupported(&'static str),

    #[error("Managed exception thrown during {0}")]
    ManagedException(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JNI error: {0}")]
    Jni(#[from] jni::errors::Error),
}
