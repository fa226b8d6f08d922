use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use lworld_class_file::ClassFileError;
use thiserror::Error;

use crate::Result;

/// Failures surfaced to callers of the runtime.
///
/// Cloneable so a class that failed to initialize can hand the same failure to every later
/// caller.
#[derive(Error, Debug, Clone)]
pub enum VmError {
    #[error("java.lang.ClassFormatError: {0}")]
    ClassFormat(#[source] Arc<ClassFileError>),
    #[error("java.lang.NoClassDefFoundError: {0}")]
    NoClassDefFound(String),
    #[error("java.lang.NoSuchFieldError: {class}.{field}")]
    NoSuchField { class: String, field: String },
    #[error("java.lang.IncompatibleClassChangeError: {0}")]
    IncompatibleClassChange(String),
    #[error("java.lang.InstantiationError: {0}")]
    Instantiation(String),
    #[error("java.lang.InternalError: {0}")]
    Internal(String),
    #[error("java.lang.NullPointerException: {0}")]
    NullPointer(String),
    #[error("java.lang.ExceptionInInitializerError: initializer of {class} failed")]
    ExceptionInInitializer {
        class: String,
        #[source]
        cause: Arc<VmError>,
    },
    /// Any other exception raised by host-supplied code.
    #[error("{class}: {message}")]
    Exception { class: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ClassFormatError,
    NoClassDefFoundError,
    NoSuchFieldError,
    IncompatibleClassChangeError,
    InstantiationError,
    InternalError,
    NullPointerException,
    ExceptionInInitializerError,
    Exception,
}

impl ErrorKind {
    /// Whether the kind belongs to the `Error` category rather than the `Exception` one.
    pub fn is_error(&self) -> bool {
        !matches!(self, ErrorKind::NullPointerException | ErrorKind::Exception)
    }
}

impl VmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VmError::ClassFormat(_) => ErrorKind::ClassFormatError,
            VmError::NoClassDefFound(_) => ErrorKind::NoClassDefFoundError,
            VmError::NoSuchField { .. } => ErrorKind::NoSuchFieldError,
            VmError::IncompatibleClassChange(_) => ErrorKind::IncompatibleClassChangeError,
            VmError::Instantiation(_) => ErrorKind::InstantiationError,
            VmError::Internal(_) => ErrorKind::InternalError,
            VmError::NullPointer(_) => ErrorKind::NullPointerException,
            VmError::ExceptionInInitializer { .. } => ErrorKind::ExceptionInInitializerError,
            VmError::Exception { .. } => ErrorKind::Exception,
        }
    }

    /// The failure wrapped by an `ExceptionInInitializerError`.
    pub fn cause(&self) -> Option<&VmError> {
        match self {
            VmError::ExceptionInInitializer { cause, .. } => Some(cause),
            _ => None,
        }
    }

    pub fn exception(class: impl Into<String>, message: impl Into<String>) -> Self {
        VmError::Exception {
            class: class.into(),
            message: message.into(),
        }
    }
}

/// Runs host-supplied code, turning a panic into an `InternalError`.
pub(crate) fn catch_panic<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_owned());
        Err(VmError::Internal(format!("host code panicked: {}", message)))
    })
}

impl From<ClassFileError> for VmError {
    fn from(e: ClassFileError) -> Self {
        VmError::ClassFormat(Arc::new(e))
    }
}
