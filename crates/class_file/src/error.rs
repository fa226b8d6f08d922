use thiserror::Error;

use crate::constant_pool;

#[derive(Error, Debug)]
pub enum ClassFileError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error("Expected {0}, found {1:?}")]
    UnexpectedConstantPoolEntry(&'static str, constant_pool::CpInfo),
    #[error("Invalid constant pool index: {0}")]
    InvalidConstantPoolIndex(u16),
    #[error("Invalid cp info tag: {0}")]
    InvalidCpInfoTag(u8),
    #[error("Invalid magic identifier: 0x{0:X}")]
    InvalidMagicIdentifier(u32),
    #[error("Malformed {name} attribute: {reason}")]
    MalformedAttribute { name: String, reason: String },
    #[error("Invalid field descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Multiple Preload attributes in class {0}")]
    MultiplePreloadAttributes(String),
    #[error("Multiple ImplicitCreation attributes in class {0}")]
    MultipleImplicitCreationAttributes(String),
    #[error("The ImplicitCreation attribute is only allowed in a non-abstract value class: {0}")]
    ImplicitCreationNotAllowed(String),
    #[error("Multiple NullRestricted attributes present on field {field} of class {class}")]
    MultipleNullRestrictedAttributes { class: String, field: String },
    #[error("A field with a primitive type cannot have a NullRestricted attribute: {class}.{field}")]
    NullRestrictedPrimitiveField { class: String, field: String },
    #[error("A field with an array type cannot have a NullRestricted attribute: {class}.{field}")]
    NullRestrictedArrayField { class: String, field: String },
}

impl ClassFileError {
    /// Structural errors come from a malformed byte stream, plus a repeated `Preload`
    /// attribute, which is caught when the parsed class is handed to validation. The rest are
    /// legality violations found after a successful parse.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            ClassFileError::MultipleImplicitCreationAttributes(_)
                | ClassFileError::ImplicitCreationNotAllowed(_)
                | ClassFileError::MultipleNullRestrictedAttributes { .. }
                | ClassFileError::NullRestrictedPrimitiveField { .. }
                | ClassFileError::NullRestrictedArrayField { .. }
        )
    }

    pub(crate) fn malformed(name: &str, reason: impl Into<String>) -> Self {
        ClassFileError::MalformedAttribute {
            name: name.to_owned(),
            reason: reason.into(),
        }
    }
}
