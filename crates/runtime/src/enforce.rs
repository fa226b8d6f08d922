use std::fmt;

use crate::{Class, Field, Result, Value, VmError};

/// The instruction a store comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    PutField,
    PutStatic,
    WithField,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreKind::PutField => "putfield",
            StoreKind::PutStatic => "putstatic",
            StoreKind::WithField => "withfield",
        })
    }
}

/// Checked by every store before it is committed, so a rejected store leaves the slot as it was.
pub(crate) fn check_store(
    class: &Class,
    field: &Field,
    value: &Value,
    kind: StoreKind,
) -> Result<()> {
    match value {
        _ if value.is_null() && field.is_null_restricted() => {
            log::debug!(
                "{} of null into null-restricted field {}.{}",
                kind,
                class.name(),
                field.name()
            );
            Err(VmError::NullPointer(format!(
                "Cannot assign null to null-restricted field {}.{}",
                class.name(),
                field.name()
            )))
        }
        Value::Uninitialized => Err(VmError::Internal(format!(
            "{} of an uninitialized value into {}.{}",
            kind,
            class.name(),
            field.name()
        ))),
        _ => Ok(()),
    }
}
