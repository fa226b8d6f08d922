use std::fmt;

use crate::ImplicitCreationFlags;

pub const PRELOAD: &str = "Preload";
pub const IMPLICIT_CREATION: &str = "ImplicitCreation";
pub const NULL_RESTRICTED: &str = "NullRestricted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Preload,
    ImplicitCreation,
    NullRestricted,
    Other,
}

/// An attribute record, decoded by name.
///
/// Only the attributes value classes care about are decoded; everything else is kept as an
/// opaque payload so it survives untouched.
#[derive(Clone, PartialEq)]
pub enum Attribute {
    /// Classes to load eagerly, in declaration order.
    Preload(Vec<String>),
    ImplicitCreation(ImplicitCreationFlags),
    NullRestricted,
    Other {
        attribute_name_index: u16,
        name: String,
        info: Vec<u8>,
    },
}
impl Attribute {
    pub fn kind(&self) -> AttributeKind {
        match self {
            Attribute::Preload(_) => AttributeKind::Preload,
            Attribute::ImplicitCreation(_) => AttributeKind::ImplicitCreation,
            Attribute::NullRestricted => AttributeKind::NullRestricted,
            Attribute::Other { .. } => AttributeKind::Other,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Attribute::Preload(_) => PRELOAD,
            Attribute::ImplicitCreation(_) => IMPLICIT_CREATION,
            Attribute::NullRestricted => NULL_RESTRICTED,
            Attribute::Other { name, .. } => name,
        }
    }
}
impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Preload(classes) => f.debug_tuple("Preload").field(classes).finish(),
            Attribute::ImplicitCreation(flags) => {
                f.debug_tuple("ImplicitCreation").field(flags).finish()
            }
            Attribute::NullRestricted => f.write_str("NullRestricted"),
            Attribute::Other {
                attribute_name_index,
                name,
                info,
            } => f
                .debug_struct("Other")
                .field("attribute_name_index", attribute_name_index)
                .field("name", name)
                .field("info", &format!("({} bytes)", info.len()))
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(pub Vec<Attribute>);
impl Attributes {
    pub fn find_by_name(&self, name: &str) -> Option<&Attribute> {
        self.0.iter().find(|a| a.name() == name)
    }

    pub fn count(&self, kind: AttributeKind) -> usize {
        self.0.iter().filter(|a| a.kind() == kind).count()
    }

    pub fn preload(&self) -> Option<&[String]> {
        self.0.iter().find_map(|a| match a {
            Attribute::Preload(classes) => Some(classes.as_slice()),
            _ => None,
        })
    }

    pub fn implicit_creation(&self) -> Option<ImplicitCreationFlags> {
        self.0.iter().find_map(|a| match a {
            Attribute::ImplicitCreation(flags) => Some(*flags),
            _ => None,
        })
    }

    pub fn is_null_restricted(&self) -> bool {
        self.count(AttributeKind::NullRestricted) > 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
