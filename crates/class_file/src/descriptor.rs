use std::{fmt, iter::Peekable, str::Chars};

use crate::{ClassFileError, Result};

/// Primitive field types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'B' => BaseType::Byte,
            'C' => BaseType::Char,
            'D' => BaseType::Double,
            'F' => BaseType::Float,
            'I' => BaseType::Int,
            'J' => BaseType::Long,
            'S' => BaseType::Short,
            'Z' => BaseType::Boolean,
            _ => return None,
        })
    }

    fn as_char(&self) -> char {
        match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        }
    }
}

/// Parsed field descriptor.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se19/html/jvms-4.html#jvms-4.3.2
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType {
    Base(BaseType),
    /// Binary class name in internal form, without the `L` and `;` delimiters
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut chars = descriptor.chars().peekable();
        let field_type = Self::parse_from(&mut chars)
            .ok_or_else(|| ClassFileError::InvalidDescriptor(descriptor.to_owned()))?;

        match chars.next() {
            None => Ok(field_type),
            Some(_) => Err(ClassFileError::InvalidDescriptor(descriptor.to_owned())),
        }
    }

    fn parse_from(source: &mut Peekable<Chars>) -> Option<Self> {
        match source.next()? {
            'L' => {
                let mut class_name = String::new();
                loop {
                    match source.next()? {
                        ';' if class_name.is_empty() => return None,
                        ';' => return Some(FieldType::Object(class_name)),
                        c => class_name.push(c),
                    }
                }
            }
            '[' => Some(FieldType::Array(Box::new(Self::parse_from(source)?))),
            c => BaseType::from_char(c).map(FieldType::Base),
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, FieldType::Base(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::Array(_))
    }

    pub fn is_reference(&self) -> bool {
        !self.is_primitive()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Base(base_type) => write!(f, "{}", base_type.as_char()),
            FieldType::Object(class_name) => write!(f, "L{};", class_name),
            FieldType::Array(element_type) => write!(f, "[{}", element_type),
        }
    }
}
