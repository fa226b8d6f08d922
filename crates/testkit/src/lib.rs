//! Class file generator for tests.
//!
//! Builds the raw bytes of small class files so tests can describe a fixture in a few lines
//! instead of checking in compiled classes.

pub mod fixtures;

use std::{
    collections::HashMap,
    io::{Result, Write},
};

use byteorder::{BigEndian, WriteBytesExt};

pub mod flags {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    pub const ACC_SUPER: u16 = 0x0020;
    pub const ACC_VALUE: u16 = 0x0040;
    pub const ACC_INTERFACE: u16 = 0x0200;
    pub const ACC_ABSTRACT: u16 = 0x0400;

    pub const ACC_DEFAULT: u16 = 0x0001;
    pub const ACC_NON_ATOMIC: u16 = 0x0002;
}

const MAGIC: u32 = 0xCAFEBABE;
const MAJOR_VERSION: u16 = 65;
const MINOR_VERSION: u16 = 0xFFFF;

#[derive(Debug, Clone)]
pub enum AttributeSpec {
    Preload(Vec<String>),
    ImplicitCreation(u16),
    NullRestricted,
    /// Arbitrary payload under an arbitrary name.
    Raw { name: String, info: Vec<u8> },
    /// Writes `info` but declares `length`, for malformed input.
    Misdeclared {
        name: String,
        length: u32,
        info: Vec<u8>,
    },
}

impl AttributeSpec {
    pub fn preload<S: Into<String>>(classes: impl IntoIterator<Item = S>) -> Self {
        AttributeSpec::Preload(classes.into_iter().map(Into::into).collect())
    }

    fn name(&self) -> &str {
        match self {
            AttributeSpec::Preload(_) => "Preload",
            AttributeSpec::ImplicitCreation(_) => "ImplicitCreation",
            AttributeSpec::NullRestricted => "NullRestricted",
            AttributeSpec::Raw { name, .. } | AttributeSpec::Misdeclared { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    access_flags: u16,
    name: String,
    descriptor: String,
    attributes: Vec<AttributeSpec>,
}

impl FieldSpec {
    pub fn new(access_flags: u16, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            access_flags,
            name: name.into(),
            descriptor: descriptor.into(),
            attributes: Vec::new(),
        }
    }

    pub fn attribute(mut self, attribute: AttributeSpec) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn null_restricted(self) -> Self {
        self.attribute(AttributeSpec::NullRestricted)
    }
}

#[derive(Debug, Clone)]
struct MethodSpec {
    access_flags: u16,
    name: String,
    descriptor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Constant {
    Utf8(String),
    Class(u16),
}

/// Interns constants in insertion order, handing out 1-based indices.
#[derive(Default)]
struct ConstantsPool {
    constants: Vec<Constant>,
    indices: HashMap<Constant, u16>,
}

impl ConstantsPool {
    fn get(&mut self, constant: Constant) -> u16 {
        if let Some(&index) = self.indices.get(&constant) {
            return index;
        }
        self.constants.push(constant.clone());
        let index = self.constants.len() as u16;
        self.indices.insert(constant, index);
        index
    }

    fn get_utf8(&mut self, s: &str) -> u16 {
        self.get(Constant::Utf8(s.to_owned()))
    }

    fn get_class(&mut self, name: &str) -> u16 {
        let name_index = self.get_utf8(name);
        self.get(Constant::Class(name_index))
    }

    fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u16::<BigEndian>(self.constants.len() as u16 + 1)?;
        for constant in &self.constants {
            match constant {
                Constant::Utf8(s) => {
                    w.write_u8(1)?;
                    w.write_u16::<BigEndian>(s.len() as u16)?;
                    w.write_all(s.as_bytes())?;
                }
                Constant::Class(name_index) => {
                    w.write_u8(7)?;
                    w.write_u16::<BigEndian>(*name_index)?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    access_flags: u16,
    fields: Vec<FieldSpec>,
    methods: Vec<MethodSpec>,
    attributes: Vec<AttributeSpec>,
}

impl ClassFileBuilder {
    /// An identity class extending `java/lang/Object`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_name: Some("java/lang/Object".to_owned()),
            interfaces: Vec::new(),
            access_flags: flags::ACC_PUBLIC | flags::ACC_SUPER,
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// A final value class.
    pub fn value_class(name: impl Into<String>) -> Self {
        Self::new(name).access_flags(flags::ACC_PUBLIC | flags::ACC_FINAL | flags::ACC_VALUE)
    }

    pub fn access_flags(mut self, access_flags: u16) -> Self {
        self.access_flags = access_flags;
        self
    }

    pub fn super_class(mut self, super_name: Option<&str>) -> Self {
        self.super_name = super_name.map(str::to_owned);
        self
    }

    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(
        mut self,
        access_flags: u16,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        self.methods.push(MethodSpec {
            access_flags,
            name: name.into(),
            descriptor: descriptor.into(),
        });
        self
    }

    pub fn attribute(mut self, attribute: AttributeSpec) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)
            .expect("writing into a Vec<u8> does not fail");
        bytes
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        // The constant pool precedes everything that refers to it, so the body is encoded first.
        let mut constants = ConstantsPool::default();
        let mut body = Vec::new();

        body.write_u16::<BigEndian>(self.access_flags)?;
        let this_class = constants.get_class(&self.name);
        body.write_u16::<BigEndian>(this_class)?;
        let super_class = match &self.super_name {
            Some(super_name) => constants.get_class(super_name),
            None => 0,
        };
        body.write_u16::<BigEndian>(super_class)?;

        body.write_u16::<BigEndian>(self.interfaces.len() as u16)?;
        for interface in &self.interfaces {
            body.write_u16::<BigEndian>(constants.get_class(interface))?;
        }

        body.write_u16::<BigEndian>(self.fields.len() as u16)?;
        for field in &self.fields {
            body.write_u16::<BigEndian>(field.access_flags)?;
            body.write_u16::<BigEndian>(constants.get_utf8(&field.name))?;
            body.write_u16::<BigEndian>(constants.get_utf8(&field.descriptor))?;
            write_attributes(&mut body, &mut constants, &field.attributes)?;
        }

        body.write_u16::<BigEndian>(self.methods.len() as u16)?;
        for method in &self.methods {
            body.write_u16::<BigEndian>(method.access_flags)?;
            body.write_u16::<BigEndian>(constants.get_utf8(&method.name))?;
            body.write_u16::<BigEndian>(constants.get_utf8(&method.descriptor))?;
            body.write_u16::<BigEndian>(0)?;
        }

        write_attributes(&mut body, &mut constants, &self.attributes)?;

        w.write_u32::<BigEndian>(MAGIC)?;
        w.write_u16::<BigEndian>(MINOR_VERSION)?;
        w.write_u16::<BigEndian>(MAJOR_VERSION)?;
        constants.write_to(w)?;
        w.write_all(&body)
    }
}

fn write_attributes(
    w: &mut Vec<u8>,
    constants: &mut ConstantsPool,
    attributes: &[AttributeSpec],
) -> Result<()> {
    w.write_u16::<BigEndian>(attributes.len() as u16)?;
    for attribute in attributes {
        w.write_u16::<BigEndian>(constants.get_utf8(attribute.name()))?;

        let mut info = Vec::new();
        let declared_length = match attribute {
            AttributeSpec::Preload(classes) => {
                info.write_u16::<BigEndian>(classes.len() as u16)?;
                for class in classes {
                    info.write_u16::<BigEndian>(constants.get_class(class))?;
                }
                None
            }
            AttributeSpec::ImplicitCreation(implicit_creation_flags) => {
                info.write_u16::<BigEndian>(*implicit_creation_flags)?;
                None
            }
            AttributeSpec::NullRestricted => None,
            AttributeSpec::Raw { info: raw, .. } => {
                info.extend_from_slice(raw);
                None
            }
            AttributeSpec::Misdeclared {
                length, info: raw, ..
            } => {
                info.extend_from_slice(raw);
                Some(*length)
            }
        };

        w.write_u32::<BigEndian>(declared_length.unwrap_or(info.len() as u32))?;
        w.write_all(&info)?;
    }
    Ok(())
}
