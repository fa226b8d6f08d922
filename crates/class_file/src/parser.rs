use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};

use crate::{
    attributes::{self, Attribute, Attributes},
    class_file::{FieldInfo, MethodInfo},
    constant_pool::{self, CpInfo},
    AccessFlags, ClassFile, ClassFileError, ConstantPool, FieldType, ImplicitCreationFlags,
    Result,
};

type Endian = BigEndian;

pub struct Parser<'a> {
    r: Cursor<&'a [u8]>,
}
impl<'a> Parser<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            r: Cursor::new(buf),
        }
    }

    pub fn parse(&mut self) -> Result<ClassFile> {
        self.parse_magic_identifier()?;
        let version = self.parse_version()?;

        let constant_pool = self.parse_constant_pool()?;
        let access_flags = AccessFlags::from_bits_truncate(self.read_u16()?);
        let this_class = self.read_u16()?;
        let super_class = self.read_u16()?;
        let interfaces_count = self.read_u16()?;

        let mut interfaces = vec![0u16; interfaces_count as usize];
        self.r.read_u16_into::<Endian>(&mut interfaces)?;

        let fields_count = self.read_u16()?;
        let fields = (0..fields_count)
            .map(|_| self.parse_field_info(&constant_pool))
            .collect::<Result<Vec<_>>>()?;

        let methods_count = self.read_u16()?;
        let methods = (0..methods_count)
            .map(|_| self.parse_method_info(&constant_pool))
            .collect::<Result<Vec<_>>>()?;

        let attributes = self.parse_attributes(&constant_pool)?;

        Ok(ClassFile {
            version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    fn parse_field_info(&mut self, constant_pool: &ConstantPool) -> Result<FieldInfo> {
        let access_flags = AccessFlags::from_bits_truncate(self.read_u16()?);
        let name_index = self.read_u16()?;
        let descriptor_index = self.read_u16()?;
        let name = constant_pool.utf8(name_index)?.to_owned();
        let field_type = FieldType::parse(constant_pool.utf8(descriptor_index)?)?;
        let attributes = self.parse_attributes(constant_pool)?;

        Ok(FieldInfo {
            access_flags,
            name_index,
            descriptor_index,
            name,
            field_type,
            attributes,
        })
    }

    fn parse_method_info(&mut self, constant_pool: &ConstantPool) -> Result<MethodInfo> {
        let access_flags = AccessFlags::from_bits_truncate(self.read_u16()?);
        let name_index = self.read_u16()?;
        let descriptor_index = self.read_u16()?;
        let attributes = self.parse_attributes(constant_pool)?;

        Ok(MethodInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    fn parse_magic_identifier(&mut self) -> Result<()> {
        match self.read_u32()? {
            0xCAFEBABE => Ok(()),
            magic_identifier => Err(ClassFileError::InvalidMagicIdentifier(magic_identifier)),
        }
    }

    fn parse_version(&mut self) -> Result<(u16, u16)> {
        let minor = self.read_u16()?;
        let major = self.read_u16()?;
        Ok((major, minor))
    }

    fn parse_constant_pool(&mut self) -> Result<ConstantPool> {
        let constant_pool_count = self.read_u16()?;

        let mut count = (constant_pool_count as usize).saturating_sub(1);
        let mut res = Vec::with_capacity(count);
        while count > 0 {
            let (cp_info, slot_size) = self.parse_cp_info()?;
            res.push(cp_info);
            (0..slot_size - 1).for_each(|_| res.push(CpInfo::Unusable));

            // A Long or Double in the last slot claims one slot more than the pool has.
            count = count
                .checked_sub(slot_size)
                .ok_or(ClassFileError::InvalidConstantPoolIndex(constant_pool_count))?;
        }
        Ok(ConstantPool::new(res))
    }

    fn parse_cp_info(&mut self) -> Result<(CpInfo, usize)> {
        let tag = self.read_u8()?;
        let (cp_info, slot_size) = match tag {
            1 => (self.parse_utf8()?, 1),
            3 => (CpInfo::Integer(self.read_i32()?), 1),
            4 => (CpInfo::Float(f32::from_bits(self.read_u32()?)), 1),
            5 => (CpInfo::Long(self.read_i64()?), 2),
            6 => (CpInfo::Double(f64::from_bits(self.read_u64()?)), 2),
            7 => (self.parse_class_info()?, 1),
            8 => (self.parse_string()?, 1),
            9 => (CpInfo::FieldRef(self.parse_ref_info()?), 1),
            10 => (CpInfo::MethodRef(self.parse_ref_info()?), 1),
            11 => (CpInfo::InterfaceMethodRef(self.parse_ref_info()?), 1),
            12 => (self.parse_name_and_type_info()?, 1),
            15 => (self.parse_method_handle()?, 1),
            16 => (self.parse_method_type_info()?, 1),
            17 => (CpInfo::Dynamic(self.parse_invoke_dynamic_info()?), 1),
            18 => (CpInfo::InvokeDynamic(self.parse_invoke_dynamic_info()?), 1),
            19 => (
                CpInfo::Module {
                    name_index: self.read_u16()?,
                },
                1,
            ),
            20 => (
                CpInfo::Package {
                    name_index: self.read_u16()?,
                },
                1,
            ),
            _ => return Err(ClassFileError::InvalidCpInfoTag(tag)),
        };

        Ok((cp_info, slot_size))
    }

    fn parse_utf8(&mut self) -> Result<CpInfo> {
        let length = self.read_u16()?;
        let mut bytes = vec![0u8; length as usize];
        self.r.read_exact(&mut bytes)?;

        Ok(CpInfo::Utf8(String::from_utf8_lossy(&bytes).into()))
    }

    fn parse_class_info(&mut self) -> Result<CpInfo> {
        let name_index = self.read_u16()?;

        Ok(CpInfo::Class(constant_pool::ClassInfo { name_index }))
    }

    fn parse_string(&mut self) -> Result<CpInfo> {
        let string_index = self.read_u16()?;

        Ok(CpInfo::String { string_index })
    }

    fn parse_name_and_type_info(&mut self) -> Result<CpInfo> {
        let name_index = self.read_u16()?;
        let descriptor_index = self.read_u16()?;

        Ok(CpInfo::NameAndType(constant_pool::NameAndTypeInfo {
            name_index,
            descriptor_index,
        }))
    }

    fn parse_method_handle(&mut self) -> Result<CpInfo> {
        let reference_kind = self.read_u8()?;
        let reference_index = self.read_u16()?;

        Ok(CpInfo::MethodHandle(constant_pool::MethodHandleInfo {
            reference_kind,
            reference_index,
        }))
    }

    fn parse_method_type_info(&mut self) -> Result<CpInfo> {
        let descriptor_index = self.read_u16()?;

        Ok(CpInfo::MethodType(constant_pool::MethodTypeInfo {
            descriptor_index,
        }))
    }

    fn parse_invoke_dynamic_info(&mut self) -> Result<constant_pool::InvokeDynamicInfo> {
        let bootstrap_method_attr_index = self.read_u16()?;
        let name_and_type_index = self.read_u16()?;

        Ok(constant_pool::InvokeDynamicInfo {
            bootstrap_method_attr_index,
            name_and_type_index,
        })
    }

    fn parse_ref_info(&mut self) -> Result<constant_pool::RefInfo> {
        let class_index = self.read_u16()?;
        let name_and_type_index = self.read_u16()?;

        Ok(constant_pool::RefInfo {
            class_index,
            name_and_type_index,
        })
    }

    /// Reads an attribute count followed by that many attribute records.
    pub fn parse_attributes(&mut self, constant_pool: &ConstantPool) -> Result<Attributes> {
        let attributes_count = self.read_u16()?;
        (0..attributes_count)
            .map(|_| self.parse_attribute(constant_pool))
            .collect::<Result<Vec<_>>>()
            .map(Attributes)
    }

    fn parse_attribute(&mut self, constant_pool: &ConstantPool) -> Result<Attribute> {
        let attribute_name_index = self.read_u16()?;
        let attribute_length = self.read_u32()?;
        let name = constant_pool.utf8(attribute_name_index)?;

        let remaining = self.remaining();
        if attribute_length as u64 > remaining {
            return Err(ClassFileError::malformed(
                name,
                format!(
                    "declared length {} overruns the remaining {} bytes",
                    attribute_length, remaining
                ),
            ));
        }

        let mut info = vec![0u8; attribute_length as usize];
        self.r.read_exact(&mut info)?;
        log::trace!("Attribute {} ({} bytes)", name, attribute_length);

        match name {
            attributes::PRELOAD => Self::parse_payload(name, &info, |p| {
                p.parse_preload_attribute(constant_pool)
            }),
            attributes::IMPLICIT_CREATION => Self::parse_payload(name, &info, |p| {
                Ok(Attribute::ImplicitCreation(
                    ImplicitCreationFlags::from_bits_truncate(p.read_u16()?),
                ))
            }),
            attributes::NULL_RESTRICTED => {
                Self::parse_payload(name, &info, |_| Ok(Attribute::NullRestricted))
            }
            _ => Ok(Attribute::Other {
                attribute_name_index,
                name: name.to_owned(),
                info,
            }),
        }
    }

    fn parse_preload_attribute(&mut self, constant_pool: &ConstantPool) -> Result<Attribute> {
        let number_of_classes = self.read_u16()?;
        let classes = (0..number_of_classes)
            .map(|_| -> Result<String> {
                let class_index = self.read_u16()?;
                Ok(constant_pool.class_name(class_index)?.to_owned())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Attribute::Preload(classes))
    }

    /// Decodes a known attribute's payload, which has to fill its declared length exactly.
    fn parse_payload(
        name: &str,
        info: &[u8],
        f: impl FnOnce(&mut Parser<'_>) -> Result<Attribute>,
    ) -> Result<Attribute> {
        let mut parser = Parser::new(info);
        let attribute = f(&mut parser).map_err(|e| match e {
            ClassFileError::IOError(_) => ClassFileError::malformed(name, "truncated payload"),
            e => e,
        })?;

        match parser.remaining() {
            0 => Ok(attribute),
            trailing => Err(ClassFileError::malformed(
                name,
                format!("{} unexpected trailing bytes", trailing),
            )),
        }
    }

    fn remaining(&self) -> u64 {
        (self.r.get_ref().len() as u64).saturating_sub(self.r.position())
    }

    fn read_u64(&mut self) -> Result<u64> {
        Ok(self.r.read_u64::<Endian>()?)
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(self.r.read_i64::<Endian>()?)
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(self.r.read_u32::<Endian>()?)
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(self.r.read_u16::<Endian>()?)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.r.read_u8()?)
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.r.read_i32::<Endian>()?)
    }
}
