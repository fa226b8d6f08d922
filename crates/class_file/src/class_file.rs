use crate::{
    attributes::Attributes, parser::Parser, AccessFlags, ConstantPool, FieldType,
    ImplicitCreationFlags, Result,
};

#[derive(Debug)]
pub struct ClassFile {
    pub version: (u16, u16),
    pub constant_pool: ConstantPool,
    pub access_flags: AccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Attributes,
}
impl ClassFile {
    /// Decodes the class file without checking attribute legality.
    pub fn parse(bytes: &[u8]) -> Result<ClassFile> {
        Parser::new(bytes).parse()
    }

    /// Decodes and validates the class file, which is what a loader needs before defining it.
    pub fn load(bytes: &[u8]) -> Result<ClassFile> {
        let class_file = Self::parse(bytes)?;
        class_file.validate()?;
        Ok(class_file)
    }

    pub fn super_class(&self) -> Result<Option<&str>> {
        // If the value of the super_class item is zero, then this class file must represent the
        // class Object, the only class or interface without a direct superclass.
        if self.super_class == 0 {
            return Ok(None);
        }

        self.constant_pool.class_name(self.super_class).map(Some)
    }

    pub fn class_name(&self) -> Result<&str> {
        self.constant_pool.class_name(self.this_class)
    }

    pub fn interface_names(&self) -> Result<Vec<&str>> {
        self.interfaces
            .iter()
            .map(|&index| self.constant_pool.class_name(index))
            .collect()
    }

    pub fn method_name(&self, method: &MethodInfo) -> Result<&str> {
        self.constant_pool.utf8(method.name_index)
    }

    pub fn method_descriptor(&self, method: &MethodInfo) -> Result<&str> {
        self.constant_pool.utf8(method.descriptor_index)
    }

    pub fn is_value_type(&self) -> bool {
        self.access_flags.is_value_type()
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.is_abstract()
    }

    /// Classes named by the Preload attribute, empty when there is none.
    pub fn preload_classes(&self) -> &[String] {
        self.attributes.preload().unwrap_or_default()
    }

    pub fn implicit_creation(&self) -> Option<ImplicitCreationFlags> {
        self.attributes.implicit_creation()
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug)]
pub struct FieldInfo {
    pub access_flags: AccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub name: String,
    pub field_type: FieldType,
    pub attributes: Attributes,
}
impl FieldInfo {
    pub fn is_static(&self) -> bool {
        self.access_flags.is_static()
    }

    pub fn is_null_restricted(&self) -> bool {
        self.attributes.is_null_restricted()
    }
}

#[derive(Debug)]
pub struct MethodInfo {
    pub access_flags: AccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Attributes,
}
