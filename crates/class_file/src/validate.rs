use crate::{attributes::AttributeKind, ClassFile, ClassFileError, Result};

impl ClassFile {
    /// Enforces the placement and cardinality rules of the value class attributes.
    ///
    /// Class attributes are checked first, then each field in declaration order; the first
    /// violation found is reported.
    pub fn validate(&self) -> Result<()> {
        let class_name = self.class_name()?;

        if self.attributes.count(AttributeKind::Preload) > 1 {
            return Err(ClassFileError::MultiplePreloadAttributes(
                class_name.to_owned(),
            ));
        }

        match self.attributes.count(AttributeKind::ImplicitCreation) {
            0 => {}
            1 if self.is_value_type() && !self.is_abstract() => {}
            1 => {
                return Err(ClassFileError::ImplicitCreationNotAllowed(
                    class_name.to_owned(),
                ))
            }
            _ => {
                return Err(ClassFileError::MultipleImplicitCreationAttributes(
                    class_name.to_owned(),
                ))
            }
        }

        for field in &self.fields {
            let null_restricted = field.attributes.count(AttributeKind::NullRestricted);
            if null_restricted == 0 {
                continue;
            }

            let class = class_name.to_owned();
            let field_name = field.name.clone();
            if null_restricted > 1 {
                return Err(ClassFileError::MultipleNullRestrictedAttributes {
                    class,
                    field: field_name,
                });
            }
            if field.field_type.is_primitive() {
                return Err(ClassFileError::NullRestrictedPrimitiveField {
                    class,
                    field: field_name,
                });
            }
            if field.field_type.is_array() {
                return Err(ClassFileError::NullRestrictedArrayField {
                    class,
                    field: field_name,
                });
            }
        }

        log::trace!("Validated class {}", class_name);
        Ok(())
    }
}
