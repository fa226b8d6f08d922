use std::{
    fmt,
    sync::{Arc, Condvar, Mutex, PoisonError, Weak},
};

use lworld_class_file::{AccessFlags, BaseType, ClassFile, FieldType, ImplicitCreationFlags};

use crate::{
    enforce::{self, StoreKind},
    ClassCode, ClassLoader, InitState, InitializationPolicy, Result, Value, VmError,
};

/// A field of a defined class.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    field_type: FieldType,
    access_flags: AccessFlags,
    null_restricted: bool,
    // Index into the instance or the static slots, depending on `is_static`.
    slot: usize,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn access_flags(&self) -> AccessFlags {
        self.access_flags
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.is_static()
    }

    pub fn is_null_restricted(&self) -> bool {
        self.null_restricted
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    pub(crate) fn default_value(&self) -> Value {
        match &self.field_type {
            _ if self.null_restricted => Value::Uninitialized,
            field_type if field_type.is_reference() => Value::Null,
            FieldType::Base(BaseType::Long) => Value::Long(0),
            FieldType::Base(BaseType::Float) => Value::Float(0.0),
            FieldType::Base(BaseType::Double) => Value::Double(0.0),
            _ => Value::Int(0),
        }
    }
}

/// A class defined by a [`ClassLoader`].
pub struct Class {
    name: String,
    super_name: Option<String>,
    access_flags: AccessFlags,
    implicit_creation: Option<ImplicitCreationFlags>,
    preload: Vec<String>,
    fields: Vec<Field>,
    code: ClassCode,
    loader: Weak<ClassLoader>,
    pub(crate) policy: Arc<InitializationPolicy>,
    statics: Mutex<Vec<Value>>,
    pub(crate) init_state: Mutex<InitState>,
    pub(crate) init_done: Condvar,
}

impl Class {
    /// Builds the runtime view of an already validated class file.
    pub(crate) fn define(
        class_file: &ClassFile,
        code: ClassCode,
        loader: Weak<ClassLoader>,
        policy: Arc<InitializationPolicy>,
    ) -> Result<Self> {
        let mut instance_slots = 0;
        let mut static_slots = 0;
        let fields = class_file
            .fields
            .iter()
            .map(|f| {
                let counter = if f.is_static() {
                    &mut static_slots
                } else {
                    &mut instance_slots
                };
                let slot = *counter;
                *counter += 1;

                Field {
                    name: f.name.clone(),
                    field_type: f.field_type.clone(),
                    access_flags: f.access_flags,
                    null_restricted: f.is_null_restricted(),
                    slot,
                }
            })
            .collect::<Vec<_>>();

        let statics = fields
            .iter()
            .filter(|f| f.is_static())
            .map(Field::default_value)
            .collect();

        Ok(Self {
            name: class_file.class_name()?.to_owned(),
            super_name: class_file.super_class()?.map(str::to_owned),
            access_flags: class_file.access_flags,
            implicit_creation: class_file.implicit_creation(),
            preload: class_file.preload_classes().to_vec(),
            fields,
            code,
            loader,
            policy,
            statics: Mutex::new(statics),
            init_state: Mutex::new(InitState::NotInitialized),
            init_done: Condvar::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn super_class_name(&self) -> Option<&str> {
        self.super_name.as_deref()
    }

    pub fn access_flags(&self) -> AccessFlags {
        self.access_flags
    }

    pub fn is_value_type(&self) -> bool {
        self.access_flags.is_value_type()
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.is_abstract()
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(AccessFlags::INTERFACE)
    }

    pub fn implicit_creation(&self) -> Option<ImplicitCreationFlags> {
        self.implicit_creation
    }

    /// Classes this class's `Preload` attribute names, in declaration order.
    pub fn preload_classes(&self) -> &[String] {
        &self.preload
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn instance_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.is_static())
    }

    /// The loader that defined this class, as long as it is still alive.
    pub fn defining_loader(&self) -> Option<Arc<ClassLoader>> {
        self.loader.upgrade()
    }

    pub(crate) fn code(&self) -> &ClassCode {
        &self.code
    }

    pub(crate) fn instance_field(&self, name: &str) -> Result<&Field> {
        match self.field(name) {
            Some(field) if !field.is_static() => Ok(field),
            Some(_) => Err(VmError::IncompatibleClassChange(format!(
                "Expected non-static field {}.{}",
                self.name, name
            ))),
            None => Err(self.no_such_field(name)),
        }
    }

    fn static_field(&self, name: &str) -> Result<&Field> {
        match self.field(name) {
            Some(field) if field.is_static() => Ok(field),
            Some(_) => Err(VmError::IncompatibleClassChange(format!(
                "Expected static field {}.{}",
                self.name, name
            ))),
            None => Err(self.no_such_field(name)),
        }
    }

    /// `getstatic`: initializes the class first.
    pub fn get_static(self: &Arc<Self>, name: &str) -> Result<Value> {
        let field = self.static_field(name)?;
        self.initialize()?;

        Ok(self.lock_statics()[field.slot].clone())
    }

    /// `putstatic`: initializes the class first, then stores unless the store would put null
    /// into a null-restricted field.
    pub fn put_static(self: &Arc<Self>, name: &str, value: Value) -> Result<()> {
        let field = self.static_field(name)?;
        self.initialize()?;
        enforce::check_store(self, field, &value, StoreKind::PutStatic)?;

        self.lock_statics()[field.slot] = value;
        Ok(())
    }

    fn lock_statics(&self) -> std::sync::MutexGuard<'_, Vec<Value>> {
        self.statics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn no_such_field(&self, name: &str) -> VmError {
        VmError::NoSuchField {
            class: self.name.clone(),
            field: name.to_owned(),
        }
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("access_flags", &self.access_flags)
            .field("preload", &self.preload)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}
