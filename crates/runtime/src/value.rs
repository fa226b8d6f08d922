use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{
    enforce::{self, StoreKind},
    Class, Result, VmError,
};

pub type ObjectRef = Arc<Object>;

/// Contents of a field slot.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// A null-restricted slot that has not been written yet.
    #[default]
    Uninitialized,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
    Reference(ObjectRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_reference(&self) -> Option<&ObjectRef> {
        match self {
            Value::Reference(object) => Some(object),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Uninitialized, Value::Uninitialized) | (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Reference(a), Value::Reference(b)) => Arc::ptr_eq(a, b) || a.same_value(b),
            _ => false,
        }
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Reference(object)
    }
}

/// An instance of a loaded class.
pub struct Object {
    class: Arc<Class>,
    fields: Mutex<Vec<Value>>,
}

impl Object {
    pub(crate) fn new(class: Arc<Class>) -> Self {
        let fields = class.instance_fields().map(|f| f.default_value()).collect();
        Self {
            class,
            fields: Mutex::new(fields),
        }
    }

    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    pub fn get_field(&self, name: &str) -> Result<Value> {
        let field = self.class.instance_field(name)?;
        Ok(self.lock_fields()[field.slot()].clone())
    }

    /// `putfield`: stores into this object in place.
    ///
    /// Value objects have no identity to mutate, so they only accept [`Object::with_field`].
    pub fn put_field(&self, name: &str, value: Value) -> Result<()> {
        let field = self.class.instance_field(name)?;
        if self.class.is_value_type() {
            return Err(VmError::IncompatibleClassChange(format!(
                "putfield on field {}.{} of a value class",
                self.class.name(),
                name
            )));
        }
        enforce::check_store(&self.class, field, &value, StoreKind::PutField)?;

        self.lock_fields()[field.slot()] = value;
        Ok(())
    }

    /// `withfield`: returns a copy of this value object with one field replaced.
    pub fn with_field(&self, name: &str, value: Value) -> Result<ObjectRef> {
        let field = self.class.instance_field(name)?;
        if !self.class.is_value_type() {
            return Err(VmError::IncompatibleClassChange(format!(
                "withfield on field {}.{} of an identity class",
                self.class.name(),
                name
            )));
        }
        enforce::check_store(&self.class, field, &value, StoreKind::WithField)?;

        let mut fields = self.lock_fields().clone();
        fields[field.slot()] = value;
        Ok(Arc::new(Object {
            class: self.class.clone(),
            fields: Mutex::new(fields),
        }))
    }

    /// Value objects are the same when they are of the same class and hold the same values.
    fn same_value(&self, other: &Object) -> bool {
        if !self.class.is_value_type() || !Arc::ptr_eq(&self.class, &other.class) {
            return false;
        }
        let fields = self.lock_fields().clone();
        let other_fields = other.lock_fields().clone();
        fields == other_fields
    }

    fn lock_fields(&self) -> std::sync::MutexGuard<'_, Vec<Value>> {
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class.name())
            .finish_non_exhaustive()
    }
}
