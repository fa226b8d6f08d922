//! Load-time legality checks and run-time null-restriction enforcement for value classes.
//!
//! A [`ClassLoader`] pulls class definitions from a [`ClassSource`], validates them with
//! `lworld-class_file`, defines them and eagerly loads everything their `Preload` attribute
//! names. Field stores on the defined classes go through a single null-restriction check, and
//! static initializers run behind an initialization state machine that wraps their failures.

mod class;
mod enforce;
mod error;
mod init;
mod loader;
mod value;

pub use class::{Class, Field};
pub use enforce::StoreKind;
pub use error::{ErrorKind, VmError};
pub use init::{InitState, InitializationPolicy};
pub use loader::{
    ClassCode, ClassDefinition, ClassLoader, ClassLoaderBuilder, ClassSource, Constructor,
    InMemoryClassSource, StaticInitializer,
};
pub use value::{Object, ObjectRef, Value};

pub type Result<T, E = VmError> = std::result::Result<T, E>;
