// https://docs.oracle.com/javase/specs/jvms/se19/html/jvms-4.html
// https://cr.openjdk.org/~dlsmith/jep401/jep401-20230519/specs/value-objects-jvms.html

mod access_flags;
pub mod attributes;
mod class_file;
#[macro_use]
mod constant_pool;
mod descriptor;
mod error;
mod parser;
mod validate;

pub use self::class_file::{ClassFile, FieldInfo, MethodInfo};
pub use access_flags::{AccessFlags, ImplicitCreationFlags};
pub use attributes::{Attribute, Attributes};
pub use constant_pool::{ConstantPool, CpInfo};
pub use descriptor::{BaseType, FieldType};
pub use error::ClassFileError;
pub use parser::Parser;

pub type Result<T, E = ClassFileError> = std::result::Result<T, E>;
