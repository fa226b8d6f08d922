//! Ready-made fixtures for the value class attribute rules.

use crate::{flags::*, AttributeSpec, ClassFileBuilder, FieldSpec};

pub fn class_with_preload_attribute(name: &str, classes: &[&str]) -> Vec<u8> {
    ClassFileBuilder::new(name)
        .attribute(AttributeSpec::preload(classes.iter().copied()))
        .build()
}

pub fn class_with_two_preload_attributes(name: &str, first: &[&str], second: &[&str]) -> Vec<u8> {
    ClassFileBuilder::new(name)
        .attribute(AttributeSpec::preload(first.iter().copied()))
        .attribute(AttributeSpec::preload(second.iter().copied()))
        .build()
}

pub fn class_with_two_implicit_creation_attributes(name: &str) -> Vec<u8> {
    ClassFileBuilder::value_class(name)
        .attribute(AttributeSpec::ImplicitCreation(ACC_DEFAULT))
        .attribute(AttributeSpec::ImplicitCreation(ACC_DEFAULT))
        .build()
}

pub fn non_value_class_with_implicit_creation_attribute(name: &str) -> Vec<u8> {
    ClassFileBuilder::new(name)
        .attribute(AttributeSpec::ImplicitCreation(ACC_DEFAULT))
        .build()
}

pub fn abstract_value_class_with_implicit_creation_attribute(name: &str) -> Vec<u8> {
    ClassFileBuilder::new(name)
        .access_flags(ACC_PUBLIC | ACC_ABSTRACT | ACC_VALUE)
        .attribute(AttributeSpec::ImplicitCreation(ACC_DEFAULT))
        .build()
}

pub fn valid_class_with_implicit_creation_attribute(name: &str) -> Vec<u8> {
    ClassFileBuilder::value_class(name)
        .attribute(AttributeSpec::ImplicitCreation(ACC_DEFAULT | ACC_NON_ATOMIC))
        .build()
}

pub fn field_with_multiple_null_restricted_attributes(name: &str, field_class: &str) -> Vec<u8> {
    ClassFileBuilder::new(name)
        .field(
            FieldSpec::new(ACC_PRIVATE, "field", format!("L{};", field_class))
                .null_restricted()
                .null_restricted(),
        )
        .build()
}

pub fn null_restricted_attribute_in_primitive_field(name: &str) -> Vec<u8> {
    ClassFileBuilder::new(name)
        .field(FieldSpec::new(ACC_PRIVATE, "field", "I").null_restricted())
        .build()
}

pub fn null_restricted_attribute_in_array_field(name: &str, element_class: &str) -> Vec<u8> {
    ClassFileBuilder::new(name)
        .field(
            FieldSpec::new(ACC_PRIVATE, "field", format!("[L{};", element_class))
                .null_restricted(),
        )
        .build()
}

/// An empty, loadable value class.
pub fn value_class(name: &str) -> Vec<u8> {
    ClassFileBuilder::value_class(name).build()
}

/// An identity class with one null-restricted instance field named `field` of type `field_class`.
pub fn class_with_null_restricted_field(name: &str, field_class: &str) -> Vec<u8> {
    ClassFileBuilder::new(name)
        .field(
            FieldSpec::new(ACC_PUBLIC, "field", format!("L{};", field_class)).null_restricted(),
        )
        .build()
}

/// A class with one null-restricted static field named `field` of type `field_class`.
pub fn class_with_null_restricted_static_field(name: &str, field_class: &str) -> Vec<u8> {
    ClassFileBuilder::new(name)
        .field(
            FieldSpec::new(
                ACC_PUBLIC | ACC_STATIC | ACC_FINAL,
                "field",
                format!("L{};", field_class),
            )
            .null_restricted(),
        )
        .build()
}

/// A value class with one null-restricted field named `field` of type `field_class`.
pub fn value_class_with_null_restricted_field(name: &str, field_class: &str) -> Vec<u8> {
    ClassFileBuilder::value_class(name)
        .field(
            FieldSpec::new(ACC_FINAL, "field", format!("L{};", field_class)).null_restricted(),
        )
        .build()
}
