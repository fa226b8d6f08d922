use bitflags::bitflags;

bitflags! {
    /// Access flags shared by classes, fields and methods.
    ///
    /// Several bits mean different things depending on the structure they appear on; the
    /// aliases below name the class-level meaning where it matters for value classes.
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const SYNCHRONIZED = 0x0020;
        const VOLATILE = 0x0040;
        const VALUE = 0x0040;
        const TRANSIENT = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

impl AccessFlags {
    /// Only meaningful on class access flags.
    pub fn is_value_type(&self) -> bool {
        self.contains(AccessFlags::VALUE) && !self.contains(AccessFlags::INTERFACE)
    }

    pub fn is_abstract(&self) -> bool {
        self.contains(AccessFlags::ABSTRACT)
    }

    pub fn is_static(&self) -> bool {
        self.contains(AccessFlags::STATIC)
    }
}

bitflags! {
    /// `implicit_creation_flags` of an `ImplicitCreation` attribute.
    pub struct ImplicitCreationFlags: u16 {
        const DEFAULT = 0x0001;
        const NON_ATOMIC = 0x0002;
    }
}
