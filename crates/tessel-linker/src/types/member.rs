//! Parsed member definitions supplied by the loader

use crate::config::WordSize;
use crate::types::metadata::SymbolicMetadata;
use crate::types::modifiers::{MemberModifiers, TypeModifiers};
use std::fmt;
use std::sync::Arc;

/// Name of the constructor method
pub const CONSTRUCTOR_NAME: &str = "<init>";
/// Name of the static initializer method
pub const INITIALIZER_NAME: &str = "<clinit>";
/// Name of the entry point method
pub const MAIN_NAME: &str = "main";

/// Declared type of a field, parameter or return value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 1 byte
    Boolean,
    /// 1 byte
    Byte,
    /// 2 bytes
    Char,
    /// 2 bytes
    Short,
    /// 4 bytes
    Int,
    /// 4 bytes
    Float,
    /// 8 bytes
    Long,
    /// 8 bytes
    Double,
    /// Machine word that is not traced by the collector
    Address,
    /// Object reference to the named type
    Reference(Arc<str>),
}

impl FieldType {
    /// Reference to the named type
    pub fn reference(name: &str) -> Self {
        FieldType::Reference(Arc::from(name))
    }

    /// True for object references
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Reference(_))
    }

    /// Storage size in bytes
    pub fn size(&self, word: WordSize) -> usize {
        match self {
            FieldType::Boolean | FieldType::Byte => 1,
            FieldType::Char | FieldType::Short => 2,
            FieldType::Int | FieldType::Float => 4,
            FieldType::Long | FieldType::Double => 8,
            FieldType::Address | FieldType::Reference(_) => word.bytes(),
        }
    }

    /// log2 of the storage size
    pub fn log2_size(&self, word: WordSize) -> u8 {
        self.size(word).trailing_zeros() as u8
    }

    /// True for 8-byte primitives
    pub fn is_wide(&self) -> bool {
        matches!(self, FieldType::Long | FieldType::Double)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Boolean => write!(f, "Z"),
            FieldType::Byte => write!(f, "B"),
            FieldType::Char => write!(f, "C"),
            FieldType::Short => write!(f, "S"),
            FieldType::Int => write!(f, "I"),
            FieldType::Float => write!(f, "F"),
            FieldType::Long => write!(f, "J"),
            FieldType::Double => write!(f, "D"),
            FieldType::Address => write!(f, "A"),
            FieldType::Reference(name) => write!(f, "L{};", name),
        }
    }
}

/// Method signature: parameter types and optional return type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    /// Parameter types in order
    pub params: Vec<FieldType>,
    /// Return type (`None` for void)
    pub ret: Option<FieldType>,
}

impl Signature {
    /// Create a signature
    pub fn new(params: Vec<FieldType>, ret: Option<FieldType>) -> Self {
        Self { params, ret }
    }

    /// `()V`
    pub fn void() -> Self {
        Self::default()
    }

    /// Signature of the entry point: one string-array parameter, void
    pub fn main() -> Self {
        Self::new(vec![FieldType::reference("[String")], None)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for p in &self.params {
            write!(f, "{}", p)?;
        }
        write!(f, ")")?;
        match &self.ret {
            Some(ret) => write!(f, "{}", ret),
            None => write!(f, "V"),
        }
    }
}

/// Compile-time value of a static constant
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstantValue {
    /// int, short, char, byte or boolean constant
    Int(i32),
    /// long constant
    Long(i64),
    /// float constant
    Float(f32),
    /// double constant
    Double(f64),
}

impl ConstantValue {
    /// Raw bit pattern as stored in static storage
    pub fn bits(&self) -> u64 {
        match *self {
            ConstantValue::Int(v) => v as u32 as u64,
            ConstantValue::Long(v) => v as u64,
            ConstantValue::Float(v) => v.to_bits() as u64,
            ConstantValue::Double(v) => v.to_bits(),
        }
    }

    /// True if the value can initialize a field of type `ty`
    pub fn fits(&self, ty: &FieldType) -> bool {
        matches!(
            (self, ty),
            (
                ConstantValue::Int(_),
                FieldType::Boolean | FieldType::Byte | FieldType::Char | FieldType::Short | FieldType::Int
            ) | (ConstantValue::Long(_), FieldType::Long)
                | (ConstantValue::Float(_), FieldType::Float)
                | (ConstantValue::Double(_), FieldType::Double)
        )
    }
}

/// Executable body of a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodBody {
    /// Translated bytecode
    Bytecode(Arc<[u8]>),
    /// Native entry number
    Native(u32),
}

/// Entry in a type's constant pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEntry {
    /// String literal
    String(Arc<str>),
    /// Reference to a type by name
    Type(Arc<str>),
}

/// A parsed field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Field name
    pub name: Arc<str>,
    /// Declared type
    pub ty: FieldType,
    /// Modifiers
    pub modifiers: MemberModifiers,
    /// Constant value for static finals initialized at compile time
    pub constant: Option<ConstantValue>,
}

impl FieldDef {
    /// Create a field with no modifiers
    pub fn new(name: &str, ty: FieldType) -> Self {
        Self {
            name: Arc::from(name),
            ty,
            modifiers: MemberModifiers::empty(),
            constant: None,
        }
    }

    /// Set modifiers
    pub fn with_modifiers(mut self, modifiers: MemberModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Mark the field as a compile-time constant
    pub fn with_constant(mut self, value: ConstantValue) -> Self {
        self.modifiers |= MemberModifiers::FINAL;
        self.constant = Some(value);
        self
    }
}

/// A parsed method
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    /// Method name
    pub name: Arc<str>,
    /// Signature
    pub signature: Signature,
    /// Modifiers
    pub modifiers: MemberModifiers,
    /// Body, if already translated
    pub body: Option<MethodBody>,
}

impl MethodDef {
    /// Create a public method with no body
    pub fn new(name: &str, signature: Signature) -> Self {
        Self {
            name: Arc::from(name),
            signature,
            modifiers: MemberModifiers::PUBLIC,
            body: None,
        }
    }

    /// Set modifiers
    pub fn with_modifiers(mut self, modifiers: MemberModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Attach a body
    pub fn with_body(mut self, body: MethodBody) -> Self {
        self.body = Some(body);
        self
    }

    /// True for the no-argument constructor
    pub fn is_default_constructor(&self) -> bool {
        &*self.name == CONSTRUCTOR_NAME && self.signature == Signature::void()
    }

    /// True for the static initializer
    pub fn is_initializer(&self) -> bool {
        &*self.name == INITIALIZER_NAME
    }

    /// True for the public entry point
    pub fn is_main(&self) -> bool {
        &*self.name == MAIN_NAME
            && self.signature == Signature::main()
            && self.modifiers.contains(MemberModifiers::PUBLIC)
    }
}

/// Everything the loader knows about a type before completion
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    /// Canonical type name
    pub name: String,
    /// Supertype name (`None` for the root type and for interfaces)
    pub supertype: Option<String>,
    /// Directly implemented (or extended, for interfaces) interfaces
    pub interfaces: Vec<String>,
    /// Declared modifiers
    pub modifiers: TypeModifiers,
    /// Instance fields in declaration order
    pub instance_fields: Vec<FieldDef>,
    /// Static fields in declaration order
    pub static_fields: Vec<FieldDef>,
    /// Virtual methods in declaration order
    pub virtual_methods: Vec<MethodDef>,
    /// Static methods (constructors included) in declaration order
    pub static_methods: Vec<MethodDef>,
    /// Constant pool
    pub constant_pool: Vec<PoolEntry>,
    /// Symbol decoder; derived from the members above when absent
    pub metadata: Option<Arc<dyn SymbolicMetadata>>,
}

impl TypeDefinition {
    /// A public class with no supertype yet
    pub fn class(name: &str) -> Self {
        Self {
            name: name.to_string(),
            supertype: None,
            interfaces: Vec::new(),
            modifiers: TypeModifiers::PUBLIC,
            instance_fields: Vec::new(),
            static_fields: Vec::new(),
            virtual_methods: Vec::new(),
            static_methods: Vec::new(),
            constant_pool: Vec::new(),
            metadata: None,
        }
    }

    /// A public interface
    pub fn interface(name: &str) -> Self {
        Self::class(name).with_modifiers(TypeModifiers::INTERFACE | TypeModifiers::ABSTRACT)
    }

    /// Set the supertype
    pub fn extends(mut self, name: &str) -> Self {
        self.supertype = Some(name.to_string());
        self
    }

    /// Add a directly implemented interface
    pub fn implements(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    /// Add modifiers
    pub fn with_modifiers(mut self, modifiers: TypeModifiers) -> Self {
        self.modifiers |= modifiers;
        self
    }

    /// Add an instance field
    pub fn field(mut self, field: FieldDef) -> Self {
        self.instance_fields.push(field);
        self
    }

    /// Add a static field
    pub fn static_field(mut self, field: FieldDef) -> Self {
        self.static_fields.push(field);
        self
    }

    /// Add a virtual method
    pub fn method(mut self, method: MethodDef) -> Self {
        self.virtual_methods.push(method);
        self
    }

    /// Add a static method
    pub fn static_method(mut self, method: MethodDef) -> Self {
        self.static_methods.push(method);
        self
    }

    /// Append a constant-pool entry
    pub fn constant(mut self, entry: PoolEntry) -> Self {
        self.constant_pool.push(entry);
        self
    }

    /// Use a custom symbol decoder
    pub fn with_metadata(mut self, metadata: Arc<dyn SymbolicMetadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_sizes() {
        assert_eq!(FieldType::Byte.size(WordSize::W32), 1);
        assert_eq!(FieldType::Char.size(WordSize::W32), 2);
        assert_eq!(FieldType::Float.size(WordSize::W32), 4);
        assert_eq!(FieldType::Long.size(WordSize::W32), 8);
        assert_eq!(FieldType::Address.size(WordSize::W32), 4);
        assert_eq!(FieldType::reference("Object").size(WordSize::W64), 8);
        assert_eq!(FieldType::Short.log2_size(WordSize::W64), 1);
        assert_eq!(FieldType::reference("Object").log2_size(WordSize::W32), 2);
    }

    #[test]
    fn test_signature_display() {
        let sig = Signature::new(vec![FieldType::Int, FieldType::reference("String")], Some(FieldType::Long));
        assert_eq!(sig.to_string(), "(ILString;)J");
        assert_eq!(Signature::void().to_string(), "()V");
    }

    #[test]
    fn test_constant_fits() {
        assert!(ConstantValue::Int(1).fits(&FieldType::Char));
        assert!(!ConstantValue::Int(1).fits(&FieldType::Long));
        assert!(ConstantValue::Double(1.5).fits(&FieldType::Double));
        assert!(!ConstantValue::Float(1.5).fits(&FieldType::reference("Object")));
    }

    #[test]
    fn test_constant_bits() {
        assert_eq!(ConstantValue::Int(-1).bits(), 0xFFFF_FFFF);
        assert_eq!(ConstantValue::Long(-1).bits(), u64::MAX);
        assert_eq!(ConstantValue::Float(1.0).bits(), 1.0f32.to_bits() as u64);
    }

    #[test]
    fn test_special_methods() {
        assert!(MethodDef::new(CONSTRUCTOR_NAME, Signature::void()).is_default_constructor());
        assert!(!MethodDef::new(CONSTRUCTOR_NAME, Signature::new(vec![FieldType::Int], None))
            .is_default_constructor());
        assert!(MethodDef::new(MAIN_NAME, Signature::main()).is_main());
        assert!(!MethodDef::new(MAIN_NAME, Signature::main())
            .with_modifiers(MemberModifiers::PRIVATE)
            .is_main());
    }

    #[test]
    fn test_definition_builder() {
        let def = TypeDefinition::class("app.Point")
            .extends("Object")
            .implements("app.Shape")
            .field(FieldDef::new("x", FieldType::Int))
            .static_field(FieldDef::new("ORIGIN", FieldType::reference("app.Point")));

        assert_eq!(def.supertype.as_deref(), Some("Object"));
        assert_eq!(def.interfaces, vec!["app.Shape".to_string()]);
        assert_eq!(def.instance_fields.len(), 1);
        assert_eq!(def.static_fields.len(), 1);

        let iface = TypeDefinition::interface("app.Shape");
        assert!(iface.modifiers.contains(TypeModifiers::INTERFACE));
    }
}
