//! The type interface this core needs from the (external) type system.
//!
//! The real debugger owns struct layout, DWARF decoding and type printing;
//! this crate only needs a closed set of type shapes rich enough to type
//! literals, fold declarators, drive operator dispatch and address fields.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Encoding tag for character and string literals (`'a'`, `L'a'`,
/// `u'a'`, `U'a'` and the corresponding string prefixes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharEncoding {
    Narrow,
    Wide,
    Utf16,
    Utf32,
}

impl CharEncoding {
    /// Width of one code unit in bytes.
    pub fn unit_size(self) -> u64 {
        match self {
            CharEncoding::Narrow => 1,
            CharEncoding::Wide => 4,
            CharEncoding::Utf16 => 2,
            CharEncoding::Utf32 => 4,
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            CharEncoding::Narrow => "",
            CharEncoding::Wide => "L",
            CharEncoding::Utf16 => "u",
            CharEncoding::Utf32 => "U",
        }
    }
}

/// A single type qualifier, including the named address-space extension
/// (`@tag`) used by dialect-specific declarators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeQual {
    Const,
    Volatile,
    Restrict,
    Atomic,
    AddressSpace(String),
}

impl fmt::Display for TypeQual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeQual::Const => write!(f, "const"),
            TypeQual::Volatile => write!(f, "volatile"),
            TypeQual::Restrict => write!(f, "restrict"),
            TypeQual::Atomic => write!(f, "_Atomic"),
            TypeQual::AddressSpace(tag) => write!(f, "@{}", tag),
        }
    }
}

/// One field of a struct/class/union type. Offsets are in bytes from
/// the start of the enclosing object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub offset: u64,
}

/// The closed set of type shapes used by the expression core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    Void,
    Bool,
    /// Integer type with an explicit bit width and a display name
    /// ("int", "unsigned long", "int64", ...).
    Int {
        name: String,
        bits: u32,
        signed: bool,
    },
    /// Binary floating point ("float" is 32, "double" 64).
    Float { name: String, bits: u32 },
    /// IEEE 754-2008 decimal floating point (`df`/`dd`/`dl` literals).
    DecimalFloat { name: String, bits: u32 },
    /// Complex type; the component is the underlying float type.
    Complex { component: Box<Type> },
    /// Character type carrying its encoding.
    Char { encoding: CharEncoding },
    Pointer { target: Box<Type> },
    Reference { target: Box<Type>, rvalue: bool },
    Array {
        element: Box<Type>,
        len: Option<u64>,
    },
    Function {
        ret: Box<Type>,
        params: Vec<Type>,
        varargs: bool,
    },
    /// Struct or class with resolved field layout.
    Struct {
        name: String,
        fields: Vec<Field>,
        /// Name of the superclass, if the dialect has single-rooted
        /// inheritance (object-message dialect).
        superclass: Option<String>,
        size: u64,
    },
    Enum { name: String, bits: u32 },
    /// Fixed-width vector. Lane counts are restricted to {2,3,4,8,16};
    /// 3-lane vectors occupy the storage of 4 lanes.
    Vector { element: Box<Type>, lanes: u32 },
    Qualified { qual: TypeQual, inner: Box<Type> },
}

impl Type {
    pub fn int() -> Type {
        Type::Int {
            name: "int".into(),
            bits: 32,
            signed: true,
        }
    }

    pub fn unsigned_int() -> Type {
        Type::Int {
            name: "unsigned int".into(),
            bits: 32,
            signed: false,
        }
    }

    pub fn long() -> Type {
        Type::Int {
            name: "long".into(),
            bits: 64,
            signed: true,
        }
    }

    pub fn unsigned_long() -> Type {
        Type::Int {
            name: "unsigned long".into(),
            bits: 64,
            signed: false,
        }
    }

    pub fn long_long() -> Type {
        Type::Int {
            name: "long long".into(),
            bits: 64,
            signed: true,
        }
    }

    pub fn unsigned_long_long() -> Type {
        Type::Int {
            name: "unsigned long long".into(),
            bits: 64,
            signed: false,
        }
    }

    pub fn short() -> Type {
        Type::Int {
            name: "short".into(),
            bits: 16,
            signed: true,
        }
    }

    pub fn unsigned_short() -> Type {
        Type::Int {
            name: "unsigned short".into(),
            bits: 16,
            signed: false,
        }
    }

    pub fn signed_char() -> Type {
        Type::Int {
            name: "signed char".into(),
            bits: 8,
            signed: true,
        }
    }

    pub fn unsigned_char() -> Type {
        Type::Int {
            name: "unsigned char".into(),
            bits: 8,
            signed: false,
        }
    }

    pub fn float() -> Type {
        Type::Float {
            name: "float".into(),
            bits: 32,
        }
    }

    pub fn double() -> Type {
        Type::Float {
            name: "double".into(),
            bits: 64,
        }
    }

    pub fn long_double() -> Type {
        Type::Float {
            name: "long double".into(),
            bits: 64,
        }
    }

    pub fn decimal32() -> Type {
        Type::DecimalFloat {
            name: "_Decimal32".into(),
            bits: 32,
        }
    }

    pub fn decimal64() -> Type {
        Type::DecimalFloat {
            name: "_Decimal64".into(),
            bits: 64,
        }
    }

    pub fn decimal128() -> Type {
        Type::DecimalFloat {
            name: "_Decimal128".into(),
            bits: 128,
        }
    }

    pub fn char() -> Type {
        Type::Char {
            encoding: CharEncoding::Narrow,
        }
    }

    pub fn complex_double() -> Type {
        Type::Complex {
            component: Box::new(Type::double()),
        }
    }

    pub fn pointer(target: Type) -> Type {
        Type::Pointer {
            target: Box::new(target),
        }
    }

    pub fn array(element: Type, len: Option<u64>) -> Type {
        Type::Array {
            element: Box::new(element),
            len,
        }
    }

    pub fn vector(element: Type, lanes: u32) -> Type {
        Type::Vector {
            element: Box::new(element),
            lanes,
        }
    }

    pub fn qualified(qual: TypeQual, inner: Type) -> Type {
        Type::Qualified {
            qual,
            inner: Box::new(inner),
        }
    }

    /// The type with all qualifier wrappers removed.
    pub fn unqualified(&self) -> &Type {
        let mut t = self;
        while let Type::Qualified { inner, .. } = t {
            t = inner;
        }
        t
    }

    /// The type a reference is bound to, or the type itself.
    pub fn unreferenced(&self) -> &Type {
        match self.unqualified() {
            Type::Reference { target, .. } => target.unqualified(),
            other => other,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self.unqualified(),
            Type::Int { .. } | Type::Char { .. } | Type::Enum { .. } | Type::Bool
        )
    }

    pub fn is_signed(&self) -> bool {
        match self.unqualified() {
            Type::Int { signed, .. } => *signed,
            Type::Char { .. } | Type::Enum { .. } => true,
            _ => false,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(
            self.unqualified(),
            Type::Float { .. } | Type::DecimalFloat { .. }
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || self.is_float() || matches!(self.unqualified(), Type::Complex { .. })
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.unqualified(), Type::Pointer { .. })
    }

    pub fn is_vector(&self) -> bool {
        matches!(self.unqualified(), Type::Vector { .. })
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.unqualified(), Type::Struct { .. })
    }

    /// Lane count of a vector type, if this is one.
    pub fn vector_lanes(&self) -> Option<u32> {
        match self.unqualified() {
            Type::Vector { lanes, .. } => Some(*lanes),
            _ => None,
        }
    }

    /// Element type of a vector, array or pointer.
    pub fn element(&self) -> Option<&Type> {
        match self.unqualified() {
            Type::Vector { element, .. } => Some(element),
            Type::Array { element, .. } => Some(element),
            Type::Pointer { target } => Some(target),
            _ => None,
        }
    }

    /// Size of an object of this type in bytes. Three-lane vectors are
    /// stored with the padding of four lanes.
    pub fn size_of(&self) -> u64 {
        match self {
            Type::Void => 1,
            Type::Bool => 1,
            Type::Int { bits, .. }
            | Type::Float { bits, .. }
            | Type::DecimalFloat { bits, .. }
            | Type::Enum { bits, .. } => u64::from(*bits) / 8,
            Type::Complex { component } => component.size_of() * 2,
            Type::Char { encoding } => encoding.unit_size(),
            Type::Pointer { .. } | Type::Function { .. } => 8,
            Type::Reference { .. } => 8,
            Type::Array { element, len } => element.size_of() * len.unwrap_or(0),
            Type::Struct { size, .. } => *size,
            Type::Vector { element, lanes } => {
                let stored = if *lanes == 3 { 4 } else { *lanes };
                element.size_of() * u64::from(stored)
            }
            Type::Qualified { inner, .. } => inner.size_of(),
        }
    }

    /// Alignment of this type in bytes.
    pub fn align_of(&self) -> u64 {
        match self.unqualified() {
            Type::Array { element, .. } => element.align_of(),
            Type::Struct { fields, .. } => {
                fields.iter().map(|f| f.ty.align_of()).max().unwrap_or(1)
            }
            Type::Complex { component } => component.align_of(),
            Type::Vector { .. } => self.size_of(),
            other => other.size_of().max(1),
        }
    }

    /// Look up a field by name, searching this struct only (superclass
    /// chains are the evaluator's business).
    pub fn field(&self, name: &str) -> Option<&Field> {
        match self.unqualified() {
            Type::Struct { fields, .. } => fields.iter().find(|f| f.name == name),
            _ => None,
        }
    }

    /// A C-ish rendering of the type name.
    pub fn display_name(&self) -> String {
        match self {
            Type::Void => "void".into(),
            Type::Bool => "bool".into(),
            Type::Int { name, .. }
            | Type::Float { name, .. }
            | Type::DecimalFloat { name, .. } => name.clone(),
            Type::Complex { component } => {
                format!("_Complex {}", component.display_name())
            }
            Type::Char { encoding } => match encoding {
                CharEncoding::Narrow => "char".into(),
                CharEncoding::Wide => "wchar_t".into(),
                CharEncoding::Utf16 => "char16_t".into(),
                CharEncoding::Utf32 => "char32_t".into(),
            },
            Type::Pointer { target } => format!("{} *", target.display_name()),
            Type::Reference { target, rvalue } => {
                format!("{} {}", target.display_name(), if *rvalue { "&&" } else { "&" })
            }
            Type::Array { element, len } => match len {
                Some(n) => format!("{} [{}]", element.display_name(), n),
                None => format!("{} []", element.display_name()),
            },
            Type::Function { ret, params, varargs } => {
                let mut ps: Vec<String> = params.iter().map(Type::display_name).collect();
                if *varargs {
                    ps.push("...".into());
                }
                format!("{} ({})", ret.display_name(), ps.join(", "))
            }
            Type::Struct { name, .. } => name.clone(),
            Type::Enum { name, .. } => format!("enum {}", name),
            Type::Vector { element, lanes } => {
                format!("{}{}", element.display_name(), lanes)
            }
            Type::Qualified { qual, inner } => {
                format!("{} {}", qual, inner.display_name())
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_sizes() {
        assert_eq!(Type::int().size_of(), 4);
        assert_eq!(Type::long_long().size_of(), 8);
        assert_eq!(Type::double().size_of(), 8);
        assert_eq!(Type::pointer(Type::char()).size_of(), 8);
    }

    #[test]
    fn vec3_is_stored_as_vec4() {
        let v3 = Type::vector(Type::int(), 3);
        let v4 = Type::vector(Type::int(), 4);
        assert_eq!(v3.size_of(), v4.size_of());
        assert_eq!(v3.vector_lanes(), Some(3));
    }

    #[test]
    fn qualifiers_do_not_change_size_or_shape() {
        let qt = Type::qualified(TypeQual::Const, Type::int());
        assert_eq!(qt.size_of(), 4);
        assert!(qt.is_integer());
        assert_eq!(qt.unqualified(), &Type::int());
    }

    #[test]
    fn display_names() {
        assert_eq!(Type::pointer(Type::int()).display_name(), "int *");
        assert_eq!(Type::array(Type::int(), Some(10)).display_name(), "int [10]");
        assert_eq!(Type::vector(Type::float(), 4).display_name(), "float4");
        assert_eq!(
            Type::qualified(TypeQual::AddressSpace("global".into()), Type::int()).display_name(),
            "@global int"
        );
    }
}
