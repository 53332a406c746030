use std::fmt;

use crate::foundation::value::ValueKind;

/// Host-visible static type of a parameter, used to render signatures and to reject values of
/// the wrong shape before any conversion is attempted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StaticType {
    Image,
    ImageArray,
    Enum(String),
    DoubleArray,
    IntArray,
    Source,
    Target,
    Blob,
    Bool,
    Int,
    Double,
    Str,
    Unsupported(String),
}

impl StaticType {
    /// Whether a value of `kind` may be offered to a parameter of this type.
    ///
    /// Admission is about shape only: an enum still rejects unknown nicknames and an int array
    /// still rejects fractional doubles during the cast itself.
    pub fn admits(&self, kind: ValueKind) -> bool {
        use ValueKind as K;
        match self {
            Self::Image => kind == K::Image,
            Self::ImageArray => matches!(kind, K::Image | K::ImageArray),
            Self::Enum(_) => matches!(kind, K::Str | K::Int),
            Self::DoubleArray => {
                matches!(kind, K::DoubleArray | K::IntArray | K::Double | K::Int)
            }
            Self::IntArray => matches!(kind, K::IntArray | K::DoubleArray | K::Int),
            Self::Source => kind == K::Source,
            Self::Target => kind == K::Target,
            Self::Blob => kind == K::Blob,
            Self::Bool => kind == K::Bool,
            Self::Int => kind == K::Int,
            Self::Double => matches!(kind, K::Double | K::Int),
            Self::Str => kind == K::Str,
            Self::Unsupported(_) => false,
        }
    }
}

impl fmt::Display for StaticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("Image"),
            Self::ImageArray => f.write_str("[Image]"),
            Self::Enum(name) => f.write_str(name),
            Self::DoubleArray => f.write_str("[f64]"),
            Self::IntArray => f.write_str("[i32]"),
            Self::Source => f.write_str("Source"),
            Self::Target => f.write_str("Target"),
            Self::Blob => f.write_str("Blob"),
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("i32"),
            Self::Double => f.write_str("f64"),
            Self::Str => f.write_str("str"),
            Self::Unsupported(tag) => write!(f, "!{tag}"),
        }
    }
}
