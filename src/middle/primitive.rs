//! The closed primitive type set of M and the relations the analyzer and
//! generator agree on.

use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PrimitiveType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    String,
    Void,
    /// The bottom type produced while recovering from an error. It satisfies
    /// every relation below so one mistake does not cascade into a wall of
    /// follow-up diagnostics.
    Unknown,
}

impl PrimitiveType {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::U8 | Self::U16 | Self::U32 | Self::U64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }
}

/// Whether `source` may be implicitly converted to `target` in
/// initializations, argument passing, and returns. Widening only:
/// `i32 -> i64`, `f32 -> f64`, and any integer into either float width.
pub fn assignable(target: PrimitiveType, source: PrimitiveType) -> bool {
    if target == source {
        return true;
    }

    if target == PrimitiveType::Unknown || source == PrimitiveType::Unknown {
        return true;
    }

    if target == PrimitiveType::I64 && source == PrimitiveType::I32 {
        return true;
    }

    if target == PrimitiveType::F64 && source == PrimitiveType::F32 {
        return true;
    }

    target.is_float() && source.is_integer()
}

/// Comparison operands must be the same type or both numeric
pub fn comparable(left: PrimitiveType, right: PrimitiveType) -> bool {
    left == right || (left.is_numeric() && right.is_numeric())
}

/// `( e as : T )` admits identity, numeric-to-numeric, and anything
/// involving `unknown`
pub fn cast_allowed(source: PrimitiveType, target: PrimitiveType) -> bool {
    if source == PrimitiveType::Unknown || target == PrimitiveType::Unknown {
        return true;
    }

    source == target || (source.is_numeric() && target.is_numeric())
}

/// The result type of arithmetic over two numeric operands:
/// any f64 wins, then f32, then i64, otherwise i32
pub fn widened(left: PrimitiveType, right: PrimitiveType) -> PrimitiveType {
    if left == PrimitiveType::F64 || right == PrimitiveType::F64 {
        return PrimitiveType::F64;
    }

    if left == PrimitiveType::F32 || right == PrimitiveType::F32 {
        return PrimitiveType::F32;
    }

    if left == PrimitiveType::I64 || right == PrimitiveType::I64 {
        return PrimitiveType::I64;
    }

    PrimitiveType::I32
}
