//! The fixed `int8/16/32/64`, `uint8/16/32/64`, `char`, `void` catalog.

use bitflags::bitflags;
use std::fmt;
use thiserror::Error;

bitflags! {
    /// Bitset over the type's properties.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DataTypeFlags: u8 {
        const SIGNED   = 1 << 0;
        const USER     = 1 << 1;
        const INTEGRAL = 1 << 2;
        const NUMERIC  = 1 << 3;
        const FLOAT    = 1 << 4;
        const POINTER  = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataTypeKind {
    Int,
    Char,
    Void,
}

/// Immutable record describing one primitive type. The catalog below is the
/// only place instances are ever constructed; everything else holds
/// `&'static DataType` references — never clones.
#[derive(Debug, PartialEq, Eq)]
pub struct DataType {
    pub name: &'static str,
    pub size_bytes: u32,
    pub flags: DataTypeFlags,
    pub kind: DataTypeKind,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

macro_rules! int_type {
    ($name:ident, $text:literal, $size:literal, $signed:expr) => {
        pub static $name: DataType = DataType {
            name: $text,
            size_bytes: $size,
            flags: if $signed {
                DataTypeFlags::SIGNED.union(DataTypeFlags::INTEGRAL).union(DataTypeFlags::NUMERIC)
            } else {
                DataTypeFlags::INTEGRAL.union(DataTypeFlags::NUMERIC)
            },
            kind: DataTypeKind::Int,
        };
    };
}

int_type!(TYPE_INT8, "int8", 1, true);
int_type!(TYPE_INT16, "int16", 2, true);
int_type!(TYPE_INT32, "int32", 4, true);
int_type!(TYPE_INT64, "int64", 8, true);

int_type!(TYPE_UINT8, "uint8", 1, false);
int_type!(TYPE_UINT16, "uint16", 2, false);
int_type!(TYPE_UINT32, "uint32", 4, false);
int_type!(TYPE_UINT64, "uint64", 8, false);

pub static TYPE_CHAR: DataType = DataType {
    name: "char",
    size_bytes: 1,
    flags: DataTypeFlags::INTEGRAL,
    kind: DataTypeKind::Char,
};

pub static TYPE_VOID: DataType = DataType {
    name: "void",
    size_bytes: 0,
    flags: DataTypeFlags::empty(),
    kind: DataTypeKind::Void,
};

/// All catalog entries, in declaration order — used by the container
/// serializer to build the type table and by the lexer to recognize
/// `TypeKeyword` tokens.
pub static CATALOG: &[&DataType] = &[
    &TYPE_INT8, &TYPE_INT16, &TYPE_INT32, &TYPE_INT64,
    &TYPE_UINT8, &TYPE_UINT16, &TYPE_UINT32, &TYPE_UINT64,
    &TYPE_CHAR, &TYPE_VOID,
];

#[derive(Debug, Error)]
#[error("could not resolve type: {0}")]
pub struct UnknownTypeError(pub String);

/// Look a type name up in the catalog. Used by the lexer (to decide whether
/// an identifier is a `TypeKeyword`) and by the parser (to turn a
/// `TypeKeyword` token's text back into a `&'static DataType`).
pub fn resolve(name: &str) -> Result<&'static DataType, UnknownTypeError> {
    CATALOG
        .iter()
        .find(|t| t.name == name)
        .copied()
        .ok_or_else(|| UnknownTypeError(name.to_string()))
}

/// `true` if `name` names a catalog type.
pub fn is_type_name(name: &str) -> bool {
    CATALOG.iter().any(|t| t.name == name)
}

/// Result type of a binary operator over `left`/`right`: the wider operand;
/// if widths tie and signedness differs, the signed type wins; otherwise the
/// left type.
pub fn binop_result_type<'a>(left: &'a DataType, right: &'a DataType) -> &'a DataType {
    if left.size_bytes > right.size_bytes {
        left
    } else if right.size_bytes > left.size_bytes {
        right
    } else if left.flags.contains(DataTypeFlags::SIGNED) != right.flags.contains(DataTypeFlags::SIGNED) {
        if left.flags.contains(DataTypeFlags::SIGNED) { left } else { right }
    } else {
        left
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_catalog_entry() {
        for t in CATALOG {
            assert_eq!(resolve(t.name).unwrap().name, t.name);
        }
    }

    #[test]
    fn unknown_type_errors() {
        assert!(resolve("float32").is_err());
    }

    #[test]
    fn binop_result_picks_wider_operand() {
        assert_eq!(binop_result_type(&TYPE_INT8, &TYPE_INT32).name, "int32");
        assert_eq!(binop_result_type(&TYPE_INT64, &TYPE_UINT8).name, "int64");
    }

    #[test]
    fn binop_result_picks_signed_on_tie() {
        assert_eq!(binop_result_type(&TYPE_UINT32, &TYPE_INT32).name, "int32");
        assert_eq!(binop_result_type(&TYPE_INT32, &TYPE_UINT32).name, "int32");
    }

    #[test]
    fn binop_result_picks_left_when_equal() {
        assert_eq!(binop_result_type(&TYPE_INT32, &TYPE_INT32).name, "int32");
    }
}
