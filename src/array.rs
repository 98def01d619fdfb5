//! Element types and typed payload storage.
//!
//! The on-disk type tag is a four-character code.  In memory a payload is an
//! [`ArrayData`] value: one variant per element kind, so a loaded entry can
//! never hold more than one container.  Typed access goes through the
//! [`EclElement`] trait, which maps a Rust element type to its tag and knows
//! how to borrow its slice out of an `ArrayData`.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── ArrayType ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayType {
    /// 32-bit signed integer.
    Inte,
    /// 32-bit float.
    Real,
    /// 64-bit float.
    Doub,
    /// Logical flag word.
    Logi,
    /// Eight-character blank-padded string.
    Char,
    /// Marker record with no payload.
    Mess,
}

impl ArrayType {
    /// The tag as written in headers.
    pub fn tag(self) -> &'static str {
        match self {
            ArrayType::Inte => "INTE",
            ArrayType::Real => "REAL",
            ArrayType::Doub => "DOUB",
            ArrayType::Logi => "LOGI",
            ArrayType::Char => "CHAR",
            ArrayType::Mess => "MESS",
        }
    }

    /// Resolve a header tag.  `X231` is not a type and is handled by the
    /// header reader before this is called.
    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"INTE" => Some(ArrayType::Inte),
            b"REAL" => Some(ArrayType::Real),
            b"DOUB" => Some(ArrayType::Doub),
            b"LOGI" => Some(ArrayType::Logi),
            b"CHAR" => Some(ArrayType::Char),
            b"MESS" => Some(ArrayType::Mess),
            _       => None,
        }
    }

    /// Element width used by the load balancer when weighting arrays.
    pub fn weight_bytes(self) -> u64 {
        match self {
            ArrayType::Doub | ArrayType::Char => 8,
            _                                 => 4,
        }
    }
}

impl fmt::Display for ArrayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ── ArrayData ───────────────────────────────────────────────────────────────

/// A materialized payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Inte(Vec<i32>),
    Real(Vec<f32>),
    Doub(Vec<f64>),
    Logi(Vec<bool>),
    Char(Vec<String>),
    Mess,
}

impl ArrayData {
    pub fn array_type(&self) -> ArrayType {
        match self {
            ArrayData::Inte(_) => ArrayType::Inte,
            ArrayData::Real(_) => ArrayType::Real,
            ArrayData::Doub(_) => ArrayType::Doub,
            ArrayData::Logi(_) => ArrayType::Logi,
            ArrayData::Char(_) => ArrayType::Char,
            ArrayData::Mess    => ArrayType::Mess,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayData::Inte(v) => v.len(),
            ArrayData::Real(v) => v.len(),
            ArrayData::Doub(v) => v.len(),
            ArrayData::Logi(v) => v.len(),
            ArrayData::Char(v) => v.len(),
            ArrayData::Mess    => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An empty container of the given type.
    pub fn empty(array_type: ArrayType) -> Self {
        match array_type {
            ArrayType::Inte => ArrayData::Inte(Vec::new()),
            ArrayType::Real => ArrayData::Real(Vec::new()),
            ArrayType::Doub => ArrayData::Doub(Vec::new()),
            ArrayType::Logi => ArrayData::Logi(Vec::new()),
            ArrayType::Char => ArrayData::Char(Vec::new()),
            ArrayType::Mess => ArrayData::Mess,
        }
    }
}

// ── Typed access ────────────────────────────────────────────────────────────

/// A Rust type that can be stored in an array.
pub trait EclElement: Sized {
    const ARRAY_TYPE: ArrayType;

    fn slice(data: &ArrayData) -> Option<&[Self]>;

    fn into_data(values: Vec<Self>) -> ArrayData;
}

macro_rules! ecl_element {
    ($ty:ty, $variant:ident) => {
        impl EclElement for $ty {
            const ARRAY_TYPE: ArrayType = ArrayType::$variant;

            fn slice(data: &ArrayData) -> Option<&[Self]> {
                match data {
                    ArrayData::$variant(v) => Some(v),
                    _                      => None,
                }
            }

            fn into_data(values: Vec<Self>) -> ArrayData {
                ArrayData::$variant(values)
            }
        }
    };
}

ecl_element!(i32,    Inte);
ecl_element!(f32,    Real);
ecl_element!(f64,    Doub);
ecl_element!(bool,   Logi);
ecl_element!(String, Char);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_roundtrip() {
        for t in [
            ArrayType::Inte, ArrayType::Real, ArrayType::Doub,
            ArrayType::Logi, ArrayType::Char, ArrayType::Mess,
        ] {
            assert_eq!(ArrayType::from_tag(t.tag().as_bytes()), Some(t));
        }
        assert_eq!(ArrayType::from_tag(b"X231"), None);
        assert_eq!(ArrayType::from_tag(b"inte"), None);
    }

    #[test]
    fn typed_slice_only_matches_own_variant() {
        let data = f32::into_data(vec![1.0, 2.0]);
        assert_eq!(data.array_type(), ArrayType::Real);
        assert_eq!(f32::slice(&data), Some(&[1.0f32, 2.0][..]));
        assert!(f64::slice(&data).is_none());
        assert!(i32::slice(&data).is_none());
    }

    #[test]
    fn weights() {
        assert_eq!(ArrayType::Doub.weight_bytes(), 8);
        assert_eq!(ArrayType::Char.weight_bytes(), 8);
        assert_eq!(ArrayType::Logi.weight_bytes(), 4);
    }
}
