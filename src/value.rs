use num_enum::TryFromPrimitive;

use crate::error::DecodeError;

/// The four value types available in the WebAssembly 1.0 MVP. `v128` (SIMD) and the reference
/// types (`funcref`/`externref` as first-class stack values) are out of scope; see Non-goals.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum ValueType {
	I32 = 0x7F,
	I64 = 0x7E,
	F32 = 0x7D,
	F64 = 0x7C,
}

impl ValueType {
	pub fn from_byte(byte: u8) -> Result<Self, DecodeError> {
		ValueType::try_from(byte).map_err(|_| DecodeError::MalformedValueType(byte))
	}
}

impl std::fmt::Display for ValueType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			ValueType::I32 => "i32",
			ValueType::I64 => "i64",
			ValueType::F32 => "f32",
			ValueType::F64 => "f64",
		};
		f.write_str(name)
	}
}

/// `elemtype` of the single MVP table: always `funcref`.
#[derive(Eq, PartialEq, Debug, Clone, Copy, TryFromPrimitive)]
#[repr(u8)]
pub enum ElemType {
	FuncRef = 0x70,
}

/// The result type of a block/if/loop/function: either nothing, or a single value type.
/// The MVP's arity-one restriction (invariant 4 / `InvalidResultArity`) is what keeps this
/// an `Option<ValueType>` instead of a `Vec<ValueType>`.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum BlockType {
	Void,
	Value(ValueType),
}

impl BlockType {
	pub fn arity(self) -> u32 {
		match self {
			BlockType::Void => 0,
			BlockType::Value(_) => 1,
		}
	}

	/// Reads the single-byte blocktype immediate used by `block`/`loop`/`if` (0x40 for void,
	/// otherwise a value type byte). The multi-value proposal's signed LEB128 type-index
	/// encoding is out of scope for the MVP.
	pub fn from_byte(byte: u8) -> Result<Self, DecodeError> {
		if byte == 0x40 {
			Ok(BlockType::Void)
		} else {
			ValueType::from_byte(byte).map(BlockType::Value)
		}
	}
}

impl std::fmt::Display for BlockType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			BlockType::Void => f.write_str("void"),
			BlockType::Value(t) => t.fmt(f),
		}
	}
}
