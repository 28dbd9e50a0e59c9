use std::string::FromUtf8Error;

use crate::value::ValueType;

/// The single error type returned by every fallible entry point in this crate.
///
/// Each variant is one of the failure kinds named in the format specification; the
/// `thiserror`-derived `Display` impl supplies the human-readable message half.
#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum DecodeError {
	#[error("module does not start with the magic bytes 0x00 0x61 0x73 0x6D")]
	InvalidMagicNumber,

	#[error("unsupported version {0:?}, expected [0x01, 0x00, 0x00, 0x00]")]
	InvalidVersionNumber([u8; 4]),

	#[error("unexpected end of input while reading {context}")]
	UnexpectedEnd { context: &'static str },

	#[error("malformed LEB128 encoding while reading {context}")]
	MalformedLeb { context: &'static str },

	#[error("unknown section id {0}")]
	MalformedSectionId(u8),

	#[error("section id {0} appears more than once")]
	DuplicatedSection(u8),

	#[error("section id {found} appears after section id {last_seen}, violating ascending order")]
	InvalidSectionOrder { found: u8, last_seen: u8 },

	#[error("section declared size {declared} but {actual} bytes were consumed")]
	SectionSizeMismatch { declared: u32, actual: u32 },

	#[error("length {0} is out of bounds for this context")]
	LengthOutOfBounds(u32),

	#[error("byte 0x{0:02X} is not a valid value type")]
	MalformedValueType(u8),

	#[error("name is not valid UTF-8: {0}")]
	MalformedUtf8(#[from] FromUtf8Error),

	#[error("type index {index} out of bounds for {len} declared types")]
	UnknownType { index: u32, len: u32 },

	#[error("local index {index} out of bounds for {len} locals")]
	UnknownLocal { index: u32, len: u32 },

	#[error("global index {index} out of bounds for {len} globals")]
	UnknownGlobal { index: u32, len: u32 },

	#[error("table index {index} out of bounds for {len} tables")]
	UnknownTable { index: u32, len: u32 },

	#[error("memory index {index} out of bounds for {len} memories")]
	UnknownMemory { index: u32, len: u32 },

	#[error("function index {index} out of bounds for {len} functions")]
	UnknownFunction { index: u32, len: u32 },

	#[error("type mismatch: expected {expected}, found {found}")]
	TypeMismatch { expected: String, found: String },

	#[error("function/block result arity {0} exceeds the MVP maximum of 1")]
	InvalidResultArity(u32),

	#[error("loop block declared a non-zero input arity")]
	LoopInput,

	#[error("attempted to write to immutable global {0}")]
	ImmutableGlobalWrite(u32),

	#[error("expected a zero flag byte, found 0x{0:02X}")]
	ZeroFlagExpected(u8),

	#[error("alignment hint 2^{align} exceeds the natural alignment of a {width}-bit access")]
	AlignmentLargerThanNatural { align: u32, width: u32 },

	#[error("data segment of {data_len} bytes at offset {offset} does not fit in memory of {memory_len} bytes")]
	DataSegmentDoesNotFit { offset: u32, data_len: u32, memory_len: u32 },

	#[error("limits minimum {min} is greater than maximum {max}")]
	LimitMinimumGreaterThanMaximum { min: u32, max: u32 },

	#[error("memory size {0} pages exceeds the hard limit of 65536 pages")]
	MemorySizeLimitExceeded(u32),

	#[error("function section declares {functions} functions but code section has {code} bodies")]
	FunctionsCodeInconsistentLengths { functions: u32, code: u32 },

	#[error("resource limit exceeded: {which} (limit {limit}, actual {actual})")]
	ResourceLimitExceeded { which: &'static str, limit: u32, actual: u32 },

	#[error("malformed module: {0}")]
	UnspecifiedMalformed(String),

	#[error("invalid module: {0}")]
	UnspecifiedInvalid(String),
}

pub type DecodeResult<T> = Result<T, DecodeError>;

impl DecodeError {
	pub(crate) fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
		DecodeError::TypeMismatch { expected: expected.into(), found: found.into() }
	}

	pub(crate) fn type_mismatch_value(expected: ValueType, found: impl std::fmt::Debug) -> Self {
		DecodeError::TypeMismatch { expected: format!("{expected:?}"), found: format!("{found:?}") }
	}
}
