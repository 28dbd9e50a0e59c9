use crate::opcode::Opcode;

/// Memory instruction immediate: alignment hint (as the exponent `a`, so actual alignment is
/// `2^a` bytes) plus byte offset, per <https://webassembly.github.io/spec/core/binary/instructions.html#memory-instructions>.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemArg {
	pub align: u32,
	pub offset: u32,
}

/// A single non-recursive instruction, as handed to [`crate::collab::NodeSink`] for every
/// leaf of a function body's block tree. Control instructions that introduce a child node
/// list (`block`, `loop`, `if`, `call`, `call_indirect`) are represented directly as
/// [`crate::module::Node`] variants instead of here, since they carry children.
#[derive(Debug, Clone, PartialEq)]
pub enum PlainInstr {
	Unreachable,
	Nop,
	Drop,
	Select,

	Br(u32),
	BrIf(u32),
	BrTable { targets: Vec<u32>, default: u32 },
	Return,

	LocalGet(u32),
	LocalSet(u32),
	LocalTee(u32),
	GlobalGet(u32),
	GlobalSet(u32),

	Load { op: Opcode, memarg: MemArg },
	Store { op: Opcode, memarg: MemArg },
	MemorySize,
	MemoryGrow,

	I32Const(i32),
	I64Const(i64),
	F32Const(f32),
	F64Const(f64),

	/// Every MVP integer/float unary, binary, comparison, conversion, and reinterpret opcode.
	/// These never need their own struct: the opcode alone determines the stack signature
	/// (see `checker::numeric_signature`), and the executor dispatches on it directly.
	Numeric(Opcode),
}
