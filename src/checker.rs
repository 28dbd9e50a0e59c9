use crate::error::DecodeError;
use crate::module::BlockKind;
use crate::value::{BlockType, ValueType};

/// One operand-stack entry: a concrete value type, or the polymorphic sentinel used inside
/// stack-polymorphic (unreachable) regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackType {
	Known(ValueType),
	Unknown,
}

/// One entry of the block stack: the label a branch can target, plus where in the
/// append-only side tables this block's slice begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockFrame {
	pub kind: BlockKind,
	pub entry_depth: u32,
	pub return_arity: u32,
	pub return_type: Option<ValueType>,
	pub int_const_start: u32,
	pub branch_table_start: u32,
	saved_reachable: bool,
}

/// The per-function-body abstract interpreter: operand stack, block stack, side-table
/// builders, and the stack-high-water mark. Lives only for the duration of decoding one
/// function body (§3 Lifecycle) — the decoder discards it after copying its side tables
/// into the function's [`crate::module::CodeEntry`].
#[derive(Debug)]
pub struct ExecutionState {
	stack: Vec<StackType>,
	blocks: Vec<BlockFrame>,
	int_constants: Vec<i32>,
	branch_tables: Vec<Vec<i32>>,
	profile_count: u32,
	max_stack_size: u32,
	reachable: bool,
}

impl ExecutionState {
	pub fn new() -> Self {
		ExecutionState {
			stack: Vec::new(),
			blocks: Vec::new(),
			int_constants: Vec::new(),
			branch_tables: Vec::new(),
			profile_count: 0,
			max_stack_size: 0,
			reachable: true,
		}
	}

	pub fn reachable(&self) -> bool {
		self.reachable
	}

	pub fn stack_len(&self) -> u32 {
		self.stack.len() as u32
	}

	pub fn block_depth(&self) -> u32 {
		self.blocks.len() as u32
	}

	pub fn max_stack_size(&self) -> u32 {
		self.max_stack_size
	}

	pub fn profile_count(&self) -> u32 {
		self.profile_count
	}

	pub fn int_constants_len(&self) -> u32 {
		self.int_constants.len() as u32
	}

	pub fn branch_tables_len(&self) -> u32 {
		self.branch_tables.len() as u32
	}

	pub fn into_side_tables(self) -> (Vec<i32>, Vec<Vec<i32>>, u32, u32) {
		(self.int_constants, self.branch_tables, self.profile_count, self.max_stack_size)
	}

	pub fn push(&mut self, t: ValueType) {
		self.stack.push(StackType::Known(t));
		self.max_stack_size = self.max_stack_size.max(self.stack.len() as u32);
	}

	pub fn push_unknown(&mut self) {
		self.stack.push(StackType::Unknown);
		self.max_stack_size = self.max_stack_size.max(self.stack.len() as u32);
	}

	pub fn push_block_type(&mut self, t: BlockType) {
		if let BlockType::Value(v) = t {
			self.push(v);
		}
	}

	fn current_entry_depth(&self) -> u32 {
		self.blocks.last().map(|f| f.entry_depth).unwrap_or(0)
	}

	/// Pops the top operand. Inside an unreachable region this never underflows: once the
	/// current block's entry depth is reached, further pops synthesize `Unknown` instead of
	/// failing, which is what lets stack-polymorphic code validate against any shape.
	pub fn pop(&mut self) -> Result<StackType, DecodeError> {
		let entry_depth = self.current_entry_depth();
		if !self.reachable {
			if self.stack.len() as u32 > entry_depth {
				self.stack.pop();
			}
			return Ok(StackType::Unknown);
		}
		if self.stack.len() as u32 > entry_depth {
			Ok(self.stack.pop().unwrap())
		} else {
			Err(DecodeError::type_mismatch("a value", "empty operand stack"))
		}
	}

	pub fn pop_checked(&mut self, expected: ValueType) -> Result<(), DecodeError> {
		match self.pop()? {
			StackType::Known(t) if t == expected => Ok(()),
			StackType::Known(t) => Err(DecodeError::type_mismatch_value(expected, t)),
			StackType::Unknown => Ok(()),
		}
	}

	pub fn mark_unreachable(&mut self) {
		self.reachable = false;
	}

	/// Pushes a new block frame. Block/loop/if bodies never consume operands on entry in the
	/// MVP (no block-type parameters — that is a multi-value-proposal feature, out of
	/// scope); an `if`'s condition is popped by the caller before this is invoked.
	pub fn start_block(&mut self, kind: BlockKind, return_type: BlockType) {
		let return_type_value = match return_type {
			BlockType::Void => None,
			BlockType::Value(v) => Some(v),
		};
		self.blocks.push(BlockFrame {
			kind,
			entry_depth: self.stack.len() as u32,
			return_arity: return_type.arity(),
			return_type: return_type_value,
			int_const_start: self.int_constants.len() as u32,
			branch_table_start: self.branch_tables.len() as u32,
			saved_reachable: self.reachable,
		});
	}

	/// Closes the innermost block frame, checking that the operand stack has been returned
	/// to the frame's entry depth plus its return arity, with the correct type on top.
	pub fn end_block(&mut self) -> Result<BlockFrame, DecodeError> {
		let frame = self
			.blocks
			.pop()
			.ok_or_else(|| DecodeError::UnspecifiedMalformed("end with no open block".into()))?;
		if frame.return_arity == 1 {
			self.pop_checked(frame.return_type.unwrap())?;
		}
		let depth = self.stack.len() as u32;
		if depth != frame.entry_depth {
			if self.reachable {
				return Err(DecodeError::type_mismatch(
					format!("{} value(s) on the operand stack", frame.entry_depth),
					format!("{depth}"),
				));
			}
			self.stack.truncate(frame.entry_depth as usize);
		}
		self.reachable = frame.saved_reachable;
		Ok(frame)
	}

	/// Aborts validation of the current block (used when a `block`/`loop`/`if` never sees
	/// its matching `end`, e.g. truncated input): pops the frame without any stack checks.
	pub fn abandon_block(&mut self) {
		self.blocks.pop();
	}

	fn target(&self, k: u32) -> Result<BlockFrame, DecodeError> {
		let len = self.blocks.len();
		let idx = len
			.checked_sub(1 + k as usize)
			.ok_or_else(|| DecodeError::UnspecifiedMalformed(format!("branch target {k} exceeds block nesting depth")))?;
		Ok(self.blocks[idx])
	}

	fn continuation_arity(frame: BlockFrame) -> u32 {
		if frame.kind == BlockKind::Loop {
			0
		} else {
			frame.return_arity
		}
	}

	/// Checks (non-destructively, modulo polymorphism) that the continuation types of label
	/// `k` are present on top of stack, and returns that label's continuation arity.
	fn check_branch_target(&mut self, k: u32) -> Result<u32, DecodeError> {
		let frame = self.target(k)?;
		let arity = Self::continuation_arity(frame);
		if arity == 1 {
			let ty = frame.return_type.unwrap();
			self.pop_checked(ty)?;
			self.push(ty);
		}
		Ok(arity)
	}

	/// Records a `br`/`br_if` side-table entry: the target's stack depth and continuation
	/// length. `br_if` additionally increments the profile counter (§4.3).
	pub fn record_branch(&mut self, k: u32, is_conditional: bool) -> Result<(), DecodeError> {
		let arity = self.check_branch_target(k)?;
		let frame = self.target(k)?;
		self.int_constants.push(frame.entry_depth as i32);
		self.int_constants.push(arity as i32);
		if is_conditional {
			self.profile_count += 1;
		}
		Ok(())
	}

	/// Records a `br_table` side-table entry: `[contArity, (label, stackSize), ...]` for
	/// every label named by the instruction (targets vector plus the trailing default),
	/// after checking invariant 9 (every named label shares the same continuation arity).
	pub fn record_br_table(&mut self, targets: &[u32], default: u32) -> Result<(), DecodeError> {
		let mut labels = Vec::with_capacity(targets.len() + 1);
		labels.extend_from_slice(targets);
		labels.push(default);

		let first_arity = self.check_branch_target(labels[0])?;
		let mut row = Vec::with_capacity(1 + labels.len() * 2);
		row.push(first_arity as i32);
		for &label in &labels {
			let arity = self.check_branch_target(label)?;
			if arity != first_arity {
				return Err(DecodeError::type_mismatch(format!("continuation arity {first_arity}"), format!("{arity}")));
			}
			let frame = self.target(label)?;
			row.push(label as i32);
			row.push(frame.entry_depth as i32);
		}
		self.branch_tables.push(row);
		Ok(())
	}

	/// Records a `return`'s side-table entry: depth-to-root and the root return length.
	pub fn record_return(&mut self) -> Result<(), DecodeError> {
		let root = *self
			.blocks
			.first()
			.ok_or_else(|| DecodeError::UnspecifiedMalformed("return outside any block".into()))?;
		if root.return_arity == 1 {
			let ty = root.return_type.unwrap();
			self.pop_checked(ty)?;
			self.push(ty);
		}
		self.int_constants.push(root.entry_depth as i32);
		self.int_constants.push(root.return_arity as i32);
		Ok(())
	}

	pub fn record_call_indirect(&mut self) {
		self.profile_count += 1;
	}
}

impl Default for ExecutionState {
	fn default() -> Self {
		Self::new()
	}
}

/// Fixed (operand-type, result-type) signature table for every MVP numeric opcode that is
/// not a `*.const`. Nearly every numeric instruction — unary, binary, comparison, or
/// conversion — is fully characterized by "pop N operands of type A, push a result of type
/// B", so one small table replaces what would otherwise be a 150-arm per-opcode match spread
/// across the interpreter.
pub struct NumericSignature {
	pub arity: u8,
	pub operand: ValueType,
	pub result: ValueType,
}

pub fn numeric_signature(op: crate::opcode::Opcode) -> Option<NumericSignature> {
	use crate::opcode::Opcode::*;
	use ValueType::*;

	let sig = |arity, operand, result| Some(NumericSignature { arity, operand, result });

	match op {
		I32Eqz => sig(1, I32, I32),
		I32Eq | I32Ne | I32LtS | I32LtU | I32GtS | I32GtU | I32LeS | I32LeU | I32GeS | I32GeU => sig(2, I32, I32),
		I32Clz | I32Ctz | I32Popcnt => sig(1, I32, I32),
		I32Add | I32Sub | I32Mul | I32DivS | I32DivU | I32RemS | I32RemU | I32And | I32Or | I32Xor | I32Shl | I32ShrS
		| I32ShrU | I32Rotl | I32Rotr => sig(2, I32, I32),

		I64Eqz => sig(1, I64, I32),
		I64Eq | I64Ne | I64LtS | I64LtU | I64GtS | I64GtU | I64LeS | I64LeU | I64GeS | I64GeU => sig(2, I64, I32),
		I64Clz | I64Ctz | I64Popcnt => sig(1, I64, I64),
		I64Add | I64Sub | I64Mul | I64DivS | I64DivU | I64RemS | I64RemU | I64And | I64Or | I64Xor | I64Shl | I64ShrS
		| I64ShrU | I64Rotl | I64Rotr => sig(2, I64, I64),

		F32Eq | F32Ne | F32Lt | F32Gt | F32Le | F32Ge => sig(2, F32, I32),
		F32Abs | F32Neg | F32Ceil | F32Floor | F32Trunc | F32Nearest | F32Sqrt => sig(1, F32, F32),
		F32Add | F32Sub | F32Mul | F32Div | F32Min | F32Max | F32Copysign => sig(2, F32, F32),

		F64Eq | F64Ne | F64Lt | F64Gt | F64Le | F64Ge => sig(2, F64, I32),
		F64Abs | F64Neg | F64Ceil | F64Floor | F64Trunc | F64Nearest | F64Sqrt => sig(1, F64, F64),
		F64Add | F64Sub | F64Mul | F64Div | F64Min | F64Max | F64Copysign => sig(2, F64, F64),

		I32WrapI64 => sig(1, I64, I32),
		I32TruncF32S | I32TruncF32U => sig(1, F32, I32),
		I32TruncF64S | I32TruncF64U => sig(1, F64, I32),
		I64ExtendI32S | I64ExtendI32U => sig(1, I32, I64),
		I64TruncF32S | I64TruncF32U => sig(1, F32, I64),
		I64TruncF64S | I64TruncF64U => sig(1, F64, I64),
		F32ConvertI32S | F32ConvertI32U => sig(1, I32, F32),
		F32ConvertI64S | F32ConvertI64U => sig(1, I64, F32),
		F32DemoteF64 => sig(1, F64, F32),
		F64ConvertI32S | F64ConvertI32U => sig(1, I32, F64),
		F64ConvertI64S | F64ConvertI64U => sig(1, I64, F64),
		F64PromoteF32 => sig(1, F32, F64),
		I32ReinterpretF32 => sig(1, F32, I32),
		I64ReinterpretF64 => sig(1, F64, I64),
		F32ReinterpretI32 => sig(1, I32, F32),
		F64ReinterpretI64 => sig(1, I64, F64),

		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::module::BlockKind;
	use crate::value::{BlockType, ValueType};

	#[test]
	fn simple_push_pop_round_trips() {
		let mut state = ExecutionState::new();
		state.push(ValueType::I32);
		assert_eq!(state.pop().unwrap(), StackType::Known(ValueType::I32));
	}

	#[test]
	fn pop_on_empty_reachable_stack_fails() {
		let mut state = ExecutionState::new();
		assert!(state.pop().is_err());
	}

	#[test]
	fn unreachable_region_synthesizes_unknown() {
		let mut state = ExecutionState::new();
		state.start_block(BlockKind::Block, BlockType::Void);
		state.mark_unreachable();
		// Popping past the block's entry depth in dead code must not fail.
		assert_eq!(state.pop().unwrap(), StackType::Unknown);
		assert_eq!(state.pop().unwrap(), StackType::Unknown);
	}

	#[test]
	fn block_with_i32_result_round_trips() {
		let mut state = ExecutionState::new();
		state.start_block(BlockKind::Block, BlockType::Value(ValueType::I32));
		state.push(ValueType::I32);
		let frame = state.end_block().unwrap();
		assert_eq!(frame.return_arity, 1);
		state.push_block_type(BlockType::Value(ValueType::I32));
		assert_eq!(state.stack_len(), 1);
	}

	#[test]
	fn mismatched_block_result_is_type_mismatch() {
		let mut state = ExecutionState::new();
		state.start_block(BlockKind::Block, BlockType::Value(ValueType::I32));
		state.push(ValueType::F32);
		assert!(matches!(state.end_block(), Err(DecodeError::TypeMismatch { .. })));
	}

	#[test]
	fn loop_targets_have_zero_continuation_arity() {
		let mut state = ExecutionState::new();
		state.start_block(BlockKind::Loop, BlockType::Value(ValueType::I32));
		// br targeting the loop header does not require a value on the stack.
		state.record_branch(0, false).unwrap();
		assert_eq!(state.int_constants_len(), 2);
	}

	#[test]
	fn br_table_requires_matching_arity() {
		let mut state = ExecutionState::new();
		state.start_block(BlockKind::Block, BlockType::Value(ValueType::I32));
		state.start_block(BlockKind::Block, BlockType::Void);
		state.push_unknown();
		let result = state.record_br_table(&[0], 1);
		assert!(result.is_err());
	}
}
