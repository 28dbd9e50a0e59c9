use tracing::trace;

use crate::checker::{numeric_signature, ExecutionState, StackType};
use crate::collab::{NodeSink, SymbolTable};
use crate::cursor::ByteCursor;
use crate::error::{DecodeError, DecodeResult};
use crate::instr::{MemArg, PlainInstr};
use crate::limits::ModuleLimits;
use crate::module::{Block, BlockKind, CodeEntry, Node};
use crate::opcode::Opcode;
use crate::value::{BlockType, ValueType};

/// An in-progress block/loop/if body: the children accumulated so far, split into the
/// "then" list and (for `if`) the "else" list once an `else` opcode has been seen.
struct Builder {
	kind: BlockKind,
	return_type: BlockType,
	byte_start: usize,
	children: Vec<Node>,
	else_active: bool,
	else_children: Vec<Node>,
}

impl Builder {
	fn active_children(&mut self) -> &mut Vec<Node> {
		if self.else_active {
			&mut self.else_children
		} else {
			&mut self.children
		}
	}
}

/// (operand type, natural width in bits, is_store) for every MVP memory instruction.
fn memory_op_info(op: Opcode) -> Option<(ValueType, u32, bool)> {
	use Opcode::*;
	use ValueType::*;
	match op {
		I32Load => Some((I32, 32, false)),
		I64Load => Some((I64, 64, false)),
		F32Load => Some((F32, 32, false)),
		F64Load => Some((F64, 64, false)),
		I32Load8S | I32Load8U => Some((I32, 8, false)),
		I32Load16S | I32Load16U => Some((I32, 16, false)),
		I64Load8S | I64Load8U => Some((I64, 8, false)),
		I64Load16S | I64Load16U => Some((I64, 16, false)),
		I64Load32S | I64Load32U => Some((I64, 32, false)),
		I32Store => Some((I32, 32, true)),
		I64Store => Some((I64, 64, true)),
		F32Store => Some((F32, 32, true)),
		F64Store => Some((F64, 64, true)),
		I32Store8 => Some((I32, 8, true)),
		I32Store16 => Some((I32, 16, true)),
		I64Store8 => Some((I64, 8, true)),
		I64Store16 => Some((I64, 16, true)),
		I64Store32 => Some((I64, 32, true)),
		_ => None,
	}
}

fn read_memarg(cursor: &mut ByteCursor) -> DecodeResult<MemArg> {
	Ok(MemArg { align: cursor.read_leb_u32()?, offset: cursor.read_leb_u32()? })
}

/// Reads the locals declaration vector (count, value-type pairs) and returns the full
/// local-type vector (arguments followed by declared locals).
fn read_locals(cursor: &mut ByteCursor, arguments: &[ValueType], limits: &ModuleLimits) -> DecodeResult<Vec<ValueType>> {
	let mut locals = arguments.to_vec();
	let group_count = cursor.read_leb_u32()?;
	for _ in 0..group_count {
		let count = cursor.read_leb_u32()?;
		let value_type = ValueType::from_byte(cursor.read_u8()?)?;
		let new_total = locals.len() as u64 + count as u64;
		if new_total > limits.max_locals_per_function as u64 {
			return Err(DecodeError::ResourceLimitExceeded {
				which: "locals per function",
				limit: limits.max_locals_per_function,
				actual: new_total.min(u32::MAX as u64) as u32,
			});
		}
		locals.extend(std::iter::repeat(value_type).take(count as usize));
	}
	Ok(locals)
}

/// Decodes and validates one function body, returning its fully populated [`CodeEntry`].
/// Drives [`ExecutionState`] instruction-by-instruction using an explicit stack of
/// in-progress block builders (rather than recursing into nested blocks) so pathological
/// nesting depth does not grow the host call stack (§9 design note).
pub fn decode_function_body(
	cursor: &mut ByteCursor,
	function_index: u32,
	symtab: &dyn SymbolTable,
	sink: &mut dyn NodeSink,
	limits: &ModuleLimits,
) -> DecodeResult<CodeEntry> {
	let type_index = symtab
		.function_type_index(function_index)
		.ok_or(DecodeError::UnknownFunction { index: function_index, len: symtab.function_count() })?;
	let function_type = symtab
		.function_type(type_index)
		.ok_or(DecodeError::UnknownType { index: type_index, len: symtab.type_count() })?
		.clone();

	let locals = read_locals(cursor, &function_type.params, limits)?;

	let return_type = match function_type.results.as_slice() {
		[] => BlockType::Void,
		[single] => BlockType::Value(*single),
		_ => return Err(DecodeError::InvalidResultArity(function_type.results.len() as u32)),
	};

	let mut state = ExecutionState::new();
	state.start_block(BlockKind::Block, return_type);

	let mut builders = vec![Builder {
		kind: BlockKind::Block,
		return_type,
		byte_start: cursor.position(),
		children: Vec::new(),
		else_active: false,
		else_children: Vec::new(),
	}];

	loop {
		let byte = cursor.read_u8()?;
		let opcode =
			Opcode::try_from(byte).map_err(|_| DecodeError::UnspecifiedMalformed(format!("unsupported opcode 0x{byte:02X}")))?;

		if opcode == Opcode::End {
			let builder = builders.pop().expect("at least the root builder is always open");
			if builder.kind == BlockKind::If && !builder.else_active && builder.return_type.arity() == 1 {
				return Err(DecodeError::type_mismatch(format!("{}", builder.return_type), "no else branch"));
			}
			let frame = state.end_block()?;
			let block = Block {
				kind: builder.kind,
				byte_offset: builder.byte_start..cursor.position(),
				return_type: builder.return_type,
				entry_stack_depth: frame.entry_depth,
				int_const_start: frame.int_const_start,
				branch_table_start: frame.branch_table_start,
				children: builder.children,
				else_children: if builder.kind == BlockKind::If && builder.else_active { Some(builder.else_children) } else { None },
			};
			if builders.is_empty() {
				// Closed the implicit root frame: the function body is complete.
				let (int_constants, branch_tables, profile_count, max_stack_size) = state.into_side_tables();
				let code_entry =
					CodeEntry { locals, root: block, int_constants, branch_tables, profile_count, max_stack_size };
				sink.new_root_node(function_index, &code_entry);
				return Ok(code_entry);
			}
			state.push_block_type(block.return_type);
			let node = match block.kind {
				BlockKind::Block => sink.new_block_node(block),
				BlockKind::Loop => sink.new_loop_node(block),
				BlockKind::If => sink.new_if_node(block),
			};
			builders.last_mut().unwrap().active_children().push(node);
			continue;
		}

		if opcode == Opcode::Else {
			let top = builders.last_mut().ok_or_else(|| DecodeError::UnspecifiedMalformed("else outside if".into()))?;
			if top.kind != BlockKind::If || top.else_active {
				return Err(DecodeError::UnspecifiedMalformed("else without a matching if".into()));
			}
			top.else_active = true;
			let return_type = top.return_type;
			state.end_block()?;
			state.start_block(BlockKind::If, return_type);
			continue;
		}

		decode_instruction(opcode, cursor, &mut state, symtab, sink, &locals, &mut builders)?;
	}
}

fn decode_instruction(
	opcode: Opcode,
	cursor: &mut ByteCursor,
	state: &mut ExecutionState,
	symtab: &dyn SymbolTable,
	sink: &mut dyn NodeSink,
	locals: &[ValueType],
	builders: &mut Vec<Builder>,
) -> DecodeResult<()> {
	use Opcode::*;

	let local_type = |index: u32| -> DecodeResult<ValueType> {
		locals.get(index as usize).copied().ok_or(DecodeError::UnknownLocal { index, len: locals.len() as u32 })
	};

	match opcode {
		Unreachable => {
			state.mark_unreachable();
			push_plain(builders, PlainInstr::Unreachable);
		}
		Nop => push_plain(builders, PlainInstr::Nop),

		Block | Loop | If => {
			let kind = match opcode {
				Block => BlockKind::Block,
				Loop => BlockKind::Loop,
				If => BlockKind::If,
				_ => unreachable!(),
			};
			if kind == BlockKind::If {
				state.pop_checked(ValueType::I32)?;
			}
			let block_type = BlockType::from_byte(cursor.read_u8()?)?;
			state.start_block(kind, block_type);
			builders.push(Builder {
				kind,
				return_type: block_type,
				byte_start: cursor.position(),
				children: Vec::new(),
				else_active: false,
				else_children: Vec::new(),
			});
		}

		Br => {
			let label = cursor.read_leb_u32()?;
			state.record_branch(label, false)?;
			push_plain(builders, PlainInstr::Br(label));
			state.mark_unreachable();
		}
		BrIf => {
			let label = cursor.read_leb_u32()?;
			state.pop_checked(ValueType::I32)?;
			state.record_branch(label, true)?;
			push_plain(builders, PlainInstr::BrIf(label));
		}
		BrTable => {
			let count = cursor.read_leb_u32()?;
			let mut targets = Vec::with_capacity(count as usize);
			for _ in 0..count {
				targets.push(cursor.read_leb_u32()?);
			}
			let default = cursor.read_leb_u32()?;
			state.pop_checked(ValueType::I32)?;
			state.record_br_table(&targets, default)?;
			push_plain(builders, PlainInstr::BrTable { targets, default });
			state.mark_unreachable();
		}
		Return => {
			state.record_return()?;
			push_plain(builders, PlainInstr::Return);
			state.mark_unreachable();
		}
		Call => {
			let callee = cursor.read_leb_u32()?;
			let callee_type_index = symtab
				.function_type_index(callee)
				.ok_or(DecodeError::UnknownFunction { index: callee, len: symtab.function_count() })?;
			let callee_type = symtab
				.function_type(callee_type_index)
				.ok_or(DecodeError::UnknownType { index: callee_type_index, len: symtab.type_count() })?
				.clone();
			for param in callee_type.params.iter().rev() {
				state.pop_checked(*param)?;
			}
			for result in &callee_type.results {
				state.push(*result);
			}
			let node = sink.new_call_stub_node(callee);
			builders.last_mut().unwrap().active_children().push(node);
		}
		CallIndirect => {
			if !symtab.has_table() {
				return Err(DecodeError::UnspecifiedInvalid("call_indirect requires a table".into()));
			}
			let type_index = cursor.read_leb_u32()?;
			let zero_flag = cursor.read_u8()?;
			if zero_flag != 0 {
				return Err(DecodeError::ZeroFlagExpected(zero_flag));
			}
			let callee_type = symtab
				.function_type(type_index)
				.ok_or(DecodeError::UnknownType { index: type_index, len: symtab.type_count() })?
				.clone();
			state.pop_checked(ValueType::I32)?;
			for param in callee_type.params.iter().rev() {
				state.pop_checked(*param)?;
			}
			for result in &callee_type.results {
				state.push(*result);
			}
			state.record_call_indirect();
			let node = sink.new_indirect_call_node(type_index);
			builders.last_mut().unwrap().active_children().push(node);
		}

		Drop => {
			state.pop()?;
			push_plain(builders, PlainInstr::Drop);
		}
		Select => {
			state.pop_checked(ValueType::I32)?;
			let b = state.pop()?;
			let a = state.pop()?;
			match (a, b) {
				(StackType::Known(t1), StackType::Known(t2)) if t1 == t2 => state.push(t1),
				(StackType::Known(t1), StackType::Unknown) => state.push(t1),
				(StackType::Unknown, StackType::Known(t2)) => state.push(t2),
				(StackType::Unknown, StackType::Unknown) => state.push_unknown(),
				(StackType::Known(t1), StackType::Known(t2)) => return Err(DecodeError::type_mismatch_value(t1, t2)),
			}
			push_plain(builders, PlainInstr::Select);
		}

		LocalGet => {
			let index = cursor.read_leb_u32()?;
			state.push(local_type(index)?);
			push_plain(builders, PlainInstr::LocalGet(index));
		}
		LocalSet => {
			let index = cursor.read_leb_u32()?;
			state.pop_checked(local_type(index)?)?;
			push_plain(builders, PlainInstr::LocalSet(index));
		}
		LocalTee => {
			let index = cursor.read_leb_u32()?;
			let ty = local_type(index)?;
			state.pop_checked(ty)?;
			state.push(ty);
			push_plain(builders, PlainInstr::LocalTee(index));
		}
		GlobalGet => {
			let index = cursor.read_leb_u32()?;
			let (value_type, _) =
				symtab.global_type(index).ok_or(DecodeError::UnknownGlobal { index, len: symtab.global_count() })?;
			state.push(value_type);
			push_plain(builders, PlainInstr::GlobalGet(index));
		}
		GlobalSet => {
			let index = cursor.read_leb_u32()?;
			let (value_type, mutable) =
				symtab.global_type(index).ok_or(DecodeError::UnknownGlobal { index, len: symtab.global_count() })?;
			if !mutable {
				return Err(DecodeError::ImmutableGlobalWrite(index));
			}
			state.pop_checked(value_type)?;
			push_plain(builders, PlainInstr::GlobalSet(index));
		}

		MemorySize => {
			if !symtab.has_memory() {
				return Err(DecodeError::UnspecifiedInvalid("memory.size requires a memory".into()));
			}
			let reserved = cursor.read_u8()?;
			if reserved != 0 {
				return Err(DecodeError::ZeroFlagExpected(reserved));
			}
			state.push(ValueType::I32);
			push_plain(builders, PlainInstr::MemorySize);
		}
		MemoryGrow => {
			if !symtab.has_memory() {
				return Err(DecodeError::UnspecifiedInvalid("memory.grow requires a memory".into()));
			}
			let reserved = cursor.read_u8()?;
			if reserved != 0 {
				return Err(DecodeError::ZeroFlagExpected(reserved));
			}
			state.pop_checked(ValueType::I32)?;
			state.push(ValueType::I32);
			push_plain(builders, PlainInstr::MemoryGrow);
		}

		I32Const => {
			let v = cursor.read_leb_s32()?;
			state.push(ValueType::I32);
			push_plain(builders, PlainInstr::I32Const(v));
		}
		I64Const => {
			let v = cursor.read_leb_s64()?;
			state.push(ValueType::I64);
			push_plain(builders, PlainInstr::I64Const(v));
		}
		F32Const => {
			let v = cursor.read_f32_le()?;
			state.push(ValueType::F32);
			push_plain(builders, PlainInstr::F32Const(v));
		}
		F64Const => {
			let v = cursor.read_f64_le()?;
			state.push(ValueType::F64);
			push_plain(builders, PlainInstr::F64Const(v));
		}

		other => {
			if let Some((value_type, width_bits, is_store)) = memory_op_info(other) {
				if !symtab.has_memory() {
					return Err(DecodeError::UnspecifiedInvalid("memory instruction requires a memory".into()));
				}
				let memarg = read_memarg(cursor)?;
				if (1u32 << memarg.align) > width_bits / 8 {
					return Err(DecodeError::AlignmentLargerThanNatural { align: memarg.align, width: width_bits });
				}
				if is_store {
					state.pop_checked(value_type)?;
					state.pop_checked(ValueType::I32)?;
					push_plain(builders, PlainInstr::Store { op: other, memarg });
				} else {
					state.pop_checked(ValueType::I32)?;
					state.push(value_type);
					push_plain(builders, PlainInstr::Load { op: other, memarg });
				}
			} else if let Some(sig) = numeric_signature(other) {
				for _ in 0..sig.arity {
					state.pop_checked(sig.operand)?;
				}
				state.push(sig.result);
				push_plain(builders, PlainInstr::Numeric(other));
			} else {
				return Err(DecodeError::UnspecifiedMalformed(format!("opcode {other:?} is not supported by the MVP")));
			}
		}
	}

	trace!(?opcode, stack_len = state.stack_len(), "decoded instruction");
	Ok(())
}

fn push_plain(builders: &mut [Builder], instr: PlainInstr) {
	builders.last_mut().unwrap().active_children().push(Node::Plain(instr));
}
