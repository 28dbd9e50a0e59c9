//! §4.6: re-running the already-validated global/data/element sections against a live
//! instance's collaborators, e.g. when a host resets a WebAssembly instance without
//! re-parsing its module. No validation happens here — the byte stream was already checked
//! once by [`crate::decode::decode`]; this just replays the initializer semantics.

use crate::collab::{GlobalStore, GlobalValue, MemorySink};
use crate::module::{ConstExpr, Module};

/// Re-initializes `store`, `memory`, and (via `write_table`) the instance's table from an
/// already-decoded [`Module`]. `write_table` takes `(table_index, offset, function_indices)`;
/// this crate has no `TableSink` trait of its own (§1 treats tables as the downstream
/// executor's concern), so the callback lets the caller plug in whatever representation it
/// uses.
pub fn reset(module: &Module, store: &mut dyn GlobalStore, memory: &mut dyn MemorySink, mut write_table: impl FnMut(u32, u32, &[u32])) {
	let imported_globals = module.imported_global_count();
	for (i, global) in module.globals.iter().enumerate() {
		let index = imported_globals + i as u32;
		let value = resolve_const_expr(&global.init, store);
		store.set(index, value);
	}

	for segment in &module.data {
		let offset = resolve_offset(&segment.offset, store);
		memory.write(offset, &segment.bytes);
	}

	for segment in &module.elements {
		let offset = resolve_offset(&segment.offset, store);
		write_table(segment.table_index, offset, &segment.function_indices);
	}
}

/// Evaluates a constant expression against the current state of `store`; for `global.get`
/// this reads the *current* value of the referenced (necessarily already-linked, imported)
/// global rather than its own initializer, matching §4.6's reset semantics.
fn resolve_const_expr(expr: &ConstExpr, store: &dyn GlobalStore) -> GlobalValue {
	match expr {
		ConstExpr::I32(v) => GlobalValue::I32(*v),
		ConstExpr::I64(v) => GlobalValue::I64(*v),
		ConstExpr::F32(v) => GlobalValue::F32(*v),
		ConstExpr::F64(v) => GlobalValue::F64(*v),
		ConstExpr::GlobalGet(index) => store.get(*index).1,
	}
}

fn resolve_offset(expr: &ConstExpr, store: &dyn GlobalStore) -> u32 {
	match resolve_const_expr(expr, store) {
		GlobalValue::I32(v) => v as u32,
		// Offsets are always validated to be i32 constant expressions by the decoder
		// (§3 invariant 7); any other variant here would mean the byte stream changed
		// since it was parsed, which is outside this pass's contract.
		_ => 0,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::module::{DataSegment, ElementSegment, Global};
	use crate::value::ValueType;
	use std::cell::RefCell;
	use std::collections::HashMap;

	struct FakeGlobalStore {
		values: HashMap<u32, (ValueType, GlobalValue)>,
	}

	impl GlobalStore for FakeGlobalStore {
		fn get(&self, index: u32) -> (ValueType, GlobalValue) {
			self.values[&index]
		}

		fn set(&mut self, index: u32, value: GlobalValue) {
			let entry = self.values.entry(index).or_insert((ValueType::I32, value));
			entry.1 = value;
		}
	}

	struct FakeMemory {
		bytes: RefCell<Vec<u8>>,
	}

	impl MemorySink for FakeMemory {
		fn write(&mut self, offset: u32, bytes: &[u8]) {
			let mut mem = self.bytes.borrow_mut();
			let end = offset as usize + bytes.len();
			if mem.len() < end {
				mem.resize(end, 0);
			}
			mem[offset as usize..end].copy_from_slice(bytes);
		}

		fn size_bytes(&self) -> u32 {
			self.bytes.borrow().len() as u32
		}
	}

	#[test]
	fn resets_globals_data_and_elements() {
		let mut module = Module::default();
		module.globals.push(Global { value_type: ValueType::I32, mutable: true, init: ConstExpr::I32(42) });
		module.data.push(DataSegment { memory_index: 0, offset: ConstExpr::I32(4), bytes: vec![1, 2, 3] });
		module.elements.push(ElementSegment { table_index: 0, offset: ConstExpr::I32(0), function_indices: vec![7] });

		let mut store = FakeGlobalStore { values: HashMap::new() };
		let mut memory = FakeMemory { bytes: RefCell::new(vec![0; 16]) };
		let mut table_writes = Vec::new();

		reset(&module, &mut store, &mut memory, |table_index, offset, indices| {
			table_writes.push((table_index, offset, indices.to_vec()));
		});

		assert_eq!(store.get(0), (ValueType::I32, GlobalValue::I32(42)));
		assert_eq!(&memory.bytes.borrow()[4..7], &[1, 2, 3]);
		assert_eq!(table_writes, vec![(0, 0, vec![7])]);
	}
}
