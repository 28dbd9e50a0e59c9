use crate::module::{ConstExpr, FunctionType, MemoryType, TableType};
use crate::value::ValueType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionEntry {
	pub type_index: u32,
	pub is_import: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalEntry {
	pub value_type: ValueType,
	pub mutable: bool,
	pub is_import: bool,
}

/// The mutable registry of types, functions, tables, memories, globals, and exports that
/// section readers populate and the abstract interpreter queries. Index spaces are
/// imports-then-declarations throughout, matching the binary format's own numbering.
///
/// Method names mirror the specification's interface (`allocateFunctionType`,
/// `importFunction`, `declareGlobal`, `setStartFunction`, ...) adapted to idiomatic
/// snake_case.
///
/// `Send + Sync` so a `&mut dyn SymbolTable` can cross the single code-section worker
/// thread [`crate::async_driver::AsyncDriver`] spawns for large modules.
pub trait SymbolTable: Send + Sync {
	fn register_type(&mut self, ty: FunctionType) -> u32;
	fn type_count(&self) -> u32;
	fn function_type(&self, index: u32) -> Option<&FunctionType>;

	fn import_function(&mut self, type_index: u32) -> u32;
	fn import_table(&mut self, table: TableType);
	fn import_memory(&mut self, memory: MemoryType);
	fn import_global(&mut self, value_type: ValueType, mutable: bool) -> u32;

	fn declare_function(&mut self, type_index: u32) -> u32;
	fn allocate_table(&mut self, table: TableType);
	fn allocate_memory(&mut self, memory: MemoryType);
	fn declare_global(&mut self, value_type: ValueType, mutable: bool, init: ConstExpr) -> u32;

	fn export_function(&mut self, name: String, index: u32);
	fn export_table(&mut self, name: String, index: u32);
	fn export_memory(&mut self, name: String, index: u32);
	fn export_global(&mut self, name: String, index: u32);

	fn set_start_function(&mut self, index: u32);

	fn function_count(&self) -> u32;
	fn imported_function_count(&self) -> u32;
	fn function_type_index(&self, function_index: u32) -> Option<u32>;

	fn global_count(&self) -> u32;
	fn imported_global_count(&self) -> u32;
	fn global_type(&self, global_index: u32) -> Option<(ValueType, bool)>;

	fn has_table(&self) -> bool;
	fn has_memory(&self) -> bool;
	fn table_type(&self) -> Option<TableType>;
	fn memory_type(&self) -> Option<MemoryType>;
}

/// Reference `SymbolTable` backed by plain `Vec`s; what the decoder uses when the caller
/// does not supply its own.
#[derive(Debug, Default)]
pub struct DefaultSymbolTable {
	types: Vec<FunctionType>,
	functions: Vec<FunctionEntry>,
	globals: Vec<GlobalEntry>,
	table: Option<TableType>,
	memory: Option<MemoryType>,
	start: Option<u32>,
}

impl SymbolTable for DefaultSymbolTable {
	fn register_type(&mut self, ty: FunctionType) -> u32 {
		self.types.push(ty);
		(self.types.len() - 1) as u32
	}

	fn type_count(&self) -> u32 {
		self.types.len() as u32
	}

	fn function_type(&self, index: u32) -> Option<&FunctionType> {
		self.types.get(index as usize)
	}

	fn import_function(&mut self, type_index: u32) -> u32 {
		self.functions.push(FunctionEntry { type_index, is_import: true });
		(self.functions.len() - 1) as u32
	}

	fn import_table(&mut self, table: TableType) {
		self.table = Some(table);
	}

	fn import_memory(&mut self, memory: MemoryType) {
		self.memory = Some(memory);
	}

	fn import_global(&mut self, value_type: ValueType, mutable: bool) -> u32 {
		self.globals.push(GlobalEntry { value_type, mutable, is_import: true });
		(self.globals.len() - 1) as u32
	}

	fn declare_function(&mut self, type_index: u32) -> u32 {
		self.functions.push(FunctionEntry { type_index, is_import: false });
		(self.functions.len() - 1) as u32
	}

	fn allocate_table(&mut self, table: TableType) {
		self.table = Some(table);
	}

	fn allocate_memory(&mut self, memory: MemoryType) {
		self.memory = Some(memory);
	}

	fn declare_global(&mut self, value_type: ValueType, mutable: bool, _init: ConstExpr) -> u32 {
		self.globals.push(GlobalEntry { value_type, mutable, is_import: false });
		(self.globals.len() - 1) as u32
	}

	fn export_function(&mut self, _name: String, _index: u32) {}
	fn export_table(&mut self, _name: String, _index: u32) {}
	fn export_memory(&mut self, _name: String, _index: u32) {}
	fn export_global(&mut self, _name: String, _index: u32) {}

	fn set_start_function(&mut self, index: u32) {
		self.start = Some(index);
	}

	fn function_count(&self) -> u32 {
		self.functions.len() as u32
	}

	fn imported_function_count(&self) -> u32 {
		self.functions.iter().filter(|f| f.is_import).count() as u32
	}

	fn function_type_index(&self, function_index: u32) -> Option<u32> {
		self.functions.get(function_index as usize).map(|f| f.type_index)
	}

	fn global_count(&self) -> u32 {
		self.globals.len() as u32
	}

	fn imported_global_count(&self) -> u32 {
		self.globals.iter().filter(|g| g.is_import).count() as u32
	}

	fn global_type(&self, global_index: u32) -> Option<(ValueType, bool)> {
		self.globals.get(global_index as usize).map(|g| (g.value_type, g.mutable))
	}

	fn has_table(&self) -> bool {
		self.table.is_some()
	}

	fn has_memory(&self) -> bool {
		self.memory.is_some()
	}

	fn table_type(&self) -> Option<TableType> {
		self.table
	}

	fn memory_type(&self) -> Option<MemoryType> {
		self.memory
	}
}
