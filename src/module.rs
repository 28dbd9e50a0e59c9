use crate::instr::PlainInstr;
use crate::opcode::ExternKind;
use crate::value::{BlockType, ElemType, ValueType};

/// A constant expression: a single `*.const` or `global.get` of an imported global, followed
/// by `end`. Used for global initializers and element/data segment offsets (invariants 6-7).
#[derive(Debug, Clone, PartialEq)]
pub enum ConstExpr {
	I32(i32),
	I64(i64),
	F32(f32),
	F64(f64),
	GlobalGet(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
	pub min: u32,
	pub max: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableType {
	pub elem_type: ElemType,
	pub limits: Limits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
	pub limits: Limits,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportDesc {
	Function(u32),
	Table(TableType),
	Memory(MemoryType),
	Global { value_type: ValueType, mutable: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
	pub module: String,
	pub name: String,
	pub desc: ImportDesc,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionType {
	pub params: Vec<ValueType>,
	pub results: Vec<ValueType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
	pub value_type: ValueType,
	pub mutable: bool,
	pub init: ConstExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Export {
	pub name: String,
	pub kind: ExternKind,
	pub index: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementSegment {
	pub table_index: u32,
	pub offset: ConstExpr,
	pub function_indices: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
	pub memory_index: u32,
	pub offset: ConstExpr,
	pub bytes: Vec<u8>,
}

/// A custom section is kept by name and byte span rather than eagerly copied, per §3: most
/// consumers never read most custom sections, so the bytes stay in the original buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomSection {
	pub name: String,
	pub span: std::ops::Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
	Block,
	Loop,
	If,
}

/// One block, loop, or if/else body. Side-table slices are expressed as start offsets into
/// the owning [`CodeEntry`]'s `int_constants`/`branch_tables` vectors rather than as owned
/// sub-vectors or pointers, so the tables stay contiguous and trivially serializable (§9).
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
	pub kind: BlockKind,
	pub byte_offset: std::ops::Range<usize>,
	pub return_type: BlockType,
	pub entry_stack_depth: u32,
	pub int_const_start: u32,
	pub branch_table_start: u32,
	pub children: Vec<Node>,
	/// Only ever `Some` for `kind == BlockKind::If` when the body had an `else` arm.
	pub else_children: Option<Vec<Node>>,
}

/// One node of a function body's block tree, as constructed through [`crate::collab::NodeSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
	Plain(PlainInstr),
	Block(Block),
	Loop(Block),
	If(Block),
	/// Placeholder for a resolved call target; the actual callable is wired up by a
	/// [`crate::collab::LinkerQueue`] action once all modules are linked.
	Call { function_index: u32 },
	CallIndirect { type_index: u32 },
}

/// The validated, side-tabled body of one function, produced by
/// [`crate::decode::body::FunctionBodyDecoder`].
#[derive(Debug, Clone, PartialEq)]
pub struct CodeEntry {
	/// Argument types followed by declared locals, in index order.
	pub locals: Vec<ValueType>,
	pub root: Block,
	pub int_constants: Vec<i32>,
	pub branch_tables: Vec<Vec<i32>>,
	pub profile_count: u32,
	pub max_stack_size: u32,
}

/// A declared (non-imported) function. Immutable after declaration in the function section;
/// `code` is filled in once the code section is decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
	pub type_index: u32,
	pub code: Option<CodeEntry>,
}

/// The fully decoded and validated module, ready to hand to a downstream executor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
	pub types: Vec<FunctionType>,
	pub imports: Vec<Import>,
	pub functions: Vec<Function>,
	pub table: Option<TableType>,
	pub memory: Option<MemoryType>,
	pub globals: Vec<Global>,
	pub exports: Vec<Export>,
	pub start: Option<u32>,
	pub elements: Vec<ElementSegment>,
	pub data: Vec<DataSegment>,
	pub custom_sections: Vec<CustomSection>,
	pub names: Option<crate::decode::name::ModuleNames>,
}

impl Module {
	/// Number of imported functions; the function index space is imports-then-declared, so
	/// a raw function index `i` refers to an import when `i < imported_function_count()`.
	pub fn imported_function_count(&self) -> u32 {
		self.imports.iter().filter(|i| matches!(i.desc, ImportDesc::Function(_))).count() as u32
	}

	pub fn total_function_count(&self) -> u32 {
		self.imported_function_count() + self.functions.len() as u32
	}

	pub fn imported_global_count(&self) -> u32 {
		self.imports.iter().filter(|i| matches!(i.desc, ImportDesc::Global { .. })).count() as u32
	}

	pub fn total_global_count(&self) -> u32 {
		self.imported_global_count() + self.globals.len() as u32
	}
}
