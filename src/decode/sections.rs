//! The module-level section loop (§4.2): magic/version check, section ordering and size
//! bookkeeping, and the eleven per-section readers. The code section is the one exception —
//! it hands each function body off to [`crate::decode::body::decode_function_body`], which
//! drives the abstract interpreter.

use tracing::{debug, trace, warn};

use crate::async_driver::AsyncDriver;
use crate::collab::{LinkerQueue, NodeSink, SymbolTable};
use crate::cursor::ByteCursor;
use crate::decode::body::decode_function_body;
use crate::decode::name;
use crate::error::{DecodeError, DecodeResult};
use crate::limits::ParserConfig;
use crate::module::{
	ConstExpr, CustomSection, DataSegment, ElementSegment, Export, Function, FunctionType, Global, Import, ImportDesc,
	Limits, MemoryType, Module, TableType,
};
use crate::opcode::{ExternKind, LimitsFlag, Mutability, Opcode, SectionId};
use crate::value::{ElemType, ValueType};

const MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];
const VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Decodes and validates a complete module, driving `symtab`/`sink`/`linker` as it goes.
/// This is the entry point [`crate::decode_module`] wires up with the reference
/// collaborator implementations; embedders with their own `SymbolTable`/`NodeSink`/
/// `LinkerQueue` call it directly.
pub fn decode(
	bytes: &[u8],
	config: &ParserConfig,
	symtab: &mut dyn SymbolTable,
	sink: &mut dyn NodeSink,
	linker: &mut dyn LinkerQueue,
) -> DecodeResult<Module> {
	if bytes.len() as u64 > config.limits.max_module_size as u64 {
		return Err(DecodeError::ResourceLimitExceeded {
			which: "module size",
			limit: config.limits.max_module_size,
			actual: bytes.len().min(u32::MAX as usize) as u32,
		});
	}

	let mut cursor = ByteCursor::new(bytes);
	let decoder = ModuleDecoder { cursor: &mut cursor, config, symtab, sink, linker, module: Module::default(), last_non_custom: None };
	decoder.run()
}

struct ModuleDecoder<'c, 'd> {
	cursor: &'d mut ByteCursor<'c>,
	config: &'d ParserConfig,
	symtab: &'d mut dyn SymbolTable,
	sink: &'d mut dyn NodeSink,
	linker: &'d mut dyn LinkerQueue,
	module: Module,
	last_non_custom: Option<u8>,
}

impl<'c, 'd> ModuleDecoder<'c, 'd> {
	fn run(mut self) -> DecodeResult<Module> {
		let mut magic = [0u8; 4];
		for slot in &mut magic {
			*slot = self.cursor.read_u8()?;
		}
		if magic != MAGIC {
			return Err(DecodeError::InvalidMagicNumber);
		}
		let mut version = [0u8; 4];
		for slot in &mut version {
			*slot = self.cursor.read_u8()?;
		}
		if version != VERSION {
			return Err(DecodeError::InvalidVersionNumber(version));
		}

		while !self.cursor.eof() {
			let id = self.cursor.read_u8()?;
			let size = self.cursor.read_leb_u32()?;
			let start = self.cursor.position();
			let section = SectionId::try_from(id).map_err(|_| DecodeError::MalformedSectionId(id))?;

			if section != SectionId::Custom {
				let id_value = section as u8;
				if let Some(last) = self.last_non_custom {
					if id_value == last {
						return Err(DecodeError::DuplicatedSection(id_value));
					}
					if id_value <= last {
						return Err(DecodeError::InvalidSectionOrder { found: id_value, last_seen: last });
					}
				}
				self.last_non_custom = Some(id_value);
			}

			debug!(?section, size, "entering section");
			match section {
				SectionId::Custom => self.read_custom_section(size as usize)?,
				SectionId::Type => self.read_type_section()?,
				SectionId::Import => self.read_import_section()?,
				SectionId::Function => self.read_function_section()?,
				SectionId::Table => self.read_table_section()?,
				SectionId::Memory => self.read_memory_section()?,
				SectionId::Global => self.read_global_section()?,
				SectionId::Export => self.read_export_section()?,
				SectionId::Start => self.read_start_section()?,
				SectionId::Element => self.read_element_section()?,
				SectionId::Code => self.read_code_section()?,
				SectionId::Data => self.read_data_section()?,
			}

			let consumed = (self.cursor.position() - start) as u32;
			if consumed != size {
				return Err(DecodeError::SectionSizeMismatch { declared: size, actual: consumed });
			}
		}

		Ok(self.module)
	}

	fn check_count(&self, count: u32, limit: u32, which: &'static str) -> DecodeResult<()> {
		if count > limit {
			return Err(DecodeError::ResourceLimitExceeded { which, limit, actual: count });
		}
		Ok(())
	}

	fn read_limits(&mut self) -> DecodeResult<Limits> {
		let flag = self.cursor.read_u8()?;
		let flag = LimitsFlag::try_from(flag).map_err(|_| DecodeError::UnspecifiedMalformed(format!("limits flag 0x{flag:02X}")))?;
		let min = self.cursor.read_leb_u32()?;
		let max = match flag {
			LimitsFlag::Min => None,
			LimitsFlag::MinMax => Some(self.cursor.read_leb_u32()?),
		};
		if let Some(max) = max {
			if min > max {
				return Err(DecodeError::LimitMinimumGreaterThanMaximum { min, max });
			}
		}
		Ok(Limits { min, max })
	}

	fn check_memory_limits(&self, limits: Limits) -> DecodeResult<()> {
		let cap = self.config.limits.max_memory_pages;
		if limits.min > cap {
			return Err(DecodeError::MemorySizeLimitExceeded(limits.min));
		}
		if let Some(max) = limits.max {
			if max > cap {
				return Err(DecodeError::MemorySizeLimitExceeded(max));
			}
		}
		Ok(())
	}

	fn read_const_expr(&mut self, expected: Option<ValueType>) -> DecodeResult<ConstExpr> {
		let byte = self.cursor.read_u8()?;
		let opcode = Opcode::try_from(byte)
			.map_err(|_| DecodeError::UnspecifiedMalformed(format!("opcode 0x{byte:02X} is not valid in a constant expression")))?;
		let expr = match opcode {
			Opcode::I32Const => ConstExpr::I32(self.cursor.read_leb_s32()?),
			Opcode::I64Const => ConstExpr::I64(self.cursor.read_leb_s64()?),
			Opcode::F32Const => ConstExpr::F32(self.cursor.read_f32_le()?),
			Opcode::F64Const => ConstExpr::F64(self.cursor.read_f64_le()?),
			Opcode::GlobalGet => {
				let index = self.cursor.read_leb_u32()?;
				if index >= self.symtab.imported_global_count() {
					return Err(DecodeError::UnspecifiedInvalid(format!(
						"global.get {index} in a constant expression must reference an already-declared imported global"
					)));
				}
				ConstExpr::GlobalGet(index)
			}
			other => return Err(DecodeError::UnspecifiedMalformed(format!("opcode {other:?} is not valid in a constant expression"))),
		};
		if let Some(expected_type) = expected {
			let actual = self.const_expr_type(&expr);
			if actual != expected_type {
				return Err(DecodeError::type_mismatch_value(expected_type, actual));
			}
		}
		let end = self.cursor.read_u8()?;
		if end != Opcode::End as u8 {
			return Err(DecodeError::UnspecifiedMalformed("constant expression missing terminating end".into()));
		}
		Ok(expr)
	}

	fn const_expr_type(&self, expr: &ConstExpr) -> ValueType {
		match expr {
			ConstExpr::I32(_) => ValueType::I32,
			ConstExpr::I64(_) => ValueType::I64,
			ConstExpr::F32(_) => ValueType::F32,
			ConstExpr::F64(_) => ValueType::F64,
			ConstExpr::GlobalGet(index) => self.symtab.global_type(*index).map(|(t, _)| t).unwrap_or(ValueType::I32),
		}
	}

	fn read_type_section(&mut self) -> DecodeResult<()> {
		let count = self.cursor.read_leb_u32()?;
		self.check_count(count, self.config.limits.max_types, "types")?;
		for _ in 0..count {
			let form = self.cursor.read_u8()?;
			if form != 0x60 {
				return Err(DecodeError::UnspecifiedMalformed(format!("function type form byte 0x{form:02X}, expected 0x60")));
			}
			let param_count = self.cursor.read_leb_u32()?;
			let mut params = Vec::with_capacity(param_count as usize);
			for _ in 0..param_count {
				params.push(ValueType::from_byte(self.cursor.read_u8()?)?);
			}
			let results = self.read_result_type()?;
			let ty = FunctionType { params, results };
			trace!(?ty, "registered function type");
			self.symtab.register_type(ty.clone());
			self.module.types.push(ty);
		}
		Ok(())
	}

	/// Reads a function type's result vector, which per §4.2 accepts three encodings: the
	/// void marker `0x40`, an explicit zero count, or an explicit count of one followed by
	/// the single result's value type. Arity greater than one is `InvalidResultArity`.
	fn read_result_type(&mut self) -> DecodeResult<Vec<ValueType>> {
		if self.cursor.peek_u8(0) == Some(0x40) {
			self.cursor.skip(1)?;
			return Ok(Vec::new());
		}
		let count = self.cursor.read_leb_u32()?;
		match count {
			0 => Ok(Vec::new()),
			1 => Ok(vec![ValueType::from_byte(self.cursor.read_u8()?)?]),
			n => Err(DecodeError::InvalidResultArity(n)),
		}
	}

	fn read_import_section(&mut self) -> DecodeResult<()> {
		let count = self.cursor.read_leb_u32()?;
		self.check_count(count, self.config.limits.max_imports, "imports")?;
		for _ in 0..count {
			let module = self.cursor.read_string()?;
			let name = self.cursor.read_string()?;
			let kind = self.cursor.read_u8()?;
			let kind = ExternKind::try_from(kind).map_err(|_| DecodeError::UnspecifiedMalformed(format!("import kind byte 0x{kind:02X}")))?;
			let desc = match kind {
				ExternKind::Function => {
					let type_index = self.cursor.read_leb_u32()?;
					let type_count = self.symtab.type_count();
					if type_index >= type_count {
						return Err(DecodeError::UnknownType { index: type_index, len: type_count });
					}
					self.symtab.import_function(type_index);
					ImportDesc::Function(type_index)
				}
				ExternKind::Table => {
					let elem_byte = self.cursor.read_u8()?;
					ElemType::try_from(elem_byte)
						.map_err(|_| DecodeError::UnspecifiedMalformed(format!("table element type 0x{elem_byte:02X} is not funcref (0x70)")))?;
					let limits = self.read_limits()?;
					if self.symtab.has_table() {
						return Err(DecodeError::ResourceLimitExceeded { which: "tables", limit: 1, actual: 2 });
					}
					let table = TableType { elem_type: ElemType::FuncRef, limits };
					self.symtab.import_table(table);
					self.module.table = Some(table);
					ImportDesc::Table(table)
				}
				ExternKind::Memory => {
					let limits = self.read_limits()?;
					self.check_memory_limits(limits)?;
					if self.symtab.has_memory() {
						return Err(DecodeError::ResourceLimitExceeded { which: "memories", limit: 1, actual: 2 });
					}
					let memory = MemoryType { limits };
					self.symtab.import_memory(memory);
					self.module.memory = Some(memory);
					ImportDesc::Memory(memory)
				}
				ExternKind::Global => {
					let value_type = ValueType::from_byte(self.cursor.read_u8()?)?;
					let mutability = self.cursor.read_u8()?;
					let mutable = Mutability::try_from(mutability)
						.map_err(|_| DecodeError::UnspecifiedMalformed(format!("mutability byte 0x{mutability:02X}")))?
						== Mutability::Var;
					self.symtab.import_global(value_type, mutable);
					ImportDesc::Global { value_type, mutable }
				}
			};
			debug!(%module, %name, ?desc, "registered import");
			self.module.imports.push(Import { module, name, desc });
		}
		Ok(())
	}

	fn read_function_section(&mut self) -> DecodeResult<()> {
		let count = self.cursor.read_leb_u32()?;
		self.check_count(count, self.config.limits.max_functions, "functions")?;
		for _ in 0..count {
			let type_index = self.cursor.read_leb_u32()?;
			let type_count = self.symtab.type_count();
			if type_index >= type_count {
				return Err(DecodeError::UnknownType { index: type_index, len: type_count });
			}
			self.symtab.declare_function(type_index);
			self.module.functions.push(Function { type_index, code: None });
		}
		Ok(())
	}

	fn read_table_section(&mut self) -> DecodeResult<()> {
		let count = self.cursor.read_leb_u32()?;
		if count > 1 {
			return Err(DecodeError::ResourceLimitExceeded { which: "tables", limit: 1, actual: count });
		}
		for _ in 0..count {
			if self.symtab.has_table() {
				return Err(DecodeError::ResourceLimitExceeded { which: "tables", limit: 1, actual: 2 });
			}
			let elem_byte = self.cursor.read_u8()?;
			ElemType::try_from(elem_byte)
				.map_err(|_| DecodeError::UnspecifiedMalformed(format!("table element type 0x{elem_byte:02X} is not funcref (0x70)")))?;
			let limits = self.read_limits()?;
			let table = TableType { elem_type: ElemType::FuncRef, limits };
			self.symtab.allocate_table(table);
			self.module.table = Some(table);
		}
		Ok(())
	}

	fn read_memory_section(&mut self) -> DecodeResult<()> {
		let count = self.cursor.read_leb_u32()?;
		if count > 1 {
			return Err(DecodeError::ResourceLimitExceeded { which: "memories", limit: 1, actual: count });
		}
		for _ in 0..count {
			if self.symtab.has_memory() {
				return Err(DecodeError::ResourceLimitExceeded { which: "memories", limit: 1, actual: 2 });
			}
			let limits = self.read_limits()?;
			self.check_memory_limits(limits)?;
			let memory = MemoryType { limits };
			self.symtab.allocate_memory(memory);
			self.module.memory = Some(memory);
		}
		Ok(())
	}

	fn read_global_section(&mut self) -> DecodeResult<()> {
		let count = self.cursor.read_leb_u32()?;
		self.check_count(count, self.config.limits.max_globals, "globals")?;
		for _ in 0..count {
			let value_type = ValueType::from_byte(self.cursor.read_u8()?)?;
			let mutability = self.cursor.read_u8()?;
			let mutable = Mutability::try_from(mutability)
				.map_err(|_| DecodeError::UnspecifiedMalformed(format!("mutability byte 0x{mutability:02X}")))?
				== Mutability::Var;
			let init = self.read_const_expr(Some(value_type))?;
			let index = self.symtab.declare_global(value_type, mutable, init.clone());
			self.linker.enqueue(Box::new(move |_context, _instance| {
				// A downstream executor resolves `init` against its own `GlobalStore` and
				// writes slot `index`; see `crate::reset::resolve_const_expr` for the
				// equivalent logic this crate runs itself on instance reset.
				let _ = index;
			}));
			self.module.globals.push(Global { value_type, mutable, init });
		}
		Ok(())
	}

	fn read_export_section(&mut self) -> DecodeResult<()> {
		let count = self.cursor.read_leb_u32()?;
		self.check_count(count, self.config.limits.max_exports, "exports")?;
		for _ in 0..count {
			let name = self.cursor.read_string()?;
			let kind = self.cursor.read_u8()?;
			let kind = ExternKind::try_from(kind).map_err(|_| DecodeError::UnspecifiedMalformed(format!("export kind byte 0x{kind:02X}")))?;
			let index = self.cursor.read_leb_u32()?;
			match kind {
				ExternKind::Function => {
					let len = self.symtab.function_count();
					if index >= len {
						return Err(DecodeError::UnknownFunction { index, len });
					}
					self.symtab.export_function(name.clone(), index);
				}
				ExternKind::Table => {
					if index != 0 || !self.symtab.has_table() {
						return Err(DecodeError::UnknownTable { index, len: if self.symtab.has_table() { 1 } else { 0 } });
					}
					self.symtab.export_table(name.clone(), index);
				}
				ExternKind::Memory => {
					if index != 0 || !self.symtab.has_memory() {
						return Err(DecodeError::UnknownMemory { index, len: if self.symtab.has_memory() { 1 } else { 0 } });
					}
					self.symtab.export_memory(name.clone(), index);
				}
				ExternKind::Global => {
					let len = self.symtab.global_count();
					if index >= len {
						return Err(DecodeError::UnknownGlobal { index, len });
					}
					self.symtab.export_global(name.clone(), index);
				}
			}
			self.module.exports.push(Export { name, kind, index });
		}
		Ok(())
	}

	fn read_start_section(&mut self) -> DecodeResult<()> {
		let index = self.cursor.read_leb_u32()?;
		let len = self.symtab.function_count();
		let type_index = self.symtab.function_type_index(index).ok_or(DecodeError::UnknownFunction { index, len })?;
		let ty = self
			.symtab
			.function_type(type_index)
			.ok_or(DecodeError::UnknownType { index: type_index, len: self.symtab.type_count() })?;
		if !ty.params.is_empty() || !ty.results.is_empty() {
			return Err(DecodeError::type_mismatch("() -> ()", format!("{:?} -> {:?}", ty.params, ty.results)));
		}
		self.symtab.set_start_function(index);
		self.module.start = Some(index);
		Ok(())
	}

	fn read_element_section(&mut self) -> DecodeResult<()> {
		let count = self.cursor.read_leb_u32()?;
		self.check_count(count, self.config.limits.max_element_segments, "element segments")?;
		for _ in 0..count {
			let table_index = self.cursor.read_leb_u32()?;
			if table_index != 0 || !self.symtab.has_table() {
				return Err(DecodeError::UnknownTable { index: table_index, len: if self.symtab.has_table() { 1 } else { 0 } });
			}
			let offset = self.read_const_expr(Some(ValueType::I32))?;
			let func_count = self.cursor.read_leb_u32()?;
			let mut function_indices = Vec::with_capacity(func_count as usize);
			for _ in 0..func_count {
				let index = self.cursor.read_leb_u32()?;
				let len = self.symtab.function_count();
				if index >= len {
					return Err(DecodeError::UnknownFunction { index, len });
				}
				function_indices.push(index);
			}
			let segment = ElementSegment { table_index, offset, function_indices: function_indices.clone() };
			self.linker.enqueue(Box::new(move |_context, _instance| {
				// A downstream executor resolves `offset` and writes `function_indices` into
				// table `table_index`; see `crate::reset::reset` for the equivalent logic.
				let _ = (table_index, function_indices);
			}));
			self.module.elements.push(segment);
		}
		Ok(())
	}

	fn read_data_section(&mut self) -> DecodeResult<()> {
		let count = self.cursor.read_leb_u32()?;
		self.check_count(count, self.config.limits.max_data_segments, "data segments")?;
		for _ in 0..count {
			let memory_index = self.cursor.read_leb_u32()?;
			if memory_index != 0 || !self.symtab.has_memory() {
				return Err(DecodeError::UnknownMemory { index: memory_index, len: if self.symtab.has_memory() { 1 } else { 0 } });
			}
			let offset = self.read_const_expr(Some(ValueType::I32))?;
			let len = self.cursor.read_leb_u32()?;
			let bytes = self.cursor.read_bytes(len as usize)?.to_vec();
			if let ConstExpr::I32(offset_value) = offset {
				if let Some(memory) = self.symtab.memory_type() {
					let memory_bytes = memory.limits.min as u64 * 65536;
					let end = offset_value as u32 as u64 + bytes.len() as u64;
					if end > memory_bytes {
						return Err(DecodeError::DataSegmentDoesNotFit {
							offset: offset_value as u32,
							data_len: bytes.len() as u32,
							memory_len: memory_bytes.min(u32::MAX as u64) as u32,
						});
					}
				}
			}
			let segment = DataSegment { memory_index, offset, bytes: bytes.clone() };
			self.linker.enqueue(Box::new(move |_context, _instance| {
				// A downstream executor resolves `offset` and writes `bytes` into memory
				// `memory_index`; see `crate::reset::reset` for the equivalent logic.
				let _ = (memory_index, bytes);
			}));
			self.module.data.push(segment);
		}
		Ok(())
	}

	fn read_code_section(&mut self) -> DecodeResult<()> {
		let count = self.cursor.read_leb_u32()?;
		let declared = self.module.functions.len() as u32;
		if count != declared {
			return Err(DecodeError::FunctionsCodeInconsistentLengths { functions: declared, code: count });
		}
		let imported = self.module.imported_function_count();
		let cursor = &mut *self.cursor;
		let symtab = &*self.symtab;
		let sink = &mut *self.sink;
		let limits = self.config.limits;
		let module_size = cursor.len();

		let bodies = AsyncDriver::run_code_section(*self.config, module_size, move || {
			let mut bodies = Vec::with_capacity(count as usize);
			for i in 0..count {
				let body_size = cursor.read_leb_u32()?;
				if body_size > limits.max_function_body_size {
					return Err(DecodeError::ResourceLimitExceeded {
						which: "function body size",
						limit: limits.max_function_body_size,
						actual: body_size,
					});
				}
				let body_start = cursor.position();
				let function_index = imported + i;
				let entry = decode_function_body(cursor, function_index, symtab, sink, &limits)?;
				let consumed = (cursor.position() - body_start) as u32;
				if consumed != body_size {
					return Err(DecodeError::SectionSizeMismatch { declared: body_size, actual: consumed });
				}
				bodies.push(entry);
			}
			Ok(bodies)
		})?;

		for (i, entry) in bodies.into_iter().enumerate() {
			self.module.functions[i].code = Some(entry);
		}
		Ok(())
	}

	fn read_custom_section(&mut self, size: usize) -> DecodeResult<()> {
		let section_start = self.cursor.position();
		let section_end = section_start + size;
		let name_start = self.cursor.position();
		// Unlike the name *subsection* reader's failures, a malformed name on the custom
		// section itself is a hard failure: invariant 11 (every name decodes cleanly under
		// strict UTF-8) is not scoped to any one section.
		let name = self.cursor.read_string()?;
		let payload_start = self.cursor.position();

		if name == "name" {
			let payload = self.cursor.read_bytes(section_end - payload_start)?;
			match name::read_name_section(payload, self.symtab.function_count()) {
				Ok(names) => self.module.names = Some(names),
				Err(err) => warn!(%err, "dropping malformed name section"),
			}
		} else {
			self.cursor.jump(section_end);
		}

		self.module.custom_sections.push(CustomSection { name, span: name_start..section_end });
		Ok(())
	}
}
