//! §4.7: the optional, lenient "name" custom section. Any failure anywhere in here —
//! malformed UTF-8, an out-of-range index, a truncated subsection — causes the entire name
//! section to be dropped; it must never fail the containing module (§9 design notes).

use std::collections::HashMap;

use crate::cursor::ByteCursor;
use crate::error::{DecodeError, DecodeResult};

/// Per-function and per-local debug names recovered from the name section, if present and
/// well-formed. The module-name subsection (id 0) is read past but its payload is discarded
/// without UTF-8 validation, per the distilled spec's Open Question recommendation: it is
/// debug metadata nobody downstream of this crate consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleNames {
	pub functions: HashMap<u32, String>,
	pub locals: HashMap<u32, HashMap<u32, String>>,
}

const SUBSECTION_MODULE: u8 = 0;
const SUBSECTION_FUNCTION: u8 = 1;
const SUBSECTION_LOCAL: u8 = 2;

/// Reads the three known subsections (module/function/local, in any order — a non-matching
/// or unknown subsection id is skipped silently rather than treated as a bail condition, per
/// the distilled spec's other Open Question recommendation). Returns `Err` on any malformed
/// data; the caller discards the whole result rather than propagating the error.
pub fn read_name_section(bytes: &[u8], function_count: u32) -> DecodeResult<ModuleNames> {
	let mut cursor = ByteCursor::new(bytes);
	let mut names = ModuleNames::default();

	while !cursor.eof() {
		let subsection_id = cursor.read_u8()?;
		let size = cursor.read_leb_u32()? as usize;
		let start = cursor.position();
		match subsection_id {
			SUBSECTION_MODULE => {
				cursor.skip(size)?;
			}
			SUBSECTION_FUNCTION => read_name_map(&mut cursor, function_count, &mut names.functions)?,
			SUBSECTION_LOCAL => {
				let group_count = cursor.read_leb_u32()?;
				for _ in 0..group_count {
					let function_index = cursor.read_leb_u32()?;
					if function_index >= function_count {
						return Err(DecodeError::UnknownFunction { index: function_index, len: function_count });
					}
					let mut locals = HashMap::new();
					read_name_map(&mut cursor, u32::MAX, &mut locals)?;
					names.locals.insert(function_index, locals);
				}
			}
			_ => {
				cursor.skip(size)?;
			}
		}
		let consumed = cursor.position() - start;
		if consumed != size {
			return Err(DecodeError::SectionSizeMismatch { declared: size as u32, actual: consumed as u32 });
		}
	}

	Ok(names)
}

fn read_name_map(cursor: &mut ByteCursor, index_limit: u32, out: &mut HashMap<u32, String>) -> DecodeResult<()> {
	let count = cursor.read_leb_u32()?;
	for _ in 0..count {
		let index = cursor.read_leb_u32()?;
		if index >= index_limit {
			return Err(DecodeError::UnknownFunction { index, len: index_limit });
		}
		let name = cursor.read_string()?;
		out.insert(index, name);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn leb(mut value: u32, out: &mut Vec<u8>) {
		loop {
			let byte = (value & 0x7F) as u8;
			value >>= 7;
			if value == 0 {
				out.push(byte);
				break;
			}
			out.push(byte | 0x80);
		}
	}

	#[test]
	fn reads_a_function_name_subsection() {
		let mut payload = Vec::new();
		leb(1, &mut payload); // one entry
		leb(0, &mut payload); // function index 0
		leb(4, &mut payload); // name length
		payload.extend_from_slice(b"main");

		let mut bytes = Vec::new();
		bytes.push(SUBSECTION_FUNCTION);
		leb(payload.len() as u32, &mut bytes);
		bytes.extend_from_slice(&payload);

		let names = read_name_section(&bytes, 1).unwrap();
		assert_eq!(names.functions.get(&0).map(String::as_str), Some("main"));
	}

	#[test]
	fn drops_out_of_range_function_index() {
		let mut payload = Vec::new();
		leb(1, &mut payload);
		leb(5, &mut payload); // out of range: only 1 function declared
		leb(0, &mut payload);

		let mut bytes = Vec::new();
		bytes.push(SUBSECTION_FUNCTION);
		leb(payload.len() as u32, &mut bytes);
		bytes.extend_from_slice(&payload);

		assert!(read_name_section(&bytes, 1).is_err());
	}

	#[test]
	fn unknown_subsection_id_is_skipped() {
		let mut bytes = Vec::new();
		bytes.push(99); // unknown subsection id
		leb(3, &mut bytes);
		bytes.extend_from_slice(&[0xAA, 0xBB, 0xCC]);

		let names = read_name_section(&bytes, 0).unwrap();
		assert!(names.functions.is_empty());
	}
}
