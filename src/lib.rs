//! Streaming decoder and validator for the WebAssembly 1.0 (MVP) binary module format.
//!
//! [`decode_module`] is the main entry point: it parses the section structure, validates
//! structural and type constraints across sections, abstractly interprets every function
//! body to check stack types and branch targets, and returns a [`module::Module`] ready to
//! hand to a downstream executor. The decoder itself does not execute anything — see §1 of
//! the design document for the full list of Non-goals.

pub mod async_driver;
pub mod checker;
pub mod collab;
pub mod cursor;
pub mod decode;
pub mod error;
pub mod instr;
pub mod limits;
pub mod module;
pub mod opcode;
pub mod reset;
pub mod value;

use collab::{DefaultSymbolTable, LinkerQueue, NodeSink, SymbolTable, TreeNodeSink, VecLinkerQueue};
use error::DecodeResult;
use limits::ParserConfig;
use module::Module;

/// Decodes and validates a complete module using the crate's reference collaborator
/// implementations ([`DefaultSymbolTable`], [`TreeNodeSink`], [`VecLinkerQueue`]).
///
/// Embedders supplying their own `SymbolTable`/`NodeSink`/`LinkerQueue` (for example, one
/// that builds compiled closures directly instead of the in-memory `Node` tree) should call
/// [`decode::decode`] directly instead.
pub fn decode_module(bytes: &[u8], config: &ParserConfig) -> DecodeResult<Module> {
	let mut symtab = DefaultSymbolTable::default();
	let mut sink = TreeNodeSink::default();
	let mut linker = VecLinkerQueue::default();
	decode_module_with(bytes, config, &mut symtab, &mut sink, &mut linker)
}

/// Like [`decode_module`], but with caller-supplied collaborators.
pub fn decode_module_with(
	bytes: &[u8],
	config: &ParserConfig,
	symtab: &mut dyn SymbolTable,
	sink: &mut dyn NodeSink,
	linker: &mut dyn LinkerQueue,
) -> DecodeResult<Module> {
	decode::decode(bytes, config, symtab, sink, linker)
}
