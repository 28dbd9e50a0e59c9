use crate::module::{Block, CodeEntry, Node};

/// Constructs the executable block/if/loop/call nodes the decoder hands it children lists
/// and metadata for. A downstream executor implements this to build its own representation
/// (e.g. compiled closures) directly during decoding instead of paying for an intermediate
/// tree; [`TreeNodeSink`] is the reference implementation that just builds the [`Node`] tree
/// this crate's own tests and [`crate::reset::ResetPass`] consume.
/// `Send` for the same reason as [`crate::collab::SymbolTable`]: it may be driven from
/// [`crate::async_driver::AsyncDriver`]'s worker thread.
pub trait NodeSink: Send {
	fn new_root_node(&mut self, function_index: u32, code_entry: &CodeEntry);
	fn new_block_node(&mut self, block: Block) -> Node;
	fn new_loop_node(&mut self, block: Block) -> Node;
	fn new_if_node(&mut self, block: Block) -> Node;
	fn new_call_stub_node(&mut self, function_index: u32) -> Node;
	fn new_indirect_call_node(&mut self, type_index: u32) -> Node;
}

#[derive(Debug, Default)]
pub struct TreeNodeSink;

impl NodeSink for TreeNodeSink {
	fn new_root_node(&mut self, _function_index: u32, _code_entry: &CodeEntry) {}

	fn new_block_node(&mut self, block: Block) -> Node {
		Node::Block(block)
	}

	fn new_loop_node(&mut self, block: Block) -> Node {
		Node::Loop(block)
	}

	fn new_if_node(&mut self, block: Block) -> Node {
		Node::If(block)
	}

	fn new_call_stub_node(&mut self, function_index: u32) -> Node {
		Node::Call { function_index }
	}

	fn new_indirect_call_node(&mut self, type_index: u32) -> Node {
		Node::CallIndirect { type_index }
	}
}
