use std::any::Any;

/// A deferred action captured as small integers and byte arrays (never as pointers to
/// unresolved entities, per the design notes), run once every module in a link unit is
/// available. `context` and `instance` are type-erased because this crate does not define
/// either type — they belong to the downstream executor.
pub type LinkerAction = Box<dyn FnOnce(&mut dyn Any, &mut dyn Any) + Send>;

/// Accepts deferred actions to run after parsing: resolving call targets by function index,
/// writing element segments into tables, writing data segments into memory, and
/// initializing globals (constant or `global.get` of an imported global).
/// `Send` for the same reason as [`crate::collab::SymbolTable`]: it may be driven from
/// [`crate::async_driver::AsyncDriver`]'s worker thread.
pub trait LinkerQueue: Send {
	fn enqueue(&mut self, action: LinkerAction);
}

/// Reference `LinkerQueue` that simply accumulates actions in declaration order and runs
/// them in that order when asked; the order matters because element/data segments may
/// overlap and later segments are meant to win.
#[derive(Default)]
pub struct VecLinkerQueue {
	actions: Vec<LinkerAction>,
}

impl LinkerQueue for VecLinkerQueue {
	fn enqueue(&mut self, action: LinkerAction) {
		self.actions.push(action);
	}
}

impl VecLinkerQueue {
	pub fn len(&self) -> usize {
		self.actions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.actions.is_empty()
	}

	pub fn run_all(&mut self, context: &mut dyn Any, instance: &mut dyn Any) {
		for action in self.actions.drain(..) {
			action(context, instance);
		}
	}
}
