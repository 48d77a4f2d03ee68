use std::cell::RefCell;
use std::marker::PhantomData;

use fxhash::{FxHashMap, FxHashSet};

use crate::addr::{Addr, NodeRef};
use crate::{Cell, Source, State};

thread_local! {
	static OPEN: RefCell<Option<Changed>> = const { RefCell::new(None) };
}

pub fn in_transaction() -> bool {
	OPEN.with(|open| open.borrow().is_some())
}

/// Run `body` as one atomic batch of writes and propagate once.
///
/// A `transaction` started while another one is open on this thread joins
/// the outer one: its writes are propagated when the outer body returns and
/// the inner call returns an empty [`Changed`].
pub fn transaction(body: impl FnOnce(&mut Transaction)) -> Changed {
	let guard = Guard::open();
	body(&mut Transaction {
		_not_send: PhantomData,
	});

	match guard.close() {
		Some(written) => {
			let changed = propagate(written);
			tracing::debug!(changed = changed.len(), "transaction finished");
			changed
		}
		None => Changed::default(),
	}
}

/// Write access handed to a [`transaction`] body.
pub struct Transaction {
	_not_send: PhantomData<*const ()>,
}

impl Transaction {
	/// Assign `value` to `cell`. The cell counts as changed even when the
	/// value is equal to the previous one.
	///
	/// # Panics
	///
	/// When a [`Ref`](std::cell::Ref) to the value of `cell` is still alive,
	/// as in `tx.set(&cell, *cell.get() + 1)`. Use [`Transaction::modify`]
	/// to write a value computed from the current one.
	pub fn set<T: 'static>(&mut self, cell: &Source<T>, value: T) {
		let _ = cell.replace(value);
		self.record(cell);
	}

	/// Change the value of `cell` in place.
	///
	/// ```
	/// use geoconstruct::{transaction, Source};
	///
	/// let zoom = Source::new(1.0);
	/// transaction(|tx| tx.modify(&zoom, |zoom| *zoom *= 2.0));
	/// assert_eq!(*zoom.get(), 2.0);
	/// ```
	pub fn modify<T: 'static>(&mut self, cell: &Source<T>, func: impl FnOnce(&mut T)) {
		cell.update(func);
		self.record(cell);
	}

	fn record<T: 'static>(&mut self, cell: &Source<T>) {
		let node = cell.node();
		OPEN.with(|open| {
			if let Some(written) = open.borrow_mut().as_mut() {
				written.push(node);
			}
		});
	}
}

struct Guard {
	is_root: bool,
}

impl Guard {
	fn open() -> Self {
		let is_root = OPEN.with(|open| {
			let mut open = open.borrow_mut();
			if open.is_none() {
				*open = Some(Changed::default());
				true
			} else {
				false
			}
		});

		Guard { is_root }
	}

	fn close(mut self) -> Option<Changed> {
		if !self.is_root {
			return None;
		}

		self.is_root = false;
		OPEN.with(|open| open.borrow_mut().take())
	}
}

impl Drop for Guard {
	fn drop(&mut self) {
		// Only reached with `is_root` set when the body panicked.
		if self.is_root {
			OPEN.with(|open| open.borrow_mut().take());
		}
	}
}

/// Per-transaction state of every cell touched by propagation.
#[derive(Default, Debug)]
pub struct States {
	map: FxHashMap<Addr, State>,
}

impl States {
	pub fn get(&self, addr: Addr) -> Option<State> {
		self.map.get(&addr).copied()
	}

	pub fn insert(&mut self, addr: Addr, state: State) {
		self.map.insert(addr, state);
	}
}

/// Cells whose value may have changed in one transaction, in the order
/// they were reached.
#[derive(Default, Debug)]
pub struct Changed {
	nodes: Vec<NodeRef>,
	seen: FxHashSet<Addr>,
	states: States,
}

impl Changed {
	fn push(&mut self, node: NodeRef) -> bool {
		if self.seen.insert(node.addr()) {
			self.nodes.push(node);
			true
		} else {
			false
		}
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn contains(&self, cell: &impl Cell) -> bool {
		self.seen.contains(&cell.node().addr())
	}

	pub fn iter(&self) -> impl Iterator<Item = &NodeRef> {
		self.nodes.iter()
	}

	/// State the cell ended up in, `None` if propagation never reached it.
	pub fn state_of(&self, cell: &impl Cell) -> Option<State> {
		self.states.get(cell.node().addr())
	}
}

fn propagate(written: Changed) -> Changed {
	let mut result = written;
	for node in &result.nodes {
		result.states.insert(node.addr(), State::Hot);
	}

	let mut index = 0;
	while index < result.nodes.len() {
		let dependents = result.nodes[index].dependents();
		index += 1;

		for dependent in dependents {
			if result.seen.contains(&dependent.addr()) {
				continue;
			}
			if dependent.resolve(&mut result.states) {
				result.push(dependent);
			}
		}
	}

	result
}
