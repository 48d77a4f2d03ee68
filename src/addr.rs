use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::{Rc, Weak};

use crate::Node;

/// Identity of a cell, independent of its value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Addr(*const ());

impl Addr {
	pub fn of<T: ?Sized>(ptr: &Rc<T>) -> Self {
		Addr(Rc::as_ptr(ptr) as *const ())
	}

	pub fn of_ref<T>(value: &T) -> Self {
		Addr(value as *const T as *const ())
	}

	pub fn of_weak<T: ?Sized>(ptr: &Weak<T>) -> Self {
		Addr(Weak::as_ptr(ptr) as *const ())
	}
}

/// Strong handle to a type-erased cell, compared by address.
pub struct NodeRef {
	ptr: Rc<dyn Node>,
}

impl NodeRef {
	pub fn new(ptr: Rc<dyn Node>) -> Self {
		NodeRef { ptr }
	}

	pub fn addr(&self) -> Addr {
		Addr::of(&self.ptr)
	}
}

impl Clone for NodeRef {
	fn clone(&self) -> Self {
		NodeRef {
			ptr: self.ptr.clone(),
		}
	}
}

impl Deref for NodeRef {
	type Target = Rc<dyn Node>;
	fn deref(&self) -> &Self::Target {
		&self.ptr
	}
}

impl PartialEq for NodeRef {
	fn eq(&self, other: &Self) -> bool {
		self.addr() == other.addr()
	}
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.addr().hash(state)
	}
}

impl Ord for NodeRef {
	fn cmp(&self, other: &Self) -> Ordering {
		self.addr().cmp(&other.addr())
	}
}

impl PartialOrd for NodeRef {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl std::fmt::Debug for NodeRef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NodeRef")
			.field("name", &self.ptr.name())
			.field("addr", &self.addr())
			.finish()
	}
}

/// Weak handle kept in a source's dependents list.
pub struct WeakNode {
	ptr: Weak<dyn Node>,
}

impl WeakNode {
	pub fn new(ptr: Weak<dyn Node>) -> Self {
		WeakNode { ptr }
	}

	pub fn addr(&self) -> Addr {
		Addr::of_weak(&self.ptr)
	}

	pub fn upgrade(&self) -> Option<NodeRef> {
		self.ptr.upgrade().map(NodeRef::new)
	}
}

impl PartialEq for WeakNode {
	fn eq(&self, other: &Self) -> bool {
		self.addr() == other.addr()
	}
}

impl Eq for WeakNode {}
