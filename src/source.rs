use std::cell::{Ref, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::addr::{Addr, NodeRef, WeakNode};
use crate::{Cell, Derived, Node, State, States};

/// A leaf cell. Its value only changes through [`crate::Transaction::set`].
pub struct Source<T> {
	body: Rc<SourceBody<T>>,
}

pub struct SourceBody<T> {
	value: RefCell<T>,
	inner: RefCell<SourceInner>,
}

struct SourceInner {
	name: &'static str,
	dependents: SmallVec<[WeakNode; 4]>,
}

impl<T> Clone for Source<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for Source<T>
where
	T: Default + 'static,
{
	fn default() -> Self {
		Source::new(Default::default())
	}
}

impl<T> Source<T>
where
	T: 'static,
{
	pub fn new(value: T) -> Self {
		Self::named("<unnamed>", value)
	}

	pub fn named(name: &'static str, value: T) -> Self {
		Source {
			body: Rc::new(SourceBody {
				value: RefCell::new(value),
				inner: RefCell::new(SourceInner {
					name,
					dependents: SmallVec::new(),
				}),
			}),
		}
	}

	pub fn map<F, R>(&self, func: F) -> Derived<R>
	where
		F: Fn(&T) -> Option<R> + 'static,
		R: 'static,
	{
		let this = self.clone();
		Derived::new(
			vec![self.node()],
			Box::new(move || {
				let value = this.get();
				func(&*value)
			}),
		)
	}

	#[inline]
	pub fn get(&self) -> Ref<'_, T> {
		self.body.value.borrow()
	}

	#[inline]
	pub fn name(&self) -> &'static str {
		self.body.inner.borrow().name
	}

	pub(crate) fn replace(&self, value: T) -> T {
		std::mem::replace(&mut *self.body.value.borrow_mut(), value)
	}

	pub(crate) fn update<R>(&self, func: impl FnOnce(&mut T) -> R) -> R {
		func(&mut self.body.value.borrow_mut())
	}

	pub fn dependent_count(&self) -> usize {
		self.body.inner.borrow().dependents.len()
	}
}

impl<T> Source<T>
where
	T: Clone + 'static,
{
	#[inline]
	pub fn get_cloned(&self) -> T {
		self.get().clone()
	}
}

impl<T: 'static> Cell for Source<T> {
	fn node(&self) -> NodeRef {
		NodeRef::new(self.body.clone())
	}
}

impl<T: 'static> Node for SourceBody<T> {
	fn resolve(&self, states: &mut States) -> bool {
		let addr = Addr::of_ref(self);
		if states.get(addr).is_none() {
			states.insert(addr, State::Cold);
		}
		true
	}

	fn dependents(&self) -> Vec<NodeRef> {
		self.inner
			.borrow()
			.dependents
			.iter()
			.filter_map(WeakNode::upgrade)
			.collect()
	}

	fn used_by(&self, dependent: Weak<dyn Node>) {
		let dependent = WeakNode::new(dependent);
		let mut inner = self.inner.borrow_mut();
		if !inner.dependents.contains(&dependent) {
			inner.dependents.push(dependent);
		}
	}

	fn not_used_by(&self, addr: Addr) {
		self.inner
			.borrow_mut()
			.dependents
			.retain(|dependent| dependent.addr() != addr);
	}

	fn name(&self) -> &'static str {
		self.inner.borrow().name
	}
}

impl<T> Debug for Source<T>
where
	T: 'static + Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.get().fmt(f)
	}
}
