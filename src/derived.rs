use std::cell::{Ref, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::addr::{Addr, NodeRef, WeakNode};
use crate::{Cell, Node, State, States};

/// A cell whose value is a pure function of other cells.
///
/// The function returns `None` when it cannot produce a value for the
/// current inputs; the cell then becomes [`State::Unavailable`] for the
/// running transaction and keeps its previous value.
pub struct Derived<T>
where
	T: 'static,
{
	body: Rc<DerivedBody<T>>,
}

impl<T: 'static> Clone for Derived<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

pub struct DerivedBody<T>
where
	T: 'static,
{
	value: RefCell<Option<T>>,
	inner: RefCell<DerivedInner<T>>,
}

pub struct DerivedInner<T>
where
	T: 'static,
{
	name: &'static str,
	func: Box<dyn Fn() -> Option<T>>,
	sources: Vec<NodeRef>,
	dependents: SmallVec<[WeakNode; 4]>,
	this: Weak<DerivedBody<T>>,
}

impl<T> Drop for DerivedInner<T>
where
	T: 'static,
{
	fn drop(&mut self) {
		let addr = Addr::of_weak(&self.this);
		for source in &self.sources {
			source.not_used_by(addr);
		}
	}
}

impl<T> Derived<T>
where
	T: 'static,
{
	pub fn new(sources: Vec<NodeRef>, func: Box<dyn Fn() -> Option<T>>) -> Self {
		Self::named("<unnamed>", sources, func)
	}

	pub fn named(name: &'static str, sources: Vec<NodeRef>, func: Box<dyn Fn() -> Option<T>>) -> Self {
		let value = func();
		let body = Rc::new_cyclic(|this| DerivedBody {
			value: RefCell::new(value),
			inner: RefCell::new(DerivedInner {
				name,
				func,
				sources,
				dependents: SmallVec::new(),
				this: this.clone(),
			}),
		});

		let this = Rc::downgrade(&body) as Weak<dyn Node>;
		for source in &body.inner.borrow().sources {
			source.used_by(this.clone());
		}

		Derived { body }
	}

	/// Current value, `None` if the function never produced one.
	#[inline]
	pub fn get(&self) -> Option<Ref<'_, T>> {
		Ref::filter_map(self.body.value.borrow(), |value| value.as_ref()).ok()
	}

	#[inline]
	pub fn name(&self) -> &'static str {
		self.body.inner.borrow().name
	}

	/// Stop listening to the sources. The cell keeps its last value
	/// and is no longer reached by propagation.
	pub fn disconnect(&self) {
		let addr = Addr::of(&self.body);
		for source in &self.body.inner.borrow().sources {
			source.not_used_by(addr);
		}
	}

	pub fn dependent_count(&self) -> usize {
		self.body.inner.borrow().dependents.len()
	}
}

impl<T> Derived<T>
where
	T: Clone + 'static,
{
	#[inline]
	pub fn get_cloned(&self) -> Option<T> {
		self.get().map(|value| value.clone())
	}
}

impl<T: 'static> Cell for Derived<T> {
	fn node(&self) -> NodeRef {
		NodeRef::new(self.body.clone())
	}
}

impl<T> DerivedBody<T>
where
	T: 'static,
{
	fn settle(&self, inner: &DerivedInner<T>, states: &mut States) -> State {
		if !inner.sources.iter().all(|source| source.resolve(states)) {
			return State::Unavailable;
		}

		let unchanged = inner
			.sources
			.iter()
			.all(|source| states.get(source.addr()) == Some(State::Cold));
		if unchanged {
			return State::Cold;
		}

		match (inner.func)() {
			Some(value) => {
				*self.value.borrow_mut() = Some(value);
				State::Hot
			}
			None => State::Unavailable,
		}
	}
}

impl<T> Node for DerivedBody<T>
where
	T: 'static,
{
	fn resolve(&self, states: &mut States) -> bool {
		let addr = Addr::of_ref(self);
		if let Some(state) = states.get(addr) {
			return state != State::Unavailable;
		}

		let inner = self.inner.borrow();
		let state = self.settle(&inner, states);
		tracing::trace!(cell = inner.name, ?state, "resolved");

		states.insert(addr, state);
		state != State::Unavailable
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

impl<T> Debug for Derived<T>
where
	T: 'static + Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.get() {
			Some(value) => value.fmt(f),
			None => f.write_str("<unavailable>"),
		}
	}
}
