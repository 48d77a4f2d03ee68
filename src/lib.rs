pub mod macros;

mod addr;
pub mod camera;
mod derived;
mod error;
pub mod geometry;
mod source;
mod transaction;

pub use addr::{Addr, NodeRef};
pub use camera::{Camera, CameraSettings};
pub use derived::Derived;
pub use error::{GeometryError, Result};
pub use geometry::Scene;
pub use source::Source;
pub use transaction::{in_transaction, transaction, Changed, States, Transaction};

use std::rc::Weak;

pub trait Node: 'static {
	/// Settle the state of this cell for the running transaction,
	/// recomputing it when one of its sources is hot.
	///
	/// Returns `false` when the cell ended up unavailable.
	fn resolve(&self, states: &mut States) -> bool;

	/// Cells that currently read this one.
	fn dependents(&self) -> Vec<NodeRef>;

	/// Notify this cell that `dependent` started
	/// to read it.
	fn used_by(&self, dependent: Weak<dyn Node>);

	/// Notify this cell that the dependent at `addr` stopped
	/// to read it.
	fn not_used_by(&self, addr: Addr);

	fn name(&self) -> &'static str;
}

/// Typed cell handles that can be erased into a [`NodeRef`].
pub trait Cell {
	fn node(&self) -> NodeRef;
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum State {
	/// Written or recomputed during this transaction.
	Hot,
	/// Exists and is unchanged.
	Cold,
	/// The derivation could not produce a value.
	Unavailable,
}
