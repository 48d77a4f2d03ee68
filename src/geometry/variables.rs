use std::collections::BTreeMap;

use meval::ContextProvider;

/// Named scalars that variable expressions are evaluated against.
///
/// There is no reverse index from a variable to the objects reading it;
/// an assignment scans all objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableStore {
	values: BTreeMap<String, f64>,
}

impl VariableStore {
	pub fn get(&self, name: &str) -> Option<f64> {
		self.values.get(name).copied()
	}

	pub fn set(&mut self, name: &str, value: f64) {
		self.values.insert(name.to_owned(), value);
	}

	/// Create `name` with value `0` unless it already exists.
	/// Returns whether it was created.
	pub fn declare(&mut self, name: &str) -> bool {
		if self.values.contains_key(name) {
			return false;
		}

		self.values.insert(name.to_owned(), 0.0);
		true
	}

	pub fn contains(&self, name: &str) -> bool {
		self.values.contains_key(name)
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
		self.values.iter().map(|(name, value)| (name.as_str(), *value))
	}
}

impl ContextProvider for VariableStore {
	fn get_var(&self, name: &str) -> Option<f64> {
		self.get(name)
	}
}
