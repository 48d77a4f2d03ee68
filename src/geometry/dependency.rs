use std::collections::BTreeSet;
use std::fmt;

use glam::DVec3;
use meval::tokenizer::Token;
use meval::{Context, ContextProvider, Expr};

use crate::geometry::{Attributes, ObjectId, VariableStore};
use crate::{GeometryError, Result};

/// A primitive construction parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
	Number(f64),
	Vector(DVec3),
}

impl Value {
	pub fn as_number(&self) -> Option<f64> {
		match *self {
			Value::Number(value) => Some(value),
			Value::Vector(_) => None,
		}
	}

	pub fn as_vector(&self) -> Option<DVec3> {
		match *self {
			Value::Vector(value) => Some(value),
			Value::Number(_) => None,
		}
	}
}

/// How one construction parameter is obtained.
#[derive(Debug, Clone)]
pub enum Dependency {
	Const(Value),
	Variable(Expression),
	ObjectRef(ObjectId),
}

impl Dependency {
	pub fn number(value: f64) -> Self {
		Dependency::Const(Value::Number(value))
	}

	pub fn vector(x: f64, y: f64, z: f64) -> Self {
		Dependency::Const(Value::Vector(DVec3::new(x, y, z)))
	}

	pub fn variable(source: &str) -> Result<Self> {
		Expression::parse(source).map(Dependency::Variable)
	}

	pub fn object(id: impl Into<ObjectId>) -> Self {
		Dependency::ObjectRef(id.into())
	}

	pub fn mentions(&self, variable: &str) -> bool {
		match self {
			Dependency::Variable(expression) => expression.mentions(variable),
			_ => false,
		}
	}
}

/// A compiled expression over named variables, either a scalar `x * 2`
/// or a vector `[x, y + 1, 0]`.
#[derive(Debug, Clone)]
pub struct Expression {
	source: String,
	components: Vec<Expr>,
	variables: BTreeSet<String>,
}

impl Expression {
	pub fn parse(source: &str) -> Result<Self> {
		let error = |reason: String| GeometryError::Expression {
			expression: source.to_owned(),
			reason,
		};

		let trimmed = source.trim();
		let parts = match trimmed.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
			Some(inner) => {
				let parts = split_top_level(inner);
				if parts.len() != 3 {
					return Err(error(format!("a vector needs 3 components, got {}", parts.len())));
				}
				parts
			}
			None => vec![trimmed],
		};

		let components = parts
			.into_iter()
			.map(|part| part.parse::<Expr>().map_err(|e| error(e.to_string())))
			.collect::<Result<Vec<_>>>()?;

		let builtins = Context::new();
		let variables = components
			.iter()
			.flat_map(|expr| expr.iter())
			.filter_map(|token| match token {
				Token::Var(name) if builtins.get_var(name).is_none() => Some(name.clone()),
				_ => None,
			})
			.collect();

		Ok(Expression {
			source: source.to_owned(),
			components,
			variables,
		})
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	/// Names of the variables the expression reads.
	pub fn variables(&self) -> &BTreeSet<String> {
		&self.variables
	}

	pub fn mentions(&self, variable: &str) -> bool {
		self.variables.contains(variable)
	}

	pub fn is_vector(&self) -> bool {
		self.components.len() == 3
	}

	pub fn eval(&self, variables: &VariableStore) -> Result<Value> {
		let builtins = Context::new();
		let mut values = [0.0; 3];
		for (slot, expr) in values.iter_mut().zip(&self.components) {
			*slot = expr
				.eval_with_context((variables, &builtins))
				.map_err(|e| GeometryError::Expression {
					expression: self.source.clone(),
					reason: e.to_string(),
				})?;
		}

		Ok(if self.is_vector() {
			Value::Vector(DVec3::from_array(values))
		} else {
			Value::Number(values[0])
		})
	}
}

impl fmt::Display for Expression {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.source)
	}
}

fn split_top_level(source: &str) -> Vec<&str> {
	let mut parts = Vec::new();
	let mut depth = 0usize;
	let mut start = 0;
	for (index, ch) in source.char_indices() {
		match ch {
			'(' | '[' => depth += 1,
			')' | ']' => depth = depth.saturating_sub(1),
			',' if depth == 0 => {
				parts.push(source[start..index].trim());
				start = index + 1;
			}
			_ => {}
		}
	}
	parts.push(source[start..].trim());
	parts
}

/// Read access to the current attributes of constructed objects.
pub trait Lookup {
	fn attributes(&self, id: &ObjectId) -> Option<Attributes>;
}

/// Flatten `dependencies` into the positional arguments of an instruction.
pub fn evaluate(
	dependencies: &[Dependency],
	objects: &impl Lookup,
	variables: &VariableStore,
) -> Result<Vec<Value>> {
	let mut values = Vec::with_capacity(dependencies.len());
	for dependency in dependencies {
		match dependency {
			Dependency::Const(value) => values.push(*value),
			Dependency::Variable(expression) => values.push(expression.eval(variables)?),
			Dependency::ObjectRef(id) => {
				let attributes = objects
					.attributes(id)
					.ok_or_else(|| GeometryError::MissingDependency(id.clone()))?;
				values.extend(attributes.flatten());
			}
		}
	}

	Ok(values)
}
