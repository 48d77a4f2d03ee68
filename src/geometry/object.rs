use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use glam::DVec3;
use rand::Rng;
use thiserror::Error;

use crate::geometry::{Dependency, Instruction, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryKind {
	Point,
	Line,
	Plane,
	Sphere,
}

impl GeometryKind {
	/// Letter that precedes the index in object ids.
	pub fn prefix(self) -> char {
		match self {
			GeometryKind::Point => 'P',
			GeometryKind::Line => 'L',
			GeometryKind::Plane => 'E',
			GeometryKind::Sphere => 'K',
		}
	}

	pub fn token(self) -> &'static str {
		match self {
			GeometryKind::Point => "point",
			GeometryKind::Line => "line",
			GeometryKind::Plane => "plane",
			GeometryKind::Sphere => "sphere",
		}
	}
}

impl fmt::Display for GeometryKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.token())
	}
}

/// `<prefix><index>`, e.g. `P1` or `K3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
	pub(crate) fn new(kind: GeometryKind, index: usize) -> Self {
		ObjectId(format!("{}{}", kind.prefix(), index))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<&str> for ObjectId {
	fn from(id: &str) -> Self {
		ObjectId(id.to_owned())
	}
}

impl Borrow<str> for ObjectId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl PartialEq<str> for ObjectId {
	fn eq(&self, other: &str) -> bool {
		self.0 == other
	}
}

impl PartialEq<&str> for ObjectId {
	fn eq(&self, other: &&str) -> bool {
		self.0 == *other
	}
}

impl fmt::Display for ObjectId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Computed geometry of an object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Attributes {
	Point { position: DVec3 },
	Line { position: DVec3, direction: DVec3 },
	Plane { normal: DVec3, distance: f64 },
	Sphere { center: DVec3, radius: f64 },
}

impl Attributes {
	pub fn kind(&self) -> GeometryKind {
		match self {
			Attributes::Point { .. } => GeometryKind::Point,
			Attributes::Line { .. } => GeometryKind::Line,
			Attributes::Plane { .. } => GeometryKind::Plane,
			Attributes::Sphere { .. } => GeometryKind::Sphere,
		}
	}

	/// The values a dependent object receives for an object reference.
	pub fn flatten(&self) -> Vec<Value> {
		match *self {
			Attributes::Point { position } => vec![Value::Vector(position)],
			Attributes::Line {
				position,
				direction,
			} => vec![Value::Vector(position), Value::Vector(direction)],
			Attributes::Plane { normal, distance } => {
				vec![Value::Vector(normal), Value::Number(distance)]
			}
			Attributes::Sphere { center, radius } => {
				vec![Value::Vector(center), Value::Number(radius)]
			}
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
	pub r: f32,
	pub g: f32,
	pub b: f32,
}

impl Color {
	pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
		Color { r, g, b }
	}

	pub fn random() -> Self {
		let mut rng = rand::rng();
		Color {
			r: rng.random(),
			g: rng.random(),
			b: rng.random(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color \"{0}\", expected `#rrggbb`")]
pub struct ParseColorError(String);

impl FromStr for Color {
	type Err = ParseColorError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let error = || ParseColorError(s.to_owned());
		let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
		if hex.len() != 6 || !hex.is_ascii() {
			return Err(error());
		}

		let channel = |range: std::ops::Range<usize>| {
			u8::from_str_radix(&hex[range], 16)
				.map(|value| f32::from(value) / 255.0)
				.map_err(|_| error())
		};

		Ok(Color::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
	}
}

/// A constructed object. Attributes are recomputed in place whenever one
/// of its dependencies changes.
#[derive(Debug, Clone)]
pub struct GeometricObject {
	pub(crate) id: ObjectId,
	pub(crate) instruction: Instruction,
	pub(crate) dependencies: Vec<Dependency>,
	pub(crate) attributes: Attributes,
	pub(crate) color: Color,
	pub(crate) name: String,
	pub(crate) children: BTreeSet<ObjectId>,
	pub(crate) highlight: f32,
}

impl GeometricObject {
	pub fn id(&self) -> &ObjectId {
		&self.id
	}

	pub fn kind(&self) -> GeometryKind {
		self.attributes.kind()
	}

	pub fn instruction(&self) -> Instruction {
		self.instruction
	}

	pub fn dependencies(&self) -> &[Dependency] {
		&self.dependencies
	}

	pub fn attributes(&self) -> &Attributes {
		&self.attributes
	}

	pub fn color(&self) -> Color {
		self.color
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Objects whose dependency lists reference this one.
	pub fn children(&self) -> &BTreeSet<ObjectId> {
		&self.children
	}

	pub fn highlight(&self) -> f32 {
		self.highlight
	}

	pub fn parents(&self) -> impl Iterator<Item = &ObjectId> {
		parents_of(&self.dependencies)
	}

	pub fn mentions(&self, variable: &str) -> bool {
		self.dependencies
			.iter()
			.any(|dependency| dependency.mentions(variable))
	}
}

pub(crate) fn parents_of(dependencies: &[Dependency]) -> impl Iterator<Item = &ObjectId> {
	dependencies.iter().filter_map(|dependency| match dependency {
		Dependency::ObjectRef(id) => Some(id),
		_ => None,
	})
}
