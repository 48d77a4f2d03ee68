use std::fmt;
use std::str::FromStr;

use glam::DVec3;

use crate::geometry::{Attributes, Dependency, GeometryKind, ObjectId, Value};
use crate::{GeometryError, Result};

/// The fixed set of construction rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
	Point,
	Line2Points,
	Plane3Points,
	Sphere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
	Number,
	Vector,
	Object(GeometryKind),
}

use ParamType::*;

const NUMBER: &[ParamType] = &[Number];
const VECTOR_OR_POINT: &[ParamType] = &[Vector, Object(GeometryKind::Point)];

impl ParamType {
	pub fn token(self) -> &'static str {
		match self {
			Number => "number",
			Vector => "vector",
			Object(kind) => kind.token(),
		}
	}

	fn accepts(self, dependency: &Dependency, kind_of: &impl Fn(&ObjectId) -> Option<GeometryKind>) -> bool {
		match (self, dependency) {
			(Number, Dependency::Const(Value::Number(_))) => true,
			(Vector, Dependency::Const(Value::Vector(_))) => true,
			(Number, Dependency::Variable(expression)) => !expression.is_vector(),
			(Vector, Dependency::Variable(expression)) => expression.is_vector(),
			(Object(kind), Dependency::ObjectRef(id)) => kind_of(id) == Some(kind),
			_ => false,
		}
	}
}

impl Instruction {
	pub const ALL: [Instruction; 4] = [
		Instruction::Point,
		Instruction::Line2Points,
		Instruction::Plane3Points,
		Instruction::Sphere,
	];

	/// Name used on the console.
	pub fn name(self) -> &'static str {
		match self {
			Instruction::Point => "point",
			Instruction::Line2Points => "line2Points",
			Instruction::Plane3Points => "plane3Points",
			Instruction::Sphere => "sphere",
		}
	}

	pub fn kind(self) -> GeometryKind {
		match self {
			Instruction::Point => GeometryKind::Point,
			Instruction::Line2Points => GeometryKind::Line,
			Instruction::Plane3Points => GeometryKind::Plane,
			Instruction::Sphere => GeometryKind::Sphere,
		}
	}

	/// Accepted types per parameter position.
	pub fn params(self) -> &'static [&'static [ParamType]] {
		match self {
			Instruction::Point => &[NUMBER, NUMBER, NUMBER],
			Instruction::Line2Points => &[VECTOR_OR_POINT, VECTOR_OR_POINT],
			Instruction::Plane3Points => &[VECTOR_OR_POINT, VECTOR_OR_POINT, VECTOR_OR_POINT],
			Instruction::Sphere => &[VECTOR_OR_POINT, NUMBER],
		}
	}

	/// Check `dependencies` against the parameter pattern. `kind_of` resolves
	/// the geometry kind of referenced objects.
	pub fn check(
		self,
		dependencies: &[Dependency],
		kind_of: impl Fn(&ObjectId) -> Option<GeometryKind>,
	) -> Result<()> {
		let params = self.params();
		if dependencies.len() != params.len() {
			return Err(GeometryError::ArgumentCount {
				instruction: self,
				expected: params.len(),
				found: dependencies.len(),
			});
		}

		for (index, (dependency, accepted)) in dependencies.iter().zip(params).enumerate() {
			if !accepted.iter().any(|param| param.accepts(dependency, &kind_of)) {
				return Err(GeometryError::TypeMismatch {
					instruction: self,
					argument: index + 1,
					expected: accepted
						.iter()
						.map(|param| param.token())
						.collect::<Vec<_>>()
						.join("|"),
				});
			}
		}

		Ok(())
	}

	/// Compute the attributes of an object from its evaluated arguments.
	pub fn build(self, values: &[Value]) -> Result<Attributes> {
		let args = Args {
			instruction: self,
			values,
		};

		match self {
			Instruction::Point => Ok(Attributes::Point {
				position: DVec3::new(args.number(0)?, args.number(1)?, args.number(2)?),
			}),
			Instruction::Line2Points => {
				let p1 = args.vector(0)?;
				let p2 = args.vector(1)?;
				let direction = (p2 - p1)
					.try_normalize()
					.ok_or_else(|| self.invalid("the two points coincide"))?;

				Ok(Attributes::Line {
					position: p1,
					direction,
				})
			}
			Instruction::Plane3Points => {
				let p1 = args.vector(0)?;
				let p2 = args.vector(1)?;
				let p3 = args.vector(2)?;
				let normal = (p2 - p1)
					.cross(p3 - p1)
					.try_normalize()
					.ok_or_else(|| self.invalid("the three points are collinear"))?;

				Ok(Attributes::Plane {
					normal,
					distance: normal.dot(p1),
				})
			}
			Instruction::Sphere => {
				let center = args.vector(0)?;
				let radius = args.number(1)?;
				if !(radius > 0.0) {
					return Err(self.invalid("radius has to be greater than 0"));
				}

				Ok(Attributes::Sphere { center, radius })
			}
		}
	}

	fn invalid(self, reason: &'static str) -> GeometryError {
		GeometryError::InvalidArgument {
			instruction: self,
			reason,
		}
	}
}

struct Args<'a> {
	instruction: Instruction,
	values: &'a [Value],
}

impl Args<'_> {
	fn mismatch(&self, index: usize, expected: ParamType) -> GeometryError {
		GeometryError::TypeMismatch {
			instruction: self.instruction,
			argument: index + 1,
			expected: expected.token().to_owned(),
		}
	}

	fn number(&self, index: usize) -> Result<f64> {
		self.values
			.get(index)
			.and_then(Value::as_number)
			.ok_or_else(|| self.mismatch(index, Number))
	}

	fn vector(&self, index: usize) -> Result<DVec3> {
		self.values
			.get(index)
			.and_then(Value::as_vector)
			.ok_or_else(|| self.mismatch(index, Vector))
	}
}

impl fmt::Display for Instruction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for Instruction {
	type Err = GeometryError;

	fn from_str(name: &str) -> Result<Self> {
		Instruction::ALL
			.into_iter()
			.find(|instruction| instruction.name() == name)
			.ok_or_else(|| GeometryError::UnknownInstruction(name.to_owned()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn v(x: f64, y: f64, z: f64) -> Value {
		Value::Vector(DVec3::new(x, y, z))
	}

	#[test]
	fn resolves_console_names() {
		assert_eq!("plane3Points".parse::<Instruction>(), Ok(Instruction::Plane3Points));
		assert_eq!(
			"circle".parse::<Instruction>(),
			Err(GeometryError::UnknownInstruction("circle".to_owned()))
		);
	}

	#[test]
	fn plane_normal_and_distance() {
		let attributes = Instruction::Plane3Points
			.build(&[v(0.0, 0.0, 1.0), v(1.0, 0.0, 1.0), v(0.0, 1.0, 1.0)])
			.unwrap();

		assert_eq!(
			attributes,
			Attributes::Plane {
				normal: DVec3::Z,
				distance: 1.0,
			}
		);
	}

	#[test]
	fn collinear_plane_is_rejected() {
		let error = Instruction::Plane3Points
			.build(&[v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0), v(2.0, 0.0, 0.0)])
			.unwrap_err();
		assert!(matches!(error, GeometryError::InvalidArgument { .. }));
	}

	#[test]
	fn coincident_line_points_are_rejected() {
		let error = Instruction::Line2Points
			.build(&[v(1.0, 1.0, 1.0), v(1.0, 1.0, 1.0)])
			.unwrap_err();
		assert!(matches!(error, GeometryError::InvalidArgument { .. }));
	}

	#[test]
	fn sphere_radius_must_be_positive() {
		for radius in [0.0, -1.0, f64::NAN] {
			let error = Instruction::Sphere
				.build(&[v(0.0, 0.0, 0.0), Value::Number(radius)])
				.unwrap_err();
			assert!(matches!(error, GeometryError::InvalidArgument { .. }));
		}
	}

	#[test]
	fn check_reports_expected_tokens() {
		let error = Instruction::Sphere
			.check(&[Dependency::number(1.0), Dependency::number(1.0)], |_| None)
			.unwrap_err();

		assert_eq!(
			error,
			GeometryError::TypeMismatch {
				instruction: Instruction::Sphere,
				argument: 1,
				expected: "vector|point".to_owned(),
			}
		);
	}

	#[test]
	fn check_counts_arguments() {
		let error = Instruction::Point.check(&[Dependency::number(1.0)], |_| None).unwrap_err();
		assert_eq!(
			error,
			GeometryError::ArgumentCount {
				instruction: Instruction::Point,
				expected: 3,
				found: 1,
			}
		);
	}

	#[test]
	fn check_resolves_object_kinds() {
		let kind_of = |id: &ObjectId| (*id == "P1").then_some(GeometryKind::Point);
		assert!(Instruction::Line2Points
			.check(&[Dependency::object("P1"), Dependency::vector(1.0, 0.0, 0.0)], kind_of)
			.is_ok());
		assert!(Instruction::Line2Points
			.check(&[Dependency::object("L1"), Dependency::vector(1.0, 0.0, 0.0)], kind_of)
			.is_err());
	}
}
