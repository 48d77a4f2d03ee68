use thiserror::Error;

use crate::geometry::{Instruction, ObjectId};

pub type Result<T, E = GeometryError> = std::result::Result<T, E>;

/// Failures of the geometry object graph. None of them leaves
/// partially written state behind.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
	#[error("expected argument {argument} of `{instruction}` to be of type \"{expected}\"")]
	TypeMismatch {
		instruction: Instruction,
		argument: usize,
		expected: String,
	},

	#[error("`{instruction}` needs {expected} parameters, got {found}")]
	ArgumentCount {
		instruction: Instruction,
		expected: usize,
		found: usize,
	},

	#[error("invalid argument for `{instruction}`: {reason}")]
	InvalidArgument {
		instruction: Instruction,
		reason: &'static str,
	},

	#[error("object does not exist: \"{0}\"")]
	NotFound(ObjectId),

	#[error("dependency does not exist: \"{0}\"")]
	MissingDependency(ObjectId),

	#[error("unsupported instruction \"{0}\"")]
	UnknownInstruction(String),

	#[error("\"{object}\" cannot depend on \"{parent}\": the dependency would form a cycle")]
	Cycle { object: ObjectId, parent: ObjectId },

	#[error("could not evaluate expression `{expression}`: {reason}")]
	Expression { expression: String, reason: String },
}
