//! Parametric geometry: objects built from an instruction and a list of
//! dependencies, kept consistent when anything upstream changes.

mod dependency;
mod instruction;
mod object;
mod scene;
mod variables;

pub use dependency::{evaluate, Dependency, Expression, Lookup, Value};
pub use instruction::{Instruction, ParamType};
pub use object::{Attributes, Color, GeometricObject, GeometryKind, ObjectId, ParseColorError};
pub use scene::Scene;
pub use variables::VariableStore;
