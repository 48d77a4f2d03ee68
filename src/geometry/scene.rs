use std::collections::BTreeSet;

use fxhash::{FxHashMap, FxHashSet};

use crate::geometry::object::parents_of;
use crate::geometry::{
	evaluate, Attributes, Color, Dependency, GeometricObject, GeometryKind, Instruction, Lookup,
	ObjectId, VariableStore,
};
use crate::{GeometryError, Result};

/// Owner of all geometric objects, their id counters and the variables
/// they read.
///
/// Every operation either succeeds as a whole or returns an error without
/// touching the scene: new attributes for all affected objects are staged
/// first and only written once all of them could be computed.
#[derive(Debug, Default)]
pub struct Scene {
	objects: Vec<GeometricObject>,
	index: FxHashMap<ObjectId, usize>,
	next_index: FxHashMap<GeometryKind, usize>,
	variables: VariableStore,
	highlighted: Option<ObjectId>,
}

type Staging = FxHashMap<ObjectId, Attributes>;

impl Scene {
	pub fn new() -> Self {
		Self::default()
	}

	/// Construct a new object and return its id.
	///
	/// Variables referenced for the first time are created with value `0`.
	/// A reference to an unknown object fails with
	/// [`GeometryError::MissingDependency`]. On failure no id is consumed
	/// and no variable is created.
	pub fn create(
		&mut self,
		instruction: Instruction,
		dependencies: Vec<Dependency>,
		color: Option<Color>,
		name: Option<String>,
	) -> Result<ObjectId> {
		self.require_parents(&dependencies)?;
		instruction.check(&dependencies, |id| self.kind_of(id))?;

		let variables = self.declared(&dependencies);
		let values = evaluate(&dependencies, &*self, &variables)?;
		let attributes = instruction.build(&values)?;

		let kind = instruction.kind();
		let next = self.next_index.entry(kind).or_insert(1);
		let id = ObjectId::new(kind, *next);
		*next += 1;

		self.variables = variables;
		self.link(&id, parents_of(&dependencies).cloned().collect());
		self.index.insert(id.clone(), self.objects.len());
		self.objects.push(GeometricObject {
			name: name.unwrap_or_else(|| id.to_string()),
			color: color.unwrap_or_else(Color::random),
			id: id.clone(),
			instruction,
			dependencies,
			attributes,
			children: BTreeSet::new(),
			highlight: 0.0,
		});

		tracing::debug!(%id, %instruction, "object created");
		Ok(id)
	}

	/// Replace the dependencies of `id` and recompute it together with
	/// everything that depends on it.
	pub fn update(&mut self, id: &str, dependencies: Vec<Dependency>) -> Result<()> {
		let object = self
			.object(id)
			.ok_or_else(|| GeometryError::NotFound(ObjectId::from(id)))?;
		let id = object.id.clone();
		let instruction = object.instruction;
		self.require_parents(&dependencies)?;

		let order = self.cascade_order([&id]);
		if let Some(parent) = parents_of(&dependencies).find(|parent| order.contains(*parent)) {
			return Err(GeometryError::Cycle {
				object: id,
				parent: parent.clone(),
			});
		}

		instruction.check(&dependencies, |parent| self.kind_of(parent))?;

		let variables = self.declared(&dependencies);
		let staged = self.stage(&order, &variables, Some((&id, dependencies.as_slice())))?;

		let new_parents = parents_of(&dependencies).cloned().collect();
		let old_parents = match self.get_mut(id.as_str()) {
			Some(object) => {
				let old = std::mem::replace(&mut object.dependencies, dependencies);
				parents_of(&old).cloned().collect()
			}
			None => Vec::new(),
		};
		self.unlink(&id, old_parents);
		self.link(&id, new_parents);

		self.variables = variables;
		let recomputed = self.commit(staged);

		tracing::debug!(%id, recomputed, "object updated");
		Ok(())
	}

	/// Store `value` under `name` and recompute every object reading it,
	/// followed by their descendants.
	pub fn assign_variable(&mut self, name: &str, value: f64) -> Result<()> {
		let mut variables = self.variables.clone();
		variables.set(name, value);

		let roots: Vec<ObjectId> = self
			.objects
			.iter()
			.filter(|object| object.mentions(name))
			.map(|object| object.id.clone())
			.collect();
		let order = self.cascade_order(&roots);
		let staged = self.stage(&order, &variables, None)?;

		self.variables = variables;
		let recomputed = self.commit(staged);

		tracing::debug!(name, value, recomputed, "variable assigned");
		Ok(())
	}

	/// Mark `id` as the highlighted object, clearing the previous one.
	pub fn highlight(&mut self, id: Option<&str>) -> Result<()> {
		let next = match id {
			Some(id) => match self.object(id) {
				Some(object) => Some(object.id.clone()),
				None => return Err(GeometryError::NotFound(ObjectId::from(id))),
			},
			None => None,
		};

		if let Some(previous) = self.highlighted.take() {
			if let Some(object) = self.get_mut(previous.as_str()) {
				object.highlight = 0.0;
			}
		}
		if let Some(next) = &next {
			if let Some(object) = self.get_mut(next.as_str()) {
				object.highlight = 1.0;
			}
		}

		self.highlighted = next;
		Ok(())
	}

	pub fn highlighted(&self) -> Option<&ObjectId> {
		self.highlighted.as_ref()
	}

	pub fn object(&self, id: &str) -> Option<&GeometricObject> {
		self.index.get(id).map(|&index| &self.objects[index])
	}

	/// First object with the given display name.
	pub fn object_by_name(&self, name: &str) -> Option<&GeometricObject> {
		self.objects.iter().find(|object| object.name == name)
	}

	/// All objects in creation order.
	pub fn objects(&self) -> impl Iterator<Item = &GeometricObject> {
		self.objects.iter()
	}

	pub fn objects_of(&self, kind: GeometryKind) -> impl Iterator<Item = &GeometricObject> {
		self.objects.iter().filter(move |object| object.kind() == kind)
	}

	pub fn len(&self) -> usize {
		self.objects.len()
	}

	pub fn is_empty(&self) -> bool {
		self.objects.is_empty()
	}

	pub fn variables(&self) -> &VariableStore {
		&self.variables
	}

	pub fn variable(&self, name: &str) -> Option<f64> {
		self.variables.get(name)
	}

	fn get_mut(&mut self, id: &str) -> Option<&mut GeometricObject> {
		let index = *self.index.get(id)?;
		self.objects.get_mut(index)
	}

	fn require_parents(&self, dependencies: &[Dependency]) -> Result<()> {
		match parents_of(dependencies).find(|parent| !self.index.contains_key(*parent)) {
			Some(missing) => Err(GeometryError::MissingDependency(missing.clone())),
			None => Ok(()),
		}
	}

	fn kind_of(&self, id: &ObjectId) -> Option<GeometryKind> {
		self.object(id.as_str()).map(GeometricObject::kind)
	}

	/// Current variables plus every name `dependencies` mentions.
	fn declared(&self, dependencies: &[Dependency]) -> VariableStore {
		let mut variables = self.variables.clone();
		for dependency in dependencies {
			if let Dependency::Variable(expression) = dependency {
				for name in expression.variables() {
					variables.declare(name);
				}
			}
		}
		variables
	}

	fn link(&mut self, child: &ObjectId, parents: Vec<ObjectId>) {
		for parent in parents {
			if let Some(parent) = self.get_mut(parent.as_str()) {
				parent.children.insert(child.clone());
			}
		}
	}

	fn unlink(&mut self, child: &ObjectId, parents: Vec<ObjectId>) {
		for parent in parents {
			if let Some(parent) = self.get_mut(parent.as_str()) {
				parent.children.remove(child);
			}
		}
	}

	/// `roots` and all of their descendants, each one after all of its
	/// parents that are part of the result.
	fn cascade_order<'a>(&self, roots: impl IntoIterator<Item = &'a ObjectId>) -> Vec<ObjectId> {
		fn visit(scene: &Scene, id: &ObjectId, visited: &mut FxHashSet<ObjectId>, order: &mut Vec<ObjectId>) {
			if !visited.insert(id.clone()) {
				return;
			}
			if let Some(object) = scene.object(id.as_str()) {
				for child in &object.children {
					visit(scene, child, visited, order);
				}
			}
			order.push(id.clone());
		}

		let mut visited = FxHashSet::default();
		let mut order = Vec::new();
		for root in roots {
			visit(self, root, &mut visited, &mut order);
		}

		order.reverse();
		order
	}

	/// Compute new attributes for `order` without writing them.
	/// `replaced` overrides the dependency list of one object.
	fn stage(
		&self,
		order: &[ObjectId],
		variables: &VariableStore,
		replaced: Option<(&ObjectId, &[Dependency])>,
	) -> Result<Staging> {
		let mut staged = Staging::default();
		for id in order {
			let object = self
				.object(id.as_str())
				.ok_or_else(|| GeometryError::NotFound(id.clone()))?;
			let dependencies = match replaced {
				Some((replaced_id, dependencies)) if replaced_id == id => dependencies,
				_ => &object.dependencies[..],
			};

			let values = evaluate(
				dependencies,
				&Staged {
					scene: self,
					staged: &staged,
				},
				variables,
			)?;
			let attributes = object.instruction.build(&values)?;
			tracing::trace!(%id, ?attributes, "recomputed");
			staged.insert(id.clone(), attributes);
		}

		Ok(staged)
	}

	fn commit(&mut self, staged: Staging) -> usize {
		let count = staged.len();
		for (id, attributes) in staged {
			if let Some(object) = self.get_mut(id.as_str()) {
				object.attributes = attributes;
			}
		}
		count
	}
}

impl Lookup for Scene {
	fn attributes(&self, id: &ObjectId) -> Option<Attributes> {
		self.object(id.as_str()).map(|object| object.attributes)
	}
}

/// Staged attributes layered over the committed ones.
struct Staged<'a> {
	scene: &'a Scene,
	staged: &'a Staging,
}

impl Lookup for Staged<'_> {
	fn attributes(&self, id: &ObjectId) -> Option<Attributes> {
		self.staged
			.get(id)
			.copied()
			.or_else(|| self.scene.attributes(id))
	}
}

#[cfg(test)]
mod tests {
	use glam::DVec3;

	use super::*;

	fn point(scene: &mut Scene, x: f64, y: f64, z: f64) -> ObjectId {
		scene
			.create(
				Instruction::Point,
				vec![Dependency::number(x), Dependency::number(y), Dependency::number(z)],
				None,
				None,
			)
			.unwrap()
	}

	fn position(scene: &Scene, id: &str) -> DVec3 {
		match scene.object(id).unwrap().attributes() {
			Attributes::Point { position } | Attributes::Line { position, .. } => *position,
			other => panic!("{id} has no position: {other:?}"),
		}
	}

	#[test]
	fn ids_are_monotonic_per_kind() {
		let mut scene = Scene::new();
		let p1 = point(&mut scene, 0.0, 0.0, 0.0);
		let p2 = point(&mut scene, 1.0, 0.0, 0.0);
		let line = scene
			.create(
				Instruction::Line2Points,
				vec![Dependency::object(p1.clone()), Dependency::object(p2.clone())],
				None,
				None,
			)
			.unwrap();
		let p3 = point(&mut scene, 2.0, 0.0, 0.0);

		assert_eq!(p1, "P1");
		assert_eq!(p2, "P2");
		assert_eq!(line, "L1");
		assert_eq!(p3, "P3");
	}

	#[test]
	fn name_defaults_to_id_and_color_is_kept() {
		let mut scene = Scene::new();
		let red = Color::rgb(1.0, 0.0, 0.0);
		let id = scene
			.create(
				Instruction::Point,
				vec![Dependency::number(0.0), Dependency::number(0.0), Dependency::number(0.0)],
				Some(red),
				None,
			)
			.unwrap();
		let named = scene
			.create(
				Instruction::Point,
				vec![Dependency::number(1.0), Dependency::number(0.0), Dependency::number(0.0)],
				None,
				Some("origin".to_owned()),
			)
			.unwrap();

		assert_eq!(scene.object(id.as_str()).unwrap().name(), "P1");
		assert_eq!(scene.object(id.as_str()).unwrap().color(), red);
		assert_eq!(scene.object_by_name("origin").unwrap().id(), &named);
	}

	#[test]
	fn create_registers_children() {
		let mut scene = Scene::new();
		let p1 = point(&mut scene, 0.0, 0.0, 0.0);
		let p2 = point(&mut scene, 0.0, 0.0, 1.0);
		let sphere = scene
			.create(
				Instruction::Sphere,
				vec![Dependency::object(p1.clone()), Dependency::number(2.0)],
				None,
				None,
			)
			.unwrap();

		assert!(scene.object(p1.as_str()).unwrap().children().contains(&sphere));
		assert!(scene.object(p2.as_str()).unwrap().children().is_empty());
	}

	#[test]
	fn update_moves_child_links() {
		let mut scene = Scene::new();
		let p1 = point(&mut scene, 0.0, 0.0, 0.0);
		let p2 = point(&mut scene, 1.0, 0.0, 0.0);
		let p3 = point(&mut scene, 0.0, 1.0, 0.0);
		let line = scene
			.create(
				Instruction::Line2Points,
				vec![Dependency::object(p1.clone()), Dependency::object(p2.clone())],
				None,
				None,
			)
			.unwrap();

		scene
			.update(
				line.as_str(),
				vec![Dependency::object(p1.clone()), Dependency::object(p3.clone())],
			)
			.unwrap();

		assert!(scene.object(p2.as_str()).unwrap().children().is_empty());
		assert!(scene.object(p3.as_str()).unwrap().children().contains(&line));
		assert!(scene.object(p1.as_str()).unwrap().children().contains(&line));
		assert_eq!(
			*scene.object(line.as_str()).unwrap().attributes(),
			Attributes::Line {
				position: DVec3::ZERO,
				direction: DVec3::Y,
			}
		);

		// Moving P2 no longer touches the line.
		scene
			.update(
				p2.as_str(),
				vec![Dependency::number(5.0), Dependency::number(5.0), Dependency::number(5.0)],
			)
			.unwrap();
		assert_eq!(position(&scene, line.as_str()), DVec3::ZERO);
	}

	#[test]
	fn cascade_reaches_grandchildren_through_shared_parents() {
		let mut scene = Scene::new();
		let p1 = point(&mut scene, 0.0, 0.0, 0.0);
		let p2 = point(&mut scene, 1.0, 0.0, 0.0);
		let p3 = point(&mut scene, 0.0, 1.0, 0.0);
		let plane = scene
			.create(
				Instruction::Plane3Points,
				vec![
					Dependency::object(p1.clone()),
					Dependency::object(p2.clone()),
					Dependency::object(p3.clone()),
				],
				None,
				None,
			)
			.unwrap();

		scene
			.update(
				p1.as_str(),
				vec![Dependency::number(0.0), Dependency::number(0.0), Dependency::number(2.0)],
			)
			.unwrap();

		match *scene.object(plane.as_str()).unwrap().attributes() {
			Attributes::Plane { normal, distance } => {
				let expected = DVec3::new(1.0, 0.0, -2.0)
					.cross(DVec3::new(0.0, 1.0, -2.0))
					.normalize();
				assert!(normal.abs_diff_eq(expected, 1e-12));
				assert!((distance - expected.dot(DVec3::new(0.0, 0.0, 2.0))).abs() < 1e-12);
			}
			other => panic!("unexpected attributes {other:?}"),
		}
	}

	#[test]
	fn update_of_unknown_object_fails() {
		let mut scene = Scene::new();
		assert_eq!(
			scene.update("P9", Vec::new()),
			Err(GeometryError::NotFound(ObjectId::from("P9")))
		);
	}

	#[test]
	fn unknown_parent_is_a_missing_dependency() {
		let mut scene = Scene::new();
		let p1 = point(&mut scene, 0.0, 0.0, 0.0);

		let created = scene.create(
			Instruction::Line2Points,
			vec![Dependency::object(p1.clone()), Dependency::object("P7")],
			None,
			None,
		);
		assert_eq!(created, Err(GeometryError::MissingDependency(ObjectId::from("P7"))));
		assert_eq!(scene.len(), 1);
		assert!(scene.object(p1.as_str()).unwrap().children().is_empty());

		let p2 = point(&mut scene, 1.0, 0.0, 0.0);
		let line = scene
			.create(
				Instruction::Line2Points,
				vec![Dependency::object(p1.clone()), Dependency::object(p2.clone())],
				None,
				None,
			)
			.unwrap();
		assert_eq!(line, "L1");

		assert_eq!(
			scene.update(line.as_str(), vec![Dependency::object(p1), Dependency::object("L4")]),
			Err(GeometryError::MissingDependency(ObjectId::from("L4")))
		);
		assert!(scene.object(p2.as_str()).unwrap().children().contains(&line));
	}

	#[test]
	fn self_reference_is_a_cycle() {
		let mut scene = Scene::new();
		let p1 = point(&mut scene, 0.0, 0.0, 0.0);

		let error = scene
			.update(
				p1.as_str(),
				vec![Dependency::object(p1.clone()), Dependency::number(0.0), Dependency::number(0.0)],
			)
			.unwrap_err();
		assert_eq!(
			error,
			GeometryError::Cycle {
				object: p1.clone(),
				parent: p1.clone(),
			}
		);
	}

	#[test]
	fn descendant_reference_is_a_cycle() {
		let mut scene = Scene::new();
		let p1 = point(&mut scene, 0.0, 0.0, 0.0);
		let p2 = point(&mut scene, 1.0, 0.0, 0.0);
		let line = scene
			.create(
				Instruction::Line2Points,
				vec![Dependency::object(p1.clone()), Dependency::object(p2.clone())],
				None,
				None,
			)
			.unwrap();

		let error = scene
			.update(
				p1.as_str(),
				vec![Dependency::object(line.clone()), Dependency::number(0.0), Dependency::number(0.0)],
			)
			.unwrap_err();
		assert!(matches!(error, GeometryError::Cycle { .. }));
		assert_eq!(position(&scene, p1.as_str()), DVec3::ZERO);
	}

	#[test]
	fn failing_cascade_leaves_scene_untouched() {
		let mut scene = Scene::new();
		let p1 = point(&mut scene, 0.0, 0.0, 0.0);
		let p2 = point(&mut scene, 1.0, 0.0, 0.0);
		let line = scene
			.create(
				Instruction::Line2Points,
				vec![Dependency::object(p1.clone()), Dependency::object(p2.clone())],
				None,
				None,
			)
			.unwrap();

		// Moving P1 onto P2 makes the line degenerate.
		let error = scene
			.update(
				p1.as_str(),
				vec![Dependency::number(1.0), Dependency::number(0.0), Dependency::number(0.0)],
			)
			.unwrap_err();
		assert!(matches!(error, GeometryError::InvalidArgument { .. }));

		assert_eq!(position(&scene, p1.as_str()), DVec3::ZERO);
		assert_eq!(
			*scene.object(line.as_str()).unwrap().attributes(),
			Attributes::Line {
				position: DVec3::ZERO,
				direction: DVec3::X,
			}
		);
	}

	#[test]
	fn failed_assignment_keeps_previous_value() {
		let mut scene = Scene::new();
		let center = point(&mut scene, 0.0, 0.0, 0.0);
		let sphere = scene
			.create(
				Instruction::Sphere,
				vec![Dependency::object(center), Dependency::variable("r + 1").unwrap()],
				None,
				None,
			)
			.unwrap();

		let error = scene.assign_variable("r", -3.0).unwrap_err();
		assert!(matches!(error, GeometryError::InvalidArgument { .. }));
		assert_eq!(scene.variable("r"), Some(0.0));
		assert_eq!(
			*scene.object(sphere.as_str()).unwrap().attributes(),
			Attributes::Sphere {
				center: DVec3::ZERO,
				radius: 1.0,
			}
		);
	}

	#[test]
	fn assignment_cascades_to_children() {
		let mut scene = Scene::new();
		let p1 = scene
			.create(
				Instruction::Point,
				vec![
					Dependency::variable("t").unwrap(),
					Dependency::number(0.0),
					Dependency::number(0.0),
				],
				None,
				None,
			)
			.unwrap();
		let p2 = point(&mut scene, 0.0, 0.0, 0.0);
		let line = scene
			.create(
				Instruction::Line2Points,
				vec![Dependency::object(p2), Dependency::object(p1.clone())],
				None,
				None,
			)
			.unwrap_err();
		// t defaults to 0, so P1 and P2 coincide.
		assert!(matches!(line, GeometryError::InvalidArgument { .. }));

		scene.assign_variable("t", 2.0).unwrap();
		let p3 = point(&mut scene, 0.0, 0.0, 0.0);
		let line = scene
			.create(
				Instruction::Line2Points,
				vec![Dependency::object(p3), Dependency::object(p1.clone())],
				None,
				None,
			)
			.unwrap();
		assert_eq!(line, "L1");

		scene.assign_variable("t", -4.0).unwrap();
		assert_eq!(position(&scene, p1.as_str()), DVec3::new(-4.0, 0.0, 0.0));
		assert_eq!(
			*scene.object(line.as_str()).unwrap().attributes(),
			Attributes::Line {
				position: DVec3::ZERO,
				direction: -DVec3::X,
			}
		);
	}

	#[test]
	fn unrelated_objects_are_not_recomputed_on_assignment() {
		let mut scene = Scene::new();
		let p1 = point(&mut scene, 1.0, 2.0, 3.0);
		scene.assign_variable("unused", 7.0).unwrap();

		assert_eq!(position(&scene, p1.as_str()), DVec3::new(1.0, 2.0, 3.0));
		assert_eq!(scene.variable("unused"), Some(7.0));
	}

	#[test]
	fn highlight_switches_between_objects() {
		let mut scene = Scene::new();
		let p1 = point(&mut scene, 0.0, 0.0, 0.0);
		let p2 = point(&mut scene, 1.0, 0.0, 0.0);

		scene.highlight(Some(p1.as_str())).unwrap();
		assert_eq!(scene.object(p1.as_str()).unwrap().highlight(), 1.0);

		scene.highlight(Some(p2.as_str())).unwrap();
		assert_eq!(scene.object(p1.as_str()).unwrap().highlight(), 0.0);
		assert_eq!(scene.object(p2.as_str()).unwrap().highlight(), 1.0);
		assert_eq!(scene.highlighted(), Some(&p2));

		assert!(scene.highlight(Some("K4")).is_err());
		assert_eq!(scene.highlighted(), Some(&p2));

		scene.highlight(None).unwrap();
		assert_eq!(scene.object(p2.as_str()).unwrap().highlight(), 0.0);
		assert_eq!(scene.highlighted(), None);
	}

	#[test]
	fn objects_can_be_filtered_by_kind() {
		let mut scene = Scene::new();
		let p1 = point(&mut scene, 0.0, 0.0, 0.0);
		scene
			.create(
				Instruction::Sphere,
				vec![Dependency::object(p1), Dependency::number(1.0)],
				None,
				None,
			)
			.unwrap();
		point(&mut scene, 1.0, 0.0, 0.0);

		let points: Vec<_> = scene
			.objects_of(GeometryKind::Point)
			.map(|object| object.id().to_string())
			.collect();
		assert_eq!(points, ["P1", "P2"]);
		assert_eq!(scene.objects_of(GeometryKind::Sphere).count(), 1);
		assert_eq!(scene.len(), 3);
	}
}
