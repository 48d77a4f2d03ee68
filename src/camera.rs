use std::f64::consts::FRAC_PI_2;

use glam::{DMat4, DVec3};

use crate::{derived, transaction, Changed, Derived, Source};

/// Initial camera values.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
	pub position: DVec3,
	pub target: DVec3,
	pub up: DVec3,
	/// Vertical field of view in radians.
	pub field_of_view: f64,
	pub aspect: f64,
	pub near: f64,
	pub far: f64,
}

impl Default for CameraSettings {
	fn default() -> Self {
		CameraSettings {
			position: DVec3::new(1.0, 2.0, 2.0),
			target: DVec3::ZERO,
			up: DVec3::Y,
			field_of_view: FRAC_PI_2,
			aspect: 1.0,
			near: 0.1,
			far: 1000.0,
		}
	}
}

/// Camera parameters as source cells plus the view and projection
/// matrices derived from them.
pub struct Camera {
	position: Source<DVec3>,
	target: Source<DVec3>,
	up: Source<DVec3>,
	field_of_view: Source<f64>,
	aspect: Source<f64>,
	near: Source<f64>,
	far: Source<f64>,
	view: Derived<DMat4>,
	projection: Derived<DMat4>,
}

impl Camera {
	pub fn new(settings: &CameraSettings) -> Self {
		let position = Source::named("camera.position", settings.position);
		let target = Source::named("camera.target", settings.target);
		let up = Source::named("camera.up", settings.up);
		let field_of_view = Source::named("camera.field_of_view", settings.field_of_view);
		let aspect = Source::named("camera.aspect", settings.aspect);
		let near = Source::named("camera.near", settings.near);
		let far = Source::named("camera.far", settings.far);

		let view = derived!("camera.view", (position, target, up) => {
			look_at(*position.get(), *target.get(), *up.get())
		});
		let projection = derived!("camera.projection", (field_of_view, aspect, near, far) => {
			perspective(*field_of_view.get(), *aspect.get(), *near.get(), *far.get())
		});

		Camera {
			position,
			target,
			up,
			field_of_view,
			aspect,
			near,
			far,
			view,
			projection,
		}
	}

	pub fn position(&self) -> &Source<DVec3> {
		&self.position
	}

	pub fn target(&self) -> &Source<DVec3> {
		&self.target
	}

	pub fn up(&self) -> &Source<DVec3> {
		&self.up
	}

	pub fn field_of_view(&self) -> &Source<f64> {
		&self.field_of_view
	}

	pub fn aspect(&self) -> &Source<f64> {
		&self.aspect
	}

	pub fn near(&self) -> &Source<f64> {
		&self.near
	}

	pub fn far(&self) -> &Source<f64> {
		&self.far
	}

	pub fn view(&self) -> &Derived<DMat4> {
		&self.view
	}

	pub fn projection(&self) -> &Derived<DMat4> {
		&self.projection
	}

	pub fn set_position(&self, position: DVec3) -> Changed {
		transaction(|tx| tx.set(&self.position, position))
	}

	/// Move position and target in one transaction.
	pub fn look_at(&self, position: DVec3, target: DVec3) -> Changed {
		transaction(|tx| {
			tx.set(&self.position, position);
			tx.set(&self.target, target);
		})
	}

	/// Follow a resize of the drawing surface.
	pub fn resize(&self, width: u32, height: u32) -> Changed {
		let aspect = if height == 0 {
			0.0
		} else {
			f64::from(width) / f64::from(height)
		};
		transaction(|tx| tx.set(&self.aspect, aspect))
	}
}

impl Default for Camera {
	fn default() -> Self {
		Camera::new(&CameraSettings::default())
	}
}

fn look_at(position: DVec3, target: DVec3, up: DVec3) -> Option<DMat4> {
	let direction = (target - position).try_normalize()?;
	direction.cross(up).try_normalize()?;
	Some(DMat4::look_at_rh(position, target, up))
}

fn perspective(field_of_view: f64, aspect: f64, near: f64, far: f64) -> Option<DMat4> {
	let valid = field_of_view > 0.0
		&& field_of_view < std::f64::consts::PI
		&& aspect > 0.0
		&& near > 0.0
		&& far > near;
	valid.then(|| DMat4::perspective_rh_gl(field_of_view, aspect, near, far))
}
