//! Scene primitives and room geometry.
//!
//! The scene is constructed by the embedding layer and consumed by the core:
//! a list of obstacle primitives plus explicit identifiers for the sound
//! source and the listener. The core borrows objects for the duration of a
//! query and only ever mutates the positions of movable ones.

use crate::error::{Result, SoundTraceError};
use crate::math::Vec3;
use uuid::Uuid;

/// Geometric shape of a scene object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Sphere with uniform radius
    Sphere { radius: f32 },
    /// Axis-aligned box described by its half extents
    Cuboid { half_extents: Vec3 },
}

/// A single object in the simulated room.
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub id: Uuid,
    pub name: String,
    pub position: Vec3,
    pub shape: Shape,
    /// Collidable for ray queries; invisible objects are skipped entirely
    pub visible: bool,
    /// Static objects are rasterized into the occupancy grid once and never
    /// moved by the optimizer
    pub is_static: bool,
}

impl SceneObject {
    pub fn sphere(name: impl Into<String>, position: Vec3, radius: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            position,
            shape: Shape::Sphere { radius },
            visible: true,
            is_static: true,
        }
    }

    pub fn cuboid(name: impl Into<String>, position: Vec3, half_extents: Vec3) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            position,
            shape: Shape::Cuboid { half_extents },
            visible: true,
            is_static: true,
        }
    }

    pub fn movable(mut self) -> Self {
        self.is_static = false;
        self
    }

    pub fn invisible(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Largest half extent of the shape, used as the object's effective
    /// radius for occupancy and collision checks.
    pub fn bounding_radius(&self) -> f32 {
        match self.shape {
            Shape::Sphere { radius } => radius,
            Shape::Cuboid { half_extents } => half_extents.max_element(),
        }
    }

    /// Per-axis half extents (spheres report their radius on every axis).
    pub fn half_extents(&self) -> Vec3 {
        match self.shape {
            Shape::Sphere { radius } => Vec3::splat(radius),
            Shape::Cuboid { half_extents } => half_extents,
        }
    }

    /// World-space axis-aligned bounding box.
    pub fn aabb(&self) -> (Vec3, Vec3) {
        let he = self.half_extents();
        (self.position - he, self.position + he)
    }
}

/// Room bounds: a box of `width` x `height` x `depth` with its floor at Y=0,
/// centered on the origin in X and Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Room {
    pub width: f32,
    pub depth: f32,
    pub height: f32,
    pub wall_thickness: f32,
}

impl Room {
    pub fn new(width: f32, depth: f32, height: f32, wall_thickness: f32) -> Self {
        Self {
            width,
            depth,
            height,
            wall_thickness,
        }
    }

    pub fn min(&self) -> Vec3 {
        Vec3::new(-self.width / 2.0, 0.0, -self.depth / 2.0)
    }

    pub fn max(&self) -> Vec3 {
        Vec3::new(self.width / 2.0, self.height, self.depth / 2.0)
    }

    /// Clamps a position so an object with the given half extents cannot clip
    /// into the walls, floor or ceiling.
    pub fn clamp(&self, pos: Vec3, half_extents: Vec3) -> Vec3 {
        Vec3::new(
            pos.x.clamp(
                -self.width / 2.0 + half_extents.x,
                self.width / 2.0 - half_extents.x,
            ),
            pos.y.clamp(
                half_extents.y,
                self.height - self.wall_thickness - half_extents.y,
            ),
            pos.z.clamp(
                -self.depth / 2.0 + half_extents.z,
                self.depth / 2.0 - half_extents.z,
            ),
        )
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new(40.0, 40.0, 10.0, 0.2)
    }
}

/// Owned collection of scene objects plus the source/listener designations.
#[derive(Debug, Clone)]
pub struct Scene {
    room: Room,
    objects: Vec<SceneObject>,
    source_id: Option<Uuid>,
    listener_id: Option<Uuid>,
}

impl Scene {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            objects: Vec::new(),
            source_id: None,
            listener_id: None,
        }
    }

    pub fn room(&self) -> Room {
        self.room
    }

    pub fn add_object(&mut self, object: SceneObject) -> Uuid {
        let id = object.id;
        self.objects.push(object);
        id
    }

    /// Adds the sound source. The object is forced movable.
    pub fn add_source(&mut self, object: SceneObject) -> Uuid {
        let id = self.add_object(object.movable());
        self.source_id = Some(id);
        id
    }

    /// Adds the listener. The object is forced movable.
    pub fn add_listener(&mut self, object: SceneObject) -> Uuid {
        let id = self.add_object(object.movable());
        self.listener_id = Some(id);
        id
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn object(&self, id: Uuid) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn object_mut(&mut self, id: Uuid) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    pub fn source_id(&self) -> Option<Uuid> {
        self.source_id
    }

    pub fn listener_id(&self) -> Option<Uuid> {
        self.listener_id
    }

    pub fn source(&self) -> Result<&SceneObject> {
        self.source_id
            .and_then(|id| self.object(id))
            .ok_or_else(|| SoundTraceError::Scene("no sound source in scene".into()))
    }

    pub fn listener(&self) -> Result<&SceneObject> {
        self.listener_id
            .and_then(|id| self.object(id))
            .ok_or_else(|| SoundTraceError::Scene("no listener in scene".into()))
    }

    /// Static obstacles, excluding the movable source and listener.
    pub fn static_objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(|o| o.is_static)
    }
}
