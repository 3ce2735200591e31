//! SoundTrace — room-scale sound propagation and placement optimization.
//!
//! The crate simulates how sound energy radiates from a point source to a
//! listener inside a bounded room populated with static obstacles, and
//! searches for source/listener placements that maximize a weighted arrival
//! score.
//!
//! # Architecture
//!
//! - [`SoundWorld`] is the explicit simulation context: it owns the scene,
//!   the simulation parameters and the occupancy grid, and is threaded
//!   through all core operations. Multiple independent worlds can coexist.
//! - [`propagation`] casts Fibonacci-sphere distributed rays, reflects them
//!   off scene geometry up to a bounce limit, and scores listener arrivals.
//! - [`occupancy`] discretizes the room into cells so candidate placements
//!   can be validated in O(local volume) instead of O(obstacle count).
//! - [`Optimizer`] alternates moving the source and the listener through a
//!   local neighborhood search with randomized escape jumps. It is
//!   step-driven: each `step` advances one turn and returns a snapshot,
//!   leaving scheduling entirely to the caller.

pub mod config;
pub mod error;
pub mod math;
pub mod occupancy;
pub mod optimizer;
pub mod propagation;
pub mod raycaster;
pub mod records;
pub mod scene;
pub mod world;

pub use config::SimulationParams;
pub use error::{Result, SoundTraceError};
pub use occupancy::{CellState, DynamicRole, OccupancyGrid};
pub use optimizer::{Optimizer, RunSummary, StepReport, Turn};
pub use propagation::{Evaluation, RaySegment};
pub use raycaster::RayHit;
pub use records::{BestScoreSettings, RecordManager};
pub use scene::{Room, Scene, SceneObject, Shape};
pub use world::SoundWorld;
