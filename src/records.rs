//! Best-score record keeping.
//!
//! Whenever an optimization run finds a new best score, the full parameter
//! and position set is captured as an opaque snapshot and stored in a sorted
//! top-N list. A stored snapshot can later be reapplied to a world, the
//! inverse of capturing it.

use crate::math::Vec3;
use log::info;

/// Complete simulation state at the moment a new best score was found.
#[derive(Debug, Clone, PartialEq)]
pub struct BestScoreSettings {
    pub score: u32,
    pub iteration: usize,
    pub num_rays: usize,
    pub initial_ray_opacity: f32,
    pub max_bounces: u32,
    pub attenuation_factor: f32,
    pub exploration_factor: f32,
    pub source_pos: Vec3,
    pub listener_pos: Vec3,
    pub show_only_listener_rays: bool,
}

/// Sorted top-N list of best-score snapshots.
pub struct RecordManager {
    records: Vec<BestScoreSettings>,
    max_records: usize,
}

impl RecordManager {
    pub fn new(max_records: usize) -> Self {
        Self {
            records: Vec::with_capacity(max_records),
            max_records,
        }
    }

    /// Inserts a snapshot, keeping the list sorted by score descending and
    /// truncated to capacity.
    pub fn add(&mut self, settings: BestScoreSettings) {
        info!(
            "new record candidate: score {} at iteration {}",
            settings.score, settings.iteration
        );
        self.records.push(settings);
        self.records.sort_by(|a, b| b.score.cmp(&a.score));
        self.records.truncate(self.max_records);
    }

    pub fn records(&self) -> &[BestScoreSettings] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&BestScoreSettings> {
        self.records.get(index)
    }

    pub fn best(&self) -> Option<&BestScoreSettings> {
        self.records.first()
    }
}

impl Default for RecordManager {
    fn default() -> Self {
        Self::new(10)
    }
}
