//! Cooperative placement optimizer.
//!
//! The optimizer alternates between moving the sound source and the listener,
//! one turn per step. Each step scores the 26 neighboring offsets of the
//! moving object with the reduced-resolution propagation estimate, commits an
//! improving move when one exists, and otherwise may attempt a larger
//! randomized escape jump so the search does not freeze on a plateau.
//!
//! The optimizer is step-driven: `step` advances exactly one turn and returns
//! a snapshot, leaving scheduling, rendering cadence and sleeping entirely to
//! the caller. `run` is the convenience loop that drives `step` to the
//! iteration cap, checking a cancellation flag between steps.

use crate::error::Result;
use crate::math::{EPSILON, Vec3};
use crate::occupancy::DynamicRole;
use crate::records::BestScoreSettings;
use crate::world::SoundWorld;
use crossbeam_channel::Sender;
use log::{error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whose turn it is to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Source,
    Listener,
}

impl Turn {
    pub fn role(self) -> DynamicRole {
        match self {
            Turn::Source => DynamicRole::Source,
            Turn::Listener => DynamicRole::Listener,
        }
    }

    fn flipped(self) -> Self {
        match self {
            Turn::Source => Turn::Listener,
            Turn::Listener => Turn::Source,
        }
    }
}

/// Snapshot returned after each optimizer step, consumed by the embedding
/// progress layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// 1-based iteration count
    pub iteration: usize,
    /// The turn that was just executed
    pub turn: Turn,
    pub source_pos: Vec3,
    pub listener_pos: Vec3,
    /// Full-resolution score after the move
    pub score: u32,
    /// Best full-resolution score observed this run, if any
    pub best_score: Option<u32>,
}

/// Outcome of a completed (or cancelled) optimization run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub iterations: usize,
    pub best: Option<BestScoreSettings>,
    pub cancelled: bool,
}

/// Alternating local-search optimizer for source and listener placement.
pub struct Optimizer {
    rng: StdRng,
    iteration: usize,
    turn: Turn,
    best: Option<BestScoreSettings>,
    stop: Arc<AtomicBool>,
    progress: Option<Sender<StepReport>>,
}

impl Optimizer {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Seeded construction for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            iteration: 0,
            turn: Turn::Source,
            best: None,
            stop: Arc::new(AtomicBool::new(false)),
            progress: None,
        }
    }

    /// Registers a channel that receives one report per step.
    pub fn with_progress(mut self, sender: Sender<StepReport>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Shared flag another thread can set to cancel the run; checked between
    /// steps, so cancellation takes effect within one step.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn best(&self) -> Option<&BestScoreSettings> {
        self.best.as_ref()
    }

    /// Advances one turn: neighborhood search, move commit, grid update,
    /// full re-evaluation and best-score tracking.
    ///
    /// Returns `Ok(None)` once the iteration cap is reached or the stop flag
    /// is set.
    pub fn step(&mut self, world: &mut SoundWorld) -> Result<Option<StepReport>> {
        if self.iteration >= world.params().max_iterations || self.stop.load(Ordering::Relaxed) {
            return Ok(None);
        }
        self.iteration += 1;
        let turn = self.turn;
        let role = turn.role();

        let chosen = self.find_best_move(world, role)?;
        world.move_role(role, chosen)?;
        self.turn = turn.flipped();

        // Full-resolution score for reporting and best tracking.
        let score = world.evaluate()?.score;
        if self.best.as_ref().is_none_or(|b| score > b.score) {
            let snapshot = world.snapshot(score, self.iteration)?;
            world.records_mut().add(snapshot.clone());
            info!(
                "new best score {} at iteration {} (source {:?}, listener {:?})",
                score, self.iteration, snapshot.source_pos, snapshot.listener_pos
            );
            self.best = Some(snapshot);
        }

        let report = StepReport {
            iteration: self.iteration,
            turn,
            source_pos: world.scene().source()?.position,
            listener_pos: world.scene().listener()?.position,
            score,
            best_score: self.best.as_ref().map(|b| b.score),
        };
        if let Some(sender) = &self.progress {
            // A disconnected receiver only means nobody is watching.
            let _ = sender.send(report);
        }
        Ok(Some(report))
    }

    /// Drives `step` until the iteration cap, cancellation or an error, then
    /// reapplies the best snapshot found.
    ///
    /// A mid-run evaluation error stops the run rather than crashing the
    /// host; the world is still restored to the best known state before the
    /// error is returned.
    pub fn run(&mut self, world: &mut SoundWorld) -> Result<RunSummary> {
        let mut failure = None;
        while !self.stop.load(Ordering::Relaxed) {
            match self.step(world) {
                Ok(Some(_)) => std::thread::yield_now(),
                Ok(None) => break,
                Err(e) => {
                    error!("optimization stopped after a failed step: {}", e);
                    failure = Some(e);
                    break;
                }
            }
        }

        let cancelled = self.stop.load(Ordering::Relaxed);
        if let Some(best) = self.best.clone() {
            info!(
                "optimization finished: best score {} at iteration {}",
                best.score, best.iteration
            );
            world.apply_snapshot(&best)?;
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(RunSummary {
                iterations: self.iteration,
                best: self.best.clone(),
                cancelled,
            }),
        }
    }

    /// One turn of the neighborhood search: returns the position to commit
    /// for the moving object (possibly its current one).
    fn find_best_move(&mut self, world: &SoundWorld, role: DynamicRole) -> Result<Vec3> {
        let moving = world.role_object(role)?;
        let original = moving.position;
        let half_extents = moving.half_extents();
        let room = world.scene().room();
        let step = world.params().step_size;

        let baseline = self.score_for(world, role, original)?;
        let mut best_score = baseline;
        let mut best_positions = vec![original];

        // The 26 neighboring offsets, clamped to the room and deduplicated.
        let mut candidates: Vec<Vec3> = Vec::with_capacity(26);
        for dx in [-step, 0.0, step] {
            for dy in [-step, 0.0, step] {
                for dz in [-step, 0.0, step] {
                    if dx == 0.0 && dy == 0.0 && dz == 0.0 {
                        continue;
                    }
                    let candidate =
                        room.clamp(original + Vec3::new(dx, dy, dz), half_extents);
                    if candidates.iter().any(|c| approx_eq(*c, candidate)) {
                        continue;
                    }
                    if !world.is_valid_placement(role, candidate)? {
                        continue;
                    }
                    candidates.push(candidate);
                }
            }
        }

        for candidate in &candidates {
            let score = self.score_for(world, role, *candidate)?;
            if score > best_score {
                best_score = score;
                best_positions = vec![*candidate];
            } else if score == best_score && !best_positions.iter().any(|p| approx_eq(*p, *candidate))
            {
                best_positions.push(*candidate);
            }
        }

        if best_score > baseline {
            // Improving move: commit to a random one of the tied best.
            return Ok(self.pick(&best_positions));
        }

        // Plateau: occasionally attempt a larger randomized escape jump.
        let exploration = world.params().exploration_factor;
        let jump_probability = world.params().random_jump_probability * exploration as f64;
        if self.rng.random::<f64>() < jump_probability {
            let magnitude = (self.rng.random::<f32>() * 2.0 + 2.0) * exploration;
            let dx = (self.rng.random::<f32>() * 2.0 - 1.0) * step * magnitude;
            let dy = (self.rng.random::<f32>() * 0.5 - 0.25) * step * magnitude;
            let dz = (self.rng.random::<f32>() * 2.0 - 1.0) * step * magnitude;
            let jump = room.clamp(original + Vec3::new(dx, dy, dz), half_extents);
            if world.is_valid_placement(role, jump)? {
                return Ok(jump);
            }
            return Ok(self.pick(&best_positions));
        }

        // No jump: pick among the tied best, preferring an actual move when
        // equally good alternatives exist.
        let chosen = self.pick(&best_positions);
        if approx_eq(chosen, original) && best_positions.len() > 1 {
            let moves: Vec<Vec3> = best_positions
                .iter()
                .copied()
                .filter(|p| !approx_eq(*p, original))
                .collect();
            if !moves.is_empty() {
                return Ok(self.pick(&moves));
            }
        }
        Ok(chosen)
    }

    fn score_for(&self, world: &SoundWorld, role: DynamicRole, pos: Vec3) -> Result<u32> {
        let fixed = world.role_object(match role {
            DynamicRole::Source => DynamicRole::Listener,
            DynamicRole::Listener => DynamicRole::Source,
        })?;
        match role {
            DynamicRole::Source => world.score_candidate(pos, fixed.position),
            DynamicRole::Listener => world.score_candidate(fixed.position, pos),
        }
    }

    fn pick(&mut self, positions: &[Vec3]) -> Vec3 {
        positions[self.rng.random_range(0..positions.len())]
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

fn approx_eq(a: Vec3, b: Vec3) -> bool {
    (a.x - b.x).abs() < EPSILON && (a.y - b.y).abs() < EPSILON && (a.z - b.z).abs() < EPSILON
}
