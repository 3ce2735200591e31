//! Simulation parameters for SoundTrace

/// Tunable parameters for propagation and placement optimization.
///
/// All values are supplied by the embedding layer (UI, config file) and are
/// treated as valid numeric inputs; the only core-side clamping is the
/// reduced-resolution ray count derived in the propagation engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    /// Number of ray directions for a full evaluation
    pub num_rays: usize,
    /// Opacity assigned to a ray before any bounce
    pub initial_ray_opacity: f32,
    /// Maximum number of reflections per traced ray
    pub max_bounces: u32,
    /// Per-bounce multiplicative decay of ray opacity
    pub attenuation_factor: f32,
    /// Multiplier for optimizer randomness (jump probability and magnitude)
    pub exploration_factor: f32,
    /// When set, only segments belonging to listener-reaching paths are
    /// emitted for visualization
    pub show_only_listener_rays: bool,
    /// Base probability of a randomized escape jump on a score plateau
    pub random_jump_probability: f64,
    /// Iteration cap for an optimization run
    pub max_iterations: usize,
    /// Neighborhood step size for candidate placements
    pub step_size: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            num_rays: 1000,
            initial_ray_opacity: 0.6,
            max_bounces: 3,
            attenuation_factor: 0.85,
            exploration_factor: 1.0,
            show_only_listener_rays: true,
            random_jump_probability: 0.1,
            max_iterations: 50_000,
            step_size: 0.5,
        }
    }
}

impl SimulationParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_rays(mut self, n: usize) -> Self {
        self.num_rays = n;
        self
    }

    pub fn initial_ray_opacity(mut self, opacity: f32) -> Self {
        self.initial_ray_opacity = opacity;
        self
    }

    pub fn max_bounces(mut self, bounces: u32) -> Self {
        self.max_bounces = bounces;
        self
    }

    pub fn attenuation_factor(mut self, factor: f32) -> Self {
        self.attenuation_factor = factor;
        self
    }

    pub fn exploration_factor(mut self, factor: f32) -> Self {
        self.exploration_factor = factor;
        self
    }

    pub fn show_only_listener_rays(mut self, enable: bool) -> Self {
        self.show_only_listener_rays = enable;
        self
    }

    pub fn random_jump_probability(mut self, probability: f64) -> Self {
        self.random_jump_probability = probability;
        self
    }

    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn step_size(mut self, step: f32) -> Self {
        self.step_size = step;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chains() {
        let params = SimulationParams::new()
            .num_rays(200)
            .max_bounces(5)
            .attenuation_factor(0.7)
            .show_only_listener_rays(false);
        assert_eq!(params.num_rays, 200);
        assert_eq!(params.max_bounces, 5);
        assert_eq!(params.attenuation_factor, 0.7);
        assert!(!params.show_only_listener_rays);
        // untouched fields keep their defaults
        assert_eq!(params.step_size, 0.5);
    }
}
