//! Math types and direction sampling for SoundTrace

use std::f32::consts::PI;

pub use glam::Vec3;

/// Parametric distance tolerance shared by the raycaster and the optimizer's
/// duplicate-position checks.
pub const EPSILON: f32 = 1e-4;

/// Builds a vector from spherical coordinates.
///
/// `phi` is the polar angle measured from the +Y axis (0..PI), `theta` the
/// azimuthal angle around Y. Matches the three.js convention so directions
/// line up with the visualization layer.
pub fn from_spherical(radius: f32, phi: f32, theta: f32) -> Vec3 {
    let sin_phi_radius = phi.sin() * radius;
    Vec3::new(
        sin_phi_radius * theta.sin(),
        phi.cos() * radius,
        sin_phi_radius * theta.cos(),
    )
}

/// Returns the `i`-th of `n` unit directions spaced quasi-uniformly over the
/// sphere by the Fibonacci-spiral parametrization.
///
/// The arc-cosine spacing of the polar angle keeps directions from clustering
/// at the poles; the azimuth advances by `sqrt(n * PI)` per unit of polar
/// angle. Deterministic for a fixed `(i, n)`.
pub fn fibonacci_sphere_direction(i: usize, n: usize) -> Vec3 {
    let phi = (-1.0 + (2.0 * i as f32) / n as f32).clamp(-1.0, 1.0).acos();
    let theta = (n as f32 * PI).sqrt() * phi;
    from_spherical(1.0, phi, theta).normalize_or_zero()
}

/// Reflects `v` about a unit `normal`: `v - 2 * dot(v, n) * n`.
pub fn reflect(v: Vec3, normal: Vec3) -> Vec3 {
    v - normal * (2.0 * v.dot(normal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spherical_poles() {
        let up = from_spherical(1.0, 0.0, 0.0);
        assert!((up - Vec3::Y).length() < 1e-6);
        let down = from_spherical(1.0, PI, 0.0);
        assert!((down + Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn fibonacci_directions_are_unit_and_deterministic() {
        let n = 128;
        for i in 0..n {
            let d = fibonacci_sphere_direction(i, n);
            assert!((d.length() - 1.0).abs() < 1e-5, "direction {} not unit", i);
            assert_eq!(d, fibonacci_sphere_direction(i, n));
        }
    }

    #[test]
    fn fibonacci_directions_cover_both_hemispheres() {
        let n = 100;
        let ups = (0..n)
            .filter(|&i| fibonacci_sphere_direction(i, n).y > 0.0)
            .count();
        assert!(ups > n / 4 && ups < 3 * n / 4);
    }

    #[test]
    fn reflect_preserves_length_and_flips_normal_component() {
        let v = Vec3::new(0.3, -0.8, 0.5).normalize();
        let n = Vec3::new(0.0, 1.0, 0.0);
        let r = reflect(v, n);
        assert!((r.length() - 1.0).abs() < 1e-6);
        assert!((r.dot(n) + v.dot(n)).abs() < 1e-6);
    }

    #[test]
    fn normalize_zero_vector_is_zero() {
        assert_eq!(Vec3::ZERO.normalize_or_zero(), Vec3::ZERO);
    }
}
