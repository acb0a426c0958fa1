use std::f64::consts::PI;

use rand::Rng;

use crate::models::{Target, Viewport};

use super::{fisher_yates, TargetSequence};

/// Ring radii evenly spaced from `max_radius / circles` to `max_radius`.
pub fn radii(circles: u32, max_radius: f64) -> Vec<f64> {
    (1..=circles)
        .map(|k| f64::from(k) * max_radius / f64::from(circles))
        .collect()
}

/// Every ring/spoke intersection, ring by ring, spokes starting at angle 0.
pub fn radial_points(circles: u32, lines: u32, max_radius: f64, center: Target) -> Vec<Target> {
    radii(circles, max_radius)
        .into_iter()
        .flat_map(|radius| {
            (0..lines).map(move |i| {
                let angle = f64::from(i) * 2.0 * PI / f64::from(lines);
                Target::new(
                    center.x + radius * angle.cos(),
                    center.y + radius * angle.sin(),
                )
            })
        })
        .collect()
}

/// Shuffled radial points, each preceded by the viewport center.
pub fn radial_sequence<R: Rng + ?Sized>(
    circles: u32,
    lines: u32,
    max_radius_ratio: f64,
    viewport: Viewport,
    rng: &mut R,
) -> TargetSequence {
    let center = viewport.center();
    let mut points = radial_points(circles, lines, viewport.height * max_radius_ratio, center);
    fisher_yates(&mut points, rng);

    let targets = points
        .into_iter()
        .flat_map(|point| [center, point])
        .collect();
    TargetSequence::new(targets, Some(center))
}
