//! Builds the initial column layout of a region.
//!
//! Column anchors are spread over the input grid with k-means: every input coordinate is assigned
//! to its nearest anchor and anchors move to the centroid of their cluster until they settle.
//! Each column is then wired to a random sample of the inputs in the smallest square
//! neighborhood around its anchor that is large enough.

use super::{
    column::ColumnLayout,
    synapses::Synapse,
    topology::{Coordinate, Topology},
};
use crate::{
    config::HtmConfig,
    error::{HtmError, Result},
};
use rand::{seq::IteratorRandom, Rng};

/// Upper bound of k-means refinement rounds.
pub const MAX_KMEANS_ITERATIONS: usize = 100;

/// Centroids moving less than this along both axes count as settled.
const KMEANS_TOLERANCE: f64 = 0.001;

/// Controls how the initial permanences of a layout are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    /// Probability that a potential synapse starts out connected.
    pub connected_fraction: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            connected_fraction: 0.5,
        }
    }
}

/// Places `k` anchors on a `width x height` grid using k-means over all grid coordinates.
///
/// Starting centroids are `k` distinct random coordinates. A cluster that ends up empty keeps
/// its location. Final centroids are rounded to the nearest grid coordinate.
pub fn kmeans_anchors<R: Rng>(width: usize, height: usize, k: usize, rng: &mut R) -> Vec<Coordinate> {
    let topology = Topology::new(width, height);
    if k == 0 || topology.size() == 0 {
        return Vec::new();
    }

    let points: Vec<(f64, f64)> = (0..topology.size())
        .map(|i| {
            let c = topology.coordinate(i);
            (c.x as f64, c.y as f64)
        })
        .collect();

    let mut centroids: Vec<(f64, f64)> = (0..topology.size())
        .choose_multiple(rng, k)
        .into_iter()
        .map(|i| points[i])
        .collect();

    for iteration in 0..MAX_KMEANS_ITERATIONS {
        let mut sums = vec![(0.0, 0.0, 0usize); centroids.len()];
        for &(x, y) in &points {
            let nearest = nearest_centroid(&centroids, x, y);
            let sum = &mut sums[nearest];
            sum.0 += x;
            sum.1 += y;
            sum.2 += 1;
        }

        let mut settled = true;
        for (centroid, &(sx, sy, n)) in centroids.iter_mut().zip(&sums) {
            if n == 0 {
                continue;
            }
            let next = (sx / n as f64, sy / n as f64);
            if (next.0 - centroid.0).abs() > KMEANS_TOLERANCE || (next.1 - centroid.1).abs() > KMEANS_TOLERANCE {
                settled = false;
            }
            *centroid = next;
        }

        if settled {
            log::trace!("[Init] k-means settled after {} iterations", iteration + 1);
            break;
        }
    }

    centroids
        .into_iter()
        .map(|(x, y)| {
            Coordinate::new(
                (x.round().max(0.0) as usize).min(width - 1),
                (y.round().max(0.0) as usize).min(height - 1),
            )
        })
        .collect()
}

fn nearest_centroid(centroids: &[(f64, f64)], x: f64, y: f64) -> usize {
    let mut best = 0;
    let mut best_distance = f64::MAX;
    for (i, &(cx, cy)) in centroids.iter().enumerate() {
        let distance = (cx - x).hypot(cy - y);
        if distance < best_distance {
            best_distance = distance;
            best = i;
        }
    }
    best
}

/// Wires a column anchored at `anchor` to `n` distinct inputs.
///
/// The inputs are sampled from the smallest clipped square around the anchor holding at least
/// `n` coordinates. With probability `connected_fraction` a synapse starts with a permanence in
/// `(connected, 1]`, otherwise in `[0, connected]`.
pub fn wire_column<R: Rng>(
    anchor: Coordinate,
    n: usize,
    topology: &Topology,
    connected: f32,
    options: &LayoutOptions,
    rng: &mut R,
) -> Vec<Synapse> {
    let n = n.min(topology.size());
    let max_radius = topology.width().max(topology.height());
    let radius = (0..=max_radius)
        .find(|&r| topology.neighborhood(anchor, r).len() >= n)
        .unwrap_or(max_radius);

    topology
        .neighborhood(anchor, radius)
        .choose_multiple(rng, n)
        .into_iter()
        .map(|source| {
            let permanence = if rng.random_bool(options.connected_fraction) {
                1.0 - rng.random::<f32>() * (1.0 - connected)
            } else {
                rng.random::<f32>() * connected
            };
            Synapse::new(source, permanence)
        })
        .collect()
}

/// Builds the full layout for `config`: k-means anchors, each wired to
/// `potential_synapses_per_column` inputs.
pub fn build_layout<R: Rng>(config: &HtmConfig, options: &LayoutOptions, rng: &mut R) -> Result<Vec<ColumnLayout>> {
    config.validate()?;
    if !(0.0..=1.0).contains(&options.connected_fraction) {
        return Err(HtmError::InvalidParameter(format!(
            "connected_fraction must be in [0, 1], got {}",
            options.connected_fraction
        )));
    }

    let topology = Topology::new(config.input_width, config.input_height);
    let anchors = kmeans_anchors(config.input_width, config.input_height, config.columns_count, rng);

    let layout: Vec<ColumnLayout> = anchors
        .into_iter()
        .map(|coordinate| ColumnLayout {
            coordinate,
            synapses: wire_column(
                coordinate,
                config.potential_synapses_per_column,
                &topology,
                config.connected_permanence,
                options,
                rng,
            ),
        })
        .collect();

    log::debug!(
        "[Init] Built layout of {} columns on a {}x{} grid",
        layout.len(),
        config.input_width,
        config.input_height
    );

    Ok(layout)
}
