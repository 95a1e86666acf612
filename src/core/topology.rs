//! Topology describes the 2D input grid the region looks at, and the neighborhood notions built on it.
//!
//! Columns are anchored at coordinates of the input grid, so one coordinate system serves both the
//! proximal synapses (which point at input bits) and the columns (which compete with the columns
//! anchored around them). The module provides:
//! - conversions between linear input indices and `(x, y)` coordinates,
//! - a clipped box iterator used when wiring a column to the inputs around its anchor,
//! - the Chebyshev-box neighbor search used for local inhibition,
//! - the adaptive inhibition radius and its memoization rule.
//!
//! Neighbor lists are a pure function of the anchors and the radius. They are cached on the columns
//! and only recomputed when the rounded radius changes, so a column may compete against a neighbor
//! set that is one tick stale while the radius is drifting.

use serde::{Deserialize, Serialize};
use std::cmp::min;

/// A position on the input grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: usize,
    pub y: usize,
}

impl Coordinate {
    #[inline]
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Largest per-axis distance between two coordinates.
    #[inline]
    pub fn chebyshev_distance(&self, other: &Coordinate) -> usize {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Straight-line distance between two coordinates.
    #[inline]
    pub fn euclidean_distance(&self, other: &Coordinate) -> f32 {
        let dx = self.x.abs_diff(other.x) as f32;
        let dy = self.y.abs_diff(other.y) as f32;
        dx.hypot(dy)
    }
}

/// The shape of the input grid. Indices are row-major: `index = y * width + x`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    width: usize,
    height: usize,
}

impl Topology {
    /// Creates a new `Topology` for a `width x height` grid.
    #[inline]
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of grid cells.
    #[inline]
    pub fn size(&self) -> usize {
        self.width * self.height
    }

    /// Whether the coordinate lies on the grid.
    #[inline]
    pub fn contains(&self, coord: Coordinate) -> bool {
        coord.x < self.width && coord.y < self.height
    }

    /// Converts a linear index into its grid coordinate.
    #[inline]
    pub fn coordinate(&self, index: usize) -> Coordinate {
        Coordinate {
            x: index % self.width,
            y: index / self.width,
        }
    }

    /// Converts a grid coordinate into its linear index.
    #[inline]
    pub fn index(&self, coord: Coordinate) -> usize {
        coord.y * self.width + coord.x
    }

    /// Returns an iterator over every coordinate within Chebyshev distance `radius` of `center`,
    /// clipped at the grid edges. Coordinates are yielded row by row.
    #[inline]
    pub fn neighborhood(&self, center: Coordinate, radius: usize) -> NeighborhoodIter {
        let x_bounds = (
            center.x.saturating_sub(radius),
            min(center.x + radius + 1, self.width),
        );
        let y_bounds = (
            center.y.saturating_sub(radius),
            min(center.y + radius + 1, self.height),
        );

        NeighborhoodIter {
            x_bounds,
            y_bounds,
            current: if x_bounds.0 < x_bounds.1 && y_bounds.0 < y_bounds.1 {
                Some(Coordinate::new(x_bounds.0, y_bounds.0))
            } else {
                None
            },
        }
    }
}

/// An iterator over a clipped rectangular neighborhood of the grid.
pub struct NeighborhoodIter {
    x_bounds: (usize, usize),
    y_bounds: (usize, usize),
    current: Option<Coordinate>,
}

impl Iterator for NeighborhoodIter {
    type Item = Coordinate;

    /// Returns the next coordinate within the neighborhood. When all coordinates have been visited, it returns `None`.
    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current?;

        self.current = if result.x + 1 < self.x_bounds.1 {
            Some(Coordinate::new(result.x + 1, result.y))
        } else if result.y + 1 < self.y_bounds.1 {
            Some(Coordinate::new(self.x_bounds.0, result.y + 1))
        } else {
            None
        };

        Some(result)
    }

    /// Provides the exact number of coordinates remaining in the neighborhood.
    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = match self.current {
            None => 0,
            Some(c) => {
                let width = self.x_bounds.1 - self.x_bounds.0;
                let rows_after = self.y_bounds.1 - c.y - 1;
                (self.x_bounds.1 - c.x) + rows_after * width
            }
        };

        (count, Some(count))
    }
}

impl ExactSizeIterator for NeighborhoodIter {}

/// Returns every index `j != index` whose coordinate lies inside the Chebyshev box of half-width
/// `radius` centered on `coordinates[index]`. Only the column itself is excluded.
pub fn neighbors_within(index: usize, coordinates: &[Coordinate], radius: f32) -> Vec<usize> {
    let center = coordinates[index];

    coordinates
        .iter()
        .enumerate()
        .filter(|&(other, coord)| {
            other != index && center.chebyshev_distance(coord) as f32 <= radius
        })
        .map(|(other, _)| other)
        .collect()
}

/// Mean Euclidean distance over every `(anchor, connected source)` pair.
/// Returns `None` when no pair exists, so callers can keep their previous radius.
pub fn average_receptive_field<I, S>(pairs: I) -> Option<f32>
where
    I: IntoIterator<Item = (Coordinate, S)>,
    S: IntoIterator<Item = Coordinate>,
{
    let mut sum = 0.0f64;
    let mut count = 0usize;

    for (anchor, sources) in pairs {
        for source in sources {
            sum += anchor.euclidean_distance(&source) as f64;
            count += 1;
        }
    }

    (count > 0).then(|| (sum / count as f64) as f32)
}

/// The adaptive half-width of the inhibition neighborhood, together with the value it had before
/// the last update. Neighbor lists only need recomputing when the rounded value moved.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InhibitionRadius {
    current: f32,
    previous: f32,
}

impl InhibitionRadius {
    #[inline]
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            previous: initial,
        }
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn previous(&self) -> f32 {
        self.previous
    }

    /// Whether the rounded radius changed with the last update.
    #[inline]
    pub fn needs_recompute(&self) -> bool {
        self.current.round() != self.previous.round()
    }

    /// Moves the current radius into `previous` and installs the new value.
    #[inline]
    pub fn update(&mut self, radius: f32) {
        self.previous = self.current;
        self.current = radius;
    }
}
