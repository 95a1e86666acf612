//! The boolean input grid a region reads each tick. It is supplied by the caller and only ever read.

use super::topology::{Coordinate, Topology};

/// A `width x height` matrix of input bits, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputGrid {
    topology: Topology,
    bits: Vec<bool>,
}

impl InputGrid {
    /// Creates an all-off grid.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            topology: Topology::new(width, height),
            bits: vec![false; width * height],
        }
    }

    /// Builds a grid by evaluating `f(x, y)` for every coordinate.
    pub fn from_fn<F: FnMut(usize, usize) -> bool>(width: usize, height: usize, mut f: F) -> Self {
        let topology = Topology::new(width, height);
        let bits = (0..width * height)
            .map(|i| {
                let c = topology.coordinate(i);
                f(c.x, c.y)
            })
            .collect();
        Self { topology, bits }
    }

    /// Builds a grid from equally long rows. Returns `None` for ragged input.
    pub fn from_rows<R: AsRef<[bool]>>(rows: &[R]) -> Option<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.as_ref().len());
        if rows.iter().any(|r| r.as_ref().len() != width) {
            return None;
        }
        let bits = rows.iter().flat_map(|r| r.as_ref().iter().copied()).collect();
        Some(Self {
            topology: Topology::new(width, height),
            bits,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.topology.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.topology.height()
    }

    /// Reads the bit at `coord`. Coordinates off the grid read as off.
    #[inline]
    pub fn get(&self, coord: Coordinate) -> bool {
        self.topology.contains(coord) && self.bits[self.topology.index(coord)]
    }

    #[inline]
    pub fn set(&mut self, coord: Coordinate, value: bool) {
        if self.topology.contains(coord) {
            let index = self.topology.index(coord);
            self.bits[index] = value;
        }
    }

    /// Number of bits that are on.
    pub fn count_on(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }
}
