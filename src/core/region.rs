//! A `Region` stacks a temporal pooler on top of a spatial pooler.
//!
//! Each tick feeds the input grid to the spatial pooler, and its winner columns become the
//! feed-forward input of the temporal pooler. Both stages are deterministic for a given seed.

use super::{
    cell::CellAddress,
    column::ColumnLayout,
    initializer::{build_layout, LayoutOptions},
    input::InputGrid,
    spatial_pooler::SpatialPooler,
    temporal_pooler::TemporalPooler,
};
use crate::{config::HtmConfig, error::Result};
use rand::{rngs::StdRng, SeedableRng};

#[derive(Debug, Clone)]
pub struct Region {
    config: HtmConfig,
    spatial_pooler: SpatialPooler,
    temporal_pooler: TemporalPooler,
}

impl Region {
    /// Creates a region whose columns are placed and wired by the initializer, seeded from
    /// `config.seed`.
    pub fn new(config: HtmConfig) -> Result<Self> {
        Self::with_options(config, &LayoutOptions::default())
    }

    /// Like [`Region::new`], with explicit control over the initial permanences.
    pub fn with_options(config: HtmConfig, options: &LayoutOptions) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let layout = build_layout(&config, options, &mut rng)?;
        Self::with_layout(config, layout)
    }

    /// Creates a region from a prepared column layout.
    pub fn with_layout(config: HtmConfig, layout: Vec<ColumnLayout>) -> Result<Self> {
        let spatial_pooler = SpatialPooler::new(&config, layout)?;
        let temporal_pooler = TemporalPooler::from_config(&config)?;

        Ok(Self {
            config,
            spatial_pooler,
            temporal_pooler,
        })
    }

    /// Runs one learning tick and returns the winner columns.
    pub fn run(&mut self, input: &InputGrid) -> Result<&[usize]> {
        self.compute(input, true)
    }

    /// Runs one tick without changing any permanence, boost or segment.
    pub fn infer(&mut self, input: &InputGrid) -> Result<&[usize]> {
        self.compute(input, false)
    }

    fn compute(&mut self, input: &InputGrid, learn: bool) -> Result<&[usize]> {
        let active = self.spatial_pooler.compute(input, learn)?;
        self.temporal_pooler.compute(active, learn);
        Ok(self.spatial_pooler.active_columns())
    }

    #[inline]
    pub fn config(&self) -> &HtmConfig {
        &self.config
    }

    #[inline]
    pub fn spatial_pooler(&self) -> &SpatialPooler {
        &self.spatial_pooler
    }

    #[inline]
    pub fn temporal_pooler(&self) -> &TemporalPooler {
        &self.temporal_pooler
    }

    /// Number of completed ticks.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.temporal_pooler.generation()
    }

    /// Winner columns of the last tick.
    #[inline]
    pub fn active_columns(&self) -> &[usize] {
        self.spatial_pooler.active_columns()
    }

    /// Columns expected to win on the next tick.
    pub fn predictive_columns(&self) -> Vec<usize> {
        self.temporal_pooler.predictive_columns()
    }

    pub fn active_cells(&self) -> Vec<CellAddress> {
        self.temporal_pooler.active_cells()
    }

    pub fn predictive_cells(&self) -> Vec<CellAddress> {
        self.temporal_pooler.predictive_cells()
    }

    pub fn learning_cells(&self) -> Vec<CellAddress> {
        self.temporal_pooler.learning_cells()
    }
}
