//! Hierarchical temporal memory: a spatial pooler that turns a boolean input grid into a sparse
//! set of winner columns, and a temporal pooler that learns sequences of those columns and
//! predicts the next ones.
//!
//! ```no_run
//! use cortical_htm::{HtmConfig, InputGrid, Region};
//!
//! let config = HtmConfig::default();
//! let mut region = Region::new(config.clone())?;
//! let input = InputGrid::from_fn(config.input_width, config.input_height, |x, _| x < 4);
//! let winners = region.run(&input)?.to_vec();
//! println!("winners {:?}, next {:?}", winners, region.predictive_columns());
//! # Ok::<(), cortical_htm::HtmError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;

pub use crate::config::HtmConfig;
pub use crate::core::{
    cell::{CellAddress, CellFlags, TimeStep},
    column::ColumnLayout,
    initializer::LayoutOptions,
    input::InputGrid,
    region::Region,
    spatial_pooler::SpatialPooler,
    synapses::Synapse,
    temporal_pooler::{TemporalPooler, TemporalPoolerParams},
    topology::Coordinate,
};
pub use crate::error::{HtmError, Result};
