pub mod cell;
pub mod column;
pub mod duty_cycle;
pub mod initializer;
pub mod input;
pub mod region;
pub mod segment;
pub mod spatial_pooler;
pub mod synapses;
pub mod temporal_pooler;
pub mod topology;
