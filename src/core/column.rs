//! A `Column` in HTM represents one feature detector or receptive field in the Spatial Pooler.
//!
//! Biological inspiration:
//! Columns in HTM are inspired by cortical mini-columns found in the brain.
//! They consist of a group of neurons, which in HTM are modeled as "cells".
//!
//! Meaning in HTM:
//! Each column is anchored at a coordinate of the input grid and reads a fixed set of input bits
//! (via its potential synapses). It computes its overlap score with the current input, and competes
//! with the columns anchored around it (local inhibition within a radius) to become one of the
//! active "winner columns". Two duty-cycle histories record how often the column overlapped the
//! input and how often it won; they drive boosting and the permanence rescue bump.
//!
//! The synapses themselves live in the spatial pooler's flat `Synapses` pool.

use super::{duty_cycle::DutyCycleHistory, synapses::Synapse, topology::Coordinate};
use serde::{Deserialize, Serialize};

/// Construction-time description of one column: where it sits and what it is wired to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnLayout {
    pub coordinate: Coordinate,
    pub synapses: Vec<Synapse>,
}

/// Represents a cortical column in the HTM model.
#[derive(Debug, Clone)]
pub struct Column {
    /// The index of the column.
    pub index: usize,

    /// The anchor of the column on the input grid.
    pub coordinate: Coordinate,

    /// Boosted overlap computed on the last tick, zero when below `min_overlap`.
    pub overlap: f32,

    /// Multiplier applied to the raw overlap. Never below 1.0.
    pub boost: f32,

    /// Activity level under which the column counts as starving.
    pub min_duty_cycle: f32,

    /// Fraction of recent ticks the column won inhibition.
    pub active_duty_cycle: f32,

    /// Fraction of recent ticks the column's overlap survived `min_overlap`.
    pub overlap_duty_cycle: f32,

    /// Per-tick record of inhibition outcomes.
    pub active_history: DutyCycleHistory,

    /// Per-tick record of overlap outcomes.
    pub overlap_history: DutyCycleHistory,

    /// Cached indices of the columns this one competes with. `None` until first computed.
    pub neighbors: Option<Vec<usize>>,
}

impl Column {
    /// Creates a new Column with empty histories and a neutral boost.
    pub fn new(index: usize, coordinate: Coordinate, history_window_size: usize) -> Self {
        Self {
            index,
            coordinate,
            overlap: 0.0,
            boost: 1.0,
            min_duty_cycle: 0.0,
            active_duty_cycle: 0.0,
            overlap_duty_cycle: 0.0,
            active_history: DutyCycleHistory::new(history_window_size),
            overlap_history: DutyCycleHistory::new(history_window_size),
            neighbors: None,
        }
    }

    /// Whether the column won inhibition on the last tick.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active_history.last().unwrap_or(false)
    }

    /// The cached neighbor list, empty when not computed yet.
    #[inline]
    pub fn neighbors(&self) -> &[usize] {
        self.neighbors.as_deref().unwrap_or(&[])
    }

    /// Refreshes both duty cycles from the histories.
    pub fn update_duty_cycles(&mut self) {
        self.active_duty_cycle = self.active_history.duty_cycle();
        self.overlap_duty_cycle = self.overlap_history.duty_cycle();
    }

    /// Applies the boosting rule: an active enough column is reset to a boost of 1.0,
    /// a starving one grows its boost by its minimal duty cycle.
    pub fn update_boost(&mut self) {
        if self.active_duty_cycle > self.min_duty_cycle {
            self.boost = 1.0;
        } else {
            self.boost += self.min_duty_cycle;
        }
    }

    /// Whether the column overlaps the input too rarely and needs its permanences bumped.
    #[inline]
    pub fn is_overlap_starving(&self) -> bool {
        self.overlap_duty_cycle < self.min_duty_cycle
    }
}
