//! Invariants that must hold for any input stream.

use cortical_htm::{HtmConfig, InputGrid, Region};
use fxhash::FxHashSet;
use proptest::prelude::*;

const WIDTH: usize = 8;
const HEIGHT: usize = 8;

fn config(seed: u64) -> HtmConfig {
    HtmConfig {
        input_width: WIDTH,
        input_height: HEIGHT,
        columns_count: 6,
        potential_synapses_per_column: 12,
        min_overlap: 1.0,
        desired_local_activity: 2,
        permanence_inc: 0.2,
        permanence_dec: 0.1,
        history_window_size: 16,
        activation_threshold: 0,
        min_threshold: 0,
        new_synapse_count: 3,
        cells_per_column: 3,
        inhibition_radius_initial: 3.0,
        seed,
        ..HtmConfig::default()
    }
}

fn grid(bits: &[bool]) -> InputGrid {
    InputGrid::from_fn(WIDTH, HEIGHT, |x, y| bits[y * WIDTH + x])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_permanences_stay_in_unit_interval(
        seed in any::<u64>(),
        inputs in proptest::collection::vec(proptest::collection::vec(any::<bool>(), WIDTH * HEIGHT), 1..25)
    ) {
        let mut region = Region::new(config(seed)).unwrap();

        for bits in &inputs {
            region.run(&grid(bits)).unwrap();

            let sp = region.spatial_pooler();
            for col in 0..sp.num_columns() {
                for syn in sp.potential_synapses(col) {
                    prop_assert!((0.0..=1.0).contains(&syn.permanence));
                }
            }
            for permanence in region.temporal_pooler().permanences() {
                prop_assert!((0.0..=1.0).contains(&permanence));
            }
            prop_assert!(sp.columns.iter().all(|c| c.boost >= 1.0));
        }
    }

    #[test]
    fn prop_cells_follow_winner_columns(
        seed in any::<u64>(),
        inputs in proptest::collection::vec(proptest::collection::vec(any::<bool>(), WIDTH * HEIGHT), 1..25)
    ) {
        let mut region = Region::new(config(seed)).unwrap();

        for bits in &inputs {
            let winners: FxHashSet<usize> = region.run(&grid(bits)).unwrap().iter().copied().collect();

            let sp = region.spatial_pooler();
            prop_assert!(winners.iter().all(|&c| sp.columns[c].overlap > 0.0));

            let active: FxHashSet<usize> = region.active_cells().iter().map(|a| a.col).collect();
            prop_assert_eq!(&active, &winners);

            let learning: FxHashSet<usize> = region.learning_cells().iter().map(|a| a.col).collect();
            prop_assert_eq!(&learning, &winners);

            // Every lateral synapse points at another, existing cell.
            let tp = region.temporal_pooler();
            for col in 0..tp.num_columns() {
                for i in 0..tp.cells_per_column() {
                    let owner = cortical_htm::CellAddress::new(col, i);
                    let cell = tp.cell(owner).unwrap();
                    for segment in &cell.segments {
                        let sources: FxHashSet<_> = segment.synapses.iter().map(|s| s.source).collect();
                        prop_assert_eq!(sources.len(), segment.synapses.len());
                        prop_assert!(!sources.contains(&owner));
                        prop_assert!(sources.iter().all(|s| tp.cell(*s).is_some()));
                    }
                }
            }
        }
    }
}
