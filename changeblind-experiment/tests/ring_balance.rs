mod common;

use changeblind_core::{RingLayout, TrialOutcome};
use changeblind_experiment::{ExperimentConfig, InputEvent};
use common::{controller, immediate_config};

fn two_layout_block() -> ExperimentConfig {
    ExperimentConfig {
        training_block: false,
        total_blocks: 1,
        trials_per_block: 6,
        ring_layouts: vec![RingLayout::Single, RingLayout::Dual],
        ..immediate_config()
    }
}

#[test]
fn aborted_trials_do_not_skew_layout_counts() {
    for seed in 0..16 {
        let (mut c, timer) = controller(two_layout_block(), seed);
        let mut aborts = 0;

        for _ in 0..64 {
            if c.is_complete() {
                break;
            }
            assert!(c.handle_input(InputEvent::Advance));
            let layout = c.current_trial().unwrap().ring_layout;
            timer.advance_ms(100);
            c.update();
            if layout == RingLayout::Single && aborts < 8 {
                assert!(c.handle_input(InputEvent::Abort));
                aborts += 1;
            } else {
                timer.advance_ms(4000);
                c.update();
            }
        }
        assert!(c.is_complete(), "seed {seed}: session did not finish");

        let completed = |layout| {
            c.results()
                .iter()
                .filter(|r| r.outcome != TrialOutcome::Aborted && r.ring_layout == layout)
                .count()
        };
        assert_eq!(completed(RingLayout::Single), 3, "seed {seed}");
        assert_eq!(completed(RingLayout::Dual), 3, "seed {seed}");
    }
}

#[test]
fn abort_returns_the_layout_to_the_pool() {
    let config = ExperimentConfig {
        trials_per_block: 2,
        ..two_layout_block()
    };
    let (mut c, timer) = controller(config, 9);

    c.handle_input(InputEvent::Advance);
    let first = c.current_trial().unwrap().ring_layout;
    timer.advance_ms(4000);
    c.update();

    // the remaining slot must go to the other layout, however often it aborts
    let other = if first == RingLayout::Single {
        RingLayout::Dual
    } else {
        RingLayout::Single
    };
    for _ in 0..5 {
        c.handle_input(InputEvent::Advance);
        assert_eq!(c.current_trial().unwrap().ring_layout, other);
        assert!(c.handle_input(InputEvent::Abort));
    }
    c.handle_input(InputEvent::Advance);
    assert_eq!(c.current_trial().unwrap().ring_layout, other);
}
