mod common;

use changeblind_core::{MotionType, SessionPhase, TrialOutcome};
use changeblind_experiment::{ExperimentConfig, ExperimentEvent, InputEvent};
use common::{controller, immediate_config};

fn sequencing_config() -> ExperimentConfig {
    ExperimentConfig {
        training_block: true,
        trials_per_training_block: 2,
        trials_per_block: 3,
        total_blocks: 3,
        ..immediate_config()
    }
}

#[test]
fn runs_eleven_trials_then_completes() {
    let (mut c, timer) = controller(sequencing_config(), 11);
    let mut events = Vec::new();
    let mut breaks = 0;

    for _ in 0..100 {
        if c.is_complete() {
            break;
        }
        if c.phase() == SessionPhase::Break {
            breaks += 1;
            // the advance input cannot leave a break
            assert!(!c.handle_input(InputEvent::Advance));
            assert_eq!(c.phase(), SessionPhase::Break);
            assert!(c.handle_input(InputEvent::BreakContinue));
        }
        assert!(c.handle_input(InputEvent::Advance));
        timer.advance_ms(4000);
        events.extend(c.update());
    }

    assert!(c.is_complete());
    assert_eq!(breaks, 3);
    assert_eq!(c.progress(), (11, 11));
    assert_eq!(c.results().len(), 11);
    assert!(c.results().iter().all(|r| r.outcome == TrialOutcome::NoResponse));

    let blocks: Vec<(usize, MotionType)> = events
        .iter()
        .filter_map(|e| match e {
            ExperimentEvent::BlockStarted {
                block_index,
                motion_type,
            } => Some((*block_index, *motion_type)),
            _ => None,
        })
        .collect();
    assert_eq!(
        blocks,
        vec![
            (0, MotionType::Static),
            (1, MotionType::Static),
            (2, MotionType::ObjectMotion),
            (3, MotionType::ObserverMotion),
        ]
    );

    let per_block: Vec<usize> = (0..4)
        .map(|b| c.results().iter().filter(|r| r.block_index == b).count())
        .collect();
    assert_eq!(per_block, vec![2, 3, 3, 3]);
    assert_eq!(c.state().static_trials_run, 5);
    assert_eq!(c.state().moving_trials_run, 6);

    let completions = events
        .iter()
        .filter(|e| **e == ExperimentEvent::ExperimentComplete)
        .count();
    assert_eq!(completions, 1);
    assert_eq!(c.sink().written.len(), 11);
    assert_eq!(c.sink().finalize_calls, 1);
}

#[test]
fn nothing_starts_after_completion() {
    let config = ExperimentConfig {
        training_block: false,
        total_blocks: 1,
        trials_per_block: 1,
        ..immediate_config()
    };
    let (mut c, timer) = controller(config, 3);
    c.handle_input(InputEvent::Advance);
    timer.advance_ms(4000);
    c.update();
    assert!(c.is_complete());

    assert!(!c.handle_input(InputEvent::Advance));
    assert!(!c.handle_input(InputEvent::BreakContinue));
    timer.advance_ms(10_000);
    assert!(c.update().is_empty());
    assert_eq!(c.sink().finalize_calls, 1);
}

#[test]
fn continue_outside_break_is_ignored() {
    let (mut c, _) = controller(sequencing_config(), 5);
    assert!(!c.handle_input(InputEvent::BreakContinue));
    c.handle_input(InputEvent::Advance);
    assert!(!c.handle_input(InputEvent::BreakContinue));
    assert_eq!(c.phase(), SessionPhase::Training);
}

#[test]
fn training_trials_are_flagged() {
    let (mut c, timer) = controller(sequencing_config(), 9);
    c.handle_input(InputEvent::Advance);
    timer.advance_ms(4000);
    c.update();
    let result = &c.results()[0];
    assert!(result.training);
    assert_eq!(result.trial_type, "static");
}
