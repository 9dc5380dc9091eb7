use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time;

use sprite_playground::{
    config::PlaygroundConfig,
    engine::{Sequencer, store::SpriteStore},
    input::pointer::PointerTracker,
    program::{EventKind, Program},
    stage::SpriteBounds,
    types::{Animation, AnimationKind, Point, SpeechText, SpriteMotion},
};

struct FixedCenter(Point);

impl SpriteBounds for FixedCenter {
    fn center(&self, _motion: &SpriteMotion) -> Point {
        self.0
    }
}

fn sequencer_with_seed(seed: u64) -> Sequencer {
    let config = PlaygroundConfig {
        seed: Some(seed),
        ..Default::default()
    };
    Sequencer::new(
        Arc::new(SpriteStore::new()),
        Arc::new(PointerTracker::new(config.timing.pointer_throttle())),
        FixedCenter(Point::new(100.0, 100.0)),
        &config,
    )
}

fn sequencer() -> Sequencer {
    sequencer_with_seed(7)
}

/// Build one chain: an event block followed by `steps` linked through `next`.
fn chain(event: &str, steps: &[serde_json::Value]) -> serde_json::Value {
    let mut next: Option<serde_json::Value> = None;
    for step in steps.iter().rev() {
        let mut block = step.clone();
        if let Some(rest) = next.take() {
            block["next"] = json!({ "block": rest });
        }
        next = Some(block);
    }
    let mut head = json!({ "type": event });
    if let Some(rest) = next {
        head["next"] = json!({ "block": rest });
    }
    head
}

fn program(chains: &[serde_json::Value]) -> Program {
    let json = json!({ "blocks": { "languageVersion": 0, "blocks": chains } });
    Program::from_json(&json.to_string()).unwrap()
}

fn block(kind: &str, fields: serde_json::Value) -> serde_json::Value {
    json!({ "type": kind, "fields": fields })
}

#[tokio::test(start_paused = true)]
async fn event_without_chains_changes_nothing() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_key_pressed",
        &[block("change_size", json!({ "size": 10 }))],
    )]));

    assert_eq!(seq.start_animation(EventKind::FlagClicked), None);
    assert_eq!(seq.store().motion(), SpriteMotion::default());
    assert_eq!(seq.store().history_len(), 0);
    assert!(!seq.is_playing());
}

#[tokio::test(start_paused = true)]
async fn chain_steps_accumulate_until_idle() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[
            block("go_to", json!({ "x_position": 50, "y_position": 80 })),
            block("clockwise", json!({ "angle": 15 })),
            block("change_size", json!({ "size": 10 })),
        ],
    )]));

    assert!(seq.run().is_some());
    assert!(seq.is_playing());
    seq.wait_idle().await;

    let motion = seq.store().motion();
    assert_eq!(motion.position, Point::new(50.0, 80.0));
    assert_eq!(motion.rotation, 15.0);
    assert_eq!(motion.size, 10.0);
    assert!(!seq.is_playing());
    assert_eq!(seq.store().history_len(), 1);
}

#[tokio::test(start_paused = true)]
async fn set_then_change_composes() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[
            block("set_x", json!({ "x_position": 10 })),
            block("change_y_by", json!({ "delta_y": 5 })),
        ],
    )]));

    seq.run();
    seq.wait_idle().await;
    assert_eq!(seq.store().motion().position, Point::new(10.0, 5.0));
}

#[tokio::test(start_paused = true)]
async fn steps_are_paced() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[
            block("set_x", json!({ "x_position": 10 })),
            block("set_x", json!({ "x_position": 20 })),
        ],
    )]));

    seq.run();
    assert_eq!(seq.store().motion().position.x, 0.0);
    time::sleep(Duration::from_millis(15)).await;
    assert_eq!(seq.store().motion().position.x, 10.0);
    time::sleep(Duration::from_millis(10)).await;
    assert_eq!(seq.store().motion().position.x, 20.0);
}

#[tokio::test(start_paused = true)]
async fn undo_restores_snapshot_and_empties_history() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[block("go_to", json!({ "x_position": 50, "y_position": 80 }))],
    )]));

    seq.run();
    seq.wait_idle().await;
    assert_eq!(seq.store().motion().position, Point::new(50.0, 80.0));

    assert!(seq.undo());
    assert_eq!(seq.store().motion(), SpriteMotion::default());
    assert_eq!(seq.store().history_len(), 0);
    assert!(!seq.undo());
}

#[tokio::test(start_paused = true)]
async fn undo_stops_the_run_in_flight() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[
            block("set_x", json!({ "x_position": 10 })),
            block("set_x", json!({ "x_position": 20 })),
            block("set_x", json!({ "x_position": 30 })),
        ],
    )]));

    seq.run();
    time::sleep(Duration::from_millis(15)).await;
    assert_eq!(seq.store().motion().position.x, 10.0);

    assert!(seq.undo());
    time::sleep(Duration::from_millis(100)).await;
    assert_eq!(seq.store().motion().position.x, 0.0);
    assert!(!seq.is_playing());
}

#[tokio::test(start_paused = true)]
async fn reset_restores_defaults_and_cancels_pending_steps() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[
            block("go_to", json!({ "x_position": 50, "y_position": 80 })),
            block("say_for_seconds", json!({ "message": "Hi", "seconds": 1 })),
            block("change_size", json!({ "size": 10 })),
        ],
    )]));

    seq.run();
    time::sleep(Duration::from_millis(15)).await;
    seq.reset();
    assert!(!seq.is_playing());

    seq.wait_idle().await;
    time::sleep(Duration::from_secs(2)).await;
    assert_eq!(seq.store().motion(), SpriteMotion::default());
    assert_eq!(seq.store().history_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn say_for_seconds_clears_after_its_duration() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[block("say_for_seconds", json!({ "message": "Hi", "seconds": 1 }))],
    )]));

    seq.run();
    seq.wait_idle().await;
    let shown = SpeechText {
        message: "Hi".into(),
        duration_ms: 1000,
        think: false,
    };
    assert_eq!(seq.store().motion().text, shown);

    time::sleep(Duration::from_millis(999)).await;
    assert_eq!(seq.store().motion().text, shown);
    time::sleep(Duration::from_millis(2)).await;
    assert_eq!(seq.store().motion().text, SpeechText::default());
}

#[tokio::test(start_paused = true)]
async fn bare_say_is_not_cleared() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[block("think", json!({ "message": "Hmm" }))],
    )]));

    seq.run();
    seq.wait_idle().await;
    time::sleep(Duration::from_secs(5)).await;
    let text = seq.store().motion().text;
    assert_eq!(text.message, "Hmm");
    assert_eq!(text.duration_ms, 100);
    assert!(text.think);
}

#[tokio::test(start_paused = true)]
async fn clear_from_a_superseded_run_keeps_newer_text() {
    let seq = sequencer();
    seq.replace_program(program(&[
        chain(
            "when_flag_clicked",
            &[block("say_for_seconds", json!({ "message": "first", "seconds": 1 }))],
        ),
        chain(
            "when_key_pressed",
            &[block("say", json!({ "message": "second" }))],
        ),
    ]));

    seq.run();
    time::sleep(Duration::from_millis(500)).await;
    seq.start_animation(EventKind::KeyPressed);
    time::sleep(Duration::from_millis(1000)).await;

    assert_eq!(seq.store().motion().text.message, "second");
}

#[tokio::test(start_paused = true)]
async fn timed_clears_within_a_chain_apply_on_schedule() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[
            block("say_for_seconds", json!({ "message": "a", "seconds": 1 })),
            block("say_for_seconds", json!({ "message": "b", "seconds": 3 })),
        ],
    )]));

    seq.run();
    seq.wait_idle().await;
    assert_eq!(seq.store().motion().text.message, "b");

    time::sleep(Duration::from_millis(1080)).await;
    assert_eq!(seq.store().motion().text, SpeechText::default());
}

#[tokio::test(start_paused = true)]
async fn timed_say_clears_a_later_bare_say_of_the_same_chain() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[
            block("say_for_seconds", json!({ "message": "a", "seconds": 1 })),
            block("say", json!({ "message": "b" })),
        ],
    )]));

    seq.run();
    seq.wait_idle().await;
    assert_eq!(seq.store().motion().text.message, "b");

    time::sleep(Duration::from_millis(1080)).await;
    assert_eq!(seq.store().motion().text, SpeechText::default());
}

#[tokio::test(start_paused = true)]
async fn first_glide_of_a_chain_ends_the_animation() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[
            block("glide", json!({ "seconds": 1, "x_position": 10, "y_position": 10 })),
            block("glide", json!({ "seconds": 3, "x_position": 90, "y_position": 40 })),
        ],
    )]));

    seq.run();
    seq.wait_idle().await;
    assert_eq!(seq.store().motion().animation.map(|a| a.duration_ms), Some(3000));

    time::sleep(Duration::from_millis(1080)).await;
    let motion = seq.store().motion();
    assert_eq!(motion.animation, None);
    assert_eq!(motion.position, Point::new(90.0, 40.0));
}

#[tokio::test(start_paused = true)]
async fn remaining_block_kinds_run_through_a_chain() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[
            block("point_in_direction", json!({ "direction": 90 })),
            block("anticlockwise", json!({ "angle": 30 })),
            block("move", json!({ "x_position": 5 })),
            block("set_y", json!({ "y_position": 7 })),
            block("think_for_seconds", json!({ "message": "Hmm", "seconds": 0.5 })),
            block("glide_random", json!({ "seconds": 0.2 })),
        ],
    )]));

    seq.run();
    time::sleep(Duration::from_millis(45)).await;
    assert_eq!(seq.store().motion().position, Point::new(5.0, 7.0));

    seq.wait_idle().await;
    let motion = seq.store().motion();
    assert_eq!(motion.rotation, 60.0);
    assert_eq!(
        motion.text,
        SpeechText {
            message: "Hmm".into(),
            duration_ms: 500,
            think: true,
        }
    );
    assert_eq!(
        motion.animation,
        Some(Animation {
            kind: AnimationKind::Glide,
            duration_ms: 200,
        })
    );
    assert!((0.0..400.0).contains(&motion.position.x));
    assert!((0.0..400.0).contains(&motion.position.y));

    time::sleep(Duration::from_millis(500)).await;
    let motion = seq.store().motion();
    assert_eq!(motion.text, SpeechText::default());
    assert_eq!(motion.animation, None);
    assert_eq!(motion.rotation, 60.0);
}

#[tokio::test(start_paused = true)]
async fn glide_clears_its_animation() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[block(
            "glide",
            json!({ "seconds": 0.5, "x_position": 30, "y_position": 40 }),
        )],
    )]));

    seq.run();
    seq.wait_idle().await;
    let motion = seq.store().motion();
    assert_eq!(motion.position, Point::new(30.0, 40.0));
    assert_eq!(
        motion.animation,
        Some(Animation {
            kind: AnimationKind::Glide,
            duration_ms: 500,
        })
    );

    time::sleep(Duration::from_millis(501)).await;
    assert_eq!(seq.store().motion().animation, None);
    assert_eq!(seq.store().motion().position, Point::new(30.0, 40.0));
}

#[tokio::test(start_paused = true)]
async fn point_towards_follows_the_throttled_pointer() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_sprite_clicked",
        &[block("point_towards", json!({ "target": "MOUSE_POINTER" }))],
    )]));

    assert!(seq.pointer().record(Point::new(200.0, 100.0)));
    seq.start_animation(EventKind::SpriteClicked);
    seq.wait_idle().await;
    assert!(seq.store().motion().rotation.abs() < 1e-9);

    // Inside the throttle window: held back until the window closes.
    assert!(!seq.pointer().record(Point::new(100.0, 0.0)));
    seq.start_animation(EventKind::SpriteClicked);
    seq.wait_idle().await;
    assert!(seq.store().motion().rotation.abs() < 1e-9);

    time::sleep(Duration::from_millis(200)).await;
    seq.start_animation(EventKind::SpriteClicked);
    seq.wait_idle().await;
    assert!((seq.store().motion().rotation - 270.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn runs_keep_the_program_they_started_with() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[
            block("change_x_by", json!({ "delta_x": 10 })),
            block("change_x_by", json!({ "delta_x": 10 })),
        ],
    )]));

    seq.run();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[block("change_y_by", json!({ "delta_y": 5 }))],
    )]));
    seq.wait_idle().await;
    assert_eq!(seq.store().motion().position, Point::new(20.0, 0.0));

    seq.run();
    seq.wait_idle().await;
    assert_eq!(seq.store().motion().position, Point::new(20.0, 5.0));
}

#[tokio::test(start_paused = true)]
async fn run_is_ignored_while_playing() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[
            block("change_x_by", json!({ "delta_x": 1 })),
            block("change_x_by", json!({ "delta_x": 1 })),
        ],
    )]));

    let first = seq.run();
    assert!(first.is_some());
    assert_eq!(seq.run(), None);
    assert_eq!(seq.store().history_len(), 1);

    seq.wait_idle().await;
    let second = seq.run();
    assert!(second > first);
    seq.wait_idle().await;
    assert_eq!(seq.store().motion().position.x, 4.0);
}

#[tokio::test(start_paused = true)]
async fn newer_run_supersedes_older_one() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_key_pressed",
        &[
            block("change_x_by", json!({ "delta_x": 1 })),
            block("change_x_by", json!({ "delta_x": 1 })),
            block("change_x_by", json!({ "delta_x": 1 })),
        ],
    )]));

    let first = seq.start_animation(EventKind::KeyPressed);
    let second = seq.start_animation(EventKind::KeyPressed);
    assert_ne!(first, second);
    assert_eq!(seq.current_run(), second);

    seq.wait_idle().await;
    assert_eq!(seq.store().motion().position.x, 3.0);
    assert_eq!(seq.store().history_len(), 2);
}

#[tokio::test(start_paused = true)]
async fn every_matching_chain_runs() {
    let seq = sequencer();
    seq.replace_program(program(&[
        chain(
            "when_flag_clicked",
            &[block("change_x_by", json!({ "delta_x": 3 }))],
        ),
        chain(
            "when_flag_clicked",
            &[block("change_y_by", json!({ "delta_y": 4 }))],
        ),
    ]));

    seq.run();
    seq.wait_idle().await;
    assert_eq!(seq.store().motion().position, Point::new(3.0, 4.0));
    assert_eq!(seq.store().history_len(), 1);
}

#[tokio::test(start_paused = true)]
async fn random_targets_repeat_for_a_seed() {
    let chains = [chain("when_flag_clicked", &[block("go_to_random", json!({}))])];
    let mut positions = Vec::new();
    for _ in 0..2 {
        let seq = sequencer_with_seed(42);
        seq.replace_program(program(&chains));
        seq.run();
        seq.wait_idle().await;
        positions.push(seq.store().motion().position);
    }

    assert_eq!(positions[0], positions[1]);
    let p = positions[0];
    assert!((0.0..400.0).contains(&p.x));
    assert!((0.0..400.0).contains(&p.y));
}

#[tokio::test(start_paused = true)]
async fn observers_see_each_change() {
    let seq = sequencer();
    seq.replace_program(program(&[chain(
        "when_flag_clicked",
        &[block("set_y", json!({ "y_position": 12 }))],
    )]));

    let mut rx = seq.store().subscribe();
    rx.current();
    seq.run();

    let mut seen = 0;
    while rx.current().position.y != 12.0 {
        rx.changed().await.unwrap();
        seen += 1;
    }
    assert!(seen > 0);
}
