use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sprite_engine::interpreter::step;
use sprite_engine::{
    ActorId, Block, ParamValue, Script, ScriptId, ScriptIdAllocator, Stage, StageConfig,
};

fn empty_stage(seed: u64) -> Stage {
    Stage::new(StageConfig {
        seed: Some(seed),
        starter_actor: false,
        ..StageConfig::default()
    })
}

fn program_ids(stage: &Stage, id: ActorId) -> Vec<String> {
    stage
        .program(id)
        .unwrap_or_default()
        .into_iter()
        .map(|script| script.id.to_string())
        .collect()
}

fn param(name: &str, value: impl Into<ParamValue>) -> (String, ParamValue) {
    (name.to_string(), value.into())
}

fn move_by(id: &str, steps: f64) -> Script {
    Block::Move.instantiate_with(id, vec![param("steps", steps)])
}

/// Keeps every actor far apart so no swap interferes with the bookkeeping.
fn spread_out(stage: &mut Stage) {
    for (index, id) in stage.actor_ids().into_iter().enumerate() {
        let offset = index as f64 * 60.0;
        stage.set_position(id, offset % 450.0, (offset / 450.0).floor() * 60.0);
    }
}

#[test]
fn broadcast_and_removal_hold_for_random_histories() {
    for seed in 0..24 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut stage = empty_stage(seed);
        let mut ids = ScriptIdAllocator::new();
        let mut expected: Vec<String> = Vec::new();
        let first = stage.create_actor();

        for _ in 0..40 {
            match rng.gen_range(0..4) {
                0 => {
                    stage.create_actor();
                }
                1 | 2 => {
                    let block = Block::ALL[rng.gen_range(0..Block::ALL.len())];
                    let script = block.instantiate(ids.allocate().expect("fresh script id"));
                    expected.push(script.id.to_string());
                    stage.submit_script(first, script);
                }
                _ => {
                    if !expected.is_empty() {
                        let victim = expected.remove(rng.gen_range(0..expected.len()));
                        stage.delete_script(&ScriptId::new(victim.clone()));
                        for actor in stage.actor_ids() {
                            assert!(!program_ids(&stage, actor).contains(&victim));
                        }
                        assert!(!stage.registry().contains(&ScriptId::new(victim)));
                    }
                }
            }
            spread_out(&mut stage);

            for actor in stage.actor_ids() {
                assert_eq!(program_ids(&stage, actor), expected, "seed {seed}, {actor}");
            }
            assert!(stage.is_consistent());
        }
    }
}

#[test]
fn resubmitting_an_id_changes_nothing() {
    let mut stage = empty_stage(1);
    let a = stage.create_actor();
    assert!(stage.submit_script(a, move_by("script-1", 10.0)));
    assert!(!stage.submit_script(a, move_by("script-1", 99.0)));
    let program = stage.program(a).unwrap_or_default();
    assert_eq!(program.len(), 1);
    assert_eq!(program[0].number("steps"), Some(10.0));
}

#[test]
fn motion_never_leaves_the_stage() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut stage = empty_stage(3);
    let id = stage.create_actor();
    for n in 0..500 {
        stage.set_heading(id, rng.gen_range(-2000.0..2000.0));
        let script = if rng.gen_bool(0.5) {
            move_by("m", rng.gen_range(-1e6..1e6))
        } else {
            Block::GoTo.instantiate_with(
                "g",
                vec![
                    param("x", rng.gen_range(-1e4..1e4)),
                    param("y", rng.gen_range(-1e4..1e4)),
                ],
            )
        };
        step(&mut stage, id, &script);
        let position = stage.actor(id).expect("actor exists").position();
        assert!(
            (0.0..=450.0).contains(&position.x) && (0.0..=450.0).contains(&position.y),
            "iteration {n}: {position:?}"
        );
    }
}

#[test]
fn collide_then_separate_restores_both_programs() -> Result<()> {
    let mut stage = empty_stage(5);
    let a = stage.create_actor();
    let b = stage.create_actor();
    stage.set_position(a, 0.0, 0.0);
    stage.set_position(b, 400.0, 400.0);
    stage.submit_script(a, move_by("script-1", 10.0));
    stage.submit_script(a, Block::TurnRight.instantiate("script-2"));

    let before_a = stage.program(a).unwrap_or_default();
    let before_b = stage.program(b).unwrap_or_default();

    stage.set_position(b, 20.0, 0.0);
    assert!(stage.is_colliding(a, b));
    let during_a = stage.program(a).unwrap_or_default();
    assert_eq!(during_a[0].number("steps"), Some(-10.0));
    assert_eq!(during_a[1], before_b[1]);

    stage.set_position(b, 300.0, 0.0);
    assert!(!stage.is_colliding(a, b));
    assert_eq!(stage.program(a).unwrap_or_default(), before_a);
    assert_eq!(stage.program(b).unwrap_or_default(), before_b);
    assert!(stage.actor(a).map(|actor| !actor.is_swapped()).unwrap_or(false));
    Ok(())
}

#[test]
fn swapped_moves_are_negated_partner_moves() {
    let mut stage = empty_stage(6);
    let a = stage.create_actor();
    let b = stage.create_actor();
    stage.set_position(a, 0.0, 0.0);
    stage.set_position(b, 400.0, 400.0);
    stage.submit_script(a, move_by("script-1", 7.5));
    stage.submit_script(a, move_by("script-2", -2.0));

    let partner_steps: Vec<Option<f64>> = stage
        .program(b)
        .unwrap_or_default()
        .iter()
        .map(|script| script.number("steps"))
        .collect();

    stage.set_position(a, 390.0, 390.0);

    let held: Vec<Option<f64>> = stage
        .program(a)
        .unwrap_or_default()
        .iter()
        .map(|script| script.number("steps"))
        .collect();
    let negated: Vec<Option<f64>> = partner_steps.iter().map(|s| s.map(|v| -v)).collect();
    assert_eq!(held, negated);
}

#[test]
fn edits_during_a_swap_survive_the_restore() {
    let mut stage = empty_stage(8);
    let a = stage.create_actor();
    let b = stage.create_actor();
    stage.set_position(a, 0.0, 0.0);
    stage.set_position(b, 400.0, 400.0);
    stage.submit_script(a, move_by("script-1", 10.0));

    stage.set_position(b, 10.0, 10.0);
    stage.submit_script(a, Block::Say.instantiate("script-2"));
    stage.delete_script(&ScriptId::new("script-1"));
    stage.set_position(b, 400.0, 400.0);

    for actor in [a, b] {
        assert_eq!(program_ids(&stage, actor), vec!["script-2"]);
    }
}

#[test]
fn move_from_origin_along_heading_zero() {
    let mut stage = empty_stage(9);
    let id = stage.create_actor();
    stage.set_position(id, 0.0, 0.0);
    stage.set_heading(id, 0.0);
    step(&mut stage, id, &move_by("script-1", 10.0));
    let position = stage.actor(id).expect("actor exists").position();
    assert_eq!((position.x, position.y), (10.0, 0.0));
}

#[test]
fn nudge_uses_the_selected_actor() -> Result<()> {
    let mut stage = empty_stage(10);
    let a = stage.create_actor();
    let b = stage.create_actor();
    stage.set_position(a, 0.0, 0.0);
    stage.set_position(b, 300.0, 300.0);
    stage.set_active_actor(b)?;
    assert!(stage.nudge(&Block::TurnRight.instantiate("script-1")));
    assert_eq!(stage.actor(b).map(|actor| actor.heading()), Some(95.0));
    assert_eq!(stage.actor(a).map(|actor| actor.heading()), Some(90.0));
    Ok(())
}
