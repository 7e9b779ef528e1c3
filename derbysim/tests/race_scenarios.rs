use derbysim::core::context::RaceContext;
use derbysim::core::horse::{Horse, HorsePars, Kinematics, Modifiers};
use derbysim::core::race::{JitterPars, Race, RacePars, RacePhase};
use derbysim::core::skill::{Skill, SkillPars};
use derbysim::core::track::{CourseCurve, CoursePreset, TrackCurve};
use derbysim::core::weather::WeatherPreset;
use derbysim::interfaces::presentation::RaceEvent;
use std::sync::Arc;

const DT: f64 = 1.0 / 60.0;

#[derive(Debug)]
struct AlwaysBurst;

impl Skill for AlwaysBurst {
    fn check(&self, _progress: f64, _sample: f64) -> bool {
        true
    }

    fn apply(&self, kin: &mut Kinematics) {
        kin.speed = kin.max_speed;
    }
}

fn context(preset: CoursePreset) -> RaceContext {
    let course = CourseCurve::from_preset(preset).unwrap();
    let race_pars = RacePars {
        jitter: JitterPars {
            chance: 0.0,
            amplitude: 0.0,
        },
        seed: Some(2024),
        ..Default::default()
    };
    RaceContext::new(
        preset.name(),
        Arc::new(course),
        WeatherPreset::Cloudy.weather(),
        race_pars,
    )
    .unwrap()
}

fn horse_pars(i: usize, base_speed: f64) -> HorsePars {
    HorsePars {
        name: format!("Runner {}", i),
        color: "#aa8800".to_owned(),
        skill: SkillPars::default(),
        base_speed: Some(base_speed),
        modifiers: Modifiers::default(),
    }
}

fn release(race: &mut Race) {
    race.start();
    for _ in 0..10_000 {
        race.frame(DT);
        if race.phase() == RacePhase::Running {
            return;
        }
    }
    panic!("Race was never released");
}

#[test]
fn six_fixed_speed_horses_on_every_course() {
    let base_speeds = [0.051, 0.046, 0.060, 0.055, 0.048, 0.058];

    for preset in CoursePreset::ALL {
        let ctx = context(preset);
        let hp: Vec<HorsePars> = base_speeds
            .iter()
            .enumerate()
            .map(|(i, &bs)| horse_pars(i, bs))
            .collect();
        let mut race = Race::new(&ctx, &hp).unwrap();
        release(&mut race);

        let mut no_frames = 0;
        while race.phase() != RacePhase::WinningRun {
            race.frame(DT);
            no_frames += 1;
            assert!(no_frames < 200_000, "{} never finished", preset.name());
        }

        assert_eq!(race.finish_order(), vec![2, 5, 3, 0, 4, 1], "{}", preset.name());
        assert_eq!(race.winner(), Some(2));

        let result = race.race_result();
        assert_eq!(result.course_name, preset.name());
        assert_eq!(result.weather_name, "Cloudy");
        assert_eq!(result.winner_name(), Some("Runner 2"));
    }
}

#[test]
fn always_triggering_skill_runs_for_three_seconds() {
    let ctx = context(CoursePreset::CrescentMile);
    let horses = vec![
        Horse::new(0, &horse_pars(0, 0.05), ctx.race_pars.lane_width)
            .unwrap()
            .with_skill(Some(Box::new(AlwaysBurst))),
        Horse::new(1, &horse_pars(1, 0.05), ctx.race_pars.lane_width).unwrap(),
    ];
    let mut race = Race::with_horses(&ctx, horses).unwrap();
    release(&mut race);

    // rolling start is above the skill threshold, so the skill fired in the release frame
    let horse = &race.horses[0];
    assert!(horse.skill_triggered);
    assert!(horse.skill_active);
    assert!(horse.skill_timer > 3.0 - 2.0 * DT && horse.skill_timer < 3.0);
    assert!(!race.horses[1].skill_triggered);

    let events = race.drain_events();
    assert!(events.contains(&RaceEvent::CameraShake { intensity: 0.5 }));
    assert!(events
        .iter()
        .any(|ev| matches!(ev, RaceEvent::ParticleBurst { horse_id: 0, .. })));

    // 3s of ticks (plus margin for float accumulation)
    for _ in 0..182 {
        race.frame(DT);
    }
    assert!(!race.horses[0].skill_active);
    assert!(race.horses[0].skill_triggered);
    assert!(race
        .drain_events()
        .contains(&RaceEvent::SkillEnded { horse_id: 0 }));
}

#[test]
fn horses_follow_their_lanes() {
    let ctx = context(CoursePreset::ClassicCircuit);
    let hp: Vec<HorsePars> = (0..5).map(|i| horse_pars(i, 0.05)).collect();
    let mut race = Race::new(&ctx, &hp).unwrap();
    release(&mut race);
    for _ in 0..300 {
        race.frame(DT);
    }

    let states = race.horse_states();
    let t = states[2].track_position;
    let center = race.track().point_at(t) - race.track().tangent_at(t) * 1.5;
    // lane 2 runs on the center line, the others are spread by the lane width
    for (state, expected) in states.iter().zip([4.0, 2.0, 0.0, 2.0, 4.0]) {
        let pos = glam::DVec3::from_array(state.position);
        assert!(((pos - center).length() - expected).abs() < 1e-6);
    }
}

#[test]
fn restart_after_a_finished_race() {
    let ctx = context(CoursePreset::ForestOval);
    let hp: Vec<HorsePars> = (0..3).map(|i| horse_pars(i, 0.05 + 0.004 * i as f64)).collect();
    let mut race = Race::new(&ctx, &hp).unwrap();

    for _ in 0..2 {
        release(&mut race);
        while race.phase() != RacePhase::WinningRun {
            race.frame(DT);
        }
        assert_eq!(race.finish_order(), vec![2, 1, 0]);
    }

    race.start();
    assert_eq!(race.winner(), None);
    assert!(race.horses.iter().all(|h| h.finish_rank().is_none()));
    assert!(race.horses.iter().all(|h| !h.finished));
}
