use approx::assert_abs_diff_eq;
use derbysim::core::camera::{CameraDirector, CameraMode};
use derbysim::core::context::RaceContext;
use derbysim::core::race::{Race, RacePars, RacePhase};
use derbysim::core::track::{CourseCurve, CoursePreset};
use derbysim::core::weather::Weather;
use derbysim::pre::read_sim_pars::default_field;
use glam::DVec3;
use std::sync::Arc;

const DT: f64 = 1.0 / 60.0;

fn setup(mode: CameraMode) -> (Race, CameraDirector) {
    let course = CourseCurve::from_preset(CoursePreset::DragonsLongRun).unwrap();
    let race_pars = RacePars {
        seed: Some(77),
        ..Default::default()
    };
    let ctx = RaceContext::new("Dragon's Long Run", Arc::new(course), Weather::default(), race_pars)
        .unwrap()
        .with_camera_mode(mode);
    let race = Race::new(&ctx, &default_field()).unwrap();
    let camera = CameraDirector::new(&ctx);
    (race, camera)
}

#[test]
fn camera_follows_the_race_through_all_phases() {
    let (mut race, mut camera) = setup(CameraMode::Top);
    let mut time = 0.0;

    // idle: tour of the course, looking 5 m above the course
    let pose = camera.update(time, &race.camera_input());
    assert_abs_diff_eq!(pose.look_at.y, 5.0, epsilon = 1e-9);
    assert_abs_diff_eq!(pose.position.y, 60.0, epsilon = 1e-9);

    race.start();
    camera.on_race_start();
    assert_eq!(camera.mode(), CameraMode::AutoBroadcast);

    let mut saw_shake = false;
    let mut no_frames = 0;
    while !(race.phase() == RacePhase::WinningRun && race.winning_run_time > 20.0) {
        race.frame(DT);
        time += DT;
        for event in race.drain_events() {
            camera.on_event(&event);
        }
        saw_shake |= camera.shake() > 0.0;

        let input = race.camera_input();
        let pose = camera.update(time, &input);
        assert!(pose.position.is_finite());

        if race.racing() {
            // automatic broadcast always looks at (or just above/below, ahead of) the leader
            assert!((pose.look_at - input.leader_position).length() <= 20.0 + 1e-9);
        }

        no_frames += 1;
        assert!(no_frames < 500_000);
    }

    // winning run: looking at the winner and circling at radius 15 after convergence
    let input = race.camera_input();
    let winner = input.winner_position.unwrap();
    let pose = camera.pose();
    assert!((pose.look_at - (winner + DVec3::Y * 2.0)).length() < 1e-9);
    let horizontal = DVec3::new(pose.position.x - winner.x, 0.0, pose.position.z - winner.z);
    // smoothing lags behind the moving orbit point
    assert!(horizontal.length() > 10.0 && horizontal.length() < 20.0);

    // every activated skill requests a shake
    if race.horses.iter().any(|h| h.skill_triggered) {
        assert!(saw_shake);
    }
}

#[test]
fn mode_change_during_the_race() {
    let (mut race, mut camera) = setup(CameraMode::Follow);
    race.start();
    camera.on_race_start();
    camera.set_mode(CameraMode::Side);

    let mut time = 0.0;
    while race.phase() != RacePhase::Running {
        race.frame(DT);
        time += DT;
    }
    for _ in 0..120 {
        race.frame(DT);
        time += DT;
    }

    let input = race.camera_input();
    let pose = camera.update(time, &input);
    let expected = input.leader_position + input.leader_normal * 10.0 + DVec3::Y * 5.0;
    assert!((pose.position - expected).length() < 1e-9);
    assert!((pose.look_at - input.leader_position).length() < 1e-9);
}
