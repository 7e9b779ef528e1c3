//! Camera director: turns the race state into a camera pose every frame.
//!
//! Precedence of the framing rules: winning run orbit, then the pre-race tour of the course, then
//! the selected camera mode.

use crate::core::context::{RaceContext, CAMERA_RNG_STREAM};
use crate::core::track::{wrap_unit, TrackCurve};
use crate::interfaces::presentation::RaceEvent;
use glam::DVec3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// (s) Minimum time between two automatic shot switches.
const AUTO_SWITCH_INTERVAL: f64 = 2.5;
/// Number of mid race shot variants of the automatic broadcast.
const NO_AUTO_SHOTS: u8 = 4;
/// Leader progress bands of the automatic broadcast.
const AUTO_START_BAND: f64 = 0.1;
const AUTO_FINAL_BAND: f64 = 0.85;

const FOLLOW_LERP: f64 = 0.1;
const SMOOTH_LERP: f64 = 0.05;
const TOP_POSITION: DVec3 = DVec3::new(0.0, 120.0, 120.0);

const SHAKE_DECAY: f64 = 0.9;
const SHAKE_FLOOR: f64 = 0.01;

const ORBIT_RADIUS: f64 = 15.0;
const ORBIT_HEIGHT: f64 = 5.0;
/// (rad/s)
const ORBIT_RATE: f64 = 0.5;
/// (1/s) Course fractions per second of the pre-race tour.
const TOUR_RATE: f64 = 0.08;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    Follow,
    Top,
    Side,
    AutoBroadcast,
}

impl Default for CameraMode {
    fn default() -> Self {
        CameraMode::Follow
    }
}

impl CameraMode {
    /// next returns the mode the camera button cycles to.
    pub fn next(&self) -> CameraMode {
        match self {
            CameraMode::Follow => CameraMode::Top,
            CameraMode::Top => CameraMode::Side,
            CameraMode::Side => CameraMode::AutoBroadcast,
            CameraMode::AutoBroadcast => CameraMode::Follow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: DVec3,
    pub look_at: DVec3,
}

/// Race state snapshot the camera works on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraInput {
    pub leader_position: DVec3,
    pub leader_tangent: DVec3,
    pub leader_normal: DVec3,
    /// raw (unwrapped) progress of the leader
    pub leader_progress: f64,
    pub winner_position: Option<DVec3>,
    pub racing: bool,
    pub winning_run: bool,
}

#[derive(Debug)]
pub struct CameraDirector {
    track: Arc<dyn TrackCurve>,
    mode: CameraMode,
    auto_shot: u8,
    last_auto_switch: f64,
    no_auto_switches: u32,
    shake: f64,
    pose: CameraPose,
    rng: ChaCha8Rng,
}

impl CameraDirector {
    pub fn new(ctx: &RaceContext) -> CameraDirector {
        CameraDirector {
            track: Arc::clone(&ctx.track),
            mode: ctx.camera_mode,
            auto_shot: 0,
            last_auto_switch: 0.0,
            no_auto_switches: 0,
            shake: 0.0,
            pose: CameraPose::default(),
            rng: ctx.make_rng(CAMERA_RNG_STREAM),
        }
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: CameraMode) {
        if mode != self.mode {
            info!("Camera mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
        }
    }

    pub fn cycle_mode(&mut self) -> CameraMode {
        self.set_mode(self.mode.next());
        self.mode
    }

    /// on_race_start switches to the automatic broadcast, as every race is shown live.
    pub fn on_race_start(&mut self) {
        self.set_mode(CameraMode::AutoBroadcast);
    }

    /// on_event reacts to presentation events (only shake requests are relevant).
    pub fn on_event(&mut self, event: &RaceEvent) {
        if let RaceEvent::CameraShake { intensity } = event {
            self.shake = *intensity;
        }
    }

    pub fn shake(&self) -> f64 {
        self.shake
    }

    pub fn auto_shot(&self) -> u8 {
        self.auto_shot
    }

    pub fn no_auto_switches(&self) -> u32 {
        self.no_auto_switches
    }

    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    /// update computes the camera pose of the current frame. `time` is the wall clock time of the
    /// session in seconds.
    pub fn update(&mut self, time: f64, input: &CameraInput) -> CameraPose {
        match input.winner_position {
            Some(winner) if input.winning_run => self.orbit_winner(time, winner),
            _ if !input.racing => self.tour(time),
            _ => match self.mode {
                CameraMode::Follow => {
                    let target =
                        input.leader_position - input.leader_tangent * 40.0 + DVec3::Y * 25.0;
                    self.pose.position = self.pose.position.lerp(target, FOLLOW_LERP);
                    self.pose.look_at = input.leader_position + input.leader_tangent * 20.0;
                }
                CameraMode::Top => {
                    self.pose.position = self.pose.position.lerp(TOP_POSITION, SMOOTH_LERP);
                    self.pose.look_at = input.leader_position;
                }
                CameraMode::Side => {
                    self.pose.position =
                        input.leader_position + input.leader_normal * 10.0 + DVec3::Y * 5.0;
                    self.pose.look_at = input.leader_position;
                }
                CameraMode::AutoBroadcast => self.auto_broadcast(time, input),
            },
        }

        self.pose
    }

    fn orbit_winner(&mut self, time: f64, winner: DVec3) {
        let angle = time * ORBIT_RATE;
        let target = DVec3::new(
            winner.x + angle.cos() * ORBIT_RADIUS,
            winner.y + ORBIT_HEIGHT,
            winner.z + angle.sin() * ORBIT_RADIUS,
        );
        self.pose.position = self.pose.position.lerp(target, SMOOTH_LERP);
        self.pose.look_at = winner + DVec3::Y * 2.0;
    }

    /// tour slowly flies along the course, outside of the track and looking inwards.
    fn tour(&mut self, time: f64) {
        let t = wrap_unit(time * TOUR_RATE);
        let point = self.track.point_at(t);
        let normal = self.track.normal_at(t);

        self.pose.position = point - normal * 80.0 + DVec3::Y * 60.0;
        self.pose.look_at = point + DVec3::Y * 5.0;
    }

    fn auto_broadcast(&mut self, time: f64, input: &CameraInput) {
        if time - self.last_auto_switch > AUTO_SWITCH_INTERVAL {
            self.switch_auto_shot(time);
        }

        let lead = input.leader_position;
        let tan = input.leader_tangent;
        let normal = input.leader_normal;
        let p = input.leader_progress;

        let (target, look_at) = if p < AUTO_START_BAND {
            // high rear wide shot
            (lead - tan * 25.0 + DVec3::Y * 15.0, lead + tan * 20.0)
        } else if p > AUTO_FINAL_BAND {
            // front zoom on the final stretch
            (
                lead + tan * 20.0 - normal * 5.0 + DVec3::Y * 4.0,
                lead - DVec3::Y,
            )
        } else {
            match self.auto_shot {
                // side front
                0 => (lead + normal * 12.0 + tan * 8.0 + DVec3::Y * 6.0, lead),
                // low rear tracking
                1 => (lead - tan * 10.0 + DVec3::Y * 2.0, lead + DVec3::Y),
                // bird's eye
                2 => (lead - tan * 5.0 + DVec3::Y * 50.0, lead),
                // long side profile
                _ => (lead + normal * 25.0 + DVec3::Y * 10.0, lead),
            }
        };

        self.pose.position = self.pose.position.lerp(target, SMOOTH_LERP);
        self.pose.look_at = look_at;

        if self.shake > 0.0 {
            let offset = DVec3::new(
                self.rng.gen::<f64>() - 0.5,
                self.rng.gen::<f64>() - 0.5,
                self.rng.gen::<f64>() - 0.5,
            ) * self.shake;
            self.pose.position += offset;

            self.shake *= SHAKE_DECAY;
            if self.shake < SHAKE_FLOOR {
                self.shake = 0.0;
            }
        }
    }

    /// switch_auto_shot picks one of the other shot types uniformly.
    fn switch_auto_shot(&mut self, time: f64) {
        let mut next = self.rng.gen_range(0..NO_AUTO_SHOTS - 1);
        if next >= self.auto_shot {
            next += 1;
        }
        debug!("Auto shot {} -> {}", self.auto_shot, next);

        self.auto_shot = next;
        self.last_auto_switch = time;
        self.no_auto_switches += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::race::RacePars;
    use crate::core::track::{CourseCurve, CoursePreset};
    use crate::core::weather::Weather;
    use approx::assert_abs_diff_eq;

    fn director(mode: CameraMode) -> CameraDirector {
        let course = CourseCurve::from_preset(CoursePreset::ForestOval).unwrap();
        let race_pars = RacePars {
            seed: Some(3),
            ..Default::default()
        };
        let ctx = RaceContext::new("test", Arc::new(course), Weather::default(), race_pars)
            .unwrap()
            .with_camera_mode(mode);
        CameraDirector::new(&ctx)
    }

    fn input(progress: f64) -> CameraInput {
        CameraInput {
            leader_position: DVec3::new(10.0, 0.0, 5.0),
            leader_tangent: DVec3::X,
            leader_normal: DVec3::Z,
            leader_progress: progress,
            winner_position: None,
            racing: true,
            winning_run: false,
        }
    }

    #[test]
    fn modes_cycle() {
        let mut mode = CameraMode::Follow;
        for _ in 0..4 {
            mode = mode.next();
        }
        assert_eq!(mode, CameraMode::Follow);

        let mut cam = director(CameraMode::Side);
        assert_eq!(cam.cycle_mode(), CameraMode::AutoBroadcast);
        cam.on_race_start();
        assert_eq!(cam.mode(), CameraMode::AutoBroadcast);
    }

    #[test]
    fn follow_converges_behind_the_leader() {
        let mut cam = director(CameraMode::Follow);
        let inp = input(0.5);
        let mut pose = CameraPose::default();
        for i in 0..300 {
            pose = cam.update(i as f64 / 60.0, &inp);
        }
        assert_abs_diff_eq!(pose.position.x, -30.0, epsilon = 1e-6);
        assert_abs_diff_eq!(pose.position.y, 25.0, epsilon = 1e-6);
        assert_abs_diff_eq!(pose.position.z, 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(pose.look_at.x, 30.0);
    }

    #[test]
    fn top_view_eases_to_the_fixed_point() {
        let mut cam = director(CameraMode::Top);
        let inp = input(0.5);

        let first = cam.update(0.0, &inp);
        assert_abs_diff_eq!(first.position.y, 6.0, epsilon = 1e-9);
        assert_abs_diff_eq!(first.position.z, 6.0, epsilon = 1e-9);

        let mut pose = first;
        for i in 1..1000 {
            pose = cam.update(i as f64 / 60.0, &inp);
        }
        assert!((pose.position - DVec3::new(0.0, 120.0, 120.0)).length() < 1e-6);
        assert_eq!(pose.look_at, inp.leader_position);
    }

    #[test]
    fn broadcast_bands_override_the_selected_shot() {
        // early race: high rear wide shot
        let mut cam = director(CameraMode::AutoBroadcast);
        let inp = input(0.05);
        let mut pose = CameraPose::default();
        for i in 0..1000 {
            pose = cam.update(i as f64 / 60.0, &inp);
        }
        assert!(cam.no_auto_switches() > 0);
        assert!((pose.position - DVec3::new(-15.0, 15.0, 5.0)).length() < 1e-6);
        assert_eq!(pose.look_at, DVec3::new(30.0, 0.0, 5.0));

        // final stretch: front zoom
        let mut cam = director(CameraMode::AutoBroadcast);
        let inp = input(0.9);
        for i in 0..1000 {
            pose = cam.update(i as f64 / 60.0, &inp);
        }
        assert!((pose.position - DVec3::new(30.0, 4.0, 0.0)).length() < 1e-6);
        assert_eq!(pose.look_at, DVec3::new(10.0, -1.0, 5.0));
    }

    #[test]
    fn first_follow_frame_is_smoothed() {
        let mut cam = director(CameraMode::Follow);
        let pose = cam.update(0.0, &input(0.5));
        // 10 % of the way from the origin towards (-30, 25, 5)
        assert_abs_diff_eq!(pose.position.x, -3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.position.y, 2.5, epsilon = 1e-12);
    }

    #[test]
    fn side_snaps_and_ignores_shake() {
        let mut cam = director(CameraMode::Side);
        cam.on_event(&RaceEvent::CameraShake { intensity: 0.5 });
        let pose = cam.update(1.0, &input(0.5));
        assert_abs_diff_eq!(pose.position.x, 10.0);
        assert_abs_diff_eq!(pose.position.y, 5.0);
        assert_abs_diff_eq!(pose.position.z, 15.0);
        assert_abs_diff_eq!(pose.look_at.x, 10.0);
        assert_abs_diff_eq!(cam.shake(), 0.5);
    }

    #[test]
    fn shake_decays_to_zero_in_38_frames() {
        let mut cam = director(CameraMode::AutoBroadcast);
        cam.on_event(&RaceEvent::CameraShake { intensity: 0.5 });
        let inp = input(0.5);

        for i in 0..37 {
            cam.update(i as f64 / 60.0, &inp);
        }
        assert!(cam.shake() > 0.0);
        cam.update(37.0 / 60.0, &inp);
        assert_abs_diff_eq!(cam.shake(), 0.0);

        for i in 38..100 {
            cam.update(i as f64 / 60.0, &inp);
            assert_abs_diff_eq!(cam.shake(), 0.0);
        }
    }

    #[test]
    fn auto_shots_switch_at_most_every_interval() {
        let mut cam = director(CameraMode::AutoBroadcast);
        let inp = input(0.5);

        // 10s of race at 60 fps with the leader fixed in the middle band
        let mut shots = vec![cam.auto_shot()];
        for i in 0..=600 {
            cam.update(i as f64 / 60.0, &inp);
            if cam.auto_shot() != *shots.last().unwrap() {
                shots.push(cam.auto_shot());
            }
            assert!(cam.auto_shot() < NO_AUTO_SHOTS);
        }
        assert_eq!(shots.len() as u32 - 1, cam.no_auto_switches());
        assert!(cam.no_auto_switches() <= 4);
        assert!(cam.no_auto_switches() >= 3);
    }

    #[test]
    fn auto_switch_never_repeats_the_previous_shot() {
        let mut cam = director(CameraMode::AutoBroadcast);
        let inp = input(0.5);
        let mut last_count = 0;
        let mut last_shot = cam.auto_shot();

        for i in 0..100_000 {
            cam.update(i as f64 * 0.1, &inp);
            if cam.no_auto_switches() != last_count {
                assert_ne!(cam.auto_shot(), last_shot);
                last_shot = cam.auto_shot();
                last_count = cam.no_auto_switches();
            }
        }
        assert!(last_count > 1000);
    }

    #[test]
    fn winning_run_overrides_the_mode() {
        let mut cam = director(CameraMode::Side);
        let winner = DVec3::new(1.0, 0.0, 2.0);
        let inp = CameraInput {
            winner_position: Some(winner),
            winning_run: true,
            racing: false,
            ..input(1.2)
        };

        let mut pose = CameraPose::default();
        for _ in 0..500 {
            pose = cam.update(0.0, &inp);
        }
        assert_abs_diff_eq!(pose.position.x, 16.0, epsilon = 1e-6);
        assert_abs_diff_eq!(pose.position.y, 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(pose.position.z, 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(pose.look_at.y, 2.0);
    }

    #[test]
    fn tour_before_the_race() {
        let mut cam = director(CameraMode::AutoBroadcast);
        let inp = CameraInput {
            racing: false,
            ..input(0.0)
        };
        let pose = cam.update(2.5, &inp);

        let t = 0.2;
        let point = cam.track.point_at(t);
        let normal = cam.track.normal_at(t);
        assert_abs_diff_eq!(pose.look_at.y, point.y + 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.position.y, point.y + 60.0, epsilon = 1e-9);
        let horizontal = (pose.position - point - DVec3::Y * 60.0).length();
        assert_abs_diff_eq!(horizontal, 80.0, epsilon = 1e-6);
        assert!((pose.position - point).dot(normal) < 0.0);
    }
}
