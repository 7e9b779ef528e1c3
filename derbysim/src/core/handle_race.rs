use crate::core::camera::{CameraDirector, CameraMode, CameraPose};
use crate::core::context::RaceContext;
use crate::core::race::{Race, RacePhase};
use crate::interfaces::presentation::{PresentationSink, RaceState};
use crate::post::race_result::RaceResult;
use crate::pre::read_sim_pars::SimPars;
use anyhow::bail;
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// (s) Duration of the winning run before the session ends.
pub const WINNING_RUN_DURATION: f64 = 3.0;
/// (s) Simulated time after which a race is considered stuck.
const MAX_SESSION_TIME: f64 = 900.0;

/// handle_race creates and simulates a race on the basis of the inserted parameters, forwards
/// events and snapshots to the presentation sink, and returns the results for post-processing.
/// If a real-time factor is inserted, the frame loop sleeps to keep pace with the wall clock.
pub fn handle_race(
    sim_pars: &SimPars,
    frame_rate: f64,
    camera_mode: Option<CameraMode>,
    sink: &mut dyn PresentationSink,
    realtime_factor: Option<f64>,
) -> anyhow::Result<RaceResult> {
    if !(frame_rate.is_finite() && (10.0..=1000.0).contains(&frame_rate)) {
        bail!("Frame rate must be in the range [10, 1000], got {}!", frame_rate);
    }
    if let Some(realtime_factor) = realtime_factor {
        if !(realtime_factor.is_finite() && realtime_factor > 0.0) {
            bail!("Real-time factor must be > 0, got {}!", realtime_factor);
        }
    }

    let mut ctx = RaceContext::from_sim_pars(sim_pars)?;
    if let Some(camera_mode) = camera_mode {
        ctx = ctx.with_camera_mode(camera_mode);
    }

    let mut race = Race::new(&ctx, &sim_pars.horse_pars_all)?;
    let mut camera = CameraDirector::new(&ctx);

    let frame_delta = 1.0 / frame_rate;
    let max_frames = (MAX_SESSION_TIME * frame_rate).ceil() as u64;

    race.start();
    camera.on_race_start();

    let mut time = 0.0;
    let mut no_frames = 0u64;
    let mut t_last_print = 0.0;

    while !(race.phase() == RacePhase::WinningRun
        && race.winning_run_time >= WINNING_RUN_DURATION)
    {
        if no_frames >= max_frames {
            bail!(
                "Race did not finish within {:.0}s of simulated time (phase {:?})!",
                MAX_SESSION_TIME,
                race.phase()
            );
        }
        let t_start = Instant::now();

        // frame order: timers, time scale, gates, horses, ranks (all inside the race), camera
        race.frame(frame_delta);
        time += frame_delta;
        no_frames += 1;

        for event in race.drain_events() {
            camera.on_event(&event);
            sink.on_event(&event);
        }
        let pose = camera.update(time, &race.camera_input());

        sink.on_frame(time, &|| race_state(&race, pose))?;

        if race.phase() == RacePhase::Running && race.cur_racetime > t_last_print + 0.9999 {
            let leader = &race.horses[race.leader()];
            debug!(
                "Simulating... race time {:.3}s, leader {} at {:.3}, time scale {:.2}",
                race.cur_racetime,
                leader.name,
                leader.progress,
                race.time_scale()
            );
            t_last_print = race.cur_racetime;
        }

        if let Some(realtime_factor) = realtime_factor {
            // sleep until the frame is finished in real-time as well
            let t_frame = Duration::from_secs_f64(frame_delta / realtime_factor);
            match t_frame.checked_sub(t_start.elapsed()) {
                Some(t_sleep) => sleep(t_sleep),
                None => warn!("Could not keep up with real-time!"),
            }
        }
    }

    info!(
        "Session finished after {} frames ({:.2}s)",
        no_frames, time
    );

    let result = race.race_result();
    sink.on_finish(&result)?;
    Ok(result)
}

fn race_state(race: &Race, camera: CameraPose) -> RaceState {
    RaceState {
        horse_states: race.horse_states(),
        phase: race.phase(),
        winner: race.winner(),
        camera,
        time_scale: race.time_scale(),
        final_result: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::presentation::{NullSink, RaceEvent, RecordingSink};

    fn sim_pars(seed: u64) -> SimPars {
        let mut sim_pars = SimPars::default();
        sim_pars.race_pars.seed = Some(seed);
        sim_pars
    }

    #[test]
    fn default_field_finishes() {
        let mut sink = RecordingSink::default();
        let result = handle_race(&sim_pars(1), 60.0, None, &mut sink, None).unwrap();

        assert_eq!(result.finish_order.len(), 6);
        assert_eq!(result.winner, Some(result.finish_order[0]));
        assert!(result.entries.iter().all(|e| e.race_time.is_some()));

        let no_winner_events = sink
            .events
            .iter()
            .filter(|ev| matches!(ev, RaceEvent::WinnerAnnounced { .. }))
            .count();
        assert_eq!(no_winner_events, 1);
        assert!(sink
            .events
            .iter()
            .any(|ev| matches!(ev, RaceEvent::WinningRunStarted { .. })));
    }

    #[test]
    fn seeded_races_are_reproducible() {
        let r1 = handle_race(&sim_pars(5), 60.0, None, &mut NullSink, None).unwrap();
        let r2 = handle_race(&sim_pars(5), 60.0, None, &mut NullSink, None).unwrap();
        assert_eq!(r1, r2);
    }

    #[test]
    fn invalid_frame_rate_is_rejected() {
        assert!(handle_race(&sim_pars(1), 0.0, None, &mut NullSink, None).is_err());
    }
}
