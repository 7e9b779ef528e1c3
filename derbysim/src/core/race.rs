use crate::core::camera::CameraInput;
use crate::core::context::{RaceContext, RACE_RNG_STREAM};
use crate::core::gate::Gate;
use crate::core::horse::{Horse, HorsePars, TickCtx};
use crate::core::scheduler::Scheduler;
use crate::core::track::{wrap_unit, TrackCurve};
use crate::core::weather::Weather;
use crate::error::{check_positive, check_unit_interval, ConfigError};
use crate::interfaces::presentation::{HorseState, RaceEvent};
use crate::post::race_result::{RaceResult, ResultEntry};
use helpers::general::{approach, argmax, argsort, SortOrder};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Speed the winner is pinned to during the winning run (idle trot).
const WINNING_RUN_SPEED: f64 = 0.01;

/// * `chance` - Per tick chance of a jockeying speed perturbation
/// * `amplitude` - Peak-to-peak amplitude of the perturbation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterPars {
    pub chance: f64,
    pub amplitude: f64,
}

impl Default for JitterPars {
    fn default() -> Self {
        JitterPars {
            chance: 0.05,
            amplitude: 0.001,
        }
    }
}

/// * `race_speed_mult` - Multiplier on the base speed of every horse
/// * `start_line_t` - Course fraction of the start line
/// * `lane_width` - (m) Lateral distance between two lanes
/// * `fanfare_delay` - (s) Delay between race start and the first countdown tick
/// * `countdown_from` - First number of the countdown
/// * `countdown_interval` - (s) Time between two countdown ticks
/// * `gate_release_delay` - (s) Delay between opening the gates and running
/// * `rolling_start_frac` - Fraction of the base speed every horse has at the release
/// * `max_frame_delta` - (s) Upper clamp of the raw frame delta
/// * `photo_finish_from` - Leader course fraction from which the photo finish slow motion starts
/// * `photo_finish_time_scale` - Target time scale during the photo finish
/// * `time_scale_smoothing` - Per frame smoothing factor of the time scale
/// * `jitter` - Jockeying parameters
/// * `seed` - (optional) Seed of the race random number generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RacePars {
    pub race_speed_mult: f64,
    pub start_line_t: f64,
    pub lane_width: f64,
    pub fanfare_delay: f64,
    pub countdown_from: u32,
    pub countdown_interval: f64,
    pub gate_release_delay: f64,
    pub rolling_start_frac: f64,
    pub max_frame_delta: f64,
    pub photo_finish_from: f64,
    pub photo_finish_time_scale: f64,
    pub time_scale_smoothing: f64,
    pub jitter: JitterPars,
    pub seed: Option<u64>,
}

impl Default for RacePars {
    fn default() -> Self {
        RacePars {
            race_speed_mult: 1.0,
            start_line_t: 0.0,
            lane_width: 2.0,
            fanfare_delay: 2.5,
            countdown_from: 3,
            countdown_interval: 1.0,
            gate_release_delay: 0.2,
            rolling_start_frac: 0.3,
            max_frame_delta: 0.1,
            photo_finish_from: 0.96,
            photo_finish_time_scale: 0.2,
            time_scale_smoothing: 0.1,
            jitter: JitterPars::default(),
            seed: None,
        }
    }
}

impl RacePars {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("race_speed_mult", self.race_speed_mult)?;
        check_unit_interval("start_line_t", self.start_line_t)?;
        check_positive("max_frame_delta", self.max_frame_delta)?;
        check_unit_interval("photo_finish_from", self.photo_finish_from)?;

        for (name, value) in [
            ("lane_width", self.lane_width),
            ("fanfare_delay", self.fanfare_delay),
            ("countdown_interval", self.countdown_interval),
            ("gate_release_delay", self.gate_release_delay),
            ("jitter.amplitude", self.jitter.amplitude),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::invalid(name, value, "must be finite and >= 0"));
            }
        }

        for (name, value) in [
            ("rolling_start_frac", self.rolling_start_frac),
            ("jitter.chance", self.jitter.chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::invalid(name, value, "must be in [0.0, 1.0]"));
            }
        }

        for (name, value) in [
            ("photo_finish_time_scale", self.photo_finish_time_scale),
            ("time_scale_smoothing", self.time_scale_smoothing),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::invalid(name, value, "must be in (0.0, 1.0]"));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RacePhase {
    Idle,
    Countdown,
    Running,
    Finished,
    WinningRun,
}

impl Default for RacePhase {
    fn default() -> Self {
        RacePhase::Idle
    }
}

/// Deferred steps of the start sequence and the post race celebration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceTask {
    CountdownTick(u32),
    OpenGates,
    Release,
    BeginWinningRun,
}

#[derive(Debug)]
pub struct Race {
    pub course_name: String,
    track: Arc<dyn TrackCurve>,
    pub weather: Weather,
    pub race_pars: RacePars,
    pub horses: Vec<Horse>,
    pub gates: Vec<Gate>,
    phase: RacePhase,
    winner: Option<usize>,
    time_scale: f64,
    /// (s) race clock, starts with the release and runs on the scaled delta
    pub cur_racetime: f64,
    /// (s) time spent in the winning run
    pub winning_run_time: f64,
    finish_times: Vec<Option<f64>>,
    no_finished: u32,
    timers: Scheduler<RaceTask>,
    rng: ChaCha8Rng,
    events: Vec<RaceEvent>,
}

impl Race {
    pub fn new(ctx: &RaceContext, horse_pars_all: &[HorsePars]) -> Result<Race, ConfigError> {
        let horses = horse_pars_all
            .iter()
            .enumerate()
            .map(|(id, horse_pars)| Horse::new(id, horse_pars, ctx.race_pars.lane_width))
            .collect::<Result<Vec<Horse>, ConfigError>>()?;

        Race::with_horses(ctx, horses)
    }

    /// with_horses creates a race from already constructed horses. Horse ids must equal their
    /// lane index.
    pub fn with_horses(ctx: &RaceContext, horses: Vec<Horse>) -> Result<Race, ConfigError> {
        if horses.is_empty() {
            return Err(ConfigError::EmptyField);
        }
        ctx.race_pars.validate()?;

        for (idx, horse) in horses.iter().enumerate() {
            if horse.id != idx {
                return Err(ConfigError::invalid(
                    "horse.id",
                    horse.id as f64,
                    "must equal the lane index",
                ));
            }
        }

        let no_horses = horses.len();

        Ok(Race {
            course_name: ctx.course_name.to_owned(),
            track: Arc::clone(&ctx.track),
            weather: ctx.weather.to_owned(),
            race_pars: ctx.race_pars.to_owned(),
            horses,
            gates: (0..no_horses).map(Gate::new).collect(),
            phase: RacePhase::Idle,
            winner: None,
            time_scale: 1.0,
            cur_racetime: 0.0,
            winning_run_time: 0.0,
            finish_times: vec![None; no_horses],
            no_finished: 0,
            timers: Scheduler::new(),
            rng: ctx.make_rng(RACE_RNG_STREAM),
            events: Vec::new(),
        })
    }

    // ---------------------------------------------------------------------------------------------
    // PHASE CONTROL -------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// start resets the field and schedules the start sequence. Pending timers of a previous
    /// (possibly aborted) start are cancelled first.
    pub fn start(&mut self) {
        let no_stale = self.timers.cancel_all();
        if no_stale > 0 {
            warn!("Cancelled {} stale race timers on restart", no_stale);
        }

        for horse in self.horses.iter_mut() {
            horse.reset(&self.race_pars, &self.weather, &mut self.rng);
        }
        for gate in self.gates.iter_mut() {
            gate.reset();
        }

        self.winner = None;
        self.time_scale = 1.0;
        self.cur_racetime = 0.0;
        self.winning_run_time = 0.0;
        self.finish_times = vec![None; self.horses.len()];
        self.no_finished = 0;
        self.events.clear();
        self.phase = RacePhase::Countdown;

        let pars = &self.race_pars;
        for i in 0..pars.countdown_from {
            self.timers.schedule(
                pars.fanfare_delay + i as f64 * pars.countdown_interval,
                RaceTask::CountdownTick(pars.countdown_from - i),
            );
        }
        let t_go = pars.fanfare_delay + pars.countdown_from as f64 * pars.countdown_interval;
        self.timers.schedule(t_go, RaceTask::OpenGates);
        self.timers
            .schedule(t_go + pars.gate_release_delay, RaceTask::Release);

        info!(
            "Race on {} started ({}, {} horses)",
            self.course_name,
            self.weather.name,
            self.horses.len()
        );
    }

    /// return_to_idle aborts whatever is going on and drops all pending timers.
    pub fn return_to_idle(&mut self) {
        let no_cancelled = self.timers.cancel_all();
        if no_cancelled > 0 {
            debug!("Cancelled {} race timers on return to idle", no_cancelled);
        }
        self.phase = RacePhase::Idle;
        self.time_scale = 1.0;
    }

    fn run_task(&mut self, task: RaceTask) {
        match task {
            RaceTask::CountdownTick(count) => {
                if self.phase != RacePhase::Countdown {
                    return;
                }
                info!("Countdown {}", count);
                self.events.push(RaceEvent::CountdownTick { count });
            }
            RaceTask::OpenGates => {
                if self.phase != RacePhase::Countdown {
                    return;
                }
                info!("GO! Gates open");
                for gate in self.gates.iter_mut() {
                    gate.open();
                }
                self.events.push(RaceEvent::GatesOpened);
            }
            RaceTask::Release => {
                if self.phase != RacePhase::Countdown {
                    return;
                }
                for horse in self.horses.iter_mut() {
                    horse.kin.speed = self.race_pars.rolling_start_frac * horse.kin.base_speed;
                }
                self.phase = RacePhase::Running;
                info!("Race running");
                self.events.push(RaceEvent::RaceStarted);
            }
            RaceTask::BeginWinningRun => {
                if self.phase != RacePhase::Finished {
                    return;
                }
                if let Some(winner) = self.winner {
                    self.phase = RacePhase::WinningRun;
                    info!("Winning run of {}", self.horses[winner].name);
                    self.events
                        .push(RaceEvent::WinningRunStarted { horse_id: winner });
                }
            }
        }
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHOD ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// frame advances the race by one frame. The raw frame delta is clamped, timers run on the
    /// clamped raw delta, everything else on the clamped delta multiplied by the time scale.
    /// Returns the scaled delta (to be used by the camera and presentation updates).
    pub fn frame(&mut self, raw_delta: f64) -> f64 {
        let raw_delta = if raw_delta.is_finite() {
            raw_delta.clamp(0.0, self.race_pars.max_frame_delta)
        } else {
            0.0
        };

        for task in self.timers.advance(raw_delta) {
            self.run_task(task);
        }

        let target = self.time_scale_target();
        self.time_scale = approach(
            self.time_scale,
            target,
            self.race_pars.time_scale_smoothing,
        );
        let delta = raw_delta * self.time_scale;

        for gate in self.gates.iter_mut() {
            gate.update(delta);
        }

        match self.phase {
            RacePhase::Running => self.step_running(delta),
            RacePhase::WinningRun => self.step_winning_run(delta),
            _ => {}
        }

        delta
    }

    fn step_running(&mut self, delta: f64) {
        self.cur_racetime += delta;

        // phase 1: integrate every horse that is still racing, in lane order
        let mut newly_finished = vec![];
        {
            let mut ctx = TickCtx {
                rng: &mut self.rng,
                jitter: &self.race_pars.jitter,
                winner_locked: self.winner.is_some(),
                winning_run: false,
                events: &mut self.events,
            };

            for (idx, horse) in self.horses.iter_mut().enumerate() {
                if horse.finished {
                    continue;
                }
                if horse.update(delta, &mut ctx) {
                    newly_finished.push(idx);
                    // later lanes must not trigger skills once someone crossed the line
                    ctx.winner_locked = true;
                }
            }
        }

        // phase 2: hand out ranks in lane order on the state after this tick
        for idx in newly_finished {
            self.no_finished += 1;
            let rank = self.no_finished;
            let race_time = self.interpolate_finish_time(idx, delta);

            self.horses[idx].assign_rank(rank);
            self.finish_times[idx] = Some(race_time);
            self.events.push(RaceEvent::HorseFinished {
                horse_id: idx,
                rank,
                race_time,
            });

            if self.winner.is_none() {
                self.winner = Some(idx);
                info!(
                    "Winner: {} in {:.3}s",
                    self.horses[idx].name, race_time
                );
                self.events.push(RaceEvent::WinnerAnnounced {
                    horse_id: idx,
                    horse_name: self.horses[idx].name.to_owned(),
                });
            }
        }

        if self.no_finished as usize == self.horses.len() {
            self.phase = RacePhase::Finished;
            let finish_order = self.finish_order();
            info!("Race concluded, finish order {:?}", finish_order);
            self.events.push(RaceEvent::RaceConcluded { finish_order });
            self.timers.schedule(0.0, RaceTask::BeginWinningRun);
        }
    }

    fn step_winning_run(&mut self, delta: f64) {
        let winner = match self.winner {
            Some(winner) => winner,
            None => return,
        };
        self.winning_run_time += delta;

        let mut ctx = TickCtx {
            rng: &mut self.rng,
            jitter: &self.race_pars.jitter,
            winner_locked: true,
            winning_run: true,
            events: &mut self.events,
        };
        let horse = &mut self.horses[winner];
        horse.kin.speed = WINNING_RUN_SPEED;
        horse.update(delta, &mut ctx);
    }

    /// interpolate_finish_time estimates when within the last tick the horse crossed the line.
    fn interpolate_finish_time(&self, idx: usize, delta: f64) -> f64 {
        let horse = &self.horses[idx];
        let overshoot = if horse.kin.speed > 0.0 {
            ((horse.progress - 1.0) / horse.kin.speed).clamp(0.0, delta)
        } else {
            0.0
        };
        self.cur_racetime - overshoot
    }

    fn time_scale_target(&self) -> f64 {
        if self.phase == RacePhase::Running && self.winner.is_none() {
            let t_leader = wrap_unit(self.horses[self.leader()].progress);
            if t_leader > self.race_pars.photo_finish_from && t_leader < 1.0 {
                return self.race_pars.photo_finish_time_scale;
            }
        }
        1.0
    }

    // ---------------------------------------------------------------------------------------------
    // METHODS (HELPERS) ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// racing is true from the start of the countdown until every horse has finished.
    pub fn racing(&self) -> bool {
        matches!(self.phase, RacePhase::Countdown | RacePhase::Running)
    }

    pub fn all_finished(&self) -> bool {
        self.no_finished as usize == self.horses.len()
    }

    pub fn track(&self) -> &dyn TrackCurve {
        self.track.as_ref()
    }

    pub fn drain_events(&mut self) -> Vec<RaceEvent> {
        std::mem::take(&mut self.events)
    }

    /// leader returns the index of the horse with the largest progress (lane order on ties).
    pub fn leader(&self) -> usize {
        let progresses: Vec<f64> = self.horses.iter().map(|horse| horse.progress).collect();
        argmax(&progresses)
    }

    /// standings returns finished horses by rank followed by the unfinished ones by progress.
    pub fn standings(&self) -> Vec<usize> {
        let mut standings = self.finish_order();

        let progresses: Vec<f64> = self.horses.iter().map(|horse| horse.progress).collect();
        standings.extend(
            argsort(&progresses, SortOrder::Descending)
                .into_iter()
                .filter(|&idx| self.horses[idx].finish_rank().is_none()),
        );

        standings
    }

    /// finish_order returns the indices of all ranked horses sorted by rank.
    pub fn finish_order(&self) -> Vec<usize> {
        let mut ranked: Vec<(u32, usize)> = self
            .horses
            .iter()
            .enumerate()
            .filter_map(|(idx, horse)| horse.finish_rank().map(|rank| (rank, idx)))
            .collect();
        ranked.sort_unstable();
        ranked.into_iter().map(|(_, idx)| idx).collect()
    }

    pub fn finish_time(&self, idx: usize) -> Option<f64> {
        self.finish_times[idx]
    }

    pub fn horse_states(&self) -> Vec<HorseState> {
        self.horses
            .iter()
            .map(|horse| {
                let position = horse.world_position(self.track());
                HorseState {
                    id: horse.id,
                    name: horse.name.to_owned(),
                    color: horse.color,
                    position: position.to_array(),
                    track_position: horse.track_position(),
                    speed: horse.kin.speed,
                    skill_active: horse.skill_active,
                    finished: horse.finished,
                    rank: horse.finish_rank(),
                }
            })
            .collect()
    }

    /// camera_input collects the minimal race state the camera director works on.
    pub fn camera_input(&self) -> CameraInput {
        let leader = &self.horses[self.leader()];
        let t_leader = leader.track_position();

        CameraInput {
            leader_position: leader.world_position(self.track()),
            leader_tangent: self.track.tangent_at(t_leader),
            leader_normal: self.track.normal_at(t_leader),
            leader_progress: leader.progress,
            winner_position: self
                .winner
                .map(|idx| self.horses[idx].world_position(self.track())),
            racing: self.racing(),
            winning_run: matches!(self.phase, RacePhase::Finished | RacePhase::WinningRun),
        }
    }

    pub fn race_result(&self) -> RaceResult {
        RaceResult {
            course_name: self.course_name.to_owned(),
            weather_name: self.weather.name.to_owned(),
            track_condition: self.weather.track_condition.to_owned(),
            entries: self
                .horses
                .iter()
                .map(|horse| ResultEntry {
                    horse_id: horse.id,
                    name: horse.name.to_owned(),
                    skill_name: horse.skill_name.to_owned(),
                    skill_activated: horse.skill_triggered,
                    finish_rank: horse.finish_rank(),
                    race_time: self.finish_times[horse.id],
                })
                .collect(),
            winner: self.winner,
            finish_order: self.finish_order(),
        }
    }
}
