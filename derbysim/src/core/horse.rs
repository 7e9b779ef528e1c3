use crate::core::race::{JitterPars, RacePars};
use crate::core::skill::{Skill, SkillPars};
use crate::core::track::{lane_position, wrap_unit, TrackCurve};
use crate::core::weather::Weather;
use crate::error::{check_positive, check_unit_interval, ConfigError};
use crate::interfaces::presentation::{RaceEvent, RgbColor};
use glam::DVec3;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// (1/s²) Ramp towards the base speed after the start.
const ACCELERATION: f64 = 0.05;
/// (s) Duration of an activated skill.
const SKILL_DURATION: f64 = 3.0;
/// Camera shake intensity requested on skill activation.
pub const SKILL_SHAKE_INTENSITY: f64 = 0.5;
/// Minimum speed before skills can be rolled.
const SKILL_MIN_SPEED: f64 = 0.01;
/// Fixed part and random spread of the base speed draw (course fractions per second).
const BASE_SPEED_MIN: f64 = 0.045;
const BASE_SPEED_SPREAD: f64 = 0.012;
/// Range of the maximum speed relative to the base speed.
const MAX_SPEED_FACTOR_RANGE: (f64, f64) = (1.4, 1.7);

/// * `speed_multiplier` - Product of all passive speed boosts
/// * `spread_multiplier` - Widens the random part of the base speed draw
/// * `head_start` - Course fraction the horse starts ahead of the start line
/// * `ignore_rain` - Rain does not slow the horse down
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default = "default_one")]
    pub speed_multiplier: f64,
    #[serde(default = "default_one")]
    pub spread_multiplier: f64,
    #[serde(default)]
    pub head_start: f64,
    #[serde(default)]
    pub ignore_rain: bool,
}

fn default_one() -> f64 {
    1.0
}

impl Default for Modifiers {
    fn default() -> Self {
        Modifiers {
            speed_multiplier: 1.0,
            spread_multiplier: 1.0,
            head_start: 0.0,
            ignore_rain: false,
        }
    }
}

impl Modifiers {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("speed_multiplier", self.speed_multiplier)?;
        if !(self.spread_multiplier.is_finite() && self.spread_multiplier >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "spread_multiplier",
                value: self.spread_multiplier,
                reason: "must be finite and >= 0",
            });
        }
        check_unit_interval("head_start", self.head_start)?;
        Ok(())
    }
}

/// * `name` - Horse name
/// * `color` - Hex color, e.g. "#ffcc00"
/// * `skill` - Skill definition
/// * `base_speed` - (optional) Fixed base speed instead of the random draw (course fractions per
/// second, before the race, weather and passive multipliers)
/// * `modifiers` - Passive modifiers read at every reset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorsePars {
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub skill: SkillPars,
    #[serde(default)]
    pub base_speed: Option<f64>,
    #[serde(default)]
    pub modifiers: Modifiers,
}

fn default_color() -> String {
    "#8d6e63".to_owned()
}

/// Kinematic state a skill is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kinematics {
    pub speed: f64,
    pub base_speed: f64,
    pub max_speed: f64,
}

/// Race-level inputs of a single horse tick.
pub struct TickCtx<'a> {
    pub rng: &'a mut dyn RngCore,
    pub jitter: &'a JitterPars,
    /// A winner is known, skills can no longer activate.
    pub winner_locked: bool,
    /// Winning run celebration: the winner keeps moving after the finish.
    pub winning_run: bool,
    pub events: &'a mut Vec<RaceEvent>,
}

#[derive(Debug)]
pub struct Horse {
    pub id: usize,
    pub name: String,
    pub color: RgbColor,
    pub skill_name: String,
    pub skill_desc: String,
    skill: Option<Box<dyn Skill>>,
    fixed_base_speed: Option<f64>,
    pub modifiers: Modifiers,
    pub lane_offset: f64,

    pub progress: f64,
    pub kin: Kinematics,

    pub skill_triggered: bool,
    pub skill_active: bool,
    pub skill_timer: f64,

    pub finished: bool,
    finish_rank: Option<u32>,
}

impl Horse {
    pub fn new(id: usize, horse_pars: &HorsePars, lane_width: f64) -> Result<Horse, ConfigError> {
        horse_pars.modifiers.validate()?;
        if let Some(base_speed) = horse_pars.base_speed {
            check_positive("base_speed", base_speed)?;
        }

        let color = horse_pars
            .color
            .parse::<css_color_parser::Color>()
            .map_err(|_| ConfigError::InvalidColor(horse_pars.color.to_owned()))?;

        Ok(Horse {
            id,
            name: horse_pars.name.to_owned(),
            color: RgbColor {
                r: color.r,
                g: color.g,
                b: color.b,
            },
            skill_name: horse_pars.skill.name.to_owned(),
            skill_desc: horse_pars.skill.description.to_owned(),
            skill: horse_pars.skill.build(),
            fixed_base_speed: horse_pars.base_speed,
            modifiers: horse_pars.modifiers.to_owned(),
            lane_offset: (id as f64 - 2.0) * lane_width,
            progress: 0.0,
            kin: Kinematics::default(),
            skill_triggered: false,
            skill_active: false,
            skill_timer: 0.0,
            finished: false,
            finish_rank: None,
        })
    }

    /// with_skill replaces the skill implementation (or removes it with None).
    pub fn with_skill(mut self, skill: Option<Box<dyn Skill>>) -> Horse {
        self.skill = skill;
        self
    }

    /// reset re-initializes kinematics, skill state and outcome before a race. Base and maximum
    /// speed are drawn anew from the race speed, the weather and the passive modifiers.
    pub fn reset(&mut self, race_pars: &RacePars, weather: &Weather, rng: &mut dyn RngCore) {
        self.progress = race_pars.start_line_t + self.modifiers.head_start;
        self.finished = false;
        self.finish_rank = None;

        let weather_mult = if weather.rain && self.modifiers.ignore_rain {
            1.0
        } else {
            weather.speed_multiplier
        };

        let raw_speed = match self.fixed_base_speed {
            Some(base_speed) => base_speed,
            None => {
                BASE_SPEED_MIN
                    + rng.gen::<f64>() * BASE_SPEED_SPREAD * self.modifiers.spread_multiplier
            }
        };

        self.kin.base_speed = raw_speed
            * race_pars.race_speed_mult
            * weather_mult
            * self.modifiers.speed_multiplier;
        self.kin.max_speed =
            self.kin.base_speed * rng.gen_range(MAX_SPEED_FACTOR_RANGE.0..MAX_SPEED_FACTOR_RANGE.1);
        self.kin.speed = 0.0;

        self.skill_triggered = false;
        self.skill_active = false;
        self.skill_timer = 0.0;
    }

    /// update advances the horse by one simulation frame. Returns true if the horse crossed the
    /// finish line in this frame.
    pub fn update(&mut self, delta: f64, ctx: &mut TickCtx) -> bool {
        if self.finished && !ctx.winning_run {
            return false;
        }

        // start-up acceleration
        if self.kin.speed < self.kin.base_speed {
            self.kin.speed += delta * ACCELERATION;
        }

        if !self.skill_triggered && self.kin.speed > SKILL_MIN_SPEED {
            let sample = ctx.rng.gen::<f64>();
            let fires = self
                .skill
                .as_ref()
                .map_or(false, |skill| skill.check(self.progress, sample));

            if fires {
                self.activate_skill(ctx.winner_locked, ctx.events);
            }
        }

        if self.skill_active {
            self.skill_timer -= delta;

            if self.skill_timer <= 0.0 {
                self.skill_active = false;
                ctx.events.push(RaceEvent::SkillEnded { horse_id: self.id });
            }
        } else if ctx.rng.gen::<f64>() < ctx.jitter.chance {
            // jockeying
            self.kin.speed += (ctx.rng.gen::<f64>() - 0.5) * ctx.jitter.amplitude;
            self.kin.speed = self.kin.speed.clamp(0.0, self.kin.max_speed);
        }

        self.progress += self.kin.speed * delta;

        if self.progress >= 1.0 && !self.finished {
            self.finished = true;
            return true;
        }

        false
    }

    /// activate_skill fires the skill at most once per race and never after a winner is known.
    /// Returns true if the skill was activated by this call.
    pub fn activate_skill(&mut self, winner_locked: bool, events: &mut Vec<RaceEvent>) -> bool {
        if self.skill_triggered || winner_locked {
            return false;
        }

        self.skill_triggered = true;
        self.skill_active = true;
        self.skill_timer = SKILL_DURATION;

        info!(
            "{} activates {} at progress {:.3}",
            self.name, self.skill_name, self.progress
        );

        events.push(RaceEvent::SkillActivated {
            horse_id: self.id,
            horse_name: self.name.to_owned(),
            skill_name: self.skill_name.to_owned(),
        });
        events.push(RaceEvent::CameraShake {
            intensity: SKILL_SHAKE_INTENSITY,
        });
        events.push(RaceEvent::ParticleBurst {
            horse_id: self.id,
            progress: self.progress,
        });

        if let Some(skill) = &self.skill {
            skill.apply(&mut self.kin);
        }

        true
    }

    /// assign_rank stores the finish rank. Ranks are handed out exactly once, assigning a second
    /// one is a programming error.
    pub fn assign_rank(&mut self, rank: u32) {
        assert!(
            self.finished,
            "Tried to assign rank {} to horse {} that has not finished!",
            rank, self.id
        );
        assert!(
            self.finish_rank.is_none(),
            "Tried to assign rank {} to horse {} that already has rank {:?}!",
            rank,
            self.id,
            self.finish_rank
        );
        debug!("{} finishes as #{}", self.name, rank);
        self.finish_rank = Some(rank);
    }

    pub fn finish_rank(&self) -> Option<u32> {
        self.finish_rank
    }

    pub fn has_skill(&self) -> bool {
        self.skill.is_some()
    }

    /// position on the course in [0.0, 1.0)
    pub fn track_position(&self) -> f64 {
        wrap_unit(self.progress)
    }

    pub fn world_position(&self, track: &dyn TrackCurve) -> DVec3 {
        lane_position(track, self.track_position(), self.lane_offset)
    }
}
