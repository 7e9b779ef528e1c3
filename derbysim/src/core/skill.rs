//! Data-driven horse skills.
//!
//! A skill is a one-shot ability: every tick the horse draws a uniform sample and asks the skill
//! whether it fires at the current progress. If it does, the skill's effect is applied once to
//! the horse's kinematics. Concrete skills are selected from the parameter file via `SkillKind`.

use crate::core::horse::Kinematics;
use serde::{Deserialize, Serialize};
use std::fmt;

pub trait Skill: fmt::Debug + Send + Sync {
    /// check is called once per tick with the raw race progress and a uniform sample in [0, 1).
    fn check(&self, progress: f64, sample: f64) -> bool;

    /// apply mutates speed and/or maximum speed directly when the skill activates.
    fn apply(&self, kin: &mut Kinematics);
}

/// Final stretch burst.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LateCharge {
    pub from: f64,
    pub chance: f64,
    pub boost: f64,
}

impl Skill for LateCharge {
    fn check(&self, progress: f64, sample: f64) -> bool {
        progress > self.from && sample < self.chance
    }

    fn apply(&self, kin: &mut Kinematics) {
        kin.speed = kin.speed.max(kin.max_speed * self.boost);
    }
}

/// Front running burst right after the start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EarlyLead {
    pub until: f64,
    pub chance: f64,
    pub boost: f64,
}

impl Skill for EarlyLead {
    fn check(&self, progress: f64, sample: f64) -> bool {
        progress < self.until && sample < self.chance
    }

    fn apply(&self, kin: &mut Kinematics) {
        kin.speed = kin.speed.max(kin.max_speed * self.boost);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidSurge {
    pub from: f64,
    pub until: f64,
    pub chance: f64,
    pub boost: f64,
}

impl Skill for MidSurge {
    fn check(&self, progress: f64, sample: f64) -> bool {
        progress > self.from && progress < self.until && sample < self.chance
    }

    fn apply(&self, kin: &mut Kinematics) {
        kin.speed = kin.speed.max(kin.max_speed * self.boost);
    }
}

/// Raises the speed ceiling and runs at it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overdrive {
    pub from: f64,
    pub chance: f64,
    pub ceiling: f64,
}

impl Skill for Overdrive {
    fn check(&self, progress: f64, sample: f64) -> bool {
        progress > self.from && sample < self.chance
    }

    fn apply(&self, kin: &mut Kinematics) {
        kin.max_speed *= self.ceiling;
        kin.speed = kin.max_speed;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkillKind {
    Never,
    LateCharge {
        #[serde(default = "default_late_from")]
        from: f64,
        #[serde(default = "default_chance")]
        chance: f64,
        #[serde(default = "default_boost")]
        boost: f64,
    },
    EarlyLead {
        #[serde(default = "default_early_until")]
        until: f64,
        #[serde(default = "default_chance")]
        chance: f64,
        #[serde(default = "default_boost")]
        boost: f64,
    },
    MidSurge {
        #[serde(default = "default_mid_from")]
        from: f64,
        #[serde(default = "default_mid_until")]
        until: f64,
        #[serde(default = "default_chance")]
        chance: f64,
        #[serde(default = "default_boost")]
        boost: f64,
    },
    Overdrive {
        #[serde(default = "default_mid_from")]
        from: f64,
        #[serde(default = "default_chance")]
        chance: f64,
        #[serde(default = "default_ceiling")]
        ceiling: f64,
    },
}

fn default_late_from() -> f64 {
    0.75
}

fn default_early_until() -> f64 {
    0.3
}

fn default_mid_from() -> f64 {
    0.4
}

fn default_mid_until() -> f64 {
    0.7
}

fn default_chance() -> f64 {
    0.01
}

fn default_boost() -> f64 {
    1.0
}

fn default_ceiling() -> f64 {
    1.15
}

/// * `name` - Skill name shown in the cut-in
/// * `description` - Free text description
/// * `kind` - Trigger and effect definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillPars {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub kind: SkillKind,
}

impl SkillPars {
    /// build returns the skill implementation, or None for skills that can never trigger.
    pub fn build(&self) -> Option<Box<dyn Skill>> {
        match self.kind {
            SkillKind::Never => None,
            SkillKind::LateCharge {
                from,
                chance,
                boost,
            } => Some(Box::new(LateCharge {
                from,
                chance,
                boost,
            })),
            SkillKind::EarlyLead {
                until,
                chance,
                boost,
            } => Some(Box::new(EarlyLead {
                until,
                chance,
                boost,
            })),
            SkillKind::MidSurge {
                from,
                until,
                chance,
                boost,
            } => Some(Box::new(MidSurge {
                from,
                until,
                chance,
                boost,
            })),
            SkillKind::Overdrive {
                from,
                chance,
                ceiling,
            } => Some(Box::new(Overdrive {
                from,
                chance,
                ceiling,
            })),
        }
    }
}

impl Default for SkillPars {
    fn default() -> Self {
        SkillPars {
            name: "None".to_owned(),
            description: String::new(),
            kind: SkillKind::Never,
        }
    }
}
