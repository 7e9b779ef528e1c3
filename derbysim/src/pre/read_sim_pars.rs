use crate::core::horse::{HorsePars, Modifiers};
use crate::core::race::RacePars;
use crate::core::skill::{SkillKind, SkillPars};
use crate::core::track::CoursePars;
use crate::core::weather::WeatherPars;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::Path;

/// SimPars is used to store all other parameter structs.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SimPars {
    #[serde(default)]
    pub race_pars: RacePars,
    #[serde(default)]
    pub course_pars: CoursePars,
    #[serde(default)]
    pub weather: WeatherPars,
    #[serde(default = "default_field")]
    pub horse_pars_all: Vec<HorsePars>,
}

impl Default for SimPars {
    fn default() -> Self {
        SimPars {
            race_pars: RacePars::default(),
            course_pars: CoursePars::default(),
            weather: WeatherPars::default(),
            horse_pars_all: default_field(),
        }
    }
}

/// read_sim_pars reads the JSON file and decodes the JSON string into the simulation parameters
/// struct.
pub fn read_sim_pars(filepath: &Path) -> anyhow::Result<SimPars> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open parameter file {}!",
            filepath.display()
        ))?;
    let pars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse parameter file {}!",
        filepath.display()
    ))?;
    Ok(pars)
}

fn skill(name: &str, description: &str, kind: SkillKind) -> SkillPars {
    SkillPars {
        name: name.to_owned(),
        description: description.to_owned(),
        kind,
    }
}

/// default_field returns the standard six horse field that is used if no parameter file is given.
pub fn default_field() -> Vec<HorsePars> {
    let horse = |name: &str, color: &str, skill: SkillPars| HorsePars {
        name: name.to_owned(),
        color: color.to_owned(),
        skill,
        base_speed: None,
        modifiers: Modifiers::default(),
    };

    let mut field = vec![
        horse(
            "Thunder Bolt",
            "#e53935",
            skill(
                "Final Spurt",
                "Bursts to top speed on the final stretch",
                SkillKind::LateCharge {
                    from: 0.75,
                    chance: 0.01,
                    boost: 1.0,
                },
            ),
        ),
        horse(
            "Silver Wind",
            "#b0bec5",
            skill(
                "Breakaway",
                "Takes the lead right after the gates open",
                SkillKind::EarlyLead {
                    until: 0.3,
                    chance: 0.01,
                    boost: 1.0,
                },
            ),
        ),
        horse(
            "Golden Arrow",
            "#fdd835",
            skill(
                "Second Wind",
                "Surges in the middle of the race",
                SkillKind::MidSurge {
                    from: 0.4,
                    until: 0.7,
                    chance: 0.01,
                    boost: 1.0,
                },
            ),
        ),
        horse(
            "Midnight Star",
            "#3949ab",
            skill(
                "Overdrive",
                "Pushes beyond the usual limit",
                SkillKind::Overdrive {
                    from: 0.6,
                    chance: 0.008,
                    ceiling: 1.15,
                },
            ),
        ),
        horse(
            "Red Comet",
            "#ff7043",
            skill(
                "Final Spurt",
                "Bursts to top speed on the final stretch",
                SkillKind::LateCharge {
                    from: 0.8,
                    chance: 0.015,
                    boost: 1.0,
                },
            ),
        ),
        horse(
            "Green Dash",
            "#43a047",
            skill(
                "Mud Lover",
                "Unbothered by rain",
                SkillKind::Never,
            ),
        ),
    ];
    field[5].modifiers.ignore_rain = true;
    field
}
