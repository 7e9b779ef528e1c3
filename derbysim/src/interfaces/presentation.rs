use crate::core::camera::CameraPose;
use crate::core::race::RacePhase;
use crate::post::race_result::RaceResult;
use flume::Sender;
use serde::{Deserialize, Serialize};

pub const MAX_SNAPSHOT_FREQUENCY: f64 = 20.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Fire-and-forget notifications for the presentation layer (cut-ins, particles, camera,
/// announcer). They are collected by the race during a frame and drained afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RaceEvent {
    CountdownTick {
        count: u32,
    },
    GatesOpened,
    RaceStarted,
    SkillActivated {
        horse_id: usize,
        horse_name: String,
        skill_name: String,
    },
    SkillEnded {
        horse_id: usize,
    },
    ParticleBurst {
        horse_id: usize,
        progress: f64,
    },
    CameraShake {
        intensity: f64,
    },
    HorseFinished {
        horse_id: usize,
        rank: u32,
        race_time: f64,
    },
    WinnerAnnounced {
        horse_id: usize,
        horse_name: String,
    },
    RaceConcluded {
        finish_order: Vec<usize>,
    },
    WinningRunStarted {
        horse_id: usize,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HorseState {
    pub id: usize,
    pub name: String,
    pub color: RgbColor,
    pub position: [f64; 3],
    pub track_position: f64,
    pub speed: f64,
    pub skill_active: bool,
    pub finished: bool,
    pub rank: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RaceState {
    pub horse_states: Vec<HorseState>,
    pub phase: RacePhase,
    pub winner: Option<usize>,
    pub camera: CameraPose,
    pub time_scale: f64,

    // final results payload (sent once when the session ends)
    pub final_result: Option<RaceResult>,
}

/// PresentationSink receives everything the excluded render/audio/UI layer needs.
pub trait PresentationSink {
    fn on_event(&mut self, event: &RaceEvent);

    /// on_frame is called once per frame; implementations decide how often they forward it.
    fn on_frame(&mut self, _time: f64, _state: &dyn Fn() -> RaceState) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_finish(&mut self, _result: &RaceResult) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Sink for headless runs.
#[derive(Debug, Default)]
pub struct NullSink;

impl PresentationSink for NullSink {
    fn on_event(&mut self, _event: &RaceEvent) {}
}

/// Sink for headless runs that keeps all events, e.g. for tests or the commentary printout.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<RaceEvent>,
}

impl PresentationSink for RecordingSink {
    fn on_event(&mut self, event: &RaceEvent) {
        self.events.push(event.to_owned());
    }
}

/// ChannelSink sends race states to another thread at no more than MAX_SNAPSHOT_FREQUENCY.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<RaceState>,
    t_last_update: Option<f64>,
}

impl ChannelSink {
    pub fn new(tx: Sender<RaceState>) -> ChannelSink {
        ChannelSink {
            tx,
            t_last_update: None,
        }
    }
}

impl PresentationSink for ChannelSink {
    fn on_event(&mut self, _event: &RaceEvent) {}

    fn on_frame(&mut self, time: f64, state: &dyn Fn() -> RaceState) -> anyhow::Result<()> {
        let due = self
            .t_last_update
            .map_or(true, |t| time > t + 1.0 / MAX_SNAPSHOT_FREQUENCY - 0.001);

        if due {
            self.tx
                .send(state())
                .map_err(|_| anyhow::anyhow!("Failed to send race state to the presentation layer!"))?;
            self.t_last_update = Some(time);
        }
        Ok(())
    }

    fn on_finish(&mut self, result: &RaceResult) -> anyhow::Result<()> {
        let final_msg = RaceState {
            final_result: Some(result.to_owned()),
            ..Default::default()
        };
        self.tx
            .send(final_msg)
            .map_err(|_| anyhow::anyhow!("Failed to send final race result to the presentation layer!"))?;
        Ok(())
    }
}
