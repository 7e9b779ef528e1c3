use crate::core::camera::CameraMode;
use crate::core::race::RacePars;
use crate::core::track::{CourseCurve, TrackCurve};
use crate::core::weather::Weather;
use crate::error::ConfigError;
use crate::pre::read_sim_pars::SimPars;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

/// RNG streams of the components that own a generator, so that a single seed does not make the
/// camera shots mirror the race draws.
pub const RACE_RNG_STREAM: u64 = 0;
pub const CAMERA_RNG_STREAM: u64 = 1;

/// RaceContext bundles everything the race controller and the camera director share: course,
/// weather, race parameters and the selected camera mode. It replaces any global game state and
/// is handed to both constructors.
#[derive(Debug, Clone)]
pub struct RaceContext {
    pub course_name: String,
    pub track: Arc<dyn TrackCurve>,
    pub weather: Weather,
    pub race_pars: RacePars,
    pub camera_mode: CameraMode,
}

impl RaceContext {
    pub fn new(
        course_name: &str,
        track: Arc<dyn TrackCurve>,
        weather: Weather,
        race_pars: RacePars,
    ) -> Result<RaceContext, ConfigError> {
        race_pars.validate()?;
        crate::error::check_positive("weather.speed_multiplier", weather.speed_multiplier)?;

        Ok(RaceContext {
            course_name: course_name.to_owned(),
            track,
            weather,
            race_pars,
            camera_mode: CameraMode::default(),
        })
    }

    /// from_sim_pars builds the course and validates all race level parameters.
    pub fn from_sim_pars(sim_pars: &SimPars) -> anyhow::Result<RaceContext> {
        let course = CourseCurve::from_pars(&sim_pars.course_pars)?;
        let course_name = course.name.to_owned();

        Ok(RaceContext::new(
            &course_name,
            Arc::new(course),
            sim_pars.weather.to_weather(),
            sim_pars.race_pars.to_owned(),
        )?)
    }

    pub fn with_camera_mode(mut self, camera_mode: CameraMode) -> RaceContext {
        self.camera_mode = camera_mode;
        self
    }

    /// make_rng returns the generator of a component, deterministic if a seed is configured.
    pub fn make_rng(&self, stream: u64) -> ChaCha8Rng {
        let mut rng = match self.race_pars.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        rng.set_stream(stream);
        rng
    }
}
