use crate::core::camera::CameraMode;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    author = "Alexander Heilmeier <alexander.heilmeier@tum.de>",
    name = "DERBYSIM",
    about = "A frame-driven horse race simulator with an autonomous camera director"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug logging
    #[clap(short, long)]
    pub debug: bool,

    /// Live mode - race will be simulated in real-time and race states are streamed to the
    /// console
    #[clap(short, long)]
    pub live: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of simulation runs (only for non-live mode, ignored in live mode)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set path to the simulation parameter file (OPTIONAL: if not set, uses the built-in
    /// six horse field)
    #[clap(short, long)]
    pub parfile_path: Option<PathBuf>,

    /// Set real-time factor (only relevant in live mode)
    #[clap(short, long, default_value = "1.0")]
    pub realtime_factor: f64,

    /// Set frame rate of the simulation in frames per second, should be in the range [10, 1000]
    #[clap(short, long, default_value = "60.0")]
    pub frame_rate: f64,

    /// Set the initial camera mode (every race start switches to the automatic broadcast)
    #[clap(short, long, value_enum)]
    pub camera_mode: Option<CameraMode>,

    /// Set the seed of the random number generators (overrides the parameter file)
    #[clap(short, long)]
    pub seed: Option<u64>,

    /// Set path of the result text file (OPTIONAL: if not set, output/last_run.txt is used)
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}

impl Default for SimOpts {
    fn default() -> Self {
        SimOpts {
            debug: false,
            live: false,
            no_sim_runs: 1,
            parfile_path: None,
            realtime_factor: 1.0,
            frame_rate: 60.0,
            camera_mode: None,
            seed: None,
            output: None,
        }
    }
}
