use clap::Parser;
use derbysim::core::handle_race::handle_race;
use derbysim::interfaces::presentation::{
    ChannelSink, NullSink, PresentationSink, RaceEvent, RaceState,
};
use derbysim::post::race_result::{RaceResult, WinTally};
use derbysim::pre::read_sim_pars::{read_sim_pars, SimPars};
use derbysim::pre::sim_opts::SimOpts;
use rayon::prelude::*;
use std::thread;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// CommentarySink prints the race events like a race announcer.
struct CommentarySink<'a> {
    sim_pars: &'a SimPars,
}

impl CommentarySink<'_> {
    fn horse_name(&self, horse_id: usize) -> &str {
        self.sim_pars
            .horse_pars_all
            .get(horse_id)
            .map_or("?", |hp| hp.name.as_str())
    }
}

impl PresentationSink for CommentarySink<'_> {
    fn on_event(&mut self, event: &RaceEvent) {
        match event {
            RaceEvent::CountdownTick { count } => println!("{}...", count),
            RaceEvent::GatesOpened => println!("GO!"),
            RaceEvent::SkillActivated {
                horse_name,
                skill_name,
                ..
            } => println!("{} uses {}!", horse_name, skill_name),
            RaceEvent::HorseFinished {
                horse_id,
                rank,
                race_time,
            } => println!(
                "#{} {} ({:.3}s)",
                rank,
                self.horse_name(*horse_id),
                race_time
            ),
            RaceEvent::WinnerAnnounced { horse_name, .. } => {
                println!("{} wins the race!", horse_name)
            }
            _ => {}
        }
    }
}

fn print_race_state(race_state: &RaceState) {
    let mut horse_states: Vec<_> = race_state.horse_states.iter().collect();
    horse_states.sort_by(|a, b| match (a.rank, b.rank) {
        (Some(ra), Some(rb)) => ra.cmp(&rb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => b
            .track_position
            .partial_cmp(&a.track_position)
            .unwrap_or(std::cmp::Ordering::Equal),
    });

    let standings: Vec<String> = horse_states
        .iter()
        .map(|hs| format!("{} {:.3}", hs.name, hs.track_position))
        .collect();
    println!(
        "{:?} x{:.2} | {}",
        race_state.phase,
        race_state.time_scale,
        standings.join(" | ")
    );
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if sim_opts.debug { "debug" } else { "info" })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // get simulation parameters
    let mut sim_pars = if let Some(parfile_path) = &sim_opts.parfile_path {
        info!("Reading simulation parameters from {:?}", parfile_path);
        read_sim_pars(parfile_path)?
    } else {
        info!("No parameter file given, using the built-in six horse field");
        SimPars::default()
    };
    if sim_opts.seed.is_some() {
        sim_pars.race_pars.seed = sim_opts.seed;
    }

    // print race details
    info!(
        "Simulating {} horses on {} at {:.0} fps",
        sim_pars.horse_pars_all.len(),
        sim_pars
            .course_pars
            .name
            .to_owned()
            .unwrap_or_else(|| sim_pars.course_pars.preset.name().to_owned()),
        sim_opts.frame_rate
    );

    // EXECUTION -----------------------------------------------------------------------------------
    let race_result = if sim_opts.live {
        run_live(&sim_pars, &sim_opts)?
    } else if sim_opts.no_sim_runs > 1 {
        run_many(&sim_pars, &sim_opts)?
    } else {
        let t_start = Instant::now();
        let mut sink = CommentarySink {
            sim_pars: &sim_pars,
        };
        let race_result = handle_race(
            &sim_pars,
            sim_opts.frame_rate,
            sim_opts.camera_mode,
            &mut sink,
            None,
        )?;
        info!("Execution time: {}ms", t_start.elapsed().as_millis());
        race_result
    };

    // POST-PROCESSING -----------------------------------------------------------------------------
    race_result.print_finish_order()?;
    let out_path = race_result.write_finish_order_to_file(sim_opts.output.as_deref())?;
    info!("Result written to {}", out_path);

    if sim_opts.debug {
        println!("{}", serde_json::to_string_pretty(&race_result)?);
    }

    Ok(())
}

/// run_live simulates the race in real-time in a separate thread and prints the received race
/// states, the way a visualization would consume them.
fn run_live(sim_pars: &SimPars, sim_opts: &SimOpts) -> anyhow::Result<RaceResult> {
    if sim_opts.no_sim_runs > 1 {
        warn!("Number of simulation runs is ignored in live mode");
    }

    let (tx, rx) = flume::unbounded();
    let sim_pars_thread = sim_pars.to_owned();
    let sim_opts_thread = sim_opts.to_owned();

    let sim_handle = thread::spawn(move || {
        let mut sink = ChannelSink::new(tx);
        handle_race(
            &sim_pars_thread,
            sim_opts_thread.frame_rate,
            sim_opts_thread.camera_mode,
            &mut sink,
            Some(sim_opts_thread.realtime_factor),
        )
    });

    // print roughly twice per second, the channel runs at a higher rate
    let mut no_received = 0u64;
    for race_state in rx.iter() {
        if race_state.final_result.is_some() {
            break;
        }
        if no_received % 10 == 0 {
            print_race_state(&race_state);
        }
        no_received += 1;
    }

    sim_handle
        .join()
        .map_err(|_| anyhow::anyhow!("Simulation thread panicked!"))?
}

/// run_many simulates independent races in parallel and prints the win statistics. Returns the
/// result of the first race.
fn run_many(sim_pars: &SimPars, sim_opts: &SimOpts) -> anyhow::Result<RaceResult> {
    info!("Running {} simulations in parallel...", sim_opts.no_sim_runs);
    let t_start = Instant::now();

    let results = (0..sim_opts.no_sim_runs)
        .into_par_iter()
        .map(|run| {
            let mut sim_pars_run = sim_pars.to_owned();
            // derive distinct but reproducible seeds from a configured seed
            sim_pars_run.race_pars.seed = sim_pars
                .race_pars
                .seed
                .map(|seed| seed.wrapping_add(run as u64));
            handle_race(
                &sim_pars_run,
                sim_opts.frame_rate,
                sim_opts.camera_mode,
                &mut NullSink,
                None,
            )
        })
        .collect::<anyhow::Result<Vec<RaceResult>>>()?;

    info!("Execution time: {}ms", t_start.elapsed().as_millis());

    let mut tally = WinTally::default();
    for result in results.iter() {
        tally.add(result);
    }
    tally.print_summary();

    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("No simulation runs!"))
}
