use trojan_sim::{ConfigOverrides, ProgramConfig, Timer};
use trojan_sim::{DeviationAnalysis, ErrorAnalysis, MassAnalysis};
use trojan_sim::{Deviation, OutputDir, Scenario, Sinks, SimError, TrajectoryFiles};
use trojan_sim::bench_steppers;
use trojan_sim::output::writer;
use trojan_sim::simulation::trajectory::{run_trajectory, TrajectorySink};

use anyhow::Result;
use clap::Parser;
use log::{error, info};

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Trojan asteroid stability in the restricted three-body problem")]
struct Args {
    /// YAML configuration; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Time the steppers and exit
    #[arg(long)]
    bench: bool,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

// load here to keep main clean
fn load_config(args: &Args) -> Result<ProgramConfig> {
    let mut cfg = match &args.config {
        Some(path) => ProgramConfig::load(path)?,
        None => ProgramConfig::default(),
    };
    cfg.apply(&args.overrides);

    Ok(cfg.validate()?)
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn log_config(cfg: &ProgramConfig) {
    let c = &cfg.control;
    let p = &cfg.params;
    info!("output directory: {}", c.output_dir.display());
    info!("t_final = {} yr, step size = {}, constant step size = {}", c.t_final, c.step_size, c.constant_step_size);
    info!(
        "max. simulation mass = {}, mvt. simulation mass = {}, mass increment = {}",
        c.max_simulation_mass, c.mvt_simulation_mass, c.mass_increment
    );
    info!(
        "deviation xr = {}, a = {}, vr = {}, vt = {} about {:?}",
        p.xr_deviation, p.a_deviation, p.vr_deviation, p.vt_deviation, p.lagrange_point
    );
}

/// Mass sweep, recording the trajectory at the mvt mass on the way, or a
/// single trajectory when the sweep is off
fn run_mass_analysis_and_trajectory(cfg: &ProgramConfig, dir: &OutputDir) -> Result<()> {
    let c = &cfg.control;
    let mut files = if c.run_trajectory { Some(TrajectoryFiles::create(dir)?) } else { None };

    let recorded = if c.run_mass_analysis {
        let mut analysis = MassAnalysis::new(
            c.max_simulation_mass,
            c.mass_increment,
            cfg.lagrange_point(),
            cfg.deviation(),
            cfg.run_params(),
        );
        if c.run_trajectory {
            analysis = analysis.with_trajectory(c.mvt_simulation_mass);
        }

        let sink = files.as_mut().map(|f| f as &mut dyn TrajectorySink);
        let report = analysis.run(c.calc_average_wander, sink)?;

        writer::write_mass_sweep(dir, &report.sweep.samples, "wander_mass", "small_mass_libration")?;
        if let Some(averaged) = &report.averaged {
            writer::write_mass_sweep(dir, averaged, "wander_mass_average", "average_small_mass_libration")?;
        }
        report.sweep.recorded
    } else if let Some(f) = files.as_mut() {
        let scenario = Scenario::build(c.mvt_simulation_mass, cfg.lagrange_point(), cfg.deviation(), cfg.run_params());
        scenario.dump();

        match run_trajectory(&scenario, &mut Sinks::trajectory(f)) {
            Ok(summary) => info!("trajectory wander: {} degrees", summary.angular_wander_degrees()),
            Err(SimError::Integration(e)) => error!("trajectory run abandoned: {}", e),
            Err(e) => return Err(e.into()),
        }
        Some(scenario)
    } else {
        None
    };

    if let Some(f) = files {
        f.finish()?;
    }
    if let Some(scenario) = recorded {
        writer::write_trajectory_params(dir, &scenario)?;
    }
    Ok(())
}

fn run_deviation_simulation(cfg: &ProgramConfig, dir: &OutputDir) -> Result<()> {
    let analysis = DeviationAnalysis::new(
        cfg.control.mvt_simulation_mass,
        Deviation::ZERO,
        cfg.lagrange_point(),
        cfg.run_params(),
    );

    for sweep in &analysis.sweeps {
        info!("deviation simulation: {}", sweep.axis.file_stem());
        let report = analysis.run_sweep(sweep, cfg.control.calc_average_wander)?;
        writer::write_deviation_report(dir, &report)?;
    }
    Ok(())
}

fn run_error_simulation(cfg: &ProgramConfig, dir: &OutputDir) -> Result<()> {
    let analysis = ErrorAnalysis::new(cfg.control.mvt_simulation_mass, cfg.run_params());

    for (i, deviation) in analysis.deviations.iter().enumerate() {
        let mut f = dir.create(&format!("error_{}", i))?;
        if let Some(summary) = analysis.run_one(deviation, &mut f)? {
            info!("error run {}: hamiltonian spread {}", i, summary.hamiltonian_spread);
        }
        f.finish()?;
    }

    writer::write_error_params(dir, &analysis.deviations)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = load_config(&args)?;

    init_logging(cfg.control.debug);

    if args.bench {
        bench_steppers();
        return Ok(());
    }

    log_config(&cfg);
    let dir = OutputDir::new(&cfg.control.output_dir);

    if cfg.control.run_trajectory || cfg.control.run_mass_analysis {
        let timer = Timer::start();
        run_mass_analysis_and_trajectory(&cfg, &dir)?;
        timer.end("mass analysis and trajectory");
    }

    if cfg.control.run_deviation_simulation {
        let timer = Timer::start();
        run_deviation_simulation(&cfg, &dir)?;
        timer.end("deviation simulation");
    }

    if cfg.control.run_error_simulation {
        let timer = Timer::start();
        run_error_simulation(&cfg, &dir)?;
        timer.end("error simulation");
    }

    Ok(())
}
