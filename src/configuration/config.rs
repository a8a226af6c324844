//! Program configuration loaded from YAML and the command line.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! command-line flags. The result is validated once and read-only afterwards.
//!
//! - [`ProgramControl`]    – which analyses run and how they integrate
//! - [`ProgramParams`]     – initial deviation and Lagrange point of the asteroid
//! - [`ProgramConfig`]     – top-level wrapper used to load a configuration from YAML
//! - [`ConfigOverrides`]   – command-line flags applied on top of the file
//!
//! # YAML format
//! Every key is optional; missing keys keep their defaults.
//!
//! ```yaml
//! control:
//!   debug: false
//!   restrict_data_output: true   # only write samples near t_final / 10000 boundaries
//!   output_dir: "./"
//!   t_final: 1000.0              # years
//!   step_size: 1.0e-3            # initial step, or the fixed step
//!   constant_step_size: false    # true -> RK4, false -> adaptive RKF45
//!   max_data_points: 1000000
//!   max_simulation_mass: 0.045   # solar masses
//!   mvt_simulation_mass: 0.001
//!   mass_increment: 0.001
//!   run_trajectory: true
//!   run_mass_analysis: true
//!   run_deviation_simulation: true
//!   run_error_simulation: true
//!   calc_average_wander: true
//!
//! params:
//!   xr_deviation: 0.005          # units of R
//!   a_deviation: 0.0
//!   vr_deviation: 0.0            # AU/yr
//!   vt_deviation: 0.0
//!   lagrange_point: "L_4"        # or "L_5"
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::Deserialize;

use crate::error::{Result, SimError};
use crate::simulation::params::RunParams;
use crate::simulation::states::{Deviation, LagrangePoint};

/// Lagrange point named in configuration
/// lagrange_point: "L_4"` or `lagrange_point: "L_5"
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LagrangePointConfig {
    #[serde(rename = "L_4")] // leading point, 60 degrees ahead of the secondary
    #[value(name = "L_4")]
    L4,

    #[serde(rename = "L_5")] // trailing point
    #[value(name = "L_5")]
    L5,
}

impl From<LagrangePointConfig> for LagrangePoint {
    fn from(p: LagrangePointConfig) -> Self {
        match p {
            LagrangePointConfig::L4 => LagrangePoint::L4,
            LagrangePointConfig::L5 => LagrangePoint::L5,
        }
    }
}

/// What to run and how to integrate
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProgramControl {
    pub debug: bool,                 // debug-level logging
    pub restrict_data_output: bool,  // thin the recorded trajectory
    pub output_dir: PathBuf,         // directory for all output files
    pub t_final: f64,                // integration end time (yr)
    pub step_size: f64,              // initial or fixed step size (yr)
    pub constant_step_size: bool,    // fixed RK4 instead of adaptive RKF45
    pub max_data_points: u64,        // cap on fixed-step unrestricted output
    pub max_simulation_mass: f64,    // upper end of the mass sweep
    pub mvt_simulation_mass: f64,    // secondary mass for trajectory, deviation and error runs
    pub mass_increment: f64,         // mass sweep increment
    pub run_trajectory: bool,
    pub run_mass_analysis: bool,
    pub run_deviation_simulation: bool,
    pub run_error_simulation: bool,
    pub calc_average_wander: bool,   // rerun sweeps about the other point and average
}

impl Default for ProgramControl {
    fn default() -> Self {
        Self {
            debug: false,
            restrict_data_output: true,
            output_dir: PathBuf::from("./"),
            t_final: 1000.0,
            step_size: 1e-3,
            constant_step_size: false,
            max_data_points: 1_000_000,
            max_simulation_mass: 0.045,
            mvt_simulation_mass: 0.001,
            mass_increment: 0.001,
            run_trajectory: true,
            run_mass_analysis: true,
            run_deviation_simulation: true,
            run_error_simulation: true,
            calc_average_wander: true,
        }
    }
}

/// Initial offset of the asteroid
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProgramParams {
    pub xr_deviation: f64,       // radial, units of R
    pub a_deviation: f64,        // azimuthal, units of R
    pub vr_deviation: f64,       // radial speed (AU/yr)
    pub vt_deviation: f64,       // tangential speed (AU/yr)
    pub lagrange_point: LagrangePointConfig,
}

impl Default for ProgramParams {
    fn default() -> Self {
        Self {
            xr_deviation: 0.005,
            a_deviation: 0.0,
            vr_deviation: 0.0,
            vt_deviation: 0.0,
            lagrange_point: LagrangePointConfig::L4,
        }
    }
}

/// Top-level configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ProgramConfig {
    pub control: ProgramControl, // analyses and integration settings
    pub params: ProgramParams,   // asteroid starting offset
}

/// Command-line flags; each one set replaces the value from the file
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Log at debug level
    #[arg(long)]
    pub debug: bool,

    /// Write every trajectory sample
    #[arg(long)]
    pub norestrict_data_output: bool,

    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long)]
    pub xr_deviation: Option<f64>,

    #[arg(long)]
    pub a_deviation: Option<f64>,

    #[arg(long)]
    pub vr_deviation: Option<f64>,

    #[arg(long)]
    pub vt_deviation: Option<f64>,

    #[arg(long)]
    pub t_final: Option<f64>,

    #[arg(long)]
    pub step_size: Option<f64>,

    #[arg(long)]
    pub max_data_points: Option<u64>,

    /// Integrate with fixed-step RK4
    #[arg(long)]
    pub constant_step_size: bool,

    #[arg(long)]
    pub max_simulation_mass: Option<f64>,

    #[arg(long)]
    pub mvt_simulation_mass: Option<f64>,

    #[arg(long)]
    pub mass_increment: Option<f64>,

    #[arg(long, value_enum)]
    pub lagrange_point: Option<LagrangePointConfig>,

    #[arg(long)]
    pub norun_trajectory: bool,

    #[arg(long)]
    pub norun_mass_analysis: bool,

    #[arg(long)]
    pub norun_deviation_simulation: bool,

    #[arg(long)]
    pub norun_error_simulation: bool,

    #[arg(long)]
    pub nocalc_average_wander: bool,
}

impl ProgramConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).map_err(|e| SimError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        serde_yaml::from_reader(reader)
            .map_err(|e| SimError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Layer command-line flags over the loaded values
    pub fn apply(&mut self, o: &ConfigOverrides) {
        let c = &mut self.control;
        let p = &mut self.params;

        c.debug |= o.debug;
        if o.norestrict_data_output {
            c.restrict_data_output = false;
        }
        c.constant_step_size |= o.constant_step_size;

        if let Some(dir) = &o.output_dir {
            c.output_dir = dir.clone();
        }
        if let Some(v) = o.t_final {
            c.t_final = v;
        }
        if let Some(v) = o.step_size {
            c.step_size = v;
        }
        if let Some(v) = o.max_data_points {
            c.max_data_points = v;
        }
        if let Some(v) = o.max_simulation_mass {
            c.max_simulation_mass = v;
        }
        if let Some(v) = o.mvt_simulation_mass {
            c.mvt_simulation_mass = v;
        }
        if let Some(v) = o.mass_increment {
            c.mass_increment = v;
        }

        if let Some(v) = o.xr_deviation {
            p.xr_deviation = v;
        }
        if let Some(v) = o.a_deviation {
            p.a_deviation = v;
        }
        if let Some(v) = o.vr_deviation {
            p.vr_deviation = v;
        }
        if let Some(v) = o.vt_deviation {
            p.vt_deviation = v;
        }
        if let Some(v) = o.lagrange_point {
            p.lagrange_point = v;
        }

        c.run_trajectory &= !o.norun_trajectory;
        c.run_mass_analysis &= !o.norun_mass_analysis;
        c.run_deviation_simulation &= !o.norun_deviation_simulation;
        c.run_error_simulation &= !o.norun_error_simulation;
        c.calc_average_wander &= !o.nocalc_average_wander;
    }

    /// Check ranges and the output directory
    ///
    /// Averaging is switched off when no sweep would use it.
    pub fn validate(mut self) -> Result<Self> {
        let c = &self.control;
        let p = &self.params;

        let non_negative = [
            ("xr deviation", p.xr_deviation),
            ("a deviation", p.a_deviation),
            ("vr deviation", p.vr_deviation),
            ("vt deviation", p.vt_deviation),
            ("max. simulation mass", c.max_simulation_mass),
            ("mvt. simulation mass", c.mvt_simulation_mass),
        ];
        for (name, v) in non_negative {
            if !(v >= 0.0) {
                return Err(SimError::Config(format!("{} is not valid: {}", name, v)));
            }
        }

        let positive = [
            ("t-final", c.t_final),
            ("step size", c.step_size),
            ("mass increment", c.mass_increment),
        ];
        for (name, v) in positive {
            if !(v > 0.0 && v.is_finite()) {
                return Err(SimError::Config(format!("{} is not valid: {}", name, v)));
            }
        }

        if c.mvt_simulation_mass >= c.max_simulation_mass + 1e-6 {
            return Err(SimError::Config(format!(
                "mvt. simulation mass {} exceeds max. simulation mass {}",
                c.mvt_simulation_mass, c.max_simulation_mass
            )));
        }

        if c.constant_step_size && !c.restrict_data_output {
            let points = c.t_final / c.step_size;
            if points > c.max_data_points as f64 {
                return Err(SimError::Config(format!(
                    "{} data points with a constant step size exceeds the maximum of {}",
                    points, c.max_data_points
                )));
            }
        }

        check_output_dir(&c.output_dir)?;

        if !c.run_mass_analysis && !c.run_deviation_simulation {
            self.control.calc_average_wander = false;
        }

        Ok(self)
    }

    pub fn run_params(&self) -> RunParams {
        RunParams {
            t_final: self.control.t_final,
            h0: self.control.step_size,
            constant_step_size: self.control.constant_step_size,
            restrict_data_output: self.control.restrict_data_output,
        }
    }

    pub fn deviation(&self) -> Deviation {
        Deviation {
            xr: self.params.xr_deviation,
            a: self.params.a_deviation,
            vr: self.params.vr_deviation,
            vt: self.params.vt_deviation,
        }
    }

    pub fn lagrange_point(&self) -> LagrangePoint {
        self.params.lagrange_point.into()
    }
}

fn check_output_dir(dir: &Path) -> Result<()> {
    let meta = std::fs::metadata(dir)
        .map_err(|e| SimError::Config(format!("output directory {}: {}", dir.display(), e)))?;

    if !meta.is_dir() {
        return Err(SimError::Config(format!("{} is not a directory", dir.display())));
    }
    if meta.permissions().readonly() {
        return Err(SimError::Config(format!("output directory {} is not writable", dir.display())));
    }
    Ok(())
}
