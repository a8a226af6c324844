//! Tab-separated plotting files
//!
//! Every file lives in one output directory and is named `<stem>.dat`, or
//! `<stem>.params` for the `|`-separated run descriptions:
//!
//! | file | columns |
//! |---|---|
//! | `trojan.dat` | t, x, y, H, H spread, vx, vy (rotating frame) |
//! | `inertial.dat` | t, X, Y |
//! | `wander_time.dat` | t, angle from the Lagrange point (deg), radial offset or NaN |
//! | `wander_mass.dat` | reduced mass, wander (deg), secondary mass |
//! | `small_mass_libration.dat` | ln reduced mass, ln libration ratio |
//! | `<axis>_wander.dat` | deviation, wander (deg), half radial wander / R |
//! | `error_<i>.dat` | t, H, H spread |
//!
//! Absent sweep points are skipped rather than written.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use log::debug;

use crate::simulation::analysis::{DeviationReport, DeviationSample, MassSample};
use crate::simulation::scenario::Scenario;
use crate::simulation::states::Deviation;
use crate::simulation::trajectory::{EnergyRecord, EnergySink, TrajectoryRecord, TrajectorySink};

/// Write one tab-separated row
pub fn write_row<W: Write>(out: &mut W, cols: &[f64]) -> io::Result<()> {
    let mut first = true;
    for c in cols {
        if !first {
            out.write_all(b"\t")?;
        }
        write!(out, "{}", c)?;
        first = false;
    }
    out.write_all(b"\n")
}

/// Directory all output files are created in
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, stem: &str, suffix: &str) -> PathBuf {
        self.root.join(format!("{}.{}", stem, suffix))
    }

    /// Create (or truncate) `<stem>.dat`
    pub fn create(&self, stem: &str) -> io::Result<DataFile> {
        self.create_with_suffix(stem, "dat")
    }

    pub fn create_with_suffix(&self, stem: &str, suffix: &str) -> io::Result<DataFile> {
        let path = self.path(stem, suffix);
        debug!("writing {}", path.display());
        Ok(DataFile {
            out: BufWriter::new(File::create(path)?),
        })
    }
}

/// Buffered output file; call `finish` to surface flush errors
pub struct DataFile {
    out: BufWriter<File>,
}

impl DataFile {
    pub fn row(&mut self, cols: &[f64]) -> io::Result<()> {
        write_row(&mut self.out, cols)
    }

    pub fn finish(mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Write for DataFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl EnergySink for DataFile {
    fn record(&mut self, rec: &EnergyRecord) -> io::Result<()> {
        self.row(&[rec.t, rec.hamiltonian, rec.hamiltonian_spread])
    }
}

// =========================================================================================
// Trajectory
// =========================================================================================

pub fn write_trajectory_record<W: Write>(
    rotating: &mut W,
    inertial: &mut W,
    wander_time: &mut W,
    rec: &TrajectoryRecord,
) -> io::Result<()> {
    let s = &rec.state;
    write_row(rotating, &[rec.t, s[0], s[1], rec.hamiltonian, rec.hamiltonian_spread, s[2], s[3]])?;
    write_row(inertial, &[rec.t, rec.inertial.x, rec.inertial.y])?;
    write_row(
        wander_time,
        &[rec.t, rec.angle_from_point.to_degrees(), rec.radial_offset.unwrap_or(f64::NAN)],
    )
}

/// `trojan.dat`, `inertial.dat` and `wander_time.dat` of one recorded run
pub struct TrajectoryFiles {
    rotating: DataFile,
    inertial: DataFile,
    wander_time: DataFile,
}

impl TrajectoryFiles {
    pub fn create(dir: &OutputDir) -> io::Result<Self> {
        Ok(Self {
            rotating: dir.create("trojan")?,
            inertial: dir.create("inertial")?,
            wander_time: dir.create("wander_time")?,
        })
    }

    pub fn finish(self) -> io::Result<()> {
        self.rotating.finish()?;
        self.inertial.finish()?;
        self.wander_time.finish()
    }
}

impl TrajectorySink for TrajectoryFiles {
    fn record(&mut self, rec: &TrajectoryRecord) -> io::Result<()> {
        write_trajectory_record(&mut self.rotating, &mut self.inertial, &mut self.wander_time, rec)
    }
}

/// `|`-separated description of a recorded run, read by the plotting scripts
pub fn format_trajectory_params(scenario: &Scenario) -> String {
    let init = &scenario.initial;
    let dev = &scenario.deviation;
    let b = &scenario.bodies;

    let values = [
        init.position.x,
        init.position.y,
        init.speed.x,
        init.speed.y,
        dev.xr,
        dev.a,
        dev.vr,
        dev.vt,
        b.first.m,
        b.second.m,
        b.first.x.x,
        b.first.x.y,
        b.second.x.x,
        b.second.x.y,
        init.l4.x,
        init.l4.y,
        init.l5.x,
        init.l5.y,
    ];

    let mut fields: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    fields.push(init.point.label().to_string());
    fields.join("|")
}

pub fn write_trajectory_params(dir: &OutputDir, scenario: &Scenario) -> io::Result<()> {
    let mut f = dir.create_with_suffix("trojan", "params")?;
    writeln!(f, "{}", format_trajectory_params(scenario))?;
    f.finish()
}

// =========================================================================================
// Sweeps
// =========================================================================================

pub fn write_mass_wander<W: Write>(out: &mut W, samples: &[MassSample]) -> io::Result<()> {
    for s in samples {
        if let Some(w) = s.wander_degrees {
            write_row(out, &[s.reduced_mass, w, s.mass])?;
        }
    }
    Ok(())
}

/// Log-log libration data; points whose logarithm is not finite are skipped
pub fn write_mass_libration<W: Write>(out: &mut W, samples: &[MassSample]) -> io::Result<()> {
    for s in samples {
        if let Some(ratio) = s.libration_ratio {
            let (x, y) = (s.reduced_mass.ln(), ratio.ln());
            if x.is_finite() && y.is_finite() {
                write_row(out, &[x, y])?;
            }
        }
    }
    Ok(())
}

/// Write one mass sweep as `<wander_stem>.dat` and `<libration_stem>.dat`
pub fn write_mass_sweep(dir: &OutputDir, samples: &[MassSample], wander_stem: &str, libration_stem: &str) -> io::Result<()> {
    let mut wander = dir.create(wander_stem)?;
    write_mass_wander(&mut wander, samples)?;
    wander.finish()?;

    let mut libration = dir.create(libration_stem)?;
    write_mass_libration(&mut libration, samples)?;
    libration.finish()
}

pub fn write_deviation_samples<W: Write>(out: &mut W, samples: &[DeviationSample]) -> io::Result<()> {
    for s in samples {
        if let (Some(w), Some(r)) = (s.wander_degrees, s.radial_wander) {
            write_row(out, &[s.deviation, w, r])?;
        }
    }
    Ok(())
}

/// Averaged deviation files carry the deviation and the mean wander only
pub fn write_deviation_average<W: Write>(out: &mut W, samples: &[DeviationSample]) -> io::Result<()> {
    for s in samples {
        if let Some(w) = s.wander_degrees {
            write_row(out, &[s.deviation, w])?;
        }
    }
    Ok(())
}

pub fn write_deviation_report(dir: &OutputDir, report: &DeviationReport) -> io::Result<()> {
    let stem = report.axis.file_stem();

    let mut f = dir.create(stem)?;
    write_deviation_samples(&mut f, &report.samples)?;
    f.finish()?;

    if let Some(averaged) = &report.averaged {
        let mut f = dir.create(&format!("{}_average", stem))?;
        write_deviation_average(&mut f, averaged)?;
        f.finish()?;
    }
    Ok(())
}

pub fn format_error_params(deviations: &[Deviation]) -> String {
    deviations
        .iter()
        .map(|d| format!("{:.3}|{:.1}|{:.1}|{:.1}", d.xr, d.a, d.vr, d.vt))
        .collect::<Vec<_>>()
        .join("|")
}

pub fn write_error_params(dir: &OutputDir, deviations: &[Deviation]) -> io::Result<()> {
    let mut f = dir.create_with_suffix("error", "params")?;
    writeln!(f, "{}", format_error_params(deviations))?;
    f.finish()
}
