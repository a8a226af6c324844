//! Core state types for the trojan simulation.
//!
//! Everything lives in the x-y plane of the frame co-rotating with the two
//! primaries:
//! - `Body` / `BodyPair` for the primary and secondary masses
//! - `NVec4` for the asteroid state `(x, y, vx, vy)`
//! - `LagrangePoint`, `Deviation` and `InitialConditions` for the start of a run

use nalgebra::{Vector2, Vector4};

use super::params::R_DISTANCE;

pub type NVec2 = Vector2<f64>;
pub type NVec4 = Vector4<f64>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub m: f64, // mass (solar masses)
    pub x: NVec2, // position (AU)
}

impl Body {
    pub fn new(m: f64) -> Self {
        Self { m, x: NVec2::zeros() }
    }
}

/// Primary and secondary, placed on the x axis about their common centre of mass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPair {
    pub first: Body,
    pub second: Body,
}

impl BodyPair {
    /// Build a pair with positions set by [`initialise_bodies`]
    pub fn new(m1: f64, m2: f64) -> Self {
        initialise_bodies(Body::new(m1), Body::new(m2))
    }

    pub fn total_mass(&self) -> f64 {
        self.first.m + self.second.m
    }

    pub fn reduced_mass(&self) -> f64 {
        reduced_mass(self.first.m, self.second.m)
    }
}

/// Place both bodies for the rigid two-body configuration: centre of mass at
/// the origin, separation `R_DISTANCE`, secondary on the positive x axis.
pub fn initialise_bodies(mut first: Body, mut second: Body) -> BodyPair {
    first.x = NVec2::new(-R_DISTANCE * second.m / (first.m + second.m), 0.0);
    second.x = NVec2::new(first.x.x + R_DISTANCE, 0.0);

    BodyPair { first, second }
}

pub fn reduced_mass(m1: f64, m2: f64) -> f64 {
    (m1 * m2) / (m1 + m2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LagrangePoint {
    L4,
    L5,
}

impl LagrangePoint {
    /// The mirror point across the primary-secondary axis
    pub fn other(self) -> Self {
        match self {
            LagrangePoint::L4 => LagrangePoint::L5,
            LagrangePoint::L5 => LagrangePoint::L4,
        }
    }

    /// `+1` for L4, `-1` for L5
    pub fn sign(self) -> f64 {
        match self {
            LagrangePoint::L4 => 1.0,
            LagrangePoint::L5 => -1.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LagrangePoint::L4 => "L4",
            LagrangePoint::L5 => "L5",
        }
    }
}

/// Analytic positions of (L4, L5) for the given pair
pub fn lagrange_points(bodies: &BodyPair) -> (NVec2, NVec2) {
    let x = 0.5 * R_DISTANCE * (bodies.first.m - bodies.second.m) / bodies.total_mass();
    let y = 0.5 * R_DISTANCE * 3f64.sqrt();

    (NVec2::new(x, y), NVec2::new(x, -y))
}

/// Initial offset of the asteroid from its Lagrange point
///
/// `xr` and `a` are radial and azimuthal displacements in units of
/// `R_DISTANCE` (azimuthal measured away from the secondary), `vr` and `vt`
/// are radial and tangential speeds in AU/yr.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Deviation {
    pub xr: f64,
    pub a: f64,
    pub vr: f64,
    pub vt: f64,
}

impl Deviation {
    pub const ZERO: Deviation = Deviation { xr: 0.0, a: 0.0, vr: 0.0, vt: 0.0 };
}

/// Which component of a [`Deviation`] a sweep varies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviationAxis {
    Radial,
    Azimuthal,
    RadialSpeed,
    TangentialSpeed,
}

impl DeviationAxis {
    /// Copy of `base` with this component replaced by `value`
    pub fn apply(self, base: Deviation, value: f64) -> Deviation {
        let mut d = base;
        match self {
            DeviationAxis::Radial => d.xr = value,
            DeviationAxis::Azimuthal => d.a = value,
            DeviationAxis::RadialSpeed => d.vr = value,
            DeviationAxis::TangentialSpeed => d.vt = value,
        }
        d
    }

    /// Stem of the plotting file for this sweep
    pub fn file_stem(self) -> &'static str {
        match self {
            DeviationAxis::Radial => "xr_wander",
            DeviationAxis::Azimuthal => "a_wander",
            DeviationAxis::RadialSpeed => "vr_wander",
            DeviationAxis::TangentialSpeed => "vt_wander",
        }
    }
}

/// Starting point of one run, derived from the chosen Lagrange point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialConditions {
    pub l4: NVec2,
    pub l5: NVec2,
    pub point: LagrangePoint,
    pub position: NVec2,
    pub speed: NVec2,
}

impl InitialConditions {
    pub fn new(bodies: &BodyPair, point: LagrangePoint, dev: &Deviation) -> Self {
        let (l4, l5) = lagrange_points(bodies);
        let l = match point {
            LagrangePoint::L4 => l4,
            LagrangePoint::L5 => l5,
        };
        let l_mag = l.norm();

        // rotate by the azimuthal offset, anticlockwise at L4 and clockwise at L5
        let theta = dev.a * R_DISTANCE / l_mag;
        let (sin, cos) = theta.sin_cos();
        let s = point.sign();

        let radial = l / l_mag;
        let position = NVec2::new(
            dev.xr * R_DISTANCE * radial.x + l.x * cos - s * l.y * sin,
            dev.xr * R_DISTANCE * radial.y + l.y * cos + s * l.x * sin,
        );

        // tangential direction points away from the secondary at either point
        let speed = NVec2::new(
            dev.vr * radial.x - s * dev.vt * radial.y,
            dev.vr * radial.y + s * dev.vt * radial.x,
        );

        Self { l4, l5, point, position, speed }
    }

    pub fn lagrange_point(&self) -> NVec2 {
        match self.point {
            LagrangePoint::L4 => self.l4,
            LagrangePoint::L5 => self.l5,
        }
    }

    pub fn state(&self) -> NVec4 {
        NVec4::new(self.position.x, self.position.y, self.speed.x, self.speed.y)
    }
}
