//! Type-safe angular units for sky-plane geometry
//!
//! Catalog positions arrive in degrees, margins in arcminutes, pixel scales
//! and profile sizes in arcseconds. Conversions go through `uom` angles so a
//! degree is never mistaken for an arcsecond.

use uom::si::angle::{degree, minute, radian, second};

/// Type alias for sky-plane angles
pub type Angle = uom::si::f64::Angle;

/// Extension trait for the angular units used by survey catalogs
pub trait AngleExt {
    /// Create angle from degrees
    fn from_degrees(deg: f64) -> Self;

    /// Get angle in degrees
    fn as_degrees(&self) -> f64;

    /// Create angle from arcminutes
    fn from_arcminutes(arcmin: f64) -> Self;

    /// Get angle in arcminutes
    fn as_arcminutes(&self) -> f64;

    /// Create angle from arcseconds
    fn from_arcseconds(arcsec: f64) -> Self;

    /// Get angle in arcseconds
    fn as_arcseconds(&self) -> f64;

    /// Create angle from radians
    fn from_radians(rad: f64) -> Self;

    /// Get angle in radians
    fn as_radians(&self) -> f64;
}

impl AngleExt for Angle {
    fn from_degrees(deg: f64) -> Self {
        Angle::new::<degree>(deg)
    }

    fn as_degrees(&self) -> f64 {
        self.get::<degree>()
    }

    fn from_arcminutes(arcmin: f64) -> Self {
        Angle::new::<minute>(arcmin)
    }

    fn as_arcminutes(&self) -> f64 {
        self.get::<minute>()
    }

    fn from_arcseconds(arcsec: f64) -> Self {
        Angle::new::<second>(arcsec)
    }

    fn as_arcseconds(&self) -> f64 {
        self.get::<second>()
    }

    fn from_radians(rad: f64) -> Self {
        Angle::new::<radian>(rad)
    }

    fn as_radians(&self) -> f64 {
        self.get::<radian>()
    }
}
