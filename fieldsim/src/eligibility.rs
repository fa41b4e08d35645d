//! Per-object gating: decide whether a catalog entry is worth rendering
//!
//! The checks run in a fixed order and the first failing check names the
//! rejection. Rejections are ordinary outcomes, not errors.

use std::fmt;

use crate::catalog::CatalogEntry;
use crate::config::SimulationConfig;
use crate::geometry::{isophote_extents, psf_padding, IsophoteBox, MoffatPadding, ShearEllipse};
use crate::stamp::{SkyRegion, StampBounds, StampPlacement};
use crate::units::AngleExt;

/// AB magnitude at which an object carries `flux_norm` ADU
pub const FLUX_NORM_MAGNITUDE: f64 = 24.0;

/// Reason an entry was not rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rejection {
    /// Outside the field expanded by the margin
    OutsideMargin,
    /// Total flux at or below half the isophote cut
    TooFaint,
    /// Disk half-light radius not positive
    NonPositiveRadius,
    /// Axis lengths not usable as an ellipse
    DegenerateShape,
    /// Peak surface brightness below the isophote cut
    BelowIsophote,
    /// Stamp misses the field entirely
    NoFieldOverlap,
}

impl Rejection {
    /// Every reason in check order
    pub const ALL: [Rejection; 6] = [
        Rejection::OutsideMargin,
        Rejection::TooFaint,
        Rejection::NonPositiveRadius,
        Rejection::DegenerateShape,
        Rejection::BelowIsophote,
        Rejection::NoFieldOverlap,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Rejection::OutsideMargin => "outside margin",
            Rejection::TooFaint => "too faint",
            Rejection::NonPositiveRadius => "non-positive radius",
            Rejection::DegenerateShape => "degenerate shape",
            Rejection::BelowIsophote => "below isophote",
            Rejection::NoFieldOverlap => "no field overlap",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An entry that passed every check, with everything needed to render it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Flux of the stacked exposure (ADU)
    pub flux: f64,
    /// Disk half-light radius (arcsec)
    pub half_light_radius: f64,
    /// Axis ratio b/a
    pub axis_ratio: f64,
    /// Position angle in radians
    pub position_angle: f64,
    /// Isophote box including PSF padding (arcsec)
    pub extents: IsophoteBox,
    pub placement: StampPlacement,
}

/// Predicate chain over catalog entries for one field configuration
#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    region: SkyRegion,
    field: StampBounds,
    margin: f64,
    pixel_scale: f64,
    flux_norm: f64,
    exposure_scale: f64,
    isophote_cut: f64,
    f0: f64,
    padding: Option<MoffatPadding>,
}

impl EligibilityFilter {
    pub fn new(config: &SimulationConfig) -> Self {
        let f0 = config.surface_brightness_cut();
        Self {
            region: config.sky_region(),
            field: StampBounds::field(config.width, config.height),
            margin: config.margin_arcsec(),
            pixel_scale: config.pixel_scale,
            flux_norm: config.flux_norm,
            exposure_scale: config.exposure_scale(),
            isophote_cut: config.isophote_cut,
            f0,
            padding: MoffatPadding::new(config.psf_fwhm, config.psf_beta, f0),
        }
    }

    /// Single-exposure flux for an i-band AB magnitude
    pub fn flux_for_magnitude(&self, i_ab: f64) -> f64 {
        self.flux_norm * 10f64.powf(FLUX_NORM_MAGNITUDE - i_ab)
    }

    /// Run every check against one entry.
    ///
    /// Flux tests and geometry use the single-exposure flux; the candidate
    /// carries the flux scaled to the full stack.
    pub fn evaluate(&self, entry: &CatalogEntry) -> Result<Candidate, Rejection> {
        let ra = entry.ra.as_arcseconds();
        let dec = entry.dec.as_arcseconds();
        if !self.region.contains_with_margin(ra, dec, self.margin) {
            return Err(Rejection::OutsideMargin);
        }

        let flux = self.flux_for_magnitude(entry.i_ab);
        if !(flux > 0.5 * self.isophote_cut) {
            return Err(Rejection::TooFaint);
        }

        let hlr = entry.disk_hlr_arcsec;
        if !(hlr > 0.0) {
            return Err(Rejection::NonPositiveRadius);
        }

        let (a, b) = (entry.disk_major_arcsec, entry.disk_minor_arcsec);
        if !(a > 0.0 && b > 0.0 && a.is_finite() && b.is_finite()) {
            return Err(Rejection::DegenerateShape);
        }
        let q = entry.axis_ratio();
        let beta = entry.disk_position_angle.as_radians();

        let shear = ShearEllipse::from_axis_ratio(q, beta);
        let extents = isophote_extents(flux, hlr, &shear, self.f0)
            .ok_or(Rejection::BelowIsophote)?
            .dilated(psf_padding(self.padding.as_ref(), flux));

        let placement = StampPlacement::locate(
            &self.region,
            ra,
            dec,
            (extents.half_width, extents.half_height),
            self.pixel_scale,
        );
        if !placement.bounds.overlaps(&self.field) {
            return Err(Rejection::NoFieldOverlap);
        }

        Ok(Candidate {
            flux: flux * self.exposure_scale,
            half_light_radius: hlr,
            axis_ratio: q,
            position_angle: beta,
            extents,
            placement,
        })
    }

    /// Bounds of the field in pixel coordinates
    pub fn field_bounds(&self) -> StampBounds {
        self.field
    }
}
