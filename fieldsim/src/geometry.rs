//! Isophote-cut bounding boxes for sheared exponential disks
//!
//! An exponential disk of total flux `F` and scale radius `r_s` has surface
//! brightness `F / (2π r_s²) · exp(-r / r_s)`. Cutting at a surface brightness
//! `f0` gives a circular isophote of radius
//!
//! ```text
//! r_cut = -r_s · ln(2π r_s² f0 / (F · detM))
//! ```
//!
//! in the unsheared frame. Under the shear `(gp, gx)` the circle becomes an
//! ellipse whose axis-aligned half extents are
//!
//! ```text
//! half_width  = r_cut · sqrt(((1 + gp)² + gx²) / detM)
//! half_height = r_cut · sqrt(((1 - gp)² + gx²) / detM)
//! ```
//!
//! with `detM = 1 - gp² - gx²`. PSF blurring is accounted for by dilating both
//! extents with a Moffat padding radius. This is not a bound on the convolved
//! isophote, only a conservative additive allowance.

/// Ratio of half-light radius to scale radius for an exponential profile
pub const EXPONENTIAL_HLR_PER_SCALE: f64 = 1.67835;

/// Convert an exponential half-light radius to its scale radius
pub fn exponential_scale_radius(half_light_radius: f64) -> f64 {
    half_light_radius / EXPONENTIAL_HLR_PER_SCALE
}

/// Moffat scale radius `r0` from FWHM and shape parameter beta
pub fn moffat_scale_radius(fwhm: f64, beta: f64) -> f64 {
    0.5 * fwhm / (2f64.powf(1.0 / beta) - 1.0).sqrt()
}

/// Reduced shear describing an elliptical shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShearEllipse {
    /// Shear component along the x axis
    pub gp: f64,
    /// Shear component along the diagonal
    pub gx: f64,
}

impl ShearEllipse {
    /// Shear that turns a circle into an ellipse of axis ratio `q` at `position_angle` (radians)
    pub fn from_axis_ratio(q: f64, position_angle: f64) -> Self {
        let g = (1.0 - q) / (1.0 + q);
        Self {
            gp: g * (2.0 * position_angle).cos(),
            gx: g * (2.0 * position_angle).sin(),
        }
    }

    /// Shear magnitude |g|
    pub fn magnitude(&self) -> f64 {
        self.gp.hypot(self.gx)
    }

    /// Determinant `1 - gp² - gx²`; positive for any axis ratio `q > 0`
    pub fn det_m(&self) -> f64 {
        1.0 - self.gp * self.gp - self.gx * self.gx
    }
}

/// Isophote radius and its shear-transformed axis-aligned half extents, arcseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsophoteBox {
    /// Isophote radius in the unsheared frame
    pub r_cut: f64,
    pub half_width: f64,
    pub half_height: f64,
}

impl IsophoteBox {
    /// Grow both half extents by `padding`
    pub fn dilated(&self, padding: f64) -> Self {
        Self {
            r_cut: self.r_cut,
            half_width: self.half_width + padding,
            half_height: self.half_height + padding,
        }
    }
}

/// Solve for the isophote box of an exponential disk.
///
/// # Arguments
/// * `flux` - Total flux (ADU)
/// * `half_light_radius` - Disk half-light radius (arcsec)
/// * `shear` - Intrinsic shape of the disk
/// * `f0` - Surface brightness cut (ADU / arcsec²)
///
/// # Returns
/// `None` when the disk never reaches `f0` (`r_cut <= 0`), or when the
/// inputs are degenerate (non-positive flux, radius or `detM`).
pub fn isophote_extents(
    flux: f64,
    half_light_radius: f64,
    shear: &ShearEllipse,
    f0: f64,
) -> Option<IsophoteBox> {
    let det_m = shear.det_m();
    if !(flux > 0.0) || !(half_light_radius > 0.0) || !(det_m > 0.0) || !(f0 > 0.0) {
        return None;
    }

    let r_cut = isophote_cut_radius(flux, half_light_radius, det_m, f0);
    if !(r_cut > 0.0) || !r_cut.is_finite() {
        return None;
    }

    let (gp, gx) = (shear.gp, shear.gx);
    Some(IsophoteBox {
        r_cut,
        half_width: r_cut * (((1.0 + gp) * (1.0 + gp) + gx * gx) / det_m).sqrt(),
        half_height: r_cut * (((1.0 - gp) * (1.0 - gp) + gx * gx) / det_m).sqrt(),
    })
}

/// Raw isophote radius; zero or negative when the disk peak is below `f0`.
///
/// Callers must ensure `flux > 0` and `det_m > 0`.
pub fn isophote_cut_radius(flux: f64, half_light_radius: f64, det_m: f64, f0: f64) -> f64 {
    let r_scale = exponential_scale_radius(half_light_radius);
    let x = 2.0 * std::f64::consts::PI * r_scale * r_scale * f0 / (flux * det_m);
    -r_scale * x.ln()
}

/// Padding radius accounting for Moffat PSF wings
///
/// The radius at which a Moffat profile carrying the source's full flux drops
/// to the surface brightness cut:
///
/// ```text
/// r_pad = r0 · sqrt((c / F)^(-1/β) - 1),   c = π f0 r0² / (β - 1)
/// ```
///
/// and zero when the root's argument is not positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoffatPadding {
    r0: f64,
    beta: f64,
    c: f64,
}

impl MoffatPadding {
    /// Padding model for a Moffat PSF; `None` when there is no PSF (`fwhm <= 0`)
    pub fn new(fwhm: f64, beta: f64, f0: f64) -> Option<Self> {
        if !(fwhm > 0.0) || !(beta > 1.0) || !(f0 > 0.0) {
            return None;
        }
        let r0 = moffat_scale_radius(fwhm, beta);
        let c = std::f64::consts::PI * f0 * r0 * r0 / (beta - 1.0);
        Some(Self { r0, beta, c })
    }

    /// Padding radius in arcseconds for a source of total `flux`
    pub fn padding_radius(&self, flux: f64) -> f64 {
        if !(flux > 0.0) {
            return 0.0;
        }
        // (c/F)^(-1/β) written as (F/c)^(1/β)
        let arg = (flux / self.c).powf(1.0 / self.beta) - 1.0;
        if arg > 0.0 {
            self.r0 * arg.sqrt()
        } else {
            0.0
        }
    }
}

/// Padding for an optional PSF
pub fn psf_padding(padding: Option<&MoffatPadding>, flux: f64) -> f64 {
    padding.map_or(0.0, |p| p.padding_radius(flux))
}
