//! Source rendering
//!
//! [`RenderEngine`] is the narrow boundary to whatever turns an analytic
//! source, an optional PSF and the pixel response into sampled pixels.
//! [`SampledEngine`] is the built-in implementation; tests substitute their
//! own engines to observe exactly what the pipeline asks for.

pub mod engine;
pub mod profile;
pub mod psf;

use ndarray::Array2;
use shared::algo::SingularMatrixError;
use thiserror::Error;

use crate::eligibility::Candidate;
use crate::stamp::StampBounds;

pub use engine::SampledEngine;
pub use profile::{ExponentialDisk, SourceTransform, TransformedSource};
pub use psf::{MoffatPsf, PixelResponse};

/// Failures inside a render engine
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("shear |g| must be below 1, got ({g1}, {g2})")]
    InvalidShear { g1: f64, g2: f64 },
    #[error("axis ratio must be positive, got {0}")]
    InvalidAxisRatio(f64),
    #[error("source transform is singular: {0}")]
    SingularTransform(#[from] SingularMatrixError),
    #[error("cannot render into empty stamp {0:?}")]
    EmptyStamp(StampBounds),
}

/// Everything that describes one source to the renderer
///
/// Offsets and radii are in arcseconds, the position angle in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParameters {
    pub flux: f64,
    /// Offset of the source center from the stamp's central pixel center
    pub xc: f64,
    pub yc: f64,
    pub half_light_radius: f64,
    pub axis_ratio: f64,
    pub position_angle: f64,
    /// Constant lensing shear
    pub g1: f64,
    pub g2: f64,
}

impl RenderParameters {
    /// Parameters for an accepted candidate under a constant shear
    pub fn from_candidate(candidate: &Candidate, g1: f64, g2: f64) -> Self {
        Self {
            flux: candidate.flux,
            xc: candidate.placement.shift.0,
            yc: candidate.placement.shift.1,
            half_light_radius: candidate.half_light_radius,
            axis_ratio: candidate.axis_ratio,
            position_angle: candidate.position_angle,
            g1,
            g2,
        }
    }
}

/// Turns source parameters into pixels over a stamp
///
/// Implementations must return an array of shape `bounds.shape()` with row 0
/// at `bounds.ymin`, and must not depend on any state shared between calls.
pub trait RenderEngine: Send + Sync {
    fn render(
        &self,
        params: &RenderParameters,
        psf: Option<&MoffatPsf>,
        pixel: &PixelResponse,
        bounds: &StampBounds,
    ) -> Result<Array2<f64>, RenderError>;
}

impl<E: RenderEngine + ?Sized> RenderEngine for &E {
    fn render(
        &self,
        params: &RenderParameters,
        psf: Option<&MoffatPsf>,
        pixel: &PixelResponse,
        bounds: &StampBounds,
    ) -> Result<Array2<f64>, RenderError> {
        (**self).render(params, psf, pixel, bounds)
    }
}

/// An engine bound to the run's instrument response
pub struct SourceRenderer<E> {
    engine: E,
    psf: Option<MoffatPsf>,
    pixel: PixelResponse,
}

impl<E: RenderEngine> SourceRenderer<E> {
    pub fn new(engine: E, psf: Option<MoffatPsf>, pixel: PixelResponse) -> Self {
        Self { engine, psf, pixel }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn psf(&self) -> Option<&MoffatPsf> {
        self.psf.as_ref()
    }

    pub fn pixel(&self) -> &PixelResponse {
        &self.pixel
    }

    /// Render convolved with the PSF (when there is one) and the pixel
    pub fn render_nominal(
        &self,
        params: &RenderParameters,
        bounds: &StampBounds,
    ) -> Result<Array2<f64>, RenderError> {
        self.engine.render(params, self.psf.as_ref(), &self.pixel, bounds)
    }

    /// Render convolved with the pixel only
    pub fn render_without_psf(
        &self,
        params: &RenderParameters,
        bounds: &StampBounds,
    ) -> Result<Array2<f64>, RenderError> {
        self.engine.render(params, None, &self.pixel, bounds)
    }
}
