//! Shared helpers for fieldsim integration tests
#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Mutex;

use fieldsim::catalog::columns;
use fieldsim::render::{MoffatPsf, PixelResponse};
use fieldsim::{
    AbortFlag, CatalogReader, RenderEngine, RenderError, RenderParameters, SimulationConfig,
    StampBounds,
};
use ndarray::Array2;

/// Header line naming every required column
pub fn header() -> String {
    (0..columns::REQUIRED)
        .map(|i| format!("col{i}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Catalog line with position in arcseconds and the disk columns set
pub fn catalog_line(ra_arcsec: f64, dec_arcsec: f64, hlr: f64, a: f64, b: f64, i_ab: f64) -> String {
    let mut fields = vec!["0".to_string(); columns::REQUIRED];
    fields[columns::RA] = (ra_arcsec / 3600.0).to_string();
    fields[columns::DEC] = (dec_arcsec / 3600.0).to_string();
    fields[columns::DISK_HLR] = hlr.to_string();
    fields[columns::DISK_POSITION_ANGLE] = "25".to_string();
    fields[columns::DISK_MAJOR_AXIS] = a.to_string();
    fields[columns::DISK_MINOR_AXIS] = b.to_string();
    fields[columns::R_AB] = i_ab.to_string();
    fields[columns::I_AB] = i_ab.to_string();
    fields.join(" ")
}

/// In-memory catalog reader over the given data lines
pub fn catalog(lines: &[String]) -> CatalogReader<Cursor<String>> {
    let mut text = header();
    for line in lines {
        text.push('\n');
        text.push_str(line);
    }
    text.push('\n');
    CatalogReader::new(Cursor::new(text)).unwrap()
}

/// Small noiseless field centered on the origin, no PSF
pub fn small_config() -> SimulationConfig {
    SimulationConfig {
        center_ra_arcsec: 0.0,
        center_dec_arcsec: 0.0,
        width: 40,
        height: 40,
        margin_arcmin: 0.5,
        psf_fwhm: 0.0,
        sky_level: 0.0,
        batch_size: 2,
        ..Default::default()
    }
}

/// Spreads the flux evenly over the stamp
pub struct UniformEngine;

impl RenderEngine for UniformEngine {
    fn render(
        &self,
        params: &RenderParameters,
        _psf: Option<&MoffatPsf>,
        _pixel: &PixelResponse,
        bounds: &StampBounds,
    ) -> Result<Array2<f64>, RenderError> {
        Ok(Array2::from_elem(
            bounds.shape(),
            params.flux / bounds.area() as f64,
        ))
    }
}

/// Smooth, non-linear function of every perturbed parameter
pub struct PolynomialEngine;

impl PolynomialEngine {
    pub fn value(params: &RenderParameters, row: usize, col: usize) -> f64 {
        let (r, c) = (row as f64, col as f64);
        params.half_light_radius.powi(3) * (1.0 + r)
            + (params.xc * 3.0).sin() * (1.0 + c)
            + params.yc * params.yc
            + params.g1.exp()
            - params.g2.powi(4)
    }
}

impl RenderEngine for PolynomialEngine {
    fn render(
        &self,
        params: &RenderParameters,
        _psf: Option<&MoffatPsf>,
        _pixel: &PixelResponse,
        bounds: &StampBounds,
    ) -> Result<Array2<f64>, RenderError> {
        Ok(Array2::from_shape_fn(bounds.shape(), |(r, c)| {
            Self::value(params, r, c)
        }))
    }
}

/// Records every call before delegating
pub struct RecordingEngine<E> {
    pub inner: E,
    pub calls: Mutex<Vec<(RenderParameters, bool)>>,
}

impl<E> RecordingEngine<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Parameters of every call, with whether a PSF was supplied
    pub fn calls(&self) -> Vec<(RenderParameters, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

impl<E: RenderEngine> RenderEngine for RecordingEngine<E> {
    fn render(
        &self,
        params: &RenderParameters,
        psf: Option<&MoffatPsf>,
        pixel: &PixelResponse,
        bounds: &StampBounds,
    ) -> Result<Array2<f64>, RenderError> {
        self.calls.lock().unwrap().push((*params, psf.is_some()));
        self.inner.render(params, psf, pixel, bounds)
    }
}

/// Raises an abort flag on its first render
pub struct AbortingEngine {
    pub flag: AbortFlag,
}

impl RenderEngine for AbortingEngine {
    fn render(
        &self,
        params: &RenderParameters,
        psf: Option<&MoffatPsf>,
        pixel: &PixelResponse,
        bounds: &StampBounds,
    ) -> Result<Array2<f64>, RenderError> {
        self.flag.raise();
        UniformEngine.render(params, psf, pixel, bounds)
    }
}

/// Always fails
pub struct FailingEngine;

impl RenderEngine for FailingEngine {
    fn render(
        &self,
        _params: &RenderParameters,
        _psf: Option<&MoffatPsf>,
        _pixel: &PixelResponse,
        bounds: &StampBounds,
    ) -> Result<Array2<f64>, RenderError> {
        Err(RenderError::EmptyStamp(*bounds))
    }
}

/// Returns a single pixel whatever the stamp size
pub struct WrongShapeEngine;

impl RenderEngine for WrongShapeEngine {
    fn render(
        &self,
        params: &RenderParameters,
        _psf: Option<&MoffatPsf>,
        _pixel: &PixelResponse,
        _bounds: &StampBounds,
    ) -> Result<Array2<f64>, RenderError> {
        Ok(Array2::from_elem((1, 1), params.flux))
    }
}
