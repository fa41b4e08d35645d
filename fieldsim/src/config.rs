//! Simulation configuration and command-line arguments
//!
//! `SimulationConfig` is the validated, serializable description of one run.
//! `RenderCatalogArgs` is its command-line face; flag names and defaults
//! follow the survey setup the simulator was built for (0.2"/px, 512x512
//! field, 230 visits).

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::partials::{FiniteDifferenceOrder, SHEAR_STEP};
use crate::stamp::SkyRegion;
use crate::units::{Angle, AngleExt};

/// One visit is a pair of exposures
pub const EXPOSURES_PER_VISIT: f64 = 2.0;

/// Configuration errors, all fatal before any rendering starts
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("partials order must be an integer 1-4, got {0}")]
    InvalidPartialsOrder(u8),
    #[error("pixel scale must be positive, got {0}")]
    InvalidPixelScale(f64),
    #[error("field dimensions must be non-zero, got {width}x{height}")]
    EmptyField { width: usize, height: usize },
    #[error("margin must be non-negative, got {0} arcmin")]
    NegativeMargin(f64),
    #[error("PSF FWHM must be non-negative, got {0}")]
    InvalidPsfFwhm(f64),
    #[error("Moffat beta must exceed 1, got {0}")]
    InvalidPsfBeta(f64),
    #[error("isophote cut must be positive, got {0}")]
    InvalidIsophoteCut(f64),
    #[error("{name} must be non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("constant shear |g| must be below 1, got ({g1}, {g2})")]
    InvalidShear { g1: f64, g2: f64 },
    #[error("shear ({g1}, {g2}) leaves no room for order {order} shear partials")]
    ShearStencilOutOfRange { g1: f64, g2: f64, order: u8 },
    #[error("{name} must be at least 1")]
    ZeroCount { name: &'static str },
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Full description of a field simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Field center right ascension in arcseconds
    pub center_ra_arcsec: f64,
    /// Field center declination in arcseconds
    pub center_dec_arcsec: f64,
    /// Field width in pixels
    pub width: usize,
    /// Field height in pixels
    pub height: usize,
    /// Margin around the field where objects may still leak in (arcmin)
    pub margin_arcmin: f64,
    /// Pixel scale in arcsec/pixel
    pub pixel_scale: f64,
    /// PSF full-width-half-max in arcsec, zero disables the PSF
    pub psf_fwhm: f64,
    /// Moffat shape parameter
    pub psf_beta: f64,
    /// Total flux in ADU of an AB magnitude 24 object
    pub flux_norm: f64,
    /// Number of visits to simulate
    pub nvisits: u32,
    /// Average sky level per pixel per exposure (ADU)
    pub sky_level: f64,
    /// Constant shear applied to every object
    pub g1: f64,
    pub g2: f64,
    /// Compute finite-difference partial derivatives
    pub partials: bool,
    /// Finite difference order (1-4)
    pub partials_order: u8,
    /// Surface brightness isophote to cut stamps at, ADU per pixel
    pub isophote_cut: f64,
    /// Seed for the noise realization
    pub noise_seed: u64,
    /// Malformed catalog rows tolerated before giving up
    pub max_bad_rows: usize,
    /// Catalog rows rendered per parallel batch
    pub batch_size: usize,
    /// Sub-pixel oversampling for PSF-convolved renders
    pub psf_oversample: usize,
    /// Sub-pixel oversampling for renders without PSF
    pub real_space_oversample: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            center_ra_arcsec: 409.6,
            center_dec_arcsec: -409.6,
            width: 512,
            height: 512,
            margin_arcmin: 10.0,
            pixel_scale: 0.2,
            psf_fwhm: 0.7,
            psf_beta: 3.0,
            flux_norm: 711.0,
            nvisits: 230,
            sky_level: 780.778,
            g1: 0.0,
            g2: 0.0,
            partials: false,
            partials_order: 1,
            isophote_cut: 2.0,
            noise_seed: 123,
            max_bad_rows: 10,
            batch_size: 64,
            psf_oversample: 3,
            real_space_oversample: 7,
        }
    }
}

impl SimulationConfig {
    /// Check every option, returning the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        let order = self.finite_difference_order()?;

        if !(self.pixel_scale > 0.0) || !self.pixel_scale.is_finite() {
            return Err(ConfigError::InvalidPixelScale(self.pixel_scale));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyField {
                width: self.width,
                height: self.height,
            });
        }
        if !(self.margin_arcmin >= 0.0) {
            return Err(ConfigError::NegativeMargin(self.margin_arcmin));
        }
        if !(self.psf_fwhm >= 0.0) {
            return Err(ConfigError::InvalidPsfFwhm(self.psf_fwhm));
        }
        if self.psf_fwhm > 0.0 && !(self.psf_beta > 1.0) {
            return Err(ConfigError::InvalidPsfBeta(self.psf_beta));
        }
        for (name, value) in [
            ("sky level", self.sky_level),
            ("flux normalization", self.flux_norm),
        ] {
            if !(value >= 0.0) {
                return Err(ConfigError::Negative { name, value });
            }
        }
        if !(self.isophote_cut > 0.0) || !self.isophote_cut.is_finite() {
            return Err(ConfigError::InvalidIsophoteCut(self.isophote_cut));
        }
        if !(self.g1 * self.g1 + self.g2 * self.g2 < 1.0) {
            return Err(ConfigError::InvalidShear {
                g1: self.g1,
                g2: self.g2,
            });
        }
        // Shear partials render at g ± k·SHEAR_STEP, which must stay below |g| = 1
        if let Some(order) = order {
            let reach = self.g1.hypot(self.g2) + f64::from(order.get()) * SHEAR_STEP;
            if !(reach < 1.0) {
                return Err(ConfigError::ShearStencilOutOfRange {
                    g1: self.g1,
                    g2: self.g2,
                    order: order.get(),
                });
            }
        }
        for (name, value) in [
            ("batch size", self.batch_size),
            ("PSF oversampling", self.psf_oversample),
            ("real-space oversampling", self.real_space_oversample),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroCount { name });
            }
        }

        Ok(())
    }

    /// Finite difference order when partials are enabled
    pub fn finite_difference_order(&self) -> Result<Option<FiniteDifferenceOrder>, ConfigError> {
        if !self.partials {
            return Ok(None);
        }
        FiniteDifferenceOrder::new(self.partials_order).map(Some)
    }

    /// Sky rectangle covered by the field, in arcseconds
    pub fn sky_region(&self) -> SkyRegion {
        let half_width = 0.5 * self.width as f64 * self.pixel_scale;
        let half_height = 0.5 * self.height as f64 * self.pixel_scale;
        SkyRegion {
            ra_min: self.center_ra_arcsec - half_width,
            ra_max: self.center_ra_arcsec + half_width,
            dec_min: self.center_dec_arcsec - half_height,
            dec_max: self.center_dec_arcsec + half_height,
        }
    }

    /// Margin in arcseconds
    pub fn margin_arcsec(&self) -> f64 {
        Angle::from_arcminutes(self.margin_arcmin).as_arcseconds()
    }

    /// Isophote cut expressed as surface brightness, ADU per square arcsecond
    pub fn surface_brightness_cut(&self) -> f64 {
        self.isophote_cut / (self.pixel_scale * self.pixel_scale)
    }

    /// Factor converting single-exposure flux to the stacked exposure
    pub fn exposure_scale(&self) -> f64 {
        EXPOSURES_PER_VISIT * self.nvisits as f64
    }

    /// Sky level of the stacked exposure, per pixel
    pub fn stacked_sky_level(&self) -> f64 {
        self.exposure_scale() * self.sky_level
    }

    /// Load a configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Save the configuration as pretty-printed JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Command-line arguments for rendering a catalog into a field
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Render a galaxy catalog into a simulated field image")]
pub struct RenderCatalogArgs {
    /// Name of input catalog to read
    #[arg(short, long, default_value = "gcat.dat")]
    pub input: PathBuf,

    /// Base name of output files to write
    #[arg(short, long, default_value = "catout")]
    pub output: String,

    /// Load the full simulation configuration from a JSON file instead of flags
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Central RA of the image in arcsec
    #[arg(long, default_value_t = 409.6, allow_negative_numbers = true)]
    pub center_ra: f64,

    /// Central DEC of the image in arcsec
    #[arg(long, default_value_t = -409.6, allow_negative_numbers = true)]
    pub center_dec: f64,

    /// Image width in pixels
    #[arg(long, default_value_t = 512)]
    pub width: usize,

    /// Image height in pixels
    #[arg(long, default_value_t = 512)]
    pub height: usize,

    /// Size of surrounding margin where objects might leak into image (arcmin)
    #[arg(long, default_value_t = 10.0)]
    pub margin: f64,

    /// Pixel scale (arcsec/pixel)
    #[arg(long, default_value_t = 0.2)]
    pub pixel_scale: f64,

    /// PSF full-width-half-max in arcsec (0 disables the PSF)
    #[arg(long, default_value_t = 0.7)]
    pub psf_fwhm: f64,

    /// PSF Moffat parameter beta
    #[arg(long, default_value_t = 3.0)]
    pub psf_beta: f64,

    /// Total flux in ADU for a typical galaxy of AB mag 24
    #[arg(long, default_value_t = 711.0)]
    pub flux_norm: f64,

    /// Number of visits to simulate
    #[arg(long, default_value_t = 230)]
    pub nvisits: u32,

    /// Average sky level to simulate (ADU/pixel)
    #[arg(long, default_value_t = 780.778)]
    pub sky_level: f64,

    /// Constant shear component g1 to apply
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub g1: f64,

    /// Constant shear component g2 to apply
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub g2: f64,

    /// Calculate and save partial derivatives with respect to object parameters
    #[arg(long, default_value_t = false)]
    pub partials: bool,

    /// Order of finite difference equation to use for evaluating partials
    #[arg(long, default_value_t = 1)]
    pub partials_order: u8,

    /// Surface brightness isophote to cut stamps at (ADU/pixel)
    #[arg(long, default_value_t = 2.0)]
    pub isophote_cut: f64,

    /// Seed for the noise realization
    #[arg(long, default_value_t = 123)]
    pub noise_seed: u64,

    /// Malformed catalog rows to skip before aborting
    #[arg(long, default_value_t = 10)]
    pub max_bad_rows: usize,

    /// Catalog rows rendered per parallel batch
    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,
}

impl RenderCatalogArgs {
    /// Build the simulation configuration, from `--config` when given
    pub fn to_config(&self) -> Result<SimulationConfig, ConfigError> {
        let config = match &self.config {
            Some(path) => SimulationConfig::load_from_file(path)?,
            None => SimulationConfig {
                center_ra_arcsec: self.center_ra,
                center_dec_arcsec: self.center_dec,
                width: self.width,
                height: self.height,
                margin_arcmin: self.margin,
                pixel_scale: self.pixel_scale,
                psf_fwhm: self.psf_fwhm,
                psf_beta: self.psf_beta,
                flux_norm: self.flux_norm,
                nvisits: self.nvisits,
                sky_level: self.sky_level,
                g1: self.g1,
                g2: self.g2,
                partials: self.partials,
                partials_order: self.partials_order,
                isophote_cut: self.isophote_cut,
                noise_seed: self.noise_seed,
                max_bad_rows: self.max_bad_rows,
                batch_size: self.batch_size,
                ..SimulationConfig::default()
            },
        };
        config.validate()?;
        Ok(config)
    }
}
