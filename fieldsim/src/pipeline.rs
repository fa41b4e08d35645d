//! Catalog-to-field rendering pipeline
//!
//! Rows are pulled from the catalog in batches. Each batch is rendered in
//! parallel with rayon, then composited into the field and appended to the
//! archive on the calling thread in catalog order, so the output does not
//! depend on thread scheduling.
//!
//! The abort flag is checked between batches: raising it lets the batch in
//! flight finish and be composited, after which the field is finalized and
//! written as usual.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use ndarray::Array2;
use rayon::prelude::*;
use thiserror::Error;

use crate::archive::{ArchiveError, ArchiveSink, FieldKind, StampCube};
use crate::catalog::{CatalogError, CatalogRow};
use crate::config::{ConfigError, SimulationConfig};
use crate::eligibility::{Candidate, EligibilityFilter, Rejection};
use crate::field::FieldImage;
use crate::partials::PartialsEngine;
use crate::render::{
    MoffatPsf, PixelResponse, RenderEngine, RenderError, RenderParameters, SampledEngine,
    SourceRenderer,
};

/// Errors that stop a run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("rendering row {row} failed: {source}")]
    Render {
        row: usize,
        #[source]
        source: RenderError,
    },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("more than {limit} malformed catalog rows, last: {last}")]
    TooManyBadRows { limit: usize, last: CatalogError },
}

/// Shared stop request, safe to raise from any thread
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the pipeline to stop after the batch in flight
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counts and outputs of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Data rows pulled from the catalog, malformed ones included
    pub rows_read: usize,
    pub accepted: usize,
    pub rejections: BTreeMap<Rejection, usize>,
    /// Malformed rows skipped
    pub bad_rows: usize,
    pub aborted: bool,
    /// Files reported by the archive
    pub files: Vec<PathBuf>,
}

impl RunSummary {
    pub fn rejected(&self) -> usize {
        self.rejections.values().sum()
    }

    pub fn rejections_for(&self, reason: Rejection) -> usize {
        self.rejections.get(&reason).copied().unwrap_or(0)
    }

    fn log(&self) {
        info!(
            "read {} rows: {} accepted, {} rejected, {} malformed{}",
            self.rows_read,
            self.accepted,
            self.rejected(),
            self.bad_rows,
            if self.aborted { " (aborted)" } else { "" }
        );
        for (reason, count) in &self.rejections {
            info!("  {reason}: {count}");
        }
    }
}

/// A rendered object before it is numbered and archived
#[derive(Debug, Clone)]
pub struct RenderedObject {
    pub row: usize,
    pub candidate: Candidate,
    pub params: RenderParameters,
    /// Without PSF, nominal, then partials
    pub planes: Vec<Array2<f64>>,
}

/// Result of processing one catalog row
#[derive(Debug, Clone)]
pub enum RowOutcome {
    Accepted(RenderedObject),
    Rejected(Rejection),
}

/// Renders catalog rows into a field and a stream of stamp cubes
pub struct Pipeline<E> {
    config: SimulationConfig,
    filter: EligibilityFilter,
    renderer: SourceRenderer<E>,
    partials: Option<PartialsEngine>,
    abort: AbortFlag,
}

impl Pipeline<SampledEngine> {
    /// Pipeline using the built-in sampling engine
    pub fn from_config(config: SimulationConfig) -> Result<Self, PipelineError> {
        let engine = SampledEngine::new(config.psf_oversample, config.real_space_oversample);
        Self::new(config, engine)
    }
}

impl<E: RenderEngine> Pipeline<E> {
    /// Validate the configuration and bind the engine to the instrument response
    pub fn new(config: SimulationConfig, engine: E) -> Result<Self, PipelineError> {
        config.validate()?;

        let psf = MoffatPsf::new(config.psf_fwhm, config.psf_beta);
        let renderer = SourceRenderer::new(engine, psf, PixelResponse::new(config.pixel_scale));
        let partials = config
            .finite_difference_order()?
            .map(|order| PartialsEngine::new(order, config.pixel_scale));

        Ok(Self {
            filter: EligibilityFilter::new(&config),
            config,
            renderer,
            partials,
            abort: AbortFlag::new(),
        })
    }

    /// Use an externally owned abort flag
    pub fn with_abort(mut self, abort: AbortFlag) -> Self {
        self.abort = abort;
        self
    }

    pub fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn renderer(&self) -> &SourceRenderer<E> {
        &self.renderer
    }

    /// Gate, place and render one row. Touches no shared state.
    pub fn process_row(&self, row: &CatalogRow) -> Result<RowOutcome, RenderError> {
        let candidate = match self.filter.evaluate(&row.entry) {
            Ok(candidate) => candidate,
            Err(reason) => return Ok(RowOutcome::Rejected(reason)),
        };

        let params = RenderParameters::from_candidate(&candidate, self.config.g1, self.config.g2);
        let bounds = candidate.placement.bounds;

        let mut planes = vec![
            self.renderer.render_without_psf(&params, &bounds)?,
            self.renderer.render_nominal(&params, &bounds)?,
        ];
        if let Some(partials) = &self.partials {
            planes.extend(partials.compute(&self.renderer, &params, &bounds)?);
        }

        Ok(RowOutcome::Accepted(RenderedObject {
            row: row.row,
            candidate,
            params,
            planes,
        }))
    }

    /// Pull the next batch of well-formed rows, skipping malformed ones.
    ///
    /// Returns `true` once the catalog is exhausted.
    fn fill_batch<I>(
        &self,
        rows: &mut I,
        batch: &mut Vec<CatalogRow>,
        summary: &mut RunSummary,
    ) -> Result<bool, PipelineError>
    where
        I: Iterator<Item = Result<CatalogRow, CatalogError>>,
    {
        batch.clear();
        while batch.len() < self.config.batch_size {
            match rows.next() {
                None => return Ok(true),
                Some(Ok(row)) => {
                    summary.rows_read += 1;
                    batch.push(row);
                }
                Some(Err(err)) if err.is_malformed_row() => {
                    summary.rows_read += 1;
                    summary.bad_rows += 1;
                    if summary.bad_rows > self.config.max_bad_rows {
                        return Err(PipelineError::TooManyBadRows {
                            limit: self.config.max_bad_rows,
                            last: err,
                        });
                    }
                    warn!("skipping malformed catalog row: {err}");
                }
                Some(Err(err)) => return Err(err.into()),
            }
        }
        Ok(false)
    }

    /// Render every row into `archive` and write the field images.
    ///
    /// The noisy field is only produced when the sky level is positive.
    pub fn run<I, A>(&self, rows: I, archive: &mut A) -> Result<RunSummary, PipelineError>
    where
        I: IntoIterator<Item = Result<CatalogRow, CatalogError>>,
        A: ArchiveSink + ?Sized,
    {
        let mut rows = rows.into_iter();
        let mut field = FieldImage::new(self.config.width, self.config.height);
        let mut summary = RunSummary::default();
        let mut batch = Vec::with_capacity(self.config.batch_size);

        loop {
            if self.abort.is_raised() {
                warn!("abort requested, finalizing field after {} rows", summary.rows_read);
                summary.aborted = true;
                break;
            }

            let exhausted = self.fill_batch(&mut rows, &mut batch, &mut summary)?;

            let outcomes: Vec<Result<RowOutcome, RenderError>> =
                batch.par_iter().map(|row| self.process_row(row)).collect();

            for (row, outcome) in batch.iter().zip(outcomes) {
                let outcome = outcome.map_err(|source| PipelineError::Render {
                    row: row.row,
                    source,
                })?;
                match outcome {
                    RowOutcome::Rejected(reason) => {
                        debug!("row {} rejected: {reason}", row.row);
                        *summary.rejections.entry(reason).or_insert(0) += 1;
                    }
                    RowOutcome::Accepted(object) => {
                        summary.accepted += 1;
                        self.composite(summary.accepted, object, &mut field, archive)?;
                    }
                }
            }

            if exhausted {
                break;
            }
        }

        archive.write_field(FieldKind::Noiseless, &field)?;
        if self.config.sky_level > 0.0 {
            let noisy = field.with_sky_noise(self.config.stacked_sky_level(), self.config.noise_seed);
            archive.write_field(FieldKind::Noisy, &noisy)?;
        }
        summary.files = archive.finish()?;

        summary.log();
        Ok(summary)
    }

    fn composite<A>(
        &self,
        index: usize,
        object: RenderedObject,
        field: &mut FieldImage,
        archive: &mut A,
    ) -> Result<(), PipelineError>
    where
        A: ArchiveSink + ?Sized,
    {
        let bounds = object.candidate.placement.bounds;
        info!(
            "rendering stamp {} (row {}) with w x h = {} x {}",
            index,
            object.row,
            bounds.width(),
            bounds.height()
        );

        // Shapes are checked before anything reaches the field
        let cube = StampCube::new(index, object.row, bounds, object.planes)?;
        if let Some(nominal) = cube.nominal() {
            field.add_stamp(&nominal.view(), &cube.bounds);
        }
        archive.append_cube(&cube)?;
        Ok(())
    }
}
