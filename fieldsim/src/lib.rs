//! Galaxy catalog field simulation
//!
//! This crate renders a survey field image from a galaxy catalog. Each
//! catalog object is gated on position, brightness and size, given the
//! smallest stamp that holds its light above an isophote cut, rendered with
//! and without the PSF, composited into a shared field, and optionally
//! differentiated with respect to its position, size and shear.

pub mod archive;
pub mod catalog;
pub mod config;
pub mod eligibility;
pub mod field;
pub mod geometry;
pub mod io;
pub mod partials;
pub mod pipeline;
pub mod render;
pub mod stamp;
pub mod units;

// Re-exports for easier access
pub use archive::{ArchiveError, ArchiveSink, FieldKind, MemoryArchive, StampCube};
pub use catalog::{CatalogEntry, CatalogError, CatalogReader, CatalogRow};
pub use config::{ConfigError, RenderCatalogArgs, SimulationConfig};
pub use eligibility::{Candidate, EligibilityFilter, Rejection};
pub use field::FieldImage;
pub use io::fits::FitsArchive;
pub use partials::{FiniteDifferenceOrder, PartialTarget, PartialsEngine};
pub use pipeline::{AbortFlag, Pipeline, PipelineError, RowOutcome, RunSummary};
pub use render::{RenderEngine, RenderError, RenderParameters, SampledEngine, SourceRenderer};
pub use stamp::{SkyRegion, StampBounds, StampPlacement};
