//! Output archive boundary
//!
//! The pipeline hands every accepted object's stamp cube to an
//! [`ArchiveSink`] as soon as it is composited, then the finished field
//! images. [`MemoryArchive`] keeps everything in memory; the FITS writer
//! lives in [`crate::io::fits`].

use std::path::PathBuf;

use ndarray::{Array2, Array3, Axis};
use thiserror::Error;

use crate::field::FieldImage;
use crate::stamp::StampBounds;

/// Errors raised while archiving results
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("FITS error: {0}")]
    Fits(#[from] fitsio::errors::Error),
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stamp cube has no planes")]
    EmptyCube,
    #[error("plane {plane} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        plane: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("HDU {0} is not an image")]
    NotAnImage(usize),
    #[error("cannot reshape image data: {0}")]
    Reshape(String),
    #[error("archive already finished")]
    Finished,
}

/// Which version of the field image is being written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Sum of nominal stamps
    Noiseless,
    /// Noiseless field plus sky-limited photon noise
    Noisy,
}

impl FieldKind {
    /// File name suffix used for this field
    pub fn suffix(&self) -> &'static str {
        match self {
            FieldKind::Noiseless => "field",
            FieldKind::Noisy => "noise",
        }
    }
}

/// Stack of same-shaped planes for one accepted object
///
/// Plane order: render without PSF, nominal render, then partial derivatives.
#[derive(Debug, Clone, PartialEq)]
pub struct StampCube {
    /// 1-based position among accepted objects
    pub index: usize,
    /// Catalog row the object came from
    pub row: usize,
    /// Stamp rectangle in field pixel coordinates
    pub bounds: StampBounds,
    planes: Vec<Array2<f64>>,
}

impl StampCube {
    /// Build a cube, checking every plane matches the stamp shape
    pub fn new(
        index: usize,
        row: usize,
        bounds: StampBounds,
        planes: Vec<Array2<f64>>,
    ) -> Result<Self, ArchiveError> {
        if planes.is_empty() {
            return Err(ArchiveError::EmptyCube);
        }
        let expected = bounds.shape();
        for (plane, image) in planes.iter().enumerate() {
            if image.dim() != expected {
                return Err(ArchiveError::ShapeMismatch {
                    plane,
                    expected,
                    found: image.dim(),
                });
            }
        }

        Ok(Self {
            index,
            row,
            bounds,
            planes,
        })
    }

    pub fn planes(&self) -> &[Array2<f64>] {
        &self.planes
    }

    pub fn num_planes(&self) -> usize {
        self.planes.len()
    }

    /// Render without PSF
    pub fn without_psf(&self) -> &Array2<f64> {
        &self.planes[0]
    }

    /// Render with PSF and pixel response, `None` for single-plane cubes
    pub fn nominal(&self) -> Option<&Array2<f64>> {
        self.planes.get(1)
    }

    /// Partial derivative planes, possibly empty
    pub fn partials(&self) -> &[Array2<f64>] {
        self.planes.get(2..).unwrap_or(&[])
    }

    /// Planes stacked along a leading axis, shape `(planes, rows, cols)`
    pub fn to_array3(&self) -> Result<Array3<f64>, ArchiveError> {
        let views: Vec<_> = self.planes.iter().map(|p| p.view()).collect();
        ndarray::stack(Axis(0), &views).map_err(|e| ArchiveError::Reshape(e.to_string()))
    }
}

/// Destination for stamp cubes and field images
pub trait ArchiveSink {
    /// Append one object's cube; called in catalog order
    fn append_cube(&mut self, cube: &StampCube) -> Result<(), ArchiveError>;

    /// Store a finished field image
    fn write_field(&mut self, kind: FieldKind, field: &FieldImage) -> Result<(), ArchiveError>;

    /// Flush and close, returning the files written
    fn finish(&mut self) -> Result<Vec<PathBuf>, ArchiveError>;
}

/// Archive that keeps everything in memory
#[derive(Debug, Default)]
pub struct MemoryArchive {
    pub cubes: Vec<StampCube>,
    pub fields: Vec<(FieldKind, FieldImage)>,
    finished: bool,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently written field of the given kind
    pub fn field(&self, kind: FieldKind) -> Option<&FieldImage> {
        self.fields
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, field)| field)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl ArchiveSink for MemoryArchive {
    fn append_cube(&mut self, cube: &StampCube) -> Result<(), ArchiveError> {
        if self.finished {
            return Err(ArchiveError::Finished);
        }
        self.cubes.push(cube.clone());
        Ok(())
    }

    fn write_field(&mut self, kind: FieldKind, field: &FieldImage) -> Result<(), ArchiveError> {
        if self.finished {
            return Err(ArchiveError::Finished);
        }
        self.fields.push((kind, field.clone()));
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<PathBuf>, ArchiveError> {
        self.finished = true;
        Ok(Vec::new())
    }
}
