//! FITS archive writer
//!
//! Produces three files from an output prefix:
//! - `<prefix>_field.fits`: noiseless field as the primary image
//! - `<prefix>_noise.fits`: noisy field as the primary image
//! - `<prefix>_stamps.fits`: empty primary HDU followed by one 3-D cube
//!   extension per accepted object
//!
//! Arrays are written in row-major order with FITS dimensions listed slowest
//! axis first, so NAXIS1 is the stamp width. Row 0 is the bottom of the image
//! in both conventions and no flip is applied.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use log::{debug, info};
use ndarray::{Array2, ArrayD, IxDyn};

use crate::archive::{ArchiveError, ArchiveSink, FieldKind, StampCube};
use crate::field::FieldImage;

/// Header values recorded alongside field images
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitsMetadata {
    /// Arcseconds per pixel
    pub pixel_scale: f64,
    pub nvisits: u32,
}

/// Path of the output file with the given suffix: `<prefix>_<suffix>.fits`
pub fn output_path<P: AsRef<Path>>(prefix: P, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_ref().as_os_str());
    name.push(format!("_{suffix}.fits"));
    PathBuf::from(name)
}

fn write_array2(
    fptr: &mut FitsFile,
    hdu: &FitsHdu,
    array: &Array2<f64>,
) -> Result<(), ArchiveError> {
    let flat: Vec<f64> = array.iter().copied().collect();
    hdu.write_image(fptr, &flat)?;
    Ok(())
}

/// Write a single image as the primary HDU of a new file, replacing any existing file
pub fn write_image_file<P: AsRef<Path>>(
    path: P,
    extname: &str,
    image: &Array2<f64>,
    metadata: &FitsMetadata,
) -> Result<(), ArchiveError> {
    let (height, width) = image.dim();
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &[height, width],
    };

    let mut fptr = FitsFile::create(path.as_ref())
        .with_custom_primary(&description)
        .overwrite()
        .open()?;
    let hdu = fptr.primary_hdu()?;
    write_array2(&mut fptr, &hdu, image)?;

    hdu.write_key(&mut fptr, "EXTNAME", extname)?;
    hdu.write_key(&mut fptr, "PIXSCALE", metadata.pixel_scale)?;
    hdu.write_key(&mut fptr, "NVISITS", metadata.nvisits as i64)?;
    Ok(())
}

/// Append a stamp cube as a new image extension
pub fn write_cube(fptr: &mut FitsFile, cube: &StampCube) -> Result<(), ArchiveError> {
    let stacked = cube.to_array3()?;
    let (planes, height, width) = stacked.dim();
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &[planes, height, width],
    };

    let extname = format!("OBJ_{}", cube.index);
    let hdu = fptr.create_image(extname, &description)?;
    let flat: Vec<f64> = stacked.iter().copied().collect();
    hdu.write_image(fptr, &flat)?;

    hdu.write_key(fptr, "ROW", cube.row as i64)?;
    hdu.write_key(fptr, "XMIN", cube.bounds.xmin)?;
    hdu.write_key(fptr, "YMIN", cube.bounds.ymin)?;
    hdu.write_key(fptr, "NPLANES", planes as i64)?;
    Ok(())
}

/// Read an image HDU, shaped slowest axis first
pub fn read_hdu_data<P: AsRef<Path>>(path: P, index: usize) -> Result<ArrayD<f64>, ArchiveError> {
    let mut fptr = FitsFile::open(path.as_ref())?;
    let hdu = fptr.hdu(index)?;
    let shape = match &hdu.info {
        HduInfo::ImageInfo { shape, .. } => shape.clone(),
        _ => return Err(ArchiveError::NotAnImage(index)),
    };
    let data: Vec<f64> = hdu.read_image(&mut fptr)?;
    ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|e| ArchiveError::Reshape(e.to_string()))
}

/// Read an integer header keyword from an HDU
pub fn read_key_i64<P: AsRef<Path>>(path: P, index: usize, key: &str) -> Result<i64, ArchiveError> {
    let mut fptr = FitsFile::open(path.as_ref())?;
    let hdu = fptr.hdu(index)?;
    Ok(hdu.read_key::<i64>(&mut fptr, key)?)
}

/// Streams stamp cubes into `<prefix>_stamps.fits` and writes fields on request
pub struct FitsArchive {
    prefix: PathBuf,
    metadata: FitsMetadata,
    stamps: Option<FitsFile>,
    stamps_path: PathBuf,
    cubes_written: usize,
    written: Vec<PathBuf>,
}

impl FitsArchive {
    /// Create the stamp file immediately so cubes can be appended as they arrive
    pub fn create<P: AsRef<Path>>(prefix: P, metadata: FitsMetadata) -> Result<Self, ArchiveError> {
        let prefix = prefix.as_ref().to_path_buf();
        let stamps_path = output_path(&prefix, "stamps");
        let stamps = FitsFile::create(&stamps_path).overwrite().open()?;
        debug!("opened stamp archive {}", stamps_path.display());

        Ok(Self {
            prefix,
            metadata,
            stamps: Some(stamps),
            stamps_path,
            cubes_written: 0,
            written: Vec::new(),
        })
    }

    pub fn cubes_written(&self) -> usize {
        self.cubes_written
    }
}

impl ArchiveSink for FitsArchive {
    fn append_cube(&mut self, cube: &StampCube) -> Result<(), ArchiveError> {
        let fptr = self.stamps.as_mut().ok_or(ArchiveError::Finished)?;
        write_cube(fptr, cube)?;
        self.cubes_written += 1;
        Ok(())
    }

    fn write_field(&mut self, kind: FieldKind, field: &FieldImage) -> Result<(), ArchiveError> {
        if self.stamps.is_none() {
            return Err(ArchiveError::Finished);
        }
        let path = output_path(&self.prefix, kind.suffix());
        write_image_file(
            &path,
            &kind.suffix().to_uppercase(),
            field.data(),
            &self.metadata,
        )?;
        info!("wrote {}", path.display());
        self.written.push(path);
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<PathBuf>, ArchiveError> {
        // Dropping the handle flushes and closes the file
        if self.stamps.take().is_some() {
            info!(
                "wrote {} ({} stamps)",
                self.stamps_path.display(),
                self.cubes_written
            );
            self.written.push(self.stamps_path.clone());
        }
        Ok(self.written.clone())
    }
}
