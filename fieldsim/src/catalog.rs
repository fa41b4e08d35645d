//! Galaxy catalog reader
//!
//! Reads whitespace-delimited catalog text: one header line naming the
//! fields, then one object per line. Only the disk-component columns used by
//! the renderer are extracted, by fixed position. The reader is a lazy
//! iterator so arbitrarily large catalogs stream row by row.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use thiserror::Error;

use crate::units::{Angle, AngleExt};

/// Column positions (0-based) of the fields the simulator consumes
pub mod columns {
    pub const RA: usize = 1;
    pub const DEC: usize = 2;
    pub const DISK_HLR: usize = 7;
    pub const DISK_POSITION_ANGLE: usize = 9;
    pub const DISK_MAJOR_AXIS: usize = 17;
    pub const DISK_MINOR_AXIS: usize = 19;
    pub const R_AB: usize = 22;
    pub const I_AB: usize = 23;

    /// Minimum number of fields a data row must carry
    pub const REQUIRED: usize = I_AB + 1;
}

/// Errors produced while reading a catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog is empty: missing header line")]
    MissingHeader,
    #[error("row {row}: expected at least {required} fields, found {found}")]
    TooFewColumns {
        row: usize,
        found: usize,
        required: usize,
    },
    #[error("row {row}: column {column} is not a finite number: {value:?}")]
    InvalidNumber {
        row: usize,
        column: usize,
        value: String,
    },
}

impl CatalogError {
    /// True for errors confined to a single row, which a tolerant reader may skip.
    pub fn is_malformed_row(&self) -> bool {
        matches!(
            self,
            CatalogError::TooFewColumns { .. } | CatalogError::InvalidNumber { .. }
        )
    }
}

/// One catalog object, disk component only
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogEntry {
    /// Right ascension
    pub ra: Angle,
    /// Declination
    pub dec: Angle,
    /// Disk half-light radius in arcseconds
    pub disk_hlr_arcsec: f64,
    /// Disk position angle
    pub disk_position_angle: Angle,
    /// Disk major axis length in arcseconds
    pub disk_major_arcsec: f64,
    /// Disk minor axis length in arcseconds
    pub disk_minor_arcsec: f64,
    /// AB magnitude in the r band
    pub r_ab: f64,
    /// AB magnitude in the i band
    pub i_ab: f64,
}

impl CatalogEntry {
    /// Disk axis ratio b/a
    pub fn axis_ratio(&self) -> f64 {
        self.disk_minor_arcsec / self.disk_major_arcsec
    }
}

/// A parsed data row together with its 1-based row number (header excluded)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogRow {
    pub row: usize,
    pub entry: CatalogEntry,
}

/// Parse a single data line into a catalog entry.
pub fn parse_row(line: &str, row: usize) -> Result<CatalogEntry, CatalogError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < columns::REQUIRED {
        return Err(CatalogError::TooFewColumns {
            row,
            found: fields.len(),
            required: columns::REQUIRED,
        });
    }

    let number = |column: usize| -> Result<f64, CatalogError> {
        let text = fields[column];
        match text.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(CatalogError::InvalidNumber {
                row,
                column,
                value: text.to_string(),
            }),
        }
    };

    Ok(CatalogEntry {
        ra: Angle::from_degrees(number(columns::RA)?),
        dec: Angle::from_degrees(number(columns::DEC)?),
        disk_hlr_arcsec: number(columns::DISK_HLR)?,
        disk_position_angle: Angle::from_degrees(number(columns::DISK_POSITION_ANGLE)?),
        disk_major_arcsec: number(columns::DISK_MAJOR_AXIS)?,
        disk_minor_arcsec: number(columns::DISK_MINOR_AXIS)?,
        r_ab: number(columns::R_AB)?,
        i_ab: number(columns::I_AB)?,
    })
}

/// Lazy row-by-row catalog reader
pub struct CatalogReader<R> {
    lines: Lines<R>,
    header: Vec<String>,
    row: usize,
}

impl CatalogReader<BufReader<File>> {
    /// Open a catalog file and read its header line
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: BufRead> CatalogReader<R> {
    /// Wrap a buffered reader, consuming the header line
    pub fn new(reader: R) -> Result<Self, CatalogError> {
        let mut lines = reader.lines();
        let header = match lines.next() {
            Some(line) => line?.split_whitespace().map(str::to_string).collect(),
            None => return Err(CatalogError::MissingHeader),
        };

        Ok(Self {
            lines,
            header,
            row: 0,
        })
    }

    /// Field names from the header line
    pub fn header(&self) -> &[String] {
        &self.header
    }
}

impl<R: BufRead> Iterator for CatalogReader<R> {
    type Item = Result<CatalogRow, CatalogError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(CatalogError::Io(e))),
            };
            self.row += 1;

            // Blank lines keep their row number but carry no object
            if line.trim().is_empty() {
                continue;
            }

            return Some(parse_row(&line, self.row).map(|entry| CatalogRow {
                row: self.row,
                entry,
            }));
        }
    }
}
