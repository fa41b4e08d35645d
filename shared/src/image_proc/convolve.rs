//! 2D convolution for image processing
//!
//! Two implementations of the same operation: a direct O(N·K) loop, fine for
//! small kernels and used as the reference in tests, and an FFT path used by
//! the renderer where oversampled PSF kernels run to hundreds of taps.
//! Both perform a true convolution (the kernel is flipped).

use ndarray::{Array2, ArrayView2};
use rustfft::{num_complex::Complex64, FftPlanner};

/// Options for controlling the convolution operation
#[derive(Debug, Clone, Copy)]
pub struct ConvolveOptions {
    /// How to handle edges
    pub mode: ConvolveMode,
}

/// Mode for handling edges in convolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConvolveMode {
    /// Only compute output where input and kernel fully overlap
    Valid,
    /// Use zero-padding to maintain input size
    Same,
}

impl Default for ConvolveOptions {
    fn default() -> Self {
        Self {
            mode: ConvolveMode::Valid,
        }
    }
}

/// Perform direct 2D convolution of an image with a kernel
///
/// # Arguments
/// * `image` - Input image as a 2D array
/// * `kernel` - Convolution kernel
/// * `options` - Optional configuration for the convolution
///
/// # Returns
/// * Result of the convolution as a 2D array
pub fn convolve2d(
    image: &ArrayView2<f64>,
    kernel: &ArrayView2<f64>,
    options: Option<ConvolveOptions>,
) -> Array2<f64> {
    let options = options.unwrap_or_default();

    let (img_rows, img_cols) = image.dim();
    let (ker_rows, ker_cols) = kernel.dim();

    if img_rows == 0 || img_cols == 0 || ker_rows == 0 || ker_cols == 0 {
        return Array2::zeros((0, 0));
    }

    // Offset from output index to the "full" convolution index
    let (out_rows, out_cols, off_rows, off_cols) = match options.mode {
        ConvolveMode::Valid => {
            if img_rows < ker_rows || img_cols < ker_cols {
                return Array2::zeros((0, 0));
            }
            (
                img_rows - ker_rows + 1,
                img_cols - ker_cols + 1,
                ker_rows - 1,
                ker_cols - 1,
            )
        }
        ConvolveMode::Same => (img_rows, img_cols, ker_rows / 2, ker_cols / 2),
    };

    let mut output = Array2::zeros((out_rows, out_cols));

    for i in 0..out_rows {
        for j in 0..out_cols {
            let mut sum = 0.0;

            for ki in 0..ker_rows {
                for kj in 0..ker_cols {
                    let img_row = (i + off_rows) as isize - ki as isize;
                    let img_col = (j + off_cols) as isize - kj as isize;

                    if img_row >= 0
                        && img_row < img_rows as isize
                        && img_col >= 0
                        && img_col < img_cols as isize
                    {
                        sum += image[[img_row as usize, img_col as usize]] * kernel[[ki, kj]];
                    }
                }
            }

            output[[i, j]] = sum;
        }
    }

    output
}

/// Convolve an image with a kernel through the FFT, zero-padded, same size as the input.
///
/// Matches `convolve2d(.., ConvolveMode::Same)` to floating-point rounding.
pub fn fft_convolve_same(image: &ArrayView2<f64>, kernel: &ArrayView2<f64>) -> Array2<f64> {
    let (img_rows, img_cols) = image.dim();
    let (ker_rows, ker_cols) = kernel.dim();

    if img_rows == 0 || img_cols == 0 {
        return Array2::zeros((img_rows, img_cols));
    }
    if ker_rows == 0 || ker_cols == 0 {
        return Array2::zeros((img_rows, img_cols));
    }

    // Pad to the full linear-convolution size so the circular FFT product never wraps
    let full_rows = img_rows + ker_rows - 1;
    let full_cols = img_cols + ker_cols - 1;

    let mut image_spec = zero_padded(image, full_rows, full_cols);
    let mut kernel_spec = zero_padded(kernel, full_rows, full_cols);

    let mut planner = FftPlanner::<f64>::new();
    fft2(&mut image_spec, &mut planner, false);
    fft2(&mut kernel_spec, &mut planner, false);

    image_spec.zip_mut_with(&kernel_spec, |a, b| *a *= *b);
    fft2(&mut image_spec, &mut planner, true);

    let norm = 1.0 / (full_rows * full_cols) as f64;
    let (off_rows, off_cols) = (ker_rows / 2, ker_cols / 2);

    Array2::from_shape_fn((img_rows, img_cols), |(i, j)| {
        image_spec[[i + off_rows, j + off_cols]].re * norm
    })
}

fn zero_padded(source: &ArrayView2<f64>, rows: usize, cols: usize) -> Array2<Complex64> {
    let mut padded = Array2::from_elem((rows, cols), Complex64::new(0.0, 0.0));
    for ((i, j), &v) in source.indexed_iter() {
        padded[[i, j]] = Complex64::new(v, 0.0);
    }
    padded
}

/// In-place 2D FFT: rows first, then columns via a transposed copy.
fn fft2(data: &mut Array2<Complex64>, planner: &mut FftPlanner<f64>, inverse: bool) {
    let (rows, cols) = data.dim();

    let row_fft = if inverse {
        planner.plan_fft_inverse(cols)
    } else {
        planner.plan_fft_forward(cols)
    };
    let mut rows_major = data.as_standard_layout().into_owned();
    if let Some(buffer) = rows_major.as_slice_mut() {
        row_fft.process(buffer);
    }

    let col_fft = if inverse {
        planner.plan_fft_inverse(rows)
    } else {
        planner.plan_fft_forward(rows)
    };
    let mut cols_major = rows_major.t().as_standard_layout().into_owned();
    if let Some(buffer) = cols_major.as_slice_mut() {
        col_fft.process(buffer);
    }

    *data = cols_major.t().as_standard_layout().into_owned();
}
