use log::info;
use ndarray::Array2;
use rayon::prelude::*;

/// Post-processing knobs for turning probabilities into a mask.
#[derive(Debug, Clone, Copy)]
pub struct MaskParams {
    /// Smoothed probability above which a pixel is cloud.
    pub threshold: f32,
    /// Disk radius (pixels) of the averaging kernel.
    pub average_over: usize,
    /// Disk radius (pixels) of the dilation kernel.
    pub dilation_size: usize,
}

impl Default for MaskParams {
    fn default() -> Self {
        MaskParams {
            threshold: 0.4,
            average_over: 1,
            dilation_size: 1,
        }
    }
}

/// Smooths, thresholds and dilates raw cloud probabilities into a 0/1 mask.
pub fn cloud_mask(probabilities: &Array2<f32>, params: &MaskParams) -> Array2<u8> {
    info!(
        "Post-processing: average_over={}, threshold={}, dilation_size={}",
        params.average_over, params.threshold, params.dilation_size
    );

    let smoothed = smooth(probabilities, params.average_over);
    let binary = smoothed.mapv(|p| u8::from(p > params.threshold));
    dilate(&binary, params.dilation_size)
}

/// Flat disk: 1 where dx^2 + dy^2 <= r^2 on a (2r+1)^2 grid.
fn disk_kernel(radius: usize) -> Array2<f32> {
    let size = 2 * radius + 1;
    let r = radius as i64;
    Array2::from_shape_fn((size, size), |(y, x)| {
        let dy = y as i64 - r;
        let dx = x as i64 - r;
        u8::from(dx * dx + dy * dy <= r * r) as f32
    })
}

/// Convolves with the sum-normalized disk kernel, reflecting at the borders.
fn smooth(data: &Array2<f32>, radius: usize) -> Array2<f32> {
    let kernel = disk_kernel(radius);
    let weight = 1.0 / kernel.sum();
    let (nrows, ncols) = data.dim();
    let r = radius as isize;

    let rows: Vec<Vec<f32>> = (0..nrows)
        .into_par_iter()
        .map(|row| {
            (0..ncols)
                .map(|col| {
                    let mut acc = 0.0f32;
                    for (ky, kernel_row) in kernel.outer_iter().enumerate() {
                        let y = reflect(row as isize + ky as isize - r, nrows);
                        for (kx, &k) in kernel_row.iter().enumerate() {
                            if k == 0.0 {
                                continue;
                            }
                            let x = reflect(col as isize + kx as isize - r, ncols);
                            acc += data[[y, x]];
                        }
                    }
                    acc * weight
                })
                .collect()
        })
        .collect();

    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((nrows, ncols), flat).expect("Shape mismatch")
}

/// Morphological dilation with the disk kernel; neighbours outside the image
/// are ignored.
fn dilate(mask: &Array2<u8>, radius: usize) -> Array2<u8> {
    if radius == 0 {
        return mask.clone();
    }

    let kernel = disk_kernel(radius);
    let (nrows, ncols) = mask.dim();
    let r = radius as isize;

    let rows: Vec<Vec<u8>> = (0..nrows)
        .into_par_iter()
        .map(|row| {
            (0..ncols)
                .map(|col| {
                    for (ky, kernel_row) in kernel.outer_iter().enumerate() {
                        let y = row as isize + ky as isize - r;
                        if y < 0 || y >= nrows as isize {
                            continue;
                        }
                        for (kx, &k) in kernel_row.iter().enumerate() {
                            if k == 0.0 {
                                continue;
                            }
                            let x = col as isize + kx as isize - r;
                            if x < 0 || x >= ncols as isize {
                                continue;
                            }
                            if mask[[y as usize, x as usize]] != 0 {
                                return 1u8;
                            }
                        }
                    }
                    0u8
                })
                .collect()
        })
        .collect();

    let flat: Vec<u8> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((nrows, ncols), flat).expect("Shape mismatch")
}

/// Reflects an out-of-range index back into `0..n` (edge pixel repeated,
/// matching scipy's default border mode).
fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let mut i = i;
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= n {
            i = 2 * n - 1 - i;
        } else {
            return i as usize;
        }
    }
}
