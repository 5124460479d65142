//! CPU-bound workloads run inside benchmark threads.
//!
//! Two shapes: a pure arithmetic spin ([`busy_cal`]) and an image-processing
//! pipeline ([`canny`]) that also stresses caches and memory bandwidth.

use std::collections::VecDeque;
use std::hint::black_box;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Which workload a thread runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Busy,
    Canny,
}

/// Integer mixing loop. Returns the accumulator so callers can keep it alive.
pub fn busy_cal(iterations: u64) -> u64 {
    let mut acc: u64 = 0x9E37_79B9_7F4A_7C15;
    for i in 0..iterations {
        acc = black_box(acc.rotate_left(5) ^ i).wrapping_mul(0x2545_F491_4F6C_DD1D);
    }
    acc
}

/// 8-bit grayscale image, row major.
#[derive(Debug, Clone)]
pub struct GrayImage {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl GrayImage {
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> u8,
    {
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self { width, height, pixels }
    }

    /// Square test card: a bright disc and a mid-gray bar over a dark
    /// background, with seeded sensor noise.
    pub fn synthetic(size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let center = size as f32 / 2.0;
        let radius = size as f32 / 4.0;
        Self::from_fn(size, size, |x, y| {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let base: u8 = if dx * dx + dy * dy < radius * radius {
                200
            } else if y > size / 8 && y < size / 5 {
                120
            } else {
                30
            };
            base.saturating_add(rng.gen_range(0..12))
        })
    }

    /// Pixel with coordinates clamped to the border.
    fn at(&self, x: isize, y: isize) -> u8 {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.pixels[y * self.width + x]
    }
}

/// Binary edge map produced by [`canny`].
#[derive(Debug, Clone)]
pub struct EdgeMap {
    width: usize,
    edges: Vec<bool>,
}

impl EdgeMap {
    pub fn count(&self) -> usize {
        self.edges.iter().filter(|&&e| e).count()
    }
}

const GAUSS_5X5: [[u32; 5]; 5] = [
    [2, 4, 5, 4, 2],
    [4, 9, 12, 9, 4],
    [5, 12, 15, 12, 5],
    [4, 9, 12, 9, 4],
    [2, 4, 5, 4, 2],
];
const GAUSS_SUM: u32 = 159;

fn gaussian_blur(image: &GrayImage) -> GrayImage {
    GrayImage::from_fn(image.width, image.height, |x, y| {
        let mut acc = 0u32;
        for (ky, row) in GAUSS_5X5.iter().enumerate() {
            for (kx, weight) in row.iter().enumerate() {
                let px = image.at(x as isize + kx as isize - 2, y as isize + ky as isize - 2);
                acc += weight * u32::from(px);
            }
        }
        ((acc + GAUSS_SUM / 2) / GAUSS_SUM) as u8
    })
}

/// Sobel magnitude plus gradient direction quantised to 0, 45, 90 or 135 degrees.
fn sobel(image: &GrayImage) -> (Vec<f32>, Vec<u8>) {
    let n = image.width * image.height;
    let mut magnitude = Vec::with_capacity(n);
    let mut direction = Vec::with_capacity(n);

    for y in 0..image.height as isize {
        for x in 0..image.width as isize {
            let p = |dx: isize, dy: isize| f32::from(image.at(x + dx, y + dy));
            let gx = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
            let gy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));

            magnitude.push(gx.hypot(gy));

            let mut angle = gy.atan2(gx).to_degrees();
            if angle < 0.0 {
                angle += 180.0;
            }
            direction.push(match angle {
                a if !(22.5..157.5).contains(&a) => 0,
                a if a < 67.5 => 1,
                a if a < 112.5 => 2,
                _ => 3,
            });
        }
    }
    (magnitude, direction)
}

fn non_max_suppression(
    width: usize,
    height: usize,
    magnitude: &[f32],
    direction: &[u8],
) -> Vec<f32> {
    let mut thin = vec![0.0f32; magnitude.len()];
    let mag = |x: isize, y: isize| -> f32 {
        if x < 0 || y < 0 || x >= width as isize || y >= height as isize {
            0.0
        } else {
            magnitude[y as usize * width + x as usize]
        }
    };

    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let (dx, dy) = match direction[i] {
                0 => (1, 0),
                1 => (1, 1),
                2 => (0, 1),
                _ => (-1, 1),
            };
            let (xi, yi) = (x as isize, y as isize);
            let m = magnitude[i];
            if m >= mag(xi + dx, yi + dy) && m >= mag(xi - dx, yi - dy) {
                thin[i] = m;
            }
        }
    }
    thin
}

/// Canny edge detection with hysteresis thresholds `low` and `high`.
pub fn canny(image: &GrayImage, low: f32, high: f32) -> EdgeMap {
    let (width, height) = (image.width, image.height);
    let blurred = gaussian_blur(image);
    let (magnitude, direction) = sobel(&blurred);
    let thin = non_max_suppression(width, height, &magnitude, &direction);

    let mut edges = vec![false; thin.len()];
    let mut queue: VecDeque<usize> = VecDeque::new();
    for (i, &m) in thin.iter().enumerate() {
        if m >= high {
            edges[i] = true;
            queue.push_back(i);
        }
    }

    // Weak pixels survive only when connected to a strong one.
    while let Some(i) = queue.pop_front() {
        let (x, y) = ((i % width) as isize, (i / width) as isize);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                    continue;
                }
                let j = ny as usize * width + nx as usize;
                if !edges[j] && thin[j] >= low {
                    edges[j] = true;
                    queue.push_back(j);
                }
            }
        }
    }

    EdgeMap { width, edges }
}

/// Runs [`canny`] `passes` times over a synthetic `image_size` square image.
/// Returns the edge count of the last pass.
pub fn canny_workload(image_size: usize, passes: u32) -> usize {
    let image = GrayImage::synthetic(image_size.max(8), 0x5EED);
    let mut count = 0;
    for _ in 0..passes {
        count = black_box(canny(black_box(&image), 20.0, 60.0)).count();
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_cal_is_deterministic() {
        assert_eq!(busy_cal(1000), busy_cal(1000));
        assert_ne!(busy_cal(1000), busy_cal(1001));
    }

    #[test]
    fn test_canny_finds_square_outline() {
        let image = GrayImage::from_fn(64, 64, |x, y| {
            if (16..48).contains(&x) && (16..48).contains(&y) { 220 } else { 20 }
        });
        let edges = canny(&image, 20.0, 60.0);
        let is_edge = |x: usize, y: usize| edges.edges[y * edges.width + x];

        assert!(edges.count() > 0);
        // Flat regions carry no edges.
        assert!(!is_edge(32, 32));
        assert!(!is_edge(2, 2));
        // Every edge lies near the square's border.
        for y in 0..64 {
            for x in 0..64 {
                if is_edge(x, y) {
                    let near_x = (13..=19).contains(&x) || (44..=50).contains(&x);
                    let near_y = (13..=19).contains(&y) || (44..=50).contains(&y);
                    assert!(near_x || near_y, "stray edge at ({}, {})", x, y);
                }
            }
        }
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let image = GrayImage::from_fn(32, 32, |_, _| 128);
        assert_eq!(canny(&image, 20.0, 60.0).count(), 0);
    }

    #[test]
    fn test_synthetic_image_is_seeded() {
        let a = GrayImage::synthetic(48, 7);
        let b = GrayImage::synthetic(48, 7);
        assert_eq!(a.pixels, b.pixels);
        assert_eq!((a.width, a.height), (48, 48));
        assert!(canny_workload(48, 2) > 0);
    }
}
