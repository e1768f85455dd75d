use tracing::debug;

use crate::image_pipeline::common::error::{ImageError, Result};
use crate::image_pipeline::common::frame::{FrameBuffer, SampleBuffer, SampleDtype};
use crate::image_pipeline::debayer::types::{CfaColor, CfaPattern};

const COLORS: [CfaColor; 3] = [CfaColor::Red, CfaColor::Green, CfaColor::Blue];

/// Single-channel mosaic widened to `u32` for interpolation.
struct Mosaic {
    width: usize,
    height: usize,
    pattern: CfaPattern,
    values: Vec<u32>,
}

impl Mosaic {
    fn new(frame: &FrameBuffer, pattern: CfaPattern) -> Self {
        Self {
            width: frame.width(),
            height: frame.height(),
            pattern,
            values: frame.samples().to_u64_vec().into_iter().map(|v| v as u32).collect(),
        }
    }

    fn at(&self, row: usize, col: usize) -> u32 {
        self.values[row * self.width + col]
    }

    fn color(&self, row: usize, col: usize) -> CfaColor {
        self.pattern.color_at(row, col)
    }
}

/// In-bounds photosites of `color` in the 3x3 window centred on `(row, col)`.
fn same_color_neighbors(
    pattern: CfaPattern,
    width: usize,
    height: usize,
    row: usize,
    col: usize,
    color: CfaColor,
) -> impl Iterator<Item = (usize, usize)> {
    let rows = row.saturating_sub(1)..=(row + 1).min(height - 1);
    rows.flat_map(move |r| {
        let cols = col.saturating_sub(1)..=(col + 1).min(width - 1);
        cols.map(move |c| (r, c))
    })
    .filter(move |&(r, c)| (r, c) != (row, col) && pattern.color_at(r, c) == color)
}

fn rounded_mean(sum: u64, count: u64) -> u32 {
    if count == 0 {
        return 0;
    }
    ((sum + count / 2) / count) as u32
}

fn rgb_frame(source: &FrameBuffer, width: usize, height: usize, rgb: Vec<u32>) -> Result<FrameBuffer> {
    let samples = match source.dtype() {
        SampleDtype::U8 => SampleBuffer::U8(rgb.into_iter().map(|v| v.min(u8::MAX as u32) as u8).collect()),
        SampleDtype::U16 => SampleBuffer::U16(rgb.into_iter().map(|v| v.min(u16::MAX as u32) as u16).collect()),
        other => {
            return Err(ImageError::UnsupportedDepth(format!("{other:?} mosaics")));
        }
    };
    FrameBuffer::new(width, height, 3, source.bits_per_sample(), samples)
}

/// Pure-Rust demosaic kernels for u8 and u16 mosaics.
///
/// Inputs are validated by [`crate::image_pipeline::debayer::demosaic`]; every kernel
/// keeps the source dtype and bit depth.
pub struct CpuDebayer {
    pattern: CfaPattern,
}

impl CpuDebayer {
    pub fn new(pattern: CfaPattern) -> Self {
        Self { pattern }
    }

    pub fn pattern(&self) -> CfaPattern {
        self.pattern
    }

    /// Every missing channel is the rounded mean of the same-colour photosites in
    /// the 3x3 window. Windows are clipped at the border, so edge pixels average
    /// fewer neighbours.
    pub fn bilinear(&self, frame: &FrameBuffer) -> Result<FrameBuffer> {
        let mosaic = Mosaic::new(frame, self.pattern);
        let (w, h) = (mosaic.width, mosaic.height);
        debug!(width = w, height = h, pattern = %self.pattern, "Bilinear demosaic");

        let mut rgb = vec![0u32; w * h * 3];
        for row in 0..h {
            for col in 0..w {
                let own = mosaic.color(row, col);
                let px = &mut rgb[(row * w + col) * 3..][..3];
                for color in COLORS {
                    px[color.channel()] = if color == own {
                        mosaic.at(row, col)
                    } else {
                        let (sum, count) = same_color_neighbors(self.pattern, w, h, row, col, color)
                            .fold((0u64, 0u64), |(s, n), (r, c)| (s + mosaic.at(r, c) as u64, n + 1));
                        rounded_mean(sum, count)
                    };
                }
            }
        }
        rgb_frame(frame, w, h, rgb)
    }

    /// Copies each channel from the 2x2 block containing the pixel. Blocks start on
    /// even coordinates, shifted back by one on the last row or column of odd-sized
    /// frames so they stay inside the image.
    pub fn nearest(&self, frame: &FrameBuffer) -> Result<FrameBuffer> {
        let mosaic = Mosaic::new(frame, self.pattern);
        let (w, h) = (mosaic.width, mosaic.height);
        debug!(width = w, height = h, pattern = %self.pattern, "Nearest-neighbour demosaic");

        let mut rgb = vec![0u32; w * h * 3];
        for row in 0..h {
            let block_row = (row & !1).min(h - 2);
            for col in 0..w {
                let block_col = (col & !1).min(w - 2);
                let own = mosaic.color(row, col);
                let px = &mut rgb[(row * w + col) * 3..][..3];
                for color in COLORS {
                    px[color.channel()] = if color == own {
                        mosaic.at(row, col)
                    } else {
                        // first photosite of the colour in scan order
                        let (r, c) = (0..4)
                            .map(|i| (block_row + i / 2, block_col + i % 2))
                            .find(|&(r, c)| mosaic.color(r, c) == color)
                            .unwrap_or((block_row, block_col));
                        mosaic.at(r, c)
                    };
                }
            }
        }
        rgb_frame(frame, w, h, rgb)
    }

    /// Bilinear green, then red and blue rebuilt from the hue ratio: at a site
    /// missing red, `R = G * mean(R_n / G_n)` over the neighbouring red sites, with
    /// a zero green treated as one.
    pub fn smooth_hue(&self, frame: &FrameBuffer) -> Result<FrameBuffer> {
        let mosaic = Mosaic::new(frame, self.pattern);
        let (w, h) = (mosaic.width, mosaic.height);
        let max = frame.dtype().max_value() as f64;
        debug!(width = w, height = h, pattern = %self.pattern, "Smooth hue demosaic");

        let green: Vec<u32> = (0..h * w)
            .map(|i| {
                let (row, col) = (i / w, i % w);
                if mosaic.color(row, col) == CfaColor::Green {
                    mosaic.at(row, col)
                } else {
                    let (sum, count) = same_color_neighbors(self.pattern, w, h, row, col, CfaColor::Green)
                        .fold((0u64, 0u64), |(s, n), (r, c)| (s + mosaic.at(r, c) as u64, n + 1));
                    rounded_mean(sum, count)
                }
            })
            .collect();
        let green_at = |r: usize, c: usize| green[r * w + c].max(1) as f64;

        let mut rgb = vec![0u32; w * h * 3];
        for row in 0..h {
            for col in 0..w {
                let own = mosaic.color(row, col);
                let g = green[row * w + col];
                let px = &mut rgb[(row * w + col) * 3..][..3];
                px[CfaColor::Green.channel()] = g;
                for color in [CfaColor::Red, CfaColor::Blue] {
                    px[color.channel()] = if color == own {
                        mosaic.at(row, col)
                    } else {
                        let (ratio_sum, count) = same_color_neighbors(self.pattern, w, h, row, col, color)
                            .fold((0.0f64, 0usize), |(s, n), (r, c)| {
                                (s + mosaic.at(r, c) as f64 / green_at(r, c), n + 1)
                            });
                        if count == 0 {
                            0
                        } else {
                            (g as f64 * ratio_sum / count as f64).round().clamp(0.0, max) as u32
                        }
                    };
                }
            }
        }
        rgb_frame(frame, w, h, rgb)
    }

    /// One RGB pixel per 2x2 tile: red and blue taken as-is, green the floor of the
    /// mean of the tile's two greens.
    pub fn downsample(&self, frame: &FrameBuffer) -> Result<FrameBuffer> {
        let mosaic = Mosaic::new(frame, self.pattern);
        let (w, h) = (mosaic.width / 2, mosaic.height / 2);
        debug!(width = w, height = h, pattern = %self.pattern, "Downsample demosaic");

        let (red_row, red_col) = self.pattern.offset_of(CfaColor::Red);
        let (blue_row, blue_col) = self.pattern.offset_of(CfaColor::Blue);
        // the two greens sit on the anti-diagonal of red and blue
        let (green_a, green_b) = ((red_row, blue_col), (blue_row, red_col));

        let mut rgb = Vec::with_capacity(w * h * 3);
        for tile_row in 0..h {
            for tile_col in 0..w {
                let (r0, c0) = (tile_row * 2, tile_col * 2);
                let g = (mosaic.at(r0 + green_a.0, c0 + green_a.1) + mosaic.at(r0 + green_b.0, c0 + green_b.1)) / 2;
                rgb.extend([
                    mosaic.at(r0 + red_row, c0 + red_col),
                    g,
                    mosaic.at(r0 + blue_row, c0 + blue_col),
                ]);
            }
        }
        rgb_frame(frame, w, h, rgb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mosaic of a flat colour: every photosite records its channel's value.
    fn flat_mosaic(pattern: CfaPattern, width: usize, height: usize, rgb: [u16; 3]) -> FrameBuffer {
        let data = (0..width * height)
            .map(|i| rgb[pattern.color_at(i / width, i % width).channel()])
            .collect();
        FrameBuffer::new(width, height, 1, 12, SampleBuffer::U16(data)).unwrap()
    }

    fn pixel(frame: &FrameBuffer, row: usize, col: usize) -> [u64; 3] {
        [0, 1, 2].map(|ch| frame.sample(row, col, ch).unwrap())
    }

    #[test]
    fn test_flat_colour_survives_every_kernel() {
        for pattern in CfaPattern::ALL {
            let mosaic = flat_mosaic(pattern, 6, 4, [100, 75, 50]);
            let debayer = CpuDebayer::new(pattern);
            for out in [
                debayer.bilinear(&mosaic).unwrap(),
                debayer.nearest(&mosaic).unwrap(),
                debayer.smooth_hue(&mosaic).unwrap(),
            ] {
                assert_eq!(out.shape(), vec![4, 6, 3]);
                assert_eq!(pixel(&out, 2, 3), [100, 75, 50], "{pattern}");
                assert_eq!(pixel(&out, 0, 0), [100, 75, 50], "{pattern}");
            }
        }
    }

    #[test]
    fn test_corner_has_fewer_neighbours() {
        let pattern = CfaPattern::Rggb;
        let corner = same_color_neighbors(pattern, 6, 6, 0, 0, CfaColor::Blue).count();
        let interior = same_color_neighbors(pattern, 6, 6, 2, 2, CfaColor::Blue).count();
        assert_eq!(corner, 1);
        assert_eq!(interior, 4);
        assert_eq!(same_color_neighbors(pattern, 6, 6, 0, 0, CfaColor::Green).count(), 2);
        assert_eq!(same_color_neighbors(pattern, 6, 6, 2, 2, CfaColor::Green).count(), 4);
    }

    #[test]
    fn test_bilinear_rounds_mean() {
        // RGGB 4x4; blue sites at odd rows and columns
        let mut data = vec![0u16; 16];
        data[5] = 10; // (1,1)
        data[7] = 11; // (1,3)
        data[13] = 20; // (3,1)
        data[15] = 20; // (3,3)
        let mosaic = FrameBuffer::new(4, 4, 1, 8, SampleBuffer::U16(data)).unwrap();
        let out = CpuDebayer::new(CfaPattern::Rggb).bilinear(&mosaic).unwrap();
        // red site (2,2) sees all four blues: (10 + 11 + 20 + 20 + 2) / 4
        assert_eq!(out.sample(2, 2, 2), Some(15));
        // corner sees only (1,1)
        assert_eq!(out.sample(0, 0, 2), Some(10));
        // green site (1,2) sits between two blues: (10 + 11 + 1) / 2
        assert_eq!(out.sample(1, 2, 2), Some(11));
    }

    #[test]
    fn test_downsample_tile() {
        let mosaic = FrameBuffer::new(2, 2, 1, 8, SampleBuffer::U8(vec![10, 20, 30, 40])).unwrap();
        let out = CpuDebayer::new(CfaPattern::Rggb).downsample(&mosaic).unwrap();
        assert_eq!(out.shape(), vec![1, 1, 3]);
        assert_eq!(out.samples(), &SampleBuffer::U8(vec![10, 25, 40]));
    }

    #[test]
    fn test_downsample_repeated_tiles() {
        // 4x4 RGGB mosaic tiled with [[10, 20], [30, 40]]
        let data: Vec<u16> = (0..16)
            .map(|i| match (i / 4 % 2, i % 4 % 2) {
                (0, 0) => 10,
                (0, _) => 20,
                (_, 0) => 30,
                _ => 40,
            })
            .collect();
        let mosaic = FrameBuffer::new(4, 4, 1, 8, SampleBuffer::U16(data)).unwrap();
        let out = CpuDebayer::new(CfaPattern::Rggb).downsample(&mosaic).unwrap();
        assert_eq!(out.shape(), vec![2, 2, 3]);
        assert_eq!(out.samples(), &SampleBuffer::U16([10, 25, 40].repeat(4)));
        for (row, col) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            assert_eq!(out.sample(row, col, 1), Some(25));
        }
    }

    #[test]
    fn test_downsample_other_patterns() {
        // GRBG: G R / B G
        let mosaic = FrameBuffer::new(2, 2, 1, 8, SampleBuffer::U8(vec![7, 20, 30, 8])).unwrap();
        let out = CpuDebayer::new(CfaPattern::Grbg).downsample(&mosaic).unwrap();
        assert_eq!(out.samples(), &SampleBuffer::U8(vec![20, 7, 30]));
    }

    #[test]
    fn test_nearest_odd_width_stays_in_bounds() {
        let mosaic = flat_mosaic(CfaPattern::Bggr, 5, 3, [9, 8, 7]);
        let out = CpuDebayer::new(CfaPattern::Bggr).nearest(&mosaic).unwrap();
        assert_eq!(pixel(&out, 2, 4), [9, 8, 7]);
    }

    #[test]
    fn test_smooth_hue_follows_green() {
        // red/green ratio is one everywhere, so red tracks green
        let pattern = CfaPattern::Rggb;
        let data: Vec<u16> = (0..16).map(|i| if (i / 4) % 2 == 1 && i % 2 == 1 { 0 } else { 40 }).collect();
        let mosaic = FrameBuffer::new(4, 4, 1, 8, SampleBuffer::U16(data)).unwrap();
        let out = CpuDebayer::new(pattern).smooth_hue(&mosaic).unwrap();
        assert_eq!(out.sample(1, 1, 0), Some(40));
        assert_eq!(out.sample(0, 1, 0), Some(40));
        assert_eq!(out.sample(0, 0, 2), Some(0));
    }
}
