use anyhow::{ensure, Result};
use image::{imageops, RgbaImage};
use imageproc::rect::Rect;

pub const DEFAULT_SEARCH_RADIUS: i32 = 10;

/// Integer shift applied to a frame. Frame 0 is the alignment reference
/// and always carries the zero offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameOffset {
    pub dx: i32,
    pub dy: i32,
}

/// Horizontal band of a frame scored during alignment, expressed as
/// fractions of the frame height.
#[derive(Debug, Clone, Copy)]
pub struct RoiBand {
    pub top: f64,
    pub bottom: f64,
}

impl RoiBand {
    /// Band covering the bottom `fraction` of the frame, e.g. the handle
    /// of a torch while the flame above it flickers.
    pub fn bottom_fraction(fraction: f64) -> Self {
        Self {
            top: 1.0 - fraction,
            bottom: 1.0,
        }
    }

    fn resolve(&self, frame_width: u32, frame_height: u32) -> Rect {
        let top = (frame_height as f64 * self.top) as u32;
        let bottom = ((frame_height as f64 * self.bottom) as u32).min(frame_height);
        Rect::at(0, top as i32).of_size(frame_width, (bottom - top).max(1))
    }
}

/// Equal-width frames sliced left to right from one sheet. Frame order
/// is playback order and is preserved on reassembly. Sheet width not
/// divisible by the frame count leaves a remainder strip that belongs to
/// no frame.
pub struct AnimationStrip {
    frames: Vec<RgbaImage>,
    frame_width: u32,
    frame_height: u32,
    sheet_width: u32,
}

impl AnimationStrip {
    pub fn from_sheet(sheet: &RgbaImage, frame_count: u32) -> Result<Self> {
        ensure!(frame_count > 0, "frame count must be at least 1");
        let (w, h) = sheet.dimensions();
        let frame_width = w / frame_count;
        ensure!(
            frame_width > 0 && h > 0,
            "sheet {}x{} is too small for {} frames",
            w,
            h,
            frame_count
        );

        let frames = (0..frame_count)
            .map(|i| imageops::crop_imm(sheet, i * frame_width, 0, frame_width, h).to_image())
            .collect();
        Ok(Self {
            frames,
            frame_width,
            frame_height: h,
            sheet_width: w,
        })
    }

    pub fn frames(&self) -> &[RgbaImage] {
        &self.frames
    }

    pub fn frame_width(&self) -> u32 {
        self.frame_width
    }

    pub fn frame_height(&self) -> u32 {
        self.frame_height
    }

    /// Rebuilds the sheet with each frame shifted by its offset. The
    /// whole frame moves, not just the band the offset was searched
    /// over; content outside the band is assumed to tolerate the shift.
    pub fn reassemble(&self, offsets: &[FrameOffset]) -> RgbaImage {
        let mut out = RgbaImage::new(self.sheet_width, self.frame_height);
        for (i, frame) in self.frames.iter().enumerate() {
            let offset = offsets.get(i).copied().unwrap_or_default();
            imageops::replace(
                &mut out,
                frame,
                i as i64 * self.frame_width as i64 + offset.dx as i64,
                offset.dy as i64,
            );
        }
        out
    }
}

/// Rec. 601 integer luma, the grayscale weighting used for scoring.
fn luma(r: u8, g: u8, b: u8) -> u64 {
    (299 * r as u64 + 587 * g as u64 + 114 * b as u64) / 1000
}

/// Difference score between the reference ROI and the candidate frame
/// pasted at `(dx, dy)` onto a transparent canvas: the sum over ROI
/// pixels of the luma of the per-channel absolute difference. Samples
/// shifted outside the frame read as transparent black.
fn shifted_roi_score(
    reference: &RgbaImage,
    frame: &RgbaImage,
    dx: i32,
    dy: i32,
    roi: Rect,
) -> u64 {
    let (w, h) = frame.dimensions();
    let mut score = 0u64;

    for y in roi.top() as u32..roi.top() as u32 + roi.height() {
        for x in roi.left() as u32..roi.left() as u32 + roi.width() {
            let a = reference.get_pixel(x, y);
            let sx = x as i64 - dx as i64;
            let sy = y as i64 - dy as i64;
            let b = if sx >= 0 && sy >= 0 && sx < w as i64 && sy < h as i64 {
                *frame.get_pixel(sx as u32, sy as u32)
            } else {
                image::Rgba([0, 0, 0, 0])
            };
            score += luma(
                a[0].abs_diff(b[0]),
                a[1].abs_diff(b[1]),
                a[2].abs_diff(b[2]),
            );
        }
    }
    score
}

/// Finds, for every frame after the first, the integer offset that best
/// matches the reference frame over the ROI band.
///
/// The search scans `dy` in `[-radius, radius]` (outer loop) and `dx` in
/// `[-radius, radius]` (inner loop), both ascending, and keeps the
/// strictly smallest score; on a tie the first offset visited wins. This
/// scan order is observable through the results and must stay stable.
pub fn align_frames(strip: &AnimationStrip, roi: RoiBand, radius: i32) -> Vec<FrameOffset> {
    let roi = roi.resolve(strip.frame_width, strip.frame_height);
    let reference = &strip.frames[0];

    let mut offsets = vec![FrameOffset::default()];
    for frame in &strip.frames[1..] {
        let mut best = FrameOffset {
            dx: -radius,
            dy: -radius,
        };
        let mut best_score = u64::MAX;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let score = shifted_roi_score(reference, frame, dx, dy, roi);
                if score < best_score {
                    best_score = score;
                    best = FrameOffset { dx, dy };
                }
            }
        }
        offsets.push(best);
    }
    offsets
}

/// Transplants every row at or below the split line from frame 0 into
/// every other frame and rebuilds the sheet.
///
/// The static region comes out pixel-identical across frames, at the
/// cost of discarding any genuine per-frame variation below the line.
pub fn stabilize_absolute(strip: &AnimationStrip, split_fraction: f64) -> RgbaImage {
    let split_y = ((strip.frame_height as f64 * split_fraction) as u32).min(strip.frame_height);
    let static_rows = strip.frame_height - split_y;
    let base = imageops::crop_imm(&strip.frames[0], 0, split_y, strip.frame_width, static_rows)
        .to_image();

    let mut out = RgbaImage::new(strip.sheet_width, strip.frame_height);
    for (i, frame) in strip.frames.iter().enumerate() {
        let x0 = (i as u32 * strip.frame_width) as i64;
        imageops::replace(&mut out, frame, x0, 0);
        if static_rows > 0 {
            imageops::replace(&mut out, &base, x0, split_y as i64);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Frame with a deterministic non-uniform pattern, so any shift of it
    /// differs from the original.
    fn textured_frame(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x * 17 % 256) as u8, (y * 23 % 256) as u8, ((x + y) % 256) as u8, 255])
        })
    }

    fn sheet_from_frames(frames: &[RgbaImage]) -> RgbaImage {
        let (fw, fh) = frames[0].dimensions();
        let mut sheet = RgbaImage::new(fw * frames.len() as u32, fh);
        for (i, f) in frames.iter().enumerate() {
            imageops::replace(&mut sheet, f, i as i64 * fw as i64, 0);
        }
        sheet
    }

    #[test]
    fn test_identical_frames_align_at_zero() {
        let frame = textured_frame(16, 16);
        let sheet = sheet_from_frames(&[frame.clone(), frame.clone(), frame]);
        let strip = AnimationStrip::from_sheet(&sheet, 3).unwrap();

        let offsets = align_frames(&strip, RoiBand::bottom_fraction(0.4), 3);
        assert_eq!(offsets, vec![FrameOffset::default(); 3]);
    }

    #[test]
    fn test_tie_break_keeps_first_visited_offset() {
        // Fully transparent frames: every offset scores zero, so the
        // first candidate in dy-major scan order wins.
        let sheet = RgbaImage::new(24, 8);
        let strip = AnimationStrip::from_sheet(&sheet, 3).unwrap();
        let offsets = align_frames(&strip, RoiBand::bottom_fraction(0.5), 1);
        assert_eq!(offsets[0], FrameOffset::default());
        assert_eq!(offsets[1], FrameOffset { dx: -1, dy: -1 });
        assert_eq!(offsets[2], FrameOffset { dx: -1, dy: -1 });
    }

    #[test]
    fn test_shifted_block_is_recovered() {
        // Frame 1 carries the same 6x6 block as frame 0, displaced by
        // (+2, -1). The aligner must answer with the cancelling shift.
        let mut frame0 = RgbaImage::new(32, 32);
        let mut frame1 = RgbaImage::new(32, 32);
        for y in 0..6 {
            for x in 0..6 {
                let color = Rgba([(40 * x + 10) as u8, 80, (30 * y + 5) as u8, 255]);
                frame0.put_pixel(2 + x, 24 + y, color);
                frame1.put_pixel(4 + x, 23 + y, color);
            }
        }
        let sheet = sheet_from_frames(&[frame0, frame1]);
        let strip = AnimationStrip::from_sheet(&sheet, 2).unwrap();

        let offsets = align_frames(&strip, RoiBand::bottom_fraction(0.4), 10);
        assert_eq!(offsets[1], FrameOffset { dx: -2, dy: 1 });

        // Reassembly shifts the whole frame: the block sits back at its
        // reference position within frame 1's slot.
        let rebuilt = strip.reassemble(&offsets);
        assert_eq!(
            rebuilt.get_pixel(32 + 2, 24),
            strip.frames()[0].get_pixel(2, 24)
        );
    }

    #[test]
    fn test_from_sheet_truncates_remainder() {
        let sheet = RgbaImage::new(70, 10);
        let strip = AnimationStrip::from_sheet(&sheet, 4).unwrap();
        assert_eq!(strip.frame_width(), 17);
        assert_eq!(strip.frames().len(), 4);
        // Reassembly keeps the original sheet size.
        let rebuilt = strip.reassemble(&vec![FrameOffset::default(); 4]);
        assert_eq!(rebuilt.dimensions(), (70, 10));
    }

    #[test]
    fn test_from_sheet_rejects_zero_width_frames() {
        let sheet = RgbaImage::new(3, 8);
        assert!(AnimationStrip::from_sheet(&sheet, 8).is_err());
    }

    #[test]
    fn test_stabilize_transplants_static_region() {
        let frame0 = textured_frame(8, 10);
        let mut frame1 = RgbaImage::from_pixel(8, 10, Rgba([9, 9, 9, 255]));
        frame1.put_pixel(0, 0, Rgba([1, 2, 3, 255]));
        let sheet = sheet_from_frames(&[frame0.clone(), frame1]);
        let strip = AnimationStrip::from_sheet(&sheet, 2).unwrap();

        let out = stabilize_absolute(&strip, 0.5);
        // Below the split, frame 1 now matches frame 0 exactly.
        for y in 5..10 {
            for x in 0..8 {
                assert_eq!(out.get_pixel(8 + x, y), frame0.get_pixel(x, y));
            }
        }
        // Above the split, frame 1 keeps its own pixels.
        assert_eq!(*out.get_pixel(8, 0), Rgba([1, 2, 3, 255]));
    }
}
