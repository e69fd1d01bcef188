use image::{Rgba, RgbaImage};
use imageproc::rect::Rect;

use crate::background::{despill, AdaptiveClassifier, BackgroundClassifier};

/// Uniform grid of cells over a sheet.
///
/// Cell sizes come from integer division, so remainder pixels at the
/// right and bottom edges belong to no cell and are never processed.
#[derive(Debug, Clone, Copy)]
pub struct GridLayout {
    pub rows: u32,
    pub cols: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub margin_top: u32,
    pub margin_left: u32,
}

impl GridLayout {
    pub fn new(width: u32, height: u32, rows: u32, cols: u32) -> Self {
        Self {
            rows,
            cols,
            cell_width: width / cols,
            cell_height: height / rows,
            margin_top: 0,
            margin_left: 0,
        }
    }

    /// Reserves a top/left fraction of every cell for text labels baked
    /// into generated sheets ("DOWN", "LEFT", ...); content scans skip
    /// that band.
    pub fn with_label_margins(mut self, top_fraction: f64, left_fraction: f64) -> Self {
        self.margin_top = (self.cell_height as f64 * top_fraction) as u32;
        self.margin_left = (self.cell_width as f64 * left_fraction) as u32;
        self
    }

    pub fn cell(&self, row: u32, col: u32) -> Rect {
        Rect::at((col * self.cell_width) as i32, (row * self.cell_height) as i32)
            .of_size(self.cell_width, self.cell_height)
    }

    /// Positions probed for the per-cell background reference, relative
    /// to the cell origin: the four corners inset past the margins, plus
    /// the cell center.
    pub fn sample_offsets(&self) -> Vec<(u32, u32)> {
        vec![
            (self.margin_left + 5, self.margin_top + 5),
            (self.cell_width.saturating_sub(6), self.margin_top + 5),
            (self.margin_left + 5, self.cell_height.saturating_sub(6)),
            (
                self.cell_width.saturating_sub(6),
                self.cell_height.saturating_sub(6),
            ),
            (self.cell_width / 2, self.cell_height / 2),
        ]
    }
}

/// Tight bounding box of content pixels within a cell, in cell-local
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentBounds {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl ContentBounds {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// Scans a cell for pixels that are opaque and not background, skipping
/// the label margins. Returns `None` when the cell holds no content; the
/// caller must then skip the cell rather than invent a default box.
pub fn content_bounds<C: BackgroundClassifier>(
    img: &RgbaImage,
    cell: Rect,
    margin_top: u32,
    margin_left: u32,
    classifier: &C,
) -> Option<ContentBounds> {
    let (w, h) = img.dimensions();
    let mut bounds: Option<ContentBounds> = None;

    for y in margin_top..cell.height() {
        for x in margin_left..cell.width() {
            let gx = cell.left() as u32 + x;
            let gy = cell.top() as u32 + y;
            if gx >= w || gy >= h {
                continue;
            }
            let pixel = img.get_pixel(gx, gy);
            if pixel[3] == 0 || classifier.is_background(pixel) {
                continue;
            }
            match &mut bounds {
                None => {
                    bounds = Some(ContentBounds {
                        min_x: x,
                        max_x: x,
                        min_y: y,
                        max_y: y,
                    })
                }
                Some(b) => {
                    b.min_x = b.min_x.min(x);
                    b.max_x = b.max_x.max(x);
                    b.min_y = b.min_y.min(y);
                    b.max_y = b.max_y.max(y);
                }
            }
        }
    }
    bounds
}

/// How pixels are rewritten while recentering.
#[derive(Debug, Clone, Copy)]
pub struct RecenterOptions {
    /// Force copied pixels to alpha 255.
    pub force_opaque: bool,
    /// Clamp the green channel of green-dominant pixels.
    pub despill: bool,
}

/// Copies the bounded content of a cell into a target-sized cell of
/// `dst`, centered.
///
/// The centering offset is `floor((target - content) / 2)` per axis and
/// may be negative when the content exceeds the target; destination
/// writes are clipped to the target cell in that case. Pixels the
/// classifier still marks as background inside the bounding box are
/// skipped, so internal backdrop holes stay transparent.
#[allow(clippy::too_many_arguments)]
pub fn recenter_content<C: BackgroundClassifier>(
    src: &RgbaImage,
    cell: Rect,
    bounds: ContentBounds,
    classifier: &C,
    dst: &mut RgbaImage,
    dst_origin: (u32, u32),
    target: (u32, u32),
    options: RecenterOptions,
) {
    let (target_w, target_h) = target;
    let offset_x = (target_w as i64 - bounds.width() as i64).div_euclid(2);
    let offset_y = (target_h as i64 - bounds.height() as i64).div_euclid(2);

    for y in bounds.min_y..=bounds.max_y {
        for x in bounds.min_x..=bounds.max_x {
            let gx = cell.left() as u32 + x;
            let gy = cell.top() as u32 + y;
            if gx >= src.width() || gy >= src.height() {
                continue;
            }
            let pixel = *src.get_pixel(gx, gy);
            if pixel[3] == 0 || classifier.is_background(&pixel) {
                continue;
            }

            let dx = offset_x + (x - bounds.min_x) as i64;
            let dy = offset_y + (y - bounds.min_y) as i64;
            if dx < 0 || dy < 0 || dx >= target_w as i64 || dy >= target_h as i64 {
                continue;
            }
            let (dx, dy) = (dst_origin.0 + dx as u32, dst_origin.1 + dy as u32);
            if dx >= dst.width() || dy >= dst.height() {
                continue;
            }

            let mut pixel = if options.despill { despill(pixel) } else { pixel };
            if options.force_opaque {
                pixel[3] = 255;
            }
            dst.put_pixel(dx, dy, pixel);
        }
    }
}

/// Normalizes every cell of a grid sheet into a canonical sheet: per-cell
/// adaptive chroma-key classification, content bounding box, centered
/// copy with despill and forced opacity.
///
/// `limit_cols` keeps only the first N input columns, for sheets that
/// carry unwanted variants side by side. Empty cells are reported and
/// left transparent.
pub fn extract_grid(
    img: &RgbaImage,
    layout: &GridLayout,
    limit_cols: Option<u32>,
    target_size: u32,
) -> RgbaImage {
    let out_cols = limit_cols.unwrap_or(layout.cols).min(layout.cols);
    let mut out = RgbaImage::new(out_cols * target_size, layout.rows * target_size);
    let offsets = layout.sample_offsets();

    for row in 0..layout.rows {
        for col in 0..out_cols {
            let cell = layout.cell(row, col);
            let classifier = AdaptiveClassifier::from_samples(img, cell, &offsets);
            let Some(bounds) =
                content_bounds(img, cell, layout.margin_top, layout.margin_left, &classifier)
            else {
                eprintln!("Cell ({}, {}) has no content, skipped", row, col);
                continue;
            };
            recenter_content(
                img,
                cell,
                bounds,
                &classifier,
                &mut out,
                (col * target_size, row * target_size),
                (target_size, target_size),
                RecenterOptions {
                    force_opaque: true,
                    despill: true,
                },
            );
        }
    }
    out
}

/// Crops an image to the bounding box of its non-transparent pixels.
/// Returns `None` when the image is fully transparent.
pub fn crop_to_alpha(img: &RgbaImage) -> Option<RgbaImage> {
    struct KeepAll;
    impl BackgroundClassifier for KeepAll {
        fn is_background(&self, _pixel: &Rgba<u8>) -> bool {
            false
        }
    }

    let whole = Rect::at(0, 0).of_size(img.width(), img.height());
    let bounds = content_bounds(img, whole, 0, 0, &KeepAll)?;
    Some(
        image::imageops::crop_imm(img, bounds.min_x, bounds.min_y, bounds.width(), bounds.height())
            .to_image(),
    )
}

/// Places two sheets side by side on a transparent canvas, left first.
/// The canvas takes the taller of the two heights.
pub fn concat_horizontal(left: &RgbaImage, right: &RgbaImage) -> RgbaImage {
    let mut out = RgbaImage::new(
        left.width() + right.width(),
        left.height().max(right.height()),
    );
    image::imageops::replace(&mut out, left, 0, 0);
    image::imageops::replace(&mut out, right, left.width() as i64, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::PaletteClassifier;

    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const RED: Rgba<u8> = Rgba([200, 30, 30, 255]);

    fn green_classifier() -> PaletteClassifier {
        PaletteClassifier::new(vec![[0, 255, 0]], 10)
    }

    #[test]
    fn test_layout_truncates_remainder() {
        // 130 / 4 = 32: two trailing pixels per axis belong to no cell.
        let layout = GridLayout::new(130, 130, 4, 4);
        assert_eq!(layout.cell_width, 32);
        assert_eq!(layout.cell_height, 32);
        let cell = layout.cell(3, 3);
        assert_eq!((cell.left(), cell.top()), (96, 96));
        assert_eq!((cell.width(), cell.height()), (32, 32));
    }

    #[test]
    fn test_label_margins() {
        let layout = GridLayout::new(400, 200, 2, 2).with_label_margins(0.1, 0.15);
        assert_eq!(layout.margin_top, 10);
        assert_eq!(layout.margin_left, 30);
    }

    #[test]
    fn test_bounds_single_pixel() {
        let mut img = RgbaImage::from_pixel(16, 16, GREEN);
        img.put_pixel(5, 7, RED);
        let cell = Rect::at(0, 0).of_size(16, 16);
        let bounds = content_bounds(&img, cell, 0, 0, &green_classifier()).unwrap();
        assert_eq!(
            bounds,
            ContentBounds {
                min_x: 5,
                max_x: 5,
                min_y: 7,
                max_y: 7
            }
        );
    }

    #[test]
    fn test_bounds_empty_cell() {
        let img = RgbaImage::from_pixel(16, 16, GREEN);
        let cell = Rect::at(0, 0).of_size(16, 16);
        assert!(content_bounds(&img, cell, 0, 0, &green_classifier()).is_none());
    }

    #[test]
    fn test_bounds_skip_label_margins() {
        let mut img = RgbaImage::from_pixel(20, 20, GREEN);
        img.put_pixel(1, 1, RED); // inside the margin band, ignored
        img.put_pixel(10, 12, RED);
        let cell = Rect::at(0, 0).of_size(20, 20);
        let bounds = content_bounds(&img, cell, 3, 3, &green_classifier()).unwrap();
        assert_eq!((bounds.min_x, bounds.min_y), (10, 12));
    }

    #[test]
    fn test_recenter_centering_arithmetic() {
        // 20x20 square at (54, 54) in a 128x128 cell, 64x64 target:
        // offset floor((64 - 20) / 2) = 22 on both axes.
        let mut img = RgbaImage::from_pixel(128, 128, GREEN);
        for y in 54..74 {
            for x in 54..74 {
                img.put_pixel(x, y, RED);
            }
        }
        let layout = GridLayout::new(128, 128, 1, 1);
        let out = extract_grid(&img, &layout, None, 64);

        assert_eq!(out.dimensions(), (64, 64));
        assert_eq!(*out.get_pixel(22, 22), RED);
        assert_eq!(*out.get_pixel(41, 41), RED);
        assert_eq!(out.get_pixel(21, 21)[3], 0);
        assert_eq!(out.get_pixel(42, 42)[3], 0);
        // No chroma-key green survives anywhere in the output.
        assert!(!out
            .pixels()
            .any(|p| p[3] > 0 && p[1] > p[0] && p[1] > p[2]));
    }

    #[test]
    fn test_recenter_clips_oversized_content() {
        let mut img = RgbaImage::from_pixel(10, 10, GREEN);
        for y in 0..10 {
            for x in 0..10 {
                if (x + y) % 2 == 0 {
                    img.put_pixel(x, y, RED);
                }
            }
        }
        let cell = Rect::at(0, 0).of_size(10, 10);
        let classifier = green_classifier();
        let bounds = content_bounds(&img, cell, 0, 0, &classifier).unwrap();

        // Content is 10x10 but the target is 4x4: offset is -3 and the
        // copy clips instead of panicking.
        let mut dst = RgbaImage::new(4, 4);
        recenter_content(
            &img,
            cell,
            bounds,
            &classifier,
            &mut dst,
            (0, 0),
            (4, 4),
            RecenterOptions {
                force_opaque: true,
                despill: false,
            },
        );
        // Destination (0, 0) comes from content pixel (3, 3).
        assert_eq!(dst.get_pixel(0, 0)[3], if (3 + 3) % 2 == 0 { 255 } else { 0 });
    }

    #[test]
    fn test_extract_grid_limit_cols_and_empty_cells() {
        // 2x4 sheet of 16x8 cells; only column 0 has content.
        let mut img = RgbaImage::from_pixel(64, 16, GREEN);
        img.put_pixel(3, 3, RED);
        img.put_pixel(2, 11, RED);
        let layout = GridLayout::new(64, 16, 2, 4);
        let out = extract_grid(&img, &layout, Some(2), 8);

        assert_eq!(out.dimensions(), (16, 16));
        // Single content pixels center at (3, 3) within their 8x8 cells.
        assert_eq!(*out.get_pixel(3, 3), Rgba([200, 30, 30, 255]));
        assert_eq!(*out.get_pixel(3, 11), Rgba([200, 30, 30, 255]));
        // Empty cells stay fully transparent.
        assert_eq!(out.pixels().filter(|p| p[3] > 0).count(), 2);
    }

    #[test]
    fn test_crop_to_alpha() {
        let mut img = RgbaImage::new(12, 12);
        img.put_pixel(4, 5, RED);
        img.put_pixel(7, 9, RED);
        let cropped = crop_to_alpha(&img).unwrap();
        assert_eq!(cropped.dimensions(), (4, 5));
        assert_eq!(*cropped.get_pixel(0, 0), RED);

        assert!(crop_to_alpha(&RgbaImage::new(5, 5)).is_none());
    }

    #[test]
    fn test_concat_horizontal() {
        let left = RgbaImage::from_pixel(4, 6, RED);
        let right = RgbaImage::from_pixel(3, 4, GREEN);
        let out = concat_horizontal(&left, &right);
        assert_eq!(out.dimensions(), (7, 6));
        assert_eq!(*out.get_pixel(0, 0), RED);
        assert_eq!(*out.get_pixel(4, 0), GREEN);
        // Area below the shorter sheet stays transparent.
        assert_eq!(out.get_pixel(4, 5)[3], 0);
    }
}
