use image::{Rgba, RgbaImage};
use imageproc::rect::Rect;

/// Pixel value written over removed background.
pub const CLEARED: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Backdrop colors commonly baked into generated reference sheets:
/// pure white plus the light greys used for checkerboards and grid lines.
const GRID_BACKDROPS: [[u8; 3]; 5] = [
    [255, 255, 255],
    [236, 236, 234],
    [180, 180, 180],
    [204, 204, 204],
    [240, 240, 240],
];

fn rgb(pixel: &Rgba<u8>) -> [u8; 3] {
    [pixel[0], pixel[1], pixel[2]]
}

/// Squared Euclidean distance between two colors, alpha ignored.
pub fn squared_distance(a: [u8; 3], b: [u8; 3]) -> u32 {
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    (dr * dr + dg * dg + db * db) as u32
}

/// Euclidean distance between two colors, alpha ignored.
pub fn euclidean_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    (squared_distance(a, b) as f64).sqrt()
}

/// Per-pixel background decision shared by every removal tool.
pub trait BackgroundClassifier {
    fn is_background(&self, pixel: &Rgba<u8>) -> bool;
}

/// Classifies a pixel as background when it falls within a distance
/// tolerance of any color in a fixed palette.
#[derive(Debug, Clone)]
pub struct PaletteClassifier {
    colors: Vec<[u8; 3]>,
    tolerance_sq: u32,
}

impl PaletteClassifier {
    pub fn new(colors: Vec<[u8; 3]>, tolerance: u32) -> Self {
        Self {
            colors,
            tolerance_sq: tolerance * tolerance,
        }
    }

    /// Near-black backdrop. Strict default tolerance so dark forest
    /// sprites are not eaten.
    pub fn black(tolerance: Option<u32>) -> Self {
        Self::new(vec![[0, 0, 0]], tolerance.unwrap_or(10))
    }

    /// Near-white backdrop. Liberal default tolerance for compression
    /// artifacts around white.
    pub fn white(tolerance: Option<u32>) -> Self {
        Self::new(vec![[255, 255, 255]], tolerance.unwrap_or(60))
    }

    /// Palette sampled from the four image corners plus the common grid
    /// backdrop colors.
    pub fn corner_sampled(img: &RgbaImage, tolerance: Option<u32>) -> Self {
        let (w, h) = img.dimensions();
        let mut colors: Vec<[u8; 3]> = [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)]
            .iter()
            .map(|&(x, y)| rgb(img.get_pixel(x, y)))
            .collect();
        colors.extend(GRID_BACKDROPS);
        Self::new(colors, tolerance.unwrap_or(25))
    }
}

impl BackgroundClassifier for PaletteClassifier {
    fn is_background(&self, pixel: &Rgba<u8>) -> bool {
        let p = rgb(pixel);
        self.colors
            .iter()
            .any(|&c| squared_distance(p, c) < self.tolerance_sq)
    }
}

/// Chroma-key classifier whose reference color is sampled per grid cell.
///
/// Generated sheets rarely use one exact green, so the reference is the
/// brightest-green pixel among a handful of sample positions inside the
/// cell. Dark pixels are never background: shadows and dark fur must
/// survive even when they sit close to the reference in RGB space.
#[derive(Debug, Clone)]
pub struct AdaptiveClassifier {
    reference: [u8; 3],
    tolerance: f64,
    dark_protect: u8,
}

impl AdaptiveClassifier {
    pub const DEFAULT_TOLERANCE: f64 = 90.0;
    pub const DEFAULT_DARK_PROTECT: u8 = 80;

    /// Picks the sample with the highest green channel as the reference.
    /// Offsets are relative to the cell origin; samples landing outside
    /// the image are ignored. Falls back to pure green when nothing was
    /// readable.
    pub fn from_samples(img: &RgbaImage, cell: Rect, offsets: &[(u32, u32)]) -> Self {
        let mut reference = [0, 255, 0];
        let mut best_green = -1i32;
        for &(ox, oy) in offsets {
            let gx = cell.left() as u32 + ox;
            let gy = cell.top() as u32 + oy;
            if gx < img.width() && gy < img.height() {
                let sample = rgb(img.get_pixel(gx, gy));
                if sample[1] as i32 > best_green {
                    best_green = sample[1] as i32;
                    reference = sample;
                }
            }
        }
        Self {
            reference,
            tolerance: Self::DEFAULT_TOLERANCE,
            dark_protect: Self::DEFAULT_DARK_PROTECT,
        }
    }

    pub fn reference(&self) -> [u8; 3] {
        self.reference
    }
}

impl BackgroundClassifier for AdaptiveClassifier {
    fn is_background(&self, pixel: &Rgba<u8>) -> bool {
        let [r, g, b] = rgb(pixel);
        // Dark protection comes before every other rule.
        if g < self.dark_protect {
            return false;
        }
        if euclidean_distance([r, g, b], self.reference) < self.tolerance {
            return true;
        }
        // Dominant-green safety net for pixels the distance test missed.
        g as i32 > r as i32 + 40 && g as i32 > b as i32 + 40
    }
}

/// Clears every pixel the classifier marks as background. Surviving
/// pixels keep their alpha. Returns the number of opaque pixels left.
pub fn remove_background<C: BackgroundClassifier>(img: &mut RgbaImage, classifier: &C) -> usize {
    let mut remaining = 0;
    for pixel in img.pixels_mut() {
        if classifier.is_background(pixel) {
            *pixel = CLEARED;
        } else if pixel[3] > 0 {
            remaining += 1;
        }
    }
    remaining
}

/// Removes the contiguous background region reachable from the image
/// corners.
///
/// The reference color is sampled at (0, 0); a corner seeds the fill only
/// if it lies within `tolerance` of that reference. The traversal is a
/// 4-connected iterative worklist, and every comparison is against the
/// original reference color, so an enclosed background-colored region
/// that no seed can reach stays opaque. Returns the number of pixels
/// cleared.
pub fn flood_fill_remove(img: &mut RgbaImage, tolerance: f64) -> usize {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return 0;
    }
    let reference = rgb(img.get_pixel(0, 0));

    let mut visited = vec![false; (w * h) as usize];
    let mut stack = Vec::new();
    for (sx, sy) in [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)] {
        let idx = (sy * w + sx) as usize;
        if !visited[idx] && euclidean_distance(rgb(img.get_pixel(sx, sy)), reference) < tolerance {
            visited[idx] = true;
            stack.push((sx, sy));
        }
    }

    let mut removed = 0;
    while let Some((x, y)) = stack.pop() {
        img.put_pixel(x, y, CLEARED);
        removed += 1;

        let (x, y) = (x as i64, y as i64);
        for (nx, ny) in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
            if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                continue;
            }
            let (nx, ny) = (nx as u32, ny as u32);
            let idx = (ny * w + nx) as usize;
            if !visited[idx]
                && euclidean_distance(rgb(img.get_pixel(nx, ny)), reference) < tolerance
            {
                visited[idx] = true;
                stack.push((nx, ny));
            }
        }
    }
    removed
}

/// Clamps the green channel of a green-dominant pixel to max(red, blue),
/// neutralizing the fringe left by anti-aliasing against a chroma key.
pub fn despill(pixel: Rgba<u8>) -> Rgba<u8> {
    let Rgba([r, g, b, a]) = pixel;
    if g > r && g > b {
        Rgba([r, r.max(b), b, a])
    } else {
        pixel
    }
}

/// One-pixel erosion: any opaque pixel with a transparent 4-neighbor, or
/// sitting on the image edge, becomes transparent. Kills residual halo
/// borders after removal. Returns the number of pixels cleared.
pub fn erode_border(img: &mut RgbaImage) -> usize {
    let (w, h) = img.dimensions();
    let snapshot = img.clone();
    let mut cleared = 0;

    for y in 0..h {
        for x in 0..w {
            if snapshot.get_pixel(x, y)[3] == 0 {
                continue;
            }
            let (xi, yi) = (x as i64, y as i64);
            let is_border = [(xi - 1, yi), (xi + 1, yi), (xi, yi - 1), (xi, yi + 1)]
                .iter()
                .any(|&(nx, ny)| {
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        true
                    } else {
                        snapshot.get_pixel(nx as u32, ny as u32)[3] == 0
                    }
                });
            if is_border {
                img.put_pixel(x, y, CLEARED);
                cleared += 1;
            }
        }
    }
    cleared
}

/// Clears leftover chroma fringe on an already-processed sprite: bright
/// yellow-green halo pixels that earlier passes missed. Near-transparent
/// pixels are left alone. Returns the number of pixels cleared.
pub fn scrub_halo(img: &mut RgbaImage) -> usize {
    let mut cleared = 0;
    for pixel in img.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a < 10 {
            continue;
        }
        // Gate on the yellow-ish family: high red and green, low blue.
        if !(r > 100 && g > 100 && b < 100) {
            continue;
        }
        let (ri, gi, bi) = (r as i32, g as i32, b as i32);
        // Green-screen leftovers.
        if gi > ri + 20 && gi > bi + 20 {
            *pixel = CLEARED;
            cleared += 1;
            continue;
        }
        // Yellow border artifacts: red and green dominate blue and sit
        // close to each other, and the pixel is not a dark shadow.
        if ri > bi + 30 && gi > bi + 30 && (ri - gi).abs() < 50 && r > 50 {
            *pixel = CLEARED;
            cleared += 1;
        }
    }
    cleared
}

/// Number of pixels with non-zero alpha.
pub fn opaque_pixels(img: &RgbaImage) -> usize {
    img.pixels().filter(|p| p[3] > 0).count()
}
