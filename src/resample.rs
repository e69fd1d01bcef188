use image::{Rgba, RgbaImage};

/// Premultiply alpha: RGB values are multiplied by alpha
fn premultiply_alpha(img: &RgbaImage) -> Vec<[f64; 4]> {
    let (width, height) = img.dimensions();
    let mut result = Vec::with_capacity((width * height) as usize);

    for y in 0..height {
        for x in 0..width {
            let pixel = img.get_pixel(x, y);
            let alpha = pixel[3] as f64 / 255.0;
            result.push([
                pixel[0] as f64 * alpha,
                pixel[1] as f64 * alpha,
                pixel[2] as f64 * alpha,
                pixel[3] as f64,
            ]);
        }
    }

    result
}

/// Unpremultiply alpha: divide RGB by alpha
fn unpremultiply_alpha(premultiplied: [f64; 4]) -> Rgba<u8> {
    let alpha = premultiplied[3];
    if alpha < 1.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let alpha_norm = alpha / 255.0;
    let r = (premultiplied[0] / alpha_norm).clamp(0.0, 255.0) as u8;
    let g = (premultiplied[1] / alpha_norm).clamp(0.0, 255.0) as u8;
    let b = (premultiplied[2] / alpha_norm).clamp(0.0, 255.0) as u8;
    let a = alpha.clamp(0.0, 255.0) as u8;

    Rgba([r, g, b, a])
}

/// Cubic interpolation kernel (Catmull-Rom)
fn cubic_weight(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;

    [
        -0.5 * t3 + t2 - 0.5 * t,
        1.5 * t3 - 2.5 * t2 + 1.0,
        -1.5 * t3 + 2.0 * t2 + 0.5 * t,
        0.5 * t3 - 0.5 * t2,
    ]
}

/// Bicubic interpolation at a given position
fn bicubic_interpolate(
    premultiplied: &[[f64; 4]],
    width: u32,
    height: u32,
    x: f64,
    y: f64,
) -> [f64; 4] {
    let x_floor = x.floor() as i32;
    let y_floor = y.floor() as i32;
    let x_frac = x - x.floor();
    let y_frac = y - y.floor();

    let wx = cubic_weight(x_frac);
    let wy = cubic_weight(y_frac);

    let mut result = [0.0; 4];

    for j in 0..4 {
        for i in 0..4 {
            let px = (x_floor + i as i32 - 1).clamp(0, width as i32 - 1) as u32;
            let py = (y_floor + j as i32 - 1).clamp(0, height as i32 - 1) as u32;
            let idx = (py * width + px) as usize;

            let weight = wx[i] * wy[j];
            for c in 0..4 {
                result[c] += premultiplied[idx][c] * weight;
            }
        }
    }

    result
}

/// Resample an image by a uniform scale factor with premultiplied-alpha
/// bicubic interpolation.
fn resize_scaled(img: &RgbaImage, scale: f64) -> RgbaImage {
    let (width, height) = img.dimensions();
    let new_width = ((width as f64 * scale).round() as u32).max(1);
    let new_height = ((height as f64 * scale).round() as u32).max(1);

    // Premultiply alpha for correct interpolation
    let premultiplied = premultiply_alpha(img);

    let mut output = RgbaImage::new(new_width, new_height);

    for out_y in 0..new_height {
        for out_x in 0..new_width {
            // Map output coordinates to source coordinates
            let src_x = (out_x as f64 + 0.5) / scale - 0.5;
            let src_y = (out_y as f64 + 0.5) / scale - 0.5;

            let interpolated = bicubic_interpolate(&premultiplied, width, height, src_x, src_y);
            let pixel = unpremultiply_alpha(interpolated);
            output.put_pixel(out_x, out_y, pixel);
        }
    }

    output
}

/// Resize image so that the longest side equals target_size
pub fn resize_to_fit(img: &RgbaImage, target_size: u32) -> RgbaImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }
    resize_scaled(img, target_size as f64 / width.max(height) as f64)
}

/// Resize image to an exact width, keeping the aspect ratio
pub fn resize_to_width(img: &RgbaImage, target_width: u32) -> RgbaImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }
    resize_scaled(img, target_width as f64 / width as f64)
}
