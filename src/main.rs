use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use image::{ImageFormat, ImageReader, RgbaImage};

use spritenorm::{
    align_frames, concat_horizontal, crop_to_alpha, erode_border, extract_grid,
    flood_fill_remove, opaque_pixels, remove_background, resize_to_fit, resize_to_width,
    scrub_halo, stabilize_absolute, AnimationStrip, Cli, Command, GridLayout, Mode,
    PaletteClassifier, RoiBand,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::RemoveBg {
            files,
            mode,
            tolerance,
            flood,
            erode,
        } => batch(&files, |path| remove_bg_file(path, mode, tolerance, flood, erode)),

        Command::ExtractAsset {
            input,
            output,
            target_size,
            target_width,
            tolerance,
        } => extract_asset(&input, &output, target_size, target_width, tolerance),

        Command::ExtractGrid {
            input,
            output,
            rows,
            cols,
            limit_cols,
            target_size,
            margin_top,
            margin_left,
        } => {
            let sheet = normalize_sheet(
                &input, rows, cols, limit_cols, target_size, margin_top, margin_left,
            )?;
            save_atomic(&sheet, &output)?;
            eprintln!(
                "Saved normalized sheet: {:?} ({}x{})",
                output,
                sheet.width(),
                sheet.height()
            );
            Ok(())
        }

        Command::Stitch {
            walk,
            output,
            attack,
            rows,
            cols,
            limit_cols,
            target_size,
            margin_top,
            margin_left,
        } => {
            eprintln!("Processing walk sheet...");
            let walk_sheet = normalize_sheet(
                &walk, rows, cols, limit_cols, target_size, margin_top, margin_left,
            )?;
            let combined = match attack {
                Some(attack) => {
                    eprintln!("Processing attack sheet...");
                    let attack_sheet = normalize_sheet(
                        &attack, rows, cols, limit_cols, target_size, margin_top, margin_left,
                    )?;
                    concat_horizontal(&walk_sheet, &attack_sheet)
                }
                None => walk_sheet,
            };
            save_atomic(&combined, &output)?;
            eprintln!(
                "Saved combined sheet: {:?} ({}x{})",
                output,
                combined.width(),
                combined.height()
            );
            Ok(())
        }

        Command::Align {
            files,
            frames,
            roi,
            radius,
        } => {
            ensure!(roi > 0.0 && roi <= 1.0, "--roi must be in (0, 1]");
            ensure!(radius > 0, "--radius must be positive");
            batch(&files, |path| align_file(path, frames, roi, radius))
        }

        Command::Stabilize {
            files,
            frames,
            split,
        } => {
            ensure!(
                (0.0..=1.0).contains(&split),
                "--split must be in [0, 1]"
            );
            batch(&files, |path| stabilize_file(path, frames, split))
        }

        Command::ScrubHalo { files } => batch(&files, |path| {
            let mut img = load_rgba(path)?;
            let cleared = scrub_halo(&mut img);
            save_atomic(&img, path)?;
            eprintln!("Cleared {} fringe pixels in {:?}", cleared, path);
            Ok(())
        }),
    }
}

/// Runs `op` on every file. A failure is logged and the batch moves on;
/// the command only fails at the end, once every file had its chance.
fn batch(files: &[PathBuf], mut op: impl FnMut(&Path) -> Result<()>) -> Result<()> {
    let mut failures = 0usize;
    for path in files {
        if let Err(err) = op(path) {
            eprintln!("Error processing {:?}: {:#}", path, err);
            failures += 1;
        }
    }
    ensure!(
        failures == 0,
        "{} of {} file(s) failed",
        failures,
        files.len()
    );
    Ok(())
}

fn load_rgba(path: &Path) -> Result<RgbaImage> {
    let img = ImageReader::open(path)
        .with_context(|| format!("Failed to open input file: {:?}", path))?
        .decode()
        .with_context(|| format!("Failed to decode image: {:?}", path))?;
    Ok(img.to_rgba8())
}

/// Saves next to the destination and renames into place, so an aborted
/// save never leaves a previously-good file truncated.
fn save_atomic(img: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
        }
    }

    let tmp = path.with_extension("png.tmp");
    img.save_with_format(&tmp, ImageFormat::Png)
        .with_context(|| format!("Failed to save output: {:?}", tmp))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move output into place: {:?}", path))?;
    Ok(())
}

fn remove_bg_file(
    path: &Path,
    mode: Mode,
    tolerance: Option<u32>,
    flood: bool,
    erode: bool,
) -> Result<()> {
    let mut img = load_rgba(path)?;

    if flood {
        flood_fill_remove(&mut img, tolerance.map(f64::from).unwrap_or(50.0));
    } else {
        let classifier = match mode {
            Mode::Black => PaletteClassifier::black(tolerance),
            Mode::White => PaletteClassifier::white(tolerance),
            Mode::Auto => PaletteClassifier::corner_sampled(&img, tolerance),
        };
        remove_background(&mut img, &classifier);
    }
    if erode {
        erode_border(&mut img);
    }

    if opaque_pixels(&img) == 0 {
        eprintln!(
            "Skipping {:?}: background removal left no opaque pixels",
            path
        );
        return Ok(());
    }

    save_atomic(&img, path)?;
    eprintln!("Processed: {:?}", path);
    Ok(())
}

fn extract_asset(
    input: &Path,
    output: &Path,
    target_size: u32,
    target_width: Option<u32>,
    tolerance: u32,
) -> Result<()> {
    let mut img = load_rgba(input)?;
    flood_fill_remove(&mut img, tolerance as f64);

    let Some(cropped) = crop_to_alpha(&img) else {
        eprintln!(
            "Skipping {:?}: image is empty after background removal",
            input
        );
        return Ok(());
    };

    let resized = match target_width {
        Some(width) => resize_to_width(&cropped, width),
        None => resize_to_fit(&cropped, target_size),
    };
    save_atomic(&resized, output)?;
    eprintln!(
        "Saved processed asset: {:?} ({}x{})",
        output,
        resized.width(),
        resized.height()
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn normalize_sheet(
    input: &Path,
    rows: u32,
    cols: u32,
    limit_cols: Option<u32>,
    target_size: u32,
    margin_top: f64,
    margin_left: f64,
) -> Result<RgbaImage> {
    let img = load_rgba(input)?;
    let layout =
        GridLayout::new(img.width(), img.height(), rows, cols).with_label_margins(margin_top, margin_left);
    ensure!(
        layout.cell_width > 0 && layout.cell_height > 0,
        "{}x{} grid is too fine for a {}x{} sheet",
        rows,
        cols,
        img.width(),
        img.height()
    );
    Ok(extract_grid(&img, &layout, limit_cols, target_size))
}

fn align_file(path: &Path, frames: u32, roi: f64, radius: i32) -> Result<()> {
    let img = load_rgba(path)?;
    let strip = AnimationStrip::from_sheet(&img, frames)?;
    let offsets = align_frames(&strip, RoiBand::bottom_fraction(roi), radius);
    for (i, offset) in offsets.iter().enumerate().skip(1) {
        eprintln!("Frame {} offset: ({}, {})", i, offset.dx, offset.dy);
    }
    save_atomic(&strip.reassemble(&offsets), path)?;
    eprintln!("Aligned: {:?}", path);
    Ok(())
}

fn stabilize_file(path: &Path, frames: u32, split: f64) -> Result<()> {
    let img = load_rgba(path)?;
    let strip = AnimationStrip::from_sheet(&img, frames)?;
    save_atomic(&stabilize_absolute(&strip, split), path)?;
    eprintln!("Stabilized: {:?}", path);
    Ok(())
}
