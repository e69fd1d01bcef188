use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::align::DEFAULT_SEARCH_RADIUS;

#[derive(Parser, Debug)]
#[command(name = "spritenorm")]
#[command(version, about = "Normalize sprite stills and grid sheets into game-ready assets")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Background strategy selector. Each mode carries its own default
/// distance tolerance.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Mode {
    /// Palette sampled from the image corners plus common grid backdrops
    Auto,
    /// Near-black backdrop, strict tolerance
    Black,
    /// Near-white backdrop, liberal tolerance
    White,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Make the backdrop of one or more stills transparent, in place
    RemoveBg {
        /// Input PNG image paths
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Background strategy
        #[arg(long, value_enum, default_value = "auto")]
        mode: Mode,

        /// Override the strategy's default color distance threshold
        #[arg(short, long)]
        tolerance: Option<u32>,

        /// Remove only the corner-connected backdrop region instead of
        /// classifying every pixel
        #[arg(long)]
        flood: bool,

        /// Erode a one-pixel border after removal to kill halos
        #[arg(long)]
        erode: bool,
    },

    /// Flood-fill the backdrop away, crop to content and resize
    ExtractAsset {
        /// Input PNG image path
        input: PathBuf,

        /// Output path
        output: PathBuf,

        /// Output size (longest side in pixels)
        #[arg(short = 's', long, default_value_t = 128)]
        target_size: u32,

        /// Exact output width, overrides --target-size
        #[arg(short = 'w', long)]
        target_width: Option<u32>,

        /// Color distance threshold for the flood fill
        #[arg(short, long, default_value_t = 50)]
        tolerance: u32,
    },

    /// Normalize a grid sheet into canonical square cells
    ExtractGrid {
        /// Input PNG sheet path
        input: PathBuf,

        /// Output path
        output: PathBuf,

        #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
        rows: u32,

        #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
        cols: u32,

        /// Keep only the first N columns of the input sheet
        #[arg(long)]
        limit_cols: Option<u32>,

        /// Canonical cell size in the output sheet
        #[arg(short = 's', long, default_value_t = 256)]
        target_size: u32,

        /// Fraction of each cell height reserved for text labels
        #[arg(long, default_value_t = 0.1)]
        margin_top: f64,

        /// Fraction of each cell width reserved for text labels
        #[arg(long, default_value_t = 0.15)]
        margin_left: f64,
    },

    /// Normalize a walk sheet (and optionally an attack sheet) and place
    /// them side by side
    Stitch {
        /// Walk sheet path
        walk: PathBuf,

        /// Output path
        output: PathBuf,

        /// Attack sheet path, appended to the right of the walk columns
        #[arg(long)]
        attack: Option<PathBuf>,

        #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
        rows: u32,

        #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
        cols: u32,

        /// Keep only the first N columns of each input sheet
        #[arg(long)]
        limit_cols: Option<u32>,

        /// Canonical cell size in the output sheet
        #[arg(short = 's', long, default_value_t = 256)]
        target_size: u32,

        /// Fraction of each cell height reserved for text labels
        #[arg(long, default_value_t = 0.1)]
        margin_top: f64,

        /// Fraction of each cell width reserved for text labels
        #[arg(long, default_value_t = 0.15)]
        margin_left: f64,
    },

    /// Align animation frames to frame 0 over a static bottom band, in place
    Align {
        /// Input PNG strip paths
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Number of frames in each strip
        #[arg(short, long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
        frames: u32,

        /// Fraction of the frame height, measured from the bottom,
        /// scored during alignment
        #[arg(long, default_value_t = 0.4)]
        roi: f64,

        /// Offset search radius in pixels
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_RADIUS)]
        radius: i32,
    },

    /// Transplant the static bottom region of frame 0 into every frame, in place
    Stabilize {
        /// Input PNG strip paths
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Number of frames in each strip
        #[arg(short, long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
        frames: u32,

        /// Fraction of the frame height where the static region begins
        #[arg(long, default_value_t = 0.45)]
        split: f64,
    },

    /// Clear leftover green and yellow fringe pixels, in place
    ScrubHalo {
        /// Input PNG image paths
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}
