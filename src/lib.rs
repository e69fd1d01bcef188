pub mod align;
pub mod background;
pub mod cli;
pub mod grid;
pub mod resample;

pub use align::{
    align_frames, stabilize_absolute, AnimationStrip, FrameOffset, RoiBand, DEFAULT_SEARCH_RADIUS,
};
pub use background::{
    despill, erode_border, flood_fill_remove, opaque_pixels, remove_background, scrub_halo,
    AdaptiveClassifier, BackgroundClassifier, PaletteClassifier,
};
pub use cli::{Cli, Command, Mode};
pub use grid::{
    concat_horizontal, content_bounds, crop_to_alpha, extract_grid, recenter_content,
    ContentBounds, GridLayout, RecenterOptions,
};
pub use resample::{resize_to_fit, resize_to_width};
