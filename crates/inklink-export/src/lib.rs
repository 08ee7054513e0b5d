//! inklink-export: static preview rendering.

pub mod overlay;
pub mod svg;

pub use overlay::{GroupOverlay, NormalizedRect, group_bounds, group_overlays};
pub use svg::{render_preview, render_preview_uri, save_preview, svg_data_uri};
