//! Loading of segmentation overlay files.

mod palette;
mod segmentation;

pub use palette::{
    cell_color, fallback_color, tissue_color, FALLBACK_PALETTE, TISSUE_PALETTE,
};
pub use segmentation::{
    load_segmentation, load_segmentation_file, pb, SegmentationData,
};
