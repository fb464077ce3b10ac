//! Composite video artifacting for 8-bit home computer video output.
//!
//! The engine turns scanlines of indexed pixels (`chroma << 4 | luma`) into
//! 32-bit `0x00RRGGBB` pixels, simulating the chroma/luma crosstalk of NTSC
//! and PAL television decoders, the PAL delay-line comb, and frame-to-frame
//! blending including monochrome phosphor persistence.

mod blend;
mod color;
mod color_tables;
mod engine;
mod error;
pub mod filter;
mod ntsc;
mod ntsc_hi;
mod pal_hi;
pub mod palette;
mod params;

pub use blend::MonoPersistence;
pub use engine::{ArtifactingEngine, FrameMode};
pub use error::ArtifactingError;
pub use filter::FilterKernel;
pub use ntsc_hi::{NtscLayout, Twin};
pub use palette::GeneratedPalette;
pub use params::{
    ArtifactingParams, ColorMatchingMode, ColorParams, LumaRampMode, MonitorMode, PalPhaseInfo,
    PAL_PHASE_LOOKUP,
};

/// Samples per scanline at the 7MHz pixel clock.
pub const SCANLINE_SAMPLES: usize = 456;
/// Maximum number of scanlines retained for frame blending.
pub const MAX_SCANLINES: usize = 312;

const LEFT_BORDER_7MHZ: usize = 34 * 2;
const RIGHT_BORDER_7MHZ: usize = 222 * 2;
const LEFT_BORDER_14MHZ: usize = LEFT_BORDER_7MHZ * 2;
const RIGHT_BORDER_14MHZ: usize = RIGHT_BORDER_7MHZ * 2;
const LEFT_BORDER_7MHZ_4: usize = LEFT_BORDER_7MHZ & !3;
const RIGHT_BORDER_7MHZ_4: usize = (RIGHT_BORDER_7MHZ + 3) & !3;
const LEFT_BORDER_14MHZ_4: usize = LEFT_BORDER_14MHZ & !3;
const RIGHT_BORDER_14MHZ_4: usize = (RIGHT_BORDER_14MHZ + 3) & !3;
