#![allow(dead_code)]

use artifacting::{ArtifactingEngine, ColorParams, FrameMode, MonitorMode, SCANLINE_SAMPLES};
use glam::Vec3;

pub const LINES: u32 = 8;

#[derive(Debug, Copy, Clone)]
pub enum Pattern {
    Flat(u8),
    /// alternating luma columns of the given chroma
    Stripes(u8),
    /// every hue at increasing luma
    Bars,
}

impl Pattern {
    pub fn line(&self, y: u32) -> Vec<u8> {
        (0..SCANLINE_SAMPLES)
            .map(|x| match *self {
                Pattern::Flat(px) => px,
                Pattern::Stripes(chroma) => chroma << 4 | if x & 1 == 0 { 0x0e } else { 0x02 },
                Pattern::Bars => ((x / 28) as u8 & 15) << 4 | ((x / 4 + y as usize) & 15) as u8,
            })
            .collect()
    }
}

pub fn engine() -> ArtifactingEngine {
    ArtifactingEngine::new().unwrap()
}

pub fn pal_engine() -> ArtifactingEngine {
    let mut engine = engine();
    engine
        .set_color_params(&ColorParams::pal(), None, None, MonitorMode::Color, 0)
        .unwrap();
    engine
}

pub fn mono_engine(monitor: MonitorMode) -> ArtifactingEngine {
    let mut engine = engine();
    let tint = monitor.phosphor().map(|rgb| {
        Vec3::new(
            (rgb >> 16 & 0xff) as f32,
            (rgb >> 8 & 0xff) as f32,
            (rgb & 0xff) as f32,
        ) / 255.0
    });
    engine
        .set_color_params(&ColorParams::ntsc(), None, tint, monitor, 0)
        .unwrap();
    engine
}

/// Renders one frame of `pattern` through `artifact8`.
pub fn render(
    engine: &mut ArtifactingEngine,
    mode: &FrameMode,
    pattern: Pattern,
    hires: bool,
    temporary: bool,
    include_hblank: bool,
) -> Vec<Vec<u32>> {
    engine.begin_frame(mode);
    (0..LINES)
        .map(|y| {
            let mut dst = vec![0; SCANLINE_SAMPLES * 2];
            engine.artifact8(y, &mut dst, &pattern.line(y), hires, temporary, include_hblank);
            dst.truncate(engine.output_width());
            dst
        })
        .collect()
}

pub fn render_frame(engine: &mut ArtifactingEngine, mode: &FrameMode, pattern: Pattern) -> Vec<Vec<u32>> {
    render(engine, mode, pattern, true, false, true)
}

pub fn chroma_hi(pal: bool) -> FrameMode {
    FrameMode {
        pal,
        chroma_artifacts: true,
        chroma_artifacts_hi: true,
        ..FrameMode::default()
    }
}

pub fn blending(blend_in: bool) -> FrameMode {
    FrameMode {
        blend_in,
        blend_out: true,
        ..FrameMode::default()
    }
}
