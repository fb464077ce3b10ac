use glam::{Mat3, Vec3};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::blend::{average, Access, Blend, FrameHistory, MonoPersistence};
use crate::color::compress_range;
use crate::color_tables::{ColorTables, TableConfig};
use crate::ntsc::ArtifactScan;
use crate::ntsc_hi::{NtscHiTables, NtscLayout};
use crate::pal_hi::{pal32, PalDelayLines, PalHiTables};
use crate::{
    ArtifactingError, ArtifactingParams, ColorParams, GeneratedPalette, MonitorMode, LEFT_BORDER_14MHZ,
    LEFT_BORDER_14MHZ_4, LEFT_BORDER_7MHZ, LEFT_BORDER_7MHZ_4, MAX_SCANLINES, RIGHT_BORDER_14MHZ,
    RIGHT_BORDER_14MHZ_4, RIGHT_BORDER_7MHZ, RIGHT_BORDER_7MHZ_4, SCANLINE_SAMPLES,
};

/// Per-frame rendering mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameMode {
    pub pal: bool,
    pub chroma_artifacts: bool,
    /// full signal simulation instead of the per-pixel heuristic
    pub chroma_artifacts_hi: bool,
    /// blend against the stored previous frame, otherwise only store it
    pub blend_in: bool,
    /// enable frame blending
    pub blend_out: bool,
    pub blend_linear: bool,
    pub blend_mono_persistence: bool,
    pub bypass_output_correction: bool,
    pub expanded_range_input: bool,
    pub expanded_range_output: bool,
    pub deinterlacing: bool,
}

impl FrameMode {
    /// Blend flags only take effect while blending is enabled.
    fn effective(mut self) -> FrameMode {
        self.blend_linear &= self.blend_out;
        self.blend_mono_persistence &= self.blend_out;
        self
    }

    fn restore_from(&mut self, saved: &FrameMode) {
        self.pal = saved.pal;
        self.chroma_artifacts = saved.chroma_artifacts;
        self.chroma_artifacts_hi = saved.chroma_artifacts_hi;
        self.bypass_output_correction = saved.bypass_output_correction;
        self.blend_out = saved.blend_out;
        self.blend_in = saved.blend_in;
        self.blend_linear = saved.blend_linear;
        self.expanded_range_input = saved.expanded_range_input;
        self.expanded_range_output = saved.expanded_range_output;
    }

    fn wide_output(&self) -> bool {
        self.chroma_artifacts && self.chroma_artifacts_hi
    }
}

enum HiTables {
    Pal(PalHiTables),
    Ntsc(NtscHiTables),
}

struct BuiltHiTables {
    tables: HiTables,
    signed: bool,
}

/// Composite video artifacting for one video output.
///
/// Call [`set_color_params`](Self::set_color_params) when the color
/// configuration changes, [`begin_frame`](Self::begin_frame) at the start of
/// each frame, then [`artifact8`](Self::artifact8) or
/// [`artifact32`](Self::artifact32) once per scanline.
pub struct ArtifactingEngine {
    color_params: ColorParams,
    artifacting_params: ArtifactingParams,
    monitor: MonitorMode,
    pal_phase: u32,
    tint: Option<Vec3>,
    color_correction: Option<Mat3>,

    tables: ColorTables,
    hi_tables: Option<BuiltHiTables>,
    table_builds: u64,
    ntsc_layout: NtscLayout,

    mode: FrameMode,
    saved_mode: Option<FrameMode>,
    persistence: MonoPersistence,

    pal_delay: PalDelayLines,
    pal_delay32: Vec<[u8; 4]>,
    history_7mhz: FrameHistory,
    history_14mhz: FrameHistory,
}

impl ArtifactingEngine {
    /// Creates an engine configured with the NTSC defaults on a color
    /// monitor. Fails if the frame history cannot be allocated.
    pub fn new() -> Result<ArtifactingEngine, ArtifactingError> {
        let color_params = ColorParams::default();
        let monitor = MonitorMode::Color;
        let tables = ColorTables::build(TableConfig {
            params: &color_params,
            monitor,
            tint: None,
            color_correction: false,
            mono_persistence: false,
        });

        Ok(ArtifactingEngine {
            color_params,
            artifacting_params: ArtifactingParams::default(),
            monitor,
            pal_phase: 0,
            tint: None,
            color_correction: None,
            tables,
            hi_tables: None,
            table_builds: 0,
            ntsc_layout: NtscLayout::detect(),
            mode: FrameMode::default(),
            saved_mode: None,
            persistence: MonoPersistence::default(),
            pal_delay: PalDelayLines::new(),
            pal_delay32: vec![[0; 4]; SCANLINE_SAMPLES * 2],
            history_7mhz: FrameHistory::try_new(SCANLINE_SAMPLES)?,
            history_14mhz: FrameHistory::try_new(SCANLINE_SAMPLES * 2)?,
        })
    }

    /// Replaces the color configuration and regenerates the palettes. The
    /// high artifacting tables are rebuilt at the next frame.
    ///
    /// `tint` selects monochrome output and requires a monochrome
    /// `monitor`. The correction matrix is applied by the caller; its
    /// presence disables the engine's own gamma correction of the palette.
    pub fn set_color_params(
        &mut self,
        params: &ColorParams,
        correction: Option<Mat3>,
        tint: Option<Vec3>,
        monitor: MonitorMode,
        pal_phase: u32,
    ) -> Result<(), ArtifactingError> {
        if tint.is_some() && !monitor.is_mono() {
            return Err(ArtifactingError::TintWithColorMonitor { monitor });
        }
        if correction.is_some() && monitor.is_mono() {
            return Err(ArtifactingError::CorrectionWithMonoMonitor { monitor });
        }
        if !params.gamma_correct.is_finite() || params.gamma_correct <= 0.0 {
            return Err(ArtifactingError::InvalidGamma(params.gamma_correct));
        }

        self.color_params = *params;
        self.color_correction = correction;
        self.tint = tint;
        self.monitor = monitor;
        self.pal_phase = pal_phase;
        self.rebuild_color_tables();

        Ok(())
    }

    pub fn color_params(&self) -> &ColorParams {
        &self.color_params
    }

    pub fn monitor(&self) -> MonitorMode {
        self.monitor
    }

    pub fn color_correction(&self) -> Option<Mat3> {
        self.color_correction
    }

    pub fn set_artifacting_params(&mut self, params: &ArtifactingParams) {
        self.artifacting_params = *params;
        self.hi_tables = None;
    }

    pub fn artifacting_params(&self) -> &ArtifactingParams {
        &self.artifacting_params
    }

    fn rebuild_color_tables(&mut self) {
        self.tables = ColorTables::build(TableConfig {
            params: &self.color_params,
            monitor: self.monitor,
            tint: self.tint,
            color_correction: self.color_correction.is_some(),
            mono_persistence: self.mode.blend_mono_persistence,
        });
        self.hi_tables = None;
    }

    fn hi_tables_current(&self) -> bool {
        match &self.hi_tables {
            Some(built) => {
                let kind = matches!(
                    (&built.tables, self.mode.pal),
                    (HiTables::Pal(_), true) | (HiTables::Ntsc(_), false)
                );
                kind && built.signed == self.mode.expanded_range_output
            }
            None => false,
        }
    }

    fn prepare_hi_tables(&mut self) {
        if self.hi_tables_current() {
            return;
        }

        let signed = self.mode.expanded_range_output;
        let tint = self.tables.is_tinted();
        let tables = if self.mode.pal {
            HiTables::Pal(PalHiTables::build(&self.color_params, self.pal_phase, tint, signed))
        } else {
            HiTables::Ntsc(NtscHiTables::build(&self.color_params, tint, signed))
        };

        self.table_builds += 1;
        tracing::debug!(
            pal = self.mode.pal,
            signed,
            builds = self.table_builds,
            "rebuilt high artifacting tables"
        );

        self.hi_tables = Some(BuiltHiTables { tables, signed });
    }

    /// Sets the rendering mode for the next frame, rebuilding any stale
    /// tables and resetting the PAL delay lines.
    pub fn begin_frame(&mut self, mode: &FrameMode) {
        self.mode = mode.effective();

        if self.mode.blend_mono_persistence {
            let dt = if self.mode.pal { 1.0 / 50.0 } else { 1.0 / 60.0 };
            self.persistence = MonoPersistence::new(dt);
            tracing::debug!(limit = self.persistence.limit, "mono persistence");
        }

        if self.mode.blend_mono_persistence != self.tables.mono_persistence {
            self.rebuild_color_tables();
        }

        if self.mode.chroma_artifacts && self.mode.chroma_artifacts_hi {
            self.prepare_hi_tables();
            if self.mode.pal {
                self.pal_delay.reset();
            }
        } else if self.mode.pal && self.mode.chroma_artifacts {
            self.pal_delay32.fill([0; 4]);
        }
    }

    /// Saves the mode so a temporary configuration can be used until
    /// [`resume_frame`](Self::resume_frame).
    pub fn suspend_frame(&mut self) {
        self.saved_mode = Some(self.mode);
    }

    pub fn resume_frame(&mut self) {
        if let Some(saved) = self.saved_mode.take() {
            self.mode.restore_from(&saved);
        }
    }

    pub fn frame_mode(&self) -> &FrameMode {
        &self.mode
    }

    /// Number of times the high artifacting tables were built.
    pub fn table_builds(&self) -> u64 {
        self.table_builds
    }

    pub fn ntsc_layout(&self) -> NtscLayout {
        self.ntsc_layout
    }

    pub fn set_ntsc_layout(&mut self, layout: NtscLayout) {
        self.ntsc_layout = layout;
    }

    pub fn mono_persistence(&self) -> MonoPersistence {
        self.persistence
    }

    pub fn palette(&self) -> &[u32; 256] {
        &self.tables.palette
    }

    pub fn signed_palette(&self) -> &[u32; 256] {
        &self.tables.signed_palette
    }

    pub fn corrected_palette(&self) -> &[u32; 256] {
        &self.tables.corrected_palette
    }

    pub fn corrected_signed_palette(&self) -> &[u32; 256] {
        &self.tables.corrected_signed_palette
    }

    pub fn mono_table(&self) -> &[u32; 256] {
        &self.tables.mono_table
    }

    pub fn mono_persistence_table(&self) -> &[u32; 1024] {
        &self.tables.mono_persistence_table
    }

    pub fn is_gamma_identity(&self) -> bool {
        self.tables.gamma_identity
    }

    /// Palette for generic display paths, generated from the current color
    /// configuration.
    pub fn generated_palette(&self) -> GeneratedPalette {
        GeneratedPalette::generate(&self.color_params, self.monitor)
    }

    /// Pixels written by [`artifact8`](Self::artifact8) in the current mode.
    pub fn output_width(&self) -> usize {
        if self.mode.wide_output() {
            SCANLINE_SAMPLES * 2
        } else {
            SCANLINE_SAMPLES
        }
    }

    fn gamma_correct(&self, pixels: &mut [u32]) {
        if !self.mode.bypass_output_correction && !self.tables.gamma_identity {
            self.tables.gamma_correct(pixels);
        }
    }

    fn blit(&self, dst: &mut [u32], src: &[u8], hires: bool) {
        let palette = if self.mode.bypass_output_correction {
            &self.tables.palette
        } else {
            &self.tables.corrected_palette
        };

        if hires {
            for (px, &p) in dst.iter_mut().zip(src) {
                *px = palette[p as usize];
            }
        } else {
            for (pair, &p) in dst.chunks_exact_mut(2).zip(src.iter().step_by(2)) {
                pair.fill(palette[p as usize]);
            }
        }
    }

    fn artifact_ntsc(&self, dst: &mut [u32], src: &[u8], hires: bool, include_hblank: bool) {
        if !hires {
            self.blit(dst, src, false);
            return;
        }

        let Some(scan) = ArtifactScan::detect(src) else {
            self.blit(dst, src, true);
            return;
        };

        scan.render(&self.tables, dst, src, self.mode.expanded_range_output);
        if include_hblank {
            self.gamma_correct(dst);
        } else {
            self.gamma_correct(&mut dst[LEFT_BORDER_7MHZ..RIGHT_BORDER_7MHZ]);
        }
    }

    fn artifact_hi(&mut self, y: usize, dst: &mut [u32], src: &[u8], hires: bool, include_hblank: bool) {
        self.prepare_hi_tables();

        let tinted = self.tables.is_tinted();
        match self.hi_tables.as_ref().map(|built| &built.tables) {
            Some(HiTables::Pal(tables)) => {
                let mono = tinted.then_some(&self.tables.mono_table);
                tables.artifact(&mut self.pal_delay, dst, src, y & 1 != 0, mono);
                self.gamma_correct(dst);
            }
            Some(HiTables::Ntsc(tables)) => {
                let mono = (tinted && !self.mode.blend_mono_persistence).then_some(&self.tables.mono_table);
                tables.render(self.ntsc_layout, dst, src, hires, include_hblank, mono);
                if include_hblank {
                    self.gamma_correct(dst);
                } else {
                    self.gamma_correct(&mut dst[LEFT_BORDER_14MHZ..RIGHT_BORDER_14MHZ]);
                }
            }
            None => {}
        }
    }

    fn blend_row(&mut self, y: usize, dst: &mut [u32], range: std::ops::Range<usize>, temporary: bool) {
        let access = match (self.mode.blend_in, temporary) {
            (false, true) => return,
            (false, false) => Access::Copy,
            (true, true) => Access::Const,
            (true, false) => Access::Exchange,
        };

        let blend = if self.mode.blend_mono_persistence {
            Blend::Persistence {
                decay: self.persistence,
                ramp: &self.tables.mono_persistence_table,
            }
        } else if self.mode.blend_linear {
            Blend::Linear {
                extended_range: self.mode.expanded_range_output,
            }
        } else {
            Blend::Average
        };

        let history = if dst.len() > SCANLINE_SAMPLES {
            &mut self.history_14mhz
        } else {
            &mut self.history_7mhz
        };
        debug_assert!(range.end <= history.width());

        blend.apply(access, &mut dst[range.clone()], history.row(y, range));
    }

    /// Converts one scanline of `chroma << 4 | luma` pixels to RGB.
    ///
    /// `src` holds [`SCANLINE_SAMPLES`] pixels; for lines without hires
    /// pixels only the even ones are read. `dst` receives
    /// [`output_width`](Self::output_width) pixels. Frame blending is
    /// applied for `y` below [`MAX_SCANLINES`]; a `temporary` update blends
    /// without storing the line.
    pub fn artifact8(
        &mut self,
        y: u32,
        dst: &mut [u32],
        src: &[u8],
        hires: bool,
        temporary: bool,
        include_hblank: bool,
    ) {
        let width = self.output_width();
        if src.len() < SCANLINE_SAMPLES || dst.len() < width {
            tracing::warn!(
                src = src.len(),
                dst = dst.len(),
                width,
                "scanline buffers too small"
            );
            return;
        }

        let dst = &mut dst[..width];
        let src = &src[..SCANLINE_SAMPLES];
        let y = y as usize;

        if !self.mode.chroma_artifacts {
            self.blit(dst, src, hires);
        } else if self.mode.chroma_artifacts_hi {
            self.artifact_hi(y, dst, src, hires, include_hblank);
        } else if self.mode.pal {
            self.blit(dst, src, hires);
        } else {
            self.artifact_ntsc(dst, src, hires, include_hblank);
        }

        if self.mode.blend_out && y < MAX_SCANLINES {
            let range = match (include_hblank, self.mode.wide_output()) {
                (true, _) => 0..width,
                (false, true) => LEFT_BORDER_14MHZ_4..RIGHT_BORDER_14MHZ_4,
                (false, false) => LEFT_BORDER_7MHZ_4..RIGHT_BORDER_7MHZ_4,
            };
            self.blend_row(y, dst, range, temporary);
        }
    }

    /// Post-processes a scanline of already rendered pixels: the PAL delay
    /// line or range compression, frame blending, and gamma correction.
    /// Lines wider than `2 * SCANLINE_SAMPLES` are not blended.
    pub fn artifact32(&mut self, y: u32, dst: &mut [u32], temporary: bool) {
        let width = dst.len();
        let compress = self.mode.expanded_range_input && !self.mode.expanded_range_output;

        if self.mode.pal && self.mode.chroma_artifacts {
            pal32(dst, &mut self.pal_delay32, compress);
        } else if compress {
            compress_range(dst);
        }

        let y = y as usize;
        if self.mode.blend_out && y < MAX_SCANLINES && width <= SCANLINE_SAMPLES * 2 {
            self.blend_row(y, dst, 0..width, temporary);
        }

        self.gamma_correct(dst);
    }

    /// Averages two rendered scanlines.
    pub fn interpolate_scanlines(dst: &mut [u32], src1: &[u32], src2: &[u32]) {
        for ((d, &a), &b) in dst.iter_mut().zip(src1).zip(src2) {
            *d = average(a, b);
        }
    }

    /// Combines the two fields of a deinterlaced line, copying whichever is
    /// present when only one is.
    pub fn deinterlace(dst: &mut [u32], src1: Option<&[u32]>, src2: Option<&[u32]>) {
        match (src1, src2) {
            (Some(a), Some(b)) => Self::interpolate_scanlines(dst, a, b),
            (Some(src), None) | (None, Some(src)) => {
                let n = dst.len().min(src.len());
                dst[..n].copy_from_slice(&src[..n]);
            }
            (None, None) => {}
        }
    }
}
