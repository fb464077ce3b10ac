#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LumaRampMode {
    Linear,
    /// Measured luma levels of the XL/XE video output.
    #[default]
    Xl,
}

impl LumaRampMode {
    pub fn ramp(&self) -> [f32; 16] {
        match self {
            LumaRampMode::Linear => std::array::from_fn(|i| i as f32 / 15.0),
            LumaRampMode::Xl => XL_LUMA_RAMP,
        }
    }
}

const XL_LUMA_RAMP: [f32; 16] = [
    0.0, 0.0658340, 0.1435022, 0.2093362, 0.2750246, 0.3408586, 0.4185267, 0.4843608, 0.5156392,
    0.5814733, 0.6591414, 0.7249754, 0.7906638, 0.8564978, 0.9341660, 1.0,
];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ColorMatchingMode {
    #[default]
    None,
    Srgb,
    AdobeRgb,
    Gamma22,
    Gamma24,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MonitorMode {
    #[default]
    Color,
    /// RGB over SCART, one primary color per pair of luma levels.
    Peritel,
    MonoGreen,
    MonoAmber,
    MonoBluishWhite,
    MonoWhite,
}

impl MonitorMode {
    pub const fn is_mono(&self) -> bool {
        !matches!(self, MonitorMode::Color | MonitorMode::Peritel)
    }

    /// sRGB color of the monitor phosphor, if monochrome.
    pub const fn phosphor(&self) -> Option<u32> {
        match self {
            MonitorMode::MonoAmber => Some(0xFCCA03),
            MonitorMode::MonoGreen => Some(0x00FF20),
            MonitorMode::MonoBluishWhite => Some(0x8AC2FF),
            MonitorMode::MonoWhite => Some(0xFFFFFF),
            MonitorMode::Color | MonitorMode::Peritel => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ColorParams {
    /// angle of the first chroma step, degrees
    pub hue_start: f32,
    /// angle covered by chroma steps 1 through 15, degrees
    pub hue_range: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub gamma_correct: f32,
    pub intensity_scale: f32,
    /// artifact color angle, degrees
    pub artifact_hue: f32,
    pub artifact_sat: f32,
    pub artifact_sharpness: f32,
    pub red_shift: f32,
    pub red_scale: f32,
    pub grn_shift: f32,
    pub grn_scale: f32,
    pub blu_shift: f32,
    pub blu_scale: f32,
    /// use the asymmetric PAL phase table instead of uniform hue steps
    pub use_pal_quirks: bool,
    pub luma_ramp: LumaRampMode,
    pub color_matching: ColorMatchingMode,
}

impl ColorParams {
    pub fn pal() -> Self {
        ColorParams {
            hue_start: -12.0,
            hue_range: 18.3 * 15.0,
            brightness: 0.0,
            contrast: 1.0,
            saturation: 0.29,
            gamma_correct: 1.0,
            intensity_scale: 1.0,
            artifact_hue: 80.0,
            artifact_sat: 0.80,
            artifact_sharpness: 0.50,
            red_shift: 0.0,
            red_scale: 1.0,
            grn_shift: 0.0,
            grn_scale: 1.0,
            blu_shift: 0.0,
            blu_scale: 1.0,
            use_pal_quirks: true,
            luma_ramp: LumaRampMode::Xl,
            color_matching: ColorMatchingMode::None,
        }
    }

    pub fn ntsc() -> Self {
        ColorParams {
            hue_start: -57.0,
            hue_range: 27.1 * 15.0,
            brightness: -0.04,
            contrast: 1.04,
            saturation: 0.20,
            gamma_correct: 1.0,
            intensity_scale: 1.0,
            artifact_hue: 252.0,
            artifact_sat: 1.15,
            artifact_sharpness: 0.50,
            red_shift: 0.0,
            red_scale: 1.0,
            grn_shift: 0.0,
            grn_scale: 1.0,
            blu_shift: 0.0,
            blu_scale: 1.0,
            use_pal_quirks: false,
            luma_ramp: LumaRampMode::Xl,
            color_matching: ColorMatchingMode::Srgb,
        }
    }
}

impl Default for ColorParams {
    fn default() -> Self {
        ColorParams::ntsc()
    }
}

/// Display settings consumed by the presentation layer. Stored by the
/// engine but not used by the pixel transform.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArtifactingParams {
    pub scanline_intensity: f32,
    pub distortion_view_angle_x: f32,
    pub distortion_y_ratio: f32,
    pub enable_bloom: bool,
    pub bloom_scanline_compensation: bool,
    pub bloom_radius: f32,
    pub bloom_direct_intensity: f32,
    pub bloom_indirect_intensity: f32,
    pub enable_hdr: bool,
    /// nits
    pub sdr_intensity: f32,
    /// nits
    pub hdr_intensity: f32,
    pub use_system_sdr: bool,
    pub use_system_sdr_as_hdr: bool,
}

impl Default for ArtifactingParams {
    fn default() -> Self {
        ArtifactingParams {
            scanline_intensity: 0.75,
            distortion_view_angle_x: 0.0,
            distortion_y_ratio: 0.0,
            enable_bloom: false,
            bloom_scanline_compensation: true,
            bloom_radius: 0.0,
            bloom_direct_intensity: 0.80,
            bloom_indirect_intensity: 0.40,
            enable_hdr: false,
            sdr_intensity: 200.0,
            hdr_intensity: 350.0,
            use_system_sdr: false,
            use_system_sdr_as_hdr: false,
        }
    }
}

/// Chroma phase of one hue on even and odd PAL lines, in hue steps, with
/// the sign of the carrier on each line.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PalPhaseInfo {
    pub even_phase: f32,
    pub even_invert: f32,
    pub odd_phase: f32,
    pub odd_invert: f32,
}

const fn phase(even_phase: f32, even_invert: f32, odd_phase: f32, odd_invert: f32) -> PalPhaseInfo {
    PalPhaseInfo {
        even_phase,
        even_invert,
        odd_phase,
        odd_invert,
    }
}

/// Phase table for chroma values 1 through 15.
pub const PAL_PHASE_LOOKUP: [PalPhaseInfo; 15] = [
    phase(0.0, 1.0, 0.0, 1.0),
    phase(1.0, 1.0, 1.0, 1.0),
    phase(-6.0, -1.0, 2.0, 1.0),
    phase(-5.0, -1.0, -5.0, -1.0),
    phase(-4.0, -1.0, -4.0, -1.0),
    phase(-3.0, -1.0, -3.0, -1.0),
    phase(-1.0, -1.0, -1.0, -1.0),
    phase(0.0, -1.0, 0.0, -1.0),
    phase(1.0, -1.0, 1.0, -1.0),
    phase(-6.0, 1.0, 2.0, -1.0),
    phase(-4.0, 1.0, -4.0, 1.0),
    phase(-3.0, 1.0, -3.0, 1.0),
    phase(-2.0, 1.0, -2.0, 1.0),
    phase(-1.0, 1.0, -1.0, 1.0),
    phase(0.0, 1.0, 0.0, 1.0),
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn luma_ramps_span_black_to_white() {
        for mode in [LumaRampMode::Linear, LumaRampMode::Xl] {
            let ramp = mode.ramp();
            assert_eq!(ramp[0], 0.0);
            assert_eq!(ramp[15], 1.0);
            assert!(ramp.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn mono_monitors_have_phosphors() {
        assert_eq!(MonitorMode::Color.phosphor(), None);
        assert_eq!(MonitorMode::Peritel.phosphor(), None);
        assert!(MonitorMode::MonoAmber.is_mono());
        assert_eq!(MonitorMode::MonoGreen.phosphor(), Some(0x00FF20));
    }
}
