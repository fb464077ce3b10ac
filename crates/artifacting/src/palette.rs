//! Base palettes and monochrome ramps derived from [`ColorParams`].

use glam::{Mat3, Vec2, Vec3};

use crate::color::{
    clip_linear_to_srgb, linear_to_srgb, mono_intensity, pack_rgb, pack_signed_rgb, pack_unit_rgb, phosphor_linear,
    pow, rotated_axis, srgb_to_linear,
};
use crate::{ColorMatchingMode, ColorParams, MonitorMode, PAL_PHASE_LOOKUP};

const NATIVE_GAMMA: f32 = 2.2;

const FROM_NTSC: [[f32; 3]; 3] = [
    [0.6068909, 0.1735011, 0.2003480],
    [0.2989164, 0.5865990, 0.1144845],
    [0.0000000, 0.0660957, 1.1162243],
];
const FROM_PAL: [[f32; 3]; 3] = [
    [0.4306190, 0.3415419, 0.1783091],
    [0.2220379, 0.7066384, 0.0713236],
    [0.0201853, 0.1295504, 0.9390944],
];
const TO_SRGB: [[f32; 3]; 3] = [
    [3.2404542, -1.5371385, -0.4985314],
    [-0.9692660, 1.8760108, 0.0415560],
    [0.0556434, -0.2040259, 1.0572252],
];
const TO_ADOBE_RGB: [[f32; 3]; 3] = [
    [2.0413690, -0.5649464, -0.3446944],
    [-0.9692660, 1.8760108, 0.0415560],
    [0.0134474, -0.1183897, 1.0154096],
];

/// RGB mixing of the SCART primaries as seen on a typical set.
const PERITEL_MIX: [[f32; 3]; 3] = [[1.00, 0.00, 0.00], [0.11, 0.91, 0.34], [0.11, 0.47, 0.99]];

fn from_rows(rows: &[[f32; 3]; 3]) -> Mat3 {
    Mat3::from_cols_array_2d(rows).transpose()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPalette {
    /// `0x00RRGGBB`, indexed by `chroma << 4 | luma`
    pub palette: [u32; 256],
    /// same colors in the expanded range encoding `64 + 127 * c`
    pub signed_palette: [u32; 256],
    /// colors before matching and gamma, with a perceptual luma estimate in
    /// the top byte
    pub uncorrected_palette: [u32; 256],
    pub color_matching_matrix: Option<Mat3>,
    /// sRGB encoded phosphor color for monochrome monitors
    pub tint_color: Option<Vec3>,
    /// 0 selects the sRGB transfer curve
    pub output_gamma: f32,
}

impl GeneratedPalette {
    pub fn generate(params: &ColorParams, monitor: MonitorMode) -> GeneratedPalette {
        let co_r = rotated_axis(Vec2::new(0.956, 0.621), params.red_shift, params.red_scale);
        let co_g = rotated_axis(Vec2::new(-0.272, -0.647), params.grn_shift, params.grn_scale);
        let co_b = rotated_axis(Vec2::new(-1.107, 1.704), params.blu_shift, params.blu_scale);

        let (to_mat, output_gamma) = match params.color_matching {
            ColorMatchingMode::None => (None, 0.0),
            ColorMatchingMode::Srgb => (Some(&TO_SRGB), 0.0),
            ColorMatchingMode::Gamma22 => (Some(&TO_SRGB), 2.2),
            ColorMatchingMode::Gamma24 => (Some(&TO_SRGB), 2.4),
            ColorMatchingMode::AdobeRgb => (Some(&TO_ADOBE_RGB), 2.2),
        };

        let tint_color = phosphor_linear(monitor).map(linear_to_srgb);
        let matrix = match (to_mat, tint_color) {
            (Some(to_mat), None) => {
                let from_mat = if params.use_pal_quirks {
                    &FROM_PAL
                } else {
                    &FROM_NTSC
                };
                Some(from_rows(to_mat) * from_rows(from_mat))
            }
            _ => None,
        };

        let mut gen = GeneratedPalette {
            palette: [0; 256],
            signed_palette: [0; 256],
            uncorrected_palette: [0; 256],
            color_matching_matrix: matrix,
            tint_color,
            output_gamma,
        };

        if monitor == MonitorMode::Peritel {
            gen.fill_peritel(params);
        } else {
            gen.fill_composite(params, [co_r, co_g, co_b], matrix, tint_color);
        }

        for v in gen.uncorrected_palette.iter_mut() {
            *v = with_luma_estimate(*v);
        }

        gen
    }

    fn fill_peritel(&mut self, params: &ColorParams) {
        let gamma = 1.0 / params.gamma_correct;
        let mix = Mat3::from_cols_array_2d(&PERITEL_MIX);

        for luma in 0..16 {
            let rgb = luma >> 1;
            let c = Vec3::new(
                if rgb & 1 != 0 { 1.0 } else { 0.0 },
                if rgb & 4 != 0 { 1.0 } else { 0.0 },
                if rgb & 2 != 0 { 1.0 } else { 0.0 },
            );
            let c = mix * c * params.contrast + Vec3::splat(params.brightness);
            let c = Vec3::new(
                if c.x > 0.0 { c.x.powf(gamma) } else { c.x },
                if c.y > 0.0 { c.y.powf(gamma) } else { c.y },
                if c.z > 0.0 { c.z.powf(gamma) } else { c.z },
            ) * params.intensity_scale;

            self.palette[luma] = pack_rgb(c * 255.0);
            let c2 = c * (127.0 / 255.0) + Vec3::splat(64.0 / 255.0);
            self.signed_palette[luma] = pack_rgb(c2 * 255.0);
        }

        for row in 1..16 {
            self.palette.copy_within(0..16, row * 16);
            self.signed_palette.copy_within(0..16, row * 16);
        }
        self.uncorrected_palette = self.palette;
    }

    fn fill_composite(
        &mut self,
        params: &ColorParams,
        [co_r, co_g, co_b]: [Vec2; 3],
        matrix: Option<Mat3>,
        tint_color: Option<Vec3>,
    ) {
        let ramp = params.luma_ramp.ramp();
        let gamma = 1.0 / params.gamma_correct;

        let mut angle = params.hue_start * (2.0 * std::f32::consts::PI / 360.0);
        let angle_step = params.hue_range * (2.0 * std::f32::consts::PI / (360.0 * 15.0));

        for hue in 0..16 {
            let mut iq = Vec2::ZERO;
            if hue > 0 {
                if params.use_pal_quirks {
                    let info = &PAL_PHASE_LOOKUP[hue - 1];
                    let angle2 = angle + angle_step * info.even_phase;
                    let angle3 = angle + angle_step * info.odd_phase;
                    let i2 = angle2.cos() * info.even_invert;
                    let q2 = angle2.sin() * info.even_invert;
                    let i3 = angle3.cos() * info.odd_invert;
                    let q3 = angle3.sin() * info.odd_invert;
                    iq = Vec2::new(i2 + i3, q2 + q3) * (0.5 * params.saturation);
                } else {
                    iq = Vec2::new(angle.cos(), angle.sin()) * params.saturation;
                    angle += angle_step;
                }
            }

            let chroma = Vec3::new(iq.dot(co_r), iq.dot(co_g), iq.dot(co_b));

            for luma in 0..16 {
                let y = params.contrast * ramp[luma] + params.brightness;
                let mut rgb0 = Vec3::splat(y) + chroma;
                let mut rgb = rgb0;

                if let Some(tint) = tint_color {
                    rgb = tint * mono_intensity(y, hue > 0);
                    rgb0 = rgb;
                } else if let Some(matrix) = matrix {
                    rgb = matrix * pow(rgb.max(Vec3::ZERO), NATIVE_GAMMA);
                    rgb = encode_matched(rgb, params.color_matching);
                }

                rgb = pow(rgb.max(Vec3::ZERO), gamma) * params.intensity_scale;

                if tint_color.is_some() {
                    rgb = clip_linear_to_srgb(srgb_to_linear(rgb));
                }

                let index = hue * 16 + luma;
                self.palette[index] = pack_unit_rgb(rgb);
                self.signed_palette[index] = pack_signed_rgb(rgb);
                self.uncorrected_palette[index] = pack_unit_rgb(rgb0);
            }

            // a monochrome monitor cannot tell hues apart
            if tint_color.is_some() && hue == 1 {
                for row in 2..16 {
                    self.palette.copy_within(16..32, row * 16);
                    self.signed_palette.copy_within(16..32, row * 16);
                    self.uncorrected_palette.copy_within(16..32, row * 16);
                }
                break;
            }
        }
    }
}

fn encode_matched(rgb: Vec3, mode: ColorMatchingMode) -> Vec3 {
    match mode {
        ColorMatchingMode::AdobeRgb | ColorMatchingMode::Gamma22 => {
            pow(rgb.max(Vec3::ZERO), 1.0 / 2.2)
        }
        ColorMatchingMode::Gamma24 => pow(rgb.max(Vec3::ZERO), 1.0 / 2.4),
        ColorMatchingMode::Srgb | ColorMatchingMode::None => {
            let lo = rgb * 12.92;
            let hi = pow(rgb.max(Vec3::ZERO), 1.0 / 2.4) * 1.055 - Vec3::splat(0.055);
            let pick = |v: f32, lo: f32, hi: f32| if v < 0.0031308 { lo } else { hi };
            Vec3::new(
                pick(rgb.x, lo.x, hi.x),
                pick(rgb.y, lo.y, hi.y),
                pick(rgb.z, lo.z, hi.z),
            )
        }
    }
}

/// Stores a rounded `0.30 R + 0.59 G + 0.11 B` weighting in the top byte.
fn with_luma_estimate(v: u32) -> u32 {
    let weighted = (v & 0xff00ff)
        .wrapping_mul(0x130036)
        .wrapping_add((v & 0xff00).wrapping_mul(0xb700))
        .wrapping_add(0x800000);
    (v & 0xffffff).wrapping_add(weighted & 0xff000000)
}

/// Phosphor color for each 8-bit intensity of a monochrome monitor. All
/// zero for color monitors.
pub fn generate_mono_ramp(monitor: MonitorMode) -> [u32; 256] {
    let mut ramp = [0; 256];
    if let Some(c) = phosphor_linear(monitor) {
        for (i, v) in ramp.iter_mut().enumerate() {
            let intensity = (i as f32 / 255.0).powf(2.2);
            *v = pack_unit_rgb(clip_linear_to_srgb(c * intensity));
        }
    }
    ramp
}

/// Phosphor color for each of 1024 square-root emission levels.
pub fn generate_mono_persistence_ramp(monitor: MonitorMode) -> Box<[u32; 1024]> {
    let mut ramp = Box::new([0; 1024]);
    if let Some(c) = phosphor_linear(monitor) {
        for (i, v) in ramp.iter_mut().enumerate() {
            let raw = i as f32 / 1023.0;
            *v = pack_unit_rgb(clip_linear_to_srgb(c * (raw * raw)));
        }
    }
    ramp
}
