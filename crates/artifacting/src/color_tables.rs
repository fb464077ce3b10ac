use glam::{Vec2, Vec3};

use crate::color::{
    clip_linear_to_srgb, mono_intensity, pack_signed_rgb, pack_unit_rgb, pow, rotated_axis, round_half_even,
    saturate_i16, srgb_to_linear,
};
use crate::palette::{generate_mono_persistence_ramp, generate_mono_ramp};
use crate::{ColorParams, MonitorMode, PAL_PHASE_LOOKUP};

/// Chroma amplitude of the artifact carrier relative to full scale.
const ARTIFACT_SATURATION: f32 = 75.0 / 255.0;
/// 6 fractional bits on an 8-bit channel.
const FIXED_SCALE: f32 = 64.0 * 255.0;

/// Per-configuration lookup tables shared by all scanline paths.
#[derive(Debug, Clone)]
pub(crate) struct ColorTables {
    /// `[b, g, r, 0]` chroma offsets in 6-bit fixed point
    pub chroma_vectors: [[i16; 4]; 16],
    /// luma levels in 6-bit fixed point, with a +0.5 rounding bias
    pub luma_ramp: [i16; 16],
    /// `[b, g, r, 0]` for local contrast -15..=15
    pub artifact_ramp: [[i16; 4]; 31],
    pub gamma_table: [u8; 256],
    pub gamma_identity: bool,
    pub palette: [u32; 256],
    pub signed_palette: [u32; 256],
    pub corrected_palette: [u32; 256],
    pub corrected_signed_palette: [u32; 256],
    pub mono_table: [u32; 256],
    pub mono_persistence_table: Box<[u32; 1024]>,
    /// tint the palette was built with, `None` for color output
    pub tint_color: Option<Vec3>,
    /// whether the palette encodes phosphor energy for persistence blending
    pub mono_persistence: bool,
}

/// Everything the color tables depend on.
#[derive(Debug, Copy, Clone)]
pub(crate) struct TableConfig<'a> {
    pub params: &'a ColorParams,
    pub monitor: MonitorMode,
    pub tint: Option<Vec3>,
    pub color_correction: bool,
    pub mono_persistence: bool,
}

impl ColorTables {
    #[tracing::instrument(skip_all)]
    pub fn build(config: TableConfig) -> ColorTables {
        let params = config.params;
        let ramp = params.luma_ramp.ramp();

        let yscale = params.contrast * params.intensity_scale;
        let ybias = params.brightness * params.intensity_scale;

        let co_r = rotated_axis(
            Vec2::new(0.9563, 0.6210),
            params.red_shift,
            params.red_scale * params.intensity_scale,
        );
        let co_g = rotated_axis(
            Vec2::new(-0.2721, -0.6474),
            params.grn_shift,
            params.grn_scale * params.intensity_scale,
        );
        let co_b = rotated_axis(
            Vec2::new(-1.1070, 1.7046),
            params.blu_shift,
            params.blu_scale * params.intensity_scale,
        );

        let artphase = params.artifact_hue * (2.0 * std::f32::consts::PI / 360.0);
        let rot_art = Vec2::new(artphase.cos(), artphase.sin());
        let art = |co: Vec2| FIXED_SCALE * rot_art.dot(co) * ARTIFACT_SATURATION / 15.0 * params.artifact_sat;
        let (artr, artg, artb) = (art(co_r), art(co_g), art(co_b));

        let mut artifact_ramp = [[0; 4]; 31];
        for (entry, i) in artifact_ramp.iter_mut().zip(-15i32..=15) {
            let i = i as f32;
            *entry = [
                saturate_i16(round_half_even(artb * i)),
                saturate_i16(round_half_even(artg * i)),
                saturate_i16(round_half_even(artr * i)),
                0,
            ];
        }

        let mut chroma_vectors = [[0; 4]; 16];
        let mut cvec = [Vec3::ZERO; 16];
        for j in 0..15 {
            let iq = if params.use_pal_quirks {
                let step = params.hue_range * (2.0 * std::f32::consts::PI / (15.0 * 360.0));
                let theta = params.hue_start * (2.0 * std::f32::consts::PI / 360.0);
                let info = &PAL_PHASE_LOOKUP[j];
                let angle2 = theta + step * info.even_phase;
                let angle3 = theta + step * info.odd_phase;
                let i2 = angle2.cos() * info.even_invert;
                let q2 = angle2.sin() * info.even_invert;
                let i3 = angle3.cos() * info.odd_invert;
                let q3 = angle3.sin() * info.odd_invert;
                Vec2::new((i2 + i3) * 0.5, (q2 + q3) * 0.5)
            } else {
                let theta = 2.0
                    * std::f32::consts::PI
                    * (params.hue_start / 360.0 + j as f32 * (params.hue_range / (15.0 * 360.0)));
                Vec2::new(theta.cos(), theta.sin())
            };

            let chroma = Vec3::new(co_r.dot(iq), co_g.dot(iq), co_b.dot(iq)) * params.saturation;
            cvec[j + 1] = chroma;
            chroma_vectors[j + 1] = [
                saturate_i16(round_half_even(chroma.z * FIXED_SCALE)),
                saturate_i16(round_half_even(chroma.y * FIXED_SCALE)),
                saturate_i16(round_half_even(chroma.x * FIXED_SCALE)),
                0,
            ];
        }

        let mut luma_ramp = [0; 16];
        for (v, level) in luma_ramp.iter_mut().zip(ramp) {
            let y = level * yscale + ybias;
            *v = (round_half_even(y * FIXED_SCALE) + 32) as i16;
        }

        let gamma = 1.0 / params.gamma_correct;
        let gamma_identity = (params.gamma_correct - 1.0).abs() < 1e-5;
        let gamma_table = std::array::from_fn(|i| {
            if gamma_identity {
                i as u8
            } else {
                round_half_even((i as f32 / 255.0).powf(gamma) * 255.0) as u8
            }
        });

        let mono_persistence = config.tint.is_some() && config.mono_persistence;
        let tint_color = config
            .tint
            .map(|tint| if mono_persistence { Vec3::ONE } else { tint });

        let mut palette = [0; 256];
        let mut signed_palette = [0; 256];
        let mut corrected_palette = [0; 256];
        let mut corrected_signed_palette = [0; 256];

        for i in 0..256 {
            let c = i >> 4;
            let y = ramp[i & 15] * yscale + ybias;

            let rgb = match tint_color {
                Some(tint) => {
                    let rgb = srgb_to_linear(tint * mono_intensity(y, c != 0));
                    if mono_persistence {
                        Vec3::new(rgb.x.sqrt(), rgb.y.sqrt(), rgb.z.sqrt())
                    } else {
                        clip_linear_to_srgb(rgb)
                    }
                }
                None => cvec[c] + Vec3::splat(y),
            };

            palette[i] = pack_unit_rgb(rgb);
            signed_palette[i] = pack_signed_rgb(rgb);

            if config.color_correction {
                corrected_palette[i] = palette[i];
                corrected_signed_palette[i] = signed_palette[i];
            } else {
                let rgb2 = pow(rgb.max(Vec3::ZERO), gamma);
                corrected_palette[i] = pack_unit_rgb(rgb2);
                corrected_signed_palette[i] = pack_signed_rgb(rgb2);
            }
        }

        let mut mono_table = [0; 256];
        let mut mono_persistence_table = Box::new([0; 1024]);
        if config.tint.is_some() {
            mono_table = generate_mono_ramp(config.monitor);
            if config.mono_persistence {
                mono_persistence_table = generate_mono_persistence_ramp(config.monitor);
            }
        }

        tracing::debug!(
            monitor = ?config.monitor,
            tinted = config.tint.is_some(),
            mono_persistence,
            gamma_identity,
            "color tables rebuilt"
        );

        ColorTables {
            chroma_vectors,
            luma_ramp,
            artifact_ramp,
            gamma_table,
            gamma_identity,
            palette,
            signed_palette,
            corrected_palette,
            corrected_signed_palette,
            mono_table,
            mono_persistence_table,
            tint_color,
            mono_persistence: config.mono_persistence,
        }
    }

    /// Applies the output gamma table to the RGB bytes of each pixel.
    pub fn gamma_correct(&self, pixels: &mut [u32]) {
        let table = &self.gamma_table;
        for px in pixels {
            let b = table[(*px & 0xff) as usize] as u32;
            let g = table[((*px >> 8) & 0xff) as usize] as u32;
            let r = table[((*px >> 16) & 0xff) as usize] as u32;
            *px = (*px & 0xff000000) | r << 16 | g << 8 | b;
        }
    }

    pub fn is_tinted(&self) -> bool {
        self.tint_color.is_some()
    }
}
