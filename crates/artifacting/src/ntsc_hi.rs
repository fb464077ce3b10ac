//! NTSC high artifacting: direct pixel-to-RGB contribution tables built
//! from a simulated composite encoder and comb/notch decoder, and the
//! accumulators that walk a scanline through them.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::color::round_half_even;
use crate::{ColorParams, LEFT_BORDER_14MHZ, LEFT_BORDER_7MHZ, RIGHT_BORDER_7MHZ, SCANLINE_SAMPLES};

/// Two packed 16-bit lanes, one per 14MHz output sample. Lanes overflow
/// independently with wrapping arithmetic; partial sums are allowed to wrap
/// as long as the final sum is in range.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Twin {
    pub lo: i16,
    pub hi: i16,
}

impl Twin {
    pub const fn new(lo: i16, hi: i16) -> Twin {
        Twin { lo, hi }
    }

    pub const fn splat(v: i16) -> Twin {
        Twin { lo: v, hi: v }
    }

    pub fn wrapping_add(self, other: Twin) -> Twin {
        Twin {
            lo: self.lo.wrapping_add(other.lo),
            hi: self.hi.wrapping_add(other.hi),
        }
    }

    pub fn from_bits(bits: u32) -> Twin {
        Twin {
            lo: bits as u16 as i16,
            hi: (bits >> 16) as u16 as i16,
        }
    }

    pub fn to_bits(self) -> u32 {
        (self.hi as u16 as u32) << 16 | self.lo as u16 as u32
    }
}

/// Accumulator used to walk a scanline through the NTSC high tables. Both
/// produce identical output.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NtscLayout {
    /// Four pixels per step into three rolling eight lane accumulators.
    #[default]
    Wide,
    /// One pixel at a time into a row of two lane words.
    Narrow,
}

impl NtscLayout {
    pub fn detect() -> NtscLayout {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        let wide = std::is_x86_feature_detected!("sse2");
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        let wide = cfg!(any(target_arch = "aarch64", target_feature = "simd128"));

        if wide {
            NtscLayout::Wide
        } else {
            NtscLayout::Narrow
        }
    }
}

const TAPS: usize = 16;
const USED_TAPS: usize = 12;
const QUAD_ENTRY: usize = 4 * TAPS;
const TWIN_ENTRY: usize = 2 * TAPS;

const SIGNAL_TAPS: usize = 24;

/// Accumulated 14MHz samples per scanline, including the trailing groups.
const WALK_SAMPLES: usize = 8 * (SCANLINE_SAMPLES / 4 + 2);
const WALK_WORDS: usize = WALK_SAMPLES / 2;

const ACTIVE_START_7MHZ: usize = LEFT_BORDER_7MHZ & !7;
const ACTIVE_OUTPUTS: usize = (((RIGHT_BORDER_7MHZ - ACTIVE_START_7MHZ) + 7) & !7) * 2;
const ACTIVE_FIRST_SAMPLE: usize = 8 + ACTIVE_START_7MHZ * 2;

const BIAS: Twin = Twin::splat(0x0008);
const SIGNED_BIAS: Twin = Twin::splat(0x0408);

const LPF_FEEDBACK: f32 = 0.1278410428;
const LPF_TAP: f32 = 0.9732320952;

fn rotate(v: Vec2, cs: f32, sn: f32) -> Vec2 {
    Vec2::new(v.x * cs + v.y * sn, -v.x * sn + v.y * cs)
}

type SignalTable = [[[Vec3; SIGNAL_TAPS]; 2]; 16];

pub(crate) struct NtscHiTables {
    /// per channel `[pixel][phase][tap]`
    quad: [Vec<Twin>; 3],
    /// per channel `[pixel][pair][tap]`, pairs of adjacent phases summed
    twin: [Vec<Twin>; 3],
}

impl NtscHiTables {
    #[tracing::instrument(skip_all)]
    pub fn build(params: &ColorParams, tint: bool, signed: bool) -> NtscHiTables {
        let (chroma_to_rgb, y_to_rgb) = signal_tables(params, tint);

        let encoding_scale = 16.0 * 255.0 * if signed { 0.5 } else { 1.0 };
        let bias = if signed { SIGNED_BIAS } else { BIAS };

        let mut quad = [
            vec![Twin::default(); 256 * QUAD_ENTRY],
            vec![Twin::default(); 256 * QUAD_ENTRY],
            vec![Twin::default(); 256 * QUAD_ENTRY],
        ];

        let zero = Vec3::ZERO;
        for idx in 0..256 {
            let chroma = &chroma_to_rgb[idx >> 4];
            let luma = &y_to_rgb[idx & 15];

            let even_tap = |j: i32| {
                let mut v = zero;
                if (0..SIGNAL_TAPS as i32).contains(&j) {
                    v = chroma[0][j as usize] + luma[0][j as usize];
                }
                if (2..SIGNAL_TAPS as i32 + 2).contains(&j) {
                    v += chroma[1][j as usize - 2];
                }
                v
            };
            let odd_tap = |j: i32| {
                if (0..SIGNAL_TAPS as i32).contains(&j) {
                    luma[1][j as usize]
                } else {
                    zero
                }
            };

            let mut e0 = [zero; TAPS];
            let mut e1 = [zero; TAPS];

            for k in 0..4 {
                for i in 0..TAPS {
                    let j0 = (i as i32 - k as i32) * 2;
                    let j1 = j0 + 1;

                    let (mut p0, mut p1) = if k & 1 != 0 {
                        (odd_tap(j0), odd_tap(j1))
                    } else {
                        (even_tap(j0), even_tap(j1))
                    };

                    p0 = p0 * encoding_scale + e0[i];
                    p1 = p1 * encoding_scale + e1[i];

                    if k == 3 && i >= 4 {
                        p0 += e0[i - 4];
                        p1 += e1[i - 4];
                    }

                    let r0 = [round_half_even(p0.x), round_half_even(p0.y), round_half_even(p0.z)];
                    let r1 = [round_half_even(p1.x), round_half_even(p1.y), round_half_even(p1.z)];

                    e0[i] = p0 - Vec3::new(r0[0] as f32, r0[1] as f32, r0[2] as f32);
                    e1[i] = p1 - Vec3::new(r1[0] as f32, r1[1] as f32, r1[2] as f32);

                    for (ch, table) in quad.iter_mut().enumerate() {
                        table[(idx * 4 + k) * TAPS + i] = Twin::new(r0[ch] as i16, r1[ch] as i16);
                    }
                }
            }

            for table in quad.iter_mut() {
                for tap in &mut table[idx * QUAD_ENTRY..][..4] {
                    *tap = tap.wrapping_add(bias);
                }
            }
        }

        let twin = quad.each_ref().map(|table| {
            let mut twin = vec![Twin::default(); 256 * TWIN_ENTRY];
            for (dst, src) in twin.chunks_exact_mut(TAPS).zip(table.chunks_exact(2 * TAPS)) {
                let (a, b) = src.split_at(TAPS);
                for ((d, &a), &b) in dst.iter_mut().zip(a).zip(b) {
                    *d = a.wrapping_add(b);
                }
            }
            twin
        });

        NtscHiTables { quad, twin }
    }

    /// Renders one scanline into `2 * N` 14MHz pixels. Without hblank only
    /// the active area is written.
    pub fn render(
        &self,
        layout: NtscLayout,
        dst: &mut [u32],
        src: &[u8],
        hires: bool,
        include_hblank: bool,
        mono_table: Option<&[u32; 256]>,
    ) {
        let src = &src[..SCANLINE_SAMPLES];
        let mut samples = [[0u8; WALK_SAMPLES]; 3];

        let channels = if mono_table.is_some() { 1 } else { 3 };
        for ch in 0..channels {
            let (table, entry) = if hires {
                (&self.quad[ch], QUAD_ENTRY)
            } else {
                (&self.twin[ch], TWIN_ENTRY)
            };
            match layout {
                NtscLayout::Wide => accumulate_wide(&mut samples[ch], table, entry, src, hires),
                NtscLayout::Narrow => accumulate_narrow(&mut samples[ch], table, entry, src, hires),
            }
        }

        let (dst_start, first, count) = if include_hblank {
            (0, 8, SCANLINE_SAMPLES * 2)
        } else {
            (LEFT_BORDER_14MHZ, ACTIVE_FIRST_SAMPLE, ACTIVE_OUTPUTS)
        };

        let [r, g, b] = &samples;
        let dst = &mut dst[dst_start..dst_start + count];
        match mono_table {
            Some(table) => {
                for (px, &r) in dst.iter_mut().zip(&r[first..]) {
                    *px = table[r as usize];
                }
            }
            None => {
                let rgb = r[first..].iter().zip(&g[first..]).zip(&b[first..]);
                for (px, ((&r, &g), &b)) in dst.iter_mut().zip(rgb) {
                    *px = (r as u32) << 16 | (g as u32) << 8 | b as u32;
                }
            }
        }
    }

    #[cfg(test)]
    fn quad(&self, channel: usize, pixel: u8) -> &[Twin] {
        &self.quad[channel][pixel as usize * QUAD_ENTRY..][..QUAD_ENTRY]
    }
}

/// Per luma level and per chroma value, the RGB contribution of one pixel
/// to each of 24 output samples, for the even and odd phase halves.
fn signal_tables(params: &ColorParams, tint: bool) -> (Box<SignalTable>, Box<SignalTable>) {
    let mut chroma_to_rgb = Box::new([[[Vec3::ZERO; SIGNAL_TAPS]; 2]; 16]);
    let mut y_to_rgb = Box::new([[[Vec3::ZERO; SIGNAL_TAPS]; 2]; 16]);

    let chroma_signal_amp = 0.5 / params.artifact_sat.max(0.10);
    let chroma_signal_inv_amp = params.artifact_sat * 2.0;

    let phadjust = -params.artifact_hue * (2.0 * std::f32::consts::PI / 360.0) + std::f32::consts::PI * 1.25;
    let (sp, cp) = phadjust.sin_cos();

    let axis = |base: Vec2, shift: f32, scale: f32| {
        let (sn, cs) = (-shift * (std::f32::consts::PI / 180.0)).sin_cos();
        rotate(rotate(base, cs, sn) * scale, cp, -sp)
    };
    let co_r = axis(Vec2::new(0.956, 0.620), params.red_shift, params.red_scale);
    let co_g = axis(Vec2::new(-0.272, -0.647), params.grn_shift, params.grn_scale);
    let co_b = axis(Vec2::new(-1.108, 1.705), params.blu_shift, params.blu_scale);
    let co_i = Vec3::new(co_r.x, co_g.x, co_b.x);
    let co_q = Vec3::new(co_r.y, co_g.y, co_b.y);

    let saturation_scale = params.saturation * 2.0;
    let intensity = params.intensity_scale;

    for i in 0..15 {
        let phase = phadjust
            + (2.0 * std::f32::consts::PI)
                * ((params.hue_start / 360.0) + i as f32 / 15.0 * (params.hue_range / 360.0));
        let [c0, c1, c2, c3] =
            std::array::from_fn(|j| ((0.5 * std::f32::consts::PI * j as f32) - phase).sin());

        const CHROMA_SHARP: f32 = 0.50;
        let mut t = [0.0f32; 28];
        t[6] = c3 * ((1.0 - CHROMA_SHARP) / 3.0);
        t[7] = c0 * ((2.0 + CHROMA_SHARP) / 3.0);
        t[8] = c1;
        t[9] = c2;
        t[10] = c3 * ((2.0 + CHROMA_SHARP) / 3.0);
        t[11] = c0 * ((1.0 - CHROMA_SHARP) / 3.0);

        let mut rgbtab = [[Vec3::ZERO; 22]; 2];

        if tint {
            const SENSITIVITY: f32 = 0.50;
            for j in 0..6 {
                let c = Vec3::splat(t[6 + j] * (chroma_signal_amp * SENSITIVITY));
                rgbtab[0][6 + j] = -c;
                rgbtab[1][6 + j] = c;
            }
        } else {
            for (j, v) in t.iter_mut().enumerate().take(26) {
                if j & 2 != 0 {
                    *v = -*v;
                }
            }

            let mut u = [0.0f32; 28];
            for j in 6..28 {
                u[j] = t[j - 6] + LPF_TAP * t[j - 4] + LPF_TAP * t[j - 2] + t[j] + LPF_FEEDBACK * u[j - 2];
            }

            let lpf_gain = (2.0 + LPF_TAP * 2.0) / (1.0 - LPF_FEEDBACK);
            for v in u.iter_mut() {
                *v = *v / 4.0 / lpf_gain;
            }

            for j in 0..22 {
                let side = (u[j + 2] + u[j + 4]) * 0.625 - (u[j] + u[j + 6]) * 0.125;
                let center = u[j + 3];
                let (fi, fq) = if j & 1 == 0 { (side, center) } else { (center, side) };

                let fc = (co_i * fi + co_q * fq) * saturation_scale;
                rgbtab[0][j] = fc * intensity;
                rgbtab[1][j] = fc * intensity;
            }
        }

        for (k, row) in rgbtab.iter_mut().enumerate() {
            for j in 0..2 {
                row[j + 14] += row[j + 18];
                row[j + 18] = Vec3::ZERO;
            }
            chroma_to_rgb[i + 1][k][..22].copy_from_slice(row);
        }
    }

    let luma_sharpness = params.artifact_sharpness;
    let mut lumapulse = [0.0f32; 16];
    lumapulse[0] = (1.0 - luma_sharpness) / 3.0;
    lumapulse[1] = (2.0 + luma_sharpness) / 3.0;
    lumapulse[2] = (2.0 + luma_sharpness) / 3.0;
    lumapulse[3] = (1.0 - luma_sharpness) / 3.0;

    let ramp = params.luma_ramp.ramp();
    for (i, level) in ramp.iter().enumerate() {
        let y = level * params.contrast + params.brightness;

        let mut t = [0.0f32; 30];
        t[11] = 0.0;
        t[12] = y;
        t[13] = y;
        t[14] = 0.0;
        for (j, v) in t.iter_mut().enumerate() {
            if j & 2 == 0 {
                *v = -*v;
            }
        }

        let mut u = [0.0f32; 28];
        for j in 4..20 {
            u[j] = (t[j - 4] * 0.25 + t[j - 2] * 0.625 + t[j] * 0.75 + t[j + 2] * 0.625 + t[j + 4] * 0.25)
                / 10.0;
        }

        let mut ytab = [0.0f32; 22];
        for j in 0..11 {
            ytab[7 + j] = y * lumapulse[j];
        }

        let mut rgbtab = [[Vec3::ZERO; 22]; 2];

        if tint {
            for j in 0..22 {
                rgbtab[0][j] = Vec3::splat(ytab[j]);
                rgbtab[1][j] = Vec3::splat(ytab[j]);
            }
        } else {
            let anti_chroma_scale = 1.3333333 + luma_sharpness * 2.666666;

            for j in 0..22 {
                let side = (u[j + 2] + u[j + 4]) * 0.575 - (u[j] + u[j + 6]) * 0.065;
                let center = u[j + 3];
                let (fi, fq) = if j & 1 != 0 { (side, center) } else { (center, side) };

                let (sn, cs) = (0.5 * std::f32::consts::PI * (j + 2) as f32).sin_cos();
                let fy = ytab[j] - (cs * fi + sn * fq) * anti_chroma_scale;

                let fc = (co_i * fi + co_q * fq) * chroma_signal_inv_amp;
                rgbtab[0][j] = (Vec3::splat(fy) + fc) * intensity;
                rgbtab[1][j] = (Vec3::splat(fy) - fc) * intensity;
            }
        }

        for (k, row) in rgbtab.iter_mut().enumerate() {
            for j in 0..4 {
                row[j + 14] += row[j + 18];
                row[j + 18] = Vec3::ZERO;
            }
            y_to_rgb[i][k][..22].copy_from_slice(row);
        }
    }

    (chroma_to_rgb, y_to_rgb)
}

fn store_lane(v: i16) -> u8 {
    ((v as i32) >> 4).clamp(0, 255) as u8
}

/// Each group of four pixels adds taps 0..12 of its phase tables into
/// three eight lane accumulators, then retires the oldest.
fn accumulate_wide(dst: &mut [u8; WALK_SAMPLES], table: &[Twin], entry: usize, src: &[u8], hires: bool) {
    const HIRES_TAPS: &[(usize, usize)] = &[(0, 0), (1, 1), (2, 2), (3, 3)];
    const LORES_TAPS: &[(usize, usize)] = &[(0, 0), (2, 1)];

    let lanes: &[i16] = bytemuck::cast_slice(table);
    let entry = entry * 2;
    let taps = if hires { HIRES_TAPS } else { LORES_TAPS };

    let mut acc = [[0i16; 8]; 3];
    let groups = src.chunks_exact(4);
    let tail = groups.len() * 8;

    for (group, out) in groups.zip(dst.chunks_exact_mut(8)) {
        acc[2] = [0; 8];
        for &(offset, phase) in taps {
            let block = &lanes[group[offset] as usize * entry + phase * 32..][..24];
            for (a, lanes) in acc.iter_mut().zip(block.chunks_exact(8)) {
                for (l, &v) in a.iter_mut().zip(lanes) {
                    *l = l.wrapping_add(v);
                }
            }
        }

        for (o, &l) in out.iter_mut().zip(&acc[0]) {
            *o = store_lane(l);
        }
        acc.rotate_left(1);
    }

    for (out, a) in dst[tail..].chunks_exact_mut(8).zip(&acc[..2]) {
        for (o, &l) in out.iter_mut().zip(a) {
            *o = store_lane(l);
        }
    }
}

/// Adds each pixel's taps directly into a row of words.
fn accumulate_narrow(dst: &mut [u8; WALK_SAMPLES], table: &[Twin], entry: usize, src: &[u8], hires: bool) {
    let mut words = [Twin::default(); WALK_WORDS];

    let mut add = |pos: usize, taps: &[Twin]| {
        for (w, &t) in words[pos..pos + USED_TAPS].iter_mut().zip(taps) {
            *w = w.wrapping_add(t);
        }
    };

    if hires {
        for (x, &px) in src.iter().enumerate() {
            add(x & !3, &table[px as usize * entry + (x & 3) * TAPS..]);
        }
    } else {
        for (x, &px) in src.iter().enumerate().step_by(2) {
            add(x & !3, &table[px as usize * entry + ((x >> 1) & 1) * TAPS..]);
        }
    }

    for (w, out) in words.iter().zip(dst.chunks_exact_mut(2)) {
        out[0] = store_lane(w.lo);
        out[1] = store_lane(w.hi);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn noise(seed: u32) -> Vec<u8> {
        let mut state = seed;
        (0..SCANLINE_SAMPLES)
            .map(|_| {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                (state >> 24) as u8
            })
            .collect()
    }

    #[test]
    fn twin_lanes_wrap_independently() {
        let a = Twin::new(i16::MAX, -1);
        let b = Twin::new(1, 1);
        assert_eq!(a.wrapping_add(b), Twin::new(i16::MIN, 0));
        assert_eq!(Twin::from_bits(0x0408_fff8), Twin::new(-8, 0x408));
        assert_eq!(Twin::new(-8, 0x408).to_bits(), 0x0408_fff8);
    }

    #[test]
    fn layouts_are_bit_identical() {
        for signed in [false, true] {
            let tables = NtscHiTables::build(&ColorParams::ntsc(), false, signed);
            for seed in 0..4 {
                let src = noise(seed);
                for hires in [false, true] {
                    for hblank in [false, true] {
                        let mut wide = vec![0; SCANLINE_SAMPLES * 2];
                        let mut narrow = vec![0; SCANLINE_SAMPLES * 2];
                        tables.render(NtscLayout::Wide, &mut wide, &src, hires, hblank, None);
                        tables.render(NtscLayout::Narrow, &mut narrow, &src, hires, hblank, None);
                        assert_eq!(wide, narrow, "signed {signed} hires {hires} hblank {hblank}");
                    }
                }
            }
        }
    }

    #[test]
    fn black_has_only_bias() {
        let params = ColorParams {
            brightness: 0.0,
            ..ColorParams::ntsc()
        };
        let tables = NtscHiTables::build(&params, false, false);
        for ch in 0..3 {
            let quad = tables.quad(ch, 0);
            assert!(quad[..4].iter().all(|&t| t == BIAS));
            assert!(quad[4..].iter().all(|&t| t == Twin::default()));
        }

        let mut dst = vec![0xffff_ffff; SCANLINE_SAMPLES * 2];
        tables.render(NtscLayout::Wide, &mut dst, &[0; SCANLINE_SAMPLES], true, true, None);
        assert!(dst.iter().all(|&px| px == 0));
    }

    #[test]
    fn brighter_luma_renders_brighter() {
        let tables = NtscHiTables::build(&ColorParams::ntsc(), false, false);
        let level = |px: u8| {
            let mut dst = vec![0; SCANLINE_SAMPLES * 2];
            tables.render(NtscLayout::Narrow, &mut dst, &[px; SCANLINE_SAMPLES], true, false, None);
            dst[LEFT_BORDER_14MHZ..LEFT_BORDER_14MHZ + ACTIVE_OUTPUTS]
                .iter()
                .map(|&px| (px & 0xff) + ((px >> 8) & 0xff) + ((px >> 16) & 0xff))
                .sum::<u32>()
        };
        assert!(level(0x0f) > level(0x08));
        assert!(level(0x08) > level(0x02));
    }

    #[test]
    fn active_area_only_without_hblank() {
        let tables = NtscHiTables::build(&ColorParams::ntsc(), false, false);
        let mut dst = vec![0xdead_beef; SCANLINE_SAMPLES * 2];
        tables.render(NtscLayout::Wide, &mut dst, &[0x0f; SCANLINE_SAMPLES], true, false, None);
        assert_eq!(ACTIVE_OUTPUTS, 768);
        assert!(dst[..LEFT_BORDER_14MHZ].iter().all(|&px| px == 0xdead_beef));
        assert!(dst[LEFT_BORDER_14MHZ + ACTIVE_OUTPUTS..].iter().all(|&px| px == 0xdead_beef));
    }

    #[test]
    fn mono_uses_red_samples() {
        let tables = NtscHiTables::build(&ColorParams::ntsc(), true, false);
        let mono: [u32; 256] = std::array::from_fn(|i| 0x0100_0000 | i as u32);
        let src = noise(7);

        let mut rgb = vec![0; SCANLINE_SAMPLES * 2];
        let mut mono_out = vec![0; SCANLINE_SAMPLES * 2];
        tables.render(NtscLayout::Wide, &mut rgb, &src, true, true, None);
        tables.render(NtscLayout::Wide, &mut mono_out, &src, true, true, Some(&mono));
        for (&c, &m) in rgb.iter().zip(&mono_out) {
            assert_eq!(m, 0x0100_0000 | (c >> 16));
            // tinted tables are grey
            assert_eq!(c & 0xff, c >> 16);
        }
    }
}
