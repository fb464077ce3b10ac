//! PAL high artifacting: per-phase Y/U/V lookup tables derived from a
//! simulated encoder and delay-line decoder, and the scanline kernels that
//! apply them.
//!
//! Every table word holds two 16-bit lanes, one per 14MHz output sample.
//! The lanes are summed as plain `u32` words so that borrows between them
//! behave exactly like the packed fixed-point representation expects.

use crate::color::round_half_even;
use crate::filter::{FilterKernel, BICUBIC_A};
use crate::{ColorParams, PAL_PHASE_LOOKUP, SCANLINE_SAMPLES};

const PHASES: usize = 8;
const Y_TAPS: usize = 4;
const C_TAPS: usize = 12;

const Y_STRIDE: usize = PHASES * Y_TAPS;
const C_STRIDE: usize = PHASES * C_TAPS;

const CO_VR: f32 = 1.1402509;
const CO_UB: f32 = 2.0325203;

const COUG_COUB: i32 = -3182;
const COVG_COVR: i32 = -8346;

/// Initial value of an empty chroma accumulator, two lanes at mid scale.
pub(crate) const CHROMA_BIAS: u32 = 0x2000_2000;
const LUMA_BIAS: u32 = 0x4000_4000;
const SIGNED_LUMA_BIAS: u32 = 0x5000_5000;

/// Source pixels fed through the kernels, including padding on both sides.
const PADDED: usize = SCANLINE_SAMPLES + 16;
const WORK: usize = SCANLINE_SAMPLES + 32;

pub(crate) struct PalHiTables {
    /// `[parity][pixel][phase][tap]`
    y: Vec<u32>,
    u: Vec<u32>,
    v: Vec<u32>,
}

struct PhaseKernels {
    y2y: FilterKernel,
    u2y: FilterKernel,
    v2y: FilterKernel,
    y2u: FilterKernel,
    u2u: FilterKernel,
    v2u: FilterKernel,
    y2v: FilterKernel,
    u2v: FilterKernel,
    v2v: FilterKernel,
}

/// Per-channel rounding error carried between the phases of one pixel.
#[derive(Default)]
struct ErrorCarry([[f32; 2]; PHASES]);

impl ErrorCarry {
    fn quantize(&mut self, window: &[f32], phase: usize, scale: f32, out: &mut [u32]) {
        for (offset, word) in out.iter_mut().enumerate() {
            let idx = (offset + phase) & 7;
            let fw0 = window[offset * 2] * scale + self.0[idx][0];
            let fw1 = window[offset * 2 + 1] * scale + self.0[idx][1];
            let w0 = round_half_even(fw0);
            let w1 = round_half_even(fw1);
            self.0[idx] = [fw0 - w0 as f32, fw1 - w1 as f32];
            *word = ((w1 as u32) << 16).wrapping_add(w0 as u32);
        }
    }
}

fn build_phase_kernels(params: &ColorParams, tint: bool) -> Vec<PhaseKernels> {
    let sat2 = params.artifact_sat;
    let sat1 = params.saturation / sat2.max(0.001);

    let base = FilterKernel::new(0, vec![1.0; 5]).scaled(params.intensity_scale);

    let binomial = [1.0, 10.0, 45.0, 120.0, 210.0, 252.0, 210.0, 120.0, 45.0, 10.0, 1.0];
    let cfilt = FilterKernel::new(-5, binomial.map(|c: f32| c / 1024.0).to_vec());

    let ivrt2 = std::f32::consts::FRAC_1_SQRT_2;
    let umod = FilterKernel::new(0, vec![1.0, ivrt2, 0.0, -ivrt2, -1.0, -ivrt2, 0.0, ivrt2]).scaled(sat1);
    let vmod = FilterKernel::new(0, vec![0.0, ivrt2, 1.0, ivrt2, 0.0, -ivrt2, -1.0, -ivrt2]).scaled(sat1);

    let mut ysep = vec![1.0 / 8.0; 9];
    ysep[0] = 0.5 / 8.0;
    ysep[8] = 0.5 / 8.0;
    let ysep = FilterKernel::new(-4, ysep);

    let csep = (0..33)
        .map(|i| match i {
            0 | 32 => 1.0,
            i if i % 4 != 0 => 0.0,
            i if (i / 4) % 2 == 1 => -2.0,
            _ => 2.0,
        } * (1.0 / 16.0))
        .collect::<Vec<f32>>();
    let csep = FilterKernel::new(-16, csep);

    let cdemod =
        FilterKernel::new(0, vec![-1.0, -1.0, 1.0, 1.0, 1.0, 1.0, -1.0, -1.0]).scaled(sat2 * 0.5);

    let ycphase = (params.artifact_hue + 90.0) * std::f32::consts::PI / 180.0;
    let (ycphases, ycphasec) = ycphase.sin_cos();

    let luma_sample = |k: &FilterKernel| k.sample_bicubic(0.0, 2.5, BICUBIC_A);
    let demod = |signal: &FilterKernel, carrier_phase: i32, offset: f32| {
        signal
            .convolve(&csep)
            .modulate(&cdemod)
            .sample_point(carrier_phase, 4)
            .sample_bicubic(offset, 0.625, BICUBIC_A)
    };

    (0..PHASES as i32)
        .map(|phase| {
            let signal_y = base.shift(5 * phase);
            let filtered = signal_y.convolve(&cfilt);
            let signal_u = filtered.modulate(&umod);
            let signal_v = filtered.modulate(&vmod);

            let y_u = signal_u.convolve(&ysep);
            let y_v = signal_v.convolve(&ysep);

            if tint {
                let u2y = y_u.clone().scaled(ycphasec).sub(&y_v.clone().scaled(ycphases));
                let v2y = y_u.scaled(ycphases).add(&y_v.scaled(ycphasec));

                PhaseKernels {
                    y2y: luma_sample(&signal_y.convolve(&ysep)),
                    u2y: luma_sample(&u2y).scaled(0.5),
                    v2y: luma_sample(&v2y).scaled(0.5),
                    y2u: FilterKernel::default(),
                    u2u: FilterKernel::default(),
                    v2u: FilterKernel::default(),
                    y2v: FilterKernel::default(),
                    u2v: FilterKernel::default(),
                    v2v: FilterKernel::default(),
                }
            } else {
                let u = demod(&signal_y, 0, 0.0);
                let v = demod(&signal_y, 2, -0.5);

                let y2u = u.clone().scaled(ycphasec).sub(&v.clone().scaled(ycphases));
                let y2v = u.scaled(ycphases).add(&v.scaled(ycphasec));

                PhaseKernels {
                    y2y: luma_sample(&signal_y.convolve(&ysep)),
                    u2y: luma_sample(&y_u),
                    v2y: luma_sample(&y_v),
                    y2u,
                    u2u: demod(&signal_u, 0, 0.0),
                    v2u: demod(&signal_v, 0, 0.0),
                    y2v,
                    u2v: demod(&signal_u, 2, -0.5),
                    v2v: demod(&signal_v, 2, -0.5),
                }
            }
        })
        .collect()
}

impl PalHiTables {
    #[tracing::instrument(skip_all)]
    pub fn build(params: &ColorParams, pal_phase: u32, tint: bool, signed: bool) -> PalHiTables {
        let ramp = params.luma_ramp.ramp();
        let ytab: [f32; 16] = std::array::from_fn(|i| params.brightness + params.contrast * ramp[i]);

        // [line parity][chroma]
        let mut utab = [[0.0f32; 16]; 2];
        let mut vtab = [[0.0f32; 16]; 2];
        let even = (pal_phase & 1) as usize;
        let odd = 1 - even;

        let chroma_phase_step = -params.hue_range * ((2.0 * std::f32::consts::PI / 360.0) / 15.0);
        let chroma_phase_offset = (123.0 - params.hue_start) * (2.0 * std::f32::consts::PI / 360.0);
        for (i, info) in PAL_PHASE_LOOKUP.iter().enumerate() {
            let t1 = chroma_phase_offset + info.even_phase * chroma_phase_step;
            let t2 = chroma_phase_offset + info.odd_phase * chroma_phase_step;

            utab[even][i + 1] = -t1.cos() * info.even_invert;
            vtab[even][i + 1] = t1.sin() * info.even_invert;
            utab[odd][i + 1] = -t2.cos() * info.odd_invert;
            vtab[odd][i + 1] = -t2.sin() * info.odd_invert;
        }

        let kernels = build_phase_kernels(params, tint);

        let mut tables = PalHiTables {
            y: vec![0; 2 * 256 * Y_STRIDE],
            u: vec![0; 2 * 256 * C_STRIDE],
            v: vec![0; 2 * 256 * C_STRIDE],
        };

        let scale = if signed { 64.0 * 255.0 * 0.5 } else { 64.0 * 255.0 };
        let y_bias = if signed { SIGNED_LUMA_BIAS } else { LUMA_BIAS };

        for k in 0..2 {
            let v_invert = if k != even { -1.0 } else { 1.0 };

            for j in 0..256 {
                let uval = utab[k][j >> 4];
                let vval = vtab[k][j >> 4];
                let yval = ytab[j & 15];

                let mut yerror = ErrorCarry::default();
                let mut uerror = ErrorCarry::default();
                let mut verror = ErrorCarry::default();

                for (phase, kern) in kernels.iter().enumerate() {
                    let mut p2yw = [0.0f32; 2 * Y_TAPS];
                    let mut p2uw = [0.0f32; 2 * C_TAPS];
                    let mut p2vw = [0.0f32; 2 * C_TAPS];

                    let ypos = 4 - phase as i32 * 2;
                    let cpos = 13 - phase as i32 * 2;

                    kern.y2y.accumulate_window(&mut p2yw, ypos, yval);
                    kern.u2y.accumulate_window(&mut p2yw, ypos, uval);
                    kern.v2y.accumulate_window(&mut p2yw, ypos, vval);

                    kern.y2u.accumulate_window(&mut p2uw, cpos, yval * CO_UB);
                    kern.u2u.accumulate_window(&mut p2uw, cpos, uval * CO_UB);
                    kern.v2u.accumulate_window(&mut p2uw, cpos, vval * CO_UB);

                    kern.y2v.accumulate_window(&mut p2vw, cpos, yval * CO_VR * v_invert);
                    kern.u2v.accumulate_window(&mut p2vw, cpos, uval * CO_VR * v_invert);
                    kern.v2v.accumulate_window(&mut p2vw, cpos, vval * CO_VR * v_invert);

                    let yi = (k * 256 + j) * Y_STRIDE + phase * Y_TAPS;
                    let ci = (k * 256 + j) * C_STRIDE + phase * C_TAPS;

                    let ky = &mut tables.y[yi..yi + Y_TAPS];
                    yerror.quantize(&p2yw, phase, scale, ky);
                    ky[3] = ky[3].wrapping_add(y_bias);

                    uerror.quantize(&p2uw, phase, scale, &mut tables.u[ci..ci + C_TAPS]);
                    verror.quantize(&p2vw, phase, scale, &mut tables.v[ci..ci + C_TAPS]);
                }
            }
        }

        tables
    }

    fn luma_kernels(&self, odd_line: bool) -> &[u32] {
        let n = 256 * Y_STRIDE;
        &self.y[odd_line as usize * n..][..n]
    }

    fn chroma_kernels(&self, odd_line: bool) -> (&[u32], &[u32]) {
        let n = 256 * C_STRIDE;
        let start = odd_line as usize * n;
        (&self.u[start..start + n], &self.v[start..start + n])
    }

    /// Renders one scanline into `2 * N` 14MHz pixels. `mono_table` selects
    /// the monochrome luma-only decoder.
    pub fn artifact(
        &self,
        delay: &mut PalDelayLines,
        dst: &mut [u32],
        src: &[u8],
        odd_line: bool,
        mono_table: Option<&[u32; 256]>,
    ) {
        let mut padded = [0u8; PADDED];
        padded[2..2 + SCANLINE_SAMPLES].copy_from_slice(&src[..SCANLINE_SAMPLES]);

        let mut ybuf = [0u32; WORK];
        luma(&mut ybuf, &padded, self.luma_kernels(odd_line));

        match mono_table {
            Some(table) => final_mono(dst, &ybuf[4..], table),
            None => {
                let mut ubuf = [CHROMA_BIAS; WORK];
                let mut vbuf = [CHROMA_BIAS; WORK];
                let (ukern, vkern) = self.chroma_kernels(odd_line);
                chroma(&mut ubuf, &padded, ukern);
                chroma(&mut vbuf, &padded, vkern);
                final_rgb(dst, &ybuf[4..], &ubuf[4..], &vbuf[4..], delay);
            }
        }
    }
}

/// Chroma of the previous scanline for the delay-line comb.
pub(crate) struct PalDelayLines {
    u: Vec<u32>,
    v: Vec<u32>,
}

impl PalDelayLines {
    pub fn new() -> PalDelayLines {
        PalDelayLines {
            u: vec![CHROMA_BIAS; SCANLINE_SAMPLES + 8],
            v: vec![CHROMA_BIAS; SCANLINE_SAMPLES + 8],
        }
    }

    pub fn reset(&mut self) {
        self.u.fill(CHROMA_BIAS);
        self.v.fill(CHROMA_BIAS);
    }
}

/// Three-tap running sum of the per-pixel luma kernels. Writes
/// `src.len() + 3` words.
fn luma(dst: &mut [u32], src: &[u8], kernels: &[u32]) {
    let mut x0 = LUMA_BIAS;
    let mut x1 = LUMA_BIAS;
    let mut x2 = LUMA_BIAS;

    for (i, &px) in src.iter().enumerate() {
        let f = &kernels[px as usize * Y_STRIDE + (i & 7) * Y_TAPS..][..Y_TAPS];
        dst[i] = x0.wrapping_add(f[0]);
        x0 = x1.wrapping_add(f[1]);
        x1 = x2.wrapping_add(f[2]);
        x2 = f[3];
    }

    let n = src.len();
    dst[n] = x0;
    dst[n + 1] = x1;
    dst[n + 2] = x2;
}

/// Adds each pixel's twelve tap chroma kernel starting at its own position.
fn chroma(dst: &mut [u32], src: &[u8], kernels: &[u32]) {
    for (i, &px) in src.iter().enumerate() {
        let f = &kernels[px as usize * C_STRIDE + (i & 7) * C_TAPS..][..C_TAPS];
        for (d, &k) in dst[i..i + C_TAPS].iter_mut().zip(f) {
            *d = d.wrapping_add(k);
        }
    }
}

fn decode_lane(y: i32, u: i32, v: i32) -> u32 {
    let r = (y + v - 0x8020) >> 6;
    let g = ((y << 14) + u * COUG_COUB + v * COVG_COVR + 0x80000
        - 0x1000_0000
        - 0x4000 * (COUG_COUB + COVG_COVR))
        >> 20;
    let b = (y + u - 0x8020) >> 6;

    (r.clamp(0, 255) as u32) << 16 | (g.clamp(0, 255) as u32) << 8 | b.clamp(0, 255) as u32
}

/// Sums chroma with the previous line's and converts to RGB.
fn final_rgb(dst: &mut [u32], ybuf: &[u32], ubuf: &[u32], vbuf: &[u32], delay: &mut PalDelayLines) {
    for i in 0..SCANLINE_SAMPLES {
        let y = ybuf[i];
        let u = ubuf[i + 4];
        let v = vbuf[i + 4];
        let up = std::mem::replace(&mut delay.u[i + 4], u);
        let vp = std::mem::replace(&mut delay.v[i + 4], v);
        let u = u.wrapping_add(up);
        let v = v.wrapping_add(vp);

        let lo = |w: u32| (w & 0xffff) as i32;
        let hi = |w: u32| (w >> 16) as i32;

        dst[i * 2] = decode_lane(lo(y), lo(u), lo(v));
        dst[i * 2 + 1] = decode_lane(hi(y), hi(u), hi(v));
    }
}

fn final_mono(dst: &mut [u32], ybuf: &[u32], mono_table: &[u32; 256]) {
    for i in 0..SCANLINE_SAMPLES {
        let y = ybuf[i];
        let y1 = ((y & 0xffff) as i32 - 0x4000).clamp(0, 0x3fff);
        let y2 = ((y >> 16) as i32 - 0x4000).clamp(0, 0x3fff);
        dst[i * 2] = mono_table[(y1 >> 6) as usize];
        dst[i * 2 + 1] = mono_table[(y2 >> 6) as usize];
    }
}

/// Packed delay-line PAL decoding of already rendered pixels. The top byte
/// of each input pixel carries a luma adjustment and is left unchanged.
pub(crate) fn pal32(dst: &mut [u32], delay_line: &mut [[u8; 4]], compress_extended_range: bool) {
    for (px, delay) in dst.iter_mut().zip(delay_line.iter_mut()) {
        let [b1, g1, r1, y1] = delay.map(i32::from);
        let cur = px.to_le_bytes();
        *delay = cur;
        let [b2, g2, r2, y2] = cur.map(i32::from);

        let adj = y2 - y1;
        let mix = |c1: i32, c2: i32| {
            let mut c = (c1 + c2 + adj + 1) >> 1;
            if compress_extended_range {
                c = c + c - 128;
            }
            c.clamp(0, 255) as u8
        };

        *px = u32::from_le_bytes([mix(b1, b2), mix(g1, g2), mix(r1, r2), cur[3]]);
    }
}
