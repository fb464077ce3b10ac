//! Sparse discrete-time filter kernels used to derive the hi artifacting
//! tables. Coefficient `i` sits at sample position `offset + i`.

/// Catmull-Rom style sharpness used for all resampling.
pub const BICUBIC_A: f32 = -0.75;

const TRIM_THRESHOLD: f32 = 1e-4;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterKernel {
    offset: i32,
    coeffs: Vec<f32>,
}

impl FilterKernel {
    pub fn new(offset: i32, coeffs: impl Into<Vec<f32>>) -> Self {
        FilterKernel {
            offset,
            coeffs: coeffs.into(),
        }
    }

    pub fn zeroed(offset: i32, len: usize) -> Self {
        FilterKernel {
            offset,
            coeffs: vec![0.0; len],
        }
    }

    /// Four tap bicubic interpolation kernel for fractional position `t`.
    pub fn bicubic(t: f32, a: f32) -> Self {
        FilterKernel::new(-1, eval_cubic4(t, a).to_vec())
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn coeffs(&self) -> &[f32] {
        &self.coeffs
    }

    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// One past the last covered sample position.
    pub fn end(&self) -> i32 {
        self.offset + self.coeffs.len() as i32
    }

    pub fn clear(&mut self) {
        self.coeffs.clear();
    }

    /// Grows with zeros or truncates, keeping the offset.
    pub fn resize(&mut self, len: usize) {
        self.coeffs.resize(len, 0.0);
    }

    pub fn convolve(&self, other: &FilterKernel) -> FilterKernel {
        let offset = self.offset + other.offset;
        if self.is_empty() || other.is_empty() {
            return FilterKernel::new(offset, Vec::new());
        }

        let mut out = vec![0.0; self.len() + other.len() - 1];
        for (i, &s) in self.coeffs.iter().enumerate() {
            for (j, &c) in other.coeffs.iter().enumerate() {
                out[i + j] += s * c;
            }
        }

        FilterKernel::new(offset, out)
    }

    /// Mirrors the kernel around sample zero.
    pub fn reverse(&mut self) {
        self.offset = -(self.end() - 1);
        self.coeffs.reverse();
    }

    /// Dot product with `src`, where `origin` is the index of sample zero.
    pub fn evaluate(&self, src: &[f32], origin: usize) -> f32 {
        let start = (origin as isize + self.offset as isize) as usize;
        self.coeffs
            .iter()
            .zip(&src[start..])
            .fold(0.0, |sum, (c, s)| sum + s * c)
    }

    pub fn accumulate(&self, dst: &mut [f32], origin: usize) {
        self.accumulate_scaled(dst, origin, 1.0);
    }

    pub fn accumulate_sub(&self, dst: &mut [f32], origin: usize) {
        let start = (origin as isize + self.offset as isize) as usize;
        for (d, c) in dst[start..].iter_mut().zip(&self.coeffs) {
            *d -= c;
        }
    }

    pub fn accumulate_scaled(&self, dst: &mut [f32], origin: usize, scale: f32) {
        let start = (origin as isize + self.offset as isize) as usize;
        for (d, c) in dst[start..].iter_mut().zip(&self.coeffs) {
            *d += c * scale;
        }
    }

    /// Adds `scale * self` into `dst` with sample zero at index `offset`,
    /// discarding taps that fall outside `dst`.
    pub fn accumulate_window(&self, dst: &mut [f32], offset: i32, scale: f32) {
        let start = self.offset + offset;
        let lo = start.max(0);
        let hi = (start + self.coeffs.len() as i32).min(dst.len() as i32);
        if hi <= lo {
            return;
        }

        let src = &self.coeffs[(lo - start) as usize..];
        for (d, c) in dst[lo as usize..hi as usize].iter_mut().zip(src) {
            *d += c * scale;
        }
    }

    pub fn scale(&mut self, scale: f32) {
        for c in self.coeffs.iter_mut() {
            *c *= scale;
        }
    }

    pub fn scaled(mut self, scale: f32) -> FilterKernel {
        self.scale(scale);
        self
    }

    pub fn add(&self, other: &FilterKernel) -> FilterKernel {
        self.combine(other, 1.0)
    }

    pub fn sub(&self, other: &FilterKernel) -> FilterKernel {
        self.combine(other, -1.0)
    }

    fn combine(&self, other: &FilterKernel, sign: f32) -> FilterKernel {
        let offset = self.offset.min(other.offset);
        let a_start = (self.offset - offset) as usize;
        let b_start = (other.offset - offset) as usize;
        let len = (a_start + self.len()).max(b_start + other.len());

        let mut out = vec![0.0; len];
        out[a_start..a_start + self.len()].copy_from_slice(&self.coeffs);
        for (d, c) in out[b_start..].iter_mut().zip(&other.coeffs) {
            if sign < 0.0 {
                *d -= c;
            } else {
                *d += c;
            }
        }

        FilterKernel::new(offset, out)
    }

    /// Multiplies by `carrier` repeated with period `carrier.len()`, aligned
    /// so that coefficient 0 of the carrier sits at `carrier.offset()`.
    pub fn modulate(&self, carrier: &FilterKernel) -> FilterKernel {
        let period = carrier.len() as i32;
        if period == 0 {
            return FilterKernel::zeroed(self.offset, self.len());
        }

        let mut index = (self.offset - carrier.offset).rem_euclid(period) as usize;
        let mut out = self.coeffs.clone();
        for c in out.iter_mut() {
            *c *= carrier.coeffs[index];
            index += 1;
            if index == carrier.len() {
                index = 0;
            }
        }

        FilterKernel::new(self.offset, out)
    }

    pub fn shift(&self, delta: i32) -> FilterKernel {
        FilterKernel::new(self.offset + delta, self.coeffs.clone())
    }

    pub fn negate(&self) -> FilterKernel {
        FilterKernel::new(self.offset, self.coeffs.iter().map(|c| -c).collect::<Vec<_>>())
    }

    /// Drops leading and trailing taps smaller than 1e-4.
    pub fn trim(&self) -> FilterKernel {
        let mut start = 0;
        let mut end = self.coeffs.len();
        while start < end && self.coeffs[start].abs() < TRIM_THRESHOLD {
            start += 1;
        }
        while end > start && self.coeffs[end - 1].abs() < TRIM_THRESHOLD {
            end -= 1;
        }

        FilterKernel::new(self.offset + start as i32, self.coeffs[start..end].to_vec())
    }

    /// Resamples the bicubic reconstruction of this kernel at positions
    /// `n * step + offset`, covering every position it has support at.
    pub fn sample_bicubic(&self, offset: f32, step: f32, a: f32) -> FilterKernel {
        debug_assert!(step > 0.0);

        let lo = self.offset;
        let hi = self.end();

        let fstart = ((lo as f32 - 3.0 - offset) / step).ceil();
        let flimit = hi as f32;

        let mut out = Vec::new();
        let mut fpos = fstart * step + offset;
        while fpos < flimit {
            let fposf = fpos.floor();
            let ipos = fposf as i32;
            let co = eval_cubic4(fpos - fposf, a);

            let mut sum = 0.0;
            let iend = ipos + 4;
            if ipos >= lo {
                let len = if iend > hi { hi - ipos } else { 4 };
                let base = (ipos - lo) as usize;
                for i in 0..len.max(0) as usize {
                    sum += co[i] * self.coeffs[base + i];
                }
            } else if iend >= lo {
                for i in lo..iend.min(hi) {
                    sum += co[(i - ipos) as usize] * self.coeffs[(i - lo) as usize];
                }
            }

            out.push(sum);
            fpos += step;
        }

        FilterKernel::new(fstart as i32, out)
    }

    /// Keeps every `step`th coefficient, phase aligned to sample `offset`,
    /// with output positions divided by `step`.
    pub fn sample_point(&self, offset: i32, step: i32) -> FilterKernel {
        debug_assert!(step > 0);

        let delta = self.offset - offset;
        let mut pos = -delta % step;
        let mut out_offset = delta / step;
        if pos < 0 {
            out_offset += 1;
            pos += step;
        }

        let mut out: Vec<f32> = self
            .coeffs
            .iter()
            .skip(pos as usize)
            .step_by(step as usize)
            .copied()
            .collect();

        if out.is_empty() {
            out.push(0.0);
        }

        FilterKernel::new(out_offset, out)
    }
}

/// Weights of the four taps around fractional position `t`.
pub fn eval_cubic4(t: f32, a: f32) -> [f32; 4] {
    let t2 = t * t;
    let t3 = t2 * t;

    [
        a * t - 2.0 * a * t2 + a * t3,
        1.0 - (a + 3.0) * t2 + (a + 2.0) * t3,
        -a * t + (2.0 * a + 3.0) * t2 - (a + 2.0) * t3,
        a * t2 - a * t3,
    ]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn convolve_adds_offsets() {
        let a = FilterKernel::new(-1, vec![1.0, 2.0]);
        let b = FilterKernel::new(3, vec![1.0, 1.0, 1.0]);
        let c = a.convolve(&b);
        assert_eq!(c.offset(), 2);
        assert_eq!(c.coeffs(), &[1.0, 3.0, 3.0, 2.0]);
    }

    #[test]
    fn convolve_with_empty_is_empty() {
        let a = FilterKernel::new(2, vec![1.0]);
        let c = a.convolve(&FilterKernel::default());
        assert!(c.is_empty());
        assert_eq!(c.offset(), 2);
    }

    #[test]
    fn add_and_sub_cover_union() {
        let a = FilterKernel::new(0, vec![1.0, 1.0]);
        let b = FilterKernel::new(-2, vec![2.0, 2.0, 2.0]);
        let sum = a.add(&b);
        assert_eq!(sum.offset(), -2);
        assert_eq!(sum.coeffs(), &[2.0, 2.0, 3.0, 1.0]);

        let diff = a.sub(&b);
        assert_eq!(diff.offset(), -2);
        assert_eq!(diff.coeffs(), &[-2.0, -2.0, -1.0, 1.0]);
    }

    #[test]
    fn modulate_aligns_carrier_by_offset() {
        let carrier = FilterKernel::new(0, vec![1.0, 2.0, 3.0, 4.0]);
        let signal = FilterKernel::new(-5, vec![1.0; 6]);
        let m = signal.modulate(&carrier);
        assert_eq!(m.offset(), -5);
        // position -5 is carrier index 3
        assert_eq!(m.coeffs(), &[4.0, 1.0, 2.0, 3.0, 4.0, 1.0]);

        let far = FilterKernel::new(41, vec![1.0; 2]).modulate(&carrier.shift(-17));
        // (41 - -17) mod 4 = 2
        assert_eq!(far.coeffs(), &[3.0, 4.0]);
    }

    #[test]
    fn shift_negate_reverse() {
        let mut k = FilterKernel::new(1, vec![1.0, 2.0, 3.0]);
        assert_eq!(k.shift(4).offset(), 5);
        assert_eq!(k.negate().coeffs(), &[-1.0, -2.0, -3.0]);
        k.reverse();
        assert_eq!(k.offset(), -3);
        assert_eq!(k.coeffs(), &[3.0, 2.0, 1.0]);
    }

    #[test]
    fn trim_drops_small_taps() {
        let k = FilterKernel::new(-3, vec![0.0, 1e-5, 0.5, 0.0, 0.25, 5e-5]);
        let t = k.trim();
        assert_eq!(t.offset(), -1);
        assert_eq!(t.coeffs(), &[0.5, 0.0, 0.25]);

        let empty = FilterKernel::new(0, vec![0.0; 3]).trim();
        assert!(empty.is_empty());
    }

    #[test]
    fn accumulate_window_clips() {
        let k = FilterKernel::new(-2, vec![1.0, 2.0, 3.0, 4.0]);
        let mut dst = [0.0; 3];
        k.accumulate_window(&mut dst, 1, 2.0);
        // taps land at -1, 0, 1, 2
        assert_eq!(dst, [4.0, 6.0, 8.0]);

        let mut dst = [0.0; 2];
        k.accumulate_window(&mut dst, 10, 1.0);
        assert_eq!(dst, [0.0, 0.0]);
    }

    #[test]
    fn accumulate_and_evaluate() {
        let k = FilterKernel::new(-1, vec![1.0, 2.0]);
        let mut dst = [0.0; 4];
        k.accumulate(&mut dst, 2);
        assert_eq!(dst, [0.0, 1.0, 2.0, 0.0]);
        k.accumulate_sub(&mut dst, 1);
        assert_eq!(dst, [-1.0, -1.0, 2.0, 0.0]);
        assert_eq!(k.evaluate(&[1.0, 10.0, 100.0], 1), 21.0);
    }

    #[test]
    fn sample_point_picks_phase() {
        let k = FilterKernel::new(-3, (0..10).map(|v| v as f32).collect::<Vec<_>>());
        let s = k.sample_point(0, 4);
        // positions -3..7, keep 0 and 4
        assert_eq!(s.offset(), 0);
        assert_eq!(s.coeffs(), &[3.0, 7.0]);

        let s = k.sample_point(2, 4);
        // positions -2, 2, 6
        assert_eq!(s.offset(), -1);
        assert_eq!(s.coeffs(), &[1.0, 5.0, 9.0]);
    }

    #[test]
    fn cubic_weights_sum_to_one() {
        for t in [0.0, 0.25, 0.5, 0.8] {
            let co = eval_cubic4(t, BICUBIC_A);
            assert!((co.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        }
        assert_eq!(eval_cubic4(0.0, BICUBIC_A), [0.0, 1.0, 0.0, 0.0]);
        let k = FilterKernel::bicubic(0.0, BICUBIC_A);
        assert_eq!(k.offset(), -1);
    }

    #[test]
    fn bicubic_unit_step_reproduces_kernel() {
        let k = FilterKernel::new(2, vec![1.0, -2.0, 0.5]);
        let s = k.sample_bicubic(0.0, 1.0, BICUBIC_A);
        assert_eq!(s.offset(), -1);
        // output n holds the reconstruction at n + 1
        assert_eq!(s.coeffs(), &[0.0, 0.0, 1.0, -2.0, 0.5, 0.0]);
    }
}
