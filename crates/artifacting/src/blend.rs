//! Frame-to-frame blending of rendered scanlines against the previous
//! frame's history.

use crate::{ArtifactingError, MAX_SCANLINES};

const PERSISTENCE_TC1: f32 = 0.0;
const PERSISTENCE_TC2: f32 = 0.247;

/// Per-channel floor of the average of two packed pixels.
#[inline]
pub(crate) fn average(a: u32, b: u32) -> u32 {
    (a | b) - (((a ^ b) >> 1) & 0x7f7f_7f7f)
}

/// Phosphor decay constants for one frame period.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MonoPersistence {
    /// fast decay fraction per frame
    pub f1: f32,
    /// slow decay factor per frame, applied to squared energy
    pub f2: f32,
    /// steady-state energy for a fully lit pixel
    pub limit: f32,
}

impl MonoPersistence {
    pub fn new(dt: f32) -> MonoPersistence {
        let decay = |tc: f32| if tc > 0.0 { 1.0 - (-dt / tc).exp() } else { 0.0 };
        let f1 = decay(PERSISTENCE_TC1);
        let f2 = decay(PERSISTENCE_TC2);

        let limit = if f2 > 0.0 {
            ((f1 * f1 + 4.0 * f2).sqrt() - f1) / (2.0 * f2)
        } else if f1 > 0.0 {
            1.0 / f1
        } else {
            0.0
        };

        MonoPersistence { f1, f2, limit }
    }

    /// Adds the pixel's energy to the stored energy, returning the energy
    /// left after emission and the emitted light.
    fn step(&self, energy: f32, px: u32) -> (f32, f32) {
        let v = (px & 255) as f32 * (1.0 / 255.0);
        let energy = energy.clamp(0.0, self.limit) + v * v;
        let emission = energy * (self.f1 + energy * self.f2);
        (energy - emission, emission)
    }
}

impl Default for MonoPersistence {
    fn default() -> Self {
        MonoPersistence::new(1.0 / 60.0)
    }
}

fn persistence_index(emission: f32) -> usize {
    let e = (emission.max(0.0).sqrt() * 1023.0).clamp(0.0, 1023.0);
    (e + 0.5) as usize
}

/// How the current line interacts with its history row.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Access {
    /// blend against history without modifying it
    Const,
    /// blend against history and replace it with the current line
    Exchange,
    /// seed history from the current line without blending
    Copy,
}

#[derive(Debug, Copy, Clone)]
pub(crate) enum Blend<'a> {
    Average,
    Linear {
        extended_range: bool,
    },
    Persistence {
        decay: MonoPersistence,
        ramp: &'a [u32; 1024],
    },
}

pub(crate) struct HistoryRow<'a> {
    pub pixels: &'a mut [u32],
    pub energy: &'a mut [f32],
}

impl Blend<'_> {
    pub fn apply(&self, access: Access, dst: &mut [u32], row: HistoryRow) {
        match (*self, access) {
            (Blend::Persistence { decay, ramp }, access) => persistence(dst, row.energy, &decay, ramp, access),
            (_, Access::Copy) => {
                let n = dst.len();
                row.pixels[..n].copy_from_slice(dst);
            }
            (Blend::Average, Access::Const) => {
                for (a, &b) in dst.iter_mut().zip(row.pixels.iter()) {
                    *a = average(*a, b);
                }
            }
            (Blend::Average, Access::Exchange) => {
                for (a, b) in dst.iter_mut().zip(row.pixels.iter_mut()) {
                    let cur = *a;
                    *a = average(cur, *b);
                    *b = cur;
                }
            }
            (Blend::Linear { extended_range }, access) => {
                for (a, b) in dst.iter_mut().zip(row.pixels.iter_mut()) {
                    let mut cur = a.to_le_bytes();
                    if extended_range {
                        for c in &mut cur[..3] {
                            *c = c.saturating_sub(0x40);
                        }
                    }

                    let prev = b.to_le_bytes();
                    if access == Access::Exchange {
                        *b = u32::from_le_bytes(cur);
                    }

                    for (c, &p) in cur[..3].iter_mut().zip(&prev) {
                        let (c2, p2) = (*c as f32 * *c as f32, p as f32 * p as f32);
                        *c = (0.5 + ((c2 + p2) * 0.5).sqrt()) as u8;
                        if extended_range {
                            *c = if *c >= 0xc0 { 0xff } else { *c + 0x40 };
                        }
                    }

                    *a = u32::from_le_bytes(cur);
                }
            }
        }
    }
}

fn persistence(dst: &mut [u32], energy: &mut [f32], decay: &MonoPersistence, ramp: &[u32; 1024], access: Access) {
    for (px, e) in dst.iter_mut().zip(energy.iter_mut()) {
        let emission = match access {
            Access::Copy => {
                let v = (*px & 255) as f32 * (1.0 / 255.0);
                *e = v * v;
                *e
            }
            Access::Const => decay.step(*e, *px).1,
            Access::Exchange => {
                let (remaining, emission) = decay.step(*e, *px);
                *e = remaining;
                emission
            }
        };
        *px = ramp[persistence_index(emission)];
    }
}

/// Previous frame rows at one pixel clock. Persistence energy is kept in
/// its own buffer alongside the pixels.
pub(crate) struct FrameHistory {
    width: usize,
    pixels: Vec<u32>,
    energy: Vec<f32>,
}

impl FrameHistory {
    pub fn try_new(width: usize) -> Result<FrameHistory, ArtifactingError> {
        let len = width * MAX_SCANLINES;

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|_| ArtifactingError::Allocation {
                bytes: len * std::mem::size_of::<u32>(),
            })?;
        pixels.resize(len, 0);

        let mut energy = Vec::new();
        energy
            .try_reserve_exact(len)
            .map_err(|_| ArtifactingError::Allocation {
                bytes: len * std::mem::size_of::<f32>(),
            })?;
        energy.resize(len, 0.0);

        Ok(FrameHistory { width, pixels, energy })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Columns `range` of row `y`, which must be below `MAX_SCANLINES`.
    pub fn row(&mut self, y: usize, range: std::ops::Range<usize>) -> HistoryRow<'_> {
        let start = y * self.width;
        let range = start + range.start..start + range.end;
        HistoryRow {
            pixels: &mut self.pixels[range.clone()],
            energy: &mut self.energy[range],
        }
    }

    #[cfg(test)]
    pub fn energy(&self, y: usize, x: usize) -> f32 {
        self.energy[y * self.width + x]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn row<'a>(pixels: &'a mut [u32], energy: &'a mut [f32]) -> HistoryRow<'a> {
        HistoryRow { pixels, energy }
    }

    #[test]
    fn average_is_per_channel_floor() {
        assert_eq!(average(0x00ff_00ff, 0x00ff_00ff), 0x00ff_00ff);
        assert_eq!(average(0x0000_0001, 0x0000_0000), 0x0000_0000);
        assert_eq!(average(0x00ff_0000, 0x0001_0000), 0x0080_0000);
        assert_eq!(average(0x0010_2030, 0x0030_2010), 0x0020_2020);
    }

    #[test]
    fn exchange_stores_current_line() {
        let mut dst = [0x0040_4040];
        let mut hist = [0x0020_2020];
        let mut energy = [0.0];
        Blend::Average.apply(Access::Exchange, &mut dst, row(&mut hist, &mut energy));
        assert_eq!(dst, [0x0030_3030]);
        assert_eq!(hist, [0x0040_4040]);

        let mut dst = [0x0040_4040];
        Blend::Average.apply(Access::Const, &mut dst, row(&mut hist, &mut energy));
        assert_eq!(dst, [0x0040_4040]);

        let mut dst = [0x0011_2233];
        Blend::Average.apply(Access::Copy, &mut dst, row(&mut hist, &mut energy));
        assert_eq!(dst, [0x0011_2233]);
        assert_eq!(hist, [0x0011_2233]);
    }

    #[test]
    fn linear_blend_is_rms() {
        let blend = Blend::Linear { extended_range: false };
        let mut dst = [0x00ff_0000];
        let mut hist = [0x0000_0000];
        let mut energy = [0.0];
        blend.apply(Access::Const, &mut dst, row(&mut hist, &mut energy));
        // sqrt(255^2 / 2) = 180.3
        assert_eq!(dst, [0x00b4_0000]);

        let blend = Blend::Linear { extended_range: true };
        let mut dst = [0x0050_4010];
        let mut hist = [0x0010_0000];
        blend.apply(Access::Exchange, &mut dst, row(&mut hist, &mut energy));
        assert_eq!(hist, [0x0010_0000]);
        // 0x10 vs 0x10 averages to 0x10, then rebias
        assert_eq!(dst, [0x0050_4040]);
    }

    #[test]
    fn persistence_limit_is_fixed_point() {
        let decay = MonoPersistence::new(1.0 / 60.0);
        assert_eq!(decay.f1, 0.0);
        assert!((decay.limit - 1.0 / decay.f2.sqrt()).abs() < 1e-4);

        let e = decay.limit;
        let emission = e * (decay.f1 + e * decay.f2);
        assert!((emission - 1.0).abs() < 1e-4);
    }

    #[test]
    fn persistence_converges() {
        let ramp: [u32; 1024] = std::array::from_fn(|i| i as u32);
        let blend = Blend::Persistence {
            decay: MonoPersistence::new(1.0 / 60.0),
            ramp: &ramp,
        };

        let mut hist = [0u32];
        let mut energy = [0.0f32];
        let mut dst = [0xff];
        blend.apply(Access::Copy, &mut dst, row(&mut hist, &mut energy));
        assert_eq!(dst, [1023]);
        assert_eq!(energy, [1.0]);

        let mut dst = [0u32];
        for _ in 0..120 {
            dst[0] = 0xff;
            blend.apply(Access::Exchange, &mut dst, row(&mut hist, &mut energy));
        }
        let decay = MonoPersistence::new(1.0 / 60.0);
        assert!((energy[0] - (decay.limit - 1.0)).abs() < 1e-3, "{}", energy[0]);
        assert_eq!(dst, [1023]);

        // const access leaves energy untouched
        let before = energy;
        let mut dst = [0];
        blend.apply(Access::Const, &mut dst, row(&mut hist, &mut energy));
        assert_eq!(energy, before);
        assert!(dst[0] > 0 && dst[0] < 1023);
    }

    #[test]
    fn history_rows_are_disjoint() {
        let mut history = FrameHistory::try_new(8).unwrap();
        assert_eq!(history.width(), 8);
        history.row(3, 2..6).energy[0] = 0.5;
        assert_eq!(history.energy(3, 2), 0.5);
        assert_eq!(history.energy(2, 2), 0.0);
    }
}
