use crate::color_tables::ColorTables;
use crate::SCANLINE_SAMPLES;

/// Local luma extrema of a hires scanline, the positions where the cheap
/// NTSC decoder produces artifact color.
pub(crate) struct ArtifactScan {
    /// signed contrast with the nearer neighbor, polarity flipped on odd
    /// columns, zero where no artifact is produced
    contrast: [i8; SCANLINE_SAMPLES],
    /// luma after smoothing the detected extrema
    luma: [u8; SCANLINE_SAMPLES],
}

impl ArtifactScan {
    /// Returns `None` for lines without any extrema.
    pub fn detect(src: &[u8]) -> Option<ArtifactScan> {
        let mut luma = [0u8; SCANLINE_SAMPLES + 4];
        for (l, &px) in luma[2..].iter_mut().zip(&src[..SCANLINE_SAMPLES]) {
            *l = px & 15;
        }
        luma[0] = luma[2];
        luma[1] = luma[2];
        luma[SCANLINE_SAMPLES + 2] = luma[SCANLINE_SAMPLES + 1];
        luma[SCANLINE_SAMPLES + 3] = luma[SCANLINE_SAMPLES + 1];

        let mut scan = ArtifactScan {
            contrast: [0; SCANLINE_SAMPLES],
            luma: [0; SCANLINE_SAMPLES],
        };

        let mut any = false;
        for (i, w) in luma[1..].windows(3).take(SCANLINE_SAMPLES).enumerate() {
            let (y0, y1, y2) = (w[0] as i32, w[1] as i32, w[2] as i32);

            let mut d = if (y1 < y0 && y1 < y2) || (y1 > y0 && y1 > y2) {
                let nearer = if (y1 < y0) == (y0 < y2) { y0 } else { y2 };
                y1 - nearer
            } else {
                0
            };

            if i & 1 != 0 {
                d = -d;
            }

            any |= d != 0;
            scan.contrast[i] = d as i8;
            scan.luma[i] = if d != 0 { ((y0 + 2 * y1 + y2 + 2) >> 2) as u8 } else { y1 as u8 };
        }

        any.then_some(scan)
    }

    pub fn render(&self, tables: &ColorTables, dst: &mut [u32], src: &[u8], expanded_output: bool) {
        let palette = if expanded_output {
            &tables.signed_palette
        } else {
            &tables.palette
        };

        for (x, (px, &p)) in dst.iter_mut().zip(src).take(SCANLINE_SAMPLES).enumerate() {
            let art = self.contrast[x];
            if art == 0 {
                *px = palette[p as usize];
                continue;
            }

            let chroma = tables.chroma_vectors[(p >> 4) as usize];
            let ramp = tables.artifact_ramp[(art as i32 + 15) as usize];
            let y = tables.luma_ramp[self.luma[x] as usize] as i32;

            let channel = |c: usize| ((chroma[c] as i32 + ramp[c] as i32 + y) >> 6).clamp(0, 255) as u32;
            *px = channel(2) << 16 | channel(1) << 8 | channel(0);
        }
    }

    #[cfg(test)]
    fn positions(&self) -> usize {
        self.contrast.iter().filter(|&&d| d != 0).count()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::color_tables::TableConfig;
    use crate::{ColorParams, MonitorMode};

    #[test]
    fn flat_line_has_no_artifacts() {
        assert!(ArtifactScan::detect(&[0x94; SCANLINE_SAMPLES]).is_none());

        let mut ramp = [0u8; SCANLINE_SAMPLES];
        for (i, px) in ramp.iter_mut().enumerate() {
            *px = (i / 32) as u8;
        }
        assert!(ArtifactScan::detect(&ramp).is_none());
    }

    #[test]
    fn single_dot_is_detected() {
        let mut src = [0u8; SCANLINE_SAMPLES];
        src[100] = 0x0c;
        src[201] = 0x0c;
        let scan = ArtifactScan::detect(&src).unwrap();
        assert_eq!(scan.positions(), 2);
        assert_eq!(scan.contrast[100], 12);
        assert_eq!(scan.contrast[201], -12);
        assert_eq!(scan.luma[100], 6);
        assert_eq!(scan.luma[99], 0);
    }

    #[test]
    fn extremum_uses_nearer_neighbor() {
        let mut src = [0x04u8; SCANLINE_SAMPLES];
        src[10] = 0x02;
        src[11] = 0x0a;
        src[12] = 0x06;
        let scan = ArtifactScan::detect(&src).unwrap();
        // 10 is a minimum against 4 on the left and 10 on the right
        assert_eq!(scan.contrast[10], -2);
        assert_eq!(scan.contrast[11], -4);
        assert_eq!(scan.contrast[12], 0);
    }

    #[test]
    fn artifact_pixels_use_ramps() {
        let params = ColorParams::ntsc();
        let tables = ColorTables::build(TableConfig {
            params: &params,
            monitor: MonitorMode::Color,
            tint: None,
            color_correction: false,
            mono_persistence: false,
        });

        let mut src = [0x08u8; SCANLINE_SAMPLES];
        src[200] = 0x0f;
        let scan = ArtifactScan::detect(&src).unwrap();

        let mut dst = [0u32; SCANLINE_SAMPLES];
        scan.render(&tables, &mut dst, &src, false);
        assert_eq!(dst[0], tables.palette[0x08]);
        assert_eq!(dst[199], tables.palette[0x08]);
        assert_ne!(dst[200], tables.palette[0x0f]);
    }
}
