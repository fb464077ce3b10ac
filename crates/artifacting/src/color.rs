use glam::{Vec2, Vec3};

use crate::MonitorMode;

pub const LUMA_AXIS: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

/// Demodulation axes for R, G and B, rotated by `shift` degrees and scaled.
pub fn rotated_axis(axis: Vec2, shift: f32, scale: f32) -> Vec2 {
    let rotated = glam::Mat2::from_angle(shift * (std::f32::consts::PI / 180.0)) * axis;
    rotated * scale
}

/// Rounds to nearest, ties to even.
pub fn round_half_even(x: f32) -> i32 {
    let fx = x.floor();
    let frac = x - fx;
    if frac > 0.5 {
        (fx + 1.0) as i32
    } else if frac < 0.5 {
        fx as i32
    } else if (fx as i32) & 1 != 0 {
        (fx + 1.0) as i32
    } else {
        fx as i32
    }
}

pub fn saturate_i16(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Packs 0-255 scaled components into `0x00RRGGBB`.
pub fn pack_rgb(c: Vec3) -> u32 {
    let channel = |v: f32| ((v + 0.5).floor() as i32).clamp(0, 255) as u32;
    channel(c.x) << 16 | channel(c.y) << 8 | channel(c.z)
}

pub fn pack_unit_rgb(c: Vec3) -> u32 {
    pack_rgb(c * 255.0)
}

pub fn pack_signed_rgb(c: Vec3) -> u32 {
    pack_rgb(c * 127.0 + Vec3::splat(64.0))
}

pub fn unpack_rgb(rgb: u32) -> Vec3 {
    Vec3::new(
        ((rgb >> 16) & 0xff) as f32 / 255.0,
        ((rgb >> 8) & 0xff) as f32 / 255.0,
        (rgb & 0xff) as f32 / 255.0,
    )
}

pub fn srgb_to_linear(c: Vec3) -> Vec3 {
    let f = |v: f32| {
        if v < 0.04045 {
            v / 12.92
        } else {
            ((v + 0.055) / 1.055).powf(2.4)
        }
    };
    Vec3::new(f(c.x), f(c.y), f(c.z))
}

pub fn linear_to_srgb(c: Vec3) -> Vec3 {
    let f = |v: f32| {
        if v < 0.0031308 {
            v * 12.92
        } else {
            1.055 * v.powf(1.0 / 2.4) - 0.055
        }
    };
    Vec3::new(f(c.x), f(c.y), f(c.z))
}

/// Maps expanded range pixels (`64 + 127 * c`) back to full range,
/// keeping the top byte.
pub fn compress_range(pixels: &mut [u32]) {
    for px in pixels {
        let [b, g, r, a] = px.to_le_bytes();
        let compress = |c: u8| match c {
            0..=0x3f => 0,
            0xc0.. => 0xff,
            c => (c - 0x40) * 2,
        };
        *px = u32::from_le_bytes([compress(b), compress(g), compress(r), a]);
    }
}

/// Desaturates over-bright linear colors toward their luma, then encodes
/// to sRGB.
pub fn clip_linear_to_srgb(c: Vec3) -> Vec3 {
    let luma = c.dot(LUMA_AXIS);
    let luma_vec = Vec3::splat(luma);
    let chroma = c - luma_vec;
    let scale = (2.0 * (1.0 - luma)).min(1.0).max(0.0);
    linear_to_srgb(luma_vec + chroma * scale)
}

pub fn pow(c: Vec3, p: f32) -> Vec3 {
    Vec3::new(c.x.powf(p), c.y.powf(p), c.z.powf(p))
}

/// Linear phosphor color normalized to unit luminance.
pub fn phosphor_linear(monitor: MonitorMode) -> Option<Vec3> {
    let srgb = monitor.phosphor()?;
    let tint = srgb_to_linear(unpack_rgb(srgb));
    Some(tint / tint.dot(LUMA_AXIS))
}

/// Perceived intensity of a chroma-carrying signal on a monochrome
/// monitor: the carrier swings luma by +/-0.125 and the eye averages light.
pub fn mono_intensity(y: f32, has_chroma: bool) -> f32 {
    if has_chroma {
        const SWING: f32 = 0.125;
        let a = (y - SWING).max(0.0).powf(2.4);
        let b = (y + SWING).powf(2.4);
        ((a + b) * 0.5).powf(1.0 / 2.4)
    } else {
        y
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rounding_ties_to_even() {
        assert_eq!(round_half_even(0.5), 0);
        assert_eq!(round_half_even(1.5), 2);
        assert_eq!(round_half_even(2.5), 2);
        assert_eq!(round_half_even(-0.5), 0);
        assert_eq!(round_half_even(-1.5), -2);
        assert_eq!(round_half_even(2.4999), 2);
        assert_eq!(round_half_even(-2.6), -3);
    }

    #[test]
    fn packing_clamps() {
        assert_eq!(pack_rgb(Vec3::new(300.0, -4.0, 127.5)), 0xff0080);
        assert_eq!(pack_unit_rgb(Vec3::ONE), 0xffffff);
        assert_eq!(pack_signed_rgb(Vec3::ZERO), 0x404040);
    }

    #[test]
    fn range_compression_keeps_alpha() {
        let mut px = [0x8030_40bf, 0x00c0_ff7f];
        compress_range(&mut px);
        assert_eq!(px, [0x8000_00fe, 0x00ff_ff7e]);
    }

    #[test]
    fn srgb_transfer_round_trips() {
        let c = Vec3::new(0.02, 0.5, 0.9);
        let back = linear_to_srgb(srgb_to_linear(c));
        assert!((back - c).abs().max_element() < 1e-5, "{back} {c}");
    }

    #[test]
    fn phosphor_has_unit_luminance() {
        let c = phosphor_linear(MonitorMode::MonoAmber).unwrap();
        assert!((c.dot(LUMA_AXIS) - 1.0).abs() < 1e-5);
        assert!(phosphor_linear(MonitorMode::Color).is_none());
    }
}
