use image::Rgb;
use merger_common::RenderParams;
use palette::{Mix, Srgb};

// matplotlib's "plasma" sampled at k/9 for k = 0..=9
const PLASMA_STOPS: [[u8; 3]; 10] = [
    [13, 8, 135],
    [70, 3, 159],
    [114, 1, 168],
    [156, 23, 158],
    [189, 55, 134],
    [216, 87, 107],
    [237, 121, 83],
    [251, 159, 58],
    [253, 202, 38],
    [240, 249, 33],
];

/// Colour under-range cells are drawn with.
pub const UNDER_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Plasma colour at `t` in [0, 1]; values outside are clamped.
pub fn plasma(t: f32) -> Rgb<u8> {
    let last = PLASMA_STOPS.len() - 1;
    let scaled = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) * last as f32 };
    let i = (scaled.floor() as usize).min(last - 1);
    let frac = scaled - i as f32;

    let stop = |[r, g, b]: [u8; 3]| Srgb::new(r, g, b).into_format::<f32>();
    let color: Srgb<u8> = stop(PLASMA_STOPS[i])
        .mix(stop(PLASMA_STOPS[i + 1]), frac)
        .into_format();
    Rgb([color.red, color.green, color.blue])
}

/// Maps log10 surface density to a colour with fixed bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub vmin: f64,
    pub vmax: f64,
}

impl ColorScale {
    pub fn from_params(params: &RenderParams) -> Self {
        Self { vmin: params.vmin, vmax: params.vmax }
    }

    /// Colour of a cell. `None` (below the resolution floor) and values below `vmin` are
    /// under-range; values above `vmax` take the top colour.
    pub fn color(&self, log_density: Option<f64>) -> Rgb<u8> {
        match log_density {
            Some(v) if v >= self.vmin => plasma(((v - self.vmin) / (self.vmax - self.vmin)) as f32),
            _ => UNDER_COLOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plasma_endpoints() {
        let close = |a: Rgb<u8>, b: [u8; 3]| (0..3).all(|i| (a[i] as i16 - b[i] as i16).abs() <= 1);
        assert!(close(plasma(0.0), [13, 8, 135]));
        assert!(close(plasma(1.0), [240, 249, 33]));
        assert_eq!(plasma(-3.0), plasma(0.0));
        assert_eq!(plasma(7.0), plasma(1.0));
    }

    #[test]
    fn plasma_interior_matches_reference_colours() {
        let close = |a: Rgb<u8>, b: [u8; 3]| (0..3).all(|i| (a[i] as i16 - b[i] as i16).abs() <= 2);
        assert!(close(plasma(0.5), [204, 71, 120]), "plasma(0.5) = {:?}", plasma(0.5));
        assert!(close(plasma(0.75), [248, 149, 64]), "plasma(0.75) = {:?}", plasma(0.75));
        assert!(close(plasma(4.0 / 9.0), [189, 55, 134]));
        assert!(close(plasma(8.0 / 9.0), [253, 202, 38]));
    }

    #[test]
    fn plasma_brightens_monotonically() {
        let luminance = |c: Rgb<u8>| 0.299 * c[0] as f32 + 0.587 * c[1] as f32 + 0.114 * c[2] as f32;
        let mut previous = luminance(plasma(0.0));
        for i in 1..=64 {
            let current = luminance(plasma(i as f32 / 64.0));
            assert!(current >= previous - 0.5, "luminance dropped at step {}", i);
            previous = current;
        }
    }

    #[test]
    fn scale_masks_and_clips() {
        let scale = ColorScale { vmin: 5.5, vmax: 12.0 };
        assert_eq!(scale.color(None), UNDER_COLOR);
        assert_eq!(scale.color(Some(5.49)), UNDER_COLOR);
        assert_eq!(scale.color(Some(f64::NEG_INFINITY)), UNDER_COLOR);
        assert_eq!(scale.color(Some(5.5)), plasma(0.0));
        assert_eq!(scale.color(Some(12.0)), plasma(1.0));
        assert_eq!(scale.color(Some(15.0)), plasma(1.0));
        assert_ne!(scale.color(Some(8.0)), UNDER_COLOR);
    }
}
