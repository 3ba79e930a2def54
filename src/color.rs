use eframe::egui::Color32;
use palette::{IntoColor, Lab, Mix, Srgb};

// ---------------------------------------------------------------------------
// Diverging colour scale for correlation coefficients
// ---------------------------------------------------------------------------

const NEGATIVE: (f32, f32, f32) = (0.230, 0.299, 0.754);
const NEUTRAL: (f32, f32, f32) = (0.865, 0.865, 0.865);
const POSITIVE: (f32, f32, f32) = (0.706, 0.016, 0.150);

fn lab(rgb: (f32, f32, f32)) -> Lab {
    Srgb::new(rgb.0, rgb.1, rgb.2).into_color()
}

fn to_color32(lab: Lab) -> Color32 {
    let rgb: Srgb = lab.into_color();
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgb(channel(rgb.red), channel(rgb.green), channel(rgb.blue))
}

/// Blue for -1, light grey for 0, red for +1. Interpolated in Lab so the
/// two halves have comparable perceived lightness steps.
///
/// Undefined coefficients (NaN) are drawn as plain grey.
pub fn correlation_color(r: f64) -> Color32 {
    if r.is_nan() {
        return Color32::GRAY;
    }
    let t = r.clamp(-1.0, 1.0) as f32;
    let (end, factor) = if t < 0.0 {
        (NEGATIVE, -t)
    } else {
        (POSITIVE, t)
    };
    to_color32(lab(NEUTRAL).mix(lab(end), factor))
}

/// Annotation colour readable on top of [`correlation_color`].
pub fn annotation_color(r: f64) -> Color32 {
    if r.abs() > 0.6 {
        Color32::WHITE
    } else {
        Color32::BLACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extremes_are_red_and_blue() {
        let pos = correlation_color(1.0);
        let neg = correlation_color(-1.0);
        assert!(pos.r() > pos.b());
        assert!(neg.b() > neg.r());
    }

    #[test]
    fn zero_is_neutral_grey() {
        let c = correlation_color(0.0);
        let spread = c.r().max(c.g()).max(c.b()) - c.r().min(c.g()).min(c.b());
        assert!(spread <= 2, "{c:?}");
    }

    #[test]
    fn out_of_range_is_clamped_and_nan_is_grey() {
        assert_eq!(correlation_color(3.0), correlation_color(1.0));
        assert_eq!(correlation_color(f64::NAN), Color32::GRAY);
    }
}
