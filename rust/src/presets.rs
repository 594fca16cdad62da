use serde::Serialize;

pub const DIMENSION_MIN: u32 = 512;
pub const DIMENSION_MAX: u32 = 2048;
pub const DIMENSION_STEP: u32 = 64;
pub const STEPS_MIN: u32 = 1;
pub const STEPS_MAX: u32 = 50;

pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AspectRatioPreset {
    pub label: &'static str,
    pub standard: (u32, u32),
    /// `None` when doubling the standard size would leave the slider range.
    pub high: Option<(u32, u32)>,
}

impl AspectRatioPreset {
    pub fn dimensions(&self, high_resolution: bool) -> (u32, u32) {
        if high_resolution {
            self.high.unwrap_or(self.standard)
        } else {
            self.standard
        }
    }
}

pub const ASPECT_RATIOS: [AspectRatioPreset; 5] = [
    AspectRatioPreset {
        label: "1:1",
        standard: (1024, 1024),
        high: Some((2048, 2048)),
    },
    AspectRatioPreset {
        label: "16:9",
        standard: (1024, 576),
        high: Some((2048, 1152)),
    },
    AspectRatioPreset {
        label: "9:16",
        standard: (576, 1024),
        high: Some((1152, 2048)),
    },
    AspectRatioPreset {
        label: "4:3",
        standard: (1152, 896),
        high: None,
    },
    AspectRatioPreset {
        label: "3:4",
        standard: (768, 1024),
        high: Some((1536, 2048)),
    },
];

pub fn find_preset(label: &str) -> Option<&'static AspectRatioPreset> {
    let label = label.trim();
    ASPECT_RATIOS.iter().find(|preset| preset.label == label)
}

/// Clamps to the slider range and snaps to the nearest 64px notch.
pub fn clamp_dimension(value: i64) -> u32 {
    let clamped = value.clamp(i64::from(DIMENSION_MIN), i64::from(DIMENSION_MAX));
    let step = i64::from(DIMENSION_STEP);
    let snapped = (clamped + step / 2) / step * step;
    // Range bounds are multiples of the step, so snapping stays inside them.
    u32::try_from(snapped.min(i64::from(DIMENSION_MAX))).unwrap_or(DIMENSION_MAX)
}

pub fn clamp_steps(value: i64) -> u32 {
    let clamped = value.clamp(i64::from(STEPS_MIN), i64::from(STEPS_MAX));
    u32::try_from(clamped).unwrap_or(STEPS_MAX)
}

#[cfg(test)]
mod tests {
    use super::{clamp_dimension, clamp_steps, find_preset, ASPECT_RATIOS};

    #[test]
    fn sixteen_nine_switches_between_tiers() {
        let preset = find_preset("16:9").expect("16:9 preset");
        assert_eq!(preset.dimensions(false), (1024, 576));
        assert_eq!(preset.dimensions(true), (2048, 1152));
    }

    #[test]
    fn ratio_without_high_tier_keeps_standard_size() {
        let preset = find_preset("4:3").expect("4:3 preset");
        assert_eq!(preset.dimensions(true), (1152, 896));
    }

    #[test]
    fn every_preset_fits_slider_grid() {
        for preset in ASPECT_RATIOS {
            for high in [false, true] {
                let (w, h) = preset.dimensions(high);
                assert_eq!(clamp_dimension(i64::from(w)), w, "{}", preset.label);
                assert_eq!(clamp_dimension(i64::from(h)), h, "{}", preset.label);
            }
        }
    }

    #[test]
    fn dimensions_clamp_and_snap() {
        assert_eq!(clamp_dimension(-5), 512);
        assert_eq!(clamp_dimension(100), 512);
        assert_eq!(clamp_dimension(512), 512);
        assert_eq!(clamp_dimension(600), 576);
        assert_eq!(clamp_dimension(607), 576);
        assert_eq!(clamp_dimension(608), 640);
        assert_eq!(clamp_dimension(2048), 2048);
        assert_eq!(clamp_dimension(2047), 2048);
        assert_eq!(clamp_dimension(99_999), 2048);
    }

    #[test]
    fn steps_clamp_to_range() {
        assert_eq!(clamp_steps(0), 1);
        assert_eq!(clamp_steps(-3), 1);
        assert_eq!(clamp_steps(9), 9);
        assert_eq!(clamp_steps(50), 50);
        assert_eq!(clamp_steps(51), 50);
    }

    #[test]
    fn unknown_label_has_no_preset() {
        assert!(find_preset("21:9").is_none());
        assert!(find_preset(" 1:1 ").is_some());
    }
}
