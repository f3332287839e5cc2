//! Value → colour encoding.
//!
//! Two policies share one entry point, [`ColorScale::color_for`]:
//!
//! * **Discrete**: a fixed table of absolute breakpoints. The first breakpoint
//!   (from the top) that the value exceeds picks the colour.
//! * **Continuous**: a single hue whose lightness is interpolated between a
//!   light and a dark bound according to `value / max_value`.
//!
//! Under both policies a value of `0` is painted with the no-data colour, so
//! "no data" stays visually distinct from "very low".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScaleError;
use crate::types::AnnotatedFeature;

/// An RGBA colour, written as `#rrggbb` (or `#rrggbbaa` when not opaque).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);
    pub const NO_DATA: Color = Color::rgb(0xcc, 0xcc, 0xcc);

    pub fn from_hex(hex: &str) -> Result<Self, ScaleError> {
        let digits = hex.trim().trim_start_matches('#');
        if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
            return Err(ScaleError::InvalidColor(hex.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| ScaleError::InvalidColor(hex.to_string()))
        };
        let a = if digits.len() == 8 { channel(6)? } else { 255 };
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a,
        })
    }

    /// Builds an opaque colour from HSL components (hue in degrees,
    /// saturation and lightness in percent).
    pub fn from_hsl(hue: f64, saturation: f64, lightness: f64) -> Self {
        let h = hue.rem_euclid(360.0) / 360.0;
        let s = (saturation / 100.0).clamp(0.0, 1.0);
        let l = (lightness / 100.0).clamp(0.0, 1.0);

        if s == 0.0 {
            let v = to_channel(l);
            return Color::rgb(v, v, v);
        }

        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        Color::rgb(
            to_channel(hue_to_rgb(p, q, h + 1.0 / 3.0)),
            to_channel(hue_to_rgb(p, q, h)),
            to_channel(hue_to_rgb(p, q, h - 1.0 / 3.0)),
        )
    }

    /// HSL lightness in `[0, 1]`. Higher is lighter.
    pub fn lightness(&self) -> f64 {
        let max = self.r.max(self.g).max(self.b) as f64;
        let min = self.r.min(self.g).min(self.b) as f64;
        (max + min) / 2.0 / 255.0
    }
}

fn hue_to_rgb(p: f64, q: f64, t: f64) -> f64 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn to_channel(v: f64) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl FromStr for Color {
    type Err = ScaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::from_hex(s)
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub threshold: f64,
    pub color: Color,
}

/// Absolute threshold table, kept sorted from the highest threshold down.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteScale {
    breakpoints: Vec<Breakpoint>,
    no_data: Color,
}

impl DiscreteScale {
    pub fn new(mut breakpoints: Vec<Breakpoint>, no_data: Color) -> Result<Self, ScaleError> {
        if breakpoints.iter().any(|b| !b.threshold.is_finite()) {
            return Err(ScaleError::InvalidBreakpoints(
                "thresholds must be finite".into(),
            ));
        }
        breakpoints.sort_by(|a, b| b.threshold.total_cmp(&a.threshold));
        Ok(Self {
            breakpoints,
            no_data,
        })
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn color_for(&self, value: f64) -> Color {
        if !(value > 0.0) {
            return self.no_data;
        }
        self.breakpoints
            .iter()
            .find(|b| value > b.threshold)
            .map(|b| b.color)
            .unwrap_or(self.no_data)
    }
}

impl Default for DiscreteScale {
    fn default() -> Self {
        Self {
            breakpoints: default_breakpoints(),
            no_data: Color::NO_DATA,
        }
    }
}

/// The employment-count table used when no other is configured.
pub fn default_breakpoints() -> Vec<Breakpoint> {
    [
        (300_000.0, Color::rgb(0x80, 0x00, 0x26)),
        (150_000.0, Color::rgb(0xbd, 0x00, 0x26)),
        (75_000.0, Color::rgb(0xe3, 0x1a, 0x1c)),
        (30_000.0, Color::rgb(0xfc, 0x4e, 0x2a)),
        (10_000.0, Color::rgb(0xfd, 0x8d, 0x3c)),
        (1_000.0, Color::rgb(0xfe, 0xb2, 0x4c)),
        (0.0, Color::rgb(0xff, 0xed, 0xa0)),
    ]
    .into_iter()
    .map(|(threshold, color)| Breakpoint { threshold, color })
    .collect()
}

/// Dataset-relative single-hue scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinuousScale {
    pub hue: f64,
    pub saturation: f64,
    /// Lightness (percent) at ratio 0.
    pub light: f64,
    /// Lightness (percent) at ratio 1.
    pub dark: f64,
    pub no_data: Color,
}

impl ContinuousScale {
    pub fn new(
        hue: f64,
        saturation: f64,
        light: f64,
        dark: f64,
        no_data: Color,
    ) -> Result<Self, ScaleError> {
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(saturation) || !in_range(light) || !in_range(dark) || !hue.is_finite() {
            return Err(ScaleError::InvalidIntensity(
                "saturation and lightness must be within 0..=100".into(),
            ));
        }
        if dark > light {
            return Err(ScaleError::InvalidIntensity(format!(
                "dark bound {dark} is lighter than light bound {light}"
            )));
        }
        Ok(Self {
            hue,
            saturation,
            light,
            dark,
            no_data,
        })
    }

    /// Position of `value` on the scale, in `[0, 1]`.
    pub fn ratio(value: f64, max_value: f64) -> f64 {
        if !(max_value > 0.0) || !(value > 0.0) {
            return 0.0;
        }
        (value / max_value).min(1.0)
    }

    pub fn lightness_for(&self, value: f64, max_value: f64) -> f64 {
        let ratio = Self::ratio(value, max_value);
        self.light + (self.dark - self.light) * ratio
    }

    pub fn color_for(&self, value: f64, max_value: f64) -> Color {
        if !(value > 0.0) {
            return self.no_data;
        }
        Color::from_hsl(
            self.hue,
            self.saturation,
            self.lightness_for(value, max_value),
        )
    }
}

impl Default for ContinuousScale {
    fn default() -> Self {
        Self {
            hue: 350.0,
            saturation: 90.0,
            light: 92.0,
            dark: 25.0,
            no_data: Color::NO_DATA,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColorScale {
    Discrete(DiscreteScale),
    Continuous(ContinuousScale),
}

impl Default for ColorScale {
    fn default() -> Self {
        ColorScale::Discrete(DiscreteScale::default())
    }
}

impl ColorScale {
    pub fn color_for(&self, value: f64, max_value: f64) -> Color {
        match self {
            ColorScale::Discrete(scale) => scale.color_for(value),
            ColorScale::Continuous(scale) => scale.color_for(value, max_value),
        }
    }

    pub fn no_data(&self) -> Color {
        match self {
            ColorScale::Discrete(scale) => scale.no_data,
            ColorScale::Continuous(scale) => scale.no_data,
        }
    }

    /// Paints every feature. The continuous policy is relative to the largest
    /// value in `features`, floored at 1.
    pub fn paint(&self, features: Vec<AnnotatedFeature>) -> (Vec<AnnotatedFeature>, f64) {
        let max_value = max_display_value(&features);
        let painted = features
            .into_iter()
            .map(|f| AnnotatedFeature {
                display_color: self.color_for(f.display_value, max_value),
                ..f
            })
            .collect();
        (painted, max_value)
    }
}

pub fn max_display_value(features: &[AnnotatedFeature]) -> f64 {
    features
        .iter()
        .map(|f| f.display_value)
        .filter(|v| v.is_finite())
        .fold(1.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trips_through_display() {
        assert_eq!(Color::from_hex("#800026").unwrap().to_string(), "#800026");
        assert_eq!(Color::from_hex("d47846ff").unwrap().to_string(), "#d47846");
        assert_eq!(Color::from_hex("#11223380").unwrap().to_string(), "#11223380");
    }

    #[test]
    fn bad_hex_is_rejected() {
        for bad in ["", "#fff", "#gggggg", "#12345", "#1234567"] {
            assert!(Color::from_hex(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn discrete_table_picks_first_exceeded_threshold() {
        let scale = DiscreteScale::default();
        let cases = [
            (400_000.0, "#800026"),
            (300_001.0, "#800026"),
            (300_000.0, "#bd0026"),
            (150_001.0, "#bd0026"),
            (80_000.0, "#e31a1c"),
            (50_000.0, "#fc4e2a"),
            (12_000.0, "#fd8d3c"),
            (5_000.0, "#feb24c"),
            (1.0, "#ffeda0"),
            (0.0, "#cccccc"),
        ];
        for (value, expected) in cases {
            assert_eq!(scale.color_for(value).to_string(), expected, "{value}");
        }
    }

    #[test]
    fn discrete_table_order_does_not_matter() {
        let mut shuffled = default_breakpoints();
        shuffled.reverse();
        let scale = DiscreteScale::new(shuffled, Color::NO_DATA).unwrap();
        assert_eq!(scale, DiscreteScale::default());
    }

    #[test]
    fn discrete_below_lowest_breakpoint_is_no_data() {
        let scale = DiscreteScale::new(
            vec![Breakpoint {
                threshold: 50.0,
                color: Color::rgb(1, 2, 3),
            }],
            Color::WHITE,
        )
        .unwrap();
        assert_eq!(scale.color_for(50.0), Color::WHITE);
        assert_eq!(scale.color_for(10.0), Color::WHITE);
        assert_eq!(scale.color_for(51.0), Color::rgb(1, 2, 3));
    }

    #[test]
    fn zero_is_no_data_under_both_policies() {
        let policies = [
            ColorScale::Discrete(DiscreteScale::default()),
            ColorScale::Continuous(ContinuousScale::default()),
        ];
        for scale in &policies {
            for max in [0.0, 1.0, 10.0, 1e9] {
                assert_eq!(scale.color_for(0.0, max), Color::NO_DATA);
            }
            assert_eq!(scale.color_for(f64::NAN, 10.0), Color::NO_DATA);
            assert_eq!(scale.color_for(-5.0, 10.0), Color::NO_DATA);
        }
    }

    #[test]
    fn continuous_ratio_is_clamped_and_guarded() {
        assert_eq!(ContinuousScale::ratio(5.0, 0.0), 0.0);
        assert_eq!(ContinuousScale::ratio(5.0, -1.0), 0.0);
        assert_eq!(ContinuousScale::ratio(20.0, 10.0), 1.0);
        assert_eq!(ContinuousScale::ratio(5.0, 10.0), 0.5);
    }

    #[test]
    fn continuous_bounds_map_to_light_and_dark() {
        let scale = ContinuousScale::default();
        assert_eq!(scale.lightness_for(0.0, 100.0), scale.light);
        assert_eq!(scale.lightness_for(50.0, 100.0), (scale.light + scale.dark) / 2.0);
        assert_eq!(scale.lightness_for(100.0, 100.0), scale.dark);
        assert_eq!(scale.lightness_for(250.0, 100.0), scale.dark);
    }

    #[test]
    fn continuous_is_monotonic() {
        let scale = ContinuousScale::default();
        let max = 1_000.0;
        let mut previous = scale.color_for(1.0, max);
        for step in 2..=1_000 {
            let current = scale.color_for(step as f64, max);
            assert!(
                current.lightness() <= previous.lightness(),
                "{step}: {current} lighter than {previous}"
            );
            assert!(current.r <= previous.r && current.g <= previous.g && current.b <= previous.b);
            previous = current;
        }
    }

    #[test]
    fn continuous_is_deterministic() {
        let scale = ContinuousScale::default();
        assert_eq!(scale.color_for(42.0, 99.0), scale.color_for(42.0, 99.0));
    }

    #[test]
    fn continuous_rejects_inverted_bounds() {
        assert!(ContinuousScale::new(200.0, 80.0, 20.0, 90.0, Color::NO_DATA).is_err());
        assert!(ContinuousScale::new(200.0, 180.0, 90.0, 20.0, Color::NO_DATA).is_err());
    }

    #[test]
    fn hsl_greys_and_primaries() {
        assert_eq!(Color::from_hsl(0.0, 0.0, 100.0), Color::WHITE);
        assert_eq!(Color::from_hsl(0.0, 100.0, 50.0), Color::rgb(255, 0, 0));
        assert_eq!(Color::from_hsl(120.0, 100.0, 50.0), Color::rgb(0, 255, 0));
        assert_eq!(Color::from_hsl(240.0, 100.0, 50.0), Color::rgb(0, 0, 255));
    }
}
