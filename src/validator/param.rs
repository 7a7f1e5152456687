//! Configuration parameters and their value domains.
//!
//! Values travel as text end to end, so each predicate checks the exact
//! textual forms the device accepts before comparing against the range.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Closed set of device configuration parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigParameter {
    /// Lens focus position, 0-1600.
    Focus,
    /// Exposure time, 0.0-1000.0 with at most one fractional digit.
    Exposure,
    /// Signed sensor gain, -12 to +12.
    Gain,
    /// LED pattern letter, a-h.
    LedPattern,
    /// LED intensity, 0-255.
    LedIntensity,
    /// Photometric capture mode, 0 or 1.
    PhotometricMode,
}

impl ConfigParameter {
    /// All parameters, in declaration order.
    pub const ALL: [ConfigParameter; 6] = [
        ConfigParameter::Focus,
        ConfigParameter::Exposure,
        ConfigParameter::Gain,
        ConfigParameter::LedPattern,
        ConfigParameter::LedIntensity,
        ConfigParameter::PhotometricMode,
    ];

    /// Wire name of the parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigParameter::Focus => "focus",
            ConfigParameter::Exposure => "exposure",
            ConfigParameter::Gain => "gain",
            ConfigParameter::LedPattern => "led_pattern",
            ConfigParameter::LedIntensity => "led_intensity",
            ConfigParameter::PhotometricMode => "photometric_mode",
        }
    }

    /// Position of the parameter in [`ConfigParameter::ALL`].
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Value the gateway assumes before the device has been read.
    pub fn default_value(self) -> Option<&'static str> {
        match self {
            ConfigParameter::PhotometricMode => Some("0"),
            ConfigParameter::LedPattern => Some("a"),
            _ => None,
        }
    }

    /// Whether `value` is a physically valid setting for this parameter.
    pub fn accepts(self, value: &str) -> bool {
        match self {
            ConfigParameter::Focus => unsigned_at_most(value, 1600),
            ConfigParameter::Exposure => is_exposure(value),
            ConfigParameter::Gain => is_gain(value),
            ConfigParameter::LedPattern => is_led_pattern(value),
            ConfigParameter::LedIntensity => unsigned_at_most(value, 255),
            ConfigParameter::PhotometricMode => matches!(value, "0" | "1"),
        }
    }
}

impl fmt::Display for ConfigParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a parameter name is not one of the six known parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown configuration parameter '{0}'")]
pub struct UnknownParameter(pub String);

impl FromStr for ConfigParameter {
    type Err = UnknownParameter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigParameter::ALL
            .into_iter()
            .find(|param| param.as_str() == s)
            .ok_or_else(|| UnknownParameter(s.to_string()))
    }
}

/// Typed view of `photometric_mode`, which drives capture timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhotometricMode {
    /// `photometric_mode:0`, inspection takes 2.0-3.0 s.
    #[default]
    Off,
    /// `photometric_mode:1`, inspection takes 3.5-4.5 s.
    On,
}

impl PhotometricMode {
    /// Interpret a mirrored value. Anything other than `"1"` is treated as off.
    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some("1") => PhotometricMode::On,
            _ => PhotometricMode::Off,
        }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

// Canonical unsigned integer: digits only, no sign, no leading zeros.
fn unsigned_at_most(value: &str, max: u32) -> bool {
    if !is_digits(value) || (value.len() > 1 && value.starts_with('0')) {
        return false;
    }
    value.parse::<u32>().is_ok_and(|n| n <= max)
}

fn is_exposure(value: &str) -> bool {
    let (int_part, frac_part) = match value.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (value, None),
    };

    if !is_digits(int_part) || int_part.len() > 4 {
        return false;
    }
    if let Some(frac) = frac_part {
        if frac.len() != 1 || !is_digits(frac) {
            return false;
        }
    }
    // The only four-digit form is the upper bound, written with its decimal.
    if int_part.len() == 4 {
        return int_part == "1000" && frac_part == Some("0");
    }

    let Ok(whole) = int_part.parse::<u32>() else {
        return false;
    };
    let tenths = frac_part
        .and_then(|f| f.parse::<u32>().ok())
        .unwrap_or(0);
    whole * 10 + tenths <= 10_000
}

fn is_gain(value: &str) -> bool {
    let Some(magnitude) = value.strip_prefix('+').or_else(|| value.strip_prefix('-')) else {
        return false;
    };
    unsigned_at_most(magnitude, 12)
}

fn is_led_pattern(value: &str) -> bool {
    matches!(value.as_bytes(), [b'a'..=b'h'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for param in ConfigParameter::ALL {
            assert_eq!(param.as_str().parse::<ConfigParameter>(), Ok(param));
            assert_eq!(ConfigParameter::ALL[param.index()], param);
        }
        assert!("iso".parse::<ConfigParameter>().is_err());
    }

    #[test]
    fn test_focus_bounds() {
        let focus = ConfigParameter::Focus;
        assert!(focus.accepts("0"));
        assert!(focus.accepts("800"));
        assert!(focus.accepts("1600"));
        assert!(!focus.accepts("1601"));
        assert!(!focus.accepts("-1"));
        assert!(!focus.accepts("+5"));
        assert!(!focus.accepts("0800"));
        assert!(!focus.accepts("12.5"));
        assert!(!focus.accepts("99999999999"));
    }

    #[test]
    fn test_exposure_domain() {
        let exposure = ConfigParameter::Exposure;
        for ok in ["0", "0.0", "5", "12.5", "999.9", "007", "1000.0"] {
            assert!(exposure.accepts(ok), "{ok} should be accepted");
        }
        for bad in ["1000", "1000.1", "1001.0", "12.55", "12.", ".5", "-1.0", "+1", "0999.5", "abc"] {
            assert!(!exposure.accepts(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_gain_requires_sign_and_range() {
        let gain = ConfigParameter::Gain;
        assert!(gain.accepts("+12"));
        assert!(gain.accepts("-12"));
        assert!(gain.accepts("+0"));
        assert!(gain.accepts("-7"));
        assert!(!gain.accepts("+13"));
        assert!(!gain.accepts("-13"));
        assert!(!gain.accepts("5"));
        assert!(!gain.accepts("+05"));
        assert!(!gain.accepts("+"));
    }

    #[test]
    fn test_led_pattern_letters() {
        let pattern = ConfigParameter::LedPattern;
        for letter in 'a'..='h' {
            assert!(pattern.accepts(&letter.to_string()));
        }
        assert!(!pattern.accepts("i"));
        assert!(!pattern.accepts("A"));
        assert!(!pattern.accepts("ab"));
        assert!(!pattern.accepts(""));
    }

    #[test]
    fn test_led_intensity_bounds() {
        let intensity = ConfigParameter::LedIntensity;
        assert!(intensity.accepts("0"));
        assert!(intensity.accepts("255"));
        assert!(!intensity.accepts("256"));
    }

    #[test]
    fn test_photometric_mode_values() {
        let mode = ConfigParameter::PhotometricMode;
        assert!(mode.accepts("0"));
        assert!(mode.accepts("1"));
        assert!(!mode.accepts("2"));
        assert!(!mode.accepts("01"));
        assert_eq!(PhotometricMode::from_value(Some("1")), PhotometricMode::On);
        assert_eq!(PhotometricMode::from_value(Some("0")), PhotometricMode::Off);
        assert_eq!(PhotometricMode::from_value(None), PhotometricMode::Off);
    }
}
