//! The `[reverb]` table and its JSON form.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::validation::Validator;

/// Longest accepted late reverberation tail in seconds.
pub const MAX_LATE_FILTER_LENGTH: f32 = 60.0;

/// Setup of the reverb object renderer.
///
/// # TOML Format
///
/// ```toml
/// [reverb]
/// max_objects = 4
/// discrete_reflections = 8
/// biquad_sections = 10
/// late_filter_length = 2.5
/// max_filter_updates_per_period = 1
/// late_decorrelation_filters = "filters/late_decorrelation.wav"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReverbConfig {
    /// Maximum number of simultaneously rendered reverb objects.
    pub max_objects: usize,
    /// Discrete reflections per reverb object.
    pub discrete_reflections: usize,
    /// Biquad sections of each reflection's wall filter.
    pub biquad_sections: usize,
    /// Late reverberation filter length in seconds.
    pub late_filter_length: f32,
    /// Late filter syntheses per period; 0 means one per object.
    pub max_filter_updates_per_period: usize,
    /// Multichannel WAV with one decorrelation filter per loudspeaker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub late_decorrelation_filters: Option<PathBuf>,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            max_objects: 4,
            discrete_reflections: 4,
            biquad_sections: 8,
            late_filter_length: 2.0,
            max_filter_updates_per_period: 0,
            late_decorrelation_filters: None,
        }
    }
}

/// Key names of the JSON reverb configuration string.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonReverbConfig {
    num_reverb_objects: usize,
    discrete_reflections_per_object: usize,
    late_reverb_filter_length: f32,
    #[serde(default)]
    late_reverb_decorrelation_filters: Option<PathBuf>,
    #[serde(default)]
    max_late_reverb_filter_updates_per_period: Option<usize>,
    #[serde(default)]
    discrete_reflection_biquad_sections: Option<usize>,
}

impl ReverbConfig {
    /// Parses the JSON object form:
    ///
    /// ```json
    /// { "numReverbObjects": 2, "discreteReflectionsPerObject": 12,
    ///   "lateReverbFilterLength": 1.5,
    ///   "lateReverbDecorrelationFilters": "decorr.wav" }
    /// ```
    ///
    /// An empty filter path counts as absent.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let parsed: JsonReverbConfig = serde_json::from_str(json)?;
        let defaults = Self::default();
        Ok(Self {
            max_objects: parsed.num_reverb_objects,
            discrete_reflections: parsed.discrete_reflections_per_object,
            biquad_sections: parsed
                .discrete_reflection_biquad_sections
                .unwrap_or(defaults.biquad_sections),
            late_filter_length: parsed.late_reverb_filter_length,
            max_filter_updates_per_period: parsed
                .max_late_reverb_filter_updates_per_period
                .unwrap_or(defaults.max_filter_updates_per_period),
            late_decorrelation_filters: parsed
                .late_reverb_decorrelation_filters
                .filter(|p| !p.as_os_str().is_empty()),
        })
    }

    pub(crate) fn check(&self, v: &mut Validator) {
        v.positive("reverb.max_objects", self.max_objects);
        v.positive("reverb.discrete_reflections", self.discrete_reflections);
        v.positive("reverb.biquad_sections", self.biquad_sections);
        v.in_range(
            "reverb.late_filter_length",
            f64::from(self.late_filter_length),
            f64::from(f32::MIN_POSITIVE),
            f64::from(MAX_LATE_FILTER_LENGTH),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigError;
    use crate::validation::ValidationError;

    #[test]
    fn json_form_maps_every_key() {
        let config = ReverbConfig::from_json_str(
            r#"{ "numReverbObjects": 2, "discreteReflectionsPerObject": 12,
                 "lateReverbFilterLength": 1.5,
                 "lateReverbDecorrelationFilters": "decorr.wav",
                 "maxLateReverbFilterUpdatesPerPeriod": 1 }"#,
        )
        .unwrap();
        assert_eq!(config.max_objects, 2);
        assert_eq!(config.discrete_reflections, 12);
        assert_eq!(config.late_filter_length, 1.5);
        assert_eq!(config.max_filter_updates_per_period, 1);
        assert_eq!(
            config.late_decorrelation_filters,
            Some(PathBuf::from("decorr.wav"))
        );
        assert_eq!(config.biquad_sections, ReverbConfig::default().biquad_sections);
    }

    #[test]
    fn empty_filter_path_is_absent() {
        let config = ReverbConfig::from_json_str(
            r#"{ "numReverbObjects": 1, "discreteReflectionsPerObject": 1,
                 "lateReverbFilterLength": 1.0, "lateReverbDecorrelationFilters": "" }"#,
        )
        .unwrap();
        assert!(config.late_decorrelation_filters.is_none());
        assert_eq!(config.max_filter_updates_per_period, 0);
    }

    #[test]
    fn missing_required_json_key_fails() {
        let result = ReverbConfig::from_json_str(r#"{ "numReverbObjects": 1 }"#);
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn zero_objects_fail_the_check() {
        let config = ReverbConfig {
            max_objects: 0,
            ..ReverbConfig::default()
        };
        let mut v = Validator::default();
        config.check(&mut v);
        assert_eq!(v.finish(), Err(ValidationError::Zero("reverb.max_objects")));
    }

    #[test]
    fn non_positive_length_fails_the_check() {
        let config = ReverbConfig {
            late_filter_length: 0.0,
            ..ReverbConfig::default()
        };
        let mut v = Validator::default();
        config.check(&mut v);
        assert!(matches!(
            v.finish(),
            Err(ValidationError::OutOfRange { field: "reverb.late_filter_length", .. })
        ));
    }
}
