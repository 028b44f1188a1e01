//! Bounded confidence score.

/// Errors that can occur when creating validated score types.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    /// The input was outside the inclusive `[0.0, 1.0]` range, or not finite.
    #[error("confidence score must be within [0.0, 1.0], got {0}")]
    OutOfRange(f32),
}

/// A confidence score guaranteed to lie in `[0.0, 1.0]`.
///
/// The score is a completeness proxy (fraction of required care-plan sections
/// populated), not a statistical model confidence. Wrapping it in a newtype
/// keeps the bound enforced at every deserialization boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceScore(f32);

impl ConfidenceScore {
    /// Creates a new `ConfidenceScore`, rejecting values outside `[0.0, 1.0]`
    /// and non-finite values.
    pub fn new(value: f32) -> Result<Self, ScoreError> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ScoreError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Returns the inner value.
    pub fn value(&self) -> f32 {
        self.0
    }
}

impl std::fmt::Display for ConfidenceScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for ConfidenceScore {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f32(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ConfidenceScore {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f32::deserialize(deserializer)?;
        ConfidenceScore::new(value).map_err(serde::de::Error::custom)
    }
}
