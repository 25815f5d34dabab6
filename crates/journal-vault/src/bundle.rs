//! Sensitive field bundle
//!
//! The fixed set of journal fields that never reach the remote store in
//! plaintext once a record is encrypted. Every field has an explicit empty
//! value (empty string, empty list or `None`), so a bundle serializes the
//! same way every time and survives a decrypt unchanged.

#![allow(missing_docs)]

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Sentinel written into sensitive text columns of an encrypted record
pub const ENCRYPTED_PLACEHOLDER: &str = "[encrypted]";

/// Accept `null` wherever an empty value is expected
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Protected journal fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitiveFieldBundle {
    /// Primary strain
    #[serde(deserialize_with = "null_as_default")]
    pub strain_name: String,
    /// Additional strains in a blend
    #[serde(deserialize_with = "null_as_default")]
    pub strain_names: Vec<String>,
    /// THC percentage (0-100)
    pub thc_percentage: Option<f64>,
    /// CBD percentage (0-100)
    pub cbd_percentage: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub dosage: String,
    /// Consumption method
    #[serde(deserialize_with = "null_as_default")]
    pub method: String,
    #[serde(deserialize_with = "null_as_default")]
    pub notes_before: String,
    #[serde(deserialize_with = "null_as_default")]
    pub notes_after: String,
    #[serde(deserialize_with = "null_as_default")]
    pub observations: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub activities: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub side_effects: Vec<String>,
    pub before_mood: Option<u8>,
    pub before_pain: Option<u8>,
    pub before_anxiety: Option<u8>,
    pub before_energy: Option<u8>,
    pub before_focus: Option<u8>,
    pub after_mood: Option<u8>,
    pub after_pain: Option<u8>,
    pub after_anxiety: Option<u8>,
    pub after_energy: Option<u8>,
    pub after_focus: Option<u8>,
    /// Session duration in minutes
    pub duration_minutes: Option<u32>,
    #[serde(deserialize_with = "null_as_default")]
    pub icon: String,
}

impl SensitiveFieldBundle {
    /// The sanitized values stored in plaintext columns of an encrypted record
    pub fn placeholder() -> Self {
        Self {
            strain_name: ENCRYPTED_PLACEHOLDER.to_string(),
            dosage: ENCRYPTED_PLACEHOLDER.to_string(),
            method: ENCRYPTED_PLACEHOLDER.to_string(),
            notes_before: ENCRYPTED_PLACEHOLDER.to_string(),
            notes_after: ENCRYPTED_PLACEHOLDER.to_string(),
            icon: ENCRYPTED_PLACEHOLDER.to_string(),
            ..Self::default()
        }
    }

    /// True if every column holds its placeholder value
    pub fn is_placeholder(&self) -> bool {
        *self == Self::placeholder()
    }

    /// Check the bundle serializes losslessly.
    ///
    /// Non-finite floats would turn into `null` in JSON and come back as a
    /// different value, so they are rejected before encryption.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("thc_percentage", self.thc_percentage),
            ("cbd_percentage", self.cbd_percentage),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || !(0.0..=100.0).contains(&v) {
                    return Err(Error::Validation(format!(
                        "{} must be between 0 and 100",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Serialize to the canonical JSON bytes that get encrypted
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate()?;
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse decrypted bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_and_null_fields_default() {
        let bundle: SensitiveFieldBundle = serde_json::from_str(
            r#"{"strain_name": "Blue Dream", "notes_before": null, "observations": null}"#,
        )
        .unwrap();

        assert_eq!(bundle.strain_name, "Blue Dream");
        assert_eq!(bundle.notes_before, "");
        assert!(bundle.observations.is_empty());
        assert_eq!(bundle.before_mood, None);
    }

    #[test]
    fn test_serialization_is_stable() {
        let bundle = SensitiveFieldBundle {
            strain_name: "Harlequin".to_string(),
            thc_percentage: Some(5.5),
            side_effects: vec!["dry mouth".to_string()],
            after_pain: Some(2),
            ..Default::default()
        };

        let a = bundle.to_bytes().unwrap();
        let b = bundle.clone().to_bytes().unwrap();
        assert_eq!(a, b);
        assert_eq!(SensitiveFieldBundle::from_bytes(&a).unwrap(), bundle);
    }

    #[test]
    fn test_placeholder_shape() {
        let placeholder = SensitiveFieldBundle::placeholder();
        assert_eq!(placeholder.notes_after, ENCRYPTED_PLACEHOLDER);
        assert!(placeholder.activities.is_empty());
        assert_eq!(placeholder.thc_percentage, None);
        assert!(placeholder.is_placeholder());
        assert!(!SensitiveFieldBundle::default().is_placeholder());
    }

    #[test]
    fn test_non_finite_percentage_rejected() {
        let bundle = SensitiveFieldBundle {
            thc_percentage: Some(f64::NAN),
            ..Default::default()
        };
        assert!(matches!(bundle.to_bytes(), Err(Error::Validation(_))));

        let bundle = SensitiveFieldBundle {
            cbd_percentage: Some(120.0),
            ..Default::default()
        };
        assert!(bundle.validate().is_err());
    }
}
