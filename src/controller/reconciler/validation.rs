//! # Spec Validation
//!
//! Rules a `SplunkEnterpriseSpec` must satisfy before anything is provisioned.
//! A rejected spec is reported on the resource status and is not retried
//! until the object changes.

use crate::constants::MAX_REPLICAS;
use crate::crd::SplunkEnterpriseSpec;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

// Kubernetes resource quantity: decimal number, then a binary suffix,
// a decimal suffix or an exponent.
// Reference: https://kubernetes.io/docs/reference/kubernetes-api/common-definitions/quantity/
static STORAGE_QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+|Ki|Mi|Gi|Ti|Pi|Ei|m|k|M|G|T|P|E)?$")
        .expect("Failed to compile STORAGE_QUANTITY regex - this should never happen")
});

// http(s) URL or absolute path, no whitespace
static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://\S+|/\S*)$")
        .expect("Failed to compile LOCATION regex - this should never happen")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("replicas must be between 1 and {max}, got {value}")]
    Replicas { value: i32, max: i32 },
    #[error("invalid image reference '{0}'")]
    Image(String),
    #[error("{field} is not a valid storage quantity: '{value}'")]
    StorageQuantity { field: &'static str, value: String },
    #[error("{field} must be an http(s) URL or an absolute path, got '{value}'")]
    Location { field: &'static str, value: String },
}

/// Validation rules applied to the desired state
pub trait Validator: Send + Sync {
    fn validate(&self, spec: &SplunkEnterpriseSpec) -> Result<(), ValidationError>;
}

/// Default rules for `SplunkEnterpriseSpec`
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecValidator;

impl Validator for SpecValidator {
    fn validate(&self, spec: &SplunkEnterpriseSpec) -> Result<(), ValidationError> {
        if !(1..=MAX_REPLICAS).contains(&spec.replicas) {
            return Err(ValidationError::Replicas {
                value: spec.replicas,
                max: MAX_REPLICAS,
            });
        }

        if spec.image.is_empty() || spec.image.chars().any(char::is_whitespace) {
            return Err(ValidationError::Image(spec.image.clone()));
        }

        for (field, value) in [("etcStorage", &spec.etc_storage), ("varStorage", &spec.var_storage)] {
            if !is_storage_quantity(value) {
                return Err(ValidationError::StorageQuantity {
                    field,
                    value: value.clone(),
                });
            }
        }

        for (field, value) in [("defaultsUrl", &spec.defaults_url), ("licenseUrl", &spec.license_url)] {
            if let Some(value) = value {
                if !is_location(value) {
                    return Err(ValidationError::Location {
                        field,
                        value: value.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn is_storage_quantity(value: &str) -> bool {
    STORAGE_QUANTITY.is_match(value)
}

fn is_location(value: &str) -> bool {
    LOCATION.is_match(value)
}
