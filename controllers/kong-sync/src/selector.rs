//! Label selectors and selector lookup.
//!
//! A selector is an AND of requirements, each either "label exists" or
//! "label equals value". Selectors are validated when built so a malformed
//! label key from configuration fails at startup instead of at the API server.

use crate::error::ControllerError;
use crate::store::ResourceStore;
use k8s_openapi::api::core::v1::Service;
use kube::core::{Expression, Selector, SelectorExt};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Single label requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Exists(String),
    Equals(String, String),
}

impl Requirement {
    fn to_expression(&self) -> Expression {
        match self {
            Requirement::Exists(key) => Expression::Exists(key.clone()),
            Requirement::Equals(key, value) => Expression::Equal(key.clone(), value.clone()),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Exists(key) => write!(f, "{}", key),
            Requirement::Equals(key, value) => write!(f, "{}={}", key, value),
        }
    }
}

/// Conjunction of label requirements. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Selector matching every object
    pub fn everything() -> Self {
        Self::default()
    }

    /// Selector requiring `key` to be present
    pub fn exists(key: &str) -> Result<Self, ControllerError> {
        Self::everything().and_exists(key)
    }

    /// Add a "label exists" requirement
    pub fn and_exists(mut self, key: &str) -> Result<Self, ControllerError> {
        validate_key(key)?;
        self.requirements.push(Requirement::Exists(key.to_string()));
        Ok(self)
    }

    /// Add a "label equals value" requirement
    pub fn and_equals(mut self, key: &str, value: &str) -> Result<Self, ControllerError> {
        validate_key(key)?;
        validate_value(value)?;
        self.requirements
            .push(Requirement::Equals(key.to_string(), value.to_string()));
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// kube-rs form of this selector
    pub fn to_selector(&self) -> Selector {
        self.requirements
            .iter()
            .map(Requirement::to_expression)
            .collect()
    }

    /// Whether an object carrying `labels` satisfies every requirement
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.to_selector().matches(labels)
    }
}

/// Renders the API server form, e.g. `kong.api,service=myapp-auth`
impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.requirements.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join(","))
    }
}

/// Validate a label key: an optional DNS subdomain prefix followed by `/`
/// and a name of at most 63 characters.
pub fn validate_key(key: &str) -> Result<(), ControllerError> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        let valid_prefix = !prefix.is_empty()
            && prefix.len() <= 253
            && prefix.split('.').all(|part| {
                !part.is_empty()
                    && part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                    && !part.starts_with('-')
                    && !part.ends_with('-')
            });
        if !valid_prefix {
            return Err(ControllerError::InvalidSelector(format!(
                "invalid label key prefix in {:?}",
                key
            )));
        }
    }

    if name.is_empty() || !is_label_token(name) {
        return Err(ControllerError::InvalidSelector(format!(
            "invalid label key {:?}",
            key
        )));
    }
    Ok(())
}

fn validate_value(value: &str) -> Result<(), ControllerError> {
    if value.is_empty() || is_label_token(value) {
        Ok(())
    } else {
        Err(ControllerError::InvalidSelector(format!(
            "invalid label value {:?}",
            value
        )))
    }
}

// At most 63 characters of [A-Za-z0-9-_.], starting and ending alphanumeric.
fn is_label_token(token: &str) -> bool {
    token.len() <= 63
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && token.starts_with(|c: char| c.is_ascii_alphanumeric())
        && token.ends_with(|c: char| c.is_ascii_alphanumeric())
}

/// Resolve the Service whose `label` equals `value`, optionally also
/// requiring `required_label` to be present. The first match wins.
pub async fn lookup_service(
    services: &dyn ResourceStore<Service>,
    label: &str,
    value: &str,
    required_label: Option<&str>,
) -> Result<Service, ControllerError> {
    let mut selector = LabelSelector::everything().and_equals(label, value)?;
    if let Some(required) = required_label {
        selector = selector.and_exists(required)?;
    }

    debug!("Looking up Service with selector {}", selector);
    let mut matches = services.list(&selector).await?;
    if matches.len() > 1 {
        debug!("{} Services match {}, using the first", matches.len(), selector);
    }
    if matches.is_empty() {
        return Err(ControllerError::ServiceNotFound(value.to_string()));
    }
    Ok(matches.swap_remove(0))
}
