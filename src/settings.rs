//! Dot-path settings backed by the store
//!
//! Keys look like `auth.okta.client_id`. Values are stored as strings; any key
//! ending in `.client_secret` is sealed with the [`Encrypter`] on write and
//! must be decrypted by the reader.

use std::collections::BTreeMap;
use tracing::info;

use crate::crypt::Encrypter;
use crate::store::GrcStore;
use crate::types::GrcError;

const SECRET_SUFFIX: &str = ".client_secret";

/// Interpret a stored flag value
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Read a flag; missing keys are false
pub async fn flag(store: &GrcStore, key: &str) -> Result<bool, GrcError> {
    Ok(store
        .setting(key)
        .await?
        .map(|v| is_truthy(&v))
        .unwrap_or(false))
}

/// Read a value, treating empty strings as unset
pub async fn text(store: &GrcStore, key: &str) -> Result<Option<String>, GrcError> {
    Ok(store.setting(key).await?.filter(|v| !v.trim().is_empty()))
}

fn is_secret_key(key: &str) -> bool {
    key.ends_with(SECRET_SUFFIX)
}

fn validate_key(key: &str) -> Result<(), GrcError> {
    let valid = !key.is_empty()
        && key.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        });

    if valid {
        Ok(())
    } else {
        Err(GrcError::validation(
            key,
            "Setting keys are dot-separated lowercase segments",
        ))
    }
}

fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(true) => "1".to_string(),
        serde_json::Value::Bool(false) => "0".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Write a batch of settings, sealing client secrets. Returns the keys written.
pub async fn write_settings(
    store: &GrcStore,
    encrypter: &Encrypter,
    values: &BTreeMap<String, serde_json::Value>,
) -> Result<Vec<String>, GrcError> {
    for key in values.keys() {
        validate_key(key)?;
    }

    let mut written = Vec::with_capacity(values.len());
    for (key, value) in values {
        let mut stored = stringify(value);
        if is_secret_key(key) && !stored.is_empty() {
            stored = encrypter.encrypt_string(&stored)?;
        }
        store.set_setting(key, &stored).await?;
        written.push(key.clone());
    }

    info!("Updated {} setting(s)", written.len());
    Ok(written)
}
