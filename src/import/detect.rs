//! Content recognition and normalization.
//!
//! Raw file content goes through up to three steps: decryption when the
//! payload carries the method marker line, JSON parsing, and format
//! recognition. The output is always the canonical envelope with `kind`
//! set to `ARC#Import`; content that no format claims fails with
//! [`crate::Error::ContentNotRecognized`].

use std::borrow::Cow;

use serde_json::Value;

use crate::crypto::{AES_METHOD, Encryption, sealed_body};
use crate::import::transformers::ImportTransformer;
use crate::models::{ExportEnvelope, Record, kinds};
use crate::{Error, Result, UNKNOWN_VERSION};

/// Normalizes raw file content into the canonical envelope.
///
/// # Errors
///
/// Fails with [`Error::InvalidInput`] on an encrypted payload without a
/// passphrase or on malformed JSON, with
/// [`Error::FeatureNotEnabled`] when decryption is needed but no
/// [`Encryption`] collaborator was given, and with
/// [`Error::ContentNotRecognized`] when no format claims the content.
pub async fn normalize(
    content: &str,
    encryption: Option<&dyn Encryption>,
    passphrase: Option<&str>,
) -> Result<ExportEnvelope> {
    let plaintext = decrypt_if_needed(content, encryption, passphrase).await?;
    let data = parse(&plaintext)?;
    normalize_value(data).await
}

/// Decrypts the content when it carries the method marker line, otherwise
/// returns it unchanged.
pub(crate) async fn decrypt_if_needed<'a>(
    content: &'a str,
    encryption: Option<&dyn Encryption>,
    passphrase: Option<&str>,
) -> Result<Cow<'a, str>> {
    let Some(body) = sealed_body(content) else {
        return Ok(Cow::Borrowed(content));
    };
    let passphrase = passphrase.ok_or_else(|| {
        Error::InvalidInput("the file is encrypted and no passphrase was given".to_string())
    })?;
    let encryption =
        encryption.ok_or_else(|| Error::FeatureNotEnabled("encryption".to_string()))?;
    tracing::debug!("decrypting import payload");
    let plaintext = encryption.decrypt(body, passphrase, AES_METHOD).await?;
    Ok(Cow::Owned(plaintext))
}

/// Parses the content as JSON.
pub(crate) fn parse(content: &str) -> Result<Value> {
    serde_json::from_str(content)
        .map_err(|e| Error::InvalidInput(format!("unable to read the file: {e}")))
}

/// Recognizes the format and runs the matching transformer.
pub(crate) async fn normalize_value(data: Value) -> Result<ExportEnvelope> {
    if let Some(request) = single_request(&data) {
        tracing::debug!("recognized a single request file");
        return Ok(wrap_single_request(request));
    }
    let Some(transformer) = ImportTransformer::for_object(&data) else {
        return Err(Error::ContentNotRecognized);
    };
    tracing::debug!(?transformer, "recognized import format");
    transformer.transform(data).await
}

/// A file holding one exported request: it has a URL and a method but none
/// of the envelope's record arrays.
fn single_request(data: &Value) -> Option<&Record> {
    let object = data.as_object()?;
    if object.contains_key("requests") || object.contains_key("projects") {
        return None;
    }
    let has_url = object.get("url").is_some_and(Value::is_string);
    let has_method = object.get("method").is_some_and(Value::is_string);
    (has_url && has_method).then_some(object)
}

fn wrap_single_request(source: &Record) -> ExportEnvelope {
    let mut request = source.clone();
    let id = request.remove("_id");
    if !request.contains_key("key") {
        let key = match id.as_ref().and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        request.insert("key".to_string(), Value::String(key));
    }
    request.remove("_rev");
    request.insert(
        "kind".to_string(),
        Value::String(kinds::REQUEST_DATA.to_string()),
    );

    ExportEnvelope {
        created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        version: UNKNOWN_VERSION.to_string(),
        kind: kinds::IMPORT.to_string(),
        requests: Some(vec![request]),
        ..Default::default()
    }
}
