//! `FileSpec` string/JSON formats accepted by `RecordFileReader::open_file_spec`
//! (spec.md §6): a plain path, a `"scheme:details?key=value&..."` URI, or a
//! JSON object naming storage/chunks/handler explicitly.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VrsError};

/// The handler name this crate actually supports; anything else in
/// `file_handler_name` is a configuration error (spec.md §1 Non-goals:
/// pluggable remote backends exist only at the [`crate::file_handler`] trait
/// boundary, not as selectable names here).
const DISK_FILE_HANDLER: &str = "diskfile";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(default, rename_all = "camelCase")]
pub struct FileSpec {
    pub storage: Option<String>,
    pub chunks: Vec<String>,
    pub file_name: Option<String>,
    pub file_handler_name: Option<String>,
    pub uri: Option<String>,
    pub extras: HashMap<String, String>,
}

impl FileSpec {
    /// Parse any of the three forms spec.md §6 accepts.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.starts_with('{') {
            return serde_json::from_str(trimmed)
                .map_err(|e| VrsError::ConfigurationError { reason: format!("invalid FileSpec JSON: {e}") });
        }
        if let Some((scheme, rest)) = trimmed.split_once(':') {
            if is_uri_scheme(scheme) && rest.starts_with("details?") {
                return Ok(FileSpec::from_details_uri(scheme, &rest["details?".len()..]));
            }
        }
        Ok(FileSpec {
            file_name: Some(trimmed.to_string()),
            ..FileSpec::default()
        })
    }

    fn from_details_uri(scheme: &str, query: &str) -> Self {
        let mut extras = HashMap::new();
        for pair in query.split('&').filter(|s| !s.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            extras.insert(key.to_string(), value.to_string());
        }
        FileSpec {
            storage: Some(scheme.to_string()),
            uri: Some(format!("{scheme}:details?{query}")),
            extras,
            ..FileSpec::default()
        }
    }

    /// Resolve this spec to a single local path, rejecting anything this
    /// crate's disk-only `FileHandler` can't serve.
    pub fn resolve_local_path(&self) -> Result<PathBuf> {
        if let Some(handler_name) = &self.file_handler_name {
            if handler_name != DISK_FILE_HANDLER {
                return Err(VrsError::ConfigurationError {
                    reason: format!("unsupported file handler {handler_name:?}; only {DISK_FILE_HANDLER:?} is built in"),
                });
            }
        }
        if let Some(chunk) = self.chunks.first() {
            return Ok(PathBuf::from(chunk));
        }
        if let Some(name) = &self.file_name {
            return Ok(PathBuf::from(name));
        }
        Err(VrsError::ConfigurationError {
            reason: "FileSpec names no chunks and no fileName".into(),
        })
    }
}

/// A bare ASCII-alphanumeric scheme, distinguishing `"details:..."` from a
/// Windows drive letter path like `"C:\recordings\x.vrs"`.
fn is_uri_scheme(scheme: &str) -> bool {
    scheme.len() > 1 && scheme.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path_becomes_file_name() {
        let spec = FileSpec::parse("/data/recording.vrs").unwrap();
        assert_eq!(spec.file_name.as_deref(), Some("/data/recording.vrs"));
        assert_eq!(spec.resolve_local_path().unwrap(), PathBuf::from("/data/recording.vrs"));
    }

    #[test]
    fn windows_drive_letter_path_is_not_mistaken_for_a_uri() {
        let spec = FileSpec::parse(r"C:\recordings\x.vrs").unwrap();
        assert_eq!(spec.file_name.as_deref(), Some(r"C:\recordings\x.vrs"));
    }

    #[test]
    fn details_uri_parses_scheme_and_query() {
        let spec = FileSpec::parse("s3:details?bucket=rigs&region=us-east-1").unwrap();
        assert_eq!(spec.storage.as_deref(), Some("s3"));
        assert_eq!(spec.extras.get("bucket"), Some(&"rigs".to_string()));
        assert_eq!(spec.extras.get("region"), Some(&"us-east-1".to_string()));
    }

    #[test]
    fn json_object_round_trips_every_field() {
        let json = r#"{"storage":"local","chunks":["a.vrs","a.vrs.1"],"fileName":"a.vrs","fileHandlerName":"diskfile","uri":null,"extras":{"k":"v"}}"#;
        let spec = FileSpec::parse(json).unwrap();
        assert_eq!(spec.chunks, vec!["a.vrs".to_string(), "a.vrs.1".to_string()]);
        assert_eq!(spec.resolve_local_path().unwrap(), PathBuf::from("a.vrs"));
    }

    #[test]
    fn unsupported_file_handler_name_is_rejected() {
        let spec = FileSpec {
            file_name: Some("x.vrs".to_string()),
            file_handler_name: Some("s3".to_string()),
            ..FileSpec::default()
        };
        assert!(spec.resolve_local_path().is_err());
    }
}
