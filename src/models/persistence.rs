// Model persistence utilities
// Handles saving/loading the model payload + manifest

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use super::LinearModel;
use crate::errors::{Result, ServiceError};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const PAYLOAD_FILE: &str = "model.json";
pub const FLAVOR: &str = "linear_regression";
pub const FORMAT_VERSION: u32 = 1;

/// One column of the model's input schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub dtype: String,
}

/// Manifest saved alongside the model payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    /// Model flavor identifier
    pub flavor: String,
    /// Version of the persistence format
    pub format_version: u32,
    /// Payload file name, relative to the artifact directory
    pub payload: String,
    /// Hex SHA-256 of the payload bytes
    pub payload_sha256: String,
    pub input_schema: Vec<ColumnSpec>,
    pub target: String,
    /// A few training inputs, for humans and smoke tests
    #[serde(default)]
    pub input_example: Vec<f64>,
    pub created_at: String,
}

/// Save model with manifest
///
/// Creates two files inside `dir`:
/// - model.json - serialized model
/// - manifest.json - schema, checksum, format version
pub fn save_model_artifact(
    dir: &Path,
    model: &LinearModel,
    input_example: &[f64],
) -> Result<ModelManifest> {
    fs::create_dir_all(dir)?;

    let payload = serde_json::to_vec_pretty(model)?;
    fs::write(dir.join(PAYLOAD_FILE), &payload)?;

    let manifest = ModelManifest {
        flavor: FLAVOR.to_string(),
        format_version: FORMAT_VERSION,
        payload: PAYLOAD_FILE.to_string(),
        payload_sha256: sha256_hex(&payload),
        input_schema: vec![ColumnSpec {
            name: model.feature.clone(),
            dtype: "double".to_string(),
        }],
        target: model.target.clone(),
        input_example: input_example.to_vec(),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    fs::write(dir.join(MANIFEST_FILE), serde_json::to_vec_pretty(&manifest)?)?;

    tracing::debug!(dir = %dir.display(), "Saved model artifact");
    Ok(manifest)
}

/// Load and verify a model artifact.
///
/// Every failure here is a `Load` error: the caller already decided which
/// artifact to load, so anything missing or malformed means it is unusable.
pub fn load_model_artifact(dir: &Path) -> Result<(ModelManifest, LinearModel)> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let manifest_bytes = fs::read(&manifest_path).map_err(|e| {
        ServiceError::Load(format!("cannot read {}: {}", manifest_path.display(), e))
    })?;
    let manifest: ModelManifest = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| ServiceError::Load(format!("malformed manifest: {}", e)))?;

    if manifest.flavor != FLAVOR {
        return Err(ServiceError::Load(format!(
            "unsupported model flavor '{}'",
            manifest.flavor
        )));
    }
    if manifest.format_version != FORMAT_VERSION {
        return Err(ServiceError::Load(format!(
            "unsupported format version {} (expected {})",
            manifest.format_version, FORMAT_VERSION
        )));
    }

    let payload_path = dir.join(&manifest.payload);
    let payload = fs::read(&payload_path).map_err(|e| {
        ServiceError::Load(format!("cannot read {}: {}", payload_path.display(), e))
    })?;

    let digest = sha256_hex(&payload);
    if digest != manifest.payload_sha256 {
        return Err(ServiceError::Load(format!(
            "checksum mismatch for {} (manifest {}, actual {})",
            payload_path.display(),
            manifest.payload_sha256,
            digest
        )));
    }

    let model: LinearModel = serde_json::from_slice(&payload)
        .map_err(|e| ServiceError::Load(format!("malformed model payload: {}", e)))?;

    if !model.coefficient.is_finite() || !model.intercept.is_finite() {
        return Err(ServiceError::Load("model parameters are not finite".to_string()));
    }

    Ok((manifest, model))
}

/// Check if a saved artifact exists
pub fn model_exists(dir: &Path) -> bool {
    dir.join(MANIFEST_FILE).exists()
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_model() -> LinearModel {
        LinearModel {
            feature: "area".to_string(),
            target: "price".to_string(),
            coefficient: 150.0,
            intercept: 20_000.0,
        }
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = save_model_artifact(temp_dir.path(), &sample_model(), &[1200.0]).unwrap();
        assert_eq!(manifest.input_schema[0].name, "area");

        let (loaded_manifest, model) = load_model_artifact(temp_dir.path()).unwrap();
        assert_eq!(model, sample_model());
        assert_eq!(loaded_manifest.payload_sha256, manifest.payload_sha256);
    }

    #[test]
    fn test_tampered_payload_is_load_error() {
        let temp_dir = TempDir::new().unwrap();
        save_model_artifact(temp_dir.path(), &sample_model(), &[]).unwrap();
        fs::write(
            temp_dir.path().join(PAYLOAD_FILE),
            r#"{"feature":"area","target":"price","coefficient":1.0,"intercept":0.0}"#,
        )
        .unwrap();

        let result = load_model_artifact(temp_dir.path());
        assert!(matches!(result, Err(ServiceError::Load(msg)) if msg.contains("checksum")));
    }

    #[test]
    fn test_missing_manifest_is_load_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!model_exists(temp_dir.path()));
        assert!(matches!(
            load_model_artifact(temp_dir.path()),
            Err(ServiceError::Load(_))
        ));
    }
}
