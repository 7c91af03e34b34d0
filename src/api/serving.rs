//! JSON serving surface shared by the C ABI and embedding hosts.
//!
//! Every call returns one envelope:
//!
//! ```text
//! {"status":"ok","result":...}
//! {"status":"error","code":5,"kind":"not_found","message":"..."}
//! ```

use std::path::Path;

use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use crate::common::error::{RealtyCode, RealtyError, RealtyResult};
use crate::data::domain::RecordSchema;
use crate::data::service::load_csv;
use crate::evaluation::domain::TrainingMetrics;
use crate::inference::domain::{PredictRequest, PredictionResult};
use crate::inference::service::InferenceService;
use crate::training::domain::{ArtifactId, ArtifactRegistry, ModelKind, TrainConfig};
use crate::training::service::train_and_register;

/// Result body of a successful training call.
#[derive(Clone, Debug, Serialize)]
pub struct TrainSummary {
    pub artifact_id: ArtifactId,
    pub model_kind: ModelKind,
    pub metrics: TrainingMetrics,
}

/// Handle a `{"record": {...}, "artifact_id": "..."?}` payload.
pub fn predict_json<R>(service: &InferenceService<R>, payload: &str) -> String
where
    R: ArtifactRegistry + ?Sized,
{
    predict_json_for(service, payload, None)
}

/// Like [`predict_json`], with `artifact_id` overriding the payload's own.
pub fn predict_json_for<R>(service: &InferenceService<R>, payload: &str, artifact_id: Option<ArtifactId>) -> String
where
    R: ArtifactRegistry + ?Sized,
{
    envelope(predict_inner(service, payload, artifact_id))
}

fn predict_inner<R>(
    service: &InferenceService<R>,
    payload: &str,
    artifact_id: Option<ArtifactId>,
) -> RealtyResult<PredictionResult>
where
    R: ArtifactRegistry + ?Sized,
{
    let mut request: PredictRequest =
        serde_json::from_str(payload).map_err(|e| RealtyError::schema("request", e.to_string()))?;
    if artifact_id.is_some() {
        request.artifact_id = artifact_id;
    }
    service.predict(&request.record, &request.selector())
}

/// Train on a CSV file with the default property schema and register the result.
pub fn train_csv<R>(registry: &R, csv_path: &Path, config_json: &str) -> String
where
    R: ArtifactRegistry + ?Sized,
{
    envelope(train_inner(registry, csv_path, config_json))
}

fn train_inner<R>(registry: &R, csv_path: &Path, config_json: &str) -> RealtyResult<TrainSummary>
where
    R: ArtifactRegistry + ?Sized,
{
    let raw = if config_json.trim().is_empty() { "{}" } else { config_json };
    let cfg = TrainConfig::parse(raw)?;
    let dataset = load_csv(csv_path, &RecordSchema::property())?;
    let artifact = train_and_register(&dataset, &cfg, registry)?;
    Ok(TrainSummary {
        artifact_id: artifact.id,
        model_kind: artifact.model_kind,
        metrics: artifact.metrics,
    })
}

/// Wrap a result in the status envelope.
pub fn envelope<T: Serialize>(result: RealtyResult<T>) -> String {
    let value = match result.and_then(|v| serde_json::to_value(v).map_err(RealtyError::from)) {
        Ok(result) => json!({ "status": "ok", "result": result }),
        Err(err) => error_value(&err),
    };
    value.to_string()
}

/// Error envelope for `err`.
pub fn error_envelope(err: &RealtyError) -> String {
    error_value(err).to_string()
}

fn error_value(err: &RealtyError) -> serde_json::Value {
    let code = err.code();
    if matches!(code, RealtyCode::Internal | RealtyCode::Io) {
        error!(code = code as u32, error = %err, "request failed");
    } else {
        warn!(code = code as u32, error = %err, "request rejected");
    }
    json!({
        "status": "error",
        "code": code as u32,
        "kind": code.as_str(),
        "message": err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;

    use super::*;
    use crate::training::registry::fixtures::artifact;
    use crate::training::registry::MemoryArtifactRegistry;

    fn parse(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn predict_returns_ok_envelope() {
        let registry = Arc::new(MemoryArtifactRegistry::new());
        registry.save(&artifact("art-1", 0)).unwrap();
        let service = InferenceService::new(registry);

        let out = parse(&predict_json(&service, r#"{"record":{"area":110.0}}"#));
        assert_eq!(out["status"], "ok");
        assert_eq!(out["result"]["point_estimate"], 230.0);
        assert_eq!(out["result"]["artifact_id"], "art-1");

        let out = parse(&predict_json_for(
            &service,
            r#"{"record":{"area":110.0},"artifact_id":"art-1"}"#,
            Some(ArtifactId::new("art-2")),
        ));
        assert_eq!(out["kind"], "not_found");
    }

    #[test]
    fn errors_carry_code_and_kind() {
        let service = InferenceService::new(Arc::new(MemoryArtifactRegistry::new()));

        let out = parse(&predict_json(&service, r#"{"record":{"area":1.0}}"#));
        assert_eq!(out["status"], "error");
        assert_eq!(out["code"], 6);
        assert_eq!(out["kind"], "empty_registry");

        let out = parse(&predict_json(&service, "not json"));
        assert_eq!(out["code"], 1);

        let out = parse(&predict_json(&service, r#"{"record":{"area":1.0},"artifact_id":"art-x"}"#));
        assert_eq!(out["kind"], "not_found");
    }

    #[test]
    fn train_reports_config_errors() {
        let registry = MemoryArtifactRegistry::new();
        let out = parse(&train_csv(&registry, Path::new("missing.csv"), r#"{"min_rows":0}"#));
        assert_eq!(out["kind"], "invalid_config");

        let out = parse(&train_csv(&registry, Path::new("/nonexistent/realty.csv"), ""));
        assert_eq!(out["status"], "error");
        assert!(registry.is_empty().unwrap());
    }
}
