//! REST API endpoint for originality analysis

use std::sync::Arc;

use actix_web::{post, web, HttpResponse, Responder};
use base64::Engine;
use serde::Deserialize;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::model::{ErrorKind, PipelineResult};
use crate::service::{AnalysisInput, AnalysisPipeline};

/// Request body for an analysis run
///
/// Exactly one of `text` or `file_base64` must be set.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalysisRequest {
    /// Raw text to analyze
    pub text: Option<String>,
    /// Base64-encoded document to analyze
    pub file_base64: Option<String>,
    /// Original file name, used to pick the text extractor
    pub file_name: Option<String>,
}

/// Analyze a document for plagiarism and AI authorship
///
/// Always returns 200: analysis failures are reported in the body with
/// `ok = false` and an `error_kind` from the pipeline's error taxonomy.
#[utoipa::path(
    post,
    path = "/v1/analysis",
    request_body = AnalysisRequest,
    responses(
        (status = 200, description = "Analysis outcome, successful or not", body = PipelineResult)
    ),
    tag = "analysis"
)]
#[post("/v1/analysis")]
pub async fn analyze(
    pipeline: web::Data<Arc<AnalysisPipeline>>,
    request: web::Json<AnalysisRequest>,
) -> impl Responder {
    let request = request.into_inner();
    let request_id = Uuid::new_v4();

    tracing::info!(
        request_id = %request_id,
        has_text = request.text.is_some(),
        has_file = request.file_base64.is_some(),
        file_name = request.file_name.as_deref().unwrap_or(""),
        "Analysis requested"
    );

    let file_bytes = match request.file_base64 {
        Some(encoded) => match base64::engine::general_purpose::STANDARD.decode(&encoded) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Invalid base64 payload");
                return HttpResponse::Ok().json(PipelineResult::failure(
                    ErrorKind::BadRequest,
                    "file_base64 is not valid base64",
                ));
            }
        },
        None => None,
    };

    let input = AnalysisInput {
        text: request.text,
        file_bytes,
        file_name: request.file_name,
    };

    let result = pipeline.run(input).await;

    tracing::info!(
        request_id = %request_id,
        ok = result.ok,
        error_kind = ?result.error_kind,
        "Analysis finished"
    );

    HttpResponse::Ok().json(result)
}

/// Configure analysis routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(analyze);
}

#[derive(OpenApi)]
#[openapi(
    paths(analyze, crate::api::health::liveness, crate::api::health::readiness),
    components(schemas(
        AnalysisRequest,
        crate::model::PipelineResult,
        crate::model::PlagiarismReport,
        crate::model::SuspiciousSegment,
        crate::model::SourceMatch,
        crate::model::AiVerdict,
        crate::model::RiskLevel,
        crate::model::AnalysisStatus,
        crate::model::ErrorKind,
        crate::api::health::HealthStatus,
        crate::api::health::ReadinessStatus,
        crate::api::health::DependencyHealth,
    )),
    tags(
        (name = "analysis", description = "Plagiarism and AI-authorship analysis"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;
