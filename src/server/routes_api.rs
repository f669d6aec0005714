use crate::conversion::{
    BitrateUnit, ConversionJob, ConversionSettings, FrameRate, OutputFormat, Resolution,
    SettingsForm, VideoCodec,
};
use crate::server::AppContext;
use crate::state::BatchSnapshot;
use axum::{
    extract::{
        multipart::MultipartError, rejection::JsonRejection, Multipart, Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use vidbatch_av::Workspace;
use vidbatch_common::paths::sanitize_file_name;
use vidbatch_common::BatchId;

type ApiError = (StatusCode, String);

pub fn api_routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/options", get(get_options))
        .route("/tools", get(get_tools))
        .route("/batches", get(list_batches).post(upload_batch))
        .route("/batches/paths", post(submit_paths))
        .route("/batches/:id", get(get_batch))
        .route("/batches/:id/cancel", post(cancel_batch))
}

fn error_response(e: vidbatch_common::Error) -> ApiError {
    use vidbatch_common::Error;

    let status = match e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::Io(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

fn internal_error(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn multipart_error(e: MultipartError) -> ApiError {
    (e.status(), e.body_text())
}

/// Invalid settings are a bad request, like the form's validation errors.
fn json_error(rejection: JsonRejection) -> ApiError {
    let status = match &rejection {
        JsonRejection::JsonDataError(_) => StatusCode::BAD_REQUEST,
        other => other.status(),
    };
    (status, rejection.body_text())
}

async fn health(State(ctx): State<AppContext>) -> impl IntoResponse {
    let stats = ctx.state.get_stats();
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "active_batches": ctx.state.active_count(),
        "stats": {
            "batches": stats.batches,
            "success_rate": stats.success_rate()
        }
    }))
}

async fn stats(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.state.get_stats())
}

#[derive(Serialize)]
struct Choice {
    value: String,
    label: String,
}

#[derive(Serialize)]
struct CodecChoice {
    value: String,
    label: String,
    encoder: &'static str,
    /// A hardware encoder can be used for this codec.
    hardware: bool,
}

#[derive(Serialize)]
struct GpuInfo {
    available: bool,
    backends: Vec<String>,
}

#[derive(Serialize)]
struct OptionsResponse {
    formats: Vec<Choice>,
    codecs: Vec<CodecChoice>,
    resolutions: Vec<Choice>,
    frame_rates: Vec<Choice>,
    bitrate_units: Vec<&'static str>,
    defaults: ConversionSettings,
    default_bitrate_unit: &'static str,
    gpu: GpuInfo,
}

async fn get_options(State(ctx): State<AppContext>) -> impl IntoResponse {
    let hardware = ctx.orchestrator.hardware();

    let formats = OutputFormat::ALL
        .iter()
        .map(|f| Choice {
            value: f.label().to_string(),
            label: f.label().to_string(),
        })
        .collect();

    let codecs = VideoCodec::ALL
        .iter()
        .map(|c| CodecChoice {
            value: c.label().to_string(),
            label: c.label().to_string(),
            encoder: c.software_encoder(),
            hardware: hardware.backend_for(*c).is_some(),
        })
        .collect();

    let mut resolutions = vec![Choice {
        value: Resolution::SameAsInput.to_string(),
        label: Resolution::SameAsInput.to_string(),
    }];
    resolutions.extend(Resolution::PRESETS.iter().map(|(name, w, h)| {
        let value = Resolution::fixed(*w, *h).to_string();
        Choice {
            label: format!("{} ({})", value, name),
            value,
        }
    }));

    let mut frame_rates = vec![Choice {
        value: FrameRate::SameAsSource.to_string(),
        label: FrameRate::SameAsSource.to_string(),
    }];
    frame_rates.extend(FrameRate::PRESETS.iter().map(|fps| Choice {
        value: fps.to_string(),
        label: fps.to_string(),
    }));

    Json(OptionsResponse {
        formats,
        codecs,
        resolutions,
        frame_rates,
        bitrate_units: vec![BitrateUnit::Kbps.label(), BitrateUnit::Mbps.label()],
        defaults: ConversionSettings::default(),
        default_bitrate_unit: BitrateUnit::default().label(),
        gpu: GpuInfo {
            available: hardware.available(),
            backends: hardware.backends().iter().map(|b| b.to_string()).collect(),
        },
    })
}

#[derive(Serialize)]
struct ToolStatusResponse {
    name: String,
    available: bool,
    version: Option<String>,
    path: Option<String>,
}

async fn get_tools(State(ctx): State<AppContext>) -> Result<impl IntoResponse, ApiError> {
    let ffmpeg = ctx.config.tools.ffmpeg_path.clone();
    let ffprobe = ctx.config.tools.ffprobe_path.clone();

    let tools = tokio::task::spawn_blocking(move || {
        vidbatch_av::check_tools(ffmpeg.as_deref(), ffprobe.as_deref())
    })
    .await
    .map_err(internal_error)?;

    let response: Vec<ToolStatusResponse> = tools
        .into_iter()
        .map(|t| ToolStatusResponse {
            name: t.name,
            available: t.available,
            version: t.version,
            path: t.path.map(|p| p.display().to_string()),
        })
        .collect();
    Ok(Json(response))
}

/// A batch snapshot plus the bits the UI renders directly.
#[derive(Serialize)]
pub struct BatchResponse {
    #[serde(flatten)]
    pub batch: BatchSnapshot,
    pub report: String,
    /// Download URLs of converted files, in submission order.
    pub downloads: Vec<String>,
}

impl From<BatchSnapshot> for BatchResponse {
    fn from(batch: BatchSnapshot) -> Self {
        let downloads = batch
            .results
            .iter()
            .filter_map(|r| r.output_path.as_ref())
            .filter_map(|p| p.file_name())
            .map(|name| format!("/outputs/{}/{}", batch.id, name.to_string_lossy()))
            .collect();

        Self {
            report: batch.report(),
            downloads,
            batch,
        }
    }
}

#[derive(Deserialize)]
struct ListBatchesQuery {
    limit: Option<usize>,
}

async fn list_batches(
    State(ctx): State<AppContext>,
    Query(params): Query<ListBatchesQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(50);
    let batches: Vec<BatchResponse> = ctx
        .state
        .list_batches(limit)
        .into_iter()
        .map(BatchResponse::from)
        .collect();
    Json(batches)
}

async fn get_batch(
    State(ctx): State<AppContext>,
    Path(id): Path<BatchId>,
) -> Result<Json<BatchResponse>, StatusCode> {
    ctx.state
        .get_batch(id)
        .map(|b| Json(BatchResponse::from(b)))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn cancel_batch(
    State(ctx): State<AppContext>,
    Path(id): Path<BatchId>,
) -> Result<Json<BatchResponse>, ApiError> {
    ctx.state
        .cancel_batch(id)
        .map(|b| Json(BatchResponse::from(b)))
        .map_err(error_response)
}

#[derive(Deserialize)]
struct SubmitPathsRequest {
    inputs: Vec<PathBuf>,
    #[serde(default)]
    settings: ConversionSettings,
}

/// Convert files already on the server's disk.
async fn submit_paths(
    State(ctx): State<AppContext>,
    payload: Result<Json<SubmitPathsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BatchResponse>), ApiError> {
    let Json(payload) = payload.map_err(json_error)?;
    if payload.inputs.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "At least one input file is required".to_string(),
        ));
    }

    let jobs = crate::conversion::jobs_from_paths(payload.inputs, payload.settings);
    let handle = ctx.orchestrator.submit(jobs);
    let snapshot = handle.snapshot();
    ctx.state.register(handle);

    Ok((StatusCode::CREATED, Json(BatchResponse::from(snapshot))))
}

/// Convert uploaded files. Expects `files` parts plus the form's setting fields.
async fn upload_batch(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<BatchResponse>), ApiError> {
    let mut workspace = match ctx.config.conversion.upload_dir {
        Some(ref dir) => Workspace::new_in(dir),
        None => Workspace::new(),
    }
    .map_err(internal_error)?;

    let mut form = SettingsForm::default();
    let mut uploads: Vec<(PathBuf, String)> = Vec::new();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field.text().await.map_err(multipart_error)?;
            if !form.set(&name, value) {
                tracing::debug!("Ignoring unknown form field {:?}", name);
            }
            continue;
        };

        // Browsers send an empty part when no file was picked.
        let Some(display_name) = sanitize_file_name(&file_name) else {
            continue;
        };

        let path = workspace.reserve(&display_name).map_err(internal_error)?;
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(internal_error)?;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            file.write_all(&chunk).await.map_err(internal_error)?;
        }
        file.flush().await.map_err(internal_error)?;

        tracing::debug!("Staged upload {} at {:?}", display_name, path);
        uploads.push((path, display_name));
    }

    if uploads.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Please upload video files.".to_string(),
        ));
    }

    let settings = form.into_settings().map_err(error_response)?;
    let jobs = uploads
        .into_iter()
        .map(|(path, name)| ConversionJob::with_display_name(path, name, settings))
        .collect();

    let handle = ctx.orchestrator.submit_staged(jobs, Some(workspace));
    let snapshot = handle.snapshot();
    ctx.state.register(handle);

    Ok((StatusCode::CREATED, Json(BatchResponse::from(snapshot))))
}
