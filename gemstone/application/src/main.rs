mod pages;

use std::{collections::HashMap, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use clap::Parser;
use gemstone_learning::{ArtifactPaths, CustomData, PipelineTelemetry, PredictPipeline};
use pages::Outcome;
use serde_json::json;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gemstone-app", version, about = "Gemstone price prediction web form")]
struct Cli {
    /// Directory holding `preprocessor.json` and `model.json`.
    #[arg(long, default_value = "artifacts")]
    artifacts: PathBuf,
    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:5000")]
    addr: SocketAddr,
    /// Directory for the JSON-lines prediction log.
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[derive(Clone)]
struct AppState {
    pipeline: Arc<PredictPipeline>,
    telemetry: Option<PipelineTelemetry>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gemstone_app=info,axum=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let telemetry = PipelineTelemetry::for_run(&cli.log_dir, "application")
        .with_context(|| format!("opening log dir {}", cli.log_dir.display()))?;
    let pipeline = PredictPipeline::cached(ArtifactPaths::in_dir(&cli.artifacts)).with_telemetry(&telemetry);
    let state = AppState {
        pipeline: Arc::new(pipeline),
        telemetry: Some(telemetry),
    };

    let listener = TcpListener::bind(cli.addr).await?;
    tracing::info!(artifacts = %cli.artifacts.display(), "listening on http://{}", cli.addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/predict", get(show_form).post(submit_form))
        .route("/health", get(health))
        .with_state(state)
}

async fn home() -> Html<String> {
    Html(pages::home())
}

async fn show_form() -> Html<String> {
    Html(pages::form(&HashMap::new(), &Outcome::Empty))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let paths = state.pipeline.paths();
    Json(json!({
        "status": "ok",
        "artifacts_present": paths.preprocessor.exists() && paths.model.exists(),
    }))
}

async fn submit_form(
    State(state): State<AppState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let data = match CustomData::from_fields(|name| fields.get(name).map(String::as_str)) {
        Ok(data) => data,
        Err(err) => {
            tracing::info!(error = %err, "rejected form submission");
            let message = err.to_string();
            return render(StatusCode::UNPROCESSABLE_ENTITY, &fields, &Outcome::Error(&message));
        }
    };

    let pipeline = Arc::clone(&state.pipeline);
    let result = tokio::task::spawn_blocking(move || pipeline.predict(&data)).await;
    match result {
        Ok(Ok(price)) => {
            tracing::info!(price, "prediction served");
            if let Some(telemetry) = &state.telemetry {
                telemetry.info("prediction served", json!({ "price": price }));
            }
            render(StatusCode::OK, &fields, &Outcome::Price(price))
        }
        Ok(Err(err)) => {
            let status = if err.is_user_error() {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            tracing::warn!(error = %err, %status, "prediction failed");
            if let Some(telemetry) = &state.telemetry {
                telemetry.warn(
                    "prediction failed",
                    json!({ "error": err.to_string(), "status": status.as_u16() }),
                );
            }
            let message = err.kind().to_string();
            render(status, &fields, &Outcome::Error(&message))
        }
        Err(join) => {
            tracing::error!(error = %join, "prediction task panicked");
            render(
                StatusCode::INTERNAL_SERVER_ERROR,
                &fields,
                &Outcome::Error("internal error"),
            )
        }
    }
}

fn render(status: StatusCode, fields: &HashMap<String, String>, outcome: &Outcome<'_>) -> Response {
    (status, Html(pages::form(fields, outcome))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use gemstone_learning::{ingestion::write_records, GemRecord, PipelineConfig, TrainingPipeline};
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    const SAMPLE: &str =
        "carat=0.3&depth=62.1&table=58.0&x=4.3&y=4.2&z=2.6&cut=Ideal&color=E&clarity=VS1";

    fn app(artifacts: &std::path::Path) -> Router {
        router(AppState {
            pipeline: Arc::new(PredictPipeline::new(ArtifactPaths::in_dir(artifacts))),
            telemetry: None,
        })
    }

    fn trained() -> TempDir {
        let dir = tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.ingestion.source = dir.path().join("gemstone.csv");
        config.ingestion.artifacts_dir = dir.path().to_path_buf();
        write_records(&config.ingestion.source, &GemRecord::synthetic(80, 4)).unwrap();
        TrainingPipeline.run(&config, None).unwrap();
        dir
    }

    async fn post(app: Router, body: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn get_page(app: Router, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn pages_render() {
        let dir = tempdir().unwrap();
        let (status, html) = get_page(app(dir.path()), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("href=\"/predict\""));

        let (status, html) = get_page(app(dir.path()), "/predict").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("<select name=\"clarity\""));
        assert!(html.contains(">VVS1</option>"));
    }

    #[tokio::test]
    async fn valid_submission_shows_rounded_price() {
        let dir = trained();
        let (status, html) = post(app(dir.path()), SAMPLE).await;
        assert_eq!(status, StatusCode::OK, "{html}");
        let line = html
            .lines()
            .find(|line| line.contains("Predicted price: "))
            .unwrap();
        let price = line
            .split("Predicted price: ")
            .nth(1)
            .and_then(|rest| rest.split('<').next())
            .unwrap();
        let (_, decimals) = price.split_once('.').unwrap();
        assert_eq!(decimals.len(), 2);
        assert!(price.parse::<f64>().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn missing_field_is_unprocessable() {
        let dir = trained();
        let body = SAMPLE.replace("&table=58.0", "");
        let (status, html) = post(app(dir.path()), &body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(html.contains("missing required attribute table"));
        assert!(!html.contains("Predicted price"));
    }

    #[tokio::test]
    async fn unknown_grade_is_unprocessable() {
        let dir = trained();
        let body = SAMPLE.replace("cut=Ideal", "cut=Unknown");
        let (status, html) = post(app(dir.path()), &body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(html.contains("unknown cut category"));
    }

    #[tokio::test]
    async fn missing_artifacts_are_a_server_error() {
        let dir = tempdir().unwrap();
        let (status, html) = post(app(dir.path()), SAMPLE).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(html.contains("artifact not found"));

        let (status, body) = get_page(app(dir.path()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let health: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["artifacts_present"], false);
    }
}
