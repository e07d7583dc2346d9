//! Axum routes over a [`FlowServer`]. Every handler takes the model
//! lock just long enough to clone what it needs; query results are
//! `Serialize` so responses are the same JSON shape `flow --json` prints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use flow_analyze::integration_queries;
use flow_analyze::integrations::{load_integrations, Integration};
use flow_analyze::queries;
use flow_core::config::ResolutionMode;

use crate::FlowServer;

pub fn router(server: Arc<FlowServer>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/audit", get(audit))
        .route("/raises/{exception_type}", get(raises))
        .route("/escapes/{function}", get(escapes))
        .route("/routes-to/{exception_type}", get(routes_to))
        .layer(CorsLayer::permissive())
        .with_state(server)
}

async fn health(State(server): State<Arc<FlowServer>>) -> Json<Value> {
    let model = server.model.lock().unwrap();
    Json(json!({
        "status": "ok",
        "root": server.root_dir.display().to_string(),
        "entrypoints": model.entrypoints.len(),
    }))
}

#[derive(Debug, Deserialize, Default)]
struct FrameworkQuery {
    framework: Option<String>,
}

async fn audit(
    State(server): State<Arc<FlowServer>>,
    Query(q): Query<FrameworkQuery>,
) -> Json<Value> {
    let model = server.model.lock().unwrap();
    match q.framework {
        None => Json(json!(queries::audit_entrypoints(&model))),
        Some(name) => {
            let integrations = load_integrations(&server.root_dir.join(".flow"));
            let integration = integrations.iter().find(|i| i.name() == name);
            match integration {
                Some(integration) => {
                    let entrypoints: Vec<_> = model
                        .entrypoints
                        .iter()
                        .filter(|e| {
                            e.metadata.get("framework").map(String::as_str) == Some(name.as_str())
                        })
                        .cloned()
                        .collect();
                    let result = integration_queries::audit_integration(
                        &model,
                        integration.as_ref(),
                        &entrypoints,
                        &model.global_handlers,
                        None,
                    );
                    Json(json!(result))
                }
                None => Json(json!({ "error": format!("unknown framework '{name}'") })),
            }
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct SubclassesQuery {
    #[serde(default)]
    subclasses: bool,
}

async fn raises(
    State(server): State<Arc<FlowServer>>,
    Path(exception_type): Path<String>,
    Query(q): Query<SubclassesQuery>,
) -> Json<Value> {
    let model = server.model.lock().unwrap();
    Json(json!(queries::find_raises(&model, &exception_type, q.subclasses)))
}

async fn escapes(
    State(server): State<Arc<FlowServer>>,
    Path(function): Path<String>,
) -> Json<Value> {
    let model = server.model.lock().unwrap();
    Json(json!(queries::find_escapes(&model, &function, ResolutionMode::default())))
}

#[derive(Debug, Deserialize)]
struct RoutesToQuery {
    #[serde(default)]
    subclasses: bool,
    max_depth: Option<usize>,
    max_paths: Option<usize>,
}

struct WholeProjectIntegration;
impl Integration for WholeProjectIntegration {
    fn name(&self) -> &'static str {
        "project"
    }
    fn detect(
        &self,
        _source: &str,
        _file_path: &str,
    ) -> flow_analyze::integrations::IntegrationData {
        flow_analyze::integrations::IntegrationData::default()
    }
}

async fn routes_to(
    State(server): State<Arc<FlowServer>>,
    Path(exception_type): Path<String>,
    Query(q): Query<RoutesToQuery>,
) -> Json<Value> {
    let model = server.model.lock().unwrap();
    let entrypoints = model.entrypoints.clone();
    let result = integration_queries::trace_routes_to_exception_bounded(
        &model,
        &WholeProjectIntegration,
        &entrypoints,
        &exception_type,
        q.subclasses,
        q.max_depth.unwrap_or(integration_queries::DEFAULT_MAX_TRACE_DEPTH),
        q.max_paths.unwrap_or(integration_queries::DEFAULT_MAX_TRACE_PATHS),
    );
    Json(json!(result))
}
