//! Request handlers
//!
//! Action endpoints answer with a fixed marker body naming the route; the
//! status code carries the outcome.

use super::context::AppContext;
use super::error::ApiError;
use axum::extract::{Form, Multipart, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use device_agent_shared::os_release::pretty_name;
use device_agent_shared::{
    CustomActionRequest, NetworkEntry, ServiceActionRequest, ServiceDescriptor, UpdateStatus,
    WifiCredential,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{info, warn};

use crate::command::CommandReport;
use crate::credentials::InstallOutcome;
use crate::network::WifiOutcome;
use crate::services::TargetReport;
use crate::update::SubmitOutcome;

type Ctx = State<Arc<AppContext>>;

/// Multipart field carrying the update bundle
const BUNDLE_FIELD: &str = "bundle";

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: UpdateStatus,
}

#[derive(Serialize)]
pub struct VersionResponse {
    pub os_version: String,
}

#[derive(Deserialize)]
pub struct WifiRequest {
    #[serde(rename = "selectedWifi", default)]
    selected_wifi: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Deserialize)]
pub struct SshKeyForm {
    #[serde(default)]
    userkey: Option<String>,
}

/// Marker body with 200, or 502 when a command behind it failed
fn marker(route: &'static str, ok: bool) -> Response {
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, route).into_response()
}

/// The JSON document submitted as the single field of a form body.
/// Clients put it in the field name; a non-empty value takes precedence.
fn form_blob(fields: &[(String, String)]) -> Result<&str, ApiError> {
    let (key, value) = fields
        .first()
        .ok_or_else(|| ApiError::BadRequest("empty form body".into()))?;
    if value.is_empty() {
        Ok(key.as_str())
    } else {
        Ok(value.as_str())
    }
}

/// Log every failed command; true when none failed
fn check_commands<'a>(
    route: &'static str,
    service: Option<&str>,
    reports: impl IntoIterator<Item = &'a CommandReport>,
) -> bool {
    let mut ok = true;
    for report in reports {
        if !report.succeeded() {
            ok = false;
            warn!(
                route,
                service,
                command = %report.command,
                exit_code = ?report.output.exit_code,
                stderr = %report.output.stderr.trim(),
                "command failed"
            );
        }
    }
    ok
}

fn check_targets(route: &'static str, reports: &[TargetReport]) -> bool {
    reports.iter().fold(true, |ok, target| {
        check_commands(route, Some(target.service.as_str()), &target.commands) && ok
    })
}

pub async fn status(State(ctx): Ctx) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: ctx.updates.status(),
    })
}

pub async fn version(State(ctx): Ctx) -> Json<VersionResponse> {
    let os_version = match tokio::fs::read_to_string(&ctx.system.os_release).await {
        Ok(content) => pretty_name(&content).unwrap_or_default(),
        Err(e) => {
            warn!(path = %ctx.system.os_release.display(), error = %e, "os-release unavailable");
            String::new()
        }
    };
    Json(VersionResponse { os_version })
}

pub async fn wifi_marker() -> &'static str {
    "wifi"
}

pub async fn apply_wifi(State(ctx): Ctx, Json(req): Json<WifiRequest>) -> Result<Response, ApiError> {
    let credential = WifiCredential::new(
        req.selected_wifi.unwrap_or_default(),
        req.password.unwrap_or_default(),
    );
    let ok = match ctx.network.apply_wifi(&credential).await? {
        WifiOutcome::Ignored => true,
        WifiOutcome::Applied { steps } => check_commands("wifi", None, &steps),
    };
    Ok(marker("wifi", ok))
}

pub async fn scan(State(ctx): Ctx) -> Json<Vec<NetworkEntry>> {
    Json(ctx.network.scan().await)
}

pub async fn running_services(State(ctx): Ctx) -> Json<Vec<ServiceDescriptor>> {
    Json(ctx.services.list_running().await)
}

pub async fn service_action(
    State(ctx): Ctx,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let request = ServiceActionRequest::from_json(form_blob(&fields)?)?;
    let reports = ctx.services.apply(&request).await;
    Ok(marker("docker", check_targets("docker", &reports)))
}

pub async fn all_services(State(ctx): Ctx) -> Json<Vec<ServiceDescriptor>> {
    Json(ctx.services.list_all().await)
}

pub async fn custom_action(
    State(ctx): Ctx,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let request = CustomActionRequest::from_json(form_blob(&fields)?)?;
    let action = request.action()?;
    let reports = ctx.services.apply_custom(action, &request.services()).await;
    Ok(marker("docker-custom", check_targets("docker-custom", &reports)))
}

pub async fn update_marker() -> &'static str {
    "update"
}

/// The bundle field is streamed straight to the staging file
pub async fn submit_update(State(ctx): Ctx, mut multipart: Multipart) -> Result<Response, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(BUNDLE_FIELD) {
            continue;
        }
        info!(file = ?field.file_name(), "update bundle upload started");

        return match ctx.updates.submit(field).await? {
            SubmitOutcome::Ignored => Ok(marker("update", true)),
            SubmitOutcome::AlreadyUpdating => Err(ApiError::Conflict("update already in progress")),
            SubmitOutcome::Submitted(report) => {
                let installed = report.installer.succeeded();
                check_commands("update", None, [&report.installer, &report.reboot]);
                Ok(marker("update", installed))
            }
        };
    }

    Err(ApiError::BadRequest(format!(
        "missing multipart field `{}`",
        BUNDLE_FIELD
    )))
}

pub async fn install_key(State(ctx): Ctx, Form(form): Form<SshKeyForm>) -> Result<Response, ApiError> {
    let key = form.userkey.unwrap_or_default();
    match ctx.credentials.install_key(&key).await? {
        InstallOutcome::Installed => Ok((StatusCode::OK, "ssh-setkey").into_response()),
        InstallOutcome::Missing => Ok(key_missing().await.into_response()),
    }
}

pub async fn key_missing() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "ssh-setkey")
}

pub async fn logs(
    State(ctx): Ctx,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let rx = ctx.logs.subscribe()?;
    let events = stream::unfold(rx, |mut rx| async move {
        let line = rx.recv().await?;
        Some((Ok(Event::default().data(line)), rx))
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
