//! In-process LifeTime API for integration tests.
//!
//! Serves `lifetimeapi/rest/v2` plus the CI/CD probe on a random local
//! port. Every request is recorded as `"METHOD /path?query"` with the API
//! prefix stripped.

use axum::extract::{Path, RawQuery, Request, State};
use axum::http::header::HOST;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use ltd_common::endpoint::{
    DEFAULT_LT_API_ENDPOINT, DEFAULT_PROBE_API_ENDPOINT, DEFAULT_PROBE_API_VERSION,
};
use ltd_common::probe::ProbeClient;
use ltd_common::{ArtifactStore, Lifetime, LifetimeClient, LifetimeEndpoint};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

const API_PREFIX: &str = "/lifetimeapi/rest/v2";
const PROBE_PREFIX: &str = "/CI_CDProbe/rest/api/v1";

#[derive(Default)]
pub struct MockState {
    environments: Mutex<Vec<Value>>,
    applications: Mutex<Vec<Value>>,
    /// version key -> version payload
    versions: Mutex<HashMap<String, Value>>,
    /// (env key, app key) -> environment application payload
    env_apps: Mutex<HashMap<(String, String), Value>>,
    zones: Mutex<HashMap<String, Vec<Value>>>,
    deployments: Mutex<Vec<Value>>,
    /// plan key -> scripted statuses; the last one repeats
    statuses: Mutex<HashMap<String, VecDeque<Value>>>,
    plan_info: Mutex<HashMap<String, Value>>,
    /// app name -> producer payloads
    dependencies: Mutex<HashMap<String, Vec<Value>>>,
    created_plans: Mutex<u32>,
    /// bodies of `POST .../versions`
    tags: Mutex<Vec<Value>>,
    tag_status: Mutex<Option<StatusCode>>,
    calls: Mutex<Vec<String>>,
}

pub struct MockLifetime {
    state: Arc<MockState>,
    addr: SocketAddr,
    server: JoinHandle<()>,
}

impl MockLifetime {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock LifeTime");
        let addr = listener.local_addr().expect("local addr");
        let router = router(state.clone());
        let server = tokio::spawn(async move {
            axum::serve(listener, router).await.expect("mock LifeTime crashed");
        });
        crate::test_log!("FIXTURE: mock LifeTime listening on {addr}");
        Self {
            state,
            addr,
            server,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn lifetime(&self, artifacts: &std::path::Path) -> Lifetime {
        let endpoint = LifetimeEndpoint::parse(&self.url(), DEFAULT_LT_API_ENDPOINT, 2);
        let client = LifetimeClient::new(endpoint, "test-token", true).expect("client");
        Lifetime::new(client, ArtifactStore::new(artifacts)).expect("lifetime")
    }

    pub fn probe(&self, artifacts: &std::path::Path) -> ProbeClient {
        let endpoint = LifetimeEndpoint::parse(
            &self.url(),
            DEFAULT_PROBE_API_ENDPOINT,
            DEFAULT_PROBE_API_VERSION,
        );
        ProbeClient::new(endpoint, Some("probe-key"), true, ArtifactStore::new(artifacts))
            .expect("probe client")
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn tags(&self) -> Vec<Value> {
        self.state.tags.lock().unwrap().clone()
    }

    /// Answer every tag request with `status` and an error body.
    pub fn fail_tags(&self, status: StatusCode) -> &Self {
        *self.state.tag_status.lock().unwrap() = Some(status);
        self
    }

    pub fn environment(&self, key: &str, name: &str) -> &Self {
        self.state
            .environments
            .lock()
            .unwrap()
            .push(json!({
                "Key": key,
                "Name": name,
                "HostName": format!("{}.example.com", name.to_lowercase())
            }));
        self
    }

    /// Register an application with its tagged versions and where each runs.
    pub fn application(
        &self,
        key: &str,
        name: &str,
        versions: &[(&str, &str)],
        running: &[(&str, &str)],
    ) -> &Self {
        let statuses: Vec<Value> = running
            .iter()
            .map(|(env_key, version_key)| {
                json!({
                    "EnvironmentKey": env_key,
                    "BaseApplicationVersionKey": version_key,
                    "DeploymentZoneKey": "",
                    "IsModified": false
                })
            })
            .collect();
        self.state.applications.lock().unwrap().push(json!({
            "Key": key,
            "Name": name,
            "AppStatusInEnvs": statuses,
        }));
        let mut env_apps = self.state.env_apps.lock().unwrap();
        for (status, (env_key, _)) in statuses.iter().zip(running) {
            env_apps.insert(
                (env_key.to_string(), key.to_string()),
                json!({"Key": key, "Name": name, "AppStatusInEnvs": [status]}),
            );
        }
        let mut stored = self.state.versions.lock().unwrap();
        for (version_key, version) in versions {
            stored.insert(
                version_key.to_string(),
                json!({
                    "Key": version_key,
                    "Version": version,
                    "ApplicationKey": key,
                    "ChangeLog": format!("{name} {version}"),
                    "CreatedOn": "2026-10-01T10:00:00Z"
                }),
            );
        }
        self
    }

    /// Mark `app_key` as changed in `env_key`, with its native shells.
    pub fn modified(&self, app_key: &str, env_key: &str, mobile_apps: Value) -> &Self {
        let mark = |status: &mut Value| {
            if status["EnvironmentKey"] == env_key {
                status["IsModified"] = json!(true);
                status["MobileAppsStatus"] = mobile_apps.clone();
            }
        };
        for app in self.state.applications.lock().unwrap().iter_mut() {
            if app["Key"] == app_key {
                app["AppStatusInEnvs"].as_array_mut().into_iter().flatten().for_each(mark);
            }
        }
        if let Some(app) = self
            .state
            .env_apps
            .lock()
            .unwrap()
            .get_mut(&(env_key.to_string(), app_key.to_string()))
        {
            app["AppStatusInEnvs"].as_array_mut().into_iter().flatten().for_each(mark);
        }
        self
    }

    pub fn zone(&self, env_key: &str, key: &str, name: &str) -> &Self {
        self.state
            .zones
            .lock()
            .unwrap()
            .entry(env_key.to_string())
            .or_default()
            .push(json!({"Key": key, "Name": name}));
        self
    }

    /// Script the statuses returned for `plan_key`.
    pub fn statuses(&self, plan_key: &str, statuses: &[(&str, Option<&str>)]) -> &Self {
        let script = statuses
            .iter()
            .map(|(status, info)| json!({"DeploymentStatus": status, "Info": info}))
            .collect();
        self.state
            .statuses
            .lock()
            .unwrap()
            .insert(plan_key.to_string(), script);
        self
    }

    /// A plan already listed on LifeTime, scripted with `statuses`.
    pub fn existing_deployment(
        &self,
        key: &str,
        target_env_key: &str,
        statuses: &[(&str, Option<&str>)],
    ) -> &Self {
        self.state.deployments.lock().unwrap().push(json!({
            "Key": key,
            "SourceEnvironmentKey": "k-dev",
            "TargetEnvironmentKey": target_env_key,
            "Notes": "existing"
        }));
        self.statuses(key, statuses)
    }

    pub fn plan_info(&self, key: &str, operations: Value, conflicts: Value) -> &Self {
        self.state.plan_info.lock().unwrap().insert(
            key.to_string(),
            json!({
                "Deployment": {"Key": key, "ApplicationOperations": operations},
                "ApplicationConflicts": conflicts
            }),
        );
        self
    }

    pub fn dependencies(&self, app_name: &str, producer_keys: &[&str]) -> &Self {
        self.state.dependencies.lock().unwrap().insert(
            app_name.to_string(),
            producer_keys
                .iter()
                .map(|key| json!({"ApplicationKey": key}))
                .collect(),
        );
        self
    }
}

impl Drop for MockLifetime {
    fn drop(&mut self) {
        self.server.abort();
    }
}

type Shared = State<Arc<MockState>>;

fn router(state: Arc<MockState>) -> Router {
    let api = Router::new()
        .route("/environments", get(environments))
        .route("/environments/{env}/deploymentzones", get(deployment_zones))
        .route("/environments/{env}/applications/{app}", get(environment_application))
        .route(
            "/environments/{env}/applications/{app}/versions",
            axum::routing::post(tag_version),
        )
        .route(
            "/environments/{env}/applications/{app}/versions/{version}/content",
            get(export_content),
        )
        .route("/environments/{env}/deployments", axum::routing::post(create_plan))
        .route("/applications", get(applications))
        .route("/applications/{app}", get(application))
        .route("/applications/{app}/versions", get(application_versions))
        .route("/applications/{app}/versions/{version}", get(application_version))
        .route("/deployments", get(deployments).post(create_plan_from_keys))
        .route("/deployments/{key}", get(deployment_info).delete(delete_plan))
        .route("/deployments/{key}/status", get(deployment_status))
        .route("/deployments/{key}/start", axum::routing::post(accept))
        .route("/deployments/{key}/continue", axum::routing::post(accept));

    Router::new()
        .nest(API_PREFIX, api)
        .route(
            &format!("{PROBE_PREFIX}/GetApplicationDependencies"),
            get(probe_dependencies),
        )
        .route("/downloads/{file}", get(download))
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

async fn record(State(state): Shared, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    let path = path.strip_prefix(API_PREFIX).unwrap_or(path);
    let call = match request.uri().query() {
        Some(query) => format!("{} {path}?{query}", request.method()),
        None => format!("{} {path}", request.method()),
    };
    state.calls.lock().unwrap().push(call);
    next.run(request).await
}

fn not_found(what: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"Errors": [format!("{what} not found")]}))).into_response()
}

async fn environments(State(state): Shared) -> Response {
    Json(Value::Array(state.environments.lock().unwrap().clone())).into_response()
}

async fn deployment_zones(State(state): Shared, Path(env): Path<String>) -> Response {
    let zones = state.zones.lock().unwrap().get(&env).cloned().unwrap_or_default();
    Json(Value::Array(zones)).into_response()
}

async fn environment_application(
    State(state): Shared,
    Path((env, app)): Path<(String, String)>,
) -> Response {
    match state.env_apps.lock().unwrap().get(&(env, app.clone())) {
        Some(body) => Json(body.clone()).into_response(),
        None => not_found(&app),
    }
}

async fn tag_version(
    State(state): Shared,
    Path((_env, app)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    state.tags.lock().unwrap().push(body.clone());
    if let Some(status) = *state.tag_status.lock().unwrap() {
        return (status, Json(json!({"Errors": ["tagging failed"]}))).into_response();
    }
    let version = body["Version"].as_str().unwrap_or_default().replace('.', "-");
    (
        StatusCode::CREATED,
        Json(json!({"ApplicationVersionKey": format!("{app}-{version}")})),
    )
        .into_response()
}

async fn export_content(
    State(state): Shared,
    headers: HeaderMap,
    Path((_env, _app, version)): Path<(String, String, String)>,
) -> Response {
    if !state.versions.lock().unwrap().contains_key(&version) {
        return not_found(&version);
    }
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("127.0.0.1");
    Json(json!({"url": format!("http://{host}/downloads/{version}")})).into_response()
}

async fn download(Path(file): Path<String>) -> Response {
    format!("OAP:{file}").into_response()
}

async fn create_plan(State(state): Shared) -> Response {
    let mut count = state.created_plans.lock().unwrap();
    *count += 1;
    (StatusCode::CREATED, Json(json!(format!("plan-{count}")))).into_response()
}

async fn create_plan_from_keys(State(state): Shared, Json(_request): Json<Value>) -> Response {
    create_plan(State(state)).await
}

async fn applications(State(state): Shared) -> Response {
    Json(Value::Array(state.applications.lock().unwrap().clone())).into_response()
}

async fn application(State(state): Shared, Path(app): Path<String>) -> Response {
    let found = state
        .applications
        .lock()
        .unwrap()
        .iter()
        .find(|candidate| candidate["Key"] == app.as_str())
        .cloned();
    match found {
        Some(body) => Json(body).into_response(),
        None => not_found(&app),
    }
}

async fn application_versions(State(state): Shared, Path(app): Path<String>) -> Response {
    let mut versions: Vec<Value> = state
        .versions
        .lock()
        .unwrap()
        .values()
        .filter(|version| version["ApplicationKey"] == app.as_str())
        .cloned()
        .collect();
    versions.sort_by(|a, b| b["Key"].as_str().cmp(&a["Key"].as_str()));
    Json(Value::Array(versions)).into_response()
}

async fn application_version(
    State(state): Shared,
    Path((_app, version)): Path<(String, String)>,
) -> Response {
    match state.versions.lock().unwrap().get(&version) {
        Some(body) => Json(body.clone()).into_response(),
        None => not_found(&version),
    }
}

async fn deployments(State(state): Shared, RawQuery(_query): RawQuery) -> Response {
    let listed = state.deployments.lock().unwrap().clone();
    if listed.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }
    Json(Value::Array(listed)).into_response()
}

async fn deployment_info(State(state): Shared, Path(key): Path<String>) -> Response {
    let info = state
        .plan_info
        .lock()
        .unwrap()
        .get(&key)
        .cloned()
        .unwrap_or_else(|| {
            json!({
                "Deployment": {"Key": key, "ApplicationOperations": []},
                "ApplicationConflicts": []
            })
        });
    Json(info).into_response()
}

async fn delete_plan(Path(_key): Path<String>) -> Response {
    StatusCode::NO_CONTENT.into_response()
}

async fn deployment_status(State(state): Shared, Path(key): Path<String>) -> Response {
    let mut statuses = state.statuses.lock().unwrap();
    let Some(script) = statuses.get_mut(&key) else {
        return not_found(&key);
    };
    let next = if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    };
    match next {
        Some(status) => Json(status).into_response(),
        None => not_found(&key),
    }
}

async fn accept(Path(_key): Path<String>) -> Response {
    StatusCode::OK.into_response()
}

async fn probe_dependencies(State(state): Shared, RawQuery(query): RawQuery) -> Response {
    let query = query.unwrap_or_default();
    let name = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("ApplicationName="))
        .unwrap_or_default()
        .replace("%20", " ")
        .replace('+', " ");
    let producers = state
        .dependencies
        .lock()
        .unwrap()
        .get(&name)
        .cloned()
        .unwrap_or_default();
    Json(Value::Array(producers)).into_response()
}
