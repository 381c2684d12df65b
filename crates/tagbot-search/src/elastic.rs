//! Elasticsearch backend over the REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use tagbot_types::{ElasticSettings, IndexNames};

use crate::backend::{HealthStatus, IndexState, SearchBackend, SearchRequest};
use crate::error::{BackendError, LifecycleError};
use crate::startup::AccessProvisioner;

/// Connection settings for one set of credentials.
#[derive(Debug, Clone)]
pub struct ElasticConfig {
    /// Cluster base URL (e.g., "http://localhost:9200")
    pub url: String,

    pub username: String,

    /// No authentication header is sent when unset
    pub password: Option<SecretString>,

    /// Request timeout
    pub timeout: Duration,
}

impl ElasticConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: "tagbot".to_string(),
            password: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Service-user connection from application settings.
    pub fn from_settings(settings: &ElasticSettings) -> Self {
        Self {
            url: settings.url.clone(),
            username: settings.username.clone(),
            password: settings.password.clone().map(SecretString::from),
            timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }

    /// Admin connection, if admin credentials are configured.
    pub fn admin_from_settings(settings: &ElasticSettings) -> Option<Self> {
        let password = settings.admin_password.clone()?;
        Some(Self {
            url: settings.url.clone(),
            username: settings.admin_username.clone(),
            password: Some(SecretString::from(password)),
            timeout: Duration::from_secs(settings.request_timeout_secs),
        })
    }
}

/// Thin authenticated HTTP client shared by the backend and provisioner.
struct ElasticHttp {
    client: Client,
    config: ElasticConfig,
}

impl ElasticHttp {
    fn new(config: ElasticConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.config.url.trim_end_matches('/'), path);
        let builder = self.client.request(method, url);
        match &self.config.password {
            Some(password) => {
                builder.basic_auth(&self.config.username, Some(password.expose_secret()))
            }
            None => builder,
        }
    }

    async fn send(&self, operation: &str, builder: RequestBuilder) -> Result<Response, BackendError> {
        debug!(operation, "Sending search backend request");
        Ok(builder.send().await?)
    }

    /// Read a JSON body, mapping non-success statuses to errors.
    async fn json(&self, operation: &str, response: Response) -> Result<Value, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        Err(status_error(operation, status, response).await)
    }
}

async fn status_error(operation: &str, status: StatusCode, response: Response) -> BackendError {
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::FORBIDDEN && body.contains("cluster_block_exception") {
        return BackendError::WriteBlocked(operation.to_string());
    }
    if status == StatusCode::REQUEST_TIMEOUT {
        return BackendError::Timeout(operation.to_string());
    }
    BackendError::Status {
        operation: operation.to_string(),
        status: status.as_u16(),
        body,
    }
}

/// [`SearchBackend`] talking to an Elasticsearch cluster.
pub struct ElasticBackend {
    http: ElasticHttp,
}

impl ElasticBackend {
    pub fn new(config: ElasticConfig) -> Result<Self, BackendError> {
        info!(url = %config.url, user = %config.username, "Using Elasticsearch backend");
        Ok(Self {
            http: ElasticHttp::new(config)?,
        })
    }

    /// Send a request whose 404 means "not found" rather than failure.
    async fn found(&self, operation: &str, builder: RequestBuilder) -> Result<Option<Value>, BackendError> {
        let response = self.http.send(operation, builder).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.http.json(operation, response).await.map(Some)
    }
}

#[async_trait]
impl SearchBackend for ElasticBackend {
    fn name(&self) -> &'static str {
        "elastic"
    }

    async fn index_exists(&self, index: &str) -> Result<bool, BackendError> {
        let response = self
            .http
            .send("index_exists", self.http.request(Method::HEAD, index))
            .await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(status_error("index_exists", status, response).await),
        }
    }

    async fn index_state(&self, index: &str) -> Result<IndexState, BackendError> {
        let Some(body) = self
            .found("index_state", self.http.request(Method::GET, index))
            .await?
        else {
            return Ok(IndexState::missing());
        };
        let entry = body
            .get(index)
            .ok_or_else(|| BackendError::MalformedResponse(format!("no entry for {}", index)))?;
        Ok(IndexState::from_parts(&entry["settings"], &entry["mappings"]))
    }

    async fn put_settings(&self, index: &str, settings: &Value) -> Result<(), BackendError> {
        let builder = self
            .http
            .request(Method::PUT, &format!("{}/_settings", index))
            .json(settings);
        let response = self.http.send("put_settings", builder).await?;
        self.http.json("put_settings", response).await?;
        Ok(())
    }

    async fn clone_index(&self, source: &str, target: &str) -> Result<(), BackendError> {
        let builder = self
            .http
            .request(Method::POST, &format!("{}/_clone/{}", source, target));
        let response = self.http.send("clone_index", builder).await?;
        self.http.json("clone_index", response).await?;
        Ok(())
    }

    async fn wait_for_health(
        &self,
        index: &str,
        timeout: Duration,
    ) -> Result<HealthStatus, BackendError> {
        let builder = self
            .http
            .request(Method::GET, &format!("_cluster/health/{}", index))
            .query(&[
                ("wait_for_status", "yellow".to_string()),
                ("timeout", format!("{}s", timeout.as_secs())),
            ])
            // the server-side wait must finish before the client gives up
            .timeout(timeout + Duration::from_secs(5));

        let response = self.http.send("wait_for_health", builder).await?;
        let body = self.http.json("wait_for_health", response).await?;

        let status = body
            .get("status")
            .and_then(Value::as_str)
            .and_then(HealthStatus::parse)
            .ok_or_else(|| BackendError::MalformedResponse("missing health status".to_string()))?;

        if body.get("timed_out").and_then(Value::as_bool).unwrap_or(false)
            || status < HealthStatus::Yellow
        {
            return Err(BackendError::Timeout(format!(
                "{} is {:?} after {}s",
                index,
                status,
                timeout.as_secs()
            )));
        }
        Ok(status)
    }

    async fn delete_index(&self, index: &str) -> Result<bool, BackendError> {
        Ok(self
            .found("delete_index", self.http.request(Method::DELETE, index))
            .await?
            .is_some())
    }

    async fn create_index(&self, index: &str, schema: &Value) -> Result<(), BackendError> {
        let builder = self.http.request(Method::PUT, index).json(schema);
        let response = self.http.send("create_index", builder).await?;
        self.http.json("create_index", response).await?;
        Ok(())
    }

    async fn reindex(&self, source: &str, dest: &str) -> Result<u64, BackendError> {
        let builder = self
            .http
            .request(Method::POST, "_reindex")
            .query(&[("wait_for_completion", "true"), ("refresh", "true")])
            .json(&json!({
                "source": { "index": source },
                "dest": { "index": dest },
            }));
        let response = self.http.send("reindex", builder).await?;
        let body = self.http.json("reindex", response).await?;

        if let Some(failures) = body.get("failures").and_then(Value::as_array) {
            if !failures.is_empty() {
                warn!(failures = failures.len(), "Reindex reported failures");
                return Err(BackendError::InvalidState(format!(
                    "reindex {} -> {} had {} failures",
                    source,
                    dest,
                    failures.len()
                )));
            }
        }
        Ok(body.get("total").and_then(Value::as_u64).unwrap_or(0))
    }

    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>, BackendError> {
        let body = self
            .found(
                "get_document",
                self.http.request(Method::GET, &format!("{}/_doc/{}", index, id)),
            )
            .await?;
        Ok(body.and_then(|mut b| b.get_mut("_source").map(Value::take)))
    }

    async fn put_document(&self, index: &str, id: &str, doc: &Value) -> Result<(), BackendError> {
        let builder = self
            .http
            .request(Method::PUT, &format!("{}/_doc/{}", index, id))
            .query(&[("refresh", "wait_for")])
            .json(doc);
        let response = self.http.send("put_document", builder).await?;
        self.http.json("put_document", response).await?;
        Ok(())
    }

    async fn update_document(
        &self,
        index: &str,
        id: &str,
        partial: &Value,
    ) -> Result<bool, BackendError> {
        let builder = self
            .http
            .request(Method::POST, &format!("{}/_update/{}", index, id))
            .query(&[("refresh", "wait_for")])
            .json(&json!({ "doc": partial }));
        Ok(self.found("update_document", builder).await?.is_some())
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<bool, BackendError> {
        let builder = self
            .http
            .request(Method::DELETE, &format!("{}/_doc/{}", index, id))
            .query(&[("refresh", "wait_for")]);
        Ok(self.found("delete_document", builder).await?.is_some())
    }

    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<Vec<Value>, BackendError> {
        let builder = self
            .http
            .request(Method::POST, &format!("{}/_search", index))
            .json(&request.to_body());
        let response = self.http.send("search", builder).await?;
        let mut body = self.http.json("search", response).await?;

        let hits = body
            .pointer_mut("/hits/hits")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| BackendError::MalformedResponse("missing hits".to_string()))?;
        Ok(hits
            .iter_mut()
            .filter_map(|hit| hit.get_mut("_source").map(Value::take))
            .collect())
    }

    async fn count(&self, index: &str, request: &SearchRequest) -> Result<u64, BackendError> {
        let builder = self
            .http
            .request(Method::POST, &format!("{}/_count", index))
            .json(&request.to_count_body());
        let response = self.http.send("count", builder).await?;
        let body = self.http.json("count", response).await?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| BackendError::MalformedResponse("missing count".to_string()))
    }
}

/// Creates the service role and user with admin credentials.
pub struct ElasticProvisioner {
    http: ElasticHttp,
    role: String,
    username: String,
    password: SecretString,
}

impl ElasticProvisioner {
    /// `admin` connects with admin credentials; the service user named in
    /// `service` is (re)created with its password.
    pub fn new(admin: ElasticConfig, service: &ElasticConfig) -> Result<Self, BackendError> {
        let password = service
            .password
            .clone()
            .ok_or_else(|| BackendError::InvalidState("service user has no password".to_string()))?;
        Ok(Self {
            http: ElasticHttp::new(admin)?,
            role: service.username.clone(),
            username: service.username.clone(),
            password,
        })
    }

    async fn put(&self, operation: &str, path: &str, body: Value) -> Result<(), BackendError> {
        let builder = self.http.request(Method::PUT, path).json(&body);
        let response = self.http.send(operation, builder).await?;
        self.http.json(operation, response).await?;
        Ok(())
    }
}

#[async_trait]
impl AccessProvisioner for ElasticProvisioner {
    async fn provision(&self, indices: &IndexNames) -> Result<(), LifecycleError> {
        info!(role = %self.role, "Updating service role");
        self.put(
            "put_role",
            &format!("_security/role/{}", self.role),
            json!({
                "cluster": ["monitor"],
                "indices": [{
                    "names": indices.all(),
                    "privileges": ["all"],
                }],
            }),
        )
        .await
        .map_err(|e| LifecycleError::Provisioning(e.to_string()))?;

        info!(user = %self.username, "Updating service user");
        self.put(
            "put_user",
            &format!("_security/user/{}", self.username),
            json!({
                "password": self.password.expose_secret(),
                "roles": [self.role],
                "full_name": "Tag Bot",
            }),
        )
        .await
        .map_err(|e| LifecycleError::Provisioning(e.to_string()))?;
        Ok(())
    }
}
