//! HTTP-facing request handling.
//!
//! Each call validates its parameters, runs the matching filesystem operation
//! on the active session and shapes the outcome as an [`http::Response`]:
//! `{"success": true, ...payload}` or `{"success": false, "message": ...}`.
//! Routing and body parsing are left to the hosting server; the request types
//! derive [`Deserialize`] for that purpose.

use bytes::Bytes;
use http::{
    header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    HeaderValue, Response, StatusCode,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{fmt, sync::Arc};
use tokio::fs::File;
use unicode_normalization::UnicodeNormalization;

use crate::{
    config::GatewayConfig,
    error::{Error, ErrorKind, Result},
    path::{base_name, sanitize_filename},
    session::{Connector, Credentials, SessionSlot, SshConnector},
    staging::Staging,
};

pub type Reply = Response<Value>;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectRequest {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ConnectRequest {
    fn into_credentials(self, default_port: u16) -> Result<Credentials> {
        match (non_empty(self.host), non_empty(self.username), self.password) {
            (Some(host), Some(username), Some(password)) => Ok(Credentials::new(
                host,
                self.port.unwrap_or(default_port),
                username,
                password,
            )),
            _ => Err(Error::invalid_input(
                "host, username and password required",
            )),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct PathQuery {
    pub path: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ReadQuery {
    pub path: Option<String>,
    /// Byte cap
    pub max: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct WriteRequest {
    pub path: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RenameRequest {
    pub old: Option<String>,
    pub new: Option<String>,
}

/// One file part of a multipart upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Bytes,
}

#[derive(Debug, Default, Clone)]
pub struct UploadRequest {
    pub file: Option<UploadedFile>,
    pub remote_dir: Option<String>,
}

/// Body of a download response: the staged file, or a JSON failure
pub enum DownloadBody {
    File(File),
    Json(Value),
}

impl fmt::Debug for DownloadBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(_) => f.write_str("File(..)"),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
        }
    }
}

/// Request handlers sharing one session slot
pub struct Gateway {
    config: GatewayConfig,
    connector: Arc<dyn Connector>,
    sessions: SessionSlot,
    staging: Staging,
}

impl Gateway {
    /// Gateway connecting over SSH
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_connector(config, Arc::new(SshConnector))
    }

    pub fn with_connector(config: GatewayConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            staging: Staging::new(config.staging_dir.clone()),
            config,
            connector,
            sessions: SessionSlot::new(),
        }
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionSlot {
        &self.sessions
    }

    /// Replaces the active session with a new connection
    pub async fn connect(&self, request: ConnectRequest) -> Reply {
        respond(
            async {
                let credentials = request.into_credentials(self.config.default_port)?;
                self.sessions
                    .connect(self.connector.as_ref(), credentials, &self.config.session)
                    .await?;
                Ok(json!({ "message": "Connected successfully" }))
            }
            .await,
        )
    }

    /// Always succeeds
    pub async fn disconnect(&self) -> Reply {
        self.sessions.disconnect().await;
        success(json!({}))
    }

    pub async fn list(&self, query: PathQuery) -> Reply {
        respond(
            async {
                let session = self.sessions.current().await?;
                let path = non_empty(query.path).unwrap_or_else(|| "/".to_owned());
                let items = session.list(&path).await?;
                Ok(json!({ "items": items }))
            }
            .await,
        )
    }

    pub async fn read(&self, query: ReadQuery) -> Reply {
        respond(
            async {
                let session = self.sessions.current().await?;
                let path = required(query.path)?;
                let content = session.read(&path, query.max).await?;
                Ok(json!({ "content": content }))
            }
            .await,
        )
    }

    pub async fn write(&self, request: WriteRequest) -> Reply {
        respond(
            async {
                let session = self.sessions.current().await?;
                let path = required(request.path)?;
                session
                    .write(&path, request.content.as_deref().unwrap_or_default())
                    .await?;
                Ok(json!({}))
            }
            .await,
        )
    }

    pub async fn mkdir(&self, request: PathQuery) -> Reply {
        respond(
            async {
                let session = self.sessions.current().await?;
                session.mkdir(&required(request.path)?).await?;
                Ok(json!({}))
            }
            .await,
        )
    }

    pub async fn remove(&self, request: PathQuery) -> Reply {
        respond(
            async {
                let session = self.sessions.current().await?;
                session.remove(&required(request.path)?).await?;
                Ok(json!({}))
            }
            .await,
        )
    }

    pub async fn rename(&self, request: RenameRequest) -> Reply {
        respond(
            async {
                let session = self.sessions.current().await?;
                let (Some(old), Some(new)) = (non_empty(request.old), non_empty(request.new))
                else {
                    return Err(Error::invalid_input("Missing old or new path"));
                };
                session.rename(&old, &new).await?;
                Ok(json!({}))
            }
            .await,
        )
    }

    pub async fn stat(&self, query: PathQuery) -> Reply {
        respond(
            async {
                let session = self.sessions.current().await?;
                let info = session.stat(&required(query.path)?).await?;
                Ok(json!({ "info": info }))
            }
            .await,
        )
    }

    /// Stages the uploaded payload locally, then copies it into
    /// `remote_dir` under its sanitized file name.
    pub async fn upload(&self, request: UploadRequest) -> Reply {
        respond(
            async {
                let session = self.sessions.current().await?;
                let file = request
                    .file
                    .ok_or_else(|| Error::invalid_input("No file provided"))?;
                if file.filename.is_empty() {
                    return Err(Error::invalid_input("No file selected"));
                }
                let filename = sanitize_filename(&file.filename)
                    .ok_or_else(|| Error::invalid_input("Invalid file name"))?;

                let remote_dir = request.remote_dir.unwrap_or_else(|| "/".to_owned());
                let remote_path = format!("{}/{filename}", remote_dir.trim_end_matches('/'));

                let buffer = self.staging.with_contents(&file.data).await?;
                let uploaded = session.upload(buffer.path(), &remote_path).await;
                buffer.release();
                uploaded?;

                Ok(json!({}))
            }
            .await,
        )
    }

    /// Streams a remote file back as an attachment
    pub async fn download(&self, query: PathQuery) -> Response<DownloadBody> {
        let staged = async {
            let session = self.sessions.current().await?;
            let path = required(query.path)?;

            let buffer = self.staging.empty()?;
            session.download(&path, buffer.path()).await?;
            let reader = buffer.into_reader().await?;
            Ok((path, reader))
        }
        .await;

        match staged {
            Ok((path, reader)) => attachment(&path, reader),
            Err(error) => failure(&error).map(DownloadBody::Json),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn required(path: Option<String>) -> Result<String> {
    non_empty(path).ok_or_else(|| Error::invalid_input("Missing path"))
}

const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput | ErrorKind::NotConnected => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(result: Result<Value>) -> Reply {
    match result {
        Ok(payload) => success(payload),
        Err(error) => failure(&error),
    }
}

fn success(payload: Value) -> Reply {
    let mut body = serde_json::Map::new();
    let _ = body.insert("success".to_owned(), Value::Bool(true));
    if let Value::Object(fields) = payload {
        body.extend(fields);
    }
    json_reply(StatusCode::OK, Value::Object(body))
}

fn failure(error: &Error) -> Reply {
    let message = match error.kind() {
        ErrorKind::InvalidInput | ErrorKind::NotConnected => error.to_string(),
        _ => format!("Error: {error}"),
    };
    json_reply(
        status_for(error.kind()),
        json!({ "success": false, "message": message }),
    )
}

fn json_reply(status: StatusCode, body: Value) -> Reply {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    let _ = response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Characters left unescaped in `filename*`, besides ASCII alphanumerics
const FILENAME_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'^')
    .remove(b'`')
    .remove(b'|')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// `Content-Disposition` value for a download of `path`. Names that are not
/// plain ASCII get an ASCII `filename` fallback plus the exact name as an
/// RFC 5987 `filename*`.
fn content_disposition(path: &str) -> String {
    let name = base_name(path);
    let fallback: String = name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_control() => '_',
            c => c,
        })
        .collect();
    let fallback = if fallback.is_empty() { "download" } else { &fallback };

    if name.is_ascii() {
        format!("attachment; filename=\"{fallback}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            utf8_percent_encode(name, FILENAME_SAFE)
        )
    }
}

fn attachment(path: &str, reader: File) -> Response<DownloadBody> {
    let mut response = Response::new(DownloadBody::File(reader));
    let headers = response.headers_mut();
    let _ = headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Ok(value) = HeaderValue::from_str(&content_disposition(path)) {
        let _ = headers.insert(CONTENT_DISPOSITION, value);
    }
    response
}
