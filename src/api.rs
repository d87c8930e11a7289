// API client module: a small blocking HTTP client for the Gofile API.
// It knows two endpoints: server discovery and the per-server upload
// endpoint. Everything else (which folder, what to print) is decided by
// the orchestrator in `upload`.

use crate::error::UploadError;
use crate::upload::UploadTarget;
use log::debug;
use reqwest::blocking::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{self, Read};
use std::time::Duration;

/// Discovery endpoint returning the list of available upload servers.
pub const SERVERS_URL: &str = "https://api.gofile.io/servers";

/// Upload endpoint for a given server name.
pub fn upload_url(server: &str) -> String {
    format!("https://{}.gofile.io/uploadFile", server)
}

/// Observer for byte-level upload progress. `bytes_sent` receives the
/// cumulative count of body bytes handed to the transport, so successive
/// calls never decrease.
pub trait ProgressSink: Send {
    fn bytes_sent(&self, total: u64);
}

/// Sink that discards progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn bytes_sent(&self, _total: u64) {}
}

/// What one upload call needs to know. Token and folder id are only
/// added to the multipart body when present.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub server: &'a str,
    pub target: &'a UploadTarget,
    pub token: Option<&'a str>,
    pub folder_id: Option<&'a str>,
}

/// Parsed upload response. `raw` is the body exactly as the API sent it;
/// the two fields we act on are pulled out of `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResponse {
    pub download_page: String,
    pub parent_folder: String,
    pub raw: Value,
}

#[derive(Deserialize)]
struct ServerList {
    servers: Vec<Server>,
}

#[derive(Deserialize)]
struct Server {
    name: String,
}

#[derive(Deserialize)]
struct UploadData {
    #[serde(rename = "downloadPage")]
    download_page: String,
    #[serde(rename = "parentFolder")]
    parent_folder: String,
}

/// Pull `data` out of a `{ status, data }` envelope. A `status` other
/// than "ok" is treated as an API-level failure.
fn parse_envelope<T: DeserializeOwned>(endpoint: &str, body: &Value) -> Result<T, UploadError> {
    if let Some(status) = body.get("status").and_then(Value::as_str) {
        if status != "ok" {
            return Err(UploadError::unexpected(
                endpoint,
                format!("API returned status `{}`", status),
            ));
        }
    }
    let data = body
        .get("data")
        .ok_or_else(|| UploadError::unexpected(endpoint, "missing `data` field"))?;
    serde_json::from_value(data.clone()).map_err(|e| UploadError::unexpected(endpoint, e.to_string()))
}

/// First server of a discovery response.
pub fn parse_server_list(body: &Value) -> Result<String, UploadError> {
    let list: ServerList = parse_envelope(SERVERS_URL, body)?;
    list.servers
        .into_iter()
        .next()
        .map(|s| s.name)
        .ok_or(UploadError::NoServer)
}

impl UploadResponse {
    pub fn from_json(endpoint: &str, raw: Value) -> Result<Self, UploadError> {
        let data: UploadData = parse_envelope(endpoint, &raw)?;
        Ok(UploadResponse {
            download_page: data.download_page,
            parent_folder: data.parent_folder,
            raw,
        })
    }
}

/// The two remote operations the orchestrator depends on. `ApiClient`
/// is the real implementation; tests substitute an in-memory one.
pub trait GofileApi {
    fn select_server(&self) -> Result<String, UploadError>;

    fn upload_file(
        &self,
        request: UploadRequest<'_>,
        progress: Box<dyn ProgressSink>,
    ) -> Result<UploadResponse, UploadError>;
}

/// Reader wrapper that reports the running byte total to a sink as the
/// HTTP client pulls the body.
pub struct ProgressReader<R> {
    inner: R,
    sent: u64,
    sink: Box<dyn ProgressSink>,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, sink: Box<dyn ProgressSink>) -> Self {
        ProgressReader { inner, sent: 0, sink }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.sent += n as u64;
            self.sink.bytes_sent(self.sent);
        }
        Ok(n)
    }
}

/// Blocking client for the Gofile API.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    servers_url: String,
    // Replaces `https://{server}.gofile.io` with `{base}/{server}` when set.
    upload_base: Option<String>,
}

impl ApiClient {
    /// Build the underlying HTTP client. There is no overall timeout:
    /// an upload lasts as long as the file takes to stream.
    pub fn new() -> Result<Self, UploadError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<Duration>)
            .build()?;
        Ok(ApiClient {
            client,
            servers_url: SERVERS_URL.to_string(),
            upload_base: None,
        })
    }

    /// Point both endpoints at `base`: discovery at `{base}/servers`,
    /// uploads at `{base}/{server}/uploadFile`.
    #[cfg(test)]
    pub(crate) fn with_base_url(client: Client, base: &str) -> Self {
        ApiClient {
            client,
            servers_url: format!("{}/servers", base),
            upload_base: Some(base.to_string()),
        }
    }

    fn upload_endpoint(&self, server: &str) -> String {
        match &self.upload_base {
            Some(base) => format!("{}/{}/uploadFile", base, server),
            None => upload_url(server),
        }
    }

    /// Turn 4xx/5xx answers into `UploadError::Status`, keeping the body
    /// text for the error message.
    fn check_status(res: Response) -> Result<Response, UploadError> {
        let status = res.status();
        if status.is_client_error() || status.is_server_error() {
            let body = res.text().unwrap_or_default();
            return Err(UploadError::Status { status, body });
        }
        Ok(res)
    }
}

impl GofileApi for ApiClient {
    fn select_server(&self) -> Result<String, UploadError> {
        debug!("GET {}", self.servers_url);
        let res = self.client.get(&self.servers_url).send()?;
        let body: Value = Self::check_status(res)?.json()?;
        parse_server_list(&body)
    }

    fn upload_file(
        &self,
        request: UploadRequest<'_>,
        progress: Box<dyn ProgressSink>,
    ) -> Result<UploadResponse, UploadError> {
        let target = request.target;
        let url = self.upload_endpoint(request.server);

        // The file is streamed through the reader; it is never loaded whole.
        let file = File::open(&target.path).map_err(|source| UploadError::Io {
            path: target.path.clone(),
            source,
        })?;
        let part = multipart::Part::reader_with_length(ProgressReader::new(file, progress), target.size)
            .file_name(target.file_name())
            .mime_str(&target.content_type)?;

        let mut form = multipart::Form::new().part("file", part);
        if let Some(token) = request.token {
            form = form.text("token", token.to_string());
        }
        if let Some(folder_id) = request.folder_id {
            form = form.text("folderId", folder_id.to_string());
        }

        debug!("POST {} (folder: {:?})", url, request.folder_id);
        let res = self.client.post(&url).multipart(form).send()?;
        let body: Value = Self::check_status(res)?.json()?;
        UploadResponse::from_json(&url, body)
    }
}
