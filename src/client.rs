use anyhow::{Context, Result, anyhow, bail};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Method;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response, multipart};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::load_config;
use crate::error::error_from_response;
use crate::token::TokenClient;
use crate::util::{guess_filename_from_url, urljoin};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base SWEET-CROSS API URL, typically `https://sweetcross.link/api/v1`.
    pub url: String,
    /// Account username.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Whether to verify TLS certificates.
    pub verify: bool,
}

/// Main client for the SWEET-CROSS API.
///
/// Provides authenticated request methods against the API endpoints and
/// manages tokens through an internal [`TokenClient`]: the first request
/// logs in, later requests reuse or refresh the token as needed.
#[derive(Debug)]
pub struct CrossClient {
    base_url: String,
    username: String,

    timeout: Duration,
    progress: bool,

    http: HttpClient,
    token_client: TokenClient,
}

impl CrossClient {
    /// Creates a client using environment variables and/or `.crossclientrc`.
    ///
    /// This is equivalent to `CrossClient::new(None, None, None)`.
    pub fn from_env() -> Result<Self> {
        Self::new(None, None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `username`/`password`/`base_url` arguments
    /// - environment variables `CROSSCLIENT_USERNAME` / `CROSSCLIENT_PASSWORD`
    ///   / `CROSSCLIENT_URL`
    /// - config file from `CROSSCLIENT_RC` or `.crossclientrc`
    ///
    /// The base URL defaults to `https://sweetcross.link/api/v1` when not
    /// configured anywhere.
    pub fn new(
        username: Option<String>,
        password: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self> {
        let cfg = load_config(base_url, username, password, None)?;
        Self::from_config(cfg)
    }

    /// Creates a client from an explicit configuration, bypassing the
    /// environment and rc-file lookup.
    pub fn from_config(cfg: ClientConfig) -> Result<Self> {
        let timeout = Duration::from_secs(60);
        let http = build_http(timeout, cfg.verify)?;
        let token_client =
            TokenClient::with_http(cfg.username.clone(), cfg.password, cfg.url.clone(), http.clone());

        Ok(Self {
            base_url: cfg.url,
            username: cfg.username,
            timeout,
            progress: true,
            http,
            token_client,
        })
    }

    /// Per-request timeout; uploads of large result files may need more
    /// than the 60-second default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Account username, as used for authentication and submission metadata.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Resolved API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends an authenticated GET request and returns the raw response.
    pub fn get(&self, endpoint: &str) -> Result<Response> {
        debug!("GET {}", endpoint);
        self.request(Method::GET, endpoint)?
            .send()
            .with_context(|| format!("GET {} failed", endpoint))
    }

    /// Sends an authenticated GET request and decodes the JSON response.
    ///
    /// Non-2xx responses are turned into formatted errors carrying the
    /// server's message.
    pub fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = urljoin(&self.base_url, endpoint);
        let resp = self.get(endpoint)?;

        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        if !status.is_success() {
            return Err(error_from_response(status, &url, &text));
        }

        serde_json::from_str::<T>(&text)
            .with_context(|| format!("failed to parse API JSON (url={}, status={})", url, status))
    }

    /// Sends an authenticated POST request with a JSON body and returns the
    /// raw response.
    pub fn post_json<T: Serialize + ?Sized>(&self, endpoint: &str, body: &T) -> Result<Response> {
        debug!("POST {}", endpoint);
        self.request(Method::POST, endpoint)?
            .json(body)
            .send()
            .with_context(|| format!("POST {} failed", endpoint))
    }

    /// Sends an authenticated multipart POST request (file uploads) and
    /// returns the raw response.
    pub fn post_multipart(&self, endpoint: &str, form: multipart::Form) -> Result<Response> {
        debug!("POST {} (multipart)", endpoint);
        self.request(Method::POST, endpoint)?
            .multipart(form)
            .send()
            .with_context(|| format!("POST {} failed", endpoint))
    }

    /// Downloads a file served by the API and writes it to `target`,
    /// streaming the body with a progress bar when the size is known.
    ///
    /// When `target` is `None` the filename is derived from the endpoint.
    /// Returns the path written. A transfer that errors out or ends short
    /// of the announced length leaves no partial file behind.
    pub fn download(&self, endpoint: &str, target: Option<&Path>) -> Result<PathBuf> {
        let url = urljoin(&self.base_url, endpoint);
        let target = match target {
            Some(t) if !t.as_os_str().is_empty() => t.to_path_buf(),
            _ => guess_filename_from_url(&url).map(PathBuf::from).ok_or_else(|| {
                anyhow!("cannot derive a file name from {}; pass an explicit target", url)
            })?,
        };

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
            }
        }

        let resp = self.get(endpoint)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(error_from_response(status, &url, &text));
        }

        let total = resp.content_length();
        let pb = match total {
            Some(len) if self.progress => {
                let pb = ProgressBar::new(len);
                pb.set_style(
                    ProgressStyle::with_template(
                        "{spinner:.green} {bytes}/{total_bytes} ({bytes_per_sec}) {wide_bar} {eta}",
                    )
                    .unwrap()
                    .progress_chars("=>-"),
                );
                Some(pb)
            }
            _ => None,
        };

        let result = write_download(resp, &target, pb.as_ref(), total);
        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }
        let downloaded = result?;

        info!("downloaded {} ({} bytes)", target.display(), downloaded);
        Ok(target)
    }

    fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = urljoin(&self.base_url, endpoint);
        let token = self.token_client.current()?;
        Ok(self
            .http
            .request(method, &url)
            .timeout(self.timeout)
            .header(AUTHORIZATION, token.authorization_value()))
    }
}

/// Streams `body` into `target`, dropping the partial file when the
/// transfer errors out or ends short of `expected`.
fn write_download(
    body: impl Read,
    target: &Path,
    pb: Option<&ProgressBar>,
    expected: Option<u64>,
) -> Result<u64> {
    let downloaded = match copy_body(body, target, pb) {
        Ok(n) => n,
        Err(e) => {
            let _ = std::fs::remove_file(target);
            return Err(e);
        }
    };

    if let Some(expected) = expected {
        if downloaded != expected {
            let _ = std::fs::remove_file(target);
            bail!(
                "download incomplete: got {} byte(s) out of {}",
                downloaded,
                expected
            );
        }
    }

    Ok(downloaded)
}

fn copy_body(mut body: impl Read, target: &Path, pb: Option<&ProgressBar>) -> Result<u64> {
    let mut out = File::create(target)
        .with_context(|| format!("failed to open {}", target.display()))?;

    let mut buf = [0u8; 64 * 1024];
    let mut downloaded: u64 = 0;
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => return Err(e).context("download interrupted"),
        };
        out.write_all(&buf[..n])?;
        downloaded += n as u64;
        if let Some(pb) = pb {
            pb.inc(n as u64);
        }
    }
    out.flush()?;
    Ok(downloaded)
}

pub(crate) fn build_http(timeout: Duration, verify: bool) -> Result<HttpClient> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("crossclient-rs/{}", env!("CARGO_PKG_VERSION")))
            .unwrap_or(HeaderValue::from_static("crossclient-rs")),
    );

    let mut builder = HttpClient::builder()
        .default_headers(default_headers)
        .timeout(timeout);

    if !verify {
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder.build().context("failed to build HTTP client")
}
