//! Client for the external comment-stripping service.
//!
//! The service (`rust-code-analysis-web`) answers `POST /comment?file_name=`
//! with 200 and the rewritten content, 204 when there was nothing to remove
//! and 404 for unsupported file types. Any failure leaves the content as is.

use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;

use crate::config;
use crate::error::{Error, Result};

const START_ATTEMPTS: usize = 7;
const PING_ATTEMPTS: usize = 7;
const PING_INTERVAL: Duration = Duration::from_secs(1);

/// Asks the OS for a currently unused local TCP port.
pub fn free_tcp_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A reachable comment service, killed on drop if this process started it.
pub struct CommentService {
    child: Option<Child>,
    base_url: String,
    client: Client,
}

impl CommentService {
    pub fn start(config: &config::CommentService) -> Result<Self> {
        match config {
            config::CommentService::Spawn(command) => Self::spawn(command),
            config::CommentService::Endpoint(url) => Self::connect(url),
        }
    }

    /// Spawns `command --port <port>` and waits for it to answer `/ping`.
    pub fn spawn(command: &str) -> Result<Self> {
        let client = http_client()?;

        for attempt in 1..=START_ATTEMPTS {
            let port = free_tcp_port()?;
            let mut child = match Command::new(command)
                .arg("--port")
                .arg(port.to_string())
                .stdin(Stdio::null())
                .spawn()
            {
                Ok(child) => child,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(Error::CommentServiceMissing(command.to_string()));
                }
                Err(e) => return Err(e.into()),
            };

            let base_url = format!("http://127.0.0.1:{}", port);
            tracing::debug!("Started {} on port {} (attempt {})", command, port, attempt);

            if wait_ready(&client, &base_url, Some(&mut child)) {
                tracing::info!("Comment service ready at {}", base_url);
                return Ok(Self {
                    child: Some(child),
                    base_url,
                    client,
                });
            }

            let _ = child.kill();
            let _ = child.wait();
        }

        Err(Error::CommentServiceUnavailable(format!(
            "{} did not answer after {} attempts",
            command, START_ATTEMPTS
        )))
    }

    /// Uses a service that is already running at `base_url`.
    pub fn connect(base_url: &str) -> Result<Self> {
        let client = http_client()?;
        let base_url = base_url.trim_end_matches('/').to_string();

        if !wait_ready(&client, &base_url, None) {
            return Err(Error::CommentServiceUnavailable(base_url));
        }

        Ok(Self {
            child: None,
            base_url,
            client,
        })
    }

    pub fn stripper(&self) -> CommentStripper {
        CommentStripper {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

impl Drop for CommentService {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::debug!("Stopping comment service at {}", self.base_url);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn http_client() -> Result<Client> {
    Ok(Client::builder()
        .default_headers({
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert(
                reqwest::header::CONTENT_TYPE,
                reqwest::header::HeaderValue::from_static("application/octet-stream"),
            );
            headers
        })
        .build()?)
}

fn wait_ready(client: &Client, base_url: &str, mut child: Option<&mut Child>) -> bool {
    for _ in 0..PING_ATTEMPTS {
        let ping = client
            .get(format!("{}/ping", base_url))
            .send()
            .and_then(|r| r.error_for_status());
        if ping.is_ok() {
            return true;
        }

        if let Some(child) = child.as_mut()
            && !matches!(child.try_wait(), Ok(None))
        {
            return false;
        }

        thread::sleep(PING_INTERVAL);
    }
    false
}

/// Strips comments from file contents through the service.
#[derive(Clone)]
pub struct CommentStripper {
    client: Client,
    base_url: String,
}

impl CommentStripper {
    /// Returns `content` without comments, or unchanged if the service
    /// does not support the file type, found nothing, or failed.
    pub fn strip(&self, path: &str, content: Vec<u8>) -> Vec<u8> {
        let url = match reqwest::Url::parse_with_params(
            &format!("{}/comment", self.base_url),
            &[("file_name", path)],
        ) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("Bad code analysis server URL {}: {}", self.base_url, e);
                return content;
            }
        };

        let response = self.client.post(url).body(content.clone()).send();

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    "Error connecting to code analysis server, for {}: {}",
                    path,
                    e
                );
                return content;
            }
        };

        let status = response.status();
        match status {
            StatusCode::OK => match response.bytes() {
                Ok(body) => body.to_vec(),
                Err(e) => {
                    tracing::error!("Error reading code analysis response for {}: {}", path, e);
                    content
                }
            },
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => content,
            _ => {
                let body = response.bytes().unwrap_or_default();
                tracing::error!(
                    "Error {} from the code analysis server, for {}: {}",
                    status,
                    path,
                    String::from_utf8_lossy(&body)
                );
                content
            }
        }
    }
}
