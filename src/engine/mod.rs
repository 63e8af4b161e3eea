//! Direct container creation through the engine HTTP API

pub mod api;

pub use api::{CreateRequest, CreateResponse};

use crate::container::Container;
use crate::error::{ComposeError, Result};
use crate::settings::Settings;
use api::ErrorBody;
use tracing::{debug, info, warn};

/// Engine API client
#[derive(Debug, Clone)]
pub struct EngineClient {
    base_url: String,
    client: reqwest::Client,
}

impl EngineClient {
    /// Create a client for the engine at `base_url`, e.g. `http://localhost:2375`
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(&settings.engine_host)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Validate `container` and create it
    pub async fn create(&self, container: &Container) -> Result<CreateResponse> {
        container.validate()?;

        let url = format!("{}/containers/create", self.base_url);
        let mut query = Vec::new();
        if !container.name().is_empty() {
            query.push(("name", container.name().to_string()));
        }
        if !container.platform.is_empty() {
            query.push(("platform", container.platform.to_string()));
        }

        debug!(container = container.name(), image = %container.config.image, "creating container");
        let response = self
            .client
            .post(&url)
            .query(&query)
            .json(&CreateRequest::from(container))
            .send()
            .await?;
        let response = check(response).await?;

        let created: CreateResponse = response.json().await?;
        for warning in &created.warnings {
            warn!(container = container.name(), "{}", warning);
        }
        info!(container = container.name(), id = %created.id, "container created");
        Ok(created)
    }

    /// Start a created container
    pub async fn start(&self, id: &str) -> Result<()> {
        let url = format!("{}/containers/{}/start", self.base_url, id);
        let response = self.client.post(&url).send().await?;
        check(response).await?;
        info!(id, "container started");
        Ok(())
    }

    /// Create and start `container`, returning its ID
    pub async fn run(&self, container: &Container) -> Result<String> {
        let created = self.create(container).await?;
        self.start(&created.id).await?;
        Ok(created.id)
    }
}

/// Turn a non-success response into [`ComposeError::Engine`]
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or(text);
    Err(ComposeError::Engine {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{container as c, host as h};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response per connection and return the request heads
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                // Read headers, then as much body as Content-Length says
                loop {
                    let n = stream.read(&mut chunk).await.unwrap();
                    buf.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&buf).to_string();
                    if n == 0 {
                        requests.push(text);
                        break;
                    }
                    if let Some(end) = text.find("\r\n\r\n") {
                        let length = text[..end]
                            .lines()
                            .find_map(|l| {
                                let (k, v) = l.split_once(':')?;
                                k.eq_ignore_ascii_case("content-length")
                                    .then(|| v.trim().parse::<usize>().ok())?
                            })
                            .unwrap_or(0);
                        if buf.len() >= end + 4 + length {
                            requests.push(text);
                            break;
                        }
                    }
                }
                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                stream.write_all(reply.as_bytes()).await.unwrap();
            }
            requests
        });
        (format!("http://{}", addr), handle)
    }

    fn web() -> Container {
        let mut container = Container::new("web");
        container
            .with_config([c::image("nginx:alpine")])
            .with_host_config([h::publish("8080:80")]);
        container
    }

    #[tokio::test]
    async fn test_create_and_start() {
        let (url, server) = serve(vec![
            (201, r#"{"Id":"abc123","Warnings":[]}"#),
            (204, ""),
        ])
        .await;
        let client = EngineClient::new(&url).unwrap();
        let id = client.run(&web()).await.unwrap();
        assert_eq!(id, "abc123");

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /containers/create?name=web "));
        assert!(requests[0].contains("\"Image\":\"nginx:alpine\""));
        assert!(requests[1].starts_with("POST /containers/abc123/start "));
    }

    #[tokio::test]
    async fn test_engine_error_message() {
        let (url, _server) = serve(vec![(404, r#"{"message":"No such image: nginx:alpine"}"#)]).await;
        let client = EngineClient::new(&url).unwrap();
        let err = client.create(&web()).await.unwrap_err();
        match err {
            ComposeError::Engine { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "No such image: nginx:alpine");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_container_not_sent() {
        let client = EngineClient::new("http://127.0.0.1:9").unwrap();
        let mut broken = Container::new("web");
        broken.with_host_config([h::memory("lots")]);
        let err = client.create(&broken).await.unwrap_err();
        assert!(err.is_config());
    }
}
