use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::error::{ClientError, ClientResult};
use crate::task::{Task, TaskInput};

pub const RESOURCE_PATH: &str = "gestion_de_tareas";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";

/// CRUD calls against the task resource.
#[allow(async_fn_in_trait)]
pub trait TaskApi {
    async fn fetch_all(&self) -> ClientResult<Vec<Task>>;
    async fn fetch_one(&self, id: u64) -> ClientResult<Task>;
    async fn create(&self, input: &TaskInput) -> ClientResult<Task>;
    async fn update(&self, id: u64, input: &TaskInput) -> ClientResult<Task>;
    async fn delete(&self, id: u64) -> ClientResult<()>;
}

/// `<api_url>/gestion_de_tareas/`, tolerant of a trailing slash on the
/// configured URL.
pub fn resource_base(api_url: &str) -> String {
    format!("{}/{RESOURCE_PATH}/", api_url.trim().trim_end_matches('/'))
}

/// Decodes a task list record by record. A record that does not decode is
/// logged and left out; only a body that is not a JSON array is an error.
pub fn parse_task_list(body: &str) -> Result<Vec<Task>, serde_json::Error> {
    let records: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let total = records.len();
    let tasks: Vec<Task> = records
        .into_iter()
        .filter_map(|record| {
            let id = record.get("id").cloned();
            match serde_json::from_value::<Task>(record) {
                Ok(task) => Some(task),
                Err(err) => {
                    warn!(?id, error = %err, "skipping unreadable task record");
                    None
                }
            }
        })
        .collect();
    if tasks.len() < total {
        warn!(kept = tasks.len(), total, "task list had unreadable records");
    }
    Ok(tasks)
}

#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: reqwest::Client,
    base: String,
}

impl HttpTaskApi {
    pub fn new(api_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building HTTP client for task API")?;

        Ok(Self {
            client,
            base: resource_base(api_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn item_url(&self, id: u64) -> String {
        format!("{}{id}/", self.base)
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> ClientResult<String> {
        let response = request.send().await.map_err(|source| {
            warn!(url, error = %source, "task API request failed");
            ClientError::Network {
                url: url.to_string(),
                source,
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ClientError::Network {
                url: url.to_string(),
                source,
            })?;

        if !status.is_success() {
            warn!(url, status = status.as_u16(), "task API returned an error status");
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(url, status = status.as_u16(), bytes = body.len(), "task API response");
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> ClientResult<T> {
        let body = self.send(request, url).await?;
        serde_json::from_str(&body).map_err(|err| ClientError::Parse {
            url: url.to_string(),
            message: err.to_string(),
        })
    }
}

impl TaskApi for HttpTaskApi {
    #[instrument(skip(self))]
    async fn fetch_all(&self) -> ClientResult<Vec<Task>> {
        let url = self.base.clone();
        let body = self.send(self.client.get(&url), &url).await?;
        parse_task_list(&body).map_err(|err| ClientError::Parse {
            url,
            message: err.to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn fetch_one(&self, id: u64) -> ClientResult<Task> {
        let url = self.item_url(id);
        self.send_json(self.client.get(&url), &url).await
    }

    #[instrument(skip(self, input), fields(title = %input.title))]
    async fn create(&self, input: &TaskInput) -> ClientResult<Task> {
        let url = self.base.clone();
        self.send_json(self.client.post(&url).json(input), &url)
            .await
    }

    #[instrument(skip(self, input))]
    async fn update(&self, id: u64, input: &TaskInput) -> ClientResult<Task> {
        let url = self.item_url(id);
        self.send_json(self.client.put(&url).json(input), &url)
            .await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: u64) -> ClientResult<()> {
        let url = self.item_url(id);
        self.send(self.client.delete(&url), &url).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    use super::{HttpTaskApi, TaskApi, resource_base};
    use crate::error::ClientError;
    use crate::task::{Status, TaskInput};

    /// Answers a single request with a canned response and hands back the
    /// raw request text.
    async fn serve_once(status: &'static str, body: &'static str) -> (HttpTaskApi, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.expect("write response");
            let _ = socket.shutdown().await;
            request
        });

        let api = HttpTaskApi::new(&format!("http://{addr}/api"), Duration::from_secs(5))
            .expect("client");
        (api, server)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.expect("read request");
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            let Some(head_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let body_len = text[..head_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + body_len {
                break;
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[test]
    fn resource_base_normalizes_trailing_slash() {
        assert_eq!(
            resource_base("http://localhost:8000/api/"),
            "http://localhost:8000/api/gestion_de_tareas/"
        );
        assert_eq!(
            resource_base("http://localhost:8000/api"),
            "http://localhost:8000/api/gestion_de_tareas/"
        );
    }

    #[test]
    fn item_urls_end_with_slash() {
        let api = HttpTaskApi::new("http://127.0.0.1:8000/api", Duration::from_secs(5))
            .expect("client");
        assert_eq!(
            api.item_url(12),
            "http://127.0.0.1:8000/api/gestion_de_tareas/12/"
        );
    }

    #[tokio::test]
    async fn list_is_fetched_from_collection_url() {
        let (api, server) = serve_once(
            "200 OK",
            r#"[{"id":1,"titulo":"A","descripcion":"x","fecha_limite":null,"estado":"pendiente"},
                {"id":2,"titulo":"B","descripcion":"","fecha_limite":"2026-10-17","estado":"completada"}]"#,
        )
        .await;

        let tasks = api.fetch_all().await.expect("list");
        let request = server.await.expect("server");

        assert_eq!(tasks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(request.starts_with("GET /api/gestion_de_tareas/ HTTP/1.1"));
    }

    #[tokio::test]
    async fn non_array_list_body_is_a_parse_error() {
        let (api, server) = serve_once("200 OK", r#"{"detail":"not a list"}"#).await;

        let err = api.fetch_all().await.expect_err("must fail");
        server.await.expect("server");

        assert!(matches!(err, ClientError::Parse { .. }));
        assert!(!err.is_network());
    }

    #[tokio::test]
    async fn malformed_task_body_is_a_parse_error() {
        let (api, server) = serve_once("200 OK", "<html>oops</html>").await;

        let err = api.fetch_one(3).await.expect_err("must fail");
        let request = server.await.expect("server");

        assert!(matches!(err, ClientError::Parse { .. }));
        assert!(request.starts_with("GET /api/gestion_de_tareas/3/ HTTP/1.1"));
    }

    #[tokio::test]
    async fn server_error_on_delete_is_a_status_error() {
        let (api, server) = serve_once("500 Internal Server Error", "").await;

        let err = api.delete(7).await.expect_err("must fail");
        let request = server.await.expect("server");

        assert!(matches!(err, ClientError::Status { status: 500, .. }));
        assert!(err.is_network());
        assert!(request.starts_with("DELETE /api/gestion_de_tareas/7/ HTTP/1.1"));
    }

    #[tokio::test]
    async fn empty_no_content_delete_succeeds() {
        let (api, server) = serve_once("204 No Content", "").await;

        api.delete(7).await.expect("delete");
        let request = server.await.expect("server");

        assert!(request.starts_with("DELETE /api/gestion_de_tareas/7/ HTTP/1.1"));
    }

    #[tokio::test]
    async fn create_posts_wire_body() {
        let (api, server) = serve_once(
            "201 Created",
            r#"{"id":9,"titulo":"Taxes","descripcion":"file","fecha_limite":null,"estado":"pendiente"}"#,
        )
        .await;
        let input = TaskInput {
            title: "Taxes".to_string(),
            description: "file".to_string(),
            due: None,
            status: Status::Pending,
        };

        let created = api.create(&input).await.expect("create");
        let request = server.await.expect("server");

        assert_eq!(created.id, 9);
        assert!(request.starts_with("POST /api/gestion_de_tareas/ HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("content-type: application/json"));
        let body = request.split("\r\n\r\n").nth(1).expect("request body");
        let sent: serde_json::Value = serde_json::from_str(body).expect("json body");
        assert_eq!(
            sent,
            serde_json::json!({
                "titulo": "Taxes",
                "descripcion": "file",
                "fecha_limite": null,
                "estado": "pendiente"
            })
        );
    }

    #[tokio::test]
    async fn update_puts_to_item_url() {
        let (api, server) = serve_once(
            "200 OK",
            r#"{"id":4,"titulo":"Edited","descripcion":"","fecha_limite":"2026-12-01","estado":"en_progreso"}"#,
        )
        .await;
        let input = TaskInput {
            title: "Edited".to_string(),
            description: String::new(),
            due: chrono::NaiveDate::from_ymd_opt(2026, 12, 1),
            status: Status::InProgress,
        };

        let updated = api.update(4, &input).await.expect("update");
        let request = server.await.expect("server");

        assert_eq!(updated.status, Status::InProgress);
        assert!(request.starts_with("PUT /api/gestion_de_tareas/4/ HTTP/1.1"));
        assert!(request.contains(r#""fecha_limite":"2026-12-01""#));
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);
        let api = HttpTaskApi::new(&format!("http://{addr}/api"), Duration::from_secs(5))
            .expect("client");

        let err = api.fetch_all().await.expect_err("must fail");
        assert!(matches!(err, ClientError::Network { .. }));
    }
}
