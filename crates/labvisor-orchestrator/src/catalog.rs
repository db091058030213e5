//! Task catalog client.
//!
//! The catalog is an external HTTP service mapping a task ID to the image a
//! lab for that task is launched from.

use std::time::Duration;

use labvisor_common::error::{LabError, Result};
use labvisor_common::types::TaskId;
use reqwest::StatusCode;
use serde::Deserialize;

/// Read-only lookup of a task's base image.
pub trait TaskCatalog: Send + Sync {
    /// Returns the image reference labs for `task` are launched from.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the catalog does not know the task, or
    /// `Catalog` if the lookup fails or the answer is unusable.
    fn base_image(&self, task: TaskId) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TaskEnvelope {
    task: TaskRecord,
}

#[derive(Debug, Deserialize)]
struct TaskRecord {
    #[serde(default)]
    vm_image_path: String,
}

/// Catalog client speaking `GET {base_url}/tasks/{id}`.
#[derive(Debug, Clone)]
pub struct HttpTaskCatalog {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpTaskCatalog {
    /// Creates a client with a fixed per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `Catalog` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LabError::Catalog {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self::with_client(base_url, client))
    }

    /// Creates a client around a preconfigured [`reqwest::blocking::Client`].
    #[must_use]
    pub fn with_client(base_url: impl Into<String>, client: reqwest::blocking::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    /// URL of the catalog entry for `task`.
    #[must_use]
    pub fn task_url(&self, task: TaskId) -> String {
        format!("{}/tasks/{task}", self.base_url)
    }
}

impl TaskCatalog for HttpTaskCatalog {
    fn base_image(&self, task: TaskId) -> Result<String> {
        let url = self.task_url(task);
        tracing::debug!(task_id = %task, url = %url, "looking up task image");

        let response = self.client.get(&url).send().map_err(|e| LabError::Catalog {
            message: format!("request to {url} failed: {e}"),
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LabError::NotFound {
                kind: "task",
                id: task.to_string(),
            });
        }
        if status != StatusCode::OK {
            return Err(LabError::Catalog {
                message: format!("HTTP {status} from {url}"),
            });
        }

        let body = response.text().map_err(|e| LabError::Catalog {
            message: format!("failed to read response body from {url}: {e}"),
        })?;
        parse_task_image(&body).map_err(|message| LabError::Catalog {
            message: format!("task {task}: {message}"),
        })
    }
}

/// Extracts `task.vm_image_path` from a catalog response body.
fn parse_task_image(body: &str) -> std::result::Result<String, String> {
    let envelope: TaskEnvelope =
        serde_json::from_str(body).map_err(|e| format!("invalid response body: {e}"))?;
    let image = envelope.task.vm_image_path.trim();
    if image.is_empty() {
        return Err("no image configured".into());
    }
    Ok(image.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    use super::*;

    /// Serves one canned HTTP response and reports the request line.
    fn serve_once(status: &str, body: &str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let (tx, rx) = mpsc::channel();
        let _handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            let _ = reader.read_line(&mut request_line).unwrap();
            loop {
                let mut line = String::new();
                let n = reader.read_line(&mut line).unwrap();
                if n == 0 || line == "\r\n" {
                    break;
                }
            }
            let mut stream = stream;
            stream.write_all(response.as_bytes()).unwrap();
            let _ = tx.send(request_line.trim().to_string());
        });
        (format!("http://{addr}"), rx)
    }

    fn catalog(base_url: &str) -> HttpTaskCatalog {
        let client = reqwest::blocking::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpTaskCatalog::with_client(base_url, client)
    }

    #[test]
    fn resolves_image_from_task_envelope() {
        let (url, requests) = serve_once("200 OK", r#"{"task":{"id":42,"vm_image_path":"alpine:lab-base"}}"#);
        let image = catalog(&url).base_image(TaskId::new(42)).unwrap();
        assert_eq!(image, "alpine:lab-base");
        assert_eq!(requests.recv().unwrap(), "GET /tasks/42 HTTP/1.1");
    }

    #[test]
    fn missing_task_is_not_found() {
        let (url, _requests) = serve_once("404 Not Found", "{}");
        let err = catalog(&url).base_image(TaskId::new(7)).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("task not found: 7"));
    }

    #[test]
    fn server_error_is_catalog_error() {
        let (url, _requests) = serve_once("500 Internal Server Error", "{}");
        let err = catalog(&url).base_image(TaskId::new(7)).unwrap_err();
        assert!(matches!(err, LabError::Catalog { .. }));
    }

    #[test]
    fn empty_image_is_catalog_error() {
        let (url, _requests) = serve_once("200 OK", r#"{"task":{"vm_image_path":""}}"#);
        let err = catalog(&url).base_image(TaskId::new(7)).unwrap_err();
        assert!(matches!(err, LabError::Catalog { .. }));
    }

    #[test]
    fn unreachable_catalog_is_catalog_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = catalog(&format!("http://{addr}"))
            .base_image(TaskId::new(1))
            .unwrap_err();
        assert!(matches!(err, LabError::Catalog { .. }));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let catalog = catalog("http://catalog.local/");
        assert_eq!(catalog.task_url(TaskId::new(3)), "http://catalog.local/tasks/3");
    }

    #[test]
    fn parse_rejects_malformed_body() {
        assert!(parse_task_image("not json").is_err());
        assert!(parse_task_image(r#"{"other":1}"#).is_err());
    }
}
