//! Plain HTTP checks that need no browser

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{SmokeError, SmokeResult};

/// What a JSON API check concluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiStatus<T = String> {
    Ok(T),
    /// The endpoint answered, but reports its database as unavailable
    DatabaseDown(String),
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    error: Option<String>,
}

/// Body of `/api/db-status` when the database answers
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DbStatus {
    #[serde(default)]
    pub database_version: String,
    #[serde(default)]
    pub test_table_exists: bool,
    /// Only reported when the table exists
    #[serde(default)]
    pub test_table_records: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DbStatusResponse {
    #[serde(flatten)]
    api: ApiResponse,
    #[serde(flatten)]
    details: DbStatus,
}

fn client(timeout: Duration) -> SmokeResult<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// GET the page; require 200 and an HTML content type.
pub async fn health_check(url: &str, timeout: Duration) -> SmokeResult<()> {
    let resp = client(timeout)?.get(url).send().await?;
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    debug!("GET {} -> {} ({})", url, status, content_type);

    if status != StatusCode::OK {
        return Err(SmokeError::assertion("status 200", status.to_string()));
    }
    if !content_type.starts_with("text/html") {
        return Err(SmokeError::assertion(
            "content-type starting with text/html",
            if content_type.is_empty() { "<none>".to_string() } else { content_type },
        ));
    }
    Ok(())
}

/// GET `/api/health`; require 200 with `status: success`.
pub async fn api_health(base: &str, timeout: Duration) -> SmokeResult<String> {
    let url = endpoint(base, "/api/health");
    let resp = client(timeout)?.get(&url).send().await?;
    let status = resp.status();
    if status != StatusCode::OK {
        return Err(SmokeError::assertion(
            format!("status 200 from {}", url),
            status.to_string(),
        ));
    }

    let body: ApiResponse = resp.json().await?;
    if body.status != "success" {
        return Err(SmokeError::assertion("status \"success\"", body.status));
    }
    Ok(body.message)
}

/// GET a JSON endpoint whatever its status code; a non-JSON body is a failure.
async fn get_json<T: DeserializeOwned>(url: &str, timeout: Duration) -> SmokeResult<(StatusCode, T)> {
    let resp = client(timeout)?.get(url).send().await?;
    let status = resp.status();
    let text = resp.text().await?;
    debug!("GET {} -> {}", url, status);

    let body = serde_json::from_str(&text).map_err(|_| {
        SmokeError::assertion(
            format!("JSON body from {}", url),
            format!("{} {}", status, crate::page::page_snippet(&text)),
        )
    })?;
    Ok((status, body))
}

/// Map the database endpoints' two documented answers onto [`ApiStatus`].
///
/// A 500 carrying `status: error` is the application's way of saying the
/// database is unreachable.
fn database_answer<T>(status: StatusCode, api: ApiResponse, details: T) -> SmokeResult<ApiStatus<T>> {
    if status == StatusCode::OK && api.status == "success" {
        Ok(ApiStatus::Ok(details))
    } else if status == StatusCode::INTERNAL_SERVER_ERROR && api.status == "error" {
        Ok(ApiStatus::DatabaseDown(api.error.unwrap_or(api.message)))
    } else {
        Err(SmokeError::assertion(
            "200/success or 500/error",
            format!("{}/{}", status.as_u16(), api.status),
        ))
    }
}

/// GET `/api/db-test`.
pub async fn api_db_test(base: &str, timeout: Duration) -> SmokeResult<ApiStatus> {
    let (status, body): (_, ApiResponse) =
        get_json(&endpoint(base, "/api/db-test"), timeout).await?;
    let message = body.message.clone();
    database_answer(status, body, message)
}

/// GET `/api/db-status`: server version and the state of the `test` table.
pub async fn api_db_status(base: &str, timeout: Duration) -> SmokeResult<ApiStatus<DbStatus>> {
    let (status, body): (_, DbStatusResponse) =
        get_json(&endpoint(base, "/api/db-status"), timeout).await?;
    database_answer(status, body.api, body.details)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        assert_eq!(endpoint("http://localhost:8080", "/api/health"), "http://localhost:8080/api/health");
        assert_eq!(endpoint("http://localhost:8080/", "/api/health"), "http://localhost:8080/api/health");
    }

    #[test]
    fn test_db_status_body() {
        let body = r#"{
            "status": "success",
            "message": "Database status retrieved successfully",
            "database_version": "8.0.36",
            "test_table_exists": true,
            "connection_details": {"host": "db", "database": "testdb", "port": "3306"},
            "test_table_records": 3
        }"#;
        let parsed: DbStatusResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.api.status, "success");
        assert_eq!(parsed.details.database_version, "8.0.36");
        assert_eq!(parsed.details.test_table_records, Some(3));
    }

    #[test]
    fn test_database_answer_rejects_mismatched_status() {
        let api = ApiResponse {
            status: "success".to_string(),
            message: String::new(),
            error: None,
        };
        let err = database_answer(StatusCode::INTERNAL_SERVER_ERROR, api, ()).unwrap_err();
        assert!(err.to_string().contains("500/success"), "{}", err);
    }

    #[tokio::test]
    async fn test_connection_refused_is_http_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = health_check(&format!("http://127.0.0.1:{}/", port), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, SmokeError::Http(_)));
    }
}
