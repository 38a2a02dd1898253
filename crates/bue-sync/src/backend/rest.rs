use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{ObjectStorage, RealtimeDatabase};
use crate::error::BackendError;

const STORAGE_API: &str = "https://firebasestorage.googleapis.com/v0/b/";

/// Realtime-database and object-storage client over the hosted backend's
/// REST surface.
pub struct RestBackend {
    http: Client,
    database_url: Url,
    storage_api: Url,
    bucket: String,
    auth_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    #[serde(default)]
    download_tokens: Option<String>,
}

impl RestBackend {
    pub fn new(
        database_url: &str,
        bucket: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            database_url: parse_url(database_url)?,
            storage_api: parse_url(STORAGE_API)?,
            bucket: bucket.to_string(),
            auth_token,
        })
    }

    /// `{database_url}/{path}.json[?auth=token]`
    fn database_endpoint(&self, path: &str) -> Result<Url, BackendError> {
        let mut url = self.database_url.clone();
        let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        {
            let mut out = url
                .path_segments_mut()
                .map_err(|_| BackendError::Unavailable("database URL cannot be a base".into()))?;
            out.pop_if_empty();
            match segs.split_last() {
                Some((last, parents)) => {
                    out.extend(parents);
                    out.push(&format!("{}.json", last));
                }
                None => {
                    out.push(".json");
                }
            }
        }
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }

    /// Object paths travel as one percent-encoded segment, slashes included.
    fn object_endpoint(&self, object_path: &str) -> Result<Url, BackendError> {
        let mut url = self.storage_api.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Unavailable("storage URL cannot be a base".into()))?
            .pop_if_empty()
            .push(&self.bucket)
            .push("o")
            .push(object_path);
        Ok(url)
    }

    fn download_url_for(&self, object_path: &str, token: Option<&str>) -> Result<String, BackendError> {
        let mut url = self.object_endpoint(object_path)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("alt", "media");
            if let Some(token) = token {
                query.append_pair("token", token);
            }
        }
        Ok(url.to_string())
    }
}

#[async_trait]
impl RealtimeDatabase for RestBackend {
    async fn get(&self, path: &str) -> Result<Option<Value>, BackendError> {
        let url = self.database_endpoint(path)?;
        debug!("GET {}", path);

        let resp = check_status(self.http.get(url).send().await?).await?;
        match resp.json::<Value>().await? {
            Value::Null => Ok(None),
            value => Ok(Some(value)),
        }
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), BackendError> {
        let url = self.database_endpoint(path)?;
        debug!("PUT {}", path);

        check_status(self.http.put(url).json(&value).send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for RestBackend {
    async fn download_url(&self, object_path: &str) -> Result<String, BackendError> {
        let url = self.object_endpoint(object_path)?;

        let mut req = self.http.get(url);
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Firebase {}", token));
        }

        let meta: ObjectMetadata = check_status(req.send().await?).await?.json().await?;

        // Several comma-separated tokens may be active; any of them works.
        let token = meta
            .download_tokens
            .as_deref()
            .and_then(|t| t.split(',').map(str::trim).find(|t| !t.is_empty()));

        self.download_url_for(object_path, token)
    }
}

async fn check_status(resp: Response) -> Result<Response, BackendError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(BackendError::Status { status, body })
}

fn parse_url(raw: &str) -> Result<Url, BackendError> {
    Url::parse(raw).map_err(|e| BackendError::Unavailable(format!("invalid URL '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(token: Option<&str>) -> RestBackend {
        RestBackend::new(
            "https://bu-events-default-rtdb.firebaseio.com/",
            "bu-events.appspot.com",
            token.map(String::from),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn database_paths_end_in_json() {
        let b = backend(None);
        assert_eq!(
            b.database_endpoint("events/E1/savedUsers").unwrap().as_str(),
            "https://bu-events-default-rtdb.firebaseio.com/events/E1/savedUsers.json"
        );
        assert_eq!(
            b.database_endpoint("events").unwrap().as_str(),
            "https://bu-events-default-rtdb.firebaseio.com/events.json"
        );
    }

    #[test]
    fn auth_token_goes_in_query() {
        let b = backend(Some("secret"));
        let url = b.database_endpoint("users/u1").unwrap();
        assert_eq!(url.query(), Some("auth=secret"));
    }

    #[test]
    fn object_path_is_a_single_encoded_segment() {
        let b = backend(None);
        let url = b.download_url_for("events/fall fest.jpg", Some("tok")).unwrap();
        assert_eq!(
            url,
            "https://firebasestorage.googleapis.com/v0/b/bu-events.appspot.com/o/events%2Ffall%20fest.jpg?alt=media&token=tok"
        );
    }
}
