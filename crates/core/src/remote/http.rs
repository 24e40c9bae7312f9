//! HTTP client for the editor API.
//! Every call is a form-encoded POST answered with a JSON envelope.

use super::{SubtitleApi, VideoResolver};
use crate::error::{Error, Result};
use crate::version::{Revision, SaveRequest, SubtitleKey};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};

/// Response body shared by every API call. `code == 0` means success.
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    url: String,
    #[serde(default)]
    subtitle: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    msg: String,
}

/// Client for the remote editor API.
pub struct HttpApi {
    client: Client,
    endpoint: Url,
}

impl HttpApi {
    /// Create a client for `endpoint` whose requests give up after `timeout`.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| Error::Validation(format!("api url {endpoint:?}: {err}")))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    /// Post `form` and return the status together with the decoded envelope.
    async fn call(&self, form: &[(&str, &str)]) -> Result<(StatusCode, Envelope)> {
        trace!("api call={}", form.first().map(|(_, v)| *v).unwrap_or(""));
        let resp = self
            .client
            .post(self.endpoint.clone())
            .form(form)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        let envelope = match serde_json::from_slice::<Envelope>(&body) {
            Ok(envelope) => envelope,
            // 4xx pages still map to "not found"; anything else must be a real envelope.
            Err(_) if status.is_client_error() => Envelope::default(),
            Err(err) => {
                return Err(Error::Remote(format!("bad response with status {status}: {err}")))
            }
        };
        Ok((status, envelope))
    }
}

fn rejected(call: &str, status: StatusCode, envelope: &Envelope) -> Error {
    Error::Remote(format!(
        "{call} rejected with status {status}, code {}{}",
        envelope.code,
        if envelope.msg.is_empty() {
            String::new()
        } else {
            format!(": {}", envelope.msg)
        }
    ))
}

#[async_trait]
impl VideoResolver for HttpApi {
    async fn resolve(&self, video_id: &str) -> Result<String> {
        if video_id.is_empty() {
            return Err(Error::Validation("missing id".into()));
        }
        let (status, envelope) = self.call(&[("call", "youtube"), ("id", video_id)]).await?;
        if status.is_server_error() {
            return Err(rejected("youtube", status, &envelope));
        }
        if !status.is_success() || envelope.code != 0 {
            return Err(Error::NotFound(format!("video {video_id}")));
        }
        match Url::parse(&envelope.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                debug!("resolved {video_id}");
                Ok(envelope.url)
            }
            _ => Err(Error::NotFound(format!("playable url for video {video_id}"))),
        }
    }
}

#[async_trait]
impl SubtitleApi for HttpApi {
    async fn fetch(&self, key: &SubtitleKey) -> Result<Option<String>> {
        key.validate()?;
        let (status, envelope) = self
            .call(&[
                ("call", "subtitle"),
                ("platform", key.platform.as_str()),
                ("id", key.video_id.as_str()),
                ("lang", key.lang.as_str()),
            ])
            .await?;
        if status.is_client_error() {
            debug!("no subtitle for {}/{}", key.video_id, key.lang);
            return Ok(None);
        }
        if !status.is_success() || envelope.code != 0 {
            return Err(rejected("subtitle", status, &envelope));
        }
        Ok(Some(envelope.subtitle))
    }

    async fn save(&self, request: SaveRequest) -> Result<Revision> {
        request.validate()?;
        let key = &request.key;
        let (status, envelope) = self
            .call(&[
                ("call", "save"),
                ("ip", request.submitter_ip.as_str()),
                ("platform", key.platform.as_str()),
                ("id", key.video_id.as_str()),
                ("lang", key.lang.as_str()),
                ("subtitle", request.subtitle.as_str()),
            ])
            .await?;
        if !status.is_success() || envelope.code != 0 {
            return Err(rejected("save", status, &envelope));
        }
        envelope.version.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use httpmock::prelude::*;
    use serde_json::json;

    fn api(server: &MockServer) -> HttpApi {
        HttpApi::new(&server.url("/api"), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn resolves_video_url() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api").body_contains("call=youtube");
                then.status(200)
                    .json_body(json!({"url": "https://cdn.example/v.mp4", "code": 0}));
            })
            .await;
        let url = api(&server).resolve("abc").await.unwrap();
        assert_eq!(url, "https://cdn.example/v.mp4");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_url_result_is_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api");
                then.status(200).json_body(json!({"url": "", "code": 0}));
            })
            .await;
        let err = api(&server).resolve("abc").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn missing_subtitle_maps_to_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api").body_contains("call=subtitle");
                then.status(400).json_body(json!({"msg": "no such file", "code": 201}));
            })
            .await;
        let key = SubtitleKey::new("youtube", "abc", "ko");
        assert_eq!(api(&server).fetch(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn fetches_existing_subtitle() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api")
                    .body_contains("call=subtitle")
                    .body_contains("lang=ko");
                then.status(200)
                    .json_body(json!({"subtitle": "1\n00:00:00,000 --> 00:00:01,000\nhi\n\n", "code": 0}));
            })
            .await;
        let key = SubtitleKey::new("youtube", "abc", "ko");
        let text = api(&server).fetch(&key).await.unwrap().unwrap();
        assert!(text.contains("hi"));
    }

    #[tokio::test]
    async fn html_body_is_a_remote_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api").body_contains("call=subtitle");
                then.status(200).body("<html>proxy error</html>");
            })
            .await;
        let key = SubtitleKey::new("youtube", "abc", "ko");
        let err = api(&server).fetch(&key).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Remote);
        assert!(err.to_string().contains("bad response"));
    }

    #[tokio::test]
    async fn html_not_found_page_still_maps_to_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api");
                then.status(404).body("<html>not here</html>");
            })
            .await;
        let key = SubtitleKey::new("youtube", "abc", "ko");
        assert_eq!(api(&server).fetch(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_returns_revision() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api")
                    .body_contains("call=save")
                    .body_contains("ip=1.2.3.4");
                then.status(200).json_body(json!({"version": "r3", "code": 0}));
            })
            .await;
        let rev = api(&server)
            .save(SaveRequest {
                key: SubtitleKey::new("youtube", "abc", "ko"),
                submitter_ip: "1.2.3.4".into(),
                subtitle: "1\n00:00:00,000 --> 00:00:01,000\nhi\n\n".into(),
            })
            .await
            .unwrap();
        assert_eq!(rev, Revision(3));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn failed_save_is_a_remote_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api");
                then.status(400).json_body(json!({"msg": "disk", "code": 305}));
            })
            .await;
        let err = api(&server)
            .save(SaveRequest {
                key: SubtitleKey::new("youtube", "abc", "ko"),
                submitter_ip: "1.2.3.4".into(),
                subtitle: "x".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Remote);
        assert!(err.to_string().contains("305"));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api");
                then.status(200)
                    .delay(Duration::from_millis(500))
                    .json_body(json!({"url": "https://cdn.example/v.mp4", "code": 0}));
            })
            .await;
        let api = HttpApi::new(&server.url("/api"), Duration::from_millis(50)).unwrap();
        let err = api.resolve("abc").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Remote);
    }
}
