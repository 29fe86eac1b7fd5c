//! ureq-backed collaborators: the admin API's presign endpoint and a plain
//! HTTP PUT to the granted url.

use tracing::{debug, trace};

use super::{GrantAuthority, ObjectStore, UploadError, UploadGrant, UploadTarget};
use crate::source::ApiClient;

pub struct HttpGrantAuthority {
    agent: ureq::Agent,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpGrantAuthority {
    pub fn new(agent: ureq::Agent, endpoint: impl Into<String>, bearer_token: Option<String>) -> Self {
        Self {
            agent,
            endpoint: endpoint.into(),
            bearer_token,
        }
    }

    /// Presign endpoint `path` on the admin API, using the client's token.
    pub fn from_api(api: &ApiClient, path: &str) -> Self {
        Self::new(api.agent().clone(), api.url(path), api.token().map(str::to_string))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl GrantAuthority for HttpGrantAuthority {
    fn request_grant(&self, target: &UploadTarget) -> Result<UploadGrant, UploadError> {
        trace!("Requesting grant for {} at {}", target.file_name, self.endpoint);
        let mut req = self
            .agent
            .post(&self.endpoint)
            .set("Accept", "application/json");
        if let Some(token) = self.bearer_token.as_ref() {
            req = req.set("Authorization", &format!("Bearer {token}"));
        }
        let response = req.send_json(target).map_err(|err| match err {
            ureq::Error::Status(401, _) => {
                UploadError::GrantRequestFailed("not authorized".to_string())
            }
            ureq::Error::Status(code, _) => {
                UploadError::GrantRequestFailed(format!("http status {code}"))
            }
            ureq::Error::Transport(transport) => {
                UploadError::GrantRequestFailed(transport.to_string())
            }
        })?;
        response
            .into_json::<UploadGrant>()
            .map_err(|e| UploadError::GrantRequestFailed(format!("invalid grant: {e}")))
    }
}

pub struct HttpObjectStore {
    agent: ureq::Agent,
}

impl HttpObjectStore {
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl ObjectStore for HttpObjectStore {
    fn put(&self, url: &str, content_type: &str, bytes: &[u8]) -> Result<(), UploadError> {
        match self
            .agent
            .put(url)
            .set("Content-Type", content_type)
            .send_bytes(bytes)
        {
            Ok(resp) if (200..=299).contains(&resp.status()) => {
                debug!("Object store accepted {} bytes", bytes.len());
                Ok(())
            }
            Ok(resp) => Err(UploadError::UploadFailed {
                status: Some(resp.status()),
                reason: resp.status_text().to_string(),
            }),
            Err(ureq::Error::Status(code, resp)) => Err(UploadError::UploadFailed {
                status: Some(code),
                reason: resp.status_text().to_string(),
            }),
            Err(ureq::Error::Transport(transport)) => Err(UploadError::UploadFailed {
                status: None,
                reason: transport.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_response_uses_camel_case() {
        let grant: UploadGrant = serde_json::from_str(
            r#"{"uploadUrl":"https://store/x","key":"k1","publicUrl":"https://cdn/k1","expiresIn":300}"#,
        )
        .unwrap();
        assert_eq!(grant.upload_url, "https://store/x");
        assert_eq!(grant.key, "k1");
        assert_eq!(grant.public_url, "https://cdn/k1");
    }

    #[test]
    fn grant_request_body_uses_camel_case() {
        let body = serde_json::to_value(UploadTarget {
            file_name: "leopard.jpg".into(),
            content_type: "image/jpeg".into(),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"fileName": "leopard.jpg", "contentType": "image/jpeg"})
        );
    }

    #[test]
    fn authority_endpoint_joins_the_api_base() {
        let api = ApiClient::new("https://api.example.com/", Some("t0ken".into()), 1_000);
        let authority = HttpGrantAuthority::from_api(&api, "/api/gallery-images/presign");
        assert_eq!(authority.endpoint(), "https://api.example.com/api/gallery-images/presign");
    }

    #[test]
    fn unreachable_store_is_an_upload_failure() {
        let store = HttpObjectStore::new(crate::source::build_agent(200));
        let err = store
            .put("http://127.0.0.1:9/nowhere", "image/png", &[1, 2, 3])
            .unwrap_err();
        assert!(matches!(err, UploadError::UploadFailed { status: None, .. }));
    }
}
