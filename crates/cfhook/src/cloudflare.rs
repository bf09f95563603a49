use std::num::NonZeroU32;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{CloudflareCredentials, ResolvedCloudflareConfig};
use crate::error::{HookError, HookResult};
use crate::provider::{DnsProvider, ProviderError, RecordId, ZoneId};

/// TTL of 1 means "automatic" to Cloudflare
const CHALLENGE_TTL: u32 = 1;

/// Cloudflare API client for challenge record management
pub struct CloudflareClient {
    client: Client,
    api_base: String,
    credentials: CloudflareCredentials,
    limiter: DefaultDirectRateLimiter,
}

#[derive(Debug, Serialize)]
struct CreateDnsRecord<'a> {
    #[serde(rename = "type")]
    record_type: &'static str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
}

/// Envelope shared by every v4 API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<CloudflareApiError>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CloudflareApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct DeletedRecord {
    #[allow(dead_code)]
    id: String,
}

impl CloudflareClient {
    pub fn new(config: &ResolvedCloudflareConfig) -> HookResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| HookError::config(format!("Failed to create HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            HookError::config("cloudflare.requests_per_second must be greater than zero")
        })?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            credentials: config.credentials.clone(),
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            CloudflareCredentials::ApiToken(token) => request.bearer_auth(token),
            CloudflareCredentials::GlobalKey { email, api_key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", api_key),
        }
    }

    /// Send a request and unwrap the `result` of a successful envelope
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ProviderError> {
        self.limiter.until_ready().await;

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        if !envelope.success {
            let error_msg = envelope
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ProviderError::Api(error_msg));
        }

        envelope
            .result
            .ok_or_else(|| ProviderError::Decode("No result in response".to_string()))
    }

    fn records_url(&self, zone: &ZoneId) -> String {
        format!("{}/zones/{}/dns_records", self.api_base, zone)
    }
}

#[async_trait]
impl DnsProvider for CloudflareClient {
    async fn find_zone(&self, apex: &str) -> Result<Option<ZoneId>, ProviderError> {
        tracing::debug!(apex = %apex, "Listing zones");

        let zones: Vec<Zone> = self
            .send(
                self.client
                    .get(format!("{}/zones", self.api_base))
                    .query(&[("name", apex)]),
            )
            .await?;

        Ok(zones
            .into_iter()
            .next()
            .map(|zone| ZoneId::from_provider(zone.id)))
    }

    async fn create_txt_record(
        &self,
        zone: &ZoneId,
        name: &str,
        content: &str,
    ) -> Result<RecordId, ProviderError> {
        tracing::info!("Creating TXT record {} in zone {}", name, zone);

        let record: DnsRecord = self
            .send(self.client.post(self.records_url(zone)).json(&CreateDnsRecord {
                record_type: "TXT",
                name,
                content,
                ttl: CHALLENGE_TTL,
            }))
            .await?;

        tracing::info!("Created TXT record {} with ID {}", name, record.id);
        Ok(RecordId::from_provider(record.id))
    }

    async fn find_txt_record(
        &self,
        zone: &ZoneId,
        name: &str,
        content: &str,
    ) -> Result<Option<RecordId>, ProviderError> {
        let records: Vec<DnsRecord> = self
            .send(self.client.get(self.records_url(zone)).query(&[
                ("type", "TXT"),
                ("name", name),
                ("content", content),
            ]))
            .await?;

        // Only an exact name + content match may be selected for deletion
        Ok(records
            .into_iter()
            .find(|r| r.name.eq_ignore_ascii_case(name) && r.content == content)
            .map(|r| RecordId::from_provider(r.id)))
    }

    async fn delete_record(&self, zone: &ZoneId, record: &RecordId) -> Result<(), ProviderError> {
        tracing::info!("Deleting DNS record {}", record);

        let _: DeletedRecord = self
            .send(
                self.client
                    .delete(format!("{}/{}", self.records_url(zone), record)),
            )
            .await?;

        tracing::info!("Deleted DNS record {}", record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, credentials: CloudflareCredentials) -> CloudflareClient {
        CloudflareClient::new(&ResolvedCloudflareConfig {
            api_base: server.uri(),
            credentials,
            requests_per_second: 100,
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn global_key() -> CloudflareCredentials {
        CloudflareCredentials::GlobalKey {
            email: "admin@example.com".to_string(),
            api_key: "global-key".to_string(),
        }
    }

    #[tokio::test]
    async fn test_find_zone_sends_auth_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .and(query_param("name", "example.co.uk"))
            .and(header("X-Auth-Email", "admin@example.com"))
            .and(header("X-Auth-Key", "global-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "errors": [],
                "result": [{"id": "zone-1", "name": "example.co.uk"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, global_key());
        let zone = client.find_zone("example.co.uk").await.unwrap();
        assert_eq!(zone, Some(ZoneId::from_provider("zone-1")));
    }

    #[tokio::test]
    async fn test_find_zone_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "errors": [],
                "result": []
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, global_key());
        assert_eq!(client.find_zone("example.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_bearer_token_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .and(header("Authorization", "Bearer scoped-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "result": [{"id": "zone-9"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(
            &server,
            CloudflareCredentials::ApiToken("scoped-token".to_string()),
        );
        assert!(client.find_zone("example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_txt_record_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/zones/zone-1/dns_records"))
            .and(body_json(serde_json::json!({
                "type": "TXT",
                "name": "_acme-challenge.example.com",
                "content": "abc123",
                "ttl": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "errors": [],
                "result": {
                    "id": "rec-1",
                    "name": "_acme-challenge.example.com",
                    "content": "abc123"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, global_key());
        let record = client
            .create_txt_record(
                &ZoneId::from_provider("zone-1"),
                "_acme-challenge.example.com",
                "abc123",
            )
            .await
            .unwrap();
        assert_eq!(record, RecordId::from_provider("rec-1"));
    }

    #[tokio::test]
    async fn test_find_txt_record_filters_exact_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones/zone-1/dns_records"))
            .and(query_param("type", "TXT"))
            .and(query_param("name", "_acme-challenge.example.com"))
            .and(query_param("content", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "result": [
                    {"id": "rec-other", "name": "_acme-challenge.example.com", "content": "abc123"},
                    {"id": "rec-1", "name": "_acme-challenge.example.com", "content": "abc"}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, global_key());
        let record = client
            .find_txt_record(
                &ZoneId::from_provider("zone-1"),
                "_acme-challenge.example.com",
                "abc",
            )
            .await
            .unwrap();
        assert_eq!(record, Some(RecordId::from_provider("rec-1")));
    }

    #[tokio::test]
    async fn test_find_txt_record_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones/zone-1/dns_records"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "result": []
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, global_key());
        let record = client
            .find_txt_record(&ZoneId::from_provider("zone-1"), "_acme-challenge.x.com", "t")
            .await
            .unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn test_delete_record() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/zones/zone-1/dns_records/rec-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "result": {"id": "rec-1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, global_key());
        client
            .delete_record(
                &ZoneId::from_provider("zone-1"),
                &RecordId::from_provider("rec-1"),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_record_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "success": false,
                "errors": [{"code": 81044, "message": "Record does not exist."}],
                "result": null
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, global_key());
        let err = client
            .delete_record(
                &ZoneId::from_provider("zone-1"),
                &RecordId::from_provider("gone"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_forbidden_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = client_for(&server, global_key());
        let err = client.find_zone("example.com").await.unwrap_err();
        match err {
            ProviderError::Status { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "forbidden");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "errors": [
                    {"code": 1004, "message": "DNS Validation Error"},
                    {"code": 9005, "message": "Content is invalid"}
                ],
                "result": null
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, global_key());
        let err = client
            .create_txt_record(&ZoneId::from_provider("zone-1"), "n", "c")
            .await
            .unwrap_err();
        match err {
            ProviderError::Api(message) => {
                assert_eq!(message, "DNS Validation Error, Content is invalid")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbage_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = client_for(&server, global_key());
        let err = client.find_zone("example.com").await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let result = CloudflareClient::new(&ResolvedCloudflareConfig {
            api_base: "http://localhost".to_string(),
            credentials: global_key(),
            requests_per_second: 0,
            request_timeout: Duration::from_secs(5),
        });
        assert!(matches!(result, Err(HookError::Config(_))));
    }
}
