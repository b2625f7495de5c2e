//! OCI Object Storage client
//!
//! A thin REST client over the Object Storage API. Every request is
//! signed with the profile's API key; every failure surfaces as
//! [`PosterError::Storage`] carrying the service's message.

use crate::config::StorageSettings;
use crate::storage::oci_config::OciProfile;
use crate::storage::signer::RequestSigner;
use crate::storage::{is_png, link_window, par_name, ObjectStorage};
use crate::types::{ObjectRef, PosterError, PosterResult, PreauthenticatedLink};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListObjectsResponse {
    #[serde(default)]
    objects: Vec<ObjectSummary>,
    #[serde(default)]
    next_start_with: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectSummary {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateParDetails<'a> {
    name: String,
    access_type: &'a str,
    time_expires: String,
    object_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    access_uri: Option<String>,
}

#[derive(Deserialize)]
struct OciErrorResponse {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

pub struct OciStorageClient {
    http: Client,
    signer: RequestSigner,
    endpoint: Url,
    namespace: String,
}

impl OciStorageClient {
    /// Build a client from the OCI config file named by `settings`.
    pub fn new(settings: &StorageSettings) -> PosterResult<Self> {
        let profile = OciProfile::load(
            settings.config_file.as_deref(),
            settings.profile.as_deref(),
        )?;

        let region = settings
            .region
            .clone()
            .or_else(|| profile.region.clone())
            .ok_or_else(|| {
                PosterError::Storage("OCI configuration is missing a region value".to_string())
            })?;

        let endpoint = format!("https://objectstorage.{}.oraclecloud.com", region);
        info!(region = %region, namespace = %settings.namespace, "Initialized OCI Object Storage client");
        Self::with_endpoint(&endpoint, &settings.namespace, profile.signer()?)
    }

    /// Build a client against an explicit endpoint.
    pub fn with_endpoint(
        endpoint: &str,
        namespace: &str,
        signer: RequestSigner,
    ) -> PosterResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| PosterError::Storage(format!("Invalid OCI endpoint {}: {}", endpoint, e)))?;
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                PosterError::Storage(format!("Failed to create OCI Object Storage client: {}", e))
            })?;

        Ok(Self {
            http,
            signer,
            endpoint,
            namespace: namespace.to_string(),
        })
    }

    /// Delete a pre-authenticated request by id; 404 means already gone.
    async fn delete_par(&self, bucket: &str, par_id: &str) -> PosterResult<()> {
        let url = self.url(&["n", &self.namespace, "b", bucket, "p", par_id])?;
        let response = self.send_raw(Method::DELETE, url, None).await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            status if status == StatusCode::NOT_FOUND => {
                debug!(par_id, "Pre-authenticated request already gone");
                Ok(())
            }
            _ => Err(error_from_response(response).await),
        }
    }

    /// Look up the tenancy's namespace.
    pub async fn get_namespace(&self) -> PosterResult<String> {
        let url = self.url(&["n", ""])?;
        let response = self.send(Method::GET, url, None).await?;
        response
            .json::<String>()
            .await
            .map_err(|e| PosterError::Storage(format!("Failed to resolve OCI namespace: {}", e)))
    }

    fn url(&self, segments: &[&str]) -> PosterResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| PosterError::Storage(format!("Invalid OCI endpoint {}", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn object_url(&self, object: &ObjectRef) -> PosterResult<Url> {
        self.url(&["n", &self.namespace, "b", &object.bucket, "o", &object.key])
    }

    /// Sign and send a request, returning the response whatever its status.
    async fn send_raw(
        &self,
        method: Method,
        url: Url,
        body: Option<(Vec<u8>, &str)>,
    ) -> PosterResult<Response> {
        let signed = self.signer.sign(
            &method,
            &url,
            body.as_ref().map(|(bytes, content_type)| (bytes.as_slice(), *content_type)),
        )?;

        debug!(method = %method, path = %url.path(), "OCI request");

        let mut request = self
            .http
            .request(method, url)
            .header("date", &signed.date)
            .header("authorization", &signed.authorization);

        if let Some(content) = &signed.content {
            request = request.header("x-content-sha256", &content.sha256);
        }

        if let Some((bytes, content_type)) = body {
            request = request.header("content-type", content_type).body(bytes);
        }

        request
            .send()
            .await
            .map_err(|e| PosterError::Storage(e.to_string()))
    }

    /// Like [`Self::send_raw`], but any non-2xx status becomes an error.
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<(Vec<u8>, &str)>,
    ) -> PosterResult<Response> {
        let response = self.send_raw(method, url, body).await?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(error_from_response(response).await)
    }
}

async fn error_from_response(response: Response) -> PosterError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    match serde_json::from_str::<OciErrorResponse>(&text) {
        Ok(err) => {
            debug!(status = %status, code = ?err.code, "OCI error response");
            PosterError::Storage(err.message)
        }
        Err(_) => PosterError::Storage(format!(
            "OCI request failed ({}): {}",
            status.as_u16(),
            text
        )),
    }
}

#[async_trait]
impl ObjectStorage for OciStorageClient {
    async fn list_png_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> PosterResult<Vec<ObjectRef>> {
        let mut objects = Vec::new();
        let mut next_start: Option<String> = None;

        loop {
            let mut url = self.url(&["n", &self.namespace, "b", bucket, "o"])?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("fields", "name");
                if let Some(prefix) = prefix {
                    query.append_pair("prefix", prefix);
                }
                if let Some(start) = &next_start {
                    query.append_pair("start", start);
                }
            }

            let page: ListObjectsResponse = self
                .send(Method::GET, url, None)
                .await?
                .json()
                .await
                .map_err(|e| PosterError::Storage(format!("Failed to parse object listing: {}", e)))?;

            objects.extend(
                page.objects
                    .into_iter()
                    .filter_map(|obj| obj.name)
                    .filter(|name| is_png(name))
                    .map(|name| ObjectRef::new(bucket, name)),
            );

            match page.next_start_with.filter(|s| !s.is_empty()) {
                Some(start) => next_start = Some(start),
                None => break,
            }
        }

        debug!(bucket, count = objects.len(), "Listed PNG objects");
        Ok(objects)
    }

    async fn create_preauthenticated_link(
        &self,
        object: &ObjectRef,
        expires_in_seconds: i64,
    ) -> PosterResult<PreauthenticatedLink> {
        let (created_at, expires_at) = link_window(expires_in_seconds)?;
        let details = CreateParDetails {
            name: par_name(created_at),
            access_type: "ObjectRead",
            time_expires: expires_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            object_name: &object.key,
        };
        let body = serde_json::to_vec(&details)
            .map_err(|e| PosterError::Storage(format!("Failed to encode request: {}", e)))?;

        let url = self.url(&["n", &self.namespace, "b", &object.bucket, "p", ""])?;
        let response = self
            .send(Method::POST, url, Some((body, "application/json")))
            .await?;

        let missing = || {
            PosterError::Storage(format!(
                "Failed to create pre-authenticated request for {}",
                object.uri()
            ))
        };
        let par: ParResponse = response.json().await.map_err(|_| missing())?;
        let (id, access_uri) = match (par.id, par.access_uri) {
            (Some(id), Some(uri)) if !uri.is_empty() => (id, uri),
            (Some(id), _) => {
                // Created but unusable; don't leave it live until expiry.
                if let Err(e) = self.delete_par(&object.bucket, &id).await {
                    warn!(par_id = %id, error = %e, "Failed to revoke incomplete pre-authenticated request");
                }
                return Err(missing());
            }
            _ => return Err(missing()),
        };

        Ok(PreauthenticatedLink {
            bucket: object.bucket.clone(),
            id,
            url: format!(
                "{}{}",
                self.endpoint.as_str().trim_end_matches('/'),
                access_uri
            ),
            created_at,
            expires_at,
        })
    }

    async fn revoke_preauthenticated_link(&self, link: &PreauthenticatedLink) -> PosterResult<()> {
        self.delete_par(&link.bucket, &link.id).await
    }

    async fn delete_object(&self, object: &ObjectRef) -> PosterResult<()> {
        let url = self.object_url(object)?;
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn download_object(&self, object: &ObjectRef) -> PosterResult<Vec<u8>> {
        let url = self.object_url(object)?;
        let bytes = self
            .send(Method::GET, url, None)
            .await?
            .bytes()
            .await
            .map_err(|e| PosterError::Storage(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn upload_bytes(
        &self,
        object: &ObjectRef,
        data: Vec<u8>,
        content_type: &str,
    ) -> PosterResult<()> {
        let url = self.object_url(object)?;
        self.send(Method::PUT, url, Some((data, content_type))).await?;
        Ok(())
    }
}
