//! OCI HTTP request signing
//!
//! Implements the draft-cavage HTTP Signature profile OCI uses for API
//! keys: an RSA-SHA256 (PKCS#1 v1.5) signature over a canonical list of
//! request headers.
//!
//! Reference: https://docs.oracle.com/en-us/iaas/Content/API/Concepts/signingrequests.htm

use crate::types::{PosterError, PosterResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::{Method, Url};
use rsa::{
    pkcs1::DecodeRsaPrivateKey,
    pkcs1v15::SigningKey,
    pkcs8::DecodePrivateKey,
    signature::{SignatureEncoding, Signer},
    RsaPrivateKey,
};
use sha2::{Digest, Sha256};

/// Headers signed on every request.
const BASE_HEADERS: [&str; 3] = ["date", "(request-target)", "host"];
/// Extra headers signed when a POST carries a body.
const BODY_HEADERS: [&str; 3] = ["content-length", "content-type", "x-content-sha256"];

/// Body metadata that takes part in the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHeaders {
    pub length: usize,
    pub content_type: String,
    pub sha256: String,
}

/// Headers to attach to a signed request.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    pub date: String,
    pub host: String,
    pub content: Option<ContentHeaders>,
    pub authorization: String,
}

pub struct RequestSigner {
    key_id: String,
    signing_key: SigningKey<Sha256>,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    /// Build a signer from `tenancy/user/fingerprint` and a PEM key.
    ///
    /// Accepts unencrypted PKCS#8 (`BEGIN PRIVATE KEY`) and PKCS#1
    /// (`BEGIN RSA PRIVATE KEY`) keys.
    pub fn from_pem(key_id: impl Into<String>, pem: &str) -> PosterResult<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| {
                PosterError::Storage(format!("Failed to parse OCI API signing key: {}", e))
            })?;

        Ok(Self {
            key_id: key_id.into(),
            signing_key: SigningKey::<Sha256>::new(private_key),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Sign a request made now.
    pub fn sign(
        &self,
        method: &Method,
        url: &Url,
        body: Option<(&[u8], &str)>,
    ) -> PosterResult<SignedHeaders> {
        self.sign_at(Utc::now(), method, url, body)
    }

    pub fn sign_at(
        &self,
        now: DateTime<Utc>,
        method: &Method,
        url: &Url,
        body: Option<(&[u8], &str)>,
    ) -> PosterResult<SignedHeaders> {
        let date = now.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let host = host_header(url)?;

        // PutObject bodies are streamed and excluded from the signature.
        let content = body
            .filter(|_| *method == Method::POST)
            .map(|(bytes, content_type)| ContentHeaders {
                length: bytes.len(),
                content_type: content_type.to_string(),
                sha256: STANDARD.encode(Sha256::digest(bytes)),
            });

        let signing_string = signing_string(method, url, &date, &host, content.as_ref());
        let signature = self.signing_key.sign(signing_string.as_bytes());

        let mut header_names: Vec<&str> = BASE_HEADERS.to_vec();
        if content.is_some() {
            header_names.extend(BODY_HEADERS);
        }

        let authorization = format!(
            "Signature version=\"1\",keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{}\",signature=\"{}\"",
            self.key_id,
            header_names.join(" "),
            STANDARD.encode(signature.to_bytes()),
        );

        Ok(SignedHeaders {
            date,
            host,
            content,
            authorization,
        })
    }
}

/// The newline separated `name: value` list the signature covers.
pub fn signing_string(
    method: &Method,
    url: &Url,
    date: &str,
    host: &str,
    content: Option<&ContentHeaders>,
) -> String {
    let mut lines = vec![
        format!("date: {}", date),
        format!(
            "(request-target): {} {}",
            method.as_str().to_lowercase(),
            request_target(url)
        ),
        format!("host: {}", host),
    ];

    if let Some(content) = content {
        lines.push(format!("content-length: {}", content.length));
        lines.push(format!("content-type: {}", content.content_type));
        lines.push(format!("x-content-sha256: {}", content.sha256));
    }

    lines.join("\n")
}

fn request_target(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

fn host_header(url: &Url) -> PosterResult<String> {
    let host = url
        .host_str()
        .ok_or_else(|| PosterError::Storage(format!("URL has no host: {}", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::{
        pkcs1v15::{Signature, VerifyingKey},
        signature::Verifier,
        RsaPublicKey,
    };

    const TEST_KEY: &str = include_str!("../../tests/fixtures/oci_test_key.pem");
    const TEST_KEY_PKCS1: &str = include_str!("../../tests/fixtures/oci_test_key_pkcs1.pem");

    fn extract(authorization: &str, field: &str) -> String {
        let marker = format!("{}=\"", field);
        let start = authorization.find(&marker).unwrap() + marker.len();
        let end = authorization[start..].find('"').unwrap() + start;
        authorization[start..end].to_string()
    }

    #[test]
    fn test_parses_both_key_formats() {
        assert!(RequestSigner::from_pem("t/u/f", TEST_KEY).is_ok());
        assert!(RequestSigner::from_pem("t/u/f", TEST_KEY_PKCS1).is_ok());
        let err = RequestSigner::from_pem("t/u/f", "not a key").unwrap_err();
        assert!(matches!(err, PosterError::Storage(_)));
    }

    #[test]
    fn test_get_signature_verifies() {
        let signer = RequestSigner::from_pem("tenancy/user/aa:bb", TEST_KEY).unwrap();
        let url = Url::parse(
            "https://objectstorage.us-ashburn-1.oraclecloud.com/n/ns/b/quotes/o?fields=name",
        )
        .unwrap();
        let now = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let headers = signer.sign_at(now, &Method::GET, &url, None).unwrap();

        assert_eq!(headers.date, "Wed, 01 May 2024 12:00:00 GMT");
        assert_eq!(headers.host, "objectstorage.us-ashburn-1.oraclecloud.com");
        assert!(headers.content.is_none());
        assert_eq!(extract(&headers.authorization, "keyId"), "tenancy/user/aa:bb");
        assert_eq!(
            extract(&headers.authorization, "headers"),
            "date (request-target) host"
        );

        let expected = signing_string(&Method::GET, &url, &headers.date, &headers.host, None);
        assert!(expected.contains("(request-target): get /n/ns/b/quotes/o?fields=name"));

        let private_key = RsaPrivateKey::from_pkcs8_pem(TEST_KEY).unwrap();
        let verifying_key = VerifyingKey::<Sha256>::new(RsaPublicKey::from(&private_key));
        let raw = STANDARD
            .decode(extract(&headers.authorization, "signature"))
            .unwrap();
        let signature = Signature::try_from(raw.as_slice()).unwrap();
        verifying_key
            .verify(expected.as_bytes(), &signature)
            .unwrap();
    }

    #[test]
    fn test_post_signs_body_headers() {
        let signer = RequestSigner::from_pem("t/u/f", TEST_KEY).unwrap();
        let url = Url::parse("http://127.0.0.1:8080/n/ns/b/quotes/p/").unwrap();
        let body = br#"{"name":"x"}"#;

        let headers = signer
            .sign(&Method::POST, &url, Some((body, "application/json")))
            .unwrap();

        assert_eq!(headers.host, "127.0.0.1:8080");
        let content = headers.content.unwrap();
        assert_eq!(content.length, body.len());
        assert_eq!(content.sha256, STANDARD.encode(Sha256::digest(body)));
        assert_eq!(
            extract(&headers.authorization, "headers"),
            "date (request-target) host content-length content-type x-content-sha256"
        );
    }

    #[test]
    fn test_put_excludes_body() {
        let signer = RequestSigner::from_pem("t/u/f", TEST_KEY).unwrap();
        let url = Url::parse("https://example.com/n/ns/b/quotes/o/a.png").unwrap();
        let headers = signer
            .sign(&Method::PUT, &url, Some((b"png", "image/png")))
            .unwrap();
        assert!(headers.content.is_none());
    }
}
