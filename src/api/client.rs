use reqwest::{
    blocking::{Client, RequestBuilder},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use url::Url;

use crate::{config::ClientConfig, digest::ContentDigest, errors::RequestFailure};

use super::errors::{Cause, VBaseApiError};
use super::models::{
    AccountSettings, Collection, CollectionList, CreateCollectionRequest, CreateStampRequest,
    Error, StampOutcome, StampRecord, VerificationResult, VerifyStampRequest,
};
use super::types::{CollectionId, StampMetadata};

/// Blocking client for the stamping service.
///
/// Holds only its immutable configuration and a connection pool, so it can be
/// cloned or shared between threads freely.
#[derive(Clone, Debug)]
pub struct VBaseApiClient {
    config: ClientConfig,
    client: Client,
}

impl VBaseApiClient {
    /// # Errors
    ///
    /// Fails if the configured base URL cannot be a base, we rely on that
    /// invariant in the `*_url` methods, or if the HTTP client can't be
    /// built.
    pub fn new(config: ClientConfig) -> Result<Self, VBaseApiError> {
        if config.base_url().cannot_be_a_base() {
            return Err(VBaseApiError::Validation(Cause::CannotBeBase(
                config.base_url().clone(),
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent())
            .build()
            .map_err(|e| VBaseApiError::Validation(Cause::Transport(e)))?;

        Ok(Self { config, client })
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, VBaseApiError> {
        let mut url = self.config.base_url().clone();
        let url_clone = url.clone();
        url.path_segments_mut()
            .map_err(|_| VBaseApiError::Validation(Cause::CannotBeBase(url_clone)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// # Errors
    ///
    /// Will return `Err` if the URL cannot be a base.
    pub fn collections_url(&self) -> Result<Url, VBaseApiError> {
        self.endpoint(&["collections"])
    }

    /// # Errors
    ///
    /// Will return `Err` if the URL cannot be a base.
    pub fn collection_url(&self, collection_id: &CollectionId) -> Result<Url, VBaseApiError> {
        self.endpoint(&["collections", collection_id.as_ref()])
    }

    /// # Errors
    ///
    /// Will return `Err` if the URL cannot be a base.
    pub fn stamps_url(&self) -> Result<Url, VBaseApiError> {
        self.endpoint(&["stamps"])
    }

    /// # Errors
    ///
    /// Will return `Err` if the URL cannot be a base.
    pub fn verify_url(&self) -> Result<Url, VBaseApiError> {
        self.endpoint(&["verify"])
    }

    /// # Errors
    ///
    /// Will return `Err` if the URL cannot be a base.
    pub fn account_settings_url(&self) -> Result<Url, VBaseApiError> {
        self.endpoint(&["account", "settings"])
    }

    fn request(&self, method: Method, url: &Url) -> Result<RequestBuilder, VBaseApiError> {
        let api_key = self.config.api_key();
        if api_key.trim().is_empty() {
            return Err(VBaseApiError::Authentication(Cause::MissingApiKey));
        }

        Ok(self
            .client
            .request(method, url.clone())
            .bearer_auth(api_key)
            .timeout(self.config.timeout()))
    }

    /// Sends the request and returns the status with the raw body of a
    /// successful response.
    fn send(
        &self,
        method: &Method,
        url: &Url,
        request: RequestBuilder,
    ) -> Result<(StatusCode, String), VBaseApiError> {
        let response = request.send().map_err(|e| {
            log::warn!("{method} {url} failed: {e}");
            VBaseApiError::transport(e)
        })?;

        let status = response.status();
        let body = response.text().map_err(VBaseApiError::transport)?;
        log::debug!("{method} {url} returned {status}: {body}");

        if status.is_success() {
            return Ok((status, body));
        }

        let msg = serde_json::from_str::<Error>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        Err(VBaseApiError::from(RequestFailure::new(
            method.clone(),
            url.clone(),
            status,
            msg,
        )))
    }

    fn decode<T: DeserializeOwned>(url: &Url, body: &str) -> Result<T, VBaseApiError> {
        serde_json::from_str(body).map_err(|e| {
            log::error!("Failed to parse JSON response from {url}: {e}");
            log::error!("Response text: {body}");
            VBaseApiError::decode(url.clone(), e)
        })
    }

    fn get<T: DeserializeOwned>(&self, url: &Url) -> Result<T, VBaseApiError> {
        let request = self.request(Method::GET, url)?;
        let (_, body) = self.send(&Method::GET, url, request)?;
        Self::decode(url, &body)
    }

    /// # Errors
    ///
    /// Returns `Err` if the name is empty, the credentials are rejected, or
    /// on network failure.
    pub fn create_collection(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Collection, VBaseApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VBaseApiError::Validation(Cause::Input(
                "collection name is empty".to_owned(),
            )));
        }

        let url = self.collections_url()?;
        let request = self
            .request(Method::POST, &url)?
            .json(&CreateCollectionRequest { name, description });
        let (_, body) = self.send(&Method::POST, &url, request)?;
        let collection: Collection = Self::decode(&url, &body)?;

        log::info!("Created collection {} ({})", collection.id(), collection.name());
        Ok(collection)
    }

    /// # Errors
    ///
    /// Returns `Err` if the id is malformed, the collection doesn't exist or
    /// isn't owned by the caller, or on network failure.
    pub fn get_collection(
        &self,
        collection_id: impl AsRef<str>,
    ) -> Result<Collection, VBaseApiError> {
        let collection_id = CollectionId::new(collection_id.as_ref())?;
        self.get(&self.collection_url(&collection_id)?)
    }

    /// # Errors
    ///
    /// Returns `Err` if the credentials are rejected or on network failure.
    pub fn list_collections(&self) -> Result<Vec<Collection>, VBaseApiError> {
        let list: CollectionList = self.get(&self.collections_url()?)?;
        Ok(list.collections)
    }

    /// Stamps `content_digest` into a collection. Submitting the same pair
    /// again doesn't create a second stamp: the original one comes back as
    /// [`StampOutcome::Idempotent`], which makes this safe to retry.
    ///
    /// Both arguments are validated before anything is sent.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed collection id or digest
    /// - `Authentication` for missing, invalid or expired credentials
    /// - `NotFound` if the collection doesn't exist or isn't the caller's
    /// - `ServiceUnavailable` on transport failures, timeouts and server errors
    pub fn create_stamp(
        &self,
        collection_id: impl AsRef<str>,
        content_digest: impl AsRef<str>,
        metadata: Option<&StampMetadata>,
    ) -> Result<StampOutcome, VBaseApiError> {
        let collection_id = CollectionId::new(collection_id.as_ref())?;
        let content_digest = ContentDigest::new(content_digest.as_ref())?;

        let url = self.stamps_url()?;
        let request = self.request(Method::POST, &url)?.json(&CreateStampRequest {
            collection_id: &collection_id,
            content_digest: &content_digest,
            metadata,
        });
        let (status, body) = self.send(&Method::POST, &url, request)?;
        let record: StampRecord = Self::decode(&url, &body)?;
        let outcome = record.into_outcome(status);

        let receipt = outcome.receipt();
        if outcome.is_idempotent() {
            log::info!(
                "Digest {} already stamped in {} as {}",
                receipt.content_digest(),
                receipt.collection_id(),
                receipt.stamp_id()
            );
        } else {
            log::info!(
                "Stamped {} in {} as {}",
                receipt.content_digest(),
                receipt.collection_id(),
                receipt.stamp_id()
            );
        }

        Ok(outcome)
    }

    /// Hashes `content` with SHA-256 and stamps the digest.
    ///
    /// # Errors
    ///
    /// Same as [`VBaseApiClient::create_stamp`].
    pub fn stamp_content(
        &self,
        collection_id: impl AsRef<str>,
        content: impl AsRef<[u8]>,
        metadata: Option<&StampMetadata>,
    ) -> Result<StampOutcome, VBaseApiError> {
        self.create_stamp(collection_id, ContentDigest::of(content), metadata)
    }

    /// [`VBaseApiClient::create_stamp`] under the configured retry policy.
    /// Only `ServiceUnavailable` failures are retried.
    ///
    /// # Errors
    ///
    /// The last failure once retries are exhausted, or the first
    /// non-retryable one.
    pub fn create_stamp_with_retry(
        &self,
        collection_id: impl AsRef<str>,
        content_digest: impl AsRef<str>,
        metadata: Option<&StampMetadata>,
    ) -> Result<StampOutcome, VBaseApiError> {
        let collection_id = collection_id.as_ref();
        let content_digest = content_digest.as_ref();

        self.config
            .retry()
            .run(|| self.create_stamp(collection_id, content_digest, metadata))
    }

    /// Checks whether `content_digest` is stamped in the collection. Read
    /// only.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`VBaseApiClient::create_stamp`].
    pub fn verify_stamp(
        &self,
        collection_id: impl AsRef<str>,
        content_digest: impl AsRef<str>,
    ) -> Result<VerificationResult, VBaseApiError> {
        let collection_id = CollectionId::new(collection_id.as_ref())?;
        let content_digest = ContentDigest::new(content_digest.as_ref())?;

        let url = self.verify_url()?;
        let request = self.request(Method::POST, &url)?.json(&VerifyStampRequest {
            collection_id: &collection_id,
            content_digest: &content_digest,
        });
        let (_, body) = self.send(&Method::POST, &url, request)?;
        let result: VerificationResult = Self::decode(&url, &body)?;

        if let Some(reason) = result.reason().filter(|_| !result.is_verified()) {
            log::debug!("Digest {content_digest} not verified in {collection_id}: {reason}");
        }

        Ok(result)
    }

    /// # Errors
    ///
    /// `Authentication` on invalid credentials, `ServiceUnavailable` on
    /// network failure.
    pub fn get_account_settings(&self) -> Result<AccountSettings, VBaseApiError> {
        self.get(&self.account_settings_url()?)
    }
}
