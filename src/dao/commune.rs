use std::time::Duration;

use serde::Deserialize;
use tracing::{Instrument, instrument};

use crate::model::apperror::{ApplicationError, ErrorType};

/**
 * Maps a municipality code to the name displayed in reports.
 */
pub trait CommuneResolver {
    /**
     * Resolves the display name of a municipality.
     *
     * # Arguments
     * `municipality_code`: The municipality code.
     *
     * # Returns
     * The name, or a `ResolverUnavailable` error when the lookup fails or finds nothing.
     */
    fn resolve(&self, municipality_code: &str) -> impl Future<Output = Result<String, ApplicationError>> + Send;
}

/**
 * Element of the geo API commune search response. Only the name is read.
 */
#[derive(Debug, Deserialize)]
struct CommuneDto {
    nom: String,
}

/**
 * Resolver backed by the public geo API (`/communes?code=`).
 */
#[derive(Debug, Clone)]
pub struct GeoApiResolver {
    client: reqwest::Client,
    url: String,
}

impl GeoApiResolver {
    /**
     * Creates a new instance of `GeoApiResolver`.
     *
     * # Arguments
     * `url`: The commune search endpoint, e.g. `https://geo.api.gouv.fr/communes`.
     * `timeout_millis`: Timeout of a whole lookup.
     *
     * # Returns
     * A Result containing the resolver or an `Initialization` error when the HTTP client cannot be built.
     */
    pub fn new(url: String, timeout_millis: u64) -> Result<Self, ApplicationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_millis))
            .build()
            .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create commune lookup client: {err}")))?;
        Ok(GeoApiResolver { client, url })
    }
}

impl CommuneResolver for GeoApiResolver {
    #[instrument(skip(self))]
    async fn resolve(&self, municipality_code: &str) -> Result<String, ApplicationError> {
        let span = tracing::Span::current();
        let response = self
            .client
            .get(&self.url)
            .query(&[("code", municipality_code)])
            .send()
            .instrument(span.clone())
            .await
            .map_err(|err| ApplicationError::new(ErrorType::ResolverUnavailable, format!("Commune lookup failed: {err}")))?;
        if !response.status().is_success() {
            return Err(ApplicationError::new(ErrorType::ResolverUnavailable, format!("Commune lookup returned status {}", response.status())));
        }
        let communes: Vec<CommuneDto> = response
            .json()
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::ResolverUnavailable, format!("Failed to read commune lookup response: {err}")))?;
        communes
            .into_iter()
            .next()
            .map(|commune| commune.nom)
            .ok_or_else(|| ApplicationError::new(ErrorType::ResolverUnavailable, format!("No commune found for code {municipality_code}")))
    }
}

/**
 * Resolver selected by configuration.
 */
#[derive(Debug, Clone)]
pub enum ConfiguredResolver {
    GeoApi(GeoApiResolver),
    /**
     * Lookups are switched off, every code resolves to the unknown placeholder.
     */
    Disabled,
}

impl CommuneResolver for ConfiguredResolver {
    async fn resolve(&self, municipality_code: &str) -> Result<String, ApplicationError> {
        match self {
            ConfiguredResolver::GeoApi(resolver) => resolver.resolve(municipality_code).await,
            ConfiguredResolver::Disabled => Err(ApplicationError::new(ErrorType::ResolverUnavailable, "Commune lookup disabled".to_string())),
        }
    }
}
