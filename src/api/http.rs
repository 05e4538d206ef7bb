//! reqwest client for the backend API and the web app's registration route.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{IntoUrl, Method, RequestBuilder, Response, Url};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{MacroBackend, PlanBackend, ProfileStore, RegistrationApi};
use crate::error::ApiError;
use crate::identity::IdentityProvider;
use crate::model::{GenerateResponse, GenerationRequest, MealPlan, NutritionTargets, Profile};
use crate::nutrition::MacroInput;

/// Bearer-authenticated HTTP client for every collaborator endpoint.
pub struct HttpBackend {
    client: reqwest::Client,
    api_url: String,
    app_url: String,
    identity: Arc<dyn IdentityProvider>,
}

impl HttpBackend {
    /// `api_url` hosts `/profiles`, `/meal-plans`, `/macros`; `app_url` hosts
    /// `/api/complete-registration`.
    pub fn new(
        api_url: impl Into<String>,
        app_url: impl Into<String>,
        timeout: Duration,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Unavailable {
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            app_url: app_url.into().trim_end_matches('/').to_string(),
            identity,
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    /// `/meal-plans/{plan_id}` with the id escaped as one path segment.
    fn plan_url(&self, plan_id: &str) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.api_url).map_err(|e| ApiError::Unavailable {
            reason: format!("Invalid API URL {}: {e}", self.api_url),
        })?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Unavailable {
                reason: format!("API URL cannot take a path: {}", self.api_url),
            })?
            .pop_if_empty()
            .push("meal-plans")
            .push(plan_id);
        Ok(url)
    }

    async fn authed(&self, method: Method, url: impl IntoUrl) -> Result<RequestBuilder, ApiError> {
        let token = self.identity.access_token().await?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token.expose_secret()))
    }

    async fn send(&self, request: RequestBuilder, resource: &str) -> Result<Response, ApiError> {
        let resp = request.send().await?;
        let status = resp.status();
        debug!(resource, status = status.as_u16(), "Backend response");
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::from_status(status.as_u16(), resource, body))
    }

    async fn json<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Turn a 404 into `Ok(None)`.
fn not_found_as_none<T>(result: Result<T, ApiError>) -> Result<Option<T>, ApiError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl ProfileStore for HttpBackend {
    async fn get_profile(&self) -> Result<Option<Profile>, ApiError> {
        let req = self.authed(Method::GET, self.api("/profiles")).await?;
        let resp = not_found_as_none(self.send(req, "profile").await)?;
        match resp {
            Some(resp) => Ok(Some(Self::json(resp).await?)),
            None => Ok(None),
        }
    }

    async fn create_profile(&self, profile: &Profile) -> Result<Profile, ApiError> {
        let req = self.authed(Method::POST, self.api("/profiles")).await?;
        let resp = self.send(req.json(profile), "profile").await?;
        Self::json(resp).await
    }

    async fn update_profile(&self, profile: &Profile) -> Result<Profile, ApiError> {
        let req = self.authed(Method::PUT, self.api("/profiles")).await?;
        let resp = self.send(req.json(profile), "profile").await?;
        Self::json(resp).await
    }

    async fn delete_profile(&self) -> Result<(), ApiError> {
        let req = self.authed(Method::DELETE, self.api("/profiles")).await?;
        self.send(req, "profile").await?;
        Ok(())
    }
}

#[async_trait]
impl PlanBackend for HttpBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerateResponse, ApiError> {
        let req = self
            .authed(Method::POST, self.api("/meal-plans/generate"))
            .await?;
        let resp = self.send(req.json(request), "meal plan").await?;
        Self::json(resp).await
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Option<MealPlan>, ApiError> {
        let req = self
            .authed(Method::GET, self.plan_url(plan_id)?)
            .await?;
        match not_found_as_none(self.send(req, "meal plan").await)? {
            Some(resp) => Ok(Some(Self::json(resp).await?)),
            None => Ok(None),
        }
    }

    async fn delete_plan(&self, plan_id: &str) -> Result<(), ApiError> {
        let req = self
            .authed(Method::DELETE, self.plan_url(plan_id)?)
            .await?;
        self.send(req, "meal plan").await?;
        Ok(())
    }
}

#[async_trait]
impl RegistrationApi for HttpBackend {
    async fn complete_registration(&self) -> Result<(), ApiError> {
        let url = format!("{}/api/complete-registration", self.app_url);
        let req = self.authed(Method::POST, url).await?;
        self.send(req, "registration").await?;
        Ok(())
    }
}

#[async_trait]
impl MacroBackend for HttpBackend {
    async fn compute_macros(&self, input: &MacroInput) -> Result<NutritionTargets, ApiError> {
        let req = self.authed(Method::POST, self.api("/macros/compute")).await?;
        let resp = self.send(req.json(input), "macros").await?;
        Self::json(resp).await
    }
}
