use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::models::{
    project_categories, project_stock, CategoryItem, LoginRequest, RefreshResponse, StockItem,
};
use super::transport::{HttpRequest, HttpResponse, Transport};
use crate::error::ApiError;
use crate::session::{SessionKey, SessionStore};

/// HTTP client for the ERP backend. Authenticated calls read the bearer token
/// from the session store and retry once after a token refresh on 401.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Arc<dyn SessionStore>,
    base_url: String,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            transport,
            session,
            base_url,
        }
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// Absolute URL of a backend API path such as `stock/`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends `request` with the stored access token. A 401 triggers one refresh
    /// and, if that produced a token, exactly one resend. Otherwise the
    /// original response is returned untouched.
    pub async fn fetch_with_auth(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let access_token = self.session.get(SessionKey::AccessToken);
        let response = self
            .transport
            .send(request.with_bearer(access_token.as_deref()))
            .await?;

        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("Access token expired, attempting to refresh...");
        match self.refresh_access_token().await {
            Some(new_token) => {
                self.transport
                    .send(request.with_bearer(Some(&new_token)))
                    .await
            }
            None => Ok(response),
        }
    }

    /// Exchanges the stored refresh token for a new access token.
    ///
    /// Returns `None` when no refresh token is stored, when the request fails,
    /// or when the backend rejects it; a rejection also clears both tokens.
    pub async fn refresh_access_token(&self) -> Option<String> {
        let Some(refresh_token) = self.session.get(SessionKey::RefreshToken) else {
            // A stale access token without a refresh token is useless.
            self.session.clear_tokens();
            return None;
        };

        let request = HttpRequest::post_json(
            self.endpoint("token/refresh/"),
            json!({ "refresh": refresh_token }),
        )
        .header("Content-Type", "application/json");

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(err) => {
                error!("Error refreshing token: {}", err);
                return None;
            }
        };

        if !response.is_success() {
            error!("Failed to refresh token ({})", response.status);
            self.session.clear_tokens();
            return None;
        }

        match response.json::<RefreshResponse>() {
            Ok(RefreshResponse {
                access: Some(access),
            }) => {
                debug!("access token refreshed");
                self.session.set(SessionKey::AccessToken, &access);
                Some(access)
            }
            Ok(_) => None,
            Err(err) => {
                error!("Error refreshing token: {}", err);
                None
            }
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let response = self
            .fetch_with_auth(HttpRequest::get(self.endpoint(path)))
            .await?;
        if !response.is_success() {
            return Err(ApiError::Status(response.status));
        }
        response.json()
    }

    pub async fn get_stock(&self) -> Result<Vec<StockItem>, ApiError> {
        let body = self.get_json("stock/").await?;
        debug!("Fetched stock data: {}", body);
        Ok(project_stock(&body))
    }

    pub async fn get_category_stock(&self) -> Result<Vec<CategoryItem>, ApiError> {
        let body = self.get_json("category-stock/").await?;
        debug!("Fetched category data: {}", body);
        Ok(project_categories(&body))
    }

    /// Raw login call; interpretation lives in [`crate::auth::login`].
    pub async fn obtain_token_pair(
        &self,
        username: &str,
        password: &str,
    ) -> Result<HttpResponse, ApiError> {
        let body = serde_json::to_value(LoginRequest { username, password })?;
        let request = HttpRequest::post_json(self.endpoint("token/"), body)
            .header("Content-Type", "application/json");
        self.transport.send(request).await
    }

    /// Asks the backend to blacklist `refresh_token`.
    pub async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<HttpResponse, ApiError> {
        let request = HttpRequest::post_json(
            self.endpoint("logout/"),
            json!({ "refresh": refresh_token }),
        )
        .header("Content-Type", "application/json");
        self.fetch_with_auth(request).await
    }

    /// Hands one scanned QR payload to the backend for stock intake.
    pub async fn store_qr(&self, qr_text: &str) -> Result<HttpResponse, ApiError> {
        let request = HttpRequest::post_json(self.endpoint("store_qr/"), json!({ "qr_text": qr_text }))
            .header("Content-Type", "application/json");
        self.transport.send(request).await
    }
}
