//! Login, logout and role-based routing.

use std::fmt;
use std::str::FromStr;
use tracing::{error, info, warn};

use crate::api::models::TokenResponse;
use crate::api::ApiClient;
use crate::error::LoginError;
use crate::session::{SessionKey, SessionStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Customer,
    Manufacturer,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Customer => "customer",
            Role::Manufacturer => "manufacturer",
            Role::Other(name) => name,
        }
    }
}

impl FromStr for Role {
    type Err = LoginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(LoginError::MissingRole),
            "customer" => Ok(Role::Customer),
            "manufacturer" => Ok(Role::Manufacturer),
            other => Ok(Role::Other(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a role lands after logging in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub role: Role,
    pub path: String,
}

impl Route {
    pub fn for_role(role: Role) -> Self {
        let path = match &role {
            Role::Customer => "/customerpage/dashboard".to_string(),
            Role::Manufacturer => "/manufacturer/".to_string(),
            Role::Other(name) => format!("/{}/dashboard", name),
        };
        Self { role, path }
    }

    /// Route of an already stored session, if it has an access token and a role.
    pub fn resume(session: &dyn SessionStore) -> Option<Self> {
        session.get(SessionKey::AccessToken)?;
        let role = session.get(SessionKey::Role)?.parse().ok()?;
        Some(Self::for_role(role))
    }
}

/// Exchanges credentials for a token pair, stores it with the chosen role and
/// returns the role's landing route.
pub async fn login(
    client: &ApiClient,
    username: &str,
    password: &str,
    role: &str,
) -> Result<Route, LoginError> {
    let role: Role = role.parse()?;

    let response = client
        .obtain_token_pair(username, password)
        .await
        .map_err(|err| {
            error!("login request failed: {}", err);
            LoginError::Server
        })?;
    info!("login response status: {}", response.status);

    let body: TokenResponse = response.json().map_err(|err| {
        error!("login response was not JSON: {}", err);
        LoginError::Server
    })?;

    if !response.is_success() {
        warn!("login rejected: {:?}", body.detail);
        return Err(LoginError::Rejected(
            body.detail
                .unwrap_or_else(|| "Invalid username or password".to_string()),
        ));
    }

    let Some(access) = body.access else {
        error!("unexpected login response format");
        return Err(LoginError::Unexpected);
    };

    let session = client.session();
    session.set(SessionKey::AccessToken, &access);
    match body.refresh.as_deref() {
        Some(refresh) => session.set(SessionKey::RefreshToken, refresh),
        None => session.clear(SessionKey::RefreshToken),
    }
    session.set(SessionKey::Role, role.as_str());

    let route = Route::for_role(role);
    info!("login successful, redirecting to {}", route.path);
    Ok(route)
}

/// Revokes the refresh token server-side (best effort) and forgets the session.
pub async fn logout(client: &ApiClient) {
    let session = client.session();
    if let Some(refresh) = session.get(SessionKey::RefreshToken) {
        match client.revoke_refresh_token(&refresh).await {
            Ok(response) if response.is_success() => info!("refresh token revoked"),
            Ok(response) => warn!("logout returned {}", response.status),
            Err(err) => warn!("logout request failed: {}", err),
        }
    }
    session.clear_all();
}
