//! GoTrue-compatible identity backend
//!
//! Holds the current session in memory and keeps it in step with the auth
//! endpoints:
//! - password sign-in and refresh-token grants
//! - session validation against `/auth/v1/user`
//! - sign-out, broadcasting `SIGNED_OUT` before the request is sent
//!
//! Every local session change is broadcast to subscribers as an
//! [`AuthNotification`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use propdesk_core::{broadcast_subscription, AuthSubscription, IdentityBackend};
use propdesk_domain::{
    AuthChangeEvent, AuthNotification, BackendConfig, PropDeskError, Result, Session,
};
use reqwest::{Method, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, instrument, warn};

use super::{AccessTokenProvider, Endpoints};
use crate::errors::{status_error, InfraError};
use crate::http::HttpClient;

/// Refresh tokens this many seconds before they expire, capped at half the
/// token lifetime.
const REFRESH_THRESHOLD_SECONDS: i64 = 30;

/// A session younger than this is never refreshed early.
const MIN_SESSION_AGE_SECONDS: i64 = 5;

const NOTIFICATION_CAPACITY: usize = 32;

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Unix seconds
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> Session {
        // Relative lifetime first: the absolute timestamp is on the server's clock.
        let expires_at = self
            .expires_in
            .map(|secs| now + ChronoDuration::seconds(secs))
            .or_else(|| self.expires_at.and_then(|secs| Utc.timestamp_opt(secs, 0).single()));

        let mut session = Session::new(self.user.id, self.access_token)
            .with_validity(Some(now), expires_at);
        session.refresh_token = self.refresh_token;
        session.email = self.user.email;
        session
    }
}

/// REST identity backend
pub struct RestIdentityBackend {
    http: HttpClient,
    endpoints: Endpoints,
    current: Arc<RwLock<Option<Session>>>,
    notifications: broadcast::Sender<AuthNotification>,
}

impl RestIdentityBackend {
    /// Create a backend with no session.
    ///
    /// # Errors
    /// Returns `PropDeskError::Config` if the base URL or anon key is invalid
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Ok(Self {
            http: HttpClient::for_backend(config)?,
            endpoints: Endpoints::new(config)?,
            current: Arc::new(RwLock::new(None)),
            notifications,
        })
    }

    /// Seed a previously persisted session without notifying subscribers.
    ///
    /// Meant for startup, before the coordinator is mounted; bootstrap then
    /// validates it like any other session.
    pub async fn restore(&self, session: Session) {
        debug!(subject_id = %session.subject_id, "Restoring persisted session");
        *self.current.write().await = Some(session);
    }

    /// Current session without validation
    pub async fn current_session(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    /// Returns `PropDeskError::InvalidInput` for rejected credentials
    /// (`400`), `PropDeskError::Network` on transport failure
    #[instrument(skip(self, password))]
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let url = self.endpoints.join("auth/v1/token?grant_type=password")?;
        let request =
            self.http.request(Method::POST, url).json(&PasswordGrant { email, password });

        let session = self.exchange(request).await?;
        info!(subject_id = %session.subject_id, "Signed in with password");
        self.install(session.clone(), AuthChangeEvent::SignedIn).await;
        Ok(session)
    }

    /// Exchange the held refresh token for a new session.
    ///
    /// A rejected refresh token ends the session: it is dropped and
    /// `SIGNED_OUT` is broadcast.
    ///
    /// # Errors
    /// Returns `PropDeskError::Auth` without a refresh token or when the
    /// backend rejects it
    #[instrument(skip(self))]
    pub async fn refresh_session(&self) -> Result<Session> {
        let refresh_token = self
            .current
            .read()
            .await
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
            .ok_or_else(|| PropDeskError::Auth("no refresh token available".into()))?;

        let url = self.endpoints.join("auth/v1/token?grant_type=refresh_token")?;
        let request = self
            .http
            .request(Method::POST, url)
            .json(&RefreshGrant { refresh_token: &refresh_token });

        match self.exchange(request).await {
            Ok(session) => {
                debug!(subject_id = %session.subject_id, "Session refreshed");
                self.install(session.clone(), AuthChangeEvent::TokenRefreshed).await;
                Ok(session)
            }
            Err(err @ (PropDeskError::Auth(_) | PropDeskError::InvalidInput(_))) => {
                warn!(error = %err, "Refresh token rejected; ending session");
                self.drop_session().await;
                Err(PropDeskError::Auth(err.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    async fn exchange(&self, request: reqwest::RequestBuilder) -> Result<Session> {
        let response = ensure_success(self.http.send(request).await?).await?;
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| PropDeskError::from(InfraError::from(e)))?;
        Ok(body.into_session(Utc::now()))
    }

    async fn install(&self, session: Session, event: AuthChangeEvent) {
        *self.current.write().await = Some(session.clone());
        self.broadcast(AuthNotification::new(event, Some(session)));
    }

    /// Forget the local session, broadcasting `SIGNED_OUT` if there was one.
    async fn drop_session(&self) -> Option<Session> {
        let previous = self.current.write().await.take();
        if previous.is_some() {
            self.broadcast(AuthNotification::signed_out());
        }
        previous
    }

    fn broadcast(&self, notification: AuthNotification) {
        // No receivers is fine: nobody is mounted yet.
        let _ = self.notifications.send(notification);
    }

    async fn fresh_session(&self) -> Result<Option<Session>> {
        let Some(session) = self.current_session().await else {
            return Ok(None);
        };

        if !refresh_due(&session, Utc::now()) {
            return Ok(Some(session));
        }

        if session.refresh_token.is_none() {
            if session.is_expired() {
                debug!("Session expired without a refresh token");
                self.drop_session().await;
                return Ok(None);
            }
            return Ok(Some(session));
        }

        match self.refresh_session().await {
            Ok(session) => Ok(Some(session)),
            Err(PropDeskError::Auth(_)) => Ok(None),
            Err(err) if !session.is_expired() => {
                warn!(error = %err, "Early refresh failed; using current token");
                Ok(Some(session))
            }
            Err(err) => Err(err),
        }
    }
}

/// Whether `session` should be exchanged for a new one at `now`.
///
/// The window is `min(30s, lifetime / 2)` before expiry. A session issued
/// less than five seconds ago is only refreshed once expired, so a
/// short-lived token is exchanged at most once per half lifetime.
fn refresh_due(session: &Session, now: DateTime<Utc>) -> bool {
    let Some(expires_at) = session.expires_at else {
        return false;
    };
    let remaining = (expires_at - now).num_seconds();
    if remaining <= 0 {
        return true;
    }

    let Some(issued_at) = session.issued_at else {
        return remaining <= REFRESH_THRESHOLD_SECONDS;
    };
    if (now - issued_at).num_seconds() < MIN_SESSION_AGE_SECONDS {
        return false;
    }
    let lifetime = (expires_at - issued_at).num_seconds().max(0);
    remaining <= REFRESH_THRESHOLD_SECONDS.min(lifetime / 2)
}

#[async_trait]
impl IdentityBackend for RestIdentityBackend {
    /// Return the held session after confirming it with the backend.
    #[instrument(skip(self))]
    async fn get_session(&self) -> Result<Option<Session>> {
        let Some(session) = self.fresh_session().await? else {
            return Ok(None);
        };

        let url = self.endpoints.join("auth/v1/user")?;
        let request = self.http.request(Method::GET, url).bearer_auth(&session.access_token);
        let response = self.http.send(request).await?;

        match ensure_success(response).await {
            Ok(response) => {
                let user: UserResponse = response
                    .json()
                    .await
                    .map_err(|e| PropDeskError::from(InfraError::from(e)))?;
                if user.id != session.subject_id {
                    warn!(subject_id = %session.subject_id, "Backend reported a different user");
                    self.drop_session().await;
                    return Ok(None);
                }
                Ok(Some(session))
            }
            Err(PropDeskError::Auth(reason)) => {
                debug!(%reason, "Backend rejected the session");
                self.drop_session().await;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        broadcast_subscription(self.notifications.subscribe())
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.drop_session().await else {
            debug!("Sign-out without a session");
            return Ok(());
        };

        let url = self.endpoints.join("auth/v1/logout")?;
        let request = self.http.request(Method::POST, url).bearer_auth(&session.access_token);
        ensure_success(self.http.send(request).await?).await?;

        info!(subject_id = %session.subject_id, "Signed out");
        Ok(())
    }
}

#[async_trait]
impl AccessTokenProvider for RestIdentityBackend {
    async fn access_token(&self) -> Result<String> {
        self.fresh_session()
            .await?
            .map(|s| s.access_token)
            .ok_or_else(|| PropDeskError::Auth("not signed in".into()))
    }
}

impl std::fmt::Debug for RestIdentityBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestIdentityBackend")
            .field("endpoints", &self.endpoints)
            .field("subscribers", &self.notifications.receiver_count())
            .finish_non_exhaustive()
    }
}

/// Pass 2xx responses through; map anything else to a domain error.
pub(crate) async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.ok();
    Err(status_error(status, body.as_deref()))
}
