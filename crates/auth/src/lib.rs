//! Auth client for the clinic booking backend
//!
//! Talks to the GoTrue endpoints of a Supabase project: registration with
//! profile metadata, password sign in, session lookup and restore, current
//! user, token refresh and sign out.

use jsonwebtoken::{decode, DecodingKey, Validation};
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// エラー型
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing session")]
    MissingSession,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

impl AuthError {
    /// Message suitable for showing to the person at the keyboard.
    ///
    /// GoTrue reports failures in a few different JSON shapes; this picks the
    /// most descriptive field out of whichever one came back.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::ApiError(body) => extract_api_message(body),
            other => other.to_string(),
        }
    }
}

fn extract_api_message(body: &str) -> String {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return body.to_string(),
    };
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| parsed.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

/// ユーザー情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub app_metadata: Value,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl User {
    /// Reads a string field out of `user_metadata`.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata.get(key).and_then(Value::as_str)
    }
}

/// セッション情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    /// Unix timestamp (seconds). GoTrue sends it; older servers do not.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub token_type: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(default)]
    exp: Option<i64>,
}

impl Session {
    /// Expiry of the access token, from `expires_at` or else the token's own
    /// `exp` claim.
    pub fn expiry(&self) -> Option<i64> {
        self.expires_at
            .or_else(|| access_token_expiry(&self.access_token).ok().flatten())
    }

    /// True once the access token is past its expiry. Sessions whose expiry
    /// cannot be determined are treated as live; the server will reject them
    /// if they are not.
    pub fn is_expired(&self) -> bool {
        match self.expiry() {
            Some(exp) => now_secs() >= exp,
            None => false,
        }
    }
}

/// Reads the `exp` claim of a JWT without checking its signature. The
/// signing secret belongs to the backend; the client only needs the expiry.
pub fn access_token_expiry(token: &str) -> Result<Option<i64>, AuthError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims.exp)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// クライアントオプション
#[derive(Debug, Clone)]
pub struct AuthOptions {
    /// Refresh an expired session in `get_session_or_refresh` instead of
    /// dropping it.
    pub auto_refresh_token: bool,
    /// Keep the session returned by sign in / sign up inside the client.
    pub persist_session: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            auto_refresh_token: true,
            persist_session: true,
        }
    }
}

/// Auth クライアント
pub struct Auth {
    url: String,
    key: String,
    http_client: Client,
    options: AuthOptions,
    current_session: Arc<RwLock<Option<Session>>>,
}

impl Auth {
    /// 新しい Auth クライアントを作成
    pub fn new(url: &str, key: &str, http_client: Client, options: AuthOptions) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            http_client,
            options,
            current_session: Arc::new(RwLock::new(None)),
        }
    }

    fn read_session(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.current_session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_session(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.current_session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store_session(&self, session: &Session) {
        if self.options.persist_session {
            *self.write_session() = Some(session.clone());
        }
    }

    async fn post_json(&self, endpoint: &str, payload: &Value) -> Result<Value, AuthError> {
        let response = self
            .http_client
            .post(endpoint)
            .header("apikey", &self.key)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        Ok(response.json::<Value>().await?)
    }

    /// ユーザー登録
    ///
    /// `user_metadata` is stored by GoTrue on the new user (`options.data`).
    /// When email confirmation is disabled the server also returns a session,
    /// which is kept like one from sign in.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        user_metadata: Option<Value>,
    ) -> Result<User, AuthError> {
        let url = format!("{}/auth/v1/signup", self.url);

        let mut payload = serde_json::json!({
            "email": email,
            "password": password,
        });
        if let Some(metadata) = user_metadata {
            payload["data"] = metadata;
        }

        let body = self.post_json(&url, &payload).await?;

        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)?;
            self.store_session(&session);
            debug!("sign up returned a session for {}", session.user.id);
            return Ok(session.user);
        }

        let user: User = match body.get("user") {
            Some(user) if !user.is_null() => serde_json::from_value(user.clone())?,
            _ => serde_json::from_value(body)?,
        };
        Ok(user)
    }

    /// メール・パスワードでログイン
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.url);

        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });

        let body = self.post_json(&url, &payload).await?;
        let session: Session = serde_json::from_value(body)?;
        self.store_session(&session);

        Ok(session)
    }

    /// 現在のセッションを取得
    ///
    /// Returns the stored session as-is, expired or not.
    pub fn get_session(&self) -> Option<Session> {
        self.read_session().clone()
    }

    /// Current session if it is still valid. An expired session is refreshed
    /// when `auto_refresh_token` is set, and dropped otherwise.
    pub async fn get_session_or_refresh(&self) -> Result<Option<Session>, AuthError> {
        let session = match self.get_session() {
            Some(session) => session,
            None => return Ok(None),
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }
        if self.options.auto_refresh_token {
            debug!("access token expired, refreshing");
            return self.refresh_session().await.map(Some);
        }
        warn!("dropping expired session for {}", session.user.id);
        *self.write_session() = None;
        Ok(None)
    }

    /// Installs a previously obtained session, e.g. one read back from disk.
    pub fn set_session(&self, session: Session) {
        *self.write_session() = Some(session);
    }

    /// 現在のユーザーを取得
    pub async fn get_user(&self) -> Result<User, AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/user", self.url);

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        let user: User = response.json().await?;

        Ok(user)
    }

    /// セッションをリフレッシュ
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.url);

        let payload = serde_json::json!({
            "refresh_token": session.refresh_token,
        });

        let body = self.post_json(&url, &payload).await?;
        let new_session: Session = serde_json::from_value(body)?;
        self.store_session(&new_session);

        Ok(new_session)
    }

    /// サインアウト
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/logout", self.url);

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await?;

        let status = response.status();
        // 401/403/404: the token is already dead server side, so there is
        // nothing left to revoke and the local session goes too.
        if matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            warn!("logout rejected with {}, dropping local session", status);
            *self.write_session() = None;
            return Ok(());
        }

        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        // セッションをクリア
        *self.write_session() = None;

        Ok(())
    }
}
