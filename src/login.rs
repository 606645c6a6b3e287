#![cfg(not(tarpaulin_include))]

use crate::config;
use crate::mailer::{Mailer, generate_reset_code};
use crate::team;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, create_dir_all};
use std::io::{Read, Write};
use std::sync::RwLock;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// A registered application user.
///
/// Contains authentication details, password reset state and notification
/// preferences.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    /// Username (unique identifier for the user)
    pub username: String,

    /// Email address (used for invitations and password recovery)
    pub email: String,

    /// Argon2 hash of the user's password
    pub password_hash: String,

    /// Password reset code (if a reset has been requested)
    pub reset_code: Option<String>,

    /// Expiration time for the reset code
    pub reset_code_expires: Option<SystemTime>,

    /// Whether the user wants an email after each CSV import
    #[serde(default)]
    pub receive_import_notifications: bool,
}

/// Credential data for login and registration.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCredentials {
    pub username: String,

    /// Email address (optional for login, required for registration)
    #[serde(default)]
    pub email: String,

    /// Password in plaintext (only transmitted, never stored)
    pub password: String,

    /// Invitation token; when present, signup also joins the inviting team
    #[serde(default)]
    pub token: Option<String>,
}

/// Password reset request: just the account email.
#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Password reset confirmation with the emailed code and the new password.
#[derive(Debug, Serialize, Deserialize)]
pub struct PasswordResetConfirm {
    pub email: String,
    pub reset_code: String,
    pub new_password: String,
}

/// An authenticated user session.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub expires_at: SystemTime,
}

/// One entry of a user's activity feed.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ActivityEntry {
    pub action: String,
    pub details: serde_json::Value,
    pub at: chrono::DateTime<chrono::Utc>,
}

lazy_static! {
    /// All active user sessions, keyed by session id.
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
}

const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds
const ACTIVITY_LIMIT: usize = 50;

fn users_file() -> std::path::PathBuf {
    config::data_dir().join("users.json")
}

/// Initialize the database structure.
///
/// Creates the data directory and users file if they don't exist. Called
/// once before the server starts handling requests.
pub fn init_database() -> std::io::Result<()> {
    let dir = config::data_dir();
    if !dir.exists() {
        create_dir_all(&dir)?;
    }

    let users_path = users_file();
    if !users_path.exists() {
        let mut file = File::create(users_path)?;
        file.write_all(b"{}")?;
    }

    Ok(())
}

/// Read the map of all registered users.
pub fn get_users() -> Result<HashMap<String, User>, String> {
    let mut file = match File::open(users_file()) {
        Ok(file) => file,
        Err(_) => return Err("Failed to open users file".to_string()),
    };

    let mut contents = String::new();
    if file.read_to_string(&mut contents).is_err() {
        return Err("Failed to read users file".to_string());
    }

    match serde_json::from_str(&contents) {
        Ok(users) => Ok(users),
        Err(_) => Err("Failed to parse users data".to_string()),
    }
}

/// Write the users map back to disk.
pub fn save_users(users: &HashMap<String, User>) -> Result<(), String> {
    let json = match serde_json::to_string_pretty(users) {
        Ok(json) => json,
        Err(_) => return Err("Failed to serialize users data".to_string()),
    };

    let mut file = match File::create(users_file()) {
        Ok(file) => file,
        Err(_) => return Err("Failed to create users file".to_string()),
    };

    if file.write_all(json.as_bytes()).is_err() {
        return Err("Failed to write users data".to_string());
    }

    Ok(())
}

pub fn find_user_by_email(email: &str) -> Result<Option<User>, String> {
    let users = get_users()?;
    Ok(users.values().find(|u| u.email == email).cloned())
}

/// Register a new user account. The password is hashed before storage.
///
/// # Errors
/// * Returns an error if any required field is empty
/// * Returns an error if the username or email is already in use
pub fn register_user(username: &str, email: &str, password: &str) -> Result<(), String> {
    if username.is_empty() || password.is_empty() || email.is_empty() {
        return Err("Username, email and password cannot be empty".to_string());
    }

    let mut users = get_users()?;
    if users.contains_key(username) {
        return Err("Username already exists".to_string());
    }

    if users.values().any(|user| user.email == email) {
        return Err("Email address is already registered".to_string());
    }

    let password_hash = hash_password(password)?;

    // Per-user directory for dataset snapshots and the activity feed
    let user_dir = config::data_dir().join(username);
    if create_dir_all(&user_dir).is_err() {
        return Err("Failed to create user directory".to_string());
    }

    let user = User {
        username: username.to_string(),
        email: email.to_string(),
        password_hash,
        reset_code: None,
        reset_code_expires: None,
        receive_import_notifications: false,
    };

    users.insert(username.to_string(), user);
    save_users(&users)?;

    Ok(())
}

/// Check whether the provided username and password match a registered user.
pub fn verify_user(username: &str, password: &str) -> Result<bool, String> {
    let users = get_users()?;

    if let Some(user) = users.get(username) {
        verify_password(password, &user.password_hash)
    } else {
        Ok(false)
    }
}

fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    match argon2.hash_password(password.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(_) => Err("Password hashing failed".to_string()),
    }
}

fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(hash) => hash,
        Err(_) => return Err("Invalid password hash format".to_string()),
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false), // Password didn't match
    }
}

/// Create and store a new session for an authenticated user, returning the
/// session id.
pub fn create_session(username: &str) -> String {
    let session_id = Uuid::new_v4().to_string();
    let expires_at = SystemTime::now() + Duration::from_secs(SESSION_DURATION);

    let session = Session {
        user_id: username.to_string(),
        expires_at,
    };

    let mut sessions = SESSIONS.write().unwrap();
    sessions.insert(session_id.clone(), session);

    session_id
}

/// Resolve a session id to its username, if the session is valid and not
/// expired.
pub fn validate_session(session_id: &str) -> Option<String> {
    let sessions = SESSIONS.read().unwrap();

    if let Some(session) = sessions.get(session_id) {
        if session.expires_at > SystemTime::now() {
            return Some(session.user_id.clone());
        }
    }

    None
}

pub fn destroy_session(session_id: &str) {
    let mut sessions = SESSIONS.write().unwrap();
    sessions.remove(session_id);
}

/// Append an entry to a user's activity feed. Best-effort: failures are
/// logged and do not fail the triggering request.
pub fn record_activity(username: &str, action: &str, details: serde_json::Value) {
    let entry = ActivityEntry {
        action: action.to_string(),
        details,
        at: chrono::Utc::now(),
    };

    let path = config::data_dir().join(username).join("activity.json");
    let mut entries: Vec<ActivityEntry> = fs::read_to_string(&path)
        .ok()
        .and_then(|data| serde_json::from_str(&data).ok())
        .unwrap_or_default();
    entries.push(entry);

    let keep_from = entries.len().saturating_sub(ACTIVITY_LIMIT);
    let kept = &entries[keep_from..];
    match serde_json::to_string_pretty(kept) {
        Ok(json) => {
            if let Err(e) = fs::write(&path, json) {
                log::warn!("[ACTIVITY] Failed to write activity for {}: {}", username, e);
            }
        }
        Err(e) => log::warn!("[ACTIVITY] Failed to serialize activity: {}", e),
    }
}

/// The most recent activity entries for a user, newest first.
pub fn recent_activity(username: &str) -> Vec<ActivityEntry> {
    let path = config::data_dir().join(username).join("activity.json");
    let mut entries: Vec<ActivityEntry> = fs::read_to_string(&path)
        .ok()
        .and_then(|data| serde_json::from_str(&data).ok())
        .unwrap_or_default();
    entries.reverse();
    entries
}

// Web handler functions below

/// Handle user registration.
///
/// When the payload carries an invitation token, the token is validated
/// first and the new account joins the inviting team.
pub async fn handle_signup(Json(credentials): Json<UserCredentials>) -> Response {
    let invitation = match &credentials.token {
        Some(token) => match team::validate_invitation(token) {
            Ok(Some(invitation)) => Some(invitation),
            Ok(None) => {
                return (
                    StatusCode::BAD_REQUEST,
                    "Invitation is invalid or has expired",
                )
                    .into_response();
            }
            Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
        },
        None => None,
    };

    if let Some(invitation) = &invitation {
        if invitation.email != credentials.email {
            return (
                StatusCode::BAD_REQUEST,
                "Invitation was issued for a different email address",
            )
                .into_response();
        }
    }

    if let Err(e) = register_user(
        &credentials.username,
        &credentials.email,
        &credentials.password,
    ) {
        return (StatusCode::BAD_REQUEST, e).into_response();
    }

    if let Some(invitation) = invitation {
        if let Err(e) = team::accept_invitation(&invitation.token, &credentials.username) {
            log::error!("[SIGNUP] Failed to accept invitation: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, e).into_response();
        }
    }

    log::info!("[SIGNUP] Registered user {}", credentials.username);
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "username": credentials.username })),
    )
        .into_response()
}

/// Handle user login: validate credentials and set the session cookie.
pub async fn handle_login(jar: CookieJar, Json(credentials): Json<UserCredentials>) -> Response {
    match verify_user(&credentials.username, &credentials.password) {
        Ok(true) => {
            let session_id = create_session(&credentials.username);
            let cookie = Cookie::new("session", session_id);
            log::info!("[LOGIN] {} logged in", credentials.username);
            (
                jar.add(cookie),
                Json(serde_json::json!({ "username": credentials.username })),
            )
                .into_response()
        }
        Ok(false) => (StatusCode::UNAUTHORIZED, "Invalid username or password").into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error").into_response(),
    }
}

/// Handle user logout: drop the server-side session and clear the cookie.
pub async fn handle_logout(jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get("session") {
        destroy_session(cookie.value());
    }

    let cookie = Cookie::new("session", "");
    (jar.add(cookie), Json(serde_json::json!({ "ok": true }))).into_response()
}

/// Authentication middleware for the API routes.
///
/// Resolves the session cookie and stores the username as a request
/// extension; requests without a valid session get 401.
pub async fn require_auth(
    jar: CookieJar,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    if let Some(session_cookie) = jar.get("session") {
        if let Some(username) = validate_session(session_cookie.value()) {
            request.extensions_mut().insert(username);
            return next.run(request).await;
        }
    }

    crate::error::ApiError::Unauthorized.into_response()
}

/// Handle a password reset request: store a reset code and email it.
pub async fn handle_reset_request(Json(request): Json<PasswordResetRequest>) -> Response {
    let mut users = match get_users() {
        Ok(users) => users,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    };

    let Some(user) = users.values_mut().find(|u| u.email == request.email) else {
        return (StatusCode::NOT_FOUND, "No account with that email").into_response();
    };

    let reset_code = generate_reset_code();
    user.reset_code = Some(reset_code.clone());
    user.reset_code_expires = Some(SystemTime::now() + Duration::from_secs(60 * 60));
    let email = user.email.clone();

    if let Err(e) = save_users(&users) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e).into_response();
    }

    let mailer = match Mailer::new() {
        Ok(mailer) => mailer,
        Err(e) => {
            log::error!("[RESET] Mailer unavailable: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send reset email",
            )
                .into_response();
        }
    };

    match mailer.send_password_reset(&email, &reset_code) {
        Ok(_) => Json(serde_json::json!({ "ok": true })).into_response(),
        Err(e) => {
            log::error!("[RESET] Failed to send reset email: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send reset email",
            )
                .into_response()
        }
    }
}

/// Handle a password reset confirmation: verify the code and store the new
/// password hash.
pub async fn handle_reset_confirm(Json(request): Json<PasswordResetConfirm>) -> Response {
    let mut users = match get_users() {
        Ok(users) => users,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    };

    let Some(user) = users.values_mut().find(|u| u.email == request.email) else {
        return (StatusCode::NOT_FOUND, "No account with that email").into_response();
    };

    let code_valid = user.reset_code.as_deref() == Some(request.reset_code.as_str())
        && user
            .reset_code_expires
            .is_some_and(|expires| expires > SystemTime::now());

    if !code_valid {
        return (StatusCode::BAD_REQUEST, "Reset code is invalid or has expired").into_response();
    }

    let password_hash = match hash_password(&request.new_password) {
        Ok(hash) => hash,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    };

    user.password_hash = password_hash;
    user.reset_code = None;
    user.reset_code_expires = None;

    match save_users(&users) {
        Ok(_) => Json(serde_json::json!({ "ok": true })).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
    }
}
