//! Register, login and logout, plus the extractors that resolve the session
//! cookie on protected routes.

use std::future::{ready, Ready};

use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::{get, post, web, FromRequest, HttpRequest, HttpResponse};
use log::{info, warn};
use todo_shared::validation::REQUIRED;
use todo_shared::{validate_username, Credentials, FieldErrors, MessageResponse, UserInfo, SESSION_COOKIE};

use crate::config::AuthPolicy;
use crate::error::{ApiError, ApiResult};
use crate::password;
use crate::sessions::{Session, SessionStore};
use crate::store::{Store, StoreError, UserRecord};

fn session_token(req: &HttpRequest) -> Option<String> {
    req.cookie(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

fn session_from_request(req: &HttpRequest) -> Option<Session> {
    let token = session_token(req)?;
    req.app_data::<web::Data<SessionStore>>()?.get(&token)
}

/// A request carrying a live session.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Session);

impl FromRequest for CurrentUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            session_from_request(req)
                .map(CurrentUser)
                .ok_or(ApiError::Unauthenticated),
        )
    }
}

/// Gate for the task routes: requires a session unless the server runs with
/// public tasks.
#[derive(Debug, Clone)]
pub struct TaskAccess {
    pub session: Option<Session>,
}

impl FromRequest for TaskAccess {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let protect = req
            .app_data::<web::Data<AuthPolicy>>()
            .map_or(true, |policy| policy.protect_tasks);
        let session = session_from_request(req);
        ready(if protect && session.is_none() {
            Err(ApiError::Unauthenticated)
        } else {
            Ok(TaskAccess { session })
        })
    }
}

/// Pulls a present, non-blank username and password out of the body,
/// reporting every missing member at once.
fn required_credentials(creds: Credentials) -> ApiResult<(String, String)> {
    let mut fields = FieldErrors::new();
    let username = creds.username.filter(|u| !u.trim().is_empty());
    let password = creds.password.filter(|p| !p.is_empty());
    if username.is_none() {
        fields.insert("username".to_string(), REQUIRED.to_string());
    }
    if password.is_none() {
        fields.insert("password".to_string(), REQUIRED.to_string());
    }
    match (username, password) {
        (Some(username), Some(password)) => Ok((username, password)),
        _ => Err(ApiError::Validation {
            message: "username and password are required".to_string(),
            fields,
        }),
    }
}

fn session_cookie(token: String, policy: &AuthPolicy) -> Cookie<'static> {
    let max_age = i64::try_from(policy.session_ttl.as_secs()).unwrap_or(i64::MAX);
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(policy.secure_cookie)
        .max_age(time::Duration::seconds(max_age))
        .finish()
}

#[post("/register")]
pub async fn register(
    store: web::Data<Store>,
    body: web::Json<Credentials>,
) -> ApiResult<HttpResponse> {
    let (username, password) = required_credentials(body.into_inner())?;
    let username = validate_username(&username).map_err(|message| {
        let mut fields = FieldErrors::new();
        fields.insert("username".to_string(), message.to_string());
        ApiError::invalid_fields(fields)
    })?;

    let user = web::block(move || -> ApiResult<UserRecord> {
        if store.find_user(&username)?.is_some() {
            return Err(ApiError::Duplicate("username already exists".to_string()));
        }
        let password_hash = password::hash_password(&password)?;
        store
            .create_user(&username, &password_hash)
            .map_err(|err| match err {
                StoreError::UsernameTaken => ApiError::Duplicate("username already exists".to_string()),
                other => other.into(),
            })
    })
    .await??;

    info!("registered user {} (id {})", user.username, user.id);
    Ok(HttpResponse::Ok().json(MessageResponse::new("User registered successfully")))
}

#[post("/login")]
pub async fn login(
    req: HttpRequest,
    store: web::Data<Store>,
    sessions: web::Data<SessionStore>,
    policy: web::Data<AuthPolicy>,
    body: web::Json<Credentials>,
) -> ApiResult<HttpResponse> {
    let (username, password) = required_credentials(body.into_inner())?;
    let username = username.trim().to_string();

    let lookup = username.clone();
    let verified = web::block(move || -> ApiResult<Option<UserRecord>> {
        Ok(match store.find_user(&lookup)? {
            Some(user) if password::verify_password(&password, &user.password_hash) => Some(user),
            Some(_) => None,
            None => {
                password::verify_against_dummy(&password);
                None
            }
        })
    })
    .await??;

    let Some(user) = verified else {
        warn!("failed login for {username}");
        return Err(ApiError::InvalidCredentials);
    };

    if let Some(previous) = session_token(&req) {
        sessions.remove(&previous);
    }
    let token = sessions.create(user.id, &user.username);
    info!("user {} logged in", user.username);

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(token, &policy))
        .json(MessageResponse::new("Login successful")))
}

#[post("/logout")]
pub async fn logout(req: HttpRequest, sessions: web::Data<SessionStore>) -> HttpResponse {
    if let Some(token) = session_token(&req) {
        if sessions.remove(&token) {
            info!("session closed");
        }
    }

    let mut removal = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    removal.make_removal();
    HttpResponse::Ok()
        .cookie(removal)
        .json(MessageResponse::new("Logged out successfully"))
}

#[get("/me")]
pub async fn me(user: CurrentUser) -> web::Json<UserInfo> {
    let CurrentUser(session) = user;
    web::Json(UserInfo {
        id: session.user_id,
        username: session.username,
    })
}
