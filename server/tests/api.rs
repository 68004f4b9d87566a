use std::time::Duration;

use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::http::{header, StatusCode};
use actix_web::middleware::NormalizePath;
use actix_web::{test, App};
use serde_json::{json, Value};
use todo_server::config::{AuthPolicy, DEFAULT_SESSION_TTL_SECS};
use todo_server::store::Store;
use todo_server::{cors, AppState};
use todo_shared::{ErrorBody, Task, SESSION_COOKIE};

fn state() -> AppState {
    AppState::new(Store::open_in_memory().expect("open store"), AuthPolicy::default())
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .wrap(NormalizePath::trim())
                .configure(|cfg| $state.configure(cfg)),
        )
        .await
    };
}

macro_rules! post_json {
    ($app:expr, $uri:expr, $body:expr) => {
        test::call_service(
            &$app,
            test::TestRequest::post().uri($uri).set_json($body).to_request(),
        )
        .await
    };
    ($app:expr, $uri:expr, $body:expr, $cookie:expr) => {
        test::call_service(
            &$app,
            test::TestRequest::post()
                .uri($uri)
                .cookie($cookie.clone())
                .set_json($body)
                .to_request(),
        )
        .await
    };
}

macro_rules! get {
    ($app:expr, $uri:expr) => {
        test::call_service(&$app, test::TestRequest::get().uri($uri).to_request()).await
    };
    ($app:expr, $uri:expr, $cookie:expr) => {
        test::call_service(
            &$app,
            test::TestRequest::get().uri($uri).cookie($cookie.clone()).to_request(),
        )
        .await
    };
}

/// Registers and logs in, returning the session cookie.
macro_rules! sign_in {
    ($app:expr, $username:expr, $password:expr) => {{
        let creds = json!({ "username": $username, "password": $password });
        let resp = post_json!($app, "/register", &creds);
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = post_json!($app, "/login", &creds);
        assert_eq!(resp.status(), StatusCode::OK);
        session_cookie(&resp)
    }};
}

fn session_cookie<B>(resp: &actix_web::dev::ServiceResponse<B>) -> Cookie<'static> {
    resp.response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.into_owned())
        .expect("session cookie set")
}

#[actix_web::test]
async fn register_login_crud_and_undo_scenario() {
    let state = state();
    let app = app!(state);

    let creds = json!({ "username": "alice", "password": "pw123" });
    let resp = post_json!(app, "/register", &creds);
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["message"].is_string());

    let resp = post_json!(app, "/login", &creds);
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = session_cookie(&resp);

    let resp = get!(app, "/tasks", cookie);
    assert_eq!(resp.status(), StatusCode::OK);
    let tasks: Vec<Task> = test::read_body_json(resp).await;
    assert!(tasks.is_empty());

    let resp = post_json!(app, "/tasks", &json!({ "title": "buy milk" }), cookie);
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Task = test::read_body_json(resp).await;
    assert_eq!(created.title, "buy milk");
    assert!(!created.completed);

    // The client keeps the displayable fields before deleting.
    let undo = json!({ "title": created.title, "completed": created.completed });

    let req = test::TestRequest::delete()
        .uri(&format!("/tasks/{}", created.id))
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(test::read_body(resp).await.is_empty());

    let resp = get!(app, &format!("/tasks/{}", created.id), cookie);
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = post_json!(app, "/tasks", &undo, cookie);
    assert_eq!(resp.status(), StatusCode::CREATED);
    let restored: Task = test::read_body_json(resp).await;
    assert_eq!(restored.title, "buy milk");
    assert_ne!(restored.id, created.id);
}

#[actix_web::test]
async fn created_task_defaults_to_incomplete_and_is_retrievable() {
    let state = state();
    let app = app!(state);
    let cookie = sign_in!(app, "bob", "secret");

    let resp = post_json!(app, "/tasks", &json!({ "title": "  water plants  ", "id": 42 }), cookie);
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Task = test::read_body_json(resp).await;
    assert_eq!(created.title, "water plants");
    assert!(!created.completed);

    let fetched: Task =
        test::read_body_json(get!(app, &format!("/tasks/{}", created.id), cookie)).await;
    assert_eq!(fetched, created);
}

#[actix_web::test]
async fn invalid_task_bodies_list_failing_fields() {
    let state = state();
    let app = app!(state);
    let cookie = sign_in!(app, "carol", "secret");

    let resp = post_json!(app, "/tasks", &json!({ "completed": "nope" }), cookie);
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(body.field("title"), Some("This field is required."));
    assert_eq!(body.field("completed"), Some("Must be a valid boolean."));

    let resp = post_json!(app, "/tasks", &json!({ "title": "   " }), cookie);
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(body.field("title"), Some("This field may not be blank."));

    let req = test::TestRequest::post()
        .uri("/tasks")
        .cookie(cookie.clone())
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = test::read_body_json(resp).await;
    assert!(body.error.starts_with("malformed request body"));

    let resp = post_json!(app, "/tasks", &json!(["buy milk"]), cookie);
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(body.error, "Expected a JSON object.");
    assert!(body.fields.is_empty());

    let tasks: Vec<Task> = test::read_body_json(get!(app, "/tasks", cookie)).await;
    assert!(tasks.is_empty());
}

#[actix_web::test]
async fn put_and_patch_update_one_record() {
    let state = state();
    let app = app!(state);
    let cookie = sign_in!(app, "dave", "secret");

    let created: Task =
        test::read_body_json(post_json!(app, "/tasks", &json!({ "title": "draft", "completed": true }), cookie)).await;

    let req = test::TestRequest::put()
        .uri(&format!("/tasks/{}", created.id))
        .cookie(cookie.clone())
        .set_json(json!({ "title": "final", "created_at": "1999-01-01T00:00:00Z" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let replaced: Task = test::read_body_json(resp).await;
    assert_eq!(replaced.id, created.id);
    assert_eq!(replaced.title, "final");
    assert!(replaced.completed);
    assert_eq!(replaced.created_at, created.created_at);

    let req = test::TestRequest::patch()
        .uri(&format!("/tasks/{}", created.id))
        .cookie(cookie.clone())
        .set_json(json!({ "completed": false }))
        .to_request();
    let patched: Task = test::call_and_read_body_json(&app, req).await;
    assert_eq!(patched.title, "final");
    assert!(!patched.completed);

    let req = test::TestRequest::put()
        .uri(&format!("/tasks/{}", created.id))
        .cookie(cookie.clone())
        .set_json(json!({ "completed": true }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    for uri in ["/tasks/9999", "/tasks/abc"] {
        let req = test::TestRequest::put()
            .uri(uri)
            .cookie(cookie.clone())
            .set_json(json!({ "title": "x" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[actix_web::test]
async fn unknown_ids_are_not_found() {
    let state = state();
    let app = app!(state);
    let cookie = sign_in!(app, "erin", "secret");

    let resp = get!(app, "/tasks/12345", cookie);
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(body.error, "task not found");

    let resp = get!(app, "/tasks/not-a-number", cookie);
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::delete()
        .uri("/tasks/12345")
        .cookie(cookie.clone())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn listing_can_be_ordered_newest_first() {
    let state = state();
    let app = app!(state);
    let cookie = sign_in!(app, "frank", "secret");

    let mut ids = Vec::new();
    for title in ["first", "second", "third"] {
        let task: Task =
            test::read_body_json(post_json!(app, "/tasks", &json!({ "title": title }), cookie)).await;
        ids.push(task.id);
    }

    let tasks: Vec<Task> = test::read_body_json(get!(app, "/tasks?ordering=-created_at", cookie)).await;
    let listed: Vec<i64> = tasks.iter().map(|t| t.id).collect();
    ids.reverse();
    assert_eq!(listed, ids);

    // Trailing slashes are tolerated.
    let resp = get!(app, "/tasks/?ordering=created_at", cookie);
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = get!(app, "/tasks?ordering=title", cookie);
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn duplicate_registration_is_rejected_without_a_second_record() {
    let state = state();
    let app = app!(state);

    let creds = json!({ "username": "alice", "password": "pw123" });
    assert_eq!(post_json!(app, "/register", &creds).status(), StatusCode::OK);

    let again = json!({ "username": "alice", "password": "different" });
    let resp = post_json!(app, "/register", &again);
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(body.error, "username already exists");
    assert_eq!(state.store.count_users().unwrap(), 1);

    // The original password still works.
    assert_eq!(post_json!(app, "/login", &creds).status(), StatusCode::OK);
}

#[actix_web::test]
async fn registration_requires_both_fields() {
    let state = state();
    let app = app!(state);

    let resp = post_json!(app, "/register", &json!({}));
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = test::read_body_json(resp).await;
    assert!(body.field("username").is_some());
    assert!(body.field("password").is_some());

    let resp = post_json!(app, "/register", &json!({ "username": "has space", "password": "pw" }));
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = test::read_body_json(resp).await;
    assert!(body.field("username").is_some());

    assert_eq!(state.store.count_users().unwrap(), 0);
}

#[actix_web::test]
async fn wrong_password_and_unknown_user_fail_identically() {
    let state = state();
    let app = app!(state);
    let creds = json!({ "username": "alice", "password": "pw123" });
    assert_eq!(post_json!(app, "/register", &creds).status(), StatusCode::OK);

    let resp = post_json!(app, "/login", &json!({ "username": "alice", "password": "wrong" }));
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.response().cookies().next().is_none());
    let wrong_password = test::read_body(resp).await;

    let resp = post_json!(app, "/login", &json!({ "username": "mallory", "password": "wrong" }));
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let unknown_user = test::read_body(resp).await;

    assert_eq!(wrong_password, unknown_user);
    let body: ErrorBody = serde_json::from_slice(&wrong_password).unwrap();
    assert_eq!(body.error, "invalid credentials");
    assert!(state.sessions.is_empty());
}

#[actix_web::test]
async fn login_sets_an_http_only_session_cookie() {
    let state = state();
    let app = app!(state);
    let cookie = sign_in!(app, "grace", "secret");

    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    assert_eq!(
        cookie.max_age(),
        Some(time::Duration::seconds(DEFAULT_SESSION_TTL_SECS as i64))
    );
    assert_ne!(cookie.secure(), Some(true));
    assert!(!cookie.value().is_empty());

    let req = test::TestRequest::get().uri("/me").cookie(cookie.clone()).to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["username"], "grace");
}

#[actix_web::test]
async fn secure_cookie_policy_marks_the_cookie_secure() {
    let policy = AuthPolicy {
        secure_cookie: true,
        session_ttl: Duration::from_secs(3600),
        ..AuthPolicy::default()
    };
    let state = AppState::new(Store::open_in_memory().unwrap(), policy);
    let app = app!(state);
    let cookie = sign_in!(app, "grace", "secret");

    assert_eq!(cookie.secure(), Some(true));
    assert_eq!(cookie.max_age(), Some(time::Duration::seconds(3600)));
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
}

#[actix_web::test]
async fn logout_invalidates_the_session() {
    let state = state();
    let app = app!(state);
    let cookie = sign_in!(app, "heidi", "secret");
    assert_eq!(get!(app, "/tasks", cookie).status(), StatusCode::OK);

    let resp = post_json!(app, "/logout", &json!({}), cookie);
    assert_eq!(resp.status(), StatusCode::OK);
    let cleared = session_cookie(&resp);
    assert!(cleared.value().is_empty());

    let resp = get!(app, "/tasks", cookie);
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: ErrorBody = test::read_body_json(resp).await;
    assert_eq!(body.error, "authentication credentials were not provided");
    assert_eq!(get!(app, "/me", cookie).status(), StatusCode::UNAUTHORIZED);

    // Logging out again, with or without the stale cookie, is not an error.
    assert_eq!(post_json!(app, "/logout", &json!({}), cookie).status(), StatusCode::OK);
    let req = test::TestRequest::post().uri("/logout").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn relogin_replaces_the_previous_session() {
    let state = state();
    let app = app!(state);
    let first = sign_in!(app, "ivan", "secret");

    let creds = json!({ "username": "ivan", "password": "secret" });
    let resp = post_json!(app, "/login", &creds, first);
    assert_eq!(resp.status(), StatusCode::OK);
    let second = session_cookie(&resp);

    assert_ne!(first.value(), second.value());
    assert_eq!(get!(app, "/tasks", first).status(), StatusCode::UNAUTHORIZED);
    assert_eq!(get!(app, "/tasks", second).status(), StatusCode::OK);
    assert_eq!(state.sessions.len(), 1);
}

#[actix_web::test]
async fn task_routes_require_a_session_by_default() {
    let state = state();
    let app = app!(state);

    assert_eq!(get!(app, "/tasks").status(), StatusCode::UNAUTHORIZED);
    let resp = post_json!(app, "/tasks", &json!({ "title": "sneaky" }));
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let forged = Cookie::new(SESSION_COOKIE, "forged-token");
    assert_eq!(get!(app, "/tasks", forged).status(), StatusCode::UNAUTHORIZED);
    assert!(state.store.list_tasks(Default::default()).unwrap().is_empty());
}

#[actix_web::test]
async fn public_mode_serves_tasks_anonymously() {
    let policy = AuthPolicy {
        protect_tasks: false,
        ..AuthPolicy::default()
    };
    let state = AppState::new(Store::open_in_memory().unwrap(), policy);
    let app = app!(state);

    let resp = post_json!(app, "/tasks", &json!({ "title": "open" }));
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(get!(app, "/tasks").status(), StatusCode::OK);
    assert_eq!(get!(app, "/me").status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn cors_allows_credentialed_requests_from_known_origins() {
    let state = state();
    let origins = vec!["http://localhost:5173".to_string()];
    let app = test::init_service(
        App::new()
            .wrap(cors(&origins))
            .configure(|cfg| state.configure(cfg)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/health")
        .insert_header((header::ORIGIN, "http://localhost:5173"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:5173"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}
