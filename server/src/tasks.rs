use actix_web::{delete, get, patch, post, put, web, HttpResponse};
use log::info;
use serde::Deserialize;
use serde_json::Value;
use todo_shared::validation::NOT_AN_OBJECT;
use todo_shared::{Task, TaskChanges, ValidationMode};

use crate::auth::TaskAccess;
use crate::error::{ApiError, ApiResult};
use crate::store::{Store, TaskOrder};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub ordering: Option<String>,
}

fn parse_changes(body: &Value, mode: ValidationMode) -> ApiResult<TaskChanges> {
    if !body.is_object() {
        return Err(ApiError::validation(NOT_AN_OBJECT));
    }
    TaskChanges::from_json(body, mode).map_err(ApiError::invalid_fields)
}

#[get("/tasks")]
pub async fn list_tasks(
    _access: TaskAccess,
    store: web::Data<Store>,
    query: web::Query<ListQuery>,
) -> ApiResult<web::Json<Vec<Task>>> {
    let order = match query.ordering.as_deref() {
        None | Some("") => TaskOrder::default(),
        Some(raw) => raw.parse().map_err(ApiError::validation)?,
    };
    let tasks = web::block(move || store.list_tasks(order)).await??;
    Ok(web::Json(tasks))
}

#[post("/tasks")]
pub async fn create_task(
    _access: TaskAccess,
    store: web::Data<Store>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    let changes = parse_changes(&body, ValidationMode::Full)?;
    let title = changes.title.unwrap_or_default();
    let completed = changes.completed.unwrap_or(false);
    let task = web::block(move || store.create_task(&title, completed)).await??;
    info!("created task {}", task.id);
    Ok(HttpResponse::Created().json(task))
}

#[get("/tasks/{id}")]
pub async fn get_task(
    _access: TaskAccess,
    store: web::Data<Store>,
    id: web::Path<i64>,
) -> ApiResult<web::Json<Task>> {
    let id = id.into_inner();
    web::block(move || store.get_task(id))
        .await??
        .map(web::Json)
        .ok_or(ApiError::NotFound("task"))
}

#[put("/tasks/{id}")]
pub async fn replace_task(
    _access: TaskAccess,
    store: web::Data<Store>,
    id: web::Path<i64>,
    body: web::Json<Value>,
) -> ApiResult<web::Json<Task>> {
    let (id, body) = (id.into_inner(), body.into_inner());
    web::block(move || update(&store, id, &body, ValidationMode::Full)).await?
}

#[patch("/tasks/{id}")]
pub async fn patch_task(
    _access: TaskAccess,
    store: web::Data<Store>,
    id: web::Path<i64>,
    body: web::Json<Value>,
) -> ApiResult<web::Json<Task>> {
    let (id, body) = (id.into_inner(), body.into_inner());
    web::block(move || update(&store, id, &body, ValidationMode::Partial)).await?
}

fn update(store: &Store, id: i64, body: &Value, mode: ValidationMode) -> ApiResult<web::Json<Task>> {
    // Unknown ids are reported before body problems.
    if store.get_task(id)?.is_none() {
        return Err(ApiError::NotFound("task"));
    }
    let changes = parse_changes(body, mode)?;
    let task = store
        .update_task(id, &changes)?
        .ok_or(ApiError::NotFound("task"))?;
    info!("updated task {}", task.id);
    Ok(web::Json(task))
}

#[delete("/tasks/{id}")]
pub async fn delete_task(
    _access: TaskAccess,
    store: web::Data<Store>,
    id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let id = id.into_inner();
    if !web::block(move || store.delete_task(id)).await?? {
        return Err(ApiError::NotFound("task"));
    }
    info!("deleted task {id}");
    Ok(HttpResponse::NoContent().finish())
}
