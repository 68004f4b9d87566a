use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use todo_shared::{
    CreateTaskRequest, Credentials, ErrorBody, MessageResponse, Task, UpdateTaskRequest, UserInfo,
};
use url::Url;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{}", .body.error)]
    Api { status: StatusCode, body: ErrorBody },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid server url: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }

    /// Server message for one input field, if the server reported one.
    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            Self::Api { body, .. } => body.field(name),
            _ => None,
        }
    }
}

/// HTTP client for the to-do API. The session cookie set by `/login` is kept
/// in the client's cookie jar and sent with every later call.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = Client::builder().cookie_store(true).build()?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(path)?)
    }

    async fn send(request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let bytes = response.bytes().await?;
        let body = serde_json::from_slice::<ErrorBody>(&bytes).unwrap_or_else(|_| {
            ErrorBody::new(
                status
                    .canonical_reason()
                    .unwrap_or("unexpected response")
                    .to_string(),
            )
        });
        log::debug!("{status}: {}", body.error);
        Err(ClientError::Api { status, body })
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
        Ok(Self::send(request).await?.json().await?)
    }

    pub async fn register(&self, credentials: &Credentials) -> Result<MessageResponse, ClientError> {
        Self::send_json(self.http.post(self.url("register")?).json(credentials)).await
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<MessageResponse, ClientError> {
        Self::send_json(self.http.post(self.url("login")?).json(credentials)).await
    }

    pub async fn logout(&self) -> Result<MessageResponse, ClientError> {
        Self::send_json(self.http.post(self.url("logout")?)).await
    }

    pub async fn me(&self) -> Result<UserInfo, ClientError> {
        Self::send_json(self.http.get(self.url("me")?)).await
    }

    /// Newest first.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, ClientError> {
        let mut url = self.url("tasks")?;
        url.query_pairs_mut().append_pair("ordering", "-created_at");
        Self::send_json(self.http.get(url)).await
    }

    pub async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task, ClientError> {
        Self::send_json(self.http.post(self.url("tasks")?).json(request)).await
    }

    pub async fn replace_task(&self, id: i64, request: &CreateTaskRequest) -> Result<Task, ClientError> {
        Self::send_json(self.http.put(self.url(&format!("tasks/{id}"))?).json(request)).await
    }

    pub async fn update_task(&self, id: i64, request: &UpdateTaskRequest) -> Result<Task, ClientError> {
        Self::send_json(self.http.patch(self.url(&format!("tasks/{id}"))?).json(request)).await
    }

    pub async fn delete_task(&self, id: i64) -> Result<(), ClientError> {
        Self::send(self.http.delete(self.url(&format!("tasks/{id}"))?)).await?;
        Ok(())
    }
}
