use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::{
    entities::{AuthSession, Credentials, Registration, User},
    error::{authentication_error, Error},
};

/// Client for the account backend's `/auth` endpoints.
#[derive(Clone, Debug)]
pub struct AuthClient {
    api_base: String,
}

impl AuthClient {
    pub fn new(api_base: String) -> Self {
        Self { api_base }
    }

    #[tracing::instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthSession, Error> {
        self.post("auth/login", credentials, "Login failed").await
    }

    #[tracing::instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<User, Error> {
        self.post("auth/register", registration, "Registration failed")
            .await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<T, Error> {
        let url = format!("{}/{}", self.api_base.trim_end_matches('/'), path);

        let res = reqwest::Client::new().post(url).json(body).send().await?;

        if res.status().is_success() {
            return Ok(res.json().await?);
        }

        let body: Value = res.json().await.unwrap_or(Value::Null);

        Err(authentication_error(failure_message(&body, fallback)))
    }
}

/// The backend's own explanation when it gives one.
fn failure_message(body: &Value, fallback: &str) -> String {
    ["message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .filter(|message| !message.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

#[test]
fn failure_message_test() {
    use serde_json::json;

    assert_eq!(
        failure_message(&json!({"message": "Invalid credentials"}), "Login failed"),
        "Invalid credentials"
    );
    assert_eq!(
        failure_message(&json!({"error": "Email already exists"}), "Registration failed"),
        "Email already exists"
    );
    assert_eq!(
        failure_message(&json!({"status": 500}), "Login failed"),
        "Login failed"
    );
    assert_eq!(failure_message(&Value::Null, "Login failed"), "Login failed");
}
