use super::Engine;

use async_trait::async_trait;

use crate::{
    api::AuthAPI,
    entities::{AuthSession, Credentials, Registration, User},
    error::Error,
};

#[async_trait]
impl AuthAPI for Engine {
    #[tracing::instrument(skip(self, credentials))]
    async fn login(&self, credentials: Credentials) -> Result<AuthSession, Error> {
        let session = self.auth.login(&credentials).await?;

        self.credentials.lock().await.save(session.clone());

        Ok(session)
    }

    #[tracing::instrument(skip(self, registration))]
    async fn register(&self, registration: Registration) -> Result<User, Error> {
        self.auth.register(&registration).await
    }

    #[tracing::instrument(skip_all)]
    async fn logout(&self, token: &str) -> Result<(), Error> {
        self.credentials.lock().await.clear(token);

        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn current_user(&self, token: &str) -> Result<Option<User>, Error> {
        Ok(self.credentials.lock().await.current_user(token).cloned())
    }
}

#[cfg(test)]
fn signed_in(engine: &Engine, token: &str, email: &str) {
    tokio_test::block_on(engine.credentials.lock()).save(AuthSession {
        token: token.into(),
        user: User {
            id: None,
            name: None,
            username: None,
            email: email.into(),
            phone_number: None,
        },
    });
}

#[test]
fn signed_out_by_default_test() {
    use std::sync::Arc;
    use tokio_test::block_on;

    let engine = super::test_engine(Arc::new(super::testing::StraightLine));

    assert_eq!(block_on(engine.current_user("token-a")).unwrap(), None);
    block_on(engine.logout("token-a")).unwrap();
    assert_eq!(block_on(engine.current_user("token-a")).unwrap(), None);
}

#[test]
fn callers_see_only_their_own_account_test() {
    use std::sync::Arc;
    use tokio_test::block_on;

    let engine = super::test_engine(Arc::new(super::testing::StraightLine));
    signed_in(&engine, "token-a", "nadia@example.com");
    signed_in(&engine, "token-b", "rafi@example.com");

    let user = block_on(engine.current_user("token-a")).unwrap().unwrap();
    assert_eq!(user.email, "nadia@example.com");
    let user = block_on(engine.current_user("token-b")).unwrap().unwrap();
    assert_eq!(user.email, "rafi@example.com");

    block_on(engine.logout("token-b")).unwrap();

    assert_eq!(block_on(engine.current_user("token-b")).unwrap(), None);
    let user = block_on(engine.current_user("token-a")).unwrap().unwrap();
    assert_eq!(user.email, "nadia@example.com");
}
