use super::Engine;

use async_trait::async_trait;

use crate::{api::LocationAPI, entities::Location, error::Error};

#[async_trait]
impl LocationAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn list_locations(&self) -> Result<Vec<Location>, Error> {
        Ok(self.directory.locations().to_vec())
    }
}

#[tokio::test]
async fn list_locations_test() {
    use std::sync::Arc;

    let engine = super::test_engine(Arc::new(super::testing::StraightLine));
    let locations = engine.list_locations().await.unwrap();

    let names: Vec<&str> = locations.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, ["Airport", "Dhanmondi", "Gulshan", "Uttara", "Banani"]);
}
