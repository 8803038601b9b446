use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// Route-catalog collaborator. The dispatch core only needs pickup routes to
/// resolve; catalog CRUD lives elsewhere.
#[async_trait]
pub trait RouteCatalog: Send + Sync {
    async fn exists(&self, route_id: Uuid) -> bool;
}

#[derive(Default)]
pub struct InMemoryRouteCatalog {
    routes: DashMap<Uuid, String>,
}

impl InMemoryRouteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, route_id: Uuid, name: String) {
        self.routes.insert(route_id, name);
    }
}

#[async_trait]
impl RouteCatalog for InMemoryRouteCatalog {
    async fn exists(&self, route_id: Uuid) -> bool {
        self.routes.contains_key(&route_id)
    }
}
