use std::sync::Arc;

use crate::{
    config::Settings,
    db::{DbPool, OrmConn, orm_from_pool},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(pool: DbPool, settings: Settings) -> Self {
        let orm = orm_from_pool(&pool);
        Self {
            pool,
            orm,
            settings: Arc::new(settings),
        }
    }
}
