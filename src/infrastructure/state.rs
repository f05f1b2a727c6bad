use std::sync::Arc;

use crate::infrastructure::{auth::JwtKeys, config::Config, db::PgPool, mailer::Mailer};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub mailer: Arc<dyn Mailer>,
    pub jwt_keys: JwtKeys,
}

impl AppState {
    pub fn new(config: Arc<Config>, pool: PgPool, mailer: Arc<dyn Mailer>) -> Self {
        let jwt_keys = JwtKeys::new(&config.auth.jwt_secret);
        Self {
            config,
            pool,
            mailer,
            jwt_keys,
        }
    }
}
