//! Business logic services

pub mod auth;
pub mod catalog;
pub mod lending;
pub mod users;

use crate::{
    config::{AuthConfig, LendingConfig},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub lending: lending::LendingService,
    pub users: users::UsersService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(
        repository: Repository,
        auth_config: AuthConfig,
        lending_config: LendingConfig,
    ) -> Self {
        let auth = auth::AuthService::new(repository.clone(), auth_config);
        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            lending: lending::LendingService::new(repository.clone(), lending_config),
            users: users::UsersService::new(repository, auth.clone()),
            auth,
        }
    }
}
