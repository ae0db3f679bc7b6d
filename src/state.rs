// src/state.rs
use std::sync::Arc;

use crate::config::Configuration;
use crate::errors::Result;
use crate::user::User;

/// The configuration and invoking user, handed to every command handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Configuration>,
    pub user: User,
}

impl AppContext {
    pub fn new(config: Configuration, user: User) -> Self {
        Self {
            config: Arc::new(config),
            user,
        }
    }

    /// Load the configuration from `COURSEWORK_CONFIG` and resolve the invoking user.
    pub fn from_env() -> Result<Self> {
        let config = Configuration::from_env()?;
        let user = User::from_env(&config, None);
        Ok(Self::new(config, user))
    }
}
