// src/user.rs
use serde::{Deserialize, Serialize};

use crate::config::Configuration;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Instructor,
    Student,
}

/// Whoever is running the program.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub role: Role,
}

impl User {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self { name: name.into(), role }
    }

    /// Resolve the invoking user. Admins listed in the config are instructors.
    ///
    /// The name comes from the passwd entry of the real uid, so a setuid
    /// install cannot be fooled by a doctored `$USER`.
    pub fn from_env(config: &Configuration, name: Option<String>) -> Self {
        let name = name
            .or_else(crate::privilege::real_user_name)
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_default();

        let role = if config.admins.iter().any(|admin| *admin == name) {
            Role::Instructor
        } else {
            Role::Student
        };

        Self { name, role }
    }

    pub fn is_instructor(&self) -> bool {
        self.role == Role::Instructor
    }
}
