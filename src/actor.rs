// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Who is calling
//!
//! Authorization is checked explicitly inside each operation rather than delegated
//! to a storage-level policy engine.

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum Actor {
    Agent(String),
    Admin(String),
    Client(String),
    /// Collaborator-driven or background work (booking cancellations, sweeps,
    /// payment execution callbacks)
    System,
}

impl Actor {
    pub fn agent(id: impl Into<String>) -> Self {
        Actor::Agent(id.into())
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Actor::Admin(id.into())
    }

    pub fn require_admin(&self, operation: &str) -> Result<&str> {
        match self {
            Actor::Admin(id) => Ok(id),
            other => Err(DispatchError::Unauthorized(format!(
                "{} requires an admin, got {}",
                operation,
                other.role()
            ))),
        }
    }

    /// Admins and internal callers
    pub fn require_operator(&self, operation: &str) -> Result<()> {
        match self {
            Actor::Admin(_) | Actor::System => Ok(()),
            other => Err(DispatchError::Unauthorized(format!(
                "{} requires an admin or system caller, got {}",
                operation,
                other.role()
            ))),
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Actor::Agent(_) => "agent",
            Actor::Admin(_) => "admin",
            Actor::Client(_) => "client",
            Actor::System => "system",
        }
    }
}
