// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use nisesales_app::Persistence;
use nisesales_db::Store;
use nisesales_remote::Client;
use std::fmt;

/// Where records live for this session.
pub enum Backend {
    Sqlite(Store),
    Remote(Client),
}

impl Backend {
    pub fn persistence(&mut self) -> &mut dyn Persistence {
        match self {
            Self::Sqlite(store) => store,
            Self::Remote(client) => client,
        }
    }

    /// Startup reachability check. A bootstrapped store needs nothing more.
    pub fn check(&self) -> Result<()> {
        match self {
            Self::Sqlite(_) => Ok(()),
            Self::Remote(client) => client.ping(),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(_) => f.write_str("sqlite"),
            Self::Remote(client) => write!(f, "remote {}", client.base_url()),
        }
    }
}

pub struct CliRuntime {
    backend: Backend,
    user_name: String,
}

impl CliRuntime {
    pub fn new(backend: Backend, user_name: impl Into<String>) -> Self {
        Self {
            backend,
            user_name: user_name.into(),
        }
    }
}

impl nisesales_tui::AppRuntime for CliRuntime {
    fn persistence(&mut self) -> &mut dyn Persistence {
        self.backend.persistence()
    }

    fn user_name(&self) -> &str {
        &self.user_name
    }
}
