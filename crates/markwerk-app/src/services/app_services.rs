// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared handle on the data directory, its persisted configuration, and the
// result database.

use std::path::{Path, PathBuf};

use markwerk_batch::ResultStore;
use markwerk_core::error::Result;
use markwerk_core::PipelineConfig;
use tracing::{debug, warn};

use super::data_dir;

const CONFIG_FILE: &str = "config.json";
const DATABASE_FILE: &str = "results.db";

#[derive(Debug, Clone)]
pub struct AppServices {
    data_dir: PathBuf,
}

impl AppServices {
    /// Resolve (and create) the platform data directory.
    pub fn init() -> Result<Self> {
        let data_dir = data_dir::data_dir()?;
        debug!(data_dir = %data_dir.display(), "data directory ready");
        Ok(Self { data_dir })
    }

    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The configuration at `explicit` if given (errors are fatal), else the
    /// one persisted in the data directory, else the defaults.
    pub fn pipeline_config(&self, explicit: Option<&Path>) -> Result<PipelineConfig> {
        if let Some(path) = explicit {
            return PipelineConfig::load(path);
        }
        let path = self.data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(PipelineConfig::default());
        }
        match PipelineConfig::load(&path) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable saved config");
                Ok(PipelineConfig::default())
            }
        }
    }

    /// Open the result database at `explicit`, or the one in the data
    /// directory.
    pub fn open_store(&self, explicit: Option<&Path>) -> Result<ResultStore> {
        match explicit {
            Some(path) => ResultStore::open(path),
            None => ResultStore::open(self.data_dir.join(DATABASE_FILE)),
        }
    }
}
