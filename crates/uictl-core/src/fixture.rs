//! A file-backed UI surface.
//!
//! [`FixtureDriver`] serves a [`ScreenDump`] loaded from JSON and records every
//! tap it receives instead of injecting input. The server uses it when no
//! live tree provider is attached, and the dump can be swapped at runtime to
//! simulate navigation.

use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::driver::{AutomationDriver, DriverError};
use crate::element::ScreenDump;

/// A tap received by the fixture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedTap {
    pub x: i32,
    pub y: i32,
    pub at: DateTime<Utc>,
}

/// Driver serving a static screen dump.
#[derive(Debug, Default)]
pub struct FixtureDriver {
    dump: RwLock<ScreenDump>,
    taps: RwLock<Vec<RecordedTap>>,
}

impl FixtureDriver {
    pub fn new(dump: ScreenDump) -> Self {
        Self {
            dump: RwLock::new(dump),
            taps: RwLock::new(Vec::new()),
        }
    }

    /// A fixture with no windows on screen.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads a dump from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        Ok(Self::new(read_dump(path.as_ref())?))
    }

    /// Replaces the served dump with the contents of a JSON file.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<(), DriverError> {
        let dump = read_dump(path.as_ref())?;
        self.set_dump(dump);
        Ok(())
    }

    /// Replaces the served dump.
    pub fn set_dump(&self, dump: ScreenDump) {
        let windows = dump.windows.len();
        match self.dump.write() {
            Ok(mut guard) => *guard = dump,
            Err(poisoned) => *poisoned.into_inner() = dump,
        }
        info!(windows, "fixture screen replaced");
    }

    /// Taps received so far, oldest first.
    pub fn taps(&self) -> Vec<RecordedTap> {
        match self.taps.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

fn read_dump(path: &Path) -> Result<ScreenDump, DriverError> {
    let json = std::fs::read_to_string(path)?;
    ScreenDump::from_json(&json).map_err(|e| DriverError::JsonParse(e.to_string()))
}

#[async_trait]
impl AutomationDriver for FixtureDriver {
    async fn dump_tree(&self) -> Result<ScreenDump, DriverError> {
        self.dump
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| DriverError::CommandFailed("fixture lock poisoned".to_string()))
    }

    async fn tap_location(&self, x: i32, y: i32) -> Result<(), DriverError> {
        let tap = RecordedTap { x, y, at: Utc::now() };
        self.taps
            .write()
            .map_err(|_| DriverError::CommandFailed("fixture lock poisoned".to_string()))?
            .push(tap);
        info!(x, y, "fixture tap recorded");
        Ok(())
    }
}
