//! Control surface.
//!
//! The operation set exposed to callers: a typed `Operation` enum and a
//! single `dispatch` function translating a transport message into a call on
//! the engine's typed API. Results and errors cross this boundary as values.
//! Argument validation (non-empty names) happens here, before any I/O; no
//! business logic lives in this layer.

use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::provider::StateProvider;
use crate::store::SnapshotMeta;

/// One transport message per external operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    SetProfile { profile: String },
    GetProfile,
    GetProfiles,
    GetCurrent,
    GetSnapshots,
    Snapshot { name: String },
    Restore { name: String },
    Clear { name: Option<String> },
    DeleteProfile { profile: String },
}

/// Snapshot descriptor as returned over the surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDescriptor {
    pub name: String,
    pub ordinal: u64,
    pub timestamp: i64,
}

impl From<SnapshotMeta> for SnapshotDescriptor {
    fn from(meta: SnapshotMeta) -> Self {
        SnapshotDescriptor {
            name: meta.name,
            ordinal: meta.ordinal,
            timestamp: meta.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Ok,
    Profile(String),
    Profiles(Vec<String>),
    Current(Option<u64>),
    Snapshots(Vec<SnapshotDescriptor>),
}

fn require_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument(format!("{kind} name must not be empty")));
    }
    Ok(())
}

pub fn dispatch<P: StateProvider>(engine: &Engine<P>, op: Operation) -> Result<Response> {
    match op {
        Operation::SetProfile { profile } => {
            require_name("profile", &profile)?;
            engine.set_profile(&profile)?;
            Ok(Response::Ok)
        }
        Operation::GetProfile => Ok(Response::Profile(engine.active_profile())),
        Operation::GetProfiles => Ok(Response::Profiles(engine.profiles()?)),
        Operation::GetCurrent => Ok(Response::Current(engine.current_index())),
        Operation::GetSnapshots => Ok(Response::Snapshots(
            engine
                .snapshots()?
                .into_iter()
                .map(SnapshotDescriptor::from)
                .collect(),
        )),
        Operation::Snapshot { name } => {
            require_name("snapshot", &name)?;
            engine.capture(&name)?;
            Ok(Response::Ok)
        }
        Operation::Restore { name } => {
            require_name("snapshot", &name)?;
            engine.restore(&name)?;
            Ok(Response::Ok)
        }
        Operation::Clear { name } => {
            // an explicitly empty name means "clear everything", matching a
            // transport that can't express absence
            let name = name.filter(|n| !n.is_empty());
            engine.clear(name.as_deref())?;
            Ok(Response::Ok)
        }
        Operation::DeleteProfile { profile } => {
            require_name("profile", &profile)?;
            engine.delete_profile(&profile)?;
            Ok(Response::Ok)
        }
    }
}
