//! In-memory collaborator doubles shared by the reconciler tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use fleet_state::{Credentials, DeviceRef, RecordKind, StateError, StateResult};
use tokio::sync::mpsc;

use crate::collaborators::{BoxFuture, DeviceWriter, Provisioner, Repository};

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn device(id: &str, ip: &str, partition: &str) -> DeviceRef {
    DeviceRef {
        id: id.to_string(),
        ip_address: ip.to_string(),
        partition_name: partition.to_string(),
        credentials: Credentials::new("admin", "a10"),
        updated_at: at(0),
    }
}

/// Scripted repository that records every call made against it.
#[derive(Default)]
pub struct FakeRepository {
    pub spare_count: Mutex<u32>,
    /// Expired ids per kind; deletes remove from here.
    pub expired: Mutex<HashMap<RecordKind, Vec<String>>>,
    pub retention_seen: Mutex<Vec<(RecordKind, Duration)>>,
    pub fail_delete_of: Mutex<Option<String>>,
    pub deleted: Mutex<Vec<(RecordKind, String)>>,
    pub devices: Mutex<Vec<DeviceRef>>,
    pub cutoffs: Mutex<Vec<DateTime<Utc>>>,
    pub fail_queries: Mutex<bool>,
}

impl FakeRepository {
    pub fn with_spares(count: u32) -> Self {
        let repo = Self::default();
        *repo.spare_count.lock().unwrap() = count;
        repo
    }

    pub fn set_expired(&self, kind: RecordKind, ids: &[&str]) {
        self.expired
            .lock()
            .unwrap()
            .insert(kind, ids.iter().map(|s| s.to_string()).collect());
    }

    pub fn deleted_ids(&self, kind: RecordKind) -> Vec<String> {
        self.deleted
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id.clone())
            .collect()
    }

    fn check_queries(&self, kind: RecordKind) -> StateResult<()> {
        if *self.fail_queries.lock().unwrap() {
            return Err(StateError::Backend {
                kind,
                reason: "backing store unreachable".to_string(),
            });
        }
        Ok(())
    }
}

impl Repository for FakeRepository {
    fn count_spare_appliances(&self) -> StateResult<u32> {
        self.check_queries(RecordKind::Appliance)?;
        Ok(*self.spare_count.lock().unwrap())
    }

    fn list_expired(&self, kind: RecordKind, retention_age: Duration) -> StateResult<Vec<String>> {
        self.check_queries(kind)?;
        self.retention_seen.lock().unwrap().push((kind, retention_age));
        Ok(self
            .expired
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }

    fn delete(&self, kind: RecordKind, id: &str) -> StateResult<()> {
        if self.fail_delete_of.lock().unwrap().as_deref() == Some(id) {
            return Err(StateError::Backend {
                kind,
                reason: format!("cannot delete {id}"),
            });
        }
        let mut expired = self.expired.lock().unwrap();
        let ids = expired.entry(kind).or_default();
        let Some(pos) = ids.iter().position(|x| x == id) else {
            return Err(StateError::NotFound {
                kind,
                id: id.to_string(),
            });
        };
        ids.remove(pos);
        self.deleted.lock().unwrap().push((kind, id.to_string()));
        Ok(())
    }

    fn list_updated_since(&self, cutoff: DateTime<Utc>) -> StateResult<Vec<DeviceRef>> {
        self.check_queries(RecordKind::Appliance)?;
        self.cutoffs.lock().unwrap().push(cutoff);
        Ok(self.devices.lock().unwrap().clone())
    }
}

/// Provisioner that reports each request on a channel.
pub struct ChannelProvisioner {
    tx: mpsc::UnboundedSender<()>,
    fail: bool,
}

impl ChannelProvisioner {
    pub fn new(fail: bool) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, fail }, rx)
    }
}

impl Provisioner for ChannelProvisioner {
    fn request_new_appliance(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            let _ = self.tx.send(());
            if self.fail {
                anyhow::bail!("compute quota exceeded");
            }
            Ok(())
        })
    }
}

/// Provisioner whose requests never complete.
pub struct StuckProvisioner;

impl Provisioner for StuckProvisioner {
    fn request_new_appliance(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(std::future::pending())
    }
}

/// Device writer that records each batch it receives.
#[derive(Default)]
pub struct RecordingWriter {
    pub batches: Mutex<Vec<Vec<DeviceRef>>>,
    pub fail: bool,
}

impl DeviceWriter for RecordingWriter {
    fn persist<'a>(&'a self, devices: &'a [DeviceRef]) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.batches.lock().unwrap().push(devices.to_vec());
            if self.fail {
                anyhow::bail!("device {} unreachable", devices[0]);
            }
            Ok(())
        })
    }
}
