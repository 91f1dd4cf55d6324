//! StateStore — redb-backed persistence for fleet records.
//!
//! Provides typed CRUD over appliances and load balancers plus the three
//! queries housekeeping depends on. All values are JSON-serialized into
//! redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use redb::{Database, ReadableDatabase, ReadableTable};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Closure turning any redb error into `StateError::Backend` for `kind`.
macro_rules! backend {
    ($kind:expr) => {
        |e| StateError::Backend {
            kind: $kind,
            reason: e.to_string(),
        }
    };
}

/// Records that support the soft-delete lifecycle.
trait SoftDelete: Serialize + DeserializeOwned {
    fn mark_deleted(&mut self, now: DateTime<Utc>);
}

impl SoftDelete for ApplianceRecord {
    fn mark_deleted(&mut self, now: DateTime<Utc>) {
        self.status = RecordStatus::Deleted;
        self.deleted_at = Some(now);
        self.updated_at = now;
    }
}

impl SoftDelete for LoadBalancerRecord {
    fn mark_deleted(&mut self, now: DateTime<Utc>) {
        self.status = RecordStatus::Deleted;
        self.deleted_at = Some(now);
        self.updated_at = now;
    }
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(|e| StateError::Open(e.to_string()))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(|e| StateError::Open(e.to_string()))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        for kind in [RecordKind::Appliance, RecordKind::LoadBalancer] {
            let txn = self.db.begin_write().map_err(backend!(kind))?;
            txn.open_table(table_for(kind)).map_err(backend!(kind))?;
            txn.commit().map_err(backend!(kind))?;
        }
        Ok(())
    }

    // ── Appliances ─────────────────────────────────────────────────

    /// Insert or replace an appliance record.
    pub fn put_appliance(&self, record: &ApplianceRecord) -> StateResult<()> {
        self.put_record(RecordKind::Appliance, &record.id, record)?;
        debug!(id = %record.id, "appliance stored");
        Ok(())
    }

    pub fn get_appliance(&self, id: &str) -> StateResult<Option<ApplianceRecord>> {
        self.get_record(RecordKind::Appliance, id)
    }

    /// List every appliance record, including soft-deleted ones.
    pub fn list_appliances(&self) -> StateResult<Vec<ApplianceRecord>> {
        self.scan(RecordKind::Appliance)
    }

    /// Mark an appliance deleted. Returns false if it does not exist.
    pub fn soft_delete_appliance(&self, id: &str, now: DateTime<Utc>) -> StateResult<bool> {
        self.soft_delete::<ApplianceRecord>(RecordKind::Appliance, id, now)
    }

    /// Physically remove an appliance record. Returns true if it existed.
    pub fn delete_appliance(&self, id: &str) -> StateResult<bool> {
        self.remove_record(RecordKind::Appliance, id)
    }

    /// Number of active appliances not assigned to a load balancer.
    pub fn count_spare_appliances(&self) -> StateResult<u32> {
        let count = self
            .list_appliances()?
            .iter()
            .filter(|a| a.is_spare())
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Ids of soft-deleted appliances whose deletion is older than
    /// `now - retention`, oldest first.
    pub fn list_expired_appliances(
        &self,
        retention: Duration,
        now: DateTime<Utc>,
    ) -> StateResult<Vec<ApplianceId>> {
        let Some(cutoff) = expiry_cutoff(now, retention) else {
            return Ok(Vec::new());
        };
        let mut expired: Vec<(DateTime<Utc>, ApplianceId)> = self
            .list_appliances()?
            .into_iter()
            .filter(|a| a.status == RecordStatus::Deleted)
            .filter_map(|a| a.deleted_at.filter(|at| *at < cutoff).map(|at| (at, a.id)))
            .collect();
        expired.sort();
        Ok(expired.into_iter().map(|(_, id)| id).collect())
    }

    /// Active appliances updated at or after `cutoff`, in update order.
    pub fn list_appliances_updated_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StateResult<Vec<DeviceRef>> {
        let mut devices: Vec<DeviceRef> = self
            .list_appliances()?
            .iter()
            .filter(|a| a.status == RecordStatus::Active && a.updated_at >= cutoff)
            .map(ApplianceRecord::device_ref)
            .collect();
        devices.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(devices)
    }

    // ── Load balancers ─────────────────────────────────────────────

    /// Insert or replace a load-balancer record.
    pub fn put_load_balancer(&self, record: &LoadBalancerRecord) -> StateResult<()> {
        self.put_record(RecordKind::LoadBalancer, &record.id, record)?;
        debug!(id = %record.id, "load balancer stored");
        Ok(())
    }

    pub fn get_load_balancer(&self, id: &str) -> StateResult<Option<LoadBalancerRecord>> {
        self.get_record(RecordKind::LoadBalancer, id)
    }

    pub fn list_load_balancers(&self) -> StateResult<Vec<LoadBalancerRecord>> {
        self.scan(RecordKind::LoadBalancer)
    }

    /// Mark a load balancer deleted. Returns false if it does not exist.
    pub fn soft_delete_load_balancer(&self, id: &str, now: DateTime<Utc>) -> StateResult<bool> {
        self.soft_delete::<LoadBalancerRecord>(RecordKind::LoadBalancer, id, now)
    }

    /// Physically remove a load-balancer record. Returns true if it existed.
    pub fn delete_load_balancer(&self, id: &str) -> StateResult<bool> {
        self.remove_record(RecordKind::LoadBalancer, id)
    }

    /// Ids of soft-deleted load balancers whose deletion is older than
    /// `now - retention`, oldest first.
    pub fn list_expired_load_balancers(
        &self,
        retention: Duration,
        now: DateTime<Utc>,
    ) -> StateResult<Vec<LoadBalancerId>> {
        let Some(cutoff) = expiry_cutoff(now, retention) else {
            return Ok(Vec::new());
        };
        let mut expired: Vec<(DateTime<Utc>, LoadBalancerId)> = self
            .list_load_balancers()?
            .into_iter()
            .filter(|lb| lb.status == RecordStatus::Deleted)
            .filter_map(|lb| lb.deleted_at.filter(|at| *at < cutoff).map(|at| (at, lb.id)))
            .collect();
        expired.sort();
        Ok(expired.into_iter().map(|(_, id)| id).collect())
    }

    // ── Table helpers ──────────────────────────────────────────────

    fn put_record<T: Serialize>(&self, kind: RecordKind, id: &str, record: &T) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(|e| encode(kind, id, e))?;
        let txn = self.db.begin_write().map_err(backend!(kind))?;
        {
            let mut table = txn.open_table(table_for(kind)).map_err(backend!(kind))?;
            table
                .insert(id, value.as_slice())
                .map_err(backend!(kind))?;
        }
        txn.commit().map_err(backend!(kind))?;
        Ok(())
    }

    fn get_record<T: DeserializeOwned>(&self, kind: RecordKind, id: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(backend!(kind))?;
        let table = txn.open_table(table_for(kind)).map_err(backend!(kind))?;
        match table.get(id).map_err(backend!(kind))? {
            Some(guard) => Ok(Some(decode(kind, id, guard.value())?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, kind: RecordKind) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(backend!(kind))?;
        let table = txn.open_table(table_for(kind)).map_err(backend!(kind))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(backend!(kind))? {
            let (id, value) = entry.map_err(backend!(kind))?;
            results.push(decode(kind, id.value(), value.value())?);
        }
        Ok(results)
    }

    fn remove_record(&self, kind: RecordKind, id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(backend!(kind))?;
        let existed;
        {
            let mut table = txn.open_table(table_for(kind)).map_err(backend!(kind))?;
            existed = table.remove(id).map_err(backend!(kind))?.is_some();
        }
        txn.commit().map_err(backend!(kind))?;
        debug!(%kind, %id, existed, "record removed");
        Ok(existed)
    }

    /// Read-modify-write inside one write transaction.
    fn soft_delete<T: SoftDelete>(
        &self,
        kind: RecordKind,
        id: &str,
        now: DateTime<Utc>,
    ) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(backend!(kind))?;
        {
            let mut table = txn.open_table(table_for(kind)).map_err(backend!(kind))?;
            let current = table
                .get(id)
                .map_err(backend!(kind))?
                .map(|guard| guard.value().to_vec());
            let Some(bytes) = current else {
                return Ok(false);
            };
            let mut record: T = decode(kind, id, &bytes)?;
            record.mark_deleted(now);
            let value = serde_json::to_vec(&record).map_err(|e| encode(kind, id, e))?;
            table
                .insert(id, value.as_slice())
                .map_err(backend!(kind))?;
        }
        txn.commit().map_err(backend!(kind))?;
        debug!(%kind, %id, "record soft-deleted");
        Ok(true)
    }
}

fn decode<T: DeserializeOwned>(kind: RecordKind, id: &str, bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StateError::Corrupt {
        kind,
        id: id.to_string(),
        reason: e.to_string(),
    })
}

fn encode(kind: RecordKind, id: &str, e: serde_json::Error) -> StateError {
    StateError::Encode {
        kind,
        id: id.to_string(),
        reason: e.to_string(),
    }
}

/// `now - retention`, or `None` when the retention reaches past the
/// representable range (nothing can be that old).
fn expiry_cutoff(now: DateTime<Utc>, retention: Duration) -> Option<DateTime<Utc>> {
    let retention = TimeDelta::from_std(retention).ok()?;
    now.checked_sub_signed(retention)
}
