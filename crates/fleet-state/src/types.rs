//! Record types persisted by the fleet state store.
//!
//! Appliance and load-balancer records share a soft-delete lifecycle:
//! deleting a record flips its status to [`RecordStatus::Deleted`] and
//! stamps `deleted_at`; the row is only physically removed once it has
//! aged past the configured retention.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleet_core::AxapiVersion;

/// Unique identifier for an appliance.
pub type ApplianceId = String;

/// Unique identifier for a load balancer.
pub type LoadBalancerId = String;

/// Lifecycle status shared by every record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Active,
    Deleted,
}

/// Which table a reclamation operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Appliance,
    LoadBalancer,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Appliance => f.write_str("appliance"),
            RecordKind::LoadBalancer => f.write_str("load_balancer"),
        }
    }
}

// ── Appliance ─────────────────────────────────────────────────────

/// A managed network appliance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplianceRecord {
    pub id: ApplianceId,
    /// Owning tenant.
    pub project_id: String,
    pub device_name: String,
    /// Management address.
    pub ip_address: String,
    /// Configuration partition on the device ("shared" for the default).
    pub partition_name: String,
    /// Compute instance backing the appliance, when it is virtual.
    #[serde(default)]
    pub amphora_id: Option<String>,
    /// Management login.
    #[serde(default)]
    pub credentials: Credentials,
    /// Load balancer this appliance serves; `None` while it sits in the
    /// spare pool.
    pub loadbalancer_id: Option<LoadBalancerId>,
    pub axapi_version: AxapiVersion,
    pub undercloud: bool,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when soft-deleted.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ApplianceRecord {
    /// A fresh, active, unassigned appliance.
    pub fn new(
        id: impl Into<String>,
        project_id: impl Into<String>,
        device_name: impl Into<String>,
        ip_address: impl Into<String>,
        partition_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            device_name: device_name.into(),
            ip_address: ip_address.into(),
            partition_name: partition_name.into(),
            amphora_id: None,
            credentials: Credentials::default(),
            loadbalancer_id: None,
            axapi_version: AxapiVersion::default(),
            undercloud: false,
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Active and not assigned to any load balancer.
    pub fn is_spare(&self) -> bool {
        self.status == RecordStatus::Active && self.loadbalancer_id.is_none()
    }

    /// Device reference handed to a device writer.
    pub fn device_ref(&self) -> DeviceRef {
        DeviceRef {
            id: self.id.clone(),
            ip_address: self.ip_address.clone(),
            partition_name: self.partition_name.clone(),
            credentials: self.credentials.clone(),
            updated_at: self.updated_at,
        }
    }
}

// ── Credentials ───────────────────────────────────────────────────

/// Device management login. `Debug` never prints the password.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ── Load balancer ─────────────────────────────────────────────────

/// A load balancer fronted by one or more appliances.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadBalancerRecord {
    pub id: LoadBalancerId,
    pub project_id: String,
    pub name: String,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl LoadBalancerRecord {
    pub fn new(
        id: impl Into<String>,
        project_id: impl Into<String>,
        name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            name: name.into(),
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

// ── Device reference ──────────────────────────────────────────────

/// One device partition that may need its running config persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceRef {
    pub id: ApplianceId,
    pub ip_address: String,
    pub partition_name: String,
    /// Login used to issue the write on the device.
    pub credentials: Credentials,
    pub updated_at: DateTime<Utc>,
}

impl DeviceRef {
    /// The `(ip, partition)` pair identifying the physical target. Several
    /// appliance rows can share one.
    pub fn partition_key(&self) -> (&str, &str) {
        (&self.ip_address, &self.partition_name)
    }
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip_address, self.partition_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("admin", "a10-secret");
        let printed = format!("{creds:?}");
        assert!(printed.contains("admin"));
        assert!(!printed.contains("a10-secret"));
    }

    #[test]
    fn device_ref_carries_login() {
        let mut record = ApplianceRecord::new("a1", "p1", "vt-1", "10.0.0.1", "shared", now());
        record.credentials = Credentials::new("admin", "pw");

        let device = record.device_ref();
        assert_eq!(device.credentials.username, "admin");
        assert_eq!(device.to_string(), "10.0.0.1:shared");
    }

    #[test]
    fn rows_without_login_fields_still_decode() {
        let record = ApplianceRecord::new("a1", "p1", "vt-1", "10.0.0.1", "shared", now());
        let mut json = serde_json::to_value(&record).unwrap();
        let row = json.as_object_mut().unwrap();
        row.remove("credentials");
        row.remove("amphora_id");

        let decoded: ApplianceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, record);
    }
}
