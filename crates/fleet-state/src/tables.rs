//! redb table definitions for the fleet state store.
//!
//! Both tables use `&str` record-id keys and `&[u8]` values holding
//! JSON-serialized records.

use redb::TableDefinition;

use crate::types::RecordKind;

pub type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Appliance records keyed by appliance id.
pub const APPLIANCES: RecordTable = TableDefinition::new("appliances");

/// Load-balancer records keyed by load-balancer id.
pub const LOAD_BALANCERS: RecordTable = TableDefinition::new("load_balancers");

pub(crate) fn table_for(kind: RecordKind) -> RecordTable {
    match kind {
        RecordKind::Appliance => APPLIANCES,
        RecordKind::LoadBalancer => LOAD_BALANCERS,
    }
}
