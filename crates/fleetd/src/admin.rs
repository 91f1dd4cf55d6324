//! Record admin subcommands.
//!
//! `delete` only soft-deletes; the cleanup routine purges the row once it
//! has aged past its retention.

use chrono::Utc;
use clap::Subcommand;

use fleet_core::{AxapiVersion, parse_undercloud};
use fleet_state::{
    ApplianceRecord, Credentials, LoadBalancerRecord, RecordKind, StateError, StateStore,
};

#[derive(Subcommand)]
pub enum ApplianceCommand {
    /// Register an appliance.
    Add {
        #[arg(long)]
        project_id: String,
        #[arg(long)]
        device_name: String,
        #[arg(long)]
        ip: String,
        #[arg(long, default_value = "shared")]
        partition: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        amphora_id: Option<String>,
        /// "2.1" selects the legacy API; anything else means 3.0.
        #[arg(long, default_value = "3.0")]
        axapi_version: String,
        #[arg(long, default_value = "false")]
        undercloud: String,
        #[arg(long)]
        loadbalancer_id: Option<String>,
    },

    /// Change fields of an existing appliance.
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        project_id: Option<String>,
        #[arg(long)]
        device_name: Option<String>,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        partition: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        amphora_id: Option<String>,
        #[arg(long)]
        axapi_version: Option<String>,
        #[arg(long)]
        undercloud: Option<String>,
        #[arg(long, conflicts_with = "unassign")]
        loadbalancer_id: Option<String>,
        /// Return the appliance to the spare pool.
        #[arg(long)]
        unassign: bool,
    },

    /// Soft-delete an appliance.
    Delete {
        #[arg(long)]
        id: String,
    },

    /// Print every appliance as JSON lines, passwords masked.
    List,
}

#[derive(Subcommand)]
pub enum LoadBalancerCommand {
    /// Register a load balancer.
    Add {
        #[arg(long)]
        project_id: String,
        #[arg(long)]
        name: String,
    },

    /// Soft-delete a load balancer.
    Delete {
        #[arg(long)]
        id: String,
    },

    /// Print every load balancer as JSON lines.
    List,
}

pub fn appliance(state: &StateStore, cmd: ApplianceCommand) -> anyhow::Result<()> {
    match cmd {
        ApplianceCommand::Add {
            project_id,
            device_name,
            ip,
            partition,
            username,
            password,
            amphora_id,
            axapi_version,
            undercloud,
            loadbalancer_id,
        } => {
            let id = uuid::Uuid::new_v4().to_string();
            let mut record =
                ApplianceRecord::new(&id, project_id, device_name, ip, partition, Utc::now());
            record.credentials = Credentials::new(username, password);
            record.amphora_id = amphora_id;
            record.axapi_version = AxapiVersion::parse_lenient(&axapi_version);
            record.undercloud = parse_undercloud(&undercloud);
            record.loadbalancer_id = loadbalancer_id;
            state.put_appliance(&record)?;
            println!("appliance {id} created");
        }
        ApplianceCommand::Update {
            id,
            project_id,
            device_name,
            ip,
            partition,
            username,
            password,
            amphora_id,
            axapi_version,
            undercloud,
            loadbalancer_id,
            unassign,
        } => {
            let Some(mut record) = state.get_appliance(&id)? else {
                return Err(not_found(RecordKind::Appliance, id));
            };
            if let Some(v) = project_id {
                record.project_id = v;
            }
            if let Some(v) = device_name {
                record.device_name = v;
            }
            if let Some(v) = ip {
                record.ip_address = v;
            }
            if let Some(v) = partition {
                record.partition_name = v;
            }
            if let Some(v) = username {
                record.credentials.username = v;
            }
            if let Some(v) = password {
                record.credentials.password = v;
            }
            if amphora_id.is_some() {
                record.amphora_id = amphora_id;
            }
            if let Some(v) = axapi_version {
                record.axapi_version = AxapiVersion::parse_lenient(&v);
            }
            if let Some(v) = undercloud {
                record.undercloud = parse_undercloud(&v);
            }
            if loadbalancer_id.is_some() {
                record.loadbalancer_id = loadbalancer_id;
            } else if unassign {
                record.loadbalancer_id = None;
            }
            record.updated_at = Utc::now();
            state.put_appliance(&record)?;
            println!("appliance {id} updated");
        }
        ApplianceCommand::Delete { id } => {
            if !state.soft_delete_appliance(&id, Utc::now())? {
                return Err(not_found(RecordKind::Appliance, id));
            }
            println!("appliance {id} deleted");
        }
        ApplianceCommand::List => {
            for mut record in state.list_appliances()? {
                if !record.credentials.password.is_empty() {
                    record.credentials.password = "********".to_string();
                }
                println!("{}", serde_json::to_string(&record)?);
            }
        }
    }
    Ok(())
}

pub fn load_balancer(state: &StateStore, cmd: LoadBalancerCommand) -> anyhow::Result<()> {
    match cmd {
        LoadBalancerCommand::Add { project_id, name } => {
            let id = uuid::Uuid::new_v4().to_string();
            state.put_load_balancer(&LoadBalancerRecord::new(&id, project_id, name, Utc::now()))?;
            println!("load balancer {id} created");
        }
        LoadBalancerCommand::Delete { id } => {
            if !state.soft_delete_load_balancer(&id, Utc::now())? {
                return Err(not_found(RecordKind::LoadBalancer, id));
            }
            println!("load balancer {id} deleted");
        }
        LoadBalancerCommand::List => {
            for record in state.list_load_balancers()? {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
    }
    Ok(())
}

fn not_found(kind: RecordKind, id: String) -> anyhow::Error {
    StateError::NotFound { kind, id }.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(state: &StateStore) -> String {
        appliance(
            state,
            ApplianceCommand::Add {
                project_id: "p1".to_string(),
                device_name: "vt-1".to_string(),
                ip: "10.0.0.1".to_string(),
                partition: "shared".to_string(),
                username: "admin".to_string(),
                password: "a10".to_string(),
                amphora_id: Some("amp-1".to_string()),
                axapi_version: "21".to_string(),
                undercloud: "True".to_string(),
                loadbalancer_id: None,
            },
        )
        .unwrap();
        state.list_appliances().unwrap().remove(0).id
    }

    #[test]
    fn add_records_login_and_amphora() {
        let state = StateStore::open_in_memory().unwrap();
        let id = add(&state);

        let record = state.get_appliance(&id).unwrap().unwrap();
        assert_eq!(record.credentials, Credentials::new("admin", "a10"));
        assert_eq!(record.amphora_id.as_deref(), Some("amp-1"));
        assert_eq!(record.axapi_version, AxapiVersion::V21);
        assert!(record.undercloud);
    }

    #[test]
    fn update_changes_password_only() {
        let state = StateStore::open_in_memory().unwrap();
        let id = add(&state);

        appliance(
            &state,
            ApplianceCommand::Update {
                id: id.clone(),
                project_id: None,
                device_name: None,
                ip: None,
                partition: None,
                username: None,
                password: Some("rotated".to_string()),
                amphora_id: None,
                axapi_version: None,
                undercloud: None,
                loadbalancer_id: None,
                unassign: false,
            },
        )
        .unwrap();

        let record = state.get_appliance(&id).unwrap().unwrap();
        assert_eq!(record.credentials, Credentials::new("admin", "rotated"));
        assert_eq!(record.amphora_id.as_deref(), Some("amp-1"));
    }

    #[test]
    fn delete_of_unknown_load_balancer_is_not_found() {
        let state = StateStore::open_in_memory().unwrap();

        let err = load_balancer(
            &state,
            LoadBalancerCommand::Delete {
                id: "ghost".to_string(),
            },
        )
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<StateError>(),
            Some(StateError::NotFound { kind: RecordKind::LoadBalancer, id }) if id == "ghost"
        ));
        assert_eq!(err.to_string(), "load_balancer ghost not found");
    }
}
