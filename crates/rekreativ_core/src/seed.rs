//! Baseline data for a fresh store.
//!
//! Each group (machines, clients, company profile, users) is checked and
//! filled in its own transaction, so a store that already has clients but
//! no users still gets its administrator.

use crate::config::StoreConfig;
use crate::error::CoreResult;
use crate::key::Key;
use crate::model::{
    timestamp_now, Client, CompanyProfile, Entity, HistoryEvent, Machine, MachineStatus, User,
    UserRole, DEFAULT_PROFILE_ID,
};
use crate::schema::{CLIENTS, COMPANY_PROFILE, MACHINES, USERS};
use crate::shared::StoreLocation;
use crate::store::Store;
use crate::transaction::Transaction;
use crate::types::TransactionMode;
use serde_json::{Map, Value};
use tracing::info;

/// Id of the seeded administrator.
pub const DEFAULT_ADMIN_ID: &str = "admin-default";
/// Username of the seeded administrator.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// What [`seed`] inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Example machines added.
    pub machines: usize,
    /// Example clients added.
    pub clients: usize,
    /// Default company profile created.
    pub company_profile: bool,
    /// Default administrator created.
    pub admin_user: bool,
}

impl SeedReport {
    /// True if nothing was inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Fills every empty baseline group.
pub fn seed(store: &Store) -> CoreResult<SeedReport> {
    let now = timestamp_now();
    let report = SeedReport {
        machines: fill_if_empty(store, MACHINES, || example_machines(&now))?,
        clients: fill_if_empty(store, CLIENTS, || example_clients(&now))?,
        company_profile: store.with_transaction(
            &[COMPANY_PROFILE],
            TransactionMode::ReadWrite,
            |tx| {
                if tx.get(COMPANY_PROFILE, &Key::from(DEFAULT_PROFILE_ID))?.is_some() {
                    return Ok(false);
                }
                tx.add_entity(&default_profile(&now))?;
                Ok(true)
            },
        )?,
        admin_user: fill_if_empty(store, USERS, || vec![default_admin(&now)])? > 0,
    };

    if report.is_empty() {
        info!("seed data already present");
    } else {
        info!(
            machines = report.machines,
            clients = report.clients,
            company_profile = report.company_profile,
            admin_user = report.admin_user,
            "seed data inserted"
        );
    }
    Ok(report)
}

/// Opens a store, upgrades it to `config.target_version` and seeds it.
pub fn bootstrap(location: &StoreLocation, config: StoreConfig) -> CoreResult<Store> {
    let store = match location {
        StoreLocation::Path(path) => Store::open_with_config(path, config)?,
        StoreLocation::InMemory => Store::open_in_memory_with_config(config)?,
    };
    seed(&store)?;
    Ok(store)
}

fn fill_if_empty<E, F>(store: &Store, collection: &str, records: F) -> CoreResult<usize>
where
    E: Entity,
    F: FnOnce() -> Vec<E>,
{
    store.with_transaction(&[collection], TransactionMode::ReadWrite, |tx| {
        if tx.count(collection)? > 0 {
            return Ok(0);
        }
        add_all(tx, &records())
    })
}

fn add_all<E: Entity>(tx: &mut Transaction<'_>, records: &[E]) -> CoreResult<usize> {
    for record in records {
        tx.add_entity(record)?;
    }
    Ok(records.len())
}

fn example_machines(now: &str) -> Vec<Machine> {
    let machine = |id: &str,
                   serial: &str,
                   kind: &str,
                   model: &str,
                   brand: &str,
                   cost: f64,
                   bought: &str| Machine {
        id: id.to_string(),
        serial_number: serial.to_string(),
        machine_type: kind.to_string(),
        model: model.to_string(),
        brand: brand.to_string(),
        cost,
        purchase_date: Some(bought.to_string()),
        status: MachineStatus::Warehouse,
        client_id: None,
        current_counter: 0,
        initial_counter: 0,
        split_percentage: 50.0,
        created_at: now.to_string(),
        updated_at: now.to_string(),
        history: vec![HistoryEvent {
            date: now.to_string(),
            action: "created".to_string(),
            details: "Example machine".to_string(),
        }],
        extra: Map::new(),
    };
    vec![
        machine("M001", "PIN001", "pinball", "Pinball Deluxe", "Stern", 5000.0, "2023-01-15"),
        machine("M002", "ARC001", "arcade", "Arcade Classic", "Namco", 3000.0, "2023-02-20"),
    ]
}

struct ExampleClient<'a> {
    id: i64,
    name: &'a str,
    business_type: &'a str,
    owner: &'a str,
    address: &'a str,
    city: &'a str,
    postal_code: &'a str,
    phone: &'a str,
    email: &'a str,
}

fn example_clients(now: &str) -> Vec<Client> {
    [
        ExampleClient {
            id: 1,
            name: "Bar El Rincón",
            business_type: "Bar",
            owner: "Juan Pérez",
            address: "Calle Mayor 15",
            city: "Madrid",
            postal_code: "28001",
            phone: "912345678",
            email: "info@barelrincon.com",
        },
        ExampleClient {
            id: 2,
            name: "Cafetería Central",
            business_type: "Cafetería",
            owner: "María López",
            address: "Plaza España 3",
            city: "Barcelona",
            postal_code: "08001",
            phone: "932345678",
            email: "info@cafeteriacentral.com",
        },
    ]
    .into_iter()
    .map(|c| {
        let mut extra = Map::new();
        extra.insert("province".to_string(), Value::String(c.city.to_string()));
        Client {
            id: c.id,
            name: c.name.to_string(),
            business_type: Some(c.business_type.to_string()),
            owner: Some(c.owner.to_string()),
            address: Some(c.address.to_string()),
            city: Some(c.city.to_string()),
            postal_code: Some(c.postal_code.to_string()),
            phone: Some(c.phone.to_string()),
            email: Some(c.email.to_string()),
            machines: 0,
            created_at: now.to_string(),
            updated_at: now.to_string(),
            extra,
        }
    })
    .collect()
}

fn default_profile(now: &str) -> CompanyProfile {
    CompanyProfile {
        id: DEFAULT_PROFILE_ID.to_string(),
        name: "Mi Empresa".to_string(),
        address: None,
        tax_id: None,
        phone: None,
        email: None,
        vat_percentage: 21.0,
        created_at: now.to_string(),
        updated_at: now.to_string(),
        extra: Map::new(),
    }
}

fn default_admin(now: &str) -> User {
    User {
        id: DEFAULT_ADMIN_ID.to_string(),
        username: DEFAULT_ADMIN_USERNAME.to_string(),
        password: "admin".to_string(),
        name: "Administrador".to_string(),
        role: UserRole::Admin,
        created_at: now.to_string(),
        extra: Map::new(),
    }
}
