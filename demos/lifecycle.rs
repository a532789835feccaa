//! Walks one crop lot from request to delivery on a temporary database.
//!
//! ```text
//! RUST_LOG=info cargo run --example lifecycle
//! ```
use agri_trade::{
    TradeEngine,
    collaborators::{MemoryCropStore, MemoryUserDirectory},
    config::EngineConfig,
    model::{ActingUser, Crop, CropStatus, Role, TradeStatus, UserRecord},
    telemetry, utils,
};
use std::sync::Arc;

fn user(users: &MemoryUserDirectory, name: &str, role: Role) -> anyhow::Result<ActingUser> {
    let record = UserRecord {
        id: utils::new_uuid_to_bech32("user")?,
        name: name.to_string(),
        role,
        kyc_verified: true,
    };
    users.insert(record.clone())?;
    Ok(ActingUser::from(&record))
}

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let crops = Arc::new(MemoryCropStore::new());
    let users = Arc::new(MemoryUserDirectory::new());
    let engine = TradeEngine::from_config(&EngineConfig::new(), crops.clone(), users.clone())?;

    let farmer = user(&users, "Gurpreet", Role::Farmer)?;
    let buyer = user(&users, "Asha", Role::Buyer)?;
    let inspector = user(&users, "Ravi", Role::Inspector)?;

    let crop = Crop {
        id: utils::new_uuid_to_bech32("crop")?,
        farmer_id: farmer.id.clone(),
        name: "Durum wheat".to_string(),
        price_per_unit: 2_425,
        location_state: "Madhya Pradesh".to_string(),
        status: CropStatus::Available,
    };
    let crop_id = crop.id.clone();
    crops.insert(crop)?;

    let trade = engine.initiate(&buyer, &crop_id, Some(2_400))?;
    engine.update_status(&trade.id, TradeStatus::Agreed, &farmer)?;

    let inspection = engine.assign_inspector(&trade.id, &inspector.id)?;
    engine.respond_to_assignment(&inspection.id, true)?;
    engine.complete_inspection(&trade.id, "PASSED", "A", "https://certs.example/wheat-a.pdf")?;

    engine.update_logistics(&trade.id, "IN_TRANSIT", "Bhopal rail yard")?;
    engine.update_logistics(&trade.id, "DELIVERED", "Indore mill")?;

    let trade = engine.get_trade(&trade.id)?;
    println!("trade {} is {}", trade.id, trade.status);
    for event in engine.list_events(&trade.id)? {
        println!(
            "{:>2} {} {:<20} {}",
            event.sequence,
            event.timestamp.to_datetime_utc().format("%H:%M:%S%.3f"),
            event.event_type,
            event.description
        );
    }
    engine.event_log().verify_chain(&trade.id)?;
    println!("event chain verified");

    Ok(())
}
