//! Shared market fixture for the integration tests.
#![allow(dead_code)]

use agri_trade::{
    TradeEngine,
    collaborators::{CropStore, MemoryCropStore, MemoryUserDirectory},
    model::{ActingUser, Crop, CropStatus, Role, TradeStatus, UserRecord},
    utils,
};
use std::sync::Arc;
use tempfile::{TempDir, tempdir};

pub const LISTED_PRICE: u64 = 2_150;
pub const ORIGIN_STATE: &str = "Punjab";

pub struct Market {
    pub engine: TradeEngine,
    pub crops: Arc<MemoryCropStore>,
    pub users: Arc<MemoryUserDirectory>,
    pub farmer: ActingUser,
    pub buyer: ActingUser,
    pub inspector: ActingUser,
    pub admin: ActingUser,
    pub crop_id: String,
    // dropped last, after the engine has closed the db
    _dir: TempDir,
}

impl Market {
    /// A fresh engine on its own sled db with one farmer, one KYC-verified
    /// buyer, one inspector, one admin and one AVAILABLE crop.
    pub fn open() -> anyhow::Result<Self> {
        // Sled locks its directory, so every test gets its own db.
        let dir = tempdir()?;
        let db = Arc::new(sled::open(dir.path().join("market.db"))?);

        let crops = Arc::new(MemoryCropStore::new());
        let users = Arc::new(MemoryUserDirectory::new());
        let engine = TradeEngine::new(db, crops.clone(), users.clone());

        let mut market = Self {
            engine,
            crops,
            users,
            farmer: ActingUser::new("", Role::Farmer, true),
            buyer: ActingUser::new("", Role::Buyer, true),
            inspector: ActingUser::new("", Role::Inspector, true),
            admin: ActingUser::new("", Role::Admin, true),
            crop_id: String::new(),
            _dir: dir,
        };
        market.farmer = market.add_user("Gurpreet", Role::Farmer, true)?;
        market.buyer = market.add_user("Asha", Role::Buyer, true)?;
        market.inspector = market.add_user("Ravi", Role::Inspector, true)?;
        market.admin = market.add_user("Meera", Role::Admin, true)?;
        market.crop_id = market.list_crop(&market.farmer.id, LISTED_PRICE)?;

        Ok(market)
    }

    pub fn add_user(&self, name: &str, role: Role, kyc_verified: bool) -> anyhow::Result<ActingUser> {
        let user = UserRecord {
            id: utils::new_uuid_to_bech32("user")?,
            name: name.to_string(),
            role,
            kyc_verified,
        };
        self.users.insert(user.clone())?;
        Ok(ActingUser::from(&user))
    }

    pub fn list_crop(&self, farmer_id: &str, price_per_unit: u64) -> anyhow::Result<String> {
        let crop = Crop {
            id: utils::new_uuid_to_bech32("crop")?,
            farmer_id: farmer_id.to_string(),
            name: "Basmati rice".to_string(),
            price_per_unit,
            location_state: ORIGIN_STATE.to_string(),
            status: CropStatus::Available,
        };
        let id = crop.id.clone();
        self.crops.insert(crop)?;
        Ok(id)
    }

    pub fn crop(&self, crop_id: &str) -> anyhow::Result<Crop> {
        self.crops
            .get(crop_id)?
            .ok_or_else(|| anyhow::anyhow!("crop {crop_id} missing"))
    }

    pub fn event_count(&self, trade_id: &str) -> anyhow::Result<usize> {
        Ok(self.engine.list_events(trade_id)?.len())
    }

    /// A REQUESTED trade from the default buyer on the default crop.
    pub fn requested_trade(&self) -> anyhow::Result<String> {
        Ok(self.engine.initiate(&self.buyer, &self.crop_id, None)?.id)
    }

    pub fn agreed_trade(&self) -> anyhow::Result<String> {
        let trade_id = self.requested_trade()?;
        self.engine
            .update_status(&trade_id, TradeStatus::Agreed, &self.farmer)?;
        Ok(trade_id)
    }

    /// An INSPECTION_PENDING trade and the accepted inspection's id.
    pub fn pending_inspection_trade(&self) -> anyhow::Result<(String, String)> {
        let trade_id = self.agreed_trade()?;
        let inspection = self
            .engine
            .assign_inspector(&trade_id, &self.inspector.id)?;
        self.engine.respond_to_assignment(&inspection.id, true)?;
        Ok((trade_id, inspection.id))
    }

    pub fn shipped_trade(&self) -> anyhow::Result<String> {
        let (trade_id, _) = self.pending_inspection_trade()?;
        self.engine
            .complete_inspection(&trade_id, "PASSED", "A", "https://certs.example/a.pdf")?;
        Ok(trade_id)
    }

    pub fn disputed_trade(&self) -> anyhow::Result<String> {
        let (trade_id, _) = self.pending_inspection_trade()?;
        self.engine
            .complete_inspection(&trade_id, "FAILED", "C", "https://certs.example/c.pdf")?;
        Ok(trade_id)
    }

    /// Moves the trade to `status` as an admin, whatever it was before.
    pub fn force_status(&self, trade_id: &str, status: TradeStatus) -> anyhow::Result<()> {
        self.engine.update_status(trade_id, status, &self.admin)?;
        Ok(())
    }
}
