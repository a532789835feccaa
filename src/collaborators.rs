//! Interfaces to the systems the lifecycle core consumes but does not own:
//! crop listings, the user directory and the clock.
use crate::model::{Crop, CropStatus, TimeStamp, UserRecord};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

pub trait CropStore: Send + Sync {
    fn get(&self, crop_id: &str) -> anyhow::Result<Option<Crop>>;
    fn set_status(&self, crop_id: &str, status: CropStatus) -> anyhow::Result<()>;
}

pub trait UserDirectory: Send + Sync {
    fn get(&self, user_id: &str) -> anyhow::Result<Option<UserRecord>>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> TimeStamp<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimeStamp<Utc> {
        TimeStamp::new()
    }
}

/// Crop listings held in memory, for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryCropStore {
    crops: RwLock<HashMap<String, Crop>>,
}

impl MemoryCropStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, crop: Crop) -> anyhow::Result<()> {
        let mut crops = self
            .crops
            .write()
            .map_err(|_| anyhow::anyhow!("crop store lock poisoned"))?;
        crops.insert(crop.id.clone(), crop);
        Ok(())
    }
}

impl CropStore for MemoryCropStore {
    fn get(&self, crop_id: &str) -> anyhow::Result<Option<Crop>> {
        let crops = self
            .crops
            .read()
            .map_err(|_| anyhow::anyhow!("crop store lock poisoned"))?;
        Ok(crops.get(crop_id).cloned())
    }

    fn set_status(&self, crop_id: &str, status: CropStatus) -> anyhow::Result<()> {
        let mut crops = self
            .crops
            .write()
            .map_err(|_| anyhow::anyhow!("crop store lock poisoned"))?;
        let crop = crops
            .get_mut(crop_id)
            .ok_or_else(|| anyhow::anyhow!("crop {crop_id} vanished from the store"))?;
        crop.status = status;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserRecord) -> anyhow::Result<()> {
        let mut users = self
            .users
            .write()
            .map_err(|_| anyhow::anyhow!("user directory lock poisoned"))?;
        users.insert(user.id.clone(), user);
        Ok(())
    }
}

impl UserDirectory for MemoryUserDirectory {
    fn get(&self, user_id: &str) -> anyhow::Result<Option<UserRecord>> {
        let users = self
            .users
            .read()
            .map_err(|_| anyhow::anyhow!("user directory lock poisoned"))?;
        Ok(users.get(user_id).cloned())
    }
}
