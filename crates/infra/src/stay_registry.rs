//! Stay existence lookup consulted before a check-in is decided.
//!
//! Reservations live outside this system. The registry only answers whether a
//! stay for `(guest, room, date)` is known; a `false` answer means no
//! `GuestCheckedIn` is ever produced for it.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use folio_guest_stay::{GuestId, RoomId};

#[derive(Debug, Error)]
pub enum StayRegistryError {
    #[error("stay registry unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait StayRegistry: Send + Sync {
    async fn exists(&self, guest_id: &GuestId, room_id: &RoomId, date: NaiveDate) -> Result<bool, StayRegistryError>;
}

#[async_trait]
impl<R> StayRegistry for Arc<R>
where
    R: StayRegistry + ?Sized,
{
    async fn exists(&self, guest_id: &GuestId, room_id: &RoomId, date: NaiveDate) -> Result<bool, StayRegistryError> {
        (**self).exists(guest_id, room_id, date).await
    }
}

type StayKey = (GuestId, RoomId, NaiveDate);

/// In-memory registry for tests/dev.
///
/// `allow_all()` accepts every stay; otherwise only registered stays exist.
#[derive(Debug, Default)]
pub struct InMemoryStayRegistry {
    allow_all: bool,
    stays: RwLock<HashSet<StayKey>>,
}

impl InMemoryStayRegistry {
    /// Empty registry: no stay exists until registered.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            stays: RwLock::default(),
        }
    }

    pub fn register(&self, guest_id: GuestId, room_id: RoomId, date: NaiveDate) {
        if let Ok(mut stays) = self.stays.write() {
            stays.insert((guest_id, room_id, date));
        }
    }
}

#[async_trait]
impl StayRegistry for InMemoryStayRegistry {
    async fn exists(&self, guest_id: &GuestId, room_id: &RoomId, date: NaiveDate) -> Result<bool, StayRegistryError> {
        if self.allow_all {
            return Ok(true);
        }
        let stays = self
            .stays
            .read()
            .map_err(|_| StayRegistryError::Unavailable("lock poisoned".to_string()))?;
        Ok(stays.contains(&(guest_id.clone(), room_id.clone(), date)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[tokio::test]
    async fn only_registered_stays_exist() {
        let registry = InMemoryStayRegistry::new();
        let guest = GuestId::new("g-1").unwrap();
        let room = RoomId::new("12").unwrap();

        assert!(!registry.exists(&guest, &room, date()).await.unwrap());

        registry.register(guest.clone(), room.clone(), date());
        assert!(registry.exists(&guest, &room, date()).await.unwrap());

        let next_day = date().succ_opt().unwrap();
        assert!(!registry.exists(&guest, &room, next_day).await.unwrap());
    }

    #[tokio::test]
    async fn allow_all_accepts_anything() {
        let registry = InMemoryStayRegistry::allow_all();
        let guest = GuestId::new("anyone").unwrap();
        let room = RoomId::new("anywhere").unwrap();
        assert!(registry.exists(&guest, &room, date()).await.unwrap());
    }
}
