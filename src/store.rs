// 🗃️ Merchant Store - persistence seam for the registration workflow
//
// Two implementations:
// - InMemoryMerchantStore: RwLock'd Vec, used by tests and demos
// - SqliteMerchantStore (db.rs): the real thing
//
// Both enforce the same contract: `save` is a compare-and-set on `version`,
// `created_by` is written once by `insert` and never by `save`, and every save
// appends exactly one audit event.

use chrono::Utc;
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::db::Event;
use crate::entities::{ActorId, Merchant, MerchantId, NewMerchant};

/// Audit event type written by every successful save
pub const STATUS_CHANGED_EVENT: &str = "registration_status_changed";

/// Audit event type written by insert
pub const DRAFTED_EVENT: &str = "merchant_drafted";

pub const MERCHANT_ENTITY: &str = "merchant";

#[derive(Debug, Error)]
pub enum StoreError {
    /// Stored version moved on since the caller read the record
    #[error("Merchant {id} was modified concurrently (expected version {expected_version})")]
    Conflict { id: MerchantId, expected_version: i64 },

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored row could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

pub trait MerchantStore: Send + Sync {
    fn find_by_id(&self, id: MerchantId) -> Result<Option<Merchant>, StoreError>;

    /// Persist a new draft owned by `created_by` and return it with its id
    fn insert(&self, data: NewMerchant, created_by: ActorId) -> Result<Merchant, StoreError>;

    /// Write status and reason back if the stored version still equals
    /// `merchant.version`. Returns the stored record with the bumped version.
    fn save(&self, merchant: &Merchant, changed_by: ActorId) -> Result<Merchant, StoreError>;

    /// Audit events for one merchant, newest first
    fn audit_trail(&self, id: MerchantId) -> Result<Vec<Event>, StoreError>;
}

impl<S: MerchantStore + ?Sized> MerchantStore for Arc<S> {
    fn find_by_id(&self, id: MerchantId) -> Result<Option<Merchant>, StoreError> {
        (**self).find_by_id(id)
    }

    fn insert(&self, data: NewMerchant, created_by: ActorId) -> Result<Merchant, StoreError> {
        (**self).insert(data, created_by)
    }

    fn save(&self, merchant: &Merchant, changed_by: ActorId) -> Result<Merchant, StoreError> {
        (**self).save(merchant, changed_by)
    }

    fn audit_trail(&self, id: MerchantId) -> Result<Vec<Event>, StoreError> {
        (**self).audit_trail(id)
    }
}

/// JSON payload recorded with each status change
pub fn status_change_payload(merchant: &Merchant) -> serde_json::Value {
    serde_json::json!({
        "registration_status": merchant.registration_status.as_str(),
        "registration_status_reason": merchant.registration_status_reason,
        "version": merchant.version,
    })
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

#[derive(Default)]
struct MemoryState {
    merchants: Vec<Merchant>,
    events: Vec<Event>,
    next_id: MerchantId,
}

/// Process-local store. Clones share the same underlying state.
#[derive(Clone, Default)]
pub struct InMemoryMerchantStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryMerchantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored merchants
    pub fn count(&self) -> Result<usize, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.merchants.len())
    }
}

impl MerchantStore for InMemoryMerchantStore {
    fn find_by_id(&self, id: MerchantId) -> Result<Option<Merchant>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.merchants.iter().find(|m| m.id == id).cloned())
    }

    fn insert(&self, data: NewMerchant, created_by: ActorId) -> Result<Merchant, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;

        state.next_id += 1;
        let merchant = Merchant::draft(state.next_id, data, created_by);

        state.events.push(Event::new(
            DRAFTED_EVENT,
            MERCHANT_ENTITY,
            &merchant.id.to_string(),
            status_change_payload(&merchant),
            &created_by.to_string(),
        ));
        state.merchants.push(merchant.clone());

        Ok(merchant)
    }

    fn save(&self, merchant: &Merchant, changed_by: ActorId) -> Result<Merchant, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;

        let stored = state
            .merchants
            .iter_mut()
            .find(|m| m.id == merchant.id && m.version == merchant.version)
            .ok_or(StoreError::Conflict {
                id: merchant.id,
                expected_version: merchant.version,
            })?;

        stored.registration_status = merchant.registration_status;
        stored.registration_status_reason = merchant.registration_status_reason.clone();
        stored.version += 1;
        stored.updated_at = Utc::now();
        let saved = stored.clone();

        state.events.push(Event::new(
            STATUS_CHANGED_EVENT,
            MERCHANT_ENTITY,
            &saved.id.to_string(),
            status_change_payload(&saved),
            &changed_by.to_string(),
        ));

        Ok(saved)
    }

    fn audit_trail(&self, id: MerchantId) -> Result<Vec<Event>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        let entity_id = id.to_string();

        Ok(state
            .events
            .iter()
            .rev()
            .filter(|e| e.entity_type == MERCHANT_ENTITY && e.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================
