//! Registration status workflow
//!
//! Decides whether an actor may move a merchant to a new registration status
//! and, if so, persists the change through a [`MerchantStore`].
//!
//! Two rules carry the weight:
//! - only the drafting actor may mark a `Draft` merchant ready for review
//! - the drafting actor may never set a post-draft status (segregation of
//!   duties)
//!
//! Failures are classified, never formatted for a transport; the caller maps
//! them to responses. Nothing here retries: a version conflict from the store
//! is returned as [`WorkflowError::Storage`] and the caller re-reads.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::db::Event;
use crate::entities::{
    Actor, Merchant, MerchantId, MerchantView, NewMerchant, RegistrationStatus,
    READY_TO_REVIEW_REASON,
};
use crate::store::{MerchantStore, StoreError};

/// Which authorization rule an actor failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationFailure {
    /// Someone other than the drafter asked for review
    NotDraftingActor,
    /// The drafter tried to review their own merchant
    DrafterCannotReview,
}

impl fmt::Display for AuthorizationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationFailure::NotDraftingActor => {
                f.write_str("Only the Hub User who submitted the Draft Merchant can mark it as Review")
            }
            AuthorizationFailure::DrafterCannotReview => {
                f.write_str("Same Hub User cannot do both Submitting and Review Checking")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Merchant not found: {0}")]
    NotFound(MerchantId),

    #[error("{0}")]
    Unauthorized(AuthorizationFailure),

    #[error("Only Draft Merchant can be marked as Review")]
    IllegalTransition {
        from: RegistrationStatus,
        to: RegistrationStatus,
    },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub struct RegistrationStatusWorkflow {
    store: Arc<dyn MerchantStore>,
}

impl RegistrationStatusWorkflow {
    pub fn new(store: Arc<dyn MerchantStore>) -> Self {
        Self { store }
    }

    fn load(&self, id: MerchantId) -> Result<Merchant, WorkflowError> {
        self.store.find_by_id(id)?.ok_or(WorkflowError::NotFound(id))
    }

    /// Accept a new draft owned by `actor`
    pub fn submit_draft(&self, actor: &Actor, draft: NewMerchant) -> Result<MerchantView, WorkflowError> {
        let merchant = self.store.insert(draft, actor.id)?;
        debug!(merchant_id = merchant.id, actor_id = actor.id, "merchant drafted");
        Ok(merchant.view())
    }

    pub fn get_merchant(&self, id: MerchantId) -> Result<MerchantView, WorkflowError> {
        Ok(self.load(id)?.view())
    }

    pub fn audit_trail(&self, id: MerchantId) -> Result<Vec<Event>, WorkflowError> {
        self.load(id)?;
        Ok(self.store.audit_trail(id)?)
    }

    /// Drafting actor marks a `Draft` merchant ready for review.
    ///
    /// State is checked before the actor, so a non-draft merchant fails with
    /// `IllegalTransition` whoever asks.
    pub fn submit_for_review(&self, id: MerchantId, actor: &Actor) -> Result<MerchantView, WorkflowError> {
        let merchant = self.load(id)?;

        if merchant.registration_status != RegistrationStatus::Draft {
            return Err(WorkflowError::IllegalTransition {
                from: merchant.registration_status,
                to: RegistrationStatus::Review,
            });
        }

        if !merchant.is_drafted_by(actor.id) {
            return Err(WorkflowError::Unauthorized(AuthorizationFailure::NotDraftingActor));
        }

        let next = merchant.with_status(RegistrationStatus::Review, READY_TO_REVIEW_REASON);
        let saved = self.store.save(&next, actor.id)?;

        debug!(merchant_id = id, actor_id = actor.id, "merchant marked ready to review");
        Ok(saved.view())
    }

    /// A reviewer (anyone but the drafter) sets the registration status.
    ///
    /// Any target is accepted once segregation of duties passes. Approved and
    /// Rejected are not terminal, and a merchant may be sent back to Draft.
    pub fn set_registration_status(
        &self,
        id: MerchantId,
        actor: &Actor,
        status: RegistrationStatus,
        reason: impl Into<String>,
    ) -> Result<MerchantView, WorkflowError> {
        let merchant = self.load(id)?;

        if merchant.is_drafted_by(actor.id) {
            return Err(WorkflowError::Unauthorized(AuthorizationFailure::DrafterCannotReview));
        }

        let from = merchant.registration_status;
        let saved = self.store.save(&merchant.with_status(status, reason), actor.id)?;

        debug!(merchant_id = id, actor_id = actor.id, %from, to = %status, "registration status set");
        Ok(saved.view())
    }
}
