// Entity Models
//
// Merchant records and the portal users (actors) who draft and review them.

pub mod actor;
pub mod merchant;

pub use actor::{Actor, ActorId};
pub use merchant::{
    Merchant, MerchantId, MerchantType, MerchantView, NewMerchant, NumberOfEmployees,
    RegistrationStatus, DRAFTING_REASON, READY_TO_REVIEW_REASON,
};
