// 🏪 Merchant Entity - registration record + approval status
//
// A merchant is drafted by one portal user (created_by) and then moves through
// the registration status workflow. The id is assigned by the store and never
// changes; created_by is written once at insert time and never again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::actor::ActorId;

/// Store-assigned merchant identifier
pub type MerchantId = i64;

/// Reason recorded when a draft is first submitted
pub const DRAFTING_REASON: &str = "Drafting Merchant";

/// Reason recorded when the drafting actor marks a merchant ready for review
pub const READY_TO_REVIEW_REASON: &str = "Ready to Review";

// ============================================================================
// REGISTRATION STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationStatus {
    /// Initial state, assigned at draft submission
    Draft,

    /// Drafting actor asked for a review
    Review,

    Approved,

    Rejected,
}

impl RegistrationStatus {
    pub const ALL: [RegistrationStatus; 4] = [
        RegistrationStatus::Draft,
        RegistrationStatus::Review,
        RegistrationStatus::Approved,
        RegistrationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Draft => "Draft",
            RegistrationStatus::Review => "Review",
            RegistrationStatus::Approved => "Approved",
            RegistrationStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RegistrationStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown registration status: {}", s))
    }
}

// ============================================================================
// DRAFT ATTRIBUTES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MerchantType {
    Individual,
    #[serde(rename = "Small Shop")]
    SmallShop,
    #[serde(rename = "Chain Store")]
    ChainStore,
}

impl MerchantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MerchantType::Individual => "Individual",
            MerchantType::SmallShop => "Small Shop",
            MerchantType::ChainStore => "Chain Store",
        }
    }
}

impl FromStr for MerchantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Individual" => Ok(MerchantType::Individual),
            "Small Shop" => Ok(MerchantType::SmallShop),
            "Chain Store" => Ok(MerchantType::ChainStore),
            other => Err(format!("Unknown merchant type: {}", other)),
        }
    }
}

/// Headcount bracket, serialized with the portal's display labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumberOfEmployees {
    #[serde(rename = "1 - 5")]
    OneToFive,
    #[serde(rename = "6 - 10")]
    SixToTen,
    #[serde(rename = "11 - 50")]
    ElevenToFifty,
    #[serde(rename = "51 - 100")]
    FiftyOneToHundred,
    #[serde(rename = "100 +")]
    HundredPlus,
}

impl NumberOfEmployees {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberOfEmployees::OneToFive => "1 - 5",
            NumberOfEmployees::SixToTen => "6 - 10",
            NumberOfEmployees::ElevenToFifty => "11 - 50",
            NumberOfEmployees::FiftyOneToHundred => "51 - 100",
            NumberOfEmployees::HundredPlus => "100 +",
        }
    }
}

impl FromStr for NumberOfEmployees {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1 - 5" => Ok(NumberOfEmployees::OneToFive),
            "6 - 10" => Ok(NumberOfEmployees::SixToTen),
            "11 - 50" => Ok(NumberOfEmployees::ElevenToFifty),
            "51 - 100" => Ok(NumberOfEmployees::FiftyOneToHundred),
            "100 +" => Ok(NumberOfEmployees::HundredPlus),
            other => Err(format!("Unknown employee bracket: {}", other)),
        }
    }
}

/// Validated draft data, ready to be inserted by a store
#[derive(Debug, Clone, PartialEq)]
pub struct NewMerchant {
    pub dba_trading_name: String,
    pub registered_name: Option<String>,
    pub employees_num: NumberOfEmployees,
    pub monthly_turnover: Option<String>,
    pub currency_code: String,
    pub category_code: String,
    pub merchant_type: MerchantType,
    pub payinto_alias: String,
    pub license_number: Option<String>,
}

// ============================================================================
// MERCHANT ENTITY
// ============================================================================

/// Merchant as stored.
///
/// Never serialize this type to a client: `created_by` identifies the
/// drafting portal user. Use [`MerchantView`] for anything leaving the process.
#[derive(Debug, Clone, PartialEq)]
pub struct Merchant {
    pub id: MerchantId,

    pub dba_trading_name: String,
    pub registered_name: Option<String>,
    pub employees_num: NumberOfEmployees,
    pub monthly_turnover: Option<String>,
    pub currency_code: String,
    pub category_code: String,
    pub merchant_type: MerchantType,
    pub payinto_alias: String,
    pub license_number: Option<String>,

    pub registration_status: RegistrationStatus,
    pub registration_status_reason: String,

    /// Drafting actor - set once at insert
    pub created_by: ActorId,

    /// Optimistic concurrency token, bumped by every save
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Merchant {
    /// Build a fresh draft record. Stores call this from `insert` once they
    /// know the id.
    pub fn draft(id: MerchantId, data: NewMerchant, created_by: ActorId) -> Self {
        let now = Utc::now();

        Merchant {
            id,
            dba_trading_name: data.dba_trading_name,
            registered_name: data.registered_name,
            employees_num: data.employees_num,
            monthly_turnover: data.monthly_turnover,
            currency_code: data.currency_code,
            category_code: data.category_code,
            merchant_type: data.merchant_type,
            payinto_alias: data.payinto_alias,
            license_number: data.license_number,
            registration_status: RegistrationStatus::Draft,
            registration_status_reason: DRAFTING_REASON.to_string(),
            created_by,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_drafted_by(&self, actor: ActorId) -> bool {
        self.created_by == actor
    }

    /// Status and reason always change together
    pub fn with_status(&self, status: RegistrationStatus, reason: impl Into<String>) -> Merchant {
        let mut next = self.clone();
        next.registration_status = status;
        next.registration_status_reason = reason.into();
        next
    }

    pub fn view(&self) -> MerchantView {
        MerchantView::from(self)
    }
}

/// Client-facing projection of a merchant. Has no `created_by`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantView {
    pub id: MerchantId,
    pub dba_trading_name: String,
    pub registered_name: Option<String>,
    pub employees_num: NumberOfEmployees,
    pub monthly_turnover: Option<String>,
    pub currency_code: String,
    pub category_code: String,
    pub merchant_type: MerchantType,
    pub payinto_alias: String,
    pub license_number: Option<String>,
    pub registration_status: RegistrationStatus,
    pub registration_status_reason: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Merchant> for MerchantView {
    fn from(m: &Merchant) -> Self {
        MerchantView {
            id: m.id,
            dba_trading_name: m.dba_trading_name.clone(),
            registered_name: m.registered_name.clone(),
            employees_num: m.employees_num,
            monthly_turnover: m.monthly_turnover.clone(),
            currency_code: m.currency_code.clone(),
            category_code: m.category_code.clone(),
            merchant_type: m.merchant_type,
            payinto_alias: m.payinto_alias.clone(),
            license_number: m.license_number.clone(),
            registration_status: m.registration_status,
            registration_status_reason: m.registration_status_reason.clone(),
            version: m.version,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl From<Merchant> for MerchantView {
    fn from(m: Merchant) -> Self {
        MerchantView::from(&m)
    }
}

// ============================================================================
// TESTS
// ============================================================================
