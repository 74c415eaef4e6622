// 📐 Request validation - typed request bodies -> validated domain input
//
// Request structs accept loosely typed JSON (every field optional, strings for
// enums) so that a bad body produces a field-by-field error list instead of a
// generic deserialization failure. Unknown fields are rejected.

use serde::Deserialize;

use crate::entities::{MerchantType, NewMerchant, NumberOfEmployees, RegistrationStatus};

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = Result<T, Vec<ValidationError>>;

/// Collects field errors while a request is being checked
#[derive(Default)]
struct Errors(Vec<ValidationError>);

impl Errors {
    fn required(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Some(v.to_string()),
            _ => {
                self.0.push(ValidationError::new(field, "Required field is empty"));
                None
            }
        }
    }

    /// Like `required`, but keeps the value exactly as sent
    fn present(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        self.required(field, value)?;
        value.map(str::to_string)
    }

    fn parsed<T: std::str::FromStr<Err = String>>(&mut self, field: &str, value: Option<&str>) -> Option<T> {
        let raw = self.required(field, value)?;
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(e) => {
                self.0.push(ValidationError::new(field, e));
                None
            }
        }
    }

    fn finish<T>(self, value: Option<T>) -> ValidationResult<T> {
        match value {
            Some(v) if self.0.is_empty() => Ok(v),
            _ => Err(self.0),
        }
    }
}

/// Blank optional strings count as absent
fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// STATUS CHANGE
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetStatusRequest {
    pub registration_status: Option<String>,
    pub registration_status_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub status: RegistrationStatus,
    pub reason: String,
}

impl SetStatusRequest {
    pub fn validate(&self) -> ValidationResult<StatusChange> {
        let mut errors = Errors::default();

        let status = errors.parsed::<RegistrationStatus>(
            "registration_status",
            self.registration_status.as_deref(),
        );
        let reason = errors.present(
            "registration_status_reason",
            self.registration_status_reason.as_deref(),
        );

        let change = status.zip(reason).map(|(status, reason)| StatusChange { status, reason });
        errors.finish(change)
    }
}

// ============================================================================
// MERCHANT DRAFT
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MerchantDraftRequest {
    pub dba_trading_name: Option<String>,
    pub registered_name: Option<String>,
    pub employees_num: Option<String>,
    pub monthly_turnover: Option<String>,
    pub currency_code: Option<String>,
    pub category_code: Option<String>,
    pub merchant_type: Option<String>,
    pub payinto_alias: Option<String>,
    pub license_number: Option<String>,
}

fn check_currency_code(errors: &mut Errors, value: Option<&str>) -> Option<String> {
    let code = errors.required("currency_code", value)?;
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Some(code)
    } else {
        errors.0.push(ValidationError::new(
            "currency_code",
            format!("Expected a 3-letter ISO 4217 code, got {}", code),
        ));
        None
    }
}

impl MerchantDraftRequest {
    pub fn validate(&self) -> ValidationResult<NewMerchant> {
        let mut errors = Errors::default();

        let dba_trading_name = errors.required("dba_trading_name", self.dba_trading_name.as_deref());
        let employees_num =
            errors.parsed::<NumberOfEmployees>("employees_num", self.employees_num.as_deref());
        let currency_code = check_currency_code(&mut errors, self.currency_code.as_deref());
        let category_code = errors.required("category_code", self.category_code.as_deref());
        let merchant_type = errors.parsed::<MerchantType>("merchant_type", self.merchant_type.as_deref());
        let payinto_alias = errors.required("payinto_alias", self.payinto_alias.as_deref());

        let merchant = (|| {
            Some(NewMerchant {
                dba_trading_name: dba_trading_name?,
                registered_name: optional(self.registered_name.clone()),
                employees_num: employees_num?,
                monthly_turnover: optional(self.monthly_turnover.clone()),
                currency_code: currency_code?,
                category_code: category_code?,
                merchant_type: merchant_type?,
                payinto_alias: payinto_alias?,
                license_number: optional(self.license_number.clone()),
            })
        })();

        errors.finish(merchant)
    }
}
