//! Input validation module
//!
//! Checks generated tourist batches before they reach the registry, plus the
//! small set of operator inputs the API accepts.

use tracing::{debug, warn};
use validator::{Validate, ValidationErrors};

use crate::error::{AppError, AppResult};
use crate::models::{LocationPoint, Tourist};
use crate::registry::first_duplicate_id;

/// Bounds on operator-supplied inputs
pub struct InputConstraints;

impl InputConstraints {
    /// Tourists per bulk generation request
    pub const GENERATION_COUNT_MIN: u32 = 1;
    pub const GENERATION_COUNT_MAX: u32 = 50;

    /// Search box length
    pub const SEARCH_QUERY_MAX_CHARS: usize = 100;
}

/// Flatten validator field errors into one readable line
fn describe(prefix: &str, errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let msgs: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.message.as_ref().map(|c| c.as_ref()))
                .collect();
            format!("{}{}: {}", prefix, field, msgs.join(", "))
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

fn validate_point(tourist_id: &str, index: usize, point: &LocationPoint) -> AppResult<()> {
    if !point.lat.is_finite() || !point.lng.is_finite() {
        return Err(AppError::ValidationError(format!(
            "tourist {}: locationHistory[{}] coordinates must be finite numbers",
            tourist_id, index
        )));
    }

    point.validate().map_err(|errors| {
        AppError::ValidationError(format!(
            "tourist {}: {}",
            tourist_id,
            describe(&format!("locationHistory[{}].", index), &errors)
        ))
    })
}

/// Validate one generated tourist record
pub fn validate_tourist(tourist: &Tourist) -> AppResult<()> {
    if let Err(errors) = tourist.validate() {
        return Err(AppError::ValidationError(format!(
            "tourist {}: {}",
            tourist.id,
            describe("", &errors)
        )));
    }

    if let Err(errors) = tourist.kyc.validate() {
        return Err(AppError::ValidationError(format!(
            "tourist {}: {}",
            tourist.id,
            describe("kyc.", &errors)
        )));
    }

    for (index, point) in tourist.location_history.iter().enumerate() {
        validate_point(&tourist.id, index, point)?;
    }

    Ok(())
}

/// Validate a whole generated batch; ids must be unique across it
pub fn validate_generated_tourists(tourists: &[Tourist]) -> AppResult<()> {
    for tourist in tourists {
        if let Err(e) = validate_tourist(tourist) {
            warn!(tourist_id = %tourist.id, error = %e, "Generated tourist rejected");
            return Err(e);
        }
    }

    if let Some(duplicate) = first_duplicate_id(tourists) {
        warn!(tourist_id = %duplicate, "Generated batch contains duplicate ids");
        return Err(AppError::ValidationError(format!(
            "Duplicate tourist id: {}",
            duplicate
        )));
    }

    debug!(count = tourists.len(), "Generated tourist batch validation passed");
    Ok(())
}

/// Resolve the requested batch size, falling back to the configured default
pub fn validate_generation_count(requested: Option<u32>, default: u32) -> AppResult<u32> {
    let count = requested.unwrap_or(default);

    if !(InputConstraints::GENERATION_COUNT_MIN..=InputConstraints::GENERATION_COUNT_MAX)
        .contains(&count)
    {
        return Err(AppError::ValidationError(format!(
            "Generation count must be between {} and {}",
            InputConstraints::GENERATION_COUNT_MIN,
            InputConstraints::GENERATION_COUNT_MAX
        )));
    }

    Ok(count)
}

/// Search query; absent means "match everything"
pub fn validate_search_query(query: Option<&str>) -> AppResult<&str> {
    let query = query.unwrap_or("");

    if query.chars().count() > InputConstraints::SEARCH_QUERY_MAX_CHARS {
        return Err(AppError::ValidationError(format!(
            "Search query must be at most {} characters",
            InputConstraints::SEARCH_QUERY_MAX_CHARS
        )));
    }

    Ok(query)
}
