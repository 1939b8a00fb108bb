//! Centralized validation and helper functions.

use crate::core::iupac::{InvalidCodeError, IupacPattern};

/// Maximum number of work units one query may fan out to (DOS protection)
pub const MAX_WORK_UNITS: usize = 100_000;

/// Maximum length of a query allele
pub const MAX_BASES_LENGTH: usize = 10_000;

/// Maximum length of a dataset identifier
pub const MAX_DATASET_ID_LENGTH: usize = 255;

/// Maximum length of a variant file location
pub const MAX_LOCATION_LENGTH: usize = 4096;

/// Request validation error types
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error(transparent)]
    InvalidBases(InvalidCodeError),

    #[error("Allele of length {0} exceeds maximum of {MAX_BASES_LENGTH}")]
    BasesTooLong(usize),

    #[error("Either alternate bases or a variant type is required")]
    MissingAlleleCriterion,

    #[error("Region start {start} is after region end {end}")]
    InvertedRegion { start: u64, end: u64 },

    #[error("Minimum end {end_min} is after maximum end {end_max}")]
    InvertedEndRange { end_min: u64, end_max: u64 },

    #[error("Split size must be positive")]
    ZeroSplitSize,

    #[error("Query needs {0} work units, exceeding maximum of {MAX_WORK_UNITS}")]
    TooManyWorkUnits(usize),

    #[error("Invalid dataset id: {0}")]
    InvalidDatasetId(String),

    #[error("Invalid variant file location")]
    InvalidLocation,
}

/// Parse and bound-check a query allele.
///
/// # Errors
///
/// Returns `ValidationError::BasesTooLong` or `ValidationError::InvalidBases`.
pub fn validate_bases(bases: &str) -> Result<IupacPattern, ValidationError> {
    if bases.len() > MAX_BASES_LENGTH {
        return Err(ValidationError::BasesTooLong(bases.len()));
    }
    IupacPattern::parse(bases).map_err(ValidationError::InvalidBases)
}

/// Check the region and end bounds of a query.
///
/// # Errors
///
/// Returns an error if either range is inverted.
pub fn validate_bounds(
    region_start: u64,
    region_end: u64,
    end_min: u64,
    end_max: u64,
) -> Result<(), ValidationError> {
    if region_start > region_end {
        return Err(ValidationError::InvertedRegion {
            start: region_start,
            end: region_end,
        });
    }
    if end_min > end_max {
        return Err(ValidationError::InvertedEndRange { end_min, end_max });
    }
    Ok(())
}

/// Check if a fan-out of `count` work units is allowed.
///
/// # Errors
///
/// Returns `ValidationError::TooManyWorkUnits` above [`MAX_WORK_UNITS`].
pub fn check_work_unit_limit(count: usize) -> Result<(), ValidationError> {
    if count > MAX_WORK_UNITS {
        Err(ValidationError::TooManyWorkUnits(count))
    } else {
        Ok(())
    }
}

/// Dataset ids become cache path components, so restrict them to a safe alphabet.
///
/// # Errors
///
/// Returns `ValidationError::InvalidDatasetId` for empty, overlong, or
/// path-like identifiers.
pub fn validate_dataset_id(id: &str) -> Result<(), ValidationError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_DATASET_ID_LENGTH
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidDatasetId(id.to_string()))
    }
}

/// Locations are handed to file readers and to `bcftools` argv, so reject
/// anything that could be read as an option.
///
/// # Errors
///
/// Returns `ValidationError::InvalidLocation` for empty, overlong,
/// option-like, or control-character locations.
pub fn validate_location(location: &str) -> Result<(), ValidationError> {
    let valid = !location.is_empty()
        && location.len() <= MAX_LOCATION_LENGTH
        && !location.starts_with('-')
        && !location.chars().any(char::is_control);
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidLocation)
    }
}
