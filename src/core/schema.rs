//! Two-phase request validation: [`normalize`] rewrites categorical text into
//! its canonical form, then [`check`] enforces every field constraint.

use crate::domain::model::{
    PassengerClass, Port, RawPredictionRequest, Sex, ValidatedRequest, Vocabulary,
};
use crate::utils::error::{ValidationError, ValidationField};
use serde_json::Number;

/// A request with canonical categorical text, not yet checked.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    pub pclass: Number,
    pub age: Option<f64>,
    pub fare: Option<f64>,
    pub sibsp: Number,
    pub parch: Number,
    pub sex: String,
    pub embarked: String,
}

pub fn normalize_sex(value: &str) -> String {
    value.trim().to_lowercase()
}

pub fn normalize_port(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Normalizes and looks up a sex label. Used by training so both paths agree.
pub fn parse_sex(value: &str) -> Option<Sex> {
    Sex::from_label(&normalize_sex(value))
}

pub fn parse_port(value: &str) -> Option<Port> {
    Port::from_label(&normalize_port(value))
}

pub fn normalize(raw: RawPredictionRequest) -> NormalizedRequest {
    NormalizedRequest {
        pclass: raw.pclass,
        age: raw.age,
        fare: raw.fare,
        sibsp: raw.sibsp,
        parch: raw.parch,
        sex: normalize_sex(&raw.sex),
        embarked: normalize_port(&raw.embarked),
    }
}

pub fn check(request: NormalizedRequest) -> Result<ValidatedRequest, ValidationError> {
    let code = check_integer(ValidationField::Pclass, &request.pclass)?;
    let pclass = PassengerClass::from_code(code).ok_or_else(|| {
        ValidationError::new(
            ValidationField::Pclass,
            format!("must be 1, 2 or 3 (got {})", request.pclass),
        )
    })?;

    let age = check_measure(ValidationField::Age, request.age)?;
    let fare = check_measure(ValidationField::Fare, request.fare)?;
    let sibsp = check_count(ValidationField::Sibsp, &request.sibsp)?;
    let parch = check_count(ValidationField::Parch, &request.parch)?;

    let sex = Sex::from_label(&request.sex)
        .ok_or_else(|| not_in_vocabulary::<Sex>(ValidationField::Sex, &request.sex))?;
    let embarked = Port::from_label(&request.embarked)
        .ok_or_else(|| not_in_vocabulary::<Port>(ValidationField::Embarked, &request.embarked))?;

    Ok(ValidatedRequest {
        pclass,
        age,
        fare,
        sibsp,
        parch,
        sex,
        embarked,
    })
}

pub fn validate(raw: RawPredictionRequest) -> Result<ValidatedRequest, ValidationError> {
    check(normalize(raw))
}

fn check_measure(
    field: ValidationField,
    value: Option<f64>,
) -> Result<Option<f64>, ValidationError> {
    match value {
        Some(v) if !v.is_finite() => Err(ValidationError::new(field, "must be a finite number")),
        Some(v) if v < 0.0 => Err(ValidationError::new(
            field,
            format!("must be greater than or equal to 0 (got {})", v),
        )),
        other => Ok(other),
    }
}

/// Integers, or floats with no fractional part (`3.0`).
fn check_integer(field: ValidationField, value: &Number) -> Result<i64, ValidationError> {
    if let Some(v) = value.as_i64() {
        return Ok(v);
    }
    match value.as_f64() {
        Some(v) if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 => {
            Ok(v as i64)
        }
        _ => Err(ValidationError::new(
            field,
            format!("must be a whole number (got {})", value),
        )),
    }
}

fn check_count(field: ValidationField, value: &Number) -> Result<u32, ValidationError> {
    let value = check_integer(field, value)?;
    if value < 0 {
        return Err(ValidationError::new(
            field,
            format!("must be greater than or equal to 0 (got {})", value),
        ));
    }
    u32::try_from(value)
        .map_err(|_| ValidationError::new(field, format!("must be at most {}", u32::MAX)))
}

fn not_in_vocabulary<V: Vocabulary>(field: ValidationField, value: &str) -> ValidationError {
    let allowed = V::LABELS
        .iter()
        .map(|label| format!("'{}'", label))
        .collect::<Vec<_>>()
        .join(", ");
    ValidationError::new(
        field,
        format!("must be one of {} (got '{}')", allowed, value),
    )
}
