use crate::domain::model::{FeatureRow, ValidatedRequest};

/// Siblings/spouses plus parents/children plus the passenger.
pub fn household_size(sibsp: u32, parch: u32) -> u32 {
    sibsp.saturating_add(parch).saturating_add(1)
}

impl From<ValidatedRequest> for FeatureRow {
    fn from(request: ValidatedRequest) -> Self {
        Self {
            pclass: request.pclass,
            age: request.age,
            fare: request.fare,
            household_size: household_size(request.sibsp, request.parch),
            sex: request.sex,
            embarked: request.embarked,
        }
    }
}
