use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Raw feature names as the pipeline consumes them, in encoding order.
pub const FEATURES_RAW: [&str; 6] = ["pclass", "age", "fare", "household_size", "sex", "embarked"];

/// Numeric columns `[pclass, age, fare, household_size]`, imputed by median.
pub const NUMERIC_WIDTH: usize = 4;

/// Width of the encoded row: numeric block, then one-hot sex, then one-hot port.
pub const ENCODED_WIDTH: usize = NUMERIC_WIDTH + Sex::LABELS.len() + Port::LABELS.len();

/// A closed categorical vocabulary with a fixed label order.
pub trait Vocabulary: Copy + Sized + 'static {
    const LABELS: &'static [&'static str];

    fn index(self) -> usize;

    fn from_index(index: usize) -> Option<Self>;

    fn label(self) -> &'static str {
        Self::LABELS[self.index()]
    }

    /// Looks up an already normalized label.
    fn from_label(label: &str) -> Option<Self> {
        Self::LABELS
            .iter()
            .position(|candidate| *candidate == label)
            .and_then(Self::from_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassengerClass {
    First,
    Second,
    Third,
}

impl PassengerClass {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(PassengerClass::First),
            2 => Some(PassengerClass::Second),
            3 => Some(PassengerClass::Third),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            PassengerClass::First => 1,
            PassengerClass::Second => 2,
            PassengerClass::Third => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sex {
    Female,
    Male,
}

impl Vocabulary for Sex {
    const LABELS: &'static [&'static str] = &["female", "male"];

    fn index(self) -> usize {
        match self {
            Sex::Female => 0,
            Sex::Male => 1,
        }
    }

    fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Sex::Female),
            1 => Some(Sex::Male),
            _ => None,
        }
    }
}

/// Port of embarkation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    Cherbourg,
    Queenstown,
    Southampton,
}

impl Vocabulary for Port {
    const LABELS: &'static [&'static str] = &["C", "Q", "S"];

    fn index(self) -> usize {
        match self {
            Port::Cherbourg => 0,
            Port::Queenstown => 1,
            Port::Southampton => 2,
        }
    }

    fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Port::Cherbourg),
            1 => Some(Port::Queenstown),
            2 => Some(Port::Southampton),
            _ => None,
        }
    }
}

/// Body of `POST /predict` as received, before normalization. Integer fields
/// keep the JSON number so `3.0` can be accepted and `2.5` reported by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPredictionRequest {
    pub pclass: Number,
    pub age: Option<f64>,
    pub fare: Option<f64>,
    pub sibsp: Number,
    pub parch: Number,
    pub sex: String,
    pub embarked: String,
}

/// A request whose fields passed every constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedRequest {
    pub pclass: PassengerClass,
    pub age: Option<f64>,
    pub fare: Option<f64>,
    pub sibsp: u32,
    pub parch: u32,
    pub sex: Sex,
    pub embarked: Port,
}

/// The six fields the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub pclass: PassengerClass,
    pub age: Option<f64>,
    pub fare: Option<f64>,
    pub household_size: u32,
    pub sex: Sex,
    pub embarked: Port,
}

/// Encoder input shared by training and serving. Absent values are imputed
/// (numeric) or encoded as all zeros (categorical).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawFeatures {
    pub numeric: [Option<f64>; NUMERIC_WIDTH],
    pub sex: Option<Sex>,
    pub embarked: Option<Port>,
}

impl From<&FeatureRow> for RawFeatures {
    fn from(row: &FeatureRow) -> Self {
        Self {
            numeric: [
                Some(f64::from(row.pclass.code())),
                row.age,
                row.fare,
                Some(f64::from(row.household_size)),
            ],
            sex: Some(row.sex),
            embarked: Some(row.embarked),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// 0 = did not survive, 1 = survived.
    pub prediction: u8,
    /// Probability of the positive class.
    pub probability: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_round_trips_labels() {
        for label in Sex::LABELS {
            assert_eq!(Sex::from_label(label).map(Sex::label), Some(*label));
        }
        assert_eq!(Port::from_label("Q"), Some(Port::Queenstown));
        assert_eq!(Port::from_label("q"), None);
        assert_eq!(Sex::from_label("other"), None);
    }

    #[test]
    fn test_encoded_width() {
        assert_eq!(ENCODED_WIDTH, 9);
    }

    #[test]
    fn test_request_optional_fields_default_to_none() {
        let raw: RawPredictionRequest = serde_json::from_value(serde_json::json!({
            "pclass": 2, "sibsp": 0, "parch": 1, "sex": "female", "embarked": "Q"
        }))
        .unwrap();
        assert_eq!(raw.age, None);
        assert_eq!(raw.fare, None);
    }

    #[test]
    fn test_request_keeps_float_counts_for_validation() {
        let raw: RawPredictionRequest = serde_json::from_value(serde_json::json!({
            "pclass": 3.0, "sibsp": 1.5, "parch": 0, "sex": "male", "embarked": "S"
        }))
        .unwrap();
        assert_eq!(raw.pclass.as_f64(), Some(3.0));
        assert_eq!(raw.sibsp.as_f64(), Some(1.5));
    }
}
