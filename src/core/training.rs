//! Offline training: CSV → labeled rows → fitted [`InferencePipeline`] →
//! `pipeline.json` + `meta.json`.
//!
//! Rows are normalized with the serving parsers and encoded with the serving
//! [`FeatureEncoder`], so the fitted weights see exactly what requests produce.

// Index loops read better than zips when walking a dense matrix.
#![allow(clippy::needless_range_loop)]

use crate::core::artifact::{
    CategoryVocabularies, TrainingMetadata, ARTIFACT_FORMAT_VERSION, DEFAULT_THRESHOLD,
};
use crate::core::features::household_size;
use crate::core::pipeline::{
    sigmoid, EncodedRow, FeatureEncoder, InferencePipeline, LogisticModel, MedianImputer,
};
use crate::core::schema::{parse_port, parse_sex};
use crate::domain::model::{RawFeatures, ENCODED_WIDTH, FEATURES_RAW, NUMERIC_WIDTH};
use crate::domain::ports::{DatasetSource, Storage};
use crate::utils::error::{AppError, Result};
use chrono::Utc;

pub const REQUIRED_COLUMNS: [&str; 8] = [
    "survived", "pclass", "age", "fare", "sibsp", "parch", "sex", "embarked",
];

/// Markers pandas-style CSV exports use for missing cells.
const MISSING_MARKERS: [&str; 6] = ["", "na", "nan", "null", "none", "n/a"];

const ARMIJO: f64 = 1e-4;
const MIN_STEP: f64 = 1e-10;
const PIVOT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub features: RawFeatures,
    pub survived: bool,
}

fn data_error(message: impl Into<String>) -> AppError {
    AppError::TrainingDataError {
        message: message.into(),
    }
}

fn is_missing(cell: &str) -> bool {
    let lowered = cell.trim().to_lowercase();
    MISSING_MARKERS.contains(&lowered.as_str())
}

fn parse_number(column: &str, cell: &str, line: usize) -> Result<Option<f64>> {
    if is_missing(cell) {
        return Ok(None);
    }
    cell.trim()
        .parse::<f64>()
        .map(Some)
        .map_err(|_| data_error(format!("line {}: {} '{}' is not a number", line, column, cell)))
}

/// Missing counts are treated as zero.
fn parse_count(column: &str, cell: &str, line: usize) -> Result<u32> {
    let Some(value) = parse_number(column, cell, line)? else {
        return Ok(0);
    };
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(data_error(format!(
            "line {}: {} must be a non-negative integer (got '{}')",
            line, column, cell
        )));
    }
    Ok(value as u32)
}

fn parse_label(cell: &str, line: usize) -> Result<bool> {
    match parse_number("survived", cell, line)? {
        Some(v) if v == 0.0 => Ok(false),
        Some(v) if v == 1.0 => Ok(true),
        Some(_) => Err(data_error(format!(
            "line {}: survived must be 0 or 1 (got '{}')",
            line, cell
        ))),
        None => Err(data_error(format!("line {}: survived is missing", line))),
    }
}

/// Parses a labeled CSV. Header matching ignores case and surrounding
/// whitespace; extra columns are ignored.
pub fn parse_dataset(bytes: &[u8]) -> Result<Vec<TrainingRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut positions = [0usize; REQUIRED_COLUMNS.len()];
    let mut missing = Vec::new();
    for (slot, column) in positions.iter_mut().zip(REQUIRED_COLUMNS) {
        match headers.iter().position(|h| h == column) {
            Some(index) => *slot = index,
            None => missing.push(column),
        }
    }
    if !missing.is_empty() {
        return Err(data_error(format!(
            "dataset is missing required columns: {}",
            missing.join(", ")
        )));
    }
    let [survived_col, pclass_col, age_col, fare_col, sibsp_col, parch_col, sex_col, embarked_col] =
        positions;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        // Header occupies line 1.
        let line = index + 2;
        let cell = |column: usize| record.get(column).unwrap_or("");

        let sibsp = parse_count("sibsp", cell(sibsp_col), line)?;
        let parch = parse_count("parch", cell(parch_col), line)?;

        rows.push(TrainingRow {
            features: RawFeatures {
                numeric: [
                    parse_number("pclass", cell(pclass_col), line)?,
                    parse_number("age", cell(age_col), line)?,
                    parse_number("fare", cell(fare_col), line)?,
                    Some(f64::from(household_size(sibsp, parch))),
                ],
                sex: parse_sex(cell(sex_col)),
                embarked: parse_port(cell(embarked_col)),
            },
            survived: parse_label(cell(survived_col), line)?,
        });
    }

    if rows.is_empty() {
        return Err(data_error("dataset has a header but no rows"));
    }
    Ok(rows)
}

/// Median of finite values, averaging the two middle values for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut observed: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if observed.is_empty() {
        return None;
    }
    observed.sort_by(f64::total_cmp);
    let mid = observed.len() / 2;
    if observed.len() % 2 == 0 {
        Some((observed[mid - 1] + observed[mid]) / 2.0)
    } else {
        Some(observed[mid])
    }
}

pub fn fit_imputer(rows: &[TrainingRow]) -> Result<MedianImputer> {
    let mut medians = [0.0; NUMERIC_WIDTH];
    for column in 0..NUMERIC_WIDTH {
        let values: Vec<f64> = rows
            .iter()
            .filter_map(|row| row.features.numeric[column])
            .collect();
        medians[column] = median(&values).ok_or_else(|| {
            data_error(format!(
                "column '{}' has no observed values to impute from",
                FEATURES_RAW[column]
            ))
        })?;
    }
    Ok(MedianImputer::new(medians))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverParams {
    /// Inverse L2 regularization strength; the intercept is not penalized.
    pub c: f64,
    pub max_iter: usize,
    /// Convergence bound on the largest component of the mean gradient.
    pub tolerance: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    pub iterations: usize,
    pub converged: bool,
    pub objective: f64,
}

fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

/// Solves `a · x = b` by Gaussian elimination with partial pivoting.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            let (upper, lower) = a.split_at_mut(row);
            let pivot_row = &upper[col];
            for k in col..n {
                lower[0][k] -= factor * pivot_row[k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// L2-regularized binary logistic regression fitted by Newton-Raphson with
/// backtracking line search. Weights are `[coefficients..., intercept]`.
#[derive(Debug, Clone, Copy)]
pub struct LogisticRegressionSolver {
    params: SolverParams,
}

impl LogisticRegressionSolver {
    pub fn new(params: SolverParams) -> Self {
        Self { params }
    }

    fn lambda(&self) -> f64 {
        1.0 / self.params.c
    }

    fn score(row: &EncodedRow, w: &[f64]) -> f64 {
        row.iter()
            .zip(w)
            .fold(w[ENCODED_WIDTH], |acc, (x, wi)| acc + x * wi)
    }

    fn objective(&self, x: &[EncodedRow], y: &[f64], w: &[f64]) -> f64 {
        let loss: f64 = x
            .iter()
            .zip(y)
            .map(|(row, label)| {
                let z = Self::score(row, w);
                softplus(z) - label * z
            })
            .sum();
        let penalty: f64 = w[..ENCODED_WIDTH].iter().map(|v| v * v).sum();
        loss + 0.5 * self.lambda() * penalty
    }

    fn gradient(&self, x: &[EncodedRow], y: &[f64], w: &[f64]) -> Vec<f64> {
        let mut grad = vec![0.0; ENCODED_WIDTH + 1];
        for (row, label) in x.iter().zip(y) {
            let residual = sigmoid(Self::score(row, w)) - label;
            for j in 0..ENCODED_WIDTH {
                grad[j] += residual * row[j];
            }
            grad[ENCODED_WIDTH] += residual;
        }
        for j in 0..ENCODED_WIDTH {
            grad[j] += self.lambda() * w[j];
        }
        grad
    }

    fn hessian(&self, x: &[EncodedRow], w: &[f64]) -> Vec<Vec<f64>> {
        let dim = ENCODED_WIDTH + 1;
        let mut h = vec![vec![0.0; dim]; dim];
        for row in x {
            let p = sigmoid(Self::score(row, w));
            let weight = (p * (1.0 - p)).max(1e-16);
            for j in 0..dim {
                let xj = if j == ENCODED_WIDTH { 1.0 } else { row[j] };
                if xj == 0.0 {
                    continue;
                }
                for k in 0..dim {
                    let xk = if k == ENCODED_WIDTH { 1.0 } else { row[k] };
                    h[j][k] += weight * xj * xk;
                }
            }
        }
        for j in 0..ENCODED_WIDTH {
            h[j][j] += self.lambda();
        }
        h
    }

    pub fn fit(&self, x: &[EncodedRow], y: &[f64]) -> Result<(LogisticModel, FitReport)> {
        if x.is_empty() || x.len() != y.len() {
            return Err(data_error("solver needs one label per encoded row"));
        }
        let positives = y.iter().filter(|label| **label == 1.0).count();
        if positives == 0 || positives == y.len() {
            return Err(data_error(
                "survived must contain both classes (0 and 1) to fit a classifier",
            ));
        }

        let bound = self.params.tolerance * x.len() as f64;
        let mut w = vec![0.0; ENCODED_WIDTH + 1];
        let mut current = self.objective(x, y, &w);
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.params.max_iter {
            let grad = self.gradient(x, y, &w);
            if max_abs(&grad) <= bound {
                converged = true;
                break;
            }

            let step = solve_linear_system(self.hessian(x, &w), grad.clone())
                .ok_or_else(|| data_error("Hessian is singular; the dataset is degenerate"))?;
            let slope: f64 = grad.iter().zip(&step).map(|(g, s)| g * s).sum();

            let mut t = 1.0;
            let accepted = loop {
                let candidate: Vec<f64> = w.iter().zip(&step).map(|(wi, si)| wi - t * si).collect();
                let value = self.objective(x, y, &candidate);
                if value.is_finite() && value <= current - ARMIJO * t * slope {
                    break Some((candidate, value));
                }
                t *= 0.5;
                if t < MIN_STEP {
                    break None;
                }
            };

            iterations += 1;
            match accepted {
                Some((next, value)) => {
                    w = next;
                    current = value;
                }
                None => {
                    tracing::debug!("Line search stalled after {} iterations", iterations);
                    break;
                }
            }
        }

        if !converged {
            converged = max_abs(&self.gradient(x, y, &w)) <= bound;
        }

        let intercept = w[ENCODED_WIDTH];
        w.truncate(ENCODED_WIDTH);
        Ok((
            LogisticModel::new(w, intercept),
            FitReport {
                iterations,
                converged,
                objective: current,
            },
        ))
    }
}

#[derive(Debug, Clone)]
pub struct TrainedPipeline {
    pub pipeline: InferencePipeline,
    pub report: FitReport,
    pub training_accuracy: f64,
    pub n_samples: usize,
}

pub fn fit_pipeline(rows: &[TrainingRow], params: &SolverParams) -> Result<TrainedPipeline> {
    let encoder = FeatureEncoder::new(fit_imputer(rows)?);
    let x: Vec<EncodedRow> = rows.iter().map(|row| encoder.encode(&row.features)).collect();
    let y: Vec<f64> = rows
        .iter()
        .map(|row| if row.survived { 1.0 } else { 0.0 })
        .collect();

    let (classifier, report) = LogisticRegressionSolver::new(*params).fit(&x, &y)?;
    let pipeline = InferencePipeline::new(encoder, classifier, DEFAULT_THRESHOLD);

    let mut correct = 0usize;
    for (encoded, row) in x.iter().zip(rows) {
        let out = pipeline.predict_encoded(encoded)?;
        if (out.prediction == 1) == row.survived {
            correct += 1;
        }
    }

    Ok(TrainedPipeline {
        pipeline,
        report,
        training_accuracy: correct as f64 / rows.len() as f64,
        n_samples: rows.len(),
    })
}

/// File names written into the job's storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    pub artifact: String,
    pub metadata: String,
}

impl Default for OutputFiles {
    fn default() -> Self {
        Self {
            artifact: "pipeline.json".to_string(),
            metadata: "meta.json".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub artifact_path: String,
    pub metadata_path: String,
    pub metadata: TrainingMetadata,
}

pub struct TrainingJob<S: Storage> {
    storage: S,
    source: Box<dyn DatasetSource>,
    params: SolverParams,
    files: OutputFiles,
}

impl<S: Storage> TrainingJob<S> {
    pub fn new(
        storage: S,
        source: Box<dyn DatasetSource>,
        params: SolverParams,
        files: OutputFiles,
    ) -> Self {
        Self {
            storage,
            source,
            params,
            files,
        }
    }

    pub async fn run(&self) -> Result<TrainingSummary> {
        tracing::info!("📥 Loading dataset from {}", self.source.location());
        let bytes = self.source.fetch().await?;
        let rows = parse_dataset(&bytes)?;
        tracing::info!("Parsed {} labeled rows", rows.len());

        let trained = fit_pipeline(&rows, &self.params)?;
        if trained.report.converged {
            tracing::info!(
                "Solver converged after {} iterations (objective {:.4})",
                trained.report.iterations,
                trained.report.objective
            );
        } else {
            tracing::warn!(
                "⚠️ Solver stopped after {} iterations without reaching tolerance {}; consider raising max_iter",
                trained.report.iterations,
                self.params.tolerance
            );
        }
        tracing::info!("Training accuracy: {:.3}", trained.training_accuracy);

        let metadata = TrainingMetadata {
            features_raw: FEATURES_RAW.iter().map(|f| f.to_string()).collect(),
            categories: CategoryVocabularies::current(),
            format_version: ARTIFACT_FORMAT_VERSION,
            trained_at: Utc::now(),
            dataset: self.source.location().to_string(),
            n_samples: trained.n_samples,
            training_accuracy: trained.training_accuracy,
            iterations: trained.report.iterations,
            converged: trained.report.converged,
        };

        let artifact_json = trained.pipeline.to_artifact().to_json_pretty()?;
        self.storage
            .write_file(&self.files.artifact, artifact_json.as_bytes())
            .await?;
        let metadata_json = serde_json::to_string_pretty(&metadata)?;
        self.storage
            .write_file(&self.files.metadata, metadata_json.as_bytes())
            .await?;

        let summary = TrainingSummary {
            artifact_path: self.storage.locate(&self.files.artifact),
            metadata_path: self.storage.locate(&self.files.metadata),
            metadata,
        };
        tracing::info!("💾 Pipeline saved to {}", summary.artifact_path);
        Ok(summary)
    }
}
