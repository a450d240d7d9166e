//! Geometry: shape classification and explode-until-stable preparation

pub mod classifier;
pub mod convergence;
pub mod features;

pub use classifier::{Category, ClassificationResult, ClassifierThresholds, EntityMetrics, GeometricClassifier};
pub use convergence::{ConvergenceConfig, ConvergenceEngine, ConvergenceOutcome, ConvergenceReport, SettleConfig};
pub use features::{Feature, SelectionOutcome, find_feature, gather_metrics, select_feature};
