//! Analysis Stages
//!
//! Three pure stages over an immutable `SchemaGraph`:
//!
//! ```text
//! SchemaGraph ──► RoleDetector ──► PatternDetector ──► TensionAnalyzer
//!                      │                  ▲    │               ▲
//!                      └──────────────────┘    └───────────────┘ + Intent
//! ```
//!
//! Every stage iterates a fixed, declared list of rule objects. A rule that
//! fails (returns `Err` or panics) is isolated: its contribution is dropped,
//! a diagnostic is recorded and the remaining rules still run.

pub mod naming;
pub mod patterns;
pub mod pipeline;
pub mod roles;
pub mod tensions;

pub use patterns::{
    DetectedPattern, DetectionContext, PatternCategory, PatternDetector, PatternEvidence,
    PatternRule, PatternSignal, PatternType,
};
pub use pipeline::{analyze_schema, Analysis, Analyzer};
pub use roles::{RoleDetector, RoleRule, RoleScore, RoleType, Signal, TableRoleResult};
pub use tensions::{
    rank_tensions, Alternative, DesignTension, Effort, Severity, TensionAnalyzer, TensionCategory,
    TensionContext, TensionRule, TensionSignal,
};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::DetectionError;

/// Run one rule so that neither an `Err` nor a panic escapes the stage.
///
/// The process panic hook is left alone, so a panicking rule still prints
/// the usual "thread panicked" message to stderr on top of the diagnostic.
/// Callers that want quiet output install their own hook.
pub(crate) fn run_isolated<T>(
    rule: &str,
    f: impl FnOnce() -> Result<T, DetectionError>,
) -> Result<T, DetectionError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(DetectionError::new(rule, panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}

/// Scores are rounded so that ties compare equal regardless of summation order
pub(crate) fn round_score(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
