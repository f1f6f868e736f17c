//! Conformance harness for stackio.
//!
//! Replays the end-to-end pipeline scenarios and the quantified stream
//! laws against the library, collecting a machine-readable report that
//! can be diffed across revisions.

pub mod report;
pub mod scenarios;

pub use report::{Report, ReportError, ScenarioResult};
pub use scenarios::{all_scenarios, Scenario};

/// Run every scenario whose name contains `filter` (all when empty).
pub fn run_filtered(filter: &str) -> Report {
    let mut results = Vec::new();
    for scenario in all_scenarios() {
        if !filter.is_empty() && !scenario.name.contains(filter) {
            continue;
        }
        let outcome = (scenario.run)();
        results.push(ScenarioResult {
            name: scenario.name.to_owned(),
            section: scenario.section.to_owned(),
            passed: outcome.is_ok(),
            detail: outcome.err(),
        });
    }
    Report::new(results)
}
