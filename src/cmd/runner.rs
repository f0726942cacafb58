//! Suite execution and report write-out.

use uuid::Uuid;

use std::path::PathBuf;
use std::time::Instant;

use crate::{
    gen_seed, render_junit_xml, run_scenario, wall_time_iso_utc, write_harness_manifest, Config,
    HarnessReport, KaleidoResult, Reporter, RunOrder, SuiteRegistry, SuiteReport, TestCounts,
};

#[derive(Debug, Clone, Default)]
pub struct HarnessOptions {
    /// Substring filter over `suite/scenario` names.
    pub filter: Option<String>,
    pub reporter: Option<Reporter>,
    pub order: Option<RunOrder>,
    pub seed: Option<u64>,
    pub fail_fast: bool,
    pub artifacts_dir: Option<PathBuf>,
}

#[derive(Debug)]
pub struct HarnessRun {
    pub report: HarnessReport,
    pub artifacts_dir: PathBuf,
    pub report_path: PathBuf,
}

pub fn list_scenarios(registry: &SuiteRegistry, filter: Option<&str>) -> Vec<String> {
    let mut names = Vec::new();
    for suite in registry.suites() {
        for scenario in &suite.scenarios {
            let name = format!("{}/{}", suite.name, scenario.name());
            if filter.map_or(true, |f| name.contains(f)) {
                names.push(name);
            }
        }
    }
    names
}

/// Runs every registered scenario (subject to the filter), expanding each
/// into its concrete variations, and writes the report artifacts.
pub fn run_suites(
    config: &Config,
    registry: &SuiteRegistry,
    opts: &HarnessOptions,
) -> KaleidoResult<HarnessRun> {
    let run_id = Uuid::new_v4().to_string();
    let order = opts.order.unwrap_or(config.order);
    let seed = opts.seed.or(config.shuffle_seed).unwrap_or_else(gen_seed);
    let reporter = opts.reporter.unwrap_or(config.reporter);

    let started_at = wall_time_iso_utc();
    let started = Instant::now();

    let mut totals = TestCounts::default();
    let mut suite_reports = Vec::new();

    'suites: for suite in registry.suites() {
        let mut counts = TestCounts::default();
        let mut variations = Vec::new();

        for scenario in &suite.scenarios {
            let full_name = format!("{}/{}", suite.name, scenario.name());
            if let Some(filter) = opts.filter.as_deref() {
                if !full_name.contains(filter) {
                    continue;
                }
            }

            tracing::info!("running scenario {full_name}");
            let reports = run_scenario(suite.name, scenario, order, seed);
            for report in reports {
                counts.add(report.status);
                variations.push(report);
            }

            if opts.fail_fast && counts.failed > 0 {
                totals.merge(counts);
                suite_reports.push(SuiteReport {
                    name: suite.name.to_string(),
                    counts,
                    variations,
                });
                break 'suites;
            }
        }

        totals.merge(counts);
        suite_reports.push(SuiteReport {
            name: suite.name.to_string(),
            counts,
            variations,
        });
    }

    let finished_at = wall_time_iso_utc();
    let report = HarnessReport {
        schema_version: "kaleido.report.v1".to_string(),
        run_id: run_id.clone(),
        order,
        seed,
        started_at,
        finished_at,
        duration_ms: started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64,
        counts: totals,
        suites: suite_reports,
    };

    let artifacts_dir = opts
        .artifacts_dir
        .clone()
        .unwrap_or_else(|| config.runs_dir().join(&run_id));
    std::fs::create_dir_all(&artifacts_dir)?;

    let report_path = artifacts_dir.join("report.json");
    std::fs::write(&report_path, serde_json::to_vec_pretty(&report)?)?;
    write_harness_manifest(&report, &artifacts_dir)?;

    if matches!(reporter, Reporter::Junit) {
        std::fs::write(artifacts_dir.join("junit.xml"), render_junit_xml(&report))?;
    }

    Ok(HarnessRun {
        report,
        artifacts_dir,
        report_path,
    })
}
