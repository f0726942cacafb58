//! Reporting types and renderers.

use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reporter {
    Pretty,
    Json,
    Junit,
}

impl clap::ValueEnum for Reporter {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Pretty, Self::Json, Self::Junit]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Pretty => clap::builder::PossibleValue::new("pretty"),
            Self::Json => clap::builder::PossibleValue::new("json"),
            Self::Junit => clap::builder::PossibleValue::new("junit"),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pass,
    Fail,
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Assertion,
    Panic,
    Usage,
    Cleanup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingLocation {
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<FindingLocation>,
}

/// One concrete variation's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationReport {
    pub name: String,
    #[serde(rename = "runId")]
    pub run_id: String,
    pub status: RunStatus,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TestCounts {
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl TestCounts {
    pub fn add(&mut self, status: RunStatus) {
        match status {
            RunStatus::Pass => self.passed += 1,
            RunStatus::Fail => self.failed += 1,
            RunStatus::Skip => self.skipped += 1,
        }
    }

    pub fn merge(&mut self, other: TestCounts) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    pub fn total(&self) -> u64 {
        self.passed + self.failed + self.skipped
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub name: String,
    pub counts: TestCounts,
    pub variations: Vec<VariationReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessReport {
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    #[serde(rename = "runId")]
    pub run_id: String,
    pub order: crate::RunOrder,
    pub seed: u64,
    #[serde(rename = "startedAt")]
    pub started_at: String,
    #[serde(rename = "finishedAt")]
    pub finished_at: String,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    pub counts: TestCounts,
    pub suites: Vec<SuiteReport>,
}

impl HarnessReport {
    pub fn all_passed(&self) -> bool {
        self.counts.failed == 0
    }

    pub fn pretty(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "runId={} order={:?} seed={}\n",
            self.run_id, self.order, self.seed
        ));
        out.push_str(&format!(
            "variations: passed={} failed={} skipped={}\n",
            self.counts.passed, self.counts.failed, self.counts.skipped
        ));
        for suite in &self.suites {
            for variation in &suite.variations {
                out.push_str(&format!(
                    "- [{:?}] {} ({}ms)\n",
                    variation.status, variation.name, variation.duration_ms
                ));
                for finding in &variation.findings {
                    out.push_str(&format!(
                        "    {:?}: {}: {}\n",
                        finding.kind, finding.title, finding.message
                    ));
                }
            }
        }
        out.trim_end().to_string()
    }
}

pub fn wall_time_iso_utc() -> String {
    // Metadata only (startedAt/finishedAt); never feeds execution decisions.
    let now = SystemTime::now();
    let dt: time::OffsetDateTime = now.into();
    dt.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessManifest {
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    #[serde(rename = "runId")]
    pub run_id: String,
    pub seed: u64,
    #[serde(rename = "startedAt")]
    pub started_at: String,
    #[serde(rename = "finishedAt")]
    pub finished_at: String,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    #[serde(rename = "variationsPassed")]
    pub variations_passed: u64,
    #[serde(rename = "variationsFailed")]
    pub variations_failed: u64,
    #[serde(rename = "variationsSkipped")]
    pub variations_skipped: u64,
    #[serde(rename = "reportPath", skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
}

pub fn write_harness_manifest(report: &HarnessReport, artifacts_dir: &Path) -> crate::KaleidoResult<PathBuf> {
    std::fs::create_dir_all(artifacts_dir)?;
    let manifest = HarnessManifest {
        schema_version: "kaleido.run_manifest.v1".to_string(),
        run_id: report.run_id.clone(),
        seed: report.seed,
        started_at: report.started_at.clone(),
        finished_at: report.finished_at.clone(),
        duration_ms: report.duration_ms,
        variations_passed: report.counts.passed,
        variations_failed: report.counts.failed,
        variations_skipped: report.counts.skipped,
        report_path: Some(artifacts_dir.join("report.json").to_string_lossy().to_string()),
    };
    let out = artifacts_dir.join("manifest.json");
    std::fs::write(&out, serde_json::to_vec_pretty(&manifest)?)?;
    Ok(out)
}

pub fn render_junit_xml(report: &HarnessReport) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    out.push('\n');
    out.push_str(&format!(
        r#"<testsuites tests="{}" failures="{}" time="{}">"#,
        report.counts.total(),
        report.counts.failed,
        (report.duration_ms as f64) / 1000.0
    ));
    out.push('\n');

    for suite in &report.suites {
        out.push_str(&format!(
            r#"<testsuite name="{}" tests="{}" failures="{}" skipped="{}">"#,
            xml_escape(suite.name.as_str()),
            suite.counts.total(),
            suite.counts.failed,
            suite.counts.skipped
        ));
        out.push('\n');
        for variation in &suite.variations {
            out.push_str(&format!(
                r#"<testcase classname="{}" name="{}" time="{}">"#,
                xml_escape(suite.name.as_str()),
                xml_escape(&variation.name),
                (variation.duration_ms as f64) / 1000.0
            ));
            match variation.status {
                RunStatus::Pass => {}
                RunStatus::Skip => out.push_str(r#"<skipped/>"#),
                RunStatus::Fail => {
                    for finding in &variation.findings {
                        out.push_str(&format!(
                            r#"<failure message="{}">{}</failure>"#,
                            xml_escape(&finding.title),
                            xml_escape(&finding.message)
                        ));
                    }
                    if variation.findings.is_empty() {
                        out.push_str(r#"<failure message="failed"/>"#);
                    }
                }
            }
            out.push_str(r#"</testcase>"#);
            out.push('\n');
        }
        out.push_str(r#"</testsuite>"#);
        out.push('\n');
    }

    out.push_str(r#"</testsuites>"#);
    out.push('\n');
    out
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> HarnessReport {
        HarnessReport {
            schema_version: "kaleido.report.v1".to_string(),
            run_id: "run-1".to_string(),
            order: crate::RunOrder::Fifo,
            seed: 7,
            started_at: "2026-01-01T00:00:00Z".to_string(),
            finished_at: "2026-01-01T00:00:01Z".to_string(),
            duration_ms: 1000,
            counts: TestCounts {
                passed: 1,
                failed: 1,
                skipped: 0,
            },
            suites: vec![SuiteReport {
                name: "Demo".to_string(),
                counts: TestCounts {
                    passed: 1,
                    failed: 1,
                    skipped: 0,
                },
                variations: vec![
                    VariationReport {
                        name: "Demo/copy/LocalBlob".to_string(),
                        run_id: "v1".to_string(),
                        status: RunStatus::Pass,
                        duration_ms: 3,
                        findings: Vec::new(),
                        log: Vec::new(),
                    },
                    VariationReport {
                        name: "Demo/copy/BlobBlob".to_string(),
                        run_id: "v2".to_string(),
                        status: RunStatus::Fail,
                        duration_ms: 4,
                        findings: vec![Finding {
                            kind: FindingKind::Assertion,
                            title: "content mismatch".to_string(),
                            message: "destination body differs".to_string(),
                            location: None,
                        }],
                        log: Vec::new(),
                    },
                ],
            }],
        }
    }

    #[test]
    fn junit_render_includes_failures_and_escapes() {
        let xml = render_junit_xml(&sample_report());
        assert!(xml.contains(r#"<testsuite name="Demo" tests="2" failures="1""#));
        assert!(xml.contains("content mismatch"));
        assert!(xml.starts_with(r#"<?xml version="1.0""#));
    }

    #[test]
    fn pretty_lists_each_variation() {
        let text = sample_report().pretty();
        assert!(text.contains("[Pass] Demo/copy/LocalBlob"));
        assert!(text.contains("[Fail] Demo/copy/BlobBlob"));
        assert!(text.contains("passed=1 failed=1 skipped=0"));
    }

    #[test]
    fn report_json_round_trips() {
        let report = sample_report();
        let raw = serde_json::to_string(&report).expect("serialize");
        assert!(raw.contains("\"runId\""));
        let back: HarnessReport = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(back.counts.total(), 2);
        assert!(!back.all_passed());
    }
}
