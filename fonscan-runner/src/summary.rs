//! Run summary: a pure projection of the final ledger.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fonscan_core::domain::InstrumentId;

use crate::state::RunState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub name: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub no_data: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
    /// Reasons recorded for this stage's retryable failures.
    pub failures: BTreeMap<InstrumentId, String>,
}

/// Unresolved fund with its most recent failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedFund {
    pub stage: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub submitted: usize,
    pub succeeded: usize,
    pub no_data: usize,
    pub unresolved: usize,
    pub stages_run: usize,
    pub stages: Vec<StageSummary>,
    pub unresolved_funds: BTreeMap<InstrumentId, UnresolvedFund>,
    pub no_data_funds: Vec<InstrumentId>,
}

impl RunSummary {
    pub fn build(state: &RunState) -> Self {
        let stages: Vec<StageSummary> = state
            .stages()
            .iter()
            .map(|rec| StageSummary {
                name: rec.name.clone(),
                attempted: rec.attempted,
                succeeded: rec.succeeded,
                no_data: rec.no_data,
                failed: rec.failed(),
                elapsed_ms: u64::try_from(rec.elapsed.as_millis()).unwrap_or(u64::MAX),
                failures: rec.failures.clone(),
            })
            .collect();

        let unresolved_funds = state
            .pending()
            .iter()
            .map(|id| {
                let last = state.last_failure(id);
                let stage = last
                    .and_then(|f| stages.get(f.stage))
                    .map(|s| s.name.clone())
                    .unwrap_or_default();
                let reason = last.map(|f| f.reason.clone()).unwrap_or_default();
                (id.clone(), UnresolvedFund { stage, reason })
            })
            .collect();

        Self {
            submitted: state.all_ids().len(),
            succeeded: state.successes().len(),
            no_data: state.no_data().len(),
            unresolved: state.pending().len(),
            stages_run: stages.len(),
            stages,
            unresolved_funds,
            no_data_funds: state.no_data().keys().cloned().collect(),
        }
    }

    /// `succeeded + no_data + unresolved == submitted`.
    pub fn is_balanced(&self) -> bool {
        self.succeeded + self.no_data + self.unresolved == self.submitted
    }

    pub fn final_failures(&self) -> usize {
        self.no_data + self.unresolved
    }

    pub fn render_markdown(&self) -> String {
        let mut md = String::with_capacity(1024);

        md.push_str("# Run Summary\n\n");
        md.push_str("| Field | Value |\n");
        md.push_str("| --- | --- |\n");
        md.push_str(&format!("| Submitted | {} |\n", self.submitted));
        md.push_str(&format!("| Succeeded | {} |\n", self.succeeded));
        md.push_str(&format!("| No data | {} |\n", self.no_data));
        md.push_str(&format!("| Unresolved | {} |\n", self.unresolved));
        md.push_str(&format!("| Stages run | {} |\n", self.stages_run));
        md.push('\n');

        md.push_str("## Stages\n\n");
        md.push_str("| Stage | Attempted | Succeeded | No data | Failed | Elapsed |\n");
        md.push_str("| --- | --- | --- | --- | --- | --- |\n");
        for s in &self.stages {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {:.1}s |\n",
                s.name,
                s.attempted,
                s.succeeded,
                s.no_data,
                s.failed,
                s.elapsed_ms as f64 / 1000.0
            ));
        }
        md.push('\n');

        for s in self.stages.iter().filter(|s| !s.failures.is_empty()) {
            md.push_str(&format!("### Failures in {}\n\n", s.name));
            for (id, reason) in &s.failures {
                md.push_str(&format!("- `{id}`: {}\n", one_line(reason)));
            }
            md.push('\n');
        }

        if !self.unresolved_funds.is_empty() {
            md.push_str("## Unresolved\n\n");
            for (id, f) in &self.unresolved_funds {
                md.push_str(&format!(
                    "- `{id}` (last failed in {}): {}\n",
                    f.stage,
                    one_line(&f.reason)
                ));
            }
            md.push('\n');
        }

        if !self.no_data_funds.is_empty() {
            md.push_str("## No data\n\n");
            let codes: Vec<String> = self.no_data_funds.iter().map(|id| format!("`{id}`")).collect();
            md.push_str(&codes.join(", "));
            md.push_str("\n\n");
        }

        md
    }
}

/// Collapse runs of whitespace, newlines included, so a reason stays on one list line.
fn one_line(reason: &str) -> String {
    reason.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fonscan_core::data::FetchOutcome;
    use fonscan_core::domain::{PricePoint, PriceSeries};
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn id(s: &str) -> InstrumentId {
        InstrumentId::parse(s).unwrap()
    }

    fn ok(code: &str) -> FetchOutcome {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        FetchOutcome::Success(
            PriceSeries::new(id(code), None, vec![PricePoint::new(date, 1.0)]).unwrap(),
        )
    }

    fn fail(code: &str, reason: &str) -> FetchOutcome {
        FetchOutcome::Failure {
            id: id(code),
            reason: reason.into(),
        }
    }

    fn stage(list: Vec<FetchOutcome>) -> BTreeMap<InstrumentId, FetchOutcome> {
        list.into_iter().map(|o| (o.id().clone(), o)).collect()
    }

    fn sample_state() -> RunState {
        let all: BTreeSet<_> = ["A", "B", "C", "D"].iter().map(|c| id(c)).collect();
        RunState::new(all)
            .absorb_stage(
                "initial",
                stage(vec![
                    ok("A"),
                    FetchOutcome::Empty(id("B")),
                    fail("C", "HTTP 429"),
                    fail("D", "timeout"),
                ]),
                Duration::from_millis(1500),
            )
            .unwrap()
            .absorb_stage(
                "retry-1",
                stage(vec![ok("C"), fail("D", "HTTP 503")]),
                Duration::from_millis(800),
            )
            .unwrap()
    }

    #[test]
    fn counts_balance() {
        let s = RunSummary::build(&sample_state());
        assert_eq!((s.submitted, s.succeeded, s.no_data, s.unresolved), (4, 2, 1, 1));
        assert!(s.is_balanced());
        assert_eq!(s.final_failures(), 2);
        assert_eq!(s.stages_run, 2);
    }

    #[test]
    fn stage_failures_keep_history() {
        let s = RunSummary::build(&sample_state());
        assert_eq!(s.stages[0].failures.len(), 2);
        assert!(s.stages[0].failures.contains_key(&id("C")));
        assert!(!s.stages[1].failures.contains_key(&id("C")));
    }

    #[test]
    fn unresolved_carries_latest_reason_and_stage() {
        let s = RunSummary::build(&sample_state());
        let d = &s.unresolved_funds[&id("D")];
        assert_eq!(d.stage, "retry-1");
        assert_eq!(d.reason, "HTTP 503");
        assert_eq!(s.no_data_funds, vec![id("B")]);
    }

    #[test]
    fn markdown_has_sections() {
        let md = RunSummary::build(&sample_state()).render_markdown();
        assert!(md.contains("# Run Summary"));
        assert!(md.contains("| Submitted | 4 |"));
        assert!(md.contains("| initial | 4 | 1 | 1 | 2 | 1.5s |"));
        assert!(md.contains("### Failures in initial"));
        assert!(md.contains("- `D` (last failed in retry-1): HTTP 503"));
        assert!(md.contains("## No data"));
    }

    #[test]
    fn multiline_reasons_render_on_one_line() {
        let all: BTreeSet<_> = ["E"].iter().map(|c| id(c)).collect();
        let state = RunState::new(all)
            .absorb_stage(
                "initial",
                stage(vec![fail("E", "parse error\nline two\r\n  - `X`: fake")]),
                Duration::from_millis(10),
            )
            .unwrap();
        let md = RunSummary::build(&state).render_markdown();
        assert!(md.contains("- `E`: parse error line two - `X`: fake\n"));
        assert!(md.contains("- `E` (last failed in initial): parse error line two - `X`: fake\n"));
        assert!(!md.lines().any(|l| l.starts_with("- `X`")));
    }

    #[test]
    fn serializes_to_json() {
        let s = RunSummary::build(&sample_state());
        let json = serde_json::to_string(&s).unwrap();
        let back: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
