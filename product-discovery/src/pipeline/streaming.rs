//! Streaming execution facade
//!
//! Starts a run as an independent tokio task, then polls its progress
//! channel on a fixed interval, yielding a [`PartialView`] per tick until
//! the run reaches a terminal state. The last yielded view is the
//! authoritative final one: interpreted summary and per-section reports on
//! success, the error text on failure.
//!
//! Known limitation: the run is fire-and-forget once started. Dropping the
//! stream stops the polling but does not cancel the underlying run.

use futures::stream::{self, Stream};
use product_discovery_sdk::{progress_channel, ProgressChannel, RunStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::pipeline::interpreter::{interpret, section_reports, SectionReports, StructuredSummary};
use crate::pipeline::orchestrator::Pipeline;
use crate::pipeline::run::{RunInput, RunState};

/// How often the facade drains the progress channel
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

const IN_PROGRESS: &str = "Analysis in progress...";

/// One snapshot of the run for progressive rendering. Sections hold
/// placeholders until the final view substitutes the real reports.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialView {
    pub summary: String,
    pub competitive_analysis: String,
    pub customer_pain: String,
    pub opportunity_sizing: String,
    pub risk_assessment: String,
    pub full_report: String,
    pub activity_log: String,
    pub is_final: bool,
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

impl PartialView {
    fn in_progress(activity_log: String) -> Self {
        Self {
            summary: "🤖 Agents are researching... watch the activity log for live output."
                .to_string(),
            competitive_analysis: IN_PROGRESS.to_string(),
            customer_pain: IN_PROGRESS.to_string(),
            opportunity_sizing: IN_PROGRESS.to_string(),
            risk_assessment: IN_PROGRESS.to_string(),
            full_report: IN_PROGRESS.to_string(),
            activity_log,
            is_final: false,
        }
    }

    fn completed(
        summary: &StructuredSummary,
        sections: SectionReports,
        activity_log: String,
    ) -> Self {
        let headline = format!(
            "Recommendation: {}\nConfidence: {}\nProjected SOM: {}",
            or_placeholder(&summary.recommendation, "See full report"),
            or_placeholder(&summary.confidence, "TBD"),
            or_placeholder(&summary.market_size_estimate, "TBD"),
        );
        Self {
            summary: headline,
            competitive_analysis: sections.competitive_analysis,
            customer_pain: sections.customer_pain,
            opportunity_sizing: sections.opportunity_sizing,
            risk_assessment: sections.risk_assessment,
            full_report: summary.full_report.clone(),
            activity_log,
            is_final: true,
        }
    }

    fn failed(error: &str, activity_log: String) -> Self {
        Self {
            summary: format!("❌ An error occurred: {}", error),
            competitive_analysis: String::new(),
            customer_pain: String::new(),
            opportunity_sizing: String::new(),
            risk_assessment: String::new(),
            full_report: String::new(),
            activity_log,
            is_final: true,
        }
    }
}

struct PollState {
    channel: ProgressChannel,
    handle: JoinHandle<RunState>,
    activity_log: String,
    first_poll: bool,
    done: bool,
}

impl PollState {
    fn drain_log(&mut self) {
        for event in self.channel.drain() {
            self.activity_log.push_str(&event.render());
            self.activity_log.push('\n');
        }
    }
}

impl Pipeline {
    /// Execute a run while yielding progressive views of it. The sequence
    /// is finite and not restartable; its last element is final.
    pub fn execute_streaming(
        self: &Arc<Self>,
        input: RunInput,
    ) -> impl Stream<Item = PartialView> {
        let (sink, channel) = progress_channel();
        let pipeline = Arc::clone(self);
        let handle = tokio::spawn(async move { pipeline.execute(&input, sink).await });

        let state = PollState {
            channel,
            handle,
            activity_log: String::new(),
            first_poll: true,
            done: false,
        };

        stream::unfold(state, |mut st| async move {
            if st.done {
                return None;
            }
            if !st.first_poll {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
            st.first_poll = false;
            st.drain_log();

            if !st.channel.is_finished() {
                return Some((PartialView::in_progress(st.activity_log.clone()), st));
            }

            // Terminal: pick up any fragments emitted since the drain
            // above, then join the run and build the final view
            st.drain_log();
            let run_state = (&mut st.handle)
                .await
                .unwrap_or_else(|e| RunState::aborted(format!("run task panicked: {}", e)));
            st.done = true;

            let view = match run_state.status {
                RunStatus::Completed => {
                    let narrative = run_state.terminal_narrative().unwrap_or("");
                    let summary = interpret(narrative);
                    let sections = section_reports(&run_state.task_results);
                    PartialView::completed(&summary, sections, st.activity_log.clone())
                }
                _ => PartialView::failed(
                    run_state.error.as_deref().unwrap_or("unknown failure"),
                    st.activity_log.clone(),
                ),
            };
            Some((view, st))
        })
    }
}
