//! Idle-Time Reporting Pass
//!
//! One pass over the active worker roster: resolve each worker's
//! time-tracking profile, pull their idle/total summary for the lookback
//! range and flag anyone over their idle threshold (per position title,
//! with a global default). Flagged rows are grouped by the responsible
//! manager and one plain-text alert is posted to each manager's chat id;
//! rows with no manager chat id fall back to the configured channel.
//!
//! Every external call goes through a throttle handle, and each per-worker
//! call is wrapped in the failure shell: a worker whose lookup or stats
//! fetch fails is carried along with empty columns instead of aborting the
//! rest of the pass.

use anyhow::Result;
use chrono::{Days, NaiveDate, Utc};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::config::Config;
use crate::services::{ChatClient, RecordStoreClient, ServiceThrottles, TimeTrackClient};
use crate::throttle::{run_recovering, CallOutcome};

/// Position levels excluded from the report.
const EXCLUDED_LEVELS: [&str; 3] = ["Director", "Executive/VP", "President"];

/// One worker's row in the finished report.
#[derive(Debug, Clone)]
pub struct WorkerRow {
    /// Worker display name
    pub name: String,
    /// Position title, used to select the idle threshold
    pub title: Option<String>,
    /// Manager (or director) responsible for the worker
    pub manager: Option<String>,
    /// Chat id of that manager, the alert's destination
    pub manager_chat_id: Option<String>,
    /// Idle percentage over the period, if stats were available
    pub idle_percent: Option<f64>,
    /// Total tracked hours over the period, if stats were available
    pub total_hours: Option<f64>,
}

impl WorkerRow {
    /// Whether this row exceeds the given idle threshold.
    ///
    /// Rows without stats are never flagged; "no data" is not "idle".
    pub fn is_flagged(&self, threshold_percent: f64) -> bool {
        self.idle_percent
            .map(|idle| idle > threshold_percent)
            .unwrap_or(false)
    }
}

/// Outcome of one reporting pass.
#[derive(Debug)]
pub struct PassSummary {
    /// Workers considered (after level/email filtering)
    pub workers_processed: usize,
    /// Rows flagged over their idle threshold
    pub flagged: Vec<WorkerRow>,
    /// Per-worker calls that degraded to the failure sentinel
    pub call_failures: usize,
    /// Alert messages posted (one per manager, plus the fallback channel)
    pub alerts_posted: usize,
}

/// Inclusive report period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Period {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl Period {
    /// The trailing period ending yesterday, spanning `lookback_days`.
    pub fn trailing(today: NaiveDate, lookback_days: u32) -> Self {
        let to = today.pred_opt().unwrap_or(today);
        let from = today - Days::new(u64::from(lookback_days));
        Self { from, to }
    }

    /// Human-readable label, e.g. `Aug 19, 2026 - Aug 25, 2026`.
    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            self.from.format("%b %d, %Y"),
            self.to.format("%b %d, %Y")
        )
    }
}

/// Run one reporting pass with the given configuration.
pub async fn run_pass(config: &Config) -> Result<PassSummary> {
    let throttles = ServiceThrottles::from_config(&config.throttle)?;
    let records = RecordStoreClient::new(throttles.records.clone(), config.services.records.clone());
    let timetrack = TimeTrackClient::new(throttles.timetrack.clone(), config.services.timetrack.clone());
    let chat = ChatClient::new(throttles.chat.clone(), config.services.chat.clone());

    let recovery = config.recovery.to_recovery_config();
    let period = Period::trailing(Utc::now().date_naive(), config.report.lookback_days);

    info!(period = %period.label(), "Starting reporting pass");

    let workers = match run_recovering("records", &recovery, || records.list_workers()).await {
        CallOutcome::Success(workers) => workers,
        CallOutcome::Failure(reason) => {
            // Without a roster there is nothing to degrade to.
            anyhow::bail!("could not fetch worker roster: {}", reason);
        }
    };

    let mut rows: Vec<WorkerRow> = Vec::new();
    let mut call_failures = 0usize;

    for worker in &workers {
        let fields = &worker.fields;

        if is_excluded_level(fields.level()) {
            continue;
        }
        let Some(email) = fields.email() else {
            continue;
        };
        let name = fields.name.clone().unwrap_or_else(|| worker.id.clone());

        let mut row = WorkerRow {
            name: name.clone(),
            title: fields.title().map(str::to_string),
            manager: fields.manager_or_director().map(str::to_string),
            manager_chat_id: fields.manager_chat_id().map(str::to_string),
            idle_percent: None,
            total_hours: None,
        };

        let profile =
            match run_recovering("timetrack", &recovery, || timetrack.find_user(email)).await {
                CallOutcome::Success(Some(profile)) => profile,
                CallOutcome::Success(None) => {
                    warn!(worker = %name, "No time-tracking user for email");
                    row.name = format!("{} (user not found)", row.name);
                    rows.push(row);
                    continue;
                }
                CallOutcome::Failure(_) => {
                    call_failures += 1;
                    rows.push(row);
                    continue;
                }
            };

        match run_recovering("timetrack", &recovery, || {
            timetrack.usage_summary(&profile.id, period.from, period.to)
        })
        .await
        {
            CallOutcome::Success(summary) => {
                row.idle_percent = Some(summary.idle_percent());
                row.total_hours = Some(summary.total_hours());
            }
            CallOutcome::Failure(_) => {
                call_failures += 1;
            }
        }

        rows.push(row);
    }

    let flagged: Vec<WorkerRow> = rows
        .iter()
        .filter(|row| row.is_flagged(config.report.threshold_for(row.title.as_deref())))
        .cloned()
        .collect();

    let mut alerts_posted = 0usize;
    if flagged.is_empty() {
        info!("No workers over their idle threshold, skipping alerts");
    } else {
        let (by_manager, unrouted) = group_by_manager(flagged.clone());

        for (chat_id, group) in &by_manager {
            let text = alert_text(&period, group);
            match run_recovering("chat", &recovery, || chat.post_message(chat_id, &text)).await {
                CallOutcome::Success(receipt) => {
                    info!(ts = %receipt.ts, manager = %chat_id, "Posted idle-time alert");
                    alerts_posted += 1;
                }
                CallOutcome::Failure(_) => {
                    call_failures += 1;
                }
            }
        }

        if !unrouted.is_empty() {
            if config.services.chat.channel.is_empty() {
                for row in &unrouted {
                    warn!(
                        worker = %row.name,
                        manager = row.manager.as_deref().unwrap_or("unknown"),
                        "No manager chat id and no fallback channel, alert dropped"
                    );
                }
            } else {
                let text = alert_text(&period, &unrouted);
                match run_recovering("chat", &recovery, || {
                    chat.post_message(&config.services.chat.channel, &text)
                })
                .await
                {
                    CallOutcome::Success(receipt) => {
                        info!(ts = %receipt.ts, "Posted idle-time alert to fallback channel");
                        alerts_posted += 1;
                    }
                    CallOutcome::Failure(_) => {
                        call_failures += 1;
                    }
                }
            }
        }
    }

    info!(
        workers = rows.len(),
        flagged = flagged.len(),
        alerts = alerts_posted,
        failures = call_failures,
        "Reporting pass finished"
    );

    Ok(PassSummary {
        workers_processed: rows.len(),
        flagged,
        call_failures,
        alerts_posted,
    })
}

/// Split flagged rows into per-manager groups keyed by the manager's chat
/// id, plus the rows with no manager chat id at all.
fn group_by_manager(flagged: Vec<WorkerRow>) -> (BTreeMap<String, Vec<WorkerRow>>, Vec<WorkerRow>) {
    let mut by_manager: BTreeMap<String, Vec<WorkerRow>> = BTreeMap::new();
    let mut unrouted = Vec::new();

    for row in flagged {
        match row.manager_chat_id.clone() {
            Some(chat_id) => by_manager.entry(chat_id).or_default().push(row),
            None => unrouted.push(row),
        }
    }

    (by_manager, unrouted)
}

fn is_excluded_level(level: Option<&str>) -> bool {
    level.is_some_and(|l| EXCLUDED_LEVELS.contains(&l))
}

/// Format fractional hours as `32h 6m`.
pub fn format_hours(total_hours: f64) -> String {
    let hours = total_hours.trunc() as i64;
    let minutes = (total_hours.fract() * 60.0).round() as i64;
    format!("{}h {}m", hours, minutes)
}

fn alert_text(period: &Period, flagged: &[WorkerRow]) -> String {
    let mut lines = vec![
        "Employee Idle-Time Alert".to_string(),
        format!("Pay period: {}", period.label()),
        String::new(),
    ];

    for row in flagged {
        let idle = row
            .idle_percent
            .map(|p| format!("{:.2}%", p))
            .unwrap_or_else(|| "-".to_string());
        let worked = row
            .total_hours
            .map(format_hours)
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!("{} | idle {} | worked {}", row.name, idle, worked));
    }

    lines.join("\n")
}
