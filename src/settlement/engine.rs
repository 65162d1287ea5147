//! Settlement Engine
//!
//! Grades every pick that has no pick result yet and records the outcome.
//!
//! - Store errors abort the run; rerunning resumes where it stopped
//! - A pick is graded at most once: existence check up front, and the store
//!   rejects a second result for the same pick (counted as already settled)
//! - Emails go out on background tasks while grading continues; the run
//!   waits for all of them and logs every failure

use super::{grade_pick, Grade, SettlementStore};
use crate::models::{Classification, OfficialResult, Pick, PickResult, SettlementSummary};
use crate::notify::{settlement_email, Notifier};
use crate::store::InsertOutcome;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    sync::{Mutex, Semaphore},
    task::{JoinHandle, JoinSet},
    time::{interval, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type EmailTasks = JoinSet<(String, Result<()>)>;

/// Settlement emails in flight at once unless configured otherwise
pub const DEFAULT_EMAIL_CONCURRENCY: usize = 4;

/// Grade computed without persisting anything
#[derive(Debug, Clone, Serialize)]
pub struct SettlementPreview {
    pub pick_id: String,
    pub user_id: String,
    pub gp_name: String,
    pub correct_count: u32,
    pub total_picks: u32,
    pub result: Classification,
    pub payout: i64,
}

#[derive(Debug, Default)]
struct RunStats {
    settled: Vec<SettlementSummary>,
    skipped: usize,
    lost_races: usize,
}

pub struct SettlementEngine {
    store: Arc<dyn SettlementStore>,
    notifier: Arc<dyn Notifier>,
    dashboard_url: String,
    run_lock: Mutex<()>,
    email_sem: Arc<Semaphore>,
}

impl SettlementEngine {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        notifier: Arc<dyn Notifier>,
        dashboard_url: String,
    ) -> Self {
        Self {
            store,
            notifier,
            dashboard_url,
            run_lock: Mutex::new(()),
            email_sem: Arc::new(Semaphore::new(DEFAULT_EMAIL_CONCURRENCY)),
        }
    }

    /// Cap the number of settlement emails being sent at the same time
    pub fn with_email_concurrency(mut self, max_in_flight: usize) -> Self {
        self.email_sem = Arc::new(Semaphore::new(max_in_flight.max(1)));
        self
    }

    /// Settle the whole unsettled backlog.
    ///
    /// Returns one summary per pick graded by this run. Runs in the same
    /// process are serialized.
    pub async fn settle_all_picks(&self) -> Result<Vec<SettlementSummary>> {
        let _guard = self.run_lock.lock().await;
        let started = Instant::now();

        let mut emails = EmailTasks::new();
        let outcome = self.grade_backlog(&mut emails).await;
        let (sent, failed) = drain_notifications(&mut emails).await;

        let stats = match outcome {
            Ok(stats) => stats,
            Err(e) => {
                error!(
                    emails_sent = sent,
                    emails_failed = failed,
                    "🛑 Settlement run aborted: {:#}",
                    e
                );
                return Err(e);
            }
        };

        info!(
            graded = stats.settled.len(),
            skipped = stats.skipped,
            lost_races = stats.lost_races,
            emails_sent = sent,
            emails_failed = failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "🏁 Settlement run complete"
        );

        Ok(stats.settled)
    }

    /// Grade unsettled picks without writing results or sending email
    pub async fn preview_all_picks(&self) -> Result<Vec<SettlementPreview>> {
        let picks = self.store.list_picks().await.context("Failed to load picks")?;
        let mut cache = HashMap::new();
        let mut previews = Vec::new();

        for pick in picks {
            if self.store.pick_result_exists(&pick.id).await? {
                continue;
            }
            let official = self.official_for(&mut cache, &pick.gp_name).await?;
            let grade = grade_pick(&pick, official);
            previews.push(SettlementPreview {
                pick_id: pick.id,
                user_id: pick.user_id,
                gp_name: pick.gp_name,
                correct_count: grade.correct_count,
                total_picks: grade.total_picks,
                result: grade.result,
                payout: grade.payout,
            });
        }

        Ok(previews)
    }

    /// Run settlement every `every` until the task is aborted
    pub fn spawn_interval(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = every.as_secs(), "⏱️ Scheduled settlement enabled");
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = self.settle_all_picks().await {
                    warn!("Scheduled settlement failed, will retry next tick: {:#}", e);
                }
            }
        })
    }

    async fn grade_backlog(&self, emails: &mut EmailTasks) -> Result<RunStats> {
        let picks = self.store.list_picks().await.context("Failed to load picks")?;
        let mut cache = HashMap::new();
        let mut stats = RunStats::default();

        for pick in picks {
            if self
                .store
                .pick_result_exists(&pick.id)
                .await
                .with_context(|| format!("Failed to check result of pick {}", pick.id))?
            {
                stats.skipped += 1;
                continue;
            }

            let official = self.official_for(&mut cache, &pick.gp_name).await?;
            let grade = grade_pick(&pick, official);
            let record = pick_result(&pick, &grade);

            let inserted = self
                .store
                .insert_pick_result(&record)
                .await
                .with_context(|| format!("Failed to record result of pick {}", pick.id))?;

            if inserted == InsertOutcome::AlreadyExists {
                // Another run settled it between our check and our insert
                debug!(pick_id = %pick.id, "Pick settled concurrently, skipping");
                stats.lost_races += 1;
                continue;
            }

            debug!(
                pick_id = %pick.id,
                gp = %pick.gp_name,
                correct = grade.correct_count,
                total = grade.total_picks,
                result = grade.result.as_str(),
                payout = grade.payout,
                "Pick graded"
            );

            self.queue_notification(emails, &record).await;

            stats.settled.push(SettlementSummary {
                pick_id: record.pick_id,
                result: record.result,
                payout: record.payout,
            });
        }

        Ok(stats)
    }

    async fn official_for<'a>(
        &self,
        cache: &'a mut HashMap<String, Vec<OfficialResult>>,
        gp_name: &str,
    ) -> Result<&'a [OfficialResult]> {
        let key = gp_name.trim().to_lowercase();
        if !cache.contains_key(&key) {
            let results = self
                .store
                .official_results(gp_name)
                .await
                .with_context(|| format!("Failed to load official results for {}", gp_name))?;
            if results.is_empty() {
                warn!(gp = gp_name, "No official results yet, selections will grade as missed");
            }
            cache.insert(key.clone(), results);
        }
        Ok(cache.get(&key).map(Vec::as_slice).unwrap_or(&[]))
    }

    async fn queue_notification(&self, emails: &mut EmailTasks, record: &PickResult) {
        let contact = match self.store.user_contact(&record.user_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                debug!(user_id = %record.user_id, "No contact address, skipping email");
                return;
            }
            Err(e) => {
                warn!(
                    pick_id = %record.pick_id,
                    "Contact lookup failed, settlement email not sent: {:#}",
                    e
                );
                return;
            }
        };

        let email = settlement_email(&contact, record, &self.dashboard_url);
        let notifier = self.notifier.clone();
        let email_sem = self.email_sem.clone();
        let pick_id = record.pick_id.clone();
        emails.spawn(async move {
            let sent = match email_sem.acquire_owned().await {
                Ok(_permit) => notifier.send(&email).await,
                Err(e) => Err(anyhow::Error::new(e).context("email semaphore closed")),
            };
            (pick_id, sent)
        });
    }
}

fn pick_result(pick: &Pick, grade: &Grade) -> PickResult {
    PickResult {
        id: Uuid::new_v4().to_string(),
        pick_id: pick.id.clone(),
        user_id: pick.user_id.clone(),
        gp_name: pick.gp_name.clone(),
        session_type: pick.session_type,
        selections: pick.selections.clone(),
        correct_count: grade.correct_count,
        total_picks: grade.total_picks,
        mode: pick.mode,
        result: grade.result,
        payout: grade.payout,
        processed_at: Utc::now(),
    }
}

/// Wait for every queued email; returns (sent, failed)
async fn drain_notifications(emails: &mut EmailTasks) -> (usize, usize) {
    let mut sent = 0usize;
    let mut failed = 0usize;
    while let Some(joined) = emails.join_next().await {
        match joined {
            Ok((_, Ok(()))) => sent += 1,
            Ok((pick_id, Err(e))) => {
                failed += 1;
                warn!(pick_id = %pick_id, "📭 Settlement email failed: {:#}", e);
            }
            Err(e) => {
                failed += 1;
                warn!("📭 Settlement email task panicked: {}", e);
            }
        }
    }
    (sent, failed)
}
