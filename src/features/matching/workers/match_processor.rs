use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use crate::features::matching::services::MatchService;
use crate::modules::store::{ChangeKind, Collection, RecordStore};

/// Background worker that keeps matches current.
///
/// Runs the matcher at startup, on every timer tick and whenever a report is
/// submitted. Each tick also resumes match links whose setup stopped part-way.
pub struct MatchProcessor {
    store: Arc<dyn RecordStore>,
    match_service: Arc<MatchService>,
    interval: Duration,
}

impl MatchProcessor {
    pub fn new(
        store: Arc<dyn RecordStore>,
        match_service: Arc<MatchService>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            match_service,
            interval,
        }
    }

    /// Run the processor in a background loop
    pub async fn run(&self) {
        tracing::info!(
            "Starting match processor worker (interval: {}s)",
            self.interval.as_secs()
        );

        let mut reports = self.store.subscribe(Collection::Reports);
        let mut feed_open = true;

        // The first tick fires immediately, which doubles as the startup run
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.resume_setup().await;
                    self.run_matcher("timer").await;
                }
                event = reports.next(), if feed_open => match event {
                    Some(event) if event.kind == ChangeKind::Insert => {
                        self.run_matcher("report submitted").await;
                    }
                    Some(_) => {}
                    None => {
                        tracing::warn!("Report change feed closed, matching on timer only");
                        feed_open = false;
                    }
                },
            }
        }
    }

    async fn run_matcher(&self, trigger: &str) {
        match self.match_service.run().await {
            Ok(Some(summary)) if summary.created > 0 => {
                tracing::info!("Matcher ({}) created {} links", trigger, summary.created);
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Matcher run ({}) failed: {:?}", trigger, e),
        }
    }

    async fn resume_setup(&self) {
        if let Err(e) = self.match_service.resume_unsettled().await {
            tracing::error!("Error resuming match setup: {:?}", e);
        }
    }
}
