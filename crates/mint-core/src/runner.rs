//! Batched multi-account execution
//!
//! Accounts are split into consecutive batches of `concurrency`. Accounts in a
//! batch run concurrently and the whole batch settles before the next begins.
//! Each account yields exactly one [`Outcome`]; failures never stop siblings or
//! later batches.

use futures::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::accounts::{Account, AccountKey};
use crate::activity_log::ActivitySink;
use crate::error::MintError;
use crate::strategy::{CallStrategy, StrategyExecutor};
use crate::types::{Outcome, RunSummary};

/// Activity record type for batched runs.
pub const MULTI_ACCOUNT_RECORD: &str = "multi_wallet";

pub struct MultiAccountRunner {
    executor: Arc<StrategyExecutor>,
    sink: Arc<dyn ActivitySink>,
    batch_delay: Duration,
}

impl MultiAccountRunner {
    pub fn new(executor: Arc<StrategyExecutor>, sink: Arc<dyn ActivitySink>) -> Self {
        Self {
            executor,
            sink,
            batch_delay: Duration::ZERO,
        }
    }

    /// Pause between batches.
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub async fn run(&self, accounts: &[Account], strategy: &dyn CallStrategy, concurrency: usize) -> RunSummary {
        let concurrency = concurrency.max(1);
        let batch_count = (accounts.len() + concurrency - 1) / concurrency;
        info!(
            title = %strategy.title(),
            accounts = accounts.len(),
            concurrency,
            batches = batch_count,
            "Starting multi-account run"
        );

        let completed = Mutex::new(Vec::with_capacity(accounts.len()));
        let completed_ref = &completed;
        for (index, batch) in accounts.chunks(concurrency).enumerate() {
            if index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            join_all(batch.iter().map(|account| async move {
                let outcome = self.execute_account(account, strategy, MULTI_ACCOUNT_RECORD).await;
                push_outcome(completed_ref, outcome);
            }))
            .await;
        }

        let mut summary = RunSummary::default();
        for outcome in completed.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()) {
            summary.push(outcome);
        }

        info!(
            title = %strategy.title(),
            succeeded = summary.success_count,
            failed = summary.failure_count,
            "Multi-account run finished"
        );
        summary
    }

    /// One account, recorded as `<kind>_single`.
    pub async fn run_single(&self, account: &Account, strategy: &dyn CallStrategy) -> Outcome {
        let record_type = format!("{}_single", strategy.kind());
        self.execute_account(account, strategy, &record_type).await
    }

    async fn execute_account(&self, account: &Account, strategy: &dyn CallStrategy, record_type: &str) -> Outcome {
        let started = Instant::now();
        let result = match &account.key {
            AccountKey::Valid(wallet) => self.executor.execute(strategy, wallet).await,
            AccountKey::Invalid(reason) => Err(MintError::InvalidCredential {
                source_label: account.source.clone(),
                reason: reason.clone(),
            }),
        };
        let outcome = Outcome::from_result(
            strategy.title(),
            &account.source,
            account.address(),
            result,
            started.elapsed().as_millis() as u64,
        );

        match (&outcome.error, outcome.block_number) {
            (None, Some(block_number)) => {
                crate::log_mint_confirmed!(strategy.title(), account.label(), block_number, outcome.duration_ms);
            }
            (Some(error), _) => {
                crate::log_mint_failed!(
                    strategy.title(),
                    account.label(),
                    outcome.error_kind.unwrap_or("unknown"),
                    error
                );
            }
            (None, None) => {}
        }

        if let Err(e) = self.sink.append(&outcome.to_record(record_type)) {
            warn!(error = %e, account = %account.source, "Failed to append activity record");
        }
        outcome
    }
}

/// A poisoned lock still holds every pushed outcome.
fn push_outcome(completed: &Mutex<Vec<Outcome>>, outcome: Outcome) {
    completed.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(outcome);
}
