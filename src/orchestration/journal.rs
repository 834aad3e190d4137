use crate::db::Repository;
use crate::domain::{Decimal, Execution, InstrumentDescriptor, Trade};
use crate::engine::{group_executions, validate_execution, MatchConfig, MatchError, Matcher};
use crate::instruments::{InstrumentResolver, ResolveError, StoreError};
use futures::future::try_join_all;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Import pipeline: resolve instruments, rebuild trades, persist them.
#[derive(Clone)]
pub struct Journal {
    resolver: Arc<InstrumentResolver>,
    repo: Option<Arc<Repository>>,
    config: MatchConfig,
}

impl Journal {
    pub fn new(resolver: Arc<InstrumentResolver>, config: MatchConfig) -> Self {
        Self {
            resolver,
            repo: None,
            config,
        }
    }

    /// Persist trades after every import.
    pub fn with_repository(mut self, repo: Arc<Repository>) -> Self {
        self.repo = Some(repo);
        self
    }

    /// Import a batch of executions.
    ///
    /// Invalid executions fail the batch before any instrument is resolved;
    /// trades are written only when the whole batch matches. Each
    /// `(account, instrument)` group in the batch is rebuilt from scratch, so
    /// stored trades for those groups are replaced rather than merged.
    pub async fn import(&self, executions: &[Execution]) -> Result<ImportSummary, JournalError> {
        for execution in executions {
            validate_execution(execution)?;
        }

        let mut seen = HashSet::new();
        let descriptors: Vec<&InstrumentDescriptor> = executions
            .iter()
            .map(|e| &e.instrument)
            .filter(|d| seen.insert(*d))
            .collect();
        let resolved = try_join_all(descriptors.iter().map(|d| self.resolver.resolve(d))).await?;
        let instruments = resolved
            .iter()
            .map(|r| r.unique_symbol.as_str())
            .collect::<HashSet<_>>()
            .len();

        let trades = Matcher::new(self.config.clone())
            .with_instruments(resolved)
            .match_executions(executions)?;

        let persisted = match &self.repo {
            Some(repo) => {
                let groups: Vec<_> = group_executions(executions, &self.config.calendar)?
                    .into_iter()
                    .map(|group| group.key)
                    .collect();
                repo.replace_trades(&groups, &trades).await?
            }
            None => 0,
        };

        let summary = ImportSummary {
            executions: executions.len(),
            instruments,
            trades,
            persisted,
        };
        info!(
            executions = summary.executions,
            instruments = summary.instruments,
            trades = summary.trades.len(),
            closed = summary.closed_count(),
            persisted = summary.persisted,
            "Imported executions"
        );
        Ok(summary)
    }
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub executions: usize,
    /// Distinct canonical instruments touched.
    pub instruments: usize,
    pub trades: Vec<Trade>,
    /// Rows written to the trades table.
    pub persisted: usize,
}

impl ImportSummary {
    pub fn closed_count(&self) -> usize {
        self.trades.iter().filter(|t| t.is_closed()).count()
    }

    /// Net realized P&L over closed trades.
    pub fn realized_pnl(&self) -> Decimal {
        self.trades.iter().filter_map(|t| t.realized_pnl).sum()
    }
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
