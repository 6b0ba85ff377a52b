use chrono::{DateTime, Utc};
use tracing::{debug, error};

use lotbook_ledger::{AccountId, Book, LedgerError, Numeric, SplitId};

use crate::assign::{assign_account_lots, assign_to_lot, AssignOutcome};
use crate::gains::{cap_gains, compute_cap_gains, GainsError, GainsOutcome};
use crate::policy::AccountingPolicy;
use crate::settings::LotSettings;

type Clock = Box<dyn Fn() -> DateTime<Utc>>;

/// Policy, settings and clock bundled for repeated use over a book.
pub struct LotEngine {
    policy: Box<dyn AccountingPolicy>,
    settings: LotSettings,
    clock: Clock,
}

/// Result of [`LotEngine::process_account`].
#[derive(Debug, Default)]
pub struct AccountRun {
    pub assignments: Vec<AssignOutcome>,
    pub gains: Vec<(SplitId, GainsOutcome)>,
    pub failures: Vec<(SplitId, GainsError)>,
}

impl AccountRun {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl LotEngine {
    /// Engine using the configured policy and the system clock.
    pub fn new(settings: LotSettings) -> Self {
        Self {
            policy: settings.policy.into_policy(),
            settings,
            clock: Box::new(Utc::now),
        }
    }

    pub fn with_policy(mut self, policy: Box<dyn AccountingPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn settings(&self) -> &LotSettings {
        &self.settings
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn assign(&self, book: &mut Book, split: SplitId) -> Result<AssignOutcome, LedgerError> {
        assign_to_lot(book, split, self.policy.as_ref(), &self.settings, (self.clock)())
    }

    pub fn compute_gains(
        &self,
        book: &mut Book,
        split: SplitId,
        gain_account: Option<AccountId>,
    ) -> Result<GainsOutcome, GainsError> {
        compute_cap_gains(book, split, gain_account, &self.settings, (self.clock)())
    }

    pub fn cap_gains(&self, book: &mut Book, split: SplitId) -> Numeric {
        cap_gains(book, split, &self.settings, (self.clock)())
    }

    /// Assign every pending split of `account`, then compute gains for every
    /// lot member. Per-split gains failures are collected, not raised.
    pub fn process_account(
        &self,
        book: &mut Book,
        account: AccountId,
    ) -> Result<AccountRun, LedgerError> {
        let now = (self.clock)();
        let mut run = AccountRun {
            assignments: assign_account_lots(book, account, self.policy.as_ref(), &self.settings, now)?,
            ..AccountRun::default()
        };

        let members: Vec<SplitId> = book
            .account(account)
            .ok_or(LedgerError::UnknownAccount(account))?
            .lots()
            .iter()
            .filter_map(|lot| book.lot(*lot))
            .flat_map(|lot| lot.splits().iter().copied())
            .filter(|s| {
                book.split(*s)
                    .map(|s| s.gains_source_ref().is_none())
                    .unwrap_or(false)
            })
            .collect();

        for split in members {
            match compute_cap_gains(book, split, None, &self.settings, now) {
                Ok(outcome) => run.gains.push((split, outcome)),
                Err(err) => {
                    error!(%account, %split, error = %err, "gains computation failed");
                    run.failures.push((split, err));
                }
            }
        }
        debug!(
            %account,
            lots = book.account(account).map(|a| a.lots().len()).unwrap_or(0),
            failures = run.failures.len(),
            "account processed"
        );
        Ok(run)
    }
}
