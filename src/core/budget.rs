use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

/// Cost ceilings enforced before the AI tier is invoked
#[derive(Debug, Clone, Copy)]
pub struct BudgetConfig {
    /// Provider calls one user may trigger per UTC day
    pub per_user_daily_calls: u32,
    /// Total spend per UTC day across all users
    pub daily_cost_ceiling_usd: f64,
    /// Estimated spend of one provider call
    pub cost_per_call_usd: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            per_user_daily_calls: 10,
            daily_cost_ceiling_usd: 20.0,
            cost_per_call_usd: 0.002,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BudgetError {
    #[error("user {user} used {used}/{limit} AI calls today")]
    UserCallsExhausted { user: String, used: u32, limit: u32 },

    #[error("daily cost ceiling reached (${spent:.4} of ${ceiling:.2})")]
    DailyCeilingReached { spent: f64, ceiling: f64 },
}

#[derive(Debug)]
struct Ledger {
    day: NaiveDate,
    calls_by_user: HashMap<String, u32>,
    spent_usd: f64,
}

impl Ledger {
    fn new(day: NaiveDate) -> Self {
        Self {
            day,
            calls_by_user: HashMap::new(),
            spent_usd: 0.0,
        }
    }
}

/// Per-user call budget and global daily cost ceiling
///
/// Counters roll over at UTC midnight. Reservations are all-or-nothing:
/// either every planned call fits under both limits or nothing is charged.
#[derive(Debug)]
pub struct CostBudget {
    config: BudgetConfig,
    ledger: Mutex<Ledger>,
}

impl CostBudget {
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            config,
            ledger: Mutex::new(Ledger::new(Utc::now().date_naive())),
        }
    }

    pub fn try_reserve(&self, user: &str, calls: u32) -> Result<(), BudgetError> {
        self.try_reserve_on(user, calls, Utc::now().date_naive())
    }

    pub fn try_reserve_on(&self, user: &str, calls: u32, today: NaiveDate) -> Result<(), BudgetError> {
        let mut ledger = self.ledger.lock();
        if ledger.day != today {
            *ledger = Ledger::new(today);
        }

        let used = ledger.calls_by_user.get(user).copied().unwrap_or(0);
        if used + calls > self.config.per_user_daily_calls {
            return Err(BudgetError::UserCallsExhausted {
                user: user.to_string(),
                used,
                limit: self.config.per_user_daily_calls,
            });
        }

        let cost = calls as f64 * self.config.cost_per_call_usd;
        if ledger.spent_usd + cost > self.config.daily_cost_ceiling_usd {
            return Err(BudgetError::DailyCeilingReached {
                spent: ledger.spent_usd,
                ceiling: self.config.daily_cost_ceiling_usd,
            });
        }

        *ledger.calls_by_user.entry(user.to_string()).or_insert(0) += calls;
        ledger.spent_usd += cost;
        Ok(())
    }

    pub fn spent_today(&self) -> f64 {
        self.ledger.lock().spent_usd
    }

    pub fn reset(&self) {
        *self.ledger.lock() = Ledger::new(Utc::now().date_naive());
    }
}

impl Default for CostBudget {
    fn default() -> Self {
        Self::new(BudgetConfig::default())
    }
}
