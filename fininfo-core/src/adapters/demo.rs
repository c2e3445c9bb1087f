//! Demo data provider
//!
//! Generates deterministic FI results without any provider credentials:
//! - 2 accounts per linked item (checking and credit card)
//! - a small batch of new transactions on every sync
//! - a `demo-{itemId}-{n}` cursor that advances by one per sync

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use crate::domain::result::Result;
use crate::domain::{
    AccountBalances, FiAccount, FiKey, FiTransaction, FinancialInst, Institution,
    RemovedTransaction, TransactionSync, User,
};
use crate::ports::FinancialDataProvider;

/// Transactions added per demo sync
const TRANSACTIONS_PER_SYNC: usize = 4;

/// Highest sync count a demo cursor may carry; larger counts start over
const MAX_DEMO_STEP: u32 = 10_000;

/// Institutions handed out to demo items
const DEMO_INSTITUTIONS: &[(&str, &str, &str, &str)] = &[
    ("ins_demo_chase", "Chase", "https://chase.com", "#117aca"),
    ("ins_demo_ally", "Ally Bank", "https://ally.com", "#650360"),
    ("ins_demo_amex", "American Express", "https://americanexpress.com", "#016fd0"),
];

/// Merchants with amounts in cents (positive = money out)
const DEMO_MERCHANTS: &[(&str, i64, &str)] = &[
    ("Whole Foods", 8743, "FOOD_AND_DRINK"),
    ("Shell", 4512, "TRANSPORTATION"),
    ("Netflix", 1549, "ENTERTAINMENT"),
    ("Blue Bottle Coffee", 625, "FOOD_AND_DRINK"),
    ("Amazon", 3299, "GENERAL_MERCHANDISE"),
    ("Acme Corp Payroll", -325000, "INCOME"),
];

/// Deterministic provider for demo mode
#[derive(Debug, Default)]
pub struct DemoDataProvider;

impl DemoDataProvider {
    pub fn new() -> Self {
        Self
    }

    /// Demo result for one FI key
    pub fn retrieve_fi(&self, key: &FiKey) -> FinancialInst {
        let step = demo_step(&key.item_id, key.sync_cursor());
        let (institution_id, name, url, color) =
            DEMO_INSTITUTIONS[seed(&key.item_id) % DEMO_INSTITUTIONS.len()];

        FinancialInst {
            item_id: key.item_id.clone(),
            institution: Some(Institution {
                institution_id: key
                    .institution_id
                    .clone()
                    .unwrap_or_else(|| institution_id.to_string()),
                name: name.to_string(),
                url: Some(url.to_string()),
                logo: None,
                primary_color: Some(color.to_string()),
            }),
            accounts: demo_accounts(&key.item_id, step),
            transaction_sync: demo_sync(&key.item_id, step),
        }
    }
}

impl FinancialDataProvider for DemoDataProvider {
    fn name(&self) -> &str {
        "demo"
    }

    fn retrieve_user_fis(&self, user: &User) -> Result<Vec<FinancialInst>> {
        Ok(user.fi_keys.iter().map(|key| self.retrieve_fi(key)).collect())
    }
}

/// Cursor produced after `step` demo syncs
pub fn demo_cursor(item_id: &str, step: u32) -> String {
    format!("demo-{}-{}", item_id, step)
}

/// Number of syncs already done according to the cursor; unknown cursors start over
fn demo_step(item_id: &str, cursor: Option<&str>) -> u32 {
    cursor
        .and_then(|c| c.strip_prefix(&format!("demo-{}-", item_id)))
        .and_then(|n| n.parse().ok())
        .filter(|step| *step < MAX_DEMO_STEP)
        .unwrap_or(0)
}

fn seed(item_id: &str) -> usize {
    item_id.bytes().map(usize::from).sum()
}

fn demo_base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

fn demo_accounts(item_id: &str, step: u32) -> Vec<FiAccount> {
    let drift = Decimal::new(i64::from(step) * 1250, 2);

    vec![
        FiAccount {
            account_id: format!("{}-checking", item_id),
            name: "Demo Checking".to_string(),
            official_name: Some("Everyday Checking".to_string()),
            mask: Some("0000".to_string()),
            account_type: "depository".to_string(),
            subtype: Some("checking".to_string()),
            balances: AccountBalances {
                available: Some(Decimal::new(482347, 2) + drift),
                current: Some(Decimal::new(482347, 2) + drift),
                limit: None,
                iso_currency_code: Some("USD".to_string()),
            },
        },
        FiAccount {
            account_id: format!("{}-credit", item_id),
            name: "Demo Rewards Card".to_string(),
            official_name: None,
            mask: Some("3333".to_string()),
            account_type: "credit".to_string(),
            subtype: Some("credit card".to_string()),
            balances: AccountBalances {
                available: Some(Decimal::new(715237, 2)),
                current: Some(Decimal::new(284763, 2)),
                limit: Some(Decimal::new(1000000, 2)),
                iso_currency_code: Some("USD".to_string()),
            },
        },
    ]
}

fn demo_sync(item_id: &str, step: u32) -> TransactionSync {
    let offset = seed(item_id);
    let base_date = demo_base_date();
    let first = step as usize * TRANSACTIONS_PER_SYNC;

    let added = (first..first + TRANSACTIONS_PER_SYNC)
        .map(|n| {
            let (merchant, cents, category) = DEMO_MERCHANTS[(n + offset) % DEMO_MERCHANTS.len()];
            let account_suffix = if cents < 0 { "checking" } else { "credit" };
            FiTransaction {
                transaction_id: format!("demo-tx-{}-{}", item_id, n),
                account_id: format!("{}-{}", item_id, account_suffix),
                amount: Decimal::new(cents, 2),
                iso_currency_code: Some("USD".to_string()),
                date: base_date + Duration::days(n as i64),
                name: Some(merchant.to_string()),
                merchant_name: Some(merchant.to_string()),
                pending: false,
                category: Some(category.to_string()),
            }
        })
        .collect();

    // Every third sync cancels a transaction from the previous batch
    let removed = if step > 0 && step % 3 == 0 {
        vec![RemovedTransaction {
            transaction_id: format!("demo-tx-{}-{}", item_id, first - 1),
            account_id: None,
        }]
    } else {
        Vec::new()
    };

    TransactionSync {
        added,
        modified: Vec::new(),
        removed,
        next_cursor: demo_cursor(item_id, step + 1),
        has_more: false,
    }
}
