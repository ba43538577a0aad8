//! Poolfi Bank - the accounting engine
//!
//! A `Bank` is one market: share/amount exchange rates, totals, vaults, fee
//! accumulators, operational flags and interest/emissions configuration. A
//! `Balance` is one account's position in one bank. The `BankAccountWrapper`
//! co-mutates a bank and a balance through the single mutation protocol that
//! every user-facing operation funnels through.

pub mod account;
pub mod balance;
pub mod bank;
pub mod config;
pub mod error;
pub mod group;
pub mod store;
pub mod wrapper;

pub use account::{account_health, Account, AccountFlags};
pub use balance::{Balance, BalanceDecreaseType, BalanceIncreaseType};
pub use bank::Bank;
pub use config::{
    BankConfig, BankFlags, BankOperationalState, InterestRateConfig, InterestRates, OracleSetup,
    RiskTier,
};
pub use error::BankError;
pub use group::Group;
pub use store::{
    AccountStore, BalanceStore, BankAccountService, BankStore, GroupStore, StoreError,
};
pub use wrapper::{
    find_bank_account_wrapper, find_or_create_balance, find_or_create_bank_account_wrapper,
    BankAccountWrapper,
};
