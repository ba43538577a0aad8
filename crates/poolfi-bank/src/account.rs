//! Account - user identity within a group

use poolfi_core::consts::ONE;
use poolfi_core::id::uuid_from_strings;
use poolfi_core::Clock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::BitOr;
use uuid::Uuid;

/// Bit-set of per-account markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountFlags(u8);

impl AccountFlags {
    pub const NONE: Self = Self(0);
    pub const DISABLED: Self = Self(1 << 0);
    /// Set for the duration of a flashloan; suppresses health checks.
    pub const IN_FLASHLOAN: Self = Self(1 << 1);
    pub const FLASHLOAN_ENABLED: Self = Self(1 << 2);
    pub const TRANSFER_AUTHORITY_ALLOWED: Self = Self(1 << 3);

    pub fn contains(self, flag: AccountFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for AccountFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub group_id: Uuid,
    pub pub_key: String,
    pub account_flags: AccountFlags,
    pub index: u8,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Account {
    /// Create an account whose id is derived from (group, pubkey, index).
    pub fn new(clock: &dyn Clock, group_id: Uuid, pub_key: impl Into<String>, index: u8) -> Self {
        let pub_key = pub_key.into();
        let now = clock.now_unix();
        Self {
            id: uuid_from_strings(&[&group_id.to_string(), &pub_key, &index.to_string()]),
            group_id,
            pub_key,
            account_flags: AccountFlags::NONE,
            index,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_flag(&mut self, flag: AccountFlags) {
        self.account_flags = self.account_flags | flag;
    }

    pub fn unset_flag(&mut self, flag: AccountFlags) {
        self.account_flags = AccountFlags(self.account_flags.0 & !flag.0);
    }

    pub fn get_flag(&self, flag: AccountFlags) -> bool {
        self.account_flags.contains(flag)
    }
}

/// Health ratio `(assets - liabilities) / assets`; `1` when liability-free.
pub fn account_health(total_assets: Decimal, total_liabilities: Decimal) -> Decimal {
    if total_liabilities.is_zero() {
        return ONE;
    }
    if total_assets > Decimal::ZERO {
        return (total_assets - total_liabilities) / total_assets;
    }
    ONE
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolfi_core::ManualClock;
    use rust_decimal_macros::dec;

    #[test]
    fn account_id_is_deterministic_per_tuple() {
        let clock = ManualClock::new(1_700_000_000);
        let a = Account::new(&clock, Uuid::nil(), "pubkey", 0);
        let b = Account::new(&clock, Uuid::nil(), "pubkey", 0);
        let c = Account::new(&clock, Uuid::nil(), "pubkey", 1);
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn flags_set_and_unset() {
        let clock = ManualClock::new(1_700_000_000);
        let mut account = Account::new(&clock, Uuid::nil(), "pubkey", 0);
        assert!(!account.get_flag(AccountFlags::IN_FLASHLOAN));

        account.set_flag(AccountFlags::IN_FLASHLOAN);
        assert!(account.get_flag(AccountFlags::IN_FLASHLOAN));

        account.unset_flag(AccountFlags::IN_FLASHLOAN);
        assert!(!account.get_flag(AccountFlags::IN_FLASHLOAN));
    }

    #[test]
    fn health_ratio() {
        assert_eq!(account_health(dec!(100), Decimal::ZERO), ONE);
        assert_eq!(account_health(dec!(100), dec!(40)), dec!(0.6));
        assert_eq!(account_health(Decimal::ZERO, dec!(40)), ONE);
    }
}
