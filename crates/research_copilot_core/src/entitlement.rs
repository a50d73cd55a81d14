//! crates/research_copilot_core/src/entitlement.rs
//!
//! Daily quota bookkeeping for research queries.
//!
//! The reset period is one local calendar day. Two accesses either side of local
//! midnight see two different periods even if they are a minute apart.
//!
//! Every check goes through [`effective_used_today`], so "how many are left" and
//! "may I submit" always agree for the same account and day. The read operations
//! never mutate; [`record_usage`] and [`ensure_fresh_period`] are the only places a
//! rollover is committed to the account.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{SubscriptionStatus, SubscriptionTier, UserAccount, UNLIMITED};
use crate::pricing;

/// Remaining queries in the current period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quota {
    Unlimited,
    Limited(u32),
}

impl Quota {
    /// The stored/wire representation, with `UNLIMITED` as the sentinel.
    pub fn as_sentinel(self) -> i64 {
        match self {
            Quota::Unlimited => UNLIMITED,
            Quota::Limited(n) => i64::from(n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetCountdown {
    pub hours: i64,
    pub minutes: i64,
}

fn is_stale(account: &UserAccount, today: NaiveDate) -> bool {
    account.last_reset_date != today
}

/// Usage in `today`'s period, treating a stale period as already reset.
pub fn effective_used_today(account: &UserAccount, today: NaiveDate) -> u32 {
    if is_stale(account, today) {
        0
    } else {
        account.queries_used_today
    }
}

fn has_unlimited_quota(account: &UserAccount) -> bool {
    account.subscription_tier.is_unlimited() || account.daily_query_limit < 0
}

pub fn can_submit(account: &UserAccount, today: NaiveDate) -> bool {
    if has_unlimited_quota(account) {
        return true;
    }
    i64::from(effective_used_today(account, today)) < account.daily_query_limit
}

pub fn remaining(account: &UserAccount, today: NaiveDate) -> Quota {
    if has_unlimited_quota(account) {
        return Quota::Unlimited;
    }
    let left = account.daily_query_limit - i64::from(effective_used_today(account, today));
    Quota::Limited(u32::try_from(left.max(0)).unwrap_or(u32::MAX))
}

/// Commits a pending rollover. Returns `true` if the account changed.
pub fn ensure_fresh_period(account: &mut UserAccount, today: NaiveDate) -> bool {
    if !is_stale(account, today) {
        return false;
    }
    debug!(
        email = %account.email,
        from = %account.last_reset_date,
        to = %today,
        "Resetting daily query counter"
    );
    account.queries_used_today = 0;
    account.last_reset_date = today;
    true
}

/// Accounts for one delivered query. The caller persists the returned account.
pub fn record_usage(mut account: UserAccount, today: NaiveDate) -> UserAccount {
    ensure_fresh_period(&mut account, today);

    if !has_unlimited_quota(&account) {
        let cap = u32::try_from(account.daily_query_limit).unwrap_or(u32::MAX);
        account.queries_used_today = account.queries_used_today.saturating_add(1).min(cap);
    }
    account.total_queries_all_time = account.total_queries_all_time.saturating_add(1);
    account
}

/// Switches tier and daily limit. Counters are left alone.
pub fn upgrade(mut account: UserAccount, tier: SubscriptionTier) -> UserAccount {
    account.subscription_tier = tier;
    account.daily_query_limit = pricing::limits(tier).daily_queries;
    account
}

/// Moves an account whose paid period has ended back to the free tier.
/// Returns `true` if the account changed.
pub fn expire_subscription(account: &mut UserAccount, now: DateTime<Utc>) -> bool {
    let ended = account
        .subscription
        .as_ref()
        .is_some_and(|subscription| subscription.ends_at <= now);
    if !ended || account.subscription_status == SubscriptionStatus::Expired {
        return false;
    }

    info!(email = %account.email, tier = account.subscription_tier.as_str(), "Subscription lapsed");
    account.subscription_status = SubscriptionStatus::Expired;
    account.subscription_tier = SubscriptionTier::Free;
    account.daily_query_limit = pricing::limits(SubscriptionTier::Free).daily_queries;
    true
}

/// Time left until the local midnight following `now`.
pub fn time_until_reset(now: NaiveDateTime) -> ResetCountdown {
    let next_midnight = now
        .date()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .unwrap_or(now);
    let minutes_left = (next_midnight - now).num_minutes();

    ResetCountdown {
        hours: minutes_left / 60,
        minutes: minutes_left % 60,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Subscription;
    use crate::pricing::PlanId;
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn free_account() -> UserAccount {
        UserAccount::new("reader@example.com", None, day(1), Utc::now())
    }

    #[test]
    fn free_quota_runs_out_and_returns_next_day() {
        let mut account = free_account();
        for _ in 0..5 {
            assert!(can_submit(&account, day(1)));
            account = record_usage(account, day(1));
        }
        assert!(!can_submit(&account, day(1)));
        assert_eq!(remaining(&account, day(1)), Quota::Limited(0));

        assert!(can_submit(&account, day(2)));
        assert_eq!(remaining(&account, day(2)), Quota::Limited(5));
    }

    #[test]
    fn read_checks_do_not_commit_rollover() {
        let mut account = free_account();
        account.queries_used_today = 5;

        assert!(can_submit(&account, day(2)));
        assert_eq!(remaining(&account, day(2)), Quota::Limited(5));
        assert_eq!(account.last_reset_date, day(1));
        assert_eq!(account.queries_used_today, 5);
    }

    #[test]
    fn record_usage_commits_rollover_before_counting() {
        let mut account = free_account();
        account.queries_used_today = 5;

        let account = record_usage(account, day(2));
        assert_eq!(account.last_reset_date, day(2));
        assert_eq!(account.queries_used_today, 1);
        assert_eq!(remaining(&account, day(2)), Quota::Limited(4));
    }

    #[test]
    fn total_always_increments_by_one() {
        for tier in [SubscriptionTier::Free, SubscriptionTier::Pro, SubscriptionTier::Enterprise] {
            let account = upgrade(free_account(), tier);
            let before = account.total_queries_all_time;
            let after = record_usage(account, day(1));
            assert_eq!(after.total_queries_all_time, before + 1);
        }
    }

    #[test]
    fn usage_is_capped_at_the_limit() {
        let mut account = free_account();
        account.queries_used_today = 5;
        let account = record_usage(account, day(1));
        assert_eq!(account.queries_used_today, 5);
        assert_eq!(account.total_queries_all_time, 1);
    }

    #[test]
    fn paid_tiers_ignore_daily_counter() {
        let mut account = upgrade(free_account(), SubscriptionTier::Pro);
        account.queries_used_today = 40;
        assert!(can_submit(&account, day(1)));
        assert_eq!(remaining(&account, day(1)), Quota::Unlimited);

        let account = record_usage(account, day(1));
        assert_eq!(account.queries_used_today, 40);
    }

    #[test]
    fn upgrade_keeps_counters() {
        let mut account = free_account();
        account.queries_used_today = 3;
        account.total_queries_all_time = 17;

        let pro = upgrade(account, SubscriptionTier::Pro);
        assert_eq!(pro.daily_query_limit, UNLIMITED);
        assert_eq!(pro.queries_used_today, 3);
        assert_eq!(pro.total_queries_all_time, 17);
        assert_eq!(remaining(&pro, day(1)).as_sentinel(), UNLIMITED);
    }

    #[test]
    fn ensure_fresh_period_reports_change_once() {
        let mut account = free_account();
        account.queries_used_today = 2;
        assert!(ensure_fresh_period(&mut account, day(3)));
        assert!(!ensure_fresh_period(&mut account, day(3)));
        assert_eq!(account.queries_used_today, 0);
    }

    #[test]
    fn ended_subscription_falls_back_to_free() {
        let start = "2024-05-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let mut account = upgrade(free_account(), SubscriptionTier::Pro);
        account.subscription = Some(Subscription::start(PlanId::ProMonthly, 399, start));

        assert!(!expire_subscription(&mut account, start + chrono::Duration::days(29)));
        assert_eq!(account.subscription_tier, SubscriptionTier::Pro);

        assert!(expire_subscription(&mut account, start + chrono::Duration::days(31)));
        assert_eq!(account.subscription_tier, SubscriptionTier::Free);
        assert_eq!(account.subscription_status, SubscriptionStatus::Expired);
        assert_eq!(account.daily_query_limit, 5);
        assert!(!expire_subscription(&mut account, start + chrono::Duration::days(32)));
    }

    #[test]
    fn countdown_to_local_midnight() {
        let now = day(1).and_hms_opt(21, 15, 30).unwrap();
        assert_eq!(time_until_reset(now), ResetCountdown { hours: 2, minutes: 44 });

        let midnight = day(1).and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(time_until_reset(midnight), ResetCountdown { hours: 24, minutes: 0 });
    }

    #[test]
    fn minutes_before_and_after_midnight_are_different_periods() {
        let mut account = free_account();
        account.queries_used_today = 4;
        let account = record_usage(account, day(1));
        assert!(!can_submit(&account, day(1)));
        assert!(can_submit(&account, day(2)));
    }
}
