//! crates/research_copilot_core/src/billing.rs
//!
//! Upgrades through the payment gateway: price a plan, open an order for the
//! checkout widget, and apply the plan once the gateway confirms the payment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{Subscription, SubscriptionStatus, UserAccount};
use crate::entitlement;
use crate::ports::{
    Clock, OrderRequest, PaymentGateway, PaymentOrder, PaymentVerification, PortError,
};
use crate::pricing::PlanId;
use crate::store::Repository;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("Unknown or already settled order {0}")]
    UnknownOrder(String),
    #[error("Order {0} belongs to a different account")]
    OrderMismatch(String),
    #[error("Payment could not be verified")]
    VerificationFailed,
    #[error(transparent)]
    Port(#[from] PortError),
}

/// An order awaiting payment, remembered so verification knows what was bought.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrder {
    pub order_id: String,
    pub email: String,
    pub plan: PlanId,
    pub amount: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Billing {
    repo: Repository,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
}

/// Moves `account` onto `plan`. Usage counters are untouched.
pub fn apply_plan(
    account: UserAccount,
    plan: PlanId,
    paid_amount: u32,
    now: DateTime<Utc>,
) -> UserAccount {
    let mut account = entitlement::upgrade(account, plan.tier());
    account.subscription_status = SubscriptionStatus::Active;
    account.subscription = Some(Subscription::start(plan, paid_amount, now));
    account
}

impl Billing {
    pub fn new(repo: Repository, gateway: Arc<dyn PaymentGateway>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            gateway,
            clock,
        }
    }

    pub async fn create_order(
        &self,
        account: &UserAccount,
        plan: PlanId,
    ) -> Result<PaymentOrder, BillingError> {
        let amount = plan.price(account.is_student);
        let order = self
            .gateway
            .create_order(&OrderRequest {
                plan,
                user_id: account.id,
                email: account.email.clone(),
                name: account.display_name.clone(),
                amount,
            })
            .await?;

        self.repo
            .save_pending_order(&PendingOrder {
                order_id: order.order_id.clone(),
                email: account.email.clone(),
                plan,
                amount,
                created_at: self.clock.now(),
            })
            .await?;

        info!(
            email = %account.email,
            plan = plan.as_str(),
            amount,
            order_id = %order.order_id,
            "Payment order created"
        );
        Ok(order)
    }

    /// Verifies a checkout callback and, on success, upgrades the buyer.
    pub async fn verify_payment(
        &self,
        account: &UserAccount,
        payload: &PaymentVerification,
    ) -> Result<UserAccount, BillingError> {
        let order_id = payload.razorpay_order_id.as_str();
        let pending = self
            .repo
            .pending_order(order_id)
            .await?
            .ok_or_else(|| BillingError::UnknownOrder(order_id.to_string()))?;
        if !pending.email.eq_ignore_ascii_case(&account.email) {
            return Err(BillingError::OrderMismatch(order_id.to_string()));
        }

        if !self.gateway.verify_payment(payload).await? {
            warn!(email = %account.email, order_id, "Payment verification failed");
            return Err(BillingError::VerificationFailed);
        }

        let current = self.repo.account(&account.email).await?.unwrap_or_else(|| account.clone());
        let upgraded = apply_plan(current, pending.plan, pending.amount, self.clock.now());
        self.repo.save_account(&upgraded).await?;
        self.repo.delete_pending_order(order_id).await?;

        info!(
            email = %upgraded.email,
            plan = pending.plan.as_str(),
            payment_id = %payload.razorpay_payment_id,
            "Subscription activated"
        );
        Ok(upgraded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SubscriptionTier, UNLIMITED};
    use crate::ports::PortResult;
    use crate::store::testing::{FixedClock, MemoryKv};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    struct FakeGateway {
        approve: bool,
        last_amount: Mutex<Option<u32>>,
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_order(&self, request: &OrderRequest) -> PortResult<PaymentOrder> {
            *self.last_amount.lock().unwrap() = Some(request.amount);
            Ok(PaymentOrder {
                order_id: "order_1".into(),
                amount: u64::from(request.amount) * 100,
                currency: "INR".into(),
                key_id: "rzp_test".into(),
            })
        }

        async fn verify_payment(&self, _payload: &PaymentVerification) -> PortResult<bool> {
            Ok(self.approve)
        }
    }

    fn payload() -> PaymentVerification {
        PaymentVerification {
            razorpay_order_id: "order_1".into(),
            razorpay_payment_id: "pay_1".into(),
            razorpay_signature: "sig".into(),
        }
    }

    async fn setup(
        approve: bool,
        email: &str,
    ) -> (Billing, Repository, UserAccount, Arc<FakeGateway>) {
        let repo = Repository::new(Arc::new(MemoryKv::default()));
        let gateway = Arc::new(FakeGateway {
            approve,
            last_amount: Mutex::new(None),
        });
        let clock = Arc::new(FixedClock::at("2024-06-01T10:00:00"));
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut account = UserAccount::new(email, None, today, clock.now());
        account.queries_used_today = 4;
        repo.save_account(&account).await.unwrap();
        (Billing::new(repo.clone(), gateway.clone(), clock), repo, account, gateway)
    }

    #[tokio::test]
    async fn students_are_charged_the_discounted_price() {
        let (billing, _, account, gateway) = setup(true, "s@iitd.ac.in").await;
        billing.create_order(&account, PlanId::ProMonthly).await.unwrap();
        assert_eq!(*gateway.last_amount.lock().unwrap(), Some(239));
    }

    #[tokio::test]
    async fn verified_payment_upgrades_and_keeps_counters() {
        let (billing, repo, account, _) = setup(true, "p@example.com").await;
        billing.create_order(&account, PlanId::ProAnnual).await.unwrap();

        let upgraded = billing.verify_payment(&account, &payload()).await.unwrap();
        assert_eq!(upgraded.subscription_tier, SubscriptionTier::Pro);
        assert_eq!(upgraded.daily_query_limit, UNLIMITED);
        assert_eq!(upgraded.queries_used_today, 4);
        assert_eq!(upgraded.subscription.as_ref().map(|s| s.paid_amount), Some(3999));
        assert!(repo.pending_order("order_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejected_payment_changes_nothing() {
        let (billing, repo, account, _) = setup(false, "p@example.com").await;
        billing.create_order(&account, PlanId::ProMonthly).await.unwrap();

        let err = billing.verify_payment(&account, &payload()).await.unwrap_err();
        assert!(matches!(err, BillingError::VerificationFailed));
        let stored = repo.account("p@example.com").await.unwrap().unwrap();
        assert_eq!(stored.subscription_tier, SubscriptionTier::Free);
        assert!(repo.pending_order("order_1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_order_is_rejected() {
        let (billing, _, account, _) = setup(true, "p@example.com").await;
        let err = billing.verify_payment(&account, &payload()).await.unwrap_err();
        assert!(matches!(err, BillingError::UnknownOrder(_)));
    }
}
