//! crates/research_copilot_core/src/pricing.rs
//!
//! The single table of tiers, feature limits and plan prices. Both the entitlement
//! checks and the pricing endpoint read from here.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::domain::{SubscriptionTier, UNLIMITED};

pub const PRO_MONTHLY: u32 = 399;
pub const PRO_ANNUAL: u32 = 3999;
pub const ENTERPRISE_ANNUAL: u32 = 29999;
pub const ENTERPRISE_SEATS: u32 = 10;

/// Percentage off pro plans for verified academic addresses.
pub const STUDENT_DISCOUNT_PERCENT: u32 = 40;

/// Email suffixes that qualify an account for the student discount.
const ACADEMIC_SUFFIXES: &[&str] = &[".edu", ".edu.in", ".ac.in"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Bibtex,
    Markdown,
    Text,
}

/// What a tier is allowed to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierLimits {
    /// `UNLIMITED` when not gated.
    pub daily_queries: i64,
    pub sections: u32,
    pub references: RangeInclusive<u32>,
    pub exports: &'static [ExportFormat],
    /// `UNLIMITED` when history is kept forever.
    pub history_days: i64,
    pub team_features: bool,
}

const FULL_EXPORTS: &[ExportFormat] = &[
    ExportFormat::Pdf,
    ExportFormat::Bibtex,
    ExportFormat::Markdown,
    ExportFormat::Text,
];

pub fn limits(tier: SubscriptionTier) -> TierLimits {
    match tier {
        SubscriptionTier::Free => TierLimits {
            daily_queries: 5,
            sections: 6,
            references: 0..=15,
            exports: &[ExportFormat::Text],
            history_days: 7,
            team_features: false,
        },
        SubscriptionTier::Pro => TierLimits {
            daily_queries: UNLIMITED,
            sections: 9,
            references: 18..=25,
            exports: FULL_EXPORTS,
            history_days: UNLIMITED,
            team_features: false,
        },
        SubscriptionTier::Enterprise => TierLimits {
            daily_queries: UNLIMITED,
            sections: 9,
            references: 18..=25,
            exports: FULL_EXPORTS,
            history_days: UNLIMITED,
            team_features: true,
        },
    }
}

pub fn is_academic_email(email: &str) -> bool {
    let email = email.trim().to_ascii_lowercase();
    ACADEMIC_SUFFIXES.iter().any(|suffix| email.ends_with(suffix))
}

//=========================================================================================
// Plans
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Annual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanId {
    ProMonthly,
    ProAnnual,
    Enterprise,
}

impl PlanId {
    pub const ALL: [PlanId; 3] = [PlanId::ProMonthly, PlanId::ProAnnual, PlanId::Enterprise];

    pub fn as_str(self) -> &'static str {
        match self {
            PlanId::ProMonthly => "pro-monthly",
            PlanId::ProAnnual => "pro-annual",
            PlanId::Enterprise => "enterprise",
        }
    }

    pub fn tier(self) -> SubscriptionTier {
        match self {
            PlanId::ProMonthly | PlanId::ProAnnual => SubscriptionTier::Pro,
            PlanId::Enterprise => SubscriptionTier::Enterprise,
        }
    }

    pub fn billing_cycle(self) -> BillingCycle {
        match self {
            PlanId::ProMonthly => BillingCycle::Monthly,
            PlanId::ProAnnual | PlanId::Enterprise => BillingCycle::Annual,
        }
    }

    pub fn base_price(self) -> u32 {
        match self {
            PlanId::ProMonthly => PRO_MONTHLY,
            PlanId::ProAnnual => PRO_ANNUAL,
            PlanId::Enterprise => ENTERPRISE_ANNUAL,
        }
    }

    /// Price in whole rupees. The student discount only applies to pro plans.
    pub fn price(self, is_student: bool) -> u32 {
        match self {
            PlanId::ProMonthly | PlanId::ProAnnual if is_student => {
                student_price(self.base_price())
            }
            _ => self.base_price(),
        }
    }

    pub fn details(self, is_student: bool) -> PriceDetails {
        let discounted = self.price(is_student);
        let discount_percent = if discounted < self.base_price() {
            STUDENT_DISCOUNT_PERCENT
        } else {
            0
        };

        match self {
            PlanId::ProMonthly => PriceDetails {
                plan: self,
                original: PRO_MONTHLY,
                discounted,
                period: "month",
                daily_cost: round_div(discounted, 30),
                savings: 0,
                discount_percent,
                seats: None,
                per_seat_monthly: None,
            },
            PlanId::ProAnnual => {
                let monthly_for_a_year = PlanId::ProMonthly.price(is_student) * 12;
                PriceDetails {
                    plan: self,
                    original: PRO_ANNUAL,
                    discounted,
                    period: "year",
                    daily_cost: round_div(PRO_ANNUAL, 365),
                    savings: monthly_for_a_year.saturating_sub(discounted),
                    discount_percent,
                    seats: None,
                    per_seat_monthly: None,
                }
            }
            PlanId::Enterprise => PriceDetails {
                plan: self,
                original: ENTERPRISE_ANNUAL,
                discounted,
                period: "year",
                daily_cost: round_div(ENTERPRISE_ANNUAL, 365),
                savings: 0,
                discount_percent,
                seats: Some(ENTERPRISE_SEATS),
                per_seat_monthly: Some(round_div(
                    round_div(ENTERPRISE_ANNUAL, ENTERPRISE_SEATS),
                    12,
                )),
            },
        }
    }
}

impl std::str::FromStr for PlanId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlanId::ALL
            .into_iter()
            .find(|plan| plan.as_str() == s)
            .ok_or_else(|| format!("unknown plan '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceDetails {
    pub plan: PlanId,
    pub original: u32,
    pub discounted: u32,
    pub period: &'static str,
    pub daily_cost: u32,
    pub savings: u32,
    pub discount_percent: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_seat_monthly: Option<u32>,
}

fn student_price(base: u32) -> u32 {
    round_div(base * (100 - STUDENT_DISCOUNT_PERCENT), 100)
}

/// Integer division rounding half up.
fn round_div(value: u32, divisor: u32) -> u32 {
    (value + divisor / 2) / divisor
}

/// Formats whole rupees with Indian digit grouping, e.g. `₹1,23,456`.
pub fn format_price(amount: u32) -> String {
    let digits = amount.to_string();
    if digits.len() <= 3 {
        return format!("₹{}", digits);
    }

    let (head, last_three) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 2 {
        groups.push(&head[end - 2..end]);
        end -= 2;
    }
    groups.push(&head[..end]);
    groups.reverse();

    format!("₹{},{}", groups.join(","), last_three)
}
