//! Legacy plan catalog
//!
//! Maps membership plan names from the legacy platform to the amount and
//! display name billed after migration.

use std::collections::HashMap;

/// Billing representation of a legacy plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanMapping {
    /// Monthly amount in minor currency units (cents)
    pub amount_minor_units: i64,
    pub display_name: String,
}

/// Plans recognized by the reference deployment
pub const REFERENCE_PLANS: [(&str, i64); 4] = [
    ("Individual Membership", 4900),
    ("Family Membership", 12900),
    ("Premium Membership", 9900),
    ("Senior Membership", 3500),
];

#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: HashMap<String, PlanMapping>,
}

impl PlanCatalog {
    pub fn new<I, S>(plans: I) -> Self
    where
        I: IntoIterator<Item = (S, PlanMapping)>,
        S: Into<String>,
    {
        Self {
            plans: plans.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn reference() -> Self {
        Self::new(REFERENCE_PLANS.iter().map(|(name, amount)| {
            (
                *name,
                PlanMapping {
                    amount_minor_units: *amount,
                    display_name: name.to_string(),
                },
            )
        }))
    }

    /// Look up a plan by its legacy name.
    ///
    /// `None` means the plan is not migrated; callers skip the subscription
    /// rather than treating it as a failure.
    pub fn translate(&self, plan_name: &str) -> Option<&PlanMapping> {
        self.plans.get(plan_name.trim())
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::reference()
    }
}
