//! The expense-split calculator.
//!
//! [`SplitSpec`] is the persisted split configuration of an expense: one
//! variant per split kind, each carrying only the fields that kind needs.
//! [`compute_shares`] turns a spec plus the group member list into the
//! per-debtor owed amounts. It is pure and deterministic; any input that
//! would produce an inconsistent split fails instead of being corrected
//! silently.
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    LedgerError, LedgerResult,
    money::{EPSILON, approx_eq},
};

/// Discriminant stored on the expense row (`split_type` column).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitType {
    Equal,
    Percentage,
    Custom,
    Shares,
    Extra,
}

impl SplitType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "EQUAL",
            Self::Percentage => "PERCENTAGE",
            Self::Custom => "CUSTOM",
            Self::Shares => "SHARES",
            Self::Extra => "EXTRA",
        }
    }
}

impl TryFrom<&str> for SplitType {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "EQUAL" => Ok(Self::Equal),
            "PERCENTAGE" => Ok(Self::Percentage),
            "CUSTOM" => Ok(Self::Custom),
            "SHARES" => Ok(Self::Shares),
            "EXTRA" => Ok(Self::Extra),
            other => Err(LedgerError::Validation(format!(
                "unsupported split type: {other}"
            ))),
        }
    }
}

/// A debtor entry in a percentage split.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PercentPortion {
    pub user_id: String,
    pub percentage: Decimal,
}

/// A debtor entry in a custom (fixed amount) split.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AmountPortion {
    pub user_id: String,
    pub amount: Decimal,
}

/// A debtor entry in a shares (unit count) split.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SharePortion {
    pub user_id: String,
    pub shares: i32,
}

/// A debtor entry in an extra split; the extra rides on top of the equal
/// part every group member carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtraPortion {
    pub user_id: String,
    #[serde(default)]
    pub extra_amount: Decimal,
}

/// How an expense is divided between its debtors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitSpec {
    Equal { debtor_ids: Vec<String> },
    Percentage { portions: Vec<PercentPortion> },
    Custom { portions: Vec<AmountPortion> },
    Shares { portions: Vec<SharePortion> },
    Extra { portions: Vec<ExtraPortion> },
}

/// Derivation parameters of a single debt, kept on the debt row for audit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SplitAudit {
    pub percentage: Option<Decimal>,
    pub shares: Option<i32>,
    pub extra_amount: Option<Decimal>,
}

impl SplitSpec {
    pub fn kind(&self) -> SplitType {
        match self {
            Self::Equal { .. } => SplitType::Equal,
            Self::Percentage { .. } => SplitType::Percentage,
            Self::Custom { .. } => SplitType::Custom,
            Self::Shares { .. } => SplitType::Shares,
            Self::Extra { .. } => SplitType::Extra,
        }
    }

    /// Users the split configuration names itself (for an extra split the
    /// final share map covers the whole group, not only these).
    pub fn named_debtors(&self) -> Vec<&str> {
        match self {
            Self::Equal { debtor_ids } => debtor_ids.iter().map(String::as_str).collect(),
            Self::Percentage { portions } => {
                portions.iter().map(|p| p.user_id.as_str()).collect()
            }
            Self::Custom { portions } => portions.iter().map(|p| p.user_id.as_str()).collect(),
            Self::Shares { portions } => portions.iter().map(|p| p.user_id.as_str()).collect(),
            Self::Extra { portions } => portions.iter().map(|p| p.user_id.as_str()).collect(),
        }
    }

    /// The audit fields to stamp on a debt derived for `user_id`.
    pub fn audit_for(&self, user_id: &str) -> SplitAudit {
        match self {
            Self::Equal { .. } | Self::Custom { .. } => SplitAudit::default(),
            Self::Percentage { portions } => SplitAudit {
                percentage: portions
                    .iter()
                    .find(|p| p.user_id == user_id)
                    .map(|p| p.percentage),
                ..SplitAudit::default()
            },
            Self::Shares { portions } => SplitAudit {
                shares: portions
                    .iter()
                    .find(|p| p.user_id == user_id)
                    .map(|p| p.shares),
                ..SplitAudit::default()
            },
            Self::Extra { portions } => SplitAudit {
                extra_amount: portions
                    .iter()
                    .find(|p| p.user_id == user_id)
                    .map(|p| p.extra_amount),
                ..SplitAudit::default()
            },
        }
    }

    fn ensure_unique_debtors(&self) -> LedgerResult<()> {
        let ids = self.named_debtors();
        for (i, id) in ids.iter().enumerate() {
            if ids[..i].contains(id) {
                return Err(LedgerError::Validation(format!(
                    "debtor \"{id}\" listed more than once"
                )));
            }
        }
        Ok(())
    }
}

/// Computes the per-debtor owed amounts for one expense.
///
/// The returned pairs keep the input order of the split (group member order
/// for extra splits); the balance netter depends on that order. Shares may
/// carry more than two decimals; rounding happens when debts are persisted.
///
/// Post-condition: the shares sum to `total` within 0.01, otherwise the
/// whole computation is rejected as an integrity violation.
pub fn compute_shares(
    total: Decimal,
    split: &SplitSpec,
    member_ids: &[String],
) -> LedgerResult<Vec<(String, Decimal)>> {
    if total <= Decimal::ZERO {
        return Err(LedgerError::Validation(
            "expense amount must be positive".to_string(),
        ));
    }
    if split.named_debtors().is_empty() {
        return Err(LedgerError::Validation(
            "at least one debtor is required".to_string(),
        ));
    }
    split.ensure_unique_debtors()?;

    let shares: Vec<(String, Decimal)> = match split {
        SplitSpec::Equal { debtor_ids } => {
            let each = total / Decimal::from(debtor_ids.len());
            debtor_ids.iter().map(|id| (id.clone(), each)).collect()
        }
        SplitSpec::Percentage { portions } => {
            let total_pct: Decimal = portions.iter().map(|p| p.percentage).sum();
            if (total_pct - Decimal::ONE_HUNDRED).abs() > Decimal::new(1, 1) {
                return Err(LedgerError::Validation(format!(
                    "split percentages must add up to 100, got {total_pct}"
                )));
            }
            portions
                .iter()
                .map(|p| {
                    (
                        p.user_id.clone(),
                        total * p.percentage / Decimal::ONE_HUNDRED,
                    )
                })
                .collect()
        }
        SplitSpec::Custom { portions } => {
            let sum: Decimal = portions.iter().map(|p| p.amount).sum();
            if !approx_eq(sum, total) {
                return Err(LedgerError::Validation(format!(
                    "custom amounts add up to {sum}, expected {total}"
                )));
            }
            portions
                .iter()
                .map(|p| (p.user_id.clone(), p.amount))
                .collect()
        }
        SplitSpec::Shares { portions } => {
            let total_units: i64 = portions.iter().map(|p| i64::from(p.shares)).sum();
            if total_units <= 0 {
                return Err(LedgerError::Validation(
                    "total share count must be positive".to_string(),
                ));
            }
            let per_unit = total / Decimal::from(total_units);
            portions
                .iter()
                .map(|p| (p.user_id.clone(), per_unit * Decimal::from(p.shares)))
                .collect()
        }
        SplitSpec::Extra { portions } => {
            let total_extra: Decimal = portions.iter().map(|p| p.extra_amount).sum();
            if total_extra > total + EPSILON {
                return Err(LedgerError::Validation(format!(
                    "extra amounts add up to {total_extra}, more than the expense total {total}"
                )));
            }
            if member_ids.is_empty() {
                return Err(LedgerError::Validation(
                    "an extra split needs at least one group member".to_string(),
                ));
            }
            let each = (total - total_extra) / Decimal::from(member_ids.len());
            member_ids
                .iter()
                .map(|id| {
                    let extra = portions
                        .iter()
                        .find(|p| p.user_id == *id)
                        .map(|p| p.extra_amount)
                        .unwrap_or_default();
                    (id.clone(), each + extra)
                })
                .collect()
        }
    };

    // Rounding-integrity guard: never persist a split that does not add up.
    let computed: Decimal = shares.iter().map(|(_, s)| *s).sum();
    if !approx_eq(computed, total) {
        return Err(LedgerError::Integrity(format!(
            "computed shares add up to {computed}, expected {total}"
        )));
    }

    Ok(shares)
}
