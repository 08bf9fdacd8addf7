//! Neighbor interpolation for missing quotes
//!
//! Each interior row of a file is compared with the rows on either side.
//! Inside the strike window around the underlying price, a missing field is
//! filled from its neighbors; a field missing on all three rows makes the
//! row irreparable. Files that accumulate too many irreparable rows, or that
//! reach a row with a zero underlying price, are flagged for deletion.
//!
//! Rows must be sorted by ascending strike. Repair is left to right and in
//! place, so the previous row seen by each step is already repaired.

use crate::config::{RepairConfig, VegaPutRule};
use crate::error::{ChainError, Result};
use crate::types::{is_missing, OptionChainRow};
use serde::Serialize;
use std::path::Path;

/// A numeric column the repair pass knows how to fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepairField {
    CallLtp,
    PutLtp,
    GammaCall,
    GammaPut,
    IvCall,
    IvPut,
    DeltaCall,
    DeltaPut,
    ThetaCall,
    ThetaPut,
    RhoCall,
    RhoPut,
    UnderlyingLtp,
    DaysToExpiry,
    VegaPut,
}

/// Fields repaired by averaging the two neighbors
pub const PRIMARY_FIELDS: [RepairField; 13] = [
    RepairField::CallLtp,
    RepairField::PutLtp,
    RepairField::GammaCall,
    RepairField::GammaPut,
    RepairField::IvCall,
    RepairField::IvPut,
    RepairField::DeltaCall,
    RepairField::DeltaPut,
    RepairField::ThetaCall,
    RepairField::ThetaPut,
    RepairField::RhoCall,
    RepairField::RhoPut,
    RepairField::UnderlyingLtp,
];

/// Fields with their own fill rule
pub const AUXILIARY_FIELDS: [RepairField; 2] = [RepairField::DaysToExpiry, RepairField::VegaPut];

impl RepairField {
    pub fn get(self, row: &OptionChainRow) -> f64 {
        match self {
            RepairField::CallLtp => row.call_ltp,
            RepairField::PutLtp => row.put_ltp,
            RepairField::GammaCall => row.gamma_call,
            RepairField::GammaPut => row.gamma_put,
            RepairField::IvCall => row.iv_call,
            RepairField::IvPut => row.iv_put,
            RepairField::DeltaCall => row.delta_call,
            RepairField::DeltaPut => row.delta_put,
            RepairField::ThetaCall => row.theta_call,
            RepairField::ThetaPut => row.theta_put,
            RepairField::RhoCall => row.rho_call,
            RepairField::RhoPut => row.rho_put,
            RepairField::UnderlyingLtp => row.underlying_ltp,
            RepairField::DaysToExpiry => row.days_to_expiry,
            RepairField::VegaPut => row.vega_put,
        }
    }

    pub fn set(self, row: &mut OptionChainRow, value: f64) {
        let slot = match self {
            RepairField::CallLtp => &mut row.call_ltp,
            RepairField::PutLtp => &mut row.put_ltp,
            RepairField::GammaCall => &mut row.gamma_call,
            RepairField::GammaPut => &mut row.gamma_put,
            RepairField::IvCall => &mut row.iv_call,
            RepairField::IvPut => &mut row.iv_put,
            RepairField::DeltaCall => &mut row.delta_call,
            RepairField::DeltaPut => &mut row.delta_put,
            RepairField::ThetaCall => &mut row.theta_call,
            RepairField::ThetaPut => &mut row.theta_put,
            RepairField::RhoCall => &mut row.rho_call,
            RepairField::RhoPut => &mut row.rho_put,
            RepairField::UnderlyingLtp => &mut row.underlying_ltp,
            RepairField::DaysToExpiry => &mut row.days_to_expiry,
            RepairField::VegaPut => &mut row.vega_put,
        };
        *slot = value;
    }

    /// Column header of this field
    pub fn column(self) -> &'static str {
        match self {
            RepairField::CallLtp => "CALL_LTP",
            RepairField::PutLtp => "PUT_LTP",
            RepairField::GammaCall => "GAMMA_CALL",
            RepairField::GammaPut => "GAMMA_PUT",
            RepairField::IvCall => "IV_CALL",
            RepairField::IvPut => "IV_PUT",
            RepairField::DeltaCall => "DELTA_CALL",
            RepairField::DeltaPut => "DELTA_PUT",
            RepairField::ThetaCall => "THETA_CALL",
            RepairField::ThetaPut => "THETA_PUT",
            RepairField::RhoCall => "RHO_CALL",
            RepairField::RhoPut => "RHO_PUT",
            RepairField::UnderlyingLtp => "Underlying LTP",
            RepairField::DaysToExpiry => "Days to Expiry",
            RepairField::VegaPut => "Vega_Put",
        }
    }
}

/// How a missing value is rebuilt from its neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    /// `(previous + next) / 2`. A missing neighbor still takes part, so the
    /// result is missing too; the row is nonetheless marked changed.
    Average,
    /// Previous value, else next. Used for values constant across a file.
    CarryForward,
    /// Average, and the repair condition is also counted as irreparable
    /// while a field missing on all three rows is not. Kept only to
    /// reproduce historical put-vega output.
    LegacySelfCompare,
}

impl FillRule {
    fn fill(self, previous: f64, next: f64) -> f64 {
        match self {
            FillRule::Average | FillRule::LegacySelfCompare => (previous + next) / 2.0,
            FillRule::CarryForward => {
                if is_missing(previous) {
                    next
                } else {
                    previous
                }
            }
        }
    }
}

/// One entry of the repair table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub field: RepairField,
    pub fill: FillRule,
}

/// Result of repairing one interior row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowRepair {
    /// Whether the row sat inside the strike window
    pub in_window: bool,
    pub changed: bool,
    /// Number of fields missing on the row and both neighbors
    pub irreparable: usize,
}

/// Why a file was flagged for deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlagReason {
    /// Deficiency counter passed the delete limit at this row
    TooDeficient { row: usize },
    /// This row had an underlying price of exactly zero
    ZeroUnderlying { row: usize },
}

/// Result of repairing a whole file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairOutcome {
    pub changed: bool,
    /// Rows with at least one irreparable field
    pub deficiency: usize,
    pub rows_visited: usize,
    pub rows_changed: usize,
    pub flagged: Option<FlagReason>,
}

impl RepairOutcome {
    /// Whether this file produces a deletion signal
    pub fn is_flagged(&self) -> bool {
        self.flagged.is_some()
    }
}

/// Neighbor-interpolation pass configured with window and limits
#[derive(Debug, Clone)]
pub struct RepairPass {
    rules: Vec<FieldRule>,
    strike_window: f64,
    persist_limit: usize,
    delete_limit: usize,
}

impl Default for RepairPass {
    fn default() -> Self {
        Self::new(&RepairConfig::default())
    }
}

impl RepairPass {
    pub fn new(config: &RepairConfig) -> Self {
        let mut rules: Vec<FieldRule> = PRIMARY_FIELDS
            .iter()
            .map(|&field| FieldRule {
                field,
                fill: FillRule::Average,
            })
            .collect();

        rules.push(FieldRule {
            field: RepairField::DaysToExpiry,
            fill: FillRule::CarryForward,
        });
        rules.push(FieldRule {
            field: RepairField::VegaPut,
            fill: match config.vega_put_rule {
                VegaPutRule::Uniform => FillRule::Average,
                VegaPutRule::Legacy => FillRule::LegacySelfCompare,
            },
        });

        Self {
            rules,
            strike_window: config.strike_window,
            persist_limit: config.persist_limit,
            delete_limit: config.delete_limit,
        }
    }

    /// The field table, in evaluation order
    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Repair `current` from its neighbors. Rows outside the strike window
    /// are left alone whatever they are missing. A row without its own
    /// underlying price is placed against the previous row's, else the next.
    pub fn repair_row(
        &self,
        previous: &OptionChainRow,
        current: &mut OptionChainRow,
        next: &OptionChainRow,
    ) -> RowRepair {
        let mut result = RowRepair::default();
        let underlying = [
            current.underlying_ltp,
            previous.underlying_ltp,
            next.underlying_ltp,
        ]
        .into_iter()
        .find(|value| !is_missing(*value))
        .unwrap_or(f64::NAN);
        if !current.strike_within(self.strike_window, underlying) {
            return result;
        }
        result.in_window = true;

        for rule in &self.rules {
            let before = rule.field.get(previous);
            let value = rule.field.get(current);
            let after = rule.field.get(next);

            let value_missing = is_missing(value);
            let neighbor_present = !is_missing(before) || !is_missing(after);

            match rule.fill {
                FillRule::LegacySelfCompare => {
                    if value_missing && neighbor_present {
                        rule.field.set(current, rule.fill.fill(before, after));
                        result.changed = true;
                        result.irreparable += 1;
                    }
                }
                FillRule::Average | FillRule::CarryForward => {
                    if value_missing && neighbor_present {
                        rule.field.set(current, rule.fill.fill(before, after));
                        result.changed = true;
                    } else if value_missing {
                        result.irreparable += 1;
                    }
                }
            }
        }

        result
    }

    /// Repair a file's rows in place, stopping at the first row that flags
    /// the file for deletion.
    pub fn repair(&self, path: &Path, rows: &mut [OptionChainRow]) -> Result<RepairOutcome> {
        check_sorted(path, rows)?;

        let mut outcome = RepairOutcome::default();
        for index in 1..rows.len().saturating_sub(1) {
            let (head, tail) = rows.split_at_mut(index);
            let previous = &head[index - 1];
            let (current, rest) = tail.split_at_mut(1);
            let current = &mut current[0];
            let next = &rest[0];

            let row = self.repair_row(previous, current, next);
            outcome.rows_visited += 1;
            if row.changed {
                outcome.changed = true;
                outcome.rows_changed += 1;
            }
            if row.irreparable > 0 {
                outcome.deficiency += 1;
            }

            if outcome.deficiency > self.delete_limit {
                outcome.flagged = Some(FlagReason::TooDeficient { row: index });
                break;
            }
            if current.underlying_ltp == 0.0 {
                outcome.flagged = Some(FlagReason::ZeroUnderlying { row: index });
                break;
            }
        }

        Ok(outcome)
    }

    /// Whether a repaired file should be written back
    pub fn should_persist(&self, outcome: &RepairOutcome) -> bool {
        outcome.changed && outcome.deficiency <= self.persist_limit
    }
}

/// Reject rows whose strikes decrease anywhere
pub fn check_sorted(path: &Path, rows: &[OptionChainRow]) -> Result<()> {
    for (index, pair) in rows.windows(2).enumerate() {
        if pair[1].strike_price < pair[0].strike_price {
            return Err(ChainError::UnsortedStrikes {
                path: path.to_path_buf(),
                index: index + 1,
                strike: pair[1].strike_price,
                previous: pair[0].strike_price,
            });
        }
    }
    Ok(())
}
