//! Built-in checks for the default gate configuration

use super::{CheckOutcome, CustomCheck, ALL_CNC_PROGRAMS_COMPLETE};
use crate::entities::{ProjectAggregate, Record};
use crate::gates::error::CheckError;
use crate::gates::value::{as_number, display, is_blank};

/// Every built-in check with its registry key
pub(super) fn all() -> Vec<(&'static str, Box<dyn CustomCheck>)> {
    vec![
        entry("deposit_received", DepositReceived),
        entry("final_payment_received", FinalPaymentReceived),
        entry("all_cabinets_dimensioned", AllCabinetsDimensioned),
        entry("all_bom_lines_covered", AllBomLinesCovered),
        entry("all_pos_confirmed", AllPosConfirmed),
        entry("all_production_tasks_complete", AllProductionTasksComplete),
        entry("no_blocking_defects", NoBlockingDefects),
        entry("delivery_date_set", DeliveryDateSet),
        entry(ALL_CNC_PROGRAMS_COMPLETE, AllCncProgramsComplete),
    ]
}

fn entry(
    key: &'static str,
    check: impl CustomCheck + 'static,
) -> (&'static str, Box<dyn CustomCheck>) {
    (key, Box::new(check))
}

fn rows<'a>(project: &'a ProjectAggregate, relation: &str) -> Result<&'a [Record], CheckError> {
    project
        .relation(relation)
        .ok_or_else(|| CheckError::MissingData(format!("relation '{}' not loaded", relation)))
}

fn is_set(record: &Record, field: &str) -> bool {
    record.get(field).is_some_and(|v| !is_blank(v))
}

fn text(record: &Record, field: &str) -> Option<String> {
    record
        .get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_ascii_lowercase())
}

fn number(record: &Record, field: &str) -> Option<f64> {
    record.get(field).and_then(as_number)
}

/// Identifies a row in failure details
fn row_name(record: &Record, index: usize) -> String {
    ["name", "id", "title"]
        .iter()
        .find_map(|f| record.get(*f).filter(|v| !is_blank(v)))
        .map(display)
        .unwrap_or_else(|| format!("#{}", index + 1))
}

/// Passes when no row matches `offending`; the detail lists the offenders
fn none_offending<F>(
    project: &ProjectAggregate,
    relation: &str,
    what: &str,
    offending: F,
) -> Result<CheckOutcome, CheckError>
where
    F: Fn(&Record) -> bool,
{
    let rows = rows(project, relation)?;
    let bad: Vec<String> = rows
        .iter()
        .enumerate()
        .filter(|(_, r)| offending(r))
        .map(|(i, r)| row_name(r, i))
        .collect();

    if bad.is_empty() {
        Ok(CheckOutcome::pass().with_detail(format!("{} {} checked", rows.len(), relation)))
    } else {
        Ok(CheckOutcome::fail(format!(
            "{} of {} {} {}: {}",
            bad.len(),
            rows.len(),
            relation,
            what,
            bad.join(", ")
        )))
    }
}

fn first_order_field(project: &ProjectAggregate, field: &str) -> Result<CheckOutcome, CheckError> {
    let orders = rows(project, "orders")?;
    match orders.first() {
        None => Ok(CheckOutcome::fail("no sales order")),
        Some(order) => Ok(CheckOutcome::from_bool(
            is_set(order, field),
            format!("{} on first sales order", field),
        )),
    }
}

struct DepositReceived;

impl CustomCheck for DepositReceived {
    fn evaluate(&self, project: &ProjectAggregate) -> Result<CheckOutcome, CheckError> {
        first_order_field(project, "deposit_paid_at")
    }
}

struct FinalPaymentReceived;

impl CustomCheck for FinalPaymentReceived {
    fn evaluate(&self, project: &ProjectAggregate) -> Result<CheckOutcome, CheckError> {
        first_order_field(project, "final_paid_at")
    }
}

struct AllCabinetsDimensioned;

impl CustomCheck for AllCabinetsDimensioned {
    fn evaluate(&self, project: &ProjectAggregate) -> Result<CheckOutcome, CheckError> {
        if rows(project, "cabinets")?.is_empty() {
            return Ok(CheckOutcome::fail("no cabinets defined"));
        }
        none_offending(project, "cabinets", "missing dimensions", |cabinet| {
            ["width", "height", "depth"]
                .iter()
                .any(|dim| !number(cabinet, dim).is_some_and(|v| v > 0.0))
        })
    }
}

struct AllBomLinesCovered;

impl CustomCheck for AllBomLinesCovered {
    fn evaluate(&self, project: &ProjectAggregate) -> Result<CheckOutcome, CheckError> {
        none_offending(project, "bom_lines", "not sourced", |line| {
            if is_set(line, "po_line_id") {
                return false;
            }
            let needed = number(line, "quantity").unwrap_or(0.0);
            let reserved = number(line, "quantity_reserved").unwrap_or(0.0);
            reserved < needed
        })
    }
}

struct AllPosConfirmed;

impl CustomCheck for AllPosConfirmed {
    fn evaluate(&self, project: &ProjectAggregate) -> Result<CheckOutcome, CheckError> {
        none_offending(project, "purchase_orders", "not confirmed", |po| {
            !matches!(
                text(po, "state").as_deref(),
                Some("confirmed" | "received" | "done")
            )
        })
    }
}

struct AllProductionTasksComplete;

impl CustomCheck for AllProductionTasksComplete {
    fn evaluate(&self, project: &ProjectAggregate) -> Result<CheckOutcome, CheckError> {
        none_offending(project, "tasks", "still open", |task| {
            text(task, "task_type").as_deref() == Some("production")
                && text(task, "state").as_deref() != Some("done")
        })
    }
}

struct NoBlockingDefects;

impl CustomCheck for NoBlockingDefects {
    fn evaluate(&self, project: &ProjectAggregate) -> Result<CheckOutcome, CheckError> {
        none_offending(project, "defects", "blocking and open", |defect| {
            text(defect, "severity").as_deref() == Some("blocking")
                && !matches!(
                    text(defect, "state").as_deref(),
                    Some("resolved" | "closed")
                )
        })
    }
}

struct DeliveryDateSet;

impl CustomCheck for DeliveryDateSet {
    fn evaluate(&self, project: &ProjectAggregate) -> Result<CheckOutcome, CheckError> {
        let set = ["delivery_scheduled_at", "desired_delivery_date"]
            .iter()
            .any(|f| project.field(f).is_some_and(|v| !is_blank(v)));
        Ok(CheckOutcome::from_bool(set, "delivery date"))
    }
}

struct AllCncProgramsComplete;

impl CustomCheck for AllCncProgramsComplete {
    fn evaluate(&self, project: &ProjectAggregate) -> Result<CheckOutcome, CheckError> {
        none_offending(project, "cnc_programs", "not complete", |program| {
            text(program, "status").as_deref() != Some("complete")
        })
    }
}
