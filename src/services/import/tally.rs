//! Fold of per-row outcomes into the import result

use crate::types::{ImportSummary, RowDiagnostic};

/// What happened to one data row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Imported { employee_created: bool },
    Rejected(RowDiagnostic),
}

/// Running totals of an import; built only through `absorb`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportTally {
    processed: i32,
    employees_created: i32,
    responses_created: i32,
    errors: Vec<RowDiagnostic>,
}

impl ImportTally {
    pub fn absorb(mut self, outcome: RowOutcome) -> Self {
        self.processed += 1;
        match outcome {
            RowOutcome::Imported { employee_created } => {
                self.responses_created += 1;
                if employee_created {
                    self.employees_created += 1;
                }
            }
            RowOutcome::Rejected(diagnostic) => self.errors.push(diagnostic),
        }
        self
    }

    pub fn processed(&self) -> i32 {
        self.processed
    }

    pub fn into_summary(self) -> ImportSummary {
        ImportSummary {
            processed_rows: self.processed,
            employees_created: self.employees_created,
            responses_created: self.responses_created,
            errors: self.errors,
        }
    }
}
