// src/request.rs
//
// Request flow: pending chips → work units → chat form → sheet status.

use log::{debug, error, info, warn};

use crate::cfg::config::FormIdentity;
use crate::client_ops::{FormDriver, SheetsOps};
use crate::error::FormError;
use crate::records::{self, WorkUnit};
use crate::state_writer::StateWriter;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestReport {
    pub success: bool,
    pub error: Option<String>,
    pub units: usize,
    pub submitted: usize,
    pub failed: usize,
    pub rows_updated: usize,
}

impl RequestReport {
    fn failure(error: String) -> Self {
        RequestReport {
            success: false,
            error: Some(error),
            ..Default::default()
        }
    }
}

pub struct RequestService<'a> {
    sheets: &'a dyn SheetsOps,
    form: &'a mut dyn FormDriver,
    identity: FormIdentity,
    spreadsheet_id: String,
    range_name: String,
    max_group_size: usize,
    requested_status: String,
}

impl<'a> RequestService<'a> {
    pub fn new(
        sheets: &'a dyn SheetsOps,
        form: &'a mut dyn FormDriver,
        identity: FormIdentity,
        spreadsheet_id: &str,
        range_name: &str,
        max_group_size: usize,
        requested_status: &str,
    ) -> Self {
        RequestService {
            sheets,
            form,
            identity,
            spreadsheet_id: spreadsheet_id.to_string(),
            range_name: range_name.to_string(),
            max_group_size,
            requested_status: requested_status.to_string(),
        }
    }

    /// Read the sheet and run the request flow over it.
    pub fn run_from_sheet(&mut self) -> RequestReport {
        match self.sheets.read_range(&self.spreadsheet_id, &self.range_name) {
            Ok(rows) => self.run(&rows),
            Err(e) => {
                error!("Failed to read sheet: {}", e);
                RequestReport::failure(format!("sheet read failed: {}", e))
            }
        }
    }

    pub fn run(&mut self, rows: &[Vec<String>]) -> RequestReport {
        let scan = match records::scan(rows) {
            Ok(scan) => scan,
            Err(e) => {
                error!("Cannot classify records: {}", e);
                return RequestReport::failure(e.to_string());
            }
        };
        let units = records::group(&scan.pending, self.max_group_size);
        let mut report = RequestReport {
            success: true,
            units: units.len(),
            ..Default::default()
        };
        if units.is_empty() {
            info!("✅ All records have a status; nothing to request");
            return report;
        }
        let header = &rows[0];

        info!("📝 Submitting {} work unit(s)", units.len());
        if let Err(e) = self.form.navigate(&self.identity.url) {
            error!("Cannot open {}: {}", self.identity.url, e);
            report.success = false;
            report.error = Some(format!("form unavailable: {}", e));
            return report;
        }

        let writer = StateWriter::new(self.sheets, &self.range_name);
        for unit in &units {
            info!("Work unit {}: {}", unit.number, unit.ids.join(", "));
            match self.submit_unit(unit) {
                Ok(()) => {
                    report.submitted += 1;
                    let outcome = writer.write(&self.spreadsheet_id, header, &unit.ids, &self.requested_status);
                    debug!("Work unit {}: {}", unit.number, outcome);
                    report.rows_updated += outcome.count();
                }
                Err(e) => {
                    error!("Work unit {} not submitted: {}", unit.number, e);
                    report.failed += 1;
                }
            }

            if let Err(e) = self.form.reset_session(&self.identity.url) {
                error!("Browser session lost; stopping: {}", e);
                report.success = false;
                report.error = Some(format!("session reset failed: {}", e));
                break;
            }
        }

        if report.failed > 0 {
            warn!("{} of {} work unit(s) failed", report.failed, report.units);
        }
        info!(
            "Requests: {} submitted, {} failed, {} row(s) updated",
            report.submitted, report.failed, report.rows_updated
        );
        report
    }

    fn submit_unit(&mut self, unit: &WorkUnit) -> Result<(), FormError> {
        let form = self.form.prepare_form()?;
        self.form
            .fill_user(&form, &self.identity.user_name, &self.identity.user_email)?;
        self.form.fill_message(&form, unit)?;
        self.form.submit(&form)
    }
}
