// src/labeler.rs
//
// Discovers today's response mails and files them under per-month labels.

use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashSet};

use crate::cfg::label::MailLabel;
use crate::client_ops::{Clock, MailOps, MailQuery, MessageFormat};
use crate::error::{ApiError, ApiResult};
use crate::utils::{label_search_token, quote_search_term, search_date};

/// Outcome of one [`MailLabeler::label_batch`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub labeled: usize,
    /// Already carried every target label.
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketStats {
    pub total: usize,
    pub newly_labeled: usize,
    pub failed: usize,
}

/// Messages grouped by the (year, month) of their Date header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthBuckets {
    pub by_month: BTreeMap<(i32, u32), Vec<String>>,
    pub undated: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelReport {
    pub success: bool,
    pub error: Option<String>,
    pub total_found: usize,
    pub labeled: usize,
    pub failed: usize,
    /// Keyed by bucket name (`"Febrero 2025"`, `"Sin fecha"`).
    pub buckets: BTreeMap<String, BucketStats>,
}

impl LabelReport {
    fn failure(error: String) -> Self {
        LabelReport {
            success: false,
            error: Some(error),
            ..Default::default()
        }
    }

    fn record(&mut self, bucket: String, stats: BucketStats) {
        self.labeled += stats.newly_labeled;
        self.failed += stats.failed;
        self.buckets.insert(bucket, stats);
    }
}

pub struct MailLabeler<'a> {
    mail: &'a dyn MailOps,
    clock: &'a dyn Clock,
    max_results: usize,
}

impl<'a> MailLabeler<'a> {
    pub fn new(mail: &'a dyn MailOps, clock: &'a dyn Clock, max_results: usize) -> Self {
        MailLabeler {
            mail,
            clock,
            max_results,
        }
    }

    /// Id of the label named exactly `name`, if it exists.
    pub fn find_label(&self, name: &str) -> ApiResult<Option<String>> {
        Ok(self
            .mail
            .list_labels()?
            .into_iter()
            .find(|l| l.name == name)
            .map(|l| l.id))
    }

    /// Look the label up, creating it when absent. A create that races with
    /// another creator falls back to one more lookup.
    pub fn get_or_create_label(&self, name: &str) -> ApiResult<String> {
        if let Some(id) = self.find_label(name)? {
            debug!("Label '{}' exists ({})", name, id);
            return Ok(id);
        }

        match self.mail.create_label(name) {
            Ok(id) => {
                info!("🏷️ Created label '{}'", name);
                Ok(id)
            }
            Err(e) if e.is_already_exists() => {
                warn!("Label '{}' was created concurrently; looking it up again", name);
                self.find_label(name)?.ok_or_else(|| {
                    ApiError::AlreadyExists(format!("label '{}' exists but is not listed", name))
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Ids of today's mails matching any subject filter, first-seen order.
    pub fn search_today(&self, subject_filters: &[String], exclude_label: Option<&str>) -> ApiResult<Vec<String>> {
        let today = search_date(self.clock.today());
        let mut seen = HashSet::new();
        let mut ids = Vec::new();

        for filter in subject_filters {
            let mut q = format!("subject:{} after:{}", quote_search_term(filter), today);
            if let Some(label) = exclude_label {
                q.push_str(&format!(" -label:{}", label_search_token(label)));
            }
            let query = MailQuery {
                q,
                label_ids: Vec::new(),
                max_results: self.max_results,
            };
            let found = self.mail.search(&query)?;
            debug!("Filter '{}' matched {} message(s)", filter, found.len());
            ids.extend(found.into_iter().filter(|id| seen.insert(id.clone())));
        }

        info!("📬 {} unique message(s) received on {}", ids.len(), today);
        Ok(ids)
    }

    /// Bucket messages by the month of their Date header.
    pub fn classify_by_month(&self, ids: &[String]) -> MonthBuckets {
        let mut buckets = MonthBuckets::default();
        for id in ids {
            let year_month = match self.mail.get_message(id, MessageFormat::DateHeader) {
                Ok(msg) => msg.year_month(),
                Err(e) => {
                    error!("Failed to read Date of message {}: {}", id, e);
                    None
                }
            };
            match year_month {
                Some(key) => buckets.by_month.entry(key).or_default().push(id.clone()),
                None => buckets.undated.push(id.clone()),
            }
        }
        info!("Grouped into {} month(s)", buckets.by_month.len());
        if !buckets.undated.is_empty() {
            warn!("{} message(s) have no usable date", buckets.undated.len());
        }
        buckets
    }

    /// Apply `label_ids` to `ids` in one batch call. With `verify_first`,
    /// messages that already carry every label are skipped. A failed batch
    /// counts every attempted id as failed.
    pub fn label_batch(&self, ids: &[String], label_ids: &[String], verify_first: bool) -> BatchResult {
        let mut result = BatchResult::default();
        if ids.is_empty() {
            return result;
        }

        let mut to_label = Vec::new();
        if verify_first {
            for id in ids {
                match self.mail.get_message(id, MessageFormat::Minimal) {
                    Ok(msg) if msg.has_all_labels(label_ids) => result.skipped += 1,
                    Ok(_) => to_label.push(id.clone()),
                    Err(e) => {
                        error!("Failed to read labels of message {}: {}", id, e);
                        result.failed += 1;
                    }
                }
            }
        } else {
            to_label.extend(ids.iter().cloned());
        }

        if to_label.is_empty() {
            info!("Nothing left to label after verification");
            return result;
        }

        info!("Labeling {} message(s)", to_label.len());
        match self.mail.batch_modify(&to_label, label_ids, &[]) {
            Ok(()) => result.labeled += to_label.len(),
            Err(e) => {
                error!("Batch label of {} message(s) failed: {}", to_label.len(), e);
                result.failed += to_label.len();
            }
        }
        result
    }

    /// Label today's mails as `parent` plus `parent/MonthName Year`;
    /// undated mails get `parent` only.
    pub fn label_all_by_month(&self, parent: &str, subject_filters: &[String]) -> LabelReport {
        info!("🏷️ Labeling today's mails under '{}'", parent);

        let parent_id = match self.get_or_create_label(parent) {
            Ok(id) => id,
            Err(e) => {
                error!("Cannot resolve label '{}': {}", parent, e);
                return LabelReport::failure(format!("label '{}' unavailable: {}", parent, e));
            }
        };

        let ids = match self.search_today(subject_filters, None) {
            Ok(ids) => ids,
            Err(e) => {
                error!("Mail search failed: {}", e);
                return LabelReport::failure(format!("mail search failed: {}", e));
            }
        };
        let mut report = LabelReport {
            success: true,
            total_found: ids.len(),
            ..Default::default()
        };
        if ids.is_empty() {
            warn!("No mails found for today");
            return report;
        }

        let buckets = self.classify_by_month(&ids);
        for ((year, month), message_ids) in &buckets.by_month {
            let label = MailLabel::month(parent, *year, *month);
            let bucket = label.bucket().unwrap_or_default();
            info!("Processing {} ({} message(s))", bucket, message_ids.len());

            let stats = match self.get_or_create_label(&label.name()) {
                Ok(month_id) => {
                    let r = self.label_batch(message_ids, &[parent_id.clone(), month_id], true);
                    BucketStats {
                        total: message_ids.len(),
                        newly_labeled: r.labeled,
                        failed: r.failed,
                    }
                }
                Err(e) => {
                    error!("Cannot resolve label '{}': {}", label, e);
                    BucketStats {
                        total: message_ids.len(),
                        newly_labeled: 0,
                        failed: message_ids.len(),
                    }
                }
            };
            report.record(bucket, stats);
        }

        if !buckets.undated.is_empty() {
            let label = MailLabel::Undated {
                parent: parent.to_string(),
            };
            let r = self.label_batch(&buckets.undated, &[parent_id.clone()], true);
            report.record(
                label.bucket().unwrap_or_default(),
                BucketStats {
                    total: buckets.undated.len(),
                    newly_labeled: r.labeled,
                    failed: r.failed,
                },
            );
        }

        info!("Summary: {} found, {} newly labeled", report.total_found, report.labeled);
        for (bucket, stats) in &report.buckets {
            info!("  {}: {}/{} new", bucket, stats.newly_labeled, stats.total);
        }
        report
    }
}
