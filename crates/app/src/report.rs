//! Policy report rendering.
//!
//! Rendering sits behind [`ReportRenderer`] so a PDF backend can be plugged in
//! without touching the handlers; the bundled renderer emits plain text.

use std::fmt::Write as _;

use thiserror::Error;

use policy_desk_core::template::{report_fields, report_file_stem};
use policy_desk_core::PolicyRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub content_type: &'static str,
    pub file_name: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
#[error("failed to render report: {0}")]
pub struct ReportError(pub String);

pub trait ReportRenderer: Send + Sync {
    fn render(&self, policy: &PolicyRecord) -> Result<RenderedReport, ReportError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TextReportRenderer;

impl ReportRenderer for TextReportRenderer {
    fn render(&self, policy: &PolicyRecord) -> Result<RenderedReport, ReportError> {
        let mut body = String::from("Insurance Policy Report\n\n");
        for (label, value) in report_fields(policy) {
            writeln!(body, "{label}: {value}").map_err(|err| ReportError(err.to_string()))?;
        }

        Ok(RenderedReport {
            content_type: "text/plain; charset=utf-8",
            file_name: format!("{}.txt", header_safe(&report_file_stem(policy))),
            body: body.into_bytes(),
        })
    }
}

/// Keeps file names usable inside a `Content-Disposition` header.
fn header_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
