//! Field remap: select three of the invoice model's native fields and rename
//! them onto the payable-voucher schema.
//!
//! | Model field                  | Output key            |
//! |------------------------------|-----------------------|
//! | `InvoiceId`                  | `PV Number`           |
//! | `InvoiceDate`                | `Date Prepared`       |
//! | `RemittanceAddressRecipient` | `Supplier or Company` |
//!
//! `Document Type` is a constant and never comes from the model.

use crate::output::{ExtractedData, FieldResult, OutputField};
use crate::pipeline::recognize::{AnalyzeResult, DocumentField};
use tracing::info;

/// Native model field → output key.
pub const FIELD_MAPPING: [(&str, OutputField); 3] = [
    ("InvoiceId", OutputField::PvNumber),
    ("InvoiceDate", OutputField::DatePrepared),
    ("RemittanceAddressRecipient", OutputField::SupplierOrCompany),
];

/// The representation chosen for a recognised field.
///
/// Variants are listed in precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    TypedString(String),
    TypedDate(String),
    RawContent(String),
    Absent,
}

impl FieldValue {
    /// Pick the highest-precedence representation present on `field`.
    pub fn resolve(field: &DocumentField) -> Self {
        if let Some(s) = &field.value_string {
            FieldValue::TypedString(s.clone())
        } else if let Some(d) = &field.value_date {
            FieldValue::TypedDate(d.clone())
        } else if let Some(c) = &field.content {
            FieldValue::RawContent(c.clone())
        } else {
            FieldValue::Absent
        }
    }

    pub fn into_value(self) -> Option<String> {
        match self {
            FieldValue::TypedString(s) | FieldValue::TypedDate(s) | FieldValue::RawContent(s) => {
                Some(s)
            }
            FieldValue::Absent => None,
        }
    }
}

/// Build the four-key output from a recognition result.
///
/// Every key starts at its default; documents are applied in order, so a
/// later document overwrites an earlier one for the same key. Confidence is
/// copied from the source field, `0.0` when the model omitted it.
pub fn remap_invoice(result: &AnalyzeResult) -> ExtractedData {
    let mut data = ExtractedData::default();

    for document in &result.documents {
        let found: Vec<&str> = document.fields.keys().map(String::as_str).collect();
        info!("Fields found by recognition model: {:?}", found);

        for (source, target) in FIELD_MAPPING {
            let Some(field) = document.fields.get(source) else {
                continue;
            };
            let value = FieldValue::resolve(field).into_value();
            let confidence = field.confidence.unwrap_or(0.0);
            info!(
                "Extracted {}: {:?} with confidence {}",
                target.display_name(),
                value,
                confidence
            );
            data.set(target, FieldResult { value, confidence });
        }
    }

    data
}
