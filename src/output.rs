//! Response types returned by the relay.
//!
//! [`ExtractedData`] is deliberately not a `HashMap`: the response schema
//! requires exactly four keys in a fixed order, present even when the
//! recognition model returned nothing for them. Storing one slot per
//! [`OutputField`] makes an absent key unrepresentable.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Value of the constant `Document Type` field.
pub const PAYABLE_VOUCHER: &str = "Payable Voucher";

/// One output field: the extracted value and the model's confidence in it.
///
/// A confidence of exactly `1.0` marks a constant, not a measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldResult {
    pub value: Option<String>,
    pub confidence: f64,
}

impl FieldResult {
    /// `(null, 0.0)`, the placeholder for a field the model did not return.
    pub fn missing() -> Self {
        Self {
            value: None,
            confidence: 0.0,
        }
    }

    /// A synthetic value with full confidence.
    pub fn constant(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            confidence: 1.0,
        }
    }
}

/// The four keys of the output schema, in response order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputField {
    DocumentType,
    PvNumber,
    SupplierOrCompany,
    DatePrepared,
}

impl OutputField {
    pub const ALL: [OutputField; 4] = [
        OutputField::DocumentType,
        OutputField::PvNumber,
        OutputField::SupplierOrCompany,
        OutputField::DatePrepared,
    ];

    /// Key used in the JSON response.
    pub fn display_name(self) -> &'static str {
        match self {
            OutputField::DocumentType => "Document Type",
            OutputField::PvNumber => "PV Number",
            OutputField::SupplierOrCompany => "Supplier or Company",
            OutputField::DatePrepared => "Date Prepared",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Fields extracted from one invoice.
///
/// Always holds exactly the four [`OutputField`] keys. The default value has
/// `Document Type = ("Payable Voucher", 1.0)` and every other key at
/// [`FieldResult::missing`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedData {
    fields: [FieldResult; 4],
}

impl Default for ExtractedData {
    fn default() -> Self {
        Self {
            fields: [
                FieldResult::constant(PAYABLE_VOUCHER),
                FieldResult::missing(),
                FieldResult::missing(),
                FieldResult::missing(),
            ],
        }
    }
}

impl ExtractedData {
    pub fn get(&self, field: OutputField) -> &FieldResult {
        &self.fields[field.slot()]
    }

    /// Overwrite one field. `Document Type` is a constant and is left untouched.
    pub fn set(&mut self, field: OutputField, result: FieldResult) {
        if field == OutputField::DocumentType {
            return;
        }
        self.fields[field.slot()] = result;
    }

    /// `(display name, result)` pairs in response order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldResult)> {
        OutputField::ALL
            .iter()
            .map(move |f| (f.display_name(), self.get(*f)))
    }
}

impl Serialize for ExtractedData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(OutputField::ALL.len()))?;
        for (name, result) in self.iter() {
            map.serialize_entry(name, result)?;
        }
        map.end()
    }
}

/// The response envelope of `POST /api/process-document`.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDocument {
    /// Original upload filename.
    pub filename: String,
    /// Remapped recognition output.
    pub extracted_data: ExtractedData,
    /// Base64 PNG of page 1, or `null` when rendering failed.
    pub thumbnail: Option<String>,
    /// Caller-supplied metadata, echoed unchanged.
    pub metadata: serde_json::Value,
}
