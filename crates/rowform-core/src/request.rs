//! The transformation request a processing instance works on

use crate::column::Columns;
use crate::expression::Settings;
use crate::value::RecordValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stream type that receives a synthesized billing period
pub const BILLING_STREAM_TYPE: &str = "billing";

/// Stream context key whose presence marks a pricelist-bearing stream
pub const PRICELIST_CONTEXT_KEY: &str = "pricelist";

/// The configured transformation: settings plus the active column schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub columns: Columns,
}

/// The stream a batch belongs to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Stream classification, e.g. `billing` or `pricing`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub stream_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, RecordValue>>,
}

impl Stream {
    pub fn is_billing(&self) -> bool {
        self.stream_type
            .as_deref()
            .map_or(false, |t| t.eq_ignore_ascii_case(BILLING_STREAM_TYPE))
    }

    /// The pricelist marker carried by the stream context, if any
    pub fn pricelist(&self) -> Option<&RecordValue> {
        self.context
            .as_ref()
            .and_then(|c| c.get(PRICELIST_CONTEXT_KEY))
            .filter(|v| !v.is_null())
    }
}

/// The batch under transformation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Context data already resolved by the host for this batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, RecordValue>>,
}

/// Everything a processing instance needs besides the rows themselves
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformationRequest {
    pub transformation: Transformation,
    #[serde(default)]
    pub stream: Stream,
    #[serde(default)]
    pub batch: Batch,
}

impl TransformationRequest {
    /// Build a request for the given expressions and input schema
    pub fn new(
        expressions: Vec<crate::Expression>,
        input: Vec<crate::Column>,
    ) -> Self {
        Self {
            transformation: Transformation {
                settings: Settings {
                    expressions: Some(expressions),
                },
                columns: Columns {
                    input: Some(input),
                    output: None,
                },
            },
            stream: Stream::default(),
            batch: Batch::default(),
        }
    }

    pub fn with_stream(mut self, stream: Stream) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_batch(mut self, batch: Batch) -> Self {
        self.batch = batch;
        self
    }

    pub fn expressions(&self) -> &[crate::Expression] {
        self.transformation
            .settings
            .expressions
            .as_deref()
            .unwrap_or_default()
    }

    pub fn input_columns(&self) -> &[crate::Column] {
        self.transformation
            .columns
            .input
            .as_deref()
            .unwrap_or_default()
    }
}
