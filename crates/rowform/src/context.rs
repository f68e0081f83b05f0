//! Per-batch context variables
//!
//! The context is computed once per processing instance and bound as `$name`
//! arguments in every compiled expression.

use chrono::{DateTime, FixedOffset, Utc};
use rowform_core::{RecordValue, Temporal, TransformationRequest};
use rowform_formula::FormulaValue;
use std::collections::BTreeMap;

/// Variable holding the billing period of billing streams
pub const PERIOD_VARIABLE: &str = "period";

/// Variable holding the pricelist version of pricelist-bearing streams
pub const PRICELIST_VERSION_VARIABLE: &str = "pricelist_version";

/// Identifier given to the synthesized pricelist version
pub const PRICELIST_VERSION_PLACEHOLDER: &str = "PRV-000-000-000-0000";

/// Read-only variables injected into every expression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    variables: BTreeMap<String, RecordValue>,
}

impl Context {
    /// Build the context for `request`, taking "now" from the system clock
    pub fn build(request: &TransformationRequest) -> Self {
        Self::build_at(request, Utc::now().fixed_offset())
    }

    /// Build the context for `request` as of `now`
    ///
    /// In priority order: the batch context when the host supplied one, a
    /// billing period for billing streams, a pricelist version when the stream
    /// carries a pricelist, and otherwise the stream context as is.
    ///
    /// `$period` and `$pricelist_version` are always declared, as null when
    /// not synthesized, so that every formula accepted by validation compiles.
    pub fn build_at(request: &TransformationRequest, now: DateTime<FixedOffset>) -> Self {
        let batch = request.batch.context.as_ref().filter(|c| !c.is_empty());

        let mut variables = if let Some(batch) = batch {
            batch.clone()
        } else if request.stream.is_billing() {
            // No period was supplied: both ends are "now"
            let mut period = BTreeMap::new();
            period.insert("start".to_string(), Temporal::Zoned(now).into());
            period.insert("end".to_string(), Temporal::Zoned(now).into());
            BTreeMap::from([(PERIOD_VARIABLE.to_string(), RecordValue::Map(period))])
        } else if let Some(pricelist) = request.stream.pricelist() {
            let mut version = BTreeMap::new();
            version.insert("id".to_string(), PRICELIST_VERSION_PLACEHOLDER.into());
            version.insert("pricelist".to_string(), pricelist.clone());
            BTreeMap::from([(
                PRICELIST_VERSION_VARIABLE.to_string(),
                RecordValue::Map(version),
            )])
        } else {
            request.stream.context.clone().unwrap_or_default()
        };
        for name in [PERIOD_VARIABLE, PRICELIST_VERSION_VARIABLE] {
            variables.entry(name.to_string()).or_insert(RecordValue::Null);
        }

        let context = Self::from_variables(variables);
        tracing::debug!(
            "Built formula context with variables [{}]",
            context.names().collect::<Vec<_>>().join(", ")
        );
        context
    }

    /// A context holding exactly `variables`, temporals stringified
    pub fn from_variables(variables: BTreeMap<String, RecordValue>) -> Self {
        Self {
            variables: variables
                .into_iter()
                .map(|(name, value)| (name, value.stringify_temporals()))
                .collect(),
        }
    }

    /// Null placeholders for every variable a context can synthesize. Used to
    /// compile formulas when no concrete batch is at hand.
    pub fn placeholders() -> Self {
        Self::from_variables(BTreeMap::from([
            (PERIOD_VARIABLE.to_string(), RecordValue::Null),
            (PRICELIST_VERSION_VARIABLE.to_string(), RecordValue::Null),
        ]))
    }

    pub fn get(&self, name: &str) -> Option<&RecordValue> {
        self.variables.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// The variables as formula arguments
    pub fn arguments(&self) -> Vec<(String, FormulaValue)> {
        self.variables
            .iter()
            .map(|(name, value)| (name.clone(), FormulaValue::from(value.clone())))
            .collect()
    }
}
