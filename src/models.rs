//! Domain models and wire types
//!
//! Everything that crosses a boundary lives here: the ingress payment
//! payload, the payload forwarded to upstream processors, health snapshots
//! and the summary response shapes.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of an upstream payment processor.
///
/// The primary charges the lower per-transaction fee and is preferred
/// whenever it is believed healthy; the fallback is the higher-fee escape
/// hatch. On the summary wire the primary is exposed as `default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Processor {
    Primary,
    Fallback,
}

impl Processor {
    /// Stable name used in coordination-store keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Processor::Primary => "primary",
            Processor::Fallback => "fallback",
        }
    }

    /// The other processor, for cross-processor fallback.
    pub fn other(&self) -> Processor {
        match self {
            Processor::Primary => Processor::Fallback,
            Processor::Fallback => Processor::Primary,
        }
    }
}

impl fmt::Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment request as received from the ingress.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    #[serde(rename = "correlationId")]
    pub correlation_id: Uuid,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

impl PaymentRequest {
    /// Ingress validation: positive amount with at most two fractional digits.
    pub fn is_valid(&self) -> bool {
        self.amount > Decimal::ZERO && self.amount.scale() <= 2
    }
}

/// Payment as forwarded to an upstream processor.
///
/// `requested_at` is fixed when the dispatch starts and reused verbatim for
/// every retry, so upstream sees one stable creation time per payment.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessorPayment {
    #[serde(rename = "correlationId")]
    pub correlation_id: Uuid,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "requestedAt", serialize_with = "rfc3339_millis")]
    pub requested_at: DateTime<Utc>,
}

impl ProcessorPayment {
    pub fn new(request: PaymentRequest, requested_at: DateTime<Utc>) -> Self {
        Self {
            correlation_id: request.correlation_id,
            amount: request.amount,
            requested_at,
        }
    }
}

/// Upstream expects millisecond precision, not chrono's default nanoseconds.
fn rfc3339_millis<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Health report returned by `GET /payments/service-health`.
///
/// Both fields are required; a body missing either is unusable and the
/// decode error surfaces to the caller as an absent snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub failing: bool,
    #[serde(rename = "minResponseTime")]
    pub min_response_time: i64,
}

/// Aggregate counters for one processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProcessorStats {
    #[serde(rename = "totalRequests")]
    pub total_requests: i64,
    #[serde(rename = "totalAmount")]
    pub total_amount: f64,
}

/// Response body of the summary endpoint.
#[derive(Debug, Serialize)]
pub struct PaymentSummary {
    pub default: ProcessorStats,
    pub fallback: ProcessorStats,
}
