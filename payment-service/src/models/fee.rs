//! Student fee payments linked to payment transactions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeePaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl FeePaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Refunded => "REFUNDED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            "REFUNDED" => Some(Self::Refunded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeePayment {
    pub id: Uuid,
    pub student_id: String,
    pub amount: Decimal,
    pub status: FeePaymentStatus,
    pub transaction_id: Option<String>,
    pub semester: i32,
    pub year: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFeePayment {
    pub student_id: String,
    pub amount: Decimal,
    pub semester: i32,
    pub year: i32,
}

/// Listing filter; every field set narrows the result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeePaymentFilter {
    pub student_id: Option<String>,
    pub status: Option<FeePaymentStatus>,
    pub semester: Option<i32>,
    pub year: Option<i32>,
}

impl FeePaymentFilter {
    pub fn matches(&self, fee: &FeePayment) -> bool {
        self.student_id.as_ref().map_or(true, |s| &fee.student_id == s)
            && self.status.map_or(true, |s| fee.status == s)
            && self.semester.map_or(true, |s| fee.semester == s)
            && self.year.map_or(true, |y| fee.year == y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fee(student: &str, status: FeePaymentStatus, semester: i32) -> FeePayment {
        FeePayment {
            id: Uuid::new_v4(),
            student_id: student.to_string(),
            amount: Decimal::new(2500000, 2),
            status,
            transaction_id: None,
            semester,
            year: 2024,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = FeePaymentFilter::default();
        assert!(filter.matches(&fee("S1", FeePaymentStatus::Pending, 3)));
    }

    #[test]
    fn test_filter_fields_combine() {
        let filter = FeePaymentFilter {
            student_id: Some("S1".to_string()),
            status: Some(FeePaymentStatus::Completed),
            ..Default::default()
        };
        assert!(filter.matches(&fee("S1", FeePaymentStatus::Completed, 3)));
        assert!(!filter.matches(&fee("S1", FeePaymentStatus::Pending, 3)));
        assert!(!filter.matches(&fee("S2", FeePaymentStatus::Completed, 3)));
    }
}
