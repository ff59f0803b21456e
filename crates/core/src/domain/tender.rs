use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::analysis::{
    BidAnalysis, BidResponse, PricingStrategy, SalesSummary, TechnicalAnalysis,
};
use crate::errors::DomainError;
use crate::extraction::ExtractionReport;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenderId(pub String);

impl TenderId {
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        Self(format!("TND-{}", &raw[..12]))
    }
}

impl std::fmt::Display for TenderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenderStatus {
    New,
    InProgress,
    Completed,
}

impl TenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "new" => Some(Self::New),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderSpecification {
    pub voltage: Option<String>,
    pub size: Option<String>,
    pub conductor: Option<String>,
    pub insulation: Option<String>,
    pub armoring: Option<String>,
    pub quantity: Option<u32>,
    #[serde(default)]
    pub standards: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderRecord {
    pub id: TenderId,
    pub title: String,
    pub issued_by: String,
    /// Raw tender text the pipeline analyses.
    pub summary: String,
    pub deadline: NaiveDate,
    pub status: TenderStatus,
    pub specifications: TenderSpecification,
    pub certifications: Vec<String>,
    pub testing_requirements: Vec<String>,
    pub delivery_timeline: Option<String>,
    pub estimated_value: Option<Decimal>,
    pub sales_summary: Option<SalesSummary>,
    pub technical_analysis: Option<TechnicalAnalysis>,
    pub pricing_strategy: Option<PricingStrategy>,
    pub bid_response: Option<BidResponse>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderPatch {
    pub title: Option<String>,
    pub issued_by: Option<String>,
    pub summary: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub status: Option<TenderStatus>,
    pub specifications: Option<TenderSpecification>,
    pub certifications: Option<Vec<String>>,
    pub testing_requirements: Option<Vec<String>>,
    pub delivery_timeline: Option<String>,
    pub estimated_value: Option<Decimal>,
}

impl TenderRecord {
    pub fn new(
        id: TenderId,
        title: impl Into<String>,
        issued_by: impl Into<String>,
        summary: impl Into<String>,
        deadline: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            issued_by: issued_by.into(),
            summary: summary.into(),
            deadline,
            status: TenderStatus::New,
            specifications: TenderSpecification::default(),
            certifications: Vec::new(),
            testing_requirements: Vec::new(),
            delivery_timeline: None,
            estimated_value: None,
            sales_summary: None,
            technical_analysis: None,
            pricing_strategy: None,
            bid_response: None,
            deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fills the specification columns from a regex-tier pass over the summary.
    pub fn with_extracted_terms(mut self, report: ExtractionReport) -> Self {
        let specs = report.specs;
        self.specifications = TenderSpecification {
            voltage: specs.voltage,
            size: specs.size,
            conductor: specs.conductor,
            insulation: specs.insulation,
            armoring: specs.armoring,
            quantity: specs.quantity,
            standards: specs.standard.into_iter().collect(),
        };
        self.certifications = report.certifications;
        self.testing_requirements = report.testing_requirements;
        self.delivery_timeline = report.delivery_timeline;
        self
    }

    pub fn can_transition_to(&self, next: TenderStatus) -> bool {
        self.status == next
            || matches!(
                (self.status, next),
                (TenderStatus::New, TenderStatus::InProgress)
                    | (TenderStatus::New, TenderStatus::Completed)
                    | (TenderStatus::InProgress, TenderStatus::Completed)
                    | (TenderStatus::InProgress, TenderStatus::New)
                    | (TenderStatus::Completed, TenderStatus::InProgress)
            )
    }

    pub fn transition_to(&mut self, next: TenderStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidTenderTransition { from: self.status, to: next })
    }

    pub fn apply_patch(&mut self, patch: TenderPatch, now: DateTime<Utc>) -> Result<(), DomainError> {
        if let Some(status) = patch.status {
            self.transition_to(status)?;
        }
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(issued_by) = patch.issued_by {
            self.issued_by = issued_by;
        }
        if let Some(summary) = patch.summary {
            self.summary = summary;
        }
        if let Some(deadline) = patch.deadline {
            self.deadline = deadline;
        }
        if let Some(specifications) = patch.specifications {
            self.specifications = specifications;
        }
        if let Some(certifications) = patch.certifications {
            self.certifications = certifications;
        }
        if let Some(testing_requirements) = patch.testing_requirements {
            self.testing_requirements = testing_requirements;
        }
        if let Some(delivery_timeline) = patch.delivery_timeline {
            self.delivery_timeline = Some(delivery_timeline);
        }
        if let Some(estimated_value) = patch.estimated_value {
            self.estimated_value = Some(estimated_value);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Stores the outputs of a completed pipeline run and marks the tender completed.
    pub fn record_analysis(
        &mut self,
        analysis: BidAnalysis,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.transition_to(TenderStatus::Completed)?;

        let specs = &analysis.sales.extracted_specs;
        self.specifications = TenderSpecification {
            voltage: specs.voltage.clone(),
            size: specs.size.clone(),
            conductor: specs.conductor.clone(),
            insulation: specs.insulation.clone(),
            armoring: specs.armoring.clone(),
            quantity: specs.quantity,
            standards: analysis.technical.standards.clone(),
        };
        self.certifications = analysis.sales.certifications.clone();
        self.testing_requirements = analysis.sales.testing_required.clone();
        self.delivery_timeline = Some(analysis.sales.delivery_timeline.clone());
        // The tender's own estimate wins over the heuristic one.
        if self.estimated_value.is_none() {
            self.estimated_value = analysis.sales.estimated_value;
        }
        self.sales_summary = Some(analysis.sales);
        self.technical_analysis = Some(analysis.technical);
        self.pricing_strategy = Some(analysis.pricing);
        self.bid_response = Some(analysis.bid);
        self.updated_at = now;
        Ok(())
    }

    pub fn soft_delete(&mut self, now: DateTime<Utc>) {
        self.deleted = true;
        self.deleted_at = Some(now);
        self.updated_at = now;
    }

    pub fn restore(&mut self, now: DateTime<Utc>) {
        self.deleted = false;
        self.deleted_at = None;
        self.updated_at = now;
    }

    pub fn days_until_deadline(&self, today: NaiveDate) -> i64 {
        (self.deadline - today).num_days()
    }

    pub fn priority(&self, today: NaiveDate) -> TenderPriority {
        TenderPriority::from_days_remaining(self.days_until_deadline(today))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenderPriority {
    High,
    Medium,
    Low,
}

impl TenderPriority {
    /// Tenders closing within three days are too late to pursue and rank low.
    pub fn from_days_remaining(days: i64) -> Self {
        if days > 3 && days < 30 {
            Self::High
        } else if (30..90).contains(&days) {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrioritizedTender {
    pub tender: TenderRecord,
    pub priority: TenderPriority,
    pub days_until_deadline: i64,
}

/// Orders tenders high → low priority; ties keep their input order.
pub fn prioritize(tenders: Vec<TenderRecord>, today: NaiveDate) -> Vec<PrioritizedTender> {
    let mut ranked: Vec<PrioritizedTender> = tenders
        .into_iter()
        .map(|tender| {
            let days_until_deadline = tender.days_until_deadline(today);
            PrioritizedTender {
                priority: TenderPriority::from_days_remaining(days_until_deadline),
                days_until_deadline,
                tender,
            }
        })
        .collect();
    ranked.sort_by_key(|entry| entry.priority);
    ranked
}
