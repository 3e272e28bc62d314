use serde::Serialize;

/// Default score below which engagement counts as low.
pub const LOW_ENGAGEMENT_THRESHOLD: f64 = 70.0;

const HIGH_FROM: f64 = 80.0;
const MEDIUM_FROM: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EngagementBand {
    High,
    Medium,
    Low,
}

impl EngagementBand {
    pub fn for_score(score: f64) -> Self {
        if score >= HIGH_FROM {
            EngagementBand::High
        } else if score >= MEDIUM_FROM {
            EngagementBand::Medium
        } else {
            EngagementBand::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EngagementBand::High => "Highly engaged",
            EngagementBand::Medium => "Moderately engaged",
            EngagementBand::Low => "Low engagement",
        }
    }

    pub fn card_class(self) -> &'static str {
        match self {
            EngagementBand::High => "bg-green-100 border-green-500 text-green-700",
            EngagementBand::Medium => "bg-yellow-100 border-yellow-500 text-yellow-700",
            EngagementBand::Low => "bg-red-100 border-red-500 text-red-700",
        }
    }

    pub fn bar_class(self) -> &'static str {
        match self {
            EngagementBand::High => "bg-green-500",
            EngagementBand::Medium => "bg-yellow-500",
            EngagementBand::Low => "bg-red-500",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementIndicator {
    pub score: f64,
    pub score_percent: f64,
    pub band: EngagementBand,
    pub label: &'static str,
    pub bar_class: &'static str,
    pub remarks: String,
    pub is_low: bool,
}

impl EngagementIndicator {
    pub fn new(score: f64, remarks: &str, threshold: f64) -> Self {
        let band = EngagementBand::for_score(score);
        Self {
            score,
            score_percent: score.clamp(0.0, 100.0),
            band,
            label: band.label(),
            bar_class: band.bar_class(),
            remarks: remarks.to_string(),
            is_low: score < threshold,
        }
    }
}
