use serde::Serialize;

use crate::api::AttendanceRecord;

use super::engagement::EngagementBand;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceCard {
    pub name: String,
    pub date: String,
    pub status: String,
    pub engagement: f64,
    pub band: EngagementBand,
    pub card_class: &'static str,
    pub needs_attention: bool,
    pub remarks: String,
    pub posture: String,
}

impl AttendanceCard {
    /// `threshold` is the configured engagement alert threshold.
    pub fn from_record(record: &AttendanceRecord, threshold: f64) -> Self {
        let band = EngagementBand::for_score(record.engagement);
        let posture = if record.posture.trim().is_empty() {
            "Not recorded".to_string()
        } else {
            record.posture.clone()
        };

        Self {
            name: record.name.clone(),
            date: record.date.clone(),
            status: record.status.clone(),
            engagement: record.engagement,
            band,
            card_class: band.card_class(),
            needs_attention: record.engagement < threshold,
            remarks: record.remarks.clone(),
            posture,
        }
    }
}
