use crate::config::ReportConfig;
use crate::model::{AppointmentViewRecord, Evaluation, Prescription};

use super::metrics::{TextMetrics, WrappedText};

pub const MIN_BASE_HEIGHT: f32 = 20.0;
pub const SECTION_TITLE_HEIGHT: f32 = 10.0;
pub const PRESCRIPTION_GAP: f32 = 2.0;
pub const EVALUATION_GAP: f32 = 5.0;
pub const ORTHOTIC_LINE_HEIGHT: f32 = 12.0;
pub const ORTHOTIC_GAP: f32 = 12.0;
pub const DETAIL_TOP_PADDING: f32 = 10.0;
pub const ROW_BOTTOM_PADDING: f32 = 15.0;

const EVALUATION_FALLBACK: &str = "Registrada";

/// Geometry of one table row, independent of where it lands on a page.
///
/// Besides the heights, the layout keeps the wrapped text it measured, so the
/// painter draws exactly what was measured instead of wrapping again.
#[derive(Clone, Debug, PartialEq)]
pub struct RowLayout {
    pub base_height: f32,
    /// Prescriptions.
    pub column1_height: f32,
    /// Evaluation and orthotic.
    pub column2_height: f32,
    pub extra_height: f32,
    pub total_height: f32,
    pub patient: WrappedText,
    pub clinician: WrappedText,
    pub prescriptions: Vec<WrappedText>,
    pub evaluation: Option<WrappedText>,
    /// Single line, cut with `…` to the detail column width.
    pub orthotic: Option<String>,
}

impl RowLayout {
    pub fn has_detail(&self) -> bool {
        self.extra_height > 0.0
    }
}

/// `"• Dx: … | Meds: …"`, leaving out whichever half is empty.
pub fn prescription_text(prescription: &Prescription) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(2);
    let diagnosis = prescription.diagnosis.trim();
    if !diagnosis.is_empty() {
        parts.push(format!("Dx: {diagnosis}"));
    }
    let meds: Vec<&str> = prescription
        .medications
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .collect();
    if !meds.is_empty() {
        parts.push(format!("Meds: {}", meds.join(", ")));
    }
    format!("• {}", parts.join(" | "))
}

/// `"Izq: X | Der: Y"` with the missing side left out, or "Registrada" when
/// neither foot has a type.
pub fn evaluation_text(evaluation: &Evaluation) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(2);
    let left = evaluation.left_foot_type.trim();
    if !left.is_empty() {
        parts.push(format!("Izq: {left}"));
    }
    let right = evaluation.right_foot_type.trim();
    if !right.is_empty() {
        parts.push(format!("Der: {right}"));
    }
    if parts.is_empty() {
        EVALUATION_FALLBACK.to_string()
    } else {
        parts.join(" | ")
    }
}

pub fn compute_row_layout(
    record: &AppointmentViewRecord,
    metrics: &impl TextMetrics,
    config: &ReportConfig,
) -> RowLayout {
    let cols = &config.columns;
    let body = &config.body_font;
    let detail = &config.detail_font;
    let detail_w = cols.detail_column_width();

    let patient = metrics.wrap(&record.patient_name, cols.patient_text_width(), body);
    let clinician = metrics.wrap(&record.clinician_name, cols.clinician_text_width(), body);
    let base_height = MIN_BASE_HEIGHT.max(patient.height).max(clinician.height);

    let prescriptions: Vec<WrappedText> = record
        .prescriptions
        .iter()
        .map(|p| metrics.wrap(&prescription_text(p), detail_w, detail))
        .collect();
    let column1_height = if prescriptions.is_empty() {
        0.0
    } else {
        SECTION_TITLE_HEIGHT
            + prescriptions
                .iter()
                .map(|w| w.height + PRESCRIPTION_GAP)
                .sum::<f32>()
    };

    let mut column2_height = 0.0;
    let evaluation = record.evaluation.as_ref().map(|e| {
        let wrapped = metrics.wrap(&evaluation_text(e), detail_w, detail);
        column2_height += SECTION_TITLE_HEIGHT + wrapped.height + EVALUATION_GAP;
        wrapped
    });
    let orthotic = record
        .orthotic
        .as_ref()
        .and_then(|o| o.label())
        .map(|label| {
            column2_height += SECTION_TITLE_HEIGHT + ORTHOTIC_LINE_HEIGHT + ORTHOTIC_GAP;
            metrics.truncate(label, detail_w, detail)
        });

    let extra_height = if column1_height > 0.0 || column2_height > 0.0 {
        DETAIL_TOP_PADDING + column1_height.max(column2_height)
    } else {
        0.0
    };

    RowLayout {
        base_height,
        column1_height,
        column2_height,
        extra_height,
        total_height: base_height + extra_height + ROW_BOTTOM_PADDING,
        patient,
        clinician,
        prescriptions,
        evaluation,
        orthotic,
    }
}

/// One layout per record, in input order.
pub fn compute_row_layouts(
    records: &[AppointmentViewRecord],
    metrics: &impl TextMetrics,
    config: &ReportConfig,
) -> Vec<RowLayout> {
    records
        .iter()
        .map(|r| compute_row_layout(r, metrics, config))
        .collect()
}
