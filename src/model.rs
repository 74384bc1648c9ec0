use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Reserved,
    Completed,
    Cancelled,
}

impl Status {
    /// Parse a status name as stored by the scheduling tables. Accepts the
    /// English variant names and the Spanish labels, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "reserved" | "reservada" | "reservado" => Some(Status::Reserved),
            "completed" | "completada" | "completado" => Some(Status::Completed),
            "cancelled" | "canceled" | "cancelada" | "cancelado" => Some(Status::Cancelled),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Reserved => "Reservada",
            Status::Completed => "Completada",
            Status::Cancelled => "Cancelada",
        }
    }

    pub(crate) fn color(self) -> [u8; 3] {
        match self {
            Status::Reserved => [0x1F, 0x5F, 0xA8],
            Status::Completed => [0x2E, 0x7D, 0x32],
            Status::Cancelled => [0xC6, 0x28, 0x28],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub medications: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(default)]
    pub left_foot_type: String,
    #[serde(default)]
    pub right_foot_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Orthotic {
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl Orthotic {
    /// The label shown in the detail block, if the orthotic has a type at all.
    pub fn label(&self) -> Option<&str> {
        let kind = self.kind.trim();
        (!kind.is_empty()).then_some(kind)
    }
}

/// One fully joined appointment, in the shape the layout engine consumes.
/// Records are never mutated once handed to layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppointmentViewRecord {
    pub id: i64,
    pub start_time: NaiveDateTime,
    pub patient_name: String,
    pub clinician_name: String,
    pub status: Status,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
    #[serde(default)]
    pub evaluation: Option<Evaluation>,
    #[serde(default)]
    pub orthotic: Option<Orthotic>,
    #[serde(default)]
    pub has_documents: bool,
}

impl AppointmentViewRecord {
    pub fn new(
        id: i64,
        start_time: NaiveDateTime,
        patient_name: impl Into<String>,
        clinician_name: impl Into<String>,
        status: Status,
    ) -> Self {
        Self {
            id,
            start_time,
            patient_name: patient_name.into(),
            clinician_name: clinician_name.into(),
            status,
            prescriptions: Vec::new(),
            evaluation: None,
            orthotic: None,
            has_documents: false,
        }
    }

    pub fn with_prescription(mut self, diagnosis: &str, medications: &[&str]) -> Self {
        self.prescriptions.push(Prescription {
            diagnosis: diagnosis.to_string(),
            medications: medications.iter().map(|m| m.to_string()).collect(),
        });
        self
    }

    pub fn with_evaluation(mut self, left_foot_type: &str, right_foot_type: &str) -> Self {
        self.evaluation = Some(Evaluation {
            left_foot_type: left_foot_type.to_string(),
            right_foot_type: right_foot_type.to_string(),
        });
        self
    }

    pub fn with_orthotic(mut self, kind: &str) -> Self {
        self.orthotic = Some(Orthotic {
            kind: kind.to_string(),
        });
        self
    }

    pub fn with_documents(mut self, has_documents: bool) -> Self {
        self.has_documents = has_documents;
        self
    }
}

/// The finished report, ready to hand to whatever transport delivers it.
#[derive(Clone, Debug)]
pub struct ReportDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: &'static str,
    pub page_count: usize,
}

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
