use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::error::Error;
use crate::model::{
    AppointmentViewRecord, Evaluation, NOT_AVAILABLE, Orthotic, Prescription, Status,
};
use crate::request::ReportRequest;

/// Anything that can hand the layout engine its records. Implementations
/// return only appointments inside the request range, ordered by start time
/// ascending, ties broken by id.
pub trait RecordSource {
    fn fetch(&self, request: &ReportRequest) -> Result<Vec<AppointmentViewRecord>, Error>;
}

/// Records that were already joined elsewhere. Only filtered and ordered.
impl RecordSource for Vec<AppointmentViewRecord> {
    fn fetch(&self, request: &ReportRequest) -> Result<Vec<AppointmentViewRecord>, Error> {
        let mut records: Vec<AppointmentViewRecord> = self
            .iter()
            .filter(|r| request.contains(&r.start_time))
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.start_time, r.id));
        Ok(records)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawAppointment {
    pub id: i64,
    pub start_time: NaiveDateTime,
    #[serde(default)]
    pub patient_id: Option<i64>,
    #[serde(default)]
    pub clinician_id: Option<i64>,
    pub status_id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawPerson {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl RawPerson {
    fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            name.to_string()
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawStatus {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawPrescription {
    pub id: i64,
    pub appointment_id: i64,
    #[serde(default)]
    pub diagnosis: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawMedication {
    pub prescription_id: i64,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawDocument {
    pub id: i64,
    pub appointment_id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawEvaluation {
    pub appointment_id: i64,
    #[serde(default)]
    pub left_foot_type: Option<String>,
    #[serde(default)]
    pub right_foot_type: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawOrthotic {
    pub appointment_id: i64,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// The scheduling tables as exported, one JSON array per table. Missing
/// tables deserialize as empty.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawDataset {
    pub appointments: Vec<RawAppointment>,
    pub patients: Vec<RawPerson>,
    pub clinicians: Vec<RawPerson>,
    pub statuses: Vec<RawStatus>,
    pub prescriptions: Vec<RawPrescription>,
    pub medications: Vec<RawMedication>,
    pub documents: Vec<RawDocument>,
    pub evaluations: Vec<RawEvaluation>,
    pub orthotics: Vec<RawOrthotic>,
}

impl RawDataset {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Build every id lookup. The independent tables are indexed in parallel
    /// and all of them must finish before any appointment is resolved.
    fn lookups(&self) -> Lookups<'_> {
        let mut lookups = Lookups::default();
        let Lookups {
            patients,
            clinicians,
            statuses,
            prescriptions,
            documents,
            evaluations,
            orthotics,
        } = &mut lookups;

        rayon::scope(move |s| {
            s.spawn(move |_| *patients = index_people(&self.patients));
            s.spawn(move |_| *clinicians = index_people(&self.clinicians));
            s.spawn(move |_| *statuses = self.statuses.iter().map(|st| (st.id, st.name.as_str())).collect());
            s.spawn(move |_| *prescriptions = group_prescriptions(&self.prescriptions, &self.medications));
            s.spawn(move |_| *documents = self.documents.iter().map(|d| d.appointment_id).collect());
            s.spawn(move |_| *evaluations = first_by_appointment(&self.evaluations, |e| e.appointment_id));
            s.spawn(move |_| *orthotics = first_by_appointment(&self.orthotics, |o| o.appointment_id));
        });

        lookups
    }
}

impl RecordSource for RawDataset {
    fn fetch(&self, request: &ReportRequest) -> Result<Vec<AppointmentViewRecord>, Error> {
        let t0 = std::time::Instant::now();
        let lookups = self.lookups();
        let t_index = t0.elapsed();

        let mut selected: Vec<&RawAppointment> = self
            .appointments
            .iter()
            .filter(|a| request.contains(&a.start_time))
            .collect();
        selected.sort_by_key(|a| (a.start_time, a.id));

        let records = selected
            .into_iter()
            .map(|a| lookups.resolve(a))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "Normalized {} of {} appointments (index={:.1}ms, total={:.1}ms)",
            records.len(),
            self.appointments.len(),
            t_index.as_secs_f64() * 1000.0,
            t0.elapsed().as_secs_f64() * 1000.0,
        );
        Ok(records)
    }
}

#[derive(Default)]
struct Lookups<'a> {
    patients: HashMap<i64, &'a RawPerson>,
    clinicians: HashMap<i64, &'a RawPerson>,
    statuses: HashMap<i64, &'a str>,
    prescriptions: HashMap<i64, Vec<Prescription>>,
    documents: HashSet<i64>,
    evaluations: HashMap<i64, &'a RawEvaluation>,
    orthotics: HashMap<i64, &'a RawOrthotic>,
}

impl Lookups<'_> {
    fn resolve(&self, a: &RawAppointment) -> Result<AppointmentViewRecord, Error> {
        let status_name = self.statuses.get(&a.status_id).ok_or_else(|| {
            Error::DataUnavailable(format!(
                "appointment {} references unknown status id {}",
                a.id, a.status_id
            ))
        })?;
        let status = Status::from_name(status_name).ok_or_else(|| {
            Error::DataUnavailable(format!(
                "appointment {} has unrecognised status {status_name:?}",
                a.id
            ))
        })?;

        let name_of = |table: &HashMap<i64, &RawPerson>, id: Option<i64>| {
            id.and_then(|id| table.get(&id))
                .map_or_else(|| NOT_AVAILABLE.to_string(), |p| p.full_name())
        };

        Ok(AppointmentViewRecord {
            id: a.id,
            start_time: a.start_time,
            patient_name: name_of(&self.patients, a.patient_id),
            clinician_name: name_of(&self.clinicians, a.clinician_id),
            status,
            prescriptions: self.prescriptions.get(&a.id).cloned().unwrap_or_default(),
            evaluation: self.evaluations.get(&a.id).map(|e| Evaluation {
                left_foot_type: e.left_foot_type.clone().unwrap_or_default(),
                right_foot_type: e.right_foot_type.clone().unwrap_or_default(),
            }),
            orthotic: self.orthotics.get(&a.id).map(|o| Orthotic {
                kind: o.kind.clone().unwrap_or_default(),
            }),
            has_documents: self.documents.contains(&a.id),
        })
    }
}

fn index_people(people: &[RawPerson]) -> HashMap<i64, &RawPerson> {
    people.iter().map(|p| (p.id, p)).collect()
}

/// The first row for each appointment wins.
fn first_by_appointment<T>(rows: &[T], key: impl Fn(&T) -> i64) -> HashMap<i64, &T> {
    let mut out = HashMap::with_capacity(rows.len());
    for row in rows {
        out.entry(key(row)).or_insert(row);
    }
    out
}

/// Prescriptions per appointment in prescription id order, each with its
/// medications in table order.
fn group_prescriptions(
    prescriptions: &[RawPrescription],
    medications: &[RawMedication],
) -> HashMap<i64, Vec<Prescription>> {
    let mut meds: HashMap<i64, Vec<String>> = HashMap::new();
    for m in medications {
        meds.entry(m.prescription_id).or_default().push(m.name.clone());
    }

    let mut ordered: Vec<&RawPrescription> = prescriptions.iter().collect();
    ordered.sort_by_key(|p| p.id);

    let mut out: HashMap<i64, Vec<Prescription>> = HashMap::new();
    for p in ordered {
        out.entry(p.appointment_id).or_default().push(Prescription {
            diagnosis: p.diagnosis.clone().unwrap_or_default(),
            medications: meds.get(&p.id).cloned().unwrap_or_default(),
        });
    }
    out
}
