#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use clinic_report_pdf::{AppointmentViewRecord, Granularity, ReportConfig, ReportRequest, Status};

pub fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn day_request(day: u32) -> ReportRequest {
    let d = NaiveDate::from_ymd_opt(2026, 10, day).unwrap();
    ReportRequest::new(d, d, Granularity::Day).unwrap()
}

pub fn week_request() -> ReportRequest {
    ReportRequest::new(
        NaiveDate::from_ymd_opt(2026, 10, 12).unwrap(),
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        Granularity::Week,
    )
    .unwrap()
}

/// Default layout with a fixed timestamp, so output is reproducible.
pub fn fixed_config() -> ReportConfig {
    ReportConfig {
        generated_at: Some(at(12, 8, 0)),
        ..ReportConfig::default()
    }
}

pub fn plain(id: i64) -> AppointmentViewRecord {
    let minute = (id % 4) as u32 * 15;
    AppointmentViewRecord::new(
        id,
        at(12, 8 + (id as u32 / 4) % 10, minute),
        format!("Paciente {id}"),
        "Dra. Elena Ruiz",
        Status::Reserved,
    )
}

/// Prescriptions in both columns, evaluation and orthotic: the tallest
/// ordinary row.
pub fn detailed(id: i64) -> AppointmentViewRecord {
    plain(id)
        .with_prescription(
            "Fascitis plantar bilateral crónica",
            &["Ibuprofeno 400mg", "Paracetamol 1g", "Diclofenaco gel"],
        )
        .with_prescription("Onicomicosis", &["Terbinafina"])
        .with_evaluation("Plano", "Cavo")
        .with_orthotic("Plantilla a medida")
        .with_documents(true)
}

/// So many prescriptions that the row cannot fit on an empty page.
pub fn oversized(id: i64) -> AppointmentViewRecord {
    (0..90).fold(plain(id), |r, i| {
        r.with_prescription(&format!("Diagnóstico número {i}"), &["Medicamento A", "Medicamento B"])
    })
}

pub fn mixed(count: i64) -> Vec<AppointmentViewRecord> {
    (0..count)
        .map(|id| if id % 3 == 0 { detailed(id) } else { plain(id) })
        .collect()
}

/// Every stream body in the file, inflated when it was Flate-compressed.
pub fn stream_bodies(pdf: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(start) = find(pdf, b"stream\n", pos) {
        let body_start = start + b"stream\n".len();
        let Some(end) = find(pdf, b"\nendstream", body_start) else {
            break;
        };
        let body = &pdf[body_start..end];
        out.push(
            miniz_oxide::inflate::decompress_to_vec_zlib(body).unwrap_or_else(|_| body.to_vec()),
        );
        pos = end + b"\nendstream".len();
    }
    out
}

pub fn pdf_contains_text(pdf: &[u8], needle: &str) -> bool {
    stream_bodies(pdf)
        .iter()
        .any(|body| find(body, needle.as_bytes(), 0).is_some())
}

pub fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

pub fn png_logo(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([40, 90, 160, 200]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}
