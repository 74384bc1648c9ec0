mod common;

use std::cell::Cell;

use clinic_report_pdf::{
    AppointmentViewRecord, DrawOp, Error, FontBook, PDF_CONTENT_TYPE, RawDataset, RecordSource,
    ReportConfig, ReportRequest, generate_report, generate_report_file,
    generate_report_from_params, layout_report, render_records,
};

/// Counts fetches so tests can prove validation happens first.
struct CountingSource {
    records: Vec<AppointmentViewRecord>,
    calls: Cell<usize>,
}

impl CountingSource {
    fn new(records: Vec<AppointmentViewRecord>) -> Self {
        Self {
            records,
            calls: Cell::new(0),
        }
    }
}

impl RecordSource for CountingSource {
    fn fetch(&self, request: &ReportRequest) -> Result<Vec<AppointmentViewRecord>, Error> {
        self.calls.set(self.calls.get() + 1);
        self.records.fetch(request)
    }
}

struct FailingSource;

impl RecordSource for FailingSource {
    fn fetch(&self, _request: &ReportRequest) -> Result<Vec<AppointmentViewRecord>, Error> {
        Err(Error::DataUnavailable("scheduling database offline".into()))
    }
}

#[test]
fn produces_a_pdf_document() {
    let _ = env_logger::try_init();
    let source = common::mixed(40);
    let doc = generate_report(&common::day_request(12), &source, &common::fixed_config(), None).unwrap();

    assert!(doc.bytes.starts_with(b"%PDF"));
    assert_eq!(doc.content_type, PDF_CONTENT_TYPE);
    assert_eq!(doc.filename, "reporte-citas-day-2026-10-12.pdf");
    assert!(doc.page_count >= 2);
    assert!(common::pdf_contains_text(&doc.bytes, "Total de citas: 40"));
}

#[test]
fn output_is_byte_identical_across_runs() {
    let source = common::mixed(50);
    let config = common::fixed_config();
    let request = common::week_request();
    let a = generate_report(&request, &source, &config, None).unwrap();
    let b = generate_report(&request, &source, &config, None).unwrap();
    assert_eq!(a.page_count, b.page_count);
    assert!(a.bytes == b.bytes, "two runs with a fixed timestamp differ");
}

#[test]
fn concurrent_reports_do_not_interfere() {
    let records = common::mixed(60);
    let config = common::fixed_config();
    let request = common::day_request(12);
    let expected = render_records(&records, &request, &config, None).unwrap();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| render_records(&records, &request, &config, None).unwrap()))
            .collect();
        for h in handles {
            assert!(h.join().unwrap().bytes == expected.bytes);
        }
    });
}

#[test]
fn invalid_requests_are_rejected_before_fetching() {
    let source = CountingSource::new(common::mixed(3));
    let config = common::fixed_config();
    let cases: [(Option<&str>, Option<&str>, Option<&str>); 6] = [
        (None, Some("2026-10-12"), Some("day")),
        (Some("2026-10-12"), None, Some("day")),
        (Some("2026-10-12"), Some("2026-10-12"), None),
        (Some("2026-10-12"), Some("2026-10-12"), Some("month")),
        (Some("2026-10-12"), Some("2026-10-12"), Some("Day")),
        (Some("12/10/2026"), Some("2026-10-12"), Some("day")),
    ];
    for (start, end, kind) in cases {
        let err = generate_report_from_params(start, end, kind, &source, &config, None).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)), "{start:?} {end:?} {kind:?}: {err}");
        assert!(err.is_client_error());
    }
    let reversed =
        generate_report_from_params(Some("2026-10-18"), Some("2026-10-12"), Some("week"), &source, &config, None);
    assert!(matches!(reversed, Err(Error::InvalidRequest(_))));
    assert_eq!(source.calls.get(), 0);

    let ok = generate_report_from_params(Some("2026-10-12"), Some("2026-10-18"), Some("week"), &source, &config, None)
        .unwrap();
    assert_eq!(ok.filename, "reporte-citas-week-2026-10-12.pdf");
    assert_eq!(source.calls.get(), 1);
}

#[test]
fn data_failures_return_no_document() {
    let err = generate_report(&common::day_request(12), &FailingSource, &common::fixed_config(), None).unwrap_err();
    assert!(matches!(err, Error::DataUnavailable(_)));
    assert!(!err.is_client_error());
}

#[test]
fn only_records_in_range_are_rendered() {
    let mut source = common::mixed(5);
    source.push(AppointmentViewRecord::new(
        100,
        common::at(20, 9, 0),
        "Fuera De Rango",
        "Dr. Nadie",
        clinic_report_pdf::Status::Completed,
    ));
    let config = ReportConfig {
        compress: false,
        ..common::fixed_config()
    };
    let doc = generate_report(&common::day_request(12), &source, &config, None).unwrap();
    assert!(common::pdf_contains_text(&doc.bytes, "Total de citas: 5"));
    assert!(!common::pdf_contains_text(&doc.bytes, "Fuera De Rango"));
}

#[test]
fn empty_range_renders_notice() {
    let source: Vec<AppointmentViewRecord> = Vec::new();
    let config = ReportConfig {
        compress: false,
        ..common::fixed_config()
    };
    let doc = generate_report(&common::day_request(12), &source, &config, None).unwrap();
    assert_eq!(doc.page_count, 1);
    assert!(doc.bytes.starts_with(b"%PDF"));
    assert!(common::pdf_contains_text(&doc.bytes, "Sin citas en el rango seleccionado"));
}

#[test]
fn logo_is_drawn_on_every_page() {
    let config = ReportConfig {
        logo: Some(common::png_logo(40, 20)),
        ..common::fixed_config()
    };
    let fonts = FontBook::standard();
    let layout = layout_report(&common::mixed(60), &common::day_request(12), &config, &fonts, None).unwrap();
    for page in &layout.pages {
        let logo = page.ops.iter().find_map(|op| match op {
            DrawOp::Image { name, width, height, .. } => Some((name.clone(), *width, *height)),
            _ => None,
        });
        let (name, width, height) = logo.expect("logo missing from page");
        assert_eq!(name, "Im1");
        assert!((width / height - 2.0).abs() < 1e-3);
        assert!(!page.contains_text("Clínica"));
    }

    let doc = render_records(&common::mixed(3), &common::day_request(12), &config, None).unwrap();
    assert!(common::find(&doc.bytes, b"/XObject", 0).is_some());
    assert!(common::find(&doc.bytes, b"/SMask", 0).is_some());
}

#[test]
fn undecodable_logo_falls_back_to_clinic_name() {
    let _ = env_logger::try_init();
    let config = ReportConfig {
        logo: Some(b"not an image at all".to_vec()),
        clinic_name: "Podología Central".into(),
        ..common::fixed_config()
    };
    let fonts = FontBook::standard();
    let layout = layout_report(&common::mixed(4), &common::day_request(12), &config, &fonts, None).unwrap();
    let page = &layout.pages[0];
    assert!(!page.ops.iter().any(|op| matches!(op, DrawOp::Image { .. })));
    assert!(page.contains_text("Podología Central"));

    let doc = render_records(&common::mixed(4), &common::day_request(12), &config, None).unwrap();
    assert!(doc.bytes.starts_with(b"%PDF"));
    assert!(common::find(&doc.bytes, b"/XObject", 0).is_none());
}

#[test]
fn missing_font_family_still_renders() {
    let _ = env_logger::try_init();
    let config = common::fixed_config().with_font_family("Definitely Not A Font");
    let doc = render_records(&common::mixed(10), &common::day_request(12), &config, None).unwrap();
    assert!(doc.bytes.starts_with(b"%PDF"));
    assert!(common::find(&doc.bytes, b"/Helvetica", 0).is_some());
}

#[test]
fn compressed_and_plain_streams_carry_the_same_text() {
    let records = common::mixed(12);
    let request = common::day_request(12);
    let compressed = render_records(&records, &request, &common::fixed_config(), None).unwrap();
    let plain = render_records(
        &records,
        &request,
        &ReportConfig {
            compress: false,
            ..common::fixed_config()
        },
        None,
    )
    .unwrap();

    assert!(compressed.bytes.len() < plain.bytes.len());
    assert_eq!(compressed.page_count, plain.page_count);
    for needle in ["Paciente 7", "Dra. Elena Ruiz", "[ R | D | E | O ]", "[ - | - | - | - ]"] {
        assert!(common::pdf_contains_text(&compressed.bytes, needle), "{needle}");
        assert!(common::pdf_contains_text(&plain.bytes, needle), "{needle}");
    }
}

#[test]
fn dataset_file_to_pdf_file() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("citas.json");
    let output = dir.path().join("reporte.pdf");
    std::fs::write(
        &dataset,
        r#"{
            "appointments": [
                {"id": 1, "start_time": "2026-10-12T09:30:00", "patient_id": 1, "clinician_id": 1, "status_id": 1},
                {"id": 2, "start_time": "2026-10-12T10:00:00", "patient_id": 5, "clinician_id": 1, "status_id": 2}
            ],
            "patients": [{"id": 1, "first_name": "Ana", "last_name": "Gómez"}],
            "clinicians": [{"id": 1, "first_name": "Elena", "last_name": "Ruiz"}],
            "statuses": [{"id": 1, "name": "Reserved"}, {"id": 2, "name": "Completed"}],
            "orthotics": [{"appointment_id": 2, "type": "Plantilla"}]
        }"#,
    )
    .unwrap();

    let config = ReportConfig {
        compress: false,
        ..common::fixed_config()
    };
    let doc = generate_report_file(&dataset, &common::day_request(12), &config, &output).unwrap();
    let written = std::fs::read(&output).unwrap();
    assert_eq!(written, doc.bytes);
    assert!(common::pdf_contains_text(&written, "Total de citas: 2"));
    assert!(common::pdf_contains_text(&written, "N/A"));
    assert!(common::pdf_contains_text(&written, "[ - | - | - | O ]"));

    let data = RawDataset::from_slice(&std::fs::read(&dataset).unwrap()).unwrap();
    assert_eq!(data.fetch(&common::day_request(13)).unwrap().len(), 0);
}

#[test]
fn malformed_dataset_file_is_a_json_error() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("roto.json");
    std::fs::write(&dataset, "{ not json").unwrap();
    let err = generate_report_file(
        &dataset,
        &common::day_request(12),
        &common::fixed_config(),
        &dir.path().join("out.pdf"),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Json(_)));
    assert!(!dir.path().join("out.pdf").exists());
}
