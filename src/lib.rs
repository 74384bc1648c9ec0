mod config;
mod error;
mod fonts;
mod model;
mod normalize;
mod pdf;
mod request;

pub use config::{PageGeometry, ReportConfig, TableColumns};
pub use error::Error;
pub use fonts::{FontBook, FontSpec};
pub use model::{
    AppointmentViewRecord, Evaluation, NOT_AVAILABLE, Orthotic, PDF_CONTENT_TYPE, Prescription,
    ReportDocument, Status,
};
pub use normalize::{
    RawAppointment, RawDataset, RawDocument, RawEvaluation, RawMedication, RawOrthotic, RawPerson,
    RawPrescription, RawStatus, RecordSource,
};
pub use pdf::{
    CancelToken, DrawOp, Fit, Flags, PageCanvas, PageFrame, PageState, Paginator, Phase, Placement,
    ReportLayout, RowLayout, RowPlacement, STRIPE_SHADED, Stripe, TextMetrics, WrappedText,
    compute_row_layout, compute_row_layouts, evaluation_text, layout_report, paginate,
    prescription_text,
};
pub use request::{Granularity, ReportRequest};

/// Row layout constants, exposed for callers that check geometry.
pub mod layout {
    pub use crate::pdf::{
        DETAIL_TOP_PADDING, EVALUATION_GAP, MIN_BASE_HEIGHT, ORTHOTIC_GAP, ORTHOTIC_LINE_HEIGHT,
        PRESCRIPTION_GAP, ROW_BOTTOM_PADDING, SECTION_TITLE_HEIGHT,
    };
}

use std::path::Path;
use std::time::Instant;

/// Fetch the records for `request` from `source` and render them.
///
/// Either the whole document is produced or an error is returned; no partial
/// bytes ever leave this function.
pub fn generate_report(
    request: &ReportRequest,
    source: &dyn RecordSource,
    config: &ReportConfig,
    cancel: Option<&CancelToken>,
) -> Result<ReportDocument, Error> {
    let t0 = Instant::now();

    let records = source.fetch(request)?;
    let t_fetch = t0.elapsed();

    let doc = render_records(&records, request, config, cancel)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: fetch={:.1}ms, render={:.1}ms, total={:.1}ms ({} records, {} pages, output {} bytes)",
        t_fetch.as_secs_f64() * 1000.0,
        (t_total - t_fetch).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        records.len(),
        doc.page_count,
        doc.bytes.len(),
    );

    Ok(doc)
}

/// Validate raw request fields, then generate. Validation errors come back
/// before `source` is touched.
pub fn generate_report_from_params(
    start: Option<&str>,
    end: Option<&str>,
    kind: Option<&str>,
    source: &dyn RecordSource,
    config: &ReportConfig,
    cancel: Option<&CancelToken>,
) -> Result<ReportDocument, Error> {
    let request = ReportRequest::parse(start, end, kind)?;
    generate_report(&request, source, config, cancel)
}

/// Render records that are already filtered and ordered.
pub fn render_records(
    records: &[AppointmentViewRecord],
    request: &ReportRequest,
    config: &ReportConfig,
    cancel: Option<&CancelToken>,
) -> Result<ReportDocument, Error> {
    let (bytes, page_count) = pdf::render(records, request, config, cancel)?;
    Ok(ReportDocument {
        bytes,
        filename: request.filename(),
        content_type: PDF_CONTENT_TYPE,
        page_count,
    })
}

/// Generate a report from a JSON dataset file and write it to `output`.
pub fn generate_report_file(
    dataset: &Path,
    request: &ReportRequest,
    config: &ReportConfig,
    output: &Path,
) -> Result<ReportDocument, Error> {
    let t0 = Instant::now();

    let raw = std::fs::read(dataset)?;
    let data = RawDataset::from_slice(&raw)?;
    let t_parse = t0.elapsed();

    let doc = generate_report(request, &data, config, None)?;
    let t_render = t0.elapsed();

    std::fs::write(output, &doc.bytes)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: parse={:.1}ms, generate={:.1}ms, write={:.1}ms, total={:.1}ms",
        t_parse.as_secs_f64() * 1000.0,
        (t_render - t_parse).as_secs_f64() * 1000.0,
        (t_total - t_render).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
    );

    Ok(doc)
}
