mod canvas;
mod metrics;
mod paginate;
mod paint;
mod row;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Datelike, NaiveDateTime, Timelike};
use pdf_writer::{Date, Filter, Name, Pdf, Rect, Ref, TextStr};

use crate::config::{PageGeometry, ReportConfig};
use crate::error::Error;
use crate::fonts::FontBook;
use crate::model::AppointmentViewRecord;
use crate::request::ReportRequest;

pub use canvas::{DrawOp, PageCanvas};
pub use metrics::{TextMetrics, WrappedText};
pub use paginate::{Fit, PageFrame, PageState, Paginator, Phase, Placement, paginate};
pub use paint::{Flags, STRIPE_SHADED, Stripe};
pub use row::{
    DETAIL_TOP_PADDING, EVALUATION_GAP, MIN_BASE_HEIGHT, ORTHOTIC_GAP, ORTHOTIC_LINE_HEIGHT,
    PRESCRIPTION_GAP, ROW_BOTTOM_PADDING, RowLayout, SECTION_TITLE_HEIGHT, compute_row_layout,
    compute_row_layouts, evaluation_text, prescription_text,
};

use paint::{EMPTY_NOTICE_HEIGHT, HeaderText, LogoPlacement, Painter};

const LOGO_NAME: &str = "Im1";
const LOGO_MAX_WIDTH: f32 = 150.0;

/// Shared flag a caller can set to abandon a render in progress. Checked
/// between rows; a cancelled render returns no bytes.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug)]
pub struct RowPlacement {
    /// Position in the whole report, not on the page.
    pub index: usize,
    pub record_id: i64,
    pub layout: RowLayout,
    pub placement: Placement,
}

/// Result of the layout pass: one canvas per page and where each row went.
#[derive(Clone, Debug)]
pub struct ReportLayout {
    pub pages: Vec<PageCanvas>,
    pub rows: Vec<RowPlacement>,
    pub legend: Placement,
}

impl ReportLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

struct Logo {
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
    width: u32,
    height: u32,
}

impl Logo {
    fn decode(bytes: &[u8]) -> Option<Self> {
        let decoded = match image::load_from_memory(bytes) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("Logo could not be decoded ({e}), using the clinic name instead");
                return None;
            }
        };
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            log::warn!("Logo has no pixels, using the clinic name instead");
            return None;
        }
        let has_alpha = rgba.pixels().any(|p| p.0[3] < 255);
        let rgb = rgba.pixels().flat_map(|p| [p.0[0], p.0[1], p.0[2]]).collect();
        let alpha = has_alpha.then(|| rgba.pixels().map(|p| p.0[3]).collect());
        Some(Self {
            rgb,
            alpha,
            width,
            height,
        })
    }

    /// Scaled to fit the header band, aspect ratio kept.
    fn placement(&self, geometry: &PageGeometry) -> LogoPlacement {
        let max_h = (geometry.header_band_height - 8.0).max(1.0);
        let (w, h) = (self.width as f32, self.height as f32);
        let scale = (LOGO_MAX_WIDTH / w).min(max_h / h);
        LogoPlacement {
            name: LOGO_NAME.to_string(),
            width: w * scale,
            height: h * scale,
        }
    }
}

fn generated_at(config: &ReportConfig) -> NaiveDateTime {
    config
        .generated_at
        .unwrap_or_else(|| chrono::Local::now().naive_local())
}

/// Lay out `records` (already filtered and ordered) into page canvases.
///
/// Each row is measured once; that layout drives both the page-break
/// decision and the painting. The legend goes through the same engine after
/// the last row. A row taller than an empty page is an `Error::Render`; no
/// partial report is produced.
pub fn layout_report(
    records: &[AppointmentViewRecord],
    request: &ReportRequest,
    config: &ReportConfig,
    fonts: &FontBook,
    cancel: Option<&CancelToken>,
) -> Result<ReportLayout, Error> {
    let logo = config.logo.as_deref().and_then(Logo::decode);
    let placement = logo.as_ref().map(|l| l.placement(&config.geometry));
    lay_out(records, request, config, fonts, generated_at(config), placement, cancel)
}

fn lay_out(
    records: &[AppointmentViewRecord],
    request: &ReportRequest,
    config: &ReportConfig,
    fonts: &FontBook,
    generated_at: NaiveDateTime,
    logo: Option<LogoPlacement>,
    cancel: Option<&CancelToken>,
) -> Result<ReportLayout, Error> {
    let mut painter = Painter::new(config, fonts, HeaderText::new(request, generated_at), logo);
    let frame = config.geometry.frame();
    let mut paginator = Paginator::new(frame);
    let mut rows = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            log::info!("Render cancelled after {index} of {} rows", records.len());
            return Err(Error::Cancelled { rows_done: index });
        }
        let layout = compute_row_layout(record, fonts, config);
        if layout.total_height > frame.capacity() {
            log::warn!(
                "Row {index} (id {}) needs {:.1} of {:.1} available; aborting",
                record.id,
                layout.total_height,
                frame.capacity()
            );
            return Err(Error::Render(format!(
                "appointment {} needs {:.1}pt but a page holds {:.1}pt of rows",
                record.id,
                layout.total_height,
                frame.capacity()
            )));
        }
        let placement = place_block(&mut paginator, &mut painter, layout.total_height)?;
        log::debug!(
            "Row {index} (id {}): base={:.1} extra={:.1} total={:.1} -> page {} y={:.1}",
            record.id,
            layout.base_height,
            layout.extra_height,
            layout.total_height,
            placement.page_number,
            placement.y
        );
        painter.draw_row(index, record, &layout, &placement);
        rows.push(RowPlacement {
            index,
            record_id: record.id,
            layout,
            placement,
        });
    }

    if records.is_empty() {
        let notice = place_block(&mut paginator, &mut painter, EMPTY_NOTICE_HEIGHT)?;
        painter.draw_empty_notice(&notice);
    }

    let legend = place_block(&mut paginator, &mut painter, config.geometry.legend_height)?;
    painter.draw_legend(&legend, records.len());

    let page_count = paginator.finish()?;
    let pages = painter.finish();
    if pages.len() != page_count {
        return Err(Error::Render(format!(
            "painted {} pages but paginated {page_count}",
            pages.len()
        )));
    }

    Ok(ReportLayout { pages, rows, legend })
}

/// Commit one block, breaking the page first when it does not fit.
fn place_block(
    paginator: &mut Paginator,
    painter: &mut Painter<'_>,
    height: f32,
) -> Result<Placement, Error> {
    loop {
        match paginator.place(height)? {
            Fit::Place(placement, _) => return Ok(placement),
            Fit::BreakRequired => {
                painter.end_page();
                paginator.break_page()?;
                painter.begin_page();
            }
        }
    }
}

/// Every character the report can draw: fixed labels, digits and the text
/// of each record. Subsetting keeps exactly these glyphs.
fn collect_used_chars(records: &[AppointmentViewRecord], config: &ReportConfig) -> HashSet<char> {
    let mut chars: HashSet<char> = (' '..='~').collect();
    chars.extend('\u{A0}'..='\u{FF}');
    chars.insert('•');
    chars.insert('…');
    chars.extend(config.clinic_name.chars());
    for r in records {
        chars.extend(r.patient_name.chars());
        chars.extend(r.clinician_name.chars());
        for p in &r.prescriptions {
            chars.extend(p.diagnosis.chars());
            chars.extend(p.medications.iter().flat_map(|m| m.chars()));
        }
        if let Some(e) = &r.evaluation {
            chars.extend(e.left_foot_type.chars());
            chars.extend(e.right_foot_type.chars());
        }
        if let Some(o) = &r.orthotic {
            chars.extend(o.kind.chars());
        }
    }
    chars
}

/// Lay out and serialize a whole report. Returns the PDF bytes and page count.
pub(crate) fn render(
    records: &[AppointmentViewRecord],
    request: &ReportRequest,
    config: &ReportConfig,
    cancel: Option<&CancelToken>,
) -> Result<(Vec<u8>, usize), Error> {
    let t0 = std::time::Instant::now();
    let generated_at = generated_at(config);

    let used_chars = collect_used_chars(records, config);
    let mut fonts = FontBook::load(&config.font_specs(), &config.font_files, &used_chars);
    let t_fonts = t0.elapsed();

    let logo = config.logo.as_deref().and_then(Logo::decode);
    let logo_placement = logo.as_ref().map(|l| l.placement(&config.geometry));
    let t_images = t0.elapsed();

    let layout = lay_out(records, request, config, &fonts, generated_at, logo_placement, cancel)?;
    let t_layout = t0.elapsed();

    let bytes = assemble(&layout, request, config, generated_at, &mut fonts, logo.as_ref(), &used_chars)?;
    let t_assembly = t0.elapsed();

    log::info!(
        "Render phases: fonts={:.1}ms, images={:.1}ms, layout={:.1}ms, assembly={:.1}ms ({} rows, {} pages, {} bytes)",
        t_fonts.as_secs_f64() * 1000.0,
        (t_images - t_fonts).as_secs_f64() * 1000.0,
        (t_layout - t_images).as_secs_f64() * 1000.0,
        (t_assembly - t_layout).as_secs_f64() * 1000.0,
        records.len(),
        layout.page_count(),
        bytes.len(),
    );

    Ok((bytes, layout.page_count()))
}

fn assemble(
    layout: &ReportLayout,
    request: &ReportRequest,
    config: &ReportConfig,
    generated_at: NaiveDateTime,
    fonts: &mut FontBook,
    logo: Option<&Logo>,
    used_chars: &HashSet<char>,
) -> Result<Vec<u8>, Error> {
    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();
    let info_id = alloc();

    fonts.embed(&mut pdf, &mut alloc, used_chars);
    let font_pairs = fonts.resources();

    let image_xobjects: Vec<(String, Ref)> = logo
        .map(|l| vec![(LOGO_NAME.to_string(), embed_logo(&mut pdf, &mut alloc, l))])
        .unwrap_or_default();

    let n = layout.page_count();
    let count = i32::try_from(n).map_err(|e| Error::render("page count", e))?;
    let page_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
    let content_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();

    let g = &config.geometry;
    for (canvas, &content_id) in layout.pages.iter().zip(&content_ids) {
        let raw = canvas.to_content(g.page_height, fonts).finish();
        if config.compress {
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
            pdf.stream(content_id, &compressed).filter(Filter::FlateDecode);
        } else {
            pdf.stream(content_id, raw.as_slice());
        }
    }

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(count);

    let title = format!("{} {}", request.granularity.title(), request.range_label());
    pdf.document_info(info_id)
        .title(TextStr(&title))
        .author(TextStr(&config.clinic_name))
        .creator(TextStr(env!("CARGO_PKG_NAME")))
        .creation_date(pdf_date(generated_at));

    for (&page_id, &content_id) in page_ids.iter().zip(&content_ids) {
        let mut page = pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, g.page_width, g.page_height))
            .parent(pages_id)
            .contents(content_id);
        let mut resources = page.resources();
        {
            let mut fonts = resources.fonts();
            for (name, font_ref) in &font_pairs {
                fonts.pair(Name(name.as_bytes()), *font_ref);
            }
        }
        if !image_xobjects.is_empty() {
            let mut xobjects = resources.x_objects();
            for (name, xobj_ref) in &image_xobjects {
                xobjects.pair(Name(name.as_bytes()), *xobj_ref);
            }
        }
    }

    Ok(pdf.finish())
}

fn embed_logo(pdf: &mut Pdf, alloc: &mut impl FnMut() -> Ref, logo: &Logo) -> Ref {
    let smask_ref = logo.alpha.as_ref().map(|alpha| {
        let compressed_alpha = miniz_oxide::deflate::compress_to_vec_zlib(alpha, 6);
        let mask_ref = alloc();
        let mut mask = pdf.image_xobject(mask_ref, &compressed_alpha);
        mask.filter(Filter::FlateDecode);
        mask.width(logo.width as i32);
        mask.height(logo.height as i32);
        mask.color_space().device_gray();
        mask.bits_per_component(8);
        mask_ref
    });

    let compressed_rgb = miniz_oxide::deflate::compress_to_vec_zlib(&logo.rgb, 6);
    let xobj_ref = alloc();
    let mut xobj = pdf.image_xobject(xobj_ref, &compressed_rgb);
    xobj.filter(Filter::FlateDecode);
    xobj.width(logo.width as i32);
    xobj.height(logo.height as i32);
    xobj.color_space().device_rgb();
    xobj.bits_per_component(8);
    if let Some(mask_ref) = smask_ref {
        xobj.s_mask(mask_ref);
    }
    xobj_ref
}

fn pdf_date(at: NaiveDateTime) -> Date {
    Date::new(at.year().clamp(0, 9999) as u16)
        .month(at.month() as u8)
        .day(at.day() as u8)
        .hour(at.hour() as u8)
        .minute(at.minute() as u8)
        .second(at.second() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;
    use crate::request::Granularity;
    use chrono::NaiveDate;

    fn request() -> ReportRequest {
        let d = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        ReportRequest::new(d, d, Granularity::Day).unwrap()
    }

    fn record(id: i64) -> AppointmentViewRecord {
        let at = NaiveDate::from_ymd_opt(2026, 10, 12)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        AppointmentViewRecord::new(id, at, "Ana Gómez", "Dr. Ruiz", Status::Completed)
    }

    #[test]
    fn used_chars_cover_record_text() {
        let r = record(1).with_prescription("Ñoño", &["Ácido"]).with_orthotic("Plantilla");
        let chars = collect_used_chars(&[r], &ReportConfig::default());
        for ch in "ÑñÁóí•".chars() {
            assert!(chars.contains(&ch), "missing {ch:?}");
        }
    }

    #[test]
    fn cancelled_before_first_row() {
        let token = CancelToken::new();
        token.cancel();
        let fonts = FontBook::standard();
        let err = layout_report(
            &[record(1), record(2)],
            &request(),
            &ReportConfig::default(),
            &fonts,
            Some(&token),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled { rows_done: 0 }));
    }

    #[test]
    fn logo_scaled_inside_band() {
        let logo = Logo {
            rgb: vec![0; 400 * 100 * 3],
            alpha: None,
            width: 400,
            height: 100,
        };
        let p = logo.placement(&PageGeometry::default());
        assert!(p.width <= LOGO_MAX_WIDTH + 1e-3);
        assert!(p.height <= PageGeometry::default().header_band_height);
        assert!((p.width / p.height - 4.0).abs() < 1e-3);
    }
}
