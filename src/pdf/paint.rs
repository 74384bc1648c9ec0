use chrono::NaiveDateTime;

use crate::config::ReportConfig;
use crate::fonts::{FontBook, FontSpec};
use crate::model::AppointmentViewRecord;
use crate::request::ReportRequest;

use super::canvas::PageCanvas;
use super::metrics::{TextMetrics, WrappedText};
use super::paginate::Placement;
use super::row::{
    DETAIL_TOP_PADDING, EVALUATION_GAP, ORTHOTIC_GAP, ORTHOTIC_LINE_HEIGHT, PRESCRIPTION_GAP,
    RowLayout, SECTION_TITLE_HEIGHT,
};

pub const STRIPE_SHADED: [u8; 3] = [0xF1, 0xF4, 0xF8];
const TEXT_DARK: [u8; 3] = [0x21, 0x2B, 0x36];
const TEXT_MUTED: [u8; 3] = [0x5F, 0x6B, 0x78];
const TEXT_ON_BAND: [u8; 3] = [0xFF, 0xFF, 0xFF];
const HEADER_BAND: [u8; 3] = [0x2F, 0x4A, 0x66];
const RULE: [u8; 3] = [0xD0, 0xD6, 0xDD];
const DIVIDER: [u8; 3] = [0xB0, 0xB9, 0xC3];

const CELL_TOP_PADDING: f32 = 5.0;
pub(crate) const EMPTY_NOTICE_HEIGHT: f32 = 30.0;

const COLUMN_LABELS: [&str; 5] = ["Fecha / Hora", "Paciente", "Profesional", "Estado", "Indicadores"];
const LEGEND: &str = "Indicadores: R = Receta · D = Documentos · E = Evaluación · O = Ortesis";

/// Background class of a row. Keyed by the row's index in the whole report,
/// so page breaks never shift the pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stripe {
    Shaded,
    Plain,
}

impl Stripe {
    pub fn for_row(index: usize) -> Self {
        if index % 2 == 0 {
            Stripe::Shaded
        } else {
            Stripe::Plain
        }
    }
}

/// Which optional items an appointment has. Read straight off the record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Flags {
    pub prescriptions: bool,
    pub documents: bool,
    pub evaluation: bool,
    pub orthotic: bool,
}

impl Flags {
    pub fn of(record: &AppointmentViewRecord) -> Self {
        Self {
            prescriptions: !record.prescriptions.is_empty(),
            documents: record.has_documents,
            evaluation: record.evaluation.is_some(),
            orthotic: record.orthotic.is_some(),
        }
    }

    /// `[ R | D | E | O ]`, with `-` in place of each absent item.
    pub fn token(&self) -> String {
        let mark = |present: bool, c: char| if present { c } else { '-' };
        format!(
            "[ {} | {} | {} | {} ]",
            mark(self.prescriptions, 'R'),
            mark(self.documents, 'D'),
            mark(self.evaluation, 'E'),
            mark(self.orthotic, 'O'),
        )
    }
}

pub(crate) struct LogoPlacement {
    pub(crate) name: String,
    pub(crate) width: f32,
    pub(crate) height: f32,
}

pub(crate) struct HeaderText {
    title: String,
    range: String,
    generated: String,
}

impl HeaderText {
    pub(crate) fn new(request: &ReportRequest, generated_at: NaiveDateTime) -> Self {
        Self {
            title: request.granularity.title().to_string(),
            range: format!("Período: {}", request.range_label()),
            generated: format!("Generado: {}", generated_at.format("%d/%m/%Y %H:%M")),
        }
    }
}

/// Turns placement decisions into page canvases. Holds no layout state of its
/// own: every position comes from a `Placement` or a `RowLayout`.
pub(crate) struct Painter<'a> {
    config: &'a ReportConfig,
    fonts: &'a FontBook,
    header: HeaderText,
    logo: Option<LogoPlacement>,
    pages: Vec<PageCanvas>,
    current: PageCanvas,
}

impl<'a> Painter<'a> {
    pub(crate) fn new(
        config: &'a ReportConfig,
        fonts: &'a FontBook,
        header: HeaderText,
        logo: Option<LogoPlacement>,
    ) -> Self {
        let mut painter = Self {
            config,
            fonts,
            header,
            logo,
            pages: Vec::new(),
            current: PageCanvas::default(),
        };
        painter.begin_page();
        painter
    }

    /// Header band and table header for the page now being drawn.
    pub(crate) fn begin_page(&mut self) {
        self.current = PageCanvas::default();
        self.draw_header_band();
        self.draw_table_header();
    }

    pub(crate) fn end_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
    }

    /// Closes the last page and stamps "Página N de M" on every page.
    pub(crate) fn finish(mut self) -> Vec<PageCanvas> {
        self.end_page();
        let g = &self.config.geometry;
        let font = self.config.body_font.sized(8.0);
        let total = self.pages.len();
        let top = g.page_height - g.margin_bottom - g.footer_height + 6.0;
        let right = g.page_width - g.margin_right;
        let pdf_name = self.fonts.resolve(&font).pdf_name.clone();
        let ascent = self.fonts.ascent(&font);
        for (i, page) in self.pages.iter_mut().enumerate() {
            let label = format!("Página {} de {}", i + 1, total);
            let w = self.fonts.text_width(&label, &font);
            page.text(right - w, top + ascent, &pdf_name, font.size, TEXT_MUTED, &label);
        }
        self.pages
    }

    fn text(&mut self, x: f32, line_top: f32, font: &FontSpec, color: [u8; 3], text: &str) {
        let entry = self.fonts.resolve(font);
        let baseline = line_top + entry.ascent(font.size);
        let pdf_name = entry.pdf_name.clone();
        self.current.text(x, baseline, &pdf_name, font.size, color, text);
    }

    fn text_right(&mut self, right: f32, line_top: f32, font: &FontSpec, color: [u8; 3], text: &str) {
        let w = self.fonts.text_width(text, font);
        self.text(right - w, line_top, font, color, text);
    }

    fn lines(&mut self, x: f32, top: f32, font: &FontSpec, color: [u8; 3], wrapped: &WrappedText) {
        for (i, line) in wrapped.lines.iter().enumerate() {
            self.text(x, top + i as f32 * wrapped.line_height, font, color, line);
        }
    }

    fn draw_header_band(&mut self) {
        let config = self.config;
        let g = &config.geometry;
        let left = g.margin_left;
        let right = g.page_width - g.margin_right;
        let top = g.margin_top;

        match &self.logo {
            Some(logo) => {
                let (name, w, h) = (logo.name.clone(), logo.width, logo.height);
                self.current.image(&name, left, top, w, h);
            }
            None => {
                let font = config.bold_font.sized(14.0);
                self.text(left, top, &font, TEXT_DARK, &config.clinic_name);
            }
        }

        let title = self.header.title.clone();
        let range = self.header.range.clone();
        let generated = self.header.generated.clone();
        self.text_right(right, top, &config.bold_font.sized(13.0), TEXT_DARK, &title);
        self.text_right(right, top + 19.0, &config.body_font, TEXT_MUTED, &range);
        self.text_right(right, top + 33.0, &config.body_font.sized(8.0), TEXT_MUTED, &generated);

        let rule_y = top + g.header_band_height;
        self.current.line((left, rule_y), (right, rule_y), 0.75, RULE);
    }

    fn draw_table_header(&mut self) {
        let config = self.config;
        let g = &config.geometry;
        let cols = &config.columns;
        let x0 = g.margin_left;
        let y = g.content_top();
        let h = g.table_header_height;
        self.current.fill_rect(x0, y, cols.table_width(), h, HEADER_BAND);

        let font = &config.bold_font;
        let line_top = y + (h - self.fonts.line_height(font)) / 2.0;
        for (offset, label) in cols.offsets().iter().zip(COLUMN_LABELS) {
            self.text(x0 + offset + cols.cell_padding, line_top, font, TEXT_ON_BAND, label);
        }
    }

    pub(crate) fn draw_row(
        &mut self,
        index: usize,
        record: &AppointmentViewRecord,
        layout: &RowLayout,
        placement: &Placement,
    ) {
        let config = self.config;
        let cols = &config.columns;
        let body = &config.body_font;
        let x0 = config.geometry.margin_left;
        let width = cols.table_width();
        let y = placement.y;
        let [date_x, patient_x, clinician_x, status_x, flags_x] =
            cols.offsets().map(|o| x0 + o + cols.cell_padding);

        if Stripe::for_row(index) == Stripe::Shaded {
            self.current.fill_rect(x0, y, width, placement.height, STRIPE_SHADED);
        }

        let top = y + CELL_TOP_PADDING;
        let when = record.start_time.format("%d/%m %H:%M").to_string();
        self.text(date_x, top, body, TEXT_DARK, &when);
        self.lines(patient_x, top, body, TEXT_DARK, &layout.patient);
        self.lines(clinician_x, top, body, TEXT_DARK, &layout.clinician);
        self.text(status_x, top, body, record.status.color(), record.status.label());
        self.text(flags_x, top, body, TEXT_MUTED, &Flags::of(record).token());

        if layout.has_detail() {
            self.draw_detail(x0, y + layout.base_height + DETAIL_TOP_PADDING, layout);
        }

        let bottom = placement.bottom();
        self.current.line((x0, bottom), (x0 + width, bottom), 0.5, RULE);
    }

    /// Two columns either side of a divider. Advances only by the heights
    /// already stored in `layout`.
    fn draw_detail(&mut self, x0: f32, top: f32, layout: &RowLayout) {
        let config = self.config;
        let cols = &config.columns;
        let detail = &config.detail_font;
        let title_font = config.bold_font.sized(detail.size);
        let col_w = cols.detail_column_width();
        let left_x = x0 + cols.detail_inset;
        let right_x = left_x + col_w + cols.detail_gutter;
        let divider_x = left_x + col_w + cols.detail_gutter / 2.0;
        let block_h = layout.column1_height.max(layout.column2_height);

        self.current
            .line((divider_x, top), (divider_x, top + block_h), 0.5, DIVIDER);

        if !layout.prescriptions.is_empty() {
            self.text(left_x, top, &title_font, TEXT_DARK, "Recetas");
            let mut cy = top + SECTION_TITLE_HEIGHT;
            for wrapped in &layout.prescriptions {
                self.lines(left_x, cy, detail, TEXT_DARK, wrapped);
                cy += wrapped.height + PRESCRIPTION_GAP;
            }
        }

        let mut cy = top;
        if let Some(wrapped) = &layout.evaluation {
            self.text(right_x, cy, &title_font, TEXT_DARK, "Evaluación");
            cy += SECTION_TITLE_HEIGHT;
            self.lines(right_x, cy, detail, TEXT_DARK, wrapped);
            cy += wrapped.height + EVALUATION_GAP;
        }
        if let Some(label) = &layout.orthotic {
            self.text(right_x, cy, &title_font, TEXT_DARK, "Ortesis");
            cy += SECTION_TITLE_HEIGHT;
            self.text(right_x, cy, detail, TEXT_DARK, label);
            cy += ORTHOTIC_LINE_HEIGHT + ORTHOTIC_GAP;
        }
        debug_assert!(cy - top <= layout.column2_height + 1e-3);
    }

    pub(crate) fn draw_empty_notice(&mut self, placement: &Placement) {
        let x = self.config.geometry.margin_left + self.config.columns.cell_padding;
        let font = self.config.body_font.clone();
        self.text(x, placement.y + 8.0, &font, TEXT_MUTED, "Sin citas en el rango seleccionado");
    }

    pub(crate) fn draw_legend(&mut self, placement: &Placement, total: usize) {
        let config = self.config;
        let x = config.geometry.margin_left;
        let top = placement.y + 10.0;
        self.text(x, top, &config.detail_font, TEXT_MUTED, LEGEND);
        let total_label = format!("Total de citas: {total}");
        self.text(x, top + 14.0, &config.bold_font, TEXT_DARK, &total_label);
    }
}
