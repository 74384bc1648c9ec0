use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::fonts::FontSpec;
use crate::pdf::PageFrame;

/// Page size and the fixed vertical bands of a report page, in points.
/// Vertical positions are measured downward from the top edge.
#[derive(Clone, Debug)]
pub struct PageGeometry {
    pub page_width: f32,
    pub page_height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    /// Logo, report title and timestamp.
    pub header_band_height: f32,
    /// Gap between the header band and the table header.
    pub header_gap: f32,
    pub table_header_height: f32,
    /// Reserved at the bottom of every page for the page number line.
    pub footer_height: f32,
    pub legend_height: f32,
}

impl Default for PageGeometry {
    // A4 portrait
    fn default() -> Self {
        Self {
            page_width: 595.28,
            page_height: 841.89,
            margin_top: 36.0,
            margin_bottom: 36.0,
            margin_left: 40.0,
            margin_right: 40.0,
            header_band_height: 64.0,
            header_gap: 12.0,
            table_header_height: 20.0,
            footer_height: 18.0,
            legend_height: 42.0,
        }
    }
}

impl PageGeometry {
    pub fn content_width(&self) -> f32 {
        self.page_width - self.margin_left - self.margin_right
    }

    pub fn content_top(&self) -> f32 {
        self.margin_top + self.header_band_height + self.header_gap
    }

    pub fn bottom_limit(&self) -> f32 {
        self.page_height - self.margin_bottom - self.footer_height
    }

    pub fn frame(&self) -> PageFrame {
        PageFrame {
            content_top: self.content_top(),
            table_header_height: self.table_header_height,
            bottom_limit: self.bottom_limit(),
        }
    }
}

/// Fixed widths of the table columns, left to right, plus cell padding.
#[derive(Clone, Debug)]
pub struct TableColumns {
    pub date: f32,
    pub patient: f32,
    pub clinician: f32,
    pub status: f32,
    pub flags: f32,
    pub cell_padding: f32,
    /// Left/right inset of the detail block from the table edges.
    pub detail_inset: f32,
    /// Horizontal gap around the divider between the two detail columns.
    pub detail_gutter: f32,
}

impl Default for TableColumns {
    fn default() -> Self {
        Self {
            date: 75.0,
            patient: 135.0,
            clinician: 125.0,
            status: 70.0,
            flags: 110.0,
            cell_padding: 5.0,
            detail_inset: 10.0,
            detail_gutter: 20.0,
        }
    }
}

impl TableColumns {
    pub fn table_width(&self) -> f32 {
        self.date + self.patient + self.clinician + self.status + self.flags
    }

    /// Text width available for the patient name.
    pub fn patient_text_width(&self) -> f32 {
        (self.patient - 2.0 * self.cell_padding).max(0.0)
    }

    pub fn clinician_text_width(&self) -> f32 {
        (self.clinician - 2.0 * self.cell_padding).max(0.0)
    }

    /// Width of each detail sub-column. Both columns share the same width.
    pub fn detail_column_width(&self) -> f32 {
        ((self.table_width() - 2.0 * self.detail_inset - self.detail_gutter) / 2.0).max(0.0)
    }

    /// Left edges of date, patient, clinician, status and flags, relative to the table.
    pub(crate) fn offsets(&self) -> [f32; 5] {
        let patient = self.date;
        let clinician = patient + self.patient;
        let status = clinician + self.clinician;
        let flags = status + self.status;
        [0.0, patient, clinician, status, flags]
    }
}

#[derive(Clone, Debug)]
pub struct ReportConfig {
    pub geometry: PageGeometry,
    pub columns: TableColumns,
    /// Patient, clinician, date and status cells.
    pub body_font: FontSpec,
    /// Titles, table header labels and detail section titles.
    pub bold_font: FontSpec,
    /// Prescription bullets, evaluation summary and orthotic label.
    pub detail_font: FontSpec,
    /// Font files to register in addition to the discovered system fonts.
    pub font_files: Vec<PathBuf>,
    /// Shown in the header band when there is no usable logo.
    pub clinic_name: String,
    /// PNG or JPEG bytes. Decoding failures fall back to the text header.
    pub logo: Option<Vec<u8>>,
    /// Fixed generation timestamp. `None` uses the local clock.
    pub generated_at: Option<NaiveDateTime>,
    pub compress: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            geometry: PageGeometry::default(),
            columns: TableColumns::default(),
            body_font: FontSpec::new("Helvetica", false, 9.0),
            bold_font: FontSpec::new("Helvetica", true, 9.0),
            detail_font: FontSpec::new("Helvetica", false, 8.0),
            font_files: Vec::new(),
            clinic_name: "Clínica".to_string(),
            logo: None,
            generated_at: None,
            compress: true,
        }
    }
}

impl ReportConfig {
    /// Switch every text role to `family`, keeping sizes and weights.
    pub fn with_font_family(mut self, family: &str) -> Self {
        for spec in [&mut self.body_font, &mut self.bold_font, &mut self.detail_font] {
            spec.family = family.to_string();
        }
        self
    }

    pub(crate) fn font_specs(&self) -> [&FontSpec; 3] {
        [&self.body_font, &self.bold_font, &self.detail_font]
    }
}
