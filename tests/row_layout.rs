mod common;

use clinic_report_pdf::layout::{
    DETAIL_TOP_PADDING, EVALUATION_GAP, MIN_BASE_HEIGHT, ORTHOTIC_GAP, ORTHOTIC_LINE_HEIGHT,
    PRESCRIPTION_GAP, ROW_BOTTOM_PADDING, SECTION_TITLE_HEIGHT,
};
use clinic_report_pdf::{
    FontBook, ReportConfig, TextMetrics, compute_row_layout, compute_row_layouts,
    evaluation_text, prescription_text,
};

const EPS: f32 = 1e-3;

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < EPS
}

#[test]
fn every_row_respects_height_floors() {
    let fonts = FontBook::standard();
    let config = ReportConfig::default();
    let mut records = common::mixed(30);
    records.push(common::oversized(99));
    for layout in compute_row_layouts(&records, &fonts, &config) {
        assert!(layout.base_height >= MIN_BASE_HEIGHT);
        assert!(layout.total_height >= layout.base_height);
        assert!(close(
            layout.total_height,
            layout.base_height + layout.extra_height + ROW_BOTTOM_PADDING
        ));
    }
}

#[test]
fn bare_record_has_no_detail_block() {
    let fonts = FontBook::standard();
    let config = ReportConfig::default();
    let layout = compute_row_layout(&common::plain(1), &fonts, &config);
    assert_eq!(layout.extra_height, 0.0);
    assert_eq!(layout.column1_height, 0.0);
    assert_eq!(layout.column2_height, 0.0);
    assert!(!layout.has_detail());
    assert!(close(layout.total_height, MIN_BASE_HEIGHT + ROW_BOTTOM_PADDING));
}

#[test]
fn long_names_raise_base_height() {
    let fonts = FontBook::standard();
    let config = ReportConfig::default();
    let mut record = common::plain(1);
    record.patient_name =
        "María de los Ángeles Fernández-Villaverde de la Concepción Rodríguez".into();
    let layout = compute_row_layout(&record, &fonts, &config);

    let expected = fonts.measure(
        &record.patient_name,
        config.columns.patient_text_width(),
        &config.body_font,
    );
    assert!(layout.patient.line_count() >= 2);
    assert!(close(layout.base_height, expected.max(MIN_BASE_HEIGHT)));
}

#[test]
fn orthotic_alone_fills_second_column() {
    let fonts = FontBook::standard();
    let config = ReportConfig::default();
    let layout = compute_row_layout(&common::plain(1).with_orthotic("Férula nocturna"), &fonts, &config);
    let column2 = SECTION_TITLE_HEIGHT + ORTHOTIC_LINE_HEIGHT + ORTHOTIC_GAP;
    assert_eq!(layout.column1_height, 0.0);
    assert!(close(layout.column2_height, column2));
    assert!(close(layout.extra_height, DETAIL_TOP_PADDING + column2));
}

#[test]
fn long_orthotic_label_is_cut_to_the_detail_column() {
    let fonts = FontBook::standard();
    let config = ReportConfig::default();
    let label = "Plantilla ortopédica termoconformada con refuerzo de arco longitudinal y cuña supinadora";
    let layout = compute_row_layout(&common::plain(1).with_orthotic(label), &fonts, &config);

    let drawn = layout.orthotic.as_deref().unwrap();
    let column = config.columns.detail_column_width();
    assert!(fonts.text_width(label, &config.detail_font) > column);
    assert!(fonts.text_width(drawn, &config.detail_font) <= column, "{drawn:?}");
    assert!(drawn.ends_with('…'));
    assert!(label.starts_with(drawn.trim_end_matches('…')));
    assert!(close(
        layout.column2_height,
        SECTION_TITLE_HEIGHT + ORTHOTIC_LINE_HEIGHT + ORTHOTIC_GAP
    ));

    let short = compute_row_layout(&common::plain(1).with_orthotic("Férula nocturna"), &fonts, &config);
    assert_eq!(short.orthotic.as_deref(), Some("Férula nocturna"));
}

#[test]
fn orthotic_without_type_adds_nothing() {
    let fonts = FontBook::standard();
    let config = ReportConfig::default();
    let layout = compute_row_layout(&common::plain(1).with_orthotic("  "), &fonts, &config);
    assert_eq!(layout.extra_height, 0.0);
    assert!(layout.orthotic.is_none());
}

#[test]
fn empty_evaluation_measures_fallback_text() {
    let fonts = FontBook::standard();
    let config = ReportConfig::default();
    let record = common::plain(1).with_evaluation("", "");
    let layout = compute_row_layout(&record, &fonts, &config);
    let wrapped = layout.evaluation.as_ref().unwrap();
    assert_eq!(wrapped.lines, vec!["Registrada".to_string()]);
    assert!(close(
        layout.column2_height,
        SECTION_TITLE_HEIGHT + wrapped.height + EVALUATION_GAP
    ));
}

#[test]
fn prescriptions_taller_than_evaluation_drive_extra_height() {
    let fonts = FontBook::standard();
    let config = ReportConfig::default();
    let detail_w = config.columns.detail_column_width();

    let record = common::plain(1)
        .with_prescription("Fascitis plantar bilateral crónica", &["Ibuprofeno 400mg", "Paracetamol 1g"])
        .with_prescription("Hallux valgus moderado con bursitis", &["Diclofenaco gel", "Hielo local"])
        .with_prescription("Onicomicosis del primer dedo", &["Terbinafina 250mg", "Ciclopirox laca"])
        .with_evaluation("Plano", "Cavo");

    for p in &record.prescriptions {
        let wrapped = fonts.wrap(&prescription_text(p), detail_w, &config.detail_font);
        assert_eq!(wrapped.line_count(), 2, "{:?}", wrapped.lines);
    }
    let eval = record.evaluation.as_ref().unwrap();
    assert_eq!(fonts.wrap(&evaluation_text(eval), detail_w, &config.detail_font).line_count(), 1);

    let layout = compute_row_layout(&record, &fonts, &config);
    let line_h = fonts.line_height(&config.detail_font);
    let column1 = SECTION_TITLE_HEIGHT + 3.0 * (2.0 * line_h + PRESCRIPTION_GAP);
    let column2 = SECTION_TITLE_HEIGHT + line_h + EVALUATION_GAP;

    assert!(close(layout.column1_height, column1));
    assert!(close(layout.column2_height, column2));
    assert!(layout.column1_height > layout.column2_height);
    assert!(close(layout.extra_height, DETAIL_TOP_PADDING + layout.column1_height));
}

#[test]
fn extra_height_is_max_of_independent_columns() {
    let fonts = FontBook::standard();
    let config = ReportConfig::default();
    let prescriptions_only = common::plain(1).with_prescription("Dx", &["Med"]);
    let second_only = common::plain(2)
        .with_evaluation("Plano", "Normal")
        .with_orthotic("Plantilla");
    let both = prescriptions_only
        .clone()
        .with_evaluation("Plano", "Normal")
        .with_orthotic("Plantilla");

    let c1 = compute_row_layout(&prescriptions_only, &fonts, &config).column1_height;
    let c2 = compute_row_layout(&second_only, &fonts, &config).column2_height;
    let layout = compute_row_layout(&both, &fonts, &config);

    assert!(close(layout.column1_height, c1));
    assert!(close(layout.column2_height, c2));
    assert!(close(layout.extra_height, DETAIL_TOP_PADDING + c1.max(c2)));
}

#[test]
fn layouts_are_deterministic() {
    let fonts = FontBook::standard();
    let config = ReportConfig::default();
    let records = common::mixed(25);
    let first = compute_row_layouts(&records, &fonts, &config);
    let second = compute_row_layouts(&records, &fonts, &config);
    assert_eq!(first, second);
}

#[test]
fn unknown_font_family_measures_like_the_fallback() {
    let _ = env_logger::try_init();
    let config = ReportConfig::default().with_font_family("Definitely Not A Font");
    let chars = "Paciente 0123456789".chars().collect();
    let fonts = FontBook::load(
        &[&config.body_font, &config.bold_font, &config.detail_font],
        &[],
        &chars,
    );
    assert!(!fonts.has_family(&config.body_font));

    let standard = FontBook::standard();
    let default_config = ReportConfig::default();
    let records = common::mixed(6);
    let fallback = compute_row_layouts(&records, &fonts, &config);
    let reference = compute_row_layouts(&records, &standard, &default_config);
    for (a, b) in fallback.iter().zip(&reference) {
        assert!(close(a.total_height, b.total_height));
    }
}
