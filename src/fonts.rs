use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use memmap2::Mmap;
use pdf_writer::{Name, Pdf, Rect, Ref};
use ttf_parser::Face;

/// Family, weight and size of a piece of report text.
#[derive(Clone, Debug, PartialEq)]
pub struct FontSpec {
    pub family: String,
    pub bold: bool,
    pub size: f32,
}

impl FontSpec {
    pub fn new(family: &str, bold: bool, size: f32) -> Self {
        Self {
            family: family.to_string(),
            bold,
            size,
        }
    }

    pub fn sized(&self, size: f32) -> Self {
        Self {
            size,
            ..self.clone()
        }
    }

    #[cfg(test)]
    fn bolded(&self) -> Self {
        Self {
            bold: true,
            ..self.clone()
        }
    }

    fn key(&self) -> (String, bool) {
        (self.family.trim().to_lowercase(), self.bold)
    }
}

enum FontData {
    /// One of the 14 standard PDF fonts; nothing to embed.
    Standard(&'static str),
    TrueType { data: Vec<u8>, face_index: u32, ps_name: String },
}

pub(crate) struct FontEntry {
    pub(crate) pdf_name: String,
    data: FontData,
    widths_1000: Vec<f32>,
    char_widths_1000: HashMap<char, f32>,
    line_h_ratio: f32,
    ascender_ratio: f32,
    font_ref: Option<Ref>,
    char_to_gid: Option<HashMap<char, u16>>,
}

impl FontEntry {
    fn standard(pdf_name: String, base_font: &'static str) -> Self {
        Self {
            pdf_name,
            data: FontData::Standard(base_font),
            widths_1000: helvetica_widths(),
            char_widths_1000: HashMap::new(),
            line_h_ratio: 1.2,
            ascender_ratio: 0.75,
            font_ref: None,
            char_to_gid: None,
        }
    }

    /// Width of a single character in 1000-units. Uses the per-char cache
    /// (covers every char the report will draw), falls back to the WinAnsi table.
    pub(crate) fn char_width_1000(&self, ch: char) -> f32 {
        if let Some(&w) = self.char_widths_1000.get(&ch) {
            return w;
        }
        let byte = char_to_winansi(ch);
        if byte >= 32 {
            self.widths_1000[(byte - 32) as usize]
        } else {
            0.0
        }
    }

    pub(crate) fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars()
            .map(|ch| self.char_width_1000(ch) * font_size / 1000.0)
            .sum()
    }

    pub(crate) fn space_width(&self, font_size: f32) -> f32 {
        self.char_width_1000(' ') * font_size / 1000.0
    }

    pub(crate) fn line_height(&self, font_size: f32) -> f32 {
        font_size * self.line_h_ratio
    }

    pub(crate) fn ascent(&self, font_size: f32) -> f32 {
        font_size * self.ascender_ratio
    }

    /// Bytes for a PDF text-showing operator in this font's encoding.
    pub(crate) fn encode(&self, text: &str) -> Vec<u8> {
        match &self.char_to_gid {
            Some(map) => encode_as_gids(text, map),
            None => to_winansi_bytes(text),
        }
    }
}

/// Every font a report may draw with, plus the default the rest fall back to.
pub struct FontBook {
    entries: Vec<FontEntry>,
    index: HashMap<(String, bool), usize>,
    default_regular: usize,
    default_bold: usize,
}

impl FontBook {
    /// Helvetica and Helvetica-Bold only. Never touches the filesystem.
    pub fn standard() -> Self {
        let mut book = FontBook {
            entries: Vec::new(),
            index: HashMap::new(),
            default_regular: 0,
            default_bold: 1,
        };
        book.push(("helvetica".into(), false), |name| FontEntry::standard(name, "Helvetica"));
        book.push(("helvetica".into(), true), |name| FontEntry::standard(name, "Helvetica-Bold"));
        book
    }

    /// Resolve every requested spec to a font. `font_files` are registered
    /// under their own family names before the system font index is consulted.
    /// Anything that cannot be found or parsed falls back to Helvetica.
    pub fn load(specs: &[&FontSpec], font_files: &[PathBuf], used_chars: &HashSet<char>) -> Self {
        let t0 = std::time::Instant::now();
        let mut book = FontBook::standard();

        let explicit = index_font_files(font_files);

        for spec in specs {
            let key = spec.key();
            if book.index.contains_key(&key) {
                continue;
            }
            let located = explicit
                .get(&key)
                .cloned()
                .or_else(|| find_font_file(&spec.family, spec.bold));
            let Some((path, face_index)) = located else {
                log::warn!(
                    "Font not found: {} bold={}, using Helvetica",
                    spec.family,
                    spec.bold
                );
                continue;
            };
            let data = match std::fs::read(&path) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("Cannot read font {}: {e}, using Helvetica", path.display());
                    continue;
                }
            };
            let family = spec.family.trim();
            match load_truetype(data, face_index, family, used_chars) {
                Some(loaded) => {
                    book.push(key, |name| FontEntry { pdf_name: name, ..loaded });
                }
                None => {
                    log::warn!(
                        "Font {} is not a usable TrueType/OpenType face, using Helvetica",
                        path.display()
                    );
                }
            }
        }

        log::debug!(
            "FontBook::load: {} fonts in {:.1}ms",
            book.entries.len(),
            t0.elapsed().as_secs_f64() * 1000.0
        );
        book
    }

    fn push(&mut self, key: (String, bool), make: impl FnOnce(String) -> FontEntry) {
        let pdf_name = format!("F{}", self.entries.len() + 1);
        self.index.insert(key, self.entries.len());
        self.entries.push(make(pdf_name));
    }

    pub(crate) fn resolve(&self, spec: &FontSpec) -> &FontEntry {
        let idx = self.index.get(&spec.key()).copied().unwrap_or(if spec.bold {
            self.default_bold
        } else {
            self.default_regular
        });
        &self.entries[idx]
    }

    /// True when `spec` is served by its own face rather than the fallback.
    pub fn has_family(&self, spec: &FontSpec) -> bool {
        self.index.contains_key(&spec.key())
    }

    pub(crate) fn by_pdf_name(&self, pdf_name: &str) -> Option<&FontEntry> {
        self.entries.iter().find(|e| e.pdf_name == pdf_name)
    }

    /// Write every font object into `pdf`. TrueType faces are subset to `used_chars`.
    pub(crate) fn embed(
        &mut self,
        pdf: &mut Pdf,
        alloc: &mut impl FnMut() -> Ref,
        used_chars: &HashSet<char>,
    ) {
        for entry in &mut self.entries {
            let font_ref = alloc();
            match &entry.data {
                FontData::Standard(base_font) => {
                    pdf.type1_font(font_ref)
                        .base_font(Name(base_font.as_bytes()))
                        .encoding_predefined(Name(b"WinAnsiEncoding"));
                }
                FontData::TrueType {
                    data,
                    face_index,
                    ps_name,
                } => {
                    match embed_truetype(pdf, font_ref, ps_name, data, *face_index, used_chars, alloc) {
                        Some(map) => entry.char_to_gid = Some(map),
                        None => {
                            log::warn!("Embedding {ps_name} failed, writing Helvetica in its place");
                            pdf.type1_font(font_ref)
                                .base_font(Name(b"Helvetica"))
                                .encoding_predefined(Name(b"WinAnsiEncoding"));
                        }
                    }
                }
            }
            entry.font_ref = Some(font_ref);
        }
    }

    /// `(resource name, object ref)` for every embedded font.
    pub(crate) fn resources(&self) -> Vec<(String, Ref)> {
        self.entries
            .iter()
            .filter_map(|e| e.font_ref.map(|r| (e.pdf_name.clone(), r)))
            .collect()
    }
}

fn font_family_name(face: &Face) -> Option<String> {
    // ID 1 (Family), not ID 16 (Typographic Family): the latter collapses
    // "Foo Narrow" and "Foo" into one name.
    for name in face.names() {
        if name.name_id == ttf_parser::name_id::FAMILY
            && name.is_unicode()
            && let Some(s) = name.to_string()
        {
            return Some(s);
        }
    }
    None
}

fn read_font_style(data: &[u8], face_index: u32) -> Option<(String, bool, bool)> {
    let face = Face::parse(data, face_index).ok()?;
    let family = font_family_name(&face)?;
    Some((family, face.is_bold(), face.is_italic()))
}

/// (lowercase family name, bold, italic) -> (file path, face index within TTC)
type FontLookup = HashMap<(String, bool, bool), (PathBuf, u32)>;

static FONT_INDEX: OnceLock<FontLookup> = OnceLock::new();

fn font_directories() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    if let Ok(val) = std::env::var("CLINIC_REPORT_FONTS") {
        let sep = if cfg!(windows) { ';' } else { ':' };
        for part in val.split(sep) {
            let trimmed = part.trim();
            if !trimmed.is_empty() {
                dirs.push(PathBuf::from(trimmed));
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/Library/Fonts".into(),
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
        ]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(&home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend(["/usr/share/fonts".into(), "/usr/local/share/fonts".into()]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        } else {
            dirs.push("C:\\Windows\\Fonts".into());
        }
    }

    dirs
}

fn is_font_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("ttf" | "otf" | "ttc")
    )
}

fn is_font_collection(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ttc"))
}

/// Every (family, bold, italic) face in one file.
fn faces_in_file(path: &Path) -> Vec<(String, bool, bool, u32)> {
    let Ok(file) = std::fs::File::open(path) else {
        return Vec::new();
    };
    // SAFETY: the map is read-only and dropped before this function returns.
    let Ok(data) = (unsafe { Mmap::map(&file) }) else {
        return Vec::new();
    };
    let face_count = if is_font_collection(path) {
        ttf_parser::fonts_in_collection(&data).unwrap_or(1)
    } else {
        1
    };
    (0..face_count)
        .filter_map(|idx| read_font_style(&data, idx).map(|(f, b, i)| (f, b, i, idx)))
        .collect()
}

fn scan_font_dirs() -> FontLookup {
    let t0 = std::time::Instant::now();
    let mut index = FontLookup::new();
    let mut files_scanned = 0u32;
    let mut visited_dirs: HashSet<PathBuf> = HashSet::new();

    let mut stack: Vec<PathBuf> = font_directories();
    while let Some(dir) = stack.pop() {
        if !visited_dirs.insert(dir.clone()) {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if is_font_file(&path) {
                files_scanned += 1;
                for (family, bold, italic, face_idx) in faces_in_file(&path) {
                    index
                        .entry((family.to_lowercase(), bold, italic))
                        .or_insert((path.clone(), face_idx));
                }
            }
        }
    }

    log::info!(
        "Font scan: {:.1}ms, {} dirs, {} files parsed → {} entries",
        t0.elapsed().as_secs_f64() * 1000.0,
        visited_dirs.len(),
        files_scanned,
        index.len(),
    );

    index
}

fn get_font_index() -> &'static FontLookup {
    FONT_INDEX.get_or_init(scan_font_dirs)
}

/// Look up an upright face by family name and weight.
/// Falls back to the regular weight if the bold face is not installed.
fn find_font_file(font_name: &str, bold: bool) -> Option<(PathBuf, u32)> {
    let index = get_font_index();
    let key = font_name.trim().to_lowercase();
    index
        .get(&(key.clone(), bold, false))
        .or_else(|| if bold { index.get(&(key, false, false)) } else { None })
        .cloned()
}

/// Upright faces from explicitly configured files, keyed like `FontSpec::key`.
/// A file whose family has no bold face also serves bold requests.
fn index_font_files(paths: &[PathBuf]) -> HashMap<(String, bool), (PathBuf, u32)> {
    let mut out = HashMap::new();
    for path in paths {
        let faces = faces_in_file(path);
        if faces.is_empty() {
            log::warn!("Ignoring font file {}: no readable faces", path.display());
        }
        for (family, bold, italic, face_idx) in faces {
            if italic {
                continue;
            }
            out.insert((family.to_lowercase(), bold), (path.clone(), face_idx));
        }
    }
    let regular_only: Vec<_> = out
        .iter()
        .filter(|((family, bold), _)| !bold && !out.contains_key(&(family.clone(), true)))
        .map(|((family, _), loc)| ((family.clone(), true), loc.clone()))
        .collect();
    out.extend(regular_only);
    out
}

fn load_truetype(
    data: Vec<u8>,
    face_index: u32,
    family: &str,
    used_chars: &HashSet<char>,
) -> Option<FontEntry> {
    let face = Face::parse(&data, face_index).ok()?;
    let units = face.units_per_em() as f32;
    let advance = |ch: char| {
        face.glyph_index(ch)
            .and_then(|gid| face.glyph_hor_advance(gid))
            .map(|adv| adv as f32 / units * 1000.0)
    };

    let widths_1000: Vec<f32> = (32u8..=255u8)
        .map(|byte| advance(winansi_to_char(byte)).unwrap_or(0.0))
        .collect();
    let char_widths_1000: HashMap<char, f32> = used_chars
        .iter()
        .filter_map(|&ch| advance(ch).map(|w| (ch, w)))
        .collect();

    let line_gap = face.line_gap() as f32;
    let line_h_ratio = (face.ascender() as f32 - face.descender() as f32 + line_gap) / units;
    let ascender_ratio = face.ascender() as f32 / units;
    let ps_name = if face.is_bold() {
        format!("{}-Bold", family.replace(' ', ""))
    } else {
        family.replace(' ', "")
    };

    Some(FontEntry {
        pdf_name: String::new(),
        data: FontData::TrueType {
            data,
            face_index,
            ps_name,
        },
        widths_1000,
        char_widths_1000,
        line_h_ratio,
        ascender_ratio,
        font_ref: None,
        char_to_gid: None,
    })
}

/// Windows-1252 (WinAnsi) byte to Unicode char mapping.
/// Bytes 0x80-0x9F are remapped; all others map directly to their Unicode codepoint.
fn winansi_to_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}', // bullet
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        _ => byte as char,
    }
}

/// Map a single Unicode char to its WinAnsi byte, or 0 if unmappable.
fn char_to_winansi(c: char) -> u8 {
    match c as u32 {
        0x0020..=0x007F => c as u8,
        0x00A0..=0x00FF => c as u8,
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => 0,
    }
}

/// Convert a UTF-8 string to WinAnsi (Windows-1252) bytes for PDF Str encoding.
/// Unmappable characters are dropped.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .filter_map(|c| match char_to_winansi(c) {
            0 => None,
            b => Some(b),
        })
        .collect()
}

/// Encode UTF-8 text as big-endian 2-byte glyph IDs for CIDFont content streams.
pub(crate) fn encode_as_gids(text: &str, char_to_gid: &HashMap<char, u16>) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for ch in text.chars() {
        let gid = char_to_gid.get(&ch).copied().unwrap_or(0);
        out.push((gid >> 8) as u8);
        out.push((gid & 0xFF) as u8);
    }
    out
}

/// Approximate Helvetica widths at 1000 units/em for WinAnsi chars 32..=255.
fn helvetica_widths() -> Vec<f32> {
    (32u8..=255u8)
        .map(|b| match b {
            32 => 278.0,                          // space
            33..=47 => 333.0,                     // punctuation
            48..=57 => 556.0,                     // digits
            58..=64 => 333.0,                     // more punctuation
            73 | 74 => 278.0,                     // I J (narrow uppercase)
            77 => 833.0,                          // M (wide)
            65..=90 => 667.0,                     // uppercase A-Z (average)
            91..=96 => 333.0,                     // brackets etc.
            102 | 105 | 106 | 108 | 116 => 278.0, // narrow lowercase: f i j l t
            109 | 119 => 833.0,                   // m w (wide)
            97..=122 => 556.0,                    // lowercase a-z (average)
            0x95 => 350.0,                        // bullet
            _ => 556.0,
        })
        .collect()
}

/// Embed a TrueType/OpenType font as a CIDFont (Type0 composite) with Identity-H encoding.
/// The font data is subsetted to the glyphs of `used_chars`. Returns the char -> new GID map.
fn embed_truetype(
    pdf: &mut Pdf,
    font_ref: Ref,
    ps_name: &str,
    font_data: &[u8],
    face_index: u32,
    used_chars: &HashSet<char>,
    alloc: &mut impl FnMut() -> Ref,
) -> Option<HashMap<char, u16>> {
    let face = Face::parse(font_data, face_index).ok()?;
    let descriptor_ref = alloc();
    let data_ref = alloc();

    let units = face.units_per_em() as f32;
    let ascent = face.ascender() as f32 / units * 1000.0;
    let descent = face.descender() as f32 / units * 1000.0;
    let cap_height = face
        .capital_height()
        .map(|h| h as f32 / units * 1000.0)
        .unwrap_or(700.0);

    let bb = face.global_bounding_box();
    let bbox = Rect::new(
        bb.x_min as f32 / units * 1000.0,
        bb.y_min as f32 / units * 1000.0,
        bb.x_max as f32 / units * 1000.0,
        bb.y_max as f32 / units * 1000.0,
    );

    // Sorted so GID assignment does not depend on HashSet iteration order.
    let mut chars: Vec<char> = used_chars.iter().copied().collect();
    chars.sort_unstable();

    let mut remapper = subsetter::GlyphRemapper::new();
    let mut char_to_gid = HashMap::new();
    let mut gid_widths: Vec<(u16, f32)> = Vec::new();
    for ch in chars {
        if let Some(gid) = face.glyph_index(ch) {
            let new_gid = remapper.remap(gid.0);
            char_to_gid.insert(ch, new_gid);
            let w = face
                .glyph_hor_advance(gid)
                .map(|adv| adv as f32 / units * 1000.0)
                .unwrap_or(0.0);
            gid_widths.push((new_gid, w));
        }
    }
    gid_widths.sort_by_key(|&(gid, _)| gid);
    gid_widths.dedup_by_key(|&mut (gid, _)| gid);

    let subset_data = subsetter::subset(font_data, face_index, &remapper).unwrap_or_else(|e| {
        log::warn!("Font subsetting failed for {ps_name}: {e}, embedding full font");
        font_data.to_vec()
    });

    let data_len = i32::try_from(subset_data.len()).ok()?;
    pdf.stream(data_ref, &subset_data)
        .pair(Name(b"Length1"), data_len);

    pdf.font_descriptor(descriptor_ref)
        .name(Name(ps_name.as_bytes()))
        .flags(pdf_writer::types::FontFlags::NON_SYMBOLIC)
        .bbox(bbox)
        .italic_angle(0.0)
        .ascent(ascent)
        .descent(descent)
        .cap_height(cap_height)
        .stem_v(80.0)
        .font_file2(data_ref);

    let cid_font_ref = alloc();
    let system_info = pdf_writer::types::SystemInfo {
        registry: pdf_writer::Str(b"Adobe"),
        ordering: pdf_writer::Str(b"Identity"),
        supplement: 0,
    };
    {
        let mut cid = pdf.cid_font(cid_font_ref);
        cid.subtype(pdf_writer::types::CidFontType::Type2);
        cid.base_font(Name(ps_name.as_bytes()));
        cid.system_info(system_info);
        cid.font_descriptor(descriptor_ref);
        cid.default_width(0.0);
        cid.cid_to_gid_map_predefined(Name(b"Identity"));
        if !gid_widths.is_empty() {
            let mut w = cid.widths();
            for &(gid, width) in &gid_widths {
                w.consecutive(gid, [width]);
            }
        }
    }

    let tounicode_ref = alloc();
    let cmap_name = format!("{}-UTF16", ps_name);
    let mut cmap = pdf_writer::types::UnicodeCmap::new(
        Name(cmap_name.as_bytes()),
        pdf_writer::types::SystemInfo {
            registry: pdf_writer::Str(b"Adobe"),
            ordering: pdf_writer::Str(b"Identity"),
            supplement: 0,
        },
    );
    let mut pairs: Vec<(&char, &u16)> = char_to_gid.iter().collect();
    pairs.sort_by_key(|&(_, gid)| *gid);
    for (&ch, &new_gid) in pairs {
        cmap.pair(new_gid, ch);
    }
    let cmap_data = cmap.finish();
    pdf.stream(tounicode_ref, cmap_data.as_slice());

    pdf.type0_font(font_ref)
        .base_font(Name(ps_name.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_font_ref)
        .to_unicode(tounicode_ref);

    Some(char_to_gid)
}
