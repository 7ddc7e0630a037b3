// Glyph metrics for label layout, read from system fonts. Only advances and bounding
// boxes are needed; no rasterisation happens here.

use crate::symbol::glyphs::{
    GLYPH_PBF_BORDER, GlyphMap, GlyphMetrics, GlyphPosition, GlyphPositions, ONE_EM, Rect,
};
use crate::symbol::script::char_has_upright_vertical_orientation;
use fontdb::{Database, Family, ID, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use ttf_parser::Face;

static SYSTEM_FONTS: Lazy<Mutex<GlyphMetricsProvider>> =
    Lazy::new(|| Mutex::new(GlyphMetricsProvider::system()));

/// Metrics for `chars` in `font_stack` from the shared system font provider.
pub fn system_glyph_metrics(font_stack: &str, chars: &BTreeSet<char>) -> HashMap<u32, GlyphMetrics> {
    match SYSTEM_FONTS.lock() {
        Ok(mut provider) => provider.metrics(font_stack, chars),
        Err(_) => chars.iter().map(|&c| (u32::from(c), fallback_metrics(c))).collect(),
    }
}

/// Resolves font stacks to faces and reads per-glyph metrics scaled to a 24 px em.
/// Characters without a face (or without a glyph in it) get metrics from a fixed table.
pub struct GlyphMetricsProvider {
    db: Database,
    load_system_fonts: bool,
    loaded_system_fonts: bool,
    faces: HashMap<String, Option<ID>>,
}

impl GlyphMetricsProvider {
    pub fn system() -> Self {
        Self {
            db: Database::new(),
            load_system_fonts: true,
            loaded_system_fonts: false,
            faces: HashMap::new(),
        }
    }

    /// A provider that never touches system fonts and answers from the fallback table.
    pub fn fallback_only() -> Self {
        Self {
            db: Database::new(),
            load_system_fonts: false,
            loaded_system_fonts: false,
            faces: HashMap::new(),
        }
    }

    pub fn metrics(&mut self, font_stack: &str, chars: &BTreeSet<char>) -> HashMap<u32, GlyphMetrics> {
        let mut result: HashMap<u32, GlyphMetrics> = HashMap::new();
        if let Some(id) = self.resolve(font_stack) {
            self.db.with_face_data(id, |data, index| {
                let Ok(face) = Face::parse(data, index) else {
                    return;
                };
                for &c in chars {
                    if let Some(metrics) = face_metrics(&face, c) {
                        result.insert(u32::from(c), metrics);
                    }
                }
            });
        }
        for &c in chars {
            result.entry(u32::from(c)).or_insert_with(|| fallback_metrics(c));
        }
        result
    }

    /// Fills `glyph_map` and `glyph_positions` for every character of `texts` under
    /// `font_stack`. Atlas rectangles only carry the size a packed glyph would have.
    pub fn load_into<'a>(
        &mut self,
        font_stack: &str,
        texts: impl IntoIterator<Item = &'a str>,
        glyph_map: &mut GlyphMap,
        glyph_positions: &mut GlyphPositions,
    ) {
        let chars: BTreeSet<char> = texts.into_iter().flat_map(str::chars).collect();
        let metrics = self.metrics(font_stack, &chars);
        let positions = glyph_positions.entry(font_stack.to_string()).or_default();
        for (&code, glyph) in &metrics {
            let rect = (glyph.width > 0.0 && glyph.height > 0.0).then(|| Rect {
                x: 0.0,
                y: 0.0,
                w: glyph.width + 2.0 * GLYPH_PBF_BORDER,
                h: glyph.height + 2.0 * GLYPH_PBF_BORDER,
            });
            positions.insert(code, GlyphPosition { rect, metrics: *glyph });
        }
        glyph_map.entry(font_stack.to_string()).or_default().extend(metrics);
    }

    fn resolve(&mut self, font_stack: &str) -> Option<ID> {
        if !self.load_system_fonts {
            return None;
        }
        if let Some(id) = self.faces.get(font_stack) {
            return *id;
        }
        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
            log::debug!("loaded {} system font faces", self.db.len());
        }

        let names: Vec<String> = font_stack
            .split(',')
            .map(|part| part.trim().trim_matches('"').trim_matches('\'').to_string())
            .filter(|name| !name.is_empty())
            .collect();
        let mut families: Vec<Family<'_>> = names.iter().map(|name| Family::Name(name.as_str())).collect();
        families.push(Family::SansSerif);

        let style = if names.iter().any(|n| n.to_ascii_lowercase().contains("italic")) {
            Style::Italic
        } else {
            Style::Normal
        };
        let weight = if names.iter().any(|n| n.to_ascii_lowercase().contains("bold")) {
            Weight::BOLD
        } else {
            Weight::NORMAL
        };
        let query = Query {
            families: &families,
            weight,
            stretch: Stretch::Normal,
            style,
        };
        let id = self.db.query(&query);
        if id.is_none() {
            log::warn!("no system font matches '{font_stack}', using fallback glyph metrics");
        }
        self.faces.insert(font_stack.to_string(), id);
        id
    }
}

fn face_metrics(face: &Face<'_>, c: char) -> Option<GlyphMetrics> {
    let glyph = face.glyph_index(c)?;
    let scale = ONE_EM / f64::from(face.units_per_em().max(1));
    let advance = f64::from(face.glyph_hor_advance(glyph).unwrap_or(0)) * scale;
    let metrics = match face.glyph_bounding_box(glyph) {
        Some(bbox) => GlyphMetrics {
            width: (f64::from(bbox.x_max) - f64::from(bbox.x_min)) * scale,
            height: (f64::from(bbox.y_max) - f64::from(bbox.y_min)) * scale,
            left: f64::from(bbox.x_min) * scale,
            top: f64::from(bbox.y_max) * scale - ONE_EM,
            advance,
        },
        // Whitespace has an advance but no outline.
        None => GlyphMetrics {
            advance,
            ..GlyphMetrics::default()
        },
    };
    Some(metrics)
}

/// Fixed metrics: ideographs are a full em wide, everything else a little over half.
pub fn fallback_metrics(c: char) -> GlyphMetrics {
    if c.is_whitespace() {
        return GlyphMetrics {
            advance: ONE_EM * 0.25,
            ..GlyphMetrics::default()
        };
    }
    let advance = if char_has_upright_vertical_orientation(c) {
        ONE_EM
    } else {
        (ONE_EM * 0.56).round()
    };
    GlyphMetrics {
        width: advance - 2.0,
        height: 18.0,
        left: 1.0,
        top: -5.0,
        advance,
    }
}
