// Label text tagged with per-character formatting sections, plus the line
// breaking that runs on it before shaping.

use super::glyphs::{Formatted, FormattedSection, GlyphMap, ImagePositions, ONE_EM, VerticalAlign};
use super::script::{char_allows_ideographic_breaking, char_is_whitespace, verticalize_punctuation};
use crate::warn::warn_once;
use std::rc::Rc;

// Inline images are encoded as characters of the private use area.
const PUA_BEGIN: u32 = 0xE000;
const PUA_END: u32 = 0xF8FF;

#[derive(Debug, Clone, PartialEq)]
pub enum SectionOptions {
    Text {
        scale: f64,
        vertical_align: VerticalAlign,
        font_stack: String,
    },
    Image {
        scale: f64,
        vertical_align: VerticalAlign,
        image_name: String,
    },
}

impl SectionOptions {
    pub fn scale(&self) -> f64 {
        match self {
            SectionOptions::Text { scale, .. } | SectionOptions::Image { scale, .. } => *scale,
        }
    }

    pub fn vertical_align(&self) -> VerticalAlign {
        match self {
            SectionOptions::Text { vertical_align, .. }
            | SectionOptions::Image { vertical_align, .. } => *vertical_align,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, SectionOptions::Image { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaggedString {
    text: Vec<char>,
    sections: Rc<Vec<SectionOptions>>,
    /// Section of each character of `text`.
    section_index: Vec<usize>,
    image_section_id: Option<u32>,
}

impl TaggedString {
    pub fn new(text: &str, sections: Vec<SectionOptions>, section_index: Vec<usize>) -> Self {
        Self {
            text: text.chars().collect(),
            sections: Rc::new(sections),
            section_index,
            image_section_id: None,
        }
    }

    pub fn from_feature(formatted: &Formatted, default_font_stack: &str) -> Self {
        let mut result = Self::default();
        let mut sections = Vec::new();
        for section in &formatted.sections {
            if section.image.is_none() {
                result.add_text_section(&mut sections, section, default_font_stack);
            } else {
                result.add_image_section(&mut sections, section);
            }
        }
        result.sections = Rc::new(sections);
        result
    }

    fn add_text_section(
        &mut self,
        sections: &mut Vec<SectionOptions>,
        section: &FormattedSection,
        default_font_stack: &str,
    ) {
        sections.push(SectionOptions::Text {
            scale: section.scale.filter(|s| *s != 0.0).unwrap_or(1.0),
            vertical_align: section.vertical_align.unwrap_or_default(),
            font_stack: section
                .font_stack
                .clone()
                .unwrap_or_else(|| default_font_stack.to_string()),
        });
        let index = sections.len() - 1;
        for c in section.text.chars() {
            self.text.push(c);
            self.section_index.push(index);
        }
    }

    fn add_image_section(&mut self, sections: &mut Vec<SectionOptions>, section: &FormattedSection) {
        let image_name = section.image.clone().unwrap_or_default();
        if image_name.is_empty() {
            warn_once("Can't add FormattedSection with an empty image.");
            return;
        }
        let Some(code) = self.next_image_section_char() else {
            warn_once(&format!("Reached maximum number of images {}", PUA_END - PUA_BEGIN + 2));
            return;
        };
        self.text.push(code);
        sections.push(SectionOptions::Image {
            scale: 1.0,
            vertical_align: section.vertical_align.unwrap_or_default(),
            image_name,
        });
        self.section_index.push(sections.len() - 1);
    }

    fn next_image_section_char(&mut self) -> Option<char> {
        let next = match self.image_section_id {
            None => PUA_BEGIN,
            Some(id) if id >= PUA_END => return None,
            Some(id) => id + 1,
        };
        self.image_section_id = Some(next);
        char::from_u32(next)
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn chars(&self) -> &[char] {
        &self.text
    }

    pub fn section(&self, index: usize) -> &SectionOptions {
        &self.sections[self.section_index[index]]
    }

    pub fn section_index(&self, index: usize) -> usize {
        self.section_index[index]
    }

    pub fn sections(&self) -> &[SectionOptions] {
        &self.sections
    }

    pub fn verticalize_punctuation(&mut self) {
        let text: String = self.text.iter().collect();
        self.text = verticalize_punctuation(&text).chars().collect();
    }

    /// Zero-width spaces are line breaking hints some tilesets insert in CJK text.
    pub fn has_zero_width_spaces(&self) -> bool {
        self.text.contains(&'\u{200b}')
    }

    pub fn trim(&mut self) {
        let leading = self.text.iter().take_while(|c| c.is_whitespace()).count();
        let trailing = self.text[leading..]
            .iter()
            .rev()
            .take_while(|c| c.is_whitespace())
            .count();
        let end = self.text.len() - trailing;
        self.text = self.text[leading..end].to_vec();
        self.section_index = self.section_index[leading..end].to_vec();
    }

    pub fn substring(&self, start: usize, end: usize) -> TaggedString {
        TaggedString {
            text: self.text[start..end].to_vec(),
            sections: Rc::clone(&self.sections),
            section_index: self.section_index[start..end].to_vec(),
            image_section_id: None,
        }
    }

    /// Rebuilds a line from reordered text that shares this string's sections.
    pub fn with_text(&self, text: &str, section_index: Vec<usize>) -> TaggedString {
        TaggedString {
            text: text.chars().collect(),
            sections: Rc::clone(&self.sections),
            section_index,
            image_section_id: None,
        }
    }

    pub fn max_scale(&self) -> f64 {
        self.section_index
            .iter()
            .map(|&i| self.sections[i].scale())
            .fold(0.0, f64::max)
    }

    pub fn max_image_size(&self, image_positions: &ImagePositions) -> (f64, f64) {
        let mut max_width: f64 = 0.0;
        let mut max_height: f64 = 0.0;
        for i in 0..self.len() {
            if let SectionOptions::Image { image_name, .. } = self.section(i)
                && let Some(position) = image_positions.get(image_name)
            {
                let [w, h] = position.display_size();
                max_width = max_width.max(w);
                max_height = max_height.max(h);
            }
        }
        (max_width, max_height)
    }

    fn glyph_advance(
        &self,
        index: usize,
        glyph_map: &GlyphMap,
        image_positions: &ImagePositions,
        spacing: f64,
        layout_text_size: f64,
    ) -> f64 {
        let c = self.text[index];
        match self.section(index) {
            SectionOptions::Text { scale, font_stack, .. } => glyph_map
                .get(font_stack)
                .and_then(|glyphs| glyphs.get(&u32::from(c)))
                .map_or(0.0, |m| m.advance * scale + spacing),
            SectionOptions::Image { scale, image_name, .. } => image_positions
                .get(image_name)
                .map_or(0.0, |p| p.display_size()[0] * scale * ONE_EM / layout_text_size + spacing),
        }
    }

    fn average_line_width(
        &self,
        spacing: f64,
        max_width: f64,
        glyph_map: &GlyphMap,
        image_positions: &ImagePositions,
        layout_text_size: f64,
    ) -> f64 {
        let total: f64 = (0..self.len())
            .map(|i| self.glyph_advance(i, glyph_map, image_positions, spacing, layout_text_size))
            .sum();
        let line_count = (total / max_width).ceil().max(1.0);
        total / line_count
    }

    /// Character indexes after which lines should break, chosen to minimise
    /// raggedness against the average line width.
    pub fn determine_line_breaks(
        &self,
        spacing: f64,
        max_width: f64,
        glyph_map: &GlyphMap,
        image_positions: &ImagePositions,
        layout_text_size: f64,
    ) -> Vec<usize> {
        let target_width =
            self.average_line_width(spacing, max_width, glyph_map, image_positions, layout_text_size);
        let has_zwsp = self.has_zero_width_spaces();
        let mut breaks: Vec<Break> = Vec::new();
        let mut current_x = 0.0;

        for i in 0..self.len() {
            let c = self.text[i];
            if !char_is_whitespace(c) {
                current_x +=
                    self.glyph_advance(i, glyph_map, image_positions, spacing, layout_text_size);
            }
            let Some(&next) = self.text.get(i + 1) else {
                continue;
            };
            let ideographic = char_allows_ideographic_breaking(c);
            let has_next_next = i + 2 < self.len();
            if is_breakable(c)
                || ideographic
                || self.section(i).is_image()
                || (has_next_next && is_breakable_before(next))
            {
                let penalty = break_penalty(c, next, ideographic && has_zwsp);
                let candidate = evaluate_break(i + 1, current_x, target_width, &breaks, penalty, false);
                breaks.push(candidate);
            }
        }

        let last = evaluate_break(self.len(), current_x, target_width, &breaks, 0.0, true);
        least_bad_breaks(&breaks, &last)
    }
}

impl std::fmt::Display for TaggedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for c in &self.text {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Break {
    index: usize,
    x: f64,
    prior: Option<usize>,
    badness: f64,
}

fn is_breakable(c: char) -> bool {
    matches!(
        u32::from(c),
        0x0a | 0x20 | 0x26 | 0x29 | 0x2b | 0x2d | 0x2f | 0xad | 0xb7 | 0x200b | 0x2010 | 0x2013 | 0x2027
    )
}

fn is_breakable_before(c: char) -> bool {
    c == '('
}

fn badness(line_width: f64, target_width: f64, penalty: f64, is_last: bool) -> f64 {
    let raggedness = (line_width - target_width).powi(2);
    if is_last {
        // Prefer a short last line over a long one.
        return if line_width < target_width {
            raggedness / 2.0
        } else {
            raggedness * 2.0
        };
    }
    raggedness + penalty.abs() * penalty
}

fn break_penalty(c: char, next: char, penalizable_ideographic: bool) -> f64 {
    let mut penalty = 0.0;
    if c == '\n' {
        penalty -= 10000.0;
    }
    if penalizable_ideographic {
        penalty += 150.0;
    }
    if c == '(' || c == '\u{ff08}' {
        penalty += 50.0;
    }
    if next == ')' || next == '\u{ff09}' {
        penalty += 50.0;
    }
    penalty
}

fn evaluate_break(
    index: usize,
    x: f64,
    target_width: f64,
    candidates: &[Break],
    penalty: f64,
    is_last: bool,
) -> Break {
    let mut prior = None;
    let mut best = badness(x, target_width, penalty, is_last);
    for (i, candidate) in candidates.iter().enumerate() {
        let line_width = x - candidate.x;
        let total = badness(line_width, target_width, penalty, is_last) + candidate.badness;
        if total <= best {
            prior = Some(i);
            best = total;
        }
    }
    Break {
        index,
        x,
        prior,
        badness: best,
    }
}

fn least_bad_breaks(candidates: &[Break], last: &Break) -> Vec<usize> {
    let mut indexes = vec![last.index];
    let mut cursor = last.prior;
    while let Some(i) = cursor {
        indexes.push(candidates[i].index);
        cursor = candidates[i].prior;
    }
    indexes.reverse();
    indexes
}
