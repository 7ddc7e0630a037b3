use super::glyphs::Formatted;
use crate::geometry::Point;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryType {
    Point,
    #[serde(alias = "linestring")]
    Line,
    Polygon,
}

/// A feature as seen by symbol layout: tile-unit geometry plus its evaluated
/// text and icon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolFeature {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub source_layer_index: u32,
    #[serde(rename = "type")]
    pub geometry_type: GeometryType,
    /// Points are one point per ring, lines one ring per part, polygons
    /// outer rings followed by their holes.
    pub geometry: Vec<Vec<Point>>,
    #[serde(default)]
    pub text: Option<Formatted>,
    #[serde(default)]
    pub icon: Option<String>,
    /// Overrides the layer's `symbol-sort-key`.
    #[serde(default)]
    pub sort_key: Option<f64>,
    #[serde(default)]
    pub id: Option<u64>,
}

impl SymbolFeature {
    pub fn point(index: u32, x: f64, y: f64) -> Self {
        Self {
            index,
            source_layer_index: 0,
            geometry_type: GeometryType::Point,
            geometry: vec![vec![Point::new(x, y)]],
            text: None,
            icon: None,
            sort_key: None,
            id: None,
        }
    }

    pub fn line(index: u32, points: Vec<Point>) -> Self {
        Self {
            geometry_type: GeometryType::Line,
            geometry: vec![points],
            ..Self::point(index, 0.0, 0.0)
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(Formatted::from_text(text));
        self
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn text_key(&self) -> Option<String> {
        self.text
            .as_ref()
            .map(Formatted::plain_text)
            .filter(|text| !text.is_empty())
    }
}
