// Scene files for the command line driver: a camera, an image atlas, symbol layers and
// the tiles that carry their features. Loading a scene lays out one bucket per tile and
// layer and assigns the ids placement needs.

use crate::camera::Transform;
use crate::config::Config;
use crate::geometry::Point;
use crate::glyph_metrics::GlyphMetricsProvider;
use crate::placement::PlacementEngine;
use crate::symbol::bucket::{BucketOptions, SymbolBucket};
use crate::symbol::feature::SymbolFeature;
use crate::symbol::glyphs::{GlyphMap, GlyphPositions, ImagePositions};
use crate::symbol::layout::{LayoutResources, perform_symbol_layout};
use crate::symbol::script::verticalize_punctuation;
use crate::symbol::style::{SymbolLayout, SymbolPaint};
use crate::tile::{EXTENT, OverscaledTileId};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(default)]
    pub camera: Transform,
    #[serde(default)]
    pub images: ImagePositions,
    pub layers: Vec<SceneLayer>,
    pub tiles: Vec<SceneTile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneLayer {
    pub id: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub layout: SymbolLayout,
    #[serde(default)]
    pub paint: SymbolPaint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneTile {
    pub z: u8,
    pub x: u32,
    pub y: u32,
    #[serde(default)]
    pub overscaled_z: Option<u8>,
    #[serde(default)]
    pub wrap: i32,
    /// Features per layer id.
    #[serde(default)]
    pub features: BTreeMap<String, Vec<SymbolFeature>>,
}

impl SceneTile {
    pub fn tile_id(&self) -> OverscaledTileId {
        OverscaledTileId::new(self.overscaled_z.unwrap_or(self.z), self.wrap, self.z, self.x, self.y)
    }
}

pub fn parse_scene(input: &str) -> Result<Scene> {
    let scene: Scene = serde_json::from_str(input)?;
    for tile in &scene.tiles {
        for layer_id in tile.features.keys() {
            if !scene.layers.iter().any(|layer| &layer.id == layer_id) {
                return Err(anyhow::anyhow!(
                    "tile {}/{}/{} references unknown layer '{}'",
                    tile.z,
                    tile.x,
                    tile.y,
                    layer_id
                ));
            }
        }
    }
    Ok(scene)
}

/// Laid out buckets, bottom layer first; each layer holds one bucket per tile.
pub struct PreparedScene {
    pub transform: Transform,
    pub layer_ids: Vec<String>,
    pub layers: Vec<Vec<SymbolBucket>>,
}

impl PreparedScene {
    pub fn buckets(&self) -> impl Iterator<Item = &SymbolBucket> {
        self.layers.iter().flatten()
    }
}

pub fn prepare_scene(scene: &Scene, config: &Config, glyphs: &mut GlyphMetricsProvider) -> PreparedScene {
    let show_collision_boxes = config.placement.show_collision_boxes;
    let (glyph_map, glyph_positions) = load_glyphs(scene, glyphs);
    let resources = LayoutResources {
        glyph_map: &glyph_map,
        glyph_positions: &glyph_positions,
        image_positions: &scene.images,
        bidi: None,
    };

    let coordinate_scale = EXTENT / config.layout.tile_extent;
    let mut next_bucket_instance_id = 1;
    let mut layers = Vec::with_capacity(scene.layers.len());
    for (layer_index, layer) in scene.layers.iter().enumerate() {
        let mut buckets = Vec::new();
        for tile in &scene.tiles {
            let Some(features) = tile.features.get(&layer.id) else {
                continue;
            };
            let options = BucketOptions {
                index: layer_index as u32,
                source_layer_index: 0,
                layer_id: layer.id.clone(),
                source_id: layer.source.clone(),
                tile_id: tile.tile_id(),
                pixel_ratio: 1.0,
                max_glyphs: config.layout.max_glyphs,
                merge_lines: config.layout.merge_lines,
            };
            let mut bucket = SymbolBucket::new(options, layer.layout.clone(), layer.paint.clone());
            bucket.bucket_instance_id = next_bucket_instance_id;
            next_bucket_instance_id += 1;

            let features = features
                .iter()
                .enumerate()
                .map(|(index, feature)| scaled_feature(feature, index, coordinate_scale))
                .collect();
            bucket.populate(features);
            perform_symbol_layout(&mut bucket, resources, show_collision_boxes);
            log::debug!(
                "layer '{}' tile {}/{}/{}: {} symbol instances",
                layer.id,
                tile.z,
                tile.x,
                tile.y,
                bucket.symbol_instances.len()
            );
            buckets.push(bucket);
        }
        layers.push(buckets);
    }

    let mut prepared = PreparedScene {
        transform: scene.camera.clone(),
        layer_ids: scene.layers.iter().map(|layer| layer.id.clone()).collect(),
        layers,
    };
    assign_cross_tile_ids(&mut prepared.layers);
    prepared
}

fn scaled_feature(feature: &SymbolFeature, index: usize, scale: f64) -> SymbolFeature {
    let mut feature = feature.clone();
    if feature.index == 0 {
        feature.index = index as u32;
    }
    if scale != 1.0 {
        for ring in &mut feature.geometry {
            for point in ring.iter_mut() {
                *point = Point::new(point.x * scale, point.y * scale);
            }
        }
    }
    feature
}

fn load_glyphs(scene: &Scene, glyphs: &mut GlyphMetricsProvider) -> (GlyphMap, GlyphPositions) {
    let mut texts: HashMap<String, Vec<String>> = HashMap::new();
    for layer in &scene.layers {
        let default_stack = layer.layout.text_font.join(",");
        let vertical = layer.layout.allows_vertical_writing();
        for tile in &scene.tiles {
            let Some(features) = tile.features.get(&layer.id) else {
                continue;
            };
            for section in features
                .iter()
                .filter_map(|feature| feature.text.as_ref())
                .flat_map(|text| &text.sections)
            {
                let stack = section.font_stack.clone().unwrap_or_else(|| default_stack.clone());
                let text = layer.layout.text_transform.apply(&section.text);
                let entry = texts.entry(stack).or_default();
                if vertical {
                    entry.push(verticalize_punctuation(&text));
                }
                entry.push(text);
            }
        }
    }

    let mut glyph_map = GlyphMap::new();
    let mut glyph_positions = GlyphPositions::new();
    for (stack, stack_texts) in &texts {
        glyphs.load_into(
            stack,
            stack_texts.iter().map(String::as_str),
            &mut glyph_map,
            &mut glyph_positions,
        );
    }
    (glyph_map, glyph_positions)
}

/// Gives every symbol instance an id shared by all copies of the same label: same
/// layer, same text (or icon) and the same anchor in world coordinates.
pub fn assign_cross_tile_ids(layers: &mut [Vec<SymbolBucket>]) {
    let mut ids: HashMap<(String, String, i64, i64), u32> = HashMap::new();
    let mut next_id = 1;
    for bucket in layers.iter_mut().flatten() {
        let tile_id = bucket.tile_id;
        let scale = 2f64.powi(i32::from(tile_id.canonical.z));
        for i in 0..bucket.symbol_instances.len() {
            let instance = &bucket.symbol_instances[i];
            let world_x = (tile_id.unwrapped_x() + instance.anchor.x / EXTENT) / scale;
            let world_y = (f64::from(tile_id.canonical.y) + instance.anchor.y / EXTENT) / scale;
            let label = if instance.key.is_empty() {
                let feature_index = instance.feature_index;
                bucket
                    .features
                    .iter()
                    .find(|feature| feature.index == feature_index)
                    .and_then(|feature| feature.icon.clone())
                    .unwrap_or_default()
            } else {
                instance.key.clone()
            };
            let key = (
                bucket.layer_id.clone(),
                label,
                (world_x * WORLD_KEY_RESOLUTION).round() as i64,
                (world_y * WORLD_KEY_RESOLUTION).round() as i64,
            );
            let id = *ids.entry(key).or_insert_with(|| {
                let id = next_id;
                next_id += 1;
                id
            });
            bucket.symbol_instances[i].cross_tile_id = id;
        }
    }
}

/// Grid the world is snapped to when matching anchors across tiles.
const WORLD_KEY_RESOLUTION: f64 = (1u64 << 24) as f64;

/// Outcome of running a prepared scene through a number of frames.
pub struct Simulation {
    pub engine: PlacementEngine,
    pub frames: usize,
    /// Time of the last committed frame.
    pub now: f64,
}

/// Places, commits and updates opacities `frames` times, `frame_interval_ms` apart.
pub fn simulate(prepared: &mut PreparedScene, config: &Config, frames: usize) -> Result<Simulation> {
    let mut engine = PlacementEngine::from_config(&config.placement);
    let frames = frames.max(1);
    let mut now = 0.0;
    for frame in 0..frames {
        now = frame as f64 * config.placement.frame_interval_ms;
        engine.place_frame(
            prepared.transform.clone(),
            &mut prepared.layers,
            config.placement.show_collision_boxes,
        )?;
        engine.commit(now)?;
        for layer in prepared.layers.iter_mut() {
            engine.update_layer_opacities(layer)?;
        }
    }
    log::info!(
        "simulated {frames} frames, transitions pending: {}",
        engine.has_transitions(now)
    );
    Ok(Simulation { engine, frames, now })
}
