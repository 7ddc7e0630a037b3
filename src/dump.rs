use crate::geometry::Point;
use crate::placement::{JointPlacement, OpacityState, Placement};
use crate::scene::PreparedScene;
use crate::symbol::bucket::{CollisionDebugBox, DebugCircle, SymbolBucket};
use crate::symbol::shaping::WritingMode;
use crate::symbol::style::TextAnchor;
use crate::tile::OverscaledTileId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementDump {
    pub frames: usize,
    pub time: f64,
    pub layers: Vec<LayerDump>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<BTreeMap<u32, Vec<u32>>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDump {
    pub id: String,
    pub buckets: Vec<BucketDump>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketDump {
    pub bucket_instance_id: u32,
    pub tile: OverscaledTileId,
    pub symbols: Vec<SymbolDump>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collision_boxes: Vec<CollisionDebugBox>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub collision_circles: Vec<DebugCircle>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolDump {
    pub symbol_index: usize,
    pub feature_index: u32,
    pub cross_tile_id: u32,
    pub text: String,
    pub anchor: Point,
    pub placement: Option<JointPlacement>,
    pub text_opacity: Option<OpacityState>,
    pub icon_opacity: Option<OpacityState>,
    pub variable_anchor: Option<TextAnchor>,
    pub orientation: Option<WritingMode>,
}

impl PlacementDump {
    pub fn new(scene: &PreparedScene, placement: Option<&Placement>, frames: usize, time: f64) -> Self {
        let layers = scene
            .layer_ids
            .iter()
            .zip(&scene.layers)
            .map(|(id, buckets)| LayerDump {
                id: id.clone(),
                buckets: buckets.iter().map(|bucket| bucket_dump(bucket, placement)).collect(),
            })
            .collect();
        Self {
            frames,
            time,
            layers,
            query: None,
        }
    }
}

fn bucket_dump(bucket: &SymbolBucket, placement: Option<&Placement>) -> BucketDump {
    let symbols = bucket
        .symbol_instances
        .iter()
        .enumerate()
        .map(|(symbol_index, instance)| {
            let id = instance.cross_tile_id;
            let opacity = placement.and_then(|p| p.opacities.get(&id));
            SymbolDump {
                symbol_index,
                feature_index: instance.feature_index,
                cross_tile_id: id,
                text: instance.key.clone(),
                anchor: instance.anchor,
                placement: placement.and_then(|p| p.placements.get(&id)).copied(),
                text_opacity: opacity.map(|o| o.text),
                icon_opacity: opacity.map(|o| o.icon),
                variable_anchor: placement
                    .and_then(|p| p.variable_offsets.get(&id))
                    .map(|offset| offset.anchor),
                orientation: placement.and_then(|p| p.placed_orientations.get(&id)).copied(),
            }
        })
        .collect();

    BucketDump {
        bucket_instance_id: bucket.bucket_instance_id,
        tile: bucket.tile_id,
        symbols,
        collision_boxes: bucket
            .collision_debug
            .as_ref()
            .map(|debug| debug.boxes.clone())
            .unwrap_or_default(),
        collision_circles: bucket.collision_circles.clone(),
    }
}

/// Writes the dump as pretty JSON to `path`, or to stdout without one.
pub fn write_placement_dump(path: Option<&Path>, dump: &PlacementDump) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, dump)?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            serde_json::to_writer_pretty(&mut writer, dump)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}
