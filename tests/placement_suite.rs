use map_symbol_placement::camera::MercatorProjection;
use map_symbol_placement::collision::{
    FeatureRef, LabelGeometryBuilder, OverlapMode, ShapedExtents, SpatialGrid, overlap_allowed,
};
use map_symbol_placement::config::Config;
use map_symbol_placement::dump::PlacementDump;
use map_symbol_placement::geometry::Point;
use map_symbol_placement::glyph_metrics::GlyphMetricsProvider;
use map_symbol_placement::placement::{Placement, PlacementEngine};
use map_symbol_placement::scene::{PreparedScene, parse_scene, prepare_scene, simulate};
use map_symbol_placement::symbol::style::{SymbolLayout, TextAnchor};
use map_symbol_placement::symbol::variable_anchor::{evaluate_variable_offset, get_text_variable_anchor_offset};
use map_symbol_placement::symbol::{LabelExtent, SymbolBucket, get_anchors};
use std::collections::HashSet;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn prepare_fixture(name: &str, config: &Config) -> PreparedScene {
    let path = fixtures_root().join(name);
    let input = std::fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("failed to read {}: {err}", path.display()));
    let scene = parse_scene(&input).unwrap_or_else(|err| panic!("failed to parse {name}: {err}"));
    prepare_scene(&scene, config, &mut GlyphMetricsProvider::fallback_only())
}

fn find_symbol<'a>(prepared: &'a PreparedScene, layer: &str, text: &str) -> (&'a SymbolBucket, usize) {
    let layer_index = prepared
        .layer_ids
        .iter()
        .position(|id| id == layer)
        .unwrap_or_else(|| panic!("no layer {layer}"));
    prepared.layers[layer_index]
        .iter()
        .find_map(|bucket| {
            bucket
                .symbol_instances
                .iter()
                .position(|instance| instance.key == text)
                .map(|index| (bucket, index))
        })
        .unwrap_or_else(|| panic!("no symbol '{text}' in layer {layer}"))
}

fn cross_tile_id(prepared: &PreparedScene, layer: &str, text: &str) -> u32 {
    let (bucket, index) = find_symbol(prepared, layer, text);
    bucket.symbol_instances[index].cross_tile_id
}

#[test]
fn overlap_truth_table() {
    use OverlapMode::{Always, Cooperative, Never};
    let cases = [
        (Never, Never, false),
        (Never, Cooperative, false),
        (Never, Always, false),
        (Cooperative, Never, false),
        (Cooperative, Cooperative, true),
        (Cooperative, Always, true),
        (Always, Never, true),
        (Always, Cooperative, true),
        (Always, Always, true),
    ];
    for (placing, existing, expected) in cases {
        assert_eq!(
            overlap_allowed(placing, existing),
            expected,
            "placing {placing:?} over {existing:?}"
        );
    }
}

#[test]
fn grid_query_returns_intersecting_keys() {
    let mut grid: SpatialGrid<u32> = SpatialGrid::new(100.0, 100.0, 10.0);
    grid.insert(0, 4.0, 10.0, 6.0, 30.0);
    grid.insert(1, 4.0, 10.0, 30.0, 12.0);

    let mut keys: Vec<u32> = grid
        .query(4.0, 10.0, 5.0, 11.0, None)
        .into_iter()
        .map(|hit| hit.key)
        .collect();
    keys.sort_unstable();
    assert_eq!(keys, vec![0, 1]);
    assert!(grid.query(40.0, 40.0, 100.0, 100.0, None).is_empty());
}

#[test]
fn colliding_label_from_second_bucket_is_not_inserted() {
    let config = Config::default();
    let mut prepared = prepare_fixture("stacked_layers.json", &config);
    assert_eq!(prepared.layer_ids, vec!["lower", "upper"]);

    let mut placement = Placement::new(
        prepared.transform.clone(),
        Arc::new(MercatorProjection),
        None,
        config.placement.fade_duration_ms,
        config.placement.cross_source_collisions,
    );
    let mut seen = HashSet::new();
    assert!(placement.collision_index().grid().is_empty());

    placement
        .place_layer(&mut prepared.layers[1], &mut seen, false, None)
        .expect("upper layer places");
    let after_first = placement.collision_index().grid().keys_length();
    assert!(after_first > 0, "first label must be inserted");

    placement
        .place_layer(&mut prepared.layers[0], &mut seen, false, None)
        .expect("lower layer places");
    assert_eq!(placement.collision_index().grid().keys_length(), after_first);

    let upper = cross_tile_id(&prepared, "upper", "Harbor");
    let lower = cross_tile_id(&prepared, "lower", "Harbor");
    assert_ne!(upper, lower);
    assert!(placement.placements[&upper].text);
    assert!(!placement.placements[&lower].text);
}

#[test]
fn top_variable_anchor_shifts_by_baseline() {
    assert_eq!(evaluate_variable_offset(TextAnchor::Top, [0.0, 0.0]), [0.0, -7.0]);

    let layout = SymbolLayout {
        text_variable_anchor: Some(vec![TextAnchor::Top]),
        ..SymbolLayout::default()
    };
    let offsets = get_text_variable_anchor_offset(&layout).expect("variable anchors set");
    assert_eq!(offsets.len(), 1);
    let (anchor, offset) = offsets[0];
    assert_eq!(anchor, TextAnchor::Top);
    assert_eq!((offset.x, offset.y), (0.0, -7.0));
}

fn sample_label() -> LabelExtent {
    LabelExtent {
        text_width: Some(2.0),
        icon_width: Some(1.0),
    }
}

#[test]
fn short_line_gets_single_middle_anchor() {
    let line = [Point::new(1.0, 1.0), Point::new(1.0, 3.1)];
    let anchors = get_anchors(&line, 2.0, PI, sample_label(), 0.1, 1.0, 1.0, 4096.0);
    assert_eq!(anchors.len(), 1, "{anchors:?}");
    assert_eq!((anchors[0].point.x, anchors[0].point.y), (1.0, 2.0));
}

#[test]
fn overscaled_anchors_contain_parent_anchors() {
    let line = [
        Point::new(10.0, 10.0),
        Point::new(10.0, 100.0),
        Point::new(60.0, 190.0),
    ];
    let label = LabelExtent {
        text_width: Some(8.0),
        icon_width: None,
    };
    let parent = get_anchors(&line, 40.0, PI, label, 0.5, 1.0, 1.0, 4096.0);
    let child = get_anchors(&line, 20.0, PI, label, 0.5, 0.5, 2.0, 4096.0);
    assert!(!parent.is_empty());
    for anchor in &parent {
        assert!(child.contains(anchor), "missing {anchor:?} in {child:?}");
    }
}

struct Extents([f64; 4]);

impl ShapedExtents for Extents {
    fn extents(&self) -> [f64; 4] {
        self.0
    }
}

#[test]
fn line_label_circles_have_a_floor() {
    let mut boxes = Vec::new();
    let mut builder = LabelGeometryBuilder::new(&mut boxes);
    let anchor = Point::new(0.0, 0.0);
    let feature = FeatureRef::default();

    for height in [0.5, 4.0, 9.99] {
        let geometry = builder.build(anchor, feature, &Extents([-30.0, 0.0, 30.0, height]), 1.0, [0.0; 4], true, 0.0);
        assert_eq!(geometry.circle_diameter, Some(10.0), "height {height}");
    }
    let tall = builder.build(anchor, feature, &Extents([-30.0, -12.0, 30.0, 12.0]), 1.0, [0.0; 4], true, 0.0);
    assert_eq!(tall.circle_diameter, Some(24.0));
    let flat = builder.build(anchor, feature, &Extents([-30.0, 0.0, 30.0, 0.0]), 1.0, [0.0; 4], true, 0.0);
    assert_eq!(flat.circle_diameter, None);
    assert!(boxes.is_empty());
}

#[test]
fn line_fixture_uses_collision_circles() {
    let mut config = Config::default();
    config.placement.show_collision_boxes = true;
    let mut prepared = prepare_fixture("line_label.json", &config);

    let instances: Vec<_> = prepared.buckets().flat_map(|bucket| &bucket.symbol_instances).collect();
    assert!(!instances.is_empty(), "line label produced no anchors");
    for instance in &instances {
        let diameter = instance
            .collision
            .circle_diameter()
            .unwrap_or_else(|| panic!("{} has no circle geometry", instance.key));
        assert!(diameter > 0.0, "diameter {diameter}");
    }
    let ids: Vec<u32> = instances.iter().map(|instance| instance.cross_tile_id).collect();

    let simulation = simulate(&mut prepared, &config, 3).expect("simulate");
    let placement = simulation.engine.current().expect("placed");
    for id in &ids {
        assert!(placement.placements.contains_key(id), "no decision for {id}");
    }
}

#[test]
fn collision_fixture_settles() {
    let config = Config::default();
    let mut prepared = prepare_fixture("collisions.json", &config);
    let simulation = simulate(&mut prepared, &config, 30).expect("simulate");
    let placement = simulation.engine.current().expect("placed");

    let alpha = cross_tile_id(&prepared, "poi", "Alpha");
    let beta = cross_tile_id(&prepared, "poi", "Beta");
    let gamma = cross_tile_id(&prepared, "poi", "Gamma");
    assert!(placement.placements[&alpha].text);
    assert!(!placement.placements[&beta].text);
    assert!(placement.placements[&gamma].text);
    assert_eq!(placement.opacities[&alpha].text.opacity, 1.0);
    assert_eq!(placement.opacities[&gamma].text.opacity, 1.0);
    assert!(placement.opacities.get(&beta).is_none_or(|state| state.text.opacity == 0.0));
}

#[test]
fn fade_in_is_bounded_by_the_increment() {
    let config = Config::default();
    let mut prepared = prepare_fixture("collisions.json", &config);
    let alpha = cross_tile_id(&prepared, "poi", "Alpha");
    let interval = config.placement.frame_interval_ms;
    let increment = interval / config.placement.fade_duration_ms;

    let mut engine = PlacementEngine::from_config(&config.placement);
    // An empty first frame so every label starts from no history.
    engine
        .place_frame(prepared.transform.clone(), &mut [], false)
        .expect("empty frame");
    engine.commit(0.0).expect("commit");

    let mut previous = 0.0;
    for frame in 1..30 {
        let now = frame as f64 * interval;
        engine
            .place_frame(prepared.transform.clone(), &mut prepared.layers, false)
            .expect("frame places");
        engine.commit(now).expect("commit");
        for layer in prepared.layers.iter_mut() {
            engine.update_layer_opacities(layer).expect("opacities");
        }
        let opacity = engine.current().expect("placed").opacities[&alpha].text.opacity;
        assert!((0.0..=1.0).contains(&opacity), "frame {frame}: {opacity}");
        assert!(opacity >= previous, "frame {frame}: {opacity} < {previous}");
        assert!(opacity - previous <= increment + 1e-9, "frame {frame}: step {}", opacity - previous);
        previous = opacity;
    }
    assert_eq!(previous, 1.0);
}

#[test]
fn variable_anchor_fixture_avoids_blocker() {
    let config = Config::default();
    let mut prepared = prepare_fixture("variable_anchor.json", &config);
    let simulation = simulate(&mut prepared, &config, 2).expect("simulate");
    let placement = simulation.engine.current().expect("placed");

    let blocker = cross_tile_id(&prepared, "blockers", "X");
    let museum = cross_tile_id(&prepared, "shops", "Museum");
    assert!(placement.placements[&blocker].text);
    assert!(placement.placements[&museum].text);
    assert_eq!(placement.variable_offsets[&museum].anchor, TextAnchor::Left);

    let dump = PlacementDump::new(&prepared, Some(placement), simulation.frames, simulation.now);
    let json = serde_json::to_value(&dump).expect("dump serializes");
    let shops = &json["layers"][0];
    assert_eq!(shops["id"], "shops");
    assert_eq!(shops["buckets"][0]["symbols"][0]["variableAnchor"], "left");
}

#[test]
fn every_fixture_simulates() {
    let candidates = [
        "collisions.json",
        "line_label.json",
        "stacked_layers.json",
        "variable_anchor.json",
    ];
    let mut config = Config::default();
    config.placement.show_collision_boxes = true;
    for name in candidates {
        let mut prepared = prepare_fixture(name, &config);
        let simulation = simulate(&mut prepared, &config, 5)
            .unwrap_or_else(|err| panic!("simulation failed for {name}: {err}"));
        assert_eq!(simulation.frames, 5, "{name}");
        assert!(
            prepared.buckets().all(|bucket| bucket.bucket_instance_id != 0),
            "{name} has a bucket without an instance id"
        );
        let dump = PlacementDump::new(&prepared, simulation.engine.current(), simulation.frames, simulation.now);
        assert!(
            serde_json::to_string(&dump).is_ok(),
            "dump for {name} does not serialize"
        );
    }
}
