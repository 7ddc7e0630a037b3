use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use map_symbol_placement::collision::{OverlapMode, SpatialGrid};
use map_symbol_placement::config::Config;
use map_symbol_placement::geometry::Point;
use map_symbol_placement::glyph_metrics::GlyphMetricsProvider;
use map_symbol_placement::placement::PlacementEngine;
use map_symbol_placement::scene::{parse_scene, prepare_scene};
use map_symbol_placement::symbol::shaping::ShapeOptions;
use map_symbol_placement::symbol::{
    Formatted, GlyphMap, GlyphPositions, ImagePositions, LabelExtent, TextAnchor, TextJustify,
    TextShaper, WritingMode, get_anchors,
};
use std::f64::consts::PI;
use std::hint::black_box;

fn dense_scene_source(labels: usize) -> String {
    let side = (labels as f64).sqrt().ceil().max(1.0) as usize;
    let step = 8192 / (side + 1);
    let mut features = Vec::with_capacity(labels);
    for i in 0..labels {
        let x = step * (i % side + 1);
        let y = step * (i / side + 1);
        features.push(format!(
            r#"{{ "type": "point", "geometry": [[{{ "x": {x}, "y": {y} }}]], "text": {{ "sections": [{{ "text": "Label {i}" }}] }} }}"#
        ));
    }
    format!(
        r#"{{
            "camera": {{ "width": 1024, "height": 1024, "zoom": 1 }},
            "layers": [{{ "id": "poi", "layout": {{ "text-size": 14, "text-variable-anchor": ["top", "bottom", "left", "right"] }} }}],
            "tiles": [{{ "z": 0, "x": 0, "y": 0, "features": {{ "poi": [{}] }} }}]
        }}"#,
        features.join(",")
    )
}

fn fixture(name: &str) -> &'static str {
    match name {
        "collisions" => include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/collisions.json")),
        "line_label" => include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/line_label.json")),
        "stacked_layers" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/stacked_layers.json"
        )),
        "variable_anchor" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/variable_anchor.json"
        )),
        _ => "",
    }
}

fn bench_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_hit_test");
    for boxes in [100usize, 1_000, 10_000] {
        let mut grid: SpatialGrid<u32> = SpatialGrid::new(2048.0, 2048.0, 25.0);
        let mut seed = 0x2545_f491_u64;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            (seed % 2000) as f64
        };
        for key in 0..boxes as u32 {
            let (x, y) = (next(), next());
            grid.insert(key, x, y, x + 40.0, y + 12.0);
        }
        let probes: Vec<[f64; 4]> = (0..256)
            .map(|_| {
                let (x, y) = (next(), next());
                [x, y, x + 60.0, y + 16.0]
            })
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(boxes), &probes, |b, probes| {
            b.iter(|| {
                let mut hits = 0usize;
                for &[x1, y1, x2, y2] in probes {
                    if grid.hit_test(x1, y1, x2, y2, OverlapMode::Never, None) {
                        hits += 1;
                    }
                }
                black_box(hits)
            })
        });
    }
    group.finish();
}

fn bench_anchors(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_anchors");
    for vertices in [16usize, 256, 4096] {
        let line: Vec<Point> = (0..vertices)
            .map(|i| {
                let t = i as f64 / vertices as f64;
                Point::new(100.0 + t * 7900.0, 4096.0 + (t * 40.0).sin() * 600.0)
            })
            .collect();
        let label = LabelExtent {
            text_width: Some(120.0),
            icon_width: None,
        };
        group.bench_with_input(BenchmarkId::from_parameter(vertices), &line, |b, line| {
            b.iter(|| black_box(get_anchors(black_box(line), 250.0, PI / 4.0, label, 24.0, 1.0, 1.0, 8192.0)))
        });
    }
    group.finish();
}

fn bench_shaping(c: &mut Criterion) {
    let mut group = c.benchmark_group("shape_text");
    let texts = [
        ("short", "Main St"),
        ("long", "Avenue of the Americas between Twenty-Third and Fourteenth Street"),
        ("cjk", "東京都千代田区丸の内一丁目"),
    ];
    let mut glyph_map = GlyphMap::new();
    let mut glyph_positions = GlyphPositions::new();
    GlyphMetricsProvider::fallback_only().load_into(
        "Bench Regular",
        texts.iter().map(|(_, text)| *text),
        &mut glyph_map,
        &mut glyph_positions,
    );
    let images = ImagePositions::new();
    let shaper = TextShaper::new(&glyph_map, &glyph_positions, &images);
    let options = ShapeOptions {
        default_font_stack: "Bench Regular",
        max_width: 10.0 * 24.0,
        line_height: 1.2 * 24.0,
        text_anchor: TextAnchor::Center,
        text_justify: TextJustify::Center,
        spacing: 0.0,
        translate: [0.0, 0.0],
        writing_mode: WritingMode::Horizontal,
        allow_vertical_placement: false,
        layout_text_size: 16.0,
        layout_text_size_this_zoom: 16.0,
    };
    for (name, text) in texts {
        let formatted = Formatted::from_text(text);
        group.bench_with_input(BenchmarkId::from_parameter(name), &formatted, |b, data| {
            b.iter(|| black_box(shaper.shape_text(black_box(data), &options)))
        });
    }
    group.finish();
}

fn bench_placement(c: &mut Criterion) {
    let mut group = c.benchmark_group("placement_frame");
    let config = Config::default();
    let mut inputs: Vec<(String, String)> = ["collisions", "line_label", "stacked_layers", "variable_anchor"]
        .into_iter()
        .map(|name| (name.to_string(), fixture(name).to_string()))
        .collect();
    for labels in [100usize, 1_000] {
        inputs.push((format!("dense_{labels}"), dense_scene_source(labels)));
    }

    for (name, input) in &inputs {
        let Ok(scene) = parse_scene(input) else {
            continue;
        };
        let mut prepared = prepare_scene(&scene, &config, &mut GlyphMetricsProvider::fallback_only());
        let mut engine = PlacementEngine::from_config(&config.placement);
        let mut now = 0.0;
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                now += config.placement.frame_interval_ms;
                engine
                    .place_frame(prepared.transform.clone(), &mut prepared.layers, false)
                    .and_then(|_| engine.commit(now))
                    .expect("placement frame");
                black_box(engine.current().map(|p| p.placements.len()))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_grid, bench_anchors, bench_shaping, bench_placement);
criterion_main!(benches);
