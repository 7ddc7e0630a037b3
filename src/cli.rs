use crate::config::load_config;
use crate::debug_render::{render_collision_svg, write_output_png, write_output_svg};
use crate::dump::{PlacementDump, write_placement_dump};
use crate::geometry::Point;
use crate::glyph_metrics::GlyphMetricsProvider;
use crate::scene::{parse_scene, prepare_scene, simulate};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "symplace", version, about = "Map symbol placement: lays out a scene's labels, resolves collisions and fades over frames")]
pub struct Args {
    /// Scene file (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for JSON and SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Config file (JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Number of placement frames to simulate
    #[arg(long = "frames", default_value_t = 1)]
    pub frames: usize,

    /// Viewport rectangle to query for rendered symbols: x1,y1,x2,y2
    #[arg(long = "query", value_parser = parse_query)]
    pub query: Option<[f64; 4]>,

    /// Record and draw collision boxes and circles
    #[arg(long = "showCollisionBoxes")]
    pub show_collision_boxes: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    // The debug view needs the boxes recorded during placement.
    if args.show_collision_boxes || args.output_format != OutputFormat::Json {
        config.placement.show_collision_boxes = true;
    }

    let input = read_input(args.input.as_deref())?;
    let scene = parse_scene(&input)?;
    config.render.width = scene.camera.width as f32;
    config.render.height = scene.camera.height as f32;

    let mut glyphs = GlyphMetricsProvider::system();
    let mut prepared = prepare_scene(&scene, &config, &mut glyphs);
    let simulation = simulate(&mut prepared, &config, args.frames)?;

    match args.output_format {
        OutputFormat::Json => {
            let mut dump = PlacementDump::new(
                &prepared,
                simulation.engine.current(),
                simulation.frames,
                simulation.now,
            );
            if let Some([x1, y1, x2, y2]) = args.query {
                let polygon = [
                    Point::new(x1, y1),
                    Point::new(x2, y1),
                    Point::new(x2, y2),
                    Point::new(x1, y2),
                ];
                dump.query = Some(simulation.engine.query_rendered_symbols(&polygon));
            }
            write_placement_dump(args.output.as_deref(), &dump)?;
        }
        OutputFormat::Svg => {
            let svg = render_collision_svg(&prepared, &config.render);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            let svg = render_collision_svg(&prepared, &config.render);
            write_output_png(&svg, &output, &config.render)?;
        }
    }
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

fn parse_query(value: &str) -> std::result::Result<[f64; 4], String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|err| format!("invalid query '{value}': {err}"))?;
    match parts.as_slice() {
        &[x1, y1, x2, y2] => Ok([x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)]),
        _ => Err(format!("query needs four numbers x1,y1,x2,y2, got '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_rectangles() {
        assert_eq!(parse_query("10,20,0,5"), Ok([0.0, 5.0, 10.0, 20.0]));
        assert_eq!(parse_query(" 1, 2 ,3,4"), Ok([1.0, 2.0, 3.0, 4.0]));
        assert!(parse_query("1,2,3").is_err());
        assert!(parse_query("a,b,c,d").is_err());
    }

    #[test]
    fn args_parse_with_defaults() {
        let args = Args::try_parse_from(["symplace", "-i", "scene.json", "--frames", "10", "--query", "0,0,100,100"])
            .expect("arguments parse");
        assert_eq!(args.output_format, OutputFormat::Json);
        assert_eq!(args.frames, 10);
        assert_eq!(args.query, Some([0.0, 0.0, 100.0, 100.0]));

        let args = Args::try_parse_from(["symplace", "-e", "svg"]).expect("arguments parse");
        assert_eq!(args.output_format, OutputFormat::Svg);
        assert!(args.input.is_none());
    }
}
