#![cfg(not(tarpaulin_include))]

use crate::chart::{ChartKind, ChartPoint};
use plotters::prelude::*;
use std::error::Error;
use std::fs::remove_file;
use uuid::Uuid;

/// Styling options for server-side chart rendering.
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title displayed at the top of the graph
    pub title: String,

    /// Label for the X-axis
    pub x_label: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the graph in pixels
    pub width: u32,

    /// Height of the graph in pixels
    pub height: u32,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            title: "Chart".to_string(),
            x_label: "X Axis".to_string(),
            y_label: "Y Axis".to_string(),
            width: 800,
            height: 600,
        }
    }
}

const PALETTE: [RGBColor; 6] = [BLUE, RED, GREEN, CYAN, MAGENTA, YELLOW];

/// Render a prepared chart series to PNG bytes.
///
/// The bitmap backend writes to a uniquely-named temp file which is read
/// back and removed; plotters has no in-memory PNG encoder.
pub fn render_chart(
    points: &[ChartPoint],
    kind: ChartKind,
    options: &GraphOptions,
) -> Result<Vec<u8>, Box<dyn Error>> {
    if points.is_empty() {
        return Err("no chart data to render".into());
    }

    let path = std::env::temp_dir().join(format!("csvhub-chart-{}.png", Uuid::new_v4()));
    let path_str = path.to_string_lossy().to_string();

    let result = match kind {
        ChartKind::Bar => draw_bar(points, options, &path_str),
        ChartKind::Line => draw_line(points, options, &path_str),
        ChartKind::Pie => draw_pie(points, options, &path_str),
    };
    result?;

    let png_data = std::fs::read(&path)?;
    remove_file(&path)?;
    Ok(png_data)
}

// Bar height: the bin count for histogram points, the series value (a
// frequency count) for category points.
fn bar_height(point: &ChartPoint) -> f64 {
    point.count.map(|c| c as f64).unwrap_or(point.value)
}

fn draw_bar(
    points: &[ChartPoint],
    options: &GraphOptions,
    path: &str,
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_y = points.iter().map(bar_height).fold(0.0_f64, f64::max);

    let mut chart = ChartBuilder::on(&root)
        .caption(&options.title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(40)
        .build_cartesian_2d(0..points.len() as i32, 0.0..max_y + 1.0)?;

    chart
        .configure_mesh()
        .x_desc(&options.x_label)
        .y_desc(&options.y_label)
        .x_labels(points.len())
        .x_label_formatter(&|x| {
            points
                .get(*x as usize)
                .map(|p| p.label.clone())
                .unwrap_or_default()
        })
        .draw()?;

    chart.draw_series(points.iter().enumerate().map(|(i, point)| {
        Rectangle::new(
            [(i as i32, 0.0), (i as i32 + 1, bar_height(point))],
            BLUE.filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

fn draw_line(
    points: &[ChartPoint],
    options: &GraphOptions,
    path: &str,
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let min_y = points.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
    let max_y = points
        .iter()
        .map(|p| p.value)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut chart = ChartBuilder::on(&root)
        .caption(&options.title, ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(0.0..points.len() as f64, min_y..max_y + 1.0)?;

    chart
        .configure_mesh()
        .x_desc(&options.x_label)
        .y_desc(&options.y_label)
        .draw()?;

    chart.draw_series(LineSeries::new(
        points.iter().enumerate().map(|(i, p)| (i as f64, p.value)),
        &BLUE,
    ))?;

    root.present()?;
    Ok(())
}

fn draw_pie(
    points: &[ChartPoint],
    options: &GraphOptions,
    path: &str,
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let title_style = TextStyle::from(("sans-serif", 30).into_font()).color(&BLACK);
    let root = root.titled(&options.title, title_style)?;

    let dims = root.dim_in_pixel();
    let center = (dims.0 as i32 / 2, dims.1 as i32 / 2);
    let radius = (dims.0.min(dims.1) as f64) * 0.35;

    let sizes: Vec<f64> = points.iter().map(|p| p.value).collect();
    let labels: Vec<&str> = points.iter().map(|p| p.label.as_str()).collect();
    let colors: Vec<RGBColor> = (0..points.len())
        .map(|i| PALETTE[i % PALETTE.len()])
        .collect();

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.label_style(("sans-serif", 16).into_font().color(&BLACK));
    root.draw(&pie)?;

    root.present()?;
    Ok(())
}
