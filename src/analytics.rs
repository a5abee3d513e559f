use ndarray::Array1;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::model::{LinearModel, MAX_HOURS, MIN_HOURS};

pub const TREND_SAMPLES: usize = 50;

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct TrendPoint {
    pub hours: f64,
    pub cgpa: f64,
}

#[derive(Serialize, Clone, Debug)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub hours: Vec<f64>,
    pub cgpa: Vec<f64>,
}

#[derive(Serialize, Clone, Debug)]
pub struct Metric {
    pub label: &'static str,
    pub value: &'static str,
}

/// Model output sampled at 50 evenly spaced points over `[0, 24]`.
///
/// Values are the raw model output; unlike the headline prediction they
/// are not clamped to `[0, 10]`.
pub fn trend(model: &LinearModel) -> Vec<TrendPoint> {
    let hours = Array1::linspace(MIN_HOURS, MAX_HOURS, TREND_SAMPLES);
    let cgpa = model.predict_many(&hours);
    hours
        .iter()
        .zip(cgpa.iter())
        .map(|(&hours, &cgpa)| TrendPoint { hours, cgpa })
        .collect()
}

pub fn chart_data(points: &[TrendPoint]) -> ChartData {
    ChartData {
        labels: points.iter().map(|p| format!("{:.1}", p.hours)).collect(),
        hours: points.iter().map(|p| p.hours).collect(),
        cgpa: points.iter().map(|p| p.cgpa).collect(),
    }
}

pub fn dashboard() -> [Metric; 3] {
    [
        Metric { label: "Max CGPA", value: "10" },
        Metric { label: "Recommended Hours", value: "8+" },
        Metric { label: "Status", value: "Active" },
    ]
}

pub fn trend_csv(points: &[TrendPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["hours", "cgpa"])?;
    for p in points {
        wtr.write_record([format!("{:.4}", p.hours), format!("{:.4}", p.cgpa)])?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::Serialization(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| AppError::Serialization(e.to_string()))
}

/// Renders the trend as an SVG polyline inside a `width` x `height` box.
///
/// The y axis spans the data range, widened to include `[0, 10]`.
pub fn trend_svg(points: &[TrendPoint], width: f64, height: f64) -> String {
    const PAD: f64 = 30.0;

    let (mut lo, mut hi) = (0.0_f64, 10.0_f64);
    for p in points {
        lo = lo.min(p.cgpa);
        hi = hi.max(p.cgpa);
    }
    let span_y = (hi - lo).max(f64::EPSILON);
    let span_x = MAX_HOURS - MIN_HOURS;
    let plot_w = width - 2.0 * PAD;
    let plot_h = height - 2.0 * PAD;

    let coords: Vec<String> = points
        .iter()
        .map(|p| {
            let x = PAD + (p.hours - MIN_HOURS) / span_x * plot_w;
            let y = PAD + (hi - p.cgpa) / span_y * plot_h;
            format!("{x:.1},{y:.1}")
        })
        .collect();

    format!(
        concat!(
            r#"<svg class="trend" viewBox="0 0 {w} {h}" width="{w}" height="{h}" xmlns="http://www.w3.org/2000/svg">"#,
            r#"<line x1="{pad}" y1="{bottom}" x2="{right}" y2="{bottom}" stroke="currentColor"/>"#,
            r#"<line x1="{pad}" y1="{pad}" x2="{pad}" y2="{bottom}" stroke="currentColor"/>"#,
            r#"<text x="{mid_x}" y="{label_y}" text-anchor="middle">Study Hours</text>"#,
            r#"<text x="10" y="{mid_y}" transform="rotate(-90 10 {mid_y})" text-anchor="middle">CGPA</text>"#,
            r#"<text x="{tick_x}" y="{pad}" text-anchor="end">{hi:.1}</text>"#,
            r#"<text x="{tick_x}" y="{bottom}" text-anchor="end">{lo:.1}</text>"#,
            r##"<polyline fill="none" stroke="#007bff" stroke-width="2" points="{points}"/>"##,
            "</svg>"
        ),
        w = width,
        h = height,
        pad = PAD,
        right = width - PAD,
        bottom = height - PAD,
        mid_x = width / 2.0,
        mid_y = height / 2.0,
        label_y = height - 5.0,
        tick_x = PAD - 3.0,
        hi = hi,
        lo = lo,
        points = coords.join(" "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_spans_full_range_with_fifty_points() {
        let model = LinearModel::new(0.3, 2.0).unwrap();
        let points = trend(&model);
        assert_eq!(points.len(), TREND_SAMPLES);
        assert_eq!(points[0].hours, 0.0);
        assert!((points[TREND_SAMPLES - 1].hours - 24.0).abs() < 1e-9);
        assert!((points[0].cgpa - 2.0).abs() < 1e-9);
        let step = 24.0 / 49.0;
        assert!((points[1].hours - step).abs() < 1e-9);
    }

    #[test]
    fn trend_is_not_clamped() {
        let model = LinearModel::new(0.5, 6.0).unwrap();
        let last = *trend(&model).last().unwrap();
        assert!((last.cgpa - 18.0).abs() < 1e-9);
    }

    #[test]
    fn dashboard_metrics_are_static() {
        let metrics = dashboard();
        assert_eq!(metrics[0].label, "Max CGPA");
        assert_eq!(metrics[0].value, "10");
        assert_eq!(metrics[1].value, "8+");
        assert_eq!(metrics[2].value, "Active");
    }

    #[test]
    fn csv_has_header_and_one_row_per_point() {
        let model = LinearModel::new(0.3, 2.0).unwrap();
        let csv = trend_csv(&trend(&model)).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("hours,cgpa"));
        assert_eq!(lines.next(), Some("0.0000,2.0000"));
        assert_eq!(csv.lines().count(), TREND_SAMPLES + 1);
    }

    #[test]
    fn svg_contains_every_point() {
        let model = LinearModel::new(0.3, 2.0).unwrap();
        let points = trend(&model);
        let svg = trend_svg(&points, 480.0, 300.0);
        assert!(svg.starts_with("<svg"));
        let polyline = svg.split("points=\"").nth(1).unwrap();
        let polyline = polyline.split('"').next().unwrap();
        assert_eq!(polyline.split(' ').count(), TREND_SAMPLES);
    }

    #[test]
    fn chart_labels_match_points() {
        let model = LinearModel::new(0.3, 2.0).unwrap();
        let data = chart_data(&trend(&model));
        assert_eq!(data.labels.len(), TREND_SAMPLES);
        assert_eq!(data.labels[0], "0.0");
        assert_eq!(data.labels[TREND_SAMPLES - 1], "24.0");
    }
}
