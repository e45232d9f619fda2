// ------------------------------------------------------------
// 3D scatter rasterizer
// ------------------------------------------------------------
//
// Points live in a unit cube (a*, b*, L* each scaled to [-1, 1]) that is
// rotated by the azimuth around the vertical axis, tilted by the elevation
// and projected orthographically. Markers are painted far to near, then the
// axis labels and the title are drawn on top.

use ab_glyph::{FontRef, InvalidFont, PxScale};
use image::{DynamicImage, Rgba, RgbImage, RgbaImage};
use imageproc::drawing::{
    Blend, draw_filled_circle_mut, draw_line_segment_mut, draw_text_mut, text_size,
};

/// DejaVu Sans, see `assets/fonts/LICENSE-DejaVu.txt`
static FONT_DATA: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const EDGE: Rgba<u8> = Rgba([150, 150, 150, 255]);
const GRID: Rgba<u8> = Rgba([225, 225, 225, 255]);
const TEXT: Rgba<u8> = Rgba([30, 30, 30, 255]);
const GRID_DIVISIONS: usize = 4;

/// Axis names in (x, y, vertical) order
pub const AXIS_LABELS: [&str; 3] = ["a*", "b*", "L*"];

/// One marker, already in display colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterPoint {
    pub a: f64,
    pub b: f64,
    pub l: f64,
    pub rgb: [u8; 3],
}

/// Canvas geometry and marker appearance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    pub width: u32,
    pub height: u32,
    pub marker_size: u32,
    pub alpha: f32,
    pub azimuth: f32,
    pub elevation: f32,
}

impl RenderStyle {
    fn title_scale(&self) -> PxScale {
        PxScale::from((self.height.min(self.width) as f32 / 28.0).max(12.0))
    }

    fn label_scale(&self) -> PxScale {
        PxScale::from((self.height.min(self.width) as f32 / 40.0).max(10.0))
    }
}

/// Axis range with padding; never zero width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    pub fn covering(values: impl Iterator<Item = f64>) -> Self {
        let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if !lo.is_finite() || !hi.is_finite() {
            return Self { min: -1.0, max: 1.0 };
        }
        let pad = ((hi - lo) * 0.1).max(1.0);
        Self {
            min: lo - pad,
            max: hi + pad,
        }
    }

    /// Map into [-1, 1]
    fn unit(&self, v: f64) -> f64 {
        2.0 * (v - self.min) / (self.max - self.min) - 1.0
    }
}

struct Projection {
    cos_az: f64,
    sin_az: f64,
    cos_el: f64,
    sin_el: f64,
    cx: f64,
    cy: f64,
    scale: f64,
}

impl Projection {
    fn new(style: &RenderStyle) -> Self {
        let az = (style.azimuth as f64).to_radians();
        let el = (style.elevation as f64).to_radians();
        Self {
            cos_az: az.cos(),
            sin_az: az.sin(),
            cos_el: el.cos(),
            sin_el: el.sin(),
            cx: style.width as f64 / 2.0,
            // leave room for the title
            cy: style.height as f64 * 0.53,
            scale: 0.27 * style.width.min(style.height) as f64,
        }
    }

    /// Unit-cube point (x = a*, y = b*, z = L*) to (pixel x, pixel y, depth).
    /// Larger depth is farther from the viewer.
    fn project(&self, [x, y, z]: [f64; 3]) -> (f64, f64, f64) {
        let xr = x * self.cos_az - y * self.sin_az;
        let yr = x * self.sin_az + y * self.cos_az;
        let sy = z * self.cos_el - yr * self.sin_el;
        let depth = yr * self.cos_el + z * self.sin_el;
        (self.cx + xr * self.scale, self.cy - sy * self.scale, depth)
    }

    fn project_2d(&self, point: [f64; 3]) -> (f32, f32) {
        let (x, y, _) = self.project(point);
        (x as f32, y as f32)
    }
}

/// Render the scatter onto a fresh canvas.
///
/// Fails only if the bundled font cannot be parsed.
pub fn render_scatter(
    points: &[ScatterPoint],
    ranges: [AxisRange; 3],
    style: &RenderStyle,
    title: &str,
) -> Result<RgbImage, InvalidFont> {
    let font = FontRef::try_from_slice(FONT_DATA)?;
    let mut canvas = Blend(RgbaImage::from_pixel(style.width, style.height, BACKGROUND));
    let projection = Projection::new(style);

    draw_floor_grid(&mut canvas, &projection);
    draw_cube(&mut canvas, &projection);
    draw_axis_labels(&mut canvas, &projection, &ranges, &font, style.label_scale());

    let [a_range, b_range, l_range] = ranges;
    let mut projected: Vec<(f64, f64, f64, [u8; 3])> = points
        .iter()
        .map(|p| {
            let (px, py, depth) = projection.project([
                a_range.unit(p.a),
                b_range.unit(p.b),
                l_range.unit(p.l),
            ]);
            (px, py, depth, p.rgb)
        })
        .collect();
    projected.sort_by(|a, b| b.2.total_cmp(&a.2));

    let alpha = (style.alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    for (px, py, _, [r, g, b]) in projected {
        draw_filled_circle_mut(
            &mut canvas,
            (px.round() as i32, py.round() as i32),
            style.marker_size as i32,
            Rgba([r, g, b, alpha]),
        );
    }

    let scale = style.title_scale();
    let (title_width, _) = text_size(scale, &font, title);
    let x = (style.width as i32 - title_width as i32) / 2;
    let y = (style.height as f32 * 0.02) as i32;
    draw_text_mut(&mut canvas, TEXT, x.max(0), y, scale, &font, title);

    Ok(DynamicImage::ImageRgba8(canvas.0).to_rgb8())
}

fn draw_floor_grid(canvas: &mut Blend<RgbaImage>, projection: &Projection) {
    for i in 0..=GRID_DIVISIONS {
        let t = -1.0 + 2.0 * i as f64 / GRID_DIVISIONS as f64;
        draw_segment(canvas, projection, [t, -1.0, -1.0], [t, 1.0, -1.0], GRID);
        draw_segment(canvas, projection, [-1.0, t, -1.0], [1.0, t, -1.0], GRID);
    }
}

fn draw_cube(canvas: &mut Blend<RgbaImage>, projection: &Projection) {
    let corners: Vec<[f64; 3]> = (0..8)
        .map(|i| {
            let s = |bit: usize| if i & (1 << bit) != 0 { 1.0 } else { -1.0 };
            [s(0), s(1), s(2)]
        })
        .collect();
    for i in 0..8usize {
        for bit in 0..3 {
            let j = i | (1 << bit);
            if j != i {
                draw_segment(canvas, projection, corners[i], corners[j], EDGE);
            }
        }
    }
}

fn draw_segment(
    canvas: &mut Blend<RgbaImage>,
    projection: &Projection,
    from: [f64; 3],
    to: [f64; 3],
    color: Rgba<u8>,
) {
    draw_line_segment_mut(
        canvas,
        projection.project_2d(from),
        projection.project_2d(to),
        color,
    );
}

/// Axis names at the middle of their cube edges, range ends at the corners
fn draw_axis_labels(
    canvas: &mut Blend<RgbaImage>,
    projection: &Projection,
    ranges: &[AxisRange; 3],
    font: &FontRef,
    scale: PxScale,
) {
    const OUT: f64 = 1.22;
    let [a_name, b_name, l_name] = AXIS_LABELS;
    let [a, b, l] = ranges;

    let anchored = [
        (a_name.to_string(), [0.0, -OUT, -1.0]),
        (b_name.to_string(), [OUT, 0.0, -1.0]),
        (l_name.to_string(), [-OUT, -OUT, 0.0]),
        (format!("{:.0}", a.min), [-1.0, -OUT, -1.0]),
        (format!("{:.0}", a.max), [1.0, -OUT, -1.0]),
        (format!("{:.0}", b.min), [OUT, -1.0, -1.0]),
        (format!("{:.0}", b.max), [OUT, 1.0, -1.0]),
        (format!("{:.0}", l.min), [-OUT, -OUT, -1.0]),
        (format!("{:.0}", l.max), [-OUT, -OUT, 1.0]),
    ];
    for (text, at) in &anchored {
        let (x, y) = projection.project_2d(*at);
        let (w, h) = text_size(scale, font, text);
        draw_text_mut(
            canvas,
            TEXT,
            x as i32 - w as i32 / 2,
            y as i32 - h as i32 / 2,
            scale,
            font,
            text,
        );
    }
}
