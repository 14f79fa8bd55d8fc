//! Sketch rendering of a page content stream.
//!
//! Paths are filled and stroked in their colours, text runs become bars as
//! wide as the run, and placed XObjects (images, forms) become the box they
//! are drawn into. Fonts, clipping, shading and transparency are ignored, so
//! the result shows a page's layout rather than a faithful picture of it.

use image::{Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::Object;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const XOBJECT_FILL: Rgb<u8> = Rgb([190, 194, 200]);

/// Operations past this point are not drawn.
const MAX_OPERATIONS: usize = 200_000;

/// Average glyph advance as a fraction of the font size.
const GLYPH_ADVANCE: f32 = 0.5;
/// Height of a text bar as a fraction of the font size.
const TEXT_HEIGHT: f32 = 0.7;

/// Segments used to flatten one Bézier curve.
const CURVE_STEPS: usize = 8;

/// `[a b c d e f]`, mapping `(x, y)` to `(a·x + c·y + e, b·x + d·y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix([f32; 6]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Matrix([a, b, c, d, e, f])
    }

    fn translate(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    fn from_operands(ops: &[Object]) -> Option<Self> {
        let n = numbers(ops)?;
        (n.len() == 6).then(|| Matrix([n[0], n[1], n[2], n[3], n[4], n[5]]))
    }

    /// `self` applied first, then `next`.
    pub fn then(&self, next: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = next.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Rough length scale, for line widths.
    fn scale(&self) -> f32 {
        let [a, b, c, d, ..] = self.0;
        (a * d - b * c).abs().sqrt()
    }
}

#[derive(Clone, Copy)]
struct GraphicsState {
    ctm: Matrix,
    fill: Rgb<u8>,
    stroke: Rgb<u8>,
    line_width: f32,
}

struct TextState {
    matrix: Matrix,
    line_matrix: Matrix,
    font_size: f32,
    leading: f32,
    invisible: bool,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            font_size: 12.0,
            leading: 0.0,
            invisible: false,
        }
    }
}

type Point = (f32, f32);

struct Painter<'a> {
    img: &'a mut RgbImage,
    gs: GraphicsState,
    stack: Vec<GraphicsState>,
    text: TextState,
    /// Subpaths in device pixels.
    path: Vec<Vec<Point>>,
    /// Current point in user space, for curve flattening.
    current: Point,
}

/// Draw `content` onto `img`. `device` maps page space to pixels.
pub fn render(content: &[u8], device: Matrix, img: &mut RgbImage) -> lopdf::Result<()> {
    let ops = Content::decode(content)?.operations;
    let mut painter = Painter {
        img,
        gs: GraphicsState { ctm: device, fill: BLACK, stroke: BLACK, line_width: 1.0 },
        stack: Vec::new(),
        text: TextState::default(),
        path: Vec::new(),
        current: (0.0, 0.0),
    };
    for op in ops.iter().take(MAX_OPERATIONS) {
        painter.apply(op);
    }
    Ok(())
}

/// Page space to pixels for a `width_px` × `height_px` image of `media_box`
/// (`[llx, lly, urx, ury]`), with y pointing down.
pub fn device_matrix(media_box: [f32; 4], width_px: u32, height_px: u32) -> Matrix {
    let [llx, lly, urx, ury] = media_box;
    let sx = width_px as f32 / (urx - llx).max(f32::EPSILON);
    let sy = height_px as f32 / (ury - lly).max(f32::EPSILON);
    Matrix::new(sx, 0.0, 0.0, -sy, -llx * sx, height_px as f32 + lly * sy)
}

impl Painter<'_> {
    fn apply(&mut self, op: &Operation) {
        let args = op.operands.as_slice();
        match op.operator.as_str() {
            "q" => self.stack.push(self.gs),
            "Q" => {
                if let Some(gs) = self.stack.pop() {
                    self.gs = gs;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(args) {
                    self.gs.ctm = m.then(&self.gs.ctm);
                }
            }
            "w" => {
                if let Some(w) = number_at(args, 0) {
                    self.gs.line_width = w;
                }
            }

            "g" | "rg" | "k" | "sc" | "scn" => {
                if let Some(c) = colour(args) {
                    self.gs.fill = c;
                }
            }
            "G" | "RG" | "K" | "SC" | "SCN" => {
                if let Some(c) = colour(args) {
                    self.gs.stroke = c;
                }
            }

            "m" => {
                if let Some(p) = point_at(args, 0) {
                    self.current = p;
                    let start = self.to_device(p);
                    self.path.push(vec![start]);
                }
            }
            "l" => {
                if let Some(p) = point_at(args, 0) {
                    self.line_to(p);
                }
            }
            "c" => {
                if let (Some(c1), Some(c2), Some(end)) =
                    (point_at(args, 0), point_at(args, 2), point_at(args, 4))
                {
                    self.curve_to(c1, c2, end);
                }
            }
            "v" => {
                if let (Some(c2), Some(end)) = (point_at(args, 0), point_at(args, 2)) {
                    self.curve_to(self.current, c2, end);
                }
            }
            "y" => {
                if let (Some(c1), Some(end)) = (point_at(args, 0), point_at(args, 2)) {
                    self.curve_to(c1, end, end);
                }
            }
            "h" => self.close_subpath(),
            "re" => {
                if let Some(n) = numbers(args).filter(|n| n.len() == 4) {
                    let (x, y, w, h) = (n[0], n[1], n[2], n[3]);
                    let corners = [(x, y), (x + w, y), (x + w, y + h), (x, y + h), (x, y)];
                    let rect = corners.iter().map(|&p| self.to_device(p)).collect();
                    self.path.push(rect);
                    self.current = (x, y);
                }
            }

            "f" | "F" | "f*" => self.paint(true, false),
            "S" => self.paint(false, true),
            "s" => {
                self.close_subpath();
                self.paint(false, true);
            }
            "B" | "B*" => self.paint(true, true),
            "b" | "b*" => {
                self.close_subpath();
                self.paint(true, true);
            }
            "n" => self.path.clear(),

            "BT" => {
                self.text.matrix = Matrix::IDENTITY;
                self.text.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(size) = number_at(args, 1) {
                    self.text.font_size = size;
                }
            }
            "TL" => {
                if let Some(l) = number_at(args, 0) {
                    self.text.leading = l;
                }
            }
            "Tr" => self.text.invisible = number_at(args, 0) == Some(3.0),
            "Td" => {
                if let Some((tx, ty)) = point_at(args, 0) {
                    self.next_line(tx, ty);
                }
            }
            "TD" => {
                if let Some((tx, ty)) = point_at(args, 0) {
                    self.text.leading = -ty;
                    self.next_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(args) {
                    self.text.matrix = m;
                    self.text.line_matrix = m;
                }
            }
            "T*" => self.next_line(0.0, -self.text.leading),
            "Tj" => self.show(args),
            "'" => {
                self.next_line(0.0, -self.text.leading);
                self.show(args);
            }
            "\"" => {
                self.next_line(0.0, -self.text.leading);
                self.show(args.get(2..).unwrap_or(&[]));
            }
            "TJ" => {
                if let Some(Object::Array(items)) = args.first() {
                    self.show(items);
                }
            }

            "Do" => {
                let unit = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
                let quad: Vec<Point> = unit.iter().map(|&p| self.to_device(p)).collect();
                fill_polygon(self.img, &[quad], XOBJECT_FILL);
            }
            _ => {}
        }
    }

    fn to_device(&self, (x, y): Point) -> Point {
        self.gs.ctm.apply(x, y)
    }

    fn line_to(&mut self, p: Point) {
        self.current = p;
        let d = self.to_device(p);
        match self.path.last_mut() {
            Some(sub) => sub.push(d),
            None => self.path.push(vec![d]),
        }
    }

    fn curve_to(&mut self, c1: Point, c2: Point, end: Point) {
        let start = self.current;
        for i in 1..=CURVE_STEPS {
            let t = i as f32 / CURVE_STEPS as f32;
            let u = 1.0 - t;
            let x = u * u * u * start.0 + 3.0 * u * u * t * c1.0 + 3.0 * u * t * t * c2.0 + t * t * t * end.0;
            let y = u * u * u * start.1 + 3.0 * u * u * t * c1.1 + 3.0 * u * t * t * c2.1 + t * t * t * end.1;
            self.line_to((x, y));
        }
        self.current = end;
    }

    fn close_subpath(&mut self) {
        if let Some(sub) = self.path.last_mut() {
            if let Some(&first) = sub.first() {
                sub.push(first);
            }
        }
    }

    fn paint(&mut self, fill: bool, stroke: bool) {
        let path = std::mem::take(&mut self.path);
        if fill {
            fill_polygon(self.img, &path, self.gs.fill);
        }
        if stroke {
            let width = (self.gs.line_width * self.gs.ctm.scale()).max(1.0);
            for sub in &path {
                for seg in sub.windows(2) {
                    stroke_line(self.img, seg[0], seg[1], width, self.gs.stroke);
                }
            }
        }
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.text.line_matrix = Matrix::translate(tx, ty).then(&self.text.line_matrix);
        self.text.matrix = self.text.line_matrix;
    }

    /// Draw a run of strings (and `TJ` spacing adjustments) as one bar per
    /// string, advancing the text matrix past each.
    fn show(&mut self, items: &[Object]) {
        let size = self.text.font_size;
        for item in items {
            let advance = match item {
                Object::String(bytes, _) => {
                    let width = bytes.len() as f32 * GLYPH_ADVANCE * size;
                    if !self.text.invisible && width > 0.0 {
                        self.text_bar(width, size);
                    }
                    width
                }
                Object::Integer(_) | Object::Real(_) => {
                    -item.as_float().unwrap_or(0.0) / 1000.0 * size
                }
                _ => 0.0,
            };
            self.text.matrix = Matrix::translate(advance, 0.0).then(&self.text.matrix);
        }
    }

    fn text_bar(&mut self, width: f32, size: f32) {
        let to_device = self.text.matrix.then(&self.gs.ctm);
        let h = size * TEXT_HEIGHT;
        let quad: Vec<Point> = [(0.0, 0.0), (width, 0.0), (width, h), (0.0, h)]
            .iter()
            .map(|&(x, y)| to_device.apply(x, y))
            .collect();
        fill_polygon(self.img, &[quad], self.gs.fill);
    }
}

fn numbers(ops: &[Object]) -> Option<Vec<f32>> {
    ops.iter().map(|o| o.as_float().ok()).collect()
}

fn number_at(ops: &[Object], i: usize) -> Option<f32> {
    ops.get(i).and_then(|o| o.as_float().ok())
}

fn point_at(ops: &[Object], i: usize) -> Option<Point> {
    Some((number_at(ops, i)?, number_at(ops, i + 1)?))
}

/// Gray, RGB or CMYK by operand count. Pattern names are skipped.
fn colour(ops: &[Object]) -> Option<Rgb<u8>> {
    let n: Vec<f32> = ops.iter().filter_map(|o| o.as_float().ok()).collect();
    let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    match n.as_slice() {
        [g] => Some(Rgb([byte(*g); 3])),
        [r, g, b] => Some(Rgb([byte(*r), byte(*g), byte(*b)])),
        [c, m, y, k] => {
            let ink = |v: f32| byte((1.0 - v) * (1.0 - k));
            Some(Rgb([ink(*c), ink(*m), ink(*y)]))
        }
        _ => None,
    }
}

/// Even-odd scanline fill over every subpath, sampled at pixel centres.
fn fill_polygon(img: &mut RgbImage, subpaths: &[Vec<Point>], colour: Rgb<u8>) {
    let edges: Vec<(Point, Point)> = subpaths
        .iter()
        .filter(|s| s.len() > 2)
        .flat_map(|s| {
            let closing = (s[s.len() - 1], s[0]);
            s.windows(2).map(|w| (w[0], w[1])).chain(std::iter::once(closing))
        })
        .filter(|(a, b)| a.1 != b.1)
        .collect();
    if edges.is_empty() {
        return;
    }

    let (w, h) = (img.width() as i64, img.height() as i64);
    let min_y = edges.iter().map(|(a, b)| a.1.min(b.1)).fold(f32::INFINITY, f32::min);
    let max_y = edges.iter().map(|(a, b)| a.1.max(b.1)).fold(f32::NEG_INFINITY, f32::max);
    let y0 = (min_y.floor() as i64).clamp(0, h);
    let y1 = (max_y.ceil() as i64).clamp(0, h);

    let mut crossings = Vec::new();
    for y in y0..y1 {
        let sy = y as f32 + 0.5;
        crossings.clear();
        for &((ax, ay), (bx, by)) in &edges {
            if (ay <= sy) != (by <= sy) {
                crossings.push(ax + (sy - ay) / (by - ay) * (bx - ax));
            }
        }
        crossings.sort_by(f32::total_cmp);
        for pair in crossings.chunks_exact(2) {
            let x0 = ((pair[0] - 0.5).ceil() as i64).clamp(0, w);
            let x1 = ((pair[1] - 0.5).floor() as i64 + 1).clamp(0, w);
            for x in x0..x1 {
                img.put_pixel(x as u32, y as u32, colour);
            }
        }
    }
}

fn stroke_line(img: &mut RgbImage, a: Point, b: Point, width: f32, colour: Rgb<u8>) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let steps = (dx.abs().max(dy.abs()) * 2.0).ceil().max(1.0) as usize;
    let half = (width / 2.0).max(0.5);
    let (w, h) = (img.width() as i64, img.height() as i64);
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let (cx, cy) = (a.0 + dx * t, a.1 + dy * t);
        let xs = ((cx - half).floor() as i64).max(0)..((cx + half).ceil() as i64).min(w);
        for y in ((cy - half).floor() as i64).max(0)..((cy + half).ceil() as i64).min(h) {
            for x in xs.clone() {
                img.put_pixel(x as u32, y as u32, colour);
            }
        }
    }
}

/// A white page of `width` × `height` pixels.
pub fn blank_page(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, WHITE)
}
