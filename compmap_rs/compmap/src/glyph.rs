//! Drawing backend wrapper that keeps text visible without system fonts.
//!
//! plotters built without a font feature lays text out but panics when asked
//! to rasterize it. Whether the font path works is checked once per process
//! with the panic hook silenced; without it every string is drawn with a
//! built-in 5×7 bitmap font. A later font panic or error still falls back.

use std::panic;
use std::sync::OnceLock;

use plotters::prelude::{BitMapBackend, BLACK};
use plotters::style::{FontDesc, FontFamily, FontStyle};
use plotters_backend::{
    text_anchor, BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingBackend,
    DrawingErrorKind,
};
use tracing::debug;

const GLYPH_HEIGHT: usize = 7;
const SPACE_WIDTH: u32 = 3;

pub(crate) struct FontSafeBackend<DB> {
    inner: DB,
    use_glyphs: bool,
}

impl<DB> FontSafeBackend<DB> {
    pub(crate) fn new(inner: DB) -> Self {
        Self {
            inner,
            use_glyphs: !font_rasterizes(),
        }
    }
}

/// True when the plotters font backend can draw text in this build.
pub(crate) fn font_rasterizes() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        let mut buffer = vec![255u8; 16 * 16 * 3];
        let previous = panic::take_hook();
        panic::set_hook(Box::new(|_| {}));
        let attempt = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            let mut backend = BitMapBackend::with_buffer(&mut buffer, (16, 16));
            let style = FontDesc::new(FontFamily::SansSerif, 12.0, FontStyle::Normal).color(&BLACK);
            backend.draw_text("0", &style, (0, 0)).is_ok()
        }));
        panic::set_hook(previous);

        let available = matches!(attempt, Ok(true));
        if !available {
            debug!("Font backend cannot rasterize; using bitmap glyphs");
        }
        available
    })
}

/// Width in pixels `text` will occupy when drawn through [`FontSafeBackend`].
pub(crate) fn text_width<TStyle: BackendTextStyle>(text: &str, style: &TStyle) -> u32 {
    if font_rasterizes() {
        if let Ok(((min_x, _), (max_x, _))) = style.layout_box(text) {
            return (max_x - min_x).max(0) as u32;
        }
    }
    measure(text, glyph_scale(style))
}

impl<DB: DrawingBackend> DrawingBackend for FontSafeBackend<DB> {
    type ErrorType = DB::ErrorType;

    fn get_size(&self) -> (u32, u32) {
        self.inner.get_size()
    }

    fn ensure_prepared(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.ensure_prepared()
    }

    fn present(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.present()
    }

    fn draw_pixel(
        &mut self,
        point: BackendCoord,
        color: BackendColor,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        self.inner.draw_pixel(point, color)
    }

    fn draw_line<S: BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        self.inner.draw_line(from, to, style)
    }

    fn draw_rect<S: BackendStyle>(
        &mut self,
        upper_left: BackendCoord,
        bottom_right: BackendCoord,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        self.inner.draw_rect(upper_left, bottom_right, style, fill)
    }

    fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        self.inner.draw_path(path, style)
    }

    fn draw_circle<S: BackendStyle>(
        &mut self,
        center: BackendCoord,
        radius: u32,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_circle(center, radius, style, fill)
    }

    fn fill_polygon<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        vert: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.fill_polygon(vert, style)
    }

    fn blit_bitmap(
        &mut self,
        pos: BackendCoord,
        (iw, ih): (u32, u32),
        src: &[u8],
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.blit_bitmap(pos, (iw, ih), src)
    }

    fn draw_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        if !self.use_glyphs {
            let attempt = panic::catch_unwind(panic::AssertUnwindSafe(|| {
                self.inner.draw_text(text, style, pos)
            }));
            match attempt {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(DrawingErrorKind::FontError(err))) => {
                    debug!("Font backend error ({}); using bitmap glyphs", err);
                }
                Ok(Err(other)) => return Err(other),
                Err(_) => debug!("Font backend cannot rasterize; using bitmap glyphs"),
            }
            self.use_glyphs = true;
        }
        self.draw_glyph_text(text, style, pos)
    }

    fn estimate_text_size<TStyle: BackendTextStyle>(
        &self,
        text: &str,
        style: &TStyle,
    ) -> Result<(u32, u32), DrawingErrorKind<Self::ErrorType>> {
        if !self.use_glyphs {
            if let Ok(size) = self.inner.estimate_text_size(text, style) {
                return Ok(size);
            }
        }
        let scale = glyph_scale(style);
        Ok((measure(text, scale), GLYPH_HEIGHT as u32 * scale))
    }
}

impl<DB: DrawingBackend> FontSafeBackend<DB> {
    fn draw_glyph_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        let color = style.color();
        if color.alpha == 0.0 || text.trim().is_empty() {
            return Ok(());
        }

        let scale = glyph_scale(style);
        let width = measure(text, scale) as i32;
        let height = (GLYPH_HEIGHT as u32 * scale) as i32;
        let dx = match style.anchor().h_pos {
            text_anchor::HPos::Left => 0,
            text_anchor::HPos::Right => -width,
            text_anchor::HPos::Center => -width / 2,
        };
        let dy = match style.anchor().v_pos {
            text_anchor::VPos::Top => 0,
            text_anchor::VPos::Center => -height / 2,
            text_anchor::VPos::Bottom => -height,
        };

        let scale = scale as i32;
        let mut cursor_x = pos.0 + dx;
        let top = pos.1 + dy;
        for ch in text.chars() {
            match glyph(ch) {
                Some((glyph_width, rows)) => {
                    for (row, pattern) in rows.iter().enumerate() {
                        for col in 0..glyph_width {
                            if (*pattern >> (glyph_width - 1 - col)) & 1 != 0 {
                                self.fill_block(
                                    cursor_x + col as i32 * scale,
                                    top + row as i32 * scale,
                                    scale,
                                    color.clone(),
                                )?;
                            }
                        }
                    }
                    cursor_x += scale * (glyph_width as i32 + 1);
                }
                None => cursor_x += scale * SPACE_WIDTH as i32,
            }
        }
        Ok(())
    }

    fn fill_block(
        &mut self,
        x: i32,
        y: i32,
        scale: i32,
        color: BackendColor,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        for dx in 0..scale {
            for dy in 0..scale {
                self.inner.draw_pixel((x + dx, y + dy), color.clone())?;
            }
        }
        Ok(())
    }
}

/// Integer upscale for the 7-pixel font, derived from the requested size.
fn glyph_scale<TStyle: BackendTextStyle>(style: &TStyle) -> u32 {
    let height = match style.layout_box("0") {
        Ok(((_, min_y), (_, max_y))) => (max_y - min_y).max(1) as f64,
        Err(_) => style.size(),
    };
    (height / GLYPH_HEIGHT as f64).round().max(1.0) as u32
}

/// Advance width of `text` in pixels at the given scale.
pub(crate) fn measure(text: &str, scale: u32) -> u32 {
    text.chars()
        .map(|ch| match glyph(ch) {
            Some((width, _)) => scale * (width as u32 + 1),
            None => scale * SPACE_WIDTH,
        })
        .sum()
}

type GlyphRows = [u8; GLYPH_HEIGHT];

/// Glyph width and row bitmaps (most significant used bit is the left column).
/// Lowercase letters render as capitals.
fn glyph(ch: char) -> Option<(u8, GlyphRows)> {
    let upper = ch.to_ascii_uppercase();
    GLYPHS
        .iter()
        .find(|(c, _, _)| *c == upper)
        .map(|&(_, width, rows)| (width, rows))
}

const GLYPHS: &[(char, u8, GlyphRows)] = &[
    ('A', 5, [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
    ('B', 5, [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110]),
    ('C', 5, [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110]),
    ('D', 5, [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100]),
    ('E', 5, [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111]),
    ('F', 5, [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000]),
    ('G', 5, [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111]),
    ('H', 5, [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
    ('I', 3, [0b111, 0b010, 0b010, 0b010, 0b010, 0b010, 0b111]),
    ('J', 5, [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100]),
    ('K', 5, [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001]),
    ('L', 5, [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111]),
    ('M', 5, [0b10001, 0b11011, 0b10101, 0b10001, 0b10001, 0b10001, 0b10001]),
    ('N', 5, [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001]),
    ('O', 5, [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
    ('P', 5, [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000]),
    ('Q', 5, [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101]),
    ('R', 5, [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001]),
    ('S', 5, [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110]),
    ('T', 5, [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100]),
    ('U', 5, [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
    ('V', 5, [0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b01010, 0b00100]),
    ('W', 5, [0b10001, 0b10001, 0b10001, 0b10001, 0b10101, 0b11011, 0b10001]),
    ('X', 5, [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001]),
    ('Y', 5, [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100]),
    ('Z', 5, [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111]),
    ('0', 5, [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110]),
    ('1', 3, [0b010, 0b110, 0b010, 0b010, 0b010, 0b010, 0b111]),
    ('2', 5, [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111]),
    ('3', 5, [0b11110, 0b00001, 0b00001, 0b00110, 0b00001, 0b00001, 0b11110]),
    ('4', 5, [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010]),
    ('5', 5, [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110]),
    ('6', 5, [0b01110, 0b10001, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110]),
    ('7', 5, [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000]),
    ('8', 5, [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110]),
    ('9', 5, [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b10001, 0b01110]),
    ('-', 3, [0b000, 0b000, 0b000, 0b111, 0b000, 0b000, 0b000]),
    ('+', 5, [0b00000, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0b00000]),
    ('/', 3, [0b001, 0b001, 0b010, 0b010, 0b100, 0b100, 0b100]),
    ('(', 3, [0b001, 0b010, 0b100, 0b100, 0b100, 0b010, 0b001]),
    (')', 3, [0b100, 0b010, 0b001, 0b001, 0b001, 0b010, 0b100]),
    (':', 1, [0b0, 0b1, 0b0, 0b0, 0b0, 0b1, 0b0]),
    ('.', 1, [0b0, 0b0, 0b0, 0b0, 0b0, 0b0, 0b1]),
    (',', 2, [0b00, 0b00, 0b00, 0b00, 0b00, 0b01, 0b10]),
    ('\'', 1, [0b1, 0b1, 0b0, 0b0, 0b0, 0b0, 0b0]),
    ('%', 5, [0b11001, 0b11010, 0b00010, 0b00100, 0b01000, 0b01011, 0b10011]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_maps_to_capitals() {
        assert_eq!(glyph('a'), glyph('A'));
        assert!(glyph('q').is_some());
        assert!(glyph('~').is_none());
    }

    #[test]
    fn glyph_rows_fit_declared_width() {
        for (ch, width, rows) in GLYPHS {
            for row in rows {
                assert!(
                    (*row as u32) < (1u32 << *width),
                    "glyph '{}' has bits outside its width",
                    ch
                );
            }
        }
    }

    #[test]
    fn font_check_is_stable_and_matches_new_backends() {
        let first = font_rasterizes();
        assert_eq!(first, font_rasterizes());
        let mut buffer = vec![0u8; 3];
        let backend = FontSafeBackend::new(BitMapBackend::with_buffer(&mut buffer, (1, 1)));
        assert_eq!(backend.use_glyphs, !first);
    }

    #[test]
    fn text_width_grows_with_text() {
        let style = FontDesc::new(FontFamily::SansSerif, 14.0, FontStyle::Normal).color(&BLACK);
        let short = text_width("1. Short", &style);
        let long = text_width(&format!("1. {}", "Long description ".repeat(10)), &style);
        assert!(short > 0);
        assert!(long > short * 10);
    }

    #[test]
    fn measure_counts_advance_and_spacing() {
        // 'I' is 3 wide, '1' is 3 wide, each followed by one column of spacing
        assert_eq!(measure("I1", 1), 8);
        assert_eq!(measure("I 1", 2), 2 * (4 + SPACE_WIDTH + 4));
        assert_eq!(measure("", 3), 0);
    }
}
