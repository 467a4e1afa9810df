//! Heatmap and treemap rendering into a single in-memory raster artifact.
//!
//! The artifact is the only output of a render: display, PNG export and the
//! fingerprint all read the same cropped pixel buffer.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::codecs::png::PngEncoder;
use image::{imageops, ColorType, ImageEncoder, RgbImage};
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::ObjectiveCatalog;
use crate::glyph::{self, FontSafeBackend};
use crate::matrix::{ObjectiveMatrix, MATRIX_COLS, MATRIX_ROWS};
use crate::palette::{contrast_text, Palette};
use crate::treemap::{self, Rect};
use crate::{CompmapError, OBJECTIVE_COUNT};

pub const TITLE: &str = "Course Competency Objective Mapping";

/// Minimum canvas before cropping; the width grows to fit the legend.
const CANVAS: (u32, u32) = (1300, 560);
const BACKGROUND: [u8; 3] = [255, 255, 255];
const CROP_PADDING: u32 = 12;

const PLOT_LEFT: i32 = 30;
const PLOT_TOP: i32 = 64;
const CELL_SIZE: i32 = 120;
const PLOT_WIDTH: i32 = CELL_SIZE * MATRIX_COLS as i32;
const PLOT_HEIGHT: i32 = CELL_SIZE * MATRIX_ROWS as i32;

const LEGEND_LEFT: i32 = PLOT_LEFT + PLOT_WIDTH + 40;
const LEGEND_TOP: i32 = PLOT_TOP;
const LEGEND_ROW: i32 = 24;
const SWATCH: i32 = 16;
const LEGEND_FONT_SIZE: f64 = 14.0;
const LEGEND_MARGIN: i32 = 20;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// 3×5 colored grid.
    #[default]
    Heatmap,
    /// Single container with areas proportional to attainment.
    Treemap,
}

impl RenderMode {
    pub const ALL: [RenderMode; 2] = [RenderMode::Heatmap, RenderMode::Treemap];

    pub fn name(&self) -> &'static str {
        match self {
            RenderMode::Heatmap => "heatmap",
            RenderMode::Treemap => "treemap",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RenderMode {
    type Err = CompmapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heatmap" => Ok(RenderMode::Heatmap),
            "treemap" => Ok(RenderMode::Treemap),
            other => Err(CompmapError::Configuration(format!(
                "unknown render mode '{}' (expected heatmap|treemap)",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LegendEntry {
    pub objective: usize,
    pub description: String,
    pub value: f64,
    pub color: [u8; 3],
}

impl LegendEntry {
    pub fn label(&self) -> String {
        format!("{}. {}", self.objective, self.description)
    }
}

/// Pixel rectangle of one objective's cell or tile, in artifact coordinates.
/// `x1`/`y1` are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CellRegion {
    pub objective: usize,
    pub value: f64,
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
    pub fill: [u8; 3],
}

impl CellRegion {
    pub fn width(&self) -> u32 {
        self.x1 - self.x0 + 1
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0 + 1
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageArtifact {
    course_code: String,
    mode: RenderMode,
    palette: Palette,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    legend: Vec<LegendEntry>,
    cells: Vec<CellRegion>,
}

impl ImageArtifact {
    pub fn course_code(&self) -> &str {
        &self.course_code
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGB8 pixels, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn legend(&self) -> &[LegendEntry] {
        &self.legend
    }

    pub fn cells(&self) -> &[CellRegion] {
        &self.cells
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        Some([self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]])
    }

    /// `<course_code>_heatmap.png` or `<course_code>_treemap.png`.
    pub fn file_name(&self) -> String {
        format!("{}_{}.png", self.course_code, self.mode.name())
    }

    pub fn to_png(&self) -> Result<Vec<u8>, CompmapError> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(&self.pixels, self.width, self.height, ColorType::Rgb8)
            .map_err(|e| CompmapError::Render(format!("PNG encoding failed: {}", e)))?;
        Ok(out)
    }

    /// Write the PNG into `dir` under [`Self::file_name`].
    pub fn save(&self, dir: &Path) -> Result<PathBuf, CompmapError> {
        let path = dir.join(self.file_name());
        let png = self.to_png()?;
        fs::write(&path, png).map_err(|source| CompmapError::Export {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// SHA-256 over dimensions and pixels.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update(&self.pixels);
        format!("{:x}", hasher.finalize())
    }
}

/// Render one objective matrix. Fails only on programmer errors (wrong matrix
/// shape, incomplete catalog) or a drawing/encoding failure.
pub fn render(
    matrix: &ObjectiveMatrix,
    catalog: &ObjectiveCatalog,
    palette: Palette,
    mode: RenderMode,
) -> Result<ImageArtifact, CompmapError> {
    if matrix.shape() != (MATRIX_ROWS, MATRIX_COLS) {
        return Err(CompmapError::Configuration(format!(
            "objective matrix must be {}x{}, got {:?}",
            MATRIX_ROWS,
            MATRIX_COLS,
            matrix.shape()
        )));
    }
    if catalog.len() != OBJECTIVE_COUNT {
        return Err(CompmapError::Configuration(format!(
            "objective catalog must list {} objectives",
            OBJECTIVE_COUNT
        )));
    }

    let legend: Vec<LegendEntry> = catalog
        .iter()
        .map(|(objective, description)| {
            let value = matrix.objective(objective).unwrap_or(0.0);
            LegendEntry {
                objective,
                description: description.to_string(),
                value,
                color: rgb(palette.color(value)),
            }
        })
        .collect();

    let label_font = legend_font();
    let widest = legend
        .iter()
        .map(|entry| glyph::text_width(&entry.label(), &label_font))
        .max()
        .unwrap_or(0);
    let width = canvas_width(widest);
    let height = CANVAS.1;
    let mut buffer = vec![0u8; (width * height * 3) as usize];
    let cells = {
        let backend = BitMapBackend::with_buffer(&mut buffer, (width, height));
        let root = FontSafeBackend::new(backend).into_drawing_area();
        let cells =
            draw_figure(&root, matrix, &legend, widest, palette, mode).map_err(draw_error)?;
        root.present().map_err(draw_error)?;
        cells
    };

    let (x0, y0, x1, y1) = content_bounds(&buffer, width, height).unwrap_or((0, 0, width - 1, height - 1));
    let left = x0.saturating_sub(CROP_PADDING);
    let top = y0.saturating_sub(CROP_PADDING);
    let right = (x1 + CROP_PADDING).min(width - 1);
    let bottom = (y1 + CROP_PADDING).min(height - 1);

    let full = RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| CompmapError::Render("pixel buffer size mismatch".into()))?;
    let cropped = imageops::crop_imm(&full, left, top, right - left + 1, bottom - top + 1).to_image();

    let cells = cells
        .into_iter()
        .map(|cell| CellRegion {
            x0: cell.x0 - left,
            y0: cell.y0 - top,
            x1: cell.x1 - left,
            y1: cell.y1 - top,
            ..cell
        })
        .collect();

    Ok(ImageArtifact {
        course_code: matrix.code().to_string(),
        mode,
        palette,
        width: cropped.width(),
        height: cropped.height(),
        pixels: cropped.into_raw(),
        legend,
        cells,
    })
}

fn legend_font() -> TextStyle<'static> {
    font(LEGEND_FONT_SIZE, FontStyle::Normal, RGBColor(0, 0, 0), HPos::Left)
}

fn legend_right(widest: u32) -> i32 {
    LEGEND_LEFT + SWATCH + 8 + widest as i32 + 10
}

/// Canvas width that keeps the legend frame, plus a margin, on the raster.
fn canvas_width(widest: u32) -> u32 {
    CANVAS.0.max((legend_right(widest) + LEGEND_MARGIN) as u32)
}

fn draw_error<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> CompmapError {
    CompmapError::Render(err.to_string())
}

fn rgb(color: RGBColor) -> [u8; 3] {
    [color.0, color.1, color.2]
}

fn font(size: f64, style: FontStyle, color: RGBColor, h_pos: HPos) -> TextStyle<'static> {
    FontDesc::new(FontFamily::SansSerif, size, style)
        .color(&color)
        .pos(Pos::new(h_pos, VPos::Center))
}

fn draw_figure<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    matrix: &ObjectiveMatrix,
    legend: &[LegendEntry],
    widest: u32,
    palette: Palette,
    mode: RenderMode,
) -> Result<Vec<CellRegion>, DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;
    root.draw(&Text::new(
        TITLE,
        (PLOT_LEFT + PLOT_WIDTH / 2, PLOT_TOP / 2),
        font(22.0, FontStyle::Bold, RGBColor(0, 0, 0), HPos::Center),
    ))?;

    let cells = match mode {
        RenderMode::Heatmap => draw_heatmap(root, matrix, palette)?,
        RenderMode::Treemap => draw_treemap(root, matrix, palette)?,
    };
    draw_legend(root, legend, widest)?;
    Ok(cells)
}

fn draw_heatmap<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    matrix: &ObjectiveMatrix,
    palette: Palette,
) -> Result<Vec<CellRegion>, DrawingAreaErrorKind<DB::ErrorType>> {
    let mut regions = Vec::with_capacity(OBJECTIVE_COUNT);
    for cell in matrix.cells() {
        let x0 = PLOT_LEFT + cell.col as i32 * CELL_SIZE;
        let y0 = PLOT_TOP + cell.row as i32 * CELL_SIZE;
        let x1 = x0 + CELL_SIZE - 1;
        let y1 = y0 + CELL_SIZE - 1;
        let fill = palette.color(cell.value);
        let ink = contrast_text(fill);

        root.draw(&Rectangle::new([(x0, y0), (x1, y1)], fill.filled()))?;
        root.draw(&Rectangle::new([(x0, y0), (x1, y1)], WHITE.stroke_width(2)))?;

        let cx = x0 + CELL_SIZE / 2;
        let cy = y0 + CELL_SIZE / 2;
        root.draw(&Text::new(
            cell.objective.to_string(),
            (cx, cy - 12),
            font(20.0, FontStyle::Bold, ink, HPos::Center),
        ))?;
        root.draw(&Text::new(
            format!("{:.1}", cell.value),
            (cx, cy + 18),
            font(14.0, FontStyle::Normal, ink, HPos::Center),
        ))?;

        regions.push(CellRegion {
            objective: cell.objective,
            value: cell.value,
            x0: x0 as u32,
            y0: y0 as u32,
            x1: x1 as u32,
            y1: y1 as u32,
            fill: rgb(fill),
        });
    }
    Ok(regions)
}

fn draw_treemap<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    matrix: &ObjectiveMatrix,
    palette: Palette,
) -> Result<Vec<CellRegion>, DrawingAreaErrorKind<DB::ErrorType>> {
    let values = matrix.flatten();
    let bounds = Rect::new(
        PLOT_LEFT as f64,
        PLOT_TOP as f64,
        PLOT_WIDTH as f64,
        PLOT_HEIGHT as f64,
    );
    let mut regions = Vec::with_capacity(values.len());
    for tile in treemap::layout(&values, bounds) {
        let value = values[tile.index];
        let objective = tile.index + 1;
        let x0 = tile.rect.x.round() as i32;
        let y0 = tile.rect.y.round() as i32;
        let x1 = ((tile.rect.x + tile.rect.w).round() as i32 - 1).max(x0);
        let y1 = ((tile.rect.y + tile.rect.h).round() as i32 - 1).max(y0);
        let fill = palette.color(value);
        let ink = contrast_text(fill);

        root.draw(&Rectangle::new([(x0, y0), (x1, y1)], fill.filled()))?;
        root.draw(&Rectangle::new([(x0, y0), (x1, y1)], WHITE.stroke_width(2)))?;

        let cx = (x0 + x1) / 2;
        let cy = (y0 + y1) / 2;
        if y1 - y0 >= 44 && x1 - x0 >= 48 {
            root.draw(&Text::new(
                objective.to_string(),
                (cx, cy - 10),
                font(18.0, FontStyle::Bold, ink, HPos::Center),
            ))?;
            root.draw(&Text::new(
                format!("{:.1}%", value),
                (cx, cy + 12),
                font(14.0, FontStyle::Normal, ink, HPos::Center),
            ))?;
        } else {
            root.draw(&Text::new(
                format!("{}: {:.0}%", objective, value),
                (cx, cy),
                font(11.0, FontStyle::Normal, ink, HPos::Center),
            ))?;
        }

        regions.push(CellRegion {
            objective,
            value,
            x0: x0 as u32,
            y0: y0 as u32,
            x1: x1 as u32,
            y1: y1 as u32,
            fill: rgb(fill),
        });
    }
    Ok(regions)
}

fn draw_legend<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    legend: &[LegendEntry],
    widest: u32,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let label_font = legend_font();
    let frame_right = legend_right(widest);
    let frame_bottom = LEGEND_TOP + LEGEND_ROW * legend.len() as i32 + 2;
    root.draw(&Rectangle::new(
        [(LEGEND_LEFT - 10, LEGEND_TOP - 10), (frame_right, frame_bottom)],
        BLACK.mix(0.25).stroke_width(1),
    ))?;

    for (row, entry) in legend.iter().enumerate() {
        let top = LEGEND_TOP + row as i32 * LEGEND_ROW;
        let [r, g, b] = entry.color;
        let swatch = [(LEGEND_LEFT, top), (LEGEND_LEFT + SWATCH, top + SWATCH)];
        root.draw(&Rectangle::new(swatch, RGBColor(r, g, b).filled()))?;
        root.draw(&Rectangle::new(swatch, BLACK.mix(0.3).stroke_width(1)))?;
        root.draw(&Text::new(
            entry.label(),
            (LEGEND_LEFT + SWATCH + 8, top + SWATCH / 2),
            label_font.clone(),
        ))?;
    }
    Ok(())
}

/// Bounding box (inclusive) of pixels that differ from the background.
fn content_bounds(pixels: &[u8], width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (idx, px) in pixels.chunks_exact(3).enumerate() {
        if px == BACKGROUND {
            continue;
        }
        let x = idx as u32 % width;
        let y = idx as u32 / width;
        if y >= height {
            break;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds
}
