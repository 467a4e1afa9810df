//! Squarified treemap layout (Bruls, Huizing, van Wijk).

use std::cmp::Reverse;

use ordered_float::OrderedFloat;

/// Largest weight given to zero (or non-finite) values so their tile stays
/// visible. Lowered to the smallest positive value when that is smaller.
pub const ZERO_FLOOR: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    fn short_side(&self) -> f64 {
        self.w.min(self.h)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tile {
    /// Position of the value in the input slice.
    pub index: usize,
    /// Weight actually laid out (the value, or the floor).
    pub weight: f64,
    pub rect: Rect,
}

pub fn floored_weight(value: f64, floor: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        floor
    }
}

/// Floor for `values`: [`ZERO_FLOOR`] or the smallest positive value.
pub fn zero_floor(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .fold(ZERO_FLOOR, f64::min)
}

/// Lay out `values` inside `bounds` with tile areas proportional to their
/// floored weights. Tiles are returned in input order.
pub fn layout(values: &[f64], bounds: Rect) -> Vec<Tile> {
    if values.is_empty() || bounds.area() <= 0.0 {
        return Vec::new();
    }
    let floor = zero_floor(values);
    let weights: Vec<f64> = values.iter().map(|&v| floored_weight(v, floor)).collect();
    let total: f64 = weights.iter().sum();
    let scale = bounds.area() / total;

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by_key(|&idx| Reverse(OrderedFloat(weights[idx])));

    let mut tiles = Vec::with_capacity(weights.len());
    let mut free = bounds;
    let mut row: Vec<(usize, f64)> = Vec::new();

    for idx in order {
        let area = weights[idx] * scale;
        let side = free.short_side();
        if row.is_empty() || worst_with(&row, area, side) <= worst(&row, side) {
            row.push((idx, area));
        } else {
            free = place_row(&row, free, &weights, &mut tiles);
            row.clear();
            row.push((idx, area));
        }
    }
    if !row.is_empty() {
        place_row(&row, free, &weights, &mut tiles);
    }

    tiles.sort_by_key(|tile| tile.index);
    tiles
}

fn worst(row: &[(usize, f64)], side: f64) -> f64 {
    let sum: f64 = row.iter().map(|(_, a)| a).sum();
    let max = row.iter().map(|(_, a)| *a).fold(f64::MIN, f64::max);
    let min = row.iter().map(|(_, a)| *a).fold(f64::MAX, f64::min);
    aspect(sum, max, min, side)
}

fn worst_with(row: &[(usize, f64)], extra: f64, side: f64) -> f64 {
    let sum: f64 = row.iter().map(|(_, a)| a).sum::<f64>() + extra;
    let max = row.iter().map(|(_, a)| *a).fold(extra, f64::max);
    let min = row.iter().map(|(_, a)| *a).fold(extra, f64::min);
    aspect(sum, max, min, side)
}

fn aspect(sum: f64, max: f64, min: f64, side: f64) -> f64 {
    if sum <= 0.0 || min <= 0.0 {
        return f64::INFINITY;
    }
    let side2 = side * side;
    let sum2 = sum * sum;
    (side2 * max / sum2).max(sum2 / (side2 * min))
}

/// Place one row along the short side of `free` and return what is left.
fn place_row(row: &[(usize, f64)], free: Rect, weights: &[f64], out: &mut Vec<Tile>) -> Rect {
    let sum: f64 = row.iter().map(|(_, a)| a).sum();
    if free.w >= free.h {
        let width = sum / free.h;
        let mut y = free.y;
        for &(idx, area) in row {
            let h = area / width;
            out.push(Tile {
                index: idx,
                weight: weights[idx],
                rect: Rect::new(free.x, y, width, h),
            });
            y += h;
        }
        Rect::new(free.x + width, free.y, (free.w - width).max(0.0), free.h)
    } else {
        let height = sum / free.w;
        let mut x = free.x;
        for &(idx, area) in row {
            let w = area / height;
            out.push(Tile {
                index: idx,
                weight: weights[idx],
                rect: Rect::new(x, free.y, w, height),
            });
            x += w;
        }
        Rect::new(free.x, free.y + height, free.w, (free.h - height).max(0.0))
    }
}
