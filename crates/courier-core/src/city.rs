//! Immutable city grid: blocking and surface-weight lookups.

use crate::{Coord, ValidationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Legend entry for a tile code.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileInfo {
    pub blocked: bool,
    /// Speed factor applied when standing on this tile.
    pub surface_weight: f32,
}

impl Default for TileInfo {
    fn default() -> Self {
        Self {
            blocked: false,
            surface_weight: 1.0,
        }
    }
}

/// City grid. Built once per session; a reload builds a new value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct City {
    width: i32,
    height: i32,
    tiles: Vec<String>,
    legend: BTreeMap<String, TileInfo>,
    /// Income goal for the session.
    goal: Decimal,
}

impl City {
    /// Build from row-major tile codes. Every row must hold `width` codes.
    pub fn new(
        width: usize,
        height: usize,
        rows: Vec<Vec<String>>,
        legend: BTreeMap<String, TileInfo>,
        goal: Decimal,
    ) -> Result<Self, ValidationError> {
        if width == 0 || height == 0 {
            return Err(ValidationError::EmptyGrid);
        }
        if rows.len() != height {
            return Err(ValidationError::GridShape {
                expected_w: width,
                expected_h: height,
                row: rows.len(),
                found: 0,
            });
        }
        let mut tiles = Vec::with_capacity(width * height);
        for (row, codes) in rows.into_iter().enumerate() {
            if codes.len() != width {
                return Err(ValidationError::GridShape {
                    expected_w: width,
                    expected_h: height,
                    row,
                    found: codes.len(),
                });
            }
            tiles.extend(codes);
        }
        Ok(Self {
            width: width as i32,
            height: height as i32,
            tiles,
            legend,
            goal,
        })
    }

    /// All-open street grid.
    pub fn open(width: u32, height: u32, goal: Decimal) -> Self {
        let width = width.max(1) as i32;
        let height = height.max(1) as i32;
        let mut legend = BTreeMap::new();
        legend.insert("C".to_string(), TileInfo::default());
        Self {
            width,
            height,
            tiles: vec!["C".to_string(); (width * height) as usize],
            legend,
            goal,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn goal(&self) -> Decimal {
        self.goal
    }

    pub fn in_bounds(&self, c: Coord) -> bool {
        c.x >= 0 && c.y >= 0 && c.x < self.width && c.y < self.height
    }

    fn idx(&self, c: Coord) -> Option<usize> {
        if !self.in_bounds(c) {
            return None;
        }
        Some((c.y * self.width + c.x) as usize)
    }

    /// Tile code at a cell, if in bounds.
    pub fn tile(&self, x: i32, y: i32) -> Option<&str> {
        self.idx(Coord::new(x, y)).map(|i| self.tiles[i].as_str())
    }

    fn info(&self, x: i32, y: i32) -> Option<&TileInfo> {
        self.tile(x, y).and_then(|code| self.legend.get(code))
    }

    /// Out-of-bounds cells count as blocked.
    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        if !self.in_bounds(Coord::new(x, y)) {
            return true;
        }
        self.info(x, y).map(|t| t.blocked).unwrap_or(false)
    }

    pub fn is_blocked_at(&self, c: Coord) -> bool {
        self.is_blocked(c.x, c.y)
    }

    /// Surface weight of a cell; 1.0 when the tile or its legend entry is missing.
    pub fn surface_weight(&self, x: i32, y: i32) -> f32 {
        self.info(x, y).map(|t| t.surface_weight).unwrap_or(1.0)
    }

    /// Unblocked 4-neighbors in fixed N, E, S, W order.
    pub fn neighbors4(&self, c: Coord) -> impl Iterator<Item = Coord> + '_ {
        [(0, -1), (1, 0), (0, 1), (-1, 0)]
            .into_iter()
            .map(move |(dx, dy)| c.offset(dx, dy))
            .filter(move |n| !self.is_blocked_at(*n))
    }

    /// First open cell in row-major order, used to place couriers that
    /// would otherwise start inside a building.
    pub fn first_open(&self) -> Option<Coord> {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| Coord::new(x, y)))
            .find(|c| !self.is_blocked_at(*c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legend() -> BTreeMap<String, TileInfo> {
        let mut l = BTreeMap::new();
        l.insert("C".into(), TileInfo::default());
        l.insert(
            "B".into(),
            TileInfo {
                blocked: true,
                surface_weight: 1.0,
            },
        );
        l.insert(
            "P".into(),
            TileInfo {
                blocked: false,
                surface_weight: 0.95,
            },
        );
        l
    }

    fn rows(lines: &[&str]) -> Vec<Vec<String>> {
        lines
            .iter()
            .map(|l| l.chars().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn lookups_follow_legend() {
        let city = City::new(3, 2, rows(&["CBP", "CCX"]), legend(), Decimal::ZERO).unwrap();
        assert!(!city.is_blocked(0, 0));
        assert!(city.is_blocked(1, 0));
        assert_eq!(city.surface_weight(2, 0), 0.95);
        // "X" has no legend entry: open, weight 1.0
        assert!(!city.is_blocked(2, 1));
        assert_eq!(city.surface_weight(2, 1), 1.0);
    }

    #[test]
    fn out_of_bounds_is_blocked() {
        let city = City::open(3, 3, Decimal::ZERO);
        assert!(city.is_blocked(-1, 0));
        assert!(city.is_blocked(0, 3));
        assert!(city.is_blocked(3, 0));
        assert_eq!(city.surface_weight(10, 10), 1.0);
    }

    #[test]
    fn shape_mismatch_rejected() {
        let err = City::new(3, 2, rows(&["CCC", "CC"]), legend(), Decimal::ZERO).unwrap_err();
        assert!(matches!(err, ValidationError::GridShape { row: 1, found: 2, .. }));
        assert_eq!(
            City::new(0, 2, vec![], legend(), Decimal::ZERO).unwrap_err(),
            ValidationError::EmptyGrid
        );
    }

    #[test]
    fn neighbors_skip_blocked_and_edges() {
        let city = City::new(3, 2, rows(&["CBC", "CCC"]), legend(), Decimal::ZERO).unwrap();
        let n: Vec<Coord> = city.neighbors4(Coord::new(0, 0)).collect();
        assert_eq!(n, vec![Coord::new(0, 1)]);
        assert_eq!(city.first_open(), Some(Coord::new(0, 0)));
    }
}
