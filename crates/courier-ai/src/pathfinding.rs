//! Grid search over the city: greedy best-first and weather-weighted A*.
//!
//! Both searches expand neighbors in N, E, S, W order and break heap ties
//! with an insertion counter, so equal inputs always produce equal paths.
//! Returned paths exclude the start cell and end on the goal; an empty path
//! means the goal is the start, blocked, or unreachable.

use courier_core::{City, Coord};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Lower bound applied to weather multipliers before they divide a cost.
pub const MIN_MULTIPLIER: f32 = 0.05;

/// Cost of one step under `weather_multiplier`.
pub fn step_cost(weather_multiplier: f32) -> f64 {
    1.0 / f64::from(weather_multiplier.max(MIN_MULTIPLIER))
}

/// Total traversal cost of a path.
pub fn path_cost(path: &[Coord], weather_multiplier: f32) -> f64 {
    path.len() as f64 * step_cost(weather_multiplier)
}

#[derive(Debug)]
struct OpenNode {
    f: f64,
    g: f64,
    cell: Coord,
    tie: u64,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap pops the smallest f first.
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.g.total_cmp(&self.g))
            .then_with(|| other.tie.cmp(&self.tie))
    }
}

struct Search<'a> {
    city: &'a City,
    came_from: Vec<Option<usize>>,
}

impl<'a> Search<'a> {
    fn new(city: &'a City) -> Self {
        let len = (city.width() * city.height()).max(0) as usize;
        Self {
            city,
            came_from: vec![None; len],
        }
    }

    fn idx(&self, c: Coord) -> Option<usize> {
        self.city
            .in_bounds(c)
            .then(|| (c.y * self.city.width() + c.x) as usize)
    }

    fn cell(&self, idx: usize) -> Coord {
        let idx = idx as i32;
        Coord::new(idx % self.city.width(), idx / self.city.width())
    }

    fn reconstruct(&self, start: usize, goal: usize) -> Vec<Coord> {
        let mut out = Vec::new();
        let mut current = goal;
        while current != start {
            out.push(self.cell(current));
            match self.came_from[current] {
                Some(prev) => current = prev,
                None => return Vec::new(),
            }
        }
        out.reverse();
        out
    }
}

fn endpoints(city: &City, start: Coord, goal: Coord) -> bool {
    start != goal && city.in_bounds(start) && !city.is_blocked_at(goal)
}

/// A* with a Manhattan heuristic and a uniform edge cost of `1 / multiplier`.
///
/// ```
/// use courier_core::{City, Coord};
/// use rust_decimal::Decimal;
///
/// let city = City::open(3, 3, Decimal::ZERO);
/// let path = courier_ai::a_star(&city, Coord::new(0, 0), Coord::new(2, 2), 1.0);
/// assert_eq!(path.len(), 4);
/// assert_eq!(path.last(), Some(&Coord::new(2, 2)));
/// ```
pub fn a_star(city: &City, start: Coord, goal: Coord, weather_multiplier: f32) -> Vec<Coord> {
    if !endpoints(city, start, goal) {
        return Vec::new();
    }
    let edge = step_cost(weather_multiplier);
    let heuristic = |c: Coord| f64::from(c.manhattan(goal)) * edge;

    let mut search = Search::new(city);
    let (Some(start_idx), Some(goal_idx)) = (search.idx(start), search.idx(goal)) else {
        return Vec::new();
    };
    let mut g_score = vec![f64::INFINITY; search.came_from.len()];
    let mut open = BinaryHeap::new();
    let mut tie: u64 = 0;

    g_score[start_idx] = 0.0;
    open.push(OpenNode {
        f: heuristic(start),
        g: 0.0,
        cell: start,
        tie,
    });

    while let Some(node) = open.pop() {
        if node.cell == goal {
            return search.reconstruct(start_idx, goal_idx);
        }
        let Some(node_idx) = search.idx(node.cell) else {
            continue;
        };
        if node.g > g_score[node_idx] {
            // stale
            continue;
        }
        for n in city.neighbors4(node.cell) {
            let Some(n_idx) = search.idx(n) else { continue };
            let tentative = node.g + edge;
            if tentative >= g_score[n_idx] {
                continue;
            }
            g_score[n_idx] = tentative;
            search.came_from[n_idx] = Some(node_idx);
            tie += 1;
            open.push(OpenNode {
                f: tentative + heuristic(n),
                g: tentative,
                cell: n,
                tie,
            });
        }
    }
    Vec::new()
}

/// Greedy best-first search: expands by heuristic only and never revisits a
/// cell. Paths are valid but not necessarily shortest.
pub fn greedy_best_first(city: &City, start: Coord, goal: Coord) -> Vec<Coord> {
    if !endpoints(city, start, goal) {
        return Vec::new();
    }
    let mut search = Search::new(city);
    let (Some(start_idx), Some(goal_idx)) = (search.idx(start), search.idx(goal)) else {
        return Vec::new();
    };
    let mut visited = vec![false; search.came_from.len()];
    let mut open = BinaryHeap::new();
    let mut tie: u64 = 0;

    visited[start_idx] = true;
    open.push(OpenNode {
        f: f64::from(start.manhattan(goal)),
        g: 0.0,
        cell: start,
        tie,
    });

    while let Some(node) = open.pop() {
        if node.cell == goal {
            return search.reconstruct(start_idx, goal_idx);
        }
        let Some(node_idx) = search.idx(node.cell) else {
            continue;
        };
        for n in city.neighbors4(node.cell) {
            let Some(n_idx) = search.idx(n) else { continue };
            if visited[n_idx] {
                continue;
            }
            visited[n_idx] = true;
            search.came_from[n_idx] = Some(node_idx);
            tie += 1;
            open.push(OpenNode {
                f: f64::from(n.manhattan(goal)),
                g: 0.0,
                cell: n,
                tie,
            });
        }
    }
    Vec::new()
}
