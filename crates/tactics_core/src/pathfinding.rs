//! Grid-backed obstacle service.
//!
//! [`NavGrid`] marks blocked cells on the ground plane and answers the
//! [`ObstacleQuery`] contract: point and segment tests, detour search via
//! A* with line-of-sight smoothing, and collision adjustment that slides
//! along walls instead of entering them.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TacticsError};
use crate::math::planar_distance;
use crate::navigation::ObstacleQuery;

/// Cell types for the navigation grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellType {
    /// Normal walkable terrain (cost: 1).
    #[default]
    Walkable,
    /// Impassable terrain (buildings, cliffs).
    Blocked,
    /// Walkable, but A* avoids it when it can (cost: 2).
    Rough,
}

impl CellType {
    /// Movement cost, or `None` for blocked cells.
    #[must_use]
    pub const fn movement_cost(self) -> Option<f32> {
        match self {
            Self::Walkable => Some(1.0),
            Self::Blocked => None,
            Self::Rough => Some(2.0),
        }
    }

    /// Returns true if this cell is walkable.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        !matches!(self, Self::Blocked)
    }
}

/// Navigation grid over the XZ plane.
///
/// Cell `(0, 0)` has its low corner at `origin`, `(0, 0)` unless moved with
/// [`NavGrid::with_origin`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavGrid {
    /// Grid width in cells.
    width: u32,
    /// Grid height (Z extent) in cells.
    height: u32,
    /// Cell data stored in row-major order.
    cells: Vec<CellType>,
    /// Size of each cell in world units.
    cell_size: f32,
    /// World position of the grid's low corner.
    #[serde(default)]
    origin: Vec3,
}

impl NavGrid {
    /// Create a new grid with all cells walkable.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero, or if `cell_size` is not positive.
    #[must_use]
    pub fn new(width: u32, height: u32, cell_size: f32) -> Self {
        assert!(width > 0, "NavGrid width must be positive");
        assert!(height > 0, "NavGrid height must be positive");
        assert!(cell_size > 0.0, "NavGrid cell_size must be positive");

        Self {
            width,
            height,
            cells: vec![CellType::Walkable; (width as usize) * (height as usize)],
            cell_size,
            origin: Vec3::ZERO,
        }
    }

    /// Move the grid so its low corner sits at `origin`.
    #[must_use]
    pub fn with_origin(mut self, origin: Vec3) -> Self {
        self.origin = Vec3::new(origin.x, 0.0, origin.z);
        self
    }

    /// World position of the grid's low corner.
    #[must_use]
    pub const fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Cell size in world units.
    #[must_use]
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    fn coords_to_index(&self, x: u32, z: u32) -> usize {
        (z as usize) * (self.width as usize) + (x as usize)
    }

    /// Check if coordinates are within grid bounds.
    #[must_use]
    pub fn in_bounds(&self, x: u32, z: u32) -> bool {
        x < self.width && z < self.height
    }

    /// Cell type at coordinates, `None` when out of bounds.
    #[must_use]
    pub fn get_cell(&self, x: u32, z: u32) -> Option<CellType> {
        self.in_bounds(x, z)
            .then(|| self.cells[self.coords_to_index(x, z)])
    }

    /// Set cell type at coordinates. Returns `false` if out of bounds.
    pub fn set_cell(&mut self, x: u32, z: u32, cell_type: CellType) -> bool {
        if self.in_bounds(x, z) {
            let index = self.coords_to_index(x, z);
            self.cells[index] = cell_type;
            true
        } else {
            false
        }
    }

    /// Block every cell overlapping the world-space rectangle `[min, max]`.
    pub fn block_rect(&mut self, min: Vec3, max: Vec3) {
        let (Some((x0, z0)), Some((x1, z1))) = (self.clamped_cell(min), self.clamped_cell(max))
        else {
            return;
        };
        for z in z0.min(z1)..=z0.max(z1) {
            for x in x0.min(x1)..=x0.max(x1) {
                self.set_cell(x, z, CellType::Blocked);
            }
        }
    }

    /// Check if a cell is walkable. Out-of-bounds cells are not.
    #[must_use]
    pub fn is_walkable(&self, x: u32, z: u32) -> bool {
        self.get_cell(x, z).is_some_and(CellType::is_walkable)
    }

    /// World position to grid coordinates, `None` outside the grid.
    #[must_use]
    pub fn world_to_grid(&self, pos: Vec3) -> Option<(u32, u32)> {
        let pos = pos - self.origin;
        if pos.x < 0.0 || pos.z < 0.0 {
            return None;
        }
        let x = (pos.x / self.cell_size).floor() as i64;
        let z = (pos.z / self.cell_size).floor() as i64;
        if x < i64::from(self.width) && z < i64::from(self.height) {
            Some((x as u32, z as u32))
        } else {
            None
        }
    }

    fn clamped_cell(&self, pos: Vec3) -> Option<(u32, u32)> {
        if !pos.x.is_finite() || !pos.z.is_finite() {
            return None;
        }
        let pos = pos - self.origin;
        let x = (pos.x / self.cell_size).floor().clamp(0.0, (self.width - 1) as f32);
        let z = (pos.z / self.cell_size).floor().clamp(0.0, (self.height - 1) as f32);
        Some((x as u32, z as u32))
    }

    /// Grid coordinates to world position (center of cell, y = 0).
    #[must_use]
    pub fn grid_to_world(&self, x: u32, z: u32) -> Vec3 {
        let half = self.cell_size / 2.0;
        self.origin
            + Vec3::new(
                x as f32 * self.cell_size + half,
                0.0,
                z as f32 * self.cell_size + half,
            )
    }

    /// Movement cost for a cell, `None` for blocked or out-of-bounds cells.
    #[must_use]
    pub fn movement_cost(&self, x: u32, z: u32) -> Option<f32> {
        self.get_cell(x, z).and_then(CellType::movement_cost)
    }

    /// Whether any blocked cell lies within `radius` of `point`.
    fn blocked_near(&self, point: Vec3, radius: f32) -> bool {
        let Some((cx, cz)) = self.world_to_grid(point) else {
            return true;
        };
        if !self.is_walkable(cx, cz) {
            return true;
        }
        if radius <= 0.0 {
            return false;
        }
        let reach = (radius / self.cell_size).ceil() as i64;
        for dz in -reach..=reach {
            for dx in -reach..=reach {
                let nx = i64::from(cx) + dx;
                let nz = i64::from(cz) + dz;
                if nx < 0 || nz < 0 {
                    continue;
                }
                let (nx, nz) = (nx as u32, nz as u32);
                if !self.in_bounds(nx, nz) || self.is_walkable(nx, nz) {
                    continue;
                }
                // Distance from point to the closest point of the blocked cell.
                let min_x = self.origin.x + nx as f32 * self.cell_size;
                let min_z = self.origin.z + nz as f32 * self.cell_size;
                let closest_x = point.x.clamp(min_x, min_x + self.cell_size);
                let closest_z = point.z.clamp(min_z, min_z + self.cell_size);
                let d2 = (point.x - closest_x).powi(2) + (point.z - closest_z).powi(2);
                if d2 < radius * radius {
                    return true;
                }
            }
        }
        false
    }

    /// Sample the segment at sub-cell steps checking clearance.
    fn segment_clear(&self, a: Vec3, b: Vec3, radius: f32) -> bool {
        let length = planar_distance(a, b);
        let step = (self.cell_size * 0.25).max(0.05);
        let samples = (length / step).ceil().max(1.0) as u32;
        (0..=samples).all(|i| {
            let t = i as f32 / samples as f32;
            !self.blocked_near(a + (b - a) * t, radius)
        })
    }
}

impl Default for NavGrid {
    /// Create a default NavGrid (64x64 cells, 4 unit cell size).
    fn default() -> Self {
        Self::new(64, 64, 4.0)
    }
}

impl ObstacleQuery for NavGrid {
    fn is_blocked(&self, point: Vec3, radius: f32) -> bool {
        self.blocked_near(point, radius)
    }

    fn has_clear_path(&self, from: Vec3, to: Vec3, radius: f32) -> bool {
        self.segment_clear(from, to, radius)
    }

    fn find_detour(&self, from: Vec3, to: Vec3, radius: f32) -> Option<Vec3> {
        let path = find_path(self, from, to).ok()?;
        let path = smooth_path(self, path);
        // First waypoint that is actually away from the start.
        path.into_iter()
            .find(|p| planar_distance(*p, from) > self.cell_size * 0.5)
            .filter(|p| !self.blocked_near(*p, radius.min(self.cell_size * 0.45)))
    }

    fn adjust_for_collision(&self, from: Vec3, to: Vec3, radius: f32) -> Vec3 {
        if !self.blocked_near(to, radius) {
            return to;
        }
        // Slide along one axis when the full move is blocked.
        let slide_x = Vec3::new(to.x, to.y, from.z);
        if !self.blocked_near(slide_x, radius) {
            return slide_x;
        }
        let slide_z = Vec3::new(from.x, to.y, to.z);
        if !self.blocked_near(slide_z, radius) {
            return slide_z;
        }
        from
    }
}

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy)]
struct AStarNode {
    x: u32,
    z: u32,
    f_score: f32,
    /// Tie-breaker: lower coordinates first.
    tie_breaker: u64,
}

impl PartialEq for AStarNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AStarNode {}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so reverse for min-heap behavior.
        match other.f_score.total_cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Direction offsets for 8-directional movement.
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

const DIAGONAL_COST: f32 = std::f32::consts::SQRT_2;

/// Octile distance heuristic for 8-directional movement.
#[inline]
fn octile_heuristic(x1: u32, z1: u32, x2: u32, z2: u32) -> f32 {
    let dx = x1.abs_diff(x2) as f32;
    let dz = z1.abs_diff(z2) as f32;
    dx.max(dz) + (DIAGONAL_COST - 1.0) * dx.min(dz)
}

/// Diagonal moves may not cut corners of blocked cells.
#[inline]
fn is_diagonal_valid(grid: &NavGrid, x: u32, z: u32, dx: i32, dz: i32) -> bool {
    if dx != 0 && dz != 0 {
        let check_x = (x as i32 + dx) as u32;
        let check_z = (z as i32 + dz) as u32;
        grid.is_walkable(check_x, z) && grid.is_walkable(x, check_z)
    } else {
        true
    }
}

/// Find a path from start to goal with A*.
///
/// # Errors
///
/// Returns [`TacticsError::InvalidState`] if either end lies outside the
/// grid or on a blocked cell, or if no path exists.
pub fn find_path(grid: &NavGrid, start: Vec3, goal: Vec3) -> Result<Vec<Vec3>> {
    let (start_x, start_z) = grid
        .world_to_grid(start)
        .ok_or_else(|| TacticsError::InvalidState("Start position outside grid".into()))?;
    let (goal_x, goal_z) = grid
        .world_to_grid(goal)
        .ok_or_else(|| TacticsError::InvalidState("Goal position outside grid".into()))?;

    if !grid.is_walkable(start_x, start_z) {
        return Err(TacticsError::InvalidState("Start position is blocked".into()));
    }
    if !grid.is_walkable(goal_x, goal_z) {
        return Err(TacticsError::InvalidState("Goal position is blocked".into()));
    }
    if start_x == goal_x && start_z == goal_z {
        return Ok(vec![goal]);
    }

    let mut path = find_path_grid(grid, (start_x, start_z), (goal_x, goal_z))?;
    // End exactly on the requested goal rather than its cell center.
    if let Some(last) = path.last_mut() {
        *last = Vec3::new(goal.x, 0.0, goal.z);
    }
    Ok(path)
}

fn find_path_grid(grid: &NavGrid, start: (u32, u32), goal: (u32, u32)) -> Result<Vec<Vec3>> {
    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
    let mut came_from: HashMap<(u32, u32), (u32, u32)> = HashMap::new();
    let mut g_score: HashMap<(u32, u32), f32> = HashMap::new();

    g_score.insert(start, 0.0);
    open_set.push(AStarNode {
        x: start.0,
        z: start.1,
        f_score: octile_heuristic(start.0, start.1, goal.0, goal.1),
        tie_breaker: coords_to_tie_breaker(start.0, start.1),
    });

    while let Some(current) = open_set.pop() {
        if (current.x, current.z) == goal {
            return Ok(reconstruct_path(grid, &came_from, goal));
        }

        let current_g = g_score
            .get(&(current.x, current.z))
            .copied()
            .unwrap_or(f32::MAX);

        for &(dx, dz) in &DIRECTIONS {
            let nx = current.x as i32 + dx;
            let nz = current.z as i32 + dz;
            if nx < 0 || nz < 0 {
                continue;
            }
            let (nx, nz) = (nx as u32, nz as u32);

            let Some(cell_cost) = grid.movement_cost(nx, nz) else {
                continue;
            };
            if !is_diagonal_valid(grid, current.x, current.z, dx, dz) {
                continue;
            }

            let move_cost = if dx != 0 && dz != 0 {
                cell_cost * DIAGONAL_COST
            } else {
                cell_cost
            };
            let tentative_g = current_g + move_cost;
            let neighbor_g = g_score.get(&(nx, nz)).copied().unwrap_or(f32::MAX);

            if tentative_g < neighbor_g {
                came_from.insert((nx, nz), (current.x, current.z));
                g_score.insert((nx, nz), tentative_g);
                open_set.push(AStarNode {
                    x: nx,
                    z: nz,
                    f_score: tentative_g + octile_heuristic(nx, nz, goal.0, goal.1),
                    tie_breaker: coords_to_tie_breaker(nx, nz),
                });
            }
        }
    }

    Err(TacticsError::InvalidState(format!(
        "No path from {start:?} to {goal:?}"
    )))
}

#[inline]
fn coords_to_tie_breaker(x: u32, z: u32) -> u64 {
    (u64::from(z) << 32) | u64::from(x)
}

fn reconstruct_path(
    grid: &NavGrid,
    came_from: &HashMap<(u32, u32), (u32, u32)>,
    goal: (u32, u32),
) -> Vec<Vec3> {
    let mut path = vec![grid.grid_to_world(goal.0, goal.1)];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        path.push(grid.grid_to_world(prev.0, prev.1));
        current = prev;
    }
    path.reverse();
    path
}

/// Remove waypoints that a straight line can skip.
#[must_use]
pub fn smooth_path(grid: &NavGrid, path: Vec<Vec3>) -> Vec<Vec3> {
    if path.len() <= 2 {
        return path;
    }

    let mut smoothed = Vec::with_capacity(path.len());
    smoothed.push(path[0]);
    let mut current_idx = 0;

    while current_idx < path.len() - 1 {
        let mut furthest_visible = current_idx + 1;
        for check_idx in (current_idx + 2)..path.len() {
            if grid.segment_clear(path[current_idx], path[check_idx], 0.0) {
                furthest_visible = check_idx;
            }
        }
        smoothed.push(path[furthest_visible]);
        current_idx = furthest_visible;
    }

    smoothed
}
