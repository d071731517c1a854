//! Packing-layout search and hierarchy resolution.
//!
//! This module implements the geometric core of the calculator:
//! - factorization of a carton count into a 3D grid (nx × ny × nz)
//! - selection of the grid whose sub-boxes come out closest to cubic
//! - resolution of the master → inner → unit hierarchy into pixel and
//!   centimeter dimensions per level
//! - enumeration of cell center positions for the packed view
//!
//! Everything here is pure and free of rendering concerns so it can be
//! tested without any HTTP or UI harness.

use crate::model::CalcInput;
use crate::types::Vec3;

/// Tuning values for layout resolution and scene assembly.
///
/// All values have sensible defaults and can be overridden through the
/// environment (see `config`).
#[derive(Copy, Clone, Debug)]
pub struct LayoutConfig {
    /// Substitute edge length in cm when a master dimension is absent or zero
    pub fallback_dim_cm: f64,
    /// Canvas size in px the longest master edge is normalized to
    pub canvas_px: f64,
    /// Canvas size in px used for fullscreen requests
    pub fullscreen_canvas_px: f64,
    /// Horizontal gap in px between exploded-view boxes
    pub explode_gap_px: f64,
    /// Shrink per packed box face so adjacent cells stay distinguishable
    pub face_inset_px: f64,
    /// Maximum rendered cells per nesting level in the packed view
    pub level_render_cap: usize,
    /// Maximum rendered boxes across all nesting levels in the packed view
    pub total_render_cap: usize,
}

impl LayoutConfig {
    pub const DEFAULT_FALLBACK_DIM_CM: f64 = 10.0;
    pub const DEFAULT_CANVAS_PX: f64 = 120.0;
    pub const DEFAULT_FULLSCREEN_CANVAS_PX: f64 = 280.0;
    pub const DEFAULT_EXPLODE_GAP_PX: f64 = 30.0;
    pub const DEFAULT_FACE_INSET_PX: f64 = 1.0;
    pub const DEFAULT_LEVEL_RENDER_CAP: usize = 500;
    pub const DEFAULT_TOTAL_RENDER_CAP: usize = 800;

    /// Creates a builder for customized configuration.
    pub fn builder() -> LayoutConfigBuilder {
        LayoutConfigBuilder::default()
    }

    /// Canvas size for the given display mode.
    #[inline]
    pub fn canvas_for(&self, fullscreen: bool) -> f64 {
        if fullscreen {
            self.fullscreen_canvas_px
        } else {
            self.canvas_px
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            fallback_dim_cm: Self::DEFAULT_FALLBACK_DIM_CM,
            canvas_px: Self::DEFAULT_CANVAS_PX,
            fullscreen_canvas_px: Self::DEFAULT_FULLSCREEN_CANVAS_PX,
            explode_gap_px: Self::DEFAULT_EXPLODE_GAP_PX,
            face_inset_px: Self::DEFAULT_FACE_INSET_PX,
            level_render_cap: Self::DEFAULT_LEVEL_RENDER_CAP,
            total_render_cap: Self::DEFAULT_TOTAL_RENDER_CAP,
        }
    }
}

/// Builder for `LayoutConfig`.
#[derive(Clone, Debug, Default)]
pub struct LayoutConfigBuilder {
    config: LayoutConfig,
}

impl LayoutConfigBuilder {
    /// Sets the fallback edge length in cm.
    pub fn fallback_dim_cm(mut self, value: f64) -> Self {
        self.config.fallback_dim_cm = value;
        self
    }

    /// Sets the normal canvas size in px.
    pub fn canvas_px(mut self, value: f64) -> Self {
        self.config.canvas_px = value;
        self
    }

    /// Sets the fullscreen canvas size in px.
    pub fn fullscreen_canvas_px(mut self, value: f64) -> Self {
        self.config.fullscreen_canvas_px = value;
        self
    }

    /// Sets the exploded-view gap in px.
    pub fn explode_gap_px(mut self, value: f64) -> Self {
        self.config.explode_gap_px = value;
        self
    }

    /// Sets the packed-view face inset in px.
    pub fn face_inset_px(mut self, value: f64) -> Self {
        self.config.face_inset_px = value;
        self
    }

    /// Sets the per-level render cap.
    pub fn level_render_cap(mut self, value: usize) -> Self {
        self.config.level_render_cap = value;
        self
    }

    /// Sets the total render cap.
    pub fn total_render_cap(mut self, value: usize) -> Self {
        self.config.total_render_cap = value;
        self
    }

    /// Creates the final configuration.
    pub fn build(self) -> LayoutConfig {
        self.config
    }
}

/// Integer grid subdivision of a parent box: items per axis.
///
/// Invariant: `nx * ny * nz` equals the item count the layout was derived
/// for (counts of 0 and 1 both map onto the unit layout).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackingLayout {
    pub nx: u32,
    pub ny: u32,
    pub nz: u32,
}

impl PackingLayout {
    /// The degenerate 1×1×1 layout.
    pub const UNIT: Self = Self {
        nx: 1,
        ny: 1,
        nz: 1,
    };

    /// Total number of cells in the grid.
    #[inline]
    pub fn count(&self) -> u64 {
        u64::from(self.nx) * u64::from(self.ny) * u64::from(self.nz)
    }

    /// The layout as a float vector, for component-wise division.
    #[inline]
    pub fn as_vec3(&self) -> Vec3 {
        Vec3::new(f64::from(self.nx), f64::from(self.ny), f64::from(self.nz))
    }
}

/// All divisors of `n` in ascending order.
///
/// Trial division up to the square root; both halves of each divisor pair
/// are collected and sorted afterwards.
fn divisors(n: u32) -> Vec<u32> {
    let mut result = Vec::new();
    let mut d = 1u32;
    while u64::from(d) * u64::from(d) <= u64::from(n) {
        if n % d == 0 {
            result.push(d);
            let paired = n / d;
            if paired != d {
                result.push(paired);
            }
        }
        d += 1;
    }
    result.sort_unstable();
    result
}

/// Every ordered factorization of `count` into three positive integers.
///
/// Triples appear with x ascending, then y ascending; `count <= 1` yields
/// the single unit triple so zero and absent child counts stay defined.
pub fn divisor_triples(count: u32) -> Vec<(u32, u32, u32)> {
    if count <= 1 {
        return vec![(1, 1, 1)];
    }

    let mut triples = Vec::new();
    for &x in &divisors(count) {
        let remaining = count / x;
        for &y in &divisors(remaining) {
            triples.push((x, y, remaining / y));
        }
    }
    triples
}

/// Finds the grid subdivision whose sub-boxes are closest to uniform.
///
/// Scores every factorization of `count` by the summed pairwise difference
/// of the resulting sub-box edges. Only a strictly better score replaces
/// the incumbent, so ties resolve to the first triple in enumeration order
/// and the visual output is deterministic.
///
/// # Parameters
/// * `parent` - Parent box dimensions (pixels or centimeters, any unit)
/// * `count` - Number of children to subdivide into; `count <= 1` yields
///   the unit layout without searching
pub fn best_layout(parent: Vec3, count: u32) -> PackingLayout {
    if count <= 1 {
        return PackingLayout::UNIT;
    }

    // Fallback: stack everything vertically
    let mut best = PackingLayout {
        nx: 1,
        ny: 1,
        nz: count,
    };
    let mut min_skew = f64::INFINITY;

    for &(x, y, z) in &divisor_triples(count) {
        let dim_x = parent.x / f64::from(x);
        let dim_y = parent.y / f64::from(y);
        let dim_z = parent.z / f64::from(z);

        let skew = (dim_x - dim_y).abs() + (dim_y - dim_z).abs() + (dim_z - dim_x).abs();

        if skew < min_skew {
            min_skew = skew;
            best = PackingLayout { nx: x, ny: y, nz: z };
        }
    }
    best
}

/// Rounds a possibly fractional child count to a whole number of cells.
///
/// When inner cartons do not evenly divide the units per master, the
/// per-inner count is fractional; the factorization search needs an
/// integer. Non-finite and non-positive values collapse to zero, which the
/// `count <= 1` guard then degrades to the unit layout.
pub fn round_count(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let rounded = value.round();
    if rounded >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        rounded as u32
    }
}

/// Dimensions of one nesting level: the chosen layout and the resulting
/// sub-box size on screen and in the real world.
#[derive(Clone, Copy, Debug)]
pub struct LevelGeometry {
    pub layout: PackingLayout,
    pub px: Vec3,
    pub cm: Vec3,
}

impl LevelGeometry {
    /// Slices a parent level by the layout chosen for `count` children.
    ///
    /// The layout is searched against the parent's pixel dimensions and the
    /// identical triple is applied to the centimeter dimensions, so screen
    /// and real-world proportions never diverge.
    fn subdivide(parent_px: Vec3, parent_cm: Vec3, count: u32) -> Self {
        let layout = best_layout(parent_px, count);
        let divisor = layout.as_vec3();
        Self {
            layout,
            px: parent_px.div_components(&divisor),
            cm: parent_cm.div_components(&divisor),
        }
    }
}

/// Fully resolved geometry of the packaging hierarchy.
///
/// Axis convention throughout: `x` carries the length, `y` the height and
/// `z` the width of the carton.
#[derive(Clone, Copy, Debug)]
pub struct HierarchyGeometry {
    /// Pixels per centimeter after canvas normalization
    pub scale: f64,
    /// Master carton size on screen
    pub master_px: Vec3,
    /// Master carton size in centimeters (fallbacks already applied)
    pub master_cm: Vec3,
    /// Inner carton level, present when inner cartons are active
    pub inner: Option<LevelGeometry>,
    /// Unit level, nested in the inner carton when active, else the master
    pub unit: LevelGeometry,
    /// Number of inner cartons in the master
    pub inner_count: u32,
    /// Whole-cell unit count per immediate parent (rounded when fractional)
    pub units_per_parent: u32,
}

/// Resolves the full hierarchy for one input snapshot.
///
/// Applies the optimizer once for inner cartons inside the master and once
/// for units inside their immediate parent (the inner carton when active,
/// the master otherwise).
///
/// # Parameters
/// * `input` - Validated calculation parameters
/// * `config` - Layout tuning values
/// * `fullscreen` - Selects the fullscreen canvas size
pub fn resolve_hierarchy(
    input: &CalcInput,
    config: &LayoutConfig,
    fullscreen: bool,
) -> HierarchyGeometry {
    let master_cm = master_dims_cm(input, config);
    let canvas = config.canvas_for(fullscreen);

    let max_dim = master_cm.max_component();
    let scale = if max_dim > 0.0 { canvas / max_dim } else { 1.0 };
    let master_px = master_cm * scale;

    let inner_count = input.inner_count();
    let inner = if input.has_active_inner() {
        Some(LevelGeometry::subdivide(master_px, master_cm, inner_count))
    } else {
        None
    };

    let (parent_px, parent_cm) = match &inner {
        Some(level) => (level.px, level.cm),
        None => (master_px, master_cm),
    };
    // The toggle alone decides which count feeds the unit search: with the
    // inner level enabled but empty, the per-inner count is zero and the
    // unit box degrades to a single cell.
    let units_per_parent = if input.inners_per_master.is_some() {
        round_count(input.units_per_inner())
    } else {
        round_count(input.effective_units())
    };
    let unit = LevelGeometry::subdivide(parent_px, parent_cm, units_per_parent);

    HierarchyGeometry {
        scale,
        master_px,
        master_cm,
        inner,
        unit,
        inner_count,
        units_per_parent,
    }
}

/// Master dimensions in screen-axis order with fallbacks applied.
///
/// Absent or zero dimensions render as the fallback cube so the preview
/// always has something to show.
fn master_dims_cm(input: &CalcInput, config: &LayoutConfig) -> Vec3 {
    let (l, w, h) = match &input.dims {
        Some(d) => (d.length(), d.width(), d.height()),
        None => (0.0, 0.0, 0.0),
    };
    let fallback = config.fallback_dim_cm;
    let or_fallback = |v: f64| if v > 0.0 && v.is_finite() { v } else { fallback };
    Vec3::new(or_fallback(l), or_fallback(h), or_fallback(w))
}

/// Iterator over the cell center positions of a packed grid.
///
/// Cells tile the parent volume exactly: the first center sits at parent
/// center − parent half-size + sub-box half-size, subsequent centers step
/// by one full sub-box per axis. Iteration order is x outer, y middle,
/// z inner, which is the order render keys are assigned in.
#[derive(Clone, Debug)]
pub struct GridCells {
    layout: PackingLayout,
    sub: Vec3,
    start: Vec3,
    emitted: u64,
}

impl GridCells {
    /// Total number of cells this iterator will yield.
    #[inline]
    pub fn total(&self) -> u64 {
        self.layout.count()
    }
}

impl Iterator for GridCells {
    type Item = Vec3;

    fn next(&mut self) -> Option<Vec3> {
        if self.emitted >= self.layout.count() {
            return None;
        }
        let per_x = u64::from(self.layout.ny) * u64::from(self.layout.nz);
        let ix = self.emitted / per_x;
        let iy = (self.emitted / u64::from(self.layout.nz)) % u64::from(self.layout.ny);
        let iz = self.emitted % u64::from(self.layout.nz);
        self.emitted += 1;

        Some(Vec3::new(
            self.start.x + ix as f64 * self.sub.x,
            self.start.y + iy as f64 * self.sub.y,
            self.start.z + iz as f64 * self.sub.z,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.layout.count() - self.emitted) as usize;
        (remaining, Some(remaining))
    }
}

/// Enumerates the grid of cell centers filling a parent box.
///
/// # Parameters
/// * `layout` - Cells per axis
/// * `sub_dims` - Size of one cell
/// * `parent_center` - Center of the parent box in scene space
/// * `parent_dims` - Size of the parent box
pub fn grid_cells(
    layout: PackingLayout,
    sub_dims: Vec3,
    parent_center: Vec3,
    parent_dims: Vec3,
) -> GridCells {
    let start = parent_center - parent_dims * 0.5 + sub_dims * 0.5;
    GridCells {
        layout,
        sub: sub_dims,
        start,
        emitted: 0,
    }
}
