//! Render-scene assembly for the 3D preview.
//!
//! Turns resolved hierarchy geometry into flat lists of boxes the client
//! draws with CSS 3D transforms. Three view modes exist:
//! - `Master`: the master carton alone with dimension annotations
//! - `Exploded`: master, sample inner and sample unit side by side
//! - `Packed`: the full X-ray grid, capped to keep the DOM affordable
//!
//! Camera state (rotation, zoom) never appears here; the client owns it.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::layout::{HierarchyGeometry, LayoutConfig, grid_cells};
use crate::types::{BoundingBox, Dimensional, Positioned, Vec3};

/// Number of distinct palette entries the client styles inner groups with.
pub const PALETTE_CYCLE: u32 = 6;

/// Requested preview mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Master,
    Exploded,
    Packed,
}

impl Default for ViewMode {
    fn default() -> Self {
        ViewMode::Master
    }
}

/// Nesting level a scene box belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BoxLevel {
    Master,
    Inner,
    Unit,
}

/// One renderable box in scene space.
///
/// Positions are center points; the client expands them into six faces.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct SceneBox {
    /// Stable render key
    pub id: String,
    pub level: BoxLevel,
    #[schema(value_type = [f64; 3], example = json!([0.0, 0.0, 0.0]))]
    pub center: (f64, f64, f64),
    #[schema(value_type = [f64; 3], example = json!([120.0, 60.0, 90.0]))]
    pub dims_px: (f64, f64, f64),
    /// Palette slot for group coloring, `None` for singly-styled boxes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub palette: Option<u32>,
    /// Dashed outline (master shell in the packed view)
    pub dashed: bool,
    /// Count annotation, e.g. `4x INNER`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Real-world dimensions in cm for annotated boxes (length, height, width)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<[f64; 3]>)]
    pub dims_cm: Option<(f64, f64, f64)>,
}

impl Positioned for SceneBox {
    fn center(&self) -> Vec3 {
        Vec3::from_tuple(self.center)
    }
}

impl Dimensional for SceneBox {
    fn dimensions(&self) -> Vec3 {
        Vec3::from_tuple(self.dims_px)
    }
}

/// A complete scene for one view mode.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct Scene {
    pub view: ViewMode,
    /// Canvas size the longest master edge was normalized to
    pub canvas_px: f64,
    /// Pixels per centimeter
    pub scale: f64,
    pub boxes: Vec<SceneBox>,
    /// Cells the view describes, before any render cap
    pub total_cells: u64,
    /// Boxes actually emitted
    pub rendered: usize,
    /// True when render caps dropped cells
    pub truncated: bool,
    /// Scene extent, for camera fitting
    #[schema(value_type = [f64; 3])]
    pub bounds_min: (f64, f64, f64),
    #[schema(value_type = [f64; 3])]
    pub bounds_max: (f64, f64, f64),
}

/// Events emitted while a scene is assembled, for SSE streaming.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum SceneEvent {
    /// A box is ready to draw.
    BoxEmitted { index: usize, item: SceneBox },
    /// Assembly finished.
    Finished {
        rendered: usize,
        total_cells: u64,
        truncated: bool,
    },
}

/// Builds the scene for one view mode.
pub fn build_scene(geometry: &HierarchyGeometry, view: ViewMode, config: &LayoutConfig) -> Scene {
    build_scene_with_progress(geometry, view, config, |_| {})
}

/// Builds the scene, reporting every box through a callback.
///
/// The callback shape suits SSE: the caller forwards each event to a
/// channel and the client renders progressively.
pub fn build_scene_with_progress(
    geometry: &HierarchyGeometry,
    view: ViewMode,
    config: &LayoutConfig,
    mut on_event: impl FnMut(&SceneEvent),
) -> Scene {
    let mut boxes: Vec<SceneBox> = Vec::new();
    let mut truncated = false;

    let total_cells = match view {
        ViewMode::Master => 1,
        ViewMode::Exploded => {
            if geometry.inner.is_some() {
                3
            } else {
                2
            }
        }
        ViewMode::Packed => packed_cell_count(geometry),
    };

    match view {
        ViewMode::Master => {
            push_box(
                &mut boxes,
                &mut on_event,
                SceneBox {
                    id: "master".to_string(),
                    level: BoxLevel::Master,
                    center: Vec3::zero().as_tuple(),
                    dims_px: geometry.master_px.as_tuple(),
                    palette: None,
                    dashed: false,
                    label: Some("MASTER".to_string()),
                    dims_cm: Some(geometry.master_cm.as_tuple()),
                },
            );
        }
        ViewMode::Exploded => build_exploded(geometry, config, &mut boxes, &mut on_event),
        ViewMode::Packed => {
            truncated = build_packed(geometry, config, &mut boxes, &mut on_event);
        }
    }

    let bounds = BoundingBox::around(boxes.iter())
        .unwrap_or_else(|| BoundingBox::from_center_and_dims(Vec3::zero(), Vec3::zero()));

    let rendered = boxes.len();
    on_event(&SceneEvent::Finished {
        rendered,
        total_cells,
        truncated,
    });

    Scene {
        view,
        canvas_px: geometry.master_px.max_component(),
        scale: geometry.scale,
        boxes,
        total_cells,
        rendered,
        truncated,
        bounds_min: bounds.min.as_tuple(),
        bounds_max: bounds.max.as_tuple(),
    }
}

fn push_box(
    boxes: &mut Vec<SceneBox>,
    on_event: &mut impl FnMut(&SceneEvent),
    scene_box: SceneBox,
) {
    on_event(&SceneEvent::BoxEmitted {
        index: boxes.len(),
        item: scene_box.clone(),
    });
    boxes.push(scene_box);
}

/// Master, sample inner and sample unit laid out along the x axis.
///
/// The whole row is shifted so its visual pivot stays near the canvas
/// center regardless of how many levels are present.
fn build_exploded(
    geometry: &HierarchyGeometry,
    config: &LayoutConfig,
    boxes: &mut Vec<SceneBox>,
    on_event: &mut impl FnMut(&SceneEvent),
) {
    let gap = config.explode_gap_px;
    let master = geometry.master_px;

    let (unit_offset, pivot_shift) = match &geometry.inner {
        Some(inner) => {
            let inner_offset = master.x / 2.0 + inner.px.x / 2.0 + gap;
            let unit_offset = master.x / 2.0 + inner.px.x + 2.0 * gap + geometry.unit.px.x / 2.0;
            (unit_offset, -inner_offset)
        }
        None => {
            let unit_offset = master.x / 2.0 + geometry.unit.px.x / 2.0 + gap;
            (unit_offset, -unit_offset / 2.0)
        }
    };

    push_box(
        boxes,
        on_event,
        SceneBox {
            id: "master".to_string(),
            level: BoxLevel::Master,
            center: Vec3::new(pivot_shift, 0.0, 0.0).as_tuple(),
            dims_px: master.as_tuple(),
            palette: None,
            dashed: false,
            label: None,
            dims_cm: None,
        },
    );

    if let Some(inner) = &geometry.inner {
        let inner_offset = master.x / 2.0 + inner.px.x / 2.0 + gap;
        push_box(
            boxes,
            on_event,
            SceneBox {
                id: "inner-sample".to_string(),
                level: BoxLevel::Inner,
                center: Vec3::new(inner_offset + pivot_shift, 0.0, 0.0).as_tuple(),
                dims_px: inner.px.as_tuple(),
                palette: None,
                dashed: false,
                label: Some(format!("{}x INNER", geometry.inner_count)),
                dims_cm: Some(inner.cm.as_tuple()),
            },
        );
    }

    push_box(
        boxes,
        on_event,
        SceneBox {
            id: "unit-sample".to_string(),
            level: BoxLevel::Unit,
            center: Vec3::new(unit_offset + pivot_shift, 0.0, 0.0).as_tuple(),
            dims_px: geometry.unit.px.as_tuple(),
            palette: None,
            dashed: false,
            label: Some(format!("{}x UNIT", geometry.units_per_parent)),
            dims_cm: Some(geometry.unit.cm.as_tuple()),
        },
    );
}

/// Number of boxes the packed view would contain uncapped.
fn packed_cell_count(geometry: &HierarchyGeometry) -> u64 {
    match &geometry.inner {
        Some(inner) => {
            let inners = inner.layout.count();
            inners + inners * geometry.unit.layout.count()
        }
        None => geometry.unit.layout.count(),
    }
}

/// The full X-ray grid: every inner cell and every unit inside it.
///
/// Returns whether the render caps dropped cells.
fn build_packed(
    geometry: &HierarchyGeometry,
    config: &LayoutConfig,
    boxes: &mut Vec<SceneBox>,
    on_event: &mut impl FnMut(&SceneEvent),
) -> bool {
    let mut truncated = false;
    let inset = config.face_inset_px;

    push_box(
        boxes,
        on_event,
        SceneBox {
            id: "master".to_string(),
            level: BoxLevel::Master,
            center: Vec3::zero().as_tuple(),
            dims_px: geometry.master_px.as_tuple(),
            palette: None,
            dashed: true,
            label: Some("MASTER".to_string()),
            dims_cm: None,
        },
    );

    match &geometry.inner {
        Some(inner) => {
            let inner_cells = grid_cells(
                inner.layout,
                inner.px,
                Vec3::zero(),
                geometry.master_px,
            );
            if inner_cells.total() > config.level_render_cap as u64 {
                truncated = true;
            }

            for (idx, cell) in inner_cells.take(config.level_render_cap).enumerate() {
                let palette = idx as u32 % PALETTE_CYCLE;
                push_box(
                    boxes,
                    on_event,
                    SceneBox {
                        id: format!("inner-{}", idx),
                        level: BoxLevel::Inner,
                        center: cell.as_tuple(),
                        dims_px: inset_dims(inner.px, inset),
                        palette: Some(palette),
                        dashed: false,
                        label: None,
                        dims_cm: None,
                    },
                );

                let unit_cells =
                    grid_cells(geometry.unit.layout, geometry.unit.px, cell, inner.px);
                for (unit_idx, unit_cell) in unit_cells.enumerate() {
                    if boxes.len() >= config.total_render_cap {
                        truncated = true;
                        break;
                    }
                    push_box(
                        boxes,
                        on_event,
                        SceneBox {
                            id: format!("unit-{}-{}", idx, unit_idx),
                            level: BoxLevel::Unit,
                            center: unit_cell.as_tuple(),
                            dims_px: inset_dims(geometry.unit.px, inset),
                            palette: Some(palette),
                            dashed: false,
                            label: None,
                            dims_cm: None,
                        },
                    );
                }

                if boxes.len() >= config.total_render_cap {
                    truncated = true;
                    break;
                }
            }
        }
        None => {
            let unit_cells = grid_cells(
                geometry.unit.layout,
                geometry.unit.px,
                Vec3::zero(),
                geometry.master_px,
            );
            if unit_cells.total() > config.level_render_cap as u64 {
                truncated = true;
            }

            for (idx, cell) in unit_cells.take(config.level_render_cap).enumerate() {
                push_box(
                    boxes,
                    on_event,
                    SceneBox {
                        id: format!("unit-{}", idx),
                        level: BoxLevel::Unit,
                        center: cell.as_tuple(),
                        dims_px: inset_dims(geometry.unit.px, inset),
                        palette: None,
                        dashed: false,
                        label: None,
                        dims_cm: None,
                    },
                );
            }
        }
    }

    truncated
}

fn inset_dims(dims: Vec3, inset: f64) -> (f64, f64, f64) {
    (
        (dims.x - inset).max(0.0),
        (dims.y - inset).max(0.0),
        (dims.z - inset).max(0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::resolve_hierarchy;
    use crate::model::{CalcInput, MassUnit, MasterDims, WeightMode};
    use crate::types::EPSILON_GENERAL;

    fn geometry(
        units: u32,
        inners: Option<u32>,
        dims: Option<(f64, f64, f64)>,
        config: &LayoutConfig,
    ) -> HierarchyGeometry {
        let input = CalcInput::new(
            WeightMode::Net,
            100.0,
            MassUnit::G,
            units,
            0.0,
            inners,
            dims.map(|d| MasterDims::new(d).unwrap()),
        )
        .unwrap();
        resolve_hierarchy(&input, config, false)
    }

    #[test]
    fn master_view_is_single_annotated_box() {
        let config = LayoutConfig::default();
        let geo = geometry(24, None, Some((40.0, 30.0, 20.0)), &config);
        let scene = build_scene(&geo, ViewMode::Master, &config);

        assert_eq!(scene.boxes.len(), 1);
        assert_eq!(scene.rendered, 1);
        assert_eq!(scene.total_cells, 1);
        assert!(!scene.truncated);

        let master = &scene.boxes[0];
        assert_eq!(master.level, BoxLevel::Master);
        assert_eq!(master.dims_cm, Some((40.0, 20.0, 30.0)));
        assert_eq!(master.label.as_deref(), Some("MASTER"));
        assert!(!master.dashed);
    }

    #[test]
    fn exploded_view_without_inner_has_two_boxes() {
        let config = LayoutConfig::default();
        let geo = geometry(24, None, Some((40.0, 30.0, 20.0)), &config);
        let scene = build_scene(&geo, ViewMode::Exploded, &config);

        assert_eq!(scene.boxes.len(), 2);
        let unit = &scene.boxes[1];
        assert_eq!(unit.level, BoxLevel::Unit);
        assert_eq!(unit.label.as_deref(), Some("24x UNIT"));

        // Unit sits to the right of the master with the configured gap
        let master = &scene.boxes[0];
        let expected_gap = config.explode_gap_px;
        let edge_to_edge =
            (unit.center.0 - unit.dims_px.0 / 2.0) - (master.center.0 + master.dims_px.0 / 2.0);
        assert!((edge_to_edge - expected_gap).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn exploded_view_with_inner_has_three_boxes() {
        let config = LayoutConfig::default();
        let geo = geometry(24, Some(4), Some((40.0, 30.0, 20.0)), &config);
        let scene = build_scene(&geo, ViewMode::Exploded, &config);

        assert_eq!(scene.boxes.len(), 3);
        assert_eq!(scene.boxes[1].level, BoxLevel::Inner);
        assert_eq!(scene.boxes[1].label.as_deref(), Some("4x INNER"));
        assert_eq!(scene.boxes[2].label.as_deref(), Some("6x UNIT"));

        // The master is re-centered onto the inner's default offset
        let master = &scene.boxes[0];
        assert!(master.center.0 < 0.0);
    }

    #[test]
    fn packed_view_without_inner_counts_units() {
        let config = LayoutConfig::default();
        let geo = geometry(24, None, Some((40.0, 30.0, 20.0)), &config);
        let scene = build_scene(&geo, ViewMode::Packed, &config);

        // Master shell + 24 units
        assert_eq!(scene.boxes.len(), 25);
        assert_eq!(scene.total_cells, 24);
        assert!(!scene.truncated);
        assert!(scene.boxes[0].dashed);
        assert!(
            scene.boxes[1..]
                .iter()
                .all(|b| b.level == BoxLevel::Unit && b.palette.is_none())
        );
    }

    #[test]
    fn packed_view_with_inner_nests_units() {
        let config = LayoutConfig::default();
        let geo = geometry(24, Some(4), Some((40.0, 30.0, 20.0)), &config);
        let scene = build_scene(&geo, ViewMode::Packed, &config);

        // Master shell + 4 inners + 4 * 6 units
        assert_eq!(scene.boxes.len(), 1 + 4 + 24);
        assert_eq!(scene.total_cells, 4 + 24);
        assert!(!scene.truncated);

        let inners: Vec<_> = scene
            .boxes
            .iter()
            .filter(|b| b.level == BoxLevel::Inner)
            .collect();
        assert_eq!(inners.len(), 4);
        assert_eq!(inners[0].palette, Some(0));
        assert_eq!(inners[1].palette, Some(1));

        // Units inherit the palette slot of their inner
        let first_unit = scene
            .boxes
            .iter()
            .find(|b| b.id == "unit-1-0")
            .expect("unit of second inner missing");
        assert_eq!(first_unit.palette, Some(1));
    }

    #[test]
    fn packed_view_caps_unit_cells() {
        let config = LayoutConfig::builder()
            .level_render_cap(10)
            .total_render_cap(15)
            .build();
        let geo = geometry(1000, None, Some((100.0, 100.0, 100.0)), &config);
        let scene = build_scene(&geo, ViewMode::Packed, &config);

        assert!(scene.truncated);
        assert_eq!(scene.total_cells, 1000);
        // Master shell + capped units
        assert_eq!(scene.boxes.len(), 11);
    }

    #[test]
    fn packed_view_caps_total_boxes() {
        let config = LayoutConfig::builder().total_render_cap(20).build();
        let geo = geometry(512, Some(8), Some((80.0, 80.0, 80.0)), &config);
        let scene = build_scene(&geo, ViewMode::Packed, &config);

        assert!(scene.truncated);
        assert!(scene.boxes.len() <= 21);
    }

    #[test]
    fn packed_units_tile_master_when_uncapped() {
        let config = LayoutConfig::builder().face_inset_px(0.0).build();
        let geo = geometry(24, None, Some((40.0, 30.0, 20.0)), &config);
        let scene = build_scene(&geo, ViewMode::Packed, &config);

        let units = scene
            .boxes
            .iter()
            .filter(|b| b.level == BoxLevel::Unit)
            .map(|b| BoundingBox::from_center_and_dims(
                Vec3::from_tuple(b.center),
                Vec3::from_tuple(b.dims_px),
            ))
            .reduce(|acc, bb| acc.union(&bb))
            .unwrap();
        let master = BoundingBox::from_center_and_dims(Vec3::zero(), geo.master_px);
        assert!(units.approx_eq(&master, EPSILON_GENERAL));
    }

    #[test]
    fn scene_bounds_enclose_all_boxes() {
        let config = LayoutConfig::default();
        let geo = geometry(24, Some(4), Some((40.0, 30.0, 20.0)), &config);
        let scene = build_scene(&geo, ViewMode::Exploded, &config);

        for b in &scene.boxes {
            let bb = BoundingBox::from_center_and_dims(
                Vec3::from_tuple(b.center),
                Vec3::from_tuple(b.dims_px),
            );
            assert!(bb.min.x >= scene.bounds_min.0 - EPSILON_GENERAL);
            assert!(bb.max.x <= scene.bounds_max.0 + EPSILON_GENERAL);
            assert!(bb.min.y >= scene.bounds_min.1 - EPSILON_GENERAL);
            assert!(bb.max.y <= scene.bounds_max.1 + EPSILON_GENERAL);
        }
    }

    #[test]
    fn progress_callback_sees_every_box() {
        let config = LayoutConfig::default();
        let geo = geometry(24, Some(4), Some((40.0, 30.0, 20.0)), &config);

        let mut emitted = 0usize;
        let mut finished = None;
        let scene = build_scene_with_progress(&geo, ViewMode::Packed, &config, |event| {
            match event {
                SceneEvent::BoxEmitted { .. } => emitted += 1,
                SceneEvent::Finished {
                    rendered,
                    truncated,
                    ..
                } => finished = Some((*rendered, *truncated)),
            }
        });

        assert_eq!(emitted, scene.boxes.len());
        assert_eq!(finished, Some((scene.boxes.len(), false)));
    }

    #[test]
    fn scene_events_serialize_with_type_tag() {
        let event = SceneEvent::Finished {
            rendered: 5,
            total_cells: 5,
            truncated: false,
        };
        let json = serde_json::to_string(&event).expect("event must serialize");
        assert!(json.contains("\"type\":\"Finished\""));
    }
}
