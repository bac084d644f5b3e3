use crate::common::config::{GapSettings, SmartGaps};
use crate::layout_engine::Assignment;
use crate::sys::geometry::Rect;

fn gaps_suppressed(gaps: &GapSettings, tiled_count: usize) -> bool {
    gaps.smart == SmartGaps::SingleWindow && tiled_count <= 1
}

/// The part of the monitor available to tiled windows.
pub fn compute_tiling_area(screen: Rect, gaps: &GapSettings, tiled_count: usize) -> Rect {
    if gaps.outer == 0 || gaps_suppressed(gaps, tiled_count) {
        screen
    } else {
        screen.inset(gaps.outer)
    }
}

/// Carves inner gaps between neighbouring frames. Edges on the area boundary
/// are left alone so the outer gap alone separates windows from the monitor
/// edge, and adjacent windows end up exactly `inner` pixels apart.
pub fn apply_inner_gaps(
    assignments: &mut [Assignment],
    area: Rect,
    gaps: &GapSettings,
    tiled_count: usize,
) {
    if gaps.inner == 0 || gaps_suppressed(gaps, tiled_count) {
        return;
    }
    let lead = gaps.inner - gaps.inner / 2;
    let trail = gaps.inner / 2;
    for a in assignments.iter_mut().filter(|a| a.visible) {
        let f = a.frame;
        let (left, right) = fit_within(
            f.width,
            if f.x > area.x { lead } else { 0 },
            if f.right() < area.right() { trail } else { 0 },
        );
        let (top, bottom) = fit_within(
            f.height,
            if f.y > area.y { lead } else { 0 },
            if f.bottom() < area.bottom() { trail } else { 0 },
        );
        a.frame = f.inset_edges(left, top, right, bottom);
    }
}

/// Caps both insets at half the extent so the frame stays inside its cell.
fn fit_within(extent: i32, lead: i32, trail: i32) -> (i32, i32) {
    let cap = (extent - 1).max(0) / 2;
    (lead.min(cap), trail.min(cap))
}
