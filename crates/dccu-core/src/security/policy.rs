//! Row visibility filtering.

use dccu_proto::record::clearance_of;
use serde_json::Value;

use super::context::ViewerContext;

/// Check if a raw backend row is visible to the viewer.
///
/// Rows without a recognizable clearance level are never visible.
pub fn is_visible(viewer: &ViewerContext, row: &Value) -> bool {
    clearance_of(row)
        .map(|level| viewer.can_view(level))
        .unwrap_or(false)
}

/// Keep only the rows the viewer may see, preserving their order.
pub fn filter_visible(viewer: &ViewerContext, rows: Vec<Value>) -> Vec<Value> {
    let total = rows.len();
    let visible: Vec<Value> = rows.into_iter().filter(|row| is_visible(viewer, row)).collect();

    tracing::debug!(
        level = %viewer.level(),
        rank = viewer.level().rank(),
        total,
        visible = visible.len(),
        "clearance filter applied"
    );

    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use dccu_proto::{ClearanceLevel, Session};
    use serde_json::json;

    fn rows() -> Vec<Value> {
        vec![
            json!({"id": "4", "clearance_level": "ALPHA"}),
            json!({"id": "3", "clearance_level": "BETA"}),
            json!({"id": "2", "clearance_level": "GAMMA"}),
            json!({"id": "1", "clearance_level": "DELTA"}),
        ]
    }

    fn ids(rows: &[Value]) -> Vec<&str> {
        rows.iter().map(|r| r["id"].as_str().unwrap()).collect()
    }

    #[test]
    fn test_beta_sees_three() {
        let viewer = ViewerContext::for_session(Session::new("oracle", ClearanceLevel::Beta));
        let visible = filter_visible(&viewer, rows());
        assert_eq!(ids(&visible), vec!["3", "2", "1"]);
    }

    #[test]
    fn test_delta_sees_only_delta() {
        let viewer = ViewerContext::anonymous();
        let visible = filter_visible(&viewer, rows());
        assert_eq!(ids(&visible), vec!["1"]);
    }

    #[test]
    fn test_alpha_sees_all() {
        let viewer = ViewerContext::for_session(Session::new("batman", ClearanceLevel::Alpha));
        assert_eq!(filter_visible(&viewer, rows()).len(), 4);
    }

    #[test]
    fn test_unknown_level_hidden_even_for_alpha() {
        let viewer = ViewerContext::for_session(Session::new("batman", ClearanceLevel::Alpha));
        let rows = vec![
            json!({"id": "x", "clearance_level": "OMEGA"}),
            json!({"id": "y"}),
            json!({"id": "z", "clearance_level": "delta"}),
        ];
        assert!(filter_visible(&viewer, rows).is_empty());
    }
}
