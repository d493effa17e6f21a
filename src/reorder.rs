use tracing::{debug, warn};

use crate::{
    records::RecordStore,
    view::{has_active_filters, ColumnFilters, SortSpec},
    AppError, AppResult, LOG_TARGET,
};

pub const REORDER_DISABLED: &str = "VALIDATION/REORDER_DISABLED";
pub const REORDER_OUT_OF_RANGE: &str = "VALIDATION/REORDER_OUT_OF_RANGE";

/// Drag-and-drop is only meaningful when rows show in their natural order.
pub fn reorder_enabled(sort: &SortSpec, filters: &ColumnFilters, search: &str) -> bool {
    sort.is_natural_ascending() && !has_active_filters(filters) && search.trim().is_empty()
}

/// The full Id list after moving the row at `from` to `to`.
pub fn moved_ids(ids: &[String], from: usize, to: usize) -> AppResult<Vec<String>> {
    if from >= ids.len() || to >= ids.len() {
        return Err(AppError::new(REORDER_OUT_OF_RANGE, "That row cannot be moved there")
            .with_context("from", from.to_string())
            .with_context("to", to.to_string())
            .with_context("len", ids.len().to_string()));
    }
    let mut ordered = ids.to_vec();
    let moved = ordered.remove(from);
    ordered.insert(to, moved);
    Ok(ordered)
}

/// Move a row and persist the whole ordering. Rejected outside the natural view.
pub async fn move_row(
    store: &mut RecordStore,
    sort: &SortSpec,
    filters: &ColumnFilters,
    search: &str,
    from: usize,
    to: usize,
) -> AppResult<()> {
    if !reorder_enabled(sort, filters, search) {
        warn!(
            target: LOG_TARGET,
            event = "reorder_rejected",
            category_id = %store.category_id(),
            sort_key = %sort.key
        );
        return Err(AppError::new(
            REORDER_DISABLED,
            "Clear sorting, filters and search to reorder rows",
        ));
    }
    if from == to {
        return Ok(());
    }
    let ordered = moved_ids(&store.ids(), from, to)?;
    debug!(
        target: LOG_TARGET,
        event = "reorder_requested",
        category_id = %store.category_id(),
        from,
        to
    );
    store.reorder(ordered).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::SortDirection;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("r{i}")).collect()
    }

    #[test]
    fn moving_fourth_row_to_top() {
        let ordered = moved_ids(&ids(5), 3, 0).unwrap();
        assert_eq!(ordered, vec!["r3", "r0", "r1", "r2", "r4"]);
        let ordered = moved_ids(&ids(5), 0, 4).unwrap();
        assert_eq!(ordered, vec!["r1", "r2", "r3", "r4", "r0"]);
    }

    #[test]
    fn out_of_range_moves_are_rejected() {
        let err = moved_ids(&ids(2), 0, 2).unwrap_err();
        assert_eq!(err.code(), REORDER_OUT_OF_RANGE);
    }

    #[test]
    fn window_closes_for_any_sort_filter_or_search() {
        let natural = SortSpec::natural();
        let none = ColumnFilters::new();
        assert!(reorder_enabled(&natural, &none, ""));
        assert!(reorder_enabled(&natural, &none, "   "));
        assert!(!reorder_enabled(&natural, &none, "boiler"));
        assert!(!reorder_enabled(
            &SortSpec::by(crate::view::NATURAL_SORT_KEY, SortDirection::Desc),
            &none,
            ""
        ));
        assert!(!reorder_enabled(&SortSpec::by("item", SortDirection::Asc), &none, ""));

        let mut filters = ColumnFilters::new();
        filters.insert("item".into(), Default::default());
        assert!(reorder_enabled(&natural, &filters, ""));
        filters.insert("item".into(), ["Kettle".to_string()].into_iter().collect());
        assert!(!reorder_enabled(&natural, &filters, ""));
    }
}
