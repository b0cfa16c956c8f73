//! Turns resolved media items into a download plan.

use tracing::info;

use crate::files::dedupe_stems;
use crate::model::{MediaItem, SelectedStream};
use crate::selector::StreamSelector;

/// Select one stream per item, skipping items without an eligible stream.
///
/// Input order is preserved and every returned stream has a file stem that
/// no other stream in the plan shares.
pub fn plan_downloads(items: &[MediaItem], selector: &StreamSelector) -> Vec<SelectedStream> {
    let mut planned: Vec<SelectedStream> = items.iter().filter_map(|item| selector.select(item)).collect();
    dedupe_stems(planned.iter_mut().map(|s| &mut s.file_stem));

    let skipped = items.len() - planned.len();
    info!(
        items = items.len(),
        planned = planned.len(),
        skipped,
        "Download plan ready"
    );
    planned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StreamDescriptor;

    fn item(title: &str, ext: &str) -> MediaItem {
        MediaItem {
            title: title.to_string(),
            formats: vec![StreamDescriptor {
                title: None,
                url: format!("http://host/{title}"),
                extension: ext.to_string(),
                mime_class: "251 - audio only (medium)".to_string(),
                size_bytes: Some(1),
            }],
        }
    }

    #[test]
    fn skips_items_without_eligible_streams_and_keeps_order() {
        let items = vec![
            item("one", "webm"),
            item("two", "mp4"),
            item("three", "webm"),
        ];

        let plan = plan_downloads(&items, &StreamSelector::new());
        let titles: Vec<_> = plan.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["one", "three"]);
    }

    #[test]
    fn colliding_titles_get_distinct_stems() {
        let items = vec![item("a/b", "webm"), item("a:b", "webm"), item("a_b", "webm")];

        let plan = plan_downloads(&items, &StreamSelector::new());
        let stems: Vec<_> = plan.iter().map(|s| s.file_stem.as_str()).collect();
        assert_eq!(stems, ["a_b", "a_b (2)", "a_b (3)"]);
        // Titles are kept for display.
        assert_eq!(plan[1].title, "a:b");
    }
}
