//! Projection - (items, filters) から表示用の部分列を導出する
//!
//! # 性質
//! - 純関数（入力を変更しない）
//! - 述語はすべて AND で合成、順序非依存
//! - 冪等: project(project(xs, f), f) == project(xs, f)
//! - 元の相対順序を保つ（明示ソート指定時を除く）

use std::cmp::Ordering;

use crate::domain::{FilterDescriptor, FilterValue, Item, SortDirection, SortKey};

/// Whether `item` satisfies every non-"all" dimension and the query.
pub fn matches<T: Item>(item: &T, filters: &FilterDescriptor) -> bool {
    let dimensions_ok = filters.dimensions().all(|(dimension, value)| match value {
        FilterValue::All => true,
        // 多値の次元はどれか 1 つが一致すればよい
        FilterValue::Value(wanted) => item
            .dimension_values(dimension)
            .iter()
            .any(|v| v.as_ref() == wanted.as_str()),
    });
    dimensions_ok && matches_query(item, filters.query())
}

fn matches_query<T: Item>(item: &T, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    item.search_fields()
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

/// Visible subsequence of `items`, in input order.
pub fn project<T: Item>(items: &[T], filters: &FilterDescriptor) -> Vec<T> {
    items
        .iter()
        .filter(|item| matches(*item, filters))
        .cloned()
        .collect()
}

/// `project` followed by a stable sort on `sort`.
///
/// Items without a value for the sort field go last in either direction.
pub fn project_sorted<T: Item>(
    items: &[T],
    filters: &FilterDescriptor,
    sort: Option<&SortKey>,
) -> Vec<T> {
    let mut visible = project(items, filters);
    let Some(sort) = sort else {
        return visible;
    };

    visible.sort_by(|a, b| {
        match (a.sort_value(&sort.field), b.sort_value(&sort.field)) {
            (Some(a), Some(b)) => {
                let ord = a.compare(&b);
                match sort.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Asset, AssetId, AssetStatus, FileFormat, ItemMeta};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn asset(id: &str, name: &str, format: FileFormat, tags: &[&str]) -> Asset {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Asset {
            id: AssetId::new(id),
            name: name.to_string(),
            file_format: format,
            status: AssetStatus::Ready,
            property: None,
            property_type: None,
            folder: None,
            size_bytes: 0,
            url: None,
            thumbnail_url: None,
            progress: 0,
            created_at: at,
            updated_at: at,
            meta: ItemMeta::with_tags(tags.iter().copied()),
        }
    }

    fn library() -> Vec<Asset> {
        vec![
            asset("1", "Kitchen.jpg", FileFormat::Image, &["kitchen", "interior"]),
            asset("2", "Tour.mp4", FileFormat::Video, &["kitchen"]),
            asset("3", "Garden.jpg", FileFormat::Image, &["exterior"]),
        ]
    }

    fn ids(items: &[Asset]) -> Vec<&str> {
        items.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn all_filters_show_everything_in_order() {
        let items = library();
        let filters = FilterDescriptor::all_of(&["fileFormat", "tag"]);
        assert_eq!(ids(&project(&items, &filters)), vec!["1", "2", "3"]);
    }

    #[test]
    fn dimensions_and_query_conjoin() {
        let items = library();
        let filters = FilterDescriptor::all_of(&["fileFormat", "tag"])
            .with("fileFormat", "image")
            .with("tag", "kitchen");
        assert_eq!(ids(&project(&items, &filters)), vec!["1"]);

        let by_query = FilterDescriptor::default().with_query("GARDEN");
        assert_eq!(ids(&project(&items, &by_query)), vec!["3"]);

        // query matches tags too
        let by_tag_text = FilterDescriptor::default().with_query("exter");
        assert_eq!(ids(&project(&items, &by_tag_text)), vec!["3"]);
    }

    #[test]
    fn unknown_dimension_with_value_matches_nothing() {
        let items = library();
        let filters = FilterDescriptor::default().with("camera", "canon");
        assert!(project(&items, &filters).is_empty());
    }

    #[test]
    fn explicit_sort_is_stable_and_puts_missing_last() {
        let mut items = library();
        items[1].property = Some("B".into());
        items[2].property = Some("a".into());

        let sorted = project_sorted(&items, &FilterDescriptor::default(), Some(&SortKey::ascending("property")));
        assert_eq!(ids(&sorted), vec!["3", "2", "1"]);

        let desc = project_sorted(&items, &FilterDescriptor::default(), Some(&SortKey::descending("property")));
        assert_eq!(ids(&desc), vec!["2", "3", "1"]);

        let unsorted = project_sorted(&items, &FilterDescriptor::default(), None);
        assert_eq!(ids(&unsorted), vec!["1", "2", "3"]);
    }

    fn arb_asset() -> impl Strategy<Value = Asset> {
        (
            0u32..1000,
            "[a-z]{1,6}",
            prop::sample::select(vec![FileFormat::Image, FileFormat::Video, FileFormat::Document]),
            prop::collection::vec(prop::sample::select(vec!["kitchen", "exterior", "pool"]), 0..3),
        )
            .prop_map(|(n, name, format, tags)| asset(&n.to_string(), &name, format, &tags))
    }

    fn arb_filters() -> impl Strategy<Value = FilterDescriptor> {
        (
            prop::sample::select(vec!["all", "image", "video"]),
            prop::sample::select(vec!["all", "kitchen", "pool"]),
            "[a-z]{0,2}",
        )
            .prop_map(|(format, tag, query)| {
                FilterDescriptor::default()
                    .with("fileFormat", format)
                    .with("tag", tag)
                    .with_query(query)
            })
    }

    proptest! {
        #[test]
        fn projection_is_idempotent(items in prop::collection::vec(arb_asset(), 0..20), filters in arb_filters()) {
            let once = project(&items, &filters);
            let twice = project(&once, &filters);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn projection_preserves_relative_order(items in prop::collection::vec(arb_asset(), 0..20), filters in arb_filters()) {
            let visible = project(&items, &filters);
            // visible は items の部分列
            let mut cursor = items.iter();
            for v in &visible {
                prop_assert!(cursor.any(|i| i == v));
            }
        }

        #[test]
        fn projection_equals_conjunction(items in prop::collection::vec(arb_asset(), 0..20), filters in arb_filters()) {
            let visible = project(&items, &filters);
            let expected: Vec<Asset> = items.iter().filter(|i| matches(*i, &filters)).cloned().collect();
            prop_assert_eq!(visible, expected);
        }
    }
}
