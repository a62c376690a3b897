//! Dataset merge.
//!
//! Concatenates per-account datasets into one, keeping the first usable
//! header and tagging every data row with the label of the source it came
//! from.

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::models::Dataset;

/// Header of the provenance column appended to the merged dataset.
pub const DEFAULT_SOURCE_COLUMN: &str = "source";

/// Options for [`merge_datasets_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Header of the trailing provenance column.
    pub source_column: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            source_column: DEFAULT_SOURCE_COLUMN.to_string(),
        }
    }
}

/// Merges labelled datasets with the default options.
///
/// See [`merge_datasets_with`].
pub fn merge_datasets(sources: Vec<(String, Dataset)>) -> Result<Dataset, CoreError> {
    merge_datasets_with(sources, &MergeOptions::default())
}

/// Merges labelled datasets in source order.
///
/// - The header of the first source that has one becomes the merged header,
///   followed by `options.source_column`.
/// - Every usable source, the first included, contributes its rows after the
///   header, each followed by the source label.
/// - Data rows are padded with empty cells, or cut, to the merged header's
///   width so the result is rectangular.
/// - Sources with no rows are skipped.
///
/// Fails with [`CoreError::NoValidData`] if no source has a header row.
pub fn merge_datasets_with(
    sources: Vec<(String, Dataset)>,
    options: &MergeOptions,
) -> Result<Dataset, CoreError> {
    let offered = sources.len();
    let mut header: Option<Vec<String>> = None;
    let mut rows: Vec<Vec<String>> = Vec::new();

    for (label, dataset) in sources {
        if dataset.is_empty() {
            warn!(source = %label, "Source has no rows, excluded from merge");
            continue;
        }

        let mut source_rows = dataset.into_rows().into_iter();
        let source_header = source_rows.next().unwrap_or_default();
        let width = header
            .get_or_insert_with(|| {
                debug!(source = %label, columns = source_header.len(), "Using header from source");
                source_header
            })
            .len();

        let mut appended = 0usize;
        for mut row in source_rows {
            if row.len() > width && row[width..].iter().any(|cell| !cell.is_empty()) {
                warn!(
                    source = %label,
                    cells = row.len(),
                    width,
                    "Row wider than merged header, extra cells dropped"
                );
            }
            row.resize(width, String::new());
            row.push(label.clone());
            rows.push(row);
            appended += 1;
        }
        debug!(source = %label, rows = appended, "Source merged");
    }

    let Some(mut header) = header else {
        return Err(CoreError::NoValidData { sources: offered });
    };
    header.push(options.source_column.clone());

    let mut merged = Vec::with_capacity(rows.len() + 1);
    merged.push(header);
    merged.extend(rows);
    Ok(Dataset::new(merged))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(label: &str, rows: &[&[&str]]) -> (String, Dataset) {
        (label.to_string(), Dataset::from_str_rows(rows))
    }

    #[test]
    fn test_two_sources_merge_with_provenance() {
        let merged = merge_datasets(vec![
            labelled("A", &[&["h1", "h2"], &["1", "2"]]),
            labelled("B", &[&["h1", "h2"], &["3", "4"]]),
        ])
        .unwrap();

        assert_eq!(
            merged,
            Dataset::from_str_rows(&[
                &["h1", "h2", "source"],
                &["1", "2", "A"],
                &["3", "4", "B"],
            ])
        );
    }

    #[test]
    fn test_no_sources_is_no_valid_data() {
        let err = merge_datasets(Vec::new()).unwrap_err();
        assert!(matches!(err, CoreError::NoValidData { sources: 0 }));
    }

    #[test]
    fn test_only_empty_sources_is_no_valid_data() {
        let err = merge_datasets(vec![labelled("A", &[]), labelled("B", &[])]).unwrap_err();
        assert!(matches!(err, CoreError::NoValidData { sources: 2 }));
    }

    #[test]
    fn test_header_only_source_contributes_no_rows() {
        let merged = merge_datasets(vec![
            labelled("A", &[&["h1"]]),
            labelled("B", &[&["h1"], &["x"]]),
        ])
        .unwrap();

        assert_eq!(merged.row_count(), 2);
        assert_eq!(merged.header().unwrap(), ["h1", "source"]);
        assert_eq!(merged.data_rows()[0], ["x", "B"]);
    }

    #[test]
    fn test_empty_first_source_does_not_supply_header() {
        let merged = merge_datasets(vec![
            labelled("A", &[]),
            labelled("B", &[&["name"], &["Ana"]]),
        ])
        .unwrap();

        assert_eq!(merged.header().unwrap(), ["name", "source"]);
        assert_eq!(merged.data_rows(), [vec!["Ana".to_string(), "B".to_string()]]);
    }

    #[test]
    fn test_rows_normalized_to_header_width() {
        let merged = merge_datasets(vec![
            labelled("A", &[&["a", "b", "c"], &["1"]]),
            labelled("B", &[&["a", "b"], &["1", "2", "3", ""]]),
        ])
        .unwrap();

        assert!(merged.is_rectangular());
        assert_eq!(merged.data_rows()[0], ["1", "", "", "A"]);
        assert_eq!(merged.data_rows()[1], ["1", "2", "3", "B"]);
    }

    #[test]
    fn test_row_count_invariant() {
        let sources = vec![
            labelled("A", &[&["h"], &["1"], &["2"]]),
            labelled("B", &[&["h"]]),
            labelled("C", &[&["h"], &["3"], &["4"], &["5"]]),
        ];
        let expected: usize = sources.iter().map(|(_, d)| d.row_count() - 1).sum::<usize>() + 1;

        let merged = merge_datasets(sources).unwrap();
        assert_eq!(merged.row_count(), expected);
    }

    #[test]
    fn test_custom_source_column() {
        let options = MergeOptions {
            source_column: "Doctor".to_string(),
        };
        let merged =
            merge_datasets_with(vec![labelled("Ana", &[&["h"], &["1"]])], &options).unwrap();
        assert_eq!(merged.header().unwrap(), ["h", "Doctor"]);
    }
}
