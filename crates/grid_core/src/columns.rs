//! Column descriptor normalization.

use std::sync::Arc;

use shared::domain::{ColumnExtension, ColumnSpec, GridColumn, SortingExtension};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedColumns {
    pub columns: Vec<GridColumn>,
    pub column_extensions: Vec<ColumnExtension>,
    pub sorting_extensions: Vec<SortingExtension>,
}

impl NormalizedColumns {
    pub fn column(&self, name: &str) -> Option<&GridColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns with sorting explicitly disabled report false; everything
    /// else is sortable.
    pub fn is_sortable(&self, name: &str) -> bool {
        self.sorting_extensions
            .iter()
            .find(|ext| ext.column_name == name)
            .map_or(true, |ext| ext.sorting_enabled)
    }
}

pub fn normalize_columns(specs: &[ColumnSpec]) -> NormalizedColumns {
    let mut out = NormalizedColumns::default();
    for spec in specs {
        out.columns.push(GridColumn {
            name: spec.name.clone(),
            title: spec.title.clone(),
        });

        if spec.width.is_some() || spec.align.is_some() || spec.word_wrap_enabled.is_some() {
            out.column_extensions.push(ColumnExtension {
                column_name: spec.name.clone(),
                width: spec.width,
                align: spec.align,
                word_wrap_enabled: spec.word_wrap_enabled,
            });
        }

        if let Some(disabled) = spec.sorting_disabled {
            out.sorting_extensions.push(SortingExtension {
                column_name: spec.name.clone(),
                sorting_enabled: !disabled,
            });
        }
    }
    out
}

/// Caches the normalized form of one column list. A new list recomputes only
/// when it is a different allocation than the cached one.
#[derive(Debug)]
pub struct ColumnNormalizer {
    source: Arc<[ColumnSpec]>,
    normalized: Arc<NormalizedColumns>,
}

impl ColumnNormalizer {
    pub fn new(source: Arc<[ColumnSpec]>) -> Self {
        let normalized = Arc::new(normalize_columns(&source));
        Self { source, normalized }
    }

    /// Returns true when the list identity changed and the cache was rebuilt.
    pub fn update(&mut self, source: Arc<[ColumnSpec]>) -> bool {
        if Arc::ptr_eq(&self.source, &source) {
            return false;
        }
        self.normalized = Arc::new(normalize_columns(&source));
        self.source = source;
        true
    }

    pub fn specs(&self) -> &Arc<[ColumnSpec]> {
        &self.source
    }

    pub fn normalized(&self) -> Arc<NormalizedColumns> {
        Arc::clone(&self.normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::Align;

    fn specs() -> Arc<[ColumnSpec]> {
        Arc::from(vec![
            ColumnSpec::new("id", "ID").width(80).align(Align::Right),
            ColumnSpec::new("name", "Name"),
            ColumnSpec::new("email", "Email").sorting_disabled(true),
            ColumnSpec::new("balance", "Balance")
                .word_wrap(false)
                .sorting_disabled(false),
        ])
    }

    #[test]
    fn splits_columns_and_extensions_in_one_pass() {
        let normalized = normalize_columns(&specs());

        let names: Vec<_> = normalized.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "name", "email", "balance"]);

        assert_eq!(normalized.column_extensions.len(), 2);
        assert_eq!(normalized.column_extensions[0].column_name, "id");
        assert_eq!(normalized.column_extensions[0].width, Some(80));
        assert_eq!(normalized.column_extensions[1].word_wrap_enabled, Some(false));

        assert_eq!(
            normalized.sorting_extensions,
            vec![
                SortingExtension {
                    column_name: "email".into(),
                    sorting_enabled: false,
                },
                SortingExtension {
                    column_name: "balance".into(),
                    sorting_enabled: true,
                },
            ]
        );
        assert!(!normalized.is_sortable("email"));
        assert!(normalized.is_sortable("name"));
    }

    #[test]
    fn recomputes_only_on_new_list_identity() {
        let source = specs();
        let mut normalizer = ColumnNormalizer::new(Arc::clone(&source));
        let first = normalizer.normalized();

        assert!(!normalizer.update(Arc::clone(&source)));
        assert!(Arc::ptr_eq(&first, &normalizer.normalized()));

        let equal_but_new: Arc<[ColumnSpec]> = Arc::from(source.to_vec());
        assert!(normalizer.update(equal_but_new));
        assert!(!Arc::ptr_eq(&first, &normalizer.normalized()));
        assert_eq!(*first, *normalizer.normalized());
    }
}
