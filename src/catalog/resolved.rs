//! Resolved catalog: config validated and flattened for runtime lookup.

use crate::catalog::types::{ContextKind, SearchConfig, SortConfig};
use crate::plan::FieldRef;
use crate::sql::Expr;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct ResolvedAssociation {
    pub table: String,
    pub match_column: String,
    /// Extra conditions ANDed into the association join.
    pub clause: Option<Expr>,
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub name: String,
    pub table: String,
    pub key_column: String,
    pub default_sort: Vec<SortConfig>,
    pub search: Option<SearchConfig>,
    pub batch_columns: Vec<String>,
    /// Associated model name -> join configuration.
    pub associations: HashMap<String, ResolvedAssociation>,
}

/// The static field/facet registry: one immutable descriptor per
/// (model, context, name), populated once at startup. Lookup replaces the
/// string-switch facet factories of older designs.
#[derive(Clone, Debug, Default)]
pub struct FieldCatalog {
    pub(crate) models: HashMap<String, ResolvedModel>,
    pub(crate) fields: HashMap<(String, ContextKind), Vec<FieldRef>>,
}

impl FieldCatalog {
    pub fn model(&self, name: &str) -> Option<&ResolvedModel> {
        self.models.get(name)
    }

    /// All fields for a (model, context), in config order.
    pub fn fields(&self, model: &str, context: ContextKind) -> &[FieldRef] {
        self.fields
            .get(&(model.to_string(), context))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Look a field up by name in the given context, falling back to the
    /// facet context (a sortable or filterable column is usually a facet).
    pub fn field(&self, model: &str, context: ContextKind, name: &str) -> Option<&FieldRef> {
        self.fields(model, context)
            .iter()
            .find(|f| f.name == name)
            .or_else(|| {
                if context != ContextKind::Facet {
                    self.fields(model, ContextKind::Facet)
                        .iter()
                        .find(|f| f.name == name)
                } else {
                    None
                }
            })
    }

    pub fn facet(&self, model: &str, name: &str) -> Option<&FieldRef> {
        self.field(model, ContextKind::Facet, name)
    }

    /// Fields shown when the request names none: order > 0, ascending.
    pub fn default_fields(&self, model: &str, context: ContextKind) -> Vec<FieldRef> {
        let mut fields: Vec<FieldRef> = self
            .fields(model, context)
            .iter()
            .filter(|f| f.order > 0)
            .cloned()
            .collect();
        fields.sort_by_key(|f| f.order);
        fields
    }

    /// Facets fetched when the request names none.
    pub fn default_facets(&self, model: &str) -> Vec<FieldRef> {
        let mut facets: Vec<FieldRef> = self
            .fields(model, ContextKind::Facet)
            .iter()
            .filter(|f| f.is_default)
            .cloned()
            .collect();
        facets.sort_by_key(|f| f.order);
        facets
    }
}
