//! Resource merging for content compositing.
//!
//! Merges one Resources dictionary into another, category by category.
//! Entries that already denote the same object are shared; a name that is
//! taken by a different object gets a fresh name, and the returned
//! [`ResourceRenames`] tells the caller which content operands to rewrite.

use crate::content::ResourceRenames;
use crate::document::Document;
use crate::object::{Dictionary, Object};

/// Resource categories with the prefix used for fresh names.
pub const CATEGORIES: [(&str, &str); 7] = [
    ("Font", "F"),
    ("XObject", "X"),
    ("ExtGState", "GS"),
    ("ColorSpace", "CS"),
    ("Pattern", "P"),
    ("Shading", "Sh"),
    ("Properties", "MC"),
];

/// Category dictionary of `resources`, resolved and copied.
fn category(doc: &Document, resources: &Dictionary, name: &str) -> Dictionary {
    resources
        .get(name)
        .map(|o| doc.resolve(o))
        .and_then(Object::as_dict)
        .cloned()
        .unwrap_or_default()
}

/// A Resources dictionary being merged into.
#[derive(Debug, Clone, Default)]
pub struct ResourceManager {
    resources: Dictionary,
}

impl ResourceManager {
    /// Start from a page's resources. Category dictionaries are copied, so
    /// the result never aliases a shared or inherited dictionary.
    pub fn from_resources(doc: &Document, resources: &Dictionary) -> Self {
        let mut merged = resources.clone();
        for (name, _) in CATEGORIES {
            let table = category(doc, resources, name);
            if table.is_empty() {
                merged.remove(name);
            } else {
                merged.insert(name.to_string(), Object::Dictionary(table));
            }
        }
        if let Some(procset) = resources.get("ProcSet") {
            merged.insert("ProcSet".to_string(), doc.resolve(procset).clone());
        }
        Self { resources: merged }
    }

    fn table(&self, name: &str) -> Option<&Dictionary> {
        self.resources.get(name).and_then(Object::as_dict)
    }

    /// Entries of one category.
    pub fn names(&self, category: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .table(category)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// The lowest `<prefix><n>` taken by neither this table nor `other`.
    pub fn fresh_name(&self, category: &str, prefix: &str, other: &Dictionary) -> String {
        let taken = |n: &str| {
            self.table(category).is_some_and(|t| t.contains_key(n)) || other.contains_key(n)
        };
        let mut n = 1usize;
        loop {
            let candidate = format!("{}{}", prefix, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Merge `overlay` (resolved against `doc`) into this table.
    pub fn merge(&mut self, doc: &Document, overlay: &Dictionary) -> ResourceRenames {
        let mut renames = ResourceRenames::new();

        for (name, prefix) in CATEGORIES {
            let incoming = category(doc, overlay, name);
            let mut entries: Vec<_> = incoming.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            for (key, value) in entries {
                let existing = self.table(name).and_then(|t| t.get(key));
                let target_name = match existing {
                    None => key.clone(),
                    Some(current) if current == value => continue,
                    Some(_) => {
                        let fresh = self.fresh_name(name, prefix, &incoming);
                        renames
                            .entry(name.to_string())
                            .or_default()
                            .insert(key.clone(), fresh.clone());
                        fresh
                    },
                };
                if let Some(table) = self
                    .resources
                    .entry(name.to_string())
                    .or_insert_with(|| Object::Dictionary(Dictionary::new()))
                    .as_dict_mut()
                {
                    table.insert(target_name, value.clone());
                }
            }
        }

        if let Some(procs) = overlay.get("ProcSet").map(|p| doc.resolve(p)).and_then(Object::as_array) {
            let mut union = self
                .resources
                .get("ProcSet")
                .and_then(Object::as_array)
                .cloned()
                .unwrap_or_default();
            for p in procs {
                if !union.contains(p) {
                    union.push(p.clone());
                }
            }
            self.resources.insert("ProcSet".to_string(), Object::Array(union));
        }

        renames
    }

    /// The merged dictionary.
    pub fn into_resources(self) -> Dictionary {
        self.resources
    }
}
