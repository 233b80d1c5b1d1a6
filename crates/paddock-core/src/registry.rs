//! Unit catalog and registry.
//!
//! A [`Catalog`] lists categories with pricing and unit identifiers. The
//! [`Registry`] expands it into concrete [`Unit`]s with ids derived purely
//! from catalog data, so loading an unchanged catalog after a restart always
//! reproduces the same id set.
//!
//! # Identifier syntax
//!
//! - `"42"`: one unit, displayed as `42`, id `<category>-42`
//! - `"Verde ×2"`: two units, displayed as `Verde 1` and `Verde 2`, ids
//!   `<category>-verde-1` and `<category>-verde-2`

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::RegistryError,
    unit::{Unit, UnitId},
};

/// Marker separating a name from its multiplicity, e.g. `"Verde ×2"`.
const MULTIPLICITY_MARKER: &str = " ×";

/// One category of rentable units sharing a price list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Category name, e.g. `"Basic Karts"`.
    pub category: String,
    /// Unit identifiers, optionally with a `" ×N"` multiplicity suffix.
    pub idents: Vec<String>,
    /// Price of a 30 minute rental.
    pub price30: u32,
    /// Price of a one hour rental.
    pub price1h: u32,
}

/// The venue's static catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    /// Categories in display order.
    pub categories: Vec<CatalogEntry>,
}

impl Catalog {
    /// Catalog from its categories.
    pub fn new(categories: Vec<CatalogEntry>) -> Self {
        Self { categories }
    }
}

/// Lowercases and replaces each run of whitespace with a single `-`.
pub fn slugify(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join("-").to_lowercase()
}

/// Splits `"name ×N"` into `("name", Some(N))`; plain identifiers yield
/// `(ident, None)`.
fn parse_ident(ident: &str) -> (&str, Option<&str>) {
    match ident.rsplit_once(MULTIPLICITY_MARKER) {
        Some((name, count)) if !count.is_empty() && count.bytes().all(|b| b.is_ascii_digit()) => {
            (name.trim(), Some(count))
        },
        _ => (ident.trim(), None),
    }
}

/// Catalog expanded into uniquely identified units.
#[derive(Debug, Clone)]
pub struct Registry {
    /// Units with pristine (available) state, in catalog order.
    units: Vec<Unit>,
    /// Unit id to position in `units`.
    index: HashMap<UnitId, usize>,
}

impl Registry {
    /// Expand `catalog` into units.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::DuplicateId`] if two entries slugify to the same id
    /// - [`RegistryError::InvalidEntry`] for a blank name or a zero
    ///   multiplicity
    pub fn load(catalog: &Catalog) -> Result<Self, RegistryError> {
        let mut registry = Self { units: Vec::new(), index: HashMap::new() };

        for entry in &catalog.categories {
            let category_slug = slugify(&entry.category);

            for ident in &entry.idents {
                let invalid = |reason| RegistryError::InvalidEntry {
                    category: entry.category.clone(),
                    ident: ident.clone(),
                    reason,
                };

                let (name, count) = parse_ident(ident);
                if name.is_empty() {
                    return Err(invalid("blank unit name"));
                }

                match count {
                    None => {
                        let id = format!("{category_slug}-{}", slugify(name));
                        registry.insert(entry, id, name.to_owned())?;
                    },
                    Some(count) => {
                        let count: u32 =
                            count.parse().map_err(|_| invalid("multiplicity out of range"))?;
                        if count == 0 {
                            return Err(invalid("multiplicity must be at least 1"));
                        }
                        let name_slug = slugify(name);
                        for i in 1..=count {
                            let id = format!("{category_slug}-{name_slug}-{i}");
                            registry.insert(entry, id, format!("{name} {i}"))?;
                        }
                    },
                }
            }
        }

        Ok(registry)
    }

    fn insert(
        &mut self,
        entry: &CatalogEntry,
        id: String,
        display_name: String,
    ) -> Result<(), RegistryError> {
        let id = UnitId::from(id);
        if let Some(&existing) = self.index.get(&id) {
            return Err(RegistryError::DuplicateId {
                id,
                first: self.units[existing].display_name().to_owned(),
                second: display_name,
            });
        }

        self.index.insert(id.clone(), self.units.len());
        self.units.push(Unit::new(
            id,
            display_name,
            entry.category.clone(),
            entry.price30,
            entry.price1h,
        ));
        Ok(())
    }

    /// Pristine unit by id.
    pub fn get(&self, id: &str) -> Option<&Unit> {
        self.index.get(id).map(|&i| &self.units[i])
    }

    /// Whether `id` names a catalog unit.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Position of `id` in catalog order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Pristine units in catalog order.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the catalog expanded to no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
