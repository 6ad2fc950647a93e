use super::item::{Item, ItemId, Price};
use crate::{Error, Result};

use std::path::Path;

/// One entry of a catalog file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub description: String,
    #[serde(default)]
    pub price: Price,
}

/// The static list of items a replica auctions, in auction order.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Default for Catalog {
    fn default() -> Self {
        let entry = |description: &str| CatalogEntry { description: description.to_owned(), price: 0.0 };
        Catalog {
            entries: vec![
                entry("Small hat from middle ages"),
                entry("Pirate Sword"),
                entry("Cupboard from victorian age"),
            ],
        }
    }
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Catalog { entries }
    }

    /// Reads a JSON array of `{ "description", "price" }` objects.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Catalog(format!("{}: {}", path.display(), e)))?;
        Catalog::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(contents)?;
        for entry in entries.iter() {
            if !entry.price.is_finite() || entry.price < 0.0 {
                return Err(Error::Catalog(format!(
                    "invalid price {} for {:?}",
                    entry.price, entry.description
                )));
            }
        }
        Ok(Catalog { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Assigns ids 1, 2, 3, ... in catalog order.
    pub fn items(&self) -> Vec<Item> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| Item::new((i + 1) as ItemId, e.description.clone(), e.price))
            .collect()
    }
}
