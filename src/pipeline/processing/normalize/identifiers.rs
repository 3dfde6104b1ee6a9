use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use crate::types::Cell;

/// UUID → human-readable name table built from an export
#[derive(Debug, Clone, Default)]
pub struct IdentifierLookup {
    names: HashMap<Uuid, String>,
}

impl IdentifierLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<S: Into<String>>(&mut self, id: Uuid, name: S) {
        self.names.insert(id, name.into());
    }

    pub fn get(&self, id: &Uuid) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Replace every comma-separated token of `cell` that is a known UUID with
    /// its name. Other tokens, separators and surrounding whitespace are kept
    /// as they are; non-text cells are returned unchanged.
    pub fn resolve(&self, cell: &Cell) -> Cell {
        let Cell::Text(text) = cell else {
            return cell.clone();
        };

        let pieces: Vec<String> = text
            .split(',')
            .map(|piece| {
                let token = piece.trim();
                match Uuid::parse_str(token) {
                    Ok(id) => match self.get(&id) {
                        Some(name) => piece.replacen(token, name, 1),
                        None => {
                            warn!("No name found for identifier {}", token);
                            piece.to_string()
                        }
                    },
                    Err(_) => piece.to_string(),
                }
            })
            .collect();

        Cell::Text(pieces.join(","))
    }
}

impl FromIterator<(Uuid, String)> for IdentifierLookup {
    fn from_iter<I: IntoIterator<Item = (Uuid, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}
