//! Keyed parameter tables with build-time completeness checks.

use std::collections::{BTreeMap, HashSet};

use crate::error::BuildError;

/// A named, ordered collection of unique entity identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySet {
    name: String,
    ids: Vec<String>,
}

impl EntitySet {
    pub fn new<I, S>(name: impl Into<String>, ids: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(ids.len());
        for id in &ids {
            if !seen.insert(id.as_str()) {
                return Err(BuildError::DuplicateEntity {
                    set: name,
                    id: id.clone(),
                });
            }
        }
        Ok(Self { name, ids })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|i| i == id)
    }
}

/// Parameter indexed by one entity key.
#[derive(Debug, Clone, Copy)]
pub struct ParamTable<'a> {
    name: &'static str,
    values: &'a BTreeMap<String, f64>,
}

impl<'a> ParamTable<'a> {
    pub fn new(name: &'static str, values: &'a BTreeMap<String, f64>) -> Self {
        Self { name, values }
    }

    /// Value for `key`. Missing or non-finite values fail the build.
    pub fn get(&self, key: &str) -> Result<f64, BuildError> {
        let value = self
            .values
            .get(key)
            .copied()
            .ok_or_else(|| BuildError::MissingParameter {
                table: self.name.to_string(),
                key: key.to_string(),
            })?;
        check_finite(self.name, key, value)
    }

    /// Like [`get`](Self::get) but also rejects negative values.
    pub fn non_negative(&self, key: &str) -> Result<f64, BuildError> {
        let value = self.get(key)?;
        if value < 0.0 {
            return Err(BuildError::InvalidParameter {
                table: self.name.to_string(),
                key: key.to_string(),
                value,
            });
        }
        Ok(value)
    }

    /// Value used as a divisor: zero is rejected.
    pub fn divisor(&self, key: &str) -> Result<f64, BuildError> {
        let value = self.get(key)?;
        if value == 0.0 {
            return Err(BuildError::ZeroDivisor {
                table: self.name.to_string(),
                key: key.to_string(),
            });
        }
        Ok(value)
    }
}

/// Parameter indexed by an (outer, inner) key pair, stored as nested maps.
#[derive(Debug, Clone, Copy)]
pub struct ParamGrid<'a> {
    name: &'static str,
    values: &'a BTreeMap<String, BTreeMap<String, f64>>,
}

impl<'a> ParamGrid<'a> {
    pub fn new(name: &'static str, values: &'a BTreeMap<String, BTreeMap<String, f64>>) -> Self {
        Self { name, values }
    }

    pub fn get(&self, outer: &str, inner: &str) -> Result<f64, BuildError> {
        let value = self
            .values
            .get(outer)
            .and_then(|row| row.get(inner))
            .copied()
            .ok_or_else(|| BuildError::MissingParameter {
                table: self.name.to_string(),
                key: format!("{}, {}", outer, inner),
            })?;
        check_finite(self.name, &format!("{}, {}", outer, inner), value)
    }

    pub fn non_negative(&self, outer: &str, inner: &str) -> Result<f64, BuildError> {
        let value = self.get(outer, inner)?;
        if value < 0.0 {
            return Err(BuildError::InvalidParameter {
                table: self.name.to_string(),
                key: format!("{}, {}", outer, inner),
                value,
            });
        }
        Ok(value)
    }
}

fn check_finite(table: &str, key: &str, value: f64) -> Result<f64, BuildError> {
    if !value.is_finite() {
        return Err(BuildError::InvalidParameter {
            table: table.to_string(),
            key: key.to_string(),
            value,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_entity_set_rejects_duplicates() {
        let err = EntitySet::new("weeks", ["w1", "w2", "w1"]).unwrap_err();
        assert_eq!(
            err,
            BuildError::DuplicateEntity {
                set: "weeks".to_string(),
                id: "w1".to_string()
            }
        );
    }

    #[test]
    fn test_missing_key_is_an_error_not_zero() {
        let values = table(&[("M1", 1000.0)]);
        let budget = ParamTable::new("budget", &values);
        assert_eq!(budget.get("M1").unwrap(), 1000.0);
        assert_eq!(
            budget.get("M2").unwrap_err(),
            BuildError::MissingParameter {
                table: "budget".to_string(),
                key: "M2".to_string()
            }
        );
    }

    #[test]
    fn test_divisor_rejects_zero() {
        let values = table(&[("recycling", 0.0)]);
        let cost = ParamTable::new("cost", &values);
        assert!(matches!(
            cost.divisor("recycling"),
            Err(BuildError::ZeroDivisor { .. })
        ));
    }

    #[test]
    fn test_non_finite_and_negative() {
        let values = table(&[("a", f64::NAN), ("b", -1.0)]);
        let t = ParamTable::new("t", &values);
        assert!(matches!(t.get("a"), Err(BuildError::InvalidParameter { .. })));
        assert!(t.get("b").is_ok());
        assert!(matches!(
            t.non_negative("b"),
            Err(BuildError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_grid_lookup() {
        let mut values = BTreeMap::new();
        values.insert("cardiology".to_string(), table(&[("w1", 5.0)]));
        let cap = ParamGrid::new("capacity", &values);
        assert_eq!(cap.get("cardiology", "w1").unwrap(), 5.0);
        assert!(cap.get("cardiology", "w2").is_err());
        assert!(cap.get("oncology", "w1").is_err());
    }
}
