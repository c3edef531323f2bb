use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::BuildError;

/// Anything usable as a composite variable key.
pub trait VarKey: Clone + Eq + Hash + fmt::Debug {}

impl<T: Clone + Eq + Hash + fmt::Debug> VarKey for T {}

static NEXT_REGISTRY: AtomicU32 = AtomicU32::new(1);

/// Handle to a decision variable. Only meaningful inside the registry that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId {
    registry: u32,
    index: u32,
}

impl VarId {
    pub fn index(self) -> usize {
        self.index as usize
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarDomain {
    /// Real value, lower bound 0
    Continuous,
    /// Whole number, lower bound 0
    Integer,
    /// 0 or 1
    Binary,
}

impl VarDomain {
    pub fn is_discrete(self) -> bool {
        !matches!(self, VarDomain::Continuous)
    }
}

impl fmt::Display for VarDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarDomain::Continuous => write!(f, "continuous"),
            VarDomain::Integer => write!(f, "integer"),
            VarDomain::Binary => write!(f, "binary"),
        }
    }
}

/// Allocates decision variables by typed key, one registry per model.
#[derive(Debug, Clone)]
pub struct VariableRegistry<K> {
    id: u32,
    keys: Vec<K>,
    domains: Vec<VarDomain>,
    index: HashMap<K, VarId>,
}

impl<K: VarKey> Default for VariableRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: VarKey> VariableRegistry<K> {
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed),
            keys: Vec::new(),
            domains: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Allocate a new variable. Declaring an existing key is a caller bug and always fails.
    pub fn declare(&mut self, key: K, domain: VarDomain) -> Result<VarId, BuildError> {
        if self.index.contains_key(&key) {
            return Err(BuildError::DuplicateVariable(format!("{:?}", key)));
        }
        let id = VarId {
            registry: self.id,
            index: self.keys.len() as u32,
        };
        self.keys.push(key.clone());
        self.domains.push(domain);
        self.index.insert(key, id);
        Ok(id)
    }

    /// Idempotent declaration: returns the existing handle when the key is already
    /// declared with the same domain.
    pub fn variable(&mut self, key: K, domain: VarDomain) -> Result<VarId, BuildError> {
        match self.index.get(&key) {
            Some(&id) => {
                let existing = self.domains[id.index()];
                if existing != domain {
                    return Err(BuildError::DomainConflict {
                        key: format!("{:?}", key),
                        existing: existing.to_string(),
                        requested: domain.to_string(),
                    });
                }
                Ok(id)
            }
            None => self.declare(key, domain),
        }
    }

    pub fn lookup(&self, key: &K) -> Result<VarId, BuildError> {
        self.index
            .get(key)
            .copied()
            .ok_or_else(|| BuildError::UndeclaredVariable(format!("{:?}", key)))
    }

    pub fn get(&self, key: &K) -> Option<VarId> {
        self.index.get(key).copied()
    }

    /// Check that a handle was issued by this registry.
    pub fn check(&self, id: VarId) -> Result<(), BuildError> {
        if id.registry != self.id || id.index() >= self.keys.len() {
            return Err(BuildError::ForeignVariable(id.index()));
        }
        Ok(())
    }

    pub fn key(&self, id: VarId) -> &K {
        &self.keys[id.index()]
    }

    pub fn domain(&self, id: VarId) -> VarDomain {
        self.domains[id.index()]
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Variables in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, &K, VarDomain)> + '_ {
        let registry = self.id;
        self.keys
            .iter()
            .zip(self.domains.iter())
            .enumerate()
            .map(move |(i, (k, d))| {
                (
                    VarId {
                        registry,
                        index: i as u32,
                    },
                    k,
                    *d,
                )
            })
    }
}
