use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Prepared statements keyed by name, each remembering the SQL it was
/// prepared from.
///
/// Names are digests of the SQL, so a name only identifies a statement
/// together with its text. An entry is reused only when the stored SQL
/// matches.
#[derive(Debug)]
pub(super) struct StatementRegistry<S> {
    entries: Mutex<HashMap<String, Registered<S>>>,
}

#[derive(Debug)]
struct Registered<S> {
    sql: String,
    statement: S,
}

#[derive(Debug, PartialEq)]
pub(super) enum Lookup<S> {
    Hit(S),
    Miss,
    /// The name is taken by different SQL.
    Collision,
}

impl<S: Clone> StatementRegistry<S> {
    pub(super) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(super) fn get(&self, name: &str, sql: &str) -> Lookup<S> {
        match self.lock().get(name) {
            Some(entry) if entry.sql == sql => Lookup::Hit(entry.statement.clone()),
            Some(_) => Lookup::Collision,
            None => Lookup::Miss,
        }
    }

    /// Register `statement` unless `name` is already taken.
    ///
    /// Returns the registered statement for the same SQL, or `statement`
    /// itself when the name belongs to other SQL.
    pub(super) fn insert_if_absent(&self, name: &str, sql: &str, statement: S) -> S {
        match self.lock().entry(name.to_string()) {
            Entry::Occupied(entry) if entry.get().sql == sql => entry.get().statement.clone(),
            Entry::Occupied(_) => statement,
            Entry::Vacant(entry) => {
                entry.insert(Registered {
                    sql: sql.to_string(),
                    statement: statement.clone(),
                });
                statement
            }
        }
    }

    /// Remove the entry under `name` if `is_same` accepts its statement.
    pub(super) fn remove_if(&self, name: &str, is_same: impl FnOnce(&S) -> bool) -> bool {
        let mut entries = self.lock();
        let same = entries
            .get(name)
            .is_some_and(|entry| is_same(&entry.statement));
        if same {
            entries.remove(name);
        }
        same
    }

    pub(super) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Registered<S>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
