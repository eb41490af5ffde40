//! Registre de noms générique, partagé par les types et les types d'erreur.

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, Result};

/// Vrai si `name` est non vide et composé uniquement d'alphanumériques ASCII et de `.`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'.')
}

/// Table nom → valeur, dans l'ordre d'enregistrement.
#[derive(Debug, Clone)]
pub struct NameRegistry<T> {
    entries: IndexMap<String, T>,
}

impl<T> Default for NameRegistry<T> {
    fn default() -> Self { Self { entries: IndexMap::new() } }
}

impl<T: Clone> NameRegistry<T> {
    /// Registre vide.
    pub fn new() -> Self { Self::default() }

    /// Enregistre `value` sous `name`.
    pub fn register(&mut self, name: &str, value: T) -> Result<()> {
        if !is_valid_name(name) {
            return Err(Error::new(ErrorKind::InvalidName, format!("invalid name `{name}`")));
        }
        if self.entries.contains_key(name) {
            return Err(Error::new(ErrorKind::RepeatedName, format!("`{name}` is already registered")));
        }
        self.entries.insert(name.to_owned(), value);
        Ok(())
    }

    /// Valeur enregistrée sous `name`.
    pub fn lookup(&self, name: &str) -> Option<T> { self.entries.get(name).cloned() }

    /// Vrai si `name` est enregistré.
    pub fn contains(&self, name: &str) -> bool { self.entries.contains_key(name) }

    /// Nombre d'entrées.
    pub fn len(&self) -> usize { self.entries.len() }

    /// Vrai si le registre est vide.
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Noms, dans l'ordre d'enregistrement.
    pub fn names(&self) -> impl Iterator<Item = &str> { self.entries.keys().map(String::as_str) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_rules() {
        assert!(is_valid_name("nuvm.Boolean"));
        assert!(is_valid_name("a1.b2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("with space"));
        assert!(!is_valid_name("dash-ed"));
    }

    #[test]
    fn register_and_lookup() -> Result<()> {
        let mut reg = NameRegistry::new();
        reg.register("one", 1)?;
        reg.register("two", 2)?;
        assert_eq!(reg.lookup("two"), Some(2));
        assert_eq!(reg.lookup("three"), None);
        assert_eq!(reg.names().collect::<Vec<_>>(), ["one", "two"]);

        let err = reg.register("one", 10).unwrap_err();
        assert!(err.is(&ErrorKind::RepeatedName));
        assert_eq!(reg.lookup("one"), Some(1));

        let err = reg.register("", 0).unwrap_err();
        assert!(err.is(&ErrorKind::InvalidName));
        assert_eq!(reg.len(), 2);
        Ok(())
    }
}
