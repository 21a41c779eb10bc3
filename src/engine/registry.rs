//! Mechanism → table resolution.

use std::collections::HashMap;

use crate::compiler::predicate::is_identifier;
use crate::error::EngineError;
use crate::model::Rule;

/// Read-only lookup from game-design mechanism (ITEM, SKILL, NPC, ...) to
/// physical table. Maintained by the authoring surface; the engine never
/// mutates it.
#[derive(Debug, Clone, Default)]
pub struct MechanismRegistry {
    tables: HashMap<String, String>,
}

impl MechanismRegistry {
    pub fn new(entries: &HashMap<String, String>) -> Self {
        let tables = entries
            .iter()
            .map(|(mechanism, table)| (mechanism.to_uppercase(), table.clone()))
            .collect();
        Self { tables }
    }

    pub fn resolve(&self, mechanism: &str) -> Result<String, EngineError> {
        self.tables
            .get(&mechanism.to_uppercase())
            .cloned()
            .ok_or_else(|| EngineError::UnknownMechanism {
                mechanism: mechanism.to_string(),
            })
    }

    /// An explicit `target_table` wins; otherwise the mechanism is looked up.
    /// The resulting name must be a plain identifier before it reaches SQL.
    pub fn resolve_table(&self, rule: &Rule) -> Result<String, EngineError> {
        let table = match &rule.target_table {
            Some(table) => table.clone(),
            None => self.resolve(&rule.target_mechanism)?,
        };
        if !is_identifier(&table) {
            return Err(EngineError::InvalidTableName { table });
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MechanismRegistry {
        let mut entries = HashMap::new();
        entries.insert("ITEM".to_string(), "items".to_string());
        entries.insert("skill".to_string(), "skills".to_string());
        MechanismRegistry::new(&entries)
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(registry().resolve("item").unwrap(), "items");
        assert_eq!(registry().resolve("SKILL").unwrap(), "skills");
    }

    #[test]
    fn unknown_mechanism_fails() {
        assert!(matches!(
            registry().resolve("PET"),
            Err(EngineError::UnknownMechanism { .. })
        ));
    }

    #[test]
    fn explicit_table_wins() {
        let rule = Rule::new("r", "PET").with_table("pets");
        assert_eq!(registry().resolve_table(&rule).unwrap(), "pets");
    }

    #[test]
    fn hostile_table_names_are_rejected() {
        let rule = Rule::new("r", "ITEM").with_table("items; DROP TABLE items");
        assert!(matches!(
            registry().resolve_table(&rule),
            Err(EngineError::InvalidTableName { .. })
        ));
    }
}
