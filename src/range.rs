//! Registry of tracked (ranged) literals.
//!
//! A literal is tracked once a `range(...)` declaration or an event
//! postcondition makes it bivalent in the epistemic model. Both polarities
//! are always registered together.

use std::collections::HashSet;

use crate::syntax::Literal;

/// Insertion-ordered set of tracked ground literals.
#[derive(Debug, Clone, Default)]
pub struct RangeRegistry {
    order: Vec<Literal>,
    members: HashSet<Literal>,
}

fn key(literal: &Literal) -> Literal {
    literal.without_annots()
}

impl RangeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, literal: Literal) -> bool {
        if self.members.insert(literal.clone()) {
            self.order.push(literal);
            true
        } else {
            false
        }
    }

    /// Registers `literal` and its complement. Returns true if either was new.
    pub fn register_both(&mut self, literal: &Literal) -> bool {
        let pos = key(literal).positive();
        let neg = pos.clone().with_negated(true);
        let added_pos = self.insert(pos);
        let added_neg = self.insert(neg);
        added_pos || added_neg
    }

    /// Removes `literal` and its complement. Returns true if either was present.
    pub fn remove_both(&mut self, literal: &Literal) -> bool {
        let pos = key(literal).positive();
        let neg = pos.clone().with_negated(true);
        let removed = self.members.remove(&pos) | self.members.remove(&neg);
        if removed {
            self.order.retain(|l| *l != pos && *l != neg);
        }
        removed
    }

    /// Returns true if `literal` (annotations ignored) is tracked.
    #[must_use]
    pub fn contains(&self, literal: &Literal) -> bool {
        self.members.contains(&key(literal))
    }

    /// Tracked literals in registration order, both polarities.
    pub fn iter(&self) -> impl Iterator<Item = &Literal> {
        self.order.iter()
    }

    /// Number of tracked literals (each polarity counts once).
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_literal;

    #[test]
    fn registers_both_polarities() {
        let mut reg = RangeRegistry::new();
        assert!(reg.register_both(&parse_literal("loc(1)[source(self)]").unwrap()));
        assert!(!reg.register_both(&parse_literal("~loc(1)").unwrap()));
        assert_eq!(reg.len(), 2);
        assert!(reg.contains(&parse_literal("loc(1)").unwrap()));
        assert!(reg.contains(&parse_literal("~loc(1)").unwrap()));
        let order: Vec<String> = reg.iter().map(ToString::to_string).collect();
        assert_eq!(order, vec!["loc(1)", "~loc(1)"]);
    }

    #[test]
    fn removes_both_polarities() {
        let mut reg = RangeRegistry::new();
        reg.register_both(&parse_literal("loc(1)").unwrap());
        reg.register_both(&parse_literal("loc(2)").unwrap());
        assert!(reg.remove_both(&parse_literal("~loc(1)").unwrap()));
        assert!(!reg.contains(&parse_literal("loc(1)").unwrap()));
        assert!(reg.contains(&parse_literal("loc(2)").unwrap()));
        assert!(!reg.remove_both(&parse_literal("loc(1)").unwrap()));
        assert_eq!(reg.len(), 2);
    }
}
