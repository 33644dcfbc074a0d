//! Agent-language syntax: terms, literals, logical formulas, rules and plans.

pub mod formula;
pub mod parser;
pub mod plan;
pub mod term;

pub use formula::{InternalCall, LogicalFormula, RelOp, Rule};
pub use parser::{parse_formula, parse_literal, parse_plan, parse_program, parse_rule, parse_term, Clause};
pub use plan::{BodyStep, Plan, Trigger, TriggerKind, TriggerOp};
pub use term::{ArithOp, Literal, PredicateIndicator, Renaming, Term, FALSE_FUNCTOR, TRUE_FUNCTOR};
