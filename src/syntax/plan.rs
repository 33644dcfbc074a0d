//! Plans and triggering events.

use std::fmt;

use crate::syntax::formula::{InternalCall, LogicalFormula};
use crate::syntax::term::{Literal, Renaming};

/// Trigger operator: addition (`+`) or deletion (`-`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TriggerOp {
    /// `+`
    Add,
    /// `-`
    Del,
}

impl fmt::Display for TriggerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Del => write!(f, "-"),
        }
    }
}

/// What a trigger is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TriggerKind {
    /// A belief change.
    Belief,
    /// An achievement goal (`!g`).
    Achieve,
}

/// A triggering event such as `+on(moved(right))`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Trigger {
    /// Operator.
    pub op: TriggerOp,
    /// Belief or goal.
    pub kind: TriggerKind,
    /// The literal added or removed.
    pub literal: Literal,
}

impl Trigger {
    /// Belief addition `+literal`.
    #[must_use]
    pub fn add_belief(literal: Literal) -> Self {
        Self {
            op: TriggerOp::Add,
            kind: TriggerKind::Belief,
            literal,
        }
    }

    /// Belief deletion `-literal`.
    #[must_use]
    pub fn del_belief(literal: Literal) -> Self {
        Self {
            op: TriggerOp::Del,
            kind: TriggerKind::Belief,
            literal,
        }
    }

    /// Returns true for `+` triggers.
    #[must_use]
    pub const fn is_addition(&self) -> bool {
        matches!(self.op, TriggerOp::Add)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        if self.kind == TriggerKind::Achieve {
            write!(f, "!")?;
        }
        write!(f, "{}", self.literal)
    }
}

/// One step of a plan body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BodyStep {
    /// `+lit`
    AddBel(Literal),
    /// `-lit`
    DelBel(Literal),
    /// `-+lit`
    ReplaceBel(Literal),
    /// `!goal`
    Achieve(Literal),
    /// `.action(...)`
    Internal(InternalCall),
    /// An environment action.
    Action(Literal),
}

impl BodyStep {
    fn map_literal(&self, f: impl Fn(&Literal) -> Literal) -> Self {
        match self {
            Self::AddBel(l) => Self::AddBel(f(l)),
            Self::DelBel(l) => Self::DelBel(f(l)),
            Self::ReplaceBel(l) => Self::ReplaceBel(f(l)),
            Self::Achieve(l) => Self::Achieve(f(l)),
            Self::Action(l) => Self::Action(f(l)),
            Self::Internal(call) => {
                let wrapped = Literal::new(call.name.clone()).with_terms(call.args.clone());
                Self::Internal(InternalCall::new(call.name.clone(), f(&wrapped).terms))
            }
        }
    }
}

impl fmt::Display for BodyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddBel(l) => write!(f, "+{l}"),
            Self::DelBel(l) => write!(f, "-{l}"),
            Self::ReplaceBel(l) => write!(f, "-+{l}"),
            Self::Achieve(l) => write!(f, "!{l}"),
            Self::Internal(call) => write!(f, "{call}"),
            Self::Action(l) => write!(f, "{l}"),
        }
    }
}

/// A plan `@label trigger : context <- body.`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Plan {
    /// Optional label.
    pub label: Option<String>,
    /// Triggering event.
    pub trigger: Trigger,
    /// Context; `None` means `true`.
    pub context: Option<LogicalFormula>,
    /// Body steps in order.
    pub body: Vec<BodyStep>,
}

impl Plan {
    /// Creates an unlabeled plan.
    #[must_use]
    pub fn new(trigger: Trigger, context: Option<LogicalFormula>, body: Vec<BodyStep>) -> Self {
        Self {
            label: None,
            trigger,
            context,
            body,
        }
    }

    /// Copy without the label.
    #[must_use]
    pub fn without_label(&self) -> Self {
        Self {
            label: None,
            ..self.clone()
        }
    }

    /// Copy with the context replaced.
    #[must_use]
    pub fn with_context(&self, context: LogicalFormula) -> Self {
        Self {
            context: Some(context),
            ..self.clone()
        }
    }

    /// Copy with every variable replaced by a fresh one.
    #[must_use]
    pub fn rename_apart(&self) -> Self {
        let mut renaming = Renaming::fresh();
        let trigger = Trigger {
            literal: self.trigger.literal.rename_vars(&mut renaming),
            ..self.trigger.clone()
        };
        let context = self.context.as_ref().map(|c| c.rename_vars(&mut renaming));
        let renaming = std::cell::RefCell::new(renaming);
        let body = self
            .body
            .iter()
            .map(|step| step.map_literal(|l| l.rename_vars(&mut renaming.borrow_mut())))
            .collect();
        Self {
            label: self.label.clone(),
            trigger,
            context,
            body,
        }
    }

    /// Rewrites every literal of trigger and body (context is mapped by `ctx`).
    #[must_use]
    pub fn map_literals(
        &self,
        lit: impl Fn(&Literal) -> Literal,
        ctx: impl Fn(&LogicalFormula) -> LogicalFormula,
    ) -> Self {
        Self {
            label: self.label.clone(),
            trigger: Trigger {
                literal: lit(&self.trigger.literal),
                ..self.trigger.clone()
            },
            context: self.context.as_ref().map(ctx),
            body: self.body.iter().map(|s| s.map_literal(&lit)).collect(),
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            write!(f, "@{label} ")?;
        }
        write!(f, "{}", self.trigger)?;
        if let Some(ctx) = &self.context {
            write!(f, " : {ctx}")?;
        }
        if !self.body.is_empty() {
            write!(f, " <- ")?;
            for (i, step) in self.body.iter().enumerate() {
                if i > 0 {
                    write!(f, "; ")?;
                }
                write!(f, "{step}")?;
            }
        }
        write!(f, ".")
    }
}
