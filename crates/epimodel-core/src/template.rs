//! Transition templates.
//!
//! A template is one process in a compartmental model (a conversion, a
//! production or a degradation, possibly controlled). Every variant exposes a
//! fixed, ordered role map:
//!
//! ```text
//! NaturalConversion             subject, outcome
//! ControlledConversion          controller, subject, outcome
//! GroupedControlledConversion   controllers, subject, outcome
//! NaturalProduction             outcome
//! NaturalDegradation            subject
//! ControlledProduction          controller, outcome
//! ControlledDegradation         controller, subject
//! GroupedControlledProduction   controllers, outcome
//! GroupedControlledDegradation  controllers, subject
//! StaticConcept                 subject
//! ```
//!
//! The role map is the structural basis for keys, comparison and graph
//! building. The template type is a hard partition: templates of different
//! types are never equal and never refine each other.

use std::collections::BTreeSet;
use std::fmt;

use epimodel_ontology::RefinementOracle;
use serde::{Deserialize, Serialize};

use crate::concept::{Concept, ConceptKey};
use crate::config::Config;
use crate::error::ComparisonError;
use crate::expr::SymbolicExpr;

// ============================================================================
// Types and roles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TemplateType {
    NaturalConversion,
    ControlledConversion,
    GroupedControlledConversion,
    NaturalProduction,
    NaturalDegradation,
    ControlledProduction,
    ControlledDegradation,
    GroupedControlledProduction,
    GroupedControlledDegradation,
    StaticConcept,
}

impl TemplateType {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateType::NaturalConversion => "NaturalConversion",
            TemplateType::ControlledConversion => "ControlledConversion",
            TemplateType::GroupedControlledConversion => "GroupedControlledConversion",
            TemplateType::NaturalProduction => "NaturalProduction",
            TemplateType::NaturalDegradation => "NaturalDegradation",
            TemplateType::ControlledProduction => "ControlledProduction",
            TemplateType::ControlledDegradation => "ControlledDegradation",
            TemplateType::GroupedControlledProduction => "GroupedControlledProduction",
            TemplateType::GroupedControlledDegradation => "GroupedControlledDegradation",
            TemplateType::StaticConcept => "StaticConcept",
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Controller,
    Controllers,
    Subject,
    Outcome,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Controller => "controller",
            Role::Controllers => "controllers",
            Role::Subject => "subject",
            Role::Outcome => "outcome",
        }
    }

    /// Subject and controllers feed into a process; the outcome comes out of it.
    pub fn is_input(self) -> bool {
        !matches!(self, Role::Outcome)
    }
}

/// The concept(s) filling one role.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoleValue<'a> {
    One(&'a Concept),
    Many(&'a [Concept]),
}

impl<'a> RoleValue<'a> {
    pub fn concepts(self) -> &'a [Concept] {
        match self {
            RoleValue::One(concept) => std::slice::from_ref(concept),
            RoleValue::Many(concepts) => concepts,
        }
    }
}

// ============================================================================
// Template
// ============================================================================

/// Variant-specific role fields, decoded by the `"type"` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TemplateKind {
    NaturalConversion {
        subject: Concept,
        outcome: Concept,
    },
    ControlledConversion {
        controller: Concept,
        subject: Concept,
        outcome: Concept,
    },
    GroupedControlledConversion {
        controllers: Vec<Concept>,
        subject: Concept,
        outcome: Concept,
    },
    NaturalProduction {
        outcome: Concept,
    },
    NaturalDegradation {
        subject: Concept,
    },
    ControlledProduction {
        controller: Concept,
        outcome: Concept,
    },
    ControlledDegradation {
        controller: Concept,
        subject: Concept,
    },
    GroupedControlledProduction {
        controllers: Vec<Concept>,
        outcome: Concept,
    },
    GroupedControlledDegradation {
        controllers: Vec<Concept>,
        subject: Concept,
    },
    StaticConcept {
        subject: Concept,
    },
}

impl TemplateKind {
    pub fn template_type(&self) -> TemplateType {
        match self {
            TemplateKind::NaturalConversion { .. } => TemplateType::NaturalConversion,
            TemplateKind::ControlledConversion { .. } => TemplateType::ControlledConversion,
            TemplateKind::GroupedControlledConversion { .. } => {
                TemplateType::GroupedControlledConversion
            }
            TemplateKind::NaturalProduction { .. } => TemplateType::NaturalProduction,
            TemplateKind::NaturalDegradation { .. } => TemplateType::NaturalDegradation,
            TemplateKind::ControlledProduction { .. } => TemplateType::ControlledProduction,
            TemplateKind::ControlledDegradation { .. } => TemplateType::ControlledDegradation,
            TemplateKind::GroupedControlledProduction { .. } => {
                TemplateType::GroupedControlledProduction
            }
            TemplateKind::GroupedControlledDegradation { .. } => {
                TemplateType::GroupedControlledDegradation
            }
            TemplateKind::StaticConcept { .. } => TemplateType::StaticConcept,
        }
    }

    /// Role map in the fixed per-type order (controller(s), subject, outcome).
    pub fn roles(&self) -> Vec<(Role, RoleValue<'_>)> {
        use RoleValue::{Many, One};
        match self {
            TemplateKind::NaturalConversion { subject, outcome } => {
                vec![(Role::Subject, One(subject)), (Role::Outcome, One(outcome))]
            }
            TemplateKind::ControlledConversion {
                controller,
                subject,
                outcome,
            } => vec![
                (Role::Controller, One(controller)),
                (Role::Subject, One(subject)),
                (Role::Outcome, One(outcome)),
            ],
            TemplateKind::GroupedControlledConversion {
                controllers,
                subject,
                outcome,
            } => vec![
                (Role::Controllers, Many(controllers)),
                (Role::Subject, One(subject)),
                (Role::Outcome, One(outcome)),
            ],
            TemplateKind::NaturalProduction { outcome } => vec![(Role::Outcome, One(outcome))],
            TemplateKind::NaturalDegradation { subject } => vec![(Role::Subject, One(subject))],
            TemplateKind::ControlledProduction {
                controller,
                outcome,
            } => vec![
                (Role::Controller, One(controller)),
                (Role::Outcome, One(outcome)),
            ],
            TemplateKind::ControlledDegradation {
                controller,
                subject,
            } => vec![
                (Role::Controller, One(controller)),
                (Role::Subject, One(subject)),
            ],
            TemplateKind::GroupedControlledProduction {
                controllers,
                outcome,
            } => vec![
                (Role::Controllers, Many(controllers)),
                (Role::Outcome, One(outcome)),
            ],
            TemplateKind::GroupedControlledDegradation {
                controllers,
                subject,
            } => vec![
                (Role::Controllers, Many(controllers)),
                (Role::Subject, One(subject)),
            ],
            TemplateKind::StaticConcept { subject } => vec![(Role::Subject, One(subject))],
        }
    }

    /// Rebuild the same variant with every role concept passed through `f`.
    pub fn map_concepts<F>(&self, mut f: F) -> TemplateKind
    where
        F: FnMut(Role, &Concept) -> Concept,
    {
        match self {
            TemplateKind::NaturalConversion { subject, outcome } => {
                let subject = f(Role::Subject, subject);
                let outcome = f(Role::Outcome, outcome);
                TemplateKind::NaturalConversion { subject, outcome }
            }
            TemplateKind::ControlledConversion {
                controller,
                subject,
                outcome,
            } => TemplateKind::ControlledConversion {
                controller: f(Role::Controller, controller),
                subject: f(Role::Subject, subject),
                outcome: f(Role::Outcome, outcome),
            },
            TemplateKind::GroupedControlledConversion {
                controllers,
                subject,
                outcome,
            } => {
                let controllers = controllers
                    .iter()
                    .map(|c| f(Role::Controllers, c))
                    .collect();
                TemplateKind::GroupedControlledConversion {
                    controllers,
                    subject: f(Role::Subject, subject),
                    outcome: f(Role::Outcome, outcome),
                }
            }
            TemplateKind::NaturalProduction { outcome } => TemplateKind::NaturalProduction {
                outcome: f(Role::Outcome, outcome),
            },
            TemplateKind::NaturalDegradation { subject } => TemplateKind::NaturalDegradation {
                subject: f(Role::Subject, subject),
            },
            TemplateKind::ControlledProduction {
                controller,
                outcome,
            } => TemplateKind::ControlledProduction {
                controller: f(Role::Controller, controller),
                outcome: f(Role::Outcome, outcome),
            },
            TemplateKind::ControlledDegradation {
                controller,
                subject,
            } => TemplateKind::ControlledDegradation {
                controller: f(Role::Controller, controller),
                subject: f(Role::Subject, subject),
            },
            TemplateKind::GroupedControlledProduction {
                controllers,
                outcome,
            } => {
                let controllers = controllers
                    .iter()
                    .map(|c| f(Role::Controllers, c))
                    .collect();
                TemplateKind::GroupedControlledProduction {
                    controllers,
                    outcome: f(Role::Outcome, outcome),
                }
            }
            TemplateKind::GroupedControlledDegradation {
                controllers,
                subject,
            } => {
                let controllers = controllers
                    .iter()
                    .map(|c| f(Role::Controllers, c))
                    .collect();
                TemplateKind::GroupedControlledDegradation {
                    controllers,
                    subject: f(Role::Subject, subject),
                }
            }
            TemplateKind::StaticConcept { subject } => TemplateKind::StaticConcept {
                subject: f(Role::Subject, subject),
            },
        }
    }
}

/// Structural identity: type plus role concept keys in role order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemplateKey {
    pub template_type: TemplateType,
    pub concepts: Vec<ConceptKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(flatten)]
    pub kind: TemplateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_law: Option<SymbolicExpr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<serde_json::Value>,
}

impl From<TemplateKind> for Template {
    fn from(kind: TemplateKind) -> Self {
        Self::new(kind)
    }
}

impl Template {
    pub fn new(kind: TemplateKind) -> Self {
        Self {
            kind,
            rate_law: None,
            name: None,
            display_name: None,
            provenance: Vec::new(),
        }
    }

    pub fn natural_conversion(subject: Concept, outcome: Concept) -> Self {
        Self::new(TemplateKind::NaturalConversion { subject, outcome })
    }

    pub fn controlled_conversion(controller: Concept, subject: Concept, outcome: Concept) -> Self {
        Self::new(TemplateKind::ControlledConversion {
            controller,
            subject,
            outcome,
        })
    }

    pub fn grouped_controlled_conversion(
        controllers: Vec<Concept>,
        subject: Concept,
        outcome: Concept,
    ) -> Self {
        Self::new(TemplateKind::GroupedControlledConversion {
            controllers,
            subject,
            outcome,
        })
    }

    pub fn natural_production(outcome: Concept) -> Self {
        Self::new(TemplateKind::NaturalProduction { outcome })
    }

    pub fn natural_degradation(subject: Concept) -> Self {
        Self::new(TemplateKind::NaturalDegradation { subject })
    }

    pub fn controlled_production(controller: Concept, outcome: Concept) -> Self {
        Self::new(TemplateKind::ControlledProduction {
            controller,
            outcome,
        })
    }

    pub fn controlled_degradation(controller: Concept, subject: Concept) -> Self {
        Self::new(TemplateKind::ControlledDegradation {
            controller,
            subject,
        })
    }

    pub fn static_concept(subject: Concept) -> Self {
        Self::new(TemplateKind::StaticConcept { subject })
    }

    pub fn with_rate_law(mut self, rate_law: impl Into<SymbolicExpr>) -> Self {
        self.rate_law = Some(rate_law.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn template_type(&self) -> TemplateType {
        self.kind.template_type()
    }

    pub fn get_concepts_by_role(&self) -> Vec<(Role, RoleValue<'_>)> {
        self.kind.roles()
    }

    /// All role concepts, flattened in role order.
    pub fn get_concepts(&self) -> Vec<&Concept> {
        self.kind
            .roles()
            .into_iter()
            .flat_map(|(_, value)| value.concepts())
            .collect()
    }

    pub fn get_concept_names(&self) -> BTreeSet<&str> {
        self.get_concepts()
            .into_iter()
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn get_controllers(&self) -> &[Concept] {
        self.kind
            .roles()
            .into_iter()
            .find(|(role, _)| matches!(role, Role::Controller | Role::Controllers))
            .map(|(_, value)| value.concepts())
            .unwrap_or(&[])
    }

    pub fn get_key(&self, config: &Config) -> TemplateKey {
        TemplateKey {
            template_type: self.template_type(),
            concepts: self
                .get_concepts()
                .into_iter()
                .map(|c| c.get_key(config))
                .collect(),
        }
    }

    /// A copy with `context` pushed onto every role concept.
    pub fn with_context<I, K, V>(&self, context: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.with_context_except(context, &BTreeSet::new())
    }

    /// Like [`Self::with_context`], leaving concepts named in `exclude` untouched.
    pub fn with_context_except<I, K, V>(&self, context: I, exclude: &BTreeSet<String>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let context: Vec<(String, String)> = context
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let kind = self.kind.map_concepts(|_, concept| {
            if exclude.contains(&concept.name) {
                concept.clone()
            } else {
                concept.with_context(context.iter().cloned())
            }
        });
        Self {
            kind,
            ..self.clone()
        }
    }

    /// Structural equality over the role map.
    ///
    /// Comparing templates of different types is a caller error and yields
    /// [`ComparisonError::TypeMismatch`]. Controller lists are equal when they
    /// have the same length and are equal position by position.
    pub fn is_equal_to(
        &self,
        other: &Template,
        with_context: bool,
        config: &Config,
    ) -> Result<bool, ComparisonError> {
        if self.template_type() != other.template_type() {
            return Err(ComparisonError::TypeMismatch {
                left: self.template_type(),
                right: other.template_type(),
            });
        }

        for ((role, mine), (_, theirs)) in self.kind.roles().into_iter().zip(other.kind.roles()) {
            let equal = match (mine, theirs) {
                (RoleValue::One(a), RoleValue::One(b)) => a.is_equal_to(b, with_context, config),
                (RoleValue::Many(a), RoleValue::Many(b)) => {
                    a.len() == b.len()
                        && a
                            .iter()
                            .zip(b)
                            .all(|(x, y)| x.is_equal_to(y, with_context, config))
                }
                _ => {
                    return Err(ComparisonError::UnsupportedField {
                        field: role.as_str().to_string(),
                    })
                }
            };
            if !equal {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether `self` refines `other`: same type, and every role concept of
    /// `self` is equal to or a refinement of the corresponding concept of
    /// `other`. Different types are simply not refinements (no error).
    pub fn refinement_of<O>(
        &self,
        other: &Template,
        oracle: &O,
        with_context: bool,
        config: &Config,
    ) -> Result<bool, ComparisonError>
    where
        O: RefinementOracle + ?Sized,
    {
        if self.template_type() != other.template_type() {
            return Ok(false);
        }

        let refines = |a: &Concept, b: &Concept| -> Result<bool, ComparisonError> {
            Ok(a.is_equal_to(b, with_context, config)
                || a.refinement_of(b, oracle, with_context, config)?)
        };

        for ((role, mine), (_, theirs)) in self.kind.roles().into_iter().zip(other.kind.roles()) {
            match (mine, theirs) {
                (RoleValue::One(a), RoleValue::One(b)) => {
                    if !refines(a, b)? {
                        return Ok(false);
                    }
                }
                (RoleValue::Many(a), RoleValue::Many(b)) => {
                    if a.len() != b.len() {
                        return Ok(false);
                    }
                    for (x, y) in a.iter().zip(b) {
                        if !refines(x, y)? {
                            return Ok(false);
                        }
                    }
                }
                _ => {
                    return Err(ComparisonError::UnsupportedField {
                        field: role.as_str().to_string(),
                    })
                }
            }
        }
        Ok(true)
    }
}
