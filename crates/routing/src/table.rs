//! Route table: tag → (rule, output) fan-out
//!
//! The table is compiled once at startup from configuration. Rules are
//! evaluated in registration order and every matching rule contributes its
//! outputs; there is no first-match-wins short circuit. A tag that matches
//! nothing yields `RouteDecision::Unrouted` so the caller can count it.

use std::collections::HashMap;

use crate::error::{Result, RoutingError};
use crate::ids::{OutputId, RuleId};
use crate::pattern::Pattern;

/// A compiled route rule
#[derive(Debug, Clone)]
pub struct RouteRule {
    id: RuleId,
    name: String,
    pattern: Pattern,
    outputs: Vec<OutputId>,
}

impl RouteRule {
    #[inline]
    pub fn id(&self) -> RuleId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Output destinations bound to this rule, in configuration order
    #[inline]
    pub fn outputs(&self) -> &[OutputId] {
        &self.outputs
    }

    #[inline]
    pub fn matches(&self, tag: &str) -> bool {
        self.pattern.matches(tag)
    }
}

/// One (filter chain, destination) pair produced by routing a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteTarget {
    /// Rule (and therefore filter chain) that matched
    pub rule: RuleId,
    /// Destination output
    pub output: OutputId,
}

/// Outcome of routing a single tag
#[derive(Debug)]
pub enum RouteDecision<'a> {
    /// One or more rules matched, in registration order
    Routed(Vec<&'a RouteRule>),
    /// No rule matched; the record is counted but not delivered
    Unrouted,
}

impl<'a> RouteDecision<'a> {
    #[inline]
    pub fn is_unrouted(&self) -> bool {
        matches!(self, Self::Unrouted)
    }

    /// Matched rules (empty when unrouted)
    pub fn rules(&self) -> &[&'a RouteRule] {
        match self {
            Self::Routed(rules) => rules,
            Self::Unrouted => &[],
        }
    }

    /// Flatten into (rule, output) pairs
    pub fn targets(&self) -> impl Iterator<Item = RouteTarget> + '_ {
        self.rules().iter().flat_map(|rule| {
            rule.outputs.iter().map(move |&output| RouteTarget {
                rule: rule.id,
                output,
            })
        })
    }
}

/// Pre-compiled routing table
///
/// # Example
///
/// ```
/// use tributary_routing::RoutingTableBuilder;
///
/// let mut builder = RoutingTableBuilder::new();
/// builder.register_output("stdout").unwrap();
/// builder.register_output("archive").unwrap();
/// builder.add_rule("kube", "kube.*", &["stdout", "archive"]).unwrap();
/// builder.add_rule("all", "*", &["archive"]).unwrap();
/// let table = builder.build();
///
/// let decision = table.route("kube.web");
/// assert_eq!(decision.targets().count(), 3);
/// assert_eq!(table.route("syslog").targets().count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    rules: Vec<RouteRule>,
    output_names: Vec<String>,
}

impl RoutingTable {
    /// Route a tag against every rule
    pub fn route(&self, tag: &str) -> RouteDecision<'_> {
        let matched: Vec<&RouteRule> = self.rules.iter().filter(|r| r.matches(tag)).collect();
        if matched.is_empty() {
            RouteDecision::Unrouted
        } else {
            RouteDecision::Routed(matched)
        }
    }

    #[inline]
    pub fn rule(&self, id: RuleId) -> Option<&RouteRule> {
        self.rules.get(id.as_usize())
    }

    #[inline]
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    #[inline]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    #[inline]
    pub fn output_count(&self) -> usize {
        self.output_names.len()
    }

    /// Get the name of an output by ID (for logging/metrics)
    #[inline]
    pub fn output_name(&self, id: OutputId) -> Option<&str> {
        self.output_names.get(id.as_usize()).map(String::as_str)
    }

    #[inline]
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Builder for constructing routing tables from configuration
#[derive(Debug, Default)]
pub struct RoutingTableBuilder {
    output_ids: HashMap<String, OutputId>,
    output_names: Vec<String>,
    rules: Vec<RouteRule>,
}

impl RoutingTableBuilder {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an output and get its ID
    ///
    /// Registering the same name twice returns the existing ID.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` once the id space is exhausted.
    pub fn register_output(&mut self, name: impl Into<String>) -> Result<OutputId> {
        let name = name.into();
        if let Some(&id) = self.output_ids.get(&name) {
            return Ok(id);
        }
        let index = u16::try_from(self.output_names.len())
            .ok()
            .filter(|&i| i < OutputId::MAX)
            .ok_or(RoutingError::CapacityExceeded {
                kind: "outputs",
                max: OutputId::MAX as usize,
            })?;

        let id = OutputId::new(index);
        self.output_ids.insert(name.clone(), id);
        self.output_names.push(name);
        Ok(id)
    }

    #[inline]
    pub fn output_id(&self, name: &str) -> Option<OutputId> {
        self.output_ids.get(name).copied()
    }

    /// Add a rule binding `pattern` to the named outputs
    ///
    /// # Errors
    ///
    /// - `EmptyPattern` if `pattern` is empty
    /// - `DuplicateRule` if a rule with this name exists
    /// - `EmptyOutputs` if `outputs` is empty
    /// - `UnknownOutput` if an output was not registered first
    pub fn add_rule(
        &mut self,
        name: impl Into<String>,
        pattern: &str,
        outputs: &[impl AsRef<str>],
    ) -> Result<RuleId> {
        let name = name.into();
        let pattern = Pattern::new(pattern)?;

        if self.rules.iter().any(|r| r.name == name) {
            return Err(RoutingError::duplicate_rule(name));
        }
        if outputs.is_empty() {
            return Err(RoutingError::empty_outputs(name));
        }

        let outputs = outputs
            .iter()
            .map(|o| {
                self.output_id(o.as_ref())
                    .ok_or_else(|| RoutingError::unknown_output(o.as_ref()))
            })
            .collect::<Result<Vec<_>>>()?;

        let index = u16::try_from(self.rules.len()).map_err(|_| RoutingError::CapacityExceeded {
            kind: "rules",
            max: u16::MAX as usize,
        })?;
        let id = RuleId::new(index);

        self.rules.push(RouteRule {
            id,
            name,
            pattern,
            outputs,
        });
        Ok(id)
    }

    pub fn build(self) -> RoutingTable {
        RoutingTable {
            rules: self.rules,
            output_names: self.output_names,
        }
    }
}
