//! Tributary - Routing
//!
//! Tag pattern matching and pre-compiled route tables.
//!
//! # Design
//!
//! Routing decisions are made against a table compiled at config load
//! time. Each `RouteRule` pairs a glob `Pattern` with an ordered list of
//! outputs; the rule's id also names the filter chain the engine runs for
//! it. `RoutingTable::route()` evaluates every rule in registration order
//! and returns all matches, so a tag can fan out to many rules.
//!
//! # Example
//!
//! ```
//! use tributary_routing::{RoutingTableBuilder, RouteDecision};
//!
//! let mut builder = RoutingTableBuilder::new();
//! builder.register_output("stdout").unwrap();
//! builder.add_rule("kube", "kube.*", &["stdout"]).unwrap();
//! let table = builder.build();
//!
//! assert!(matches!(table.route("kube.web"), RouteDecision::Routed(_)));
//! assert!(table.route("syslog.auth").is_unrouted());
//! ```

mod error;
mod ids;
mod pattern;
mod table;


pub use error::{Result, RoutingError};
pub use ids::{OutputId, RuleId};
pub use pattern::{Pattern, matches};
pub use table::{RouteDecision, RouteRule, RouteTarget, RoutingTable, RoutingTableBuilder};
