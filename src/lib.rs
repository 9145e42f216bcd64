//! # tickmill - Deterministic Production Engine for Incremental Games
//!
//! A tick-driven production and cost calculation engine that provides:
//! - **Deterministic** simulation (same inputs and elapsed time → same state)
//! - **Hardcode-free** design (no built-in resource names, all content is data)
//! - **Arbitrary-magnitude** arithmetic (values far beyond `f64` range)
//! - **Closed-form** bulk purchasing (no iterative affordability loops)
//!
//! ## Core Concepts
//!
//! ### Production Pipeline
//!
//! Every produced resource flows through a simple pipeline each tick:
//!
//! ```text
//! [base Operand] → [ModifierChain] → rate/sec → [Resource]
//! ```
//!
//! 1. **Operands** produce base values (constant or context-driven)
//! 2. **Modifiers** transform the rate in declaration order
//! 3. **Resources** accumulate rate times elapsed seconds
//!
//! ### Key Features
//!
//! - **Ordering Graph**: declared reads order productions within a tick
//! - **Cycle Detection**: circular ordering constraints are rejected
//! - **Invertible Chains**: bulk-buy solves chains analytically
//! - **Context-Aware**: conditional modifiers via [`EngineContext`]
//! - **Fault Isolation**: one bad production never poisons a tick
//!
//! ## Example
//!
//! ```rust
//! use tickmill::*;
//!
//! let gold = ResourceId::new("gold");
//! let mut engine = Engine::new();
//!
//! engine.register_resource(Resource::new(gold.clone(), Decimal::ZERO));
//! engine.register_production(
//!     Production::new(gold.clone(), Decimal::ONE)
//!         .with_modifier(Modifier::multiplicative("gilded_age", Decimal::from(2.0))),
//! );
//!
//! engine.advance(5.0).unwrap();
//! assert_eq!(engine.ledger().amount(&gold), Decimal::from(10.0)); // 1 * 2 * 5s
//! ```
//!
//! ## Modules
//!
//! - [`numeric`] - Arbitrary-magnitude decimal arithmetic
//! - [`id`] - Resource and purchase identifier types
//! - [`context`] - Context for conditional calculations
//! - [`modifier`] - Rate modifiers and modifier chains
//! - [`cost`] - Cost curves and purchase requirements
//! - [`resource`] - Resources and the resource ledger
//! - [`purchase`] - Repeatable purchases and one-shot upgrades
//! - [`graph`] - Production ordering graph
//! - [`engine`] - The tick driver
//! - [`error`] - Error types

pub mod context;
pub mod cost;
pub mod engine;
pub mod error;
pub mod graph;
pub mod id;
pub mod modifier;
pub mod numeric;
pub mod purchase;
pub mod resource;

// Re-export main types for convenience
pub use context::{EngineContext, EvalContext};
pub use engine::{AutoRule, Engine, EngineSnapshot, Production, QueuedAction};
pub use error::EngineError;
pub use id::{PurchaseId, ResourceId};
pub use numeric::Decimal;

// Re-export the modifier and cost building blocks
pub use cost::{CostCurve, CostRequirement};
pub use modifier::{Modifier, ModifierChain, Operand, RateBreakdown};
pub use purchase::{Repeatable, RepeatableState, Upgrade, UpgradeState};
pub use resource::{LedgerSnapshot, Resource, ResourceLedger, ResourceState};
