//! Virtual modules over plugin parameters
//!
//! Plugin nodes expose flat, stringly keyed properties. The modules here
//! probe that namespace, validate typed inputs and write batches through a
//! per-node cached view ([`bridge::NodeParams`]). [`rules`] writes configured
//! parameter values to matching nodes at startup.

pub mod bridge;
pub mod crossbar;
pub mod eq;
pub mod riaa;
pub mod rules;
pub mod speakereq;
pub mod value;

pub use bridge::NodeParams;
pub use crossbar::CrossbarMatrix;
pub use eq::{Capabilities, EqBand, EqType};
pub use riaa::{NotchConfig, Riaa, RiaaConfig, SpikeConfig};
pub use rules::{NodeMatcher, ParamRule, ParamRuleResult, ParamRuleSet};
pub use speakereq::{BlockId, ModuleConfig, SpeakerEq, SpeakerEqLayout};
pub use value::{ParamMap, ParamValue};
