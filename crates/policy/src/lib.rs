//! Role-hierarchy authorization.
//!
//! Core principle: **decisions are data.** Every `(user, action, resource)`
//! triple maps to allow or deny; nothing here panics or errors on
//! unrecognized input, it denies.
//!
//! # Example
//!
//! ```
//! use policy::{Action, PolicyEngine, Resource, User};
//!
//! let engine = PolicyEngine::default();
//! let author = User::author(7);
//!
//! assert!(engine.can(&author, Action::Update, &Resource::post(7)));
//! assert!(!engine.can(&author, Action::Update, &Resource::post(8)));
//! assert!(engine.authorize(&author, Action::Create, &Resource::new("post")).is_ok());
//! ```

mod error;
mod policy;
mod resource;
mod role;

pub use error::{Error, Result};
pub use policy::{Decision, PolicyEngine, ResourceClass, Vocabulary};
pub use resource::{Action, Resource, ResourceData};
pub use role::{Role, User, UserId};
