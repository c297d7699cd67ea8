//! Policy configuration and enforcement.

use crate::{Action, Error, Resource, Result, Role, User};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which resource types the decision table knows about, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    /// Managed, post-like content types.
    #[serde(default = "default_content")]
    pub content: Vec<String>,

    /// Comment-like types that subscribers may contribute to.
    #[serde(default = "default_comments")]
    pub comments: Vec<String>,
}

fn default_content() -> Vec<String> {
    vec!["post".to_string(), "page".to_string(), "media".to_string()]
}

fn default_comments() -> Vec<String> {
    vec!["comment".to_string()]
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            content: default_content(),
            comments: default_comments(),
        }
    }
}

/// How the decision table treats a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    Content,
    Comment,
}

impl Vocabulary {
    /// Classify a resource type, or `None` if the type is unknown.
    pub fn classify(&self, kind: &str) -> Option<ResourceClass> {
        if self.content.iter().any(|k| k == kind) {
            Some(ResourceClass::Content)
        } else if self.comments.iter().any(|k| k == kind) {
            Some(ResourceClass::Comment)
        } else {
            None
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(kind) = self.content.iter().find(|k| self.comments.contains(*k)) {
            return Err(Error::Invalid(format!(
                "resource type '{kind}' is listed as both content and comments"
            )));
        }
        if self.content.iter().chain(&self.comments).any(|k| k.trim().is_empty()) {
            return Err(Error::Invalid("resource type names must not be blank".into()));
        }
        Ok(())
    }
}

/// Result of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    fn deny(reason: impl Into<String>) -> Self {
        Decision::Deny {
            reason: reason.into(),
        }
    }
}

/// Stateless role/action/resource decision table.
///
/// Holds only the immutable vocabulary, so a single engine can be shared
/// across threads behind an `Arc` or cloned freely.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    vocabulary: Vocabulary,
}

impl PolicyEngine {
    pub fn new(vocabulary: Vocabulary) -> Result<Self> {
        vocabulary.validate()?;
        Ok(Self { vocabulary })
    }

    /// Load a vocabulary from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse a vocabulary from a TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        let vocabulary: Vocabulary = toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))?;
        Self::new(vocabulary)
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// True iff the user's role ranks at or above `required`.
    pub fn has_role(&self, user: &User, required: Role) -> bool {
        user.has_role(required)
    }

    /// Boolean form of [`decide`](Self::decide).
    pub fn can(&self, user: &User, action: Action, resource: &Resource) -> bool {
        self.decide(user, action, resource).is_allowed()
    }

    /// Like [`can`](Self::can) for an action that has not been parsed yet.
    /// Unrecognized action names deny.
    pub fn can_raw(&self, user: &User, action: &str, resource: &Resource) -> bool {
        action
            .parse::<Action>()
            .is_ok_and(|action| self.can(user, action, resource))
    }

    /// Result form of [`can`](Self::can), for `?` composition.
    pub fn authorize(&self, user: &User, action: Action, resource: &Resource) -> Result<()> {
        match self.decide(user, action, resource) {
            Decision::Allow => Ok(()),
            Decision::Deny { .. } => Err(Error::Unauthorized),
        }
    }

    /// Evaluate the decision table.
    pub fn decide(&self, user: &User, action: Action, resource: &Resource) -> Decision {
        if user.role == Role::Admin {
            return Decision::Allow;
        }

        let allowed = match self.vocabulary.classify(&resource.kind) {
            Some(ResourceClass::Content) => content_rule(user, action, resource),
            Some(ResourceClass::Comment) => comment_rule(user, action, resource),
            None => {
                return Decision::deny(format!("unknown resource type '{}'", resource.kind));
            }
        };

        if allowed {
            Decision::Allow
        } else {
            Decision::deny(format!(
                "{} may not {} {}{}",
                user.role,
                action,
                resource.kind,
                match (resource.data.is_some(), resource.owner()) {
                    (false, _) => " without an instance".to_string(),
                    (true, Some(owner)) if owner != user.id => format!(" owned by {owner}"),
                    _ => String::new(),
                }
            ))
        }
    }
}

fn content_rule(user: &User, action: Action, resource: &Resource) -> bool {
    match user.role {
        Role::Admin | Role::Editor => true,
        Role::Author => match action {
            Action::Read | Action::Create => true,
            Action::Update | Action::Delete | Action::Publish => resource.is_owned_by(user.id),
        },
        Role::Subscriber => action == Action::Read,
    }
}

fn comment_rule(user: &User, action: Action, resource: &Resource) -> bool {
    match action {
        Action::Read | Action::Create => true,
        Action::Update => resource.is_owned_by(user.id),
        Action::Delete | Action::Publish => {
            user.has_role(Role::Author) && resource.is_owned_by(user.id)
        }
    }
}
