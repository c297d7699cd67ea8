//! Actions and the resources they target.

use crate::{Error, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Actions a user can attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Publish,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::Publish,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Publish => "publish",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            "publish" => Ok(Action::Publish),
            _ => Err(Error::UnknownAction(s.to_string())),
        }
    }
}

/// The concrete entity behind a resource reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceData {
    /// Identifier of the entity, if it has one.
    #[serde(default)]
    pub id: Option<String>,

    /// The user who owns the entity.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// A resource type plus, optionally, the instance being acted on.
///
/// `data == None` means "no specific instance yet", the shape used for create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: String,
    #[serde(default)]
    pub data: Option<ResourceData>,
}

impl Resource {
    /// A reference to a resource type with no instance.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: None,
        }
    }

    /// A reference to an instance owned by `owner`.
    pub fn owned_by(kind: impl Into<String>, owner: impl Into<UserId>) -> Self {
        Self::with_data(
            kind,
            ResourceData {
                id: None,
                user_id: Some(owner.into()),
            },
        )
    }

    pub fn with_data(kind: impl Into<String>, data: ResourceData) -> Self {
        Self {
            kind: kind.into(),
            data: Some(data),
        }
    }

    pub fn post(owner: impl Into<UserId>) -> Self {
        Self::owned_by("post", owner)
    }

    pub fn comment(owner: impl Into<UserId>) -> Self {
        Self::owned_by("comment", owner)
    }

    /// The instance owner, if there is an instance and it records one.
    pub fn owner(&self) -> Option<UserId> {
        self.data.as_ref().and_then(|d| d.user_id)
    }

    /// True only when an instance exists and its owner is exactly `user`.
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner() == Some(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
        assert_eq!("PUBLISH".parse::<Action>().unwrap(), Action::Publish);
        assert!(matches!(
            "archive".parse::<Action>(),
            Err(Error::UnknownAction(_))
        ));
    }

    #[test]
    fn test_ownership() {
        let post = Resource::post(7);
        assert!(post.is_owned_by(UserId(7)));
        assert!(!post.is_owned_by(UserId(8)));

        let bare = Resource::new("post");
        assert_eq!(bare.owner(), None);
        assert!(!bare.is_owned_by(UserId(7)));

        let orphan = Resource::with_data("post", ResourceData::default());
        assert!(!orphan.is_owned_by(UserId(7)));
    }

    #[test]
    fn test_resource_deserialize() {
        let json = r#"{"kind": "comment", "data": {"id": "12", "user_id": 3}}"#;
        let resource: Resource = serde_json::from_str(json).unwrap();
        assert_eq!(resource.kind, "comment");
        assert_eq!(resource.owner(), Some(UserId(3)));
    }
}
