use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_newtype!(ItemId);
string_newtype!(Identity);

/// A bucket-list record as the remote store owns it.
///
/// `image` is the stored-object key (a filename), never a fetchable URL;
/// resolving keys to URLs is the client's concern and happens on a separate
/// view type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketItem {
    pub id: ItemId,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BucketItem {
    /// The stored image key, if the record references one. Empty keys from
    /// the wire count as absent.
    pub fn image_key(&self) -> Option<&str> {
        self.image.as_deref().filter(|key| !key.is_empty())
    }
}

/// Fields for a create request. The store assigns the id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidItem {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("description must not be empty")]
    EmptyDescription,
}

impl NewItem {
    /// Validates the required text fields and normalizes an empty image key
    /// to `None`.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        image: Option<String>,
    ) -> Result<Self, InvalidItem> {
        let title = title.into();
        let description = description.into();
        if title.trim().is_empty() {
            return Err(InvalidItem::EmptyTitle);
        }
        if description.trim().is_empty() {
            return Err(InvalidItem::EmptyDescription);
        }
        Ok(Self {
            title,
            description,
            image: image.filter(|key| !key.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_required_fields() {
        assert_eq!(
            NewItem::new("  ", "jump from a plane", None),
            Err(InvalidItem::EmptyTitle)
        );
        assert_eq!(
            NewItem::new("Skydive", "", None),
            Err(InvalidItem::EmptyDescription)
        );
    }

    #[test]
    fn normalizes_empty_image_key_to_none() {
        let item = NewItem::new("Skydive", "jump from a plane", Some(String::new()))
            .expect("valid fields");
        assert_eq!(item.image, None);
    }

    #[test]
    fn empty_wire_image_key_counts_as_absent() {
        let record = BucketItem {
            id: ItemId::new("abc123"),
            title: "Skydive".into(),
            description: "jump from a plane".into(),
            image: Some(String::new()),
            created_at: Utc::now(),
        };
        assert_eq!(record.image_key(), None);
    }
}
