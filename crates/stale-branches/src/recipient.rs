//! Who a stale comment is addressed to.

use crate::config::Params;
use crate::types::Author;

/// One way of naming the recipient. Strategies are tried in order and the
/// first one that yields a name wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientStrategy {
    /// Entry for the author's username in the remap table.
    Remapped,
    /// The author's username as-is.
    Username,
    /// The configured default recipient.
    DefaultRecipient,
}

/// Resolution order used for stale comments.
pub const RESOLUTION_ORDER: [RecipientStrategy; 3] = [
    RecipientStrategy::Remapped,
    RecipientStrategy::Username,
    RecipientStrategy::DefaultRecipient,
];

impl RecipientStrategy {
    pub fn resolve(self, author: Option<&Author>, params: &Params) -> Option<String> {
        match self {
            Self::Remapped => author
                .and_then(|a| params.remap_authors.get(&a.username))
                .filter(|name| !name.is_empty())
                .cloned(),
            Self::Username => author
                .map(|a| a.username.clone())
                .filter(|name| !name.is_empty()),
            Self::DefaultRecipient => params.default_recipient().map(str::to_string),
        }
    }
}

/// Resolve the recipient, falling back to an empty string.
pub fn resolve_recipient(author: Option<&Author>, params: &Params) -> String {
    RESOLUTION_ORDER
        .iter()
        .find_map(|strategy| strategy.resolve(author, params))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Repo;

    fn author(username: &str) -> Author {
        Author {
            username: username.to_string(),
            email: Some(format!("{username}@example.com")),
            belongs_to_organization: false,
        }
    }

    fn params() -> Params {
        let mut params = Params::new(Repo::new("github", "octocat"));
        params
            .remap_authors
            .insert("user1".to_string(), "remappedUser".to_string());
        params.default_recipient = Some("defaultUser".to_string());
        params
    }

    #[test]
    fn test_remap_wins_over_username() {
        assert_eq!(resolve_recipient(Some(&author("user1")), &params()), "remappedUser");
    }

    #[test]
    fn test_username_when_not_remapped() {
        assert_eq!(resolve_recipient(Some(&author("user2")), &params()), "user2");
    }

    #[test]
    fn test_default_recipient_for_unknown_author() {
        assert_eq!(resolve_recipient(None, &params()), "defaultUser");
    }

    #[test]
    fn test_empty_when_nothing_resolves() {
        let params = Params::new(Repo::new("github", "octocat"));
        assert_eq!(resolve_recipient(None, &params), "");
    }
}
