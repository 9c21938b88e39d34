//! Session user resolution.
//!
//! The authenticated user normally comes from session middleware, which lives outside
//! this crate. The binary reads it from `RAB_USER_ID` instead.

/// The user a request acts on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionUser {
    /// Owner id used for every ownership check
    pub user_id: i64,
}

/// Parses a user id as it appears in the environment.
#[must_use]
pub fn parse_user_id(raw: &str) -> Option<SessionUser> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .map(|user_id| SessionUser { user_id })
}

/// Gets the session user from `RAB_USER_ID`, if set and valid.
#[must_use]
pub fn get_session_user() -> Option<SessionUser> {
    std::env::var("RAB_USER_ID")
        .ok()
        .as_deref()
        .and_then(parse_user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id("42"), Some(SessionUser { user_id: 42 }));
        assert_eq!(parse_user_id(" 7 "), Some(SessionUser { user_id: 7 }));
    }

    #[test]
    fn test_parse_user_id_rejects_garbage() {
        assert_eq!(parse_user_id(""), None);
        assert_eq!(parse_user_id("abc"), None);
        assert_eq!(parse_user_id("0"), None);
        assert_eq!(parse_user_id("-3"), None);
    }
}
