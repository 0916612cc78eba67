use crate::domain::UserId;

// ============== Authorization ==============

/// Check a Telegram user against the configured allow-list.
///
/// An empty allow-list admits everyone; deployments that predate the
/// allow-list keep working unchanged.
pub fn is_authorized(user_id: Option<UserId>, allowed_users: &[i64]) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    if allowed_users.is_empty() {
        return true;
    }
    allowed_users.contains(&user_id.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allow_list_admits_everyone() {
        assert!(is_authorized(Some(UserId(42)), &[]));
    }

    #[test]
    fn allow_list_filters_users() {
        let allowed = [1, 2, 3];
        assert!(is_authorized(Some(UserId(2)), &allowed));
        assert!(!is_authorized(Some(UserId(4)), &allowed));
    }

    #[test]
    fn missing_sender_is_rejected() {
        assert!(!is_authorized(None, &[]));
        assert!(!is_authorized(None, &[1]));
    }
}
