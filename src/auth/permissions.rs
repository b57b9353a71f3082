//! Pure permission predicates keyed on the closed [`Role`] set.
//! Handlers call these instead of comparing role strings inline.

/// Coarse permission tier. Exactly one per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
    Superadmin,
}

impl Role {
    /// Parses the stored role name. Unknown names degrade to the weakest tier.
    pub fn from_name(name: &str) -> Role {
        match name {
            "superadmin" => Role::Superadmin,
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }

    pub fn as_name(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }
}

/// Edit/delete any post regardless of ownership.
pub fn can_manage_all_posts(role: Role) -> bool {
    match role {
        Role::Superadmin => true,
        Role::Admin | Role::User => false,
    }
}

/// Author posts and manage one's own.
pub fn can_manage_own_posts(role: Role) -> bool {
    match role {
        Role::Admin | Role::Superadmin => true,
        Role::User => false,
    }
}

pub fn can_create_admins(role: Role) -> bool {
    match role {
        Role::Superadmin => true,
        Role::Admin | Role::User => false,
    }
}

pub fn can_manage_users(role: Role) -> bool {
    match role {
        Role::Superadmin => true,
        Role::Admin | Role::User => false,
    }
}

pub fn can_view_global_analytics(role: Role) -> bool {
    match role {
        Role::Superadmin => true,
        Role::Admin | Role::User => false,
    }
}

/// Superadmins moderate everything; admins only comments on their own posts.
pub fn can_moderate_comments(role: Role, post_author_id: &str, user_id: &str) -> bool {
    match role {
        Role::Superadmin => true,
        Role::Admin => post_author_id == user_id,
        Role::User => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ROLES: [Role; 3] = [Role::User, Role::Admin, Role::Superadmin];

    #[test]
    fn role_names_round_trip() {
        for role in ROLES {
            assert_eq!(Role::from_name(role.as_name()), role);
        }
    }

    #[test]
    fn unknown_role_name_degrades_to_user() {
        assert_eq!(Role::from_name("root"), Role::User);
        assert_eq!(Role::from_name(""), Role::User);
    }

    #[test]
    fn manage_all_posts_is_superadmin_only() {
        assert!(!can_manage_all_posts(Role::User));
        assert!(!can_manage_all_posts(Role::Admin));
        assert!(can_manage_all_posts(Role::Superadmin));
    }

    #[test]
    fn manage_own_posts_needs_admin_tier() {
        assert!(!can_manage_own_posts(Role::User));
        assert!(can_manage_own_posts(Role::Admin));
        assert!(can_manage_own_posts(Role::Superadmin));
    }

    #[test]
    fn superadmin_only_predicates() {
        for role in ROLES {
            let expected = role == Role::Superadmin;
            assert_eq!(can_create_admins(role), expected);
            assert_eq!(can_manage_users(role), expected);
            assert_eq!(can_view_global_analytics(role), expected);
        }
    }

    #[test]
    fn comment_moderation_matrix() {
        // Superadmin moderates regardless of post ownership.
        assert!(can_moderate_comments(Role::Superadmin, "a", "b"));
        // Admin moderates only on posts they authored.
        assert!(can_moderate_comments(Role::Admin, "a", "a"));
        assert!(!can_moderate_comments(Role::Admin, "a", "b"));
        // Plain users never moderate, even on their own posts.
        assert!(!can_moderate_comments(Role::User, "a", "a"));
    }
}
