use strum_macros::{Display, EnumString};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Employee = 1,
    Supervisor = 2,
    Hr = 3,
    Director = 4,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Employee),
            2 => Some(Role::Supervisor),
            3 => Some(Role::Hr),
            4 => Some(Role::Director),
            _ => None,
        }
    }

    pub fn id(&self) -> u8 {
        *self as u8
    }

    /// Roles allowed to act on leave requests.
    pub fn can_approve(&self) -> bool {
        matches!(self, Role::Supervisor | Role::Hr | Role::Director)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_ids_round_trip() {
        for id in 1..=4u8 {
            let role = Role::from_id(id).unwrap();
            assert_eq!(role.id(), id);
        }
        assert!(Role::from_id(0).is_none());
        assert!(Role::from_id(5).is_none());
    }

    #[test]
    fn role_tags_parse() {
        assert_eq!(Role::from_str("SUPERVISOR").unwrap(), Role::Supervisor);
        assert_eq!(Role::from_str("HR").unwrap(), Role::Hr);
        assert_eq!(Role::Director.to_string(), "DIRECTOR");
        assert!(Role::from_str("ADMIN").is_err());
    }

    #[test]
    fn only_senior_roles_approve() {
        assert!(!Role::Employee.can_approve());
        assert!(Role::Supervisor.can_approve());
        assert!(Role::Hr.can_approve());
        assert!(Role::Director.can_approve());
    }
}
