// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;

use crate::identity::Sid;

/// Principal name recorded for callers which did not authenticate.
pub const ANONYMOUS_PRINCIPAL: &str = "anonymousUser";

/// The caller on whose behalf ACLs are synchronized or mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    principal: Option<String>,
    authorities: BTreeSet<String>,
    elevated: bool,
}

impl Caller {
    /// An authenticated caller holding the given authorities.
    pub fn authenticated<I, S>(principal: impl Into<String>, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            principal: Some(principal.into()),
            authorities: authorities.into_iter().map(Into::into).collect(),
            elevated: false,
        }
    }

    /// A caller which did not authenticate.
    pub fn anonymous() -> Self {
        Self {
            principal: None,
            authorities: BTreeSet::new(),
            elevated: false,
        }
    }

    /// Mark the caller as running with temporarily elevated privileges, for example while a
    /// new account provisions itself.
    pub fn elevated(mut self) -> Self {
        self.elevated = true;
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.principal.is_none()
    }

    pub fn is_elevated(&self) -> bool {
        self.elevated
    }

    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    pub fn authorities(&self) -> impl Iterator<Item = &str> {
        self.authorities.iter().map(String::as_str)
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }

    /// Security identity of the caller itself.
    pub fn sid(&self) -> Sid {
        Sid::principal(self.principal.as_deref().unwrap_or(ANONYMOUS_PRINCIPAL))
    }
}

#[cfg(test)]
mod tests {
    use crate::identity::Sid;

    use super::Caller;

    #[test]
    fn anonymous_caller() {
        let caller = Caller::anonymous();
        assert!(caller.is_anonymous());
        assert_eq!(caller.sid(), Sid::principal("anonymousUser"));
        assert_eq!(caller.authorities().count(), 0);
    }

    #[test]
    fn authenticated_caller() {
        let caller = Caller::authenticated("bob", ["GROUP_ADMIN", "GROUP_USER"]).elevated();
        assert!(!caller.is_anonymous());
        assert!(caller.is_elevated());
        assert!(caller.has_authority("GROUP_ADMIN"));
        assert_eq!(caller.sid(), Sid::principal("bob"));
    }
}
