use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    user: String,
    groups: Vec<String>,
}

impl Identity {
    pub fn new(user: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            user: user.into(),
            groups,
        }
    }

    pub fn current() -> Self {
        Self::new(whoami::username(), Vec::new())
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// 短用户名：去掉 "/host" 与 "@REALM" 部分
    pub fn short_name(&self) -> &str {
        let end = self
            .user
            .find(|c| c == '/' || c == '@')
            .unwrap_or(self.user.len());
        &self.user[..end]
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name() {
        assert_eq!(Identity::new("alice", vec![]).short_name(), "alice");
        assert_eq!(Identity::new("hdfs/nn1.example.com@EXAMPLE.COM", vec![]).short_name(), "hdfs");
        assert_eq!(Identity::new("bob@EXAMPLE.COM", vec![]).short_name(), "bob");
    }

    #[test]
    fn test_groups() {
        let id = Identity::new("alice", vec!["staff".into(), "hadoop".into()]);
        assert!(id.is_member_of("hadoop"));
        assert!(!id.is_member_of("wheel"));
        assert!(!Identity::current().user().is_empty());
    }
}
