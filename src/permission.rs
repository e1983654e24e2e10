use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::error::{FsError, Result};
use crate::identity::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FsAction(u8);

impl FsAction {
    pub const NONE: FsAction = FsAction(0);
    pub const EXECUTE: FsAction = FsAction(0b001);
    pub const WRITE: FsAction = FsAction(0b010);
    pub const WRITE_EXECUTE: FsAction = FsAction(0b011);
    pub const READ: FsAction = FsAction(0b100);
    pub const READ_EXECUTE: FsAction = FsAction(0b101);
    pub const READ_WRITE: FsAction = FsAction(0b110);
    pub const ALL: FsAction = FsAction(0b111);

    pub const fn from_bits(bits: u8) -> Self {
        FsAction(bits & 0b111)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn implies(self, other: FsAction) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn symbol(self) -> String {
        let mut s = String::with_capacity(3);
        s.push(if self.implies(FsAction::READ) { 'r' } else { '-' });
        s.push(if self.implies(FsAction::WRITE) { 'w' } else { '-' });
        s.push(if self.implies(FsAction::EXECUTE) { 'x' } else { '-' });
        s
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    #[default]
    None,
    Read,
    Write,
    Execute,
    ReadExecute,
    ReadWrite,
    WriteExecute,
    All,
}

// 按枚举顺序排列
const LEVEL_MASKS: [FsAction; 8] = [
    FsAction::NONE,
    FsAction::READ,
    FsAction::WRITE,
    FsAction::EXECUTE,
    FsAction::READ_EXECUTE,
    FsAction::READ_WRITE,
    FsAction::WRITE_EXECUTE,
    FsAction::ALL,
];

impl PermissionLevel {
    pub const ALL_LEVELS: [PermissionLevel; 8] = [
        PermissionLevel::None,
        PermissionLevel::Read,
        PermissionLevel::Write,
        PermissionLevel::Execute,
        PermissionLevel::ReadExecute,
        PermissionLevel::ReadWrite,
        PermissionLevel::WriteExecute,
        PermissionLevel::All,
    ];

    pub fn to_action_mask(self) -> FsAction {
        LEVEL_MASKS[self as usize]
    }

    /// 不认识的名字一律视为 NONE
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "READ" => PermissionLevel::Read,
            "WRITE" => PermissionLevel::Write,
            "EXECUTE" => PermissionLevel::Execute,
            "READ_EXECUTE" => PermissionLevel::ReadExecute,
            "READ_WRITE" => PermissionLevel::ReadWrite,
            "WRITE_EXECUTE" => PermissionLevel::WriteExecute,
            "ALL" => PermissionLevel::All,
            _ => PermissionLevel::None,
        }
    }
}

impl FromStr for PermissionLevel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(PermissionLevel::from_name(s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FsPermission {
    pub user: FsAction,
    pub group: FsAction,
    pub other: FsAction,
    pub sticky: bool,
}

impl Default for FsPermission {
    fn default() -> Self {
        FsPermission::new(FsAction::ALL, FsAction::ALL, FsAction::ALL)
    }
}

impl FsPermission {
    pub fn new(user: FsAction, group: FsAction, other: FsAction) -> Self {
        Self {
            user,
            group,
            other,
            sticky: false,
        }
    }

    pub fn from_levels(user: PermissionLevel, group: PermissionLevel, other: PermissionLevel, sticky: bool) -> Self {
        Self {
            user: user.to_action_mask(),
            group: group.to_action_mask(),
            other: other.to_action_mask(),
            sticky,
        }
    }

    pub fn from_mode(mode: u32) -> Self {
        Self {
            user: FsAction::from_bits(((mode >> 6) & 0o7) as u8),
            group: FsAction::from_bits(((mode >> 3) & 0o7) as u8),
            other: FsAction::from_bits((mode & 0o7) as u8),
            sticky: mode & 0o1000 != 0,
        }
    }

    pub fn to_mode(self) -> u32 {
        let sticky = if self.sticky { 0o1000 } else { 0 };
        sticky
            | (u32::from(self.user.bits()) << 6)
            | (u32::from(self.group.bits()) << 3)
            | u32::from(self.other.bits())
    }

    /// 解析权限描述：10 位符号形式（"-rwxr-x--t"）或 3~4 位八进制（"755"）
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if !spec.is_empty() && spec.len() <= 4 && spec.chars().all(|c| c.is_digit(8)) {
            let mode = u32::from_str_radix(spec, 8)
                .map_err(|e| FsError::InvalidPermission(format!("{}: {}", spec, e)))?;
            return Ok(FsPermission::from_mode(mode));
        }

        let chars: Vec<char> = spec.chars().collect();
        if chars.len() != 10 {
            return Err(FsError::InvalidPermission(format!("length != 10 (unixSymbolicPermission={})", spec)));
        }

        let mut bits = [0u8; 3];
        let mut sticky = false;
        for (i, c) in chars[1..].iter().enumerate() {
            let (expected, bit) = match i % 3 {
                0 => ('r', 0b100),
                1 => ('w', 0b010),
                _ => ('x', 0b001),
            };
            match *c {
                c if c == expected => bits[i / 3] |= bit,
                '-' => {}
                't' if i == 8 => {
                    bits[2] |= 0b001;
                    sticky = true;
                }
                'T' if i == 8 => sticky = true,
                other => {
                    return Err(FsError::InvalidPermission(format!("unexpected '{}' in {}", other, spec)));
                }
            }
        }

        Ok(Self {
            user: FsAction::from_bits(bits[0]),
            group: FsAction::from_bits(bits[1]),
            other: FsAction::from_bits(bits[2]),
            sticky,
        })
    }
}

impl fmt::Display for FsPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut other = self.other.symbol();
        if self.sticky {
            let last = if self.other.implies(FsAction::EXECUTE) { "t" } else { "T" };
            other.replace_range(2..3, last);
        }
        write!(f, "{}{}{}", self.user.symbol(), self.group.symbol(), other)
    }
}

pub fn to_display_string(user: FsAction, group: FsAction, other: FsAction) -> String {
    format!("-{}{}{}", user.symbol(), group.symbol(), other.symbol())
}

pub fn permission_to_string(permission: Option<&FsPermission>) -> String {
    match permission {
        Some(p) => to_display_string(p.user, p.group, p.other),
        None => "default".to_string(),
    }
}

/// 按 owner -> group -> other 的顺序选择三元组检查 `action`
pub fn check_access(
    owner: &str,
    group: &str,
    permission: Option<&FsPermission>,
    action: FsAction,
    identity: &Identity,
) -> bool {
    let default = FsPermission::default();
    let permission = permission.unwrap_or(&default);
    if identity.short_name() == owner {
        permission.user.implies(action)
    } else if identity.is_member_of(group) {
        permission.group.implies(action)
    } else {
        permission.other.implies(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_masks() {
        assert_eq!(PermissionLevel::None.to_action_mask(), FsAction::NONE);
        assert_eq!(PermissionLevel::Read.to_action_mask(), FsAction::READ);
        assert_eq!(PermissionLevel::ReadExecute.to_action_mask(), FsAction::READ_EXECUTE);
        assert_eq!(PermissionLevel::WriteExecute.to_action_mask(), FsAction::WRITE_EXECUTE);
        assert_eq!(PermissionLevel::All.to_action_mask(), FsAction::ALL);
        assert_eq!(PermissionLevel::from_name("read_write"), PermissionLevel::ReadWrite);
        assert_eq!(PermissionLevel::from_name("bogus"), PermissionLevel::None);
        assert_eq!("ALL".parse::<PermissionLevel>().unwrap(), PermissionLevel::All);
    }

    #[test]
    fn test_display_round_trip() {
        for user in PermissionLevel::ALL_LEVELS {
            for group in PermissionLevel::ALL_LEVELS {
                for other in PermissionLevel::ALL_LEVELS {
                    let (u, g, o) = (user.to_action_mask(), group.to_action_mask(), other.to_action_mask());
                    let display = to_display_string(u, g, o);
                    assert_eq!(display.len(), 10);
                    let parsed = FsPermission::parse(&display).unwrap();
                    assert_eq!((parsed.user, parsed.group, parsed.other), (u, g, o));
                    assert_eq!(permission_to_string(Some(&parsed)), display);
                }
            }
        }
    }

    #[test]
    fn test_parse_forms() {
        let p = FsPermission::parse("755").unwrap();
        assert_eq!(p.to_string(), "rwxr-xr-x");
        assert_eq!(p.to_mode(), 0o755);

        let p = FsPermission::parse("drwxrwxrwt").unwrap();
        assert!(p.sticky);
        assert_eq!(p.other, FsAction::ALL);
        assert_eq!(p.to_mode(), 0o1777);

        let p = FsPermission::parse("-rw-r--r-T").unwrap();
        assert!(p.sticky);
        assert_eq!(p.other, FsAction::READ);

        assert!(FsPermission::parse("rwx").is_err());
        assert!(FsPermission::parse("-rwxq-x---").is_err());
        assert_eq!(permission_to_string(None), "default");
    }

    #[test]
    fn test_check_access_uses_matching_triplet() {
        let alice = Identity::new("alice", vec!["staff".into()]);
        let bob = Identity::new("bob", vec!["staff".into()]);
        let eve = Identity::new("eve", vec![]);
        let perm = FsPermission::parse("-rw-r-x--x").unwrap();

        assert!(check_access("alice", "staff", Some(&perm), FsAction::READ, &alice));
        assert!(check_access("alice", "staff", Some(&perm), FsAction::WRITE, &alice));
        assert!(!check_access("alice", "staff", Some(&perm), FsAction::EXECUTE, &alice));

        assert!(check_access("alice", "staff", Some(&perm), FsAction::READ, &bob));
        assert!(!check_access("alice", "staff", Some(&perm), FsAction::WRITE, &bob));
        assert!(check_access("alice", "staff", Some(&perm), FsAction::EXECUTE, &bob));

        assert!(!check_access("alice", "staff", Some(&perm), FsAction::READ, &eve));
        assert!(check_access("alice", "staff", Some(&perm), FsAction::EXECUTE, &eve));

        assert!(check_access("alice", "staff", None, FsAction::WRITE, &eve));
    }
}
