//! xattr 命名空间
//!
//! 磁盘上只保存命名空间索引和去掉前缀的名字，完整名字由前缀表拼出。

use crate::consts::*;

/// 扩展属性命名空间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XattrNamespace {
    /// `user.`
    User,
    /// `system.posix_acl_access`
    PosixAclAccess,
    /// `system.posix_acl_default`
    PosixAclDefault,
    /// `trusted.`
    Trusted,
    /// `security.`
    Security,
    /// `system.`
    System,
    /// `system.richacl`
    RichAcl,
    /// 未知索引（包括 Lustre 使用的 5）
    Unknown(u8),
}

/// 命名空间前缀表
static PREFIX_TABLE: &[(u8, &str)] = &[
    (EXT4_XATTR_INDEX_USER, "user."),
    (EXT4_XATTR_INDEX_POSIX_ACL_ACCESS, "system.posix_acl_access"),
    (EXT4_XATTR_INDEX_POSIX_ACL_DEFAULT, "system.posix_acl_default"),
    (EXT4_XATTR_INDEX_TRUSTED, "trusted."),
    (EXT4_XATTR_INDEX_SECURITY, "security."),
    (EXT4_XATTR_INDEX_SYSTEM, "system."),
    (EXT4_XATTR_INDEX_RICHACL, "system.richacl"),
];

impl XattrNamespace {
    /// 由磁盘上的 name_index 转换
    pub fn from_index(index: u8) -> Self {
        match index {
            EXT4_XATTR_INDEX_USER => XattrNamespace::User,
            EXT4_XATTR_INDEX_POSIX_ACL_ACCESS => XattrNamespace::PosixAclAccess,
            EXT4_XATTR_INDEX_POSIX_ACL_DEFAULT => XattrNamespace::PosixAclDefault,
            EXT4_XATTR_INDEX_TRUSTED => XattrNamespace::Trusted,
            EXT4_XATTR_INDEX_SECURITY => XattrNamespace::Security,
            EXT4_XATTR_INDEX_SYSTEM => XattrNamespace::System,
            EXT4_XATTR_INDEX_RICHACL => XattrNamespace::RichAcl,
            other => XattrNamespace::Unknown(other),
        }
    }

    /// 磁盘上的 name_index
    pub fn index(self) -> u8 {
        match self {
            XattrNamespace::User => EXT4_XATTR_INDEX_USER,
            XattrNamespace::PosixAclAccess => EXT4_XATTR_INDEX_POSIX_ACL_ACCESS,
            XattrNamespace::PosixAclDefault => EXT4_XATTR_INDEX_POSIX_ACL_DEFAULT,
            XattrNamespace::Trusted => EXT4_XATTR_INDEX_TRUSTED,
            XattrNamespace::Security => EXT4_XATTR_INDEX_SECURITY,
            XattrNamespace::System => EXT4_XATTR_INDEX_SYSTEM,
            XattrNamespace::RichAcl => EXT4_XATTR_INDEX_RICHACL,
            XattrNamespace::Unknown(index) => index,
        }
    }

    /// 名字前缀，未知命名空间为空串
    pub fn prefix(self) -> &'static str {
        let index = self.index();
        PREFIX_TABLE
            .iter()
            .find(|(i, _)| *i == index)
            .map_or("", |(_, prefix)| prefix)
    }

    /// 把完整属性名拆成命名空间和磁盘上的名字
    ///
    /// 取最长的匹配前缀，因此 `system.posix_acl_access` 不会被归到
    /// `system.` 下。
    pub fn split_name(full_name: &[u8]) -> Option<(Self, &[u8])> {
        PREFIX_TABLE
            .iter()
            .filter(|(_, prefix)| full_name.starts_with(prefix.as_bytes()))
            .max_by_key(|(_, prefix)| prefix.len())
            .map(|(index, prefix)| (Self::from_index(*index), &full_name[prefix.len()..]))
    }
}
