//! Inode 标志位

use bitflags::bitflags;

bitflags! {
    /// inode 的 i_flags 字段
    ///
    /// 未知位原样保留。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InodeFlags: u32 {
        /// 安全删除
        const SECRM = 0x0000_0001;
        /// 删除后可恢复
        const UNRM = 0x0000_0002;
        /// 压缩
        const COMPR = 0x0000_0004;
        /// 同步写
        const SYNC = 0x0000_0008;
        /// 不可修改
        const IMMUTABLE = 0x0000_0010;
        /// 只能追加
        const APPEND = 0x0000_0020;
        /// dump 时跳过
        const NODUMP = 0x0000_0040;
        /// 不更新访问时间
        const NOATIME = 0x0000_0080;
        /// 加密
        const ENCRYPT = 0x0000_0800;
        /// HTree 索引目录
        const INDEX = 0x0000_1000;
        /// AFS 目录
        const IMAGIC = 0x0000_2000;
        /// 数据写入日志
        const JOURNAL_DATA = 0x0000_4000;
        /// 不合并尾部
        const NOTAIL = 0x0000_8000;
        /// 目录同步
        const DIRSYNC = 0x0001_0000;
        /// 顶层目录
        const TOPDIR = 0x0002_0000;
        /// i_blocks 以文件系统块为单位
        const HUGE_FILE = 0x0004_0000;
        /// 使用 extent 树
        const EXTENTS = 0x0008_0000;
        /// fs-verity
        const VERITY = 0x0010_0000;
        /// inode 存放的是大扩展属性值
        const EA_INODE = 0x0020_0000;
        /// 数据存放在 inode 内
        const INLINE_DATA = 0x1000_0000;
        /// 项目 ID 继承
        const PROJINHERIT = 0x2000_0000;
        /// 大小写不敏感目录
        const CASEFOLD = 0x4000_0000;
    }
}
