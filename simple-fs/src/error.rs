use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    NotMounted,
    AlreadyMounted,
    NotFormatted,
    /// 0 号文件标识保留给空闲 inode
    ReservedFileId,
    AlreadyExists,
    NotFound,
    VolumeTooLarge,
    VolumeTooSmall,
    NoFreeInode,
    NoFreeBlock,
    /// 直接块已经用尽
    FileTooLarge,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NotMounted => "file system is not mounted",
            Self::AlreadyMounted => "file system is already mounted",
            Self::NotFormatted => "file system is not formatted",
            Self::ReservedFileId => "file id 0 is reserved",
            Self::AlreadyExists => "file already exists",
            Self::NotFound => "file not found",
            Self::VolumeTooLarge => "volume exceeds the maximum disk size",
            Self::VolumeTooSmall => "volume cannot hold an inode table",
            Self::NoFreeInode => "no free inode",
            Self::NoFreeBlock => "no free block",
            Self::FileTooLarge => "file has used up its direct blocks",
        };
        f.write_str(msg)
    }
}
