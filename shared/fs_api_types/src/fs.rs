use core::fmt;

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// Errors returned by every filesystem operation.
///
/// `Io` and `Corrupt` are fatal: they mean the device failed or the on-disk
/// structures no longer satisfy their invariants. Everything else is an
/// ordinary user error and leaves the disk untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("file exists")]
    AlreadyExists,
    #[error("not a file")]
    NotAFile,
    #[error("not a directory")]
    NotADirectory,
    #[error("directory not empty")]
    DirectoryNotEmpty,
    #[error("directory full")]
    DirectoryFull,
    #[error("file name too long")]
    NameTooLong,
    #[error("permission denied")]
    PermissionDenied,
    #[error("no space left on device")]
    DiskFull,
    #[error("parent directory not found")]
    ParentNotFound,
    #[error("invalid file name")]
    InvalidName,
    #[error("invalid access rights")]
    InvalidRights,
    #[error("directory is the working directory")]
    DirectoryInUse,
    #[error("unknown command")]
    UnknownCommand,
    #[error("{command}: expected {expected} argument(s)")]
    WrongArgCount { command: &'static str, expected: usize },
    #[error("I/O error on block {block}")]
    Io { block: u16 },
    #[error("filesystem corrupt at block {block}: {reason}")]
    Corrupt { block: u16, reason: &'static str },
}

impl FsError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, FsError::Io { .. } | FsError::Corrupt { .. })
    }
}

pub type FsResult<T> = core::result::Result<T, FsError>;

/// On-disk type tag of a directory slot. A zeroed slot decodes as `Empty`.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
pub enum EntryKind {
    Empty     = 0,
    File      = 1,
    Directory = 2,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessRights: u8 {
        const EXECUTE = 1 << 0;
        const WRITE = 1 << 1;
        const READ = 1 << 2;

        // chmod stores whatever integer it is given
        const _ = !0;
    }
}

impl AccessRights {
    /// Rights granted to entries made by `create` and `mkdir`.
    pub const fn read_write() -> Self {
        Self::READ.union(Self::WRITE)
    }

    pub fn can_read(self) -> bool { self.contains(Self::READ) }
    pub fn can_write(self) -> bool { self.contains(Self::WRITE) }
    pub fn can_execute(self) -> bool { self.contains(Self::EXECUTE) }
}

/// `rwx`-style rendering, e.g. `rw-`.
impl fmt::Display for AccessRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(self.can_read(), 'r'),
            flag(self.can_write(), 'w'),
            flag(self.can_execute(), 'x'),
        )
    }
}

/// One line of the command surface, borrowing its arguments from the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Format,
    Create { path: &'a str },
    Cat    { path: &'a str },
    Ls,
    Cp     { src: &'a str, dst: &'a str },
    Mv     { src: &'a str, dst: &'a str },
    Rm     { path: &'a str },
    Append { src: &'a str, dst: &'a str },
    Mkdir  { path: &'a str },
    Cd     { path: &'a str },
    Pwd,
    Chmod  { rights: &'a str, path: &'a str },
    Help,
    Quit,
}

impl<'a> Command<'a> {
    /// Parse a whitespace-separated command line such as `cp a b`.
    pub fn parse(line: &'a str) -> FsResult<Self> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(FsError::UnknownCommand)?;
        let mut args = [""; 2];
        let mut argc = 0;
        for word in words {
            if argc == args.len() {
                argc += 1;
                break;
            }
            args[argc] = word;
            argc += 1;
        }

        let (command, expected) = match name {
            "format" => (Command::Format, 0),
            "create" => (Command::Create { path: args[0] }, 1),
            "cat"    => (Command::Cat { path: args[0] }, 1),
            "ls"     => (Command::Ls, 0),
            "cp"     => (Command::Cp { src: args[0], dst: args[1] }, 2),
            "mv"     => (Command::Mv { src: args[0], dst: args[1] }, 2),
            "rm"     => (Command::Rm { path: args[0] }, 1),
            "append" => (Command::Append { src: args[0], dst: args[1] }, 2),
            "mkdir"  => (Command::Mkdir { path: args[0] }, 1),
            "cd"     => (Command::Cd { path: args[0] }, 1),
            "pwd"    => (Command::Pwd, 0),
            "chmod"  => (Command::Chmod { rights: args[0], path: args[1] }, 2),
            "help"   => (Command::Help, 0),
            "quit" | "exit" => (Command::Quit, 0),
            _ => return Err(FsError::UnknownCommand),
        };
        if argc != expected {
            return Err(FsError::WrongArgCount { command: command.name(), expected });
        }
        Ok(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Format => "format",
            Command::Create { .. } => "create",
            Command::Cat { .. } => "cat",
            Command::Ls => "ls",
            Command::Cp { .. } => "cp",
            Command::Mv { .. } => "mv",
            Command::Rm { .. } => "rm",
            Command::Append { .. } => "append",
            Command::Mkdir { .. } => "mkdir",
            Command::Cd { .. } => "cd",
            Command::Pwd => "pwd",
            Command::Chmod { .. } => "chmod",
            Command::Help => "help",
            Command::Quit => "quit",
        }
    }
}
