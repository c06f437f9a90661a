use std::io::{self, BufRead, Write};

use fs_api_types::{Command, FsError, FsResult};

use crate::block::BlockDev;
use crate::fs::FileSystem;

const USAGE: &str = "\
format                 erase the disk and create an empty root
create <path>          create a file; body follows, ended by an empty line
cat <path>             print a file
ls                     list the working directory
cp <src> <dst>         copy a file
mv <src> <dst>         rename or move a file
rm <path>              remove a file or an empty directory
append <src> <dst>     append src to the end of dst
mkdir <path>           create a directory
cd <path>              change the working directory
pwd                    print the working directory
chmod <rights> <path>  set access rights (read=4, write=2, execute=1)
help                   show this text
quit                   leave";

// ─── Command loop ──────────────────────────────────────────────────────────────

/// Read commands from `input` until `quit` or end of input, run them against
/// `fs` and write their results to `out`. `prompt` is written before each
/// command line.
///
/// Filesystem errors are reported on `out` and do not stop the loop. Returns
/// how many of them were fatal.
pub fn run<D, R, W>(fs: &mut FileSystem<D>, mut input: R, mut out: W, prompt: &str) -> io::Result<usize>
where
    D: BlockDev,
    R: BufRead,
    W: Write,
{
    let mut fatal = 0;
    let mut line = String::new();
    loop {
        write!(out, "{prompt}")?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(FsError::UnknownCommand) => {
                let word = line.split_whitespace().next().unwrap_or("");
                writeln!(out, "{word}: {}", FsError::UnknownCommand)?;
                continue;
            }
            Err(err) => {
                writeln!(out, "{err}")?;
                continue;
            }
        };
        log::debug!("server: {command:?}");

        let result = match command {
            Command::Format             => fs.format(),
            Command::Create { path }    => handle_create(fs, &mut input, path)?,
            Command::Cat { path }       => handle_cat(fs, &mut out, path)?,
            Command::Ls                 => handle_ls(fs, &mut out).map(Ok)?,
            Command::Cp { src, dst }    => fs.cp(src, dst),
            Command::Mv { src, dst }    => fs.mv(src, dst),
            Command::Rm { path }        => fs.rm(path),
            Command::Append { src, dst } => fs.append(src, dst),
            Command::Mkdir { path }     => fs.mkdir(path),
            Command::Cd { path }        => fs.cd(path),
            Command::Pwd                => handle_pwd(fs, &mut out)?,
            Command::Chmod { rights, path } => fs.chmod(rights, path),
            Command::Help               => writeln!(out, "{USAGE}").map(Ok)?,
            Command::Quit               => break,
        };

        if let Err(err) = result {
            if err.is_fatal() {
                log::error!("server: {} failed: {err}", command.name());
                fatal += 1;
            } else {
                log::debug!("server: {} failed: {err}", command.name());
            }
            writeln!(out, "{}: {err}", command.name())?;
        }
    }
    Ok(fatal)
}

// ─── Handlers ──────────────────────────────────────────────────────────────────
//
// The outer `io::Result` is the terminal, the inner `FsResult` the filesystem.

/// Read the body of a new file: every following line up to the first empty
/// one (or end of input), each kept with its newline.
fn read_body<R: BufRead>(input: &mut R) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let text = line.trim_end_matches(['\n', '\r']);
        if text.is_empty() {
            break;
        }
        body.extend_from_slice(text.as_bytes());
        body.push(b'\n');
    }
    Ok(body)
}

fn handle_create<D: BlockDev, R: BufRead>(
    fs: &mut FileSystem<D>,
    input: &mut R,
    path: &str,
) -> io::Result<FsResult<()>> {
    let body = read_body(input)?;
    Ok(fs.create(path, &body))
}

fn handle_cat<D: BlockDev, W: Write>(fs: &mut FileSystem<D>, out: &mut W, path: &str) -> io::Result<FsResult<()>> {
    match fs.cat(path) {
        Ok(data) => {
            out.write_all(&data)?;
            Ok(Ok(()))
        }
        Err(err) => Ok(Err(err)),
    }
}

fn handle_ls<D: BlockDev, W: Write>(fs: &FileSystem<D>, out: &mut W) -> io::Result<()> {
    writeln!(out, "Name\tType\tAccess\tSize")?;
    for entry in fs.ls() {
        if entry.is_dir() {
            writeln!(out, "{}\tDir\t{}\t-", entry.name, entry.rights)?;
        } else {
            writeln!(out, "{}\tFile\t{}\t{}", entry.name, entry.rights, entry.size)?;
        }
    }
    Ok(())
}

fn handle_pwd<D: BlockDev, W: Write>(fs: &mut FileSystem<D>, out: &mut W) -> io::Result<FsResult<()>> {
    match fs.pwd() {
        Ok(path) => {
            writeln!(out, "{path}")?;
            Ok(Ok(()))
        }
        Err(err) => Ok(Err(err)),
    }
}

/// Exit status for a session that hit `fatal` corruption or I/O errors.
pub fn exit_code(fatal: usize) -> i32 {
    if fatal == 0 { 0 } else { 2 }
}

// ─── Unit tests ────────────────────────────────────────────────────────────────
