use std::fs::File;
use std::io::{self, Read, Write};

use blob_store::{BlobManager, TransactionRunner, SEEK_SET};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::CliError;
use crate::params::Command;

#[derive(Debug, Serialize)]
struct BlobStat {
    key: String,
    size: u64,
    chunk_size: u64,
    chunks: u64,
    sha256: String,
}

/// Runs one command. `Ok(false)` means "answered no", which only `exists`
/// produces.
pub fn execute<R: TransactionRunner>(
    blobs: &BlobManager<R>,
    command: Command,
    stdin: &mut dyn Read,
    stdout: &mut dyn Write,
) -> Result<bool, CliError> {
    match command {
        Command::Put { key, file, offset } => {
            let mut writer = blobs.writer(key.as_str());
            match offset {
                Some(offset) => {
                    let size = writer.size()?;
                    if offset > size {
                        return Err(CliError::OffsetPastEnd { offset, size });
                    }
                    writer.seek(i64::try_from(offset).unwrap_or(i64::MAX), SEEK_SET)?;
                }
                None => blobs.delete(key.as_str())?,
            }
            let written = match file {
                Some(path) => io::copy(&mut File::open(path)?, &mut writer)?,
                None => io::copy(stdin, &mut writer)?,
            };
            tracing::info!("stored {} bytes in {:?} ending at {}", written, key, writer.tell());
        }
        Command::Get { key, offset, len } => {
            let mut reader = blobs.reader(key.as_str());
            reader.seek(i64::try_from(offset).unwrap_or(i64::MAX), SEEK_SET)?;
            let mut window = reader.take(len.unwrap_or(u64::MAX));
            io::copy(&mut window, stdout)?;
            stdout.flush()?;
        }
        Command::Delete { key } => {
            blobs.delete(key.as_str())?;
            tracing::info!("deleted {:?}", key);
        }
        Command::Exists { key } => {
            let exists = blobs.exists(key.as_str())?;
            writeln!(stdout, "{}", exists)?;
            return Ok(exists);
        }
        Command::Stat { key } => {
            let stat = stat(blobs, key)?;
            serde_json::to_writer_pretty(&mut *stdout, &stat)?;
            writeln!(stdout)?;
        }
    }
    Ok(true)
}

fn stat<R: TransactionRunner>(blobs: &BlobManager<R>, key: String) -> Result<BlobStat, CliError> {
    let chunk_size = blobs.chunk_size();
    let mut reader = blobs.reader(key.as_str());
    let mut hasher = Sha256::new();
    let mut size = 0;
    loop {
        // one chunk per transaction keeps each read small
        let piece = reader.read(Some(chunk_size))?;
        if piece.is_empty() {
            break;
        }
        size += piece.len() as u64;
        hasher.update(&piece);
    }
    Ok(BlobStat {
        key,
        size,
        chunk_size,
        chunks: size.div_ceil(chunk_size),
        sha256: format!("{:x}", hasher.finalize()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use blob_store::{BlobConfig, MemoryKv};
    use std::io::Cursor;
    use std::sync::Arc;

    fn blobs() -> BlobManager<MemoryKv> {
        let config = BlobConfig {
            chunk_size: 4,
            ..BlobConfig::default()
        };
        BlobManager::open(Arc::new(MemoryKv::new()), &config).unwrap()
    }

    fn run(blobs: &BlobManager<MemoryKv>, command: Command, input: &[u8]) -> (bool, Vec<u8>) {
        let mut stdin = Cursor::new(input.to_vec());
        let mut stdout = Vec::new();
        let answer = execute(blobs, command, &mut stdin, &mut stdout).unwrap();
        (answer, stdout)
    }

    fn put(key: &str, offset: Option<u64>) -> Command {
        Command::Put {
            key: key.into(),
            file: None,
            offset,
        }
    }

    fn get(key: &str, offset: u64, len: Option<u64>) -> Command {
        Command::Get {
            key: key.into(),
            offset,
            len,
        }
    }

    #[test]
    fn test_put_then_get() {
        let blobs = blobs();
        run(&blobs, put("k", None), b"hello world");
        assert_eq!(run(&blobs, get("k", 0, None), b"").1, b"hello world");
        assert_eq!(run(&blobs, get("k", 6, Some(3)), b"").1, b"wor");
        assert_eq!(run(&blobs, get("k", 40, None), b"").1, b"");
    }

    #[test]
    fn test_put_replaces_unless_offset_given() {
        let blobs = blobs();
        run(&blobs, put("k", None), b"hello world");
        run(&blobs, put("k", None), b"bye");
        assert_eq!(blobs.read("k").unwrap(), b"bye");

        run(&blobs, put("k", Some(1)), b"YE!");
        assert_eq!(blobs.read("k").unwrap(), b"bYE!");
    }

    #[test]
    fn test_put_offset_past_end_is_rejected() {
        let blobs = blobs();
        run(&blobs, put("k", None), b"abc");
        let mut stdout = Vec::new();
        let err = execute(&blobs, put("k", Some(4)), &mut Cursor::new(b"z".to_vec()), &mut stdout).unwrap_err();
        assert!(matches!(err, CliError::OffsetPastEnd { offset: 4, size: 3 }));
        assert_eq!(blobs.read("k").unwrap(), b"abc");

        run(&blobs, put("k", Some(3)), b"d");
        assert_eq!(blobs.read("k").unwrap(), b"abcd");
    }

    #[test]
    fn test_put_from_file() {
        let blobs = blobs();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.bin");
        std::fs::write(&path, b"from disk").unwrap();
        let command = Command::Put {
            key: "k".into(),
            file: Some(path),
            offset: None,
        };
        run(&blobs, command, b"");
        assert_eq!(blobs.read("k").unwrap(), b"from disk");
    }

    #[test]
    fn test_exists_and_delete() {
        let blobs = blobs();
        let exists = || Command::Exists { key: "k".into() };
        assert_eq!(run(&blobs, exists(), b""), (false, b"false\n".to_vec()));
        run(&blobs, put("k", None), b"abc");
        assert_eq!(run(&blobs, exists(), b""), (true, b"true\n".to_vec()));
        run(&blobs, Command::Delete { key: "k".into() }, b"");
        assert!(!run(&blobs, exists(), b"").0);
    }

    #[test]
    fn test_stat() {
        let blobs = blobs();
        run(&blobs, put("k", None), b"abc");
        let (_, out) = run(&blobs, Command::Stat { key: "k".into() }, b"");
        let stat: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(stat["key"], "k");
        assert_eq!(stat["size"], 3);
        assert_eq!(stat["chunks"], 1);
        assert_eq!(stat["chunk_size"], 4);
        assert_eq!(
            stat["sha256"],
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_stat_missing_blob() {
        let blobs = blobs();
        let (_, out) = run(&blobs, Command::Stat { key: "none".into() }, b"");
        let stat: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(stat["size"], 0);
        assert_eq!(stat["chunks"], 0);
    }
}
