use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

fn is_gzipped(file: &str) -> bool {
    Path::new(file).extension().is_some_and(|x| x == "gz")
}

/// Buffered reader, decompressing `.gz` files on the fly
pub fn open_buf_reader(file: &str) -> anyhow::Result<Box<dyn BufRead>> {
    let handle = File::open(file).map_err(|e| anyhow::anyhow!("{}: {}", file, e))?;
    if is_gzipped(file) {
        Ok(Box::new(BufReader::new(GzDecoder::new(handle))))
    } else {
        Ok(Box::new(BufReader::new(handle)))
    }
}

/// Buffered writer; `stdout` and `stderr` are taken literally and
/// `.gz` files are compressed
pub fn open_buf_writer(file: &str) -> anyhow::Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = match file.to_ascii_lowercase().as_str() {
        "stdout" => Box::new(BufWriter::new(std::io::stdout())),
        "stderr" => Box::new(BufWriter::new(std::io::stderr())),
        _ => {
            let handle = File::create(file).map_err(|e| anyhow::anyhow!("{}: {}", file, e))?;
            if is_gzipped(file) {
                Box::new(BufWriter::new(GzEncoder::new(handle, Compression::default())))
            } else {
                Box::new(BufWriter::new(handle))
            }
        }
    };
    Ok(writer)
}

/// All lines of a (possibly gzipped) text file
pub fn read_lines(file: &str) -> anyhow::Result<Vec<Box<str>>> {
    open_buf_reader(file)?
        .lines()
        .map(|line| -> anyhow::Result<Box<str>> { Ok(line?.into_boxed_str()) })
        .collect()
}

/// Write one element per line. A closed pipe ends the output quietly.
pub fn write_types<T: std::fmt::Display>(items: &[T], file: &str) -> anyhow::Result<()> {
    let mut buf = open_buf_writer(file)?;
    for x in items {
        match writeln!(buf, "{}", x) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(anyhow::anyhow!("{}: {}", file, e)),
        }
    }
    buf.flush()?;
    Ok(())
}

/// Make sure the directory of `file` exists
pub fn mkdir(file: &str) -> anyhow::Result<()> {
    match Path::new(file).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(std::fs::create_dir_all(dir)?),
        Some(_) => Ok(()),
        None => Err(anyhow::anyhow!("{} has no parent directory", file)),
    }
}

/// A fresh file name with `suffix` in a new temporary directory. The
/// file itself is not kept.
pub fn create_temp_dir_file(suffix: &str) -> anyhow::Result<std::path::PathBuf> {
    let dir = tempfile::tempdir()?.keep();
    let file = tempfile::Builder::new().suffix(suffix).tempfile_in(&dir)?;
    Ok(file.path().to_path_buf())
}

/// Remove a file or a directory tree, if present
pub fn remove_file(file: &str) -> anyhow::Result<()> {
    let path = Path::new(file);
    if path.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}
