//! Smoke-test binary: opens a GZIP file, reports member metadata to stderr,
//! and streams the decompressed concatenation of every member to stdout.

use std::io::{self, Write};
use std::process::ExitCode;

use gzipf::{File, FileSource};

fn run(path: &str) -> gzipf::Result<()> {
    let source = FileSource::open(path).map_err(gzipf::Error::Io)?;
    let file = File::open(Box::new(source))?;

    let member_count = file.member_count()?;
    for index in 0..member_count {
        let member = file.member(index)?;
        eprintln!(
            "member {index}: name={:?} mtime={} os={} error={}",
            member.name_utf8(),
            member.modification_time(),
            member.operating_system(),
            member.decompression_error(),
        );
    }
    if file.is_corrupted() {
        eprintln!("warning: file is corrupted past the point already read");
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut buf = [0u8; 64 * 1024];
    file.seek(gzipf::Whence::Start, 0)?;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n]).map_err(gzipf::Error::Io)?;
    }

    file.close();
    Ok(())
}

fn main() -> ExitCode {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: gzcat <path>");
        return ExitCode::FAILURE;
    };

    match run(&path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("gzcat: {err}");
            ExitCode::FAILURE
        }
    }
}
