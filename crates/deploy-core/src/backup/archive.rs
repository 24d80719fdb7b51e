//! Tar archives (optionally gzipped) of backed-up files

use std::io::{Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tar::{Archive, Builder};

use crate::error::{Error, Result};

/// Archive `files` (relative to `root`) into `out`.
///
/// Entries are streamed from disk and named by their relative path.
pub fn write_archive<W: Write>(
    out: W,
    root: &Path,
    files: &[String],
    compressed: bool,
) -> Result<()> {
    if compressed {
        let builder = Builder::new(GzEncoder::new(out, Compression::default()));
        let encoder = append_all(builder, root, files)?;
        encoder.finish().map_err(Error::archive)?;
    } else {
        append_all(Builder::new(out), root, files)?;
    }
    Ok(())
}

fn append_all<W: Write>(mut builder: Builder<W>, root: &Path, files: &[String]) -> Result<W> {
    for relative in files {
        builder
            .append_path_with_name(root.join(relative), relative)
            .map_err(|e| Error::archive(format!("{relative}: {e}")))?;
    }
    builder.into_inner().map_err(Error::archive)
}

/// Unpack an archive under `dest` and return the entry names.
///
/// Entries that would land outside `dest` fail the whole extraction.
pub fn extract_archive<R: Read>(input: R, compressed: bool, dest: &Path) -> Result<Vec<String>> {
    if compressed {
        unpack(Archive::new(GzDecoder::new(input)), dest)
    } else {
        unpack(Archive::new(input), dest)
    }
}

fn unpack<R: Read>(mut archive: Archive<R>, dest: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in archive.entries().map_err(Error::archive)? {
        let mut entry = entry.map_err(Error::archive)?;
        let name = entry
            .path()
            .map_err(Error::archive)?
            .to_string_lossy()
            .replace('\\', "/");
        if !entry.unpack_in(dest).map_err(Error::archive)? {
            return Err(Error::archive(format!("entry {name} escapes the archive root")));
        }
        names.push(name);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::tempdir;

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn archive_round_trip(#[case] compressed: bool) {
        let source = tempdir().unwrap();
        fs::create_dir_all(source.path().join(".vscode")).unwrap();
        fs::write(source.path().join(".vscode/settings.json"), b"{\"a\": 1}").unwrap();
        fs::write(source.path().join("AGENTS.md"), b"# agents").unwrap();
        let files = vec![".vscode/settings.json".to_string(), "AGENTS.md".to_string()];

        let mut bytes = Vec::new();
        write_archive(&mut bytes, source.path(), &files, compressed).unwrap();
        if compressed {
            assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        }

        let dest = tempdir().unwrap();
        let names = extract_archive(bytes.as_slice(), compressed, dest.path()).unwrap();
        assert_eq!(names, files);
        assert_eq!(
            fs::read(dest.path().join(".vscode/settings.json")).unwrap(),
            b"{\"a\": 1}"
        );
        assert_eq!(fs::read(dest.path().join("AGENTS.md")).unwrap(), b"# agents");
    }

    #[test]
    fn missing_source_is_an_archive_error() {
        let source = tempdir().unwrap();
        let err =
            write_archive(Vec::new(), source.path(), &["gone.json".into()], false).unwrap_err();
        assert!(matches!(err, Error::Archive { .. }));
    }
}
