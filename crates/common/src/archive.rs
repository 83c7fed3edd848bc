//! Release archive extraction.

use crate::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::{Archive, EntryType};
use tracing::debug;

/// Extract a `.tar.gz` archive into `dest`.
///
/// Mode bits of every entry are applied to the extracted file. Entries whose
/// paths would escape `dest` are skipped. Returns the regular files written.
pub fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(archive)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let mut extracted = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative = entry.path()?.to_path_buf();
        let is_file = entry.header().entry_type() == EntryType::Regular;

        if !entry.unpack_in(dest)? {
            debug!("Skipped archive entry outside destination: {:?}", relative);
            continue;
        }
        if is_file {
            extracted.push(dest.join(relative));
        }
    }

    Ok(extracted)
}

/// Find an extracted file by exact file name.
pub fn find_file<'a>(files: &'a [PathBuf], name: &str) -> Result<&'a PathBuf> {
    files
        .iter()
        .find(|p| p.file_name().map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| Error::NotFoundInArchive(name.to_string()))
}

/// Build an in-memory `.tar.gz` from `(path, content, mode)` triples.
#[cfg(any(test, feature = "testing"))]
pub fn pack_tar_gz(files: &[(&str, &[u8], u32)]) -> Result<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (path, content, mode) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(*mode);
        header.set_cksum();
        builder.append_data(&mut header, path, *content)?;
    }

    Ok(builder.into_inner()?.finish()?)
}
