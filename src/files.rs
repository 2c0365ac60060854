//! Local filesystem side of the pipeline: listing the source folder, opening
//! a file as a byte stream, and removing it after upload.

use std::io;
use std::path::{Path, PathBuf};

use tokio_util::io::ReaderStream;

use crate::host::UploadBody;

/// Regular files directly inside `dir` whose extension matches `extension`
/// (ASCII case-insensitive, without the dot), sorted by file name.
///
/// Symlinks are followed, so a link to a video counts as a file. Links whose
/// target is missing are skipped.
pub fn enumerate(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let wanted = extension.trim_start_matches('.');
    let mut paths = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => continue,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted));
        if matches {
            paths.push(path);
        }
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

/// Opens `path` as a lazily-read upload body.
pub async fn open_upload(path: &Path) -> io::Result<UploadBody> {
    let file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    Ok(UploadBody {
        len,
        stream: Box::pin(ReaderStream::new(file)),
    })
}

pub async fn remove(path: &Path) -> io::Result<()> {
    tokio::fs::remove_file(path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn enumerate_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_2.mp4", "a_1.MP4", "notes.txt", "c_3.mkv"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let files = enumerate(dir.path(), "mp4").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a_1.MP4", "b_2.mp4"]);
    }

    #[cfg(unix)]
    #[test]
    fn enumerate_follows_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let target = elsewhere.path().join("a_1.mp4");
        std::fs::write(&target, b"x").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("a_1.mp4")).unwrap();
        std::os::unix::fs::symlink(
            elsewhere.path().join("gone.mp4"),
            dir.path().join("b_2.mp4"),
        )
        .unwrap();

        let files = enumerate(dir.path(), "mp4").unwrap();
        assert_eq!(files, vec![dir.path().join("a_1.mp4")]);
    }

    #[test]
    fn enumerate_accepts_dotted_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_1.mkv"), b"x").unwrap();
        assert_eq!(enumerate(dir.path(), ".mkv").unwrap().len(), 1);
    }

    #[test]
    fn enumerate_missing_dir_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(enumerate(&dir.path().join("missing"), "mp4").is_err());
    }

    #[tokio::test]
    async fn open_upload_streams_the_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anna_1.mp4");
        let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &payload).unwrap();

        let mut body = open_upload(&path).await.unwrap();
        assert_eq!(body.len, payload.len() as u64);

        let mut read = Vec::new();
        let mut chunks = 0;
        while let Some(chunk) = body.stream.next().await {
            read.extend_from_slice(&chunk.unwrap());
            chunks += 1;
        }
        assert_eq!(read, payload);
        assert!(chunks > 1, "file should arrive in several chunks");
    }

    #[tokio::test]
    async fn remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anna_1.mp4");
        std::fs::write(&path, b"x").unwrap();

        remove(&path).await.unwrap();
        assert!(!path.exists());
        assert!(remove(&path).await.is_err());
    }
}
