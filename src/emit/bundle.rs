//! Zip bundle of emitted artifacts, for download without touching the output directory.

use super::Artifact;
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Zip the artifacts in the given order. Entry timestamps are fixed so equal input gives equal bytes.
pub fn bundle(artifacts: &[Artifact]) -> Result<Vec<u8>, BundleError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for artifact in artifacts {
        writer.start_file(artifact.path.as_str(), options)?;
        writer.write_all(artifact.content.as_bytes())?;
    }
    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::{ArtifactId, ArtifactKind};
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn entries_keep_paths_and_content() {
        let artifacts = vec![
            Artifact::new(
                ArtifactId::model("shop", "Tag", ArtifactKind::Model),
                "shop/models/tag.py".into(),
                "class Tag: ...\n".into(),
            ),
            Artifact::new(ArtifactId::package("shop", "urls"), "shop/urls.py".into(), "urlpatterns = []\n".into()),
        ];
        let bytes = bundle(&artifacts).unwrap();
        assert_eq!(bytes, bundle(&artifacts).unwrap());

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut content = String::new();
        archive.by_name("shop/urls.py").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "urlpatterns = []\n");
    }
}
