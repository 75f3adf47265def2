//! Where step files come from and how a page URL maps to their names.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use async_trait::async_trait;
use smallvec::SmallVec;
use url::Url;

use formpilot_core_types::DomainKey;

use crate::errors::{PlaybookError, PlaybookErrorKind};
use crate::model::{Playbook, Step};

/// Collapse opaque path segments to `:id` so one step file covers every
/// listing page of a site. A segment is opaque when it is all digits or
/// a slug of eight or more `[A-Za-z0-9_-]` characters.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| if is_opaque_id(segment) { ":id" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_opaque_id(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    if segment.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }
    segment.len() >= 8
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// File names to try for a page, most general first: `{host}.json`, then
/// `{host}{normalized path}` with slashes flattened to underscores.
pub fn candidate_names(target: &Url) -> Result<SmallVec<[String; 2]>, PlaybookError> {
    let host = target
        .host_str()
        .ok_or_else(|| PlaybookErrorKind::InvalidUrl(target.to_string()))?;
    let domain = DomainKey::from_host(host);

    let mut names: SmallVec<[String; 2]> = SmallVec::new();
    names.push(format!("{domain}.json"));

    let path = normalize_path(target.path());
    let specific = format!("{}{}", domain, path).replace('/', "_") + ".json";
    if !names.contains(&specific) {
        names.push(specific);
    }
    Ok(names)
}

/// A place step files can be fetched from by name. `Ok(None)` is the
/// ordinary miss; resolution walks the candidates until one source hit.
#[async_trait]
pub trait PlaybookSource: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Option<Playbook>, PlaybookError>;
}

/// Step files on local disk, one JSON array per file.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl PlaybookSource for DirSource {
    async fn fetch(&self, name: &str) -> Result<Option<Playbook>, PlaybookError> {
        if name.contains('/') || name.contains("..") {
            return Err(PlaybookErrorKind::Invalid(format!("bad playbook name: {name}")).into());
        }
        let path = self.root.join(name);
        if !path.is_file() {
            return Ok(None);
        }
        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let steps: Vec<Step> = serde_json::from_reader(reader)?;
        Ok(Some(Playbook::new(name, steps)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_ids_only() {
        assert_eq!(normalize_path("/listing/12345/edit"), "/listing/:id/edit");
        assert_eq!(normalize_path("/biz/a1B2c3D4e5"), "/biz/:id");
        assert_eq!(normalize_path("/about/team"), "/about/team");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn short_or_dotted_segments_survive() {
        assert_eq!(normalize_path("/add.html"), "/add.html");
        assert_eq!(normalize_path("/abc123"), "/abc123");
    }

    #[test]
    fn candidates_put_general_file_first() {
        let url = Url::parse("https://www.example.com/listing/98765").unwrap();
        let names = candidate_names(&url).unwrap();
        assert_eq!(names[0], "example.com.json");
        assert_eq!(names[1], "example.com_listing_:id.json");
    }

    #[tokio::test]
    async fn dir_source_reads_step_arrays() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("example.com.json"),
            r##"[{"action": "fill", "selector": "#name", "valueKey": "businessName"}]"##,
        )
        .unwrap();

        let source = DirSource::new(dir.path());
        let playbook = source.fetch("example.com.json").await.unwrap().unwrap();
        assert_eq!(playbook.name, "example.com.json");
        assert_eq!(playbook.len(), 1);

        assert!(source.fetch("missing.json").await.unwrap().is_none());
        assert!(source.fetch("../escape.json").await.is_err());
    }
}
