//! YAML directory store: one `<alert_id>.yml` file per alert, written
//! atomically.

use std::path::{Path, PathBuf};

use {
    async_trait::async_trait,
    herald_config::AlertRecord,
    tokio::fs,
    tracing::{debug, warn},
};

use crate::{Context, Result, store::AlertStore};

pub struct YamlDirStore {
    dir: PathBuf,
}

impl YamlDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, alert_id: &str) -> PathBuf {
        self.dir.join(format!("{alert_id}.yml"))
    }

    /// Atomic write: write to temp, then rename over the target.
    async fn atomic_write(&self, path: &Path, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let tmp = path.with_extension("yml.tmp");
        fs::write(&tmp, contents.as_bytes())
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .await
            .with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }
}

fn is_record_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml" | "yaml")
    )
}

#[async_trait]
impl AlertStore for YamlDirStore {
    async fn store(&self, record: &AlertRecord) -> Result<()> {
        let path = self.record_path(&record.alert_id);
        self.atomic_write(&path, &record.to_yaml()?).await?;
        debug!(alert_id = %record.alert_id, path = %path.display(), "alert record stored");
        Ok(())
    }

    async fn remove(&self, alert_id: &str) -> Result<()> {
        for ext in ["yml", "yaml"] {
            let path = self.dir.join(format!("{alert_id}.{ext}"));
            match fs::remove_file(&path).await {
                Ok(()) => debug!(alert_id, path = %path.display(), "alert record removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to remove {}", path.display()));
                },
            }
        }
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<AlertRecord>> {
        if !fs::try_exists(&self.dir).await.unwrap_or(false) {
            fs::create_dir_all(&self.dir)
                .await
                .with_context(|| format!("failed to create {}", self.dir.display()))?;
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        let mut dir = fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("failed to read {}", self.dir.display()))?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if is_record_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let raw = match fs::read_to_string(&path).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable alert file");
                    continue;
                },
            };
            match AlertRecord::from_yaml(&raw) {
                Ok(record) => {
                    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
                    // `remove` only knows the id, so a record must live at its
                    // own file name to be deletable.
                    if stem != record.alert_id {
                        warn!(
                            path = %path.display(),
                            alert_id = %record.alert_id,
                            "skipping alert file whose name does not match its alert id"
                        );
                        continue;
                    }
                    records.push(record);
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping malformed alert file");
                },
            }
        }
        Ok(records)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, herald_config::ScheduleParams, tempfile::TempDir};

    fn record(id: &str) -> AlertRecord {
        AlertRecord {
            alert_id: id.into(),
            schedule: vec![ScheduleParams {
                id: "all_day".into(),
                router_id: "gmail".into(),
                enabled: true,
                email_addrs: vec!["ops@example.com".into()],
                ..Default::default()
            }],
        }
    }

    #[tokio::test]
    async fn store_load_remove() {
        let tmp = TempDir::new().unwrap();
        let store = YamlDirStore::new(tmp.path().join("alerts.d"));

        store.store(&record("greg")).await.unwrap();
        store.store(&record("db-down")).await.unwrap();
        assert!(tmp.path().join("alerts.d/greg.yml").exists());
        assert!(!tmp.path().join("alerts.d/greg.yml.tmp").exists());

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded, vec![record("db-down"), record("greg")]);

        store.remove("greg").await.unwrap();
        store.remove("greg").await.unwrap();
        assert_eq!(store.load_all().await.unwrap(), vec![record("db-down")]);
    }

    #[tokio::test]
    async fn store_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = YamlDirStore::new(tmp.path());
        store.store(&record("greg")).await.unwrap();
        let mut updated = record("greg");
        updated.schedule[0].router_id = "elastic".into();
        store.store(&updated).await.unwrap();
        assert_eq!(store.load_all().await.unwrap(), vec![updated]);
    }

    #[tokio::test]
    async fn load_skips_malformed_and_foreign_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("broken.yml"), "alert: [unterminated").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignore me").unwrap();
        std::fs::write(
            tmp.path().join("legacy.yaml"),
            "alert: legacy\nschedule:\n  - id: x\n    router_id: gmail\n",
        )
        .unwrap();

        let store = YamlDirStore::new(tmp.path());
        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].alert_id, "legacy");

        store.remove("legacy").await.unwrap();
        assert!(!tmp.path().join("legacy.yaml").exists());
    }

    #[tokio::test]
    async fn misnamed_file_is_not_loaded() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("old-name.yml"),
            "alert: db-down\nschedule:\n  - id: x\n    router_id: gmail\n",
        )
        .unwrap();

        let store = YamlDirStore::new(tmp.path());
        assert!(store.load_all().await.unwrap().is_empty());

        // Once stored under its own name, the record loads and deletes.
        store.store(&record("db-down")).await.unwrap();
        assert_eq!(store.load_all().await.unwrap(), vec![record("db-down")]);
        store.remove("db-down").await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_failure_names_the_path() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let store = YamlDirStore::new(&blocker);
        let err = store.store(&record("greg")).await.unwrap_err();
        assert!(err.to_string().contains("failed to create"), "{err}");
    }

    #[tokio::test]
    async fn load_creates_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested/alerts.d");
        let store = YamlDirStore::new(&dir);
        assert!(store.load_all().await.unwrap().is_empty());
        assert!(dir.is_dir());
    }
}
