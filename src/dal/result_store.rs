use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::{
    domain::{search_kind::SearchKind, search_result::SearchResult},
    error::StoreError,
};

/// One JSON file per (user, kind) under `root`.
///
/// Saves go through a uniquely named temp file and a rename, so a reader
/// only ever sees a complete result. There is no lock per key: two saves
/// racing on the same (user, kind) both succeed and the later rename wins.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ResultStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, user_id: &str, kind: SearchKind) -> PathBuf {
        self.root.join(format!("user_{}_{}.json", user_id, kind))
    }

    pub async fn save(&self, result: &SearchResult) -> Result<(), StoreError> {
        let path = self.path_for(&result.user_id, result.kind);
        tokio::fs::create_dir_all(&self.root).await?;

        let replaced = tokio::fs::try_exists(&path).await.unwrap_or(false);
        let bytes = serde_json::to_vec_pretty(result)?;

        let tmp = self.root.join(format!(
            ".user_{}_{}.{}.tmp",
            result.user_id,
            result.kind,
            Uuid::new_v4()
        ));
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        match replaced {
            true => log::info!(
                "Replaced old {} result for user {}",
                result.kind,
                result.user_id
            ),
            false => log::info!(
                "Saved new {} result for user {}",
                result.kind,
                result.user_id
            ),
        }
        Ok(())
    }

    pub async fn load(
        &self,
        user_id: &str,
        kind: SearchKind,
    ) -> Result<Option<SearchResult>, StoreError> {
        let bytes = match tokio::fs::read(self.path_for(user_id, kind)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
