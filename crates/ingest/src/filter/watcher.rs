//! 필터 설정 파일 감시
//!
//! 설정 파일이 있는 디렉토리를 감시하다가 해당 파일의 변경 이벤트가 오면
//! 고정 지연 후 한 번 리로드합니다. 지연 동안 추가로 들어온 이벤트는 합칩니다.
//! 실제 교체 여부는 엔진이 파일 지문으로 판단합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::engine::FilterEngine;
use crate::alert::AlertTransport;
use crate::error::IngestError;

/// 설정 파일 감시자. drop 되면 감시를 멈춥니다.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
    path: PathBuf,
}

impl ConfigWatcher {
    /// 엔진의 설정 파일 감시를 시작합니다.
    ///
    /// tokio 런타임 안에서 호출해야 합니다.
    pub fn spawn<T: AlertTransport>(
        engine: Arc<FilterEngine<T>>,
        delay: Duration,
    ) -> Result<Self, IngestError> {
        let path = engine.config_path().to_path_buf();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let file_name = path.file_name().map(|n| n.to_os_string()).ok_or_else(|| {
            IngestError::Config {
                field: "filter_config_path".to_owned(),
                reason: format!("'{}' has no file name", path.display()),
            }
        })?;

        std::fs::create_dir_all(&dir).map_err(|e| IngestError::persistence(&dir, e))?;

        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if !is_content_change(&event.kind) {
                        return;
                    }
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if touches_file {
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::warn!(error = %e, "filter config watch error"),
            }
        })
        .map_err(|e| IngestError::Config {
            field: "filter_config_path".to_owned(),
            reason: format!("failed to create watcher: {e}"),
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| IngestError::Config {
                field: "filter_config_path".to_owned(),
                reason: format!("failed to watch '{}': {e}", dir.display()),
            })?;

        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                tokio::time::sleep(delay).await;
                while rx.try_recv().is_ok() {}

                // 실패는 엔진이 로그로 남기고 이전 설정을 유지함
                let _ = engine.reload().await;
            }
            tracing::debug!("filter config watcher stopped");
        });

        tracing::info!(path = %path.display(), delay_ms = delay.as_millis() as u64, "watching filter config");

        Ok(Self {
            _watcher: watcher,
            task,
            path,
        })
    }

    /// 감시 중인 설정 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertDispatcher;
    use crate::alert::dispatcher::tests::RecordingTransport;
    use crate::filter::types::FilterDocument;
    use chrono::FixedOffset;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn only_content_changes_trigger_reload() {
        assert!(is_content_change(&EventKind::Create(CreateKind::File)));
        assert!(is_content_change(&EventKind::Modify(ModifyKind::Any)));
        assert!(!is_content_change(&EventKind::Access(AccessKind::Any)));
        assert!(!is_content_change(&EventKind::Remove(RemoveKind::File)));
    }

    #[tokio::test]
    async fn file_change_triggers_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log_filter_config.json");
        let dispatcher = Arc::new(AlertDispatcher::new(
            RecordingTransport::default(),
            FixedOffset::east_opt(0).unwrap(),
        ));
        let engine = Arc::new(FilterEngine::load(&path, dispatcher).await.unwrap());
        let watcher = ConfigWatcher::spawn(Arc::clone(&engine), Duration::from_millis(50)).unwrap();
        assert_eq!(watcher.path(), path.as_path());

        let mut doc = FilterDocument::builtin();
        doc.filter_config.rules[0].pattern = "[TRACE]".to_owned();
        std::fs::write(&path, serde_json::to_vec_pretty(&doc).unwrap()).unwrap();

        let mut reloaded = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if engine.active().document.filter_config.rules[0].pattern == "[TRACE]" {
                reloaded = true;
                break;
            }
        }
        assert!(reloaded, "config change was not picked up");
        assert!(!engine.process("[TRACE] x", "ip"));
    }
}
