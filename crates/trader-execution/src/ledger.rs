//! 포지션 원장.
//!
//! 봇이 관리 중인 주문(`order_id → ManagedOrder`)을 보관하고,
//! 모든 변경을 응답하기 전에 JSON 스냅샷 파일로 기록합니다(write-through).
//!
//! # 스냅샷 형식
//!
//! ```text
//! [
//!   { "orderId": "123", "data": { ...ManagedOrder... } },
//!   ...
//! ]
//! ```
//!
//! 스냅샷은 매번 전체를 임시 파일에 쓴 뒤 rename 하므로
//! 쓰기 도중 중단되어도 이전 스냅샷이 남습니다.
//!
//! 변경 연산은 메모리 상태를 항상 반영하고, 파일 기록에 실패한 경우에만
//! [`PersistenceError`]를 반환합니다. 호출자는 이를 경고로 기록하고 계속 진행합니다.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use trader_core::ManagedOrder;
use uuid::Uuid;

/// 원장 영속화 에러.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("원장 파일 입출력 실패 ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("원장 스냅샷 직렬화 실패: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("원장 스냅샷 손상 ({}): {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotEntry<'a> {
    order_id: &'a str,
    data: &'a ManagedOrder,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    order_id: String,
    data: ManagedOrder,
}

/// 관리 주문 원장.
///
/// 모든 변경은 하나의 `tokio::sync::Mutex`를 거치므로
/// 시그널 처리와 조정 루프가 동시에 접근해도 순서가 보장됩니다.
pub struct PositionLedger {
    orders: Mutex<BTreeMap<String, ManagedOrder>>,
    snapshot_path: Option<PathBuf>,
}

impl PositionLedger {
    /// 파일 기록 없는 원장 (테스트/드라이런).
    pub fn in_memory() -> Self {
        Self {
            orders: Mutex::new(BTreeMap::new()),
            snapshot_path: None,
        }
    }

    /// 스냅샷 파일에서 원장을 복원합니다.
    ///
    /// 파일이 없거나 비어 있으면 빈 원장으로 시작합니다.
    /// 파일이 손상된 경우 덮어쓰지 않도록 에러를 반환합니다.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();

        let orders = match tokio::fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => decode_snapshot(&text).map_err(|source| PersistenceError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "원장 파일 없음, 빈 원장으로 시작");
                BTreeMap::new()
            }
            Err(source) => return Err(PersistenceError::Io { path, source }),
        };

        info!(count = orders.len(), path = %path.display(), "원장 로드 완료");
        Ok(Self {
            orders: Mutex::new(orders),
            snapshot_path: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    // ==================== 변경 ====================

    /// 관리 주문 추가 (같은 ID가 있으면 교체).
    pub async fn insert(&self, order: ManagedOrder) -> Result<(), PersistenceError> {
        let mut orders = self.orders.lock().await;
        if orders.contains_key(&order.order_id) {
            warn!(order_id = %order.order_id, "이미 관리 중인 주문 ID, 교체");
        }
        orders.insert(order.order_id.clone(), order);
        self.persist(&orders).await
    }

    /// 관리 주문 제거.
    ///
    /// 존재했으면 `Ok(true)`. 없는 ID는 파일을 다시 쓰지 않습니다.
    pub async fn remove(&self, order_id: &str) -> Result<bool, PersistenceError> {
        let mut orders = self.orders.lock().await;
        if orders.remove(order_id).is_none() {
            return Ok(false);
        }
        self.persist(&orders).await?;
        Ok(true)
    }

    /// 관리 주문을 제자리에서 수정합니다.
    ///
    /// `mutate`가 `true`를 반환할 때만 스냅샷을 기록합니다.
    /// 주문이 존재했으면 `Ok(true)`.
    pub async fn update<F>(&self, order_id: &str, mutate: F) -> Result<bool, PersistenceError>
    where
        F: FnOnce(&mut ManagedOrder) -> bool,
    {
        let mut orders = self.orders.lock().await;
        let Some(order) = orders.get_mut(order_id) else {
            return Ok(false);
        };
        if mutate(order) {
            self.persist(&orders).await?;
        }
        Ok(true)
    }

    // ==================== 조회 ====================

    pub async fn get(&self, order_id: &str) -> Option<ManagedOrder> {
        self.orders.lock().await.get(order_id).cloned()
    }

    pub async fn contains(&self, order_id: &str) -> bool {
        self.orders.lock().await.contains_key(order_id)
    }

    /// 현재 관리 주문 전체 (주문 ID 순).
    pub async fn snapshot(&self) -> Vec<ManagedOrder> {
        self.orders.lock().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.orders.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.lock().await.is_empty()
    }

    // ==================== 영속화 ====================

    async fn persist(&self, orders: &BTreeMap<String, ManagedOrder>) -> Result<(), PersistenceError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let entries: Vec<SnapshotEntry<'_>> = orders
            .iter()
            .map(|(order_id, data)| SnapshotEntry { order_id, data })
            .collect();
        let json = serde_json::to_string_pretty(&entries).map_err(PersistenceError::Serialize)?;

        write_atomically(path, json.as_bytes()).await?;
        debug!(count = entries.len(), "원장 스냅샷 저장");
        Ok(())
    }
}

fn decode_snapshot(text: &str) -> Result<BTreeMap<String, ManagedOrder>, serde_json::Error> {
    let entries: Vec<StoredEntry> = serde_json::from_str(text)?;
    let mut orders = BTreeMap::new();
    for entry in entries {
        if orders.insert(entry.order_id.clone(), entry.data).is_some() {
            warn!(order_id = %entry.order_id, "스냅샷에 중복 주문 ID, 마지막 항목 사용");
        }
    }
    Ok(orders)
}

/// 임시 파일에 쓰고 rename.
async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let io_err = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let temp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    tokio::fs::write(&temp, bytes).await.map_err(io_err)?;

    if let Err(source) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(io_err(source));
    }
    Ok(())
}
