//! 스냅샷 저장
//!
//! - [`envelope`]: 업로드 봉투와 파일 종류
//! - [`bundle`]: 길이 접두사 다중 파일 번들 코덱과 zip 아카이브
//! - [`store`]: 파일 종류별 디코딩, 기록, 에스컬레이션

pub mod bundle;
pub mod envelope;
pub mod store;

pub use bundle::{BundleEntry, BundleReport};
pub use envelope::{SnapshotEnvelope, SnapshotFileType};
pub use store::SnapshotStore;
