// Раскладка на диске и настройки
pub mod consts;
pub mod config;
pub mod error;
pub mod lock;

// Утилиты (now_local, parse_age, wrap_list)
pub mod util; // src/util/mod.rs

// История пакетов: dpkg.log -> ChangeSet
pub mod changes; // src/changes/{mod,net}.rs
pub mod history; // src/history/{mod,logfiles,auto}.rs

// Граф снапшотов
pub mod snapshots; // src/snapshots/{mod,name,node,forest,manager}.rs
pub mod tree;      // src/tree/mod.rs

// Внешние примитивы: btrfs, mount, fstab
pub mod fstab;
pub mod mount;
pub mod ops;

// Удобные реэкспорты
pub use changes::{ChangeSet, PkgOp};
pub use config::SnapConfig;
pub use error::SnapError;
pub use history::DpkgHistory;
pub use lock::{acquire_lock, LockGuard, LockMode};
pub use mount::VolumeRoot;
pub use ops::{BtrfsOps, PlainDirOps, VolumeOps};
pub use snapshots::{CreateOutcome, DeleteReport, Forest, Snapshot, SnapshotManager};
