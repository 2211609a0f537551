use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

pub use normalize::normalize_path;

/// In-memory file-system for testing
pub mod in_memory_file_system;

/// File-system implementation using std::fs
pub mod os_file_system;

mod normalize;

/// FileSystem abstraction instance
///
/// This should be `OsFileSystem` for non-testing environments and `InMemoryFileSystem` for testing.
pub type FileSystemRef = Arc<dyn FileSystem + Send + Sync>;

/// Trait abstracting the file-system operations the plugin performs.
///
/// Module sources are read during the load hook and on-disk build outputs are
/// read and rewritten during the end hook.
#[mockall::automock]
pub trait FileSystem: std::fmt::Debug {
  fn cwd(&self) -> std::io::Result<PathBuf> {
    Err(std::io::Error::new(
      std::io::ErrorKind::Other,
      "Not implemented: FileSystem::cwd",
    ))
  }

  fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;
  fn read_to_string(&self, path: &Path) -> std::io::Result<String>;
  fn write(&self, path: &Path, contents: &[u8]) -> std::io::Result<()>;
  fn is_file(&self, path: &Path) -> bool;
}
