//! Worker slots and their scratch directories

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::scratch::DIR_PREFIX;
use crate::types::{Result, SlotId};

use super::Shutdown;

/// Owner of the per-slot scratch directories under `scratch_root`
#[derive(Debug, Clone)]
pub struct ScratchArena {
    root: PathBuf,
}

impl ScratchArena {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<scratch_root>/temp_<n>`
    pub fn slot_dir(&self, slot: SlotId) -> PathBuf {
        self.root.join(format!("{}{}", DIR_PREFIX, slot.number()))
    }

    /// Create the scratch directories for slots `1..=count`
    pub fn prepare(&self, count: usize) -> Result<Vec<PathBuf>> {
        (0..count)
            .map(|index| {
                let dir = self.slot_dir(SlotId::from_index(index));
                fs::create_dir_all(&dir)?;
                Ok(dir)
            })
            .collect()
    }
}

/// One worker of the pool: a stable id, a scratch directory and a
/// one-time start delay
#[derive(Debug)]
pub struct Slot {
    id: SlotId,
    scratch_dir: PathBuf,
    stagger: Duration,
    started: bool,
}

impl Slot {
    pub fn new(id: SlotId, arena: &ScratchArena, stagger: Duration) -> Self {
        Self {
            id,
            scratch_dir: arena.slot_dir(id),
            stagger,
            started: false,
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Delay before the first tile: `index × stagger`
    pub fn start_delay(&self) -> Duration {
        self.stagger.saturating_mul(self.id.index() as u32)
    }

    /// Sleep the start delay on the first call only
    ///
    /// Returns false if shutdown was requested while waiting.
    pub async fn wait_for_start(&mut self, shutdown: &mut Shutdown) -> bool {
        if self.started {
            return true;
        }
        self.started = true;

        let delay = self.start_delay();
        if delay.is_zero() {
            return true;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = shutdown.wait() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::shutdown_channel;
    use tempfile::TempDir;

    #[test]
    fn test_arena_prepares_numbered_dirs() {
        let temp = TempDir::new().unwrap();
        let arena = ScratchArena::new(temp.path().join("scratch"));
        let dirs = arena.prepare(3).unwrap();
        assert_eq!(dirs.len(), 3);
        assert!(dirs[0].ends_with("temp_1"));
        assert!(dirs[2].ends_with("temp_3"));
        assert!(dirs.iter().all(|d| d.is_dir()));
    }

    #[test]
    fn test_start_delay_scales_with_index() {
        let arena = ScratchArena::new("/scratch");
        let stagger = Duration::from_secs(5);
        assert_eq!(Slot::new(SlotId::new(1), &arena, stagger).start_delay(), Duration::ZERO);
        assert_eq!(
            Slot::new(SlotId::new(4), &arena, stagger).start_delay(),
            Duration::from_secs(15)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stagger_applies_to_first_tile_only() {
        let (_trigger, mut shutdown) = shutdown_channel();
        let arena = ScratchArena::new("/scratch");
        let mut slot = Slot::new(SlotId::new(3), &arena, Duration::from_secs(5));

        let started = tokio::time::Instant::now();
        assert!(slot.wait_for_start(&mut shutdown).await);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(10) && waited < Duration::from_secs(11));

        let again = tokio::time::Instant::now();
        assert!(slot.wait_for_start(&mut shutdown).await);
        assert!(again.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_stagger() {
        let (trigger, mut shutdown) = shutdown_channel();
        let arena = ScratchArena::new("/scratch");
        let mut slot = Slot::new(SlotId::new(2), &arena, Duration::from_secs(60));

        trigger.trigger();
        assert!(!slot.wait_for_start(&mut shutdown).await);
    }
}
