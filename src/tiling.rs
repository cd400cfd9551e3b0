//! Host-side partition planner.
//!
//! Splits `total` elements over at most `available_cores` vector cores.
//! Every core except the last gets `block_size` elements, rounded up to a
//! 32-byte multiple so each block starts aligned; the last core absorbs the
//! remainder. There is no work migration between vector cores, so launching
//! more cores than tiles (or than the device has) buys nothing.

use std::ops::Range;

use crate::error::{KernelError, KernelResult};

/// Every block except the first starts on a multiple of this many bytes.
pub const BLOCK_ALIGN_BYTES: usize = 32;

/// Elements moved and computed per pipeline step unless configured otherwise.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Tiling data passed by value to every launched core.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddTiling {
    /// Maximum number of elements per pipeline step.
    pub tile_size: u32,
    /// Elements per core, all cores but the last.
    pub block_size: u32,
    /// Elements of the last core.
    pub last_block_size: u32,
}

/// Tiling plus the number of cores to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchPlan {
    pub num_blocks: u32,
    pub tiling: AddTiling,
}

impl LaunchPlan {
    pub fn total_elements(&self) -> usize {
        (self.num_blocks as usize - 1) * self.tiling.block_size as usize
            + self.tiling.last_block_size as usize
    }

    pub fn block_len(&self, block_idx: u32) -> usize {
        if block_idx + 1 == self.num_blocks {
            self.tiling.last_block_size as usize
        } else {
            self.tiling.block_size as usize
        }
    }

    /// Element range owned by `block_idx`.
    pub fn block_range(&self, block_idx: u32) -> Range<usize> {
        let start = block_idx as usize * self.tiling.block_size as usize;
        start..start + self.block_len(block_idx)
    }

    pub fn block_ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.num_blocks).map(move |idx| self.block_range(idx))
    }
}

#[inline]
pub fn ceil_div(a: u64, b: u64) -> u64 {
    a.div_ceil(b)
}

/// Plan a launch over `total` elements of `element_size` bytes each.
///
/// `total == 0` is rejected with [`KernelError::EmptyPartition`]; callers
/// skip the launch entirely for empty inputs.
pub fn plan_launch(
    total: usize,
    tile_size: u32,
    available_cores: u32,
    element_size: usize,
) -> KernelResult<LaunchPlan> {
    if total == 0 {
        return Err(KernelError::EmptyPartition);
    }
    if tile_size == 0 {
        return Err(KernelError::InvalidArgument("tile size must be > 0".into()));
    }
    if available_cores == 0 {
        return Err(KernelError::InvalidArgument(
            "available vector cores must be > 0".into(),
        ));
    }
    if element_size == 0
        || element_size > BLOCK_ALIGN_BYTES
        || BLOCK_ALIGN_BYTES % element_size != 0
    {
        return Err(KernelError::InvalidArgument(format!(
            "element size {element_size} does not divide the {BLOCK_ALIGN_BYTES}-byte alignment"
        )));
    }
    let total_u32 = u32::try_from(total).map_err(|_| {
        KernelError::InvalidArgument(format!("{total} elements exceed the u32 launch range"))
    })?;

    let total = u64::from(total_u32);
    let num_tiles = ceil_div(total, u64::from(tile_size));
    let mut num_blocks = num_tiles.min(u64::from(available_cores));

    let align = (BLOCK_ALIGN_BYTES / element_size) as u64;
    let mut block_size = if num_blocks == 1 {
        total
    } else {
        ceil_div(ceil_div(total, num_blocks), align) * align
    };

    // Rounding blocks up to the alignment unit can leave trailing cores with
    // nothing to do when total is small relative to num_blocks * align.
    // Launch only the cores that own elements.
    let fitted = ceil_div(total, block_size);
    if fitted < num_blocks {
        log::debug!(
            "tiling: aligned block {block_size} fills {fitted} of {num_blocks} cores, shrinking launch"
        );
        num_blocks = fitted;
        if num_blocks == 1 {
            block_size = total;
        }
    }

    let covered = (num_blocks - 1) * block_size;
    if total <= covered {
        log::error!(
            "tiling: total {total} <= (num_blocks {num_blocks} - 1) * block_size {block_size}"
        );
        return Err(KernelError::TilingInternal(format!(
            "last block size is not positive: total {total}, {num_blocks} blocks of {block_size}"
        )));
    }
    let last_block_size = total - covered;

    let to_u32 = |v: u64, what: &str| {
        u32::try_from(v).map_err(|_| {
            KernelError::TilingInternal(format!("{what} {v} exceeds u32"))
        })
    };
    let plan = LaunchPlan {
        num_blocks: to_u32(num_blocks, "block count")?,
        tiling: AddTiling {
            tile_size,
            block_size: to_u32(block_size, "block size")?,
            last_block_size: to_u32(last_block_size, "last block size")?,
        },
    };
    log::debug!(
        "tiling: total={total} tile={tile_size} cores={available_cores} elem={element_size}B -> {plan:?}"
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_invariants(plan: &LaunchPlan, total: usize, element_size: usize) {
        let t = plan.tiling;
        assert!(plan.num_blocks >= 1);
        assert!(t.last_block_size > 0);
        assert!(t.last_block_size <= t.block_size);
        assert_eq!(plan.total_elements(), total);
        if plan.num_blocks > 1 {
            assert_eq!((t.block_size as usize * element_size) % BLOCK_ALIGN_BYTES, 0);
        } else {
            assert_eq!(t.block_size as usize, total);
        }
    }

    #[test]
    fn test_scenario_a_float_four_cores() {
        let plan = plan_launch(2000, 512, 4, 4).unwrap();
        assert_eq!(plan.num_blocks, 4);
        // ceil(2000 / 4) = 500, rounded up to 8 elements.
        assert_eq!(plan.tiling.block_size, 504);
        assert_eq!(plan.tiling.last_block_size, 488);
        assert_eq!(plan.tiling.tile_size, 512);
        check_invariants(&plan, 2000, 4);
    }

    #[test]
    fn test_scenario_b_tiny_input_single_core() {
        let plan = plan_launch(10, 512, 32, 4).unwrap();
        assert_eq!(plan.num_blocks, 1);
        assert_eq!(plan.tiling.block_size, 10);
        assert_eq!(plan.tiling.last_block_size, 10);
    }

    #[test]
    fn test_one_available_core_takes_everything() {
        for total in [1usize, 7, 511, 512, 513, 100_003] {
            let plan = plan_launch(total, 512, 1, 2).unwrap();
            assert_eq!(plan.num_blocks, 1);
            assert_eq!(plan.tiling.block_size as usize, total);
            assert_eq!(plan.tiling.last_block_size as usize, total);
        }
    }

    #[test]
    fn test_cores_never_exceed_tiles_or_hardware() {
        let plan = plan_launch(512 * 3 + 1, 512, 48, 4).unwrap();
        assert_eq!(plan.num_blocks, 4);
        let plan = plan_launch(512 * 100, 512, 48, 4).unwrap();
        assert_eq!(plan.num_blocks, 48);
        check_invariants(&plan, 512 * 100, 4);
    }

    #[test]
    fn test_alignment_slack_shrinks_launch() {
        // 9 tiles of 1 element on 9 cores: aligned blocks of 8 leave only 2 cores with work.
        let plan = plan_launch(9, 1, 9, 4).unwrap();
        assert_eq!(plan.num_blocks, 2);
        assert_eq!(plan.tiling.block_size, 8);
        assert_eq!(plan.tiling.last_block_size, 1);
        check_invariants(&plan, 9, 4);

        let plan = plan_launch(5, 1, 64, 2).unwrap();
        assert_eq!(plan.num_blocks, 1);
        assert_eq!(plan.tiling.block_size, 5);
    }

    #[test]
    fn test_block_ranges_partition_input() {
        let plan = plan_launch(10_001, 256, 7, 2).unwrap();
        let mut next = 0;
        for range in plan.block_ranges() {
            assert_eq!(range.start, next);
            assert!(!range.is_empty());
            next = range.end;
        }
        assert_eq!(next, 10_001);
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(matches!(plan_launch(0, 512, 4, 4), Err(KernelError::EmptyPartition)));
        assert!(matches!(plan_launch(10, 0, 4, 4), Err(KernelError::InvalidArgument(_))));
        assert!(matches!(plan_launch(10, 512, 0, 4), Err(KernelError::InvalidArgument(_))));
        assert!(matches!(plan_launch(10, 512, 4, 3), Err(KernelError::InvalidArgument(_))));
        assert!(matches!(plan_launch(10, 512, 4, 64), Err(KernelError::InvalidArgument(_))));
    }

    #[test]
    fn test_deterministic() {
        let a = plan_launch(123_457, 512, 40, 2).unwrap();
        let b = plan_launch(123_457, 512, 40, 2).unwrap();
        assert_eq!(a, b);
    }
}
