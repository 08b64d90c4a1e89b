use crate::error::{Error, Result};

/// Tallest tower a node may ever be given.
pub const DEFAULT_MAX_HEIGHT: usize = 20;
/// One in `DEFAULT_BRANCHING` nodes grows to the next level.
pub const DEFAULT_BRANCHING: u32 = 4;
/// Size of a shared arena block.
pub const BLOCK_SIZE: usize = 4096;

/// Upper bound accepted for `Options::max_height`. Sizes the on-stack
/// predecessor array used by inserts.
pub const MAX_HEIGHT_LIMIT: usize = 32;

const MIN_BLOCK_SIZE: usize = 64;

#[derive(Clone, Copy, Debug)]
pub struct Options {
    pub max_height: usize,
    pub branching: u32,
    pub block_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_height: DEFAULT_MAX_HEIGHT,
            branching: DEFAULT_BRANCHING,
            block_size: BLOCK_SIZE,
        }
    }
}

impl Options {
    pub fn validate(&self) -> Result<()> {
        if self.max_height == 0 || self.max_height > MAX_HEIGHT_LIMIT {
            return Err(Error::InvalidArgument(format!(
                "max_height must be in 1..={}, got {}",
                MAX_HEIGHT_LIMIT, self.max_height
            )));
        }
        if self.branching < 2 {
            return Err(Error::InvalidArgument(format!(
                "branching must be at least 2, got {}",
                self.branching
            )));
        }
        if self.block_size < MIN_BLOCK_SIZE {
            return Err(Error::InvalidArgument(format!(
                "block_size must be at least {}, got {}",
                MIN_BLOCK_SIZE, self.block_size
            )));
        }
        Ok(())
    }
}
