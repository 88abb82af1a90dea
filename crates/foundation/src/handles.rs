/// Generational handle: `(index, generation)`.
///
/// A handle stays valid only while the slot it points at still carries the
/// same generation, so a recycled slot never aliases an old handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u32, u32);

impl Handle {
    pub fn new(index: u32, generation: u32) -> Self {
        Handle(index, generation)
    }

    pub fn index(&self) -> u32 {
        self.0
    }

    pub fn generation(&self) -> u32 {
        self.1
    }

    /// Same slot, next generation.
    pub fn next_generation(self) -> Self {
        Handle(self.0, self.1.wrapping_add(1))
    }
}
