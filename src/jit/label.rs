/**
 * Represents a possibly unknown control-flow target in a code buffer, and
 * accumulates the instructions that jump to it. An undefined `Label` is
 * resolved using `Assembler::define()`, which patches every jump.
 */
#[derive(Debug, Default)]
pub struct Label {
    target: Option<usize>,
    patches: Vec<usize>,
}

impl Label {
    /** Constructs an unused `Label` with an unknown target address. */
    pub fn new() -> Self {
        Label {target: None, patches: Vec::new()}
    }

    /**
     * Returns the target address of this `Label`, if known. The address is
     * expressed as a byte offset into the code buffer.
     */
    pub fn target(&self) -> Option<usize> { self.target }

    pub fn is_defined(&self) -> bool { self.target.is_some() }

    /** Appends the jump instruction at `patch` to those that jump to `self`. */
    pub fn push(&mut self, patch: usize) {
        self.patches.push(patch);
    }

    /** Sets the target. Returns and forgets the instructions that jump to `self`. */
    pub fn define(&mut self, target: usize) -> Vec<usize> {
        assert!(!self.is_defined());
        self.target = Some(target);
        std::mem::take(&mut self.patches)
    }
}

//-----------------------------------------------------------------------------

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn define() {
        let mut label = Label::new();
        label.push(3);
        label.push(10);
        assert_eq!(label.define(20), vec![3, 10]);
        assert_eq!(label.target(), Some(20));
        label.push(30);
        assert!(label.is_defined());
    }
}
