use std::io::{Error, ErrorKind};
use memmap::{Mmap, MmapMut};

/**
 * A read-only, executable copy of some machine code.
 *
 * Apart from calls to [`invoke()`], all unsafe code in the crate lives here.
 * Patching temporarily makes the memory writable; if the permissions cannot
 * be restored the code is lost and every later access fails.
 *
 * [`invoke()`]: Executable::invoke
 */
#[derive(Debug)]
pub struct Executable {
    memory: Option<Mmap>,
    len: usize,
}

fn lost() -> Error {
    Error::new(ErrorKind::Other, "executable memory was lost")
}

impl Executable {
    /** Allocates executable memory holding a copy of `code`. */
    pub fn new(code: &[u8]) -> std::io::Result<Self> {
        let mut memory = MmapMut::map_anon(std::cmp::max(code.len(), 1))?;
        memory[..code.len()].copy_from_slice(code);
        Ok(Executable {memory: Some(memory.make_exec()?), len: code.len()})
    }

    /** The machine code. Empty if the memory was lost. */
    pub fn bytes(&self) -> &[u8] {
        self.memory.as_ref().map_or(&[], |m| &m[..self.len])
    }

    /** Allocates a private copy. */
    pub fn try_clone(&self) -> std::io::Result<Self> {
        if self.memory.is_none() { return Err(lost()); }
        Executable::new(self.bytes())
    }

    /** Overwrites the code at `pos` with `bytes`. */
    pub fn patch(&mut self, pos: usize, bytes: &[u8]) -> std::io::Result<()> {
        assert!(pos + bytes.len() <= self.len);
        let memory = self.memory.take().ok_or_else(lost)?;
        let mut writable = memory.make_mut()?;
        writable[pos..][..bytes.len()].copy_from_slice(bytes);
        self.memory = Some(writable.make_exec()?);
        Ok(())
    }

    /** The absolute address of the byte at `pos`. */
    pub fn address(&self, pos: usize) -> Option<usize> {
        assert!(pos < self.len);
        self.memory.as_ref().map(|m| m.as_ptr() as usize + pos)
    }

    /**
     * Calls the code at `pos` as an `extern "sysv64" fn(*mut T, usize)`.
     *
     * # Safety
     *
     * The code at `pos` must be a function with that signature that only
     * accesses memory reachable through `arg0` and `arg1`.
     */
    #[cfg(target_arch="x86_64")]
    pub unsafe fn invoke<T>(&self, pos: usize, arg0: &mut T, arg1: usize) -> std::io::Result<()> {
        let address = self.address(pos).ok_or_else(lost)?;
        let f: extern "sysv64" fn(*mut T, usize) = std::mem::transmute(address);
        f(arg0 as *mut T, arg1);
        Ok(())
    }
}

//-----------------------------------------------------------------------------

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn copy_and_patch() {
        let mut code = Executable::new(&[0x90, 0x90, 0xC3]).expect("Couldn't allocate");
        assert_eq!(code.bytes(), &[0x90, 0x90, 0xC3]);
        let copy = code.try_clone().expect("Couldn't allocate");
        code.patch(1, &[0xCC]).expect("Couldn't change permissions");
        assert_eq!(code.bytes(), &[0x90, 0xCC, 0xC3]);
        assert_eq!(copy.bytes(), &[0x90, 0x90, 0xC3]);
        assert!(code.address(0).is_some());
        assert_ne!(code.address(0), copy.address(0));
    }

    #[cfg(target_arch="x86_64")]
    #[test]
    fn invoke() {
        // mov [rdi], sil; ret
        let code = Executable::new(&[0x40, 0x88, 0x37, 0xC3]).expect("Couldn't allocate");
        let mut state = 0u8;
        unsafe { code.invoke(0, &mut state, 42) }.expect("Couldn't call");
        assert_eq!(state, 42);
    }
}
