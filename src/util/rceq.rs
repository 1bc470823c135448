use std::cmp::{PartialEq, Eq};
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::rc::{Rc};

/** Wraps an `Rc<T>`, comparing and hashing by the address of the `T`. */
pub struct RcEq<T: ?Sized>(pub Rc<T>);

impl<T> RcEq<T> {
    pub fn new(t: T) -> Self {
        RcEq(Rc::new(t))
    }
}

impl<T: ?Sized> std::ops::Deref for RcEq<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target { self.0.deref() }
}

impl<T: ?Sized + Debug> Debug for RcEq<T> {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        (*self.0).fmt(f)
    }
}

impl<T: ?Sized> Clone for RcEq<T> {
    fn clone(&self) -> Self {
        RcEq(self.0.clone())
    }
}

impl<T: ?Sized> Hash for RcEq<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as *const u8).hash(state);
    }
}

impl<T: ?Sized> PartialEq for RcEq<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Eq for RcEq<T> {}

//-----------------------------------------------------------------------------

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::{HashSet};

    #[test]
    fn identity() {
        let a = RcEq::new(String::from("cpu"));
        let b = RcEq::new(String::from("cpu"));
        assert_ne!(a, b);
        let c = a.clone();
        assert_eq!(a, c);
        let set: HashSet<_> = [a.clone(), b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&a));
    }
}
