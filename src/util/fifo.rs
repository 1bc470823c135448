/**
 * A first-in-first-out worklist that remembers everything that was ever
 * enqueued, and refuses duplicates.
 */
#[derive(Debug)]
pub struct Fifo<T> {
    items: Vec<T>,
    done: usize,
}

impl<T: Copy + PartialEq> Fifo<T> {
    pub fn new() -> Self {
        Fifo {items: Vec::new(), done: 0}
    }

    /** Enqueues `item` unless it has been enqueued before. */
    pub fn enqueue(&mut self, item: T) -> bool {
        if self.items.contains(&item) { return false; }
        self.items.push(item);
        true
    }

    pub fn dequeue(&mut self) -> Option<T> {
        let item = self.items.get(self.done).copied();
        if item.is_some() { self.done += 1; }
        item
    }

    /** Returns all items that have ever been in the queue. */
    pub fn finish(self) -> Vec<T> {
        self.items
    }
}

impl<T: Copy + PartialEq> Default for Fifo<T> {
    fn default() -> Self { Self::new() }
}

//-----------------------------------------------------------------------------

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn order() {
        let mut fifo = Fifo::new();
        assert!(fifo.enqueue(3u8));
        assert!(fifo.enqueue(1));
        assert!(!fifo.enqueue(3));
        assert_eq!(fifo.dequeue(), Some(3));
        assert!(fifo.enqueue(2));
        assert_eq!(fifo.dequeue(), Some(1));
        assert_eq!(fifo.dequeue(), Some(2));
        assert_eq!(fifo.dequeue(), None);
        assert!(!fifo.enqueue(1));
        assert_eq!(fifo.finish(), vec![3, 1, 2]);
    }
}
