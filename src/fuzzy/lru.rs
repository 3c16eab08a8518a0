// File: src/fuzzy/lru.rs

/// A doubly linked recency list stored in a slot arena.
///
/// Nodes are addressed by slot index, so "move to most recent" and
/// "drop least recent" are O(1) without any pointer juggling. Freed slots are
/// recycled.
#[derive(Debug, Clone)]
pub struct LruList<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

#[derive(Debug, Clone)]
struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<T> LruList<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts as most recent and returns the slot.
    pub fn push_front(&mut self, value: T) -> usize {
        let node = Node { value, prev: None, next: self.head };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        match self.head {
            Some(old) => self.node_mut(old).prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
        self.len += 1;
        idx
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.slots.get_mut(idx)?.as_mut().map(|n| &mut n.value)
    }

    pub fn remove(&mut self, idx: usize) -> Option<T> {
        if self.slots.get(idx)?.is_none() {
            return None;
        }
        self.unlink(idx);
        let node = self.slots[idx].take()?;
        self.free.push(idx);
        self.len -= 1;
        Some(node.value)
    }

    pub fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) || self.slots.get(idx).map_or(true, Option::is_none) {
            return;
        }
        self.unlink(idx);
        let old_head = self.head;
        {
            let node = self.node_mut(idx);
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => self.node_mut(h).prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    /// Removes the least recently used value.
    pub fn pop_back(&mut self) -> Option<T> {
        let tail = self.tail?;
        self.remove(tail)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Walks from most to least recent, yielding `(slot, value)`.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { list: self, cursor: self.head }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.node_mut(idx);
            (node.prev.take(), node.next.take())
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
    }

    // Only called with indices reachable from head/tail, which are always occupied.
    fn node_mut(&mut self, idx: usize) -> &mut Node<T> {
        match self.slots[idx].as_mut() {
            Some(node) => node,
            None => unreachable!("linked slot {idx} is vacant"),
        }
    }
}

pub struct Iter<'a, T> {
    list: &'a LruList<T>,
    cursor: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let node = self.list.slots[idx].as_ref()?;
        self.cursor = node.next;
        Some((idx, &node.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(list: &LruList<u32>) -> Vec<u32> {
        list.iter().map(|(_, v)| *v).collect()
    }

    #[test]
    fn keeps_recency_order() {
        let mut list = LruList::with_capacity(4);
        let a = list.push_front(1);
        list.push_front(2);
        let c = list.push_front(3);
        assert_eq!(order(&list), vec![3, 2, 1]);

        list.move_to_front(a);
        assert_eq!(order(&list), vec![1, 3, 2]);
        assert_eq!(list.pop_back(), Some(2));
        assert_eq!(list.remove(c), Some(3));
        assert_eq!(order(&list), vec![1]);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn recycles_slots() {
        let mut list = LruList::with_capacity(2);
        let a = list.push_front(1);
        list.remove(a);
        assert_eq!(list.remove(a), None);
        let b = list.push_front(2);
        assert_eq!(a, b);
        assert_eq!(list.pop_back(), Some(2));
        assert!(list.is_empty());
        assert_eq!(list.pop_back(), None);
    }

    #[test]
    fn move_to_front_ignores_vacant_slots() {
        let mut list = LruList::with_capacity(3);
        let a = list.push_front(1);
        let b = list.push_front(2);
        list.remove(a);
        list.move_to_front(a);
        list.move_to_front(42);
        assert_eq!(order(&list), vec![2]);
        list.push_front(3);
        list.move_to_front(b);
        assert_eq!(order(&list), vec![2, 3]);
    }
}
