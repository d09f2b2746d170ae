/// Slot-based ID pool with free-list recycling.
/// IDs stay stable until freed; freed slots are reused in LIFO order.
pub struct Pool<T> {
    slots: Vec<Option<T>>,
    free_ids: Vec<usize>,
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_ids: Vec::new(),
        }
    }

    /// Allocate a slot for `value` and return its ID.
    pub fn alloc(&mut self, value: T) -> usize {
        match self.free_ids.pop() {
            Some(id) => {
                debug_assert!(self.slots[id].is_none());
                self.slots[id] = Some(value);
                id
            }
            None => {
                self.slots.push(Some(value));
                self.slots.len() - 1
            }
        }
    }

    pub fn get(&self, id: usize) -> Option<&T> {
        self.slots.get(id).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut T> {
        self.slots.get_mut(id).and_then(|slot| slot.as_mut())
    }

    /// Free a slot for reuse. Freeing an unused ID is a no-op.
    pub fn free(&mut self, id: usize) {
        if let Some(slot) = self.slots.get_mut(id) {
            if slot.take().is_some() {
                self.free_ids.push(id);
            }
        }
    }

    pub fn used_count(&self) -> usize {
        self.slots.len() - self.free_ids.len()
    }

    pub fn total_count(&self) -> usize {
        self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_ids.clear();
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}
