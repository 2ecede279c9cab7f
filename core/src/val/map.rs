use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use crate::val::{Hashable, Value};

pub type MapRef = Rc<MapValue>;

/// Insertion-ordered map. Nodes form a doubly linked list (forward strong,
/// backward weak); buckets are keyed by `hash_value` and resolved with
/// `same_key`.
pub struct MapValue {
    buckets: RefCell<FxHashMap<u64, Vec<Rc<MapNode>>>>,
    head: RefCell<Option<Rc<MapNode>>>,
    tail: RefCell<Option<Rc<MapNode>>>,
    len: Cell<usize>,
}

/// A live entry. Also serves as the map's iteration state and as an
/// assignable reference to the entry's value.
pub struct MapNode {
    key: Value,
    value: RefCell<Value>,
    next: RefCell<Option<Rc<MapNode>>>,
    prev: RefCell<Weak<MapNode>>,
    removed: Cell<bool>,
}

/// Reference to a key that may not exist yet; assigning inserts it.
pub struct MapIndex {
    pub map: MapRef,
    pub key: Value,
}

impl MapValue {
    pub fn new() -> MapRef {
        Rc::new(Self {
            buckets: RefCell::new(FxHashMap::default()),
            head: RefCell::new(None),
            tail: RefCell::new(None),
            len: Cell::new(0),
        })
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> MapRef {
        let map = Self::new();
        for (key, value) in pairs {
            map.insert(key, value);
        }
        map
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len.get()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len.get() == 0
    }

    pub fn node(&self, key: &Value) -> Option<Rc<MapNode>> {
        let buckets = self.buckets.borrow();
        buckets
            .get(&key.hash_value())?
            .iter()
            .find(|node| node.key.same_key(key))
            .cloned()
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.node(key).map(|node| node.value())
    }

    /// Insert or overwrite. Overwrites keep the entry's original position.
    pub fn insert(&self, key: Value, value: Value) -> Option<Value> {
        if let Some(node) = self.node(&key) {
            return Some(node.value.replace(value));
        }
        let node = Rc::new(MapNode {
            key,
            value: RefCell::new(value),
            next: RefCell::new(None),
            prev: RefCell::new(Weak::new()),
            removed: Cell::new(false),
        });
        let previous_tail = self.tail.replace(Some(node.clone()));
        match previous_tail {
            Some(tail) => {
                *node.prev.borrow_mut() = Rc::downgrade(&tail);
                *tail.next.borrow_mut() = Some(node.clone());
            }
            None => *self.head.borrow_mut() = Some(node.clone()),
        }
        self.buckets
            .borrow_mut()
            .entry(node.key.hash_value())
            .or_default()
            .push(node);
        self.len.set(self.len.get() + 1);
        None
    }

    pub fn remove(&self, key: &Value) -> Option<Value> {
        let node = {
            let mut buckets = self.buckets.borrow_mut();
            let hash = key.hash_value();
            let bucket = buckets.get_mut(&hash)?;
            let position = bucket.iter().position(|node| node.key.same_key(key))?;
            let node = bucket.remove(position);
            if bucket.is_empty() {
                buckets.remove(&hash);
            }
            node
        };
        node.removed.set(true);
        let prev = node.prev.borrow().upgrade();
        let next = node.next.borrow().clone();
        match &prev {
            Some(prev) => *prev.next.borrow_mut() = next.clone(),
            None => *self.head.borrow_mut() = next.clone(),
        }
        match &next {
            Some(next) => *next.prev.borrow_mut() = prev.as_ref().map(Rc::downgrade).unwrap_or_default(),
            None => *self.tail.borrow_mut() = prev,
        }
        self.len.set(self.len.get() - 1);
        Some(node.value())
    }

    pub fn first(&self) -> Option<Rc<MapNode>> {
        self.head.borrow().clone()
    }

    /// Entries in insertion order.
    pub fn nodes(&self) -> Vec<Rc<MapNode>> {
        let mut nodes = Vec::with_capacity(self.len());
        let mut cursor = self.first();
        while let Some(node) = cursor {
            cursor = node.next.borrow().clone();
            nodes.push(node);
        }
        nodes
    }

    /// Reference for `map[key]`: the live node, or a pending index.
    pub fn index(self: &Rc<Self>, key: Value) -> Value {
        match self.node(&key) {
            Some(node) => Value::MapNode(node),
            None => Value::MapIndex(Rc::new(MapIndex {
                map: self.clone(),
                key,
            })),
        }
    }
}

impl Drop for MapValue {
    /// Unlink entries one at a time so a long chain never drops recursively.
    fn drop(&mut self) {
        self.buckets.get_mut().clear();
        self.tail.get_mut().take();
        let mut cursor = self.head.get_mut().take();
        while let Some(node) = cursor {
            // A node still held elsewhere keeps its successors reachable.
            if Rc::strong_count(&node) > 1 {
                break;
            }
            cursor = node.next.borrow_mut().take();
        }
    }
}

impl MapNode {
    #[inline]
    pub fn key(&self) -> &Value {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> Value {
        self.value.borrow().clone()
    }

    pub fn set_value(&self, value: Value) {
        *self.value.borrow_mut() = value;
    }

    /// Next live entry; entries removed during iteration are skipped.
    pub fn next(&self) -> Option<Rc<MapNode>> {
        let mut cursor = self.next.borrow().clone();
        while let Some(node) = cursor {
            if !node.removed.get() {
                return Some(node);
            }
            cursor = node.next.borrow().clone();
        }
        None
    }
}

impl MapIndex {
    pub fn current(&self) -> Value {
        self.map.get(&self.key).unwrap_or(Value::Nil)
    }
}
