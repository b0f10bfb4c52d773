//! Courier inventory: a weight-capped, doubly linked list of accepted
//! orders with a viewing cursor.
//!
//! Nodes live in an arena (`Vec<Option<Node>>`) and link to each other by
//! index, which keeps tail insertion and cursor removal O(1) without
//! shared pointers. Freed slots are recycled.

use crate::{Order, OrderId};
use thiserror::Error;

/// Errors produced by inventory mutations.
#[derive(Debug, Error, PartialEq)]
pub enum InventoryError {
    /// Adding the order would exceed the weight cap. Nothing was changed.
    #[error("order {id} (weight {weight}) exceeds remaining capacity {remaining}")]
    CapacityExceeded {
        id: OrderId,
        weight: u32,
        remaining: u32,
    },
}

/// Direction for cursor movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorMove {
    Next,
    Prev,
}

#[derive(Clone, Debug)]
struct Node {
    order: Order,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct Inventory {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    cursor: Option<usize>,
    max_weight: u32,
    current_weight: u32,
    count: usize,
}

impl Inventory {
    pub fn new(max_weight: u32) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            cursor: None,
            max_weight,
            current_weight: 0,
            count: 0,
        }
    }

    pub fn max_weight(&self) -> u32 {
        self.max_weight
    }

    pub fn current_weight(&self) -> u32 {
        self.current_weight
    }

    pub fn remaining_capacity(&self) -> u32 {
        self.max_weight.saturating_sub(self.current_weight)
    }

    pub fn fits(&self, weight: u32) -> bool {
        self.current_weight.saturating_add(weight) <= self.max_weight
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn node(&self, idx: usize) -> &Node {
        // Linked indices always refer to live slots.
        self.nodes[idx].as_ref().expect("linked index refers to a freed slot")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node {
        self.nodes[idx].as_mut().expect("linked index refers to a freed slot")
    }

    /// Append to the tail. The cursor moves only if the list was empty.
    pub fn add(&mut self, order: Order) -> Result<(), InventoryError> {
        if !self.fits(order.weight) {
            return Err(InventoryError::CapacityExceeded {
                id: order.id,
                weight: order.weight,
                remaining: self.remaining_capacity(),
            });
        }
        let weight = order.weight;
        let node = Node {
            order,
            prev: self.tail,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(i) => {
                self.nodes[i] = Some(node);
                i
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        match self.tail {
            Some(t) => self.node_mut(t).next = Some(idx),
            None => {
                self.head = Some(idx);
                self.cursor = Some(idx);
            }
        }
        self.tail = Some(idx);
        self.current_weight += weight;
        self.count += 1;
        Ok(())
    }

    /// Order under the cursor.
    pub fn current(&self) -> Option<&Order> {
        self.cursor.map(|i| &self.node(i).order)
    }

    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.find(id).map(|i| &self.node(i).order)
    }

    pub fn contains(&self, id: &OrderId) -> bool {
        self.find(id).is_some()
    }

    fn find(&self, id: &OrderId) -> Option<usize> {
        let mut cur = self.head;
        while let Some(i) = cur {
            let n = self.node(i);
            if &n.order.id == id {
                return Some(i);
            }
            cur = n.next;
        }
        None
    }

    /// Orders from head to tail.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inv: self,
            cur: self.head,
        }
    }

    /// Owned copy of the sequence, head first.
    pub fn to_vec(&self) -> Vec<Order> {
        self.iter().cloned().collect()
    }

    /// Move the cursor one step. Stays put at either end.
    pub fn move_cursor(&mut self, dir: CursorMove) -> Option<&Order> {
        if let Some(c) = self.cursor {
            let n = self.node(c);
            let target = match dir {
                CursorMove::Next => n.next,
                CursorMove::Prev => n.prev,
            };
            if target.is_some() {
                self.cursor = target;
            }
        }
        self.current()
    }

    fn unlink(&mut self, idx: usize) -> Order {
        let node = self.nodes[idx]
            .take()
            .expect("linked index refers to a freed slot");
        if self.cursor == Some(idx) {
            self.cursor = node.next.or(node.prev);
        }
        match node.prev {
            Some(p) => self.node_mut(p).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(n) => self.node_mut(n).prev = node.prev,
            None => self.tail = node.prev,
        }
        self.free.push(idx);
        self.current_weight -= node.order.weight;
        self.count -= 1;
        node.order
    }

    /// Remove the order under the cursor. The cursor moves to its successor,
    /// else its predecessor, else clears.
    pub fn complete_current(&mut self) -> Option<Order> {
        let idx = self.cursor?;
        Some(self.unlink(idx))
    }

    /// Remove by id. Cursor rules match [`Inventory::complete_current`].
    pub fn remove_by_id(&mut self, id: &OrderId) -> Option<Order> {
        let idx = self.find(id)?;
        Some(self.unlink(idx))
    }

    /// Stable sort of all members by `key`. The cursor keeps pointing at the
    /// same order, wherever it lands.
    pub fn sort_by_key<K, F>(&mut self, mut key: F, descending: bool)
    where
        K: Ord,
        F: FnMut(&Order) -> K,
    {
        if self.count < 2 {
            return;
        }
        let mut ranked: Vec<(K, usize)> = Vec::with_capacity(self.count);
        let mut cur = self.head;
        while let Some(i) = cur {
            let n = self.node(i);
            ranked.push((key(&n.order), i));
            cur = n.next;
        }
        ranked.sort_by(|a, b| {
            let ord = a.0.cmp(&b.0);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
        // Indices are untouched by relinking, so the cursor stays on its order.
        let links: Vec<usize> = ranked.into_iter().map(|(_, i)| i).collect();
        for (pos, &idx) in links.iter().enumerate() {
            let prev = pos.checked_sub(1).map(|p| links[p]);
            let next = links.get(pos + 1).copied();
            let n = self.node_mut(idx);
            n.prev = prev;
            n.next = next;
        }
        self.head = links.first().copied();
        self.tail = links.last().copied();
    }

    /// Sort by priority, highest first.
    pub fn sort_by_priority(&mut self) {
        self.sort_by_key(|o| o.priority, true);
    }

    /// Sort by deadline, soonest first.
    pub fn sort_by_deadline(&mut self) {
        self.sort_by_key(|o| o.deadline, false);
    }
}

impl PartialEq for Inventory {
    fn eq(&self, other: &Self) -> bool {
        self.max_weight == other.max_weight
            && self.iter().map(|o| &o.id).eq(other.iter().map(|o| &o.id))
            && self.current().map(|o| &o.id) == other.current().map(|o| &o.id)
    }
}

/// Head-to-tail iterator.
pub struct Iter<'a> {
    inv: &'a Inventory,
    cur: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Order;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.cur?;
        let n = self.inv.node(i);
        self.cur = n.next;
        Some(&n.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::order;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn ids(inv: &Inventory) -> Vec<String> {
        inv.iter().map(|o| o.id.0.clone()).collect()
    }

    fn cursor_id(inv: &Inventory) -> Option<String> {
        inv.current().map(|o| o.id.0.clone())
    }

    #[test]
    fn add_sets_cursor_only_when_empty() {
        let mut inv = Inventory::new(10);
        inv.add(order("A", 2, 1, 60)).unwrap();
        inv.add(order("B", 3, 1, 60)).unwrap();
        assert_eq!(ids(&inv), ["A", "B"]);
        assert_eq!(cursor_id(&inv).as_deref(), Some("A"));
        assert_eq!(inv.current_weight(), 5);
        assert_eq!(inv.len(), 2);
    }

    #[test]
    fn capacity_exceeded_leaves_inventory_unchanged() {
        let mut inv = Inventory::new(4);
        let mut heavy = order("H", 5, 1, 60);
        heavy.payout = Decimal::new(100, 0);
        let err = inv.add(heavy).unwrap_err();
        assert_eq!(
            err,
            InventoryError::CapacityExceeded {
                id: OrderId("H".into()),
                weight: 5,
                remaining: 4
            }
        );
        assert!(inv.is_empty());
        assert_eq!(inv.current_weight(), 0);
        assert!(inv.current().is_none());
    }

    #[test]
    fn cursor_moves_without_wrapping() {
        let mut inv = Inventory::new(10);
        for id in ["A", "B", "C"] {
            inv.add(order(id, 1, 1, 60)).unwrap();
        }
        assert_eq!(inv.move_cursor(CursorMove::Prev).unwrap().id.0, "A");
        inv.move_cursor(CursorMove::Next);
        inv.move_cursor(CursorMove::Next);
        assert_eq!(inv.move_cursor(CursorMove::Next).unwrap().id.0, "C");
    }

    #[test]
    fn removing_cursor_prefers_successor_then_predecessor() {
        let mut inv = Inventory::new(10);
        for id in ["A", "B", "C"] {
            inv.add(order(id, 1, 1, 60)).unwrap();
        }
        inv.move_cursor(CursorMove::Next); // B
        assert_eq!(inv.complete_current().unwrap().id.0, "B");
        assert_eq!(cursor_id(&inv).as_deref(), Some("C"));
        assert_eq!(inv.complete_current().unwrap().id.0, "C");
        assert_eq!(cursor_id(&inv).as_deref(), Some("A"));
        assert_eq!(inv.complete_current().unwrap().id.0, "A");
        assert!(inv.current().is_none());
        assert!(inv.complete_current().is_none());
    }

    #[test]
    fn remove_by_id_relinks_and_keeps_foreign_cursor() {
        let mut inv = Inventory::new(10);
        for id in ["A", "B", "C"] {
            inv.add(order(id, 2, 1, 60)).unwrap();
        }
        assert!(inv.remove_by_id(&OrderId("Z".into())).is_none());
        assert_eq!(inv.remove_by_id(&OrderId("B".into())).unwrap().id.0, "B");
        assert_eq!(ids(&inv), ["A", "C"]);
        assert_eq!(cursor_id(&inv).as_deref(), Some("A"));
        assert_eq!(inv.current_weight(), 4);
        // freed slot is reused without disturbing order
        inv.add(order("D", 1, 1, 60)).unwrap();
        assert_eq!(ids(&inv), ["A", "C", "D"]);
    }

    #[test]
    fn sort_keeps_cursor_on_same_order() {
        let mut inv = Inventory::new(10);
        inv.add(order("low", 1, 1, 300)).unwrap();
        inv.add(order("high", 1, 5, 100)).unwrap();
        inv.add(order("mid", 1, 3, 200)).unwrap();
        inv.move_cursor(CursorMove::Next); // "high", position 1
        inv.sort_by_priority();
        assert_eq!(ids(&inv), ["high", "mid", "low"]);
        assert_eq!(cursor_id(&inv).as_deref(), Some("high"));
        inv.sort_by_deadline();
        assert_eq!(ids(&inv), ["high", "mid", "low"]);
        inv.move_cursor(CursorMove::Prev);
        assert_eq!(cursor_id(&inv).as_deref(), Some("high"));
        assert_eq!(inv.move_cursor(CursorMove::Next).unwrap().id.0, "mid");
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut inv = Inventory::new(10);
        for id in ["A", "B", "C", "D"] {
            inv.add(order(id, 1, if id == "C" { 9 } else { 1 }, 60)).unwrap();
        }
        inv.sort_by_priority();
        assert_eq!(ids(&inv), ["C", "A", "B", "D"]);
    }

    proptest! {
        #[test]
        fn weight_total_matches_members(
            weights in proptest::collection::vec(1u32..6, 0..20),
            removals in proptest::collection::vec(0usize..20, 0..10),
        ) {
            let mut inv = Inventory::new(25);
            for (i, w) in weights.iter().enumerate() {
                let _ = inv.add(order(&format!("o{i}"), *w, 1, 60));
                prop_assert!(inv.current_weight() <= inv.max_weight());
            }
            for r in removals {
                inv.remove_by_id(&OrderId(format!("o{r}")));
                let sum: u32 = inv.iter().map(|o| o.weight).sum();
                prop_assert_eq!(inv.current_weight(), sum);
                prop_assert_eq!(inv.len(), inv.iter().count());
                prop_assert_eq!(inv.current().is_none(), inv.is_empty());
            }
        }

        #[test]
        fn sort_orders_descending_and_tracks_cursor(
            prios in proptest::collection::vec(0u32..10, 1..12),
            steps in 0usize..12,
        ) {
            let mut inv = Inventory::new(100);
            for (i, p) in prios.iter().enumerate() {
                inv.add(order(&format!("o{i}"), 1, *p, 60)).unwrap();
            }
            for _ in 0..steps {
                inv.move_cursor(CursorMove::Next);
            }
            let before = cursor_id(&inv);
            inv.sort_by_priority();
            let sorted: Vec<u32> = inv.iter().map(|o| o.priority).collect();
            prop_assert!(sorted.windows(2).all(|w| w[0] >= w[1]));
            prop_assert_eq!(cursor_id(&inv), before);
        }
    }
}
