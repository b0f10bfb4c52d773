//! Order pool: orders waiting for release and orders open for bidding.

use crate::{Order, OrderId, OrderStatus};
use chrono::{DateTime, Utc};
use tracing::debug;

#[derive(Clone, Debug, Default)]
pub struct OrderPool {
    /// Not yet released, sorted by release time (latest last).
    pending: Vec<Order>,
    available: Vec<Order>,
}

impl OrderPool {
    pub fn new(mut orders: Vec<Order>) -> Self {
        orders.sort_by_key(|o| o.release_time);
        Self {
            pending: orders,
            available: Vec::new(),
        }
    }

    /// Move every order whose release time has come into the available list.
    /// Returns how many were released.
    pub fn release_due(&mut self, now: DateTime<Utc>) -> usize {
        let due = self.pending.partition_point(|o| o.release_time <= now);
        for mut o in self.pending.drain(..due) {
            o.status = OrderStatus::Available;
            debug!(order = %o.id, "order released");
            self.available.push(o);
        }
        due
    }

    pub fn available(&self) -> &[Order] {
        &self.available
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn contains(&self, id: &OrderId) -> bool {
        self.available.iter().any(|o| &o.id == id)
    }

    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.available.iter().find(|o| &o.id == id)
    }

    /// Claim an available order. Its status becomes `Accepted`.
    pub fn take(&mut self, id: &OrderId) -> Option<Order> {
        let pos = self.available.iter().position(|o| &o.id == id)?;
        let mut o = self.available.remove(pos);
        o.status = OrderStatus::Accepted;
        Some(o)
    }

    /// Return a claimed order whose acceptance was rejected.
    pub fn put_back(&mut self, mut order: Order) {
        order.status = OrderStatus::Available;
        self.available.push(order);
    }

    /// First available order whose pickup is at `at`.
    pub fn pickup_at(&self, at: crate::Coord) -> Option<&Order> {
        self.available.iter().find(|o| o.pickup == at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{order, t0};
    use chrono::Duration;

    #[test]
    fn releases_progressively() {
        let mut late = order("late", 1, 1, 900);
        late.release_time = t0() + Duration::seconds(120);
        let mut pool = OrderPool::new(vec![late, order("now", 1, 1, 600)]);
        assert_eq!(pool.release_due(t0()), 1);
        assert_eq!(pool.available()[0].id.0, "now");
        assert_eq!(pool.pending_len(), 1);
        assert_eq!(pool.release_due(t0() + Duration::seconds(119)), 0);
        assert_eq!(pool.release_due(t0() + Duration::seconds(120)), 1);
        assert_eq!(pool.available().len(), 2);
    }

    #[test]
    fn take_and_put_back_track_status() {
        let mut pool = OrderPool::new(vec![order("A", 1, 1, 600)]);
        pool.release_due(t0());
        let id = OrderId("A".into());
        let o = pool.take(&id).unwrap();
        assert_eq!(o.status, OrderStatus::Accepted);
        assert!(!pool.contains(&id));
        assert!(pool.take(&id).is_none());
        pool.put_back(o);
        assert_eq!(pool.get(&id).unwrap().status, OrderStatus::Available);
        assert!(pool.pickup_at(crate::Coord::new(1, 1)).is_some());
    }
}
