#![deny(warnings)]

//! Courier economy: movement speed, stamina, reputation and payouts.
//!
//! The same [`Actor`] model backs both the human-controlled courier and the
//! rival; they differ only in who decides the next move. This module
//! provides:
//! - Speed under weather, load, reputation, stamina and surface
//! - Stamina drain per step and idle recovery with exhaustion gating
//! - Delivery settlement (reputation tiers by slack/lateness, payout bonus)
//! - Expiry and cancellation penalties, terminal checks and final score

use chrono::{DateTime, Utc};
use courier_core::{
    Coord, Inventory, InventoryError, Order, OrderId, OrderStatus, WeatherCondition,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

/// Reputation every courier starts with.
pub const STARTING_REPUTATION: i32 = 70;
/// Reputation strictly below this ends the session in defeat.
pub const DEFEAT_REPUTATION: i32 = 20;
/// Reputation at or above this earns the speed and payout bonuses.
pub const ELITE_REPUTATION: i32 = 90;
pub const MAX_STAMINA: f32 = 100.0;
/// Stamina needed to shake off exhaustion.
pub const RECOVERY_THRESHOLD: f32 = 30.0;
pub const BASE_SPEED: f32 = 3.0;
pub const EXPIRY_PENALTY: i32 = 6;
pub const CANCEL_PENALTY: i32 = 4;
/// Bonus for winning before 80% of the session has elapsed.
pub const EARLY_VICTORY_BONUS: i64 = 500;

/// Observable result of a delivery.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeliveryOutcome {
    pub order: Order,
    pub payout: Decimal,
    pub rep_change: i32,
}

/// Extra stamina drained per step by a weather condition.
pub fn weather_surcharge(c: &WeatherCondition) -> f32 {
    match c.as_str() {
        "rain" | "wind" => 0.1,
        "storm" => 0.3,
        "heat" => 0.2,
        _ => 0.0,
    }
}

/// Reputation change for delivering `order` at `now`.
///
/// On time: +5 when the remaining slack exceeds 20% of the order's window,
/// else +3. Late: -2 up to 30 s, -5 up to 120 s, -10 beyond.
pub fn delivery_rep_change(order: &Order, now: DateTime<Utc>) -> i32 {
    let remaining = order.secs_until_deadline(now);
    if remaining >= 0.0 {
        if remaining > 0.20 * order.window_secs() {
            5
        } else {
            3
        }
    } else {
        let late = -remaining;
        if late <= 30.0 {
            -2
        } else if late <= 120.0 {
            -5
        } else {
            -10
        }
    }
}

/// Shared courier state and rules.
#[derive(Clone, Debug)]
pub struct Actor {
    pub position: Coord,
    /// 0..=100.
    pub stamina: f32,
    pub reputation: i32,
    pub total_income: Decimal,
    /// Reputation points lost to late deliveries, expiries and cancellations.
    pub total_penalties: u32,
    pub exhausted: bool,
    pub inventory: Inventory,
    pub income_goal: Decimal,
    pub base_speed: f32,
}

impl Actor {
    pub fn new(position: Coord, income_goal: Decimal, max_weight: u32) -> Self {
        Self {
            position,
            stamina: MAX_STAMINA,
            reputation: STARTING_REPUTATION,
            total_income: Decimal::ZERO,
            total_penalties: 0,
            exhausted: false,
            inventory: Inventory::new(max_weight),
            income_goal,
            base_speed: BASE_SPEED,
        }
    }

    pub fn carried_weight(&self) -> u32 {
        self.inventory.current_weight()
    }

    /// 1.0 above 30 stamina, 0.8 down to just above 0, 0.0 when drained.
    pub fn stamina_factor(&self) -> f32 {
        if self.stamina > RECOVERY_THRESHOLD {
            1.0
        } else if self.stamina > 0.0 {
            0.8
        } else {
            0.0
        }
    }

    /// Movement speed in tiles per second.
    pub fn speed(&self, weather_multiplier: f32, surface_weight: f32) -> f32 {
        let weight_penalty = (1.0 - 0.03 * self.carried_weight() as f32).max(0.8);
        let reputation_bonus = if self.reputation >= ELITE_REPUTATION {
            1.03
        } else {
            1.0
        };
        self.base_speed
            * weather_multiplier
            * weight_penalty
            * reputation_bonus
            * self.stamina_factor()
            * surface_weight
    }

    pub fn can_move(&self) -> bool {
        !self.exhausted && self.stamina > 0.0
    }

    /// Drain for one step: 0.5 base, 0.2 per carried unit above 3, plus the
    /// weather surcharge. Hitting zero floors stamina and exhausts the actor.
    pub fn consume_stamina(&mut self, weather: &WeatherCondition) {
        let weight = self.carried_weight() as f32;
        let mut drain = 0.5 + weather_surcharge(weather);
        if weight > 3.0 {
            drain += 0.2 * (weight - 3.0);
        }
        self.stamina -= drain;
        if self.stamina <= 0.0 {
            self.stamina = 0.0;
            if !self.exhausted {
                warn!(at = %self.position, "courier exhausted");
            }
            self.exhausted = true;
        }
    }

    /// Add stamina up to the cap. Exhaustion clears at 30.
    pub fn recover_stamina(&mut self, amount: f32) {
        self.stamina = (self.stamina + amount.max(0.0)).min(MAX_STAMINA);
        if self.exhausted && self.stamina >= RECOVERY_THRESHOLD {
            self.exhausted = false;
            info!(at = %self.position, "courier recovered");
        }
    }

    /// Apply a reputation change; losses count toward penalties.
    pub fn adjust_reputation(&mut self, delta: i32) {
        self.reputation += delta;
        if delta < 0 {
            self.total_penalties += delta.unsigned_abs();
        }
    }

    pub fn accept_order(&mut self, mut order: Order) -> Result<(), InventoryError> {
        order.status = OrderStatus::Accepted;
        self.inventory.add(order)
    }

    /// Deliver the order under the inventory cursor.
    pub fn complete_delivery(&mut self, now: DateTime<Utc>) -> Option<DeliveryOutcome> {
        let mut order = self.inventory.complete_current()?;
        let rep_change = delivery_rep_change(&order, now);
        self.adjust_reputation(rep_change);
        let payout = if self.reputation >= ELITE_REPUTATION {
            order.payout * Decimal::new(105, 2)
        } else {
            order.payout
        };
        self.total_income += payout;
        order.status = OrderStatus::Delivered;
        info!(order = %order.id, %payout, rep_change, reputation = self.reputation, "delivered");
        Some(DeliveryOutcome {
            order,
            payout,
            rep_change,
        })
    }

    /// Drop a carried order whose deadline passed.
    pub fn expire_order(&mut self, id: &OrderId) -> Option<Order> {
        let mut order = self.inventory.remove_by_id(id)?;
        order.status = OrderStatus::Expired;
        self.adjust_reputation(-EXPIRY_PENALTY);
        info!(order = %order.id, reputation = self.reputation, "order expired");
        Some(order)
    }

    /// Expire every carried order that is overdue at `now`.
    pub fn expire_overdue(&mut self, now: DateTime<Utc>) -> Vec<Order> {
        let overdue: Vec<OrderId> = self
            .inventory
            .iter()
            .filter(|o| o.is_overdue(now))
            .map(|o| o.id.clone())
            .collect();
        overdue
            .iter()
            .filter_map(|id| self.expire_order(id))
            .collect()
    }

    /// Abandon the order under the cursor without payout.
    pub fn cancel_order(&mut self) -> Option<Order> {
        let mut order = self.inventory.complete_current()?;
        order.status = OrderStatus::Cancelled;
        self.adjust_reputation(-CANCEL_PENALTY);
        info!(order = %order.id, reputation = self.reputation, "order cancelled");
        Some(order)
    }

    pub fn is_defeated(&self) -> bool {
        self.reputation < DEFEAT_REPUTATION
    }

    pub fn has_won(&self) -> bool {
        self.total_income >= self.income_goal
    }

    /// Overwrite economy state and rebuild the inventory by replaying `add`.
    /// Orders that no longer fit are returned.
    pub fn restore(
        &mut self,
        position: Coord,
        stamina: f32,
        reputation: i32,
        total_income: Decimal,
        orders: Vec<Order>,
    ) -> Vec<Order> {
        self.position = position;
        self.stamina = stamina.clamp(0.0, MAX_STAMINA);
        self.exhausted = self.stamina <= 0.0;
        self.reputation = reputation;
        self.total_income = total_income;
        self.inventory = Inventory::new(self.inventory.max_weight());
        let mut rejected = Vec::new();
        for o in orders {
            if let Err(e) = self.inventory.add(o.clone()) {
                warn!(error = %e, "order dropped while restoring inventory");
                rejected.push(o);
            }
        }
        rejected
    }
}

/// Final session score: income plus an early-victory bonus minus penalties,
/// floored at zero.
pub fn final_score(
    total_income: Decimal,
    total_penalties: u32,
    victory: bool,
    elapsed_secs: f32,
    duration_secs: f32,
) -> i64 {
    let bonus = if victory && elapsed_secs < duration_secs * 0.8 {
        EARLY_VICTORY_BONUS
    } else {
        0
    };
    let income = total_income.trunc().to_i64().unwrap_or(i64::MAX);
    income
        .saturating_add(bonus)
        .saturating_sub(total_penalties as i64)
        .max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use courier_core::{CursorMove, OrderId};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap()
    }

    /// 600 s window starting at `t0`.
    fn order(id: &str, weight: u32) -> Order {
        Order {
            id: OrderId(id.to_string()),
            pickup: Coord::new(0, 0),
            dropoff: Coord::new(2, 2),
            payout: Decimal::new(100, 0),
            weight,
            priority: 0,
            deadline: t0() + Duration::seconds(600),
            release_time: t0(),
            status: OrderStatus::Available,
        }
    }

    fn actor() -> Actor {
        Actor::new(Coord::new(0, 0), Decimal::new(1000, 0), 10)
    }

    #[test]
    fn speed_combines_all_factors() {
        let mut a = actor();
        assert!((a.speed(1.0, 1.0) - 3.0).abs() < 1e-6);
        a.accept_order(order("A", 10)).unwrap();
        // weight penalty floors at 0.8
        assert!((a.speed(1.0, 1.0) - 2.4).abs() < 1e-6);
        a.reputation = 90;
        a.stamina = 30.0;
        let expected = 3.0 * 0.85 * 0.8 * 1.03 * 0.8 * 0.95;
        assert!((a.speed(0.85, 0.95) - expected).abs() < 1e-5);
        a.stamina = 0.0;
        assert_eq!(a.speed(1.0, 1.0), 0.0);
    }

    #[test]
    fn stamina_drain_counts_weight_and_weather() {
        let mut a = actor();
        a.accept_order(order("A", 5)).unwrap();
        a.consume_stamina(&"storm".into());
        // 0.5 + 0.2 * 2 + 0.3
        assert!((a.stamina - 98.8).abs() < 1e-4);
        a.consume_stamina(&"clear".into());
        assert!((a.stamina - 97.9).abs() < 1e-4);
    }

    #[test]
    fn exhaustion_clears_only_at_thirty() {
        let mut a = actor();
        a.stamina = 0.3;
        a.consume_stamina(&"clear".into());
        assert_eq!(a.stamina, 0.0);
        assert!(a.exhausted);
        assert!(!a.can_move());
        a.recover_stamina(29.0);
        assert!(a.exhausted);
        a.recover_stamina(1.0);
        assert!(!a.exhausted);
        assert!(a.can_move());
        a.recover_stamina(500.0);
        assert_eq!(a.stamina, MAX_STAMINA);
    }

    #[test]
    fn early_delivery_earns_five() {
        let mut a = actor();
        a.accept_order(order("A", 1)).unwrap();
        // 300 s left of a 600 s window: slack 50%
        let out = a.complete_delivery(t0() + Duration::seconds(300)).unwrap();
        assert_eq!(out.rep_change, 5);
        assert_eq!(out.payout, Decimal::new(100, 0));
        assert_eq!(out.order.status, OrderStatus::Delivered);
        assert_eq!(a.reputation, 75);
        assert_eq!(a.total_income, Decimal::new(100, 0));
    }

    #[test]
    fn tight_delivery_earns_three() {
        let mut a = actor();
        a.accept_order(order("A", 1)).unwrap();
        let out = a.complete_delivery(t0() + Duration::seconds(550)).unwrap();
        assert_eq!(out.rep_change, 3);
    }

    #[test]
    fn late_tiers() {
        let o = order("A", 1);
        let late = |s: i64| delivery_rep_change(&o, t0() + Duration::seconds(600 + s));
        assert_eq!(late(10), -2);
        assert_eq!(late(30), -2);
        assert_eq!(late(31), -5);
        assert_eq!(late(120), -5);
        assert_eq!(late(121), -10);
    }

    #[test]
    fn ten_seconds_late_costs_two() {
        let mut a = actor();
        a.accept_order(order("A", 1)).unwrap();
        let out = a.complete_delivery(t0() + Duration::seconds(610)).unwrap();
        assert_eq!(out.rep_change, -2);
        assert_eq!(a.reputation, 68);
        assert_eq!(a.total_penalties, 2);
    }

    #[test]
    fn elite_reputation_adds_five_percent() {
        let mut a = actor();
        a.reputation = 88;
        a.accept_order(order("A", 1)).unwrap();
        let out = a.complete_delivery(t0() + Duration::seconds(10)).unwrap();
        // 88 + 5 = 93 before payout
        assert_eq!(out.payout, Decimal::new(10500, 2));
    }

    #[test]
    fn delivery_without_order_is_none() {
        let mut a = actor();
        assert!(a.complete_delivery(t0()).is_none());
        assert!(a.cancel_order().is_none());
    }

    #[test]
    fn expire_and_cancel_penalties() {
        let mut a = actor();
        a.accept_order(order("A", 1)).unwrap();
        a.accept_order(order("B", 1)).unwrap();
        let mut c = order("C", 1);
        c.deadline = t0() + Duration::seconds(5000);
        a.accept_order(c).unwrap();
        a.inventory.move_cursor(CursorMove::Next);
        let expired = a.expire_overdue(t0() + Duration::seconds(601));
        assert_eq!(expired.len(), 2);
        assert!(expired.iter().all(|o| o.status == OrderStatus::Expired));
        assert_eq!(a.reputation, 70 - 12);
        assert_eq!(a.inventory.current().unwrap().id.0, "C");
        let cancelled = a.cancel_order().unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(a.reputation, 70 - 16);
        assert_eq!(a.total_penalties, 16);
        assert_eq!(a.total_income, Decimal::ZERO);
    }

    #[test]
    fn defeat_threshold() {
        let mut a = actor();
        a.reputation = 69;
        a.accept_order(order("A", 1)).unwrap();
        a.complete_delivery(t0() + Duration::seconds(600 + 200)).unwrap();
        assert_eq!(a.reputation, 59);
        assert!(!a.is_defeated());
        a.adjust_reputation(-40);
        assert_eq!(a.reputation, 19);
        assert!(a.is_defeated());
    }

    #[test]
    fn victory_when_goal_reached() {
        let mut a = Actor::new(Coord::new(0, 0), Decimal::new(100, 0), 10);
        assert!(!a.has_won());
        a.accept_order(order("A", 1)).unwrap();
        a.complete_delivery(t0()).unwrap();
        assert!(a.has_won());
    }

    #[test]
    fn restore_replays_inventory() {
        let mut a = Actor::new(Coord::new(0, 0), Decimal::ZERO, 4);
        let rejected = a.restore(
            Coord::new(3, 4),
            55.0,
            81,
            Decimal::new(250, 0),
            vec![order("A", 3), order("B", 3), order("C", 1)],
        );
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].id.0, "B");
        assert_eq!(a.position, Coord::new(3, 4));
        assert_eq!(a.inventory.len(), 2);
        assert_eq!(a.inventory.current().unwrap().id.0, "A");
    }

    #[test]
    fn score_rules() {
        assert_eq!(final_score(Decimal::new(1200, 0), 10, true, 600.0, 900.0), 1690);
        assert_eq!(final_score(Decimal::new(1200, 0), 10, true, 800.0, 900.0), 1190);
        assert_eq!(final_score(Decimal::new(5, 0), 10, false, 100.0, 900.0), 0);
    }

    proptest! {
        #[test]
        fn stamina_stays_in_range(
            steps in proptest::collection::vec((any::<bool>(), 0.0f32..10.0), 0..300),
        ) {
            let mut a = actor();
            for (moved, rest) in steps {
                if moved && a.can_move() {
                    a.consume_stamina(&"storm".into());
                } else {
                    a.recover_stamina(rest);
                }
                prop_assert!((0.0..=MAX_STAMINA).contains(&a.stamina));
                prop_assert!(a.speed(0.75, 1.0) >= 0.0);
                if a.exhausted {
                    prop_assert!(!a.can_move());
                }
            }
        }
    }
}
