//! Frame systems, run in this order: clock, weather, player, expiry, rival,
//! history, outcome.

use crate::resources::*;
use bevy_ecs::prelude::*;
use chrono::{DateTime, Utc};
use courier_ai::{JobIntent, Strategy, StrategyContext};
use courier_core::{City, CursorMove, Inventory, OrderId, WeatherStep};
use courier_econ::Actor;
use persistence::Snapshot;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

pub fn game_running(outcome: Res<Outcome>) -> bool {
    outcome.0 == GameState::Running
}

pub fn advance_clock(mut clock: ResMut<SimClock>, mut board: ResMut<OrderBoard>) {
    clock.elapsed += clock.dt;
    let released = board.pool.release_due(clock.now());
    if released > 0 {
        debug!(released, elapsed = clock.elapsed, "orders released");
    }
}

pub fn update_weather(
    mut weather: ResMut<Weather>,
    clock: Res<SimClock>,
    mut events: ResMut<EventLog>,
) {
    let w = &mut *weather;
    match w.model.tick(clock.dt, &mut w.source) {
        WeatherStep::Steady => {}
        WeatherStep::TransitionStarted { to } => {
            events.0.push(SessionEvent::WeatherChanging { to })
        }
        WeatherStep::Committed { now } => events.0.push(SessionEvent::WeatherSettled { now }),
    }
}

/// Claim `id` from the board for `actor`, who must stand on its pickup.
fn try_accept(
    who: Courier,
    actor: &mut Actor,
    board: &mut OrderBoard,
    id: &OrderId,
    events: &mut EventLog,
) -> bool {
    let at_pickup = board.pool.get(id).map(|o| o.pickup == actor.position);
    if at_pickup != Some(true) {
        debug!(?who, order = %id, "accept ignored: not at an open pickup");
        return false;
    }
    let Some(order) = board.pool.take(id) else {
        return false;
    };
    match actor.accept_order(order.clone()) {
        Ok(()) => {
            info!(?who, order = %id, "order accepted");
            events.0.push(SessionEvent::Accepted {
                who,
                order: id.clone(),
            });
            true
        }
        Err(e) => {
            debug!(?who, error = %e, "accept rejected");
            board.pool.put_back(order);
            events.0.push(SessionEvent::Rejected {
                who,
                order: id.clone(),
                reason: e.to_string(),
            });
            false
        }
    }
}

/// Deliver the cursor order when standing on its dropoff.
fn try_deliver(
    who: Courier,
    actor: &mut Actor,
    board: &mut OrderBoard,
    clock: &SimClock,
    events: &mut EventLog,
) -> bool {
    let at_dropoff = actor
        .inventory
        .current()
        .is_some_and(|o| o.dropoff == actor.position);
    if !at_dropoff {
        debug!(?who, "deliver ignored: not at the dropoff");
        return false;
    }
    let Some(outcome) = actor.complete_delivery(clock.now()) else {
        return false;
    };
    board.settle(outcome.order.id.clone(), who, clock.elapsed);
    events.0.push(SessionEvent::Delivered {
        who,
        order: outcome.order.id,
        payout: outcome.payout,
        rep_change: outcome.rep_change,
    });
    true
}

/// Apply a strategy intent. A rejected accept makes the strategy drop its
/// target.
fn apply_intent(
    who: Courier,
    intent: JobIntent,
    actor: &mut Actor,
    strategy: &mut Strategy,
    board: &mut OrderBoard,
    clock: &SimClock,
    events: &mut EventLog,
) {
    match intent {
        JobIntent::Accept(id) => {
            if !try_accept(who, actor, board, &id, events) {
                strategy.forget_target();
            }
        }
        JobIntent::Deliver => {
            try_deliver(who, actor, board, clock, events);
        }
    }
}

/// Move one cell if the target is open and the courier can move. Returns
/// whether the step happened.
fn try_step(
    who: Courier,
    actor: &mut Actor,
    (dx, dy): (i32, i32),
    city: &City,
    weather: &Weather,
    events: &mut EventLog,
) -> bool {
    if dx.abs() + dy.abs() != 1 {
        return false;
    }
    let target = actor.position.offset(dx, dy);
    if city.is_blocked_at(target) {
        debug!(?who, %target, "move into blocked cell discarded");
        events.0.push(SessionEvent::Blocked {
            who,
            x: target.x,
            y: target.y,
        });
        return false;
    }
    if !actor.can_move() {
        debug!(?who, "exhausted, move discarded");
        return false;
    }
    actor.consume_stamina(weather.model.current());
    actor.position = target;
    true
}

/// Re-derive the open pool after couriers were restored: orders now carried
/// again leave the closed set, everything neither closed nor carried is open.
pub(crate) fn resync_board(
    board: &mut OrderBoard,
    carried: [&Inventory; 2],
    now: DateTime<Utc>,
) {
    let carried: BTreeSet<OrderId> = carried
        .iter()
        .flat_map(|inv| inv.iter().map(|o| o.id.clone()))
        .collect();
    let mut closed = std::mem::take(&mut board.closed);
    closed.retain(|id| !carried.contains(id));
    board.rebuild(closed, &carried, now);
}

/// Roll the player back `steps` snapshots. The clock keeps running.
pub(crate) fn apply_undo(
    steps: usize,
    history: &mut History,
    human: &mut HumanActor,
    rival: &Inventory,
    board: &mut OrderBoard,
    now: DateTime<Utc>,
    events: &mut EventLog,
) -> bool {
    let Some(snapshot) = history.0.undo(steps) else {
        debug!(steps, "nothing to undo");
        return false;
    };
    for lost in snapshot.apply(&mut human.actor) {
        warn!(order = %lost.id, "order did not fit after undo");
    }
    if let Some(s) = human.autopilot.as_mut() {
        s.forget_target();
    }
    for id in board.unsettle_after(snapshot.elapsed_secs, now) {
        debug!(order = %id, "settlement undone");
    }
    resync_board(board, [&human.actor.inventory, rival], now);
    info!(steps, at = %human.actor.position, "undo");
    events.0.push(SessionEvent::Undone { steps });
    true
}

#[allow(clippy::too_many_arguments)]
pub fn player_system(
    mut input: ResMut<FrameInput>,
    mut human: ResMut<HumanActor>,
    rival: Res<RivalActor>,
    mut board: ResMut<OrderBoard>,
    city: Res<CityMap>,
    weather: Res<Weather>,
    clock: Res<SimClock>,
    mut history: ResMut<History>,
    mut events: ResMut<EventLog>,
    settings: Res<Settings>,
) {
    let now = clock.now();
    let human = &mut *human;
    let board = &mut *board;
    let events = &mut *events;
    let mult = weather.model.current_multiplier();
    let mut actions = std::mem::take(&mut input.actions);
    let mut step = input.player_move.take();
    human.moved = false;
    human.move_cooldown = (human.move_cooldown - clock.dt).max(0.0);
    let ready = human.move_cooldown <= 0.0;

    if let Some(strategy) = human.autopilot.as_mut() {
        let ctx = StrategyContext {
            city: &city.0,
            available: board.pool.available(),
            weather_multiplier: mult,
            actor: &human.actor,
        };
        match strategy.decide_job_action(clock.dt, &ctx) {
            Some(JobIntent::Accept(id)) => actions.push(PlayerAction::Accept(Some(id))),
            Some(JobIntent::Deliver) => actions.push(PlayerAction::Deliver),
            None => {}
        }
        if step.is_none() && ready {
            step = Some(strategy.next_move(&ctx)).filter(|d| *d != (0, 0));
        }
    }

    for action in actions {
        match action {
            PlayerAction::Accept(id) => {
                let id = id.or_else(|| {
                    board
                        .pool
                        .pickup_at(human.actor.position)
                        .map(|o| o.id.clone())
                });
                let accepted = match &id {
                    Some(id) => try_accept(Courier::Player, &mut human.actor, board, id, events),
                    None => false,
                };
                if !accepted {
                    if let Some(s) = human.autopilot.as_mut() {
                        s.forget_target();
                    }
                }
            }
            PlayerAction::Deliver => {
                try_deliver(Courier::Player, &mut human.actor, board, &clock, events);
            }
            PlayerAction::Cancel => {
                if let Some(order) = human.actor.cancel_order() {
                    board.settle(order.id.clone(), Courier::Player, clock.elapsed);
                    events.0.push(SessionEvent::Cancelled {
                        who: Courier::Player,
                        order: order.id,
                    });
                }
            }
            PlayerAction::Next => {
                human.actor.inventory.move_cursor(CursorMove::Next);
            }
            PlayerAction::Prev => {
                human.actor.inventory.move_cursor(CursorMove::Prev);
            }
            PlayerAction::SortPriority => human.actor.inventory.sort_by_priority(),
            PlayerAction::SortDeadline => human.actor.inventory.sort_by_deadline(),
            PlayerAction::Undo(steps) => {
                apply_undo(
                    steps,
                    &mut history,
                    human,
                    &rival.actor.inventory,
                    board,
                    now,
                    events,
                );
            }
        }
    }

    if let Some(dir) = step {
        let speed = human.actor.speed(
            mult,
            city.0.surface_weight(human.actor.position.x, human.actor.position.y),
        );
        if !ready {
            debug!(cooldown = human.move_cooldown, "step ignored, still moving");
        } else if speed <= 0.0 {
            debug!("cannot move at zero speed");
        } else if try_step(Courier::Player, &mut human.actor, dir, &city.0, &weather, events) {
            human.moved = true;
            human.move_cooldown = 1.0 / speed;
        }
    }

    if !human.moved {
        human
            .actor
            .recover_stamina(settings.0.stamina_recovery_per_sec * clock.dt);
    }
}

pub fn expire_orders(
    mut human: ResMut<HumanActor>,
    mut rival: ResMut<RivalActor>,
    mut board: ResMut<OrderBoard>,
    clock: Res<SimClock>,
    mut events: ResMut<EventLog>,
) {
    let now = clock.now();
    for (who, actor) in [
        (Courier::Player, &mut human.actor),
        (Courier::Rival, &mut rival.actor),
    ] {
        for order in actor.expire_overdue(now) {
            board.closed.insert(order.id.clone());
            events.0.push(SessionEvent::Expired {
                who,
                order: order.id,
            });
        }
    }
}

pub fn rival_system(
    mut rival: ResMut<RivalActor>,
    mut board: ResMut<OrderBoard>,
    city: Res<CityMap>,
    weather: Res<Weather>,
    clock: Res<SimClock>,
    settings: Res<Settings>,
    mut events: ResMut<EventLog>,
) {
    let RivalActor {
        actor,
        strategy,
        step_timer,
    } = &mut *rival;
    let board = &mut *board;
    let events = &mut *events;
    let mult = weather.model.current_multiplier();

    let intent = strategy.decide_job_action(
        clock.dt,
        &StrategyContext {
            city: &city.0,
            available: board.pool.available(),
            weather_multiplier: mult,
            actor,
        },
    );
    if let Some(intent) = intent {
        apply_intent(Courier::Rival, intent, actor, strategy, board, &clock, events);
    }

    let mut moved = false;
    *step_timer -= clock.dt;
    if *step_timer <= 0.0 {
        *step_timer = settings.0.rival_step_interval;
        let dir = strategy.next_move(&StrategyContext {
            city: &city.0,
            available: board.pool.available(),
            weather_multiplier: mult,
            actor,
        });
        if dir != (0, 0) {
            moved = try_step(Courier::Rival, actor, dir, &city.0, &weather, events);
        }
    }
    if !moved {
        actor.recover_stamina(settings.0.stamina_recovery_per_sec * clock.dt);
    }
}

pub fn record_history(
    human: Res<HumanActor>,
    mut history: ResMut<History>,
    clock: Res<SimClock>,
    weather: Res<Weather>,
) {
    if human.moved {
        history.0.save_state(Snapshot::capture(
            &human.actor,
            clock.elapsed,
            weather.model.current(),
        ));
    }
}

pub fn check_outcome(
    human: Res<HumanActor>,
    clock: Res<SimClock>,
    settings: Res<Settings>,
    mut outcome: ResMut<Outcome>,
    mut events: ResMut<EventLog>,
) {
    let state = if human.actor.is_defeated() {
        GameState::Defeat
    } else if human.actor.has_won() {
        GameState::Victory
    } else if clock.elapsed >= settings.0.game_duration_secs {
        GameState::TimeUp
    } else {
        return;
    };
    info!(
        ?state,
        elapsed = clock.elapsed,
        income = %human.actor.total_income,
        reputation = human.actor.reputation,
        "session over"
    );
    outcome.0 = state;
    events.0.push(SessionEvent::Ended(state));
}
