use chrono::Duration;
use courier_core::{
    City, Coord, Difficulty, Order, OrderId, OrderStatus, SessionData, SimConfig, WeatherCondition,
};
use courier_runtime::{FrameInput, Session};
use criterion::{criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;

fn build_session() -> Session {
    let config = SimConfig::default();
    let orders = (0..40)
        .map(|i| Order {
            id: OrderId(format!("job-{i}")),
            pickup: Coord::new(i % 20, (i * 3) % 15),
            dropoff: Coord::new((i * 7) % 20, (i * 11) % 15),
            payout: Decimal::new(100 + i as i64 * 5, 0),
            weight: 1 + (i as u32 % 3),
            priority: i as u32 % 3,
            deadline: config.game_start + Duration::seconds(600),
            release_time: config.game_start + Duration::seconds(i as i64 * 10),
            status: OrderStatus::Available,
        })
        .collect();
    let data = SessionData {
        city: City::open(20, 15, Decimal::new(1_000_000, 0)),
        initial_weather: WeatherCondition::from("clear"),
        transitions: Default::default(),
        orders,
    };
    Session::new(config, data).with_autopilot(Difficulty::Medium)
}

fn bench_ticks(c: &mut Criterion) {
    let mut session = build_session();
    c.bench_function("session_tick", |b| {
        b.iter(|| {
            let _ = session.step(FrameInput::default());
        })
    });
    c.bench_function("session_minute", |b| {
        b.iter(|| {
            let mut s = build_session();
            s.run_seconds(60.0)
        })
    });
}

criterion_group!(benches, bench_ticks);
criterion_main!(benches);
