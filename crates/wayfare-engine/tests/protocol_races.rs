//! Integration tests: cell handshakes under real concurrency.
//!
//! These drive live cell actors through their public handles and live
//! traveler threads through the grid, checking the properties that only
//! show up with several threads at once.

use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use wayfare_core::{Occupancy, TravelerId, TravelerKind, Verdict};
use wayfare_engine::{Grid, GridConfig};
use wayfare_test_utils::{c, wait_until};

fn quiet(width: u32, height: u32) -> GridConfig {
    GridConfig {
        width,
        height,
        max_travelers: 1,
        spawn_probability: 0.0,
        move_probability: 0.0,
        feral_probability: 0.0,
        hazard_probability: 0.0,
        tick_interval: Duration::from_millis(10),
        camera_interval: None,
        seed: Some(17),
        ..GridConfig::default()
    }
}

#[test]
fn simultaneous_reserves_admit_exactly_one() {
    const CONTENDERS: usize = 8;
    let grid = Grid::start(quiet(3, 3)).unwrap();

    for target in grid.bounds().iter() {
        let barrier = Barrier::new(CONTENDERS);
        let verdicts: Vec<Verdict> = thread::scope(|s| {
            let handles: Vec<_> = (0..CONTENDERS)
                .map(|i| {
                    let barrier = &barrier;
                    let grid = &grid;
                    s.spawn(move || {
                        let cell = grid.cell(target).unwrap();
                        barrier.wait();
                        cell.reserve(TravelerId::Ordinary(i as u16), c(0, 0)).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let accepted = verdicts.iter().filter(|v| **v == Verdict::Accepted).count();
        assert_eq!(accepted, 1, "{target}: {verdicts:?}");
        assert!(verdicts
            .iter()
            .all(|v| matches!(v, Verdict::Accepted | Verdict::Denied)));
        assert!(matches!(
            grid.inspect(target).unwrap().occupancy,
            Occupancy::ReservedIncoming(_)
        ));
    }
}

#[test]
fn exhausted_feral_leaves_registry_and_cell() {
    let config = GridConfig {
        feral_health: 1,
        ..quiet(2, 2)
    };
    let grid = Grid::start(config).unwrap();
    let feral = grid.spawn_at(c(1, 1), TravelerKind::Feral).unwrap().unwrap();
    assert!(feral.is_feral());

    assert!(wait_until(Duration::from_secs(5), || {
        !grid.is_feral_registered(feral)
            && grid.inspect(c(1, 1)).unwrap().occupancy == Occupancy::Available
    }));
}

#[test]
fn ordinary_traveler_evicts_feral() {
    // (0,0) ordinary, (1,0) feral, (2,0) free. The ordinary traveler's
    // only move is into the feral's cell; the feral steps east to let it in.
    let config = GridConfig {
        move_probability: 1.0,
        feral_health: 1_000,
        ..quiet(3, 1)
    };
    let grid = Grid::start(config).unwrap();
    let feral = grid.spawn_at(c(1, 0), TravelerKind::Feral).unwrap().unwrap();
    let ordinary = grid.spawn_at(c(0, 0), TravelerKind::Ordinary).unwrap().unwrap();

    assert!(wait_until(Duration::from_secs(10), || {
        grid.inspect(c(1, 0)).unwrap().occupancy == Occupancy::Occupied(ordinary)
    }));
    assert!(grid.is_feral_registered(feral));
}

#[test]
fn hazard_checked_reserve_then_fresh_reserve() {
    // A cell that ignites on its first idle tick accepts a reservation,
    // terminates the assignment, and is immediately reservable again.
    let config = GridConfig {
        hazard_probability: 1.0,
        hazard_duration: 1_000_000,
        ..quiet(2, 1)
    };
    let grid = Grid::start(config).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        grid.inspect(c(0, 0)).unwrap().hazard.is_some()
    }));

    let cell = grid.cell(c(0, 0)).unwrap();
    let first = TravelerId::Ordinary(0);
    let second = TravelerId::Ordinary(1);
    assert_eq!(cell.reserve(first, c(1, 0)).unwrap(), Verdict::Accepted);
    assert_eq!(cell.assign(first, c(1, 0)).unwrap(), Verdict::Terminate);
    assert_eq!(cell.reserve(second, c(1, 0)).unwrap(), Verdict::Accepted);
}
