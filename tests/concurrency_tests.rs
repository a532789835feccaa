//! Racing callers against the per-trade lock
//!
//! Every test releases its threads together through a barrier and then checks
//! that exactly one of the competing transitions won and that the audit trail
//! records only the winner.

mod common;

use agri_trade::model::{AssignmentStatus, TradeStatus};
use common::Market;
use std::sync::{Arc, Barrier};
use std::thread;

const RACERS: usize = 8;

#[test]
fn one_acceptance_wins() -> anyhow::Result<()> {
    let market = Arc::new(Market::open()?);
    let trade_id = market.agreed_trade()?;
    let inspection_id = market
        .engine
        .assign_inspector(&trade_id, &market.inspector.id)?
        .id;
    let events_before = market.event_count(&trade_id)?;

    let barrier = Arc::new(Barrier::new(RACERS));
    let handles: Vec<_> = (0..RACERS)
        .map(|n| {
            let market = market.clone();
            let barrier = barrier.clone();
            let inspection_id = inspection_id.clone();
            thread::spawn(move || {
                barrier.wait();
                market.engine.respond_to_assignment(&inspection_id, n % 2 == 0)
            })
        })
        .collect();

    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("racer panicked"))
        .collect();
    let winners: Vec<_> = outcomes.iter().filter_map(|outcome| outcome.as_ref().ok()).collect();

    assert_eq!(winners.len(), 1);
    for outcome in &outcomes {
        if let Err(err) = outcome {
            assert!(err.is_precondition_failed(), "{err:?}");
        }
    }

    let expected_status = match winners[0].assignment_status {
        AssignmentStatus::Accepted => TradeStatus::InspectionPending,
        _ => TradeStatus::Agreed,
    };
    assert_eq!(market.engine.get_trade(&trade_id)?.status, expected_status);
    assert_eq!(market.event_count(&trade_id)?, events_before + 1);
    market.engine.event_log().verify_chain(&trade_id)?;

    Ok(())
}

#[test]
fn competing_force_closes() -> anyhow::Result<()> {
    let market = Arc::new(Market::open()?);
    let trade_id = market.disputed_trade()?;
    let events_before = market.event_count(&trade_id)?;

    let barrier = Arc::new(Barrier::new(RACERS));
    let handles: Vec<_> = (0..RACERS)
        .map(|n| {
            let market = market.clone();
            let barrier = barrier.clone();
            let trade_id = trade_id.clone();
            thread::spawn(move || {
                barrier.wait();
                market.engine.force_close(&trade_id, n % 2 == 0).is_ok()
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|handle| handle.join().expect("racer panicked"))
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 1);
    let status = market.engine.get_trade(&trade_id)?.status;
    assert!(matches!(status, TradeStatus::Completed | TradeStatus::Cancelled));
    assert_eq!(market.event_count(&trade_id)?, events_before + 1);

    Ok(())
}

#[test]
fn duplicate_requests_collapse_to_one() -> anyhow::Result<()> {
    let market = Arc::new(Market::open()?);

    let barrier = Arc::new(Barrier::new(RACERS));
    let handles: Vec<_> = (0..RACERS)
        .map(|_| {
            let market = market.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                market.engine.initiate(&market.buyer, &market.crop_id, None)
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.join().expect("racer panicked") {
            Ok(_) => created += 1,
            Err(err) => assert!(err.is_conflict(), "{err:?}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(market.engine.list_my_trades(&market.buyer)?.len(), 1);

    Ok(())
}

#[test]
fn independent_trades_progress_together() -> anyhow::Result<()> {
    let market = Arc::new(Market::open()?);
    let trade_ids = (0..RACERS)
        .map(|_| -> anyhow::Result<String> {
            let crop_id = market.list_crop(&market.farmer.id, 1_000)?;
            let trade = market.engine.initiate(&market.buyer, &crop_id, None)?;
            market
                .engine
                .update_status(&trade.id, TradeStatus::Agreed, &market.farmer)?;
            Ok(trade.id)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let barrier = Arc::new(Barrier::new(RACERS));
    let handles: Vec<_> = trade_ids
        .iter()
        .cloned()
        .map(|trade_id| {
            let market = market.clone();
            let barrier = barrier.clone();
            thread::spawn(move || -> anyhow::Result<()> {
                barrier.wait();
                let inspection = market
                    .engine
                    .assign_inspector(&trade_id, &market.inspector.id)?;
                market.engine.respond_to_assignment(&inspection.id, true)?;
                market
                    .engine
                    .complete_inspection(&trade_id, "PASSED", "A", "https://certs.example/a.pdf")?;
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker panicked")?;
    }

    for trade_id in &trade_ids {
        assert_eq!(market.engine.get_trade(trade_id)?.status, TradeStatus::Shipped);
        assert_eq!(market.event_count(trade_id)?, 5);
        market.engine.event_log().verify_chain(trade_id)?;
    }
    assert_eq!(market.engine.list_my_inspections(&market.inspector)?.len(), RACERS);

    Ok(())
}
